//! Error types for txrec operations
//!
//! Two families of failures exist in this crate:
//!
//! - **Protocol-ordering violations** are raised on the transport path, where
//!   the call signatures are fixed by the protocol and no `Result` can be
//!   returned. They indicate a caller bug or a broken instrumentation chain
//!   and terminate the run through [`fatal`].
//! - Everything else (configuration, registries, backend lookups,
//!   serialization) is returned as a [`Result`] and propagated with `?`.
//!
//! Each variant has a stable error code (e.g. `UNKNOWN_TIMED_HANDLE`) and an
//! [`ErrorCategory`] for grouping.
//!
//! # Example
//!
//! ```rust
//! use txrec_core::error::{ErrorCategory, TxRecError};
//!
//! let err = TxRecError::DuplicateCandidate { type_name: "UInt<12>".to_string() };
//! assert_eq!(err.category(), ErrorCategory::Conflict);
//! assert_eq!(err.error_code(), "DUPLICATE_CANDIDATE");
//! assert!(!err.is_fatal());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for txrec operations
pub type Result<T> = std::result::Result<T, TxRecError>;

/// Error category for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Events arrived in an order the protocol does not allow
    ProtocolOrdering,
    /// Invalid or incomplete configuration
    Configuration,
    /// Something was registered or bound twice
    Conflict,
    /// A referenced record does not exist
    NotFound,
    /// A record was used in a way that would corrupt it
    Integrity,
    /// Serialization and other external failures
    External,
}

/// Errors that can occur in txrec operations
#[derive(Error, Debug)]
pub enum TxRecError {
    // ═══════════════════════════════════════════════════════════════════════
    // Protocol ordering (fatal on the transport path)
    // ═══════════════════════════════════════════════════════════════════════

    /// A timed end event arrived for an identifier that was never opened
    #[error("No open timed transaction for id {id} in recorder '{recorder}'. The end phase arrived without its begin phase.")]
    UnknownTimedHandle { recorder: String, id: u64 },

    /// An end-of-request phase arrived while no request was open
    #[error("END_REQ for transaction {id} in recorder '{recorder}' without an open request.")]
    MissingOpenRequest { recorder: String, id: u64 },

    /// A phase value that the receiving callback does not model
    #[error("Phase '{phase}' is not supported by {context}.")]
    UnsupportedPhase { phase: String, context: String },

    /// A transport call reached a port that was never bound
    #[error("Recorder '{recorder}' has no bound {direction} port.")]
    UnboundPort {
        recorder: String,
        direction: &'static str,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Configuration
    // ═══════════════════════════════════════════════════════════════════════

    /// Configuration values are inconsistent or malformed
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Recording streams were requested but no database is attached
    #[error("Recorder '{recorder}' has no recording database attached.")]
    NoDatabase { recorder: String },

    // ═══════════════════════════════════════════════════════════════════════
    // Conflicts (registries and bindings)
    // ═══════════════════════════════════════════════════════════════════════

    /// A type-dispatch candidate with the same type name already exists
    #[error("Trace candidate already registered for type '{type_name}'.")]
    DuplicateCandidate { type_name: String },

    /// A port was bound twice
    #[error("Port '{port}' is already bound.")]
    PortAlreadyBound { port: String },

    /// A single-writer signal was written by a second writer
    #[error("Signal '{signal}' is owned by writer '{owner}' but was written by '{writer}'.")]
    WriterConflict {
        signal: String,
        owner: String,
        writer: String,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Recording database lookups
    // ═══════════════════════════════════════════════════════════════════════

    /// Stream id unknown to the backend
    #[error("Recording stream {id} not found.")]
    StreamNotFound { id: u64 },

    /// Generator id unknown to the backend
    #[error("Recording generator {id} not found.")]
    GeneratorNotFound { id: u64 },

    /// Transaction id unknown to the backend
    #[error("Transaction {id} not found.")]
    TransactionNotFound { id: u64 },

    /// A transaction was ended a second time
    #[error("Transaction {id} was already ended.")]
    TransactionAlreadyEnded { id: u64 },

    // ═══════════════════════════════════════════════════════════════════════
    // Infrastructure
    // ═══════════════════════════════════════════════════════════════════════

    /// JSON serialization or deserialization failed
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl TxRecError {
    /// Returns true if this error must terminate the simulation run
    ///
    /// Only protocol-ordering violations are fatal. They are raised on paths
    /// that cannot report a `Result` and mean the recorded history would be
    /// inconsistent if the run continued.
    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::ProtocolOrdering
    }

    /// Returns the error category for grouping
    pub fn category(&self) -> ErrorCategory {
        match self {
            TxRecError::UnknownTimedHandle { .. }
            | TxRecError::MissingOpenRequest { .. }
            | TxRecError::UnsupportedPhase { .. }
            | TxRecError::UnboundPort { .. } => ErrorCategory::ProtocolOrdering,

            TxRecError::InvalidConfig { .. } | TxRecError::NoDatabase { .. } => {
                ErrorCategory::Configuration
            }

            TxRecError::DuplicateCandidate { .. }
            | TxRecError::PortAlreadyBound { .. }
            | TxRecError::WriterConflict { .. } => ErrorCategory::Conflict,

            TxRecError::StreamNotFound { .. }
            | TxRecError::GeneratorNotFound { .. }
            | TxRecError::TransactionNotFound { .. } => ErrorCategory::NotFound,

            TxRecError::TransactionAlreadyEnded { .. } => ErrorCategory::Integrity,

            TxRecError::JsonError(_) => ErrorCategory::External,
        }
    }

    /// Returns the stable error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            TxRecError::UnknownTimedHandle { .. } => "UNKNOWN_TIMED_HANDLE",
            TxRecError::MissingOpenRequest { .. } => "MISSING_OPEN_REQUEST",
            TxRecError::UnsupportedPhase { .. } => "UNSUPPORTED_PHASE",
            TxRecError::UnboundPort { .. } => "UNBOUND_PORT",
            TxRecError::InvalidConfig { .. } => "INVALID_CONFIG",
            TxRecError::NoDatabase { .. } => "NO_DATABASE",
            TxRecError::DuplicateCandidate { .. } => "DUPLICATE_CANDIDATE",
            TxRecError::PortAlreadyBound { .. } => "PORT_ALREADY_BOUND",
            TxRecError::WriterConflict { .. } => "WRITER_CONFLICT",
            TxRecError::StreamNotFound { .. } => "STREAM_NOT_FOUND",
            TxRecError::GeneratorNotFound { .. } => "GENERATOR_NOT_FOUND",
            TxRecError::TransactionNotFound { .. } => "TRANSACTION_NOT_FOUND",
            TxRecError::TransactionAlreadyEnded { .. } => "TRANSACTION_ALREADY_ENDED",
            TxRecError::JsonError(_) => "JSON_ERROR",
        }
    }
}

/// Terminates the run on a protocol-ordering violation
///
/// Logs the error with its code at `error` level, then panics with the
/// error's message. Used where the transport signature leaves no way to
/// report the failure to the caller.
#[track_caller]
pub fn fatal(err: TxRecError) -> ! {
    tracing::error!(code = err.error_code(), category = ?err.category(), "{}", err);
    panic!("{}", err)
}

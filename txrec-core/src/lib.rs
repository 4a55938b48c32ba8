//! # txrec Core - Transaction Recording and Value Tracing
//!
//! Instrumentation for transaction-level simulation models:
//!
//! - **Recorder** ([`TlmRecorder`]): sits between an initiator and a target,
//!   forwards every transport call unchanged and records it into a
//!   transaction database, with delay-annotated ("timed") views and causal
//!   links across chained recorders
//! - **Tracer** ([`Tracer`]): walks a hierarchy of simulation objects and
//!   registers every recognizable value with a trace file
//!
//! Storage formats are not part of this crate. Recorders write through
//! [`RecordingBackend`] and tracers through [`tracer::TraceFile`]; the
//! in-memory [`MemoryTxDb`] and [`MemoryTraceFile`] serve as reference
//! backends.
//!
//! ## Example
//!
//! ```rust
//! use std::rc::Rc;
//! use txrec_core::{
//!     BaseProtocol, FwTransport, GenericPayload, ManualClock, MemoryTxDb, RecorderConfig,
//!     SimTime, TlmRecorder, TxDb,
//! };
//! use txrec_core::transport::mock::MemoryTarget;
//!
//! let db = Rc::new(MemoryTxDb::new());
//! let clock = Rc::new(ManualClock::new());
//! let recorder = TlmRecorder::<BaseProtocol>::new(
//!     RecorderConfig::new("bus"),
//!     Some(TxDb::new(db.clone())),
//!     clock.clone(),
//! )
//! .unwrap();
//! recorder.bind_fw(Rc::new(MemoryTarget::new(64))).unwrap();
//!
//! let mut trans = GenericPayload::read(0x20, 4);
//! let mut delay = SimTime::from_ns(5);
//! recorder.b_transport(&mut trans, &mut delay);
//!
//! // the timed view opens once simulated time reaches the annotated delay
//! clock.advance(SimTime::from_ns(5));
//! recorder.process_timed_events();
//!
//! assert_eq!(db.transactions_of("bus_bl", "read").len(), 1);
//! assert_eq!(db.transactions_of("bus_bl_timed", "read").len(), 1);
//! ```

pub mod config;
pub mod error;
pub mod recorder;
pub mod recording;
pub mod time;
pub mod tracer;
pub mod transport;
pub mod values;

// Re-export main types
pub use config::{RecorderConfig, TracerConfig};
pub use error::{fatal, ErrorCategory, Result, TxRecError};
pub use recorder::{
    ExtensionRecording, ExtensionRecordingRegistry, LinkExtension, LinkOwnership, PoolStats,
    RecorderId, TlmRecorder,
};
pub use recording::{
    AttrValue, MemoryTxDb, RecordingBackend, Relation, TxDb, TxGenerator, TxHandle, TxId, TxStream,
};
pub use time::{ManualClock, SimClock, SimTime};
pub use tracer::{MemoryTraceFile, SimObject, TraceKind, TraceKinds, Tracer, TypeRegistry};
pub use transport::{
    BaseProtocol, BwTransport, Command, DmiDescriptor, FwTransport, GenericPayload, Phase,
    PhaseKind, Protocol, ProtocolPhase, ResponseStatus, SyncStatus, TransactionPayload,
};
pub use values::{SimValue, TraceValue};

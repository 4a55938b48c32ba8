//! Transport interfaces and protocol vocabulary
//!
//! A [`Protocol`] ties a payload type to a phase type. Components talk to
//! each other through two small capabilities: [`FwTransport`] (initiator to
//! target) and [`BwTransport`] (target to initiator). A recorder implements
//! both and holds one of each to delegate to, so it can be placed between any
//! two bound components.
//!
//! All methods take `&self`: the simulation kernel runs every component on a
//! single logical thread, and components keep their mutable state in cells.

pub mod mock;
mod payload;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::time::SimTime;

pub use payload::{ExtensionSet, GenericPayload};

/// Transaction command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Read,
    Write,
    #[default]
    Ignore,
}

impl Command {
    pub const ALL: [Command; 3] = [Command::Read, Command::Write, Command::Ignore];

    /// Stable position in [`Command::ALL`]
    pub fn index(self) -> usize {
        match self {
            Command::Read => 0,
            Command::Write => 1,
            Command::Ignore => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Command::Read => "read",
            Command::Write => "write",
            Command::Ignore => "ignore",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target response carried back in the payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Ok,
    #[default]
    Incomplete,
    GenericError,
    AddressError,
    CommandError,
    BurstError,
    ByteEnableError,
}

impl ResponseStatus {
    pub fn is_ok(self) -> bool {
        self == ResponseStatus::Ok
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResponseStatus::Ok => "TLM_OK_RESPONSE",
            ResponseStatus::Incomplete => "TLM_INCOMPLETE_RESPONSE",
            ResponseStatus::GenericError => "TLM_GENERIC_ERROR_RESPONSE",
            ResponseStatus::AddressError => "TLM_ADDRESS_ERROR_RESPONSE",
            ResponseStatus::CommandError => "TLM_COMMAND_ERROR_RESPONSE",
            ResponseStatus::BurstError => "TLM_BURST_ERROR_RESPONSE",
            ResponseStatus::ByteEnableError => "TLM_BYTE_ENABLE_ERROR_RESPONSE",
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Return value of the non-blocking calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Accepted,
    Updated,
    Completed,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncStatus::Accepted => "TLM_ACCEPTED",
            SyncStatus::Updated => "TLM_UPDATED",
            SyncStatus::Completed => "TLM_COMPLETED",
        })
    }
}

/// The four phases of the base protocol that recording understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseKind {
    BeginReq,
    EndReq,
    BeginResp,
    EndResp,
}

impl PhaseKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseKind::BeginReq => "BEGIN_REQ",
            PhaseKind::EndReq => "END_REQ",
            PhaseKind::BeginResp => "BEGIN_RESP",
            PhaseKind::EndResp => "END_RESP",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A protocol's phase type
///
/// Protocols may define phases beyond the base four. Those map to `None`
/// and are passed through by the timed views without being modelled.
pub trait ProtocolPhase: Clone + fmt::Debug + fmt::Display + 'static {
    fn kind(&self) -> Option<PhaseKind>;

    fn from_kind(kind: PhaseKind) -> Self;

    fn is(&self, kind: PhaseKind) -> bool {
        self.kind() == Some(kind)
    }
}

/// Base-protocol phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    #[default]
    Uninitialized,
    BeginReq,
    EndReq,
    BeginResp,
    EndResp,
    /// A protocol extension phase, identified by name
    Custom(String),
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Uninitialized => f.write_str("UNINITIALIZED_PHASE"),
            Phase::BeginReq => f.write_str("BEGIN_REQ"),
            Phase::EndReq => f.write_str("END_REQ"),
            Phase::BeginResp => f.write_str("BEGIN_RESP"),
            Phase::EndResp => f.write_str("END_RESP"),
            Phase::Custom(name) => f.write_str(name),
        }
    }
}

impl ProtocolPhase for Phase {
    fn kind(&self) -> Option<PhaseKind> {
        match self {
            Phase::BeginReq => Some(PhaseKind::BeginReq),
            Phase::EndReq => Some(PhaseKind::EndReq),
            Phase::BeginResp => Some(PhaseKind::BeginResp),
            Phase::EndResp => Some(PhaseKind::EndResp),
            Phase::Uninitialized | Phase::Custom(_) => None,
        }
    }

    fn from_kind(kind: PhaseKind) -> Self {
        match kind {
            PhaseKind::BeginReq => Phase::BeginReq,
            PhaseKind::EndReq => Phase::EndReq,
            PhaseKind::BeginResp => Phase::BeginResp,
            PhaseKind::EndResp => Phase::EndResp,
        }
    }
}

/// Access rights granted by a DMI region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DmiAccess {
    #[default]
    None,
    Read,
    Write,
    ReadWrite,
}

/// Result of a DMI request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmiDescriptor {
    pub start_address: u64,
    pub end_address: u64,
    pub access: DmiAccess,
    pub read_latency: SimTime,
    pub write_latency: SimTime,
}

impl Default for DmiDescriptor {
    fn default() -> Self {
        Self {
            start_address: 0,
            end_address: u64::MAX,
            access: DmiAccess::None,
            read_latency: SimTime::ZERO,
            write_latency: SimTime::ZERO,
        }
    }
}

/// Fields of a transaction that recording reads
pub trait TransactionPayload: 'static {
    fn command(&self) -> Command;

    fn address(&self) -> u64;

    fn data(&self) -> &[u8];

    fn data_length(&self) -> usize {
        self.data().len()
    }

    fn byte_enable_length(&self) -> usize;

    fn streaming_width(&self) -> usize;

    fn response_status(&self) -> ResponseStatus;

    /// Identity that stays stable for the whole lifetime of the transaction
    fn uid(&self) -> u64;

    /// True when the payload's lifetime is reference-counted by a pool
    fn has_memory_manager(&self) -> bool;

    fn extensions(&self) -> &ExtensionSet;

    fn extensions_mut(&mut self) -> &mut ExtensionSet;
}

/// A payload type paired with its phase type
pub trait Protocol: 'static {
    type Payload: TransactionPayload;
    type Phase: ProtocolPhase;

    /// Used in stream kind labels, e.g. `[TLM][base-protocol][b]`
    const NAME: &'static str;
}

/// The generic-payload base protocol
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseProtocol;

impl Protocol for BaseProtocol {
    type Payload = GenericPayload;
    type Phase = Phase;

    const NAME: &'static str = "base-protocol";
}

/// Calls travelling from initiator to target
pub trait FwTransport<P: Protocol> {
    fn b_transport(&self, trans: &mut P::Payload, delay: &mut SimTime);

    fn nb_transport_fw(
        &self,
        trans: &mut P::Payload,
        phase: &mut P::Phase,
        delay: &mut SimTime,
    ) -> SyncStatus;

    fn get_direct_mem_ptr(&self, trans: &mut P::Payload, dmi: &mut DmiDescriptor) -> bool;

    fn transport_dbg(&self, trans: &mut P::Payload) -> usize;
}

/// Calls travelling from target back to initiator
pub trait BwTransport<P: Protocol> {
    fn nb_transport_bw(
        &self,
        trans: &mut P::Payload,
        phase: &mut P::Phase,
        delay: &mut SimTime,
    ) -> SyncStatus;

    fn invalidate_direct_mem_ptr(&self, start_address: u64, end_address: u64);
}

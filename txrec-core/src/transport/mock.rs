//! Transport doubles for tests and examples
//!
//! [`MemoryTarget`] is a byte-addressed memory behind the forward interface.
//! [`ScriptedInitiator`] answers backward calls with a configurable status.
//! Both log every call they receive, so a test can compare what reached
//! them with and without a recorder in between.

use std::cell::{Cell, RefCell};

use crate::time::SimTime;

use super::{
    BaseProtocol, BwTransport, Command, DmiAccess, DmiDescriptor, FwTransport, GenericPayload,
    Phase, ResponseStatus, SyncStatus, TransactionPayload,
};

/// A call observed by a transport double
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Blocking {
        command: Command,
        address: u64,
        delay: SimTime,
    },
    NbForward {
        phase: String,
        delay: SimTime,
    },
    NbBackward {
        phase: String,
        delay: SimTime,
    },
    Dmi {
        address: u64,
    },
    Debug {
        address: u64,
    },
    Invalidate {
        start: u64,
        end: u64,
    },
}

/// How [`MemoryTarget`] answers a `BEGIN_REQ` on the non-blocking path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NbStyle {
    /// Perform the access and return `COMPLETED` immediately
    #[default]
    Complete,
    /// Perform the access, move the phase to `END_REQ` and return `UPDATED`;
    /// the response is expected to be sent on the backward path
    TwoPhase,
}

/// Byte-addressed memory target
#[derive(Debug)]
pub struct MemoryTarget {
    memory: RefCell<Vec<u8>>,
    latency: SimTime,
    nb_style: Cell<NbStyle>,
    dmi_allowed: Cell<bool>,
    calls: RefCell<Vec<TransportCall>>,
}

impl MemoryTarget {
    pub fn new(size: usize) -> Self {
        Self {
            memory: RefCell::new(vec![0; size]),
            latency: SimTime::ZERO,
            nb_style: Cell::new(NbStyle::Complete),
            dmi_allowed: Cell::new(false),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Latency added to the annotated delay of every access
    pub fn with_latency(mut self, latency: SimTime) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_nb_style(&self, style: NbStyle) {
        self.nb_style.set(style);
    }

    pub fn set_dmi_allowed(&self, allowed: bool) {
        self.dmi_allowed.set(allowed);
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn peek(&self, address: u64, length: usize) -> Vec<u8> {
        let memory = self.memory.borrow();
        let start = (address as usize).min(memory.len());
        let end = start.saturating_add(length).min(memory.len());
        memory[start..end].to_vec()
    }

    pub fn poke(&self, address: u64, bytes: &[u8]) {
        let mut memory = self.memory.borrow_mut();
        let start = address as usize;
        if let Some(region) = memory.get_mut(start..start.saturating_add(bytes.len())) {
            region.copy_from_slice(bytes);
        }
    }

    fn log(&self, call: TransportCall) {
        self.calls.borrow_mut().push(call);
    }

    /// Copies between memory and payload; returns the bytes moved
    fn access(&self, trans: &mut GenericPayload, set_status: bool) -> usize {
        let start = trans.address() as usize;
        let length = trans.data_length();
        let mut memory = self.memory.borrow_mut();
        let Some(region) = memory.get_mut(start..start.saturating_add(length)) else {
            if set_status {
                trans.set_response_status(ResponseStatus::AddressError);
            }
            return 0;
        };
        match trans.command() {
            Command::Read => trans.data_mut().copy_from_slice(region),
            Command::Write => region.copy_from_slice(trans.data()),
            Command::Ignore => {}
        }
        if set_status {
            trans.set_response_status(ResponseStatus::Ok);
        }
        length
    }
}

impl FwTransport<BaseProtocol> for MemoryTarget {
    fn b_transport(&self, trans: &mut GenericPayload, delay: &mut SimTime) {
        self.log(TransportCall::Blocking {
            command: trans.command(),
            address: trans.address(),
            delay: *delay,
        });
        self.access(trans, true);
        *delay += self.latency;
    }

    fn nb_transport_fw(
        &self,
        trans: &mut GenericPayload,
        phase: &mut Phase,
        delay: &mut SimTime,
    ) -> SyncStatus {
        self.log(TransportCall::NbForward {
            phase: phase.to_string(),
            delay: *delay,
        });
        match phase {
            Phase::BeginReq => {
                self.access(trans, true);
                *delay += self.latency;
                match self.nb_style.get() {
                    NbStyle::Complete => SyncStatus::Completed,
                    NbStyle::TwoPhase => {
                        *phase = Phase::EndReq;
                        SyncStatus::Updated
                    }
                }
            }
            Phase::EndResp => SyncStatus::Completed,
            _ => SyncStatus::Accepted,
        }
    }

    fn get_direct_mem_ptr(&self, trans: &mut GenericPayload, dmi: &mut DmiDescriptor) -> bool {
        self.log(TransportCall::Dmi {
            address: trans.address(),
        });
        if !self.dmi_allowed.get() {
            return false;
        }
        let size = self.memory.borrow().len() as u64;
        dmi.start_address = 0;
        dmi.end_address = size.saturating_sub(1);
        dmi.access = DmiAccess::ReadWrite;
        dmi.read_latency = self.latency;
        dmi.write_latency = self.latency;
        trans.set_dmi_allowed(true);
        true
    }

    fn transport_dbg(&self, trans: &mut GenericPayload) -> usize {
        self.log(TransportCall::Debug {
            address: trans.address(),
        });
        self.access(trans, false)
    }
}

/// Initiator side of the backward path
#[derive(Debug)]
pub struct ScriptedInitiator {
    bw_reply: Cell<SyncStatus>,
    calls: RefCell<Vec<TransportCall>>,
}

impl Default for ScriptedInitiator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedInitiator {
    pub fn new() -> Self {
        Self {
            bw_reply: Cell::new(SyncStatus::Accepted),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Status returned from every backward call. `UPDATED` on a
    /// `BEGIN_RESP` also moves the phase to `END_RESP`.
    pub fn set_bw_reply(&self, status: SyncStatus) {
        self.bw_reply.set(status);
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.borrow().clone()
    }
}

impl BwTransport<BaseProtocol> for ScriptedInitiator {
    fn nb_transport_bw(
        &self,
        _trans: &mut GenericPayload,
        phase: &mut Phase,
        delay: &mut SimTime,
    ) -> SyncStatus {
        self.calls.borrow_mut().push(TransportCall::NbBackward {
            phase: phase.to_string(),
            delay: *delay,
        });
        let reply = self.bw_reply.get();
        if reply == SyncStatus::Updated && *phase == Phase::BeginResp {
            *phase = Phase::EndResp;
        }
        reply
    }

    fn invalidate_direct_mem_ptr(&self, start_address: u64, end_address: u64) {
        self.calls.borrow_mut().push(TransportCall::Invalidate {
            start: start_address,
            end: end_address,
        });
    }
}

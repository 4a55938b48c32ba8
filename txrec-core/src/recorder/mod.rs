//! TLM transaction recorder
//!
//! [`TlmRecorder`] sits between an initiator and a target. It implements
//! both [`FwTransport`] and [`BwTransport`], forwards every call unchanged
//! and records it into a [`TxDb`].
//!
//! ## Views
//!
//! ```text
//! <name>_bl        one record per blocking call (read/write/ignore)
//! <name>_bl_timed  the same transactions placed at their annotated delay
//! <name>_nb        one record per non-blocking call (fw/bw)
//! <name>_nb_timed  request and response phases at their annotated delay
//! <name>_dmi       DMI requests and invalidations
//! ```
//!
//! The timed views are fed through two event queues. The embedding kernel
//! drives them with [`TlmRecorder::next_timed_event`] and
//! [`TlmRecorder::process_timed_events`].
//!
//! ## Layering
//!
//! Recorders can be chained. The first recorder to see a transaction
//! attaches a [`LinkExtension`]; the following ones record themselves as
//! successors of the previous layer and restore the link when their blocking
//! call returns.
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
//!     RecorderConfig::new("cpu"),
//!     Some(TxDb::new(db.clone())),
//!     clock.clone(),
//! )
//! .unwrap();
//! recorder.bind_fw(Rc::new(MemoryTarget::new(256))).unwrap();
//!
//! let mut trans = GenericPayload::write(0x10, &[0xAB]);
//! let mut delay = SimTime::from_ns(10);
//! recorder.b_transport(&mut trans, &mut delay);
//!
//! assert_eq!(db.transactions_of("cpu_bl", "write").len(), 1);
//! ```

mod hooks;
mod link;
mod queue;
mod snapshot;
mod streams;

use std::cell::{Cell, OnceCell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use crate::config::RecorderConfig;
use crate::error::{fatal, Result, TxRecError};
use crate::recording::{AttrValue, Relation, TxDb, TxHandle, TxId};
use crate::time::{SimClock, SimTime};
use crate::transport::{
    BwTransport, Command, DmiAccess, DmiDescriptor, FwTransport, PhaseKind, Protocol, ProtocolPhase,
    SyncStatus, TransactionPayload,
};

pub use hooks::{ExtensionRecording, ExtensionRecordingRegistry};
pub use link::{LinkExtension, LinkOwnership, RecorderId};
pub use queue::PayloadEventQueue;
pub use snapshot::{data_value, PayloadRecord, PoolStats, SnapshotPool, TimedSnapshot};

use streams::{DmiGenerators, RecordingStreams, TimedGenerators};

const TRANS: &str = "trans";
const DATA_VALUE: &str = "trans.data_value";

fn dmi_access_str(access: DmiAccess) -> &'static str {
    match access {
        DmiAccess::None => "none",
        DmiAccess::Read => "read",
        DmiAccess::Write => "write",
        DmiAccess::ReadWrite => "read_write",
    }
}

fn dmi_attr(dmi: &DmiDescriptor) -> AttrValue {
    AttrValue::record([
        ("start_address", AttrValue::from(dmi.start_address)),
        ("end_address", AttrValue::from(dmi.end_address)),
        ("access", AttrValue::from(dmi_access_str(dmi.access))),
        ("read_latency", AttrValue::from(dmi.read_latency)),
        ("write_latency", AttrValue::from(dmi.write_latency)),
    ])
}

fn small_data_value<T: TransactionPayload>(trans: &T) -> Option<u64> {
    if trans.data_length() < 8 {
        data_value(trans.data())
    } else {
        None
    }
}

/// Recording interposer between two transport endpoints
pub struct TlmRecorder<P: Protocol> {
    id: RecorderId,
    name: String,
    enable_tracing: Cell<bool>,
    enable_timed_tracing: Cell<bool>,
    enable_dmi_tracing: Cell<bool>,
    enable_tr_dbg_tracing: Cell<bool>,
    fw_port: OnceCell<Rc<dyn FwTransport<P>>>,
    bw_port: OnceCell<Weak<dyn BwTransport<P>>>,
    db: Option<TxDb>,
    clock: Rc<dyn SimClock>,
    streams: OnceCell<RecordingStreams>,
    extension_recording: RefCell<ExtensionRecordingRegistry<P>>,
    pool: RefCell<SnapshotPool>,
    b_timed_peq: RefCell<PayloadEventQueue<TimedSnapshot<PhaseKind>>>,
    nb_timed_peq: RefCell<PayloadEventQueue<TimedSnapshot<P::Phase>>>,
    btx_handles: RefCell<HashMap<u64, TxHandle>>,
    nbtx_req_handles: RefCell<BTreeMap<u64, TxHandle>>,
    nbtx_last_req: RefCell<BTreeMap<u64, TxId>>,
    warned_unavailable: Cell<bool>,
}

impl<P: Protocol> fmt::Debug for TlmRecorder<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlmRecorder")
            .field("name", &self.name)
            .field("enable_tracing", &self.enable_tracing.get())
            .field("enable_timed_tracing", &self.enable_timed_tracing.get())
            .field("enable_dmi_tracing", &self.enable_dmi_tracing.get())
            .field("db", &self.db)
            .field("streams", &self.streams.get().map(RecordingStreams::names))
            .finish()
    }
}

impl<P: Protocol> TlmRecorder<P> {
    /// Create an unbound recorder
    ///
    /// Without a database the recorder only forwards. Streams are opened on
    /// the first recorded call, so the flags may still be changed until then.
    pub fn new(config: RecorderConfig, db: Option<TxDb>, clock: Rc<dyn SimClock>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            id: RecorderId::next(),
            name: config.resolved_name(),
            enable_tracing: Cell::new(config.enable_tracing),
            enable_timed_tracing: Cell::new(config.enable_timed_tracing),
            enable_dmi_tracing: Cell::new(config.enable_dmi_tracing),
            enable_tr_dbg_tracing: Cell::new(config.enable_tr_dbg_tracing),
            fw_port: OnceCell::new(),
            bw_port: OnceCell::new(),
            db,
            clock,
            streams: OnceCell::new(),
            extension_recording: RefCell::new(ExtensionRecordingRegistry::new()),
            pool: RefCell::new(SnapshotPool::new()),
            b_timed_peq: RefCell::new(PayloadEventQueue::new()),
            nb_timed_peq: RefCell::new(PayloadEventQueue::new()),
            btx_handles: RefCell::new(HashMap::new()),
            nbtx_req_handles: RefCell::new(BTreeMap::new()),
            nbtx_last_req: RefCell::new(BTreeMap::new()),
            warned_unavailable: Cell::new(false),
        })
    }

    /// Replace the extension recording hooks
    pub fn with_extension_recording(self, registry: ExtensionRecordingRegistry<P>) -> Self {
        *self.extension_recording.borrow_mut() = registry;
        self
    }

    pub fn register_extension_recording(&self, hook: Box<dyn ExtensionRecording<P>>) {
        self.extension_recording.borrow_mut().register(hook);
    }

    /// Bind the downstream (target side) interface
    pub fn bind_fw<F: FwTransport<P> + 'static>(&self, fw: Rc<F>) -> Result<()> {
        let fw: Rc<dyn FwTransport<P>> = fw;
        self.fw_port.set(fw).map_err(|_| TxRecError::PortAlreadyBound {
            port: format!("{}.fw", self.name),
        })
    }

    /// Bind the upstream (initiator side) interface
    ///
    /// Held weakly: the upstream component usually owns this recorder.
    pub fn bind_bw<B: BwTransport<P> + 'static>(&self, bw: &Rc<B>) -> Result<()> {
        let weak = Rc::downgrade(bw);
        let weak: Weak<dyn BwTransport<P>> = weak;
        self.bw_port.set(weak).map_err(|_| TxRecError::PortAlreadyBound {
            port: format!("{}.bw", self.name),
        })
    }

    pub fn id(&self) -> RecorderId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when tracing is switched on and a database is attached
    pub fn is_recording_enabled(&self) -> bool {
        self.db.is_some() && self.enable_tracing.get()
    }

    pub fn set_enable_tracing(&self, enabled: bool) {
        self.enable_tracing.set(enabled);
    }

    /// Takes effect for stream creation only before the first recorded call
    pub fn set_enable_timed_tracing(&self, enabled: bool) {
        self.enable_timed_tracing.set(enabled);
    }

    /// Takes effect for stream creation only before the first recorded call
    pub fn set_enable_dmi_tracing(&self, enabled: bool) {
        self.enable_dmi_tracing.set(enabled);
    }

    /// Stored but not consulted: debug transport is never recorded
    pub fn set_enable_tr_dbg_tracing(&self, enabled: bool) {
        self.enable_tr_dbg_tracing.set(enabled);
    }

    pub fn enable_tr_dbg_tracing(&self) -> bool {
        self.enable_tr_dbg_tracing.get()
    }

    /// Open all streams now instead of on first use. Idempotent.
    pub fn initialize_streams(&self) -> Result<()> {
        if self.streams.get().is_some() {
            return Ok(());
        }
        let db = self.db.as_ref().ok_or_else(|| TxRecError::NoDatabase {
            recorder: self.name.clone(),
        })?;
        let streams = RecordingStreams::open(
            db,
            &self.name,
            P::NAME,
            self.enable_timed_tracing.get(),
            self.enable_dmi_tracing.get(),
        )?;
        let _ = self.streams.set(streams);
        Ok(())
    }

    /// Names of the opened streams, empty before the first recorded call
    pub fn stream_names(&self) -> Vec<String> {
        self.streams
            .get()
            .map(|s| s.names().to_vec())
            .unwrap_or_default()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.borrow().stats()
    }

    /// Snapshots queued for the timed views and not yet delivered
    pub fn pending_timed_events(&self) -> usize {
        self.b_timed_peq.borrow().len() + self.nb_timed_peq.borrow().len()
    }

    /// Timed records opened and not yet closed
    pub fn open_timed_transactions(&self) -> usize {
        self.btx_handles.borrow().len() + self.nbtx_req_handles.borrow().len()
    }

    /// Earliest simulated time at which a queued snapshot is due
    pub fn next_timed_event(&self) -> Option<SimTime> {
        let b = self.b_timed_peq.borrow().next_due();
        let nb = self.nb_timed_peq.borrow().next_due();
        match (b, nb) {
            (Some(b), Some(nb)) => Some(b.min(nb)),
            (b, nb) => b.or(nb),
        }
    }

    /// Deliver every snapshot due at the current time
    ///
    /// Snapshots come out in due-time order, queue order within one time,
    /// and blocking before non-blocking when both are due at the same time.
    /// Returns the number delivered.
    pub fn process_timed_events(&self) -> usize {
        let mut delivered = 0;
        loop {
            let now = self.clock.now();
            let b_next = self.b_timed_peq.borrow().next_due();
            let nb_next = self.nb_timed_peq.borrow().next_due();
            let blocking_first = match (b_next, nb_next) {
                (Some(b), Some(nb)) => b <= nb,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            if blocking_first {
                let Some((at, snapshot)) = self.b_timed_peq.borrow_mut().pop_due(now) else {
                    break;
                };
                self.btx_cb(at, snapshot);
            } else {
                let Some((at, snapshot)) = self.nb_timed_peq.borrow_mut().pop_due(now) else {
                    break;
                };
                self.nbtx_cb(at, snapshot);
            }
            delivered += 1;
        }
        delivered
    }

    fn fw(&self) -> &Rc<dyn FwTransport<P>> {
        match self.fw_port.get() {
            Some(fw) => fw,
            None => fatal(TxRecError::UnboundPort {
                recorder: self.name.clone(),
                direction: "forward",
            }),
        }
    }

    fn bw(&self) -> Rc<dyn BwTransport<P>> {
        self.bw_port
            .get()
            .and_then(Weak::upgrade)
            .unwrap_or_else(|| {
                fatal(TxRecError::UnboundPort {
                    recorder: self.name.clone(),
                    direction: "backward",
                })
            })
    }

    /// Streams to record into, or `None` to forward only
    fn recording_streams(&self) -> Option<&RecordingStreams> {
        if !self.enable_tracing.get() {
            return None;
        }
        self.available_streams()
    }

    fn available_streams(&self) -> Option<&RecordingStreams> {
        match self.initialize_streams() {
            Ok(()) => self.streams.get(),
            Err(err) => {
                if !self.warned_unavailable.replace(true) {
                    warn!(recorder = %self.name, error = %err, "recording unavailable, forwarding only");
                }
                None
            }
        }
    }

    fn dmi_generators(&self) -> Option<&DmiGenerators> {
        if !(self.enable_tracing.get() && self.enable_dmi_tracing.get()) {
            return None;
        }
        self.available_streams()?.dmi.as_ref()
    }

    fn timed_generators<'a>(&self, streams: &'a RecordingStreams) -> Option<&'a TimedGenerators> {
        if !self.enable_timed_tracing.get() {
            return None;
        }
        streams.timed.as_ref()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Causal link handling
    // ═══════════════════════════════════════════════════════════════════════

    /// Relate `handle` to the previous layer and make it the current one.
    /// Returns the handle it replaced, `None` if there was no link yet.
    fn link_transaction(&self, trans: &mut P::Payload, handle: &TxHandle, create: bool) -> Option<TxId> {
        let pooled = trans.has_memory_manager();
        let extensions = trans.extensions_mut();
        if let Some(link) = extensions.get_mut::<LinkExtension>() {
            handle.add_relation(Relation::PredecessorSuccessor, link.current());
            return Some(link.replace_current(handle.id()));
        }
        if create {
            let link = LinkExtension::new(handle.id(), self.id);
            if pooled {
                extensions.set_auto(link);
            } else {
                extensions.set(link);
            }
        }
        None
    }

    /// Detach the link if this recorder created it
    fn release_link(&self, trans: &mut P::Payload) -> bool {
        let owned = trans
            .extensions()
            .get::<LinkExtension>()
            .map(|link| link.ownership(self.id) == LinkOwnership::Owned)
            .unwrap_or(false);
        if owned {
            trans.extensions_mut().remove::<LinkExtension>();
        }
        owned
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Timed views
    // ═══════════════════════════════════════════════════════════════════════

    fn notify_blocking(&self, trans: &P::Payload, parent: TxId, phase: PhaseKind, delay: SimTime) {
        let record = self.pool.borrow_mut().acquire(trans);
        let at = self.clock.now() + delay;
        self.b_timed_peq.borrow_mut().notify(
            at,
            TimedSnapshot {
                id: parent.raw(),
                parent,
                phase,
                record,
            },
        );
    }

    fn notify_nb(&self, trans: &P::Payload, parent: TxId, phase: P::Phase, delay: SimTime) {
        let record = self.pool.borrow_mut().acquire(trans);
        let at = self.clock.now() + delay;
        self.nb_timed_peq.borrow_mut().notify(
            at,
            TimedSnapshot {
                id: trans.uid(),
                parent,
                phase,
                record,
            },
        );
    }

    /// Records are stamped with the due time, not the time of delivery
    fn btx_cb(&self, at: SimTime, snapshot: TimedSnapshot<PhaseKind>) {
        if let Some(timed) = self.streams.get().and_then(|s| s.timed.as_ref()) {
            match snapshot.phase {
                PhaseKind::BeginReq => {
                    let command = snapshot.record.command;
                    let handle = timed.blocking[command.index()]
                        .begin(at, Some(AttrValue::from(command.as_str())));
                    handle.record_attribute(TRANS, snapshot.record.to_attr());
                    handle.add_relation(Relation::ParentChild, snapshot.parent);
                    self.btx_handles.borrow_mut().insert(snapshot.id, handle);
                }
                PhaseKind::EndResp => {
                    let handle = self
                        .btx_handles
                        .borrow_mut()
                        .remove(&snapshot.id)
                        .unwrap_or_else(|| {
                            fatal(TxRecError::UnknownTimedHandle {
                                recorder: self.name.clone(),
                                id: snapshot.id,
                            })
                        });
                    let status = snapshot.record.response_status.as_str();
                    handle.end(at, Some(AttrValue::from(status)));
                }
                other => fatal(TxRecError::UnsupportedPhase {
                    phase: other.to_string(),
                    context: "the blocking timed view".to_string(),
                }),
            }
        }
        self.pool.borrow_mut().release(snapshot.record);
    }

    fn nbtx_cb(&self, at: SimTime, snapshot: TimedSnapshot<P::Phase>) {
        let id = snapshot.id;
        if let Some(timed) = self.streams.get().and_then(|s| s.timed.as_ref()) {
            match snapshot.phase.kind() {
                Some(PhaseKind::BeginReq) => {
                    let handle = timed.request.begin(at, None);
                    handle.add_relation(Relation::ParentChild, snapshot.parent);
                    handle.record_attribute(TRANS, snapshot.record.to_attr());
                    let stale = self.nbtx_req_handles.borrow_mut().insert(id, handle);
                    if let Some(stale) = stale {
                        trace!(recorder = %self.name, id, "closing request replaced by a new BEGIN_REQ");
                        stale.end(at, None);
                    }
                }
                Some(PhaseKind::EndReq) => {
                    let handle = self
                        .nbtx_req_handles
                        .borrow_mut()
                        .remove(&id)
                        .unwrap_or_else(|| {
                            fatal(TxRecError::MissingOpenRequest {
                                recorder: self.name.clone(),
                                id,
                            })
                        });
                    self.nbtx_last_req.borrow_mut().insert(id, handle.id());
                    handle.end(at, None);
                }
                Some(PhaseKind::BeginResp) => {
                    let open = self.nbtx_req_handles.borrow_mut().remove(&id);
                    if let Some(request) = open {
                        self.nbtx_last_req.borrow_mut().insert(id, request.id());
                        request.end(at, None);
                    }
                    let handle = timed.response.begin(at, None);
                    handle.add_relation(Relation::ParentChild, snapshot.parent);
                    handle.record_attribute(TRANS, snapshot.record.to_attr());
                    let predecessor = self.nbtx_last_req.borrow_mut().remove(&id);
                    if let Some(predecessor) = predecessor {
                        handle.add_relation(Relation::PredecessorSuccessor, predecessor);
                    }
                    self.nbtx_req_handles.borrow_mut().insert(id, handle);
                }
                Some(PhaseKind::EndResp) => {
                    let open = self.nbtx_req_handles.borrow_mut().remove(&id);
                    if let Some(handle) = open {
                        handle.end(at, None);
                    }
                }
                None => {
                    trace!(recorder = %self.name, phase = %snapshot.phase, "phase not modelled by the timed view");
                }
            }
        }
        self.pool.borrow_mut().release(snapshot.record);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Non-blocking helpers
    // ═══════════════════════════════════════════════════════════════════════

    fn record_nb_outcome(&self, handle: &TxHandle, trans: &P::Payload, status: SyncStatus, delay: SimTime) {
        handle.record_attribute("trans.uid", trans.uid());
        handle.record_attribute("tlm_sync", status.to_string());
        handle.record_attribute("delay[return_path]", delay);
        handle.record_attribute(TRANS, PayloadRecord::capture(trans).to_attr());
        if let Some(value) = small_data_value(trans) {
            handle.record_attribute(DATA_VALUE, value);
        }
    }
}

impl<P: Protocol> FwTransport<P> for TlmRecorder<P> {
    fn b_transport(&self, trans: &mut P::Payload, delay: &mut SimTime) {
        let Some(streams) = self.recording_streams() else {
            self.fw().b_transport(trans, delay);
            return;
        };
        let command = trans.command();
        let handle = streams.blocking[command.index()].begin(self.clock.now(), Some(AttrValue::from(*delay)));
        let parent = handle.id();
        trace!(recorder = %self.name, tx = %parent, %command, "b_transport");

        let timed = self.timed_generators(streams).is_some();
        if timed {
            self.notify_blocking(trans, parent, PhaseKind::BeginReq, *delay);
        }
        self.extension_recording.borrow().record_begin_tx(&handle, trans);
        let previous = self.link_transaction(trans, &handle, true);
        if command == Command::Write {
            if let Some(value) = small_data_value(trans) {
                handle.record_attribute(DATA_VALUE, value);
            }
        }

        self.fw().b_transport(trans, delay);

        if !self.release_link(trans) {
            if let (Some(previous), Some(link)) =
                (previous, trans.extensions_mut().get_mut::<LinkExtension>())
            {
                link.replace_current(previous);
            }
        }
        handle.record_attribute(TRANS, PayloadRecord::capture(trans).to_attr());
        if command == Command::Read {
            if let Some(value) = small_data_value(trans) {
                handle.record_attribute(DATA_VALUE, value);
            }
        }
        self.extension_recording.borrow().record_end_tx(&handle, trans);
        handle.end(self.clock.now(), Some(AttrValue::from(*delay)));

        if timed {
            self.notify_blocking(trans, parent, PhaseKind::EndResp, *delay);
        }
    }

    fn nb_transport_fw(&self, trans: &mut P::Payload, phase: &mut P::Phase, delay: &mut SimTime) -> SyncStatus {
        let Some(streams) = self.recording_streams() else {
            return self.fw().nb_transport_fw(trans, phase, delay);
        };
        let handle = streams.nb_fw.begin(self.clock.now(), Some(AttrValue::from(phase.to_string())));
        trace!(recorder = %self.name, tx = %handle.id(), %phase, "nb_transport_fw");
        self.link_transaction(trans, &handle, true);
        handle.record_attribute("delay", *delay);
        self.extension_recording.borrow().record_begin_tx(&handle, trans);
        let timed = self.timed_generators(streams).is_some();
        if timed {
            self.notify_nb(trans, handle.id(), phase.clone(), *delay);
        }

        let status = self.fw().nb_transport_fw(trans, phase, delay);

        self.record_nb_outcome(&handle, trans, status, *delay);
        self.extension_recording.borrow().record_end_tx(&handle, trans);
        if status == SyncStatus::Completed
            || (status == SyncStatus::Accepted && phase.is(PhaseKind::EndResp))
        {
            self.release_link(trans);
            if timed {
                // a request completed in one call closes the whole transaction
                let closing = if status == SyncStatus::Completed && phase.is(PhaseKind::BeginReq) {
                    P::Phase::from_kind(PhaseKind::EndResp)
                } else {
                    phase.clone()
                };
                self.notify_nb(trans, handle.id(), closing, *delay);
            }
        } else if timed && status == SyncStatus::Updated {
            self.notify_nb(trans, handle.id(), phase.clone(), *delay);
        }
        handle.end(self.clock.now(), Some(AttrValue::from(phase.to_string())));
        status
    }

    fn get_direct_mem_ptr(&self, trans: &mut P::Payload, dmi: &mut DmiDescriptor) -> bool {
        let Some(generators) = self.dmi_generators() else {
            return self.fw().get_direct_mem_ptr(trans, dmi);
        };
        let handle = generators
            .get
            .begin(self.clock.now(), Some(PayloadRecord::capture(trans).to_attr()));
        let granted = self.fw().get_direct_mem_ptr(trans, dmi);
        handle.end(self.clock.now(), Some(dmi_attr(dmi)));
        granted
    }

    /// Always forwarded, never recorded
    fn transport_dbg(&self, trans: &mut P::Payload) -> usize {
        self.fw().transport_dbg(trans)
    }
}

impl<P: Protocol> BwTransport<P> for TlmRecorder<P> {
    fn nb_transport_bw(&self, trans: &mut P::Payload, phase: &mut P::Phase, delay: &mut SimTime) -> SyncStatus {
        let Some(streams) = self.recording_streams() else {
            return self.bw().nb_transport_bw(trans, phase, delay);
        };
        let handle = streams.nb_bw.begin(self.clock.now(), Some(AttrValue::from(phase.to_string())));
        trace!(recorder = %self.name, tx = %handle.id(), %phase, "nb_transport_bw");
        // the backward path never creates a link
        self.link_transaction(trans, &handle, false);
        handle.record_attribute("delay", *delay);
        self.extension_recording.borrow().record_begin_tx(&handle, trans);
        let timed = self.timed_generators(streams).is_some();
        if timed {
            self.notify_nb(trans, handle.id(), phase.clone(), *delay);
        }

        let status = self.bw().nb_transport_bw(trans, phase, delay);

        self.record_nb_outcome(&handle, trans, status, *delay);
        self.extension_recording.borrow().record_end_tx(&handle, trans);
        let parent = handle.id();
        handle.end(self.clock.now(), Some(AttrValue::from(phase.to_string())));

        if status == SyncStatus::Completed
            || (status == SyncStatus::Updated && phase.is(PhaseKind::EndResp))
        {
            self.release_link(trans);
            if timed {
                let closing = if status == SyncStatus::Completed && phase.is(PhaseKind::BeginResp) {
                    P::Phase::from_kind(PhaseKind::EndResp)
                } else {
                    phase.clone()
                };
                self.notify_nb(trans, parent, closing, *delay);
            }
        }
        status
    }

    fn invalidate_direct_mem_ptr(&self, start_address: u64, end_address: u64) {
        let Some(generators) = self.dmi_generators() else {
            self.bw().invalidate_direct_mem_ptr(start_address, end_address);
            return;
        };
        let handle = generators
            .invalidate
            .begin(self.clock.now(), Some(AttrValue::from(start_address)));
        self.bw().invalidate_direct_mem_ptr(start_address, end_address);
        handle.end(self.clock.now(), Some(AttrValue::from(end_address)));
    }
}

impl<P: Protocol> Drop for TlmRecorder<P> {
    fn drop(&mut self) {
        let open = self.open_timed_transactions();
        let pending = self.pending_timed_events();
        if open > 0 || pending > 0 {
            debug!(recorder = %self.name, open, pending, "recorder dropped with timed records outstanding");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::MemoryTxDb;
    use crate::time::ManualClock;
    use crate::transport::mock::{MemoryTarget, ScriptedInitiator};
    use crate::transport::{BaseProtocol, GenericPayload, Phase};

    fn recorder(config: RecorderConfig) -> (Rc<TlmRecorder<BaseProtocol>>, Rc<MemoryTxDb>, Rc<ManualClock>) {
        let db = Rc::new(MemoryTxDb::new());
        let clock = Rc::new(ManualClock::new());
        let recorder = Rc::new(
            TlmRecorder::new(config, Some(TxDb::new(db.clone())), clock.clone()).unwrap(),
        );
        recorder.bind_fw(Rc::new(MemoryTarget::new(64))).unwrap();
        (recorder, db, clock)
    }

    #[test]
    fn test_streams_follow_flags_at_first_use() {
        let (rec, db, _) = recorder(RecorderConfig::new("r0").with_dmi_tracing(true));
        rec.initialize_streams().unwrap();
        rec.initialize_streams().unwrap();

        assert_eq!(
            db.stream_names(),
            vec!["r0_bl", "r0_bl_timed", "r0_nb", "r0_nb_timed", "r0_dmi"]
        );
        assert_eq!(db.stream("r0_bl").unwrap().kind, "[TLM][base-protocol][b]");
        assert_eq!(db.stream("r0_nb_timed").unwrap().kind, "[TLM][base-protocol][nb][timed]");
        assert_eq!(db.generators("r0_bl").len(), 3);
        assert_eq!(rec.stream_names().len(), 5);
    }

    #[test]
    fn test_untimed_recorder_has_no_timed_streams() {
        let (rec, db, _) = recorder(RecorderConfig::new("r1").with_timed_tracing(false));
        let mut trans = GenericPayload::read(0, 4);
        let mut delay = SimTime::from_ns(3);
        rec.b_transport(&mut trans, &mut delay);

        assert_eq!(db.stream_names(), vec!["r1_bl", "r1_nb"]);
        assert_eq!(rec.pending_timed_events(), 0);
        assert_eq!(rec.pool_stats().allocated, 0);
    }

    #[test]
    fn test_no_database_forwards_and_reports() {
        let clock = Rc::new(ManualClock::new());
        let rec = TlmRecorder::<BaseProtocol>::new(RecorderConfig::new("bare"), None, clock).unwrap();
        let target = Rc::new(MemoryTarget::new(16));
        rec.bind_fw(target.clone()).unwrap();

        assert!(!rec.is_recording_enabled());
        let err = rec.initialize_streams().unwrap_err();
        assert_eq!(err.error_code(), "NO_DATABASE");

        let mut trans = GenericPayload::write(0, &[5]);
        let mut delay = SimTime::ZERO;
        rec.b_transport(&mut trans, &mut delay);
        assert_eq!(target.peek(0, 1), vec![5]);
        assert!(!trans.extensions().contains::<LinkExtension>());
    }

    #[test]
    fn test_double_binding_is_rejected() {
        let (rec, _, _) = recorder(RecorderConfig::new("r2"));
        let err = rec.bind_fw(Rc::new(MemoryTarget::new(1))).unwrap_err();
        assert_eq!(err.error_code(), "PORT_ALREADY_BOUND");

        let initiator = Rc::new(ScriptedInitiator::new());
        rec.bind_bw(&initiator).unwrap();
        assert!(rec.bind_bw(&initiator).is_err());
    }

    #[test]
    #[should_panic(expected = "no bound backward port")]
    fn test_unbound_backward_port_is_fatal() {
        let (rec, _, _) = recorder(RecorderConfig::new("r3").with_tracing(false));
        let mut trans = GenericPayload::read(0, 1);
        let mut phase = Phase::BeginResp;
        let mut delay = SimTime::ZERO;
        rec.nb_transport_bw(&mut trans, &mut phase, &mut delay);
    }

    #[test]
    #[should_panic(expected = "without its begin phase")]
    fn test_blocking_end_without_begin_is_fatal() {
        let (rec, _, _) = recorder(RecorderConfig::new("r4"));
        rec.initialize_streams().unwrap();
        let trans = GenericPayload::read(0, 1);
        rec.notify_blocking(&trans, TxId(99), PhaseKind::EndResp, SimTime::ZERO);
        rec.process_timed_events();
    }

    #[test]
    #[should_panic(expected = "not supported by the blocking timed view")]
    fn test_blocking_timed_view_rejects_request_phases() {
        let (rec, _, _) = recorder(RecorderConfig::new("r5"));
        rec.initialize_streams().unwrap();
        let trans = GenericPayload::read(0, 1);
        rec.notify_blocking(&trans, TxId(1), PhaseKind::EndReq, SimTime::ZERO);
        rec.process_timed_events();
    }

    #[test]
    #[should_panic(expected = "without an open request")]
    fn test_end_req_without_open_request_is_fatal() {
        let (rec, _, _) = recorder(RecorderConfig::new("r6"));
        rec.initialize_streams().unwrap();
        let trans = GenericPayload::read(0, 1);
        rec.notify_nb(&trans, TxId(1), Phase::EndReq, SimTime::ZERO);
        rec.process_timed_events();
    }

    #[test]
    fn test_custom_phases_are_ignored_by_timed_view() {
        let (rec, db, _) = recorder(RecorderConfig::new("r7"));
        rec.initialize_streams().unwrap();
        let trans = GenericPayload::read(0, 1);
        rec.notify_nb(&trans, TxId(1), Phase::Custom("BEGIN_PARTIAL".to_string()), SimTime::ZERO);

        assert_eq!(rec.process_timed_events(), 1);
        assert!(db.stream_transactions("r7_nb_timed").is_empty());
        assert_eq!(rec.pool_stats().in_use, 0);
    }

    #[test]
    fn test_small_data_value_helper() {
        let short = GenericPayload::write(0, &[1, 0, 0, 0, 0, 0, 0]);
        let long = GenericPayload::write(0, &[1; 8]);
        assert_eq!(small_data_value(&short), Some(1));
        assert_eq!(small_data_value(&long), None);
    }
}

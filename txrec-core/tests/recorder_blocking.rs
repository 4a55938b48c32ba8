//! Blocking transport through one or more recorders
//!
//! Covers the untimed and timed blocking views, the inline data value,
//! extension recording hooks and causal links across chained recorders.

use std::cell::RefCell;
use std::rc::Rc;

use txrec_core::recording::TransactionRecord;
use txrec_core::transport::mock::{MemoryTarget, TransportCall};
use txrec_core::{
    AttrValue, BaseProtocol, DmiDescriptor, ExtensionRecording, FwTransport, GenericPayload,
    LinkExtension, ManualClock, MemoryTxDb, Phase, RecorderConfig, Relation, SimTime,
    SyncStatus, TlmRecorder, TransactionPayload, TxDb, TxHandle, TxId,
};

struct Bench {
    db: Rc<MemoryTxDb>,
    clock: Rc<ManualClock>,
    target: Rc<MemoryTarget>,
    recorder: Rc<TlmRecorder<BaseProtocol>>,
}

fn bench(config: RecorderConfig) -> Bench {
    let db = Rc::new(MemoryTxDb::new());
    let clock = Rc::new(ManualClock::new());
    let target = Rc::new(MemoryTarget::new(256));
    let recorder = Rc::new(
        TlmRecorder::new(config, Some(TxDb::new(db.clone())), clock.clone())
            .expect("valid recorder config"),
    );
    recorder.bind_fw(target.clone()).expect("first binding");
    Bench {
        db,
        clock,
        target,
        recorder,
    }
}

fn only(records: Vec<TransactionRecord>) -> TransactionRecord {
    assert_eq!(records.len(), 1, "expected exactly one record: {:?}", records);
    records.into_iter().next().expect("one record")
}

#[test]
fn blocking_read_with_timed_view() {
    let b = bench(RecorderConfig::new("cpu"));
    b.target.poke(0x20, &[0x01, 0x02, 0x03, 0x04]);

    let mut trans = GenericPayload::read(0x20, 4);
    let mut delay = SimTime::from_ns(10);
    b.recorder.b_transport(&mut trans, &mut delay);

    let bl = only(b.db.transactions_of("cpu_bl", "read"));
    assert!(!bl.is_open());
    assert_eq!(bl.begin_value, Some(AttrValue::Time(SimTime::from_ns(10))));
    assert_eq!(bl.end_value, Some(AttrValue::Time(SimTime::from_ns(10))));
    assert_eq!(bl.attribute("trans.data_value"), Some(&AttrValue::Unsigned(0x0403_0201)));
    let snapshot = bl.attribute("trans").expect("payload snapshot");
    assert_eq!(
        snapshot.field("response_status").and_then(AttrValue::as_str),
        Some("TLM_OK_RESPONSE")
    );
    assert_eq!(snapshot.field("address").and_then(AttrValue::as_u64), Some(0x20));

    // nothing on the timed view until the delay has elapsed
    assert!(b.db.stream_transactions("cpu_bl_timed").is_empty());
    assert_eq!(b.recorder.pending_timed_events(), 2);
    assert_eq!(b.recorder.next_timed_event(), Some(SimTime::from_ns(10)));
    assert_eq!(b.recorder.process_timed_events(), 0);

    b.clock.advance(SimTime::from_ns(10));
    assert_eq!(b.recorder.process_timed_events(), 2);

    let timed = only(b.db.transactions_of("cpu_bl_timed", "read"));
    assert_eq!(timed.begin_time, SimTime::from_ns(10));
    assert_eq!(timed.end_time, Some(SimTime::from_ns(10)));
    assert_eq!(timed.begin_value, Some(AttrValue::from("read")));
    assert_eq!(timed.end_value, Some(AttrValue::from("TLM_OK_RESPONSE")));
    assert!(timed.attribute("trans").is_some());
    assert!(b
        .db
        .relations_from(timed.id)
        .iter()
        .any(|r| r.relation == Relation::ParentChild && r.to == bl.id));

    assert_eq!(b.recorder.pending_timed_events(), 0);
    assert_eq!(b.recorder.open_timed_transactions(), 0);
    assert_eq!(b.recorder.pool_stats().in_use, 0);
    assert!(b.db.open_transactions().is_empty());
}

#[test]
fn timed_view_follows_annotated_delay_order() {
    let b = bench(RecorderConfig::new("order"));

    let mut slow = GenericPayload::read(0, 1);
    let mut slow_delay = SimTime::from_ns(20);
    b.recorder.b_transport(&mut slow, &mut slow_delay);

    let mut fast = GenericPayload::write(4, &[7]);
    let mut fast_delay = SimTime::from_ns(5);
    b.recorder.b_transport(&mut fast, &mut fast_delay);

    assert_eq!(b.recorder.next_timed_event(), Some(SimTime::from_ns(5)));
    b.clock.set(SimTime::from_ns(5));
    assert_eq!(b.recorder.process_timed_events(), 2);
    assert_eq!(b.db.transactions_of("order_bl_timed", "write").len(), 1);
    assert!(b.db.transactions_of("order_bl_timed", "read").is_empty());

    b.clock.set(SimTime::from_ns(20));
    assert_eq!(b.recorder.process_timed_events(), 2);
    let read = only(b.db.transactions_of("order_bl_timed", "read"));
    assert_eq!(read.begin_time, SimTime::from_ns(20));
}

#[test]
fn late_delivery_keeps_the_annotated_times() {
    let b = bench(RecorderConfig::new("late"));

    for (addr, ns) in [(0u64, 5u64), (8, 10)] {
        let mut trans = GenericPayload::read(addr, 4);
        let mut delay = SimTime::from_ns(ns);
        b.recorder.b_transport(&mut trans, &mut delay);
    }

    // one pump well after both snapshots fell due
    b.clock.set(SimTime::from_ns(20));
    assert_eq!(b.recorder.process_timed_events(), 4);

    let timed = b.db.transactions_of("late_bl_timed", "read");
    let begins: Vec<SimTime> = timed.iter().map(|t| t.begin_time).collect();
    let ends: Vec<Option<SimTime>> = timed.iter().map(|t| t.end_time).collect();
    assert_eq!(begins, vec![SimTime::from_ns(5), SimTime::from_ns(10)]);
    assert_eq!(ends, vec![Some(SimTime::from_ns(5)), Some(SimTime::from_ns(10))]);
}

#[test]
fn target_latency_moves_the_timed_end() {
    let db = Rc::new(MemoryTxDb::new());
    let clock = Rc::new(ManualClock::new());
    let recorder = TlmRecorder::<BaseProtocol>::new(
        RecorderConfig::new("lat"),
        Some(TxDb::new(db.clone())),
        clock.clone(),
    )
    .unwrap();
    recorder
        .bind_fw(Rc::new(MemoryTarget::new(16).with_latency(SimTime::from_ns(3))))
        .unwrap();

    let mut trans = GenericPayload::read(0, 2);
    let mut delay = SimTime::from_ns(2);
    recorder.b_transport(&mut trans, &mut delay);
    assert_eq!(delay, SimTime::from_ns(5));

    let bl = only(db.transactions_of("lat_bl", "read"));
    assert_eq!(bl.begin_value, Some(AttrValue::Time(SimTime::from_ns(2))));
    assert_eq!(bl.end_value, Some(AttrValue::Time(SimTime::from_ns(5))));

    clock.set(SimTime::from_ns(2));
    assert_eq!(recorder.process_timed_events(), 1);
    assert_eq!(recorder.open_timed_transactions(), 1);
    clock.set(SimTime::from_ns(5));
    assert_eq!(recorder.process_timed_events(), 1);

    let timed = only(db.transactions_of("lat_bl_timed", "read"));
    assert_eq!(timed.begin_time, SimTime::from_ns(2));
    assert_eq!(timed.end_time, Some(SimTime::from_ns(5)));
}

#[test]
fn inline_data_value_stops_at_eight_bytes() {
    let b = bench(RecorderConfig::new("dv").with_timed_tracing(false));

    let mut seven = GenericPayload::write(0, &[1, 0, 0, 0, 0, 0, 0x80]);
    let mut delay = SimTime::ZERO;
    b.recorder.b_transport(&mut seven, &mut delay);

    let mut eight = GenericPayload::write(8, &[1; 8]);
    b.recorder.b_transport(&mut eight, &mut delay);

    let writes = b.db.transactions_of("dv_bl", "write");
    assert_eq!(writes.len(), 2);
    assert_eq!(
        writes[0].attribute("trans.data_value"),
        Some(&AttrValue::Unsigned(0x0080_0000_0000_0001))
    );
    assert!(writes[1].attribute("trans.data_value").is_none());
    assert_eq!(b.target.peek(8, 8), vec![1; 8]);
}

#[test]
fn disabled_recorder_is_transparent() {
    let b = bench(RecorderConfig::new("off").with_tracing(false));
    let direct = MemoryTarget::new(256);

    for (i, addr) in [0u64, 16, 300].into_iter().enumerate() {
        let mut via_recorder = GenericPayload::write(addr, &[i as u8; 4]);
        let mut via_direct = GenericPayload::write(addr, &[i as u8; 4]);
        let mut d1 = SimTime::from_ns(i as u64);
        let mut d2 = SimTime::from_ns(i as u64);
        b.recorder.b_transport(&mut via_recorder, &mut d1);
        direct.b_transport(&mut via_direct, &mut d2);

        assert_eq!(via_recorder.response_status(), via_direct.response_status());
        assert_eq!(d1, d2);
        assert!(!via_recorder.extensions().contains::<LinkExtension>());
    }

    let mut dbg = GenericPayload::read(0, 4);
    assert_eq!(b.recorder.transport_dbg(&mut dbg), 4);
    let mut dmi = DmiDescriptor::default();
    assert!(!b.recorder.get_direct_mem_ptr(&mut GenericPayload::read(0, 1), &mut dmi));
    let mut phase = Phase::BeginReq;
    let mut delay = SimTime::ZERO;
    assert_eq!(
        b.recorder.nb_transport_fw(&mut GenericPayload::read(0, 1), &mut phase, &mut delay),
        SyncStatus::Completed
    );

    assert_eq!(b.db.transaction_count(), 0);
    assert!(b.db.stream_names().is_empty());
    assert_eq!(&b.target.calls()[..3], direct.calls().as_slice());
    assert_eq!(b.recorder.pending_timed_events(), 0);
}

struct TagRecorder {
    seen: Rc<RefCell<Vec<&'static str>>>,
}

impl ExtensionRecording<BaseProtocol> for TagRecorder {
    fn record_begin_tx(&self, handle: &TxHandle, trans: &GenericPayload) {
        handle.record_attribute("ext.begin_status", trans.response_status().as_str());
        self.seen.borrow_mut().push("begin");
    }

    fn record_end_tx(&self, handle: &TxHandle, trans: &GenericPayload) {
        handle.record_attribute("ext.end_status", trans.response_status().as_str());
        self.seen.borrow_mut().push("end");
    }
}

#[test]
fn extension_hooks_wrap_the_forwarded_call() {
    let b = bench(RecorderConfig::new("hooked").with_timed_tracing(false));
    let seen = Rc::new(RefCell::new(Vec::new()));
    b.recorder
        .register_extension_recording(Box::new(TagRecorder { seen: seen.clone() }));

    let mut trans = GenericPayload::read(0, 4);
    let mut delay = SimTime::ZERO;
    b.recorder.b_transport(&mut trans, &mut delay);

    let bl = only(b.db.transactions_of("hooked_bl", "read"));
    assert_eq!(
        bl.attribute("ext.begin_status"),
        Some(&AttrValue::from("TLM_INCOMPLETE_RESPONSE"))
    );
    assert_eq!(bl.attribute("ext.end_status"), Some(&AttrValue::from("TLM_OK_RESPONSE")));
    assert_eq!(*seen.borrow(), vec!["begin", "end"]);
}

/// Reports the link handle it sees on the way down and on the way back up
struct LinkSpy {
    next: Rc<dyn FwTransport<BaseProtocol>>,
    seen: RefCell<Vec<Option<TxId>>>,
}

impl LinkSpy {
    fn current(trans: &GenericPayload) -> Option<TxId> {
        trans.extensions().get::<LinkExtension>().map(LinkExtension::current)
    }
}

impl FwTransport<BaseProtocol> for LinkSpy {
    fn b_transport(&self, trans: &mut GenericPayload, delay: &mut SimTime) {
        self.seen.borrow_mut().push(Self::current(trans));
        self.next.b_transport(trans, delay);
        self.seen.borrow_mut().push(Self::current(trans));
    }

    fn nb_transport_fw(
        &self,
        trans: &mut GenericPayload,
        phase: &mut Phase,
        delay: &mut SimTime,
    ) -> SyncStatus {
        self.next.nb_transport_fw(trans, phase, delay)
    }

    fn get_direct_mem_ptr(&self, trans: &mut GenericPayload, dmi: &mut DmiDescriptor) -> bool {
        self.next.get_direct_mem_ptr(trans, dmi)
    }

    fn transport_dbg(&self, trans: &mut GenericPayload) -> usize {
        self.next.transport_dbg(trans)
    }
}

#[test]
fn chained_recorders_link_and_restore() {
    let db = Rc::new(MemoryTxDb::new());
    let clock = Rc::new(ManualClock::new());
    let make = |name: &str| {
        Rc::new(
            TlmRecorder::<BaseProtocol>::new(
                RecorderConfig::new(name).with_timed_tracing(false),
                Some(TxDb::new(db.clone())),
                clock.clone(),
            )
            .unwrap(),
        )
    };
    let outer = make("outer");
    let inner = make("inner");
    let target = Rc::new(MemoryTarget::new(64));

    let spy_below_inner = Rc::new(LinkSpy {
        next: target.clone(),
        seen: RefCell::new(Vec::new()),
    });
    inner.bind_fw(spy_below_inner.clone()).unwrap();
    let spy_between = Rc::new(LinkSpy {
        next: inner.clone(),
        seen: RefCell::new(Vec::new()),
    });
    outer.bind_fw(spy_between.clone()).unwrap();

    let mut trans = GenericPayload::write(0, &[1, 2]);
    let mut delay = SimTime::ZERO;
    outer.b_transport(&mut trans, &mut delay);

    let outer_tx = only(db.transactions_of("outer_bl", "write")).id;
    let inner_tx = only(db.transactions_of("inner_bl", "write")).id;

    // inner is the successor of outer
    assert!(db.relations_from(inner_tx).iter().any(|r| {
        r.relation == Relation::PredecessorSuccessor && r.to == outer_tx
    }));
    assert!(db.relations_from(outer_tx).is_empty());

    // below inner the link points at inner; once inner returns it points at outer again
    assert_eq!(*spy_below_inner.seen.borrow(), vec![Some(inner_tx), Some(inner_tx)]);
    assert_eq!(*spy_between.seen.borrow(), vec![Some(outer_tx), Some(outer_tx)]);

    // the creator detached it
    assert!(!trans.extensions().contains::<LinkExtension>());
    assert_eq!(target.peek(0, 2), vec![1, 2]);
    assert!(matches!(
        target.calls()[0],
        TransportCall::Blocking { address: 0, .. }
    ));
}

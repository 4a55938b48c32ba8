//! Type dispatch and hierarchy descent of the tracer
//!
//! Widths are checked against the exact type the registry resolves, since
//! a width-only check would also pass if a neighbouring width matched.

use std::rc::Rc;

use txrec_core::tracer::{
    kind, InPort, ManyWriters, MemoryTraceFile, Module, ObjectVector, OutPort, Probe, Signal,
    SignalInterface, SimObject, TraceFile, UncheckedWriters, ValueObject, Variable,
};
use txrec_core::values::{BigInt, BigUInt, Bit, BitVector, Int, Logic, LogicVector, UInt};
use txrec_core::{
    SimTime, SimValue, TraceKind, TraceKinds, TraceValue, Tracer, TracerConfig, TypeRegistry,
};

fn tracer(file: &Rc<MemoryTraceFile>, config: TracerConfig) -> Tracer {
    Tracer::new(config, Some(file.clone())).expect("valid tracer config")
}

macro_rules! assert_exact_widths {
    ($registry:expr, $family:ident :: $ctor:ident $args:tt ; $($w:literal)*) => {
        $({
            let name = format!("top.{}_{}", stringify!($family), $w);
            let object: Rc<dyn SimObject> =
                Rc::new(Signal::<$family<$w>>::new(name.clone(), $family::<$w>::$ctor $args));
            let expected = format!("{}<{}>", stringify!($family), $w);
            assert_eq!(
                $registry
                    .matched_type(object.as_ref(), TraceKinds::ALL)
                    .map(|candidate| candidate.type_name().to_string()),
                Some(expected)
            );

            let file = MemoryTraceFile::new();
            assert!($registry.try_trace(&file, &object, TraceKinds::ALL));
            assert_eq!(file.width_of(&name), Some($w));
        })*
    };
}

#[test]
fn narrow_integers_resolve_to_their_exact_width() {
    let registry = TypeRegistry::standard();
    assert_exact_widths!(registry, UInt::new(1);
        1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16 17 18 19 20 21 22 23 24 25 26 27 28 29 30 31 32
        33 34 35 36 37 38 39 40 41 42 43 44 45 46 47 48 49 50 51 52 53 54 55 56 57 58 59 60 61
        62 63 64);
    assert_exact_widths!(registry, Int::new(-1); 1 2 7 8 31 32 33 63 64);
}

#[test]
fn wide_vectors_resolve_at_every_boundary() {
    let registry = TypeRegistry::standard();
    assert_exact_widths!(registry, BigUInt::zero(); 1 64 65 127 128 136 1016 1024);
    assert_exact_widths!(registry, BigInt::zero(); 1 65 128 136 512 1024);
    assert_exact_widths!(registry, BitVector::zero(); 1 96 128 144 1024);
    assert_exact_widths!(registry, LogicVector::new(); 1 64 65 128 136 1000 1024);
}

#[test]
fn widths_between_the_step_are_not_recognized() {
    let registry = TypeRegistry::standard();
    let file = MemoryTraceFile::new();
    let odd: Rc<dyn SimObject> = Rc::new(Variable::new("top.odd", BigUInt::<129>::zero()));
    let huge: Rc<dyn SimObject> = Rc::new(Variable::new("top.huge", LogicVector::<1032>::new()));

    assert!(!registry.try_trace(&file, &odd, TraceKinds::ALL));
    assert!(!registry.try_trace(&file, &huge, TraceKinds::ALL));
    assert!(file.is_empty());
}

#[test]
fn scalars_dispatch_in_every_shape() {
    let registry = TypeRegistry::standard();
    let file = MemoryTraceFile::new();
    let objects: Vec<Rc<dyn SimObject>> = vec![
        Rc::new(Signal::<bool>::new("top.en", true)),
        Rc::new(Signal::<u16, ManyWriters>::new("top.count", 3)),
        Rc::new(Signal::<i64, UncheckedWriters>::new("top.offset", -4)),
        Rc::new(Variable::new("top.ratio", 0.5f64)),
        Rc::new(Variable::new("top.when", SimTime::from_ns(3))),
        Rc::new(ValueObject::new("top.stamp", SimTime::from_ns(1))),
        Rc::new(ValueObject::new("top.flag", Bit(false))),
        Rc::new(Signal::<Logic>::new("top.line", Logic::Z)),
    ];
    for object in &objects {
        assert!(registry.try_trace(&file, object, TraceKinds::ALL), "{}", object.name());
    }
    assert_eq!(file.width_of("top.en"), Some(1));
    assert_eq!(file.width_of("top.count"), Some(16));
    assert_eq!(file.width_of("top.offset"), Some(64));
    assert_eq!(file.width_of("top.when"), Some(64));
    assert_eq!(file.width_of("top.line"), Some(1));

    file.sample(SimTime::ZERO);
    assert_eq!(file.changes_of("top.offset")[0].value, TraceValue::Signed(-4));
    assert_eq!(file.changes_of("top.ratio")[0].value, TraceValue::Real(0.5));
}

#[test]
fn kinds_mask_selects_shapes() {
    let file = Rc::new(MemoryTraceFile::new());
    let config = TracerConfig::default()
        .with_kinds(&[TraceKind::Ports])
        .with_trace_all_modules(true);
    let tracer = tracer(&file, config);
    assert_eq!(tracer.kinds(), TraceKinds::PORTS);

    let sig = Rc::new(Signal::<u8>::new("top.data", 0));
    let port = Rc::new(InPort::<u8>::new("top.sink.data_in"));
    port.bind(sig.clone()).unwrap();

    let top = Rc::new(Module::new("top"));
    top.add_child(sig.clone());
    top.add_child(port.clone());
    top.add_child(Rc::new(Variable::new("top.v", 1u32)));
    tracer.trace_hierarchy(&[top as Rc<dyn SimObject>]);

    assert_eq!(file.names(), vec!["top.sink.data_in"]);
}

#[test]
fn unbound_port_is_registered_but_yields_no_value() {
    let registry = TypeRegistry::standard();
    let file = MemoryTraceFile::new();
    let port = Rc::new(OutPort::<UInt<4>>::new("top.q"));
    let object: Rc<dyn SimObject> = port.clone();

    assert!(registry.try_trace(&file, &object, TraceKinds::PORTS));
    assert_eq!(file.sample(SimTime::ZERO), 0);

    let sig: Rc<dyn SignalInterface<UInt<4>>> = Rc::new(Signal::<UInt<4>>::new("top.q_sig", UInt::new(9)));
    port.bind(sig).unwrap();
    assert_eq!(file.sample(SimTime::from_ns(1)), 1);
    assert_eq!(file.changes_of("top.q")[0].value, TraceValue::Unsigned(9));
}

fn sample_valid(object: &dyn SimObject) -> Option<TraceValue> {
    object
        .as_any()
        .downcast_ref::<Signal<bool>>()
        .map(|signal| signal.read().trace_value())
}

#[test]
fn tlm_signal_is_traced_as_a_whole() {
    let valid = Rc::new(Signal::<bool>::new("top.bus.valid", true));
    let hooked = valid.clone();
    let bus = Rc::new(
        Module::with_kind("top.bus", kind::TLM_SIGNAL).with_trace(move |_, trace_file| {
            trace_file.register_value("top.bus.valid", 1, Probe::new(hooked.clone(), sample_valid));
        }),
    );
    bus.add_child(valid.clone());
    bus.add_child(Rc::new(Signal::<u8>::new("top.bus.payload", 0)));

    let file = Rc::new(MemoryTraceFile::new());
    tracer(&file, TracerConfig::default()).trace_hierarchy(&[bus as Rc<dyn SimObject>]);

    // the hook ran, the children were not visited
    assert_eq!(file.names(), vec!["top.bus.valid"]);
    file.sample(SimTime::ZERO);
    assert_eq!(file.changes_of("top.bus.valid")[0].value, TraceValue::Bool(true));
}

#[test]
fn vectors_are_transparent_containers() {
    let lanes = Rc::new(ObjectVector::generate("top.lane", 3, |name| {
        Rc::new(Signal::<u8>::new(name, 0)) as Rc<dyn SimObject>
    }));
    assert_eq!(lanes.len(), 3);

    let file = Rc::new(MemoryTraceFile::new());
    tracer(&file, TracerConfig::default()).trace_hierarchy(&[lanes as Rc<dyn SimObject>]);
    assert_eq!(file.names(), vec!["top.lane_0", "top.lane_1", "top.lane_2"]);
}

#[test]
fn module_recursion_follows_traceability_and_policy() {
    let build = || {
        let top = Rc::new(Module::new("top").with_trace(|_, _| {}));
        top.add_child(Rc::new(Signal::<bool>::new("top.clk", false)));
        let sub = Rc::new(Module::new("top.sub"));
        sub.add_child(Rc::new(Variable::new("top.sub.state", UInt::<3>::new(2))));
        sub.add_child(Rc::new(ObjectVector::generate("top.sub.reg", 2, |name| {
            Rc::new(Variable::new(name, 0u32)) as Rc<dyn SimObject>
        })));
        top.add_child(sub);
        vec![top as Rc<dyn SimObject>]
    };

    let file = Rc::new(MemoryTraceFile::new());
    tracer(&file, TracerConfig::default()).trace_hierarchy(&build());
    assert_eq!(file.names(), vec!["top.clk"]);

    let file = Rc::new(MemoryTraceFile::new());
    let config = TracerConfig::default().with_trace_all_modules(true);
    tracer(&file, config).trace_hierarchy(&build());
    assert_eq!(
        file.names(),
        vec!["top.clk", "top.sub.state", "top.sub.reg_0", "top.sub.reg_1"]
    );
}

#[test]
fn tracer_inside_the_hierarchy_is_skipped() {
    let file = Rc::new(MemoryTraceFile::new());
    let tracer = Rc::new(tracer(&file, TracerConfig::default().with_trace_all_modules(true)));

    let top = Rc::new(Module::new("top"));
    top.add_child(tracer.clone());
    top.add_child(Rc::new(Signal::<bool>::new("top.rst", true)));
    tracer.trace_hierarchy(&[top as Rc<dyn SimObject>]);

    assert_eq!(file.names(), vec!["top.rst"]);
}

#[derive(Debug, Clone)]
struct Flags {
    ready: bool,
    error: bool,
}

impl SimValue for Flags {
    const WIDTH: usize = 2;

    fn type_name() -> String {
        "Flags".to_string()
    }

    fn trace_value(&self) -> TraceValue {
        TraceValue::Bits(format!("{}{}", u8::from(self.error), u8::from(self.ready)))
    }
}

#[test]
fn user_types_join_the_dispatch() {
    let file = Rc::new(MemoryTraceFile::new());
    let flags: Rc<dyn SimObject> = Rc::new(ValueObject::new(
        "top.flags",
        Flags {
            ready: true,
            error: false,
        },
    ));

    let mut tracer = tracer(&file, TracerConfig::default());
    assert!(!tracer.try_trace(&flags, TraceKinds::ALL));
    tracer.registry_mut().register::<Flags>().unwrap();
    assert!(tracer.try_trace(&flags, TraceKinds::ALL));
    assert!(!tracer.try_trace(&flags, TraceKinds::SIGNALS));

    file.sample(SimTime::ZERO);
    assert_eq!(file.changes_of("top.flags")[0].value, TraceValue::Bits("01".to_string()));
    assert_eq!(file.width_of("top.flags"), Some(2));
}

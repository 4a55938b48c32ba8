//! Simulation object model
//!
//! The tracer sees the design as a tree of [`SimObject`]s. Each object has a
//! hierarchical name, a kind string and children. Leaf objects hold values in
//! one of four shapes:
//!
//! | Shape | Types |
//! |---|---|
//! | ports | [`InPort`], [`OutPort`] |
//! | signals | [`Signal`] with any writer policy |
//! | variables | [`Variable`] |
//! | objects | [`ValueObject`] |

use std::any::Any;
use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::error::{Result, TxRecError};
use crate::values::{SimValue, TraceValue};

use super::file::{Probe, TraceFile};

/// Kind strings the hierarchy walk recognizes
pub mod kind {
    /// Composite signal traced as a whole, never descended into
    pub const TLM_SIGNAL: &str = "tlm_signal";
    /// Container whose children are traced, never the container itself
    pub const VECTOR: &str = "sc_vector";
    pub const MODULE: &str = "sc_module";
    pub const SIGNAL: &str = "sc_signal";
    pub const IN_PORT: &str = "sc_in";
    pub const OUT_PORT: &str = "sc_out";
    pub const VARIABLE: &str = "sc_variable";
    pub const OBJECT: &str = "sc_object";
    pub const TRACER: &str = "tracer";
}

/// A node of the simulation hierarchy
pub trait SimObject: Any {
    /// Full hierarchical name, e.g. `top.cpu.pc`
    fn name(&self) -> &str;

    fn kind(&self) -> &str;

    fn children(&self) -> Vec<Rc<dyn SimObject>> {
        Vec::new()
    }

    fn as_any(&self) -> &dyn Any;

    /// Objects that know how to trace themselves return true and override
    /// [`SimObject::trace`]
    fn is_traceable(&self) -> bool {
        false
    }

    fn trace(&self, _trace_file: &dyn TraceFile) {}
}

/// An object whose current value can be sampled
pub trait ValueSource: SimObject {
    /// `None` while no value is reachable, e.g. for an unbound port
    fn sample(&self) -> Option<TraceValue>;
}

/// Sampler for the concrete shape `S`
pub(crate) fn sample_as<S: ValueSource>(object: &dyn SimObject) -> Option<TraceValue> {
    object.as_any().downcast_ref::<S>()?.sample()
}

/// Register `object` with `trace_file` through the concrete shape `S`
pub(crate) fn register_shape<S: ValueSource>(
    trace_file: &dyn TraceFile,
    object: &Rc<dyn SimObject>,
    width: usize,
) {
    trace_file.register_value(
        object.name(),
        width,
        Probe::new(Rc::clone(object), sample_as::<S>),
    );
}

// ═══════════════════════════════════════════════════════════════════════
// Signals and ports
// ═══════════════════════════════════════════════════════════════════════

/// Write access rules of a [`Signal`]
pub trait WriterPolicy: 'static {
    const NAME: &'static str;
    /// Only the first writer may ever write
    const SINGLE_WRITER: bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OneWriter;

#[derive(Debug, Clone, Copy, Default)]
pub struct ManyWriters;

#[derive(Debug, Clone, Copy, Default)]
pub struct UncheckedWriters;

impl WriterPolicy for OneWriter {
    const NAME: &'static str = "one_writer";
    const SINGLE_WRITER: bool = true;
}

impl WriterPolicy for ManyWriters {
    const NAME: &'static str = "many_writers";
    const SINGLE_WRITER: bool = false;
}

impl WriterPolicy for UncheckedWriters {
    const NAME: &'static str = "unchecked_writers";
    const SINGLE_WRITER: bool = false;
}

/// Read side of a signal, the interface ports bind to
pub trait SignalInterface<T> {
    fn read(&self) -> T;
}

/// A value channel
pub struct Signal<T: SimValue, Pol: WriterPolicy = OneWriter> {
    name: String,
    value: RefCell<T>,
    writer: OnceCell<String>,
    _policy: PhantomData<Pol>,
}

impl<T: SimValue, Pol: WriterPolicy> fmt::Debug for Signal<T, Pol> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.name)
            .field("policy", &Pol::NAME)
            .field("value", &*self.value.borrow())
            .finish()
    }
}

impl<T: SimValue, Pol: WriterPolicy> Signal<T, Pol> {
    pub fn new(name: impl Into<String>, initial: T) -> Self {
        Self {
            name: name.into(),
            value: RefCell::new(initial),
            writer: OnceCell::new(),
            _policy: PhantomData,
        }
    }

    pub fn read(&self) -> T {
        self.value.borrow().clone()
    }

    /// Write without naming a writer
    pub fn write(&self, value: T) {
        *self.value.borrow_mut() = value;
    }

    /// Write on behalf of `writer`. Under [`OneWriter`] a second distinct
    /// writer is rejected.
    pub fn write_by(&self, writer: &str, value: T) -> Result<()> {
        if Pol::SINGLE_WRITER {
            let owner = self.writer.get_or_init(|| writer.to_string());
            if owner != writer {
                return Err(TxRecError::WriterConflict {
                    signal: self.name.clone(),
                    owner: owner.clone(),
                    writer: writer.to_string(),
                });
            }
        }
        self.write(value);
        Ok(())
    }
}

impl<T: SimValue, Pol: WriterPolicy> SignalInterface<T> for Signal<T, Pol> {
    fn read(&self) -> T {
        Signal::read(self)
    }
}

impl<T: SimValue, Pol: WriterPolicy> SimObject for Signal<T, Pol> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        kind::SIGNAL
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<T: SimValue, Pol: WriterPolicy> ValueSource for Signal<T, Pol> {
    fn sample(&self) -> Option<TraceValue> {
        Some(self.value.borrow().trace_value())
    }
}

macro_rules! port {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        pub struct $name<T: SimValue> {
            name: String,
            bound: OnceCell<Rc<dyn SignalInterface<T>>>,
        }

        impl<T: SimValue> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("name", &self.name)
                    .field("bound", &self.bound.get().is_some())
                    .finish()
            }
        }

        impl<T: SimValue> $name<T> {
            pub fn new(name: impl Into<String>) -> Self {
                Self {
                    name: name.into(),
                    bound: OnceCell::new(),
                }
            }

            pub fn bind(&self, signal: Rc<dyn SignalInterface<T>>) -> Result<()> {
                self.bound.set(signal).map_err(|_| TxRecError::PortAlreadyBound {
                    port: self.name.clone(),
                })
            }

            pub fn is_bound(&self) -> bool {
                self.bound.get().is_some()
            }

            pub fn read(&self) -> Option<T> {
                self.bound.get().map(|signal| signal.read())
            }
        }

        impl<T: SimValue> SimObject for $name<T> {
            fn name(&self) -> &str {
                &self.name
            }

            fn kind(&self) -> &str {
                $kind
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }

        impl<T: SimValue> ValueSource for $name<T> {
            fn sample(&self) -> Option<TraceValue> {
                self.read().map(|value| value.trace_value())
            }
        }
    };
}

port!(
    /// Input port, reads the signal it is bound to
    InPort, kind::IN_PORT
);
port!(
    /// Output port, observed through the signal it is bound to
    OutPort, kind::OUT_PORT
);

// ═══════════════════════════════════════════════════════════════════════
// Variables and value objects
// ═══════════════════════════════════════════════════════════════════════

/// A named plain value, not a channel
#[derive(Debug)]
pub struct Variable<T: SimValue> {
    name: String,
    value: RefCell<T>,
}

impl<T: SimValue> Variable<T> {
    pub fn new(name: impl Into<String>, value: T) -> Self {
        Self {
            name: name.into(),
            value: RefCell::new(value),
        }
    }

    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    pub fn set(&self, value: T) {
        *self.value.borrow_mut() = value;
    }
}

impl<T: SimValue> SimObject for Variable<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        kind::VARIABLE
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<T: SimValue> ValueSource for Variable<T> {
    fn sample(&self) -> Option<TraceValue> {
        Some(self.value.borrow().trace_value())
    }
}

/// A value that is itself a hierarchy object
///
/// Only class-like values ([`SimValue::IS_CLASS`]) are matched in this
/// shape; a primitive scalar never stands alone in the hierarchy.
#[derive(Debug)]
pub struct ValueObject<T: SimValue> {
    name: String,
    value: RefCell<T>,
}

impl<T: SimValue> ValueObject<T> {
    pub fn new(name: impl Into<String>, value: T) -> Self {
        Self {
            name: name.into(),
            value: RefCell::new(value),
        }
    }

    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    pub fn set(&self, value: T) {
        *self.value.borrow_mut() = value;
    }
}

impl<T: SimValue> SimObject for ValueObject<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        kind::OBJECT
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<T: SimValue> ValueSource for ValueObject<T> {
    fn sample(&self) -> Option<TraceValue> {
        Some(self.value.borrow().trace_value())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Containers
// ═══════════════════════════════════════════════════════════════════════

type TraceHook = Box<dyn Fn(&Module, &dyn TraceFile)>;

/// A container of child objects
///
/// A module becomes traceable once a trace hook is installed with
/// [`Module::with_trace`]; the hook registers whatever the module wants to
/// expose beyond its children.
pub struct Module {
    name: String,
    kind: String,
    children: RefCell<Vec<Rc<dyn SimObject>>>,
    on_trace: Option<TraceHook>,
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("children", &self.children.borrow().len())
            .field("traceable", &self.on_trace.is_some())
            .finish()
    }
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_kind(name, kind::MODULE)
    }

    /// A container reporting a custom kind, e.g. [`kind::TLM_SIGNAL`]
    pub fn with_kind(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            children: RefCell::new(Vec::new()),
            on_trace: None,
        }
    }

    pub fn with_trace(mut self, hook: impl Fn(&Module, &dyn TraceFile) + 'static) -> Self {
        self.on_trace = Some(Box::new(hook));
        self
    }

    pub fn add_child(&self, child: Rc<dyn SimObject>) {
        self.children.borrow_mut().push(child);
    }
}

impl SimObject for Module {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn children(&self) -> Vec<Rc<dyn SimObject>> {
        self.children.borrow().clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn is_traceable(&self) -> bool {
        self.on_trace.is_some()
    }

    fn trace(&self, trace_file: &dyn TraceFile) {
        if let Some(hook) = &self.on_trace {
            hook(self, trace_file);
        }
    }
}

/// An indexed collection of like objects
#[derive(Default)]
pub struct ObjectVector {
    name: String,
    elements: Vec<Rc<dyn SimObject>>,
}

impl fmt::Debug for ObjectVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectVector")
            .field("name", &self.name)
            .field("len", &self.elements.len())
            .finish()
    }
}

impl ObjectVector {
    pub fn new(name: impl Into<String>, elements: Vec<Rc<dyn SimObject>>) -> Self {
        Self {
            name: name.into(),
            elements,
        }
    }

    /// Build `len` elements named `<name>_<index>`
    pub fn generate(
        name: impl Into<String>,
        len: usize,
        mut make: impl FnMut(String) -> Rc<dyn SimObject>,
    ) -> Self {
        let name = name.into();
        let elements = (0..len).map(|i| make(format!("{}_{}", name, i))).collect();
        Self { name, elements }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Rc<dyn SimObject>> {
        self.elements.get(index)
    }
}

impl SimObject for ObjectVector {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        kind::VECTOR
    }

    fn children(&self) -> Vec<Rc<dyn SimObject>> {
        self.elements.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

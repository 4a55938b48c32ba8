//! Generic value tracer
//!
//! [`Tracer`] walks a hierarchy of [`SimObject`]s and registers every value
//! it can recognize with a [`TraceFile`]. Recognition is done by a
//! [`TypeRegistry`] (see [`dispatch`]); the walk itself decides per node
//! kind whether to trace, to recurse or both:
//!
//! | Node | Action |
//! |---|---|
//! | kind `tlm_signal` | trace the node, do not recurse |
//! | kind `sc_vector` | recurse only |
//! | traceable, or kind `sc_module` with `trace_all_modules` | trace, then recurse |
//! | anything else | type dispatch, do not recurse |
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use txrec_core::tracer::{MemoryTraceFile, Module, Signal, SimObject, Tracer};
//! use txrec_core::TracerConfig;
//!
//! let top = Rc::new(Module::new("top").with_trace(|_, _| {}));
//! top.add_child(Rc::new(Signal::<u8>::new("top.data", 0)));
//!
//! let file = Rc::new(MemoryTraceFile::new());
//! let tracer = Tracer::new(TracerConfig::default(), Some(file.clone())).unwrap();
//! tracer.trace_hierarchy(&[top as Rc<dyn SimObject>]);
//!
//! assert!(file.contains("top.data"));
//! ```

pub mod dispatch;
mod file;
mod object;
mod widths;

use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::config::TracerConfig;
use crate::error::Result;

pub use dispatch::{Candidate, TraceKind, TraceKinds, TypeRegistry};
pub use file::{MemoryTraceFile, Probe, Registration, Sampler, TraceFile, ValueChange};
pub use object::{
    kind, InPort, ManyWriters, Module, ObjectVector, OneWriter, OutPort, Signal, SignalInterface,
    SimObject, UncheckedWriters, ValueObject, ValueSource, Variable, WriterPolicy,
};

/// Walks a simulation hierarchy and registers values with a trace file
pub struct Tracer {
    name: String,
    trace_file: Option<Rc<dyn TraceFile>>,
    kinds: TraceKinds,
    trace_all_modules: bool,
    registry: TypeRegistry,
    warned_no_file: Cell<bool>,
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("name", &self.name)
            .field("kinds", &self.kinds)
            .field("trace_all_modules", &self.trace_all_modules)
            .field("candidates", &self.registry.len())
            .field("has_trace_file", &self.trace_file.is_some())
            .finish()
    }
}

impl Tracer {
    pub fn new(config: TracerConfig, trace_file: Option<Rc<dyn TraceFile>>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            kinds: config.trace_kinds(),
            trace_all_modules: config.trace_all_modules,
            name: config.name,
            trace_file,
            registry: TypeRegistry::standard(),
            warned_no_file: Cell::new(false),
        })
    }

    /// Replace the candidate list, e.g. with one carrying user types
    pub fn with_registry(mut self, registry: TypeRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    pub fn kinds(&self) -> TraceKinds {
        self.kinds
    }

    fn trace_file(&self) -> Option<&dyn TraceFile> {
        let file = self.trace_file.as_deref();
        if file.is_none() && !self.warned_no_file.replace(true) {
            warn!(tracer = %self.name, "no trace file attached, nothing will be traced");
        }
        file
    }

    /// Type-dispatch a single object with explicit shapes
    pub fn try_trace(&self, object: &Rc<dyn SimObject>, kinds: TraceKinds) -> bool {
        let Some(file) = self.trace_file() else {
            return false;
        };
        let traced = self.registry.try_trace(file, object, kinds);
        if traced {
            debug!(tracer = %self.name, object = %object.name(), "attached trace");
        } else {
            trace!(tracer = %self.name, object = %object.name(), kind = %object.kind(), "no traceable type");
        }
        traced
    }

    fn is_self(&self, object: &Rc<dyn SimObject>) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(object), self as *const Tracer)
    }

    /// Trace `object` and, depending on its kind, its descendants
    pub fn descend(&self, object: &Rc<dyn SimObject>, trace_all_modules: bool) {
        if self.is_self(object) {
            return;
        }
        let Some(file) = self.trace_file() else {
            return;
        };
        let node_kind = object.kind();
        if node_kind == kind::TLM_SIGNAL {
            object.trace(file);
        } else if node_kind == kind::VECTOR {
            for child in object.children() {
                self.descend(&child, trace_all_modules);
            }
        } else if object.is_traceable() || (node_kind == kind::MODULE && trace_all_modules) {
            object.trace(file);
            for child in object.children() {
                self.descend(&child, trace_all_modules);
            }
        } else {
            self.try_trace(object, self.kinds);
        }
    }

    /// Descend every top-level object with the configured module policy
    pub fn trace_hierarchy(&self, roots: &[Rc<dyn SimObject>]) {
        debug!(tracer = %self.name, roots = roots.len(), "tracing hierarchy");
        for root in roots {
            self.descend(root, self.trace_all_modules);
        }
    }
}

impl SimObject for Tracer {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        kind::TRACER
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

//! Trace file interface and the in-memory reference trace file

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::time::SimTime;
use crate::values::TraceValue;

use super::object::SimObject;

/// Reads the current value of one registered object
pub type Sampler = fn(&dyn SimObject) -> Option<TraceValue>;

/// Handle a trace file keeps to sample a registered object
#[derive(Clone)]
pub struct Probe {
    object: Rc<dyn SimObject>,
    sampler: Sampler,
}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Probe")
            .field("object", &self.object.name())
            .finish()
    }
}

impl Probe {
    pub fn new(object: Rc<dyn SimObject>, sampler: Sampler) -> Self {
        Self { object, sampler }
    }

    pub fn object(&self) -> &Rc<dyn SimObject> {
        &self.object
    }

    pub fn sample(&self) -> Option<TraceValue> {
        (self.sampler)(self.object.as_ref())
    }
}

/// Destination of traced values
///
/// The encoding of the trace is the implementation's business. A
/// registration means "record the current and all future values of this
/// probe under this name".
pub trait TraceFile {
    fn register_value(&self, name: &str, width: usize, probe: Probe);
}

/// One registration of a [`MemoryTraceFile`]
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub width: usize,
    pub probe: Probe,
}

/// A value change captured by [`MemoryTraceFile::sample`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueChange {
    pub time: SimTime,
    pub name: String,
    pub value: TraceValue,
}

/// Keeps registrations in memory and records value changes on demand
#[derive(Debug, Default)]
pub struct MemoryTraceFile {
    registrations: RefCell<Vec<Registration>>,
    last: RefCell<Vec<Option<TraceValue>>>,
    changes: RefCell<Vec<ValueChange>>,
}

impl MemoryTraceFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registrations(&self) -> Vec<Registration> {
        self.registrations.borrow().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.registrations
            .borrow()
            .iter()
            .map(|r| r.name.clone())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registrations.borrow().iter().any(|r| r.name == name)
    }

    pub fn width_of(&self, name: &str) -> Option<usize> {
        self.registrations
            .borrow()
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.width)
    }

    pub fn len(&self) -> usize {
        self.registrations.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.borrow().is_empty()
    }

    /// Sample every registration and record the ones whose value changed
    /// since the previous sample. Returns the number of changes recorded.
    pub fn sample(&self, time: SimTime) -> usize {
        let registrations = self.registrations.borrow();
        let mut last = self.last.borrow_mut();
        let mut changes = self.changes.borrow_mut();
        let before = changes.len();
        for (registration, previous) in registrations.iter().zip(last.iter_mut()) {
            let Some(value) = registration.probe.sample() else {
                continue;
            };
            if previous.as_ref() != Some(&value) {
                changes.push(ValueChange {
                    time,
                    name: registration.name.clone(),
                    value: value.clone(),
                });
                *previous = Some(value);
            }
        }
        changes.len() - before
    }

    pub fn changes(&self) -> Vec<ValueChange> {
        self.changes.borrow().clone()
    }

    pub fn changes_of(&self, name: &str) -> Vec<ValueChange> {
        self.changes
            .borrow()
            .iter()
            .filter(|c| c.name == name)
            .cloned()
            .collect()
    }
}

impl TraceFile for MemoryTraceFile {
    fn register_value(&self, name: &str, width: usize, probe: Probe) {
        trace!(object = %name, width, "registered trace value");
        self.registrations.borrow_mut().push(Registration {
            name: name.to_string(),
            width,
            probe,
        });
        self.last.borrow_mut().push(None);
    }
}

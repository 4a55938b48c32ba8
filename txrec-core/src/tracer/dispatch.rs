//! Type dispatch: find the value type behind an opaque object
//!
//! A [`TypeRegistry`] is an ordered list of candidate value types. For each
//! candidate the object is tested against every requested shape (ports,
//! signals, variables, objects, in that order). The first candidate and
//! shape that match win and the object is registered with the trace file
//! through that shape.
//!
//! The standard list covers the primitive scalars, [`SimTime`], [`Bit`],
//! [`Logic`], [`UInt`] and [`Int`] of every width from 1 to 64 and the four
//! wide families at every width from 1 to 128 and every eighth width from
//! 136 to 1024.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::ops::BitOr;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TxRecError};
use crate::time::SimTime;
use crate::values::{BigInt, BigUInt, Bit, BitVector, Int, Logic, LogicVector, SimValue, UInt};

use super::file::TraceFile;
use super::object::{
    register_shape, InPort, ManyWriters, OneWriter, OutPort, Signal, SimObject, UncheckedWriters,
    ValueObject, ValueSource, Variable,
};
use super::widths::{narrow_widths, wide_widths};

/// One traceable object shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceKind {
    Ports,
    Signals,
    Variables,
    Objects,
}

impl TraceKind {
    pub const ALL: [TraceKind; 4] = [
        TraceKind::Ports,
        TraceKind::Signals,
        TraceKind::Variables,
        TraceKind::Objects,
    ];
}

/// Set of [`TraceKind`]s
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TraceKinds(u8);

impl TraceKinds {
    pub const NONE: TraceKinds = TraceKinds(0);
    pub const PORTS: TraceKinds = TraceKinds(0x1);
    pub const SIGNALS: TraceKinds = TraceKinds(0x2);
    pub const VARIABLES: TraceKinds = TraceKinds(0x4);
    pub const OBJECTS: TraceKinds = TraceKinds(0x8);
    pub const ALL: TraceKinds = TraceKinds(0xF);

    pub fn contains(self, other: TraceKinds) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl From<TraceKind> for TraceKinds {
    fn from(kind: TraceKind) -> Self {
        match kind {
            TraceKind::Ports => TraceKinds::PORTS,
            TraceKind::Signals => TraceKinds::SIGNALS,
            TraceKind::Variables => TraceKinds::VARIABLES,
            TraceKind::Objects => TraceKinds::OBJECTS,
        }
    }
}

impl BitOr for TraceKinds {
    type Output = TraceKinds;

    fn bitor(self, rhs: TraceKinds) -> TraceKinds {
        TraceKinds(self.0 | rhs.0)
    }
}

impl fmt::Debug for TraceKinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = TraceKind::ALL
            .iter()
            .filter(|kind| self.contains(TraceKinds::from(**kind)))
            .map(|kind| match kind {
                TraceKind::Ports => "PORTS",
                TraceKind::Signals => "SIGNALS",
                TraceKind::Variables => "VARIABLES",
                TraceKind::Objects => "OBJECTS",
            })
            .collect();
        write!(f, "TraceKinds({})", names.join(" | "))
    }
}

type Attach = fn(&dyn TraceFile, &Rc<dyn SimObject>);
type Matcher = fn(&dyn SimObject, TraceKinds) -> Option<Attach>;

/// Finds the shape of `object` holding a `T`, if any
fn match_shape<T: SimValue>(object: &dyn SimObject, kinds: TraceKinds) -> Option<Attach> {
    let any = object.as_any();
    if kinds.contains(TraceKinds::PORTS) {
        if any.is::<InPort<T>>() {
            return Some(attach::<InPort<T>, T>);
        }
        if any.is::<OutPort<T>>() {
            return Some(attach::<OutPort<T>, T>);
        }
    }
    if kinds.contains(TraceKinds::SIGNALS) {
        if any.is::<Signal<T, OneWriter>>() {
            return Some(attach::<Signal<T, OneWriter>, T>);
        }
        if any.is::<Signal<T, ManyWriters>>() {
            return Some(attach::<Signal<T, ManyWriters>, T>);
        }
        if any.is::<Signal<T, UncheckedWriters>>() {
            return Some(attach::<Signal<T, UncheckedWriters>, T>);
        }
    }
    if kinds.contains(TraceKinds::VARIABLES) && any.is::<Variable<T>>() {
        return Some(attach::<Variable<T>, T>);
    }
    if T::IS_CLASS && kinds.contains(TraceKinds::OBJECTS) && any.is::<ValueObject<T>>() {
        return Some(attach::<ValueObject<T>, T>);
    }
    None
}

fn attach<S: ValueSource, T: SimValue>(
    trace_file: &dyn TraceFile,
    object: &Rc<dyn SimObject>,
) {
    register_shape::<S>(trace_file, object, T::WIDTH);
}

/// A value type the dispatch can recognize
#[derive(Clone)]
pub struct Candidate {
    type_id: TypeId,
    type_name: String,
    width: usize,
    matcher: Matcher,
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("type_name", &self.type_name)
            .field("width", &self.width)
            .finish()
    }
}

impl Candidate {
    pub fn of<T: SimValue>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: T::type_name(),
            width: T::WIDTH,
            matcher: match_shape::<T>,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

macro_rules! family {
    ($family:ident ; $($w:literal)*) => {
        [$(Candidate::of::<$family<$w>>()),*]
    };
}

/// Ordered candidate list with first-match dispatch
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    candidates: Vec<Candidate>,
    index: HashMap<TypeId, usize>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl TypeRegistry {
    /// A registry with no candidates
    pub fn empty() -> Self {
        Self {
            candidates: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// The standard candidate list
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        let scalars = [
            Candidate::of::<bool>(),
            Candidate::of::<i8>(),
            Candidate::of::<u8>(),
            Candidate::of::<i16>(),
            Candidate::of::<u16>(),
            Candidate::of::<i32>(),
            Candidate::of::<u32>(),
            Candidate::of::<isize>(),
            Candidate::of::<usize>(),
            Candidate::of::<i64>(),
            Candidate::of::<u64>(),
            Candidate::of::<f32>(),
            Candidate::of::<f64>(),
            Candidate::of::<SimTime>(),
            Candidate::of::<Bit>(),
            Candidate::of::<Logic>(),
        ];
        registry.extend(scalars);
        registry.extend(narrow_widths!(family!(UInt)));
        registry.extend(narrow_widths!(family!(Int)));
        registry.extend(wide_widths!(family!(BigUInt)));
        registry.extend(wide_widths!(family!(BigInt)));
        registry.extend(wide_widths!(family!(BitVector)));
        registry.extend(wide_widths!(family!(LogicVector)));
        registry
    }

    fn extend(&mut self, candidates: impl IntoIterator<Item = Candidate>) {
        for candidate in candidates {
            self.index.insert(candidate.type_id, self.candidates.len());
            self.candidates.push(candidate);
        }
    }

    /// Append a candidate after all existing ones
    pub fn register<T: SimValue>(&mut self) -> Result<()> {
        let candidate = Candidate::of::<T>();
        if self.index.contains_key(&candidate.type_id) {
            return Err(TxRecError::DuplicateCandidate {
                type_name: candidate.type_name,
            });
        }
        self.extend([candidate]);
        Ok(())
    }

    pub fn contains<T: SimValue>(&self) -> bool {
        self.index.contains_key(&TypeId::of::<T>())
    }

    /// Position of `T` in dispatch order
    pub fn position<T: SimValue>(&self) -> Option<usize> {
        self.index.get(&TypeId::of::<T>()).copied()
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// The first candidate that matches `object` in one of `kinds`
    pub fn matched_type(&self, object: &dyn SimObject, kinds: TraceKinds) -> Option<&Candidate> {
        self.candidates
            .iter()
            .find(|candidate| (candidate.matcher)(object, kinds).is_some())
    }

    /// Register `object` with `trace_file` under its value type
    ///
    /// Returns false, with no side effect, when no candidate matches.
    pub fn try_trace(
        &self,
        trace_file: &dyn TraceFile,
        object: &Rc<dyn SimObject>,
        kinds: TraceKinds,
    ) -> bool {
        for candidate in &self.candidates {
            if let Some(attach) = (candidate.matcher)(object.as_ref(), kinds) {
                attach(trace_file, object);
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::file::MemoryTraceFile;

    #[derive(Debug, Clone, PartialEq)]
    struct Rgb(u8, u8, u8);

    impl SimValue for Rgb {
        const WIDTH: usize = 24;

        fn type_name() -> String {
            "Rgb".to_string()
        }

        fn trace_value(&self) -> crate::values::TraceValue {
            crate::values::TraceValue::Unsigned(
                (u64::from(self.0) << 16) | (u64::from(self.1) << 8) | u64::from(self.2),
            )
        }
    }

    #[test]
    fn test_trace_kinds_ops() {
        let kinds = TraceKinds::PORTS | TraceKinds::VARIABLES;
        assert!(kinds.contains(TraceKinds::PORTS));
        assert!(!kinds.contains(TraceKinds::SIGNALS));
        assert!(TraceKinds::ALL.contains(kinds));
        assert!(TraceKinds::NONE.is_empty());
        assert_eq!(format!("{:?}", kinds), "TraceKinds(PORTS | VARIABLES)");
    }

    #[test]
    fn test_standard_registry_order() {
        let registry = TypeRegistry::standard();
        assert_eq!(registry.len(), 16 + 64 * 2 + 240 * 4);
        assert_eq!(registry.position::<bool>(), Some(0));
        assert_eq!(registry.position::<Logic>(), Some(15));
        assert_eq!(registry.position::<UInt<1>>(), Some(16));
        assert_eq!(registry.position::<Int<64>>(), Some(16 + 127));
        assert!(registry.contains::<LogicVector<1024>>());
        assert!(!registry.contains::<BigUInt<129>>());
        assert_eq!(registry.candidates()[0].type_name(), "bool");
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = TypeRegistry::standard();
        registry.register::<Rgb>().unwrap();
        assert_eq!(registry.position::<Rgb>(), Some(registry.len() - 1));

        let err = registry.register::<Rgb>().unwrap_err();
        assert_eq!(err.error_code(), "DUPLICATE_CANDIDATE");
        assert!(registry.register::<UInt<7>>().is_err());
    }

    #[test]
    fn test_shape_mask_is_respected() {
        let registry = TypeRegistry::standard();
        let file = MemoryTraceFile::new();
        let sig: Rc<dyn SimObject> = Rc::new(Signal::<u32>::new("top.sig", 0));

        assert!(!registry.try_trace(&file, &sig, TraceKinds::PORTS | TraceKinds::VARIABLES));
        assert!(file.is_empty());
        assert!(registry.try_trace(&file, &sig, TraceKinds::SIGNALS));
        assert_eq!(file.width_of("top.sig"), Some(32));
    }

    #[test]
    fn test_primitives_never_match_as_objects() {
        let registry = TypeRegistry::standard();
        let primitive: Rc<dyn SimObject> = Rc::new(ValueObject::new("top.raw", 5u8));
        let class: Rc<dyn SimObject> = Rc::new(ValueObject::new("top.bits", Bit(true)));

        assert!(registry.matched_type(primitive.as_ref(), TraceKinds::ALL).is_none());
        assert_eq!(
            registry
                .matched_type(class.as_ref(), TraceKinds::ALL)
                .map(Candidate::type_name),
            Some("Bit")
        );
    }

    #[test]
    fn test_user_candidate_is_dispatched() {
        let mut registry = TypeRegistry::standard();
        let file = MemoryTraceFile::new();
        let var: Rc<dyn SimObject> = Rc::new(Variable::new("top.color", Rgb(1, 2, 3)));

        assert!(!registry.try_trace(&file, &var, TraceKinds::ALL));
        registry.register::<Rgb>().unwrap();
        assert!(registry.try_trace(&file, &var, TraceKinds::ALL));
        assert_eq!(file.width_of("top.color"), Some(24));
    }
}

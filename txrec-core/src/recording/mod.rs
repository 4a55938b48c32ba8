//! Transaction recording database interface
//!
//! The on-disk format of a recording database is not this crate's concern.
//! Recorders talk to any backend through [`RecordingBackend`] and work with
//! the thin wrappers [`TxDb`], [`TxStream`], [`TxGenerator`] and [`TxHandle`].
//!
//! # Relations
//!
//! `handle.add_relation(relation, other)` always reads "`handle` is the
//! child/successor, `other` the parent/predecessor".
//!
//! # Failure handling
//!
//! Backend operations return [`Result`]. The handle wrappers log failures at
//! `warn` level and carry on: a broken recording must not stop the
//! simulation it observes.

mod memory;

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::time::SimTime;

pub use memory::{
    DatabaseInfo, GeneratorRecord, MemoryTxDb, RelationRecord, StreamRecord, TransactionRecord,
};

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Identifies a recorded transaction
    TxId
);
record_id!(StreamId);
record_id!(GeneratorId);

impl TxId {
    /// Id of a handle whose backend refused to begin it
    pub const DETACHED: TxId = TxId(0);
}

/// Causal relation between two recorded transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    ParentChild,
    PredecessorSuccessor,
}

impl Relation {
    pub fn as_str(self) -> &'static str {
        match self {
            Relation::ParentChild => "PARENT/CHILD",
            Relation::PredecessorSuccessor => "PREDECESSOR/SUCCESSOR",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttrValue {
    Bool(bool),
    Unsigned(u64),
    Signed(i64),
    Real(f64),
    Text(String),
    Time(SimTime),
    /// Ordered named fields
    Record(Vec<(String, AttrValue)>),
}

impl AttrValue {
    pub fn record<'a>(fields: impl IntoIterator<Item = (&'a str, AttrValue)>) -> Self {
        AttrValue::Record(
            fields
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        )
    }

    /// Looks up a field of a record value
    pub fn field(&self, name: &str) -> Option<&AttrValue> {
        match self {
            AttrValue::Record(fields) => fields
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            AttrValue::Unsigned(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<SimTime> {
        match self {
            AttrValue::Time(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<u64> for AttrValue {
    fn from(v: u64) -> Self {
        AttrValue::Unsigned(v)
    }
}

impl From<usize> for AttrValue {
    fn from(v: usize) -> Self {
        AttrValue::Unsigned(v as u64)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Signed(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Real(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Text(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Text(v)
    }
}

impl From<SimTime> for AttrValue {
    fn from(v: SimTime) -> Self {
        AttrValue::Time(v)
    }
}

/// Storage behind a recording database
///
/// Implement this trait to write recordings somewhere. All methods take
/// `&self`; backends keep their state in cells since every call comes from
/// the simulation thread.
pub trait RecordingBackend {
    /// Open a stream: a named group of transaction kinds
    fn open_stream(&self, name: &str, kind: &str) -> Result<StreamId>;

    /// Declare a transaction kind on a stream. The optional names label the
    /// values passed to begin and end.
    fn open_generator(
        &self,
        stream: StreamId,
        name: &str,
        begin_attribute: Option<&str>,
        end_attribute: Option<&str>,
    ) -> Result<GeneratorId>;

    fn begin_transaction(
        &self,
        generator: GeneratorId,
        time: SimTime,
        value: Option<AttrValue>,
    ) -> Result<TxId>;

    fn end_transaction(&self, tx: TxId, time: SimTime, value: Option<AttrValue>) -> Result<()>;

    fn record_attribute(&self, tx: TxId, name: &str, value: AttrValue) -> Result<()>;

    fn add_relation(&self, tx: TxId, relation: Relation, other: TxId) -> Result<()>;

    /// Backend name (for logging)
    fn name(&self) -> &'static str;
}

/// A recording database handle shared by recorders
#[derive(Clone)]
pub struct TxDb {
    backend: Rc<dyn RecordingBackend>,
}

impl fmt::Debug for TxDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxDb")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl TxDb {
    pub fn new(backend: Rc<dyn RecordingBackend>) -> Self {
        Self { backend }
    }

    pub fn open_stream(&self, name: &str, kind: &str) -> Result<TxStream> {
        let id = self.backend.open_stream(name, kind)?;
        Ok(TxStream {
            id,
            name: name.to_string(),
            backend: Rc::clone(&self.backend),
        })
    }
}

/// An open recording stream
pub struct TxStream {
    id: StreamId,
    name: String,
    backend: Rc<dyn RecordingBackend>,
}

impl fmt::Debug for TxStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxStream")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

impl TxStream {
    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generator(
        &self,
        name: &str,
        begin_attribute: Option<&str>,
        end_attribute: Option<&str>,
    ) -> Result<TxGenerator> {
        let id = self
            .backend
            .open_generator(self.id, name, begin_attribute, end_attribute)?;
        Ok(TxGenerator {
            id,
            name: name.to_string(),
            backend: Rc::clone(&self.backend),
        })
    }
}

/// A transaction kind on a stream
pub struct TxGenerator {
    id: GeneratorId,
    name: String,
    backend: Rc<dyn RecordingBackend>,
}

impl fmt::Debug for TxGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxGenerator")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

impl TxGenerator {
    pub fn id(&self) -> GeneratorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Begin a transaction. If the backend refuses, the returned handle is
    /// detached and every operation on it is a no-op.
    pub fn begin(&self, time: SimTime, value: Option<AttrValue>) -> TxHandle {
        match self.backend.begin_transaction(self.id, time, value) {
            Ok(id) => TxHandle {
                id,
                backend: Some(Rc::clone(&self.backend)),
            },
            Err(err) => {
                warn!(generator = %self.name, error = %err, "failed to begin transaction");
                TxHandle {
                    id: TxId::DETACHED,
                    backend: None,
                }
            }
        }
    }
}

/// An open recorded transaction
///
/// Ending consumes the handle, so a handle can be ended at most once.
#[must_use = "a transaction handle must be ended"]
pub struct TxHandle {
    id: TxId,
    backend: Option<Rc<dyn RecordingBackend>>,
}

impl fmt::Debug for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxHandle")
            .field("id", &self.id)
            .field("detached", &self.backend.is_none())
            .finish()
    }
}

impl TxHandle {
    pub fn id(&self) -> TxId {
        self.id
    }

    pub fn is_detached(&self) -> bool {
        self.backend.is_none()
    }

    pub fn record_attribute(&self, name: &str, value: impl Into<AttrValue>) {
        if let Some(backend) = &self.backend {
            report(
                "record_attribute",
                self.id,
                backend.record_attribute(self.id, name, value.into()),
            );
        }
    }

    /// Declare `self` the child/successor of `other`
    pub fn add_relation(&self, relation: Relation, other: TxId) {
        if let Some(backend) = &self.backend {
            report(
                "add_relation",
                self.id,
                backend.add_relation(self.id, relation, other),
            );
        }
    }

    pub fn end(self, time: SimTime, value: Option<AttrValue>) {
        if let Some(backend) = &self.backend {
            report(
                "end_transaction",
                self.id,
                backend.end_transaction(self.id, time, value),
            );
        }
    }
}

fn report(operation: &'static str, tx: TxId, result: Result<()>) {
    if let Err(err) = result {
        warn!(operation, tx = %tx, error = %err, "recording backend rejected operation");
    }
}

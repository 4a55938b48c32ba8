//! In-memory recording database
//!
//! Keeps every stream, generator, transaction and relation in memory and
//! offers query helpers for tests and post-processing. The whole database
//! can be exported as JSON.

use std::cell::RefCell;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Result, TxRecError};
use crate::time::SimTime;

use super::{AttrValue, GeneratorId, RecordingBackend, Relation, StreamId, TxId};

/// Identity of one recording run
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseInfo {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamRecord {
    pub id: StreamId,
    pub name: String,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratorRecord {
    pub id: GeneratorId,
    pub stream: StreamId,
    pub name: String,
    pub begin_attribute: Option<String>,
    pub end_attribute: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub id: TxId,
    pub generator: GeneratorId,
    pub begin_time: SimTime,
    pub end_time: Option<SimTime>,
    pub begin_value: Option<AttrValue>,
    pub end_value: Option<AttrValue>,
    pub attributes: Vec<(String, AttrValue)>,
}

impl TransactionRecord {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// The most recently recorded attribute with this name
    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes
            .iter()
            .rev()
            .find(|(attr, _)| attr == name)
            .map(|(_, value)| value)
    }
}

/// `from` is the child/successor, `to` the parent/predecessor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelationRecord {
    pub relation: Relation,
    pub from: TxId,
    pub to: TxId,
}

#[derive(Debug, Default, Serialize)]
struct Tables {
    streams: Vec<StreamRecord>,
    generators: Vec<GeneratorRecord>,
    transactions: Vec<TransactionRecord>,
    relations: Vec<RelationRecord>,
}

impl Tables {
    // ids are 1-based positions
    fn position(&self, tx: TxId) -> Result<usize> {
        tx.0.checked_sub(1)
            .map(|idx| idx as usize)
            .filter(|idx| *idx < self.transactions.len())
            .ok_or(TxRecError::TransactionNotFound { id: tx.0 })
    }

    fn transaction_mut(&mut self, tx: TxId) -> Result<&mut TransactionRecord> {
        let idx = self.position(tx)?;
        Ok(&mut self.transactions[idx])
    }
}

#[derive(Serialize)]
struct Export<'a> {
    info: &'a DatabaseInfo,
    #[serde(flatten)]
    tables: &'a Tables,
}

/// In-memory [`RecordingBackend`]
#[derive(Debug)]
pub struct MemoryTxDb {
    info: DatabaseInfo,
    tables: RefCell<Tables>,
}

impl Default for MemoryTxDb {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTxDb {
    pub fn new() -> Self {
        Self {
            info: DatabaseInfo {
                run_id: Uuid::new_v4(),
                created_at: Utc::now(),
            },
            tables: RefCell::new(Tables::default()),
        }
    }

    pub fn info(&self) -> &DatabaseInfo {
        &self.info
    }

    pub fn stream(&self, name: &str) -> Option<StreamRecord> {
        self.tables
            .borrow()
            .streams
            .iter()
            .find(|s| s.name == name)
            .cloned()
    }

    pub fn stream_names(&self) -> Vec<String> {
        self.tables
            .borrow()
            .streams
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    pub fn generators(&self, stream: &str) -> Vec<GeneratorRecord> {
        let Some(stream) = self.stream(stream) else {
            return Vec::new();
        };
        self.tables
            .borrow()
            .generators
            .iter()
            .filter(|g| g.stream == stream.id)
            .cloned()
            .collect()
    }

    pub fn generator(&self, stream: &str, name: &str) -> Option<GeneratorRecord> {
        self.generators(stream).into_iter().find(|g| g.name == name)
    }

    pub fn transaction(&self, tx: TxId) -> Result<TransactionRecord> {
        let tables = self.tables.borrow();
        let idx = tables.position(tx)?;
        Ok(tables.transactions[idx].clone())
    }

    pub fn transactions(&self) -> Vec<TransactionRecord> {
        self.tables.borrow().transactions.clone()
    }

    /// Transactions of one generator on one stream, in begin order
    pub fn transactions_of(&self, stream: &str, generator: &str) -> Vec<TransactionRecord> {
        let Some(generator) = self.generator(stream, generator) else {
            return Vec::new();
        };
        self.tables
            .borrow()
            .transactions
            .iter()
            .filter(|t| t.generator == generator.id)
            .cloned()
            .collect()
    }

    /// Transactions of every generator on a stream, in begin order
    pub fn stream_transactions(&self, stream: &str) -> Vec<TransactionRecord> {
        let generators: Vec<GeneratorId> = self.generators(stream).iter().map(|g| g.id).collect();
        self.tables
            .borrow()
            .transactions
            .iter()
            .filter(|t| generators.contains(&t.generator))
            .cloned()
            .collect()
    }

    pub fn open_transactions(&self) -> Vec<TransactionRecord> {
        self.tables
            .borrow()
            .transactions
            .iter()
            .filter(|t| t.is_open())
            .cloned()
            .collect()
    }

    pub fn transaction_count(&self) -> usize {
        self.tables.borrow().transactions.len()
    }

    pub fn relations(&self) -> Vec<RelationRecord> {
        self.tables.borrow().relations.clone()
    }

    /// Relations declared by `tx` as child/successor
    pub fn relations_from(&self, tx: TxId) -> Vec<RelationRecord> {
        self.tables
            .borrow()
            .relations
            .iter()
            .filter(|r| r.from == tx)
            .copied()
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        let tables = self.tables.borrow();
        let export = Export {
            info: &self.info,
            tables: &tables,
        };
        Ok(serde_json::to_string_pretty(&export)?)
    }

    pub fn clear(&self) {
        *self.tables.borrow_mut() = Tables::default();
    }
}

impl RecordingBackend for MemoryTxDb {
    fn open_stream(&self, name: &str, kind: &str) -> Result<StreamId> {
        let mut tables = self.tables.borrow_mut();
        let id = StreamId(tables.streams.len() as u64 + 1);
        tables.streams.push(StreamRecord {
            id,
            name: name.to_string(),
            kind: kind.to_string(),
        });
        Ok(id)
    }

    fn open_generator(
        &self,
        stream: StreamId,
        name: &str,
        begin_attribute: Option<&str>,
        end_attribute: Option<&str>,
    ) -> Result<GeneratorId> {
        let mut tables = self.tables.borrow_mut();
        if !tables.streams.iter().any(|s| s.id == stream) {
            return Err(TxRecError::StreamNotFound { id: stream.0 });
        }
        let id = GeneratorId(tables.generators.len() as u64 + 1);
        tables.generators.push(GeneratorRecord {
            id,
            stream,
            name: name.to_string(),
            begin_attribute: begin_attribute.map(str::to_string),
            end_attribute: end_attribute.map(str::to_string),
        });
        Ok(id)
    }

    fn begin_transaction(
        &self,
        generator: GeneratorId,
        time: SimTime,
        value: Option<AttrValue>,
    ) -> Result<TxId> {
        let mut tables = self.tables.borrow_mut();
        if !tables.generators.iter().any(|g| g.id == generator) {
            return Err(TxRecError::GeneratorNotFound { id: generator.0 });
        }
        let id = TxId(tables.transactions.len() as u64 + 1);
        tables.transactions.push(TransactionRecord {
            id,
            generator,
            begin_time: time,
            end_time: None,
            begin_value: value,
            end_value: None,
            attributes: Vec::new(),
        });
        Ok(id)
    }

    fn end_transaction(&self, tx: TxId, time: SimTime, value: Option<AttrValue>) -> Result<()> {
        let mut tables = self.tables.borrow_mut();
        let record = tables.transaction_mut(tx)?;
        if record.end_time.is_some() {
            return Err(TxRecError::TransactionAlreadyEnded { id: tx.0 });
        }
        record.end_time = Some(time);
        record.end_value = value;
        Ok(())
    }

    fn record_attribute(&self, tx: TxId, name: &str, value: AttrValue) -> Result<()> {
        let mut tables = self.tables.borrow_mut();
        let record = tables.transaction_mut(tx)?;
        if record.end_time.is_some() {
            return Err(TxRecError::TransactionAlreadyEnded { id: tx.0 });
        }
        record.attributes.push((name.to_string(), value));
        Ok(())
    }

    fn add_relation(&self, tx: TxId, relation: Relation, other: TxId) -> Result<()> {
        let mut tables = self.tables.borrow_mut();
        tables.position(tx)?;
        tables.position(other)?;
        tables.relations.push(RelationRecord {
            relation,
            from: tx,
            to: other,
        });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}

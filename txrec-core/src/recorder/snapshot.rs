//! Payload snapshots for the delay-annotated views

use crate::recording::{AttrValue, TxId};
use crate::transport::{Command, ResponseStatus, TransactionPayload};

/// Copy of the observable fields of a payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadRecord {
    pub command: Command,
    pub address: u64,
    pub data: Vec<u8>,
    pub byte_enable_length: usize,
    pub streaming_width: usize,
    pub response_status: ResponseStatus,
    pub uid: u64,
}

impl PayloadRecord {
    pub fn capture<T: TransactionPayload>(trans: &T) -> Self {
        let mut record = Self::default();
        record.refill(trans);
        record
    }

    /// Overwrite with another payload, reusing the data buffer
    pub fn refill<T: TransactionPayload>(&mut self, trans: &T) {
        self.command = trans.command();
        self.address = trans.address();
        self.data.clear();
        self.data.extend_from_slice(trans.data());
        self.byte_enable_length = trans.byte_enable_length();
        self.streaming_width = trans.streaming_width();
        self.response_status = trans.response_status();
        self.uid = trans.uid();
    }

    pub fn data_length(&self) -> usize {
        self.data.len()
    }

    pub fn to_attr(&self) -> AttrValue {
        AttrValue::record([
            ("command", AttrValue::from(self.command.as_str())),
            ("address", AttrValue::from(self.address)),
            ("data_length", AttrValue::from(self.data.len())),
            ("byte_enable_length", AttrValue::from(self.byte_enable_length)),
            ("streaming_width", AttrValue::from(self.streaming_width)),
            ("response_status", AttrValue::from(self.response_status.as_str())),
        ])
    }
}

/// Scalar value of a payload shorter than 8 bytes
///
/// Byte `i` is weighted by `256^i`, i.e. the buffer is read least
/// significant byte first regardless of host byte order. Payloads of 8 bytes
/// or more have no scalar value.
pub fn data_value(data: &[u8]) -> Option<u64> {
    if data.len() >= 8 {
        return None;
    }
    Some(
        data.iter()
            .enumerate()
            .fold(0u64, |acc, (i, byte)| acc | (u64::from(*byte) << (8 * i))),
    )
}

/// A snapshot waiting in a timed queue
#[derive(Debug)]
pub struct TimedSnapshot<Ph> {
    /// Pairs begin and end events of the same transaction
    pub id: u64,
    /// Handle of the untimed record this snapshot belongs to
    pub parent: TxId,
    pub phase: Ph,
    pub record: PayloadRecord,
}

/// Allocation counters of a [`SnapshotPool`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub allocated: usize,
    pub in_use: usize,
}

/// Recycles snapshot buffers between timed events
#[derive(Debug, Default)]
pub struct SnapshotPool {
    free: Vec<PayloadRecord>,
    stats: PoolStats,
}

impl SnapshotPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire<T: TransactionPayload>(&mut self, trans: &T) -> PayloadRecord {
        let mut record = match self.free.pop() {
            Some(record) => record,
            None => {
                self.stats.allocated += 1;
                PayloadRecord::default()
            }
        };
        record.refill(trans);
        self.stats.in_use += 1;
        record
    }

    pub fn release(&mut self, record: PayloadRecord) {
        self.stats.in_use = self.stats.in_use.saturating_sub(1);
        self.free.push(record);
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }
}

//! Causal link carried on the payload across recorder layers
//!
//! The first recorder to see a transaction attaches a [`LinkExtension`]
//! naming itself as creator. Every later layer relates its own record to the
//! extension's current handle and then points the extension at its own
//! record. Only the creator ever detaches the extension.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::recording::TxId;

static NEXT_RECORDER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one recorder instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecorderId(u64);

impl RecorderId {
    pub(crate) fn next() -> Self {
        RecorderId(NEXT_RECORDER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Who is responsible for detaching a link, seen from one recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOwnership {
    Owned,
    NotOwned(RecorderId),
}

/// Most recent recorded handle of a transaction, plus its creator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkExtension {
    current: TxId,
    creator: RecorderId,
}

impl LinkExtension {
    pub fn new(current: TxId, creator: RecorderId) -> Self {
        Self { current, creator }
    }

    pub fn current(&self) -> TxId {
        self.current
    }

    pub fn creator(&self) -> RecorderId {
        self.creator
    }

    pub fn ownership(&self, viewer: RecorderId) -> LinkOwnership {
        if self.creator == viewer {
            LinkOwnership::Owned
        } else {
            LinkOwnership::NotOwned(self.creator)
        }
    }

    /// Point at a newer handle, returning the one it replaces
    pub fn replace_current(&mut self, current: TxId) -> TxId {
        std::mem::replace(&mut self.current, current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ownership_is_creator_checked() {
        let creator = RecorderId::next();
        let other = RecorderId::next();
        let link = LinkExtension::new(TxId(1), creator);

        assert_eq!(link.ownership(creator), LinkOwnership::Owned);
        assert_eq!(link.ownership(other), LinkOwnership::NotOwned(creator));
    }

    #[test]
    fn test_replace_current() {
        let mut link = LinkExtension::new(TxId(1), RecorderId::next());
        assert_eq!(link.replace_current(TxId(5)), TxId(1));
        assert_eq!(link.current(), TxId(5));
    }
}

//! Payload event queue
//!
//! Holds items until the simulated time they were scheduled for. Items due at
//! the same time come out in the order they were queued.

use std::collections::BTreeMap;

use crate::time::SimTime;

#[derive(Debug)]
pub struct PayloadEventQueue<T> {
    entries: BTreeMap<(SimTime, u64), T>,
    sequence: u64,
}

impl<T> Default for PayloadEventQueue<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            sequence: 0,
        }
    }
}

impl<T> PayloadEventQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `item` for absolute time `at`
    pub fn notify(&mut self, at: SimTime, item: T) {
        self.entries.insert((at, self.sequence), item);
        self.sequence += 1;
    }

    /// Time of the earliest pending item
    pub fn next_due(&self) -> Option<SimTime> {
        self.entries.keys().next().map(|(at, _)| *at)
    }

    /// Remove the earliest item if it is due at or before `now`
    pub fn pop_due(&mut self, now: SimTime) -> Option<(SimTime, T)> {
        if self.next_due()? > now {
            return None;
        }
        self.entries.pop_first().map(|((at, _), item)| (at, item))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_come_out_in_time_order() {
        let mut queue = PayloadEventQueue::new();
        queue.notify(SimTime::from_ns(20), "late");
        queue.notify(SimTime::from_ns(5), "early");
        queue.notify(SimTime::from_ns(5), "early-second");

        assert_eq!(queue.next_due(), Some(SimTime::from_ns(5)));
        assert!(queue.pop_due(SimTime::from_ns(4)).is_none());

        let now = SimTime::from_ns(20);
        assert_eq!(queue.pop_due(now).map(|(_, i)| i), Some("early"));
        assert_eq!(queue.pop_due(now).map(|(_, i)| i), Some("early-second"));
        assert_eq!(queue.pop_due(now), Some((SimTime::from_ns(20), "late")));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_not_yet_due() {
        let mut queue = PayloadEventQueue::new();
        queue.notify(SimTime::from_ns(10), 1u32);
        assert!(queue.pop_due(SimTime::from_ns(9)).is_none());
        assert_eq!(queue.len(), 1);
    }
}

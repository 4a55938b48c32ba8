//! Simulated time
//!
//! The simulation kernel is external to this crate. Recorders and tracers
//! only need to read the current simulated time, which they do through the
//! [`SimClock`] trait. [`ManualClock`] is the clock used by tests and by
//! embedders that drive time themselves.

use std::cell::Cell;
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

use serde::{Deserialize, Serialize};

/// A point or span of simulated time with picosecond resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimTime(u64);

const UNITS: [(u64, &str); 5] = [
    (1_000_000_000_000, "s"),
    (1_000_000_000, "ms"),
    (1_000_000, "us"),
    (1_000, "ns"),
    (1, "ps"),
];

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    pub const fn from_ps(ps: u64) -> Self {
        SimTime(ps)
    }

    pub const fn from_ns(ns: u64) -> Self {
        SimTime(ns * 1_000)
    }

    pub const fn from_us(us: u64) -> Self {
        SimTime(us * 1_000_000)
    }

    pub const fn as_ps(self) -> u64 {
        self.0
    }

    pub fn saturating_sub(self, other: SimTime) -> SimTime {
        SimTime(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for SimTime {
    /// Formats with the largest unit that divides the value exactly,
    /// e.g. `10 ns` or `1500 ps`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "0 s");
        }
        let (scale, unit) = UNITS
            .iter()
            .find(|(scale, _)| self.0 % scale == 0)
            .copied()
            .unwrap_or((1, "ps"));
        write!(f, "{} {}", self.0 / scale, unit)
    }
}

impl Add for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 + rhs.0)
    }
}

impl AddAssign for SimTime {
    fn add_assign(&mut self, rhs: SimTime) {
        self.0 += rhs.0;
    }
}

impl Sub for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 - rhs.0)
    }
}

/// Read access to the kernel's current simulated time
pub trait SimClock {
    fn now(&self) -> SimTime;
}

/// A clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<SimTime>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `delta`
    pub fn advance(&self, delta: SimTime) {
        self.now.set(self.now.get() + delta);
    }

    /// Jump to an absolute time. Simulated time never runs backwards, so
    /// earlier values are ignored.
    pub fn set(&self, at: SimTime) {
        if at > self.now.get() {
            self.now.set(at);
        }
    }
}

impl SimClock for ManualClock {
    fn now(&self) -> SimTime {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_picks_largest_exact_unit() {
        assert_eq!(SimTime::ZERO.to_string(), "0 s");
        assert_eq!(SimTime::from_ns(10).to_string(), "10 ns");
        assert_eq!(SimTime::from_ps(1_500).to_string(), "1500 ps");
        assert_eq!(SimTime::from_us(3).to_string(), "3 us");
        assert_eq!(SimTime::from_ps(2_000_000_000_000).to_string(), "2 s");
    }

    #[test]
    fn test_arithmetic() {
        let mut t = SimTime::from_ns(5);
        t += SimTime::from_ns(5);
        assert_eq!(t, SimTime::from_ns(10));
        assert_eq!(t - SimTime::from_ns(3), SimTime::from_ns(7));
        assert_eq!(SimTime::from_ns(1).saturating_sub(t), SimTime::ZERO);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), SimTime::ZERO);

        clock.advance(SimTime::from_ns(4));
        clock.set(SimTime::from_ns(10));
        assert_eq!(clock.now(), SimTime::from_ns(10));

        clock.set(SimTime::from_ns(2));
        assert_eq!(clock.now(), SimTime::from_ns(10));
    }

    #[test]
    fn test_serde_is_transparent() {
        let json = serde_json::to_string(&SimTime::from_ns(2)).unwrap();
        assert_eq!(json, "2000");
    }
}

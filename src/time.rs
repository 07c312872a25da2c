//! Simulated clock. Time is tracked as an integer count of microseconds
//! rather than floating point seconds so that event ordering in the
//! priority queue is exact, never subject to float comparison drift.

use std::ops::{Add, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualTime(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Duration(u64);

impl VirtualTime {
    pub const ZERO: VirtualTime = VirtualTime(0);

    pub fn from_micros(micros: u64) -> Self {
        VirtualTime(micros)
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        VirtualTime((secs * 1_000_000.0).round() as u64)
    }

    pub fn as_micros(&self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }
}

impl Duration {
    pub const ZERO: Duration = Duration(0);

    pub fn from_micros(micros: u64) -> Self {
        Duration(micros)
    }

    pub fn from_millis(millis: u64) -> Self {
        Duration(millis * 1_000)
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        Duration((secs * 1_000_000.0).round() as u64)
    }

    pub fn as_micros(&self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }
}

impl Add<Duration> for VirtualTime {
    type Output = VirtualTime;

    fn add(self, rhs: Duration) -> Self::Output {
        VirtualTime(self.0 + rhs.0)
    }
}

impl Sub<VirtualTime> for VirtualTime {
    type Output = Duration;

    fn sub(self, rhs: VirtualTime) -> Self::Output {
        Duration(self.0.saturating_sub(rhs.0))
    }
}

//! Wall-clock time retrieval.
//!
//! Instants carry their UTC offset so day keys and hour-of-day are always
//! computed in the local time that was in effect when the instant was read.

use std::cell::Cell;

use chrono::{DateTime, Duration, FixedOffset, Local};

/// A point in time with the local offset it was observed in.
pub type Instant = DateTime<FixedOffset>;

/// Source of the current time.
pub trait Clock {
    fn now(&self) -> Instant;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Reads the system clock in the local timezone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Local::now().fixed_offset()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<Instant>,
}

impl ManualClock {
    pub const fn new(start: Instant) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    pub fn set(&self, instant: Instant) {
        self.now.set(instant);
    }

    pub fn advance_ms(&self, ms: i64) {
        self.now.set(self.now.get() + Duration::milliseconds(ms));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

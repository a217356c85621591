//! Wall-clock abstraction.
//!
//! Round and pause deadlines run on the async runtime's monotonic clock.
//! This trait only stamps facts that leave the engine: guess submission
//! times, room creation and game completion.

use chrono::{DateTime, Utc};

/// Source of wall-clock timestamps.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock that delegates to the system clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

//! Engine clock — the single source of "now".
//!
//! Every timestamp the engine mints (evaluation times, alert ids, dedup
//! windows) flows through one clock value, so a run against a fixed clock
//! and a fixed transaction set is fully reproducible.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineClock {
    /// Wall clock. Production default.
    System,
    /// Pinned instant. Used by tests and replay tooling.
    Fixed(DateTime<Utc>),
}

impl EngineClock {
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Self::System => Utc::now(),
            Self::Fixed(at) => *at,
        }
    }

    /// Milliseconds since the epoch at `now()`. Alert id suffix.
    pub fn epoch_ms(&self) -> i64 {
        self.now().timestamp_millis()
    }

    /// Pin the clock to `at`. A system clock becomes fixed.
    pub fn set(&mut self, at: DateTime<Utc>) {
        *self = Self::Fixed(at);
    }
}

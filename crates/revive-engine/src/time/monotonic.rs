use std::time::{Duration, Instant};

use revive_core::Timestamp;

/// Maps `Instant`s onto the core's millisecond [`Timestamp`]s.
///
/// One clock per runtime; timestamps from different clocks are not comparable.
#[derive(Debug, Copy, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(origin: Instant) -> Self {
        Self { origin }
    }

    #[inline]
    pub fn now(&self) -> Timestamp {
        self.timestamp_of(Instant::now())
    }

    /// Instants before the origin read as [`Timestamp::ZERO`].
    pub fn timestamp_of(&self, instant: Instant) -> Timestamp {
        let ms = instant.saturating_duration_since(self.origin).as_millis();
        Timestamp::from_millis(u64::try_from(ms).unwrap_or(u64::MAX))
    }

    /// The `Instant` a deadline corresponds to, for `ControlFlow::WaitUntil`.
    pub fn instant_at(&self, at: Timestamp) -> Instant {
        self.origin
            .checked_add(Duration::from_millis(at.as_millis()))
            .unwrap_or_else(|| self.origin + Duration::from_secs(60 * 60 * 24 * 365))
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

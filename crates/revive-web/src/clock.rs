use revive_core::Timestamp;
use web_sys::Performance;

/// `performance.now()` as a [`Timestamp`], falling back to `Date.now()`
/// relative to construction when the Performance API is missing.
pub(crate) struct PerformanceClock {
    performance: Option<Performance>,
    origin: f64,
}

impl PerformanceClock {
    pub(crate) fn new() -> Self {
        let performance = web_sys::window().and_then(|w| w.performance());
        if performance.is_none() {
            log::warn!("Performance API unavailable; using Date.now()");
        }
        Self {
            performance,
            origin: js_sys::Date::now(),
        }
    }

    pub(crate) fn now(&self) -> Timestamp {
        let ms = match &self.performance {
            Some(p) => p.now(),
            None => js_sys::Date::now() - self.origin,
        };
        Timestamp::from_millis_f64(ms)
    }
}

use std::time::{Duration, Instant};

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Seconds since the previous presented frame, clamped.
    pub dt: f32,

    /// Seconds since the clock was created. Keeps advancing while frames are paused.
    pub elapsed: f32,

    pub now: Instant,

    /// Frames presented so far. Frames skipped during a context loss do not count.
    pub frame_index: u64,
}

/// Per-window frame clock.
///
/// Delta time is clamped so a frame after a stall (debugger, minimized
/// window, device recovery) does not produce a huge step.
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    last: Instant,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::with_clamps(Duration::from_micros(100), Duration::from_millis(250))
    }

    pub fn with_clamps(dt_min: Duration, dt_max: Duration) -> Self {
        debug_assert!(dt_min <= dt_max);
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            frame_index: 0,
            dt_min,
            dt_max,
        }
    }

    /// Re-bases delta time. Called when frames resume after a context restore.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = now
            .saturating_duration_since(self.last)
            .clamp(self.dt_min, self.dt_max);
        self.last = now;

        let ft = FrameTime {
            dt: dt.as_secs_f32(),
            elapsed: now.saturating_duration_since(self.start).as_secs_f32(),
            now,
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        ft
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dt_is_clamped_after_a_stall() {
        let mut clock = FrameClock::new();
        let base = clock.last;
        let ft = clock.tick_at(base + Duration::from_secs(5));
        assert!((ft.dt - 0.25).abs() < 1e-6);
        assert!(ft.elapsed >= 5.0);
    }

    #[test]
    fn dt_has_a_floor() {
        let mut clock = FrameClock::new();
        let base = clock.last;
        let ft = clock.tick_at(base);
        assert!((ft.dt - 0.0001).abs() < 1e-6);
    }

    #[test]
    fn frame_index_counts_ticks() {
        let mut clock = FrameClock::new();
        let base = clock.last;
        assert_eq!(clock.tick_at(base).frame_index, 0);
        assert_eq!(clock.tick_at(base + Duration::from_millis(16)).frame_index, 1);
    }
}

use std::time::Duration;

use crate::error::PolicyError;

/// Delay curve between recovery attempts.
///
/// Both curves are deterministic in the attempt number and never decrease.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum Backoff {
    /// Every attempt waits `base_delay`.
    Constant,
    /// Attempt `n` waits `base_delay * n`.
    #[default]
    Linear,
}

/// Recovery configuration for one bound surface.
///
/// Immutable once handed to a [`crate::SurfaceBinding`] or
/// [`crate::RecoveryOrchestrator`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryPolicy {
    /// Number of probes before giving up. Must be at least 1.
    pub max_attempts: u32,

    /// Delay before the first probe; later delays follow `backoff`.
    pub base_delay: Duration,

    pub backoff: Backoff,

    /// Start recovering as soon as loss is observed.
    ///
    /// When false the surface stays `Lost` until the embedder calls `retry`.
    pub auto_recover: bool,

    /// Dispose every ledgered resource when the context is lost.
    ///
    /// Resources created on a lost context are invalid; the embedder recreates
    /// them after observing `Restored`.
    pub dispose_on_loss: bool,

    /// Sample `is_context_lost()` at this interval to catch loss that happened
    /// without an event. `None` disables polling.
    pub poll_interval: Option<Duration>,

    /// On the final attempt, ask the surface to replace its presentation
    /// target (fresh canvas / fresh wgpu surface) instead of reacquiring.
    pub replace_surface_on_last_attempt: bool,

    /// User-facing text for the fallback view.
    pub error_message: Option<String>,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            backoff: Backoff::Linear,
            auto_recover: true,
            dispose_on_loss: true,
            poll_interval: None,
            replace_surface_on_last_attempt: true,
            error_message: None,
        }
    }
}

impl RecoveryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn base_delay(mut self, d: Duration) -> Self {
        self.base_delay = d;
        self
    }

    pub fn backoff(mut self, b: Backoff) -> Self {
        self.backoff = b;
        self
    }

    pub fn auto_recover(mut self, on: bool) -> Self {
        self.auto_recover = on;
        self
    }

    pub fn dispose_on_loss(mut self, on: bool) -> Self {
        self.dispose_on_loss = on;
        self
    }

    pub fn poll_interval(mut self, every: Option<Duration>) -> Self {
        self.poll_interval = every;
        self
    }

    pub fn replace_surface_on_last_attempt(mut self, on: bool) -> Self {
        self.replace_surface_on_last_attempt = on;
        self
    }

    pub fn error_message(mut self, msg: impl Into<String>) -> Self {
        self.error_message = Some(msg.into());
        self
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        Ok(())
    }

    /// Delay before probe number `attempt` (1-based; 0 is treated as 1).
    pub fn delay(&self, attempt: u32) -> Duration {
        let n = attempt.max(1);
        match self.backoff {
            Backoff::Constant => self.base_delay,
            Backoff::Linear => self.base_delay.saturating_mul(n),
        }
    }
}

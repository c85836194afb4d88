use std::fmt;

use crate::policy::RecoveryPolicy;
use crate::time::Timestamp;

/// Health of one rendering surface's context.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ContextState {
    #[default]
    Healthy,
    /// Loss observed; no recovery attempt scheduled yet.
    Lost,
    /// Waiting for probe number `attempt` at `next_retry_at`.
    Recovering { attempt: u32, next_retry_at: Timestamp },
    /// A probe or a platform restore event brought the context back.
    Restored,
    /// Every allowed probe failed. Terminal.
    Failed { attempts_exhausted: u32 },
    /// The platform refused to create a context at all. Terminal.
    Unsupported,
}

impl ContextState {
    /// `true` for states in which the render loop may schedule frames.
    #[inline]
    pub fn frames_allowed(&self) -> bool {
        matches!(self, ContextState::Healthy | ContextState::Restored)
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ContextState::Failed { .. } | ContextState::Unsupported)
    }

    /// `true` while a loss episode is in progress.
    #[inline]
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, ContextState::Lost | ContextState::Recovering { .. })
    }
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextState::Healthy => f.write_str("healthy"),
            ContextState::Lost => f.write_str("lost"),
            ContextState::Recovering { attempt, next_retry_at } => {
                write!(f, "recovering (attempt {attempt} at {next_retry_at})")
            }
            ContextState::Restored => f.write_str("restored"),
            ContextState::Failed { attempts_exhausted } => {
                write!(f, "failed after {attempts_exhausted} attempts")
            }
            ContextState::Unsupported => f.write_str("unsupported"),
        }
    }
}

/// What a UI layer should show over the surface.
///
/// Pure function of state + policy; the core never draws overlays itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackView {
    /// Render normally.
    None,
    /// Spinner with attempt counter.
    Recovering { attempt: u32, max_attempts: u32 },
    /// Reload prompt.
    Failed { message: String },
    /// Diagnostics + troubleshooting checklist.
    Unsupported { message: String },
}

const DEFAULT_FAILED_MESSAGE: &str = "The graphics context could not be recovered. Reload the page to continue.";
const DEFAULT_UNSUPPORTED_MESSAGE: &str =
    "Your browser or graphics driver could not create a rendering context.";

impl FallbackView {
    pub fn for_state(state: &ContextState, policy: &RecoveryPolicy) -> Self {
        match state {
            ContextState::Healthy | ContextState::Restored => FallbackView::None,
            ContextState::Lost => FallbackView::Recovering {
                attempt: 0,
                max_attempts: policy.max_attempts,
            },
            ContextState::Recovering { attempt, .. } => FallbackView::Recovering {
                attempt: *attempt,
                max_attempts: policy.max_attempts,
            },
            ContextState::Failed { .. } => FallbackView::Failed {
                message: policy
                    .error_message
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FAILED_MESSAGE.to_string()),
            },
            ContextState::Unsupported => FallbackView::Unsupported {
                message: policy
                    .error_message
                    .clone()
                    .unwrap_or_else(|| DEFAULT_UNSUPPORTED_MESSAGE.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_only_when_healthy_or_restored() {
        let recovering = ContextState::Recovering {
            attempt: 1,
            next_retry_at: Timestamp::ZERO,
        };
        assert!(ContextState::Healthy.frames_allowed());
        assert!(ContextState::Restored.frames_allowed());
        assert!(!ContextState::Lost.frames_allowed());
        assert!(!recovering.frames_allowed());
        assert!(!ContextState::Failed { attempts_exhausted: 3 }.frames_allowed());
        assert!(!ContextState::Unsupported.frames_allowed());
    }

    #[test]
    fn fallback_uses_policy_message() {
        let policy = RecoveryPolicy::new().error_message("reload please");
        let view = FallbackView::for_state(&ContextState::Failed { attempts_exhausted: 3 }, &policy);
        assert_eq!(view, FallbackView::Failed { message: "reload please".into() });
    }

    #[test]
    fn fallback_counts_attempts() {
        let policy = RecoveryPolicy::new();
        let state = ContextState::Recovering {
            attempt: 2,
            next_retry_at: Timestamp::from_millis(5),
        };
        assert_eq!(
            FallbackView::for_state(&state, &policy),
            FallbackView::Recovering { attempt: 2, max_attempts: 3 }
        );
    }
}

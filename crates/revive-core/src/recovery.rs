//! Recovery orchestrator.
//!
//! ```text
//! Healthy  --loss-->            Lost
//! Lost     --auto_recover-->    Recovering(1, now + delay(1))
//! Recovering(n) --probe ok-->   Restored
//! Recovering(n) --probe fails, n < max--> Recovering(n + 1, now + delay(n + 1))
//! Recovering(n) --probe fails, n = max--> Failed(n)
//! Restored --loss-->            Lost
//! any non-terminal --creation error--> Unsupported
//! ```
//!
//! Timers are deadlines: the host loop sleeps until [`RecoveryOrchestrator::next_deadline`]
//! and then calls [`RecoveryOrchestrator::tick`]. At most one probe runs per tick.
//!
//! Every input takes `&mut self`, and subscribers only see `&ContextState`, so a
//! subscriber cannot re-enter the state machine.

use std::panic::{self, AssertUnwindSafe};

use crate::error::{PolicyError, ProbeError};
use crate::policy::RecoveryPolicy;
use crate::state::ContextState;
use crate::surface::{ContextDiagnostics, ProbeRequest, ProbeStrategy, SurfaceAdapter};
use crate::time::Timestamp;

/// A completed state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: ContextState,
    pub to: ContextState,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SubscriberId(u64);

type StateCallback = Box<dyn FnMut(&ContextState, &ContextState)>;

/// Cumulative recovery counters.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct RecoveryStats {
    pub losses_observed: u64,
    pub probes_attempted: u64,
    pub recoveries_succeeded: u64,
    pub gave_up: u64,
}

/// Drives one surface through loss and recovery.
pub struct RecoveryOrchestrator {
    policy: RecoveryPolicy,
    state: ContextState,
    attempt: u32,
    subscribers: Vec<(SubscriberId, StateCallback)>,
    next_subscriber: u64,
    diagnostics: Option<ContextDiagnostics>,
    stats: RecoveryStats,
    disposed: bool,
}

impl RecoveryOrchestrator {
    pub fn new(policy: RecoveryPolicy) -> Result<Self, PolicyError> {
        policy.validate()?;
        Ok(Self {
            policy,
            state: ContextState::Healthy,
            attempt: 0,
            subscribers: Vec::new(),
            next_subscriber: 1,
            diagnostics: None,
            stats: RecoveryStats::default(),
            disposed: false,
        })
    }

    #[inline]
    pub fn current_state(&self) -> &ContextState {
        &self.state
    }

    #[inline]
    pub fn policy(&self) -> &RecoveryPolicy {
        &self.policy
    }

    /// Attempts made in the current (or last failed) loss episode.
    #[inline]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    #[inline]
    pub fn stats(&self) -> RecoveryStats {
        self.stats
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    #[inline]
    pub fn frames_allowed(&self) -> bool {
        !self.disposed && self.state.frames_allowed()
    }

    /// Diagnostics captured with the creation error, if one occurred.
    pub fn creation_diagnostics(&self) -> Option<&ContextDiagnostics> {
        self.diagnostics.as_ref()
    }

    /// When the pending probe is due. `None` if nothing is scheduled.
    pub fn next_deadline(&self) -> Option<Timestamp> {
        if self.disposed {
            return None;
        }
        match self.state {
            ContextState::Recovering { next_retry_at, .. } => Some(next_retry_at),
            _ => None,
        }
    }

    /// Subscribes to transitions. The callback receives `(previous, next)`.
    ///
    /// A panicking callback is caught and logged; other subscribers still run.
    pub fn on_state_change<F>(&mut self, callback: F) -> SubscriberId
    where
        F: FnMut(&ContextState, &ContextState) + 'static,
    {
        let id = SubscriberId(self.next_subscriber);
        self.next_subscriber += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn remove_subscriber(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    // ── inputs ────────────────────────────────────────────────────────────

    /// Loss observed through an event or a poll.
    pub fn notify_loss<S>(&mut self, now: Timestamp, surface: &mut S) -> Vec<Transition>
    where
        S: SurfaceAdapter + ?Sized,
    {
        let mut out = Vec::new();
        if self.disposed {
            return out;
        }

        match self.state {
            ContextState::Healthy | ContextState::Restored => {
                self.stats.losses_observed += 1;
                surface.cancel_frame();
                self.transition(ContextState::Lost, &mut out);

                if self.policy.auto_recover {
                    self.schedule(1, now, &mut out);
                }
            }
            ContextState::Lost | ContextState::Recovering { .. } => {
                log::debug!("loss reported while already {}; ignoring", self.state);
            }
            ContextState::Failed { .. } | ContextState::Unsupported => {
                log::debug!("loss reported in terminal state {}; ignoring", self.state);
            }
        }
        out
    }

    /// Platform reports the context is usable again.
    pub fn notify_restored<S>(&mut self, surface: &mut S) -> Vec<Transition>
    where
        S: SurfaceAdapter + ?Sized,
    {
        let mut out = Vec::new();
        if self.disposed {
            return out;
        }

        match self.state {
            ContextState::Lost | ContextState::Recovering { .. } => {
                log::info!("context restored by platform");
                self.restore(surface, &mut out);
            }
            ContextState::Healthy | ContextState::Restored => {
                log::debug!("restore event while {}; ignoring", self.state);
            }
            ContextState::Failed { .. } | ContextState::Unsupported => {
                log::warn!("restore event after terminal state {}; reload required", self.state);
            }
        }
        out
    }

    /// The platform refused to create a context. Never enters the retry loop.
    pub fn notify_creation_error<S>(
        &mut self,
        diagnostics: ContextDiagnostics,
        surface: &mut S,
    ) -> Vec<Transition>
    where
        S: SurfaceAdapter + ?Sized,
    {
        let mut out = Vec::new();
        if self.disposed || self.state.is_terminal() {
            return out;
        }

        log::error!("context creation failed: {diagnostics}");
        surface.cancel_frame();
        self.diagnostics = Some(diagnostics);
        self.transition(ContextState::Unsupported, &mut out);
        out
    }

    /// Starts recovery from `Lost` by hand (used when `auto_recover` is off).
    pub fn begin_recovery(&mut self, now: Timestamp) -> Vec<Transition> {
        let mut out = Vec::new();
        if self.disposed {
            return out;
        }
        if self.state == ContextState::Lost {
            self.schedule(1, now, &mut out);
        } else {
            log::debug!("begin_recovery ignored in state {}", self.state);
        }
        out
    }

    /// Runs the pending probe if its deadline has passed.
    pub fn tick<S>(&mut self, now: Timestamp, surface: &mut S) -> Vec<Transition>
    where
        S: SurfaceAdapter + ?Sized,
    {
        let mut out = Vec::new();
        if self.disposed {
            return out;
        }

        let ContextState::Recovering { attempt, next_retry_at } = self.state else {
            return out;
        };
        if now < next_retry_at {
            return out;
        }

        let strategy = if attempt >= self.policy.max_attempts && self.policy.replace_surface_on_last_attempt {
            ProbeStrategy::ReplaceSurface
        } else {
            ProbeStrategy::Reacquire
        };

        self.stats.probes_attempted += 1;
        log::info!("recovery probe {attempt}/{} ({strategy:?})", self.policy.max_attempts);

        match run_probe(surface, ProbeRequest { attempt, strategy }) {
            Ok(()) => self.restore(surface, &mut out),
            Err(e) => {
                log::warn!("attempt {attempt}: {e}");
                if attempt < self.policy.max_attempts {
                    self.schedule(attempt + 1, now, &mut out);
                } else {
                    self.stats.gave_up += 1;
                    log::error!("context recovery gave up after {attempt} attempts");
                    self.transition(ContextState::Failed { attempts_exhausted: attempt }, &mut out);
                }
            }
        }
        out
    }

    /// Cancels the pending probe and drops all subscribers. Idempotent.
    ///
    /// After disposal every input is ignored and no callback fires.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.subscribers.clear();
        log::debug!("recovery orchestrator disposed in state {}", self.state);
    }

    // ── internals ─────────────────────────────────────────────────────────

    fn schedule(&mut self, attempt: u32, now: Timestamp, out: &mut Vec<Transition>) {
        self.attempt = attempt;
        let next_retry_at = now + self.policy.delay(attempt);
        self.transition(ContextState::Recovering { attempt, next_retry_at }, out);
    }

    fn restore<S>(&mut self, surface: &mut S, out: &mut Vec<Transition>)
    where
        S: SurfaceAdapter + ?Sized,
    {
        self.stats.recoveries_succeeded += 1;
        self.attempt = 0;
        self.transition(ContextState::Restored, out);
        surface.resume_frames();
    }

    fn transition(&mut self, next: ContextState, out: &mut Vec<Transition>) {
        let prev = std::mem::replace(&mut self.state, next.clone());
        log::info!("context state: {prev} -> {next}");

        for (id, callback) in &mut self.subscribers {
            let result = panic::catch_unwind(AssertUnwindSafe(|| callback(&prev, &next)));
            if result.is_err() {
                log::error!("state-change subscriber {id:?} panicked; continuing");
            }
        }

        out.push(Transition { from: prev, to: next });
    }
}

fn run_probe<S>(surface: &mut S, request: ProbeRequest) -> Result<(), ProbeError>
where
    S: SurfaceAdapter + ?Sized,
{
    surface.probe(request)?;
    if surface.is_context_lost() == Some(true) {
        return Err(ProbeError::new("context still lost after probe"));
    }
    Ok(())
}

use crate::error::BindError;
use crate::ledger::{DisposeStats, ResourceLedger};
use crate::monitor::{ContextMonitor, ContextSignal, Subscription};
use crate::policy::RecoveryPolicy;
use crate::recovery::{RecoveryOrchestrator, SubscriberId, Transition};
use crate::state::{ContextState, FallbackView};
use crate::surface::{ContextDiagnostics, SurfaceAdapter};
use crate::time::Timestamp;

/// One rendering surface bound to a monitor, an orchestrator and a ledger.
///
/// Lifecycle:
/// - [`mount`](Self::mount) installs listeners
/// - the host loop calls [`pump`](Self::pump) whenever it wakes up
/// - [`unmount`](Self::unmount) (or drop) cancels pending work, disposes every
///   ledgered resource, then removes listeners
///
/// Bindings are independent; a host may hold any number of them.
pub struct SurfaceBinding<S: SurfaceAdapter> {
    surface: S,
    monitor: ContextMonitor,
    subscription: Subscription,
    orchestrator: RecoveryOrchestrator,
    ledger: ResourceLedger,
    mounted: bool,
}

impl<S: SurfaceAdapter> SurfaceBinding<S> {
    pub fn mount(mut surface: S, policy: RecoveryPolicy) -> Result<Self, BindError> {
        let monitor = ContextMonitor::new(policy.poll_interval);
        let orchestrator = RecoveryOrchestrator::new(policy)?;
        let subscription = monitor.bind(&mut surface)?;

        Ok(Self {
            surface,
            monitor,
            subscription,
            orchestrator,
            ledger: ResourceLedger::new(),
            mounted: true,
        })
    }

    #[inline]
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    #[inline]
    pub fn state(&self) -> &ContextState {
        self.orchestrator.current_state()
    }

    #[inline]
    pub fn policy(&self) -> &RecoveryPolicy {
        self.orchestrator.policy()
    }

    #[inline]
    pub fn orchestrator(&self) -> &RecoveryOrchestrator {
        &self.orchestrator
    }

    /// `true` when the render loop may request the next frame.
    #[inline]
    pub fn frames_allowed(&self) -> bool {
        self.mounted && self.orchestrator.frames_allowed()
    }

    pub fn fallback_view(&self) -> FallbackView {
        FallbackView::for_state(self.state(), self.policy())
    }

    pub fn creation_diagnostics(&self) -> Option<&ContextDiagnostics> {
        self.orchestrator.creation_diagnostics()
    }

    #[inline]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    #[inline]
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    #[inline]
    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    #[inline]
    pub fn ledger_mut(&mut self) -> &mut ResourceLedger {
        &mut self.ledger
    }

    /// Split borrow for scene code that creates resources on the surface and
    /// registers them in the same breath.
    pub fn parts_mut(&mut self) -> (&mut S, &mut ResourceLedger) {
        (&mut self.surface, &mut self.ledger)
    }

    pub fn on_state_change<F>(&mut self, callback: F) -> SubscriberId
    where
        F: FnMut(&ContextState, &ContextState) + 'static,
    {
        self.orchestrator.on_state_change(callback)
    }

    pub fn remove_subscriber(&mut self, id: SubscriberId) -> bool {
        self.orchestrator.remove_subscriber(id)
    }

    /// Earliest moment [`pump`](Self::pump) has work to do (retry or poll).
    pub fn next_deadline(&self) -> Option<Timestamp> {
        if !self.mounted {
            return None;
        }
        let retry = self.orchestrator.next_deadline();
        let poll = if self.orchestrator.current_state().is_terminal() {
            None
        } else {
            self.monitor.next_poll_at()
        };
        match (retry, poll) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Processes queued signals, a due poll, and a due retry, in that order.
    pub fn pump(&mut self, now: Timestamp) -> Vec<Transition> {
        let mut out = Vec::new();
        if !self.mounted {
            return out;
        }

        for signal in self.subscription.drain() {
            let t = match signal {
                ContextSignal::Lost => self.orchestrator.notify_loss(now, &mut self.surface),
                ContextSignal::Restored => self.orchestrator.notify_restored(&mut self.surface),
                ContextSignal::CreationError(diag) => {
                    self.orchestrator.notify_creation_error(diag, &mut self.surface)
                }
            };
            self.apply(&t);
            out.extend(t);
        }

        if self.monitor.poll_due(now)
            && self.orchestrator.frames_allowed()
            && self.monitor.poll(&self.surface) == ContextState::Lost
        {
            log::warn!("poll detected a context loss without an event");
            let t = self.orchestrator.notify_loss(now, &mut self.surface);
            self.apply(&t);
            out.extend(t);
        }

        let t = self.orchestrator.tick(now, &mut self.surface);
        self.apply(&t);
        out.extend(t);

        out
    }

    /// Reports a loss detected by the embedder itself (e.g. a failed frame).
    pub fn report_loss(&mut self, now: Timestamp) -> Vec<Transition> {
        if !self.mounted {
            return Vec::new();
        }
        let t = self.orchestrator.notify_loss(now, &mut self.surface);
        self.apply(&t);
        t
    }

    /// Starts recovery by hand from `Lost` (e.g. a "retry" button with
    /// `auto_recover` disabled).
    pub fn retry(&mut self, now: Timestamp) -> Vec<Transition> {
        if !self.mounted {
            return Vec::new();
        }
        self.orchestrator.begin_recovery(now)
    }

    fn apply(&mut self, transitions: &[Transition]) {
        for t in transitions {
            if t.to == ContextState::Lost && self.orchestrator.policy().dispose_on_loss {
                let stats = self.ledger.dispose_all();
                log::info!("context lost; released {stats}");
            }
        }
    }

    /// Tears the binding down. Safe to call more than once; later calls return
    /// empty stats.
    ///
    /// Order: cancel the pending retry and frame, dispose resources, remove
    /// listeners. No state-change callback fires afterwards.
    pub fn unmount(&mut self) -> DisposeStats {
        if !self.mounted {
            return DisposeStats::default();
        }
        self.mounted = false;

        self.orchestrator.dispose();
        self.surface.cancel_frame();
        let stats = self.ledger.dispose_all();
        self.monitor.unbind(&mut self.subscription, &mut self.surface);

        log::debug!("surface unmounted; released {stats}");
        stats
    }
}

impl<S: SurfaceAdapter> Drop for SurfaceBinding<S> {
    fn drop(&mut self) {
        self.unmount();
    }
}

//! Context health monitor.
//!
//! Converts platform signals into [`ContextSignal`]s and offers a best-effort
//! [`ContextMonitor::poll`]. The monitor only reports; state transitions are
//! made by the orchestrator.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::error::BindError;
use crate::state::ContextState;
use crate::surface::{ContextDiagnostics, SurfaceAdapter};
use crate::time::Timestamp;

/// Event reported by a surface's listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextSignal {
    Lost,
    Restored,
    CreationError(ContextDiagnostics),
}

/// Platform loss event whose default action can be suppressed.
///
/// If a cancelable loss event is not prevented, the platform may never
/// restore the context.
pub trait LossEvent {
    fn is_cancelable(&self) -> bool;
    fn prevent_default(&mut self);
}

struct SinkInner {
    active: AtomicBool,
    queue: Mutex<VecDeque<ContextSignal>>,
}

/// Listener endpoint handed to [`SurfaceAdapter::attach`].
///
/// Cheap to clone. Signals may be produced from another thread (wgpu invokes
/// its device-lost callback wherever it likes); they are queued and drained on
/// the thread that owns the binding. Once unbound, the sink drops everything.
#[derive(Clone)]
pub struct SignalSink {
    inner: Arc<SinkInner>,
}

impl SignalSink {
    fn new() -> Self {
        Self {
            inner: Arc::new(SinkInner {
                active: AtomicBool::new(true),
                queue: Mutex::new(VecDeque::new()),
            }),
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Reports a cancelable loss event. Must be called during event dispatch:
    /// `prevent_default` only has an effect there.
    pub fn context_lost(&self, event: &mut dyn LossEvent) {
        if !self.is_active() {
            return;
        }
        if event.is_cancelable() {
            event.prevent_default();
        }
        self.push(ContextSignal::Lost);
    }

    /// Reports a loss that carries no event object (e.g. wgpu device loss).
    pub fn device_lost(&self) {
        self.push(ContextSignal::Lost);
    }

    pub fn context_restored(&self) {
        self.push(ContextSignal::Restored);
    }

    pub fn creation_error(&self, diagnostics: ContextDiagnostics) {
        self.push(ContextSignal::CreationError(diagnostics));
    }

    fn push(&self, signal: ContextSignal) {
        if !self.is_active() {
            log::debug!("dropping {signal:?}: listener unbound");
            return;
        }
        self.inner
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(signal);
    }

    fn drain(&self) -> Vec<ContextSignal> {
        self.inner
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    fn deactivate(&self) {
        self.inner.active.store(false, Ordering::Release);
        self.inner
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Handle returned by [`ContextMonitor::bind`].
pub struct Subscription {
    sink: SignalSink,
    bound: bool,
}

impl Subscription {
    #[inline]
    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Takes all queued signals in arrival order.
    pub fn drain(&self) -> Vec<ContextSignal> {
        if !self.bound {
            return Vec::new();
        }
        self.sink.drain()
    }
}

/// Context health monitor for one surface.
#[derive(Debug, Clone, Default)]
pub struct ContextMonitor {
    poll_interval: Option<Duration>,
    last_poll: Option<Timestamp>,
}

impl ContextMonitor {
    pub fn new(poll_interval: Option<Duration>) -> Self {
        Self {
            poll_interval,
            last_poll: None,
        }
    }

    /// Installs listeners on `surface`.
    pub fn bind<S>(&self, surface: &mut S) -> Result<Subscription, BindError>
    where
        S: SurfaceAdapter + ?Sized,
    {
        if surface.is_torn_down() {
            return Err(BindError::invalid_surface("surface already torn down"));
        }

        let sink = SignalSink::new();
        surface.attach(sink.clone())?;
        log::debug!("context monitor bound");

        Ok(Subscription { sink, bound: true })
    }

    /// Removes listeners. Safe to call more than once.
    pub fn unbind<S>(&self, subscription: &mut Subscription, surface: &mut S)
    where
        S: SurfaceAdapter + ?Sized,
    {
        if !subscription.bound {
            return;
        }
        subscription.bound = false;
        subscription.sink.deactivate();
        surface.detach();
        log::debug!("context monitor unbound");
    }

    /// On-demand health reading. Best-effort: an unknown reading is `Healthy`.
    pub fn poll<S>(&self, surface: &S) -> ContextState
    where
        S: SurfaceAdapter + ?Sized,
    {
        if surface.is_torn_down() {
            return ContextState::Failed { attempts_exhausted: 0 };
        }
        match surface.is_context_lost() {
            Some(true) => ContextState::Lost,
            Some(false) | None => ContextState::Healthy,
        }
    }

    /// Returns `true` (and records `now`) if a periodic poll is due.
    pub fn poll_due(&mut self, now: Timestamp) -> bool {
        let Some(every) = self.poll_interval else {
            return false;
        };
        match self.last_poll {
            Some(last) if now.saturating_since(last) < every => false,
            _ => {
                self.last_poll = Some(now);
                true
            }
        }
    }

    /// When the next periodic poll is due, if polling is enabled.
    pub fn next_poll_at(&self) -> Option<Timestamp> {
        let every = self.poll_interval?;
        Some(match self.last_poll {
            Some(last) => last + every,
            None => Timestamp::ZERO,
        })
    }
}

use std::cell::RefCell;
use std::rc::Rc;

use revive_core::{
    BindError, ContextDiagnostics, ContextState, DisposeStats, FallbackView, RecoveryPolicy,
    RecoveryStats, ResourceLedger, SubscriberId, SurfaceAdapter, SurfaceBinding, Timestamp,
};
use wasm_bindgen::closure::Closure;
use web_sys::HtmlCanvasElement;

use crate::canvas::CanvasSurface;
use crate::clock::PerformanceClock;
use crate::gl::GlContext;
use crate::options::WebOptions;
use crate::schedule::Waker;

/// Passed to the draw callback every animation frame.
#[derive(Debug, Copy, Clone)]
pub struct FrameInfo {
    pub now: Timestamp,
    /// Changes whenever the context was acquired or restored; rebuild resources then.
    pub generation: u32,
    pub frame_index: u64,
}

type DrawFn = Box<dyn FnMut(&GlContext, &mut ResourceLedger, &FrameInfo)>;

struct HostInner {
    binding: SurfaceBinding<CanvasSurface>,
    clock: PerformanceClock,
    draw: DrawFn,
    waker: Rc<Waker>,
    frame_index: u64,
}

impl HostInner {
    /// Processes pending signals and the due retry, then re-arms the timer.
    fn pump(&mut self) {
        let now = self.clock.now();
        for t in self.binding.pump(now) {
            log::info!("canvas context {} -> {}", t.from, t.to);
            if t.to == ContextState::Restored {
                // A restored context keeps its JS object but none of its contents.
                self.binding.surface_mut().bump_generation();
            }
        }
        self.schedule(now);
    }

    fn schedule(&self, now: Timestamp) {
        match self.binding.next_deadline() {
            Some(at) => {
                let delay = at.saturating_since(now).as_millis();
                self.waker.wake_in(i32::try_from(delay).unwrap_or(i32::MAX));
            }
            None => self.waker.cancel(),
        }
    }

    fn frame(&mut self) {
        self.binding.surface_mut().frame_fired();
        if !self.binding.frames_allowed() {
            return;
        }

        let now = self.clock.now();
        let (surface, ledger) = self.binding.parts_mut();
        let Some(gl) = surface.context().cloned() else {
            return;
        };
        let info = FrameInfo {
            now,
            generation: surface.generation(),
            frame_index: self.frame_index,
        };

        (self.draw)(&gl, ledger, &info);
        self.frame_index = self.frame_index.wrapping_add(1);

        if gl.is_context_lost() {
            // The lost event may not have been delivered yet.
            for t in self.binding.report_loss(now) {
                log::info!("canvas context {} -> {}", t.from, t.to);
            }
            self.schedule(now);
        } else {
            self.binding.surface_mut().request_frame();
        }
    }
}

impl Drop for HostInner {
    fn drop(&mut self) {
        self.waker.cancel();
    }
}

/// Drives one canvas: recovery timers, the animation-frame loop, and the
/// user's draw callback.
///
/// Frames stop while the context is unhealthy and resume after a restore.
pub struct WebHost {
    inner: Rc<RefCell<HostInner>>,
}

impl WebHost {
    pub fn mount<F>(
        canvas: HtmlCanvasElement,
        options: WebOptions,
        policy: RecoveryPolicy,
        draw: F,
    ) -> Result<Self, BindError>
    where
        F: FnMut(&GlContext, &mut ResourceLedger, &FrameInfo) + 'static,
    {
        let surface = CanvasSurface::new(canvas, options);
        let waker = surface.waker();
        let binding = SurfaceBinding::mount(surface, policy)?;

        let inner = Rc::new(RefCell::new(HostInner {
            binding,
            clock: PerformanceClock::new(),
            draw: Box::new(draw),
            waker: waker.clone(),
            frame_index: 0,
        }));

        let weak = Rc::downgrade(&inner);
        waker.set_callback(Closure::<dyn FnMut()>::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            // Every borrower re-arms the timer before releasing, so a busy
            // host can skip this wake-up.
            let Ok(mut host) = inner.try_borrow_mut() else {
                return;
            };
            host.waker.fired();
            host.pump();
        }));

        let weak = Rc::downgrade(&inner);
        let frame_cb = Closure::<dyn FnMut(f64)>::new(move |_ts: f64| {
            if let Some(inner) = weak.upgrade() {
                if let Ok(mut host) = inner.try_borrow_mut() {
                    host.frame();
                }
            }
        });

        {
            let mut host = inner.borrow_mut();
            host.binding.surface_mut().set_frame_callback(frame_cb);
            host.pump();
            if host.binding.frames_allowed() {
                host.binding.surface_mut().resume_frames();
            }
        }

        Ok(Self { inner })
    }

    pub fn state(&self) -> ContextState {
        self.inner.borrow().binding.state().clone()
    }

    pub fn fallback_view(&self) -> FallbackView {
        self.inner.borrow().binding.fallback_view()
    }

    pub fn stats(&self) -> RecoveryStats {
        self.inner.borrow().binding.orchestrator().stats()
    }

    pub fn diagnostics(&self) -> ContextDiagnostics {
        let host = self.inner.borrow();
        match host.binding.creation_diagnostics() {
            Some(diag) => diag.clone(),
            None => host.binding.surface().diagnostics(),
        }
    }

    /// The canvas on the page (it changes if recovery had to replace it).
    pub fn canvas(&self) -> HtmlCanvasElement {
        self.inner.borrow().binding.surface().canvas().clone()
    }

    pub fn on_state_change<F>(&self, callback: F) -> SubscriberId
    where
        F: FnMut(&ContextState, &ContextState) + 'static,
    {
        self.inner.borrow_mut().binding.on_state_change(callback)
    }

    pub fn remove_subscriber(&self, id: SubscriberId) -> bool {
        self.inner.borrow_mut().binding.remove_subscriber(id)
    }

    /// Manual retry from `Lost` (policies with `auto_recover` off).
    pub fn retry(&self) {
        let mut host = self.inner.borrow_mut();
        let now = host.clock.now();
        host.binding.retry(now);
        host.schedule(now);
    }

    /// Forces a context loss through `WEBGL_lose_context`.
    pub fn simulate_loss(&self) -> bool {
        let lost = self.inner.borrow().binding.surface().simulate_loss();
        self.inner.borrow().waker.wake_now();
        lost
    }

    /// Stops timers and frames, disposes every tracked resource, and removes
    /// listeners. Idempotent.
    pub fn unmount(&self) -> DisposeStats {
        let mut host = self.inner.borrow_mut();
        host.waker.cancel();
        host.binding.unmount()
    }
}

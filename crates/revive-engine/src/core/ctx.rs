use std::rc::Rc;

use revive_core::{FallbackView, GpuResource, RecoveryStats, ResourceLedger, Transition};
use winit::window::{Window, WindowId};

use crate::device::{Gpu, SurfaceErrorAction};
use crate::render::{clear_pass, RenderCtx, RenderTarget};
use crate::time::FrameTime;
use crate::window::RuntimeCtx;

use super::app::AppControl;

/// Per-window handles and immutable window metadata.
pub struct WindowCtx<'a> {
    pub id: WindowId,
    pub window: &'a Window,
}

impl<'a> WindowCtx<'a> {
    pub fn set_title(&self, title: &str) {
        self.window.set_title(title);
    }
}

/// Passed to `App::on_surface_ready`.
pub struct SurfaceCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub gpu: &'a Gpu<'w>,
    pub ledger: &'a mut ResourceLedger,
}

impl SurfaceCtx<'_, '_> {
    /// Registers `resource` for disposal on loss and on window close.
    pub fn track<R>(&mut self, resource: R) -> Rc<R>
    where
        R: GpuResource + 'static,
    {
        let rc = Rc::new(resource);
        self.ledger.register(&rc);
        rc
    }
}

/// Passed to `App::on_context_state`.
pub struct StateCtx<'a> {
    pub window: WindowCtx<'a>,
    pub transition: &'a Transition,
    pub fallback: FallbackView,
    pub stats: RecoveryStats,
    pub runtime: &'a mut RuntimeCtx,
}

/// Per-frame context passed to `core::App::on_frame`.
///
/// Lifetimes:
/// - `'a` is the duration of the callback invocation
/// - `'w` is the window-borrow lifetime carried by `Gpu<'w>`
pub struct FrameCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub gpu: &'a mut Gpu<'w>,
    pub ledger: &'a mut ResourceLedger,
    pub time: FrameTime,
    pub runtime: &'a mut RuntimeCtx,
    pub(crate) device_lost: bool,
}

impl<'a, 'w> FrameCtx<'a, 'w> {
    /// Clears the surface with `clear`, calls `draw` with a ready [`RenderCtx`] and
    /// [`RenderTarget`], then presents the frame.
    ///
    /// A frame that fails because the device is gone is dropped and the loss
    /// is reported to recovery once the callback returns.
    pub fn render<F>(&mut self, clear: wgpu::Color, draw: F) -> AppControl
    where
        F: FnOnce(&RenderCtx<'_>, &mut RenderTarget<'_>),
    {
        if self.gpu.is_lost() {
            self.device_lost = true;
            return AppControl::Continue;
        }

        let mut frame = match self.gpu.begin_frame() {
            Ok(f) => f,
            Err(err) => {
                match self.gpu.handle_surface_error(&err) {
                    SurfaceErrorAction::Fatal => return AppControl::Exit,
                    SurfaceErrorAction::DeviceLost => self.device_lost = true,
                    SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => {}
                }
                return AppControl::Continue;
            }
        };

        clear_pass(&mut frame.encoder, &frame.view, clear);

        let rctx = RenderCtx::new(
            self.gpu.device(),
            self.gpu.queue(),
            self.gpu.surface_format(),
            frame.extent(),
        );

        // RenderTarget borrows frame.encoder; dropped before submit() takes frame.
        {
            let mut target = RenderTarget::new(&mut frame.encoder, &frame.view);
            draw(&rctx, &mut target);
        }

        self.window.window.pre_present_notify();
        self.gpu.submit(frame);

        if self.gpu.is_lost() {
            self.device_lost = true;
        }
        AppControl::Continue
    }

    /// Destroys this window's device. Recovery takes over on the next wake-up.
    pub fn simulate_device_loss(&mut self) {
        self.gpu.simulate_loss();
        self.device_lost = true;
    }
}

use winit::event::WindowEvent;
use winit::window::WindowId;

use super::ctx::{FrameCtx, StateCtx, SurfaceCtx};

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract implemented by higher layers.
///
/// Per window, the runtime calls:
/// - `on_surface_ready` when a device is usable (first mount, and after every restore)
/// - `on_frame` once per frame, only while the context is healthy
/// - `on_context_state` for every recovery transition
pub trait App {
    fn on_window_event(&mut self, window_id: WindowId, event: &WindowEvent) -> AppControl {
        let _ = (window_id, event);
        AppControl::Continue
    }

    /// (Re)create GPU resources here and register them in `ctx.ledger`.
    fn on_surface_ready(&mut self, ctx: &mut SurfaceCtx<'_, '_>) {
        let _ = ctx;
    }

    /// Resources registered before a loss have already been destroyed when
    /// the `Lost` transition arrives; drop any handles to them.
    fn on_context_state(&mut self, ctx: &mut StateCtx<'_>) -> AppControl {
        let _ = ctx;
        AppControl::Continue
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl;
}

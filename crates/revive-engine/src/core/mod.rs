//! Engine-facing contracts.
//!
//! This module defines the interface between the runtime (platform loop) and
//! applications: the [`App`] trait and the contexts handed to its callbacks.

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::{FrameCtx, StateCtx, SurfaceCtx, WindowCtx};

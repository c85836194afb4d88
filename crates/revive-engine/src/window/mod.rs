//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and one `SurfaceBinding` per window, pumps
//! recovery between events, and sleeps until the next recovery deadline.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig, RuntimeCtx};

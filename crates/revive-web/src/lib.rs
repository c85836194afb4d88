//! Browser platform for `revive-core`.
//!
//! [`CanvasSurface`] adapts an `HtmlCanvasElement` + WebGL context to the
//! core's surface contract; [`WebHost`] runs the timers and the
//! animation-frame loop around it. The `ReviveCanvas` class exposes the same
//! to JavaScript.
//!
//! Everything except [`options`] only exists on `wasm32`.

pub mod options;

#[cfg(target_arch = "wasm32")]
mod bindings;
#[cfg(target_arch = "wasm32")]
mod canvas;
#[cfg(target_arch = "wasm32")]
mod clock;
#[cfg(target_arch = "wasm32")]
mod gl;
#[cfg(target_arch = "wasm32")]
mod host;
#[cfg(target_arch = "wasm32")]
mod resources;
#[cfg(target_arch = "wasm32")]
mod schedule;

#[cfg(target_arch = "wasm32")]
pub use bindings::ReviveCanvas;
#[cfg(target_arch = "wasm32")]
pub use canvas::CanvasSurface;
#[cfg(target_arch = "wasm32")]
pub use gl::GlContext;
#[cfg(target_arch = "wasm32")]
pub use host::{FrameInfo, WebHost};
#[cfg(target_arch = "wasm32")]
pub use resources::{GlGeometry, GlMaterial, GlTexture};

pub use options::{ContextKind, PowerPreference, WebOptions};

//! GPU rendering helpers.
//!
//! Apps record their own passes into a [`RenderTarget`]. The runtime owns the
//! frame around them: acquire, clear, submit, present.

mod ctx;

pub(crate) use ctx::clear_pass;
pub use ctx::{RenderCtx, RenderTarget};

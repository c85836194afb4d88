//! Revive engine crate.
//!
//! Native platform for `revive-core`: a winit runtime whose windows each own a
//! wgpu device bound to a [`revive_core::SurfaceBinding`]. Device loss pauses the
//! window's frames, disposes its ledgered resources, and retries device
//! creation with backoff.

pub mod core;
pub mod device;
pub mod logging;
pub mod render;
pub mod time;
pub mod window;

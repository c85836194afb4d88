//! GPU device + surface management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue, and recreating them after loss
//! - creating & configuring the Surface (swapchain)
//! - acquiring frames and providing encoders/views for rendering
//! - reporting device loss into a `revive_core::SignalSink`
//! - ledger-aware wrappers for buffers and textures

mod frame;
mod gpu;
mod init;
mod loss;
mod resources;
mod surface;
mod window_surface;

pub use frame::{GpuFrame, SurfaceErrorAction};
pub use gpu::Gpu;
pub use init::GpuInit;
pub use loss::LossWatch;
pub use resources::{GpuGeometry, GpuMaterial, GpuTexture, MaterialParams, Vertex};
pub use window_surface::WindowSurface;

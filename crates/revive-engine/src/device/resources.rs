//! Ledger-tracked wgpu resources.
//!
//! Each wrapper owns one wgpu object and a [`ResourceHandle`]. Disposal calls
//! the explicit `destroy()` wgpu exposes, so memory is released at a known
//! point instead of whenever the last clone of the handle happens to drop.

use std::cell::Cell;

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use revive_core::{DisposeError, GpuResource, ResourceHandle, ResourceKind};
use wgpu::util::DeviceExt;

/// Interleaved position + color vertex.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

/// Flat material parameters, uploaded as a uniform buffer.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct MaterialParams {
    pub tint: [f32; 4],
}

/// Shared disposal bookkeeping for the wrappers.
#[derive(Debug, Default)]
struct Disposed(Cell<bool>);

impl Disposed {
    /// Returns `true` the first time only.
    fn mark(&self) -> bool {
        !self.0.replace(true)
    }

    fn get(&self) -> bool {
        self.0.get()
    }

    /// Like [`mark`](Self::mark); repeats are logged and otherwise ignored.
    fn first_destroy(&self, handle: ResourceHandle) -> bool {
        if self.mark() {
            return true;
        }
        log::warn!("resource {handle} already destroyed; ignoring");
        false
    }
}

fn vertex_count(vertices: &[Vertex]) -> Result<u32> {
    u32::try_from(vertices.len())
        .with_context(|| format!("{} vertices exceed a single draw", vertices.len()))
}

/// Vertex buffer.
pub struct GpuGeometry {
    handle: ResourceHandle,
    label: Option<String>,
    buffer: wgpu::Buffer,
    vertex_count: u32,
    disposed: Disposed,
}

impl GpuGeometry {
    /// Fails when `vertices` holds more than `u32::MAX` entries, which no draw call could address.
    pub fn new(device: &wgpu::Device, label: Option<&str>, vertices: &[Vertex]) -> Result<Self> {
        let vertex_count = vertex_count(vertices)?;
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label,
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Ok(Self {
            handle: ResourceHandle::next(),
            label: label.map(str::to_owned),
            buffer,
            vertex_count,
            disposed: Disposed::default(),
        })
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

impl GpuResource for GpuGeometry {
    fn handle(&self) -> ResourceHandle {
        self.handle
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Geometry
    }

    fn dispose(&self) -> Result<(), DisposeError> {
        if self.disposed.first_destroy(self.handle) {
            self.buffer.destroy();
        }
        Ok(())
    }

    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

/// Uniform buffer holding [`MaterialParams`].
pub struct GpuMaterial {
    handle: ResourceHandle,
    label: Option<String>,
    params: wgpu::Buffer,
    disposed: Disposed,
}

impl GpuMaterial {
    pub fn new(device: &wgpu::Device, label: Option<&str>, params: MaterialParams) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label,
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        Self {
            handle: ResourceHandle::next(),
            label: label.map(str::to_owned),
            params: buffer,
            disposed: Disposed::default(),
        }
    }

    /// Overwrites the parameters. No-op after disposal.
    pub fn update(&self, queue: &wgpu::Queue, params: MaterialParams) {
        if self.disposed.get() {
            return;
        }
        queue.write_buffer(&self.params, 0, bytemuck::bytes_of(&params));
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.params
    }
}

impl GpuResource for GpuMaterial {
    fn handle(&self) -> ResourceHandle {
        self.handle
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Material
    }

    fn dispose(&self) -> Result<(), DisposeError> {
        if self.disposed.first_destroy(self.handle) {
            self.params.destroy();
        }
        Ok(())
    }

    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

/// RGBA8 texture with a default view.
pub struct GpuTexture {
    handle: ResourceHandle,
    label: Option<String>,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    disposed: Disposed,
}

impl GpuTexture {
    /// Uploads `rgba` (tightly packed, `width * height * 4` bytes).
    pub fn from_rgba8(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: Option<&str>,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Self {
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label,
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            rgba,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            handle: ResourceHandle::next(),
            label: label.map(str::to_owned),
            texture,
            view,
            disposed: Disposed::default(),
        }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn size(&self) -> wgpu::Extent3d {
        self.texture.size()
    }
}

impl GpuResource for GpuTexture {
    fn handle(&self) -> ResourceHandle {
        self.handle
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Texture
    }

    fn dispose(&self) -> Result<(), DisposeError> {
        if self.disposed.first_destroy(self.handle) {
            self.texture.destroy();
        }
        Ok(())
    }

    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
        assert_eq!(std::mem::size_of::<MaterialParams>(), 16);

        let v = [Vertex {
            position: [1.0, 2.0],
            color: [0.0, 0.0, 0.0, 1.0],
        }];
        let bytes: &[u8] = bytemuck::cast_slice(&v);
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[0..4], &1.0f32.to_ne_bytes());
    }

    #[test]
    fn vertex_count_fits_u32() {
        let tri = [Vertex {
            position: [0.0; 2],
            color: [1.0; 4],
        }; 3];
        assert_eq!(vertex_count(&tri).unwrap(), 3);
        assert_eq!(vertex_count(&[]).unwrap(), 0);
    }

    #[test]
    fn repeated_destroy_is_ignored() {
        let d = Disposed::default();
        let handle = ResourceHandle::next();
        assert!(d.first_destroy(handle));
        assert!(!d.first_destroy(handle));
        assert!(!d.first_destroy(handle));
        assert!(d.get());
    }

    #[test]
    fn disposed_flag_reports_first_mark_only() {
        let d = Disposed::default();
        assert!(!d.get());
        assert!(d.mark());
        assert!(!d.mark());
        assert!(d.get());
    }
}

//! Ledger-tracked WebGL objects.
//!
//! Deleting an object on a lost context is a no-op in WebGL, so disposal
//! after a loss is harmless; it still drops the JS references.

use std::cell::Cell;

use revive_core::{DisposeError, GpuResource, ResourceHandle, ResourceKind};
use wasm_bindgen::JsValue;
use web_sys::{WebGlBuffer, WebGlProgram, WebGlTexture};

use crate::gl::GlContext;

/// `true` the first time; repeats are logged and otherwise ignored.
fn first_delete(disposed: &Cell<bool>, handle: ResourceHandle) -> bool {
    if disposed.replace(true) {
        log::warn!("{handle} already deleted; ignoring");
        return false;
    }
    true
}

/// Static vertex data in an `ARRAY_BUFFER`.
pub struct GlGeometry {
    handle: ResourceHandle,
    gl: GlContext,
    buffer: WebGlBuffer,
    vertex_floats: usize,
    disposed: Cell<bool>,
}

impl GlGeometry {
    pub fn from_f32(gl: &GlContext, vertices: &[f32]) -> Result<Self, JsValue> {
        let bytes: Vec<u8> = vertices.iter().flat_map(|v| v.to_le_bytes()).collect();
        let buffer = gl.upload_array_buffer(&bytes)?;
        Ok(Self {
            handle: ResourceHandle::next(),
            gl: gl.clone(),
            buffer,
            vertex_floats: vertices.len(),
            disposed: Cell::new(false),
        })
    }

    pub fn buffer(&self) -> &WebGlBuffer {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.vertex_floats
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_floats == 0
    }
}

impl GpuResource for GlGeometry {
    fn handle(&self) -> ResourceHandle {
        self.handle
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Geometry
    }

    fn dispose(&self) -> Result<(), DisposeError> {
        if first_delete(&self.disposed, self.handle) {
            self.gl.delete_buffer(&self.buffer);
        }
        Ok(())
    }
}

/// A linked shader program.
pub struct GlMaterial {
    handle: ResourceHandle,
    gl: GlContext,
    program: WebGlProgram,
    disposed: Cell<bool>,
}

impl GlMaterial {
    pub fn link(gl: &GlContext, vertex: &str, fragment: &str) -> Result<Self, String> {
        let program = gl.link_program(vertex, fragment)?;
        Ok(Self {
            handle: ResourceHandle::next(),
            gl: gl.clone(),
            program,
            disposed: Cell::new(false),
        })
    }

    pub fn program(&self) -> &WebGlProgram {
        &self.program
    }
}

impl GpuResource for GlMaterial {
    fn handle(&self) -> ResourceHandle {
        self.handle
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Material
    }

    fn dispose(&self) -> Result<(), DisposeError> {
        if first_delete(&self.disposed, self.handle) {
            self.gl.delete_program(&self.program);
        }
        Ok(())
    }
}

/// RGBA8 2D texture.
pub struct GlTexture {
    handle: ResourceHandle,
    gl: GlContext,
    texture: WebGlTexture,
    size: (u32, u32),
    disposed: Cell<bool>,
}

impl GlTexture {
    pub fn rgba8(gl: &GlContext, width: u32, height: u32, pixels: &[u8]) -> Result<Self, JsValue> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(JsValue::from_str(&format!(
                "expected {expected} bytes of RGBA8, got {}",
                pixels.len()
            )));
        }
        let texture = gl.upload_rgba8(width, height, pixels)?;
        Ok(Self {
            handle: ResourceHandle::next(),
            gl: gl.clone(),
            texture,
            size: (width, height),
            disposed: Cell::new(false),
        })
    }

    pub fn texture(&self) -> &WebGlTexture {
        &self.texture
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}

impl GpuResource for GlTexture {
    fn handle(&self) -> ResourceHandle {
        self.handle
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Texture
    }

    fn dispose(&self) -> Result<(), DisposeError> {
        if first_delete(&self.disposed, self.handle) {
            self.gl.delete_texture(&self.texture);
        }
        Ok(())
    }
}

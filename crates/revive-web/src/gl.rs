use js_sys::{Object, Reflect};
use revive_core::ContextDiagnostics;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    HtmlCanvasElement, WebGl2RenderingContext, WebGlBuffer, WebGlProgram, WebGlRenderingContext as Gl,
    WebGlShader, WebGlTexture, WebglLoseContext,
};

use crate::options::{ContextKind, WebOptions};

const UNMASKED_VENDOR_WEBGL: u32 = 0x9245;
const UNMASKED_RENDERER_WEBGL: u32 = 0x9246;

/// A WebGL 1 or WebGL 2 context. Cheap to clone (a JS reference).
#[derive(Debug, Clone)]
pub enum GlContext {
    WebGl2(WebGl2RenderingContext),
    WebGl(Gl),
}

/// Both context types expose the same method names for everything used here.
macro_rules! gl {
    ($ctx:expr, $gl:ident => $body:expr) => {
        match $ctx {
            GlContext::WebGl2($gl) => $body,
            GlContext::WebGl($gl) => $body,
        }
    };
}

impl GlContext {
    /// Requests a context of each kind in turn. `Ok(None)` means the browser
    /// refused every kind (a creation error event has been dispatched).
    pub(crate) fn acquire(
        canvas: &HtmlCanvasElement,
        options: &WebOptions,
    ) -> Result<Option<Self>, JsValue> {
        let attrs = context_attributes(options)?;
        for kind in options.kinds_to_try() {
            let Some(obj) = canvas.get_context_with_context_options(kind.context_id(), &attrs)?
            else {
                log::warn!("{} unavailable on this canvas", kind.backend_name());
                continue;
            };
            let ctx = match kind {
                ContextKind::WebGl2 => GlContext::WebGl2(obj.dyn_into()?),
                ContextKind::WebGl => GlContext::WebGl(obj.dyn_into()?),
            };
            return Ok(Some(ctx));
        }
        Ok(None)
    }

    pub fn kind(&self) -> ContextKind {
        match self {
            GlContext::WebGl2(_) => ContextKind::WebGl2,
            GlContext::WebGl(_) => ContextKind::WebGl,
        }
    }

    /// The underlying JS context object.
    pub fn as_js(&self) -> &JsValue {
        gl!(self, gl => {
            let js: &JsValue = gl.as_ref();
            js
        })
    }

    #[inline]
    pub fn is_context_lost(&self) -> bool {
        gl!(self, gl => gl.is_context_lost())
    }

    #[inline]
    pub fn get_error(&self) -> u32 {
        gl!(self, gl => gl.get_error())
    }

    pub fn clear(&self, rgba: [f32; 4]) {
        let [r, g, b, a] = rgba;
        gl!(self, gl => {
            gl.clear_color(r, g, b, a);
            gl.clear(Gl::COLOR_BUFFER_BIT);
        })
    }

    /// `WEBGL_lose_context`, used to simulate and to request restoration.
    pub fn lose_context_ext(&self) -> Option<WebglLoseContext> {
        let ext = gl!(self, gl => gl.get_extension("WEBGL_lose_context"));
        ext.ok().flatten().map(JsCast::unchecked_into)
    }

    fn string_parameter(&self, pname: u32) -> Option<String> {
        let value = gl!(self, gl => gl.get_parameter(pname));
        value.ok().and_then(|v| v.as_string()).filter(|s| !s.is_empty())
    }

    pub fn supported_extensions(&self) -> Vec<String> {
        gl!(self, gl => gl.get_supported_extensions())
            .map(|list| list.iter().filter_map(|v| v.as_string()).collect())
            .unwrap_or_default()
    }

    /// Vendor/renderer come from `WEBGL_debug_renderer_info` when the browser
    /// exposes it, otherwise from the (often masked) `VENDOR`/`RENDERER`.
    pub fn diagnostics(&self) -> ContextDiagnostics {
        let debug_info = gl!(self, gl => gl.get_extension("WEBGL_debug_renderer_info"))
            .ok()
            .flatten()
            .is_some();
        let (vendor_pname, renderer_pname) = if debug_info {
            (UNMASKED_VENDOR_WEBGL, UNMASKED_RENDERER_WEBGL)
        } else {
            (Gl::VENDOR, Gl::RENDERER)
        };

        ContextDiagnostics {
            vendor: self.string_parameter(vendor_pname),
            renderer: self.string_parameter(renderer_pname),
            backend: Some(self.kind().backend_name().to_string()),
            driver: self.string_parameter(Gl::VERSION),
            extensions: self.supported_extensions(),
            message: None,
        }
    }

    // ── resource primitives ──────────────────────────────────────────────

    pub(crate) fn upload_array_buffer(&self, bytes: &[u8]) -> Result<WebGlBuffer, JsValue> {
        gl!(self, gl => {
            let buffer = gl
                .create_buffer()
                .ok_or_else(|| JsValue::from_str("createBuffer returned null"))?;
            gl.bind_buffer(Gl::ARRAY_BUFFER, Some(&buffer));
            gl.buffer_data_with_u8_array(Gl::ARRAY_BUFFER, bytes, Gl::STATIC_DRAW);
            gl.bind_buffer(Gl::ARRAY_BUFFER, None);
            Ok(buffer)
        })
    }

    pub(crate) fn delete_buffer(&self, buffer: &WebGlBuffer) {
        gl!(self, gl => gl.delete_buffer(Some(buffer)))
    }

    pub(crate) fn upload_rgba8(
        &self,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<WebGlTexture, JsValue> {
        let (w, h) = (width as i32, height as i32);
        gl!(self, gl => {
            let texture = gl
                .create_texture()
                .ok_or_else(|| JsValue::from_str("createTexture returned null"))?;
            gl.bind_texture(Gl::TEXTURE_2D, Some(&texture));
            gl.tex_parameteri(Gl::TEXTURE_2D, Gl::TEXTURE_MIN_FILTER, Gl::NEAREST as i32);
            gl.tex_parameteri(Gl::TEXTURE_2D, Gl::TEXTURE_MAG_FILTER, Gl::NEAREST as i32);
            let uploaded = gl.tex_image_2d_with_i32_and_i32_and_i32_and_format_and_type_and_opt_u8_array(
                Gl::TEXTURE_2D,
                0,
                Gl::RGBA as i32,
                w,
                h,
                0,
                Gl::RGBA,
                Gl::UNSIGNED_BYTE,
                Some(pixels),
            );
            gl.bind_texture(Gl::TEXTURE_2D, None);
            if let Err(e) = uploaded {
                gl.delete_texture(Some(&texture));
                return Err(e);
            }
            Ok(texture)
        })
    }

    pub(crate) fn delete_texture(&self, texture: &WebGlTexture) {
        gl!(self, gl => gl.delete_texture(Some(texture)))
    }

    pub(crate) fn link_program(&self, vertex: &str, fragment: &str) -> Result<WebGlProgram, String> {
        let vs = self.compile_shader(Gl::VERTEX_SHADER, vertex)?;
        let fs = match self.compile_shader(Gl::FRAGMENT_SHADER, fragment) {
            Ok(fs) => fs,
            Err(e) => {
                gl!(self, gl => gl.delete_shader(Some(&vs)));
                return Err(e);
            }
        };

        gl!(self, gl => {
            let linked = gl.create_program().ok_or_else(|| "createProgram returned null".to_string()).and_then(|program| {
                gl.attach_shader(&program, &vs);
                gl.attach_shader(&program, &fs);
                gl.link_program(&program);
                if gl
                    .get_program_parameter(&program, Gl::LINK_STATUS)
                    .as_bool()
                    .unwrap_or(false)
                {
                    Ok(program)
                } else {
                    let log = gl.get_program_info_log(&program).unwrap_or_default();
                    gl.delete_program(Some(&program));
                    Err(format!("program link failed: {log}"))
                }
            });
            gl.delete_shader(Some(&vs));
            gl.delete_shader(Some(&fs));
            linked
        })
    }

    fn compile_shader(&self, stage: u32, source: &str) -> Result<WebGlShader, String> {
        gl!(self, gl => {
            let shader = gl
                .create_shader(stage)
                .ok_or_else(|| "createShader returned null".to_string())?;
            gl.shader_source(&shader, source);
            gl.compile_shader(&shader);
            if gl
                .get_shader_parameter(&shader, Gl::COMPILE_STATUS)
                .as_bool()
                .unwrap_or(false)
            {
                Ok(shader)
            } else {
                let log = gl.get_shader_info_log(&shader).unwrap_or_default();
                gl.delete_shader(Some(&shader));
                Err(format!("shader compile failed: {log}"))
            }
        })
    }

    pub(crate) fn delete_program(&self, program: &WebGlProgram) {
        gl!(self, gl => gl.delete_program(Some(program)))
    }
}

fn context_attributes(options: &WebOptions) -> Result<JsValue, JsValue> {
    let attrs = Object::new();
    Reflect::set(&attrs, &"antialias".into(), &options.antialias.into())?;
    Reflect::set(
        &attrs,
        &"powerPreference".into(),
        &options.power_preference.as_str().into(),
    )?;
    Ok(attrs.into())
}

/// Best-effort text of a thrown JS value.
pub(crate) fn js_error_message(err: &JsValue) -> String {
    if let Some(s) = err.as_string() {
        return s;
    }
    Reflect::get(err, &"message".into())
        .ok()
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| format!("{err:?}"))
}

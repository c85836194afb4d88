use std::cell::RefCell;
use std::rc::Rc;

use revive_core::{
    BindError, ContextDiagnostics, LossEvent, ProbeError, ProbeRequest, ProbeStrategy,
    SignalSink, SurfaceAdapter,
};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Event, HtmlCanvasElement, WebGlContextEvent};

use crate::gl::{js_error_message, GlContext};
use crate::options::{
    WebOptions, CONTEXT_LOST_EVENT, CONTEXT_LOST_WEBGL, CONTEXT_RESTORED_EVENT,
    CREATION_ERROR_EVENT,
};
use crate::schedule::{FrameLoop, Waker};

/// `webglcontextlost` seen through the core's [`LossEvent`].
struct DomLossEvent<'a>(&'a Event);

impl LossEvent for DomLossEvent<'_> {
    fn is_cancelable(&self) -> bool {
        self.0.cancelable()
    }

    fn prevent_default(&mut self) {
        self.0.prevent_default();
    }
}

struct Listener {
    event: &'static str,
    closure: Closure<dyn FnMut(Event)>,
}

/// An `HtmlCanvasElement` and its WebGL context.
///
/// The context is acquired when listeners are attached, so a creation error
/// is always observed by the binding.
pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    options: WebOptions,
    gl: Option<GlContext>,
    /// Bumped on every acquired or restored context. Resources from an older
    /// generation are dead.
    generation: u32,

    sink: Option<SignalSink>,
    listeners: Vec<Listener>,
    /// `statusMessage` of the last creation error event.
    creation_status: Rc<RefCell<Option<String>>>,

    frames: FrameLoop,
    waker: Rc<Waker>,
    torn_down: bool,
}

impl CanvasSurface {
    pub fn new(canvas: HtmlCanvasElement, options: WebOptions) -> Self {
        Self {
            canvas,
            options,
            gl: None,
            generation: 0,
            sink: None,
            listeners: Vec::new(),
            creation_status: Rc::new(RefCell::new(None)),
            frames: FrameLoop::default(),
            waker: Rc::new(Waker::default()),
            torn_down: false,
        }
    }

    /// The canvas currently on the page. Changes after a surface-replacing probe.
    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    pub fn context(&self) -> Option<&GlContext> {
        self.gl.as_ref()
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Marks the surface unusable; later binds fail.
    pub fn destroy(&mut self) {
        self.torn_down = true;
        self.frames.cancel();
        self.remove_listeners();
        self.gl = None;
    }

    /// Drops the context through `WEBGL_lose_context`, as a driver reset would.
    pub fn simulate_loss(&self) -> bool {
        match self.gl.as_ref().and_then(GlContext::lose_context_ext) {
            Some(ext) => {
                ext.lose_context();
                true
            }
            None => {
                log::warn!("WEBGL_lose_context unavailable; cannot simulate a loss");
                false
            }
        }
    }

    /// Whether an animation frame is requested and not yet delivered.
    #[inline]
    pub fn frame_pending(&self) -> bool {
        self.frames.is_pending()
    }

    pub(crate) fn bump_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    pub(crate) fn waker(&self) -> Rc<Waker> {
        self.waker.clone()
    }

    pub(crate) fn set_frame_callback(&mut self, callback: Closure<dyn FnMut(f64)>) {
        self.frames.set_callback(callback);
    }

    pub(crate) fn request_frame(&mut self) {
        self.frames.request();
    }

    pub(crate) fn frame_fired(&mut self) {
        self.frames.fired();
    }

    fn install_listeners(&mut self) -> Result<(), JsValue> {
        let Some(sink) = self.sink.clone() else {
            return Ok(());
        };

        let lost = {
            let sink = sink.clone();
            let waker = self.waker.clone();
            Closure::<dyn FnMut(Event)>::new(move |ev: Event| {
                sink.context_lost(&mut DomLossEvent(&ev));
                waker.wake_now();
            })
        };
        let restored = {
            let waker = self.waker.clone();
            Closure::<dyn FnMut(Event)>::new(move |_ev: Event| {
                sink.context_restored();
                waker.wake_now();
            })
        };
        let creation = {
            let status = self.creation_status.clone();
            Closure::<dyn FnMut(Event)>::new(move |ev: Event| {
                let message = ev
                    .dyn_ref::<WebGlContextEvent>()
                    .map(WebGlContextEvent::status_message)
                    .filter(|m| !m.is_empty());
                *status.borrow_mut() = message;
            })
        };

        for (event, closure) in [
            (CONTEXT_LOST_EVENT, lost),
            (CONTEXT_RESTORED_EVENT, restored),
            (CREATION_ERROR_EVENT, creation),
        ] {
            self.canvas
                .add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())?;
            self.listeners.push(Listener { event, closure });
        }
        Ok(())
    }

    fn remove_listeners(&mut self) {
        for l in self.listeners.drain(..) {
            if let Err(e) = self
                .canvas
                .remove_event_listener_with_callback(l.event, l.closure.as_ref().unchecked_ref())
            {
                log::debug!("removing {} listener: {}", l.event, js_error_message(&e));
            }
        }
    }

    fn acquire_context(&mut self) -> Result<(), String> {
        self.creation_status.borrow_mut().take();
        match GlContext::acquire(&self.canvas, &self.options) {
            Ok(Some(gl)) => {
                log::info!("acquired {} context", gl.kind().backend_name());
                self.gl = Some(gl);
                self.generation = self.generation.wrapping_add(1);
                Ok(())
            }
            Ok(None) => Err(self
                .creation_status
                .borrow_mut()
                .take()
                .unwrap_or_else(|| "getContext returned null".to_string())),
            Err(e) => Err(js_error_message(&e)),
        }
    }

    /// Swaps in a fresh `<canvas>` node with the same size and attributes.
    fn replace_canvas(&mut self) -> Result<(), JsValue> {
        let document = self
            .canvas
            .owner_document()
            .ok_or_else(|| JsValue::from_str("canvas is not in a document"))?;
        let fresh: HtmlCanvasElement = document.create_element("canvas")?.dyn_into()?;

        fresh.set_width(self.canvas.width());
        fresh.set_height(self.canvas.height());
        fresh.set_id(&self.canvas.id());
        fresh.set_class_name(&self.canvas.class_name());
        if let Some(style) = self.canvas.get_attribute("style") {
            fresh.set_attribute("style", &style)?;
        }

        if let Some(parent) = self.canvas.parent_node() {
            parent.replace_child(&fresh, &self.canvas)?;
        }

        self.remove_listeners();
        self.canvas = fresh;
        self.gl = None;
        self.install_listeners()?;
        log::info!("replaced canvas element");
        Ok(())
    }

    fn blank_diagnostics(&self) -> ContextDiagnostics {
        ContextDiagnostics {
            backend: Some(self.options.kind.backend_name().to_string()),
            ..ContextDiagnostics::default()
        }
    }
}

impl SurfaceAdapter for CanvasSurface {
    fn attach(&mut self, sink: SignalSink) -> Result<(), BindError> {
        if self.torn_down {
            return Err(BindError::invalid_surface("canvas surface was destroyed"));
        }
        self.sink = Some(sink.clone());
        self.install_listeners()
            .map_err(|e| BindError::invalid_surface(js_error_message(&e)))?;

        if self.gl.is_none() {
            if let Err(message) = self.acquire_context() {
                log::error!("WebGL context creation failed: {message}");
                sink.creation_error(self.blank_diagnostics().with_message(message));
            }
        }
        Ok(())
    }

    fn detach(&mut self) {
        self.remove_listeners();
        self.sink = None;
    }

    fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    fn is_context_lost(&self) -> Option<bool> {
        self.gl.as_ref().map(GlContext::is_context_lost)
    }

    fn diagnostics(&self) -> ContextDiagnostics {
        match &self.gl {
            Some(gl) => gl.diagnostics(),
            None => self.blank_diagnostics(),
        }
    }

    fn probe(&mut self, request: ProbeRequest) -> Result<(), ProbeError> {
        if request.strategy == ProbeStrategy::ReplaceSurface {
            self.replace_canvas()
                .map_err(|e| ProbeError::new(format!("canvas replacement: {}", js_error_message(&e))))?;
        }

        match &self.gl {
            Some(gl) if gl.is_context_lost() => {
                // Restoration is asynchronous; success arrives as a restored event.
                if let Some(ext) = gl.lose_context_ext() {
                    ext.restore_context();
                }
                if gl.is_context_lost() {
                    return Err(ProbeError::new("context still lost"));
                }
            }
            Some(_) => {}
            None => self.acquire_context().map_err(ProbeError::new)?,
        }

        let Some(gl) = self.gl.as_ref() else {
            return Err(ProbeError::new("no context after reacquire"));
        };
        gl.clear(self.options.probe_clear);
        if gl.get_error() == CONTEXT_LOST_WEBGL || gl.is_context_lost() {
            return Err(ProbeError::new("context lost while rendering the probe frame"));
        }
        Ok(())
    }

    fn cancel_frame(&mut self) {
        self.frames.cancel();
    }

    fn resume_frames(&mut self) {
        self.frames.request();
    }
}

impl Drop for CanvasSurface {
    fn drop(&mut self) {
        self.remove_listeners();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn detached_canvas() -> HtmlCanvasElement {
        web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.create_element("canvas").ok())
            .and_then(|e| e.dyn_into().ok())
            .expect("canvas element")
    }

    #[wasm_bindgen_test]
    fn destroyed_surface_refuses_to_attach() {
        let mut surface = CanvasSurface::new(detached_canvas(), WebOptions::default());
        surface.destroy();
        assert!(surface.is_torn_down());
        assert!(revive_core::SurfaceBinding::mount(surface, Default::default()).is_err());
    }

    #[wasm_bindgen_test]
    fn cancel_frame_drops_the_pending_request() {
        let mut surface = CanvasSurface::new(detached_canvas(), WebOptions::default());
        surface.set_frame_callback(Closure::<dyn FnMut(f64)>::new(|_ts: f64| {}));

        surface.resume_frames();
        assert!(surface.frame_pending());
        surface.resume_frames();
        assert!(surface.frame_pending());

        surface.cancel_frame();
        assert!(!surface.frame_pending());
    }

    #[wasm_bindgen_test]
    fn context_is_acquired_on_attach() {
        let surface = CanvasSurface::new(detached_canvas(), WebOptions::default());
        assert!(surface.context().is_none());

        let binding = revive_core::SurfaceBinding::mount(surface, Default::default())
            .expect("mount");
        assert_eq!(binding.surface().generation(), 1);
        assert_eq!(binding.surface().is_context_lost(), Some(false));
        assert!(binding.surface().diagnostics().backend.is_some());
    }
}

//! JavaScript API.
//!
//! ```js
//! const revive = new ReviveCanvas(canvas, (gl, generation, now) => draw(gl), { maxAttempts: 5 });
//! revive.onStateChange((from, to) => overlay.update(revive.fallbackMessage()));
//! ```

use std::time::Duration;

use js_sys::{Function, Object, Reflect};
use revive_core::{FallbackView, RecoveryPolicy};
use wasm_bindgen::prelude::*;
use web_sys::HtmlCanvasElement;

use crate::gl::js_error_message;
use crate::host::WebHost;
use crate::options::{ContextKind, WebOptions};

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        log::debug!("logger already installed");
    }
}

fn read_number(obj: &Object, key: &str) -> Option<f64> {
    Reflect::get(obj, &JsValue::from_str(key)).ok()?.as_f64()
}

fn read_bool(obj: &Object, key: &str) -> Option<bool> {
    Reflect::get(obj, &JsValue::from_str(key)).ok()?.as_bool()
}

fn read_string(obj: &Object, key: &str) -> Option<String> {
    Reflect::get(obj, &JsValue::from_str(key)).ok()?.as_string()
}

/// `{ maxAttempts, baseDelayMs, autoRecover, pollIntervalMs, errorMessage, webgl1 }`,
/// every key optional.
fn parse_options(obj: Option<Object>) -> Result<(WebOptions, RecoveryPolicy), JsValue> {
    let mut web = WebOptions::default();
    let mut policy = RecoveryPolicy::default();
    let Some(obj) = obj else {
        return Ok((web, policy));
    };

    if let Some(n) = read_number(&obj, "maxAttempts") {
        policy = policy.max_attempts(n.max(0.0) as u32);
    }
    if let Some(ms) = read_number(&obj, "baseDelayMs") {
        policy = policy.base_delay(Duration::from_millis(ms.max(0.0) as u64));
    }
    if let Some(on) = read_bool(&obj, "autoRecover") {
        policy = policy.auto_recover(on);
    }
    if let Some(ms) = read_number(&obj, "pollIntervalMs") {
        policy = policy.poll_interval(Some(Duration::from_millis(ms.max(1.0) as u64)));
    }
    if let Some(msg) = read_string(&obj, "errorMessage") {
        policy = policy.error_message(msg);
    }
    if read_bool(&obj, "webgl1") == Some(true) {
        web = web.kind(ContextKind::WebGl);
    }

    policy
        .validate()
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok((web, policy))
}

#[wasm_bindgen]
pub struct ReviveCanvas {
    host: WebHost,
}

#[wasm_bindgen]
impl ReviveCanvas {
    /// `draw(gl, generation, nowMs)` runs once per animation frame while the
    /// context is healthy.
    #[wasm_bindgen(constructor)]
    pub fn new(
        canvas: HtmlCanvasElement,
        draw: Function,
        options: Option<Object>,
    ) -> Result<ReviveCanvas, JsValue> {
        let (web, policy) = parse_options(options)?;
        let host = WebHost::mount(canvas, web, policy, move |gl, _ledger, info| {
            let generation = JsValue::from(info.generation);
            let now = JsValue::from(info.now.as_millis() as f64);
            if let Err(e) = draw.call3(&JsValue::NULL, gl.as_js(), &generation, &now) {
                log::error!("draw callback threw: {}", js_error_message(&e));
            }
        })
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(ReviveCanvas { host })
    }

    /// `"healthy"`, `"lost"`, `"recovering (attempt 2 at 1500ms)"`, ...
    pub fn state(&self) -> String {
        self.host.state().to_string()
    }

    /// Text to show over the canvas, or `undefined` when rendering normally.
    #[wasm_bindgen(js_name = fallbackMessage)]
    pub fn fallback_message(&self) -> Option<String> {
        match self.host.fallback_view() {
            FallbackView::None => None,
            FallbackView::Recovering { attempt, max_attempts } => {
                Some(format!("Restoring graphics ({attempt}/{max_attempts})"))
            }
            FallbackView::Failed { message } | FallbackView::Unsupported { message } => {
                Some(message)
            }
        }
    }

    /// One-line summary of the current (or failed) context.
    pub fn diagnostics(&self) -> String {
        self.host.diagnostics().to_string()
    }

    #[wasm_bindgen(js_name = onStateChange)]
    pub fn on_state_change(&self, callback: Function) {
        self.host.on_state_change(move |from, to| {
            let (from, to) = (JsValue::from(from.to_string()), JsValue::from(to.to_string()));
            if let Err(e) = callback.call2(&JsValue::NULL, &from, &to) {
                log::error!("state callback threw: {}", js_error_message(&e));
            }
        });
    }

    pub fn retry(&self) {
        self.host.retry();
    }

    #[wasm_bindgen(js_name = simulateLoss)]
    pub fn simulate_loss(&self) -> bool {
        self.host.simulate_loss()
    }

    /// Returns how many GPU objects were released.
    pub fn unmount(&self) -> u32 {
        u32::try_from(self.host.unmount().total()).unwrap_or(u32::MAX)
    }
}

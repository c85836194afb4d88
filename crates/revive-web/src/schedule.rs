//! Browser timers: `setTimeout` wake-ups for recovery deadlines and
//! `requestAnimationFrame` for the frame loop.
//!
//! Both hold their `Closure` for as long as a callback may still fire, and
//! cancel the pending callback before the closure is dropped.

use std::cell::{Cell, RefCell};

use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;

/// One-shot timer that re-arms on demand. Only the latest request is kept.
#[derive(Default)]
pub(crate) struct Waker {
    callback: RefCell<Option<Closure<dyn FnMut()>>>,
    pending: Cell<Option<i32>>,
}

impl Waker {
    pub(crate) fn set_callback(&self, callback: Closure<dyn FnMut()>) {
        self.cancel();
        *self.callback.borrow_mut() = Some(callback);
    }

    pub(crate) fn wake_in(&self, delay_ms: i32) {
        self.cancel();
        let Some(window) = web_sys::window() else {
            return;
        };
        let callback = self.callback.borrow();
        let Some(cb) = callback.as_ref() else {
            return;
        };
        match window.set_timeout_with_callback_and_timeout_and_arguments_0(
            cb.as_ref().unchecked_ref(),
            delay_ms.max(0),
        ) {
            Ok(handle) => self.pending.set(Some(handle)),
            Err(e) => log::warn!("setTimeout failed: {e:?}"),
        }
    }

    #[inline]
    pub(crate) fn wake_now(&self) {
        self.wake_in(0);
    }

    pub(crate) fn cancel(&self) {
        if let Some(handle) = self.pending.take() {
            if let Some(window) = web_sys::window() {
                window.clear_timeout_with_handle(handle);
            }
        }
    }

    /// Called first thing from the callback.
    #[inline]
    pub(crate) fn fired(&self) {
        self.pending.set(None);
    }
}

impl Drop for Waker {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// `requestAnimationFrame` loop with at most one request in flight.
#[derive(Default)]
pub(crate) struct FrameLoop {
    callback: Option<Closure<dyn FnMut(f64)>>,
    pending: Option<i32>,
}

impl FrameLoop {
    pub(crate) fn set_callback(&mut self, callback: Closure<dyn FnMut(f64)>) {
        self.cancel();
        self.callback = Some(callback);
    }

    pub(crate) fn request(&mut self) {
        if self.pending.is_some() {
            return;
        }
        let (Some(window), Some(cb)) = (web_sys::window(), self.callback.as_ref()) else {
            return;
        };
        match window.request_animation_frame(cb.as_ref().unchecked_ref()) {
            Ok(id) => self.pending = Some(id),
            Err(e) => log::warn!("requestAnimationFrame failed: {e:?}"),
        }
    }

    pub(crate) fn cancel(&mut self) {
        if let Some(id) = self.pending.take() {
            if let Some(window) = web_sys::window() {
                let _ = window.cancel_animation_frame(id);
            }
        }
    }

    #[inline]
    pub(crate) fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    #[inline]
    pub(crate) fn fired(&mut self) {
        self.pending = None;
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        self.cancel();
    }
}

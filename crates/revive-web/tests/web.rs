#![cfg(target_arch = "wasm32")]

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use revive_core::{ContextState, GpuResource, RecoveryPolicy, ResourceKind};
use revive_web::{GlGeometry, GlTexture, WebHost, WebOptions};
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn attached_canvas() -> web_sys::HtmlCanvasElement {
    let document = web_sys::window().unwrap().document().unwrap();
    let canvas: web_sys::HtmlCanvasElement =
        document.create_element("canvas").unwrap().dyn_into().unwrap();
    canvas.set_width(64);
    canvas.set_height(64);
    document.body().unwrap().append_child(&canvas).unwrap();
    canvas
}

async fn sleep(ms: i32) {
    let promise = js_sys::Promise::new(&mut |resolve, _| {
        web_sys::window()
            .unwrap()
            .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms)
            .unwrap();
    });
    JsFuture::from(promise).await.unwrap();
}

fn fast_policy() -> RecoveryPolicy {
    RecoveryPolicy::new()
        .base_delay(Duration::from_millis(20))
        .max_attempts(10)
}

#[wasm_bindgen_test]
async fn frames_run_while_healthy() {
    let frames = Rc::new(RefCell::new(0u32));
    let seen = frames.clone();
    let host = WebHost::mount(attached_canvas(), WebOptions::default(), fast_policy(), move |gl, _, _| {
        gl.clear([0.2, 0.2, 0.2, 1.0]);
        *seen.borrow_mut() += 1;
    })
    .unwrap();

    sleep(200).await;
    assert_eq!(host.state(), ContextState::Healthy);
    assert!(*frames.borrow() > 0);
    host.unmount();
}

#[wasm_bindgen_test]
async fn simulated_loss_recovers_and_rebuilds() {
    let generations = Rc::new(RefCell::new(Vec::new()));
    let seen = generations.clone();
    let mut built_for = 0;
    let mut live: Vec<Rc<GlGeometry>> = Vec::new();

    let host = WebHost::mount(attached_canvas(), WebOptions::default(), fast_policy(), move |gl, ledger, info| {
        if built_for != info.generation {
            built_for = info.generation;
            seen.borrow_mut().push(info.generation);
            let quad = Rc::new(GlGeometry::from_f32(gl, &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0]).unwrap());
            ledger.register(&quad);
            live.clear();
            live.push(quad);
        }
    })
    .unwrap();

    let states = Rc::new(RefCell::new(Vec::new()));
    let log = states.clone();
    host.on_state_change(move |_, to| log.borrow_mut().push(to.clone()));

    sleep(100).await;
    assert!(host.simulate_loss());

    for _ in 0..40 {
        sleep(50).await;
        if host.state() == ContextState::Restored {
            break;
        }
    }

    assert_eq!(host.state(), ContextState::Restored);
    assert_eq!(states.borrow().first(), Some(&ContextState::Lost));
    assert!(host.stats().losses_observed >= 1);

    sleep(100).await;
    assert_eq!(generations.borrow().first(), Some(&1));
    assert!(generations.borrow().len() >= 2, "resources rebuilt after restore");
    host.unmount();
}

#[wasm_bindgen_test]
async fn unmount_releases_registered_resources() {
    let held: Rc<RefCell<Vec<Rc<GlGeometry>>>> = Rc::new(RefCell::new(Vec::new()));
    let slot = held.clone();
    let host = WebHost::mount(attached_canvas(), WebOptions::default(), fast_policy(), move |gl, ledger, _| {
        if slot.borrow().is_empty() {
            let tri = Rc::new(GlGeometry::from_f32(gl, &[0.0; 6]).unwrap());
            ledger.register(&tri);
            slot.borrow_mut().push(tri);
        }
    })
    .unwrap();

    sleep(100).await;
    assert_eq!(held.borrow().len(), 1);

    let stats = host.unmount();
    assert_eq!(stats.geometries, 1);
    assert_eq!(host.unmount().total(), 0);
    // Already deleted by the ledger; a second delete is a no-op.
    assert!(held.borrow()[0].dispose().is_ok());
}

#[wasm_bindgen_test]
fn texture_size_is_validated() {
    let canvas = attached_canvas();
    let gl: web_sys::WebGl2RenderingContext = canvas.get_context("webgl2").unwrap().unwrap().dyn_into().unwrap();
    let ctx = revive_web::GlContext::WebGl2(gl);

    assert!(GlTexture::rgba8(&ctx, 2, 2, &[0; 3]).is_err());
    let tex = GlTexture::rgba8(&ctx, 1, 1, &[255, 0, 0, 255]).unwrap();
    assert_eq!(tex.size(), (1, 1));
    assert_eq!(tex.kind(), ResourceKind::Texture);
    assert!(tex.dispose().is_ok());
    assert!(tex.dispose().is_ok());
}

use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;
use revive_core::{ContextState, FallbackView, RecoveryPolicy};
use revive_engine::core::{App, AppControl, FrameCtx, StateCtx, SurfaceCtx};
use revive_engine::device::{GpuGeometry, GpuInit, GpuMaterial, GpuTexture, MaterialParams, Vertex};
use revive_engine::logging::{init_logging, LoggingConfig};
use revive_engine::window::{Runtime, RuntimeConfig};
use winit::dpi::LogicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowId;

const TITLE: &str = "revive studio";

/// Resources living on the current device. Dropped on every loss.
struct Scene {
    _triangle: Rc<GpuGeometry>,
    tint: Rc<GpuMaterial>,
    _checker: Rc<GpuTexture>,
}

#[derive(Default)]
struct Studio {
    scene: Option<Scene>,
    lose_device: bool,
    generation: u32,
}

impl Studio {
    fn build_scene(ctx: &mut SurfaceCtx<'_, '_>) -> Result<Scene> {
        let device = ctx.gpu.device();
        let queue = ctx.gpu.queue();

        let triangle = GpuGeometry::new(
            device,
            Some("studio triangle"),
            &[
                Vertex { position: [0.0, 0.5], color: [1.0, 0.2, 0.2, 1.0] },
                Vertex { position: [-0.5, -0.5], color: [0.2, 1.0, 0.2, 1.0] },
                Vertex { position: [0.5, -0.5], color: [0.2, 0.2, 1.0, 1.0] },
            ],
        )?;
        let tint = GpuMaterial::new(
            device,
            Some("studio tint"),
            MaterialParams { tint: [1.0; 4] },
        );
        let checker = GpuTexture::from_rgba8(
            device,
            queue,
            Some("studio checker"),
            2,
            2,
            &[
                255, 255, 255, 255, 0, 0, 0, 255, //
                0, 0, 0, 255, 255, 255, 255, 255,
            ],
        );

        Ok(Scene {
            _triangle: ctx.track(triangle),
            tint: ctx.track(tint),
            _checker: ctx.track(checker),
        })
    }
}

impl App for Studio {
    fn on_window_event(&mut self, _window_id: WindowId, event: &WindowEvent) -> AppControl {
        let WindowEvent::KeyboardInput { event, .. } = event else {
            return AppControl::Continue;
        };
        if event.state != ElementState::Pressed || event.repeat {
            return AppControl::Continue;
        }
        match event.physical_key {
            PhysicalKey::Code(KeyCode::Escape) => AppControl::Exit,
            PhysicalKey::Code(KeyCode::KeyL) => {
                self.lose_device = true;
                AppControl::Continue
            }
            _ => AppControl::Continue,
        }
    }

    fn on_surface_ready(&mut self, ctx: &mut SurfaceCtx<'_, '_>) {
        self.generation += 1;
        self.scene = match Self::build_scene(ctx) {
            Ok(scene) => Some(scene),
            Err(e) => {
                log::error!("building scene: {e:#}");
                None
            }
        };
        ctx.window.set_title(&format!("{TITLE} (device #{})", self.generation));
        log::info!("scene built on device #{}", self.generation);
    }

    fn on_context_state(&mut self, ctx: &mut StateCtx<'_>) -> AppControl {
        let t = ctx.transition;
        log::info!("context {} -> {}", t.from, t.to);

        if t.to == ContextState::Lost {
            self.scene = None;
        }

        match &ctx.fallback {
            FallbackView::None => {}
            FallbackView::Recovering { attempt, max_attempts } => {
                ctx.window
                    .set_title(&format!("{TITLE}: recovering ({attempt}/{max_attempts})"));
            }
            FallbackView::Failed { message } | FallbackView::Unsupported { message } => {
                ctx.window.set_title(&format!("{TITLE}: {message}"));
                log::error!(
                    "giving up after {} probes: {message}",
                    ctx.stats.probes_attempted
                );
            }
        }
        AppControl::Continue
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if std::mem::take(&mut self.lose_device) {
            ctx.simulate_device_loss();
            return AppControl::Continue;
        }

        let phase = (ctx.time.elapsed * 1.5).sin() * 0.5 + 0.5;
        if let Some(scene) = &self.scene {
            scene.tint.update(
                ctx.gpu.queue(),
                MaterialParams { tint: [phase, 0.4, 1.0 - phase, 1.0] },
            );
        }

        let clear = wgpu::Color {
            r: 0.05 + 0.25 * phase as f64,
            g: 0.08,
            b: 0.12 + 0.25 * (1.0 - phase as f64),
            a: 1.0,
        };
        ctx.render(clear, |_, _| {})
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let config = RuntimeConfig {
        title: TITLE.to_string(),
        initial_size: LogicalSize::new(960.0, 600.0),
        recovery: RecoveryPolicy::new()
            .max_attempts(4)
            .base_delay(Duration::from_millis(500))
            .poll_interval(Some(Duration::from_millis(250)))
            .error_message("The GPU could not be recovered. Restart the studio."),
    };

    log::info!("press L to destroy the GPU device, Escape to quit");
    // A recovered device may come from a weaker adapter.
    let gpu_init = GpuInit::default()
        .present_mode(wgpu::PresentMode::AutoVsync)
        .downlevel();
    Runtime::run(config, gpu_init, Studio::default())
}

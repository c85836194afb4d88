use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use anyhow::{Context, Result};
use ouroboros::self_referencing;
use revive_core::{
    ContextState, FallbackView, RecoveryPolicy, SurfaceBinding, Timestamp, Transition,
};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::core::{App as CoreApp, AppControl, FrameCtx, StateCtx, SurfaceCtx, WindowCtx};
use crate::device::{GpuInit, WindowSurface};
use crate::time::{FrameClock, MonotonicClock};

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    /// Recovery behavior for this window's device.
    pub recovery: RecoveryPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "revive".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
            // Device-lost callbacks only run when the device is polled, so
            // idle windows still need to wake up now and then.
            recovery: RecoveryPolicy::default().poll_interval(Some(Duration::from_millis(500))),
        }
    }
}

/// Runtime context passed to the application.
///
/// Commands are buffered and applied after the current callback returns.
#[derive(Default)]
pub struct RuntimeCtx {
    commands: Vec<Command>,
}

impl RuntimeCtx {
    pub fn create_window(&mut self, config: RuntimeConfig) {
        self.commands.push(Command::CreateWindow(config));
    }

    pub fn close_window(&mut self, id: WindowId) {
        self.commands.push(Command::CloseWindow(id));
    }

    /// Starts recovery for a window sitting in `Lost` (policies with
    /// `auto_recover` off).
    pub fn retry(&mut self, id: WindowId) {
        self.commands.push(Command::Retry(id));
    }

    pub fn exit(&mut self) {
        self.commands.push(Command::Exit);
    }
}

enum Command {
    CreateWindow(RuntimeConfig),
    CloseWindow(WindowId),
    Retry(WindowId),
    Exit,
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    pub fn run<A>(initial: RuntimeConfig, gpu_init: GpuInit, app: A) -> Result<()>
    where
        A: 'static + CoreApp,
    {
        initial
            .recovery
            .validate()
            .context("invalid recovery policy")?;

        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(initial, gpu_init, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        Ok(())
    }
}

#[self_referencing]
struct WindowEntry {
    clock: FrameClock,

    window: Window,

    #[borrows(window)]
    #[covariant]
    binding: SurfaceBinding<WindowSurface<'this>>,
}

struct AppState<A>
where
    A: CoreApp + 'static,
{
    initial: RuntimeConfig,
    gpu_init: GpuInit,
    app: A,
    clock: MonotonicClock,

    windows: HashMap<WindowId, WindowEntry>,
    exit_requested: bool,
}

impl<A> AppState<A>
where
    A: CoreApp + 'static,
{
    fn new(initial: RuntimeConfig, gpu_init: GpuInit, app: A) -> Self {
        Self {
            initial,
            gpu_init,
            app,
            clock: MonotonicClock::new(),
            windows: HashMap::new(),
            exit_requested: false,
        }
    }

    fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    fn create_window_entry(
        &mut self,
        event_loop: &ActiveEventLoop,
        config: RuntimeConfig,
    ) -> Result<WindowId> {
        let RuntimeConfig {
            title,
            initial_size,
            recovery,
        } = config;

        let attrs = Window::default_attributes()
            .with_title(title)
            .with_inner_size(initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let id = window.id();
        let gpu_init = self.gpu_init.clone();

        let mut entry = WindowEntryTryBuilder {
            clock: FrameClock::default(),
            window,
            binding_builder: |w| SurfaceBinding::mount(WindowSurface::new(w, gpu_init), recovery),
        }
        .try_build()
        .context("failed to mount window surface")?;

        surface_ready(&mut self.app, id, &mut entry);
        self.windows.insert(id, entry);
        Ok(id)
    }

    fn destroy_window_entry(&mut self, id: WindowId) {
        if let Some(mut entry) = self.windows.remove(&id) {
            let stats = entry.with_binding_mut(|b| b.unmount());
            log::info!("window {id:?} closed; released {stats}");
        }
    }

    fn apply_commands(&mut self, event_loop: &ActiveEventLoop, ctx: RuntimeCtx) {
        let mut queue: VecDeque<Command> = ctx.commands.into();
        let mut closed_any = false;

        while let Some(cmd) = queue.pop_front() {
            match cmd {
                Command::CreateWindow(cfg) => {
                    if let Err(e) = self.create_window_entry(event_loop, cfg) {
                        log::error!("failed to create window: {e:#}");
                        self.request_exit();
                    }
                }
                Command::CloseWindow(id) => {
                    self.destroy_window_entry(id);
                    closed_any = true;
                }
                Command::Retry(id) => {
                    let now = self.clock.now();
                    let Some(entry) = self.windows.get_mut(&id) else {
                        continue;
                    };
                    let transitions = entry.with_binding_mut(|b| b.retry(now));
                    let mut nested = RuntimeCtx::default();
                    if dispatch_transitions(&mut self.app, id, entry, &transitions, &mut nested)
                        == AppControl::Exit
                    {
                        self.request_exit();
                    }
                    queue.extend(nested.commands);
                }
                Command::Exit => self.request_exit(),
            }
        }

        if closed_any && self.windows.is_empty() {
            self.request_exit();
        }

        if self.exit_requested {
            event_loop.exit();
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop, id: WindowId) {
        let now = self.clock.now();
        let mut runtime_ctx = RuntimeCtx::default();
        let mut app_control = AppControl::Continue;
        let mut device_lost = false;

        let app = &mut self.app;
        let Some(entry) = self.windows.get_mut(&id) else {
            return;
        };

        entry.with_mut(|fields| {
            // Frame requests queued before a loss may still be delivered.
            if !fields.binding.frames_allowed() {
                return;
            }
            let (surface, ledger) = fields.binding.parts_mut();
            let Some(gpu) = surface.gpu_mut() else {
                return;
            };

            let mut ctx = FrameCtx {
                window: WindowCtx {
                    id,
                    window: fields.window,
                },
                gpu,
                ledger,
                time: fields.clock.tick(),
                runtime: &mut runtime_ctx,
                device_lost: false,
            };

            app_control = app.on_frame(&mut ctx);
            device_lost = ctx.device_lost;
        });

        if device_lost {
            let transitions = entry.with_binding_mut(|b| b.report_loss(now));
            if dispatch_transitions(app, id, entry, &transitions, &mut runtime_ctx)
                == AppControl::Exit
            {
                app_control = AppControl::Exit;
            }
        }

        if app_control == AppControl::Exit {
            runtime_ctx.exit();
        }

        self.apply_commands(event_loop, runtime_ctx);
    }
}

/// Hands a usable device to the app. No-op while frames are not allowed.
fn surface_ready<A: CoreApp>(app: &mut A, id: WindowId, entry: &mut WindowEntry) {
    entry.with_mut(|fields| {
        if !fields.binding.frames_allowed() {
            return;
        }
        fields.clock.reset();

        let (surface, ledger) = fields.binding.parts_mut();
        let Some(gpu) = surface.gpu() else {
            return;
        };

        let mut ctx = SurfaceCtx {
            window: WindowCtx {
                id,
                window: fields.window,
            },
            gpu,
            ledger,
        };
        app.on_surface_ready(&mut ctx);
        log::debug!("window {id:?}: {} resources tracked", ctx.ledger.len());
    });
}

fn dispatch_transitions<A: CoreApp>(
    app: &mut A,
    id: WindowId,
    entry: &mut WindowEntry,
    transitions: &[Transition],
    runtime: &mut RuntimeCtx,
) -> AppControl {
    if transitions.is_empty() {
        return AppControl::Continue;
    }

    let mut control = AppControl::Continue;
    let mut restored = false;

    entry.with_mut(|fields| {
        for t in transitions {
            let mut ctx = StateCtx {
                window: WindowCtx {
                    id,
                    window: fields.window,
                },
                transition: t,
                fallback: FallbackView::for_state(&t.to, fields.binding.policy()),
                stats: fields.binding.orchestrator().stats(),
                runtime: &mut *runtime,
            };
            if app.on_context_state(&mut ctx) == AppControl::Exit {
                control = AppControl::Exit;
            }
            restored |= t.to == ContextState::Restored;
        }
    });

    if restored {
        surface_ready(app, id, entry);
    }
    control
}

impl<A> ApplicationHandler for AppState<A>
where
    A: CoreApp + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if !self.windows.is_empty() {
            return;
        }

        if let Err(e) = self.create_window_entry(event_loop, self.initial.clone()) {
            log::error!("failed to create initial window: {e:#}");
            self.request_exit();
            event_loop.exit();
            return;
        }

        for entry in self.windows.values() {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        let now = self.clock.now();
        let mut runtime_ctx = RuntimeCtx::default();
        let mut exit_from_app = false;
        let mut wake_at: Option<Timestamp> = None;

        let (app, windows) = (&mut self.app, &mut self.windows);
        for (&id, entry) in windows.iter_mut() {
            let transitions = entry.with_binding_mut(|b| {
                b.surface().poll_device();
                b.pump(now)
            });
            if dispatch_transitions(app, id, entry, &transitions, &mut runtime_ctx)
                == AppControl::Exit
            {
                exit_from_app = true;
            }

            entry.with(|fields| {
                // Continuous redraw while healthy; nothing while unhealthy.
                if fields.binding.frames_allowed() && fields.binding.surface().frame_loop_running()
                {
                    fields.window.request_redraw();
                }
                if let Some(at) = fields.binding.next_deadline() {
                    wake_at = Some(wake_at.map_or(at, |w| w.min(at)));
                }
            });
        }

        event_loop.set_control_flow(match wake_at {
            Some(at) => ControlFlow::WaitUntil(self.clock.instant_at(at)),
            None => ControlFlow::Wait,
        });

        if exit_from_app {
            runtime_ctx.exit();
        }
        self.apply_commands(event_loop, runtime_ctx);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        if !self.windows.contains_key(&window_id) {
            return;
        }

        if self.app.on_window_event(window_id, &event) == AppControl::Exit {
            self.request_exit();
            event_loop.exit();
            return;
        }

        // Runtime-managed window lifecycle / resize / redraw handling.
        match &event {
            WindowEvent::CloseRequested => {
                self.destroy_window_entry(window_id);
                if self.windows.is_empty() {
                    self.request_exit();
                    event_loop.exit();
                }
            }

            WindowEvent::Resized(new_size) => {
                if let Some(entry) = self.windows.get_mut(&window_id) {
                    entry.with_binding_mut(|b| b.surface_mut().resize(*new_size));
                    entry.with_window(|w| w.request_redraw());
                }
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(entry) = self.windows.get_mut(&window_id) {
                    let new_size = entry.with_window(|w| w.inner_size());
                    entry.with_binding_mut(|b| b.surface_mut().resize(new_size));
                    entry.with_window(|w| w.request_redraw());
                }
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop, window_id),

            _ => {}
        }

        if self.exit_requested {
            event_loop.exit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_polls_for_device_loss() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.recovery.poll_interval, Some(Duration::from_millis(500)));
        assert!(cfg.recovery.validate().is_ok());
    }

    #[test]
    fn runtime_commands_are_buffered_in_order() {
        let mut ctx = RuntimeCtx::default();
        ctx.create_window(RuntimeConfig::default());
        ctx.exit();

        assert_eq!(ctx.commands.len(), 2);
        assert!(matches!(ctx.commands[0], Command::CreateWindow(_)));
        assert!(matches!(ctx.commands[1], Command::Exit));
    }
}

use revive_core::{
    BindError, ContextDiagnostics, ProbeError, ProbeRequest, ProbeStrategy, SignalSink,
    SurfaceAdapter,
};
use wgpu::SurfaceError;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::render::clear_pass;

use super::{Gpu, GpuFrame, GpuInit, LossWatch};

/// A winit window plus its (possibly missing) wgpu device, as seen by the
/// recovery core.
///
/// When the initial device cannot be created, the window still mounts: the
/// failure is reported as a creation error once listeners are attached.
pub struct WindowSurface<'w> {
    window: &'w Window,
    gpu: Option<Gpu<'w>>,
    init: GpuInit,
    watch: LossWatch,

    /// Creation failure waiting for a sink to report into.
    creation_error: Option<ContextDiagnostics>,

    /// Whether the continuous redraw loop is running.
    frame_loop: bool,

    /// Color of the single frame presented by a successful probe.
    probe_clear: wgpu::Color,
}

impl<'w> WindowSurface<'w> {
    pub fn new(window: &'w Window, init: GpuInit) -> Self {
        let watch = LossWatch::new();

        let (gpu, creation_error) =
            match pollster::block_on(Gpu::new(window, init.clone(), watch.clone())) {
                Ok(gpu) => {
                    log::info!("gpu ready: {}", gpu.diagnostics());
                    (Some(gpu), None)
                }
                Err(e) => {
                    log::error!("GPU initialization failed for window: {e:#}");
                    let diag = ContextDiagnostics::default().with_message(format!("{e:#}"));
                    (None, Some(diag))
                }
            };

        Self {
            window,
            gpu,
            init,
            watch,
            creation_error,
            frame_loop: true,
            probe_clear: wgpu::Color::BLACK,
        }
    }

    pub fn with_probe_clear(mut self, color: wgpu::Color) -> Self {
        self.probe_clear = color;
        self
    }

    #[inline]
    pub fn window(&self) -> &'w Window {
        self.window
    }

    /// The live GPU context, if one has ever been created.
    #[inline]
    pub fn gpu(&self) -> Option<&Gpu<'w>> {
        self.gpu.as_ref()
    }

    #[inline]
    pub fn gpu_mut(&mut self) -> Option<&mut Gpu<'w>> {
        self.gpu.as_mut()
    }

    /// `false` between [`cancel_frame`](SurfaceAdapter::cancel_frame) and
    /// [`resume_frames`](SurfaceAdapter::resume_frames).
    #[inline]
    pub fn frame_loop_running(&self) -> bool {
        self.frame_loop
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.resize(size);
        }
    }

    /// Pumps wgpu callbacks so a device loss is noticed promptly.
    pub fn poll_device(&self) {
        if let Some(gpu) = self.gpu.as_ref() {
            gpu.poll_device();
        }
    }

    /// Destroys the current device to exercise recovery.
    pub fn simulate_loss(&self) {
        match self.gpu.as_ref() {
            Some(gpu) => gpu.simulate_loss(),
            None => log::warn!("no device to lose"),
        }
    }

    fn reacquire(&mut self, replace_surface: bool) -> anyhow::Result<()> {
        match self.gpu.as_mut() {
            Some(gpu) => pollster::block_on(gpu.recover(replace_surface)),
            None => {
                let gpu = pollster::block_on(Gpu::new(
                    self.window,
                    self.init.clone(),
                    self.watch.clone(),
                ))?;
                self.gpu = Some(gpu);
                Ok(())
            }
        }
    }

    /// Acquires, clears, and presents one frame on the current device.
    fn present_probe_frame(&mut self) -> Result<(), ProbeError> {
        let Some(gpu) = self.gpu.as_mut() else {
            return Err(ProbeError::new("no device after reacquire"));
        };

        let mut frame = acquire_with_retry(gpu)?;
        clear_pass(&mut frame.encoder, &frame.view, self.probe_clear);
        self.window.pre_present_notify();
        gpu.submit(frame);
        gpu.poll_device();

        if gpu.is_lost() {
            return Err(ProbeError::new("device lost again during probe frame"));
        }
        Ok(())
    }
}

/// A freshly configured surface may still report `Outdated` once.
fn acquire_with_retry(gpu: &mut Gpu<'_>) -> Result<GpuFrame, ProbeError> {
    let mut last: Option<SurfaceError> = None;
    for _ in 0..2 {
        match gpu.begin_frame() {
            Ok(frame) => return Ok(frame),
            Err(err) => {
                let action = gpu.handle_surface_error(&err);
                if !action.is_recoverable_in_place() {
                    return Err(ProbeError::new(format!(
                        "probe frame not acquired: {err} ({action:?})"
                    )));
                }
                last = Some(err);
            }
        }
    }
    Err(ProbeError::new(format!(
        "probe frame not acquired after reconfigure: {}",
        last.map(|e| e.to_string()).unwrap_or_default()
    )))
}

impl SurfaceAdapter for WindowSurface<'_> {
    fn attach(&mut self, sink: SignalSink) -> Result<(), BindError> {
        if let Some(diag) = self.creation_error.take() {
            sink.creation_error(diag);
        }
        self.watch.set_sink(Some(sink));
        Ok(())
    }

    fn detach(&mut self) {
        self.watch.set_sink(None);
    }

    fn is_context_lost(&self) -> Option<bool> {
        self.gpu.as_ref().map(Gpu::is_lost)
    }

    fn diagnostics(&self) -> ContextDiagnostics {
        self.gpu
            .as_ref()
            .map(Gpu::diagnostics)
            .unwrap_or_default()
    }

    fn probe(&mut self, request: ProbeRequest) -> Result<(), ProbeError> {
        let replace = request.strategy == ProbeStrategy::ReplaceSurface;
        log::info!(
            "recovery attempt {} ({})",
            request.attempt,
            if replace { "new surface" } else { "same surface" }
        );

        self.reacquire(replace)
            .map_err(|e| ProbeError::new(format!("{e:#}")))?;
        self.present_probe_frame()
    }

    fn cancel_frame(&mut self) {
        self.frame_loop = false;
    }

    fn resume_frames(&mut self) {
        self.frame_loop = true;
        self.window.request_redraw();
    }
}

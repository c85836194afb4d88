use anyhow::{Context, Result};
use revive_core::ContextDiagnostics;
use wgpu::SurfaceError;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use super::surface;
use super::{GpuFrame, GpuInit, LossWatch, SurfaceErrorAction};

/// Owns wgpu core objects and the surface configuration.
///
/// This type is the low-level rendering context:
/// - creates and stores Instance/Adapter/Device/Queue
/// - creates and configures the Surface (swapchain)
/// - acquires frames and provides an encoder + view for rendering
/// - recreates the device (and optionally the surface) after a loss
pub struct Gpu<'w> {
    window: &'w Window,

    instance: wgpu::Instance,

    /// Surface bound to the window. Replaced wholesale on last-resort recovery.
    surface: wgpu::Surface<'w>,

    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,

    /// Active surface configuration.
    config: wgpu::SurfaceConfiguration,

    /// Current drawable size in physical pixels.
    size: PhysicalSize<u32>,

    init: GpuInit,
    watch: LossWatch,
}

struct DeviceParts {
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
}

impl<'w> Gpu<'w> {
    /// Creates a GPU context bound to a window.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn new(window: &'w Window, init: GpuInit, watch: LossWatch) -> Result<Self> {
        let size = window.inner_size();
        anyhow::ensure!(size.width > 0 && size.height > 0, "window has zero size");

        let instance = new_instance();
        let surface = instance
            .create_surface(window)
            .context("failed to create wgpu surface")?;

        let parts = acquire_device(&instance, &surface, &init, size).await?;
        watch.install(&parts.device);
        surface.configure(&parts.device, &parts.config);

        Ok(Self {
            window,
            instance,
            surface,
            adapter: parts.adapter,
            device: parts.device,
            queue: parts.queue,
            config: parts.config,
            size,
            init,
            watch,
        })
    }

    /// Reacquires adapter + device on the existing surface, or on a brand-new
    /// instance/surface pair when `replace_surface` is set.
    ///
    /// Resources created on the previous device are invalid afterwards.
    pub async fn recover(&mut self, replace_surface: bool) -> Result<()> {
        if replace_surface {
            let instance = new_instance();
            let surface = instance
                .create_surface(self.window)
                .context("failed to create replacement wgpu surface")?;
            self.instance = instance;
            self.surface = surface;
            log::info!("replaced wgpu surface");
        }

        let size = self.window.inner_size();
        let parts = acquire_device(&self.instance, &self.surface, &self.init, size).await?;
        self.watch.install(&parts.device);
        self.surface.configure(&parts.device, &parts.config);

        self.adapter = parts.adapter;
        self.device = parts.device;
        self.queue = parts.queue;
        self.config = parts.config;
        self.size = size;

        log::info!("wgpu device recreated on {}", self.adapter.get_info().name);
        Ok(())
    }

    /// Returns the active surface format.
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Returns the current drawable size (physical pixels).
    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    /// Returns a reference to the logical device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Returns a reference to the command queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    #[inline]
    pub fn is_lost(&self) -> bool {
        self.watch.is_lost()
    }

    /// Lets wgpu run pending callbacks (including device-lost) without blocking.
    pub fn poll_device(&self) {
        if let Err(e) = self.device.poll(wgpu::PollType::Poll) {
            log::debug!("device poll: {e}");
        }
    }

    /// Destroys the device on purpose. Used to exercise the recovery path.
    pub fn simulate_loss(&self) {
        log::warn!("destroying wgpu device to simulate a loss");
        self.device.destroy();
        self.watch.mark_lost();
    }

    /// Adapter readings for diagnostics.
    pub fn diagnostics(&self) -> ContextDiagnostics {
        adapter_diagnostics(&self.adapter)
    }

    /// Reconfigures the surface after a resize.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        surface::apply_resize(
            &self.surface,
            &self.device,
            &mut self.config,
            &mut self.size,
            new_size,
        );
    }

    /// Acquires the next surface texture and creates an encoder.
    pub fn begin_frame(&self) -> std::result::Result<GpuFrame, SurfaceError> {
        let surface_texture = self.surface.get_current_texture()?;
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("revive frame encoder"),
            });

        Ok(GpuFrame {
            surface_texture,
            view,
            encoder,
        })
    }

    /// Submits the recorded commands for the given frame.
    ///
    /// Presentation occurs when `surface_texture` is presented after submission.
    pub fn submit(&self, frame: GpuFrame) {
        self.queue.submit(std::iter::once(frame.encoder.finish()));
        drop(frame.view);
        frame.surface_texture.present();
    }

    /// Converts a `SurfaceError` into a higher-level action.
    pub fn handle_surface_error(&mut self, err: &SurfaceError) -> SurfaceErrorAction {
        surface::handle_surface_error(
            &self.surface,
            &self.device,
            &self.config,
            self.size,
            self.watch.is_lost(),
            err,
        )
    }
}

fn new_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    })
}

async fn acquire_device(
    instance: &wgpu::Instance,
    surface: &wgpu::Surface<'_>,
    init: &GpuInit,
    size: PhysicalSize<u32>,
) -> Result<DeviceParts> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: init.power_preference,
            compatible_surface: Some(surface),
            force_fallback_adapter: false,
        })
        .await
        .context("failed to find a suitable GPU adapter")?;

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("revive-engine device"),
            required_features: init.required_features,
            required_limits: init.required_limits.clone(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        })
        .await
        .context("failed to create wgpu device/queue")?;

    let caps = surface.get_capabilities(&adapter);
    let config = surface::negotiate_config(&caps, init, size)
        .context("no supported surface formats")?;

    Ok(DeviceParts {
        adapter,
        device,
        queue,
        config,
    })
}

pub(crate) fn adapter_diagnostics(adapter: &wgpu::Adapter) -> ContextDiagnostics {
    let info = adapter.get_info();
    let driver = match (info.driver.is_empty(), info.driver_info.is_empty()) {
        (true, true) => None,
        (false, true) => Some(info.driver.clone()),
        (true, false) => Some(info.driver_info.clone()),
        (false, false) => Some(format!("{} ({})", info.driver, info.driver_info)),
    };

    ContextDiagnostics {
        vendor: Some(format!("{:#06x}", info.vendor)),
        renderer: Some(info.name.clone()).filter(|n| !n.is_empty()),
        backend: Some(format!("{:?}", info.backend)),
        driver,
        extensions: Vec::new(),
        message: None,
    }
}

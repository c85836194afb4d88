//! Surface configuration, negotiated again on every device (re)creation.
//!
//! A recovered device may sit on a different adapter, so nothing from the
//! previous configuration is assumed to still be supported.

use winit::dpi::PhysicalSize;

use super::{GpuInit, SurfaceErrorAction};

const SRGB_FORMATS: [wgpu::TextureFormat; 2] = [
    wgpu::TextureFormat::Bgra8UnormSrgb,
    wgpu::TextureFormat::Rgba8UnormSrgb,
];

/// Builds a configuration `caps` can accept, or `None` when the surface
/// exposes no format at all (the adapter cannot present to it).
pub(crate) fn negotiate_config(
    caps: &wgpu::SurfaceCapabilities,
    init: &GpuInit,
    size: PhysicalSize<u32>,
) -> Option<wgpu::SurfaceConfiguration> {
    let first = *caps.formats.first()?;
    let format = if init.prefer_srgb {
        SRGB_FORMATS
            .into_iter()
            .find(|f| caps.formats.contains(f))
            .unwrap_or(first)
    } else {
        first
    };

    let alpha_mode = init
        .alpha_mode
        .filter(|m| caps.alpha_modes.contains(m))
        .or_else(|| caps.alpha_modes.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto);

    // Fifo is the only mode every backend must support.
    let present_mode = if caps.present_modes.contains(&init.present_mode)
        || matches!(
            init.present_mode,
            wgpu::PresentMode::AutoVsync | wgpu::PresentMode::AutoNoVsync
        ) {
        init.present_mode
    } else {
        log::warn!(
            "present mode {:?} unsupported by this adapter, using Fifo",
            init.present_mode
        );
        wgpu::PresentMode::Fifo
    };

    Some(wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode,
        alpha_mode,
        view_formats: vec![],
        desired_maximum_frame_latency: init.desired_maximum_frame_latency,
    })
}

/// Records `new_size`; reconfigures only for a non-empty size, which wgpu requires.
pub(crate) fn apply_resize(
    surface: &wgpu::Surface,
    device: &wgpu::Device,
    config: &mut wgpu::SurfaceConfiguration,
    size: &mut PhysicalSize<u32>,
    new_size: PhysicalSize<u32>,
) {
    *size = new_size;
    if new_size.width == 0 || new_size.height == 0 {
        return;
    }

    config.width = new_size.width;
    config.height = new_size.height;
    surface.configure(device, config);
}

/// A `Lost` surface on a dead device cannot be fixed by reconfiguring, so
/// any error is handed to recovery once the device is known to be gone.
pub(crate) fn classify_surface_error(
    err: &wgpu::SurfaceError,
    device_lost: bool,
) -> SurfaceErrorAction {
    if device_lost {
        return SurfaceErrorAction::DeviceLost;
    }
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => SurfaceErrorAction::Reconfigured,
        wgpu::SurfaceError::OutOfMemory => SurfaceErrorAction::Fatal,
        wgpu::SurfaceError::Timeout | wgpu::SurfaceError::Other => SurfaceErrorAction::SkipFrame,
    }
}

/// Classifies `err` and performs the reconfigure it calls for.
pub(crate) fn handle_surface_error(
    surface: &wgpu::Surface,
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    device_lost: bool,
    err: &wgpu::SurfaceError,
) -> SurfaceErrorAction {
    let action = classify_surface_error(err, device_lost);
    if action == SurfaceErrorAction::Reconfigured && size.width > 0 && size.height > 0 {
        surface.configure(device, config);
    }
    action
}

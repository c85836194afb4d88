/// What the caller should do after `get_current_texture` failed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; rendering may resume next frame.
    Reconfigured,
    /// Transient error; skip the current frame.
    SkipFrame,
    /// The device behind the surface is gone; hand over to recovery.
    DeviceLost,
    /// Out of memory; terminate gracefully.
    Fatal,
}

impl SurfaceErrorAction {
    /// Whether a retry on the same device can succeed.
    #[inline]
    pub fn is_recoverable_in_place(self) -> bool {
        matches!(self, Self::Reconfigured | Self::SkipFrame)
    }
}

/// One acquired swapchain image plus the encoder recording into it.
///
/// Hand it back to [`Gpu::submit`](super::Gpu::submit) promptly; while it is
/// alive no further image can be acquired.
pub struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
}

impl GpuFrame {
    /// Size of the acquired image, which may lag a pending resize.
    pub fn extent(&self) -> (u32, u32) {
        let size = self.surface_texture.texture.size();
        (size.width, size.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_reconfigure_and_skip_stay_on_the_device() {
        assert!(SurfaceErrorAction::Reconfigured.is_recoverable_in_place());
        assert!(SurfaceErrorAction::SkipFrame.is_recoverable_in_place());
        assert!(!SurfaceErrorAction::DeviceLost.is_recoverable_in_place());
        assert!(!SurfaceErrorAction::Fatal.is_recoverable_in_place());
    }
}

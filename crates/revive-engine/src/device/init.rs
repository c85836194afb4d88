/// Initialization parameters for the GPU layer.
///
/// Reused verbatim every time the device is recreated after a loss, so a
/// recovered window comes back with the same surface setup.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Prefer an sRGB surface format when available.
    pub prefer_srgb: bool,

    /// Present mode (swap behavior).
    ///
    /// FIFO is broadly supported and generally appropriate for UI workloads.
    pub present_mode: wgpu::PresentMode,

    /// Optional alpha mode preference for the surface.
    ///
    /// If provided but unsupported on the current surface, a supported mode is selected.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    /// Adapter preference. Recovery requests a fresh adapter with the same preference.
    pub power_preference: wgpu::PowerPreference,

    /// Required wgpu features.
    ///
    /// Favor an empty set for portability: a recovered adapter may be a
    /// different (e.g. integrated) GPU.
    pub required_features: wgpu::Features,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,

    /// Desired maximum frame latency for the surface.
    pub desired_maximum_frame_latency: u32,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            power_preference: wgpu::PowerPreference::HighPerformance,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
        }
    }
}

impl GpuInit {
    pub fn present_mode(mut self, mode: wgpu::PresentMode) -> Self {
        self.present_mode = mode;
        self
    }

    pub fn power_preference(mut self, pref: wgpu::PowerPreference) -> Self {
        self.power_preference = pref;
        self
    }

    /// Limits low enough for any adapter a recovery might land on.
    pub fn downlevel(mut self) -> Self {
        self.required_limits = wgpu::Limits::downlevel_webgl2_defaults();
        self
    }
}

//! Platform-neutral configuration for canvas surfaces.

/// Fired when the browser drops the WebGL context.
pub const CONTEXT_LOST_EVENT: &str = "webglcontextlost";
/// Fired when a previously lost context becomes usable again.
pub const CONTEXT_RESTORED_EVENT: &str = "webglcontextrestored";
/// Fired during `getContext` when no context can be created.
pub const CREATION_ERROR_EVENT: &str = "webglcontextcreationerror";

/// `gl.getError()` value reported once the context is gone.
pub const CONTEXT_LOST_WEBGL: u32 = 0x9242;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum ContextKind {
    #[default]
    WebGl2,
    WebGl,
}

impl ContextKind {
    /// Identifier passed to `canvas.getContext`.
    pub fn context_id(self) -> &'static str {
        match self {
            ContextKind::WebGl2 => "webgl2",
            ContextKind::WebGl => "webgl",
        }
    }

    pub fn backend_name(self) -> &'static str {
        match self {
            ContextKind::WebGl2 => "WebGL 2",
            ContextKind::WebGl => "WebGL 1",
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum PowerPreference {
    #[default]
    Default,
    HighPerformance,
    LowPower,
}

impl PowerPreference {
    pub fn as_str(self) -> &'static str {
        match self {
            PowerPreference::Default => "default",
            PowerPreference::HighPerformance => "high-performance",
            PowerPreference::LowPower => "low-power",
        }
    }
}

/// How a canvas surface acquires its context.
#[derive(Debug, Clone, PartialEq)]
pub struct WebOptions {
    pub kind: ContextKind,
    /// Try WebGL 1 when a WebGL 2 context cannot be created.
    pub allow_webgl1_fallback: bool,
    pub antialias: bool,
    pub power_preference: PowerPreference,
    /// Color of the frame a successful probe renders.
    pub probe_clear: [f32; 4],
}

impl Default for WebOptions {
    fn default() -> Self {
        Self {
            kind: ContextKind::WebGl2,
            allow_webgl1_fallback: true,
            antialias: true,
            power_preference: PowerPreference::Default,
            probe_clear: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl WebOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: ContextKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn allow_webgl1_fallback(mut self, on: bool) -> Self {
        self.allow_webgl1_fallback = on;
        self
    }

    pub fn antialias(mut self, on: bool) -> Self {
        self.antialias = on;
        self
    }

    pub fn power_preference(mut self, pref: PowerPreference) -> Self {
        self.power_preference = pref;
        self
    }

    pub fn probe_clear(mut self, rgba: [f32; 4]) -> Self {
        self.probe_clear = rgba;
        self
    }

    /// Context kinds to request, in order.
    pub fn kinds_to_try(&self) -> Vec<ContextKind> {
        match self.kind {
            ContextKind::WebGl2 if self.allow_webgl1_fallback => {
                vec![ContextKind::WebGl2, ContextKind::WebGl]
            }
            kind => vec![kind],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webgl2_falls_back_to_webgl1_by_default() {
        let opts = WebOptions::default();
        assert_eq!(opts.kinds_to_try(), vec![ContextKind::WebGl2, ContextKind::WebGl]);
    }

    #[test]
    fn fallback_can_be_disabled() {
        let opts = WebOptions::new().allow_webgl1_fallback(false);
        assert_eq!(opts.kinds_to_try(), vec![ContextKind::WebGl2]);
    }

    #[test]
    fn webgl1_never_upgrades() {
        let opts = WebOptions::new().kind(ContextKind::WebGl);
        assert_eq!(opts.kinds_to_try(), vec![ContextKind::WebGl]);
    }

    #[test]
    fn context_ids_match_get_context_names() {
        assert_eq!(ContextKind::WebGl2.context_id(), "webgl2");
        assert_eq!(ContextKind::WebGl.context_id(), "webgl");
        assert_eq!(PowerPreference::HighPerformance.as_str(), "high-performance");
    }
}

//! Contract between the core and an embedding rendering surface.
//!
//! The surface (a canvas + WebGL context, or a window + wgpu device) owns all
//! rendering content. The core only asks it to install listeners, answer
//! health questions, attempt recovery, and start or stop its frame loop.

use std::fmt;

use crate::error::{BindError, ProbeError};
use crate::monitor::SignalSink;

/// Capability readings used to explain a creation error to the user.
///
/// Every field is best-effort: a probe that fails or is unavailable reads as
/// `None` (or an empty list), never as an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextDiagnostics {
    pub vendor: Option<String>,
    pub renderer: Option<String>,
    pub backend: Option<String>,
    pub driver: Option<String>,
    pub extensions: Vec<String>,
    /// Platform-provided status text (e.g. `statusMessage` of a creation error).
    pub message: Option<String>,
}

impl ContextDiagnostics {
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }
}

impl fmt::Display for ContextDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unknown = "unknown";
        write!(
            f,
            "vendor={} renderer={} backend={} driver={} extensions={}",
            self.vendor.as_deref().unwrap_or(unknown),
            self.renderer.as_deref().unwrap_or(unknown),
            self.backend.as_deref().unwrap_or(unknown),
            self.driver.as_deref().unwrap_or(unknown),
            self.extensions.len(),
        )?;
        if let Some(msg) = &self.message {
            write!(f, " message={msg:?}")?;
        }
        Ok(())
    }
}

/// How hard a probe should try.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ProbeStrategy {
    /// Reacquire the context on the existing presentation target and render a frame.
    Reacquire,
    /// Substitute a fresh presentation target (new canvas node, new wgpu surface)
    /// and acquire a context on it. Last resort.
    ReplaceSurface,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ProbeRequest {
    /// 1-based attempt number within the current loss episode.
    pub attempt: u32,
    pub strategy: ProbeStrategy,
}

/// Implemented by the embedding rendering surface.
pub trait SurfaceAdapter {
    /// Installs loss / restore / creation-error listeners that report into `sink`.
    fn attach(&mut self, sink: SignalSink) -> Result<(), BindError> {
        let _ = sink;
        Ok(())
    }

    /// Removes listeners installed by [`attach`](Self::attach).
    fn detach(&mut self) {}

    /// `true` once the surface has been destroyed and can no longer be bound.
    fn is_torn_down(&self) -> bool {
        false
    }

    /// Best-effort `isContextLost()` reading. `None` when it cannot be determined.
    fn is_context_lost(&self) -> Option<bool>;

    fn diagnostics(&self) -> ContextDiagnostics {
        ContextDiagnostics::default()
    }

    /// Attempts to re-establish a usable context and render one frame.
    fn probe(&mut self, request: ProbeRequest) -> Result<(), ProbeError>;

    /// Drops any pending animation-frame request.
    fn cancel_frame(&mut self);

    /// Frame re-entry: restarts the per-frame loop.
    fn resume_frames(&mut self);
}

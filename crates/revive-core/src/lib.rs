//! Revive core.
//!
//! Platform-neutral pieces of GPU context loss handling:
//! - [`monitor`] turns platform signals into loss / restore / creation-error events
//! - [`recovery`] drives bounded, delayed recovery attempts
//! - [`ledger`] tracks GPU resources so they can be disposed deterministically
//! - [`binding`] ties one rendering surface to all of the above
//!
//! Nothing in here reads a clock or touches a GPU API. Platforms feed
//! [`Timestamp`]s and implement [`SurfaceAdapter`].

pub mod binding;
pub mod error;
pub mod ledger;
pub mod monitor;
pub mod policy;
pub mod recovery;
pub mod state;
pub mod surface;
pub mod time;

#[cfg(test)]
pub(crate) mod testing;

pub use binding::SurfaceBinding;
pub use error::{BindError, DisposeError, PolicyError, ProbeError};
pub use ledger::{
    DisposeStats, GpuResource, MaterialRef, MaterialSlot, ResourceHandle, ResourceKind,
    ResourceLedger, SceneNode,
};
pub use monitor::{ContextMonitor, ContextSignal, LossEvent, SignalSink, Subscription};
pub use policy::{Backoff, RecoveryPolicy};
pub use recovery::{RecoveryOrchestrator, RecoveryStats, SubscriberId, Transition};
pub use state::{ContextState, FallbackView};
pub use surface::{ContextDiagnostics, ProbeRequest, ProbeStrategy, SurfaceAdapter};
pub use time::Timestamp;

use std::fmt;
use std::ops::AddAssign;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::DisposeError;

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a GPU resource.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ResourceHandle(u64);

impl ResourceHandle {
    /// Allocates a new, globally unique handle.
    pub fn next() -> Self {
        ResourceHandle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ResourceKind {
    Geometry,
    Material,
    Texture,
}

/// A GPU-backed object with a native disposal routine.
///
/// Scene code owns the resource; the ledger only holds a weak reference and
/// guarantees `dispose` is invoked at most once per handle.
pub trait GpuResource {
    fn handle(&self) -> ResourceHandle;

    fn kind(&self) -> ResourceKind;

    /// Releases the GPU object. `Err` means the driver refused; a repeated
    /// call must be a logged no-op returning `Ok`.
    fn dispose(&self) -> Result<(), DisposeError>;

    /// Optional debug label used in logs.
    fn label(&self) -> Option<&str> {
        None
    }
}

/// Disposal counts, either for one pass or accumulated.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct DisposeStats {
    pub geometries: u64,
    pub materials: u64,
    pub textures: u64,
    /// Disposal routines that returned an error. Not included in the kind counts.
    pub failures: u64,
}

impl DisposeStats {
    #[inline]
    pub fn total(&self) -> u64 {
        self.geometries + self.materials + self.textures
    }

    pub(crate) fn record(&mut self, kind: ResourceKind) {
        match kind {
            ResourceKind::Geometry => self.geometries += 1,
            ResourceKind::Material => self.materials += 1,
            ResourceKind::Texture => self.textures += 1,
        }
    }
}

impl AddAssign for DisposeStats {
    fn add_assign(&mut self, rhs: Self) {
        self.geometries += rhs.geometries;
        self.materials += rhs.materials;
        self.textures += rhs.textures;
        self.failures += rhs.failures;
    }
}

impl fmt::Display for DisposeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} geometries, {} materials, {} textures ({} failed)",
            self.geometries, self.materials, self.textures, self.failures
        )
    }
}

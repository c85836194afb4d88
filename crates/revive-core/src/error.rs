use std::fmt;

/// Binding a surface to the monitor failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// The surface was already torn down or unbound.
    InvalidSurface { reason: String },
    /// The recovery policy was rejected.
    Policy(PolicyError),
}

impl BindError {
    pub fn invalid_surface(reason: impl Into<String>) -> Self {
        BindError::InvalidSurface { reason: reason.into() }
    }
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindError::InvalidSurface { reason } => write!(f, "invalid surface: {reason}"),
            BindError::Policy(e) => write!(f, "invalid recovery policy: {e}"),
        }
    }
}

impl std::error::Error for BindError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BindError::Policy(e) => Some(e),
            BindError::InvalidSurface { .. } => None,
        }
    }
}

impl From<PolicyError> for BindError {
    fn from(e: PolicyError) -> Self {
        BindError::Policy(e)
    }
}

/// A [`crate::RecoveryPolicy`] that cannot drive a recovery loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyError {
    /// `max_attempts` must be at least 1.
    ZeroAttempts,
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyError::ZeroAttempts => f.write_str("max_attempts must be at least 1"),
        }
    }
}

impl std::error::Error for PolicyError {}

/// A recovery probe did not yield a usable context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeError {
    pub message: String,
}

impl ProbeError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { message: msg.into() }
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "recovery probe failed: {}", self.message)
    }
}

impl std::error::Error for ProbeError {}

/// A resource's native disposal routine failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisposeError {
    pub message: String,
}

impl DisposeError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { message: msg.into() }
    }
}

impl fmt::Display for DisposeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dispose failed: {}", self.message)
    }
}

impl std::error::Error for DisposeError {}

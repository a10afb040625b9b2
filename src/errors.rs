use thiserror::Error;

/// Listing capture devices failed.
///
/// Never fatal: the chooser reports it and carries on with an empty list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnumerationError {
    #[error("Device enumeration unavailable: {0}")]
    Unavailable(String),

    #[error("Device enumeration denied: {0}")]
    PermissionDenied(String),
}

/// Opening a capture stream failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("Camera not found: {0}")]
    DeviceNotFound(String),

    #[error("Camera busy [{device_id}]: {reason}")]
    DeviceBusy { device_id: String, reason: String },

    #[error("Constraints cannot be satisfied: {0}")]
    ConstraintsUnsatisfiable(String),

    #[error("Capture backend error: {0}")]
    Backend(String),
}

/// Renegotiating a live track failed. The previous settings stay in effect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    #[error("Constraint application not supported: {0}")]
    Unsupported(String),

    #[error("Constraints rejected: {0}")]
    Rejected(String),

    #[error("Track has already ended")]
    TrackEnded,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error(transparent)]
    Enumeration(#[from] EnumerationError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error("Fullscreen error: {0}")]
    Fullscreen(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown device: {0}")]
    DeviceNotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl CaptureError {
    /// Whether retrying later could succeed (busy or backend hiccup) as
    /// opposed to a hard refusal.
    pub fn is_transient(&self) -> bool {
        matches!(self, CaptureError::DeviceBusy { .. } | CaptureError::Backend(_))
    }
}

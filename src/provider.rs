//! Contracts the core consumes but does not implement.
//!
//! A capture provider enumerates devices and opens streams, tracks expose
//! capability bounds and accept renegotiation, and the window shell supplies
//! display surfaces and fullscreen presentation. The `native` feature ships a
//! nokhwa-backed provider; `testing` ships deterministic fakes.

use crate::errors::{ApplyError, CameraError, CaptureError, EnumerationError};
use crate::stream::StreamHandle;
use crate::types::{
    MediaDeviceInfo, StreamConstraints, TrackCapabilities, TrackConstraints, TrackKind,
    TrackSettings, TrackState,
};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A single media signal inside a stream
#[async_trait]
pub trait MediaTrack: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    fn kind(&self) -> TrackKind {
        TrackKind::Video
    }

    /// Capability bounds, or `None` when the runtime cannot introspect them.
    fn capabilities(&self) -> Option<TrackCapabilities> {
        None
    }

    fn settings(&self) -> TrackSettings;

    /// Renegotiate in place. Providers without support keep this default.
    async fn apply_constraints(&self, _constraints: &TrackConstraints) -> Result<(), ApplyError> {
        Err(ApplyError::Unsupported(
            "constraint application not available for this track".to_string(),
        ))
    }

    /// Release the underlying device. Must tolerate repeated calls.
    fn stop(&self);

    fn ready_state(&self) -> TrackState;
}

/// What a provider hands back for a successful open
#[derive(Debug)]
pub struct CapturedStream {
    pub id: String,
    pub device_id: String,
    pub tracks: Vec<Arc<dyn MediaTrack>>,
}

/// Platform capture subsystem
#[async_trait]
pub trait CaptureProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn enumerate(&self) -> Result<Vec<MediaDeviceInfo>, EnumerationError>;

    /// Open a stream. An exact device constraint must fail for an unknown
    /// device instead of falling back to another one.
    async fn request_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<CapturedStream, CaptureError>;
}

/// Something that renders a stream, e.g. a video element or a preview tile
pub trait DisplaySurface: Send {
    fn attach(&mut self, stream: &StreamHandle);

    fn detach(&mut self);

    /// Id of the attached stream, if any.
    fn attached_stream(&self) -> Option<&str>;
}

/// Which surface the shell should hand out
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SurfaceRole {
    Preview(String),
    Primary,
}

pub trait SurfaceFactory: Send + Sync {
    fn create_surface(&self, role: SurfaceRole) -> Box<dyn DisplaySurface>;
}

/// Fullscreen presentation owned by the window shell.
///
/// Changes made outside the core (OS gestures) reach the viewer as
/// `InputEvent::FullscreenChanged`.
pub trait FullscreenProvider: Send + Sync {
    fn is_fullscreen(&self) -> bool;

    fn request_fullscreen(&self) -> Result<(), CameraError>;

    fn exit_fullscreen(&self) -> Result<(), CameraError>;
}

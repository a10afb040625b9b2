//! nokhwa-backed capture provider.
//!
//! nokhwa calls block, so every enumeration, open and renegotiation runs on
//! the blocking pool. Device ids are nokhwa camera indices rendered as
//! strings.

use crate::errors::{ApplyError, CaptureError, EnumerationError};
use crate::permissions;
use crate::provider::{CaptureProvider, CapturedStream, MediaTrack};
use crate::types::{
    CapabilityRange, ConstrainValue, MediaDeviceInfo, StreamConstraints, TrackCapabilities,
    TrackConstraints, TrackSettings, TrackState,
};
use async_trait::async_trait;
use nokhwa::{
    pixel_format::RgbFormat,
    query,
    utils::{
        ApiBackend, CameraFormat, CameraInfo, RequestedFormat, RequestedFormatType, Resolution,
    },
    Camera,
};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Captures through the platform's native camera API
#[derive(Debug, Clone)]
pub struct NativeProvider {
    backend: ApiBackend,
}

impl NativeProvider {
    pub fn new() -> Self {
        Self::with_backend(ApiBackend::Auto)
    }

    pub fn with_backend(backend: ApiBackend) -> Self {
        Self { backend }
    }
}

impl Default for NativeProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn to_media_device(info: &CameraInfo) -> MediaDeviceInfo {
    let mut device = MediaDeviceInfo::video(info.index().to_string(), info.human_name());
    let misc = info.misc();
    if !misc.is_empty() {
        device.group_id = Some(misc);
    }
    device
}

fn clamp(value: Option<ConstrainValue>) -> Option<u32> {
    value.map(|v| match v.max {
        Some(max) => v.ideal.min(max),
        None => v.ideal,
    })
}

/// Min/max over the formats a device reports as compatible.
fn capabilities_from(formats: &[CameraFormat]) -> Option<TrackCapabilities> {
    if formats.is_empty() {
        return None;
    }
    let range = |values: Vec<f64>| {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(CapabilityRange::new(min, max))
    };
    Some(TrackCapabilities {
        width: range(formats.iter().map(|f| f.width() as f64).collect()),
        height: range(formats.iter().map(|f| f.height() as f64).collect()),
        frame_rate: range(formats.iter().map(|f| f.frame_rate() as f64).collect()),
    })
}

fn open_blocking(
    backend: ApiBackend,
    constraints: StreamConstraints,
) -> Result<CapturedStream, CaptureError> {
    permissions::check_permission_detailed().check_capture()?;

    let cameras = query(backend)
        .map_err(|e| CaptureError::Backend(format!("Failed to query cameras: {}", e)))?;
    let wanted = constraints.device_id.device_id();
    let info = match cameras.iter().find(|c| c.index().to_string() == wanted) {
        Some(info) => info,
        None if constraints.device_id.is_exact() => {
            return Err(CaptureError::DeviceNotFound(wanted.to_string()))
        }
        None => cameras
            .first()
            .ok_or_else(|| CaptureError::DeviceNotFound(wanted.to_string()))?,
    };
    let device_id = info.index().to_string();

    let mut camera = Camera::new(
        info.index().clone(),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    )
    .map_err(|e| {
        CaptureError::ConstraintsUnsatisfiable(format!("Failed to initialize camera: {}", e))
    })?;

    // Size and rate are ideal: settle for the nearest mode the camera has.
    let track_constraints = constraints.track_constraints();
    if track_constraints != TrackConstraints::default() {
        if let Err(e) = renegotiate(&mut camera, &track_constraints) {
            log::warn!("Keeping default format for {}: {}", device_id, e);
        }
    }

    let capabilities = match camera.compatible_camera_formats() {
        Ok(formats) => capabilities_from(&formats),
        Err(e) => {
            log::debug!("Camera {} does not list its formats: {}", device_id, e);
            None
        }
    };

    camera.open_stream().map_err(|e| CaptureError::DeviceBusy {
        device_id: device_id.clone(),
        reason: format!("Failed to start stream: {}", e),
    })?;
    log::info!(
        "Opened {} at {}x{} @ {} fps",
        info.human_name(),
        camera.resolution().width(),
        camera.resolution().height(),
        camera.frame_rate()
    );

    let track = NativeTrack {
        id: uuid::Uuid::new_v4().to_string(),
        camera: Arc::new(CameraCell(Mutex::new(camera))),
        capabilities,
        state: Mutex::new(TrackState::Live),
    };
    Ok(CapturedStream {
        id: uuid::Uuid::new_v4().to_string(),
        device_id,
        tracks: vec![Arc::new(track)],
    })
}

#[async_trait]
impl CaptureProvider for NativeProvider {
    fn name(&self) -> &'static str {
        "nokhwa"
    }

    async fn enumerate(&self) -> Result<Vec<MediaDeviceInfo>, EnumerationError> {
        let backend = self.backend;
        let cameras = tokio::task::spawn_blocking(move || query(backend))
            .await
            .map_err(|e| EnumerationError::Unavailable(format!("Query task failed: {}", e)))?
            .map_err(|e| EnumerationError::Unavailable(format!("Failed to query cameras: {}", e)))?;

        Ok(cameras.iter().map(to_media_device).collect())
    }

    async fn request_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<CapturedStream, CaptureError> {
        let backend = self.backend;
        let constraints = constraints.clone();
        tokio::task::spawn_blocking(move || open_blocking(backend, constraints))
            .await
            .map_err(|e| CaptureError::Backend(format!("Open task failed: {}", e)))?
    }
}

/// Owns the nokhwa camera and stops its stream when the last user goes away
struct CameraCell(Mutex<Camera>);

impl CameraCell {
    fn lock(&self) -> MutexGuard<'_, Camera> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CameraCell {
    fn drop(&mut self) {
        let mut camera = self.lock();
        if camera.is_stream_open() {
            let _ = camera.stop_stream();
        }
    }
}

// nokhwa backends hold raw platform handles; all access goes through the mutex.
unsafe impl Send for CameraCell {}
unsafe impl Sync for CameraCell {}

pub struct NativeTrack {
    id: String,
    camera: Arc<CameraCell>,
    capabilities: Option<TrackCapabilities>,
    state: Mutex<TrackState>,
}

impl NativeTrack {
    fn state(&self) -> MutexGuard<'_, TrackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Target format for a settings change. Axes the constraints leave open
/// keep their current value.
fn renegotiation_target(constraints: &TrackConstraints, current: CameraFormat) -> CameraFormat {
    let width = clamp(constraints.width).unwrap_or_else(|| current.width());
    let height = clamp(constraints.height).unwrap_or_else(|| current.height());
    let fps = clamp(constraints.frame_rate).unwrap_or_else(|| current.frame_rate());
    CameraFormat::new(Resolution::new(width, height), current.format(), fps)
}

/// Nearest supported mode to `target`: closest resolution first, then the
/// closest frame rate at that resolution. Modes sharing the target's pixel
/// format win when any exist.
fn closest_mode(target: CameraFormat, modes: &[CameraFormat]) -> Option<CameraFormat> {
    let same_format: Vec<CameraFormat> = modes
        .iter()
        .copied()
        .filter(|m| m.format() == target.format())
        .collect();
    let pool = if same_format.is_empty() { modes } else { &same_format[..] };

    let distance = |m: &CameraFormat| {
        let dx = i64::from(m.width()) - i64::from(target.width());
        let dy = i64::from(m.height()) - i64::from(target.height());
        dx * dx + dy * dy
    };
    let resolution = pool.iter().min_by_key(|m| distance(*m))?.resolution();

    pool.iter()
        .copied()
        .filter(|m| m.resolution() == resolution)
        .min_by_key(|m| m.frame_rate().abs_diff(target.frame_rate()))
}

fn renegotiate(camera: &mut Camera, constraints: &TrackConstraints) -> Result<(), ApplyError> {
    let previous = camera.camera_format();
    let target = renegotiation_target(constraints, previous);

    let modes = camera
        .compatible_camera_formats()
        .map_err(|e| ApplyError::Rejected(format!("Cannot list camera modes: {}", e)))?;
    let mode = closest_mode(target, &modes)
        .ok_or_else(|| ApplyError::Rejected(format!("No mode close to {}", target)))?;
    if mode == previous {
        return Ok(());
    }

    let request = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Exact(mode));
    match camera.set_camera_requset(request) {
        Ok(applied) => {
            log::debug!("Renegotiated {} (asked for {})", applied, target);
            Ok(())
        }
        Err(e) => {
            let restore = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Exact(previous));
            if let Err(rollback) = camera.set_camera_requset(restore) {
                log::warn!("Could not restore format {}: {}", previous, rollback);
            }
            Err(ApplyError::Rejected(format!("Camera refused {}: {}", mode, e)))
        }
    }
}

#[async_trait]
impl MediaTrack for NativeTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Option<TrackCapabilities> {
        self.capabilities
    }

    fn settings(&self) -> TrackSettings {
        let camera = self.camera.lock();
        let resolution = camera.resolution();
        TrackSettings {
            width: Some(resolution.width()),
            height: Some(resolution.height()),
            frame_rate: Some(camera.frame_rate() as f64),
        }
    }

    async fn apply_constraints(&self, constraints: &TrackConstraints) -> Result<(), ApplyError> {
        if self.ready_state() == TrackState::Ended {
            return Err(ApplyError::TrackEnded);
        }
        let camera = self.camera.clone();
        let constraints = *constraints;
        tokio::task::spawn_blocking(move || renegotiate(&mut camera.lock(), &constraints))
            .await
            .map_err(|e| ApplyError::Rejected(format!("Apply task failed: {}", e)))?
    }

    fn stop(&self) {
        let mut state = self.state();
        if *state == TrackState::Ended {
            return;
        }
        *state = TrackState::Ended;
        if let Err(e) = self.camera.lock().stop_stream() {
            log::warn!("Failed to stop camera stream: {}", e);
        }
    }

    fn ready_state(&self) -> TrackState {
        *self.state()
    }
}

impl fmt::Debug for NativeTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeTrack")
            .field("id", &self.id)
            .field("capabilities", &self.capabilities)
            .field("state", &self.ready_state())
            .finish()
    }
}

//! Deterministic capture provider, surfaces and fullscreen for offline tests
//!
//! The fake provider keeps every track it ever created so tests can count
//! live tracks after teardown and detect a track being stopped twice.

use crate::errors::{ApplyError, CameraError, CaptureError, EnumerationError};
use crate::provider::{
    CaptureProvider, CapturedStream, DisplaySurface, FullscreenProvider, MediaTrack,
    SurfaceFactory, SurfaceRole,
};
use crate::stream::StreamHandle;
use crate::types::{
    CapabilityRange, ConstrainValue, DeviceKind, MediaDeviceInfo, StreamConstraints,
    TrackCapabilities, TrackConstraints, TrackSettings, TrackState,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How a fake track answers `apply_constraints`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyBehavior {
    Accept,
    Reject(String),
    Unsupported,
}

/// Scripted behaviour of one fake device
#[derive(Debug, Clone)]
pub struct FakeDevice {
    pub info: MediaDeviceInfo,
    pub capabilities: Option<TrackCapabilities>,
    pub settings: TrackSettings,
    pub open_delay: Duration,
    pub open_error: Option<CaptureError>,
    pub apply: ApplyBehavior,
}

impl FakeDevice {
    pub fn new(device_id: &str, label: &str) -> Self {
        Self {
            info: MediaDeviceInfo::video(device_id, label),
            capabilities: None,
            settings: TrackSettings {
                width: Some(1280),
                height: Some(720),
                frame_rate: Some(30.0),
            },
            open_delay: Duration::ZERO,
            open_error: None,
            apply: ApplyBehavior::Accept,
        }
    }

    /// 4K webcam: 640x480 up to 3840x2160, 1-60 fps, idling at 1080p30.
    pub fn uhd_webcam(device_id: &str, label: &str) -> Self {
        Self::new(device_id, label)
            .with_capabilities(TrackCapabilities {
                width: Some(CapabilityRange::new(640.0, 3840.0)),
                height: Some(CapabilityRange::new(480.0, 2160.0)),
                frame_rate: Some(CapabilityRange::new(1.0, 60.0)),
            })
            .with_settings(1920, 1080, 30.0)
    }

    /// Typical laptop camera: up to 1280x720, 5-30 fps.
    pub fn hd_webcam(device_id: &str, label: &str) -> Self {
        Self::new(device_id, label).with_capabilities(TrackCapabilities {
            width: Some(CapabilityRange::new(320.0, 1280.0)),
            height: Some(CapabilityRange::new(240.0, 720.0)),
            frame_rate: Some(CapabilityRange::new(5.0, 30.0)),
        })
    }

    pub fn with_kind(mut self, kind: DeviceKind) -> Self {
        self.info.kind = kind;
        self
    }

    pub fn with_capabilities(mut self, capabilities: TrackCapabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn with_settings(mut self, width: u32, height: u32, frame_rate: f64) -> Self {
        self.settings = TrackSettings {
            width: Some(width),
            height: Some(height),
            frame_rate: Some(frame_rate),
        };
        self
    }

    pub fn without_settings(mut self) -> Self {
        self.settings = TrackSettings::default();
        self
    }

    pub fn with_open_delay_ms(mut self, millis: u64) -> Self {
        self.open_delay = Duration::from_millis(millis);
        self
    }

    pub fn failing_with(mut self, error: CaptureError) -> Self {
        self.open_error = Some(error);
        self
    }

    pub fn with_apply(mut self, apply: ApplyBehavior) -> Self {
        self.apply = apply;
        self
    }
}

#[derive(Debug, Default)]
struct FakeStats {
    opened_streams: AtomicUsize,
    double_stops: AtomicUsize,
    tracks: Mutex<Vec<Arc<FakeTrack>>>,
    requests: Mutex<Vec<StreamConstraints>>,
}

/// In-memory capture provider
#[derive(Debug, Default)]
pub struct FakeProvider {
    devices: Mutex<Vec<FakeDevice>>,
    enumerate_error: Mutex<Option<EnumerationError>>,
    stats: Arc<FakeStats>,
}

impl FakeProvider {
    pub fn new(devices: Vec<FakeDevice>) -> Self {
        Self {
            devices: Mutex::new(devices),
            ..Self::default()
        }
    }

    pub fn set_devices(&self, devices: Vec<FakeDevice>) {
        *lock(&self.devices) = devices;
    }

    pub fn add_device(&self, device: FakeDevice) {
        lock(&self.devices).push(device);
    }

    pub fn remove_device(&self, device_id: &str) {
        lock(&self.devices).retain(|d| d.info.device_id != device_id);
    }

    pub fn fail_enumeration(&self, error: EnumerationError) {
        *lock(&self.enumerate_error) = Some(error);
    }

    pub fn opened_streams(&self) -> usize {
        self.stats.opened_streams.load(Ordering::SeqCst)
    }

    /// Tracks not yet stopped, across every stream ever opened.
    pub fn live_tracks(&self) -> usize {
        lock(&self.stats.tracks)
            .iter()
            .filter(|t| t.ready_state() == TrackState::Live)
            .count()
    }

    pub fn live_tracks_for(&self, device_id: &str) -> usize {
        lock(&self.stats.tracks)
            .iter()
            .filter(|t| t.device_id == device_id && t.ready_state() == TrackState::Live)
            .count()
    }

    /// Number of `stop` calls on tracks that had already ended.
    pub fn double_stops(&self) -> usize {
        self.stats.double_stops.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<StreamConstraints> {
        lock(&self.stats.requests).clone()
    }

    pub fn tracks_for(&self, device_id: &str) -> Vec<Arc<FakeTrack>> {
        lock(&self.stats.tracks)
            .iter()
            .filter(|t| t.device_id == device_id)
            .cloned()
            .collect()
    }

    fn find_device(&self, device_id: &str) -> Option<FakeDevice> {
        lock(&self.devices)
            .iter()
            .find(|d| d.info.device_id == device_id && d.info.kind == DeviceKind::VideoInput)
            .cloned()
    }
}

#[async_trait]
impl CaptureProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn enumerate(&self) -> Result<Vec<MediaDeviceInfo>, EnumerationError> {
        if let Some(error) = lock(&self.enumerate_error).clone() {
            return Err(error);
        }
        Ok(lock(&self.devices).iter().map(|d| d.info.clone()).collect())
    }

    async fn request_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<CapturedStream, CaptureError> {
        lock(&self.stats.requests).push(constraints.clone());

        let requested = constraints.device_id.device_id();
        let device = match self.find_device(requested) {
            Some(device) => device,
            None if constraints.device_id.is_exact() => {
                return Err(CaptureError::DeviceNotFound(requested.to_string()))
            }
            None => lock(&self.devices)
                .iter()
                .find(|d| d.info.kind == DeviceKind::VideoInput)
                .cloned()
                .ok_or_else(|| CaptureError::DeviceNotFound(requested.to_string()))?,
        };

        if !device.open_delay.is_zero() {
            tokio::time::sleep(device.open_delay).await;
        }
        if let Some(error) = device.open_error.clone() {
            return Err(error);
        }

        let settings = negotiate(
            device.settings,
            device.capabilities.as_ref(),
            &constraints.track_constraints(),
        );
        let track = Arc::new(FakeTrack {
            id: uuid::Uuid::new_v4().to_string(),
            device_id: device.info.device_id.clone(),
            capabilities: device.capabilities,
            settings: Mutex::new(settings),
            state: Mutex::new(TrackState::Live),
            apply: device.apply.clone(),
            stats: self.stats.clone(),
        });
        lock(&self.stats.tracks).push(track.clone());
        self.stats.opened_streams.fetch_add(1, Ordering::SeqCst);

        Ok(CapturedStream {
            id: uuid::Uuid::new_v4().to_string(),
            device_id: device.info.device_id,
            tracks: vec![track],
        })
    }
}

fn clamp_ideal(value: Option<ConstrainValue>, range: Option<&CapabilityRange>) -> Option<f64> {
    let value = value?;
    let mut target = value.ideal as f64;
    if let Some(max) = value.max {
        target = target.min(max as f64);
    }
    if let Some(range) = range {
        if let Some(max) = range.max {
            target = target.min(max);
        }
        if let Some(min) = range.min {
            target = target.max(min);
        }
    }
    Some(target)
}

/// Closest settings the fake "hardware" can honour for `constraints`.
fn negotiate(
    current: TrackSettings,
    capabilities: Option<&TrackCapabilities>,
    constraints: &TrackConstraints,
) -> TrackSettings {
    let caps = capabilities.copied().unwrap_or_default();
    TrackSettings {
        width: clamp_ideal(constraints.width, caps.width.as_ref())
            .map(|w| w as u32)
            .or(current.width),
        height: clamp_ideal(constraints.height, caps.height.as_ref())
            .map(|h| h as u32)
            .or(current.height),
        frame_rate: clamp_ideal(constraints.frame_rate, caps.frame_rate.as_ref())
            .or(current.frame_rate),
    }
}

/// Video track produced by [`FakeProvider`]
#[derive(Debug)]
pub struct FakeTrack {
    id: String,
    device_id: String,
    capabilities: Option<TrackCapabilities>,
    settings: Mutex<TrackSettings>,
    state: Mutex<TrackState>,
    apply: ApplyBehavior,
    stats: Arc<FakeStats>,
}

impl FakeTrack {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

#[async_trait]
impl MediaTrack for FakeTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Option<TrackCapabilities> {
        self.capabilities
    }

    fn settings(&self) -> TrackSettings {
        *lock(&self.settings)
    }

    async fn apply_constraints(&self, constraints: &TrackConstraints) -> Result<(), ApplyError> {
        if self.ready_state() == TrackState::Ended {
            return Err(ApplyError::TrackEnded);
        }
        match &self.apply {
            ApplyBehavior::Accept => {
                let mut settings = lock(&self.settings);
                *settings = negotiate(*settings, self.capabilities.as_ref(), constraints);
                Ok(())
            }
            ApplyBehavior::Reject(reason) => Err(ApplyError::Rejected(reason.clone())),
            ApplyBehavior::Unsupported => Err(ApplyError::Unsupported(
                "fake track without constraint support".to_string(),
            )),
        }
    }

    fn stop(&self) {
        let mut state = lock(&self.state);
        if *state == TrackState::Ended {
            self.stats.double_stops.fetch_add(1, Ordering::SeqCst);
        }
        *state = TrackState::Ended;
    }

    fn ready_state(&self) -> TrackState {
        *lock(&self.state)
    }
}

#[derive(Debug, Default)]
struct SurfaceRecord {
    attached: usize,
    detached: usize,
    current: Option<String>,
}

/// Shared view of what happened to a [`FakeSurface`]
#[derive(Debug, Clone, Default)]
pub struct SurfaceLog(Arc<Mutex<SurfaceRecord>>);

impl SurfaceLog {
    pub fn attached(&self) -> usize {
        lock(&self.0).attached
    }

    pub fn detached(&self) -> usize {
        lock(&self.0).detached
    }

    pub fn current(&self) -> Option<String> {
        lock(&self.0).current.clone()
    }
}

#[derive(Debug)]
pub struct FakeSurface {
    name: String,
    current: Option<String>,
    log: SurfaceLog,
}

impl FakeSurface {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            current: None,
            log: SurfaceLog::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log(&self) -> SurfaceLog {
        self.log.clone()
    }
}

impl DisplaySurface for FakeSurface {
    fn attach(&mut self, stream: &StreamHandle) {
        self.current = Some(stream.id().to_string());
        let mut record = lock(&self.log.0);
        record.attached += 1;
        record.current = self.current.clone();
    }

    fn detach(&mut self) {
        self.current = None;
        let mut record = lock(&self.log.0);
        record.detached += 1;
        record.current = None;
    }

    fn attached_stream(&self) -> Option<&str> {
        self.current.as_deref()
    }
}

/// Hands out [`FakeSurface`]s and remembers their logs per role
#[derive(Debug, Default)]
pub struct FakeSurfaceFactory {
    logs: Mutex<HashMap<SurfaceRole, Vec<SurfaceLog>>>,
}

impl FakeSurfaceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log of the most recent surface created for `role`.
    pub fn log_for(&self, role: &SurfaceRole) -> Option<SurfaceLog> {
        lock(&self.logs).get(role).and_then(|logs| logs.last().cloned())
    }

    pub fn created(&self) -> usize {
        lock(&self.logs).values().map(Vec::len).sum()
    }

    /// Surfaces that currently show a stream.
    pub fn attached_surfaces(&self) -> usize {
        lock(&self.logs)
            .values()
            .flatten()
            .filter(|log| log.current().is_some())
            .count()
    }
}

impl SurfaceFactory for FakeSurfaceFactory {
    fn create_surface(&self, role: SurfaceRole) -> Box<dyn DisplaySurface> {
        let name = match &role {
            SurfaceRole::Preview(device_id) => format!("preview:{}", device_id),
            SurfaceRole::Primary => "primary".to_string(),
        };
        let surface = FakeSurface::new(&name);
        lock(&self.logs).entry(role).or_default().push(surface.log());
        Box::new(surface)
    }
}

/// Fullscreen presentation that can be told to refuse requests
#[derive(Debug, Default)]
pub struct FakeFullscreen {
    active: AtomicBool,
    refuse: AtomicBool,
    requests: AtomicUsize,
    exits: AtomicUsize,
}

impl FakeFullscreen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse_requests(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Flip the state as an OS gesture would; the caller still has to
    /// deliver the matching `FullscreenChanged` input event.
    pub fn set_external(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn exits(&self) -> usize {
        self.exits.load(Ordering::SeqCst)
    }
}

impl FullscreenProvider for FakeFullscreen {
    fn is_fullscreen(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn request_fullscreen(&self) -> Result<(), CameraError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(CameraError::Fullscreen(
                "fullscreen request refused".to_string(),
            ));
        }
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn exit_fullscreen(&self) -> Result<(), CameraError> {
        self.exits.fetch_add(1, Ordering::SeqCst);
        self.active.store(false, Ordering::SeqCst);
        Ok(())
    }
}

//! Stream lifecycle: open, attach, stop exactly once.
//!
//! Every stream opened through [`StreamManager`] ends up in a [`StreamHandle`]
//! owned by exactly one component. Stopping is idempotent and a handle stops
//! itself on drop, so neither double release nor a forgotten stream is
//! possible. [`PendingOpens`] tracks opens that are still in flight so their
//! owner can tear down without waiting and still have late streams stopped.

use crate::assert_invariant;
use crate::errors::{CaptureError, EnumerationError};
use crate::invariant_ppt::names;
use crate::provider::{CaptureProvider, CapturedStream, DisplaySurface, MediaTrack};
use crate::types::{MediaDeviceInfo, StreamConstraints, TrackConstraints, TrackKind, TrackState};
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::{JoinHandle, JoinSet};

/// An open capture stream bound to one device
pub struct StreamHandle {
    id: String,
    device_id: String,
    tracks: Vec<Arc<dyn MediaTrack>>,
    stopped: bool,
}

impl StreamHandle {
    pub fn from_captured(stream: CapturedStream) -> Self {
        Self {
            id: stream.id,
            device_id: stream.device_id,
            tracks: stream.tracks,
            stopped: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Tracks still owned by the handle; empty once stopped.
    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    pub fn video_track(&self) -> Option<Arc<dyn MediaTrack>> {
        self.tracks
            .iter()
            .find(|track| track.kind() == TrackKind::Video)
            .cloned()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn is_live(&self) -> bool {
        !self.stopped
            && self
                .tracks
                .iter()
                .any(|track| track.ready_state() == TrackState::Live)
    }

    /// Stop every track and drop the references to them.
    ///
    /// Returns `true` if this call released the stream, `false` if it had
    /// already been stopped.
    pub fn stop(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        self.stopped = true;

        let count = self.tracks.len();
        for track in self.tracks.drain(..) {
            track.stop();
        }

        assert_invariant!(
            self.tracks.is_empty(),
            names::STOPPED_STREAM_EMPTY,
            "stream::stop"
        );
        log::debug!(
            "Stopped stream {} for device {} ({} tracks)",
            self.id,
            self.device_id,
            count
        );
        true
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        if self.stop() {
            log::warn!(
                "Stream {} for device {} was dropped while live, stopped on drop",
                self.id,
                self.device_id
            );
        }
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("id", &self.id)
            .field("device_id", &self.device_id)
            .field("tracks", &self.tracks.len())
            .field("stopped", &self.stopped)
            .finish()
    }
}

/// Opens streams against a capture provider
#[derive(Clone)]
pub struct StreamManager {
    provider: Arc<dyn CaptureProvider>,
}

impl StreamManager {
    pub fn new(provider: Arc<dyn CaptureProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub async fn enumerate(&self) -> Result<Vec<MediaDeviceInfo>, EnumerationError> {
        self.provider.enumerate().await
    }

    /// Open a stream for exactly `device_id`; the track constraints are ideal.
    pub async fn open(
        &self,
        device_id: &str,
        constraints: TrackConstraints,
    ) -> Result<StreamHandle, CaptureError> {
        let request = StreamConstraints::exact_device(device_id).with_track(constraints);
        log::debug!("Requesting stream from {}: {:?}", self.provider.name(), request);

        let captured = self.provider.request_stream(&request).await.map_err(|e| {
            log::warn!("Failed to open stream for device {}: {}", device_id, e);
            e
        })?;

        let mut handle = StreamHandle::from_captured(captured);
        if handle.device_id() != device_id {
            handle.stop();
            return Err(CaptureError::DeviceNotFound(format!(
                "provider substituted {} for {}",
                handle.device_id, device_id
            )));
        }
        if handle.tracks().is_empty() {
            handle.stop();
            return Err(CaptureError::Backend(format!(
                "stream for {} carried no tracks",
                device_id
            )));
        }

        log::info!("Opened stream {} for device {}", handle.id(), device_id);
        Ok(handle)
    }

    /// Idempotent; see [`StreamHandle::stop`].
    pub fn stop(&self, handle: &mut StreamHandle) {
        handle.stop();
    }
}

type OpenOutcome<K> = (K, Result<StreamHandle, CaptureError>);

/// In-flight opens, each an independent task keyed by `K`
pub struct PendingOpens<K> {
    tasks: JoinSet<OpenOutcome<K>>,
}

impl<K> PendingOpens<K>
where
    K: fmt::Debug + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Start opening `device_id` without waiting for it.
    pub fn spawn(
        &mut self,
        key: K,
        streams: &StreamManager,
        device_id: String,
        constraints: TrackConstraints,
    ) -> Result<(), CaptureError> {
        let runtime = Handle::try_current()
            .map_err(|e| CaptureError::Backend(format!("no async runtime: {}", e)))?;
        let streams = streams.clone();
        self.tasks.spawn_on(
            async move {
                let outcome = streams.open(&device_id, constraints).await;
                (key, outcome)
            },
            &runtime,
        );
        Ok(())
    }

    /// Next finished open, without waiting.
    pub fn try_next(&mut self) -> Option<OpenOutcome<K>> {
        loop {
            match self.tasks.try_join_next()? {
                Ok(outcome) => return Some(outcome),
                Err(e) => log::error!("Stream open task did not complete: {}", e),
            }
        }
    }

    /// Wait for the next finished open. `None` once nothing is pending.
    pub async fn next(&mut self) -> Option<OpenOutcome<K>> {
        loop {
            match self.tasks.join_next().await? {
                Ok(outcome) => return Some(outcome),
                Err(e) => log::error!("Stream open task did not complete: {}", e),
            }
        }
    }

    /// Hand every pending open to a detached task that stops the resulting
    /// streams as they arrive. The join handle yields how many were stopped.
    pub fn reap(&mut self) -> Option<JoinHandle<usize>> {
        if self.tasks.is_empty() {
            return None;
        }
        let mut tasks = std::mem::replace(&mut self.tasks, JoinSet::new());

        match Handle::try_current() {
            Ok(runtime) => {
                log::debug!("Reaping {} pending stream opens", tasks.len());
                Some(runtime.spawn(async move {
                    let mut stopped = 0;
                    while let Some(joined) = tasks.join_next().await {
                        if let Ok((key, Ok(mut handle))) = joined {
                            log::info!("Stopping stream for {:?} that opened after teardown", key);
                            handle.stop();
                            stopped += 1;
                        }
                    }
                    stopped
                }))
            }
            Err(_) => {
                log::warn!(
                    "No async runtime to reap {} pending opens, aborting them",
                    tasks.len()
                );
                tasks.abort_all();
                None
            }
        }
    }
}

impl<K> Default for PendingOpens<K>
where
    K: fmt::Debug + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// A stream together with the surface rendering it.
///
/// Releasing detaches the surface and stops the stream in one step, so a
/// surface never reads from a stopped stream.
pub struct Presentation {
    handle: StreamHandle,
    surface: Box<dyn DisplaySurface>,
    released: bool,
}

impl Presentation {
    /// Bind `handle` to `surface`. A surface already showing this stream is
    /// left untouched rather than re-attached.
    pub fn attach(handle: StreamHandle, mut surface: Box<dyn DisplaySurface>) -> Self {
        if surface.attached_stream() != Some(handle.id()) {
            surface.attach(&handle);
        }
        Self {
            handle,
            surface,
            released: false,
        }
    }

    pub fn handle(&self) -> &StreamHandle {
        &self.handle
    }

    pub fn device_id(&self) -> &str {
        self.handle.device_id()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;

        self.surface.detach();
        assert_invariant!(
            self.surface.attached_stream().is_none(),
            names::DETACH_BEFORE_STOP,
            "stream::Presentation::release"
        );
        self.handle.stop()
    }
}

impl Drop for Presentation {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Presentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Presentation")
            .field("handle", &self.handle)
            .field("attached", &self.surface.attached_stream())
            .field("released", &self.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDevice, FakeProvider, FakeSurface};

    fn manager_with(devices: Vec<FakeDevice>) -> (Arc<FakeProvider>, StreamManager) {
        let provider = Arc::new(FakeProvider::new(devices));
        let manager = StreamManager::new(provider.clone());
        (provider, manager)
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (provider, streams) = manager_with(vec![FakeDevice::new("cam1", "Front")]);
        let mut handle = streams
            .open("cam1", TrackConstraints::default())
            .await
            .unwrap();

        assert!(handle.is_live());
        assert!(handle.stop());
        assert!(!handle.stop());
        assert!(handle.tracks().is_empty());
        assert_eq!(provider.live_tracks(), 0);
        assert_eq!(provider.double_stops(), 0);
    }

    #[tokio::test]
    async fn test_unknown_device_fails_instead_of_substituting() {
        let (_provider, streams) = manager_with(vec![FakeDevice::new("cam1", "Front")]);
        let result = streams.open("missing", TrackConstraints::default()).await;
        assert!(matches!(result, Err(CaptureError::DeviceNotFound(_))));
    }

    #[tokio::test]
    async fn test_dropped_handle_stops_tracks() {
        let (provider, streams) = manager_with(vec![FakeDevice::new("cam1", "Front")]);
        {
            let _handle = streams
                .open("cam1", TrackConstraints::default())
                .await
                .unwrap();
            assert_eq!(provider.live_tracks(), 1);
        }
        assert_eq!(provider.live_tracks(), 0);
    }

    #[tokio::test]
    async fn test_presentation_detaches_before_stop() {
        let (provider, streams) = manager_with(vec![FakeDevice::new("cam1", "Front")]);
        let handle = streams
            .open("cam1", TrackConstraints::default())
            .await
            .unwrap();
        let surface = FakeSurface::new("tile");
        let log = surface.log();

        let mut presentation = Presentation::attach(handle, Box::new(surface));
        assert_eq!(log.attached(), 1);
        assert!(presentation.release());
        assert!(!presentation.release());

        assert_eq!(log.detached(), 1);
        assert_eq!(provider.live_tracks(), 0);
    }

    #[tokio::test]
    async fn test_reap_stops_late_streams() {
        let (provider, streams) = manager_with(vec![
            FakeDevice::new("cam1", "Front").with_open_delay_ms(40),
            FakeDevice::new("cam2", "Back").with_open_delay_ms(60),
        ]);
        let mut pending = PendingOpens::new();
        pending
            .spawn("cam1", &streams, "cam1".to_string(), TrackConstraints::default())
            .unwrap();
        pending
            .spawn("cam2", &streams, "cam2".to_string(), TrackConstraints::default())
            .unwrap();
        assert!(pending.try_next().is_none());

        let reaper = pending.reap().expect("opens were pending");
        assert!(pending.is_empty());
        assert_eq!(reaper.await.unwrap(), 2);
        assert_eq!(provider.live_tracks(), 0);
    }
}

//! Device chooser with a live preview per camera
//!
//! Discovers video inputs, opens one preview stream per device concurrently
//! and reports the user's pick. Picking a device stops every preview before
//! the selection is announced, so the viewer never competes with a preview
//! for the same camera.

use crate::app::Shell;
use crate::assert_invariant;
use crate::errors::{CameraError, CaptureError};
use crate::events::{DeviceEvent, ShellEvent};
use crate::invariant_ppt::names;
use crate::provider::SurfaceRole;
use crate::stream::{PendingOpens, Presentation, StreamHandle};
use crate::types::DeviceDescriptor;
use std::collections::{HashMap, HashSet};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChooserPhase {
    /// Mounted, enumeration not finished
    Discovering,
    Browsing,
    /// A device was picked; previews are stopped
    Selected,
    TornDown,
}

pub struct DeviceChooser {
    shell: Shell,
    phase: ChooserPhase,
    devices: Vec<DeviceDescriptor>,
    previews: HashMap<String, Presentation>,
    preview_errors: HashMap<String, CaptureError>,
    opening: HashSet<String>,
    pending: PendingOpens<String>,
    reaper: Option<JoinHandle<usize>>,
}

impl DeviceChooser {
    pub fn new(shell: Shell) -> Self {
        Self {
            shell,
            phase: ChooserPhase::Discovering,
            devices: Vec::new(),
            previews: HashMap::new(),
            preview_errors: HashMap::new(),
            opening: HashSet::new(),
            pending: PendingOpens::new(),
            reaper: None,
        }
    }

    /// Discover devices and start their previews.
    pub async fn mount(shell: Shell) -> Self {
        let mut chooser = Self::new(shell);
        chooser.discover().await;
        chooser.start_previews();
        chooser
    }

    pub fn phase(&self) -> ChooserPhase {
        self.phase
    }

    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    pub fn preview(&self, device_id: &str) -> Option<&StreamHandle> {
        self.previews.get(device_id).map(Presentation::handle)
    }

    pub fn preview_count(&self) -> usize {
        self.previews.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Why the preview for `device_id` could not be opened, if it failed.
    pub fn preview_error(&self, device_id: &str) -> Option<&CaptureError> {
        self.preview_errors.get(device_id)
    }

    fn is_enumerated(&self, device_id: &str) -> bool {
        self.devices.iter().any(|d| d.device_id == device_id)
    }

    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, CameraError> {
        let infos = self.shell.streams.enumerate().await.map_err(|e| {
            self.shell
                .events
                .error(None, format!("Error fetching devices: {}", e));
            e
        })?;

        let mut seen = HashSet::new();
        Ok(infos
            .iter()
            .filter_map(DeviceDescriptor::from_media_device)
            .filter(|d| seen.insert(d.device_id.clone()))
            .collect())
    }

    /// Enumerate video inputs once. A failure is reported and leaves the
    /// list empty.
    pub async fn discover(&mut self) -> &[DeviceDescriptor] {
        if self.phase != ChooserPhase::Discovering {
            return &self.devices;
        }
        self.devices = self.enumerate().await.unwrap_or_default();
        self.phase = ChooserPhase::Browsing;
        log::info!(
            "Discovered {} video devices via {}",
            self.devices.len(),
            self.shell.streams.provider_name()
        );
        &self.devices
    }

    /// Start a preview open for every device that has neither a preview nor
    /// an open in flight. Returns how many opens were issued.
    pub fn start_previews(&mut self) -> usize {
        if self.phase != ChooserPhase::Browsing {
            return 0;
        }
        let constraints = self.shell.config.preview.track_constraints();
        let mut started = 0;

        for device in &self.devices {
            let id = &device.device_id;
            if self.previews.contains_key(id) || self.opening.contains(id) {
                continue;
            }
            match self
                .pending
                .spawn(id.clone(), &self.shell.streams, id.clone(), constraints)
            {
                Ok(()) => {
                    self.opening.insert(id.clone());
                    started += 1;
                }
                Err(e) => {
                    log::error!("Could not start preview for {}: {}", id, e);
                    self.preview_errors.insert(id.clone(), e);
                }
            }
        }

        log::debug!("Started {} preview opens", started);
        started
    }

    /// Integrate finished preview opens without waiting.
    pub fn poll(&mut self) -> usize {
        let mut integrated = 0;
        while let Some((device_id, outcome)) = self.pending.try_next() {
            self.on_preview(device_id, outcome);
            integrated += 1;
        }
        integrated
    }

    /// Wait until every preview open in flight has finished.
    pub async fn settle(&mut self) {
        while let Some((device_id, outcome)) = self.pending.next().await {
            self.on_preview(device_id, outcome);
        }
    }

    fn on_preview(&mut self, device_id: String, outcome: Result<StreamHandle, CaptureError>) {
        self.opening.remove(&device_id);

        if self.phase != ChooserPhase::Browsing || !self.is_enumerated(&device_id) {
            if let Ok(mut handle) = outcome {
                log::info!(
                    "Preview for {} arrived after it was no longer wanted, stopping it",
                    device_id
                );
                handle.stop();
            }
            return;
        }

        match outcome {
            Ok(handle) => {
                let surface = self
                    .shell
                    .surfaces
                    .create_surface(SurfaceRole::Preview(device_id.clone()));
                self.preview_errors.remove(&device_id);
                if let Some(mut old) = self
                    .previews
                    .insert(device_id.clone(), Presentation::attach(handle, surface))
                {
                    old.release();
                }
                log::debug!("Preview attached for {}", device_id);
            }
            Err(e) => {
                let label = self
                    .devices
                    .iter()
                    .find(|d| d.device_id == device_id)
                    .map(|d| d.label.clone())
                    .unwrap_or_else(|| device_id.clone());
                self.shell
                    .events
                    .warn(Some(&device_id), format!("Preview unavailable for {}: {}", label, e));
                self.preview_errors.insert(device_id, e);
            }
        }

        self.check_preview_keys();
    }

    fn check_preview_keys(&self) {
        assert_invariant!(
            self.previews.keys().all(|id| self.is_enumerated(id)),
            names::PREVIEW_KEYS_ENUMERATED,
            "chooser::previews"
        );
    }

    fn stop_all(&mut self) {
        let count = self.previews.len();
        for (_, mut preview) in self.previews.drain() {
            preview.release();
        }
        self.opening.clear();
        if let Some(reaper) = self.pending.reap() {
            self.reaper = Some(reaper);
        }
        if count > 0 {
            log::info!("Stopped {} previews", count);
        }
    }

    /// Stop every preview, then announce `device_id` as the selection.
    pub fn select(&mut self, device_id: &str) -> Result<(), CameraError> {
        if self.phase != ChooserPhase::Browsing {
            return Err(CameraError::InvalidState(format!(
                "cannot select while {:?}",
                self.phase
            )));
        }
        if !self.is_enumerated(device_id) {
            return Err(CameraError::DeviceNotFound(device_id.to_string()));
        }

        self.stop_all();
        self.phase = ChooserPhase::Selected;
        assert_invariant!(
            self.previews.is_empty() && self.pending.is_empty(),
            names::SELECTION_STOPS_ALL,
            "chooser::select"
        );

        log::info!("Selected device {}", device_id);
        self.shell
            .events
            .emit(ShellEvent::Selected(device_id.to_string()));
        Ok(())
    }

    /// Re-enumerate after a hot-plug. Previews of vanished devices are
    /// stopped; new devices get a preview.
    pub async fn refresh(&mut self) -> Result<Vec<DeviceEvent>, CameraError> {
        if self.phase != ChooserPhase::Browsing {
            return Err(CameraError::InvalidState(format!(
                "cannot refresh while {:?}",
                self.phase
            )));
        }
        let devices = self.enumerate().await?;
        let mut events = Vec::new();

        for old in &self.devices {
            if !devices.iter().any(|d| d.device_id == old.device_id) {
                events.push(DeviceEvent::Disconnected(old.device_id.clone()));
            }
        }
        for new in &devices {
            if !self.is_enumerated(&new.device_id) {
                events.push(DeviceEvent::Connected(new.device_id.clone()));
            }
        }

        self.devices = devices;
        for event in &events {
            if let DeviceEvent::Disconnected(id) = event {
                if let Some(mut preview) = self.previews.remove(id) {
                    preview.release();
                }
                self.preview_errors.remove(id);
                log::info!("Device {} disconnected", id);
            }
        }
        self.check_preview_keys();
        self.start_previews();

        Ok(events)
    }

    /// Stop every preview, including opens that complete later. Idempotent.
    pub fn teardown(&mut self) -> Option<JoinHandle<usize>> {
        if self.phase != ChooserPhase::TornDown {
            self.stop_all();
            self.phase = ChooserPhase::TornDown;
            log::debug!("Chooser torn down");
        }
        self.reaper.take()
    }
}

impl Drop for DeviceChooser {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for DeviceChooser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceChooser")
            .field("phase", &self.phase)
            .field("devices", &self.devices)
            .field("previews", &self.previews.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

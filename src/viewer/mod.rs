//! Single-device viewer
//!
//! Owns the primary high-resolution stream for one device and the interaction
//! state around it. Input arrives through listeners on the shared
//! [`InputBus`](crate::input::InputBus); transitions come from the pure
//! [`ViewerState::reduce`] and the viewer executes the resulting effects.

pub mod state;

pub use state::{ContextMenu, Effect, ViewerEvent, ViewerState};

use crate::app::Shell;
use crate::assert_invariant;
use crate::capability::SettingsPanel;
use crate::errors::{CameraError, CaptureError};
use crate::events::ShellEvent;
use crate::input::{ClickTarget, InputEvent, InstanceId, Key, ListenerGuard, ListenerScope, MenuItem};
use crate::invariant_ppt::names;
use crate::provider::SurfaceRole;
use crate::stream::{PendingOpens, Presentation, StreamHandle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Where the viewer is in its lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerPhase {
    /// Primary open in flight
    Opening,
    Streaming,
    /// Left through escape, a failed open or unmount; input is ignored
    Exited,
}

pub struct WebcamViewer {
    instance: InstanceId,
    device_id: String,
    shell: Shell,
    state: ViewerState,
    phase: ViewerPhase,
    primary: Option<Presentation>,
    pending: PendingOpens<u64>,
    ticket: u64,
    input_rx: mpsc::UnboundedReceiver<InputEvent>,
    listeners: Vec<ListenerGuard>,
    settings: Option<SettingsPanel>,
    reaper: Option<JoinHandle<usize>>,
}

impl WebcamViewer {
    /// Acquire input listeners and start opening the primary stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn mount(device_id: impl Into<String>, shell: Shell) -> Result<Self, CameraError> {
        let device_id = device_id.into();
        let instance = shell.input.instance_id();
        let (tx, input_rx) = mpsc::unbounded_channel();

        let mut listeners = Vec::with_capacity(3);
        for scope in [
            ListenerScope::Window,
            ListenerScope::Document,
            ListenerScope::Surface,
        ] {
            listeners.push(shell.input.listen(instance, scope, tx.clone())?);
        }

        let mut viewer = Self {
            instance,
            device_id,
            shell,
            state: ViewerState::new(),
            phase: ViewerPhase::Opening,
            primary: None,
            pending: PendingOpens::new(),
            ticket: 0,
            input_rx,
            listeners,
            settings: None,
            reaper: None,
        };
        viewer.open_primary()?;

        log::info!("Viewer {} mounted for device {}", instance, viewer.device_id);
        Ok(viewer)
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn state(&self) -> ViewerState {
        self.state
    }

    pub fn phase(&self) -> ViewerPhase {
        self.phase
    }

    pub fn is_exited(&self) -> bool {
        self.phase == ViewerPhase::Exited
    }

    pub fn primary(&self) -> Option<&StreamHandle> {
        self.primary.as_ref().map(Presentation::handle)
    }

    pub fn settings(&self) -> Option<&SettingsPanel> {
        self.settings.as_ref()
    }

    pub fn settings_mut(&mut self) -> Option<&mut SettingsPanel> {
        self.settings.as_mut()
    }

    /// Reaper for opens that were still in flight when the primary was last
    /// released.
    pub fn take_reaper(&mut self) -> Option<JoinHandle<usize>> {
        self.reaper.take()
    }

    fn open_primary(&mut self) -> Result<(), CameraError> {
        self.ticket += 1;
        self.phase = ViewerPhase::Opening;
        let constraints = self.shell.config.primary.track_constraints();
        self.pending.spawn(
            self.ticket,
            &self.shell.streams,
            self.device_id.clone(),
            constraints,
        )?;
        log::debug!(
            "Primary open #{} issued for device {}",
            self.ticket,
            self.device_id
        );
        Ok(())
    }

    /// Integrate finished opens and queued input without waiting.
    pub fn pump(&mut self) {
        while let Some((ticket, outcome)) = self.pending.try_next() {
            self.on_opened(ticket, outcome);
        }
        while let Ok(event) = self.input_rx.try_recv() {
            self.handle_input(event);
        }
    }

    /// Wait for the primary open in flight, then pump.
    pub async fn ready(&mut self) -> Result<(), CameraError> {
        while self.phase == ViewerPhase::Opening {
            match self.pending.next().await {
                Some((ticket, outcome)) => self.on_opened(ticket, outcome),
                None => break,
            }
        }
        self.pump();

        match self.phase {
            ViewerPhase::Streaming => Ok(()),
            ViewerPhase::Opening => Err(CameraError::InvalidState(
                "primary stream is not open".to_string(),
            )),
            ViewerPhase::Exited => Err(CameraError::InvalidState("viewer has exited".to_string())),
        }
    }

    fn on_opened(&mut self, ticket: u64, outcome: Result<StreamHandle, CaptureError>) {
        if ticket != self.ticket || self.phase != ViewerPhase::Opening {
            if let Ok(mut handle) = outcome {
                log::info!(
                    "Discarding outdated primary stream {} for device {}",
                    handle.id(),
                    handle.device_id()
                );
                handle.stop();
            }
            return;
        }

        match outcome {
            Ok(handle) => {
                assert_invariant!(
                    self.primary.is_none(),
                    names::PRIMARY_RELEASED_BEFORE_REASSIGN,
                    "viewer::on_opened"
                );
                let surface = self.shell.surfaces.create_surface(SurfaceRole::Primary);
                self.primary = Some(Presentation::attach(handle, surface));
                self.phase = ViewerPhase::Streaming;
                log::info!("Primary stream attached for device {}", self.device_id);

                if self.shell.config.viewer.auto_fullscreen {
                    self.dispatch(ViewerEvent::EnterFullscreen);
                }
            }
            Err(e) => {
                self.shell.events.error(
                    Some(&self.device_id),
                    format!(
                        "Unable to access the camera at the requested resolution: {}",
                        e
                    ),
                );
                self.dispatch(ViewerEvent::PrimaryFailed);
            }
        }
    }

    /// Translate shell input into a viewer transition.
    pub fn handle_input(&mut self, event: InputEvent) {
        if self.is_exited() {
            log::debug!("Viewer {} exited, ignoring {:?}", self.instance, event);
            return;
        }
        let event = match event {
            InputEvent::KeyDown(Key::Escape) => ViewerEvent::EscapePressed,
            InputEvent::KeyDown(Key::Other(_)) => return,
            InputEvent::Click(ClickTarget::Surface) => ViewerEvent::SurfaceClicked,
            InputEvent::Click(ClickTarget::MenuItem(MenuItem::CameraSettings)) => {
                ViewerEvent::SettingsItemClicked
            }
            InputEvent::Click(ClickTarget::Outside) => ViewerEvent::OutsideClicked,
            InputEvent::ContextMenu { x, y } => ViewerEvent::ContextMenuRequested { x, y },
            InputEvent::FullscreenChanged(active) => ViewerEvent::FullscreenChanged(active),
        };
        self.dispatch(event);
    }

    /// Dismiss the settings overlay.
    pub fn close_settings(&mut self) {
        if !self.is_exited() {
            self.dispatch(ViewerEvent::SettingsClosed);
        }
    }

    /// Apply the overlay's current selection to the primary track. A failure
    /// is reported and leaves the overlay open.
    pub async fn apply_settings(&mut self) -> Result<(), CameraError> {
        let Some(panel) = self.settings.as_mut() else {
            return Err(CameraError::InvalidState(
                "settings overlay is not open".to_string(),
            ));
        };
        if let Err(e) = panel.apply().await {
            self.shell.events.warn(
                Some(&self.device_id),
                format!("Could not apply camera settings: {}", e),
            );
            return Err(e.into());
        }
        Ok(())
    }

    fn dispatch(&mut self, event: ViewerEvent) {
        let (next, effects) = self.state.reduce(event);
        self.state = next;
        for effect in effects {
            self.execute(effect);
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::RequestFullscreen => {
                if let Err(e) = self.shell.fullscreen.request_fullscreen() {
                    self.shell.events.warn(
                        Some(&self.device_id),
                        format!("Error attempting to enable full-screen mode: {}", e),
                    );
                    self.dispatch(ViewerEvent::FullscreenRefused);
                }
            }
            Effect::ExitFullscreen => {
                if self.shell.fullscreen.is_fullscreen() {
                    if let Err(e) = self.shell.fullscreen.exit_fullscreen() {
                        log::warn!("Failed to leave fullscreen: {}", e);
                    }
                }
            }
            Effect::OpenSettings => {
                let track = self.primary().and_then(StreamHandle::video_track);
                self.settings = Some(SettingsPanel::new(self.device_id.clone(), track));
            }
            Effect::ReleasePrimary => self.release_primary(),
            Effect::NotifyBack => {
                self.exit();
                self.shell.events.emit(ShellEvent::Back);
            }
            Effect::NotifySettingsClosed => {
                self.settings = None;
                self.shell.events.emit(ShellEvent::SettingsClosed);
            }
        }
    }

    /// Release the primary presentation and reap opens still in flight.
    fn release_primary(&mut self) {
        if let Some(mut presentation) = self.primary.take() {
            presentation.release();
            log::info!("Primary stream released for device {}", self.device_id);
        }
        if let Some(reaper) = self.pending.reap() {
            self.reaper = Some(reaper);
        }
    }

    fn exit(&mut self) {
        self.phase = ViewerPhase::Exited;
        self.settings = None;
        self.listeners.clear();
        assert_invariant!(
            self.shell.input.listeners_for(self.instance) == 0,
            names::LISTENERS_RELEASED,
            "viewer::exit"
        );
    }

    /// Switch to another device. The current primary is released before the
    /// new open is issued. Switching to the device already shown does nothing.
    pub fn change_device(&mut self, device_id: impl Into<String>) -> Result<(), CameraError> {
        if self.is_exited() {
            return Err(CameraError::InvalidState("viewer has exited".to_string()));
        }
        let device_id = device_id.into();
        if device_id == self.device_id && self.phase == ViewerPhase::Streaming {
            log::debug!("Device {} already shown, keeping its stream", device_id);
            return Ok(());
        }

        if self.state.settings_open {
            self.dispatch(ViewerEvent::SettingsClosed);
        }
        self.release_primary();
        assert_invariant!(
            self.primary.is_none(),
            names::PRIMARY_RELEASED_BEFORE_REASSIGN,
            "viewer::change_device"
        );

        log::info!("Viewer switching from {} to {}", self.device_id, device_id);
        self.device_id = device_id;
        self.open_primary()
    }

    /// Stop the primary stream and remove listeners. Idempotent.
    pub fn unmount(&mut self) -> Option<JoinHandle<usize>> {
        self.release_primary();
        if !self.is_exited() {
            self.exit();
            log::info!("Viewer {} unmounted", self.instance);
        }
        self.reaper.take()
    }
}

impl Drop for WebcamViewer {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl std::fmt::Debug for WebcamViewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebcamViewer")
            .field("instance", &self.instance)
            .field("device_id", &self.device_id)
            .field("state", &self.state)
            .field("phase", &self.phase)
            .field("primary", &self.primary)
            .finish()
    }
}

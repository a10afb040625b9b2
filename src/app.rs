//! Top-level routing between the chooser and the viewer.
//!
//! While no device is selected the chooser is mounted. A selection swaps it
//! for a viewer on that device, and leaving the viewer mounts a fresh chooser.

use crate::chooser::DeviceChooser;
use crate::config::ViewerConfig;
use crate::errors::CameraError;
use crate::events::{EventSink, ShellEvent};
use crate::headless::{HeadlessFullscreen, HeadlessSurfaceFactory};
use crate::input::InputBus;
use crate::provider::{CaptureProvider, FullscreenProvider, SurfaceFactory};
use crate::stream::StreamManager;
use crate::viewer::WebcamViewer;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Collaborators shared by the chooser and the viewer
#[derive(Clone)]
pub struct Shell {
    pub streams: StreamManager,
    pub surfaces: Arc<dyn SurfaceFactory>,
    pub fullscreen: Arc<dyn FullscreenProvider>,
    pub input: InputBus,
    pub events: EventSink,
    pub config: Arc<ViewerConfig>,
}

impl Shell {
    pub fn builder(provider: Arc<dyn CaptureProvider>) -> ShellBuilder {
        ShellBuilder {
            provider,
            surfaces: None,
            fullscreen: None,
            input: None,
            config: None,
        }
    }
}

impl std::fmt::Debug for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shell")
            .field("provider", &self.streams.provider_name())
            .field("input", &self.input)
            .field("config", &self.config)
            .finish()
    }
}

/// Builds a [`Shell`]; anything not supplied falls back to headless parts.
pub struct ShellBuilder {
    provider: Arc<dyn CaptureProvider>,
    surfaces: Option<Arc<dyn SurfaceFactory>>,
    fullscreen: Option<Arc<dyn FullscreenProvider>>,
    input: Option<InputBus>,
    config: Option<ViewerConfig>,
}

impl ShellBuilder {
    pub fn surfaces(mut self, surfaces: Arc<dyn SurfaceFactory>) -> Self {
        self.surfaces = Some(surfaces);
        self
    }

    pub fn fullscreen(mut self, fullscreen: Arc<dyn FullscreenProvider>) -> Self {
        self.fullscreen = Some(fullscreen);
        self
    }

    pub fn input(mut self, input: InputBus) -> Self {
        self.input = Some(input);
        self
    }

    pub fn config(mut self, config: ViewerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// The shell plus the receiver for everything the core emits.
    pub fn build(self) -> (Shell, mpsc::UnboundedReceiver<ShellEvent>) {
        let (events, rx) = EventSink::channel();
        let shell = Shell {
            streams: StreamManager::new(self.provider),
            surfaces: self
                .surfaces
                .unwrap_or_else(|| Arc::new(HeadlessSurfaceFactory::new())),
            fullscreen: self
                .fullscreen
                .unwrap_or_else(|| Arc::new(HeadlessFullscreen::new())),
            input: self.input.unwrap_or_default(),
            events,
            config: Arc::new(self.config.unwrap_or_default()),
        };
        (shell, rx)
    }
}

/// Which component is mounted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteKind {
    Idle,
    Chooser,
    Viewer(String),
}

enum Route {
    Idle,
    Chooser(DeviceChooser),
    Viewer(WebcamViewer),
}

/// Mounts the chooser or the viewer and switches between them on
/// `Selected` and `Back`. Every event is forwarded to the outer shell.
pub struct CameraApp {
    shell: Shell,
    outer: EventSink,
    rx: mpsc::UnboundedReceiver<ShellEvent>,
    route: Route,
    reapers: Vec<JoinHandle<usize>>,
}

impl CameraApp {
    /// Wrap `shell`; its event sink becomes the outer sink events are
    /// forwarded to after routing.
    pub fn new(shell: Shell) -> Self {
        let (events, rx) = EventSink::channel();
        let outer = shell.events.clone();
        let shell = Shell { events, ..shell };
        Self {
            shell,
            outer,
            rx,
            route: Route::Idle,
            reapers: Vec::new(),
        }
    }

    pub fn route(&self) -> RouteKind {
        match &self.route {
            Route::Idle => RouteKind::Idle,
            Route::Chooser(_) => RouteKind::Chooser,
            Route::Viewer(viewer) => RouteKind::Viewer(viewer.device_id().to_string()),
        }
    }

    pub fn chooser(&self) -> Option<&DeviceChooser> {
        match &self.route {
            Route::Chooser(chooser) => Some(chooser),
            _ => None,
        }
    }

    pub fn chooser_mut(&mut self) -> Option<&mut DeviceChooser> {
        match &mut self.route {
            Route::Chooser(chooser) => Some(chooser),
            _ => None,
        }
    }

    pub fn viewer(&self) -> Option<&WebcamViewer> {
        match &self.route {
            Route::Viewer(viewer) => Some(viewer),
            _ => None,
        }
    }

    pub fn viewer_mut(&mut self) -> Option<&mut WebcamViewer> {
        match &mut self.route {
            Route::Viewer(viewer) => Some(viewer),
            _ => None,
        }
    }

    /// Mount the chooser and discover devices.
    pub async fn start(&mut self) {
        self.leave_current();
        log::info!("Starting camera chooser");
        let chooser = DeviceChooser::mount(self.shell.clone()).await;
        self.route = Route::Chooser(chooser);
    }

    /// Integrate finished opens and input on the mounted component, then
    /// route whatever it emitted.
    pub async fn step(&mut self) -> Result<(), CameraError> {
        match &mut self.route {
            Route::Chooser(chooser) => {
                chooser.poll();
            }
            Route::Viewer(viewer) => viewer.pump(),
            Route::Idle => {}
        }
        self.route_events().await
    }

    /// Route queued events until none are left.
    pub async fn route_events(&mut self) -> Result<(), CameraError> {
        while let Ok(event) = self.rx.try_recv() {
            self.outer.emit(event.clone());
            match event {
                ShellEvent::Selected(device_id) => {
                    self.leave_current();
                    log::info!("Device {} selected, mounting viewer", device_id);
                    match WebcamViewer::mount(device_id, self.shell.clone()) {
                        Ok(viewer) => self.route = Route::Viewer(viewer),
                        Err(e) => {
                            log::error!("Failed to mount viewer: {}", e);
                            self.start().await;
                            return Err(e);
                        }
                    }
                }
                ShellEvent::Back => {
                    log::info!("Viewer exited, returning to chooser");
                    self.start().await;
                }
                ShellEvent::SettingsClosed | ShellEvent::Notice(_) => {}
            }
        }
        Ok(())
    }

    fn leave_current(&mut self) {
        let reaper = match std::mem::replace(&mut self.route, Route::Idle) {
            Route::Idle => None,
            Route::Chooser(mut chooser) => chooser.teardown(),
            Route::Viewer(mut viewer) => viewer.unmount(),
        };
        self.reapers.retain(|r| !r.is_finished());
        self.reapers.extend(reaper);
    }

    /// Tear down whatever is mounted. Returns reapers for opens still in
    /// flight so callers can wait for their streams to be stopped.
    pub fn shutdown(&mut self) -> Vec<JoinHandle<usize>> {
        self.leave_current();
        std::mem::take(&mut self.reapers)
    }
}

impl Drop for CameraApp {
    fn drop(&mut self) {
        self.leave_current();
    }
}

//! Shared fixtures for camview integration tests
#![allow(dead_code)]

use camview::app::Shell;
use camview::events::{drain, ShellEvent};
use camview::testing::{FakeDevice, FakeFullscreen, FakeProvider, FakeSurfaceFactory};
use camview::ViewerConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

pub struct Rig {
    pub provider: Arc<FakeProvider>,
    pub surfaces: Arc<FakeSurfaceFactory>,
    pub fullscreen: Arc<FakeFullscreen>,
    pub shell: Shell,
    pub events: UnboundedReceiver<ShellEvent>,
}

impl Rig {
    pub fn new(devices: Vec<FakeDevice>) -> Self {
        Self::with_config(devices, ViewerConfig::default())
    }

    pub fn with_config(devices: Vec<FakeDevice>, config: ViewerConfig) -> Self {
        let provider = Arc::new(FakeProvider::new(devices));
        let surfaces = Arc::new(FakeSurfaceFactory::new());
        let fullscreen = Arc::new(FakeFullscreen::new());
        let (shell, events) = Shell::builder(provider.clone())
            .surfaces(surfaces.clone())
            .fullscreen(fullscreen.clone())
            .config(config)
            .build();
        Self {
            provider,
            surfaces,
            fullscreen,
            shell,
            events,
        }
    }

    pub fn drain(&mut self) -> Vec<ShellEvent> {
        drain(&mut self.events)
    }
}

pub fn backs(events: &[ShellEvent]) -> usize {
    events.iter().filter(|e| **e == ShellEvent::Back).count()
}

pub fn selections(events: &[ShellEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ShellEvent::Selected(id) => Some(id.clone()),
            _ => None,
        })
        .collect()
}

pub fn notices(events: &[ShellEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, ShellEvent::Notice(_)))
        .count()
}

/// Poll `check` until it holds or about a second has passed.
pub async fn eventually<F: FnMut() -> bool>(mut check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

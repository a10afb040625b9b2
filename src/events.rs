//! Events flowing from the core to the window shell.
//!
//! Components never call into each other; selection, back, overlay close and
//! user notices all travel as [`ShellEvent`]s over an unbounded channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// User-visible notification for a caught failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub device_id: Option<String>,
    pub at: DateTime<Utc>,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            device_id: None,
            at: Utc::now(),
        }
    }

    pub fn for_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }
}

/// Intent or notification for the window shell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShellEvent {
    /// A device was picked in the chooser.
    Selected(String),
    /// The viewer was exited.
    Back,
    /// The settings overlay was dismissed.
    SettingsClosed,
    Notice(Notice),
}

/// Hot-plug change found while re-enumerating
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceEvent {
    Connected(String),
    Disconnected(String),
}

impl DeviceEvent {
    pub fn device_id(&self) -> &str {
        match self {
            DeviceEvent::Connected(id) | DeviceEvent::Disconnected(id) => id,
        }
    }
}

/// Sending half handed to components. A closed shell is not an error for
/// the core: the event is dropped and logged.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ShellEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<ShellEvent>) -> Self {
        Self { tx }
    }

    /// New sink plus the receiver the shell reads from.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ShellEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, event: ShellEvent) {
        if let Err(e) = self.tx.send(event) {
            log::debug!("Shell is gone, dropping event {:?}", e.0);
        }
    }

    pub fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => log::info!("{}", notice.message),
            NoticeLevel::Warning => log::warn!("{}", notice.message),
            NoticeLevel::Error => log::error!("{}", notice.message),
        }
        self.emit(ShellEvent::Notice(notice));
    }

    pub fn warn(&self, device_id: Option<&str>, message: impl Into<String>) {
        self.notify(with_device(Notice::new(NoticeLevel::Warning, message), device_id));
    }

    pub fn error(&self, device_id: Option<&str>, message: impl Into<String>) {
        self.notify(with_device(Notice::new(NoticeLevel::Error, message), device_id));
    }
}

fn with_device(notice: Notice, device_id: Option<&str>) -> Notice {
    match device_id {
        Some(id) => notice.for_device(id),
        None => notice,
    }
}

/// Drain everything currently queued on `rx` without waiting.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<ShellEvent>) -> Vec<ShellEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

//! Shell input routed to scoped listeners.
//!
//! The window shell feeds raw input into an [`InputBus`]. Components acquire
//! listeners per instance and scope; each acquisition returns a
//! [`ListenerGuard`] that removes exactly that listener when dropped, so one
//! instance tearing down never touches another instance's listeners.

use crate::errors::CameraError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// Where a listener is installed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListenerScope {
    /// Keyboard and fullscreen changes
    Window,
    /// Clicks anywhere outside the display surface
    Document,
    /// Clicks and context-menu requests on the display surface
    Surface,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Escape,
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MenuItem {
    CameraSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClickTarget {
    Surface,
    MenuItem(MenuItem),
    Outside,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    KeyDown(Key),
    Click(ClickTarget),
    ContextMenu { x: i32, y: i32 },
    FullscreenChanged(bool),
}

impl InputEvent {
    /// The single scope an event is delivered to.
    pub fn scope(&self) -> ListenerScope {
        match self {
            InputEvent::KeyDown(_) | InputEvent::FullscreenChanged(_) => ListenerScope::Window,
            InputEvent::Click(ClickTarget::Surface) | InputEvent::ContextMenu { .. } => {
                ListenerScope::Surface
            }
            InputEvent::Click(_) => ListenerScope::Document,
        }
    }
}

/// Identifies one mounted component instance on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Listener {
    instance: InstanceId,
    scope: ListenerScope,
    tx: mpsc::UnboundedSender<InputEvent>,
}

#[derive(Default)]
struct BusInner {
    next_instance: u64,
    listeners: Vec<Listener>,
}

#[derive(Clone, Default)]
pub struct InputBus {
    inner: Arc<Mutex<BusInner>>,
}

impl InputBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fresh id for a component about to acquire listeners.
    pub fn instance_id(&self) -> InstanceId {
        let mut inner = self.lock();
        inner.next_instance += 1;
        InstanceId(inner.next_instance)
    }

    /// Install a listener for `instance` on `scope`.
    pub fn listen(
        &self,
        instance: InstanceId,
        scope: ListenerScope,
        tx: mpsc::UnboundedSender<InputEvent>,
    ) -> Result<ListenerGuard, CameraError> {
        let mut inner = self.lock();
        if inner
            .listeners
            .iter()
            .any(|l| l.instance == instance && l.scope == scope)
        {
            return Err(CameraError::InvalidState(format!(
                "instance {} already listens on {:?}",
                instance, scope
            )));
        }
        inner.listeners.push(Listener {
            instance,
            scope,
            tx,
        });
        log::debug!("Listener {:?} installed for {}", scope, instance);

        Ok(ListenerGuard {
            bus: self.clone(),
            instance,
            scope,
        })
    }

    /// Deliver `event` to every listener on its scope. Returns how many
    /// listeners received it.
    pub fn dispatch(&self, event: InputEvent) -> usize {
        let scope = event.scope();
        let mut inner = self.lock();
        let mut delivered = 0;
        inner.listeners.retain(|l| {
            if l.scope != scope {
                return true;
            }
            match l.tx.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    log::warn!("Dropping closed {:?} listener of {}", l.scope, l.instance);
                    false
                }
            }
        });
        delivered
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    pub fn listeners_for(&self, instance: InstanceId) -> usize {
        self.lock()
            .listeners
            .iter()
            .filter(|l| l.instance == instance)
            .count()
    }

    fn remove(&self, instance: InstanceId, scope: ListenerScope) {
        let mut inner = self.lock();
        inner
            .listeners
            .retain(|l| !(l.instance == instance && l.scope == scope));
        log::debug!("Listener {:?} removed for {}", scope, instance);
    }
}

impl fmt::Debug for InputBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Removes its listener from the bus when dropped
#[derive(Debug)]
pub struct ListenerGuard {
    bus: InputBus,
    instance: InstanceId,
    scope: ListenerScope,
}

impl ListenerGuard {
    pub fn scope(&self) -> ListenerScope {
        self.scope
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.bus.remove(self.instance, self.scope);
    }
}

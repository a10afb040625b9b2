//! Headless display parts for running without a window shell.
//!
//! Surfaces only remember which stream they show and fullscreen is a flag.
//! Useful for command-line drivers and as the default when a shell supplies
//! nothing better.

use crate::errors::CameraError;
use crate::provider::{DisplaySurface, FullscreenProvider, SurfaceFactory, SurfaceRole};
use crate::stream::StreamHandle;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct HeadlessSurface {
    role: SurfaceRole,
    stream_id: Option<String>,
}

impl HeadlessSurface {
    pub fn new(role: SurfaceRole) -> Self {
        Self {
            role,
            stream_id: None,
        }
    }

    pub fn role(&self) -> &SurfaceRole {
        &self.role
    }
}

impl DisplaySurface for HeadlessSurface {
    fn attach(&mut self, stream: &StreamHandle) {
        log::debug!("{:?} showing stream {}", self.role, stream.id());
        self.stream_id = Some(stream.id().to_string());
    }

    fn detach(&mut self) {
        if let Some(id) = self.stream_id.take() {
            log::debug!("{:?} no longer showing stream {}", self.role, id);
        }
    }

    fn attached_stream(&self) -> Option<&str> {
        self.stream_id.as_deref()
    }
}

#[derive(Debug, Default)]
pub struct HeadlessSurfaceFactory;

impl HeadlessSurfaceFactory {
    pub fn new() -> Self {
        Self
    }
}

impl SurfaceFactory for HeadlessSurfaceFactory {
    fn create_surface(&self, role: SurfaceRole) -> Box<dyn DisplaySurface> {
        Box::new(HeadlessSurface::new(role))
    }
}

/// Fullscreen as a plain flag; requests always succeed
#[derive(Debug, Default)]
pub struct HeadlessFullscreen {
    active: AtomicBool,
}

impl HeadlessFullscreen {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FullscreenProvider for HeadlessFullscreen {
    fn is_fullscreen(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn request_fullscreen(&self) -> Result<(), CameraError> {
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn exit_fullscreen(&self) -> Result<(), CameraError> {
        self.active.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fullscreen_flag() {
        let fullscreen = HeadlessFullscreen::new();
        assert!(!fullscreen.is_fullscreen());
        fullscreen.request_fullscreen().unwrap();
        assert!(fullscreen.is_fullscreen());
        fullscreen.exit_fullscreen().unwrap();
        assert!(!fullscreen.is_fullscreen());
    }

    #[test]
    fn test_new_surface_is_empty() {
        let surface = HeadlessSurfaceFactory::new().create_surface(SurfaceRole::Primary);
        assert!(surface.attached_stream().is_none());
    }
}

//! Testing utilities for camview
//!
//! Scripted capture devices, surfaces and fullscreen presentation that let
//! the chooser and viewer run without camera hardware.

pub mod fake;

pub use fake::{
    ApplyBehavior, FakeDevice, FakeFullscreen, FakeProvider, FakeSurface, FakeSurfaceFactory,
    FakeTrack, SurfaceLog,
};

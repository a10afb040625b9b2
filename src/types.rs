//! Core data types shared by the chooser, the viewer and capture providers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform the crate is running on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    Windows,
    MacOS,
    Linux,
    Unknown,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOS
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::MacOS => "macos",
            Platform::Linux => "linux",
            Platform::Unknown => "unknown",
        }
    }
}

/// Kind of media device reported by enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    VideoInput,
    AudioInput,
    AudioOutput,
}

/// Raw enumeration record as handed out by a capture provider.
///
/// `label` may be empty when the platform withholds names before camera
/// permission has been granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDeviceInfo {
    pub device_id: String,
    pub kind: DeviceKind,
    pub label: String,
    pub group_id: Option<String>,
}

impl MediaDeviceInfo {
    pub fn video(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            kind: DeviceKind::VideoInput,
            label: label.into(),
            group_id: None,
        }
    }
}

/// A selectable capture device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub device_id: String,
    pub label: String,
}

impl DeviceDescriptor {
    /// Build a descriptor, synthesizing `"Camera <id>"` for an empty label.
    pub fn new(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        let device_id = device_id.into();
        let label = label.into();
        let label = if label.trim().is_empty() {
            format!("Camera {}", device_id)
        } else {
            label
        };
        Self { device_id, label }
    }

    /// Convert an enumeration record, skipping anything that is not a video input.
    pub fn from_media_device(info: &MediaDeviceInfo) -> Option<Self> {
        match info.kind {
            DeviceKind::VideoInput => Some(Self::new(info.device_id.clone(), info.label.clone())),
            DeviceKind::AudioInput | DeviceKind::AudioOutput => None,
        }
    }
}

/// Whether a device id must be honoured or may be substituted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceConstraint {
    Exact(String),
    Ideal(String),
}

impl DeviceConstraint {
    pub fn device_id(&self) -> &str {
        match self {
            DeviceConstraint::Exact(id) | DeviceConstraint::Ideal(id) => id,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, DeviceConstraint::Exact(_))
    }
}

/// Ideal value with an optional hard ceiling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstrainValue {
    pub ideal: u32,
    pub max: Option<u32>,
}

impl ConstrainValue {
    pub fn ideal(value: u32) -> Self {
        Self {
            ideal: value,
            max: None,
        }
    }

    pub fn ideal_max(value: u32, max: u32) -> Self {
        Self {
            ideal: value,
            max: Some(max),
        }
    }
}

/// Constraints for opening a stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConstraints {
    pub device_id: DeviceConstraint,
    pub width: Option<ConstrainValue>,
    pub height: Option<ConstrainValue>,
    pub frame_rate: Option<ConstrainValue>,
}

impl StreamConstraints {
    /// Only pin the device; let the provider choose the format.
    pub fn exact_device(device_id: impl Into<String>) -> Self {
        Self {
            device_id: DeviceConstraint::Exact(device_id.into()),
            width: None,
            height: None,
            frame_rate: None,
        }
    }

    pub fn with_track(mut self, track: TrackConstraints) -> Self {
        self.width = track.width;
        self.height = track.height;
        self.frame_rate = track.frame_rate;
        self
    }

    pub fn track_constraints(&self) -> TrackConstraints {
        TrackConstraints {
            width: self.width,
            height: self.height,
            frame_rate: self.frame_rate,
        }
    }
}

/// Partial constraints applied to a live track
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackConstraints {
    pub width: Option<ConstrainValue>,
    pub height: Option<ConstrainValue>,
    pub frame_rate: Option<ConstrainValue>,
}

impl TrackConstraints {
    pub fn ideal(width: u32, height: u32, frame_rate: u32) -> Self {
        Self {
            width: Some(ConstrainValue::ideal(width)),
            height: Some(ConstrainValue::ideal(height)),
            frame_rate: Some(ConstrainValue::ideal(frame_rate)),
        }
    }
}

/// Min/max range of a constrainable property. Either side may be unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilityRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl CapabilityRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Missing or non-positive bounds do not constrain.
    pub fn contains(&self, value: f64) -> bool {
        let above_min = match self.min {
            Some(min) if min > 0.0 => value >= min,
            _ => true,
        };
        let below_max = match self.max {
            Some(max) if max > 0.0 => value <= max,
            _ => true,
        };
        above_min && below_max
    }
}

/// Capability bounds reported by a track
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackCapabilities {
    pub width: Option<CapabilityRange>,
    pub height: Option<CapabilityRange>,
    pub frame_rate: Option<CapabilityRange>,
}

/// Values a track is currently producing
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackSettings {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackKind {
    Video,
    Audio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackState {
    Live,
    Ended,
}

/// A selectable capture resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolutionOption {
    pub width: u32,
    pub height: u32,
    pub label: String,
}

impl ResolutionOption {
    pub fn new(width: u32, height: u32, label: impl Into<String>) -> Self {
        Self {
            width,
            height,
            label: label.into(),
        }
    }

    /// Option for a resolution outside the preference list.
    pub fn custom(width: u32, height: u32) -> Self {
        Self::new(width, height, format!("{}x{}", width, height))
    }

    pub fn key(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }
}

impl fmt::Display for ResolutionOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// A selectable frame rate in frames per second
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameRateOption(pub u32);

impl FrameRateOption {
    pub fn fps(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for FrameRateOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} FPS", self.0)
    }
}

//! Configuration management for camview
//!
//! Capture constraints for previews and the primary stream, viewer behaviour
//! and the default log filter. Values apply to one session; the crate never
//! writes a configuration file on its own.

use crate::errors::CameraError;
use crate::types::{ConstrainValue, TrackConstraints};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub preview: CaptureConfig,
    pub primary: CaptureConfig,
    pub viewer: ViewerOptions,
    pub logging: LoggingConfig,
}

/// Ideal capture format, optionally capped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Ideal resolution [width, height]
    pub resolution: [u32; 2],
    /// Ideal frames per second
    pub fps: u32,
    /// Hard ceiling for the resolution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_resolution: Option<[u32; 2]>,
    /// Hard ceiling for the frame rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fps: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerOptions {
    /// Request fullscreen as soon as the primary stream is shown
    pub auto_fullscreen: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// env_logger filter used when RUST_LOG is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "camview=info".to_string(),
        }
    }
}

impl CaptureConfig {
    pub fn track_constraints(&self) -> TrackConstraints {
        let [width, height] = self.resolution;
        let (max_width, max_height) = match self.max_resolution {
            Some([w, h]) => (Some(w), Some(h)),
            None => (None, None),
        };
        TrackConstraints {
            width: Some(constrain(width, max_width)),
            height: Some(constrain(height, max_height)),
            frame_rate: Some(constrain(self.fps, self.max_fps)),
        }
    }
}

fn constrain(ideal: u32, max: Option<u32>) -> ConstrainValue {
    match max {
        Some(max) => ConstrainValue::ideal_max(ideal, max),
        None => ConstrainValue::ideal(ideal),
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            preview: CaptureConfig {
                resolution: [1280, 720],
                fps: 30,
                max_resolution: None,
                max_fps: None,
            },
            primary: CaptureConfig {
                resolution: [3840, 2160],
                fps: 60,
                max_resolution: Some([3840, 2160]),
                max_fps: Some(60),
            },
            viewer: ViewerOptions::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ViewerConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| CameraError::Config(format!("Failed to read config file: {}", e)))?;

        let config: ViewerConfig = toml::from_str(&contents)
            .map_err(|e| CameraError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate().map_err(CameraError::Config)?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CameraError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| CameraError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| CameraError::Config(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("camview.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        validate_capture("preview", &self.preview)?;
        validate_capture("primary", &self.primary)?;

        if self.logging.filter.trim().is_empty() {
            return Err("Log filter must not be empty".to_string());
        }

        Ok(())
    }
}

fn validate_capture(section: &str, capture: &CaptureConfig) -> Result<(), String> {
    let [width, height] = capture.resolution;
    if width == 0 || height == 0 {
        return Err(format!("Invalid {} resolution", section));
    }
    if capture.fps == 0 || capture.fps > 240 {
        return Err(format!("Invalid {} FPS (must be 1-240)", section));
    }
    if let Some([max_w, max_h]) = capture.max_resolution {
        if max_w < width || max_h < height {
            return Err(format!(
                "{} max resolution is below the ideal resolution",
                section
            ));
        }
    }
    if let Some(max_fps) = capture.max_fps {
        if max_fps < capture.fps {
            return Err(format!("{} max FPS is below the ideal FPS", section));
        }
    }
    Ok(())
}

//! Capability negotiation for a live video track.
//!
//! Offers the preset resolutions and frame rates a device can deliver and
//! renegotiates the track in place when the user picks one.

use crate::errors::ApplyError;
use crate::provider::MediaTrack;
use crate::types::{
    CapabilityRange, FrameRateOption, ResolutionOption, TrackCapabilities, TrackConstraints,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Preset resolutions, largest first: (width, height, label)
pub const RESOLUTION_PREFERENCES: [(u32, u32, &str); 4] = [
    (3840, 2160, "4K (3840x2160)"),
    (1920, 1080, "Full HD (1920x1080)"),
    (1280, 720, "HD (1280x720)"),
    (640, 480, "SD (640x480)"),
];

/// Preset frame rates, fastest first
pub const FRAME_RATE_PREFERENCES: [u32; 4] = [60, 30, 24, 15];

const DEVICE_ID_DISPLAY_LEN: usize = 15;

pub fn all_resolutions() -> Vec<ResolutionOption> {
    RESOLUTION_PREFERENCES
        .iter()
        .map(|&(w, h, label)| ResolutionOption::new(w, h, label))
        .collect()
}

pub fn all_frame_rates() -> Vec<FrameRateOption> {
    FRAME_RATE_PREFERENCES
        .iter()
        .copied()
        .map(FrameRateOption)
        .collect()
}

fn within(range: Option<&CapabilityRange>, value: f64) -> bool {
    range.map_or(true, |r| r.contains(value))
}

/// Presets inside the width and height bounds. Each bound is checked on its
/// own, so an axis the device does not report never filters anything out.
pub fn filter_resolutions(capabilities: Option<&TrackCapabilities>) -> Vec<ResolutionOption> {
    let Some(caps) = capabilities else {
        return all_resolutions();
    };
    all_resolutions()
        .into_iter()
        .filter(|res| {
            within(caps.width.as_ref(), res.width as f64)
                && within(caps.height.as_ref(), res.height as f64)
        })
        .collect()
}

pub fn filter_frame_rates(capabilities: Option<&TrackCapabilities>) -> Vec<FrameRateOption> {
    let Some(caps) = capabilities else {
        return all_frame_rates();
    };
    all_frame_rates()
        .into_iter()
        .filter(|rate| within(caps.frame_rate.as_ref(), rate.fps() as f64))
        .collect()
}

/// What the settings overlay can offer for one track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureOptions {
    pub resolutions: Vec<ResolutionOption>,
    pub frame_rates: Vec<FrameRateOption>,
    pub active_resolution: Option<ResolutionOption>,
    pub active_frame_rate: Option<FrameRateOption>,
}

/// Valid options for `track` plus the values it is producing right now.
pub fn options_for(track: &dyn MediaTrack) -> CaptureOptions {
    let capabilities = track.capabilities();
    if capabilities.is_none() {
        log::debug!(
            "Track {} does not expose capabilities, offering every preset",
            track.id()
        );
    }
    let resolutions = filter_resolutions(capabilities.as_ref());
    let frame_rates = filter_frame_rates(capabilities.as_ref());

    let settings = track.settings();
    let active_resolution = match (settings.width, settings.height) {
        (Some(w), Some(h)) => Some(
            resolutions
                .iter()
                .find(|res| res.matches(w, h))
                .cloned()
                .unwrap_or_else(|| ResolutionOption::custom(w, h)),
        ),
        _ => None,
    };
    let active_frame_rate = settings
        .frame_rate
        .filter(|fps| fps.is_finite() && *fps > 0.0)
        .map(|fps| FrameRateOption(fps.round() as u32));

    CaptureOptions {
        resolutions,
        frame_rates,
        active_resolution,
        active_frame_rate,
    }
}

/// Renegotiate `track` with ideal constraints; the device picks the closest
/// mode it supports. On error the previous settings stay in effect.
pub async fn apply(
    track: &dyn MediaTrack,
    resolution: &ResolutionOption,
    frame_rate: FrameRateOption,
) -> Result<(), ApplyError> {
    let constraints = TrackConstraints::ideal(resolution.width, resolution.height, frame_rate.fps());
    track.apply_constraints(&constraints).await.map_err(|e| {
        log::warn!(
            "Applying {} @ {} to track {} failed: {}",
            resolution.key(),
            frame_rate,
            track.id(),
            e
        );
        e
    })?;

    log::info!(
        "Applied {} @ {} to track {}",
        resolution.key(),
        frame_rate,
        track.id()
    );
    Ok(())
}

/// Model behind the camera settings overlay
#[derive(Debug)]
pub struct SettingsPanel {
    device_id: String,
    track: Option<Arc<dyn MediaTrack>>,
    options: CaptureOptions,
    selected_resolution: Option<ResolutionOption>,
    selected_frame_rate: Option<FrameRateOption>,
    last_error: Option<ApplyError>,
}

impl SettingsPanel {
    /// Panel for `device_id`. Without a track the option lists stay empty.
    pub fn new(device_id: impl Into<String>, track: Option<Arc<dyn MediaTrack>>) -> Self {
        let options = match &track {
            Some(track) => options_for(track.as_ref()),
            None => CaptureOptions {
                resolutions: Vec::new(),
                frame_rates: Vec::new(),
                active_resolution: None,
                active_frame_rate: None,
            },
        };
        let selected_resolution = options
            .active_resolution
            .clone()
            .or_else(|| options.resolutions.first().cloned());
        let selected_frame_rate = options
            .active_frame_rate
            .or_else(|| options.frame_rates.first().copied());

        Self {
            device_id: device_id.into(),
            track,
            options,
            selected_resolution,
            selected_frame_rate,
            last_error: None,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// First 15 characters of the device id followed by `...`
    pub fn display_device_id(&self) -> String {
        let head: String = self.device_id.chars().take(DEVICE_ID_DISPLAY_LEN).collect();
        format!("{}...", head)
    }

    pub fn options(&self) -> &CaptureOptions {
        &self.options
    }

    pub fn selected_resolution(&self) -> Option<&ResolutionOption> {
        self.selected_resolution.as_ref()
    }

    pub fn selected_frame_rate(&self) -> Option<FrameRateOption> {
        self.selected_frame_rate
    }

    pub fn last_error(&self) -> Option<&ApplyError> {
        self.last_error.as_ref()
    }

    /// Select a resolution by its `WxH` key. Unknown keys are ignored.
    pub fn select_resolution(&mut self, key: &str) -> bool {
        match self.options.resolutions.iter().find(|r| r.key() == key) {
            Some(res) => {
                self.selected_resolution = Some(res.clone());
                true
            }
            None => false,
        }
    }

    pub fn select_frame_rate(&mut self, fps: u32) -> bool {
        match self.options.frame_rates.iter().find(|r| r.fps() == fps) {
            Some(rate) => {
                self.selected_frame_rate = Some(*rate);
                true
            }
            None => false,
        }
    }

    /// Apply the current selection. Fails with `Unsupported` without a track
    /// or a full selection. Success refreshes the active values from the track.
    pub async fn apply(&mut self) -> Result<(), ApplyError> {
        let Some(track) = self.track.clone() else {
            return Err(ApplyError::Unsupported(format!(
                "no live track for {}",
                self.display_device_id()
            )));
        };
        let (Some(resolution), Some(frame_rate)) =
            (self.selected_resolution.clone(), self.selected_frame_rate)
        else {
            return Err(ApplyError::Unsupported(
                "select a resolution and frame rate first".to_string(),
            ));
        };

        match apply(track.as_ref(), &resolution, frame_rate).await {
            Ok(()) => {
                self.last_error = None;
                let refreshed = options_for(track.as_ref());
                self.options.active_resolution = refreshed.active_resolution;
                self.options.active_frame_rate = refreshed.active_frame_rate;
                Ok(())
            }
            Err(e) => {
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::CaptureProvider;
    use crate::testing::{ApplyBehavior, FakeDevice, FakeProvider};
    use crate::types::StreamConstraints;
    use proptest::prelude::*;

    async fn open_track(device: FakeDevice) -> Arc<dyn MediaTrack> {
        let id = device.info.device_id.clone();
        let provider = FakeProvider::new(vec![device]);
        let mut stream = provider
            .request_stream(&StreamConstraints::exact_device(id))
            .await
            .unwrap();
        stream.tracks.remove(0)
    }

    #[test]
    fn test_width_only_bounds() {
        let caps = TrackCapabilities {
            width: Some(CapabilityRange::new(640.0, 1920.0)),
            height: None,
            frame_rate: None,
        };
        let keys: Vec<String> = filter_resolutions(Some(&caps))
            .iter()
            .map(ResolutionOption::key)
            .collect();
        assert_eq!(keys, vec!["1920x1080", "1280x720", "640x480"]);
        assert_eq!(filter_frame_rates(Some(&caps)), all_frame_rates());
    }

    #[test]
    fn test_no_introspection_offers_everything() {
        assert_eq!(filter_resolutions(None).len(), 4);
        assert_eq!(filter_frame_rates(None).len(), 4);
    }

    #[test]
    fn test_frame_rate_bounds() {
        let caps = TrackCapabilities {
            width: None,
            height: None,
            frame_rate: Some(CapabilityRange::new(5.0, 30.0)),
        };
        assert_eq!(
            filter_frame_rates(Some(&caps)),
            vec![FrameRateOption(30), FrameRateOption(24), FrameRateOption(15)]
        );
    }

    #[tokio::test]
    async fn test_active_values_come_from_settings() {
        let track = open_track(FakeDevice::uhd_webcam("cam1", "Front").with_settings(
            1280, 720, 29.97,
        ))
        .await;
        let options = options_for(track.as_ref());
        assert_eq!(options.active_resolution.unwrap().key(), "1280x720");
        assert_eq!(options.active_frame_rate, Some(FrameRateOption(30)));
    }

    #[tokio::test]
    async fn test_panel_defaults_to_first_option_without_settings() {
        let track = open_track(FakeDevice::hd_webcam("cam1", "Front").without_settings()).await;
        let panel = SettingsPanel::new("cam1", Some(track));
        assert_eq!(panel.selected_resolution().unwrap().key(), "1280x720");
        assert_eq!(panel.selected_frame_rate(), Some(FrameRateOption(30)));
    }

    #[tokio::test]
    async fn test_panel_apply_updates_active_values() {
        let track = open_track(FakeDevice::uhd_webcam("cam1", "Front")).await;
        let mut panel = SettingsPanel::new("cam1", Some(track.clone()));
        assert!(panel.select_resolution("3840x2160"));
        assert!(panel.select_frame_rate(60));
        assert!(!panel.select_resolution("123x456"));

        panel.apply().await.unwrap();
        assert_eq!(track.settings().width, Some(3840));
        assert_eq!(panel.options().active_frame_rate, Some(FrameRateOption(60)));
        assert!(panel.last_error().is_none());
    }

    #[tokio::test]
    async fn test_panel_keeps_error_and_settings_on_rejection() {
        let track = open_track(
            FakeDevice::uhd_webcam("cam1", "Front")
                .with_apply(ApplyBehavior::Reject("mode unavailable".to_string())),
        )
        .await;
        let before = track.settings();
        let mut panel = SettingsPanel::new("cam1", Some(track.clone()));
        panel.select_resolution("640x480");

        let result = panel.apply().await;
        assert!(matches!(result, Err(ApplyError::Rejected(_))));
        assert!(panel.last_error().is_some());
        assert_eq!(track.settings(), before);
    }

    #[test]
    fn test_device_id_is_truncated_for_display() {
        let panel = SettingsPanel::new("0123456789abcdefXYZ", None);
        assert_eq!(panel.display_device_id(), "0123456789abcde...");
        assert!(panel.options().resolutions.is_empty());
    }

    fn arb_range() -> impl Strategy<Value = Option<CapabilityRange>> {
        prop::option::of(
            (prop::option::of(0.0f64..5000.0), prop::option::of(0.0f64..5000.0))
                .prop_map(|(min, max)| CapabilityRange { min, max }),
        )
    }

    proptest! {
        #[test]
        fn prop_filtered_options_are_subsets(
            width in arb_range(),
            height in arb_range(),
            frame_rate in arb_range(),
        ) {
            let caps = TrackCapabilities { width, height, frame_rate };
            let resolutions = filter_resolutions(Some(&caps));
            let frame_rates = filter_frame_rates(Some(&caps));

            let all = all_resolutions();
            prop_assert!(resolutions.iter().all(|r| all.contains(r)));
            prop_assert!(frame_rates.iter().all(|f| FRAME_RATE_PREFERENCES.contains(&f.fps())));

            for res in &resolutions {
                prop_assert!(width.map_or(true, |r| r.contains(res.width as f64)));
                prop_assert!(height.map_or(true, |r| r.contains(res.height as f64)));
            }
            if width.is_none() && height.is_none() {
                prop_assert_eq!(resolutions.len(), all.len());
            }
            if frame_rate.is_none() {
                prop_assert_eq!(frame_rates.len(), FRAME_RATE_PREFERENCES.len());
            }
        }
    }
}

//! Camera permission probing.
//!
//! The OS permission prompt is outside the core; this only reports what can
//! be observed up front so a refused permission surfaces as
//! [`CaptureError::PermissionDenied`] instead of a generic backend failure.

use crate::errors::CaptureError;

/// Permission status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PermissionStatus {
    Granted,
    Denied,
    /// The user has not been asked yet
    NotDetermined,
    /// Blocked by policy (parental controls, MDM)
    Restricted,
}

impl std::fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionStatus::Granted => write!(f, "granted"),
            PermissionStatus::Denied => write!(f, "denied"),
            PermissionStatus::NotDetermined => write!(f, "not_determined"),
            PermissionStatus::Restricted => write!(f, "restricted"),
        }
    }
}

/// Detailed permission information
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PermissionInfo {
    pub status: PermissionStatus,
    pub message: String,
    pub can_request: bool,
}

impl PermissionInfo {
    fn new(status: PermissionStatus, message: impl Into<String>, can_request: bool) -> Self {
        Self {
            status,
            message: message.into(),
            can_request,
        }
    }

    /// `Err` when opening a camera is known to fail. An undetermined status
    /// passes, since the open itself triggers the OS prompt.
    pub fn check_capture(&self) -> Result<(), CaptureError> {
        match self.status {
            PermissionStatus::Denied | PermissionStatus::Restricted => {
                Err(CaptureError::PermissionDenied(self.message.clone()))
            }
            PermissionStatus::Granted | PermissionStatus::NotDetermined => Ok(()),
        }
    }
}

/// Check camera permission status
pub fn check_permission() -> PermissionStatus {
    check_permission_detailed().status
}

/// Check camera permission status with detailed information
pub fn check_permission_detailed() -> PermissionInfo {
    let info = probe();
    log::debug!("Camera permission {}: {}", info.status, info.message);
    info
}

#[cfg(all(target_os = "windows", feature = "native"))]
fn probe() -> PermissionInfo {
    // Privacy settings block enumeration outright, so a successful query is
    // the best available signal.
    match nokhwa::query(nokhwa::utils::ApiBackend::Auto) {
        Ok(devices) if !devices.is_empty() => PermissionInfo::new(
            PermissionStatus::Granted,
            "Camera access granted via Windows Privacy settings",
            false,
        ),
        Ok(_) => PermissionInfo::new(
            PermissionStatus::NotDetermined,
            "No cameras found - permission may not be granted",
            true,
        ),
        Err(e) => PermissionInfo::new(
            PermissionStatus::Denied,
            format!("Camera access denied: {}", e),
            true,
        ),
    }
}

#[cfg(target_os = "macos")]
fn probe() -> PermissionInfo {
    PermissionInfo::new(
        PermissionStatus::NotDetermined,
        "Camera authorization is requested by AVFoundation on first open",
        true,
    )
}

#[cfg(target_os = "linux")]
fn probe() -> PermissionInfo {
    use std::fs::{self, OpenOptions};

    let mut nodes: Vec<String> = fs::read_dir("/dev")
        .map(|entries| {
            entries
                .flatten()
                .filter_map(|entry| entry.file_name().into_string().ok())
                .filter(|name| name.starts_with("video"))
                .map(|name| format!("/dev/{}", name))
                .collect()
        })
        .unwrap_or_default();
    nodes.sort();

    let probes: Vec<(String, std::io::Result<()>)> = nodes
        .into_iter()
        .map(|node| {
            let opened = OpenOptions::new().read(true).open(&node).map(|_| ());
            (node, opened)
        })
        .collect();
    summarize_video_nodes(&probes)
}

/// Access is granted when any node opens; a camera on a readable node works
/// even if others are locked down.
#[cfg(target_os = "linux")]
fn summarize_video_nodes(probes: &[(String, std::io::Result<()>)]) -> PermissionInfo {
    use std::io::ErrorKind;

    if let Some((node, _)) = probes.iter().find(|(_, opened)| opened.is_ok()) {
        return PermissionInfo::new(
            PermissionStatus::Granted,
            format!("Camera access granted ({} is readable)", node),
            false,
        );
    }

    let denied: Vec<&str> = probes
        .iter()
        .filter(|(_, opened)| {
            matches!(opened, Err(e) if e.kind() == ErrorKind::PermissionDenied)
        })
        .map(|(node, _)| node.as_str())
        .collect();
    if !denied.is_empty() {
        return PermissionInfo::new(
            PermissionStatus::Denied,
            format!(
                "Cannot open {} - add the user to the video group: sudo usermod -a -G video $USER",
                denied.join(", ")
            ),
            true,
        );
    }

    match probes.first() {
        Some((node, Err(e))) => PermissionInfo::new(
            PermissionStatus::NotDetermined,
            format!("Cannot probe {}: {}", node, e),
            false,
        ),
        _ => PermissionInfo::new(
            PermissionStatus::NotDetermined,
            "No video devices found at /dev/video*",
            false,
        ),
    }
}

#[cfg(not(any(
    all(target_os = "windows", feature = "native"),
    target_os = "macos",
    target_os = "linux"
)))]
fn probe() -> PermissionInfo {
    PermissionInfo::new(
        PermissionStatus::NotDetermined,
        "Platform not supported",
        false,
    )
}

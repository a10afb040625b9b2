//! Platform capture backends.

#[cfg(feature = "native")]
pub mod native;

#[cfg(feature = "native")]
pub use native::{NativeProvider, NativeTrack};

use crate::types::Platform;

/// Capture provider for the current platform.
#[cfg(feature = "native")]
pub fn default_provider() -> std::sync::Arc<dyn crate::provider::CaptureProvider> {
    log::info!(
        "Using native capture provider on {}",
        Platform::current().as_str()
    );
    std::sync::Arc::new(NativeProvider::new())
}

/// Whether this build can capture from real hardware.
pub fn has_native_backend() -> bool {
    cfg!(feature = "native") && Platform::current() != Platform::Unknown
}

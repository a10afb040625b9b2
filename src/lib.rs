//! camview: webcam chooser and viewer core
//!
//! Discovers the machine's cameras, shows a live preview of each, and opens
//! the chosen one as a single high-resolution stream with fullscreen, a
//! context menu and a capture settings overlay. Rendering and window wiring
//! belong to the embedding shell, which talks to the core through the traits
//! in [`provider`] and the events in [`events`].
//!
//! # Features
//! - Concurrent per-device previews with guaranteed teardown
//! - Exact-device primary stream at up to 4K/60fps
//! - Capability-filtered resolution and frame-rate options
//! - Pure viewer state machine with scoped input listeners
//! - nokhwa-backed native capture (`native` feature, on by default)
//!
//! # Usage
//! ```rust,ignore
//! use camview::{app::{CameraApp, Shell}, platform};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), camview::CameraError> {
//!     camview::init_logging();
//!     let (shell, mut events) = Shell::builder(platform::default_provider()).build();
//!     let mut app = CameraApp::new(shell);
//!     app.start().await;
//!     loop {
//!         app.step().await?;
//!         // render app.route(), forward input to the shell's InputBus ...
//!     }
//! }
//! ```
pub mod app;
pub mod capability;
pub mod chooser;
pub mod config;
pub mod errors;
pub mod events;
pub mod headless;
pub mod input;
pub mod invariant_ppt;
pub mod permissions;
pub mod platform;
pub mod provider;
pub mod stream;
pub mod types;
pub mod viewer;

// Testing utilities - deterministic fakes for offline testing
pub mod testing;

// Re-exports for convenience
pub use app::{CameraApp, Shell};
pub use chooser::DeviceChooser;
pub use config::ViewerConfig;
pub use errors::{ApplyError, CameraError, CaptureError, EnumerationError};
pub use events::{DeviceEvent, Notice, NoticeLevel, ShellEvent};
pub use stream::{StreamHandle, StreamManager};
pub use types::{DeviceDescriptor, FrameRateOption, Platform, ResolutionOption};
pub use viewer::{ViewerState, WebcamViewer};

/// Detect the current platform using the Platform enum
pub fn current_platform() -> Platform {
    Platform::current()
}

/// Initialize logging, defaulting RUST_LOG to `camview=info`
pub fn init_logging() {
    init_logging_with(&config::LoggingConfig::default().filter);
}

/// Initialize logging with `filter` unless RUST_LOG is already set
pub fn init_logging_with(filter: &str) {
    let env = env_logger::Env::default().default_filter_or(filter);
    let _ = env_logger::Builder::from_env(env).try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        platform: Platform::current(),
        native_backend: platform::has_native_backend(),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub platform: Platform,
    pub native_backend: bool,
}

//! Viewer interaction state as a pure reducer.

use crate::assert_invariant;
use crate::invariant_ppt::names;
use serde::{Deserialize, Serialize};

/// Where the custom context menu is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMenu {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerState {
    pub fullscreen: bool,
    pub context_menu: Option<ContextMenu>,
    pub settings_open: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewerEvent {
    /// Click on the display surface. Also counts as a click outside the menu.
    SurfaceClicked,
    /// Fullscreen wanted without a click, e.g. auto-fullscreen on attach.
    EnterFullscreen,
    /// Fullscreen changed outside the viewer, e.g. by an OS gesture.
    FullscreenChanged(bool),
    /// The shell refused a fullscreen request.
    FullscreenRefused,
    EscapePressed,
    ContextMenuRequested { x: i32, y: i32 },
    OutsideClicked,
    SettingsItemClicked,
    SettingsClosed,
    /// The primary stream could not be opened.
    PrimaryFailed,
}

/// Side effects the viewer executes after a transition, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    RequestFullscreen,
    ExitFullscreen,
    OpenSettings,
    ReleasePrimary,
    NotifyBack,
    NotifySettingsClosed,
}

impl ViewerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reduce(self, event: ViewerEvent) -> (ViewerState, Vec<Effect>) {
        let mut next = self;
        let mut effects = Vec::new();

        match event {
            ViewerEvent::SurfaceClicked => {
                next.context_menu = None;
                if !next.fullscreen {
                    next.fullscreen = true;
                    effects.push(Effect::RequestFullscreen);
                }
            }
            ViewerEvent::EnterFullscreen => {
                if !next.fullscreen {
                    next.fullscreen = true;
                    effects.push(Effect::RequestFullscreen);
                }
            }
            ViewerEvent::FullscreenChanged(active) => next.fullscreen = active,
            ViewerEvent::FullscreenRefused => next.fullscreen = false,
            ViewerEvent::EscapePressed | ViewerEvent::PrimaryFailed => {
                effects.push(Effect::ExitFullscreen);
                next.fullscreen = false;
                next.context_menu = None;
                next.settings_open = false;
                effects.push(Effect::ReleasePrimary);
                effects.push(Effect::NotifyBack);

                assert_invariant!(
                    !next.fullscreen,
                    names::ESCAPE_LEAVES_FULLSCREEN,
                    "viewer::reduce"
                );
            }
            ViewerEvent::ContextMenuRequested { x, y } => {
                next.context_menu = Some(ContextMenu { x, y });
                if next.fullscreen {
                    next.fullscreen = false;
                    effects.push(Effect::ExitFullscreen);
                }
            }
            ViewerEvent::OutsideClicked => next.context_menu = None,
            ViewerEvent::SettingsItemClicked => {
                if next.context_menu.take().is_some() && !next.settings_open {
                    next.settings_open = true;
                    effects.push(Effect::OpenSettings);
                }
            }
            ViewerEvent::SettingsClosed => {
                if next.settings_open {
                    next.settings_open = false;
                    effects.push(Effect::NotifySettingsClosed);
                }
            }
        }

        (next, effects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(fullscreen: bool, menu: Option<(i32, i32)>, settings_open: bool) -> ViewerState {
        ViewerState {
            fullscreen,
            context_menu: menu.map(|(x, y)| ContextMenu { x, y }),
            settings_open,
        }
    }

    #[test]
    fn test_right_click_in_fullscreen() {
        let (next, effects) = state(true, None, false)
            .reduce(ViewerEvent::ContextMenuRequested { x: 120, y: 340 });
        assert_eq!(next, state(false, Some((120, 340)), false));
        assert_eq!(effects, vec![Effect::ExitFullscreen]);
    }

    #[test]
    fn test_surface_click_requests_fullscreen_once() {
        let (next, effects) = ViewerState::new().reduce(ViewerEvent::SurfaceClicked);
        assert!(next.fullscreen);
        assert_eq!(effects, vec![Effect::RequestFullscreen]);

        let (_, effects) = next.reduce(ViewerEvent::SurfaceClicked);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_surface_click_closes_menu() {
        let (next, _) = state(false, Some((1, 1)), false).reduce(ViewerEvent::SurfaceClicked);
        assert_eq!(next.context_menu, None);
    }

    #[test]
    fn test_settings_item_requires_open_menu() {
        let (next, effects) = ViewerState::new().reduce(ViewerEvent::SettingsItemClicked);
        assert_eq!(next, ViewerState::new());
        assert!(effects.is_empty());

        let (next, effects) =
            state(false, Some((5, 5)), false).reduce(ViewerEvent::SettingsItemClicked);
        assert_eq!(next, state(false, None, true));
        assert_eq!(effects, vec![Effect::OpenSettings]);
    }

    #[test]
    fn test_closing_settings_notifies_once() {
        let (next, effects) = state(false, None, true).reduce(ViewerEvent::SettingsClosed);
        assert!(!next.settings_open);
        assert_eq!(effects, vec![Effect::NotifySettingsClosed]);

        let (_, effects) = next.reduce(ViewerEvent::SettingsClosed);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_escape_releases_and_goes_back() {
        let (next, effects) = state(true, Some((3, 4)), true).reduce(ViewerEvent::EscapePressed);
        assert_eq!(next, ViewerState::new());
        assert_eq!(
            effects,
            vec![
                Effect::ExitFullscreen,
                Effect::ReleasePrimary,
                Effect::NotifyBack
            ]
        );
    }

    #[test]
    fn test_primary_failure_closes_overlays() {
        let (next, effects) = state(false, None, true).reduce(ViewerEvent::PrimaryFailed);
        assert_eq!(next, ViewerState::new());
        assert_eq!(effects.last(), Some(&Effect::NotifyBack));
    }

    #[test]
    fn test_external_exit_and_refusal_clear_flag() {
        let (next, effects) = state(true, None, false).reduce(ViewerEvent::FullscreenChanged(false));
        assert!(!next.fullscreen);
        assert!(effects.is_empty());

        let (next, _) = state(true, None, false).reduce(ViewerEvent::FullscreenRefused);
        assert!(!next.fullscreen);
    }
}

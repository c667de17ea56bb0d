//! Outbound calls into the native Lookback SDK

use crate::settings::SettingsSnapshot;

/// The native-side counterpart of this bridge.
///
/// Calls are fire-and-forget; the native layer owns recording, upload and UI.
pub trait NativeBridge: Send + Sync {
    /// Settings the native layer holds at startup
    fn initial_settings(&self) -> SettingsSnapshot;

    fn setup_with_app_token(&self, token: &str);

    /// Hand a Lookback Participate link to the SDK
    fn open_url(&self, url: &str);

    fn set_recording(&self, recording: bool);

    fn set_paused(&self, paused: bool);

    fn set_show_introduction_dialogs(&self, show: bool);

    fn set_recorder_visible(&self, visible: bool);

    fn set_feedback_bubble_visible(&self, visible: bool);

    fn set_shake_to_record(&self, enabled: bool);
}

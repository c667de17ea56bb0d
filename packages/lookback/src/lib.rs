//! Lookback Bridge
//!
//! Exposes the native Lookback recorder SDK to a host application through a
//! property- and event-style façade. The interesting parts are the settings
//! synchronizer, which keeps a local snapshot in step with native pushes and
//! forwards them to at most one observer, and the deep-link router, which
//! hands Lookback Participate links to the SDK.

mod callback;
pub mod diagnostics;
mod environment;
mod error;
mod events;
mod native;
mod router;
mod settings;
pub mod testing;

use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use callback::{Assignment, CallbackValue, SettingsCallback, UploadCallback};
pub use diagnostics::{
    Diagnostic, DiagnosticKind, DiagnosticSink, DiagnosticsConfig, DiagnosticsLog, Severity,
};
pub use environment::{IncomingLink, LinkEnvironment};
pub use error::{Error, Result};
pub use events::{
    EventDispatcher, NativeEvent, UploadStarted, STARTED_UPLOAD_EVENT, STARTED_UPLOAD_SLOT,
    UPDATE_SETTING_EVENT,
};
pub use native::NativeBridge;
pub use router::{
    link_matches, probe_url, DeepLinkRouter, InitialLinkOutcome, ProbeOutcome, SetupHandle,
    SetupReport, PROBE_PATH,
};
pub use settings::{
    merge, SettingsSnapshot, SettingsSynchronizer, SubscriptionMode, SETTINGS_OBSERVER_SLOT,
    URL_SCHEME_KEY,
};

/// Configuration for the Lookback bridge
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LookbackConfig {
    /// Configuration for the diagnostics log
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

impl LookbackConfig {
    /// Load configuration from a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// The façade the host application talks to
pub struct Lookback {
    native: Arc<dyn NativeBridge>,

    settings: Arc<SettingsSynchronizer>,

    events: Arc<EventDispatcher>,

    router: DeepLinkRouter,
}

impl Lookback {
    /// Create a façade reporting diagnostics to `diagnostics`.
    ///
    /// The settings snapshot starts from the native layer's initial settings,
    /// in merge-only mode.
    pub fn new(
        native: Arc<dyn NativeBridge>,
        environment: Arc<dyn LinkEnvironment>,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Self {
        let settings = Arc::new(SettingsSynchronizer::new(
            native.initial_settings(),
            diagnostics.clone(),
        ));
        let events = Arc::new(EventDispatcher::new(settings.clone(), diagnostics.clone()));
        let router = DeepLinkRouter::new(native.clone(), environment, diagnostics);

        Self {
            native,
            settings,
            events,
            router,
        }
    }

    /// Create a façade with a [`DiagnosticsLog`] built from `config`
    pub fn with_config(
        native: Arc<dyn NativeBridge>,
        environment: Arc<dyn LinkEnvironment>,
        config: LookbackConfig,
    ) -> Self {
        Self::new(native, environment, Arc::new(DiagnosticsLog::new(config.diagnostics)))
    }

    /// The current settings. Set asynchronously by the SDK, so may lag behind it.
    pub async fn settings(&self) -> SettingsSnapshot {
        self.settings.snapshot().await
    }

    pub async fn subscription_mode(&self) -> SubscriptionMode {
        self.settings.mode().await
    }

    /// Set a callback fired with each partial settings update, or clear it
    pub async fn set_on_settings_update(
        &self,
        value: CallbackValue<SettingsCallback>,
    ) -> Assignment {
        self.settings.set_observer(value).await
    }

    /// Set a callback fired when the SDK starts uploading a recording, or clear it.
    ///
    /// Only fires for recordings started through this façade, not from the bubble.
    pub async fn set_on_started_upload(&self, value: CallbackValue<UploadCallback>) -> Assignment {
        self.events.set_upload_observer(value).await
    }

    /// Set up Lookback Participate for `url_scheme`.
    ///
    /// The scheme must be registered with the platform and match the one in
    /// the Lookback dashboard. Verification and link routing happen in the
    /// background; await the returned handle to observe the outcome.
    pub async fn setup_participate(&self, url_scheme: &str) -> SetupHandle {
        self.settings
            .record(URL_SCHEME_KEY, JsonValue::String(url_scheme.to_string()))
            .await;
        self.router.setup(url_scheme).await
    }

    /// Forward an incoming link, as the environment's "open URL" handler would
    pub async fn handle_open_url(&self, url: &str) -> bool {
        self.router.handle_open_url(url).await
    }

    pub async fn is_listening_for_links(&self) -> bool {
        self.router.is_listening().await
    }

    /// Apply a single native event
    pub async fn dispatch(&self, event: NativeEvent) {
        self.events.dispatch(event).await;
    }

    /// Decode and apply a named native event
    pub async fn dispatch_named(&self, name: &str, payload: JsonValue) -> Result<()> {
        let event = NativeEvent::from_named(name, payload)?;
        self.dispatch(event).await;
        Ok(())
    }

    /// Drain native events from `events` in order on a background task
    pub fn attach(&self, events: mpsc::UnboundedReceiver<NativeEvent>) -> JoinHandle<()> {
        debug!("Attaching native event channel");
        tokio::spawn(self.events.clone().run(events))
    }

    pub fn setup_with_app_token(&self, token: &str) {
        self.native.setup_with_app_token(token);
    }

    /// Start recording with the default options, or stop the current session
    pub fn set_recording(&self, recording: bool) {
        self.native.set_recording(recording);
    }

    pub fn set_paused(&self, paused: bool) {
        self.native.set_paused(paused);
    }

    pub fn set_show_introduction_dialogs(&self, show: bool) {
        self.native.set_show_introduction_dialogs(show);
    }

    /// Show or hide the recorder UI, same as tapping the feedback bubble
    pub fn set_recorder_visible(&self, visible: bool) {
        self.native.set_recorder_visible(visible);
    }

    pub fn set_feedback_bubble_visible(&self, visible: bool) {
        self.native.set_feedback_bubble_visible(visible);
    }

    pub fn set_shake_to_record(&self, enabled: bool) {
        self.native.set_shake_to_record(enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockEnvironment, MockNativeBridge, NativeCall};

    #[test]
    fn test_config_from_partial_json() {
        let config = LookbackConfig::from_json(r#"{"diagnostics": {"history_limit": 5}}"#).unwrap();
        assert_eq!(config.diagnostics.history_limit, 5);
        assert!(config.diagnostics.console_output);

        let empty = LookbackConfig::from_json("{}").unwrap();
        assert_eq!(empty.diagnostics.history_limit, 1000);

        assert!(matches!(LookbackConfig::from_json("not json"), Err(Error::Json(_))));
    }

    #[tokio::test]
    async fn test_pass_through_setters_forward_verbatim() {
        let native = Arc::new(MockNativeBridge::default());
        let lookback = Lookback::with_config(
            native.clone(),
            Arc::new(MockEnvironment::new()),
            LookbackConfig::default(),
        );

        lookback.setup_with_app_token("team-token");
        lookback.set_recording(true);
        lookback.set_paused(false);
        lookback.set_show_introduction_dialogs(false);
        lookback.set_recorder_visible(true);
        lookback.set_feedback_bubble_visible(false);
        lookback.set_shake_to_record(true);

        assert_eq!(
            native.calls(),
            vec![
                NativeCall::SetupWithAppToken("team-token".into()),
                NativeCall::Recording(true),
                NativeCall::Paused(false),
                NativeCall::ShowIntroductionDialogs(false),
                NativeCall::RecorderVisible(true),
                NativeCall::FeedbackBubbleVisible(false),
                NativeCall::ShakeToRecord(true),
            ]
        );
    }
}

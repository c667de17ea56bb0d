//! Inbound native events
//!
//! The native layer emits named events with JSON payloads. They are decoded
//! into [`NativeEvent`] and routed by the [`EventDispatcher`], which can also
//! drain a channel of events in order so that updates arriving from native
//! threads are applied one at a time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;

use crate::callback::{Assignment, CallbackSlot, CallbackValue, UploadCallback};
use crate::diagnostics::DiagnosticSink;
use crate::settings::{SettingsSnapshot, SettingsSynchronizer};
use crate::{Error, Result};

/// Native event carrying a partial settings update
pub const UPDATE_SETTING_EVENT: &str = "updateLookbackSetting";

/// Native event fired when the SDK starts uploading a recording
pub const STARTED_UPLOAD_EVENT: &str = "onStartedUpload";

/// Name of the upload callback slot as the host sees it
pub const STARTED_UPLOAD_SLOT: &str = "onStartedUpload";

/// Payload of [`STARTED_UPLOAD_EVENT`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStarted {
    #[serde(rename = "destinationURL")]
    pub destination_url: String,

    pub session_started_at: DateTime<Utc>,
}

/// A decoded native event
#[derive(Clone, Debug, PartialEq)]
pub enum NativeEvent {
    SettingsChanged(SettingsSnapshot),
    StartedUpload(UploadStarted),
}

impl NativeEvent {
    /// Decode a named event as the native emitter delivers it
    pub fn from_named(name: &str, payload: JsonValue) -> Result<Self> {
        match name {
            UPDATE_SETTING_EVENT => match payload {
                JsonValue::Object(partial) => Ok(NativeEvent::SettingsChanged(partial)),
                other => Err(Error::InvalidPayload(format!(
                    "{} expects an object, got {}",
                    UPDATE_SETTING_EVENT, other
                ))),
            },
            STARTED_UPLOAD_EVENT => {
                Ok(NativeEvent::StartedUpload(serde_json::from_value(payload)?))
            }
            other => Err(Error::UnknownEvent(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NativeEvent::SettingsChanged(_) => UPDATE_SETTING_EVENT,
            NativeEvent::StartedUpload(_) => STARTED_UPLOAD_EVENT,
        }
    }
}

/// Routes native events to the settings synchronizer and the upload slot
pub struct EventDispatcher {
    settings: Arc<SettingsSynchronizer>,

    uploads: CallbackSlot<UploadCallback>,
}

impl EventDispatcher {
    pub fn new(settings: Arc<SettingsSynchronizer>, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            settings,
            uploads: CallbackSlot::new(STARTED_UPLOAD_SLOT, diagnostics),
        }
    }

    pub fn settings(&self) -> &Arc<SettingsSynchronizer> {
        &self.settings
    }

    /// Install, replace or clear the upload-start callback
    pub async fn set_upload_observer(&self, value: CallbackValue<UploadCallback>) -> Assignment {
        self.uploads.assign(value).await
    }

    pub async fn dispatch(&self, event: NativeEvent) {
        match event {
            NativeEvent::SettingsChanged(partial) => self.settings.apply_update(partial).await,
            NativeEvent::StartedUpload(upload) => {
                debug!("Upload started to {}", upload.destination_url);
                if !self.uploads.invoke(|callback| callback(&upload)).await {
                    debug!("No {} callback set", STARTED_UPLOAD_SLOT);
                }
            }
        }
    }

    /// Apply events in arrival order until every sender is dropped
    pub async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<NativeEvent>) {
        while let Some(event) = events.recv().await {
            self.dispatch(event).await;
        }
        debug!("Native event channel closed");
    }
}

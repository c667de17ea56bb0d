//! Settings synchronization
//!
//! The native layer pushes partial settings updates at any time. They are
//! merged into one owned snapshot, last write wins per key. On top of that
//! sits a two-mode state machine: with no observer installed updates are only
//! merged, with one installed the observer also receives each raw partial
//! update after it has been merged.

use std::sync::Arc;

use log::debug;
use serde_json::{Map, Value as JsonValue};
use tokio::sync::{Mutex, RwLock};

use crate::callback::{Assignment, CallbackSlot, CallbackValue, SettingsCallback};
use crate::diagnostics::DiagnosticSink;

/// Setting name to value
pub type SettingsSnapshot = Map<String, JsonValue>;

/// Reserved snapshot key holding the configured deep-link scheme
pub const URL_SCHEME_KEY: &str = "urlScheme";

/// Name of the observer slot as the host sees it
pub const SETTINGS_OBSERVER_SLOT: &str = "onSettingsUpdate";

/// Merge a partial update into a snapshot, last write wins per key
pub fn merge(snapshot: &mut SettingsSnapshot, partial: &SettingsSnapshot) {
    for (key, value) in partial {
        snapshot.insert(key.clone(), value.clone());
    }
}

/// How incoming updates are handled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionMode {
    /// Merge only (initial state)
    MergeOnly,
    /// Merge, then hand the partial update to the observer
    MergeAndNotify,
}

/// Keeps the settings snapshot in step with native pushes
pub struct SettingsSynchronizer {
    snapshot: RwLock<SettingsSnapshot>,

    observer: CallbackSlot<SettingsCallback>,

    /// Serializes merge+notify against observer swaps
    dispatch: Mutex<()>,
}

impl SettingsSynchronizer {
    /// Start in merge-only mode from the native layer's initial snapshot
    pub fn new(initial: SettingsSnapshot, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            snapshot: RwLock::new(initial),
            observer: CallbackSlot::new(SETTINGS_OBSERVER_SLOT, diagnostics),
            dispatch: Mutex::new(()),
        }
    }

    /// A copy of the current merged snapshot
    pub async fn snapshot(&self) -> SettingsSnapshot {
        self.snapshot.read().await.clone()
    }

    /// A single setting
    pub async fn get(&self, key: &str) -> Option<JsonValue> {
        self.snapshot.read().await.get(key).cloned()
    }

    pub async fn mode(&self) -> SubscriptionMode {
        if self.observer.is_set().await {
            SubscriptionMode::MergeAndNotify
        } else {
            SubscriptionMode::MergeOnly
        }
    }

    /// Install, replace or clear the observer.
    ///
    /// Anything that is neither a function nor a clear is reported and leaves
    /// the current observer in place.
    pub async fn set_observer(&self, value: CallbackValue<SettingsCallback>) -> Assignment {
        let _guard = self.dispatch.lock().await;
        self.observer.assign(value).await
    }

    /// Merge a partial update pushed by the native layer and notify the observer, if any.
    ///
    /// A panicking observer is reported and stays installed; the merge has already happened.
    pub async fn apply_update(&self, partial: SettingsSnapshot) {
        let _guard = self.dispatch.lock().await;

        {
            let mut snapshot = self.snapshot.write().await;
            merge(&mut snapshot, &partial);
        }

        let notified = self.observer.invoke(|callback| callback(&partial)).await;
        if notified {
            debug!("Settings updated ({} keys), observer notified", partial.len());
        } else {
            debug!("Settings updated ({} keys)", partial.len());
        }
    }

    /// Merge a locally originated value without notifying the observer
    pub async fn record(&self, key: &str, value: JsonValue) {
        let _guard = self.dispatch.lock().await;
        self.snapshot.write().await.insert(key.to_string(), value);
    }
}

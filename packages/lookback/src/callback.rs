//! Write-only callback slots
//!
//! Hosts assign callbacks dynamically, so a slot can be handed a function, a
//! clear, or some other value entirely. [`CallbackSlot`] holds at most one
//! callback and resolves each assignment fail-soft: misuse is reported and
//! the previous callback survives.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::debug;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::events::UploadStarted;
use crate::settings::SettingsSnapshot;

/// Callback receiving a partial settings update
pub type SettingsCallback = Arc<dyn Fn(&SettingsSnapshot) + Send + Sync>;

/// Callback receiving an upload-start event
pub type UploadCallback = Arc<dyn Fn(&UploadStarted) + Send + Sync>;

/// A value a host assigns to a callback slot
pub enum CallbackValue<F> {
    /// Install this callback
    Function(F),

    /// Clear the slot
    Null,

    /// Any other host value; cleared if falsy, rejected otherwise
    Value(JsonValue),
}

impl<F> CallbackValue<F> {
    /// Whether this value clears the slot under the host's truthiness rules
    pub fn is_clear(&self) -> bool {
        match self {
            CallbackValue::Function(_) => false,
            CallbackValue::Null => true,
            CallbackValue::Value(value) => is_falsy(value),
        }
    }
}

impl CallbackValue<SettingsCallback> {
    pub fn settings_observer(f: impl Fn(&SettingsSnapshot) + Send + Sync + 'static) -> Self {
        let callback: SettingsCallback = Arc::new(f);
        CallbackValue::Function(callback)
    }
}

impl CallbackValue<UploadCallback> {
    pub fn upload_observer(f: impl Fn(&UploadStarted) + Send + Sync + 'static) -> Self {
        let callback: UploadCallback = Arc::new(f);
        CallbackValue::Function(callback)
    }
}

impl<F> From<Option<F>> for CallbackValue<F> {
    fn from(value: Option<F>) -> Self {
        match value {
            Some(f) => CallbackValue::Function(f),
            None => CallbackValue::Null,
        }
    }
}

/// `null`, `false`, `0` and `""` clear a slot, like they would in the host
fn is_falsy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::Bool(b) => !b,
        JsonValue::Number(n) => n.as_f64().map_or(false, |n| n == 0.0),
        JsonValue::String(s) => s.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => false,
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(reason) = payload.downcast_ref::<&str>() {
        reason.to_string()
    } else if let Some(reason) = payload.downcast_ref::<String>() {
        reason.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// What an assignment did to the slot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Assignment {
    Installed(Uuid),
    Cleared,
    Rejected,
}

struct Installed<F> {
    id: Uuid,
    callback: F,
}

/// Holds at most one callback for a named slot
pub struct CallbackSlot<F> {
    name: &'static str,
    current: RwLock<Option<Installed<F>>>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl<F: Clone> CallbackSlot<F> {
    pub fn new(name: &'static str, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            name,
            current: RwLock::new(None),
            diagnostics,
        }
    }

    /// Replace, clear, or (on misuse) keep the current callback
    pub async fn assign(&self, value: CallbackValue<F>) -> Assignment {
        if value.is_clear() {
            let previous = self.current.write().await.take();
            if let Some(previous) = previous {
                debug!("Cleared {} callback {}", self.name, previous.id);
            }
            return Assignment::Cleared;
        }

        match value {
            CallbackValue::Function(callback) => {
                let id = Uuid::new_v4();
                let previous = self.current.write().await.replace(Installed { id, callback });
                match previous {
                    Some(previous) => {
                        debug!("Replaced {} callback {} with {}", self.name, previous.id, id)
                    }
                    None => debug!("Installed {} callback {}", self.name, id),
                }
                Assignment::Installed(id)
            }
            _ => {
                self.diagnostics
                    .emit(Diagnostic::new(DiagnosticKind::ConfigurationMisuse {
                        slot: self.name.to_string(),
                    }))
                    .await;
                Assignment::Rejected
            }
        }
    }

    /// The current callback, cloned out so it can be called without holding the lock
    pub async fn get(&self) -> Option<F> {
        self.current.read().await.as_ref().map(|installed| installed.callback.clone())
    }

    pub async fn is_set(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Run `call` with the current callback, if there is one.
    ///
    /// A panic inside the callback is caught and reported as
    /// [`DiagnosticKind::CallbackPanicked`]; the slot keeps the callback.
    /// Returns whether a callback was run.
    pub async fn invoke(&self, call: impl FnOnce(&F)) -> bool {
        let callback = match self.get().await {
            Some(callback) => callback,
            None => return false,
        };

        let reason = match panic::catch_unwind(AssertUnwindSafe(|| call(&callback))) {
            Ok(()) => return true,
            Err(payload) => panic_reason(&*payload),
        };

        self.diagnostics
            .emit(Diagnostic::new(DiagnosticKind::CallbackPanicked {
                slot: self.name.to_string(),
                reason,
            }))
            .await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticsLog;
    use serde_json::json;

    type Slot = CallbackSlot<Arc<dyn Fn(u32) -> u32 + Send + Sync>>;

    fn slot() -> (Slot, Arc<DiagnosticsLog>) {
        let log = Arc::new(DiagnosticsLog::default());
        (CallbackSlot::new("onTest", log.clone()), log)
    }

    fn double() -> CallbackValue<Arc<dyn Fn(u32) -> u32 + Send + Sync>> {
        CallbackValue::Function(Arc::new(|n: u32| n * 2))
    }

    #[test]
    fn test_falsy_values_clear() {
        for value in [json!(null), json!(false), json!(0), json!(0.0), json!("")] {
            let cleared = CallbackValue::<()>::Value(value.clone()).is_clear();
            assert!(cleared, "{value} should clear");
        }
        for value in [json!(true), json!(1), json!("cb"), json!([]), json!({})] {
            let cleared = CallbackValue::<()>::Value(value.clone()).is_clear();
            assert!(!cleared, "{value} should not clear");
        }
        assert!(CallbackValue::<()>::from(None).is_clear());
    }

    #[tokio::test]
    async fn test_assign_replaces_previous_callback() {
        let (slot, _) = slot();

        let first = slot.assign(double()).await;
        let second = slot.assign(CallbackValue::Function(Arc::new(|n: u32| n + 1))).await;

        assert!(matches!(first, Assignment::Installed(_)));
        assert_ne!(first, second);
        assert_eq!(slot.get().await.map(|f| f(4)), Some(5));
    }

    #[tokio::test]
    async fn test_misuse_keeps_callback_and_reports() {
        let (slot, log) = slot();
        slot.assign(double()).await;

        let outcome = slot.assign(CallbackValue::Value(json!("not a function"))).await;

        assert_eq!(outcome, Assignment::Rejected);
        assert_eq!(slot.get().await.map(|f| f(4)), Some(8));
        assert_eq!(
            log.kinds().await,
            vec![DiagnosticKind::ConfigurationMisuse { slot: "onTest".into() }]
        );
    }

    #[tokio::test]
    async fn test_clear_with_false() {
        let (slot, log) = slot();
        slot.assign(double()).await;

        assert_eq!(slot.assign(CallbackValue::Value(json!(false))).await, Assignment::Cleared);
        assert!(!slot.is_set().await);
        assert!(log.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_invoke_catches_panic_and_keeps_callback() {
        let (slot, log) = slot();
        slot.assign(double()).await;

        assert!(slot.invoke(|_| panic!("host bug")).await);

        assert!(slot.is_set().await);
        assert_eq!(slot.get().await.map(|f| f(4)), Some(8));
        assert_eq!(
            log.kinds().await,
            vec![DiagnosticKind::CallbackPanicked {
                slot: "onTest".into(),
                reason: "host bug".into(),
            }]
        );
    }

    #[tokio::test]
    async fn test_invoke_without_callback() {
        let (slot, log) = slot();

        assert!(!slot.invoke(|f| assert_eq!(f(1), 2)).await);
        assert!(log.history().await.is_empty());
    }
}

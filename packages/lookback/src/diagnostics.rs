//! Diagnostics for the Lookback bridge
//!
//! Misuse and environment failures never surface as errors to the host.
//! They are reported here instead, through an injectable [`DiagnosticSink`].
//! The default sink, [`DiagnosticsLog`], writes to the `log` facade and keeps
//! a bounded history that tests and hosts can inspect.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// Configuration for the diagnostics log
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Whether diagnostics are recorded at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Whether to output to the `log` facade
    #[serde(default = "default_true")]
    pub console_output: bool,

    /// Maximum number of diagnostics to keep in memory
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Whether to log verbose debug information
    #[serde(default = "default_false")]
    pub verbose: bool,
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

fn default_history_limit() -> usize {
    1000
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            console_output: true,
            history_limit: default_history_limit(),
            verbose: false,
        }
    }
}

/// How loudly a diagnostic should be reported
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    /// The `log` level used for console output
    pub fn level(self) -> log::Level {
        match self {
            Severity::Info => log::Level::Info,
            Severity::Warning => log::Level::Warn,
            Severity::Error => log::Level::Error,
        }
    }
}

/// What went wrong
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DiagnosticKind {
    /// A callback slot was handed something that is neither a function nor a clear
    #[error("{slot} must be set to a function or null to clear the existing function")]
    ConfigurationMisuse { slot: String },

    /// The probe resolved, but the scheme is not registered with the environment
    #[error(
        "URL scheme not recognised - your application must have the url scheme \"{scheme}://\" \
         registered, and it must match the one defined in your Lookback dashboard"
    )]
    SchemeNotRegistered { scheme: String },

    /// The probe itself failed
    #[error(
        "URL scheme test for \"{scheme}\" failed - ensure deep linking is set up properly: \
         {reason}"
    )]
    ProbeFailed { scheme: String, reason: String },

    /// The initial launch URL could not be fetched
    #[error("Initial URL fetch failed: {reason}")]
    InitialLinkQueryFailed { reason: String },

    /// A host callback panicked; the event was still applied
    #[error("{slot} callback panicked: {reason}")]
    CallbackPanicked { slot: String, reason: String },
}

impl DiagnosticKind {
    /// Default severity for this kind of diagnostic
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::ConfigurationMisuse { .. } => Severity::Warning,
            DiagnosticKind::SchemeNotRegistered { .. }
            | DiagnosticKind::ProbeFailed { .. }
            | DiagnosticKind::CallbackPanicked { .. } => Severity::Error,
            DiagnosticKind::InitialLinkQueryFailed { .. } => Severity::Info,
        }
    }
}

/// A single reported diagnostic
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Unique identifier for the diagnostic
    pub id: String,

    /// When the diagnostic was raised
    pub timestamp: DateTime<Utc>,

    pub severity: Severity,

    pub kind: DiagnosticKind,

    /// Human readable description
    pub message: String,
}

impl Diagnostic {
    /// Create a diagnostic with the default severity for its kind
    pub fn new(kind: DiagnosticKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            severity: kind.severity(),
            message: kind.to_string(),
            kind,
        }
    }
}

/// Receives every diagnostic the bridge raises
#[async_trait]
pub trait DiagnosticSink: Send + Sync {
    async fn emit(&self, diagnostic: Diagnostic);
}

/// Default sink: `log` output plus a bounded in-memory history
pub struct DiagnosticsLog {
    config: DiagnosticsConfig,

    history: Arc<RwLock<Vec<Diagnostic>>>,
}

impl DiagnosticsLog {
    /// Create a new diagnostics log with the specified configuration
    pub fn new(config: DiagnosticsConfig) -> Self {
        if config.verbose {
            log::set_max_level(log::LevelFilter::Debug);
        }

        let history = Arc::new(RwLock::new(Vec::with_capacity(config.history_limit.min(64))));

        Self { config, history }
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &DiagnosticsConfig {
        &self.config
    }

    /// Get the diagnostic history, oldest first
    pub async fn history(&self) -> Vec<Diagnostic> {
        self.history.read().await.clone()
    }

    /// Just the kinds, oldest first
    pub async fn kinds(&self) -> Vec<DiagnosticKind> {
        self.history.read().await.iter().map(|d| d.kind.clone()).collect()
    }

    /// Clear the diagnostic history
    pub async fn clear_history(&self) {
        self.history.write().await.clear();
    }

    fn write_console(&self, diagnostic: &Diagnostic) {
        match diagnostic.severity {
            Severity::Info => info!("{}", diagnostic.message),
            Severity::Warning => warn!("{}", diagnostic.message),
            Severity::Error => error!("{}", diagnostic.message),
        }
        if self.config.verbose {
            debug!(
                "Diagnostic {} raised at {}: {:?}",
                diagnostic.id, diagnostic.timestamp, diagnostic.kind
            );
        }
    }
}

impl Default for DiagnosticsLog {
    fn default() -> Self {
        Self::new(DiagnosticsConfig::default())
    }
}

#[async_trait]
impl DiagnosticSink for DiagnosticsLog {
    async fn emit(&self, diagnostic: Diagnostic) {
        if !self.config.enabled {
            return;
        }

        if self.config.console_output {
            self.write_console(&diagnostic);
        }

        let mut history = self.history.write().await;
        history.push(diagnostic);

        if history.len() > self.config.history_limit {
            let excess = history.len() - self.config.history_limit;
            history.drain(..excess);
        }
    }
}

/// Initialise `env_logger`, honouring `RUST_LOG` and falling back to `default_filter`.
///
/// Returns false if a logger was already installed.
pub fn init_logger(default_filter: &str) -> bool {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn misuse(slot: &str) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::ConfigurationMisuse { slot: slot.to_string() })
    }

    #[tokio::test]
    async fn test_history_is_bounded_and_keeps_newest() {
        let log = DiagnosticsLog::new(DiagnosticsConfig {
            history_limit: 2,
            console_output: false,
            ..Default::default()
        });

        log.emit(misuse("a")).await;
        log.emit(misuse("b")).await;
        log.emit(misuse("c")).await;

        let kinds = log.kinds().await;
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::ConfigurationMisuse { slot: "b".into() },
                DiagnosticKind::ConfigurationMisuse { slot: "c".into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_disabled_log_records_nothing() {
        let log = DiagnosticsLog::new(DiagnosticsConfig {
            enabled: false,
            ..Default::default()
        });

        log.emit(misuse("onSettingsUpdate")).await;
        assert!(log.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_history() {
        let log = DiagnosticsLog::default();
        log.emit(misuse("onStartedUpload")).await;
        log.clear_history().await;
        assert!(log.history().await.is_empty());
    }

    #[test]
    fn test_severity_follows_kind() {
        assert_eq!(misuse("x").severity, Severity::Warning);

        let not_registered =
            Diagnostic::new(DiagnosticKind::SchemeNotRegistered { scheme: "demo".into() });
        assert_eq!(not_registered.severity, Severity::Error);
        assert!(not_registered.message.contains("\"demo://\""));

        let initial =
            Diagnostic::new(DiagnosticKind::InitialLinkQueryFailed { reason: "boom".into() });
        assert_eq!(initial.severity.level(), log::Level::Info);

        let panicked = Diagnostic::new(DiagnosticKind::CallbackPanicked {
            slot: "onStartedUpload".into(),
            reason: "boom".into(),
        });
        assert_eq!(panicked.severity, Severity::Error);
        assert_eq!(panicked.message, "onStartedUpload callback panicked: boom");
    }

    #[test]
    fn test_config_defaults_from_empty_json() {
        let config: DiagnosticsConfig = serde_json::from_str("{}").unwrap();
        assert!(config.enabled);
        assert!(config.console_output);
        assert_eq!(config.history_limit, 1000);
        assert!(!config.verbose);

        let log = DiagnosticsLog::new(config);
        assert_eq!(log.config().history_limit, 1000);
    }
}

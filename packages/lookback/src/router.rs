//! Deep-link routing for Lookback Participate
//!
//! `setup` records the scheme, then runs two independent background tasks:
//! a probe that checks the scheme is registered and, if so, subscribes to
//! incoming links, and a query for the URL the app was launched with. Any
//! link that contains the configured scheme is handed to the native layer.

use std::sync::{Arc, Weak};

use futures_util::StreamExt;
use log::{debug, info};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::environment::LinkEnvironment;
use crate::native::NativeBridge;
use crate::Result;

/// Path used when probing whether a scheme can be opened
pub const PROBE_PATH: &str = "testing";

/// The URL probed for `scheme`
pub fn probe_url(scheme: &str) -> String {
    format!("{}://{}", scheme, PROBE_PATH)
}

/// Whether a link should be forwarded under the configured scheme.
///
/// This is a plain substring match, not URL-scheme parsing: `"x-myapp://"`
/// and `"https://host/?s=myapp"` both match `"myapp"`.
pub fn link_matches(scheme: Option<&str>, url: &str) -> bool {
    match scheme {
        Some(scheme) if !scheme.is_empty() => url.contains(scheme),
        _ => false,
    }
}

/// How the scheme probe resolved
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Scheme is registered; incoming links are being routed
    Listening,
    /// Probe answered false; nothing subscribed
    SchemeNotRegistered,
    /// Probe errored; nothing subscribed
    Failed(String),
}

/// What happened to the initial launch URL
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InitialLinkOutcome {
    NoLink,
    Forwarded(String),
    Ignored(String),
    Failed(String),
}

/// Combined result of both setup tasks
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetupReport {
    pub scheme: String,
    pub probe: ProbeOutcome,
    pub initial_link: InitialLinkOutcome,
}

/// Handle on the tasks started by [`DeepLinkRouter::setup`].
///
/// Dropping it leaves both tasks running.
pub struct SetupHandle {
    scheme: String,
    probe: JoinHandle<ProbeOutcome>,
    initial_link: JoinHandle<InitialLinkOutcome>,
}

impl SetupHandle {
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Wait for both the probe and the initial-link query to finish
    pub async fn join(self) -> Result<SetupReport> {
        let (probe, initial_link) = tokio::join!(self.probe, self.initial_link);
        Ok(SetupReport {
            scheme: self.scheme,
            probe: probe?,
            initial_link: initial_link?,
        })
    }
}

struct RouterInner {
    native: Arc<dyn NativeBridge>,
    environment: Arc<dyn LinkEnvironment>,
    diagnostics: Arc<dyn DiagnosticSink>,

    /// Last configured scheme
    scheme: RwLock<Option<String>>,

    /// Live incoming-link subscription
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl RouterInner {
    async fn forward(&self, url: &str) -> bool {
        let scheme = self.scheme.read().await;
        if link_matches(scheme.as_deref(), url) {
            debug!("Forwarding deep link {}", url);
            self.native.open_url(url);
            true
        } else {
            debug!("Ignoring link {}", url);
            false
        }
    }
}

impl Drop for RouterInner {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
    }
}

/// Filters incoming links by the configured scheme
#[derive(Clone)]
pub struct DeepLinkRouter {
    inner: Arc<RouterInner>,
}

impl DeepLinkRouter {
    pub fn new(
        native: Arc<dyn NativeBridge>,
        environment: Arc<dyn LinkEnvironment>,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                native,
                environment,
                diagnostics,
                scheme: RwLock::new(None),
                listener: Mutex::new(None),
            }),
        }
    }

    pub async fn url_scheme(&self) -> Option<String> {
        self.inner.scheme.read().await.clone()
    }

    /// Whether an incoming-link subscription is active
    pub async fn is_listening(&self) -> bool {
        self.inner
            .listener
            .lock()
            .await
            .as_ref()
            .map_or(false, |listener| !listener.is_finished())
    }

    /// Record `scheme`, then probe it and check the launch URL in the background
    pub async fn setup(&self, scheme: &str) -> SetupHandle {
        *self.inner.scheme.write().await = Some(scheme.to_string());
        info!("Lookback Participate scheme set to \"{}\"", scheme);

        let probe = tokio::spawn({
            let router = self.clone();
            let scheme = scheme.to_string();
            async move { router.probe(&scheme).await }
        });

        let initial_link = tokio::spawn({
            let router = self.clone();
            async move { router.forward_initial_link().await }
        });

        SetupHandle {
            scheme: scheme.to_string(),
            probe,
            initial_link,
        }
    }

    /// Forward `url` to the native layer if it matches the configured scheme
    pub async fn handle_open_url(&self, url: &str) -> bool {
        self.inner.forward(url).await
    }

    async fn probe(&self, scheme: &str) -> ProbeOutcome {
        let url = probe_url(scheme);
        match self.inner.environment.can_open_url(&url).await {
            Ok(true) => {
                self.listen().await;
                ProbeOutcome::Listening
            }
            Ok(false) => {
                self.report(DiagnosticKind::SchemeNotRegistered {
                    scheme: scheme.to_string(),
                })
                .await;
                ProbeOutcome::SchemeNotRegistered
            }
            Err(err) => {
                let reason = err.to_string();
                self.report(DiagnosticKind::ProbeFailed {
                    scheme: scheme.to_string(),
                    reason: reason.clone(),
                })
                .await;
                ProbeOutcome::Failed(reason)
            }
        }
    }

    async fn forward_initial_link(&self) -> InitialLinkOutcome {
        match self.inner.environment.initial_url().await {
            Ok(Some(url)) => {
                if self.handle_open_url(&url).await {
                    InitialLinkOutcome::Forwarded(url)
                } else {
                    InitialLinkOutcome::Ignored(url)
                }
            }
            Ok(None) => InitialLinkOutcome::NoLink,
            Err(err) => {
                let reason = err.to_string();
                self.report(DiagnosticKind::InitialLinkQueryFailed { reason: reason.clone() })
                    .await;
                InitialLinkOutcome::Failed(reason)
            }
        }
    }

    /// Subscribe to incoming links, replacing any earlier subscription
    async fn listen(&self) {
        let mut links = self.inner.environment.url_events();
        let router: Weak<RouterInner> = Arc::downgrade(&self.inner);

        let listener = tokio::spawn(async move {
            while let Some(link) = links.next().await {
                match router.upgrade() {
                    Some(router) => {
                        router.forward(&link.url).await;
                    }
                    None => break,
                }
            }
            debug!("Incoming link subscription ended");
        });

        if let Some(previous) = self.inner.listener.lock().await.replace(listener) {
            debug!("Replacing previous incoming link subscription");
            previous.abort();
        }
    }

    async fn report(&self, kind: DiagnosticKind) {
        self.inner.diagnostics.emit(Diagnostic::new(kind)).await;
    }
}

//! In-memory doubles for the native SDK and the host environment
//!
//! Useful for exercising the façade without a device: [`MockNativeBridge`]
//! records every outbound call, [`MockEnvironment`] answers probes and
//! launch-URL queries from canned responses and lets tests push links.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::sync::{mpsc, watch};

use crate::environment::{IncomingLink, LinkEnvironment};
use crate::native::NativeBridge;
use crate::settings::SettingsSnapshot;
use crate::{Error, Result};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An outbound call recorded by [`MockNativeBridge`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NativeCall {
    SetupWithAppToken(String),
    OpenUrl(String),
    Recording(bool),
    Paused(bool),
    ShowIntroductionDialogs(bool),
    RecorderVisible(bool),
    FeedbackBubbleVisible(bool),
    ShakeToRecord(bool),
}

/// Records calls instead of talking to a native SDK
pub struct MockNativeBridge {
    settings: SettingsSnapshot,
    calls: Mutex<Vec<NativeCall>>,
    opened: watch::Sender<usize>,
}

impl MockNativeBridge {
    /// A bridge whose initial settings are `settings`
    pub fn with_settings(settings: SettingsSnapshot) -> Self {
        let (opened, _) = watch::channel(0);
        Self {
            settings,
            calls: Mutex::new(Vec::new()),
            opened,
        }
    }

    pub fn calls(&self) -> Vec<NativeCall> {
        lock(&self.calls).clone()
    }

    /// URLs passed to `open_url`, in order
    pub fn opened_urls(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                NativeCall::OpenUrl(url) => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    /// Wait until at least `count` URLs were opened or `timeout` passes, then return them
    pub async fn wait_for_opened(&self, count: usize, timeout: Duration) -> Vec<String> {
        let mut opened = self.opened.subscribe();
        let reached = tokio::time::timeout(timeout, opened.wait_for(|n| *n >= count))
            .await
            .is_ok();
        if !reached {
            log::debug!("Timed out waiting for {} opened URLs", count);
        }
        self.opened_urls()
    }

    fn record(&self, call: NativeCall) {
        lock(&self.calls).push(call);
    }
}

impl Default for MockNativeBridge {
    fn default() -> Self {
        Self::with_settings(SettingsSnapshot::new())
    }
}

impl NativeBridge for MockNativeBridge {
    fn initial_settings(&self) -> SettingsSnapshot {
        self.settings.clone()
    }

    fn setup_with_app_token(&self, token: &str) {
        self.record(NativeCall::SetupWithAppToken(token.to_string()));
    }

    fn open_url(&self, url: &str) {
        self.record(NativeCall::OpenUrl(url.to_string()));
        self.opened.send_modify(|n| *n += 1);
    }

    fn set_recording(&self, recording: bool) {
        self.record(NativeCall::Recording(recording));
    }

    fn set_paused(&self, paused: bool) {
        self.record(NativeCall::Paused(paused));
    }

    fn set_show_introduction_dialogs(&self, show: bool) {
        self.record(NativeCall::ShowIntroductionDialogs(show));
    }

    fn set_recorder_visible(&self, visible: bool) {
        self.record(NativeCall::RecorderVisible(visible));
    }

    fn set_feedback_bubble_visible(&self, visible: bool) {
        self.record(NativeCall::FeedbackBubbleVisible(visible));
    }

    fn set_shake_to_record(&self, enabled: bool) {
        self.record(NativeCall::ShakeToRecord(enabled));
    }
}

/// Canned answers for probes and launch-URL queries, plus a link emitter
pub struct MockEnvironment {
    probe: std::result::Result<bool, String>,
    initial_url: std::result::Result<Option<String>, String>,
    probed: Mutex<Vec<String>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<IncomingLink>>>,
}

impl MockEnvironment {
    /// Every scheme is openable and there is no launch URL
    pub fn new() -> Self {
        Self {
            probe: Ok(true),
            initial_url: Ok(None),
            probed: Mutex::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn openable(mut self, openable: bool) -> Self {
        self.probe = Ok(openable);
        self
    }

    pub fn failing_probe(mut self, reason: impl Into<String>) -> Self {
        self.probe = Err(reason.into());
        self
    }

    pub fn with_initial_url(mut self, url: impl Into<String>) -> Self {
        self.initial_url = Ok(Some(url.into()));
        self
    }

    pub fn with_failing_initial_url(mut self, reason: impl Into<String>) -> Self {
        self.initial_url = Err(reason.into());
        self
    }

    /// URLs passed to `can_open_url`
    pub fn probed_urls(&self) -> Vec<String> {
        lock(&self.probed).clone()
    }

    /// Number of live link subscriptions
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }

    /// Deliver a link to every live subscriber; returns how many received it
    pub fn emit_url(&self, url: &str) -> usize {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|tx| tx.send(IncomingLink::new(url)).is_ok());
        subscribers.len()
    }
}

impl Default for MockEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LinkEnvironment for MockEnvironment {
    async fn can_open_url(&self, url: &str) -> Result<bool> {
        lock(&self.probed).push(url.to_string());
        self.probe.clone().map_err(Error::environment)
    }

    async fn initial_url(&self) -> Result<Option<String>> {
        self.initial_url.clone().map_err(Error::environment)
    }

    fn url_events(&self) -> BoxStream<'static, IncomingLink> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.subscribers).push(tx);
        stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|link| (link, rx)) }).boxed()
    }
}

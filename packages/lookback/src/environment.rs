//! The host environment's deep-link facilities

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::Result;

/// A link delivered by the environment's "open URL" notification
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingLink {
    pub url: String,
}

impl IncomingLink {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Deep-link plumbing provided by the host platform
#[async_trait]
pub trait LinkEnvironment: Send + Sync {
    /// Whether a URL like this could be opened by the application
    async fn can_open_url(&self, url: &str) -> Result<bool>;

    /// The URL the process was launched with, if any
    async fn initial_url(&self) -> Result<Option<String>>;

    /// Subscribe to incoming links. Dropping the stream unsubscribes.
    fn url_events(&self) -> BoxStream<'static, IncomingLink>;
}

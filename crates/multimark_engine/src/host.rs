use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::{Request, Response};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TabId(pub u32);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// Nothing in the tab listens for messages yet (or any more).
    #[error("no receiver in {0}")]
    NoReceiver(TabId),
    #[error("scripting is not allowed on {url}")]
    Restricted { url: String },
    #[error("{0} does not exist")]
    TabNotFound(TabId),
    #[error("message could not be delivered: {0}")]
    Malformed(String),
}

/// Browser primitives the injection coordinator depends on.
#[async_trait]
pub trait TabHost: Send + Sync {
    async fn tab_info(&self, tab: TabId) -> Result<TabInfo, HostError>;

    /// Delivers `request` to the engine running in `tab` and waits for its reply.
    async fn send_message(&self, tab: TabId, request: &Request) -> Result<Response, HostError>;

    async fn insert_css(&self, tab: TabId) -> Result<(), HostError>;

    /// Starts the document engine in `tab`. A no-op when one is already live
    /// or starting.
    async fn execute_script(&self, tab: TabId) -> Result<(), HostError>;
}

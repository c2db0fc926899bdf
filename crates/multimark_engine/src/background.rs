//! Long-lived background context: acknowledges engines, records committed
//! searches and resolves keyboard commands.

use engine_logging::{engine_debug, engine_info, engine_warn, LogContext};
use multimark_core::is_restricted_url;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::host::{TabId, TabInfo};
use crate::log_store::{LogStore, StorageError};
use crate::protocol::{MessageHandler, Request, Response, Status};

const CTX: LogContext = LogContext::Background;

/// One-way channel from a page context to the background.
pub trait BackgroundLink: Send + Sync {
    fn notify(&self, sender: TabId, request: Request);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Command {
    ActivateSearch,
    ToggleSearch,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::ActivateSearch => "activate-search",
            Command::ToggleSearch => "toggle-search",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "activate-search" => Some(Command::ActivateSearch),
            "toggle-search" => Some(Command::ToggleSearch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Ignored,
    OpenSurface { tab: TabId, focus_input: bool },
}

#[derive(Debug, Clone)]
pub struct Background {
    store: LogStore,
}

impl Background {
    pub fn new(store: LogStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &LogStore {
        &self.store
    }

    /// Starts the audit log from scratch.
    pub fn on_installed(&self) -> Result<(), StorageError> {
        engine_info!(ctx: CTX, "installed; resetting search log");
        self.store.reset()
    }

    pub fn on_command(&self, command: Command, active: Option<&TabInfo>) -> CommandOutcome {
        let Some(tab) = active else {
            engine_debug!(ctx: CTX, "{} without an active tab", command.as_str());
            return CommandOutcome::Ignored;
        };
        match command {
            Command::ActivateSearch if is_restricted_url(&tab.url) => {
                engine_info!(ctx: CTX, "ignoring {} on {}", command.as_str(), tab.url);
                CommandOutcome::Ignored
            }
            Command::ActivateSearch => CommandOutcome::OpenSurface {
                tab: tab.id,
                focus_input: true,
            },
            Command::ToggleSearch => CommandOutcome::OpenSurface {
                tab: tab.id,
                focus_input: false,
            },
        }
    }
}

impl MessageHandler for Background {
    fn handle(&mut self, sender: Option<TabId>, request: Request) -> Response {
        match request {
            Request::ContentScriptLoaded => {
                match sender {
                    Some(tab) => engine_info!(ctx: CTX, "engine ready in {tab}"),
                    None => engine_info!(ctx: CTX, "engine ready"),
                }
                Response::status(Status::Acknowledged)
            }
            Request::LogSearch { search_log } => {
                let query = search_log.query.clone();
                if let Err(err) = self.store.append(search_log) {
                    engine_warn!(ctx: CTX, "could not record search {:?}: {err}", query);
                }
                Response::status(Status::Logged)
            }
            other => Response::unsupported(&other),
        }
    }
}

struct Envelope {
    sender: Option<TabId>,
    request: Request,
    reply: Option<oneshot::Sender<Response>>,
}

/// Handle to a [`Background`] running on its own task.
#[derive(Debug, Clone)]
pub struct BackgroundHandle {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl BackgroundHandle {
    /// Spawns the background loop onto the current tokio runtime.
    pub fn spawn(mut background: Background) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let response = background.handle(envelope.sender, envelope.request);
                if let Some(reply) = envelope.reply {
                    let _ = reply.send(response);
                }
            }
            engine_debug!(ctx: CTX, "background loop stopped");
        });
        Self { tx }
    }

    /// Sends `request` and waits for the reply. `None` once the loop is gone.
    pub async fn request(&self, sender: Option<TabId>, request: Request) -> Option<Response> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                sender,
                request,
                reply: Some(reply),
            })
            .ok()?;
        rx.await.ok()
    }
}

impl BackgroundLink for BackgroundHandle {
    fn notify(&self, sender: TabId, request: Request) {
        let envelope = Envelope {
            sender: Some(sender),
            request,
            reply: None,
        };
        if self.tx.send(envelope).is_err() {
            engine_warn!(ctx: CTX, "background gone; dropped message from {sender}");
        }
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("sender", &self.sender)
            .field("action", &self.request.action())
            .finish()
    }
}

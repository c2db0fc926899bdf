use engine_logging::{engine_debug, LogContext};
use tokio::sync::{mpsc, oneshot};

use crate::engine::DocumentEngine;
use crate::host::TabId;
use crate::transport::handle_json;

struct EngineCommand {
    payload: String,
    reply: oneshot::Sender<String>,
}

/// Handle to a [`DocumentEngine`] running on its own task. The engine handles
/// one JSON message at a time; dropping every handle stops it.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tab: TabId,
    cmd_tx: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    /// Spawns `engine` onto the current tokio runtime and announces it.
    pub fn spawn(tab: TabId, mut engine: DocumentEngine) -> Self {
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<EngineCommand>(32);
        engine.announce();
        tokio::spawn(async move {
            while let Some(command) = cmd_rx.recv().await {
                let reply = handle_json(&mut engine, None, &command.payload);
                let _ = command.reply.send(reply);
            }
            engine_debug!(ctx: LogContext::Engine, "engine for {tab} unloaded");
        });
        Self { tab, cmd_tx }
    }

    pub fn tab(&self) -> TabId {
        self.tab
    }

    pub fn is_alive(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    /// Sends a JSON request and waits for the JSON reply. `None` when the
    /// engine is gone.
    pub async fn dispatch(&self, payload: String) -> Option<String> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(EngineCommand { payload, reply })
            .await
            .ok()?;
        rx.await.ok()
    }
}

impl std::fmt::Debug for EngineCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineCommand")
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

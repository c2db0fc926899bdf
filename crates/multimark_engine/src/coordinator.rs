//! Query-surface side of the engine connection: makes sure a document engine
//! is listening in the tab before any request goes out.

use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn, LogContext};
use multimark_core::{
    is_restricted_url, Direction, EngineFailure, InjectionState, InjectionStatus, ProbeVerdict,
    ThemeId,
};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::host::{HostError, TabHost, TabId};
use crate::protocol::{
    ClearScope, NavigateReply, ProtocolError, Request, Response, SearchReply, Status, TermsReply,
};

const CTX: LogContext = LogContext::Surface;

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Wait between injecting the engine and probing it again.
    pub settle_delay: Duration,
    pub max_attempts: u32,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(100),
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("scripting is not allowed on this page")]
    RestrictedTarget,
    #[error("engine did not respond after {attempts} injection attempts")]
    InjectionExhausted { attempts: u32 },
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl CoordinatorError {
    /// How the query surface should present this error, if it is fatal for
    /// the current page.
    pub fn failure(&self) -> EngineFailure {
        match self {
            CoordinatorError::RestrictedTarget => EngineFailure::RestrictedTarget,
            CoordinatorError::InjectionExhausted { .. } => EngineFailure::InjectionExhausted,
            CoordinatorError::Host(_) | CoordinatorError::Protocol(_) => {
                EngineFailure::Disconnected
            }
        }
    }
}

pub struct InjectionCoordinator<H: TabHost> {
    host: Arc<H>,
    tab: TabId,
    settings: CoordinatorSettings,
    state: Mutex<InjectionState>,
}

impl<H: TabHost> InjectionCoordinator<H> {
    pub fn new(host: Arc<H>, tab: TabId, settings: CoordinatorSettings) -> Self {
        Self {
            host,
            tab,
            settings,
            state: Mutex::new(InjectionState::new()),
        }
    }

    pub fn tab(&self) -> TabId {
        self.tab
    }

    pub async fn status(&self) -> InjectionStatus {
        self.state.lock().await.status()
    }

    /// Probes the tab, injecting the engine when nothing answers.
    ///
    /// Callers are serialised on the state lock, so a caller arriving while
    /// another one injects observes `Ready` afterwards instead of injecting
    /// again.
    pub async fn ensure_ready(&self) -> Result<(), CoordinatorError> {
        let mut state = self.state.lock().await;
        if state.is_ready() {
            return Ok(());
        }

        let info = self.host.tab_info(self.tab).await?;
        if is_restricted_url(&info.url) {
            state.mark_failed();
            return Err(CoordinatorError::RestrictedTarget);
        }
        if state.status() == InjectionStatus::Failed {
            return Err(CoordinatorError::InjectionExhausted {
                attempts: state.retry_count(),
            });
        }

        loop {
            state.begin_probe();
            match self.host.send_message(self.tab, &Request::Ping).await {
                Ok(Response::Status(reply)) if reply.status == Status::Ok => {
                    engine_debug!(ctx: CTX, "engine in {} is ready", self.tab);
                    state.mark_ready();
                    return Ok(());
                }
                Ok(other) => {
                    state.mark_failed();
                    return Err(ProtocolError::UnexpectedResponse {
                        expected: "ping",
                        found: format!("{other:?}"),
                    }
                    .into());
                }
                Err(HostError::NoReceiver(_)) => {
                    match state.probe_failed(self.settings.max_attempts) {
                        ProbeVerdict::Inject { attempt } => {
                            engine_info!(
                                ctx: CTX,
                                "no engine in {}; injecting (attempt {attempt})",
                                self.tab
                            );
                            if let Err(err) = self.inject().await {
                                state.reset();
                                return Err(err.into());
                            }
                            tokio::time::sleep(self.settings.settle_delay).await;
                        }
                        ProbeVerdict::Exhausted { attempts } => {
                            engine_warn!(
                                ctx: CTX,
                                "giving up on {} after {attempts} injections",
                                self.tab
                            );
                            return Err(CoordinatorError::InjectionExhausted { attempts });
                        }
                    }
                }
                Err(HostError::Restricted { .. }) => {
                    state.mark_failed();
                    return Err(CoordinatorError::RestrictedTarget);
                }
                Err(err) => {
                    state.reset();
                    return Err(err.into());
                }
            }
        }
    }

    async fn inject(&self) -> Result<(), HostError> {
        self.host.insert_css(self.tab).await?;
        self.host.execute_script(self.tab).await
    }

    /// Sends `request` once the engine is ready. A delivery failure resets the
    /// readiness state and the request is retried once after re-probing.
    pub async fn send(&self, request: Request) -> Result<Response, CoordinatorError> {
        self.ensure_ready().await?;
        self.check_target().await?;
        match self.host.send_message(self.tab, &request).await {
            Ok(response) => Ok(response),
            Err(HostError::NoReceiver(_)) => {
                engine_info!(
                    ctx: CTX,
                    "engine in {} went away during {}; reconnecting",
                    self.tab,
                    request.action()
                );
                self.state.lock().await.reset();
                self.ensure_ready().await?;
                self.host
                    .send_message(self.tab, &request)
                    .await
                    .map_err(host_failure)
            }
            Err(err) => Err(host_failure(err)),
        }
    }

    /// Rejects the tab locally when it has moved to a page scripts may not
    /// touch since it was last found ready.
    async fn check_target(&self) -> Result<(), CoordinatorError> {
        let info = self.host.tab_info(self.tab).await?;
        if is_restricted_url(&info.url) {
            engine_debug!(ctx: CTX, "{} now shows restricted {}", self.tab, info.url);
            // Whatever engine was there went away with the old page.
            self.state.lock().await.reset();
            return Err(CoordinatorError::RestrictedTarget);
        }
        Ok(())
    }

    pub async fn search(
        &self,
        query: &str,
        persist: bool,
        theme: Option<ThemeId>,
    ) -> Result<SearchReply, CoordinatorError> {
        let request = Request::Search {
            query: query.to_string(),
            persist,
            theme,
        };
        Ok(self.send(request).await?.into_search()?)
    }

    pub async fn navigate(&self, direction: Direction) -> Result<NavigateReply, CoordinatorError> {
        Ok(self
            .send(Request::Navigate { direction })
            .await?
            .into_navigate()?)
    }

    pub async fn terms(&self) -> Result<TermsReply, CoordinatorError> {
        Ok(self.send(Request::GetSearchTerms).await?.into_terms()?)
    }

    /// Returns whether a term existed at `index`.
    pub async fn remove_term(&self, index: usize) -> Result<bool, CoordinatorError> {
        let status = self
            .send(Request::RemoveSearchTerm { index })
            .await?
            .into_status()?;
        Ok(status == Status::Removed)
    }

    pub async fn clear(&self, scope: ClearScope) -> Result<(), CoordinatorError> {
        self.send(Request::ClearHighlights { scope })
            .await?
            .into_status()?;
        Ok(())
    }
}

fn host_failure(err: HostError) -> CoordinatorError {
    match err {
        HostError::Restricted { .. } => CoordinatorError::RestrictedTarget,
        other => CoordinatorError::Host(other),
    }
}

impl<H: TabHost> std::fmt::Debug for InjectionCoordinator<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InjectionCoordinator")
            .field("tab", &self.tab)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

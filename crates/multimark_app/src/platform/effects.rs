use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_warn, LogContext};
use multimark_core::{Effect, HistoryRow, Msg};
use multimark_engine::{CoordinatorError, InjectionCoordinator, LogStore, SimulatedBrowser};
use tokio::sync::mpsc;

use super::app::AppEvent;
use super::settings::AppSettings;

const CTX: LogContext = LogContext::Surface;

/// Executes surface effects on the runtime and feeds their outcome back as
/// messages.
///
/// Requests for the page go through a single queue, so the engine sees them
/// in the order the surface issued them. Timers and history reads run on
/// their own.
pub(crate) struct EffectRunner {
    engine_tx: mpsc::UnboundedSender<Effect>,
    store: LogStore,
    debounce: Duration,
    history_rows: usize,
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl EffectRunner {
    pub(crate) fn new(
        coordinator: Arc<InjectionCoordinator<SimulatedBrowser>>,
        store: LogStore,
        settings: &AppSettings,
        tx: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        tokio::spawn(drive_engine(coordinator, engine_rx, tx.clone()));
        Self {
            engine_tx,
            store,
            debounce: settings.debounce(),
            history_rows: settings.history_rows,
            tx,
        }
    }

    pub(crate) fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            engine_debug!(ctx: CTX, "effect {:?}", effect);
            match effect {
                Effect::ScheduleDebounce { seq } => {
                    let debounce = self.debounce;
                    let tx = self.tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(debounce).await;
                        let _ = tx.send(AppEvent::Surface(Msg::DebounceElapsed { seq }));
                    });
                }
                Effect::LoadHistory => {
                    let msg = load_history(&self.store, self.history_rows);
                    let _ = self.tx.send(AppEvent::Surface(msg));
                }
                engine_bound => {
                    if self.engine_tx.send(engine_bound).is_err() {
                        engine_warn!(ctx: CTX, "engine queue closed; effect dropped");
                    }
                }
            }
        }
    }
}

async fn drive_engine(
    coordinator: Arc<InjectionCoordinator<SimulatedBrowser>>,
    mut effects: mpsc::UnboundedReceiver<Effect>,
    tx: mpsc::UnboundedSender<AppEvent>,
) {
    while let Some(effect) = effects.recv().await {
        let msg = execute(effect, &coordinator).await;
        if tx.send(AppEvent::Surface(msg)).is_err() {
            break;
        }
    }
}

async fn execute(effect: Effect, coordinator: &InjectionCoordinator<SimulatedBrowser>) -> Msg {
    match effect {
        Effect::EnsureReady => match coordinator.ensure_ready().await {
            Ok(()) => Msg::EngineReady,
            Err(err) => failed("connect", err),
        },
        Effect::SendSearch {
            request_id,
            query,
            persist,
            theme,
        } => match coordinator.search(&query, persist, theme).await {
            Ok(reply) => Msg::SearchCompleted {
                request_id,
                persist,
                result: reply.into_result(),
            },
            Err(err) => failed("search", err),
        },
        Effect::SendNavigate { direction } => match coordinator.navigate(direction).await {
            Ok(reply) => Msg::NavigateCompleted {
                match_count: reply.match_count,
                current_match: reply.current_match,
            },
            Err(err) => failed("navigate", err),
        },
        Effect::RemoveTerm { index } => match coordinator.remove_term(index).await {
            Ok(removed) => Msg::TermRemoved { index, removed },
            Err(err) => failed("remove term", err),
        },
        Effect::FetchTerms => match coordinator.terms().await {
            Ok(reply) => Msg::TermsLoaded {
                terms: reply.terms,
                next_theme: reply.next_theme,
            },
            Err(err) => failed("list terms", err),
        },
        Effect::ScheduleDebounce { .. } | Effect::LoadHistory => Msg::NoOp,
    }
}

fn load_history(store: &LogStore, history_rows: usize) -> Msg {
    match store.entries() {
        Ok(entries) => {
            let skip = entries.len().saturating_sub(history_rows);
            Msg::HistoryLoaded(
                entries
                    .into_iter()
                    .skip(skip)
                    .map(|entry| HistoryRow {
                        timestamp: entry.timestamp,
                        query: entry.query,
                        match_count: entry.match_count,
                    })
                    .collect(),
            )
        }
        Err(err) => {
            engine_warn!(ctx: CTX, "search history unavailable: {err}");
            Msg::NoOp
        }
    }
}

fn failed(action: &str, err: CoordinatorError) -> Msg {
    engine_warn!(ctx: CTX, "{action} failed: {err}");
    Msg::EngineFailed(err.failure())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use multimark_core::{Direction, Effect, Msg};
    use multimark_engine::{
        InjectionCoordinator, LogStore, LogStoreSettings, MemoryStorage, SimulatedBrowser,
    };
    use tokio::sync::mpsc;

    use super::super::app::AppEvent;
    use super::super::settings::AppSettings;
    use super::EffectRunner;

    fn search(request_id: u64, query: &str, persist: bool) -> Effect {
        Effect::SendSearch {
            request_id,
            query: query.to_string(),
            persist,
            theme: None,
        }
    }

    async fn next_msg(rx: &mut mpsc::UnboundedReceiver<AppEvent>) -> Msg {
        match rx.recv().await {
            Some(AppEvent::Surface(msg)) => msg,
            other => panic!("expected a surface message, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn page_requests_reach_the_engine_in_issue_order() {
        let settings = AppSettings::default();
        let browser = Arc::new(SimulatedBrowser::new(settings.browser()));
        let tab = browser.open_tab("https://example.com/mats", "<p>cat sat on the mat</p>");
        let coordinator = Arc::new(InjectionCoordinator::new(
            browser.clone(),
            tab,
            settings.coordinator(),
        ));
        let store = LogStore::new(Arc::new(MemoryStorage::new()), LogStoreSettings::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let runner = EffectRunner::new(coordinator, store, &settings, tx);

        runner.enqueue(vec![search(1, "", false)]);
        runner.enqueue(vec![search(2, "cat", true)]);
        runner.enqueue(vec![Effect::SendNavigate {
            direction: Direction::Next,
        }]);

        let mut ids = Vec::new();
        for _ in 0..2 {
            match next_msg(&mut rx).await {
                Msg::SearchCompleted { request_id, .. } => ids.push(request_id),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(ids, vec![1, 2]);
        // The commit, not the earlier empty preview, is what navigation walks.
        assert_eq!(
            next_msg(&mut rx).await,
            Msg::NavigateCompleted {
                match_count: 1,
                current_match: 1
            }
        );
    }
}

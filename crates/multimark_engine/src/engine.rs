//! The document engine: one instance per loaded page, owning every highlight
//! in it.

use std::fmt;
use std::sync::Arc;

use engine_logging::{engine_debug, engine_info, engine_warn, LogContext};
use multimark_core::{Direction, TermView, ThemeId};

use crate::background::BackgroundLink;
use crate::highlight::{mark_current, scan, unwrap_highlights, HighlightArena, HighlightId};
use crate::host::TabId;
use crate::log_store::SearchLogEntry;
use crate::page::{LivePage, PageDocument};
use crate::protocol::{
    ClearScope, MessageHandler, NavigateReply, Request, Response, SearchReply, Status, TermsReply,
};
use crate::session::SearchSession;

const CTX: LogContext = LogContext::Engine;

/// Source of log-entry timestamps.
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

#[derive(Clone)]
pub struct EngineConfig {
    pub clock: Clock,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            clock: Arc::new(|| chrono::Utc::now().to_rfc3339()),
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig").finish_non_exhaustive()
    }
}

pub struct DocumentEngine {
    tab: TabId,
    page: LivePage,
    session: SearchSession,
    highlights: HighlightArena,
    background: Option<Arc<dyn BackgroundLink>>,
    config: EngineConfig,
}

impl DocumentEngine {
    pub fn new(tab: TabId, page: LivePage, config: EngineConfig) -> Self {
        Self {
            tab,
            page,
            session: SearchSession::new(),
            highlights: HighlightArena::default(),
            background: None,
            config,
        }
    }

    pub fn with_background(mut self, background: Arc<dyn BackgroundLink>) -> Self {
        self.background = Some(background);
        self
    }

    pub fn page(&self) -> &LivePage {
        &self.page
    }

    /// Tells the background this page now has a live engine.
    pub fn announce(&self) {
        engine_info!(ctx: CTX, "engine started in {} ({})", self.tab, self.page.url());
        if let Some(background) = &self.background {
            background.notify(self.tab, Request::ContentScriptLoaded);
        }
    }

    /// Scans the page for `query`.
    ///
    /// Transient highlights from the previous scan are always removed first.
    /// A persistent search that would exceed the term cap, or repeat a
    /// committed term, is rejected without touching the page.
    pub fn search(&mut self, query: &str, persist: bool, theme: Option<ThemeId>) -> SearchReply {
        if persist && !query.is_empty() && !self.session.can_commit(query) {
            engine_info!(
                ctx: CTX,
                "rejecting term {:?}: {} terms held",
                query,
                self.session.term_count()
            );
            return SearchReply::limit_reached();
        }

        let previous = self.session.current();
        let session = &mut self.session;
        let arena = &mut self.highlights;
        let stale = session.take_transient();
        let scanned = self.page.write(|doc| {
            unwrap_highlights(doc, arena, &stale);
            if query.is_empty() {
                return None;
            }
            let theme = theme.unwrap_or_else(|| session.next_theme());
            Some(scan(doc, arena, query, theme).map(|ids| (ids, theme)))
        });

        let (ids, theme) = match scanned {
            Some(Ok(found)) => found,
            outcome => {
                if let Some(Err(err)) = outcome {
                    engine_warn!(ctx: CTX, "scan for {:?} aborted: {err}", query);
                }
                self.session.set_transient(Vec::new());
                self.focus(previous);
                return self.search_reply();
            }
        };
        let match_count = ids.len();
        if persist {
            let index = self.session.commit(query, theme, ids);
            engine_info!(
                ctx: CTX,
                "committed term #{} {:?} ({}) with {} matches",
                index + 1,
                query,
                theme,
                match_count
            );
            self.log_commit(query, match_count);
        } else {
            engine_debug!(ctx: CTX, "preview {:?}: {} matches", query, match_count);
            self.session.set_transient(ids);
        }
        self.focus(previous);
        self.search_reply()
    }

    pub fn navigate(&mut self, direction: Direction) -> NavigateReply {
        if let Some((previous, _)) = self.session.step(direction) {
            self.focus(Some(previous));
            engine_debug!(
                ctx: CTX,
                "moved {} to match {} of {}",
                direction.as_str(),
                self.session.current_match(),
                self.session.match_count()
            );
        }
        NavigateReply {
            match_count: self.session.match_count(),
            current_match: self.session.current_match(),
        }
    }

    pub fn clear(&mut self, scope: ClearScope) {
        let ids = match scope {
            ClearScope::Transient => self.session.take_transient(),
            ClearScope::All => self.session.clear_all(),
        };
        self.unwrap_all(&ids);
    }

    /// Removes the committed term at `index` together with its highlights.
    pub fn remove_term(&mut self, index: usize) -> bool {
        match self.session.remove(index) {
            Some(term) => {
                engine_info!(ctx: CTX, "removed term {:?}", term.query);
                self.unwrap_all(&term.highlights);
                true
            }
            None => false,
        }
    }

    pub fn terms(&self) -> Vec<TermView> {
        self.session.terms()
    }

    /// Theme the next persistent commit takes when the request names none.
    pub fn next_theme(&self) -> ThemeId {
        self.session.next_theme()
    }

    fn unwrap_all(&mut self, ids: &[HighlightId]) {
        let arena = &mut self.highlights;
        self.page.write(|doc| unwrap_highlights(doc, arena, ids));
    }

    /// Moves the current-match styling from `previous` to the session's
    /// current highlight and scrolls it into view.
    fn focus(&mut self, previous: Option<HighlightId>) {
        let current = self.session.current();
        let arena = &self.highlights;
        self.page.write(|doc: &mut PageDocument| {
            if let Some(previous) = previous {
                mark_current(doc, arena, previous, false);
            }
            if let Some(current) = current {
                mark_current(doc, arena, current, true);
            }
        });
    }

    fn search_reply(&self) -> SearchReply {
        let match_count = self.session.match_count();
        SearchReply {
            match_count,
            current_match: (match_count > 0).then(|| self.session.current_match()),
            search_limit_reached: false,
        }
    }

    fn log_commit(&self, query: &str, match_count: usize) {
        let Some(background) = &self.background else {
            return;
        };
        let entry = SearchLogEntry {
            timestamp: (self.config.clock)(),
            query: query.to_string(),
            match_count,
            url: self.page.url(),
            title: self.page.title(),
        };
        background.notify(self.tab, Request::LogSearch { search_log: entry });
    }
}

impl MessageHandler for DocumentEngine {
    fn handle(&mut self, _sender: Option<TabId>, request: Request) -> Response {
        match request {
            Request::Ping => Response::status(Status::Ok),
            Request::Search {
                query,
                persist,
                theme,
            } => Response::Search(self.search(&query, persist, theme)),
            Request::Navigate { direction } => Response::Navigate(self.navigate(direction)),
            Request::GetSearchTerms => Response::Terms(TermsReply {
                terms: self.terms(),
                next_theme: self.next_theme(),
            }),
            Request::RemoveSearchTerm { index } => {
                if self.remove_term(index) {
                    Response::status(Status::Removed)
                } else {
                    Response::status(Status::NotFound)
                }
            }
            Request::ClearHighlights { scope } => {
                self.clear(scope);
                Response::status(Status::Cleared)
            }
            other @ (Request::LogSearch { .. } | Request::ContentScriptLoaded) => {
                Response::unsupported(&other)
            }
        }
    }
}

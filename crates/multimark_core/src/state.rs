use crate::view_model::{SurfaceViewModel, TermRowView};
use crate::{
    EngineFailure, HistoryRow, SearchResult, TermView, ThemeCursor, ThemeId, MAX_TERMS,
};

/// Identifier attached to every search the surface dispatches.
pub type RequestId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceStatus {
    #[default]
    Closed,
    Connecting,
    Ready,
    Disabled(EngineFailure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingCommit {
    request_id: RequestId,
    input_seq: u64,
}

/// Query surface state for one tab. Dropped when the surface closes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SurfaceState {
    status: SurfaceStatus,
    tab_url: Option<String>,
    input: String,
    input_seq: u64,
    next_request_id: RequestId,
    latest_search: Option<RequestId>,
    pending_commit: Option<PendingCommit>,
    stats: Option<(usize, usize)>,
    limit_reached: bool,
    terms: Vec<TermView>,
    theme_cursor: ThemeCursor,
    history: Vec<HistoryRow>,
    dirty: bool,
}

impl SurfaceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> SurfaceStatus {
        self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status == SurfaceStatus::Ready
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn input_seq(&self) -> u64 {
        self.input_seq
    }

    pub fn theme_cursor(&self) -> ThemeCursor {
        self.theme_cursor
    }

    pub fn terms(&self) -> &[TermView] {
        &self.terms
    }

    pub fn view(&self) -> SurfaceViewModel {
        let input_enabled = matches!(
            self.status,
            SurfaceStatus::Connecting | SurfaceStatus::Ready
        );
        let placeholder = match self.status {
            SurfaceStatus::Disabled(EngineFailure::RestrictedTarget) => {
                "Cannot search in browser system pages"
            }
            SurfaceStatus::Disabled(EngineFailure::InjectionExhausted) => {
                "Search is unavailable on this page. Try reloading it."
            }
            SurfaceStatus::Disabled(EngineFailure::Disconnected) => {
                "Lost connection to the page. Reopen search to retry."
            }
            SurfaceStatus::Connecting => "Connecting to page...",
            SurfaceStatus::Ready | SurfaceStatus::Closed => "Search this page",
        };
        let stats_text = match self.stats {
            Some((count, current)) if count > 0 => format!("{current} of {count}"),
            Some(_) => "No matches".to_string(),
            None => String::new(),
        };
        let match_count = self.stats.map(|(count, _)| count).unwrap_or(0);
        let limit_notice = self
            .limit_reached
            .then(|| format!("Maximum of {MAX_TERMS} search terms reached"));

        SurfaceViewModel {
            status: self.status,
            tab_url: self.tab_url.clone(),
            input: self.input.clone(),
            input_enabled,
            placeholder: placeholder.to_string(),
            stats_text,
            nav_enabled: self.is_ready() && match_count > 0,
            terms: self
                .terms
                .iter()
                .enumerate()
                .map(|(index, term)| TermRowView {
                    index,
                    query: term.query.clone(),
                    theme: term.theme,
                })
                .collect(),
            slots_left: MAX_TERMS.saturating_sub(self.terms.len()),
            next_theme: self.theme_cursor.current(),
            limit_notice,
            history: self.history.clone(),
            dirty: self.dirty,
        }
    }

    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn open(&mut self, url: String) {
        *self = Self::default();
        self.tab_url = Some(url);
        self.dirty = true;
    }

    pub(crate) fn set_status(&mut self, status: SurfaceStatus) {
        if self.status != status {
            self.status = status;
            self.dirty = true;
        }
    }

    pub(crate) fn disable(&mut self, failure: EngineFailure) {
        self.set_status(SurfaceStatus::Disabled(failure));
        self.stats = None;
        self.latest_search = None;
        self.pending_commit = None;
    }

    /// Records a keystroke; returns the sequence number the debounce must match.
    pub(crate) fn edit_input(&mut self, text: String) -> u64 {
        self.input = text;
        self.input_seq += 1;
        self.dirty = true;
        self.input_seq
    }

    pub(crate) fn begin_search(&mut self) -> RequestId {
        self.next_request_id += 1;
        self.latest_search = Some(self.next_request_id);
        self.next_request_id
    }

    /// Starts a persistent commit unless one is already in flight.
    pub(crate) fn begin_commit(&mut self) -> Option<RequestId> {
        if self.pending_commit.is_some() {
            return None;
        }
        // Supersede any debounce still pending for the text being committed.
        self.input_seq += 1;
        let request_id = self.begin_search();
        self.pending_commit = Some(PendingCommit {
            request_id,
            input_seq: self.input_seq,
        });
        Some(request_id)
    }

    pub(crate) fn is_latest_search(&self, request_id: RequestId) -> bool {
        self.latest_search == Some(request_id)
    }

    pub(crate) fn apply_search_result(&mut self, result: SearchResult, query_was_empty: bool) {
        self.stats = if query_was_empty && result.match_count == 0 {
            None
        } else {
            Some((result.match_count, result.current_match))
        };
        self.dirty = true;
    }

    /// Resolves the in-flight commit `request_id`. Returns false when it is not the pending one.
    pub(crate) fn finish_commit(&mut self, request_id: RequestId, accepted: bool) -> bool {
        let Some(pending) = self.pending_commit else {
            return false;
        };
        if pending.request_id != request_id {
            return false;
        }
        self.pending_commit = None;
        if accepted {
            self.theme_cursor.advance();
            self.limit_reached = false;
            if self.input_seq == pending.input_seq {
                self.input.clear();
            }
        } else {
            self.limit_reached = true;
        }
        self.dirty = true;
        true
    }

    pub(crate) fn apply_navigation(&mut self, match_count: usize, current_match: usize) {
        self.stats = Some((match_count, current_match));
        self.dirty = true;
    }

    /// Replaces the term list. The engine owns the theme sequence, so the
    /// local cursor follows whatever it reports.
    pub(crate) fn set_terms(&mut self, terms: Vec<TermView>, next_theme: ThemeId) {
        self.theme_cursor = ThemeCursor::at(next_theme);
        if terms.len() < MAX_TERMS {
            self.limit_reached = false;
        }
        self.terms = terms;
        self.dirty = true;
    }

    pub(crate) fn set_history(&mut self, history: Vec<HistoryRow>) {
        self.history = history;
        self.dirty = true;
    }

    pub(crate) fn stats_match_count(&self) -> usize {
        self.stats.map(|(count, _)| count).unwrap_or(0)
    }
}

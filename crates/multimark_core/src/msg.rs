use crate::{Direction, HistoryRow, RequestId, TermView, ThemeId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// The surface was opened against a tab.
    SurfaceOpened { url: String },
    /// The tab's document engine answered a probe.
    EngineReady,
    /// The engine could not be reached, or a request to it failed for good.
    EngineFailed(EngineFailure),
    /// User edited the search box (raw keystroke, not yet debounced).
    InputChanged(String),
    /// The debounce window for input `seq` elapsed.
    DebounceElapsed { seq: u64 },
    /// User confirmed the current input as a persistent term.
    QueryCommitted,
    /// Engine answered a search request.
    SearchCompleted {
        request_id: RequestId,
        persist: bool,
        result: SearchResult,
    },
    /// User clicked previous/next.
    NavigateClicked(Direction),
    /// Engine answered a navigate request.
    NavigateCompleted {
        match_count: usize,
        current_match: usize,
    },
    /// User removed a committed term by its position in commit order.
    RemoveTermClicked { index: usize },
    /// Engine answered a removal request.
    TermRemoved { index: usize, removed: bool },
    /// Engine returned the committed terms in commit order, and the theme its
    /// next commit will take.
    TermsLoaded {
        terms: Vec<TermView>,
        next_theme: ThemeId,
    },
    /// Log store returned past searches, oldest first.
    HistoryLoaded(Vec<HistoryRow>),
    /// UI/render tick to coalesce rendering.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchResult {
    pub match_count: usize,
    /// 1-based; 0 when there is no match.
    pub current_match: usize,
    pub limit_reached: bool,
}

/// Why the surface cannot talk to the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineFailure {
    /// Browser-internal page; injection is never attempted.
    RestrictedTarget,
    /// Injection was retried until the attempt budget ran out.
    InjectionExhausted,
    /// A request failed even after re-establishing the engine.
    Disconnected,
}

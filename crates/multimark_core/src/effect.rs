use crate::{Direction, RequestId, ThemeId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Probe the tab's engine and inject it if absent.
    EnsureReady,
    /// Send `Msg::DebounceElapsed { seq }` once input has been quiet for the debounce window.
    ScheduleDebounce { seq: u64 },
    SendSearch {
        request_id: RequestId,
        query: String,
        persist: bool,
        theme: Option<ThemeId>,
    },
    SendNavigate { direction: Direction },
    RemoveTerm { index: usize },
    FetchTerms,
    LoadHistory,
}

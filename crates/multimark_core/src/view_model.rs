use crate::{HistoryRow, SurfaceStatus, ThemeId};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SurfaceViewModel {
    pub status: SurfaceStatus,
    pub tab_url: Option<String>,
    pub input: String,
    pub input_enabled: bool,
    /// Placeholder text, or the explanation when the input is disabled.
    pub placeholder: String,
    /// "3 of 7", "No matches", or empty before any search.
    pub stats_text: String,
    pub nav_enabled: bool,
    pub terms: Vec<TermRowView>,
    pub slots_left: usize,
    pub next_theme: ThemeId,
    pub limit_notice: Option<String>,
    pub history: Vec<HistoryRow>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermRowView {
    pub index: usize,
    pub query: String,
    pub theme: ThemeId,
}


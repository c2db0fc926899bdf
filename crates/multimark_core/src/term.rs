use serde::{Deserialize, Serialize};

use crate::ThemeId;

/// Maximum number of committed search terms per page.
pub const MAX_TERMS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Next,
    Prev,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Next => "next",
            Direction::Prev => "prev",
        }
    }
}

/// A committed term as the query surface lists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermView {
    pub query: String,
    pub theme: ThemeId,
}

/// One row of the search-history display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    pub timestamp: String,
    pub query: String,
    pub match_count: usize,
}

use serde::{Deserialize, Serialize};

/// Color theme applied to a term's highlight markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeId {
    /// Neutral yellow marker.
    #[default]
    Default,
    Ocean,
    Forest,
    Sunset,
    Violet,
}

/// Fixed round-robin order in which committed terms receive themes.
pub const PALETTE: [ThemeId; 5] = [
    ThemeId::Default,
    ThemeId::Ocean,
    ThemeId::Forest,
    ThemeId::Sunset,
    ThemeId::Violet,
];

impl ThemeId {
    pub fn as_str(self) -> &'static str {
        match self {
            ThemeId::Default => "default",
            ThemeId::Ocean => "ocean",
            ThemeId::Forest => "forest",
            ThemeId::Sunset => "sunset",
            ThemeId::Violet => "violet",
        }
    }

    pub fn palette_index(self) -> usize {
        PALETTE
            .iter()
            .position(|theme| *theme == self)
            .unwrap_or_default()
    }
}

impl std::fmt::Display for ThemeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Round-robin pointer into [`PALETTE`].
///
/// Only successful persistent commits move it; live-typing searches and
/// rejected commits leave it where it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThemeCursor {
    position: usize,
}

impl ThemeCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cursor whose next hand-out is `theme`.
    pub fn at(theme: ThemeId) -> Self {
        Self {
            position: theme.palette_index(),
        }
    }

    pub fn current(&self) -> ThemeId {
        PALETTE[self.position % PALETTE.len()]
    }

    pub fn advance(&mut self) {
        self.position = (self.position + 1) % PALETTE.len();
    }
}

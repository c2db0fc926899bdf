//! Multimark core: pure query-surface state machine and the vocabulary shared
//! with the document engine (themes, directions, readiness, restricted pages).
mod effect;
mod injection;
mod msg;
mod restricted;
mod state;
mod term;
mod theme;
mod update;
mod view_model;

pub use effect::Effect;
pub use injection::{InjectionState, InjectionStatus, ProbeVerdict};
pub use msg::{EngineFailure, Msg, SearchResult};
pub use restricted::is_restricted_url;
pub use state::{RequestId, SurfaceState, SurfaceStatus};
pub use term::{Direction, HistoryRow, TermView, MAX_TERMS};
pub use theme::{ThemeCursor, ThemeId, PALETTE};
pub use update::update;
pub use view_model::{SurfaceViewModel, TermRowView};

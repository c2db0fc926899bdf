use crate::{is_restricted_url, Effect, EngineFailure, Msg, SurfaceState, SurfaceStatus};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: SurfaceState, msg: Msg) -> (SurfaceState, Vec<Effect>) {
    let effects = match msg {
        Msg::SurfaceOpened { url } => {
            let restricted = is_restricted_url(&url);
            state.open(url);
            if restricted {
                state.disable(EngineFailure::RestrictedTarget);
                Vec::new()
            } else {
                state.set_status(SurfaceStatus::Connecting);
                vec![Effect::EnsureReady, Effect::LoadHistory]
            }
        }
        Msg::EngineReady => match state.status() {
            SurfaceStatus::Connecting => {
                state.set_status(SurfaceStatus::Ready);
                let mut effects = vec![Effect::FetchTerms];
                // Text typed while connecting still deserves a preview.
                if !state.input().is_empty() {
                    effects.push(Effect::ScheduleDebounce {
                        seq: state.input_seq(),
                    });
                }
                effects
            }
            _ => Vec::new(),
        },
        Msg::EngineFailed(failure) => {
            if state.status() == SurfaceStatus::Closed {
                return (state, Vec::new());
            }
            state.disable(failure);
            Vec::new()
        }
        Msg::InputChanged(text) => {
            if !matches!(
                state.status(),
                SurfaceStatus::Connecting | SurfaceStatus::Ready
            ) {
                return (state, Vec::new());
            }
            if text == state.input() {
                return (state, Vec::new());
            }
            let seq = state.edit_input(text);
            if state.is_ready() {
                vec![Effect::ScheduleDebounce { seq }]
            } else {
                Vec::new()
            }
        }
        Msg::DebounceElapsed { seq } => {
            // Only the most recent keystroke's timer may dispatch.
            if seq != state.input_seq() || !state.is_ready() {
                return (state, Vec::new());
            }
            let query = state.input().to_string();
            let request_id = state.begin_search();
            vec![Effect::SendSearch {
                request_id,
                query,
                persist: false,
                theme: None,
            }]
        }
        Msg::QueryCommitted => {
            if !state.is_ready() || state.input().trim().is_empty() {
                return (state, Vec::new());
            }
            let query = state.input().to_string();
            let theme = state.theme_cursor().current();
            match state.begin_commit() {
                Some(request_id) => vec![Effect::SendSearch {
                    request_id,
                    query,
                    persist: true,
                    theme: Some(theme),
                }],
                None => Vec::new(),
            }
        }
        Msg::SearchCompleted {
            request_id,
            persist,
            result,
        } => {
            let mut effects = Vec::new();
            if persist
                && state.finish_commit(request_id, !result.limit_reached)
                && !result.limit_reached
            {
                effects.push(Effect::FetchTerms);
            }
            if state.is_latest_search(request_id) {
                let query_was_empty = !persist && state.input().is_empty();
                if !(persist && result.limit_reached) {
                    state.apply_search_result(result, query_was_empty);
                }
            }
            effects
        }
        Msg::NavigateClicked(direction) => {
            if state.is_ready() && state.stats_match_count() > 0 {
                vec![Effect::SendNavigate { direction }]
            } else {
                Vec::new()
            }
        }
        Msg::NavigateCompleted {
            match_count,
            current_match,
        } => {
            state.apply_navigation(match_count, current_match);
            Vec::new()
        }
        Msg::RemoveTermClicked { index } => {
            if state.is_ready() && index < state.terms().len() {
                vec![Effect::RemoveTerm { index }]
            } else {
                Vec::new()
            }
        }
        Msg::TermRemoved { removed, .. } => {
            if removed {
                state.mark_dirty();
            }
            vec![Effect::FetchTerms]
        }
        Msg::TermsLoaded { terms, next_theme } => {
            state.set_terms(terms, next_theme);
            Vec::new()
        }
        Msg::HistoryLoaded(rows) => {
            state.set_history(rows);
            Vec::new()
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

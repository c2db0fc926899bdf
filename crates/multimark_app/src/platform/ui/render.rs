use multimark_core::{SurfaceStatus, SurfaceViewModel, MAX_TERMS};

/// Renders the surface as text lines for the terminal.
pub(crate) fn render(view: &SurfaceViewModel) -> Vec<String> {
    let status_label = match view.status {
        SurfaceStatus::Closed => "closed",
        SurfaceStatus::Connecting => "connecting",
        SurfaceStatus::Ready => "ready",
        SurfaceStatus::Disabled(_) => "disabled",
    };

    let mut lines = Vec::new();
    lines.push(format!(
        "── multimark [{}] {}",
        status_label,
        view.tab_url.as_deref().unwrap_or("")
    ));

    let search_box = if !view.input_enabled || view.input.is_empty() {
        format!("({})", view.placeholder)
    } else {
        view.input.clone()
    };
    if view.stats_text.is_empty() {
        lines.push(format!("search: {search_box}"));
    } else {
        lines.push(format!("search: {search_box}    {}", view.stats_text));
    }

    if view.nav_enabled {
        lines.push("[prev] [next]".to_string());
    }

    if !view.terms.is_empty() {
        lines.push(format!(
            "terms ({}/{}):",
            view.terms.len(),
            MAX_TERMS
        ));
        for term in &view.terms {
            lines.push(format!("  {}. {} [{}]", term.index + 1, term.query, term.theme));
        }
    }
    if view.input_enabled && view.slots_left > 0 {
        lines.push(format!(
            "enter commits with theme `{}` ({} slot{} left)",
            view.next_theme,
            view.slots_left,
            if view.slots_left == 1 { "" } else { "s" }
        ));
    }
    if let Some(notice) = &view.limit_notice {
        lines.push(format!("! {notice}"));
    }

    if !view.history.is_empty() {
        lines.push("recent searches:".to_string());
        for row in &view.history {
            lines.push(format!(
                "  {}  {} ({} matches)",
                row.timestamp, row.query, row.match_count
            ));
        }
    }
    lines
}

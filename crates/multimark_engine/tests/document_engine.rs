use std::sync::{Arc, Mutex, Once};

use multimark_core::{update, Direction, Effect, Msg, SurfaceState, ThemeId};
use multimark_engine::{
    handle_json, BackgroundLink, ClearScope, DocumentEngine, EngineConfig, LivePage, Marker,
    PageDocument, Request, TabId,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

const TAB: TabId = TabId(7);

fn engine_for(body: &str) -> DocumentEngine {
    init_logging();
    let html = format!("<html><head><title>Fixture</title></head><body>{body}</body></html>");
    let page = LivePage::new(PageDocument::parse("https://example.com/fixture", &html));
    DocumentEngine::new(TAB, page, EngineConfig::default())
}

fn markers(engine: &DocumentEngine) -> Vec<Marker> {
    engine
        .page()
        .read(|doc| doc.markers().into_iter().map(|(_, marker)| marker).collect())
}

fn current_marker_index(engine: &DocumentEngine) -> Option<usize> {
    markers(engine).iter().position(|marker| marker.current)
}

#[derive(Default)]
struct RecordingLink {
    sent: Mutex<Vec<(TabId, Request)>>,
}

impl BackgroundLink for RecordingLink {
    fn notify(&self, sender: TabId, request: Request) {
        self.sent.lock().unwrap().push((sender, request));
    }
}

#[test]
fn finds_and_wraps_around_three_matches() {
    let mut engine = engine_for("<p>cat sat on the mat</p>");
    let reply = engine.search("at", false, None);

    assert_eq!(reply.match_count, 3);
    assert_eq!(reply.current_match, Some(1));
    assert!(!reply.search_limit_reached);

    let positions: Vec<usize> = (0..3)
        .map(|_| engine.navigate(Direction::Next).current_match)
        .collect();
    assert_eq!(positions, vec![2, 3, 1]);
}

#[test]
fn previous_wraps_to_last_match_and_moves_current_marker() {
    let mut engine = engine_for("<p>cat sat on the mat</p>");
    engine.search("at", false, None);
    assert_eq!(current_marker_index(&engine), Some(0));

    let reply = engine.navigate(Direction::Prev);
    assert_eq!(reply.match_count, 3);
    assert_eq!(reply.current_match, 3);
    assert_eq!(current_marker_index(&engine), Some(2));
    let (scrolled, last) = engine.page().read(|doc| {
        let last = doc.markers().last().map(|(node, _)| *node);
        (doc.scroll_target(), last)
    });
    assert_eq!(scrolled, last);
    assert_eq!(
        markers(&engine).iter().filter(|marker| marker.current).count(),
        1
    );
}

#[test]
fn navigating_without_matches_returns_zeros() {
    let mut engine = engine_for("<p>nothing here</p>");
    engine.search("zebra", false, None);
    let reply = engine.navigate(Direction::Next);

    assert_eq!(reply.match_count, 0);
    assert_eq!(reply.current_match, 0);
}

#[test]
fn skips_scripts_styles_and_form_controls() {
    let mut engine = engine_for(
        r#"<p>Cat</p>
        <script>var cat = 1;</script>
        <style>.cat { color: red }</style>
        <noscript>cat</noscript>
        <input value="cat">
        <textarea>cat</textarea>"#,
    );
    let reply = engine.search("cat", false, None);

    assert_eq!(reply.match_count, 1);
}

#[test]
fn matching_is_case_insensitive_and_literal() {
    let mut engine = engine_for("<p>Price: $5.00 or $5x00, CAT and cat</p>");
    assert_eq!(engine.search("$5.00", false, None).match_count, 1);
    assert_eq!(engine.search("cat", false, None).match_count, 2);
}

#[test]
fn clear_all_restores_markup_and_rescans_identically() {
    let mut engine = engine_for("<div><p>cat sat</p><p>on the <b>mat</b></p></div>");
    let original = engine.page().to_html();

    let first = engine.search("at", false, None);
    assert_ne!(engine.page().to_html(), original);

    engine.clear(ClearScope::All);
    assert_eq!(engine.page().to_html(), original);

    let second = engine.search("at", false, None);
    assert_eq!(first, second);
    engine.clear(ClearScope::All);
    engine.clear(ClearScope::All);
    assert_eq!(engine.page().to_html(), original);
}

#[test]
fn new_transient_search_replaces_previous_preview() {
    let mut engine = engine_for("<p>cat sat on the mat</p>");
    engine.search("c", false, None);
    engine.search("ca", false, None);
    engine.search("cat", false, None);

    assert_eq!(markers(&engine).len(), 1);
    assert_eq!(engine.page().rendered_text(), "cat sat on the mat");
}

#[test]
fn empty_query_only_clears_preview() {
    let mut engine = engine_for("<p>cat sat</p>");
    engine.search("cat", true, None);
    engine.search("sat", false, None);

    let reply = engine.search("", false, None);
    assert_eq!(reply.match_count, 0);
    assert_eq!(reply.current_match, None);
    assert_eq!(markers(&engine).len(), 1);
}

#[test]
fn fifth_commit_is_rejected_without_new_highlights() {
    let mut engine = engine_for("<p>cat sat on the mat with a hat and a bat</p>");
    for query in ["cat", "sat", "mat", "hat"] {
        let reply = engine.search(query, true, None);
        assert!(!reply.search_limit_reached, "{query} should be accepted");
    }
    let before = markers(&engine).len();

    let reply = engine.search("bat", true, None);
    assert!(reply.search_limit_reached);
    assert_eq!(reply.match_count, 0);
    assert_eq!(markers(&engine).len(), before);
    assert_eq!(engine.terms().len(), 4);
}

#[test]
fn repeated_commit_is_rejected() {
    let mut engine = engine_for("<p>cat</p>");
    assert!(!engine.search("cat", true, None).search_limit_reached);
    assert!(engine.search("CAT", true, None).search_limit_reached);
    assert_eq!(engine.terms().len(), 1);
}

#[test]
fn committed_terms_take_palette_themes_in_order() {
    let mut engine = engine_for("<p>cat sat on the mat near a hat</p>");
    engine.search("cat", true, None);
    engine.search("on", false, None);
    engine.search("sat", true, None);
    engine.search("the", false, None);
    engine.search("mat", true, None);
    engine.search("hat", true, None);

    let themes: Vec<ThemeId> = engine.terms().iter().map(|term| term.theme).collect();
    assert_eq!(
        themes,
        vec![
            ThemeId::Default,
            ThemeId::Ocean,
            ThemeId::Forest,
            ThemeId::Sunset
        ]
    );
    let marker_themes: Vec<ThemeId> = markers(&engine).iter().map(|m| m.theme).collect();
    assert_eq!(marker_themes, themes);
}

#[test]
fn requested_theme_is_used_for_commit() {
    let mut engine = engine_for("<p>cat</p>");
    engine.search("cat", true, Some(ThemeId::Violet));

    assert_eq!(engine.terms()[0].theme, ThemeId::Violet);
    assert_eq!(markers(&engine)[0].theme, ThemeId::Violet);
}

#[test]
fn removing_a_term_keeps_the_others_and_frees_a_slot() {
    let mut engine = engine_for("<p>cat sat on the mat with a hat and a bat</p>");
    for query in ["cat", "sat", "mat", "hat"] {
        engine.search(query, true, None);
    }

    assert!(engine.remove_term(1));
    let remaining: Vec<String> = engine.terms().into_iter().map(|t| t.query).collect();
    assert_eq!(remaining, vec!["cat", "mat", "hat"]);
    assert_eq!(markers(&engine).len(), 3);

    let reply = engine.search("bat", true, None);
    assert!(!reply.search_limit_reached);
    assert_eq!(reply.match_count, 1);
    assert_eq!(engine.terms()[3].theme, ThemeId::Violet);
    assert!(!engine.remove_term(9));
}

#[test]
fn reopened_surface_follows_engine_theme_after_removal() {
    let mut engine = engine_for("<p>cat sat on the mat</p>");
    engine.search("cat", true, None);
    engine.search("sat", true, None);
    assert!(engine.remove_term(1));

    let (surface, _) = update(
        SurfaceState::new(),
        Msg::SurfaceOpened {
            url: "https://example.com/fixture".to_string(),
        },
    );
    let (surface, _) = update(surface, Msg::EngineReady);
    let (surface, _) = update(
        surface,
        Msg::TermsLoaded {
            terms: engine.terms(),
            next_theme: engine.next_theme(),
        },
    );
    let (surface, _) = update(surface, Msg::InputChanged("mat".to_string()));
    let (_surface, effects) = update(surface, Msg::QueryCommitted);
    let [Effect::SendSearch {
        query,
        persist,
        theme,
        ..
    }] = effects.as_slice()
    else {
        panic!("expected a single commit, got {effects:?}");
    };

    engine.search(query, *persist, *theme);
    let themes: Vec<ThemeId> = engine.terms().iter().map(|term| term.theme).collect();
    assert_eq!(themes, vec![ThemeId::Default, ThemeId::Forest]);
}

#[test]
fn removing_the_active_term_empties_navigation() {
    let mut engine = engine_for("<p>cat cat</p>");
    engine.search("cat", true, None);
    engine.remove_term(0);

    let reply = engine.navigate(Direction::Next);
    assert_eq!((reply.match_count, reply.current_match), (0, 0));
    assert_eq!(engine.page().rendered_text(), "cat cat");
}

#[test]
fn commits_are_logged_and_startup_is_announced() {
    init_logging();
    let link = Arc::new(RecordingLink::default());
    let page = LivePage::new(PageDocument::parse(
        "https://example.com/a",
        "<title>Article</title><p>cat sat</p>",
    ));
    let config = EngineConfig {
        clock: Arc::new(|| "2024-05-01T12:00:00+00:00".to_string()),
    };
    let mut engine = DocumentEngine::new(TAB, page, config).with_background(link.clone());
    engine.announce();
    engine.search("sat", false, None);
    engine.search("cat", true, None);

    let sent = link.sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], (TAB, Request::ContentScriptLoaded));
    match &sent[1].1 {
        Request::LogSearch { search_log } => {
            assert_eq!(search_log.query, "cat");
            assert_eq!(search_log.match_count, 1);
            assert_eq!(search_log.url, "https://example.com/a");
            assert_eq!(search_log.title.as_deref(), Some("Article"));
            assert_eq!(search_log.timestamp, "2024-05-01T12:00:00+00:00");
        }
        other => panic!("unexpected notification {other:?}"),
    }
}

#[test]
fn json_messages_follow_the_wire_shapes() {
    let mut engine = engine_for("<p>cat sat on the mat</p>");

    let ping = handle_json(&mut engine, None, r#"{"action":"ping"}"#);
    assert_eq!(ping, r#"{"status":"ok"}"#);

    let search = handle_json(
        &mut engine,
        None,
        r#"{"action":"search","query":"at","persist":true}"#,
    );
    assert_eq!(
        search,
        r#"{"matchCount":3,"currentMatch":1,"searchLimitReached":false}"#
    );

    let nav = handle_json(&mut engine, None, r#"{"action":"navigate","direction":"next"}"#);
    assert_eq!(nav, r#"{"matchCount":3,"currentMatch":2}"#);

    let terms = handle_json(&mut engine, None, r#"{"action":"getSearchTerms"}"#);
    assert_eq!(terms, r#"{"terms":[{"query":"at","theme":"default"}],"nextTheme":"ocean"}"#);

    let removed = handle_json(&mut engine, None, r#"{"action":"removeSearchTerm","index":0}"#);
    assert_eq!(removed, r#"{"status":"removed"}"#);
    let missing = handle_json(&mut engine, None, r#"{"action":"removeSearchTerm","index":0}"#);
    assert_eq!(missing, r#"{"status":"notFound"}"#);

    let cleared = handle_json(&mut engine, None, r#"{"action":"clearHighlights","scope":"all"}"#);
    assert_eq!(cleared, r#"{"status":"cleared"}"#);

    let foreign = handle_json(&mut engine, None, r#"{"action":"contentScriptLoaded"}"#);
    let value: serde_json::Value = serde_json::from_str(&foreign).unwrap();
    assert_eq!(value["status"], "error");
    assert_eq!(value["code"], "unsupportedAction");
}

use std::fs;
use std::sync::{Arc, Once};

use multimark_engine::{
    Background, BackgroundHandle, BackgroundLink, Command, CommandOutcome, FileStorage, LogStore,
    LogStoreSettings, MemoryStorage, Request, Response, SearchLogEntry, Status, StorageError,
    TabId, TabInfo,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn entry(query: &str) -> SearchLogEntry {
    SearchLogEntry {
        timestamp: "2024-05-01T12:00:00+00:00".to_string(),
        query: query.to_string(),
        match_count: 1,
        url: "https://example.com".to_string(),
        title: None,
    }
}

fn memory_store(capacity: usize) -> LogStore {
    LogStore::new(
        Arc::new(MemoryStorage::new()),
        LogStoreSettings {
            capacity,
            ..LogStoreSettings::default()
        },
    )
}

fn queries(store: &LogStore) -> Vec<String> {
    store
        .entries()
        .unwrap()
        .into_iter()
        .map(|entry| entry.query)
        .collect()
}

#[test]
fn defaults_match_storage_contract() {
    let settings = LogStoreSettings::default();
    assert_eq!(settings.capacity, 1000);
    assert_eq!(settings.key, "searchLogs");
}

#[test]
fn appends_past_capacity_evict_oldest() {
    init_logging();
    let store = memory_store(3);
    for query in ["a", "b", "c", "d", "e"] {
        store.append(entry(query)).unwrap();
    }
    assert_eq!(queries(&store), vec!["c", "d", "e"]);
}

#[test]
fn missing_key_reads_as_empty_and_reset_clears() {
    let store = memory_store(10);
    assert!(store.entries().unwrap().is_empty());

    store.append(entry("cat")).unwrap();
    store.reset().unwrap();
    assert!(store.entries().unwrap().is_empty());
}

#[test]
fn file_storage_survives_reopening() {
    let temp = TempDir::new().unwrap();
    let open = || {
        LogStore::new(
            Arc::new(FileStorage::new(temp.path().join("storage"))),
            LogStoreSettings::default(),
        )
    };
    open().append(entry("cat")).unwrap();
    open().append(entry("mat")).unwrap();

    assert_eq!(queries(&open()), vec!["cat", "mat"]);
    let raw = fs::read_to_string(temp.path().join("storage").join("searchLogs.json")).unwrap();
    assert!(raw.contains(r#""matchCount":1"#));
}

#[test]
fn corrupt_storage_is_reported() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("searchLogs.json"), "{not json").unwrap();
    let store = LogStore::new(
        Arc::new(FileStorage::new(temp.path().to_path_buf())),
        LogStoreSettings::default(),
    );

    assert!(matches!(store.entries(), Err(StorageError::Corrupt { .. })));
}

#[test]
fn background_acknowledges_and_logs() {
    use multimark_engine::MessageHandler;

    init_logging();
    let mut background = Background::new(memory_store(10));
    let ack = background.handle(Some(TabId(1)), Request::ContentScriptLoaded);
    assert_eq!(ack, Response::status(Status::Acknowledged));

    let logged = background.handle(
        Some(TabId(1)),
        Request::LogSearch {
            search_log: entry("cat"),
        },
    );
    assert_eq!(logged, Response::status(Status::Logged));
    assert_eq!(queries(background.store()), vec!["cat"]);

    let ping = background.handle(None, Request::Ping);
    assert!(matches!(ping, Response::Error(_)));
}

#[test]
fn storage_failures_are_swallowed() {
    use multimark_engine::MessageHandler;

    init_logging();
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("searchLogs.json"), "[1, 2").unwrap();
    let store = LogStore::new(
        Arc::new(FileStorage::new(temp.path().to_path_buf())),
        LogStoreSettings::default(),
    );
    let mut background = Background::new(store);

    let reply = background.handle(
        None,
        Request::LogSearch {
            search_log: entry("cat"),
        },
    );
    assert_eq!(reply, Response::status(Status::Logged));
}

#[test]
fn install_resets_the_log() {
    let background = Background::new(memory_store(10));
    background.store().append(entry("old")).unwrap();
    background.on_installed().unwrap();
    assert!(background.store().entries().unwrap().is_empty());
}

#[test]
fn commands_resolve_against_the_active_tab() {
    let background = Background::new(memory_store(10));
    let page = TabInfo {
        id: TabId(3),
        url: "https://example.com".to_string(),
        title: None,
    };
    let settings = TabInfo {
        id: TabId(4),
        url: "chrome://settings".to_string(),
        title: None,
    };

    assert_eq!(
        background.on_command(Command::ActivateSearch, Some(&page)),
        CommandOutcome::OpenSurface {
            tab: TabId(3),
            focus_input: true
        }
    );
    assert_eq!(
        background.on_command(Command::ActivateSearch, Some(&settings)),
        CommandOutcome::Ignored
    );
    assert_eq!(
        background.on_command(Command::ToggleSearch, Some(&settings)),
        CommandOutcome::OpenSurface {
            tab: TabId(4),
            focus_input: false
        }
    );
    assert_eq!(
        background.on_command(Command::ToggleSearch, None),
        CommandOutcome::Ignored
    );
    assert_eq!(Command::parse("toggle-search"), Some(Command::ToggleSearch));
    assert_eq!(Command::parse("open-everything"), None);
}

#[tokio::test]
async fn notifications_are_applied_in_order() {
    init_logging();
    let store = memory_store(10);
    let handle = BackgroundHandle::spawn(Background::new(store.clone()));

    handle.notify(
        TabId(1),
        Request::LogSearch {
            search_log: entry("cat"),
        },
    );
    handle.notify(
        TabId(1),
        Request::LogSearch {
            search_log: entry("mat"),
        },
    );
    let ack = handle.request(Some(TabId(1)), Request::ContentScriptLoaded).await;

    assert_eq!(ack, Some(Response::status(Status::Acknowledged)));
    assert_eq!(queries(&store), vec!["cat", "mat"]);
}

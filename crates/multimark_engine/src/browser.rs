//! In-process stand-in for the browser: tabs holding live pages, and
//! on-demand start-up of a document engine per page.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use engine_logging::{engine_debug, engine_info, LogContext};
use multimark_core::is_restricted_url;

use crate::background::BackgroundLink;
use crate::engine::{DocumentEngine, EngineConfig};
use crate::host::{HostError, TabHost, TabId, TabInfo};
use crate::page::{LivePage, PageDocument};
use crate::protocol::{Request, Response};
use crate::runtime::EngineHandle;

const CTX: LogContext = LogContext::Surface;

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Time an injected engine needs before it starts receiving messages.
    pub engine_init_delay: Duration,
    pub engine: EngineConfig,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            engine_init_delay: Duration::from_millis(30),
            engine: EngineConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
enum EngineSlot {
    Absent,
    Starting,
    Live(EngineHandle),
}

#[derive(Debug)]
struct TabSlot {
    page: LivePage,
    engine: EngineSlot,
    /// Bumped on every page load so a late start-up cannot attach an engine
    /// to a page it was not injected into.
    generation: u64,
    stylesheet: bool,
    engine_starts: usize,
}

impl TabSlot {
    fn new(page: LivePage) -> Self {
        Self {
            page,
            engine: EngineSlot::Absent,
            generation: 0,
            stylesheet: false,
            engine_starts: 0,
        }
    }

    fn info(&self, id: TabId) -> TabInfo {
        TabInfo {
            id,
            url: self.page.url(),
            title: self.page.title(),
        }
    }
}

#[derive(Debug, Default)]
struct Tabs {
    slots: BTreeMap<TabId, TabSlot>,
    next_id: u32,
    active: Option<TabId>,
}

#[derive(Clone)]
pub struct SimulatedBrowser {
    tabs: Arc<Mutex<Tabs>>,
    settings: BrowserSettings,
    background: Option<Arc<dyn BackgroundLink>>,
}

impl SimulatedBrowser {
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            tabs: Arc::new(Mutex::new(Tabs::default())),
            settings,
            background: None,
        }
    }

    pub fn with_background(mut self, background: Arc<dyn BackgroundLink>) -> Self {
        self.background = Some(background);
        self
    }

    /// Opens `html` at `url` in a new tab, which becomes the active tab.
    pub fn open_tab(&self, url: &str, html: &str) -> TabId {
        let page = LivePage::new(PageDocument::parse(url, html));
        self.with_tabs(|tabs| {
            tabs.next_id += 1;
            let id = TabId(tabs.next_id);
            tabs.slots.insert(id, TabSlot::new(page));
            tabs.active = Some(id);
            engine_debug!(ctx: CTX, "opened {id} at {url}");
            id
        })
    }

    /// Loads a new page into `tab`, unloading its engine.
    pub fn navigate(&self, tab: TabId, url: &str, html: &str) -> Result<(), HostError> {
        let page = LivePage::new(PageDocument::parse(url, html));
        self.with_slot(tab, |slot| {
            slot.page = page;
            Self::unload(slot);
        })
    }

    /// Reloads the current page from its pristine markup.
    pub fn reload(&self, tab: TabId, html: &str) -> Result<(), HostError> {
        let url = self.with_slot(tab, |slot| slot.page.url())?;
        self.navigate(tab, &url, html)
    }

    pub fn close_tab(&self, tab: TabId) -> Result<(), HostError> {
        self.with_tabs(|tabs| {
            tabs.slots.remove(&tab).ok_or(HostError::TabNotFound(tab))?;
            if tabs.active == Some(tab) {
                tabs.active = tabs.slots.keys().next_back().copied();
            }
            Ok(())
        })
    }

    pub fn active_tab(&self) -> Option<TabInfo> {
        self.with_tabs(|tabs| {
            let id = tabs.active?;
            tabs.slots.get(&id).map(|slot| slot.info(id))
        })
    }

    pub fn page(&self, tab: TabId) -> Result<LivePage, HostError> {
        self.with_slot(tab, |slot| slot.page.clone())
    }

    pub fn page_html(&self, tab: TabId) -> Result<String, HostError> {
        Ok(self.page(tab)?.to_html())
    }

    pub fn has_stylesheet(&self, tab: TabId) -> Result<bool, HostError> {
        self.with_slot(tab, |slot| slot.stylesheet)
    }

    /// How many engines have been started in `tab` across all its page loads.
    pub fn engine_starts(&self, tab: TabId) -> Result<usize, HostError> {
        self.with_slot(tab, |slot| slot.engine_starts)
    }

    fn unload(slot: &mut TabSlot) {
        slot.generation += 1;
        slot.engine = EngineSlot::Absent;
        slot.stylesheet = false;
    }

    fn with_tabs<R>(&self, f: impl FnOnce(&mut Tabs) -> R) -> R {
        let mut tabs = self.tabs.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut tabs)
    }

    fn with_slot<R>(&self, tab: TabId, f: impl FnOnce(&mut TabSlot) -> R) -> Result<R, HostError> {
        self.with_tabs(|tabs| tabs.slots.get_mut(&tab).map(f))
            .ok_or(HostError::TabNotFound(tab))
    }

    fn ensure_scriptable(&self, tab: TabId) -> Result<(), HostError> {
        let url = self.with_slot(tab, |slot| slot.page.url())?;
        if is_restricted_url(&url) {
            return Err(HostError::Restricted { url });
        }
        Ok(())
    }

    /// Brings up the engine once the init delay has passed, unless the page
    /// was replaced in the meantime.
    async fn start_engine(self, tab: TabId, generation: u64) {
        tokio::time::sleep(self.settings.engine_init_delay).await;
        let started = self.with_slot(tab, |slot| {
            if slot.generation != generation || !matches!(slot.engine, EngineSlot::Starting) {
                return false;
            }
            let mut engine =
                DocumentEngine::new(tab, slot.page.clone(), self.settings.engine.clone());
            if let Some(background) = &self.background {
                engine = engine.with_background(background.clone());
            }
            slot.engine = EngineSlot::Live(EngineHandle::spawn(tab, engine));
            slot.engine_starts += 1;
            true
        });
        if !matches!(started, Ok(true)) {
            engine_debug!(ctx: CTX, "discarded stale engine start-up in {tab}");
        }
    }
}

#[async_trait]
impl TabHost for SimulatedBrowser {
    async fn tab_info(&self, tab: TabId) -> Result<TabInfo, HostError> {
        self.with_slot(tab, |slot| slot.info(tab))
    }

    async fn send_message(&self, tab: TabId, request: &Request) -> Result<Response, HostError> {
        self.ensure_scriptable(tab)?;
        let engine = self.with_slot(tab, |slot| match &slot.engine {
            EngineSlot::Live(handle) if handle.is_alive() => Some(handle.clone()),
            _ => None,
        })?;
        let handle = engine.ok_or(HostError::NoReceiver(tab))?;

        let payload =
            serde_json::to_string(request).map_err(|err| HostError::Malformed(err.to_string()))?;
        let reply = handle
            .dispatch(payload)
            .await
            .ok_or(HostError::NoReceiver(tab))?;
        serde_json::from_str(&reply).map_err(|err| HostError::Malformed(err.to_string()))
    }

    async fn insert_css(&self, tab: TabId) -> Result<(), HostError> {
        self.ensure_scriptable(tab)?;
        self.with_slot(tab, |slot| slot.stylesheet = true)
    }

    async fn execute_script(&self, tab: TabId) -> Result<(), HostError> {
        self.ensure_scriptable(tab)?;
        let generation = self.with_slot(tab, |slot| {
            let present = match &slot.engine {
                EngineSlot::Absent => false,
                EngineSlot::Starting => true,
                EngineSlot::Live(handle) => handle.is_alive(),
            };
            if present {
                return None;
            }
            slot.engine = EngineSlot::Starting;
            Some(slot.generation)
        })?;
        match generation {
            Some(generation) => {
                engine_info!(ctx: CTX, "injecting engine into {tab}");
                tokio::spawn(self.clone().start_engine(tab, generation));
            }
            None => engine_debug!(ctx: CTX, "engine already present in {tab}"),
        }
        Ok(())
    }
}

impl std::fmt::Debug for SimulatedBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedBrowser")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

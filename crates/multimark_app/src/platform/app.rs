use std::fs;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use clap::Parser;
use engine_logging::{engine_info, engine_warn, LogContext};
use log::LevelFilter;
use multimark_core::{update, Msg, SurfaceState};
use multimark_engine::{
    decode_page, Background, BackgroundHandle, CommandOutcome, FileStorage, InjectionCoordinator,
    LogStore, SimulatedBrowser, TabId,
};
use tokio::sync::mpsc;

use super::effects::EffectRunner;
use super::logging::{self, LogDestination};
use super::settings::{self, AppSettings, SETTINGS_FILENAME};
use super::ui::commands::{self, UserCommand, HELP};
use super::ui::render::render;

const CTX: LogContext = LogContext::Surface;

#[derive(Parser, Debug)]
#[command(
    name = "multimark",
    version,
    about = "Search an HTML page for several highlighted terms at once"
)]
struct Cli {
    /// HTML file to open in the tab.
    page: PathBuf,
    /// URL the page is presented under (defaults to its file:// URL).
    #[arg(long)]
    url: Option<String>,
    /// Content-Type header to decode the page with.
    #[arg(long, value_name = "MIME")]
    content_type: Option<String>,
    /// Settings file.
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "MULTIMARK_CONFIG",
        default_value = SETTINGS_FILENAME
    )]
    config: PathBuf,
    /// Where log output goes; overrides the settings file.
    #[arg(long, value_enum)]
    log: Option<LogDestination>,
    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,
    /// Start from an empty search log, as after a fresh install.
    #[arg(long)]
    fresh: bool,
}

/// Everything the surface loop reacts to.
#[derive(Debug)]
pub(crate) enum AppEvent {
    Surface(Msg),
    Line(String),
    InputClosed,
}

pub fn run_app() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (settings, settings_problem) = match settings::load(&cli.config) {
        Ok(settings) => (settings, None),
        Err(err) => (AppSettings::default(), Some(err)),
    };
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    logging::initialize(cli.log.unwrap_or(settings.log_destination), level);
    if let Some(problem) = settings_problem {
        engine_warn!("{problem}; using default settings");
    }

    let bytes = fs::read(&cli.page).with_context(|| format!("reading {}", cli.page.display()))?;
    let decoded = decode_page(&bytes, cli.content_type.as_deref())
        .with_context(|| format!("decoding {}", cli.page.display()))?;
    engine_info!(
        "loaded {} ({} bytes, {})",
        cli.page.display(),
        bytes.len(),
        decoded.encoding_label
    );
    let url = match cli.url {
        Some(url) => url,
        None => {
            let absolute = fs::canonicalize(&cli.page).unwrap_or_else(|_| cli.page.clone());
            format!("file://{}", absolute.display())
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting runtime")?;
    runtime.block_on(run_surface(settings, url, decoded.html, cli.fresh))
}

struct Session {
    browser: Arc<SimulatedBrowser>,
    background: Background,
    tab: TabId,
    html: String,
    runner: EffectRunner,
    state: SurfaceState,
}

impl Session {
    fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        self.runner.enqueue(effects);
    }

    fn open_surface(&mut self) -> anyhow::Result<()> {
        let info = self
            .browser
            .active_tab()
            .context("no active tab to search")?;
        self.dispatch(Msg::SurfaceOpened { url: info.url });
        Ok(())
    }

    /// Applies one input line. Returns `false` when the user quits.
    fn handle_line(&mut self, line: &str) -> anyhow::Result<bool> {
        if line.trim().is_empty() {
            return Ok(true);
        }
        let command = match commands::parse(line) {
            Ok(command) => command,
            Err(err) => {
                println!("{err}");
                return Ok(true);
            }
        };
        match command {
            UserCommand::Surface(msgs) => {
                for msg in msgs {
                    self.dispatch(msg);
                }
            }
            UserCommand::Shortcut(shortcut) => {
                let active = self.browser.active_tab();
                match self.background.on_command(shortcut, active.as_ref()) {
                    CommandOutcome::OpenSurface { .. } => self.open_surface()?,
                    CommandOutcome::Ignored => println!("({} ignored here)", shortcut.as_str()),
                }
            }
            UserCommand::ShowPage => println!("{}", self.browser.page_html(self.tab)?),
            UserCommand::Reload => {
                self.browser.reload(self.tab, &self.html)?;
                self.open_surface()?;
            }
            UserCommand::Help => println!("{HELP}"),
            UserCommand::Quit => return Ok(false),
        }
        Ok(true)
    }

    fn render_if_dirty(&mut self) {
        if self.state.consume_dirty() {
            for line in render(&self.state.view()) {
                println!("{line}");
            }
        }
    }
}

async fn run_surface(
    settings: AppSettings,
    url: String,
    html: String,
    fresh: bool,
) -> anyhow::Result<()> {
    let store = LogStore::new(
        Arc::new(FileStorage::new(settings.storage_dir.clone())),
        settings.log_store(),
    );
    let background = Background::new(store.clone());
    if fresh {
        background
            .on_installed()
            .context("resetting the search log")?;
    }
    let background_handle = BackgroundHandle::spawn(background.clone());
    let browser = Arc::new(
        SimulatedBrowser::new(settings.browser()).with_background(Arc::new(background_handle)),
    );
    let tab = browser.open_tab(&url, &html);
    let coordinator = Arc::new(InjectionCoordinator::new(
        browser.clone(),
        tab,
        settings.coordinator(),
    ));

    let (tx, mut rx) = mpsc::unbounded_channel();
    spawn_stdin_reader(tx.clone());

    let mut session = Session {
        browser,
        background,
        tab,
        html,
        runner: EffectRunner::new(coordinator, store, &settings, tx),
        state: SurfaceState::new(),
    };
    println!("{HELP}");
    session.open_surface()?;
    session.render_if_dirty();

    while let Some(event) = rx.recv().await {
        match event {
            AppEvent::Surface(msg) => session.dispatch(msg),
            AppEvent::Line(line) => {
                if !session.handle_line(&line)? {
                    break;
                }
            }
            AppEvent::InputClosed => break,
        }
        session.render_if_dirty();
    }
    engine_info!(ctx: CTX, "surface closed");
    Ok(())
}

fn spawn_stdin_reader(tx: mpsc::UnboundedSender<AppEvent>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.send(AppEvent::Line(line)).is_err() {
                return;
            }
        }
        let _ = tx.send(AppEvent::InputClosed);
    });
}

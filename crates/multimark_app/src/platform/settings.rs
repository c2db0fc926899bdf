use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use multimark_engine::{BrowserSettings, CoordinatorSettings, LogStoreSettings};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::logging::LogDestination;

pub(crate) const SETTINGS_FILENAME: &str = "multimark.ron";

/// User-tunable knobs, read from `multimark.ron`. Missing fields fall back to
/// their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppSettings {
    pub debounce_ms: u64,
    pub settle_delay_ms: u64,
    pub max_attempts: u32,
    pub engine_init_delay_ms: u64,
    pub log_capacity: usize,
    pub history_rows: usize,
    pub storage_dir: PathBuf,
    pub log_destination: LogDestination,
}

impl Default for AppSettings {
    fn default() -> Self {
        let coordinator = CoordinatorSettings::default();
        Self {
            debounce_ms: 150,
            settle_delay_ms: coordinator.settle_delay.as_millis() as u64,
            max_attempts: coordinator.max_attempts,
            engine_init_delay_ms: 30,
            log_capacity: LogStoreSettings::default().capacity,
            history_rows: 10,
            storage_dir: PathBuf::from(".multimark"),
            log_destination: LogDestination::File,
        }
    }
}

impl AppSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn coordinator(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            max_attempts: self.max_attempts,
        }
    }

    pub fn browser(&self) -> BrowserSettings {
        BrowserSettings {
            engine_init_delay: Duration::from_millis(self.engine_init_delay_ms),
            ..BrowserSettings::default()
        }
    }

    pub fn log_store(&self) -> LogStoreSettings {
        LogStoreSettings {
            capacity: self.log_capacity,
            ..LogStoreSettings::default()
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum SettingsError {
    #[error("failed to read {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
}

/// Loads settings from `path`. A missing file yields the defaults.
pub(crate) fn load(path: &Path) -> Result<AppSettings, SettingsError> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(AppSettings::default()),
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    ron::from_str(&content).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

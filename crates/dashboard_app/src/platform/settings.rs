use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dashboard_engine::{ApiSettings, EngineSettings, ReconnectPolicy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::logging::LogDestination;

const SETTINGS_FILENAME: &str = "dashboard.ron";
const SETTINGS_ENV: &str = "DASHBOARD_SETTINGS";
/// Floor for the poll interval and HTTP timeouts.
const MIN_INTERVAL_MS: u64 = 100;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("no settings file at {0:?}")]
    Missing(PathBuf),
    #[error("could not read {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("could not parse {path:?}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// Contents of `dashboard.ron`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_base_url: String,
    pub ws_url: String,
    /// Directory holding the durable job handle.
    pub state_dir: PathBuf,
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub max_logs: usize,
    pub notification_ms: u64,
    pub reconnect_base_ms: u64,
    pub reconnect_max_ms: u64,
    pub max_reconnect_attempts: u32,
    pub log_destination: LogDestination,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:4001/api".to_string(),
            ws_url: "ws://localhost:4001/ws".to_string(),
            state_dir: PathBuf::from("."),
            request_timeout_ms: 5000,
            connect_timeout_ms: 3000,
            poll_interval_ms: 2000,
            max_logs: 1000,
            notification_ms: 4000,
            reconnect_base_ms: 2000,
            reconnect_max_ms: 30_000,
            max_reconnect_attempts: 5,
            log_destination: LogDestination::File,
        }
    }
}

impl Settings {
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            api: ApiSettings {
                base_url: self.api_base_url.clone(),
                connect_timeout: Duration::from_millis(self.connect_timeout_ms.max(MIN_INTERVAL_MS)),
                request_timeout: Duration::from_millis(self.request_timeout_ms.max(MIN_INTERVAL_MS)),
            },
            ws_url: self.ws_url.clone(),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(MIN_INTERVAL_MS)),
            reconnect: ReconnectPolicy {
                base_delay: Duration::from_millis(self.reconnect_base_ms),
                max_delay: Duration::from_millis(self.reconnect_max_ms),
                max_attempts: self.max_reconnect_attempts,
            },
        }
    }

    pub fn notification_duration(&self) -> Duration {
        Duration::from_millis(self.notification_ms)
    }
}

/// `$DASHBOARD_SETTINGS` if set, otherwise `./dashboard.ron`.
pub fn settings_path() -> PathBuf {
    std::env::var_os(SETTINGS_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(SETTINGS_FILENAME))
}

pub fn read_settings(path: &Path) -> Result<Settings, SettingsError> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(SettingsError::Missing(path.to_path_buf()));
        }
        Err(source) => {
            return Err(SettingsError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    ron::from_str(&content).map_err(|err| SettingsError::Parse {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

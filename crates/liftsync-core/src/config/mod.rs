//! Client configuration.
//!
//! `SyncConfig` carries the engine's timing knobs. `RemoteConfig` is the
//! persisted connection profile (backend URL, keys, signed-in user) that the
//! CLI loads from the platform config directory and overlays with
//! environment variables.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::{is_http_url, normalize_text_option};

/// Default delay between periodic sync cycles.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Default bound on every individual remote call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub const ENV_SUPABASE_URL: &str = "LIFTSYNC_SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "LIFTSYNC_SUPABASE_ANON_KEY";
pub const ENV_ACCESS_TOKEN: &str = "LIFTSYNC_ACCESS_TOKEN";
pub const ENV_USER_ID: &str = "LIFTSYNC_USER_ID";
pub const ENV_DB_PATH: &str = "LIFTSYNC_DB_PATH";

const APP_DIR: &str = "liftsync";
const CONFIG_FILE: &str = "config.json";
const DATABASE_FILE: &str = "liftsync.db";

/// Timing configuration for the sync engine and scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Period of the background timer trigger.
    pub sync_interval: Duration,
    /// Upper bound on each remote call; expiry fails that call only.
    pub request_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_interval: DEFAULT_SYNC_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub const fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read or write config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Missing required setting '{0}'")]
    Missing(&'static str),
    #[error("Setting '{field}' must include http:// or https://")]
    InvalidUrl { field: &'static str },
}

/// Persisted connection profile for the remote backend.
///
/// The anon key and access token are credentials; `Debug` redacts them.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub sync_interval_secs: Option<u64>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "[REDACTED]");
        formatter
            .debug_struct("RemoteConfig")
            .field("supabase_url", &self.supabase_url)
            .field("supabase_anon_key", &redact(&self.supabase_anon_key))
            .field("access_token", &redact(&self.access_token))
            .field("user_id", &self.user_id)
            .field("database_path", &self.database_path)
            .field("sync_interval_secs", &self.sync_interval_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Validated backend endpoint and credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    /// Base project URL without a trailing slash.
    pub url: String,
    pub anon_key: String,
    pub access_token: String,
}

impl fmt::Debug for RemoteEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RemoteEndpoint")
            .field("url", &self.url)
            .field("anon_key", &"[REDACTED]")
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl RemoteConfig {
    /// `<config dir>/liftsync/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// `<local data dir>/liftsync/liftsync.db`
    pub fn default_database_path() -> Option<PathBuf> {
        dirs::data_local_dir().map(|dir| dir.join(APP_DIR).join(DATABASE_FILE))
    }

    /// Load a profile from `path`; a missing file yields the empty profile.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let payload = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, payload).map_err(io_error)
    }

    /// Overlay values from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup`; blank values are ignored.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key| normalize_text_option(lookup(key));
        if let Some(value) = get(ENV_SUPABASE_URL) {
            self.supabase_url = Some(value);
        }
        if let Some(value) = get(ENV_SUPABASE_ANON_KEY) {
            self.supabase_anon_key = Some(value);
        }
        if let Some(value) = get(ENV_ACCESS_TOKEN) {
            self.access_token = Some(value);
        }
        if let Some(value) = get(ENV_USER_ID) {
            self.user_id = Some(value);
        }
        if let Some(value) = get(ENV_DB_PATH) {
            self.database_path = Some(PathBuf::from(value));
        }
        self
    }

    /// Engine timing, falling back to the defaults for unset values.
    pub fn sync_config(&self) -> SyncConfig {
        let mut config = SyncConfig::default();
        if let Some(secs) = self.sync_interval_secs.filter(|secs| *secs > 0) {
            config = config.with_sync_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = self.request_timeout_secs.filter(|secs| *secs > 0) {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        config
    }

    pub fn user_id(&self) -> Result<String, ConfigError> {
        normalize_text_option(self.user_id.clone()).ok_or(ConfigError::Missing("user_id"))
    }

    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        self.database_path
            .clone()
            .or_else(Self::default_database_path)
            .ok_or(ConfigError::Missing("database_path"))
    }

    /// Validate the backend settings needed to talk to the remote.
    pub fn endpoint(&self) -> Result<RemoteEndpoint, ConfigError> {
        let url = normalize_text_option(self.supabase_url.clone())
            .ok_or(ConfigError::Missing("supabase_url"))?;
        if !is_http_url(&url) {
            return Err(ConfigError::InvalidUrl {
                field: "supabase_url",
            });
        }
        let anon_key = normalize_text_option(self.supabase_anon_key.clone())
            .ok_or(ConfigError::Missing("supabase_anon_key"))?;
        let access_token = normalize_text_option(self.access_token.clone())
            .ok_or(ConfigError::Missing("access_token"))?;

        Ok(RemoteEndpoint {
            url: url.trim_end_matches('/').to_string(),
            anon_key,
            access_token,
        })
    }
}

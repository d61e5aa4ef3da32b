use std::io;

use liftsync_core::config::ConfigError;
use liftsync_core::sync::RemoteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] liftsync_core::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No config directory found; pass --config")]
    NoConfigDir,
    #[error("Name cannot be empty")]
    EmptyName,
    #[error("ID cannot be empty")]
    EmptyId,
    #[error("Not found for id/prefix: {0}")]
    NotFound(String),
    #[error("{0}")]
    AmbiguousId(String),
    #[error("Remote rejected the access token. Update it with `liftsync config init --access-token`.")]
    AuthRejected,
    #[error("Sync finished with errors in {0} entity kind(s)")]
    SyncIncomplete(usize),
}

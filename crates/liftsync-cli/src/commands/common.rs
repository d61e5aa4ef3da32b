use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use liftsync_core::config::RemoteConfig;
use liftsync_core::db::{Database, EntityRepository};
use liftsync_core::models::{Record, SyncConflict, SyncEntity};
use liftsync_core::sync::{SupabaseRestBackend, SyncEngine};
use liftsync_core::util::normalize_text_option;
use serde::Serialize;

use crate::error::CliError;

/// Settings resolved from flags, the config file and the environment.
pub struct CliContext {
    pub config_path: PathBuf,
    pub config: RemoteConfig,
    pub db_path: PathBuf,
}

impl CliContext {
    /// Flags win over environment variables, which win over the config file.
    pub fn load(config_path: Option<PathBuf>, db_path: Option<PathBuf>) -> Result<Self, CliError> {
        let config_path = config_path
            .or_else(RemoteConfig::default_path)
            .ok_or(CliError::NoConfigDir)?;
        let config = RemoteConfig::load(&config_path)?.with_env_overrides();
        let db_path = match db_path {
            Some(path) => path,
            None => config.database_path()?,
        };
        Ok(Self {
            config_path,
            config,
            db_path,
        })
    }

    pub fn user_id(&self) -> Result<String, CliError> {
        Ok(self.config.user_id()?)
    }

    pub async fn open_database(&self) -> Result<Database, CliError> {
        open_database(&self.db_path).await
    }

    /// Engine wired to the configured backend.
    pub async fn engine(&self) -> Result<SyncEngine<SupabaseRestBackend>, CliError> {
        let endpoint = self.config.endpoint()?;
        let sync_config = self.config.sync_config();
        let backend = SupabaseRestBackend::new(&endpoint, sync_config.request_timeout)?;
        let database = Arc::new(self.open_database().await?);
        Ok(SyncEngine::new(database, backend, sync_config))
    }
}

pub async fn open_database(path: &Path) -> Result<Database, CliError> {
    Ok(Database::open(path).await?)
}

#[derive(Debug, Serialize)]
pub struct SyncConflictItem {
    pub id: i64,
    pub kind: String,
    pub row_id: String,
    pub local_modified_at: i64,
    pub incoming_modified_at: i64,
    pub resolved_at: i64,
    pub resolved_at_iso: String,
    pub strategy: String,
}

pub fn sync_conflict_to_item(conflict: &SyncConflict) -> SyncConflictItem {
    SyncConflictItem {
        id: conflict.id,
        kind: conflict.kind.to_string(),
        row_id: conflict.row_id.clone(),
        local_modified_at: conflict.local_modified_at,
        incoming_modified_at: conflict.incoming_modified_at,
        resolved_at: conflict.resolved_at,
        resolved_at_iso: format_timestamp_iso(conflict.resolved_at),
        strategy: conflict.strategy.clone(),
    }
}

pub fn format_sync_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {}  {}={}  local={}  incoming={}",
                format_sync_timestamp(conflict.resolved_at),
                conflict.strategy,
                conflict.kind,
                conflict.row_id,
                conflict.local_modified_at,
                conflict.incoming_modified_at
            )
        })
        .collect()
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |value| value.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

fn format_timestamp_iso(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .map_or_else(|| timestamp_ms.to_string(), |value| value.to_rfc3339())
}

/// Join positional words into one name; blank input is rejected.
pub fn join_name(parts: &[String]) -> Result<String, CliError> {
    normalize_text_option(Some(parts.join(" "))).ok_or(CliError::EmptyName)
}

pub fn normalize_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyId);
    }
    Ok(trimmed.to_ascii_lowercase())
}

/// Find the live row whose id equals or starts with `query`.
pub async fn resolve_record<E: SyncEntity>(
    repo: &EntityRepository<'_, E>,
    owner_id: &str,
    query: &str,
) -> Result<Record<E>, CliError> {
    let query = normalize_identifier(query)?;
    let mut matches = repo
        .list(owner_id)
        .await?
        .into_iter()
        .filter(|record| record.id.as_str().starts_with(&query))
        .collect::<Vec<_>>();

    match matches.len() {
        0 => Err(CliError::NotFound(query)),
        1 => Ok(matches.remove(0)),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|record| short_id(&record.id.as_str()))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousId(format!(
                "ID prefix '{query}' is ambiguous. Matches: {options}"
            )))
        }
    }
}

pub fn short_id(id: &str) -> String {
    id.chars().take(13).collect()
}

pub fn pending_marker(pending: bool) -> &'static str {
    if pending {
        " *"
    } else {
        ""
    }
}

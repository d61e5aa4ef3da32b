//! Conflict log for last-writer-wins resolutions

use crate::error::{Error, Result};
use crate::models::{EntityKind, SyncConflict};
use crate::util::unix_millis_now;
use libsql::{params, Connection};

const LWW_STRATEGY: &str = "lww";

/// Append-only record of pulled rows that lost to a local row.
pub struct ConflictRepository<'a> {
    conn: &'a Connection,
}

impl<'a> ConflictRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub async fn record(
        &self,
        kind: EntityKind,
        row_id: &str,
        local_modified_at: i64,
        incoming_modified_at: i64,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO sync_conflicts (
                    entity_kind, row_id, local_modified_at, incoming_modified_at, resolved_at, strategy
                 ) VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    kind.as_str(),
                    row_id,
                    local_modified_at,
                    incoming_modified_at,
                    unix_millis_now(),
                    LWW_STRATEGY
                ],
            )
            .await?;
        Ok(())
    }

    /// Most recent conflicts first.
    pub async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = self
            .conn
            .query(
                "SELECT id, entity_kind, row_id, local_modified_at, incoming_modified_at, resolved_at, strategy
                 FROM sync_conflicts
                 ORDER BY resolved_at DESC, id DESC
                 LIMIT ?",
                params![limit],
            )
            .await?;

        let mut conflicts = Vec::new();
        while let Some(row) = rows.next().await? {
            let kind: String = row.get(1)?;
            let kind = kind
                .parse::<EntityKind>()
                .map_err(|error| Error::corrupt("sync_conflicts", error))?;
            conflicts.push(SyncConflict {
                id: row.get(0)?,
                kind,
                row_id: row.get(2)?,
                local_modified_at: row.get(3)?,
                incoming_modified_at: row.get(4)?,
                resolved_at: row.get(5)?,
                strategy: row.get(6)?,
            });
        }
        Ok(conflicts)
    }
}

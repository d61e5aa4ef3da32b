//! Persisted per-user, per-kind pull cursors

use std::collections::BTreeMap;

use crate::error::Result;
use crate::models::EntityKind;
use libsql::{params, Connection};
use serde::Serialize;

/// Where incremental pulls for one kind resume, and when it last completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub kind: EntityKind,
    /// Largest remote `modified_at` seen so far (Unix ms).
    pub cursor: Option<i64>,
    /// Completion time of the last error-free cycle (Unix ms).
    pub last_synced_at: Option<i64>,
}

/// Trait for sync state storage operations (async)
#[allow(async_fn_in_trait)]
pub trait SyncStateRepository {
    /// Pull cursor for `user_id` and `kind`; `None` before the first sync.
    async fn cursor(&self, user_id: &str, kind: EntityKind) -> Result<Option<i64>>;

    /// Completion time of the last error-free cycle for `user_id` and `kind`.
    async fn last_synced(&self, user_id: &str, kind: EntityKind) -> Result<Option<i64>>;

    /// Record a completed cycle. The stored cursor never moves backwards.
    async fn advance(
        &self,
        user_id: &str,
        kind: EntityKind,
        cursor: Option<i64>,
        synced_at: i64,
    ) -> Result<()>;

    /// Status of every kind for `user_id`, including never-synced kinds.
    async fn statuses(&self, user_id: &str) -> Result<Vec<SyncStatus>>;

    /// Forget all cursors for `user_id` so the next cycle pulls everything.
    async fn reset(&self, user_id: &str) -> Result<()>;
}

/// libSQL implementation of `SyncStateRepository`
pub struct LibSqlSyncStateRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSyncStateRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SyncStateRepository for LibSqlSyncStateRepository<'_> {
    async fn cursor(&self, user_id: &str, kind: EntityKind) -> Result<Option<i64>> {
        let mut rows = self
            .conn
            .query(
                "SELECT cursor FROM sync_state WHERE user_id = ? AND entity_kind = ?",
                params![user_id, kind.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(row.get::<Option<i64>>(0)?),
            None => Ok(None),
        }
    }

    async fn last_synced(&self, user_id: &str, kind: EntityKind) -> Result<Option<i64>> {
        let mut rows = self
            .conn
            .query(
                "SELECT last_synced_at FROM sync_state WHERE user_id = ? AND entity_kind = ?",
                params![user_id, kind.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(row.get::<Option<i64>>(0)?),
            None => Ok(None),
        }
    }

    async fn advance(
        &self,
        user_id: &str,
        kind: EntityKind,
        cursor: Option<i64>,
        synced_at: i64,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO sync_state (user_id, entity_kind, cursor, last_synced_at)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(user_id, entity_kind) DO UPDATE SET
                    cursor = CASE
                        WHEN excluded.cursor IS NULL THEN sync_state.cursor
                        WHEN sync_state.cursor IS NULL THEN excluded.cursor
                        ELSE MAX(sync_state.cursor, excluded.cursor)
                    END,
                    last_synced_at = excluded.last_synced_at",
                params![user_id, kind.as_str(), cursor, synced_at],
            )
            .await?;
        Ok(())
    }

    async fn statuses(&self, user_id: &str) -> Result<Vec<SyncStatus>> {
        let mut rows = self
            .conn
            .query(
                "SELECT entity_kind, cursor, last_synced_at FROM sync_state WHERE user_id = ?",
                params![user_id],
            )
            .await?;

        let mut stored = BTreeMap::new();
        while let Some(row) = rows.next().await? {
            let name: String = row.get(0)?;
            // Rows for kinds this build no longer knows are ignored.
            if let Ok(kind) = name.parse::<EntityKind>() {
                stored.insert(kind, (row.get::<Option<i64>>(1)?, row.get::<Option<i64>>(2)?));
            }
        }

        Ok(EntityKind::ALL
            .into_iter()
            .map(|kind| {
                let (cursor, last_synced_at) = stored.get(&kind).copied().unwrap_or_default();
                SyncStatus {
                    kind,
                    cursor,
                    last_synced_at,
                }
            })
            .collect())
    }

    async fn reset(&self, user_id: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE sync_state SET cursor = NULL WHERE user_id = ?",
                params![user_id],
            )
            .await?;
        Ok(())
    }
}

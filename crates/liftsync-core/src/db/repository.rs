//! Entity repository: the mutation layer plus the row-level queries the
//! sync engine runs against the local store.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::NaiveDate;
use libsql::params::Params;
use libsql::{params, Connection, Row, Value};

use crate::error::{Error, Result};
use crate::models::columns::Columns;
use crate::models::{
    EntityId, EntityKind, Record, RemoteRow, RowState, ScheduledTraining, SyncEntity,
};
use crate::util::{format_date, unix_millis_now};

/// Callback invoked after every committed local write.
///
/// The trigger policy hands one of these out; the repository calls it
/// fire-and-forget and never waits on the sync it schedules.
pub type MutationHook = Arc<dyn Fn() + Send + Sync>;

/// Bookkeeping columns, selected ahead of the payload columns.
const META_COLUMNS: &str = "id, owner_id, modified_at, pending_sync, deleted";
const META_WIDTH: i32 = 5;

/// Result of reconciling one pulled remote row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Remote row was newer (or new) and replaced the local row.
    Applied,
    /// Local row was kept: it is newer or equal, or it has unpushed changes.
    KeptLocal { local_modified_at: i64, pending: bool },
    /// Row exists locally under another owner; never touched.
    ForeignOwner,
}

/// libSQL repository for one entity kind.
pub struct EntityRepository<'a, E> {
    conn: &'a Connection,
    hook: Option<MutationHook>,
    _entity: PhantomData<fn() -> E>,
}

impl<'a, E: SyncEntity> EntityRepository<'a, E> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            hook: None,
            _entity: PhantomData,
        }
    }

    /// Invoke `hook` after every successful create, update, or delete.
    #[must_use]
    pub fn with_hook(mut self, hook: MutationHook) -> Self {
        self.hook = Some(hook);
        self
    }

    fn table() -> &'static str {
        E::KIND.table()
    }

    fn select_sql(filter: &str) -> String {
        format!(
            "SELECT {META_COLUMNS}, {} FROM {} WHERE {filter}",
            E::COLUMNS.join(", "),
            Self::table()
        )
    }

    fn notify(&self) {
        if let Some(hook) = &self.hook {
            hook();
        }
    }

    /// Parse a record from a row selected with [`Self::select_sql`]
    fn parse_record(row: &Row) -> Result<Record<E>> {
        let mut meta = Columns::new(row, Self::table(), 0);
        let raw_id = meta.text()?;
        let id = raw_id
            .parse::<EntityId>()
            .map_err(|error| Error::corrupt(Self::table(), format!("id '{raw_id}': {error}")))?;
        let owner_id = meta.text()?;
        let modified_at = meta.integer()?;
        let pending_sync = meta.flag()?;
        let deleted = meta.flag()?;

        let state = if deleted {
            RowState::PendingDelete
        } else {
            RowState::Active(E::from_row(row, META_WIDTH)?)
        };

        Ok(Record {
            id,
            owner_id,
            modified_at,
            pending_sync,
            state,
        })
    }

    async fn query_records(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<Record<E>>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(Self::parse_record(&row)?);
        }
        Ok(records)
    }

    // ------------------------------------------------------------------
    // Mutation layer
    // ------------------------------------------------------------------

    /// Create a new row owned by `owner_id`, pending its first push.
    pub async fn create(&self, owner_id: &str, entity: E) -> Result<Record<E>> {
        let owner_id = owner_id.trim();
        if owner_id.is_empty() {
            return Err(Error::InvalidInput("owner_id must not be empty".into()));
        }

        let record = Record {
            id: EntityId::new(),
            owner_id: owner_id.to_string(),
            modified_at: unix_millis_now(),
            pending_sync: true,
            state: RowState::Active(entity),
        };

        let placeholders = vec!["?"; E::COLUMNS.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({META_COLUMNS}, {}) VALUES (?, ?, ?, 1, 0, {placeholders})",
            Self::table(),
            E::COLUMNS.join(", ")
        );

        let mut values = vec![
            Value::Text(record.id.as_str()),
            Value::Text(record.owner_id.clone()),
            Value::Integer(record.modified_at),
        ];
        if let RowState::Active(entity) = &record.state {
            values.extend(entity.to_values());
        }

        self.conn.execute(&sql, Params::Positional(values)).await?;
        tracing::debug!("Created {} {}", E::KIND, record.id);
        self.notify();
        Ok(record)
    }

    /// Get an active row by id; pending deletes read as absent.
    pub async fn get(&self, id: &EntityId) -> Result<Option<Record<E>>> {
        let sql = Self::select_sql("id = ? AND deleted = 0");
        Ok(self
            .query_records(&sql, params![id.as_str()])
            .await?
            .into_iter()
            .next())
    }

    /// List active rows for an owner, most recently modified first.
    pub async fn list(&self, owner_id: &str) -> Result<Vec<Record<E>>> {
        let sql = Self::select_sql("owner_id = ? AND deleted = 0 ORDER BY modified_at DESC");
        self.query_records(&sql, params![owner_id]).await
    }

    /// Apply `patch` to an active row and mark it pending.
    ///
    /// `modified_at` always moves forward, even when the wall clock has not
    /// advanced since the previous write.
    pub async fn update(&self, id: &EntityId, patch: impl FnOnce(&mut E)) -> Result<Record<E>> {
        let not_found = || Error::NotFound {
            kind: E::KIND.as_str(),
            id: id.to_string(),
        };

        let current = self.get(id).await?.ok_or_else(not_found)?;
        let RowState::Active(mut entity) = current.state else {
            return Err(not_found());
        };
        patch(&mut entity);

        let assignments = E::COLUMNS
            .iter()
            .map(|column| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {assignments}, modified_at = MAX(?, modified_at + 1), pending_sync = 1
             WHERE id = ? AND deleted = 0",
            Self::table()
        );

        let mut values = entity.to_values();
        values.push(Value::Integer(unix_millis_now()));
        values.push(Value::Text(id.as_str()));

        let changed = self.conn.execute(&sql, Params::Positional(values)).await?;
        if changed == 0 {
            return Err(not_found());
        }

        let updated = self.get(id).await?.ok_or_else(not_found)?;
        tracing::debug!("Updated {} {}", E::KIND, id);
        self.notify();
        Ok(updated)
    }

    /// Soft delete: the row disappears from reads at once and is removed
    /// for good after the delete has been pushed.
    pub async fn delete(&self, id: &EntityId) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET deleted = 1, pending_sync = 1, modified_at = MAX(?, modified_at + 1)
             WHERE id = ? AND deleted = 0",
            Self::table()
        );

        let changed = self
            .conn
            .execute(&sql, params![unix_millis_now(), id.as_str()])
            .await?;

        if changed == 0 {
            return Err(Error::NotFound {
                kind: E::KIND.as_str(),
                id: id.to_string(),
            });
        }

        tracing::debug!("Soft-deleted {} {}", E::KIND, id);
        self.notify();
        Ok(())
    }

    /// Number of rows with unpushed local changes, deletes included.
    pub async fn count_pending(&self, owner_id: &str) -> Result<u64> {
        count_pending(self.conn, E::KIND, owner_id).await
    }

    // ------------------------------------------------------------------
    // Sync engine queries
    // ------------------------------------------------------------------

    /// Every pending row for an owner, including pending deletes.
    pub(crate) async fn pending(&self, owner_id: &str) -> Result<Vec<Record<E>>> {
        let sql = Self::select_sql("owner_id = ? AND pending_sync = 1 ORDER BY modified_at ASC");
        self.query_records(&sql, params![owner_id]).await
    }

    /// Clear the pending flag after a successful upsert push.
    ///
    /// Only applies while the row still carries the pushed `modified_at`;
    /// a write that raced the push keeps the row pending.
    pub(crate) async fn mark_synced(&self, id: &EntityId, pushed_modified_at: i64) -> Result<bool> {
        let sql = format!(
            "UPDATE {} SET pending_sync = 0 WHERE id = ? AND modified_at = ? AND deleted = 0",
            Self::table()
        );
        let changed = self
            .conn
            .execute(&sql, params![id.as_str(), pushed_modified_at])
            .await?;
        Ok(changed > 0)
    }

    /// Physically remove a soft-deleted row once its remote delete succeeded.
    pub(crate) async fn purge_pushed_delete(
        &self,
        id: &EntityId,
        pushed_modified_at: i64,
    ) -> Result<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE id = ? AND deleted = 1 AND modified_at = ?",
            Self::table()
        );
        let changed = self
            .conn
            .execute(&sql, params![id.as_str(), pushed_modified_at])
            .await?;
        Ok(changed > 0)
    }

    /// Ids of the owner's rows that have no unpushed local changes.
    pub(crate) async fn synced_ids(&self, owner_id: &str) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT id FROM {} WHERE owner_id = ? AND pending_sync = 0",
            Self::table()
        );
        let mut rows = self.conn.query(&sql, params![owner_id]).await?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get::<String>(0)?);
        }
        Ok(ids)
    }

    /// Remove a row that no longer exists remotely.
    ///
    /// The `pending_sync = 0` guard is evaluated by the delete itself, so a
    /// row written locally since [`Self::synced_ids`] ran survives.
    pub(crate) async fn purge_if_synced(&self, owner_id: &str, id: &str) -> Result<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE id = ? AND owner_id = ? AND pending_sync = 0",
            Self::table()
        );
        let changed = self.conn.execute(&sql, params![id, owner_id]).await?;
        Ok(changed > 0)
    }

    /// Reconcile one pulled row under last-writer-wins.
    ///
    /// Inserts when the row is new locally; otherwise replaces it only if the
    /// remote `modified_at` is strictly newer and the local row has no
    /// unpushed changes. Ties keep the local row. The comparison happens
    /// inside a single upsert statement.
    pub(crate) async fn apply_remote(&self, remote: &RemoteRow<E>) -> Result<ApplyOutcome> {
        let table = Self::table();
        let columns = E::COLUMNS.join(", ");
        let placeholders = vec!["?"; E::COLUMNS.len()].join(", ");
        let assignments = E::COLUMNS
            .iter()
            .map(|column| format!("{column} = excluded.{column}"))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "INSERT INTO {table} ({META_COLUMNS}, {columns}) VALUES (?, ?, ?, 0, 0, {placeholders})
             ON CONFLICT(id) DO UPDATE SET
                modified_at = excluded.modified_at,
                pending_sync = 0,
                deleted = 0,
                {assignments}
             WHERE excluded.modified_at > {table}.modified_at
               AND {table}.pending_sync = 0
               AND excluded.owner_id = {table}.owner_id"
        );

        let mut values = vec![
            Value::Text(remote.id.as_str()),
            Value::Text(remote.owner_id.clone()),
            Value::Integer(remote.modified_at),
        ];
        values.extend(remote.data.to_values());

        let changed = self.conn.execute(&sql, Params::Positional(values)).await?;
        if changed > 0 {
            return Ok(ApplyOutcome::Applied);
        }

        let sql = format!("SELECT owner_id, modified_at, pending_sync FROM {table} WHERE id = ?");
        let mut rows = self.conn.query(&sql, params![remote.id.as_str()]).await?;
        let Some(row) = rows.next().await? else {
            return Err(Error::NotFound {
                kind: E::KIND.as_str(),
                id: remote.id.to_string(),
            });
        };
        let mut cols = Columns::new(&row, table, 0);
        let owner_id = cols.text()?;
        let local_modified_at = cols.integer()?;
        let pending = cols.flag()?;

        if owner_id == remote.owner_id {
            Ok(ApplyOutcome::KeptLocal {
                local_modified_at,
                pending,
            })
        } else {
            Ok(ApplyOutcome::ForeignOwner)
        }
    }
}

/// Pending row count for one kind, without naming its payload type.
pub async fn count_pending(conn: &Connection, kind: EntityKind, owner_id: &str) -> Result<u64> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE owner_id = ? AND pending_sync = 1",
        kind.table()
    );
    let mut rows = conn.query(&sql, params![owner_id]).await?;
    let count = match rows.next().await? {
        Some(row) => u64::try_from(row.get::<i64>(0)?).unwrap_or_default(),
        None => 0,
    };
    Ok(count)
}

impl EntityRepository<'_, ScheduledTraining> {
    /// Trainings scheduled today or later, soonest first.
    ///
    /// `scheduled_on` is date-only text, so the bound is rendered date-only
    /// too; a timestamp bound would exclude rows scheduled for today.
    pub async fn list_upcoming(
        &self,
        owner_id: &str,
        today: NaiveDate,
    ) -> Result<Vec<Record<ScheduledTraining>>> {
        let sql = Self::select_sql(
            "owner_id = ? AND deleted = 0 AND scheduled_on >= ? ORDER BY scheduled_on ASC, id ASC",
        );
        self.query_records(&sql, params![owner_id, format_date(today)])
            .await
    }
}

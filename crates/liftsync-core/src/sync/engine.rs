//! Push/pull reconciliation between the local store and the remote backend.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;

use super::remote::{RemoteBackend, RemoteError, RemoteResult};
use super::report::{EntitySyncReport, FailureKind, SyncResult};
use crate::config::SyncConfig;
use crate::db::{
    ApplyOutcome, ConflictRepository, Database, EntityRepository, LibSqlSyncStateRepository,
    SyncStateRepository,
};
use crate::models::{
    BodyMeasurement, Cycle, EntityKind, Exercise, Goal, Profile, Record, RemoteRow,
    ScheduledTraining, StrengthTest, SyncEntity, Workout,
};
use crate::util::unix_millis_now;

/// Where the pull phase starts reading remote changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PullMode {
    /// From the persisted cursor.
    Incremental,
    /// From the beginning, ignoring the cursor.
    Full,
}

/// Anything that ends an entity cycle early.
enum Abort {
    Remote(RemoteError),
    Local(crate::Error),
}

impl From<RemoteError> for Abort {
    fn from(error: RemoteError) -> Self {
        Self::Remote(error)
    }
}

impl From<crate::Error> for Abort {
    fn from(error: crate::Error) -> Self {
        Self::Local(error)
    }
}

impl Abort {
    fn record(self, kind: EntityKind, report: &mut EntitySyncReport) {
        match self {
            Self::Remote(error) => {
                let failure = if error.is_auth() {
                    FailureKind::Unauthorized
                } else {
                    FailureKind::Transient
                };
                tracing::warn!("Sync of {kind} stopped: {error}");
                report.fail(failure, error.to_string());
            }
            Self::Local(error) => {
                tracing::warn!("Sync of {kind} stopped on local store error: {error}");
                report.fail(FailureKind::Local, error.to_string());
            }
        }
    }
}

/// Runs sync cycles for one local store against one remote backend.
///
/// Each entity kind is reconciled independently and concurrently: push
/// first, then pull. A failure in one kind never affects the others, and
/// remote failures never surface as errors; they land in the returned
/// [`SyncResult`].
pub struct SyncEngine<B> {
    database: Arc<Database>,
    remote: B,
    config: SyncConfig,
}

impl<B: RemoteBackend> SyncEngine<B> {
    pub const fn new(database: Arc<Database>, remote: B, config: SyncConfig) -> Self {
        Self {
            database,
            remote,
            config,
        }
    }

    pub const fn database(&self) -> &Arc<Database> {
        &self.database
    }

    pub const fn remote(&self) -> &B {
        &self.remote
    }

    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Incremental cycle: pulls only rows changed since each kind's cursor.
    pub async fn sync(&self, user_id: &str) -> SyncResult {
        self.run(user_id, PullMode::Incremental).await
    }

    /// Full cycle: pulls every remote row regardless of cursors.
    pub async fn sync_all(&self, user_id: &str) -> SyncResult {
        self.run(user_id, PullMode::Full).await
    }

    async fn run(&self, user_id: &str, mode: PullMode) -> SyncResult {
        let started = Instant::now();
        let user_id = user_id.trim();
        let mut result = SyncResult::default();

        if user_id.is_empty() {
            for kind in EntityKind::ALL {
                let mut report = EntitySyncReport::default();
                report.fail(FailureKind::Local, "no signed-in user");
                result.insert(kind, report);
            }
            return result;
        }

        let cycles = EntityKind::ALL
            .into_iter()
            .map(|kind| async move { (kind, self.sync_kind(kind, user_id, mode).await) });
        for (kind, report) in join_all(cycles).await {
            result.insert(kind, report);
        }

        tracing::info!(
            "Sync {} for {user_id} finished in {} ms: {result}",
            if mode == PullMode::Full { "(full)" } else { "(incremental)" },
            started.elapsed().as_millis()
        );
        result
    }

    async fn sync_kind(&self, kind: EntityKind, user_id: &str, mode: PullMode) -> EntitySyncReport {
        match kind {
            EntityKind::Workout => self.sync_entity::<Workout>(user_id, mode).await,
            EntityKind::Exercise => self.sync_entity::<Exercise>(user_id, mode).await,
            EntityKind::Cycle => self.sync_entity::<Cycle>(user_id, mode).await,
            EntityKind::Goal => self.sync_entity::<Goal>(user_id, mode).await,
            EntityKind::BodyMeasurement => {
                self.sync_entity::<BodyMeasurement>(user_id, mode).await
            }
            EntityKind::StrengthTest => self.sync_entity::<StrengthTest>(user_id, mode).await,
            EntityKind::ScheduledTraining => {
                self.sync_entity::<ScheduledTraining>(user_id, mode).await
            }
            EntityKind::Profile => self.sync_entity::<Profile>(user_id, mode).await,
        }
    }

    async fn sync_entity<E: SyncEntity>(&self, user_id: &str, mode: PullMode) -> EntitySyncReport {
        let conn = self.database.connection();
        let repo = EntityRepository::<E>::new(conn);
        let mut report = EntitySyncReport::default();

        if let Err(abort) = self.push(&repo, user_id, &mut report).await {
            // Auth failures and local errors skip the pull entirely.
            abort.record(E::KIND, &mut report);
            return report;
        }

        let cursor = match self.pull(&repo, user_id, mode, &mut report).await {
            Ok(cursor) => cursor,
            Err(abort) => {
                abort.record(E::KIND, &mut report);
                return report;
            }
        };

        if report.is_ok() {
            let state = LibSqlSyncStateRepository::new(conn);
            if let Err(error) = state
                .advance(user_id, E::KIND, cursor, unix_millis_now())
                .await
            {
                Abort::Local(error).record(E::KIND, &mut report);
            }
        }

        tracing::debug!(
            "Synced {}: pushed {}, pulled {}, deleted {}",
            E::KIND,
            report.pushed,
            report.pulled,
            report.deleted
        );
        report
    }

    /// Bound a remote call by the configured request timeout.
    async fn call<T>(&self, request: impl Future<Output = RemoteResult<T>>) -> RemoteResult<T> {
        let timeout = self.config.request_timeout;
        tokio::time::timeout(timeout, request)
            .await
            .unwrap_or_else(|_| Err(RemoteError::Timeout(timeout.as_millis())))
    }

    /// Push every pending row. Row failures are recorded and skipped; an
    /// auth failure or a local error aborts the kind.
    async fn push<E: SyncEntity>(
        &self,
        repo: &EntityRepository<'_, E>,
        user_id: &str,
        report: &mut EntitySyncReport,
    ) -> Result<(), Abort> {
        for record in repo.pending(user_id).await? {
            let outcome = if record.is_pending_delete() {
                self.push_delete(repo, &record).await
            } else {
                self.push_upsert(repo, &record).await
            };

            match outcome {
                Ok(()) => report.pushed += 1,
                Err(Abort::Remote(error)) if !error.is_auth() => {
                    tracing::warn!("Push of {} {} failed: {error}", E::KIND, record.id);
                    report.fail(FailureKind::Transient, error.to_string());
                }
                Err(abort) => return Err(abort),
            }
        }
        Ok(())
    }

    async fn push_upsert<E: SyncEntity>(
        &self,
        repo: &EntityRepository<'_, E>,
        record: &Record<E>,
    ) -> Result<(), Abort> {
        let Some(row) = RemoteRow::from_record(record) else {
            return Ok(());
        };
        let payload = row.to_json()?;
        self.call(self.remote.upsert_one(E::KIND, &payload)).await?;

        if !repo.mark_synced(&record.id, record.modified_at).await? {
            tracing::debug!(
                "{} {} changed during push; it stays pending",
                E::KIND,
                record.id
            );
        }
        Ok(())
    }

    async fn push_delete<E: SyncEntity>(
        &self,
        repo: &EntityRepository<'_, E>,
        record: &Record<E>,
    ) -> Result<(), Abort> {
        let id = record.id.as_str();
        self.call(self.remote.delete_one(E::KIND, &id)).await?;

        if repo
            .purge_pushed_delete(&record.id, record.modified_at)
            .await?
        {
            tracing::debug!("Purged pushed delete of {} {id}", E::KIND);
        }
        Ok(())
    }

    /// Detect remote deletions, then apply remote changes. Returns the new
    /// cursor: the largest remote `modified_at` seen, never below the old one.
    async fn pull<E: SyncEntity>(
        &self,
        repo: &EntityRepository<'_, E>,
        user_id: &str,
        mode: PullMode,
        report: &mut EntitySyncReport,
    ) -> Result<Option<i64>, Abort> {
        let conn = self.database.connection();
        let previous = match mode {
            PullMode::Incremental => {
                LibSqlSyncStateRepository::new(conn)
                    .cursor(user_id, E::KIND)
                    .await?
            }
            PullMode::Full => None,
        };

        let remote_ids = self
            .call(self.remote.list_ids(E::KIND, user_id))
            .await?
            .into_iter()
            .collect::<HashSet<_>>();

        for id in repo.synced_ids(user_id).await? {
            if !remote_ids.contains(&id) && repo.purge_if_synced(user_id, &id).await? {
                tracing::debug!("Removed {} {id}: deleted remotely", E::KIND);
                report.deleted += 1;
            }
        }

        let changed = self
            .call(self.remote.list_changed_since(E::KIND, user_id, previous))
            .await?;

        let conflicts = ConflictRepository::new(conn);
        let mut cursor = previous;
        for value in changed {
            let row = match RemoteRow::<E>::from_json(value) {
                Ok(row) => row,
                Err(error) => {
                    tracing::warn!("Skipping undecodable remote {}: {error}", E::KIND);
                    report.fail(
                        FailureKind::Transient,
                        format!("invalid remote {}: {error}", E::KIND),
                    );
                    continue;
                }
            };
            if row.owner_id != user_id {
                tracing::warn!("Ignoring remote {} {} of another owner", E::KIND, row.id);
                continue;
            }

            cursor = Some(cursor.map_or(row.modified_at, |current| current.max(row.modified_at)));

            match repo.apply_remote(&row).await? {
                ApplyOutcome::Applied => {
                    tracing::debug!("Applied remote {} {}", E::KIND, row.id);
                    report.pulled += 1;
                }
                ApplyOutcome::KeptLocal {
                    local_modified_at,
                    pending,
                } => {
                    // Equal timestamps are the echo of our own push, including one
                    // whose acknowledgement was lost to a timeout.
                    if local_modified_at == row.modified_at {
                        continue;
                    }
                    tracing::debug!(
                        "Kept local {} {} (local {local_modified_at}, remote {}, pending {pending})",
                        E::KIND,
                        row.id,
                        row.modified_at
                    );
                    if let Err(error) = conflicts
                        .record(E::KIND, &row.id.as_str(), local_modified_at, row.modified_at)
                        .await
                    {
                        tracing::warn!("Failed to log sync conflict: {error}");
                    }
                }
                ApplyOutcome::ForeignOwner => {
                    tracing::warn!(
                        "Local {} {} belongs to another owner; remote row ignored",
                        E::KIND,
                        row.id
                    );
                }
            }
        }

        Ok(cursor)
    }
}

//! Outcome of a sync cycle.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::models::EntityKind;

/// Why an entity cycle ended with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network, timeout, or server error. The next trigger retries.
    Transient,
    /// Credentials were rejected. Needs the user to sign in again.
    Unauthorized,
    /// The local store failed.
    Local,
}

/// Counts and failure for one entity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntitySyncReport {
    /// Remote upserts and remote deletes that succeeded.
    pub pushed: u64,
    /// Remote rows applied to the local store.
    pub pulled: u64,
    /// Local rows purged because they vanished remotely.
    pub deleted: u64,
    /// First error of the cycle, if any.
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
}

impl EntitySyncReport {
    pub const fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Record `message` unless an earlier error is already recorded.
    pub(crate) fn fail(&mut self, failure: FailureKind, message: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some(message.into());
            self.failure = Some(failure);
        }
    }
}

/// Per-kind results of one `sync` call, in [`EntityKind::ALL`] order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SyncResult {
    entities: BTreeMap<EntityKind, EntitySyncReport>,
}

impl SyncResult {
    pub fn insert(&mut self, kind: EntityKind, report: EntitySyncReport) {
        self.entities.insert(kind, report);
    }

    pub fn get(&self, kind: EntityKind) -> Option<&EntitySyncReport> {
        self.entities.get(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityKind, &EntitySyncReport)> {
        self.entities.iter().map(|(kind, report)| (*kind, report))
    }

    /// True when every kind completed without error.
    pub fn is_ok(&self) -> bool {
        self.entities.values().all(EntitySyncReport::is_ok)
    }

    pub fn has_auth_failure(&self) -> bool {
        self.entities
            .values()
            .any(|report| report.failure == Some(FailureKind::Unauthorized))
    }

    pub fn total_pushed(&self) -> u64 {
        self.entities.values().map(|report| report.pushed).sum()
    }

    pub fn total_pulled(&self) -> u64 {
        self.entities.values().map(|report| report.pulled).sum()
    }

    pub fn total_deleted(&self) -> u64 {
        self.entities.values().map(|report| report.deleted).sum()
    }
}

impl fmt::Display for SyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pushed {}, pulled {}, deleted {}",
            self.total_pushed(),
            self.total_pulled(),
            self.total_deleted()
        )?;
        let failed = self
            .entities
            .iter()
            .filter(|(_, report)| !report.is_ok())
            .count();
        if failed > 0 {
            write!(f, ", {failed} kind(s) failed")?;
        }
        Ok(())
    }
}

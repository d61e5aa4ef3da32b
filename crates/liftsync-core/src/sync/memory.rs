//! In-process [`RemoteBackend`] with failure injection.
//!
//! Several local stores can share one `MemoryBackend` (behind an `Arc`) to
//! act as multiple devices of the same user.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::remote::{RemoteBackend, RemoteError, RemoteResult};
use crate::models::EntityKind;

/// Number of calls received per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub upserts: u64,
    pub deletes: u64,
    pub list_ids: u64,
    pub list_changed: u64,
}

impl CallCounts {
    pub const fn total(&self) -> u64 {
        self.upserts + self.deletes + self.list_ids + self.list_changed
    }
}

#[derive(Default)]
struct State {
    tables: HashMap<EntityKind, BTreeMap<String, Value>>,
    offline: bool,
    rejected_kinds: HashMap<EntityKind, RemoteError>,
    failing_rows: HashSet<String>,
    latency: Option<Duration>,
    calls: CallCounts,
}

#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every call fails with a network error while offline.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Every call for `kind` fails with `error` until cleared.
    pub fn reject_kind(&self, kind: EntityKind, error: RemoteError) {
        self.state().rejected_kinds.insert(kind, error);
    }

    pub fn clear_rejections(&self) {
        self.state().rejected_kinds.clear();
    }

    /// Upserts and deletes of this row id fail with a server error.
    pub fn fail_row(&self, id: impl Into<String>) {
        self.state().failing_rows.insert(id.into());
    }

    pub fn clear_row_failures(&self) {
        self.state().failing_rows.clear();
    }

    /// Delay applied to every call before it is answered.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state().latency = latency;
    }

    pub fn call_counts(&self) -> CallCounts {
        self.state().calls
    }

    /// Write a row directly, as another client would.
    pub fn put_row(&self, kind: EntityKind, row: Value) {
        if let Some(id) = row.get("id").and_then(Value::as_str) {
            let id = id.to_string();
            self.state().tables.entry(kind).or_default().insert(id, row);
        }
    }

    /// Remove a row directly, as another client would.
    pub fn remove_row(&self, kind: EntityKind, id: &str) {
        if let Some(table) = self.state().tables.get_mut(&kind) {
            table.remove(id);
        }
    }

    pub fn row(&self, kind: EntityKind, id: &str) -> Option<Value> {
        self.state()
            .tables
            .get(&kind)
            .and_then(|table| table.get(id).cloned())
    }

    /// All rows of `kind`, ordered by id.
    pub fn rows(&self, kind: EntityKind) -> Vec<Value> {
        self.state()
            .tables
            .get(&kind)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Apply injected latency and failures shared by every call.
    async fn enter(
        &self,
        kind: EntityKind,
        count: impl FnOnce(&mut CallCounts),
    ) -> RemoteResult<()> {
        let latency = {
            let mut state = self.state();
            count(&mut state.calls);
            state.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let state = self.state();
        if state.offline {
            return Err(RemoteError::Network("backend unreachable".to_string()));
        }
        if let Some(error) = state.rejected_kinds.get(&kind) {
            return Err(error.clone());
        }
        Ok(())
    }

    fn check_row(&self, id: &str) -> RemoteResult<()> {
        if self.state().failing_rows.contains(id) {
            Err(RemoteError::Api {
                status: 500,
                message: format!("row {id} rejected"),
            })
        } else {
            Ok(())
        }
    }
}

fn owner_of(row: &Value) -> Option<&str> {
    row.get("owner_id").and_then(Value::as_str)
}

fn modified_at_of(row: &Value) -> i64 {
    row.get("modified_at").and_then(Value::as_i64).unwrap_or(0)
}

#[async_trait]
impl RemoteBackend for MemoryBackend {
    async fn upsert_one(&self, kind: EntityKind, row: &Value) -> RemoteResult<()> {
        self.enter(kind, |calls| calls.upserts += 1).await?;
        let id = row
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| RemoteError::Payload("row is missing a string id".to_string()))?;
        self.check_row(id)?;

        self.state()
            .tables
            .entry(kind)
            .or_default()
            .insert(id.to_string(), row.clone());
        Ok(())
    }

    async fn delete_one(&self, kind: EntityKind, id: &str) -> RemoteResult<()> {
        self.enter(kind, |calls| calls.deletes += 1).await?;
        self.check_row(id)?;
        self.remove_row(kind, id);
        Ok(())
    }

    async fn list_ids(&self, kind: EntityKind, owner_id: &str) -> RemoteResult<Vec<String>> {
        self.enter(kind, |calls| calls.list_ids += 1).await?;
        Ok(self
            .rows(kind)
            .iter()
            .filter(|row| owner_of(row) == Some(owner_id))
            .filter_map(|row| row.get("id").and_then(Value::as_str).map(str::to_string))
            .collect())
    }

    async fn list_changed_since(
        &self,
        kind: EntityKind,
        owner_id: &str,
        since: Option<i64>,
    ) -> RemoteResult<Vec<Value>> {
        self.enter(kind, |calls| calls.list_changed += 1).await?;
        let mut rows = self
            .rows(kind)
            .into_iter()
            .filter(|row| owner_of(row) == Some(owner_id))
            .filter(|row| since.is_none_or(|since| modified_at_of(row) > since))
            .collect::<Vec<_>>();
        rows.sort_by_key(modified_at_of);
        Ok(rows)
    }
}

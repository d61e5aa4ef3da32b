//! Sync conflict model

use serde::{Deserialize, Serialize};

use super::EntityKind;

/// A pulled remote row that lost to the local row under last-writer-wins.
///
/// Conflicts are resolved silently; this record exists only so the outcome
/// can be inspected after the fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Conflict row identifier
    pub id: i64,
    /// Kind of the row involved
    pub kind: EntityKind,
    /// Row involved in the conflict
    pub row_id: String,
    /// Local row's `modified_at` when the conflict occurred
    pub local_modified_at: i64,
    /// Incoming row's `modified_at` that was rejected
    pub incoming_modified_at: i64,
    /// Resolution timestamp (unix ms)
    pub resolved_at: i64,
    /// Resolution strategy name
    pub strategy: String,
}

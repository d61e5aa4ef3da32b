//! The syncable row shape shared by every entity kind.

use std::fmt::Debug;

use libsql::{Row, Value};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{EntityId, EntityKind};
use crate::error::Result;

/// Payload of one synchronized entity kind.
///
/// Implementors describe only their own fields; the bookkeeping columns
/// (`id`, `owner_id`, `modified_at`, `pending_sync`, `deleted`) are handled
/// generically by the repository and the sync engine.
pub trait SyncEntity:
    Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Kind tag for this payload.
    const KIND: EntityKind;

    /// Payload columns, in the order of [`SyncEntity::to_values`] and
    /// [`SyncEntity::from_row`].
    const COLUMNS: &'static [&'static str];

    /// Encode the payload as column values.
    fn to_values(&self) -> Vec<Value>;

    /// Decode the payload from `row`, starting at column `start`.
    fn from_row(row: &Row, start: i32) -> Result<Self>;
}

/// Lifecycle of a locally stored row.
///
/// A purged row is simply absent, so only the two stored states exist here.
/// A pending delete carries no payload: its content is never read again.
#[derive(Debug, Clone, PartialEq)]
pub enum RowState<E> {
    /// Live row with its current payload.
    Active(E),
    /// Soft-deleted locally; removed for good once the delete is pushed.
    PendingDelete,
}

/// A local row together with its sync bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<E> {
    pub id: EntityId,
    pub owner_id: String,
    /// Last local or remote modification (Unix ms); the only input to
    /// conflict resolution.
    pub modified_at: i64,
    /// Local changes not yet confirmed pushed.
    pub pending_sync: bool,
    pub state: RowState<E>,
}

impl<E> Record<E> {
    /// Payload of an active row.
    pub const fn entity(&self) -> Option<&E> {
        match &self.state {
            RowState::Active(entity) => Some(entity),
            RowState::PendingDelete => None,
        }
    }

    pub const fn is_pending_delete(&self) -> bool {
        matches!(self.state, RowState::PendingDelete)
    }
}

/// Wire shape of a row on the remote backend: bookkeeping plus the payload
/// fields flattened into the same JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRow<E> {
    pub id: EntityId,
    pub owner_id: String,
    pub modified_at: i64,
    #[serde(flatten)]
    pub data: E,
}

impl<E: SyncEntity> RemoteRow<E> {
    /// Build the push payload for an active local record.
    pub fn from_record(record: &Record<E>) -> Option<Self> {
        record.entity().map(|data| Self {
            id: record.id,
            owner_id: record.owner_id.clone(),
            modified_at: record.modified_at,
            data: data.clone(),
        })
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

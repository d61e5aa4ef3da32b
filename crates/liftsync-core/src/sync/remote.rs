//! The remote backend seen by the sync engine.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::EntityKind;

/// Failure of one remote call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Transport failure: DNS, connection refused, offline, TLS.
    #[error("Network error: {0}")]
    Network(String),
    /// The call exceeded the configured request timeout.
    #[error("Remote call timed out after {0} ms")]
    Timeout(u128),
    /// Credentials were rejected. Retrying will not help until the user
    /// signs in again.
    #[error("Remote rejected credentials: {0}")]
    Unauthorized(String),
    /// Any other non-success response.
    #[error("Remote API error: {message}")]
    Api { status: u16, message: String },
    /// A response or request body could not be (de)serialized.
    #[error("Invalid remote payload: {0}")]
    Payload(String),
}

impl RemoteError {
    /// Authentication failures abort the rest of an entity cycle.
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Row-level operations against the managed relational backend.
///
/// Rows travel as JSON objects carrying `id`, `owner_id`, `modified_at`, and
/// the entity's payload columns. Implementations must scope every call to
/// the given owner; the engine never asks for rows of another user.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Insert or replace one row, keyed by its `id`.
    async fn upsert_one(&self, kind: EntityKind, row: &serde_json::Value) -> RemoteResult<()>;

    /// Delete one row by id. Deleting an absent row succeeds.
    async fn delete_one(&self, kind: EntityKind, id: &str) -> RemoteResult<()>;

    /// Ids of every row of `kind` owned by `owner_id`.
    async fn list_ids(&self, kind: EntityKind, owner_id: &str) -> RemoteResult<Vec<String>>;

    /// Rows of `kind` owned by `owner_id` with `modified_at > since`, or all
    /// of them when `since` is `None`.
    async fn list_changed_since(
        &self,
        kind: EntityKind,
        owner_id: &str,
        since: Option<i64>,
    ) -> RemoteResult<Vec<serde_json::Value>>;
}

#[async_trait]
impl<B: RemoteBackend + ?Sized> RemoteBackend for std::sync::Arc<B> {
    async fn upsert_one(&self, kind: EntityKind, row: &serde_json::Value) -> RemoteResult<()> {
        (**self).upsert_one(kind, row).await
    }

    async fn delete_one(&self, kind: EntityKind, id: &str) -> RemoteResult<()> {
        (**self).delete_one(kind, id).await
    }

    async fn list_ids(&self, kind: EntityKind, owner_id: &str) -> RemoteResult<Vec<String>> {
        (**self).list_ids(kind, owner_id).await
    }

    async fn list_changed_since(
        &self,
        kind: EntityKind,
        owner_id: &str,
        since: Option<i64>,
    ) -> RemoteResult<Vec<serde_json::Value>> {
        (**self).list_changed_since(kind, owner_id, since).await
    }
}

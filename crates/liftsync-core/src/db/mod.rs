//! Database layer for liftsync

mod conflict_repository;
mod connection;
mod migrations;
mod repository;
mod sync_state_repository;

pub use conflict_repository::ConflictRepository;
pub use connection::Database;
pub use repository::{count_pending, ApplyOutcome, EntityRepository, MutationHook};
pub use sync_state_repository::{LibSqlSyncStateRepository, SyncStateRepository, SyncStatus};

//! liftsync-core - Core library for liftsync
//!
//! This crate contains the training-log entities, the local libSQL store and
//! its mutation layer, and the offline-first sync engine used by every
//! liftsync client.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod sync;
pub mod util;

pub use config::{RemoteConfig, SyncConfig};
pub use db::{Database, EntityRepository, MutationHook};
pub use error::{Error, Result};
pub use models::{EntityId, EntityKind, Record, SyncEntity};
pub use sync::{RemoteBackend, SyncEngine, SyncResult, SyncTrigger};

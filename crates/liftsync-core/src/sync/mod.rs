//! Offline-first synchronization with the remote backend.
//!
//! [`SyncEngine`] reconciles the local store with a [`RemoteBackend`]: per
//! entity kind it pushes pending local rows, then pulls remote changes under
//! last-writer-wins. [`SyncTrigger`] decides when cycles run.

mod engine;
mod memory;
mod postgrest;
mod remote;
mod report;
mod trigger;

pub use engine::SyncEngine;
pub use memory::{CallCounts, MemoryBackend};
pub use postgrest::SupabaseRestBackend;
pub use remote::{RemoteBackend, RemoteError, RemoteResult};
pub use report::{EntitySyncReport, FailureKind, SyncResult};
pub use trigger::{
    SyncPhase, SyncRunner, SyncScheduler, SyncTrigger, TriggerOutcome, TriggerReason, UserSync,
};

//! Data models for liftsync

pub(crate) mod columns;
mod cycle;
mod exercise;
mod goal;
mod id;
mod kind;
mod measurement;
mod profile;
mod record;
mod scheduled_training;
mod sync_conflict;
mod workout;

pub use cycle::Cycle;
pub use exercise::Exercise;
pub use goal::Goal;
pub use id::EntityId;
pub use kind::EntityKind;
pub use measurement::BodyMeasurement;
pub use profile::{Profile, UnitSystem};
pub use record::{Record, RemoteRow, RowState, SyncEntity};
pub use scheduled_training::ScheduledTraining;
pub use strength_test::StrengthTest;
pub use sync_conflict::SyncConflict;
pub use workout::Workout;

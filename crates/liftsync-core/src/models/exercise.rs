//! Exercise model

use libsql::{Row, Value};
use serde::{Deserialize, Serialize};

use super::columns::{self, Columns};
use super::{EntityId, EntityKind, SyncEntity};
use crate::error::Result;

/// One exercise entry, optionally attached to a workout.
///
/// The workout link is informational only; the sync layer enforces no
/// foreign keys between kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    #[serde(default)]
    pub workout_id: Option<EntityId>,
    pub name: String,
    pub sets: i64,
    pub reps: i64,
    #[serde(default)]
    pub weight_kg: Option<f64>,
}

impl SyncEntity for Exercise {
    const KIND: EntityKind = EntityKind::Exercise;
    const COLUMNS: &'static [&'static str] = &["workout_id", "name", "sets", "reps", "weight_kg"];

    fn to_values(&self) -> Vec<Value> {
        vec![
            columns::opt_text(self.workout_id.map(|id| id.as_str()).as_deref()),
            columns::text(&self.name),
            columns::integer(self.sets),
            columns::integer(self.reps),
            columns::opt_real(self.weight_kg),
        ]
    }

    fn from_row(row: &Row, start: i32) -> Result<Self> {
        let mut cols = Columns::new(row, Self::KIND.table(), start);
        let workout_id = cols
            .opt_text()?
            .and_then(|raw| raw.parse::<EntityId>().ok());
        Ok(Self {
            workout_id,
            name: cols.text()?,
            sets: cols.integer()?,
            reps: cols.integer()?,
            weight_kg: cols.opt_real()?,
        })
    }
}

//! Scheduled training model

use chrono::NaiveDate;
use libsql::{Row, Value};
use serde::{Deserialize, Serialize};

use super::columns::{self, Columns};
use super::{EntityId, EntityKind, SyncEntity};
use crate::error::Result;

/// A training planned for a calendar day.
///
/// `scheduled_on` is date-only; upcoming queries compare it against a
/// date-only "today", never a timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTraining {
    pub title: String,
    pub scheduled_on: NaiveDate,
    #[serde(default)]
    pub workout_id: Option<EntityId>,
    #[serde(default)]
    pub completed: bool,
}

impl ScheduledTraining {
    #[must_use]
    pub fn new(title: impl Into<String>, scheduled_on: NaiveDate) -> Self {
        Self {
            title: title.into(),
            scheduled_on,
            workout_id: None,
            completed: false,
        }
    }
}

impl SyncEntity for ScheduledTraining {
    const KIND: EntityKind = EntityKind::ScheduledTraining;
    const COLUMNS: &'static [&'static str] = &["title", "scheduled_on", "workout_id", "completed"];

    fn to_values(&self) -> Vec<Value> {
        vec![
            columns::text(&self.title),
            columns::date(self.scheduled_on),
            columns::opt_text(self.workout_id.map(|id| id.as_str()).as_deref()),
            columns::flag(self.completed),
        ]
    }

    fn from_row(row: &Row, start: i32) -> Result<Self> {
        let mut cols = Columns::new(row, Self::KIND.table(), start);
        Ok(Self {
            title: cols.text()?,
            scheduled_on: cols.date()?,
            workout_id: cols
                .opt_text()?
                .and_then(|raw| raw.parse::<EntityId>().ok()),
            completed: cols.flag()?,
        })
    }
}

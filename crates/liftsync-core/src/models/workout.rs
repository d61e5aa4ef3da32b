//! Workout model

use chrono::NaiveDate;
use libsql::{Row, Value};
use serde::{Deserialize, Serialize};

use super::columns::{self, Columns};
use super::{EntityKind, SyncEntity};
use crate::error::Result;

/// A logged training session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub performed_on: NaiveDate,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
}

impl Workout {
    #[must_use]
    pub fn new(name: impl Into<String>, performed_on: NaiveDate) -> Self {
        Self {
            name: name.into(),
            notes: None,
            performed_on,
            duration_minutes: None,
        }
    }
}

impl SyncEntity for Workout {
    const KIND: EntityKind = EntityKind::Workout;
    const COLUMNS: &'static [&'static str] = &["name", "notes", "performed_on", "duration_minutes"];

    fn to_values(&self) -> Vec<Value> {
        vec![
            columns::text(&self.name),
            columns::opt_text(self.notes.as_deref()),
            columns::date(self.performed_on),
            columns::opt_integer(self.duration_minutes),
        ]
    }

    fn from_row(row: &Row, start: i32) -> Result<Self> {
        let mut cols = Columns::new(row, Self::KIND.table(), start);
        Ok(Self {
            name: cols.text()?,
            notes: cols.opt_text()?,
            performed_on: cols.date()?,
            duration_minutes: cols.opt_integer()?,
        })
    }
}

//! Training cycle model

use chrono::NaiveDate;
use libsql::{Row, Value};
use serde::{Deserialize, Serialize};

use super::columns::{self, Columns};
use super::{EntityKind, SyncEntity};
use crate::error::Result;

/// A training block spanning a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
    pub name: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl SyncEntity for Cycle {
    const KIND: EntityKind = EntityKind::Cycle;
    const COLUMNS: &'static [&'static str] = &["name", "start_date", "end_date"];

    fn to_values(&self) -> Vec<Value> {
        vec![
            columns::text(&self.name),
            columns::date(self.start_date),
            columns::opt_date(self.end_date),
        ]
    }

    fn from_row(row: &Row, start: i32) -> Result<Self> {
        let mut cols = Columns::new(row, Self::KIND.table(), start);
        Ok(Self {
            name: cols.text()?,
            start_date: cols.date()?,
            end_date: cols.opt_date()?,
        })
    }
}

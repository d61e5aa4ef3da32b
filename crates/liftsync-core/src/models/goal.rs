//! Goal model

use chrono::NaiveDate;
use libsql::{Row, Value};
use serde::{Deserialize, Serialize};

use super::columns::{self, Columns};
use super::{EntityKind, SyncEntity};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub title: String,
    pub target_value: f64,
    pub unit: String,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub achieved: bool,
}

impl SyncEntity for Goal {
    const KIND: EntityKind = EntityKind::Goal;
    const COLUMNS: &'static [&'static str] =
        &["title", "target_value", "unit", "deadline", "achieved"];

    fn to_values(&self) -> Vec<Value> {
        vec![
            columns::text(&self.title),
            columns::real(self.target_value),
            columns::text(&self.unit),
            columns::opt_date(self.deadline),
            columns::flag(self.achieved),
        ]
    }

    fn from_row(row: &Row, start: i32) -> Result<Self> {
        let mut cols = Columns::new(row, Self::KIND.table(), start);
        Ok(Self {
            title: cols.text()?,
            target_value: cols.real()?,
            unit: cols.text()?,
            deadline: cols.opt_date()?,
            achieved: cols.flag()?,
        })
    }
}

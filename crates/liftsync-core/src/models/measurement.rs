//! Body measurement model

use chrono::NaiveDate;
use libsql::{Row, Value};
use serde::{Deserialize, Serialize};

use super::columns::{self, Columns};
use super::{EntityKind, SyncEntity};
use crate::error::Result;

/// A dated set of body measurements; every metric is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyMeasurement {
    pub measured_on: NaiveDate,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub body_fat_pct: Option<f64>,
    #[serde(default)]
    pub waist_cm: Option<f64>,
}

impl SyncEntity for BodyMeasurement {
    const KIND: EntityKind = EntityKind::BodyMeasurement;
    const COLUMNS: &'static [&'static str] =
        &["measured_on", "weight_kg", "body_fat_pct", "waist_cm"];

    fn to_values(&self) -> Vec<Value> {
        vec![
            columns::date(self.measured_on),
            columns::opt_real(self.weight_kg),
            columns::opt_real(self.body_fat_pct),
            columns::opt_real(self.waist_cm),
        ]
    }

    fn from_row(row: &Row, start: i32) -> Result<Self> {
        let mut cols = Columns::new(row, Self::KIND.table(), start);
        Ok(Self {
            measured_on: cols.date()?,
            weight_kg: cols.opt_real()?,
            body_fat_pct: cols.opt_real()?,
            waist_cm: cols.opt_real()?,
        })
    }
}

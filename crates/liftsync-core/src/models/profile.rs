//! User profile model

use chrono::NaiveDate;
use libsql::{Row, Value};
use serde::{Deserialize, Serialize};

use super::columns::{self, Columns};
use super::{EntityKind, SyncEntity};
use crate::error::Result;

/// Measurement system used for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Imperial => "imperial",
        }
    }

    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("imperial") {
            Self::Imperial
        } else {
            Self::Metric
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub display_name: String,
    #[serde(default)]
    pub height_cm: Option<f64>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub unit_system: UnitSystem,
}

impl SyncEntity for Profile {
    const KIND: EntityKind = EntityKind::Profile;
    const COLUMNS: &'static [&'static str] =
        &["display_name", "height_cm", "birth_date", "unit_system"];

    fn to_values(&self) -> Vec<Value> {
        vec![
            columns::text(&self.display_name),
            columns::opt_real(self.height_cm),
            columns::opt_date(self.birth_date),
            columns::text(self.unit_system.as_str()),
        ]
    }

    fn from_row(row: &Row, start: i32) -> Result<Self> {
        let mut cols = Columns::new(row, Self::KIND.table(), start);
        Ok(Self {
            display_name: cols.text()?,
            height_cm: cols.opt_real()?,
            birth_date: cols.opt_date()?,
            unit_system: UnitSystem::parse(&cols.text()?),
        })
    }
}

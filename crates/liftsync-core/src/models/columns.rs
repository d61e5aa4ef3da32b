//! Typed column access for libSQL rows.

use chrono::NaiveDate;
use libsql::{Row, Value};

use crate::error::{Error, Result};
use crate::util::{format_date, parse_date};

/// Sequential reader over the columns of one row.
pub struct Columns<'a> {
    row: &'a Row,
    table: &'static str,
    next: i32,
}

impl<'a> Columns<'a> {
    /// Start reading `row` (from `table`) at column index `start`.
    pub const fn new(row: &'a Row, table: &'static str, start: i32) -> Self {
        Self {
            row,
            table,
            next: start,
        }
    }

    fn take(&mut self) -> Result<Value> {
        let index = self.next;
        self.next += 1;
        Ok(self.row.get_value(index)?)
    }

    pub fn text(&mut self) -> Result<String> {
        self.opt_text()?
            .ok_or_else(|| Error::corrupt(self.table, format!("column {} is NULL", self.next - 1)))
    }

    pub fn opt_text(&mut self) -> Result<Option<String>> {
        match self.take()? {
            Value::Null => Ok(None),
            Value::Text(value) => Ok(Some(value)),
            other => Err(self.mismatch("text", &other)),
        }
    }

    pub fn integer(&mut self) -> Result<i64> {
        self.opt_integer()?
            .ok_or_else(|| Error::corrupt(self.table, format!("column {} is NULL", self.next - 1)))
    }

    pub fn opt_integer(&mut self) -> Result<Option<i64>> {
        match self.take()? {
            Value::Null => Ok(None),
            Value::Integer(value) => Ok(Some(value)),
            other => Err(self.mismatch("integer", &other)),
        }
    }

    pub fn real(&mut self) -> Result<f64> {
        self.opt_real()?
            .ok_or_else(|| Error::corrupt(self.table, format!("column {} is NULL", self.next - 1)))
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn opt_real(&mut self) -> Result<Option<f64>> {
        match self.take()? {
            Value::Null => Ok(None),
            Value::Real(value) => Ok(Some(value)),
            // SQLite stores whole REAL values written as integers without a fraction.
            Value::Integer(value) => Ok(Some(value as f64)),
            other => Err(self.mismatch("real", &other)),
        }
    }

    pub fn flag(&mut self) -> Result<bool> {
        Ok(self.integer()? != 0)
    }

    pub fn date(&mut self) -> Result<NaiveDate> {
        self.opt_date()?
            .ok_or_else(|| Error::corrupt(self.table, format!("column {} is NULL", self.next - 1)))
    }

    pub fn opt_date(&mut self) -> Result<Option<NaiveDate>> {
        let Some(raw) = self.opt_text()? else {
            return Ok(None);
        };
        parse_date(&raw)
            .map(Some)
            .ok_or_else(|| Error::corrupt(self.table, format!("invalid date '{raw}'")))
    }

    fn mismatch(&self, expected: &str, found: &Value) -> Error {
        Error::corrupt(
            self.table,
            format!(
                "column {} expected {expected}, found {found:?}",
                self.next - 1
            ),
        )
    }
}

pub fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

pub fn opt_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, text)
}

pub const fn integer(value: i64) -> Value {
    Value::Integer(value)
}

pub fn opt_integer(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

pub const fn real(value: f64) -> Value {
    Value::Real(value)
}

pub fn opt_real(value: Option<f64>) -> Value {
    value.map_or(Value::Null, Value::Real)
}

pub fn flag(value: bool) -> Value {
    Value::Integer(i64::from(value))
}

pub fn date(value: NaiveDate) -> Value {
    Value::Text(format_date(value))
}

pub fn opt_date(value: Option<NaiveDate>) -> Value {
    value.map_or(Value::Null, date)
}

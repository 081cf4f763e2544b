//! Inclusive range enforcement.
//!
//! Values below the minimum are raised to it and values above the maximum are lowered to it.
//! Bounds are resolved against the column type before any value is looked at (see
//! [`RangeClamper::resolve`]): integer columns clamp to the integral bounds inside the range
//! (`ceil(min)`, `floor(max)`) so the column stays integral, datetime columns need datetime
//! bounds, and categorical columns are read as numbers, clipped, and written back as labels.
//! Because every output is within bounds, clamping twice is the same as clamping once.

use super::coerce::number_label;
use super::report::{ClampDirection, CleaningReport};
use crate::error::{CleanError, Result};
use crate::table::{ColumnSpec, LogicalType, Table, to_millis};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};

const ORDINAL: &str = "__ordinal";
const CLIPPED: &str = "__clipped";
const OUTPUT: &str = "__output";

/// One end of a clamping range.
///
/// In JSON a bound is a number, a datetime (`"2020-06-01T12:00:00"`) or a date
/// (`"2020-06-01"`, read as midnight).
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Bound {
    Number(f64),
    Datetime(NaiveDateTime),
}

impl<'de> Deserialize<'de> for Bound {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Datetime(NaiveDateTime),
            Date(NaiveDate),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(v) => Self::Number(v),
            Raw::Datetime(dt) => Self::Datetime(dt),
            Raw::Date(date) => Self::Datetime(date.and_time(NaiveTime::MIN)),
        })
    }
}

impl Bound {
    fn kind(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Datetime(_) => "datetime",
        }
    }
}

/// Bounds in the storage terms of one column type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Limits {
    Integer(Option<i64>, Option<i64>),
    /// Float columns, and categorical labels read as numbers
    Float(Option<f64>, Option<f64>),
    /// Milliseconds since the epoch
    Datetime(Option<i64>, Option<i64>),
}

impl Limits {
    fn clip(self, value: Expr) -> Expr {
        let (lo, hi) = match self {
            Self::Integer(lo, hi) | Self::Datetime(lo, hi) => (lo.map(lit), hi.map(lit)),
            Self::Float(lo, hi) => (lo.map(lit), hi.map(lit)),
        };
        match (lo, hi) {
            (Some(lo), Some(hi)) => value.clip(lo, hi),
            (Some(lo), None) => value.clip_min(lo),
            (None, Some(hi)) => value.clip_max(hi),
            (None, None) => value,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RangeClamper {
    min: Option<Bound>,
    max: Option<Bound>,
}

impl RangeClamper {
    /// # Errors
    ///
    /// `InvalidParameter` when a bound is NaN, the two bounds are of different kinds, or
    /// `min > max`.
    pub fn new(min: Option<Bound>, max: Option<Bound>) -> Result<Self> {
        for bound in [min, max].iter().flatten() {
            if let Bound::Number(v) = bound
                && v.is_nan()
            {
                return Err(CleanError::InvalidParameter(
                    "clamp bound must not be NaN".to_owned(),
                ));
            }
        }

        match (min, max) {
            (Some(Bound::Number(lo)), Some(Bound::Number(hi))) if lo > hi => {
                return Err(CleanError::InvalidParameter(format!(
                    "clamp minimum {lo} exceeds maximum {hi}"
                )));
            }
            (Some(Bound::Datetime(lo)), Some(Bound::Datetime(hi))) if lo > hi => {
                return Err(CleanError::InvalidParameter(format!(
                    "clamp minimum {lo} is after maximum {hi}"
                )));
            }
            (Some(lo), Some(hi)) if lo.kind() != hi.kind() => {
                return Err(CleanError::InvalidParameter(format!(
                    "clamp bounds mix a {} minimum with a {} maximum",
                    lo.kind(),
                    hi.kind()
                )));
            }
            _ => {}
        }

        Ok(Self { min, max })
    }

    pub fn at_most(max: Bound) -> Result<Self> {
        Self::new(None, Some(max))
    }

    pub fn at_least(min: Bound) -> Result<Self> {
        Self::new(Some(min), None)
    }

    /// Clamper for the `Range` domain declared on a column.
    pub fn from_domain(spec: &ColumnSpec) -> Result<Self> {
        match spec.range() {
            Some((min, max)) => Self::new(min.map(Bound::Number), max.map(Bound::Number)),
            None => Err(CleanError::InvalidParameter(format!(
                "column '{}' has no range domain",
                spec.name
            ))),
        }
    }

    /// The bounds as they apply to a column of `logical_type`.
    ///
    /// # Errors
    ///
    /// `UnsupportedType` for text columns. `InvalidParameter` when a bound has the wrong kind
    /// for the column or an integer column's range holds no integer.
    pub fn resolve(&self, column: &str, logical_type: LogicalType) -> Result<Limits> {
        match logical_type {
            LogicalType::Text => Err(CleanError::UnsupportedType {
                column: column.to_owned(),
                operation: "clamp",
                found: logical_type,
            }),
            LogicalType::Float | LogicalType::Categorical => {
                let (lo, hi) = self.numbers(column, logical_type)?;
                Ok(Limits::Float(lo, hi))
            }
            LogicalType::Integer => {
                let (lo, hi) = self.numbers(column, logical_type)?;
                // `as` saturates, so infinite bounds become i64::MIN / i64::MAX.
                let lo = lo.map(|v| v.ceil() as i64);
                let hi = hi.map(|v| v.floor() as i64);
                if let (Some(l), Some(h)) = (lo, hi)
                    && l > h
                {
                    return Err(CleanError::InvalidParameter(format!(
                        "clamp range for integer column '{column}' contains no integer"
                    )));
                }
                Ok(Limits::Integer(lo, hi))
            }
            LogicalType::Datetime => {
                let pick = |b: Option<Bound>| match b {
                    None => Ok(None),
                    Some(Bound::Datetime(dt)) => Ok(Some(to_millis(dt))),
                    Some(Bound::Number(v)) => Err(CleanError::InvalidParameter(format!(
                        "numeric bound {v} cannot clamp datetime column '{column}'"
                    ))),
                };
                Ok(Limits::Datetime(pick(self.min)?, pick(self.max)?))
            }
        }
    }

    fn numbers(&self, column: &str, logical_type: LogicalType) -> Result<(Option<f64>, Option<f64>)> {
        let pick = |b: Option<Bound>| match b {
            None => Ok(None),
            Some(Bound::Number(v)) => Ok(Some(v)),
            Some(Bound::Datetime(dt)) => Err(CleanError::InvalidParameter(format!(
                "datetime bound {dt} cannot clamp {logical_type} column '{column}'"
            ))),
        };
        Ok((pick(self.min)?, pick(self.max)?))
    }

    pub fn clamp(&self, table: &Table, column: &str) -> Result<(Table, CleaningReport)> {
        let spec = table.column_spec(column)?;
        let limits = self.resolve(column, spec.logical_type)?;

        let ordinal = match spec.logical_type {
            LogicalType::Datetime => col(column).cast(DataType::Int64),
            LogicalType::Categorical => col(column)
                .str()
                .strip_chars(lit(NULL))
                .cast(DataType::Float64),
            _ => col(column),
        };
        let output = match spec.logical_type {
            LogicalType::Datetime => col(CLIPPED).cast(LogicalType::Datetime.dtype()),
            // Labels inside the range keep their original spelling
            LogicalType::Categorical => when(col(CLIPPED).neq(col(ORDINAL)))
                .then(number_label(col(CLIPPED)))
                .otherwise(col(column)),
            _ => col(CLIPPED),
        };
        let evaluated = table.evaluate(vec![
            ordinal.alias(ORDINAL),
            limits.clip(col(ORDINAL)).alias(CLIPPED),
            output.alias(OUTPUT),
        ])?;

        let keys = table.keys()?;
        let before = numbers(&evaluated, ORDINAL)?;
        let after = numbers(&evaluated, CLIPPED)?;

        if spec.logical_type == LogicalType::Categorical {
            let labels = table.column(column)?;
            let unreadable = keys
                .iter()
                .zip(&labels)
                .zip(&before)
                .find(|((_, label), number)| !label.is_missing() && number.is_none());
            if let Some(((key, label), _)) = unreadable {
                return Err(CleanError::TypeCoercion {
                    column: column.to_owned(),
                    row: *key,
                    value: label.to_string(),
                    target: LogicalType::Float,
                });
            }
        }

        let mut report = CleaningReport::new("clamp", &[column]);
        for ((key, before), after) in keys.into_iter().zip(before).zip(after) {
            let (Some(before), Some(after)) = (before, after) else {
                continue;
            };
            let direction = if after > before {
                ClampDirection::Raised
            } else if after < before {
                ClampDirection::Lowered
            } else {
                continue;
            };
            report.changed.insert(key);
            report.clamped.insert(key, direction);
        }

        let clamped = evaluated.column(OUTPUT)?.as_materialized_series().clone();
        let out = table.with_series(spec.clone(), clamped)?;
        report.log();
        Ok((out, report))
    }
}

/// A computed column as floats for comparison. NaN reads as missing.
fn numbers(frame: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    Ok(frame
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    fn midnight(y: i32, m: u32, d: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(y, m, d).and_then(|d| d.and_hms_opt(0, 0, 0))
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let err = RangeClamper::new(Some(Bound::Number(10.0)), Some(Bound::Number(1.0)));
        assert!(matches!(err, Err(CleanError::InvalidParameter(_))));
    }

    #[test]
    fn test_mixed_bound_kinds_rejected() {
        let now = midnight(2020, 1, 1).map(Bound::Datetime);
        let err = RangeClamper::new(Some(Bound::Number(0.0)), now);
        assert!(err.is_err());
    }

    #[test]
    fn test_nan_bound_rejected() {
        assert!(RangeClamper::at_most(Bound::Number(f64::NAN)).is_err());
    }

    #[test]
    fn test_resolve_against_column_type() -> Result<()> {
        let sizes = RangeClamper::new(Some(Bound::Number(1.5)), Some(Bound::Number(3.5)))?;
        assert_eq!(
            sizes.resolve("n", LogicalType::Integer)?,
            Limits::Integer(Some(2), Some(3))
        );
        assert_eq!(
            sizes.resolve("n", LogicalType::Categorical)?,
            Limits::Float(Some(1.5), Some(3.5))
        );
        assert!(matches!(
            sizes.resolve("d", LogicalType::Datetime),
            Err(CleanError::InvalidParameter(_))
        ));

        let narrow = RangeClamper::new(Some(Bound::Number(1.2)), Some(Bound::Number(1.8)))?;
        assert!(narrow.resolve("n", LogicalType::Integer).is_err());
        assert!(narrow.resolve("x", LogicalType::Float).is_ok());

        let today = RangeClamper::new(None, midnight(2020, 6, 1).map(Bound::Datetime))?;
        assert!(today.resolve("n", LogicalType::Float).is_err());
        Ok(())
    }

    #[test]
    fn test_bad_bounds_fail_without_any_values() -> Result<()> {
        let empty = Table::new(vec![ColumnSpec::datetime("subscription_date")])?;
        let clamper = RangeClamper::at_most(Bound::Number(5.0))?;
        assert!(matches!(
            clamper.clamp(&empty, "subscription_date"),
            Err(CleanError::InvalidParameter(_))
        ));

        let all_missing = Table::from_rows(
            vec![ColumnSpec::integer("n")],
            vec![vec![Value::Missing], vec![Value::Missing]],
        )?;
        let narrow = RangeClamper::new(Some(Bound::Number(1.2)), Some(Bound::Number(1.8)))?;
        assert!(narrow.clamp(&all_missing, "n").is_err());
        Ok(())
    }

    #[test]
    fn test_date_only_bound_is_midnight() -> serde_json::Result<()> {
        let bound: Bound = serde_json::from_str(r#""2020-06-01""#)?;
        assert_eq!(Some(bound), midnight(2020, 6, 1).map(Bound::Datetime));

        let bound: Bound = serde_json::from_str(r#""2020-06-01T12:30:00""#)?;
        assert!(matches!(bound, Bound::Datetime(dt) if dt.format("%H:%M").to_string() == "12:30"));

        let bound: Bound = serde_json::from_str("27")?;
        assert_eq!(bound, Bound::Number(27.0));
        Ok(())
    }
}

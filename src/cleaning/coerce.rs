//! Value-by-value type coercion of a single column.
//!
//! A [`FieldCoercer`] converts every value in a column to a target [`LogicalType`]. Strings are
//! trimmed, null tokens mapped to missing, optional unit characters stripped (`"12 minutes"` →
//! `"12"`), and the remainder cast by Polars. What happens to a value that still will not parse depends
//! on the [`CoercionPolicy`]: strict aborts the whole operation, coerce replaces the value with
//! `Missing` and records the row in the report.

use super::report::{Anomaly, CleaningReport};
use crate::config::CleaningConfig;
use crate::error::{CleanError, Result};
use crate::table::{ColumnSpec, Domain, LogicalType, Table, Value, to_millis, values_from_series};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

const PREPARED: &str = "__prepared";
const CONVERTED: &str = "__converted";
const CELL: &str = "value";

/// What to do with a value that cannot be converted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoercionPolicy {
    /// Abort the operation on the first failure
    Strict,
    /// Replace failures with `Missing` and report them
    #[default]
    Coerce,
}

#[derive(Clone, Debug)]
pub struct FieldCoercer {
    target: LogicalType,
    policy: CoercionPolicy,
    strip_chars: Option<String>,
    datetime_formats: Vec<String>,
    null_tokens: Vec<String>,
    into: Option<String>,
}

impl FieldCoercer {
    pub fn new(target: LogicalType) -> Self {
        Self::from_config(target, &CleaningConfig::default())
    }

    /// Seed policy, null tokens and datetime formats from a shared config.
    pub fn from_config(target: LogicalType, config: &CleaningConfig) -> Self {
        Self {
            target,
            policy: config.coercion_policy,
            strip_chars: None,
            datetime_formats: config.datetime_formats.clone(),
            null_tokens: config.null_tokens.clone(),
            into: None,
        }
    }

    #[must_use]
    pub fn policy(mut self, policy: CoercionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Characters removed from both ends of string values before parsing.
    #[must_use]
    pub fn strip_chars(mut self, chars: impl Into<String>) -> Self {
        self.strip_chars = Some(chars.into());
        self
    }

    #[must_use]
    pub fn datetime_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.datetime_formats = formats.into_iter().map(Into::into).collect();
        self
    }

    /// Write the result to a new column instead of replacing the source.
    #[must_use]
    pub fn into_column(mut self, name: impl Into<String>) -> Self {
        self.into = Some(name.into());
        self
    }

    pub fn target(&self) -> LogicalType {
        self.target
    }

    /// Convert one value. `None` means the value cannot be represented in the target type.
    pub fn coerce_value(&self, value: &Value) -> Result<Option<Value>> {
        let Some(source) = value.logical_type() else {
            return Ok(Some(Value::Missing));
        };
        let cell = Table::from_rows(
            vec![ColumnSpec::new(CELL, source)],
            vec![vec![value.clone()]],
        )?;
        let coercer = Self {
            policy: CoercionPolicy::Coerce,
            into: None,
            ..self.clone()
        };
        let (out, report) = coercer.apply(&cell, CELL)?;
        if !report.coerced_to_missing.is_empty() {
            return Ok(None);
        }
        Ok(out.column(CELL)?.into_iter().next())
    }

    /// Coerce `column` and return the updated copy of `table` with a report.
    ///
    /// # Errors
    ///
    /// `UnknownColumn` if the column does not exist, `TypeCoercion` on the first bad value in
    /// strict mode, `DuplicateColumn` if the target column would clash.
    pub fn coerce(&self, table: &Table, column: &str) -> Result<(Table, CleaningReport)> {
        let (out, report) = self.apply(table, column)?;
        report.log();
        Ok((out, report))
    }

    fn apply(&self, table: &Table, column: &str) -> Result<(Table, CleaningReport)> {
        let source = table.column_spec(column)?;
        let target_name = self.into.as_deref().unwrap_or(column);
        if target_name != column && table.has_column(target_name) {
            return Err(CleanError::DuplicateColumn(target_name.to_owned()));
        }

        // chrono parses dates from text, Polars does every other conversion
        let parse_dates = source.logical_type.is_textual() && self.target == LogicalType::Datetime;
        let mut steps = vec![self.prepare(column, source.logical_type).alias(PREPARED)];
        if !parse_dates {
            steps.push(convert(col(PREPARED), source.logical_type, self.target).alias(CONVERTED));
        }
        let evaluated = table.evaluate(steps)?;
        let prepared = evaluated.column(PREPARED)?.as_materialized_series();
        let converted = if parse_dates {
            self.parse_datetimes(prepared)?
        } else {
            evaluated
                .column(CONVERTED)?
                .as_materialized_series()
                .cast(&self.target.dtype())?
        };

        let mut report = CleaningReport::new("coerce", &[column]);
        let after = values_from_series(&converted, self.target)?;
        let blank = prepared.is_null();
        for (((key, before), after), blank) in table
            .column_values(column)?
            .into_iter()
            .zip(after)
            .zip(&blank)
        {
            // Null tokens and empty strings are meant to become missing
            let failed = after.is_missing() && !before.is_missing() && blank == Some(false);
            if !failed {
                if after != before {
                    report.changed.insert(key);
                }
                continue;
            }

            let raw = before.to_string();
            if self.policy == CoercionPolicy::Strict {
                return Err(CleanError::TypeCoercion {
                    column: column.to_owned(),
                    row: key,
                    value: raw,
                    target: self.target,
                });
            }
            report.changed.insert(key);
            report.coerced_to_missing.insert(key);
            report.anomalies.push(Anomaly::TypeCoercionFailure {
                row: key,
                value: raw,
                target: self.target,
            });
        }

        let spec = ColumnSpec {
            name: target_name.to_owned(),
            logical_type: self.target,
            domain: carry_domain(source.domain.as_ref(), self.target),
        };
        let out = table.with_series(spec, converted)?;
        Ok((out, report))
    }

    /// Trim, map null tokens to null, then strip unit characters. Non-text columns pass
    /// through untouched.
    fn prepare(&self, column: &str, source: LogicalType) -> Expr {
        let value = col(column);
        if !source.is_textual() {
            return value;
        }

        let trimmed = value.str().strip_chars(lit(NULL));
        let tokens: Vec<String> = self
            .null_tokens
            .iter()
            .map(|t| t.trim().to_lowercase())
            .collect();
        let present = when(
            trimmed
                .clone()
                .str()
                .to_lowercase()
                .is_in(lit(Series::new("null_tokens".into(), tokens))),
        )
        .then(lit(NULL))
        .otherwise(trimmed);

        match &self.strip_chars {
            Some(chars) => present
                .str()
                .strip_chars(lit(chars.clone()))
                .str()
                .strip_chars(lit(NULL)),
            None => present,
        }
    }

    fn parse_datetimes(&self, prepared: &Series) -> Result<Series> {
        let millis: Vec<Option<i64>> = prepared
            .str()?
            .into_iter()
            .map(|raw| raw.and_then(|s| parse_datetime(s, &self.datetime_formats)))
            .map(|dt| dt.map(to_millis))
            .collect();
        Ok(Series::new(CONVERTED.into(), millis).cast(&LogicalType::Datetime.dtype())?)
    }
}

/// Cast between storage dtypes. Impossible conversions give an all-null column, which the
/// caller reports as failures.
fn convert(value: Expr, source: LogicalType, target: LogicalType) -> Expr {
    use LogicalType::{Categorical, Datetime, Float, Integer, Text};

    match (source, target) {
        (s, t) if s == t || (s.is_textual() && t.is_textual()) => value,
        (Text | Categorical, Integer) => {
            let exact = value.clone().cast(DataType::Int64);
            when(exact.clone().is_not_null())
                .then(exact)
                .otherwise(whole_number(value.cast(DataType::Float64)))
        }
        (Text | Categorical | Integer, Float) => value.cast(DataType::Float64),
        (Float, Integer) => whole_number(value),
        (Integer, Text | Categorical) => value.cast(DataType::String),
        (Float, Text | Categorical) => number_label(value),
        (Datetime, Text | Categorical) => datetime_label(value),
        _ => lit(NULL).cast(target.dtype()),
    }
}

/// Floats with no fractional part as integers, null otherwise.
fn whole_number(value: Expr) -> Expr {
    when(value.clone().eq(value.clone().floor()))
        .then(value.cast(DataType::Int64))
        .otherwise(lit(NULL))
}

/// Render numbers the way labels are written: `27.0` becomes `"27"`.
pub(crate) fn number_label(value: Expr) -> Expr {
    let whole = value
        .clone()
        .eq(value.clone().floor())
        .and(value.clone().gt(lit(-1e15)))
        .and(value.clone().lt(lit(1e15)));
    when(whole)
        .then(value.clone().cast(DataType::Int64).cast(DataType::String))
        .otherwise(value.cast(DataType::String))
}

/// Date-only label at midnight, see [`format_datetime`](crate::table::format_datetime).
fn datetime_label(value: Expr) -> Expr {
    let midnight = value.clone().dt().strftime("%H:%M:%S").eq(lit("00:00:00"));
    when(midnight)
        .then(value.clone().dt().strftime("%Y-%m-%d"))
        .otherwise(value.dt().strftime("%Y-%m-%d %H:%M:%S"))
}

/// Keep a domain only when it still makes sense for the new type.
fn carry_domain(domain: Option<&Domain>, target: LogicalType) -> Option<Domain> {
    match domain {
        Some(d @ Domain::Range { .. }) if target.is_numeric() => Some(d.clone()),
        Some(d @ Domain::Values { .. }) if target.is_textual() => Some(d.clone()),
        _ => None,
    }
}

/// RFC 3339 first, then each format in order. Date-only formats give midnight.
pub fn parse_datetime(s: &str, formats: &[String]) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    formats.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(s, fmt).ok().or_else(|| {
            NaiveDate::parse_from_str(s, fmt)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
    })
}

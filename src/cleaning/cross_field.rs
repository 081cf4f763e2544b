//! Cross-field consistency checks.
//!
//! An [`Invariant`] is a named predicate over several columns of one record.
//! [`CrossFieldValidator::validate`] evaluates it on every record and splits the table into
//! consistent and inconsistent rows. Inconsistent rows are reported, never corrected.
//!
//! Numeric comparisons take an explicit [`Tolerance`]. Derived values such as an age computed
//! from a birth year can legitimately differ from a stored value, and how much slack is
//! acceptable is the caller's call.

use super::report::{Anomaly, CleaningReport};
use crate::error::{CleanError, Result};
use crate::table::{RecordRef, RowKey, Table, Value};
use chrono::{Datelike as _, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Tolerance {
    #[default]
    Exact,
    Absolute(f64),
}

impl Tolerance {
    pub fn accepts(self, derived: f64, stated: f64) -> bool {
        match self {
            Self::Exact => derived == stated,
            Self::Absolute(eps) => (derived - stated).abs() <= eps,
        }
    }
}

/// A named predicate relating two or more columns of the same record.
pub trait Invariant {
    fn name(&self) -> String;

    fn columns(&self) -> Vec<&str>;

    /// Whether the record satisfies the rule. Records that cannot be evaluated because an
    /// operand is missing do not satisfy it.
    fn check(&self, record: &RecordRef<'_>) -> Result<bool>;

    /// Fail early when the table cannot support this invariant.
    fn prepare(&self, table: &Table) -> Result<()> {
        for column in self.columns() {
            table.column_spec(column)?;
        }
        Ok(())
    }
}

/// `sum(parts) == total`, e.g. `fund_A + fund_B + fund_C + fund_D == inv_amount`.
#[derive(Clone, Debug, PartialEq)]
pub struct SumEquals {
    pub parts: Vec<String>,
    pub total: String,
    pub tolerance: Tolerance,
}

impl SumEquals {
    pub fn new<I, S>(parts: I, total: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
            total: total.into(),
            tolerance: Tolerance::Exact,
        }
    }

    #[must_use]
    pub fn tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }
}

impl Invariant for SumEquals {
    fn name(&self) -> String {
        format!("sum({}) == {}", self.parts.join(", "), self.total)
    }

    fn columns(&self) -> Vec<&str> {
        self.parts
            .iter()
            .chain(std::iter::once(&self.total))
            .map(String::as_str)
            .collect()
    }

    fn check(&self, record: &RecordRef<'_>) -> Result<bool> {
        let mut sum = 0.0;
        for part in &self.parts {
            match numeric(record, part)? {
                Some(v) => sum += v,
                None => return Ok(false),
            }
        }
        Ok(numeric(record, &self.total)?.is_some_and(|total| self.tolerance.accepts(sum, total)))
    }

    fn prepare(&self, table: &Table) -> Result<()> {
        for column in self.columns() {
            let spec = table.column_spec(column)?;
            if !spec.logical_type.is_numeric() {
                return Err(CleanError::UnsupportedType {
                    column: column.to_owned(),
                    operation: "sum check",
                    found: spec.logical_type,
                });
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeMethod {
    /// `as_of.year - birth.year`, ignoring whether the birthday has passed
    #[default]
    YearDifference,
    /// Exact completed years
    Completed,
}

impl AgeMethod {
    pub fn age(self, birth: NaiveDate, as_of: NaiveDate) -> i64 {
        let years = i64::from(as_of.year() - birth.year());
        match self {
            Self::YearDifference => years,
            Self::Completed if (as_of.month(), as_of.day()) < (birth.month(), birth.day()) => {
                years - 1
            }
            Self::Completed => years,
        }
    }
}

/// Stated age agrees with the age derived from a birth date.
#[derive(Clone, Debug, PartialEq)]
pub struct AgeMatches {
    pub birth_date: String,
    pub age: String,
    pub as_of: NaiveDate,
    pub method: AgeMethod,
    pub tolerance_years: i64,
}

impl AgeMatches {
    pub fn new(birth_date: impl Into<String>, age: impl Into<String>, as_of: NaiveDate) -> Self {
        Self {
            birth_date: birth_date.into(),
            age: age.into(),
            as_of,
            method: AgeMethod::YearDifference,
            tolerance_years: 0,
        }
    }

    #[must_use]
    pub fn method(mut self, method: AgeMethod) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn tolerance_years(mut self, years: i64) -> Self {
        self.tolerance_years = years;
        self
    }
}

impl Invariant for AgeMatches {
    fn name(&self) -> String {
        format!("{} matches age from {}", self.age, self.birth_date)
    }

    fn columns(&self) -> Vec<&str> {
        vec![self.birth_date.as_str(), self.age.as_str()]
    }

    fn check(&self, record: &RecordRef<'_>) -> Result<bool> {
        let birth = match record.get(&self.birth_date)? {
            Value::Datetime(dt) => dt.date(),
            Value::Missing => return Ok(false),
            other => {
                return Err(unsupported(&self.birth_date, "age check", other));
            }
        };
        let Some(stated) = numeric(record, &self.age)? else {
            return Ok(false);
        };
        let derived = self.method.age(birth, self.as_of) as f64;
        Ok((derived - stated).abs() <= self.tolerance_years as f64)
    }
}

/// Invariant backed by a caller-supplied closure.
pub struct FnInvariant<F> {
    name: String,
    columns: Vec<String>,
    predicate: F,
}

impl<F> FnInvariant<F>
where
    F: Fn(&RecordRef<'_>) -> Result<bool>,
{
    pub fn new<I, S>(name: impl Into<String>, columns: I, predicate: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            predicate,
        }
    }
}

impl<F> Invariant for FnInvariant<F>
where
    F: Fn(&RecordRef<'_>) -> Result<bool>,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    fn columns(&self) -> Vec<&str> {
        self.columns.iter().map(String::as_str).collect()
    }

    fn check(&self, record: &RecordRef<'_>) -> Result<bool> {
        (self.predicate)(record)
    }
}

/// Consistent and inconsistent rows of one validation run. Together they cover the input.
#[derive(Clone, Debug)]
pub struct CrossFieldOutcome {
    pub consistent: Table,
    pub inconsistent: Table,
    pub report: CleaningReport,
}

impl CrossFieldOutcome {
    pub fn inconsistent_count(&self) -> usize {
        self.inconsistent.len()
    }
}

pub struct CrossFieldValidator;

impl CrossFieldValidator {
    /// Evaluate `invariant` on every record of `table`.
    ///
    /// # Errors
    ///
    /// `UnknownColumn` if the invariant names a column the table lacks, or whatever the
    /// invariant's own `prepare`/`check` reports for unusable values.
    pub fn validate(table: &Table, invariant: &dyn Invariant) -> Result<CrossFieldOutcome> {
        invariant.prepare(table)?;

        let name = invariant.name();
        let columns = invariant.columns();
        let mut report = CleaningReport::new("cross_field", &columns);
        let mut inconsistent = BTreeSet::new();

        let records = table.records()?;
        for record in records.rows() {
            if invariant.check(&record)? {
                continue;
            }
            let key = record.key();
            inconsistent.insert(key);
            report.anomalies.push(Anomaly::InvariantViolation {
                row: key,
                invariant: name.clone(),
            });
            if let Some(column) = first_missing(&record, &columns) {
                report.anomalies.push(Anomaly::MissingOperand {
                    row: key,
                    column: column.to_owned(),
                });
            }
        }

        let (bad, good) = table.split(&inconsistent)?;
        report.flagged = inconsistent;
        if !report.flagged.is_empty() {
            log::warn!(
                "{} of {} records violate '{name}'",
                report.flagged.len(),
                table.len()
            );
        }

        Ok(CrossFieldOutcome {
            consistent: good,
            inconsistent: bad,
            report,
        })
    }

    /// Keys of records violating `invariant`, without building the partitions.
    pub fn violations(table: &Table, invariant: &dyn Invariant) -> Result<BTreeSet<RowKey>> {
        invariant.prepare(table)?;
        let mut keys = BTreeSet::new();
        let records = table.records()?;
        for record in records.rows() {
            if !invariant.check(&record)? {
                keys.insert(record.key());
            }
        }
        Ok(keys)
    }
}

fn first_missing<'c>(record: &RecordRef<'_>, columns: &[&'c str]) -> Option<&'c str> {
    columns
        .iter()
        .copied()
        .find(|c| record.get(c).is_ok_and(Value::is_missing))
}

fn numeric(record: &RecordRef<'_>, column: &str) -> Result<Option<f64>> {
    match record.get(column)? {
        Value::Missing => Ok(None),
        v => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| unsupported(column, "numeric check", v)),
    }
}

fn unsupported(column: &str, operation: &'static str, value: &Value) -> CleanError {
    match value.logical_type() {
        Some(found) => CleanError::UnsupportedType {
            column: column.to_owned(),
            operation,
            found,
        },
        None => CleanError::Other(format!("{operation}: '{column}' is missing")),
    }
}

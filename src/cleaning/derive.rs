//! New columns computed from existing ones.

use super::report::{Anomaly, CleaningReport};
use crate::error::{CleanError, Result};
use crate::table::{ColumnSpec, LogicalType, Table};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Row-wise sum of numeric `parts` into a new float column `into`.
///
/// A row with any missing part gets a missing sum and is flagged.
pub fn sum_columns(table: &Table, parts: &[&str], into: &str) -> Result<(Table, CleaningReport)> {
    if parts.is_empty() {
        return Err(CleanError::InvalidParameter(
            "sum_columns needs at least one column".to_owned(),
        ));
    }
    ensure_new_column(table, into)?;

    for part in parts {
        let spec = table.column_spec(part)?;
        if !spec.logical_type.is_numeric() {
            return Err(CleanError::UnsupportedType {
                column: (*part).to_owned(),
                operation: "sum_columns",
                found: spec.logical_type,
            });
        }
    }

    // Null propagates through `+`, so a missing part gives a missing sum
    let sum = parts
        .iter()
        .map(|part| col(*part).cast(DataType::Float64))
        .reduce(|acc, part| acc + part)
        .unwrap_or_else(|| lit(NULL));
    let evaluated = table.evaluate(vec![sum.alias(into)])?;

    let mut report = CleaningReport::new("sum_columns", parts);
    let missing = parts
        .iter()
        .map(|part| Ok(table.series(part)?.is_null()))
        .collect::<Result<Vec<_>>>()?;
    for (row, key) in table.keys()?.into_iter().enumerate() {
        for (mask, part) in missing.iter().zip(parts) {
            if mask.get(row) == Some(true) {
                report.flagged.insert(key);
                report.anomalies.push(Anomaly::MissingOperand {
                    row: key,
                    column: (*part).to_owned(),
                });
            }
        }
    }

    let total = evaluated.column(into)?.as_materialized_series().clone();
    let out = table.with_series(ColumnSpec::float(into), total)?;
    report.log();
    Ok((out, report))
}

/// Calendar component extracted from a datetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePart {
    /// Four-digit year, `"2018"`
    Year,
    /// Zero-padded month, `"03"`
    Month,
    /// Zero-padded day of month, `"05"`
    Day,
    /// English weekday name, `"Monday"`
    Weekday,
}

impl DatePart {
    fn format(self) -> &'static str {
        match self {
            Self::Year => "%Y",
            Self::Month => "%m",
            Self::Day => "%d",
            Self::Weekday => "%A",
        }
    }
}

/// Write one calendar component of datetime `column` into a new categorical column.
pub fn date_part(
    table: &Table,
    column: &str,
    part: DatePart,
    into: &str,
) -> Result<(Table, CleaningReport)> {
    let spec = table.column_spec(column)?;
    if spec.logical_type != LogicalType::Datetime {
        return Err(CleanError::UnsupportedType {
            column: column.to_owned(),
            operation: "date_part",
            found: spec.logical_type,
        });
    }
    ensure_new_column(table, into)?;

    let evaluated = table.evaluate(vec![col(column).dt().strftime(part.format()).alias(into)])?;
    let derived = evaluated.column(into)?.as_materialized_series().clone();

    let report = CleaningReport::new("date_part", &[column, into]);
    let out = table.with_series(ColumnSpec::categorical(into), derived)?;
    log::debug!(
        "Derived {part:?} of '{column}' into '{into}' for {} rows",
        out.len()
    );
    Ok((out, report))
}

fn ensure_new_column(table: &Table, name: &str) -> Result<()> {
    if table.has_column(name) {
        Err(CleanError::DuplicateColumn(name.to_owned()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;
    use anyhow::Result;
    use chrono::NaiveDate;

    fn opened(y: i32, m: u32, d: u32) -> Value {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map_or(Value::Missing, Value::Datetime)
    }

    #[test]
    fn test_date_part_year_and_weekday() -> Result<()> {
        let table = Table::from_rows(
            vec![ColumnSpec::datetime("account_opened")],
            vec![vec![opened(2018, 3, 5)], vec![Value::Missing]],
        )?;

        let (with_year, _) = date_part(&table, "account_opened", DatePart::Year, "acct_year")?;
        assert_eq!(
            with_year.column("acct_year")?,
            vec![Value::category("2018"), Value::Missing]
        );

        let (with_day, _) = date_part(&table, "account_opened", DatePart::Weekday, "weekday")?;
        let first = with_day.column("weekday")?.into_iter().next();
        assert_eq!(first, Some(Value::category("Monday")));
        Ok(())
    }

    #[test]
    fn test_date_part_rejects_non_datetime() -> Result<()> {
        let table = Table::from_rows(vec![ColumnSpec::text("d")], vec![vec![Value::text("x")]])?;
        assert!(date_part(&table, "d", DatePart::Year, "y").is_err());
        Ok(())
    }
}

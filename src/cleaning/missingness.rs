//! Missing-value counts and presence partitions.
//!
//! Everything here is descriptive. Deciding whether values are missing completely at random,
//! at random, or not at random is left to whoever reads the counts and group comparisons.

use crate::error::{CleanError, Result};
use crate::table::Table;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMissingness {
    pub name: String,
    pub missing: usize,
    pub total: usize,
}

impl ColumnMissingness {
    pub fn missing_pct(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.missing as f64 / self.total as f64) * 100.0
        }
    }
}

/// Column name → number of missing values.
pub fn missing_counts(table: &Table) -> BTreeMap<String, usize> {
    summarize(table)
        .into_iter()
        .map(|c| (c.name, c.missing))
        .collect()
}

/// Per-column missing counts in schema order.
pub fn summarize(table: &Table) -> Vec<ColumnMissingness> {
    table
        .null_counts()
        .into_iter()
        .map(|(name, missing)| ColumnMissingness {
            name: name.to_owned(),
            missing,
            total: table.len(),
        })
        .collect()
}

/// Rows with and without a value in one column.
#[derive(Clone, Debug)]
pub struct PresencePartition {
    pub column: String,
    pub present: Table,
    pub missing: Table,
}

pub fn partition_by_presence(table: &Table, column: &str) -> Result<PresencePartition> {
    let mask = table.series(column)?.is_null();
    let missing = table.filter(&mask)?;
    let present = table.filter(&!&mask)?;

    log::debug!(
        "'{column}': {} present, {} missing",
        present.len(),
        missing.len()
    );
    Ok(PresencePartition {
        column: column.to_owned(),
        present,
        missing,
    })
}

/// Count, mean, min and max of the non-missing numeric values in one group.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub count: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl GroupSummary {
    fn from_chunked(values: &Float64Chunked) -> Self {
        Self {
            count: values.len() - values.null_count(),
            mean: values.mean(),
            min: values.min(),
            max: values.max(),
        }
    }
}

/// A column described separately for the rows where the partition column is present and missing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupComparison {
    pub column: String,
    pub present: GroupSummary,
    pub missing: GroupSummary,
}

/// Describe numeric `columns` for both sides of a presence partition.
pub fn compare_groups(
    partition: &PresencePartition,
    columns: &[&str],
) -> Result<Vec<GroupComparison>> {
    columns
        .iter()
        .map(|column| {
            let spec = partition.present.column_spec(column)?;
            if !spec.logical_type.is_numeric() {
                return Err(CleanError::UnsupportedType {
                    column: (*column).to_owned(),
                    operation: "group comparison",
                    found: spec.logical_type,
                });
            }
            let describe = |table: &Table| -> Result<GroupSummary> {
                let numbers = table.series(column)?.cast(&DataType::Float64)?;
                Ok(GroupSummary::from_chunked(numbers.f64()?))
            };
            Ok(GroupComparison {
                column: (*column).to_owned(),
                present: describe(&partition.present)?,
                missing: describe(&partition.missing)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_pct() {
        let col = ColumnMissingness {
            name: "inv_amount".to_owned(),
            missing: 13,
            total: 100,
        };
        assert_eq!(col.missing_pct(), 13.0);

        let empty = ColumnMissingness {
            name: "x".to_owned(),
            missing: 0,
            total: 0,
        };
        assert_eq!(empty.missing_pct(), 0.0);
    }

    #[test]
    fn test_group_summary() {
        let values = Float64Chunked::new("height".into(), &[Some(2.0), None, Some(4.0), Some(9.0)]);
        let summary = GroupSummary::from_chunked(&values);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.mean, Some(5.0));
        assert_eq!(summary.min, Some(2.0));
        assert_eq!(summary.max, Some(9.0));

        let empty = GroupSummary::from_chunked(&Float64Chunked::full_null("height".into(), 2));
        assert_eq!(empty, GroupSummary::default());
    }
}

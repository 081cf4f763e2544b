//! Column summaries in the spirit of a `describe()` call.

use crate::error::Result;
use crate::table::{LogicalType, Table};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub logical_type: LogicalType,
    /// Non-missing values
    pub count: usize,
    pub missing: usize,
    pub unique: usize,
    /// Most frequent label, ties broken by the smallest label
    pub top: Option<String>,
    pub freq: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

pub fn describe(table: &Table, column: &str) -> Result<ColumnProfile> {
    let spec = table.column_spec(column)?;
    let series = table.series(column)?;
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for label in table.column(column)?.iter().filter_map(|v| v.label()) {
        *counts.entry(label).or_default() += 1;
    }

    // BTreeMap iterates labels in order, so `>` keeps the smallest label on ties.
    let (top, freq) = counts
        .iter()
        .fold((None, 0), |(best, best_n), (label, &n)| {
            if n > best_n {
                (Some(label.clone()), n)
            } else {
                (best, best_n)
            }
        });

    let (mean, min, max) = if spec.logical_type.is_numeric() {
        let numbers = series.cast(&DataType::Float64)?;
        let numbers = numbers.f64()?;
        (numbers.mean(), numbers.min(), numbers.max())
    } else {
        (None, None, None)
    };

    Ok(ColumnProfile {
        name: column.to_owned(),
        logical_type: spec.logical_type,
        count: counts.values().sum(),
        missing: series.null_count(),
        unique: counts.len(),
        top,
        freq,
        mean,
        min,
        max,
    })
}

/// [`describe`] for every column, in schema order.
pub fn describe_all(table: &Table) -> Result<Vec<ColumnProfile>> {
    table.column_names().map(|c| describe(table, c)).collect()
}

//! Duplicate record detection.
//!
//! Rows are compared by Polars on the chosen columns, missing values matching each other.
//! Float columns are compared after adding `0.0`, which turns `-0.0` into `0.0`.

use super::report::CleaningReport;
use crate::error::Result;
use crate::table::{LogicalType, Table, row_keys};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which occurrence of a duplicated group survives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Keep {
    #[default]
    First,
    Last,
    /// Every member of a duplicated group counts as a duplicate
    None,
}

impl Keep {
    fn strategy(self) -> UniqueKeepStrategy {
        match self {
            Self::First => UniqueKeepStrategy::First,
            Self::Last => UniqueKeepStrategy::Last,
            Self::None => UniqueKeepStrategy::None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DuplicateOutcome {
    pub unique: Table,
    pub duplicates: Table,
    pub report: CleaningReport,
}

/// Split rows into survivors and duplicates, comparing on `subset` (all columns when empty).
pub fn find_duplicates(table: &Table, subset: &[&str], keep: Keep) -> Result<DuplicateOutcome> {
    let columns: Vec<&str> = if subset.is_empty() {
        table.column_names().collect()
    } else {
        subset.to_vec()
    };

    let mut signed_zeros = Vec::new();
    for name in &columns {
        if table.column_spec(name)?.logical_type == LogicalType::Float {
            signed_zeros.push((col(*name) + lit(0.0)).alias(*name));
        }
    }
    let compared = if signed_zeros.is_empty() {
        table.frame().clone()
    } else {
        table.evaluate(signed_zeros)?
    };

    let names: Vec<String> = columns.iter().map(|c| (*c).to_owned()).collect();
    let survivors = compared.unique_stable(Some(names.as_slice()), keep.strategy(), None)?;
    let kept: BTreeSet<_> = row_keys(&survivors)?.into_iter().collect();
    let duplicate_keys: BTreeSet<_> = table
        .keys()?
        .into_iter()
        .filter(|k| !kept.contains(k))
        .collect();

    let mut report = CleaningReport::new("find_duplicates", &columns);
    let (duplicates, unique) = table.split(&duplicate_keys)?;
    report.flagged = duplicate_keys;
    report.log();

    Ok(DuplicateOutcome {
        unique,
        duplicates,
        report,
    })
}

//! Category label normalization and vocabulary checks.
//!
//! Correction and detection are separate entry points.
//! [`CategoryNormalizer::normalize`] rewrites labels (trim, fold case, remap synonyms, in that
//! order). [`detect_unrecognized`] only reads: it lists labels outside a reference vocabulary so
//! they can be audited before anyone decides on a remapping.

use super::report::{Anomaly, CleaningReport};
use crate::error::{CleanError, Result};
use crate::table::{ColumnSpec, RowKey, Table, Value};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const NORMALIZED: &str = "__normalized";
const CELL: &str = "label";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseFold {
    #[default]
    Keep,
    Lower,
    Upper,
}

impl CaseFold {
    pub fn apply(self, s: &str) -> String {
        match self {
            Self::Keep => s.to_owned(),
            Self::Lower => s.to_lowercase(),
            Self::Upper => s.to_uppercase(),
        }
    }
}

/// Label canonicalization. Trims whitespace by default and keeps case.
#[derive(Clone, Debug, PartialEq)]
pub struct CategoryNormalizer {
    trim: bool,
    case: CaseFold,
    synonyms: BTreeMap<String, String>,
    into: Option<String>,
}

impl Default for CategoryNormalizer {
    fn default() -> Self {
        Self {
            trim: true,
            case: CaseFold::Keep,
            synonyms: BTreeMap::new(),
            into: None,
        }
    }
}

impl CategoryNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    #[must_use]
    pub fn case(mut self, case: CaseFold) -> Self {
        self.case = case;
        self
    }

    /// Map `from` to the canonical `to`. `from` is matched after trimming and case folding.
    #[must_use]
    pub fn synonym(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.synonyms.insert(from.into(), to.into());
        self
    }

    #[must_use]
    pub fn synonyms<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.synonyms
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Write normalized labels to a new categorical column and keep the source.
    #[must_use]
    pub fn into_column(mut self, name: impl Into<String>) -> Self {
        self.into = Some(name.into());
        self
    }

    /// Synonym keys in the form labels take after trimming and case folding.
    fn lookup(&self) -> BTreeMap<String, String> {
        self.synonyms
            .iter()
            .map(|(from, to)| {
                let from = if self.trim { from.trim() } else { from.as_str() };
                (self.case.apply(from), to.clone())
            })
            .collect()
    }

    /// Trim, then fold case, then remap.
    fn expression(&self, column: &str) -> Expr {
        let mut label = col(column);
        if self.trim {
            label = label.str().strip_chars(lit(NULL));
        }
        label = match self.case {
            CaseFold::Keep => label,
            CaseFold::Lower => label.str().to_lowercase(),
            CaseFold::Upper => label.str().to_uppercase(),
        };
        self.lookup()
            .into_iter()
            .fold(label.clone(), |out, (from, to)| {
                when(label.clone().eq(lit(from)))
                    .then(lit(to))
                    .otherwise(out)
            })
    }

    /// Normalize a single label.
    pub fn normalize_label(&self, label: &str) -> Result<String> {
        let cell = Table::from_rows(
            vec![ColumnSpec::text(CELL)],
            vec![vec![Value::text(label)]],
        )?;
        let evaluated = cell.evaluate(vec![self.expression(CELL).alias(CELL)])?;
        let normalized = evaluated
            .column(CELL)?
            .as_materialized_series()
            .str()?
            .get(0).map(str::to_owned);
        Ok(normalized.unwrap_or_default())
    }

    pub fn normalize(&self, table: &Table, column: &str) -> Result<(Table, CleaningReport)> {
        let spec = table.column_spec(column)?;
        if !spec.logical_type.is_textual() {
            return Err(CleanError::UnsupportedType {
                column: column.to_owned(),
                operation: "normalize categories",
                found: spec.logical_type,
            });
        }

        let target_spec = match &self.into {
            Some(name) => {
                if name != column && table.has_column(name) {
                    return Err(CleanError::DuplicateColumn(name.clone()));
                }
                ColumnSpec::categorical(name.as_str())
            }
            None => spec.clone(),
        };

        let evaluated = table.evaluate(vec![self.expression(column).alias(NORMALIZED)])?;
        let normalized = evaluated.column(NORMALIZED)?.as_materialized_series().clone();

        let mut report = CleaningReport::new("normalize_categories", &[column]);
        let before = table.series(column)?.str()?;
        for ((key, old), new) in table
            .keys()?
            .into_iter()
            .zip(before)
            .zip(normalized.str()?)
        {
            if old != new {
                report.changed.insert(key);
            }
        }

        let out = table.with_series(target_spec, normalized)?;
        report.log();
        Ok((out, report))
    }
}

/// Result of comparing a column's labels against a reference vocabulary.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VocabularyCheck {
    pub column: String,
    /// Unrecognized label → rows carrying it
    pub unrecognized: BTreeMap<String, BTreeSet<RowKey>>,
    pub recognized_rows: BTreeSet<RowKey>,
    pub unrecognized_rows: BTreeSet<RowKey>,
    pub missing_rows: BTreeSet<RowKey>,
}

impl VocabularyCheck {
    pub fn is_clean(&self) -> bool {
        self.unrecognized.is_empty()
    }

    pub fn unrecognized_labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.unrecognized.keys().map(String::as_str)
    }

    /// `(unrecognized, rest)`, i.e. the rows with an out-of-vocabulary label and everything else.
    pub fn split(&self, table: &Table) -> Result<(Table, Table)> {
        table.split(&self.unrecognized_rows)
    }

    pub fn to_report(&self) -> CleaningReport {
        let mut report = CleaningReport::new("check_vocabulary", &[self.column.as_str()]);
        report.flagged = self.unrecognized_rows.clone();
        report.anomalies = self
            .unrecognized
            .iter()
            .map(|(label, rows)| Anomaly::OutOfVocabulary {
                label: label.clone(),
                rows: rows.clone(),
            })
            .collect();
        report
    }
}

/// List labels of `column` that are absent from `vocabulary`. Never modifies the table.
pub fn detect_unrecognized(
    table: &Table,
    column: &str,
    vocabulary: &BTreeSet<String>,
) -> Result<VocabularyCheck> {
    let mut check = VocabularyCheck {
        column: column.to_owned(),
        ..VocabularyCheck::default()
    };

    for (key, value) in table.column_values(column)? {
        match value.label() {
            None => {
                check.missing_rows.insert(key);
            }
            Some(label) if vocabulary.contains(&label) => {
                check.recognized_rows.insert(key);
            }
            Some(label) => {
                check.unrecognized_rows.insert(key);
                check.unrecognized.entry(label).or_default().insert(key);
            }
        }
    }

    if !check.is_clean() {
        log::warn!(
            "Column '{column}' has {} unrecognized labels across {} rows",
            check.unrecognized.len(),
            check.unrecognized_rows.len()
        );
    }
    Ok(check)
}

/// [`detect_unrecognized`] against the vocabulary declared on the column itself.
pub fn detect_against_domain(table: &Table, column: &str) -> Result<VocabularyCheck> {
    let spec = table.column_spec(column)?;
    let vocabulary = spec.vocabulary().ok_or_else(|| {
        CleanError::InvalidParameter(format!("column '{column}' declares no vocabulary"))
    })?;
    detect_unrecognized(table, column, vocabulary)
}

/// Sorted distinct labels of a column, ignoring missing values.
pub fn distinct_labels(table: &Table, column: &str) -> Result<BTreeSet<String>> {
    Ok(table
        .column(column)?
        .iter()
        .filter_map(Value::label)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_normalize_label_order() -> Result<()> {
        let normalizer = CategoryNormalizer::new()
            .trim(true)
            .case(CaseFold::Lower)
            .synonym("EUR", "europe");
        assert_eq!(normalizer.normalize_label("  EUR ")?, "europe");
        assert_eq!(normalizer.normalize_label("Asia")?, "asia");
        Ok(())
    }

    #[test]
    fn test_without_trim_whitespace_survives() -> Result<()> {
        let normalizer = CategoryNormalizer::new()
            .trim(false)
            .case(CaseFold::Upper);
        assert_eq!(normalizer.normalize_label(" hub ")?, " HUB ");
        Ok(())
    }

    #[test]
    fn test_case_fold_apply() {
        assert_eq!(CaseFold::Keep.apply("Mixed"), "Mixed");
        assert_eq!(CaseFold::Lower.apply("Mixed"), "mixed");
        assert_eq!(CaseFold::Upper.apply("Mixed"), "MIXED");
    }
}

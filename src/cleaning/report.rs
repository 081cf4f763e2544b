use crate::table::{LogicalType, RowKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Which bound a clamped value was moved to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClampDirection {
    /// Below the minimum, raised to it
    Raised,
    /// Above the maximum, lowered to it
    Lowered,
}

/// A data problem surfaced by an operation. Anomalies are never corrected silently.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    TypeCoercionFailure {
        row: RowKey,
        value: String,
        target: LogicalType,
    },
    OutOfVocabulary {
        label: String,
        rows: BTreeSet<RowKey>,
    },
    InvariantViolation {
        row: RowKey,
        invariant: String,
    },
    Unbinned {
        row: RowKey,
        value: f64,
    },
    MissingOperand {
        row: RowKey,
        column: String,
    },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeCoercionFailure { row, value, target } => {
                write!(f, "{row}: '{value}' is not a valid {target}")
            }
            Self::OutOfVocabulary { label, rows } => {
                write!(f, "'{label}' is outside the vocabulary ({} rows)", rows.len())
            }
            Self::InvariantViolation { row, invariant } => {
                write!(f, "{row}: violates '{invariant}'")
            }
            Self::Unbinned { row, value } => write!(f, "{row}: {value} falls outside every bin"),
            Self::MissingOperand { row, column } => {
                write!(f, "{row}: '{column}' is missing")
            }
        }
    }
}

/// Outcome of one cleaning operation: which rows it touched and what it found.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub operation: String,
    pub columns: Vec<String>,
    /// Rows whose value was rewritten
    pub changed: BTreeSet<RowKey>,
    /// Rows whose value became missing because it could not be converted
    pub coerced_to_missing: BTreeSet<RowKey>,
    /// Rows singled out for review (inconsistent, unbinned, unrecognized, duplicate)
    pub flagged: BTreeSet<RowKey>,
    pub clamped: BTreeMap<RowKey, ClampDirection>,
    pub anomalies: Vec<Anomaly>,
}

impl CleaningReport {
    pub fn new(operation: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            operation: operation.into(),
            columns: columns.iter().map(|c| (*c).to_owned()).collect(),
            ..Self::default()
        }
    }

    pub fn changed_count(&self) -> usize {
        self.changed.len()
    }

    pub fn flagged_count(&self) -> usize {
        self.flagged.len()
    }

    pub fn has_anomalies(&self) -> bool {
        !self.anomalies.is_empty()
    }

    /// One-line human summary, e.g. for logs.
    pub fn summary(&self) -> String {
        format!(
            "{} [{}]: {} changed, {} coerced to missing, {} clamped, {} flagged, {} anomalies",
            self.operation,
            self.columns.join(", "),
            self.changed.len(),
            self.coerced_to_missing.len(),
            self.clamped.len(),
            self.flagged.len(),
            self.anomalies.len()
        )
    }

    pub(crate) fn log(&self) {
        if self.has_anomalies() {
            log::warn!("{}", self.summary());
        } else {
            log::debug!("{}", self.summary());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let mut report = CleaningReport::new("clamp", &["tire_sizes"]);
        report.changed.insert(RowKey(1));
        report.clamped.insert(RowKey(1), ClampDirection::Lowered);

        let summary = report.summary();
        assert!(summary.starts_with("clamp [tire_sizes]"));
        assert!(summary.contains("1 changed"));
        assert!(summary.contains("1 clamped"));
        assert!(!report.has_anomalies());
    }

    #[test]
    fn test_anomaly_display() {
        let anomaly = Anomaly::TypeCoercionFailure {
            row: RowKey(4),
            value: "abc".to_owned(),
            target: LogicalType::Integer,
        };
        assert_eq!(anomaly.to_string(), "#4: 'abc' is not a valid integer");
    }
}

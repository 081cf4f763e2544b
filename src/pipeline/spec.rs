//! Pipeline specification data structures.
//!
//! Defines the JSON schema for pipeline specs: schema matching rules and the ordered list of
//! cleaning steps. Steps are tagged by `op`.

use crate::cleaning::{AgeMethod, Bound, CaseFold, CoercionPolicy, DatePart, Keep};
use crate::table::LogicalType;
use anyhow::{Context as _, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current pipeline spec version
pub const SPEC_VERSION: &str = "0.1";

/// Root pipeline specification structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Specification version for future migrations
    pub version: String,

    /// Human-readable pipeline name
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Schema validation rules
    #[serde(default)]
    pub schema: SchemaConfig,

    /// Ordered sequence of cleaning steps
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl PipelineSpec {
    /// Create a new pipeline spec with default settings
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: SPEC_VERSION.to_owned(),
            name: name.into(),
            description: None,
            schema: SchemaConfig::default(),
            steps: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Parse a pipeline spec from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse pipeline spec JSON")
    }

    /// Serialize pipeline spec to JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize pipeline spec")
    }
}

/// Schema validation configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Schema matching mode
    #[serde(default)]
    pub match_mode: SchemaMatchMode,

    /// Required column names
    #[serde(default)]
    pub required_columns: Vec<String>,
}

/// Schema matching mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaMatchMode {
    /// Required columns must exist, allow extra columns
    #[default]
    Tolerant,

    /// Exact match: required columns only, no extras
    Strict,
}

/// Cleaning step (tagged enum)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Convert a column to another logical type
    Coerce {
        column: String,
        to: LogicalType,
        /// Falls back to the run's configured policy
        #[serde(default, skip_serializing_if = "Option::is_none")]
        policy: Option<CoercionPolicy>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        strip_chars: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        into: Option<String>,
    },

    /// Clamp into `[min, max]`. With neither bound the column's declared range is used.
    Clamp {
        column: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<Bound>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<Bound>,
    },

    /// Trim, fold case and remap labels
    NormalizeCategories {
        column: String,
        #[serde(default = "default_true")]
        trim: bool,
        #[serde(default)]
        case: CaseFold,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        synonyms: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        into: Option<String>,
    },

    /// Bin a numeric column into labelled intervals
    Bin {
        column: String,
        into: String,
        /// `"inf"` and `"-inf"` are accepted for open ends
        #[serde(with = "breakpoints")]
        breakpoints: Vec<f64>,
        labels: Vec<String>,
        /// Falls back to the run's configured unbinned label
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unbinned_label: Option<String>,
    },

    /// Row-wise sum into a new float column
    SumColumns { columns: Vec<String>, into: String },

    /// Extract a calendar component into a new categorical column
    DatePart {
        column: String,
        part: DatePart,
        into: String,
    },

    /// Remove duplicate rows, comparing on `subset` (all columns when empty)
    DropDuplicates {
        #[serde(default)]
        subset: Vec<String>,
        #[serde(default)]
        keep: Keep,
    },

    /// Drop specified columns
    DropColumns { columns: Vec<String> },

    /// Rename columns according to mapping
    RenameColumns { mapping: BTreeMap<String, String> },

    /// Report labels outside a vocabulary. Uses the declared vocabulary when none is given.
    CheckVocabulary {
        column: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        vocabulary: Option<Vec<String>>,
    },

    /// Report rows whose parts do not add up to the total
    CheckSumEquals {
        parts: Vec<String>,
        total: String,
        /// Absolute tolerance, falls back to the run's default tolerance
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tolerance: Option<f64>,
    },

    /// Report rows whose stated age disagrees with the birth date
    CheckAge {
        birth_date: String,
        age: String,
        as_of: NaiveDate,
        #[serde(default)]
        method: AgeMethod,
        #[serde(default)]
        tolerance_years: i64,
    },
}

impl Step {
    /// The `op` tag, for messages
    pub fn op(&self) -> &'static str {
        match self {
            Self::Coerce { .. } => "coerce",
            Self::Clamp { .. } => "clamp",
            Self::NormalizeCategories { .. } => "normalize_categories",
            Self::Bin { .. } => "bin",
            Self::SumColumns { .. } => "sum_columns",
            Self::DatePart { .. } => "date_part",
            Self::DropDuplicates { .. } => "drop_duplicates",
            Self::DropColumns { .. } => "drop_columns",
            Self::RenameColumns { .. } => "rename_columns",
            Self::CheckVocabulary { .. } => "check_vocabulary",
            Self::CheckSumEquals { .. } => "check_sum_equals",
            Self::CheckAge { .. } => "check_age",
        }
    }

    /// Checks only report; they never change the table.
    pub fn is_check(&self) -> bool {
        matches!(
            self,
            Self::CheckVocabulary { .. } | Self::CheckSumEquals { .. } | Self::CheckAge { .. }
        )
    }
}

fn default_true() -> bool {
    true
}

/// Breakpoints as JSON numbers, with infinities spelled `"inf"` / `"-inf"`.
mod breakpoints {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Edge {
        Number(f64),
        Named(String),
    }

    pub(super) fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        values
            .iter()
            .map(|&v| {
                if v == f64::INFINITY {
                    Edge::Named("inf".to_owned())
                } else if v == f64::NEG_INFINITY {
                    Edge::Named("-inf".to_owned())
                } else {
                    Edge::Number(v)
                }
            })
            .collect::<Vec<_>>()
            .serialize(serializer)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        Vec::<Edge>::deserialize(deserializer)?
            .into_iter()
            .map(|edge| match edge {
                Edge::Number(v) => Ok(v),
                Edge::Named(name) => match name.trim().to_ascii_lowercase().as_str() {
                    "inf" | "+inf" | "infinity" => Ok(f64::INFINITY),
                    "-inf" | "-infinity" => Ok(f64::NEG_INFINITY),
                    _ => Err(D::Error::custom(format!("invalid breakpoint '{name}'"))),
                },
            })
            .collect()
    }
}

use super::value::LogicalType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Name, declared type and optional legal domain of a column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub logical_type: LogicalType,
    #[serde(default)]
    pub domain: Option<Domain>,
}

/// Legal values for a column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Domain {
    /// Inclusive numeric range, either end may be open
    Range { min: Option<f64>, max: Option<f64> },

    /// Closed set of labels
    Values { values: BTreeSet<String> },
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            domain: None,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Float)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Text)
    }

    pub fn categorical(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Categorical)
    }

    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, LogicalType::Datetime)
    }

    #[must_use]
    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = Some(domain);
        self
    }

    #[must_use]
    pub fn with_vocabulary<I, S>(self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_domain(Domain::Values {
            values: labels.into_iter().map(Into::into).collect(),
        })
    }

    /// Label set of a `Values` domain.
    pub fn vocabulary(&self) -> Option<&BTreeSet<String>> {
        match &self.domain {
            Some(Domain::Values { values }) => Some(values),
            _ => None,
        }
    }

    /// Bounds of a `Range` domain.
    pub fn range(&self) -> Option<(Option<f64>, Option<f64>)> {
        match &self.domain {
            Some(Domain::Range { min, max }) => Some((*min, *max)),
            _ => None,
        }
    }
}

//! Shared defaults for cleaning operations.
//!
//! [`CleaningConfig`] gathers the knobs that recur across many steps, such as the strings that
//! mean "missing" and the date formats to try, so a caller can keep them in one JSON document.

use crate::cleaning::coerce::CoercionPolicy;
use crate::error::{CleanError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CleaningConfig {
    /// Strings read as missing during coercion (compared case-insensitively after trimming)
    pub null_tokens: Vec<String>,
    /// Datetime formats tried in order when inferring a format
    pub datetime_formats: Vec<String>,
    /// Category written for values outside every bin; `None` leaves them missing
    pub unbinned_label: Option<String>,
    /// Policy used by coercers built from this config
    pub coercion_policy: CoercionPolicy,
    /// Absolute tolerance used by numeric cross-field checks that don't set their own
    pub default_tolerance: f64,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            null_tokens: ["", "na", "n/a", "nan", "null", "none"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            datetime_formats: [
                "%Y-%m-%d",
                "%Y-%m-%d %H:%M:%S",
                "%d-%m-%Y",
                "%m/%d/%Y",
                "%d/%m/%Y",
                "%B %d, %Y",
                "%b %d, %Y",
                "%Y/%m/%d",
            ]
            .into_iter()
            .map(str::to_owned)
            .collect(),
            unbinned_label: None,
            coercion_policy: CoercionPolicy::Coerce,
            default_tolerance: 0.0,
        }
    }
}

impl CleaningConfig {
    /// Parse from JSON, filling unspecified fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_tolerance.is_nan() || self.default_tolerance < 0.0 {
            return Err(CleanError::Config(format!(
                "default_tolerance must be a non-negative number, got {}",
                self.default_tolerance
            )));
        }
        if self.datetime_formats.is_empty() {
            return Err(CleanError::Config(
                "datetime_formats must list at least one format".to_owned(),
            ));
        }
        Ok(())
    }
}

//! Named buckets over ordered breakpoints.
//!
//! `n + 1` breakpoints define `n` intervals `[b_i, b_{i+1})`. The last interval is closed on the
//! right, so with an infinite final breakpoint it reaches to infinity. A value equal to a
//! breakpoint lands in the interval that breakpoint opens. Anything outside `[b_0, b_n]` is
//! unbinned: it is reported rather than treated as an error.

use super::report::{Anomaly, CleaningReport};
use crate::error::{CleanError, Result};
use crate::table::{ColumnSpec, Table};
use polars::prelude::*;

const BINNED: &str = "__binned";
const UNBINNED: &str = "__unbinned";
const OUTPUT: &str = "__output";

#[derive(Clone, Debug, PartialEq)]
pub struct Binner {
    breakpoints: Vec<f64>,
    labels: Vec<String>,
    unbinned_label: Option<String>,
}

impl Binner {
    /// # Errors
    ///
    /// `InvalidParameter` unless there is at least one label, exactly one more breakpoint than
    /// labels, and the breakpoints are strictly increasing with no NaN.
    pub fn new<I, S>(breakpoints: Vec<f64>, labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(CleanError::InvalidParameter(
                "binner needs at least one label".to_owned(),
            ));
        }
        if breakpoints.len() != labels.len() + 1 {
            return Err(CleanError::InvalidParameter(format!(
                "{} labels need {} breakpoints, got {}",
                labels.len(),
                labels.len() + 1,
                breakpoints.len()
            )));
        }
        if breakpoints.iter().any(|b| b.is_nan()) {
            return Err(CleanError::InvalidParameter(
                "breakpoints must not be NaN".to_owned(),
            ));
        }
        if breakpoints.windows(2).any(|w| !matches!(w, [a, b] if a < b)) {
            return Err(CleanError::InvalidParameter(format!(
                "breakpoints must be strictly increasing: {breakpoints:?}"
            )));
        }

        Ok(Self {
            breakpoints,
            labels,
            unbinned_label: None,
        })
    }

    /// Category written for unbinned values. Without one they become missing.
    #[must_use]
    pub fn with_unbinned_label(mut self, label: impl Into<String>) -> Self {
        self.unbinned_label = Some(label.into());
        self
    }

    pub fn breakpoints(&self) -> &[f64] {
        &self.breakpoints
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// `(lower, upper, closed_right, label)` per interval.
    fn intervals(&self) -> impl Iterator<Item = (f64, f64, bool, &str)> + '_ {
        let last = self.labels.len().saturating_sub(1);
        self.breakpoints
            .iter()
            .zip(self.breakpoints.iter().skip(1))
            .zip(&self.labels)
            .enumerate()
            .map(move |(i, ((lo, hi), label))| (*lo, *hi, i == last, label.as_str()))
    }

    pub fn bin_index(&self, value: f64) -> Option<usize> {
        self.intervals()
            .position(|(lo, hi, closed, _)| value >= lo && (value < hi || (closed && value <= hi)))
    }

    /// Label of the interval containing `value`, `None` when unbinned.
    pub fn bin_value(&self, value: f64) -> Option<&str> {
        self.bin_index(value)
            .and_then(|i| self.labels.get(i))
            .map(String::as_str)
    }

    /// Label expression over `value`, null outside every interval.
    fn expression(&self, value: Expr) -> Expr {
        let intervals: Vec<_> = self.intervals().collect();
        intervals.into_iter().rev().fold(
            lit(NULL).cast(DataType::String),
            |out, (lo, hi, closed, label)| {
                let upper = if closed {
                    value.clone().lt_eq(lit(hi))
                } else {
                    value.clone().lt(lit(hi))
                };
                when(value.clone().gt_eq(lit(lo)).and(upper))
                    .then(lit(label.to_owned()))
                    .otherwise(out)
            },
        )
    }

    /// Bin numeric `source` into a new categorical `target` column.
    pub fn bin(&self, table: &Table, source: &str, target: &str) -> Result<(Table, CleaningReport)> {
        let spec = table.column_spec(source)?;
        if !spec.logical_type.is_numeric() {
            return Err(CleanError::UnsupportedType {
                column: source.to_owned(),
                operation: "bin",
                found: spec.logical_type,
            });
        }
        if target != source && table.has_column(target) {
            return Err(CleanError::DuplicateColumn(target.to_owned()));
        }

        let value = col(source).cast(DataType::Float64);
        let unbinned = value.clone().is_not_null().and(col(BINNED).is_null());
        let output = match &self.unbinned_label {
            Some(label) => when(col(UNBINNED))
                .then(lit(label.clone()))
                .otherwise(col(BINNED)),
            None => col(BINNED),
        };
        let evaluated = table.evaluate(vec![
            self.expression(value).alias(BINNED),
            unbinned.alias(UNBINNED),
            output.alias(OUTPUT),
        ])?;

        let mut report = CleaningReport::new("bin", &[source, target]);
        let flags = evaluated.column(UNBINNED)?.as_materialized_series().bool()?;
        let values = table.series(source)?.cast(&DataType::Float64)?;
        for ((key, flag), value) in table.keys()?.into_iter().zip(flags).zip(values.f64()?) {
            if let (Some(true), Some(value)) = (flag, value) {
                report.flagged.insert(key);
                report.anomalies.push(Anomaly::Unbinned { row: key, value });
            }
        }

        let vocabulary = self.labels.iter().chain(&self.unbinned_label).cloned();
        let target_spec = ColumnSpec::categorical(target).with_vocabulary(vocabulary);
        let binned = evaluated.column(OUTPUT)?.as_materialized_series().clone();
        let out = table.with_series(target_spec, binned)?;

        report.log();
        Ok((out, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wait_types() -> Binner {
        Binner::new(vec![0.0, 60.0, 180.0, f64::INFINITY], ["short", "medium", "long"])
            .expect("valid binner")
    }

    #[test]
    fn test_breakpoint_falls_into_interval_it_opens() {
        let binner = wait_types();
        assert_eq!(binner.bin_value(0.0), Some("short"));
        assert_eq!(binner.bin_value(59.0), Some("short"));
        assert_eq!(binner.bin_value(60.0), Some("medium"));
        assert_eq!(binner.bin_value(180.0), Some("long"));
        assert_eq!(binner.bin_value(1000.0), Some("long"));
        assert_eq!(binner.bin_value(f64::INFINITY), Some("long"));
    }

    #[test]
    fn test_out_of_range_is_unbinned() {
        let binner = wait_types();
        assert_eq!(binner.bin_value(-1.0), None);
        assert_eq!(binner.bin_value(f64::NAN), None);
    }

    #[test]
    fn test_finite_last_breakpoint_is_closed() {
        let binner = Binner::new(vec![0.0, 10.0, 20.0], ["low", "high"]).expect("valid");
        assert_eq!(binner.bin_value(20.0), Some("high"));
        assert_eq!(binner.bin_value(20.5), None);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(Binner::new(vec![0.0, 1.0], Vec::<String>::new()).is_err());
        assert!(Binner::new(vec![0.0, 1.0], ["a", "b"]).is_err());
        assert!(Binner::new(vec![0.0, 0.0, 1.0], ["a", "b"]).is_err());
        assert!(Binner::new(vec![0.0, f64::NAN], ["a"]).is_err());
    }
}

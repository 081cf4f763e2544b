//! Pipeline execution engine.
//!
//! Applies pipeline specs to a table, running steps sequentially and collecting a run report
//! with one [`CleaningReport`] per step.

use super::spec::{PipelineSpec, Step};
use super::validation::validate_pipeline;
use crate::cleaning::{
    AgeMatches, Binner, CategoryNormalizer, CleaningReport, CrossFieldValidator, FieldCoercer,
    RangeClamper, SumEquals, Tolerance, date_part, detect_against_domain, detect_unrecognized,
    find_duplicates, sum_columns,
};
use crate::config::CleaningConfig;
use crate::table::Table;
use anyhow::{Context as _, Result};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

/// Report generated after pipeline execution
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Number of rows before processing
    pub rows_before: usize,

    /// Number of columns before processing
    pub columns_before: usize,

    /// Number of rows after processing
    pub rows_after: usize,

    /// Number of columns after processing
    pub columns_after: usize,

    /// Number of steps successfully applied
    pub steps_applied: usize,

    /// One report per step, in step order
    pub reports: Vec<CleaningReport>,

    /// Time taken for execution
    pub duration: Duration,
}

impl RunReport {
    /// Anomalies across all steps
    pub fn anomaly_count(&self) -> usize {
        self.reports.iter().map(|r| r.anomalies.len()).sum()
    }

    /// Create a summary message
    pub fn summary(&self) -> String {
        format!(
            "Pipeline completed: rows {} → {}, columns {} → {}, {} steps, {} anomalies, {:.2}s",
            self.rows_before,
            self.rows_after,
            self.columns_before,
            self.columns_after,
            self.steps_applied,
            self.anomaly_count(),
            self.duration.as_secs_f64()
        )
    }
}

/// Validate `spec` against `input` and run its steps in order.
///
/// The input table is left untouched. Any step error aborts the run with the step number in
/// the error context.
pub fn run_pipeline(
    spec: &PipelineSpec,
    input: &Table,
    config: &CleaningConfig,
) -> Result<(Table, RunReport)> {
    let start = Instant::now();
    config.validate().context("Invalid cleaning configuration")?;

    let validation_errors = validate_pipeline(spec, input.schema());
    if !validation_errors.is_empty() {
        return Err(anyhow::anyhow!(
            "Pipeline validation failed:\n{}",
            validation_errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n")
        ));
    }

    log::info!(
        "Running pipeline '{}' ({} steps) on {} rows",
        spec.name,
        spec.steps.len(),
        input.len()
    );

    let mut table = input.clone();
    let mut reports = Vec::with_capacity(spec.steps.len());

    for (idx, step) in spec.steps.iter().enumerate() {
        let (next, report) = apply_step(step, &table, config)
            .with_context(|| format!("Step {} ({}) failed", idx + 1, step.op()))?;
        log::debug!("Step {}: {}", idx + 1, report.summary());
        table = next;
        reports.push(report);
    }

    let report = RunReport {
        rows_before: input.len(),
        columns_before: input.width(),
        rows_after: table.len(),
        columns_after: table.width(),
        steps_applied: reports.len(),
        reports,
        duration: start.elapsed(),
    };
    log::info!("{}", report.summary());

    Ok((table, report))
}

/// Apply a single step
fn apply_step(
    step: &Step,
    table: &Table,
    config: &CleaningConfig,
) -> Result<(Table, CleaningReport)> {
    match step {
        Step::Coerce {
            column,
            to,
            policy,
            strip_chars,
            into,
        } => {
            let mut coercer = FieldCoercer::from_config(*to, config);
            if let Some(policy) = policy {
                coercer = coercer.policy(*policy);
            }
            if let Some(chars) = strip_chars {
                coercer = coercer.strip_chars(chars.as_str());
            }
            if let Some(into) = into {
                coercer = coercer.into_column(into.as_str());
            }
            Ok(coercer.coerce(table, column)?)
        }

        Step::Clamp { column, min, max } => {
            let clamper = if min.is_none() && max.is_none() {
                RangeClamper::from_domain(table.column_spec(column)?)?
            } else {
                RangeClamper::new(*min, *max)?
            };
            Ok(clamper.clamp(table, column)?)
        }

        Step::NormalizeCategories {
            column,
            trim,
            case,
            synonyms,
            into,
        } => {
            let mut normalizer = CategoryNormalizer::new()
                .trim(*trim)
                .case(*case)
                .synonyms(synonyms.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            if let Some(into) = into {
                normalizer = normalizer.into_column(into.as_str());
            }
            Ok(normalizer.normalize(table, column)?)
        }

        Step::Bin {
            column,
            into,
            breakpoints,
            labels,
            unbinned_label,
        } => {
            let mut binner = Binner::new(breakpoints.clone(), labels.iter().map(String::as_str))?;
            if let Some(label) = unbinned_label.as_ref().or(config.unbinned_label.as_ref()) {
                binner = binner.with_unbinned_label(label.as_str());
            }
            Ok(binner.bin(table, column, into)?)
        }

        Step::SumColumns { columns, into } => Ok(sum_columns(table, &as_strs(columns), into)?),

        Step::DatePart { column, part, into } => Ok(date_part(table, column, *part, into)?),

        Step::DropDuplicates { subset, keep } => {
            let outcome = find_duplicates(table, &as_strs(subset), *keep)?;
            Ok((outcome.unique, outcome.report))
        }

        Step::DropColumns { columns } => {
            let names = as_strs(columns);
            let out = table.drop_columns(&names)?;
            Ok((out, CleaningReport::new("drop_columns", &names)))
        }

        Step::RenameColumns { mapping } => {
            let mut out = table.clone();
            for (from, to) in mapping {
                out = out.rename_column(from, to)?;
            }
            let names: Vec<&str> = mapping.keys().map(String::as_str).collect();
            Ok((out, CleaningReport::new("rename_columns", &names)))
        }

        Step::CheckVocabulary { column, vocabulary } => {
            let check = match vocabulary {
                Some(labels) => {
                    let labels: BTreeSet<String> = labels.iter().cloned().collect();
                    detect_unrecognized(table, column, &labels)?
                }
                None => detect_against_domain(table, column)?,
            };
            Ok((table.clone(), check.to_report()))
        }

        Step::CheckSumEquals {
            parts,
            total,
            tolerance,
        } => {
            let tolerance = match tolerance.unwrap_or(config.default_tolerance) {
                t if t > 0.0 => Tolerance::Absolute(t),
                _ => Tolerance::Exact,
            };
            let invariant = SumEquals::new(parts.iter().map(String::as_str), total.as_str())
                .tolerance(tolerance);
            let outcome = CrossFieldValidator::validate(table, &invariant)?;
            Ok((table.clone(), outcome.report))
        }

        Step::CheckAge {
            birth_date,
            age,
            as_of,
            method,
            tolerance_years,
        } => {
            let invariant = AgeMatches::new(birth_date.as_str(), age.as_str(), *as_of)
                .method(*method)
                .tolerance_years(*tolerance_years);
            let outcome = CrossFieldValidator::validate(table, &invariant)?;
            Ok((table.clone(), outcome.report))
        }
    }
}

fn as_strs(names: &[String]) -> Vec<&str> {
    names.iter().map(String::as_str).collect()
}

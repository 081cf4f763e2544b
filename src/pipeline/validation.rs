//! Pipeline specification validation.
//!
//! Validates pipeline specs against the input schema before execution, catching errors early
//! with actionable messages. Steps are simulated in order so that schema changes made by earlier
//! steps are visible to later ones.

use super::spec::{PipelineSpec, SPEC_VERSION, SchemaMatchMode, Step};
use crate::cleaning::{Binner, Bound, RangeClamper};
use crate::table::{ColumnSpec, LogicalType};
use std::collections::{BTreeMap, BTreeSet};

/// Validation error with helpful context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub step_index: Option<usize>,
    pub message: String,
}

impl ValidationError {
    fn new(step_index: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            step_index,
            message: message.into(),
        }
    }

    fn step(step_index: usize, message: impl Into<String>) -> Self {
        Self::new(Some(step_index), message)
    }

    fn schema(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(idx) = self.step_index {
            write!(f, "Step {}: {}", idx + 1, self.message)
        } else {
            write!(f, "Schema: {}", self.message)
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Tracked {
    logical_type: LogicalType,
    has_vocabulary: bool,
    range: Option<(Option<f64>, Option<f64>)>,
}

impl From<&ColumnSpec> for Tracked {
    fn from(spec: &ColumnSpec) -> Self {
        Self {
            logical_type: spec.logical_type,
            has_vocabulary: spec.vocabulary().is_some(),
            range: spec.range(),
        }
    }
}

type Columns = BTreeMap<String, Tracked>;

/// Validate a pipeline spec against an input schema. An empty result means the spec is runnable.
pub fn validate_pipeline(spec: &PipelineSpec, input_schema: &[ColumnSpec]) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if spec.version != SPEC_VERSION {
        errors.push(ValidationError::schema(format!(
            "Unsupported spec version '{}', expected '{SPEC_VERSION}'",
            spec.version
        )));
    }

    validate_schema_requirements(spec, input_schema, &mut errors);

    let mut columns: Columns = input_schema
        .iter()
        .map(|c| (c.name.clone(), Tracked::from(c)))
        .collect();

    for (idx, step) in spec.steps.iter().enumerate() {
        validate_step(step, idx, &mut columns, &mut errors);
    }

    errors
}

fn validate_schema_requirements(
    spec: &PipelineSpec,
    input_schema: &[ColumnSpec],
    errors: &mut Vec<ValidationError>,
) {
    let input_cols: BTreeSet<&str> = input_schema.iter().map(|c| c.name.as_str()).collect();

    for required in &spec.schema.required_columns {
        if !input_cols.contains(required.as_str()) {
            errors.push(ValidationError::schema(format!(
                "Required column '{required}' not found in input"
            )));
        }
    }

    if spec.schema.match_mode == SchemaMatchMode::Strict {
        let required: BTreeSet<&str> = spec
            .schema
            .required_columns
            .iter()
            .map(String::as_str)
            .collect();
        let extra: Vec<_> = input_cols.difference(&required).collect();
        if !extra.is_empty() {
            errors.push(ValidationError::schema(format!(
                "Strict mode: unexpected columns found: {extra:?}"
            )));
        }
    }
}

fn validate_step(step: &Step, idx: usize, columns: &mut Columns, errors: &mut Vec<ValidationError>) {
    let mut ctx = StepCheck {
        idx,
        op: step.op(),
        columns,
        errors,
    };

    match step {
        Step::Coerce {
            column, to, into, ..
        } => {
            let Some(source) = ctx.existing(column) else {
                return;
            };
            let target = into.as_deref().unwrap_or(column);
            if target != column.as_str() {
                ctx.fresh(target);
            }
            ctx.insert(
                target,
                Tracked {
                    logical_type: *to,
                    has_vocabulary: source.has_vocabulary && to.is_textual(),
                    range: source.range.filter(|_| to.is_numeric()),
                },
            );
        }

        Step::Clamp { column, min, max } => {
            let Some(tracked) = ctx.existing(column) else {
                return;
            };
            let clamper = match (min, max, tracked.range) {
                (None, None, None) => {
                    ctx.fail(format!(
                        "Column '{column}' declares no range and the step gives no bounds"
                    ));
                    return;
                }
                (None, None, Some((lo, hi))) => {
                    RangeClamper::new(lo.map(Bound::Number), hi.map(Bound::Number))
                }
                _ => RangeClamper::new(*min, *max),
            };
            if let Err(e) = clamper.and_then(|c| c.resolve(column, tracked.logical_type)) {
                ctx.fail(e.to_string());
            }
        }

        Step::NormalizeCategories { column, into, .. } => {
            let Some(tracked) = ctx.existing(column) else {
                return;
            };
            if !tracked.logical_type.is_textual() {
                ctx.fail(format!(
                    "Cannot normalize {} column '{column}'",
                    tracked.logical_type
                ));
            }
            if let Some(into) = into.as_deref().filter(|i| *i != column.as_str()) {
                ctx.fresh(into);
                ctx.set(into, LogicalType::Categorical, false);
            }
        }

        Step::Bin {
            column,
            into,
            breakpoints,
            labels,
            ..
        } => {
            if let Some(tracked) = ctx.existing(column) {
                ctx.numeric(column, tracked);
            }
            if let Err(e) = Binner::new(breakpoints.clone(), labels.iter().map(String::as_str)) {
                ctx.fail(e.to_string());
            }
            if into != column {
                ctx.fresh(into);
            }
            ctx.set(into, LogicalType::Categorical, true);
        }

        Step::SumColumns { columns: parts, into } => {
            if parts.is_empty() {
                ctx.fail("sum_columns needs at least one column");
            }
            for part in parts {
                if let Some(tracked) = ctx.existing(part) {
                    ctx.numeric(part, tracked);
                }
            }
            ctx.fresh(into);
            ctx.set(into, LogicalType::Float, false);
        }

        Step::DatePart { column, into, .. } => {
            if let Some(tracked) = ctx.existing(column)
                && tracked.logical_type != LogicalType::Datetime
            {
                ctx.fail(format!(
                    "Cannot extract a date part from {} column '{column}'",
                    tracked.logical_type
                ));
            }
            ctx.fresh(into);
            ctx.set(into, LogicalType::Categorical, false);
        }

        Step::DropDuplicates { subset, .. } => {
            for column in subset {
                ctx.existing(column);
            }
        }

        Step::DropColumns { columns: drop } => {
            for column in drop {
                if ctx.existing(column).is_some() {
                    ctx.columns.remove(column);
                }
            }
        }

        Step::RenameColumns { mapping } => {
            for (from, to) in mapping {
                let Some(tracked) = ctx.existing(from) else {
                    continue;
                };
                if from != to && ctx.columns.contains_key(to) {
                    ctx.fail(format!(
                        "Cannot rename '{from}' to '{to}': target already exists"
                    ));
                    continue;
                }
                ctx.columns.remove(from);
                ctx.columns.insert(to.clone(), tracked);
            }
        }

        Step::CheckVocabulary { column, vocabulary } => {
            if let Some(tracked) = ctx.existing(column)
                && vocabulary.is_none()
                && !tracked.has_vocabulary
            {
                ctx.fail(format!(
                    "Column '{column}' declares no vocabulary and the step supplies none"
                ));
            }
        }

        Step::CheckSumEquals {
            parts,
            total,
            tolerance,
        } => {
            for column in parts.iter().chain(std::iter::once(total)) {
                if let Some(tracked) = ctx.existing(column) {
                    ctx.numeric(column, tracked);
                }
            }
            if let Some(t) = tolerance
                && (t.is_nan() || *t < 0.0)
            {
                ctx.fail(format!("Invalid tolerance {t} (must be >= 0)"));
            }
        }

        Step::CheckAge {
            birth_date,
            age,
            tolerance_years,
            ..
        } => {
            if let Some(tracked) = ctx.existing(birth_date)
                && tracked.logical_type != LogicalType::Datetime
            {
                ctx.fail(format!("Birth date column '{birth_date}' is not a datetime"));
            }
            if let Some(tracked) = ctx.existing(age) {
                ctx.numeric(age, tracked);
            }
            if *tolerance_years < 0 {
                ctx.fail(format!(
                    "Invalid tolerance_years {tolerance_years} (must be >= 0)"
                ));
            }
        }
    }
}

/// Column bookkeeping for one step.
struct StepCheck<'a> {
    idx: usize,
    op: &'static str,
    columns: &'a mut Columns,
    errors: &'a mut Vec<ValidationError>,
}

impl StepCheck<'_> {
    fn fail(&mut self, message: impl Into<String>) {
        self.errors.push(ValidationError::step(self.idx, message));
    }

    fn existing(&mut self, column: &str) -> Option<Tracked> {
        let tracked = self.columns.get(column).copied();
        if tracked.is_none() {
            let op = self.op;
            self.fail(format!("Cannot {op} non-existent column '{column}'"));
        }
        tracked
    }

    fn fresh(&mut self, column: &str) {
        if self.columns.contains_key(column) {
            let op = self.op;
            self.fail(format!("Cannot {op} into '{column}': column already exists"));
        }
    }

    fn numeric(&mut self, column: &str, tracked: Tracked) {
        if !tracked.logical_type.is_numeric() {
            let op = self.op;
            self.fail(format!(
                "Cannot {op} {} column '{column}'",
                tracked.logical_type
            ));
        }
    }

    fn set(&mut self, column: &str, logical_type: LogicalType, has_vocabulary: bool) {
        self.insert(
            column,
            Tracked {
                logical_type,
                has_vocabulary,
                range: None,
            },
        );
    }

    fn insert(&mut self, column: &str, tracked: Tracked) {
        self.columns.insert(column.to_owned(), tracked);
    }
}

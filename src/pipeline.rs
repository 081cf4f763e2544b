//! Declarative cleaning pipelines.
//!
//! A pipeline spec is a versioned JSON document listing cleaning steps. It is validated against
//! the input schema up front and then applied step by step, producing the cleaned table and a
//! run report with one [`CleaningReport`](crate::cleaning::CleaningReport) per step.
//!
//! # Overview
//!
//! Steps fall into three groups:
//! - **Transforms**: `coerce`, `clamp`, `normalize_categories`, `bin`, `sum_columns`, `date_part`
//! - **Structure**: `drop_duplicates`, `drop_columns`, `rename_columns`
//! - **Checks** (report only): `check_vocabulary`, `check_sum_equals`, `check_age`
//!
//! # Example
//!
//! ```no_run
//! use tabscrub::config::CleaningConfig;
//! use tabscrub::pipeline::{PipelineSpec, run_pipeline};
//! use tabscrub::table::{ColumnSpec, Table, Value};
//!
//! let spec = PipelineSpec::from_json(r#"{
//!     "version": "0.1",
//!     "name": "ride sharing",
//!     "steps": [
//!         {"op": "coerce", "column": "duration", "to": "integer", "strip_chars": "minutes"},
//!         {"op": "clamp", "column": "duration", "max": 60}
//!     ]
//! }"#)?;
//!
//! let input = Table::from_rows(
//!     vec![ColumnSpec::text("duration")],
//!     vec![vec![Value::text("12 minutes")], vec![Value::text("95 minutes")]],
//! )?;
//!
//! let (cleaned, report) = run_pipeline(&spec, &input, &CleaningConfig::default())?;
//! println!("{}", report.summary());
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod executor;
pub mod spec;
pub mod validation;

pub use executor::{RunReport, run_pipeline};
pub use spec::{PipelineSpec, SPEC_VERSION, SchemaConfig, SchemaMatchMode, Step};
pub use validation::{ValidationError, validate_pipeline};

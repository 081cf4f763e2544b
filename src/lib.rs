//! # Tabscrub - Tabular Data Cleaning Core
//!
//! Tabscrub is a Rust library for cleaning in-memory tabular data. Every operation takes a table
//! and returns a new table plus a report of what changed, so steps can be audited and composed
//! in any order.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tabscrub::cleaning::{FieldCoercer, RangeClamper, Bound};
//! use tabscrub::table::{ColumnSpec, LogicalType, Table, Value};
//!
//! let rides = Table::from_rows(
//!     vec![ColumnSpec::text("duration")],
//!     vec![vec![Value::text("12 minutes")], vec![Value::text("8 minutes")]],
//! )?;
//!
//! // "12 minutes" -> 12
//! let (rides, report) = FieldCoercer::new(LogicalType::Integer)
//!     .strip_chars("minutes")
//!     .coerce(&rides, "duration")?;
//! println!("{}", report.summary());
//!
//! let (rides, _) = RangeClamper::at_most(Bound::Number(10.0))?.clamp(&rides, "duration")?;
//! # Ok::<(), tabscrub::error::CleanError>(())
//! ```
//!
//! ## Core Modules
//!
//! - [`table`]: In-memory table with declared column types and stable row keys
//! - [`cleaning`]: The cleaning components and their reports
//! - [`pipeline`]: JSON pipeline specs, validation and execution
//! - [`config`]: Shared defaults (null tokens, date formats, policies)
//! - [`error`]: Error types and handling utilities
//! - [`logging`]: `env_logger` setup
//!
//! ## Key Concepts
//!
//! ### Missing values
//!
//! `Value::Missing` is a first-class value in every column type. Coercion failures, null tokens
//! and unbinned numbers all end up there, and the report says which rows did.
//!
//! ### Detection vs. correction
//!
//! Vocabulary checks and cross-field validation never modify data. They return partitions and
//! reports so you can audit before deciding on a remapping or a drop.

#![warn(clippy::all, rust_2018_idioms)]

pub mod cleaning;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod table;

//! Cleaning components.
//!
//! Every operation follows the same shape: it borrows a [`Table`](crate::table::Table), takes the
//! column name(s) and parameters it needs, and returns a new table together with a
//! [`CleaningReport`] describing which rows it touched and what anomalies it found. The input
//! table is never modified and no operation depends on another having run first.
//!
//! | Step | Entry point |
//! |---|---|
//! | Type coercion | [`FieldCoercer::coerce`] |
//! | Range clamping | [`RangeClamper::clamp`] |
//! | Label normalization | [`CategoryNormalizer::normalize`], [`detect_unrecognized`] |
//! | Binning | [`Binner::bin`] |
//! | Cross-field checks | [`CrossFieldValidator::validate`] |
//! | Missingness | [`missing_counts`], [`partition_by_presence`], [`compare_groups`] |
//! | Derived columns | [`sum_columns`], [`date_part`] |
//! | Duplicates | [`find_duplicates`] |
//! | Profiling | [`describe`] |

pub mod binning;
pub mod categories;
pub mod clamp;
pub mod coerce;
pub mod cross_field;
pub mod derive;
pub mod duplicates;
pub mod missingness;
pub mod profile;
pub mod report;

pub use binning::Binner;
pub use categories::{
    CaseFold, CategoryNormalizer, VocabularyCheck, detect_against_domain, detect_unrecognized,
    distinct_labels,
};
pub use clamp::{Bound, Limits, RangeClamper};
pub use coerce::{CoercionPolicy, FieldCoercer};
pub use cross_field::{
    AgeMatches, AgeMethod, CrossFieldOutcome, CrossFieldValidator, FnInvariant, Invariant,
    SumEquals, Tolerance,
};
pub use derive::{DatePart, date_part, sum_columns};
pub use duplicates::{DuplicateOutcome, Keep, find_duplicates};
pub use missingness::{
    ColumnMissingness, GroupComparison, GroupSummary, PresencePartition, compare_groups,
    missing_counts, partition_by_presence, summarize,
};
pub use profile::{ColumnProfile, describe, describe_all};
pub use report::{Anomaly, ClampDirection, CleaningReport};

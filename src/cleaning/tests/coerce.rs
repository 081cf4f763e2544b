use super::{column, date, ride_sharing};
use crate::cleaning::*;
use crate::config::CleaningConfig;
use crate::error::CleanError;
use crate::table::*;
use anyhow::Result;
use std::collections::BTreeSet;

#[test]
fn test_duration_into_integer_column() -> Result<()> {
    let rides = ride_sharing();
    let coercer = FieldCoercer::new(LogicalType::Integer)
        .strip_chars("minutes")
        .into_column("duration_time");

    let (out, report) = coercer.coerce(&rides, "duration")?;

    // Source column is kept beside the new one
    assert_eq!(column(&out, "duration"), column(&rides, "duration"));
    assert_eq!(
        column(&out, "duration_time"),
        vec![
            Value::Int(12),
            Value::Int(24),
            Value::Int(8),
            Value::Int(4),
            Value::Missing
        ]
    );
    assert_eq!(
        out.column_spec("duration_time")?.logical_type,
        LogicalType::Integer
    );
    assert_eq!(report.changed_count(), 4);
    assert!(report.coerced_to_missing.is_empty());
    assert!(!report.has_anomalies());
    Ok(())
}

#[test]
fn test_coerce_mode_never_fails_and_output_conforms() -> Result<()> {
    let table = Table::from_rows(
        vec![ColumnSpec::text("raw")],
        vec![
            vec![Value::text("5")],
            vec![Value::text("abc")],
            vec![Value::text("N/A")],
            vec![Value::Missing],
            vec![Value::text("7.0")],
            vec![Value::text("7.5")],
        ],
    )?;

    let (out, report) = FieldCoercer::new(LogicalType::Integer).coerce(&table, "raw")?;
    let values = column(&out, "raw");

    assert!(values.iter().all(|v| v.conforms_to(LogicalType::Integer)));
    assert_eq!(
        values,
        vec![
            Value::Int(5),
            Value::Missing,
            Value::Missing,
            Value::Missing,
            Value::Int(7),
            Value::Missing
        ]
    );
    // A null token is an ordinary missing value, not a failure
    assert_eq!(
        report.coerced_to_missing,
        BTreeSet::from([RowKey(1), RowKey(5)])
    );
    assert_eq!(report.anomalies.len(), 2);
    Ok(())
}

#[test]
fn test_strict_mode_aborts_on_first_failure() -> Result<()> {
    let table = Table::from_rows(
        vec![ColumnSpec::text("raw")],
        vec![
            vec![Value::text("1")],
            vec![Value::text("x")],
            vec![Value::text("y")],
        ],
    )?;

    let err = FieldCoercer::new(LogicalType::Float)
        .policy(CoercionPolicy::Strict)
        .coerce(&table, "raw")
        .unwrap_err();

    match err {
        CleanError::TypeCoercion { row, value, target, .. } => {
            assert_eq!(row, RowKey(1));
            assert_eq!(value, "x");
            assert_eq!(target, LogicalType::Float);
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[test]
fn test_integer_to_categorical() -> Result<()> {
    let rides = ride_sharing();
    let (out, _) = FieldCoercer::new(LogicalType::Categorical).coerce(&rides, "user_type")?;

    let profile = describe(&out, "user_type")?;
    assert_eq!(profile.logical_type, LogicalType::Categorical);
    assert_eq!(profile.unique, 3);
    assert_eq!(profile.top.as_deref(), Some("2"));
    assert_eq!(profile.freq, 3);
    Ok(())
}

#[test]
fn test_mixed_date_formats() -> Result<()> {
    let table = Table::from_rows(
        vec![ColumnSpec::text("account_opened")],
        vec![
            vec![Value::text("2018-03-05")],
            vec![Value::text("21-10-2019")],
            vec![Value::text("March 26, 2018")],
            vec![Value::text("garbage")],
        ],
    )?;
    let coercer = FieldCoercer::from_config(LogicalType::Datetime, &CleaningConfig::default());

    let (out, report) = coercer.coerce(&table, "account_opened")?;

    assert_eq!(
        column(&out, "account_opened"),
        vec![
            date(2018, 3, 5),
            date(2019, 10, 21),
            date(2018, 3, 26),
            Value::Missing
        ]
    );
    assert_eq!(report.coerced_to_missing.len(), 1);
    Ok(())
}

#[test]
fn test_input_table_is_untouched() -> Result<()> {
    let rides = ride_sharing();
    let before = rides.clone();
    let _ = FieldCoercer::new(LogicalType::Integer)
        .strip_chars("minutes")
        .coerce(&rides, "duration")?;
    assert_eq!(rides, before);
    Ok(())
}

#[test]
fn test_coerce_errors() {
    let rides = ride_sharing();
    assert!(matches!(
        FieldCoercer::new(LogicalType::Integer).coerce(&rides, "nope"),
        Err(CleanError::UnknownColumn(_))
    ));
    assert!(matches!(
        FieldCoercer::new(LogicalType::Integer)
            .into_column("user_type")
            .coerce(&rides, "duration"),
        Err(CleanError::DuplicateColumn(_))
    ));
}

use super::{column, date, ride_sharing};
use crate::cleaning::*;
use crate::error::CleanError;
use crate::table::*;
use anyhow::Result;

#[test]
fn test_categorical_tire_sizes_capped() -> Result<()> {
    let rides = ride_sharing();
    let clamper = RangeClamper::at_most(Bound::Number(27.0))?;

    let (out, report) = clamper.clamp(&rides, "tire_sizes")?;

    assert_eq!(
        column(&out, "tire_sizes"),
        vec![
            Value::category("26"),
            Value::category("27"),
            Value::category("27"),
            Value::category("27"),
            Value::category("26")
        ]
    );
    assert_eq!(
        out.column_spec("tire_sizes")?.logical_type,
        LogicalType::Categorical
    );
    assert_eq!(report.clamped.len(), 2);
    assert_eq!(
        report.clamped.get(&RowKey(2)),
        Some(&ClampDirection::Lowered)
    );
    Ok(())
}

#[test]
fn test_clamp_is_idempotent() -> Result<()> {
    let table = Table::from_rows(
        vec![ColumnSpec::integer("tire")],
        vec![
            vec![Value::Int(26)],
            vec![Value::Int(29)],
            vec![Value::Int(12)],
            vec![Value::Missing],
        ],
    )?;
    let clamper = RangeClamper::new(Some(Bound::Number(20.0)), Some(Bound::Number(27.0)))?;

    let (once, first) = clamper.clamp(&table, "tire")?;
    let (twice, second) = clamper.clamp(&once, "tire")?;

    assert_eq!(once, twice);
    assert_eq!(
        column(&once, "tire"),
        vec![Value::Int(26), Value::Int(27), Value::Int(20), Value::Missing]
    );
    assert_eq!(first.clamped.get(&RowKey(2)), Some(&ClampDirection::Raised));
    assert_eq!(second.changed_count(), 0);
    Ok(())
}

#[test]
fn test_fractional_bounds_on_integer_column() -> Result<()> {
    let table = Table::from_rows(
        vec![ColumnSpec::integer("n")],
        vec![vec![Value::Int(0)], vec![Value::Int(2)], vec![Value::Int(5)]],
    )?;
    let clamper = RangeClamper::new(Some(Bound::Number(1.5)), Some(Bound::Number(3.5)))?;

    let (out, _) = clamper.clamp(&table, "n")?;

    assert_eq!(
        column(&out, "n"),
        vec![Value::Int(2), Value::Int(2), Value::Int(3)]
    );
    Ok(())
}

#[test]
fn test_future_subscription_dates_capped_at_today() -> Result<()> {
    let table = Table::from_rows(
        vec![ColumnSpec::datetime("subscription_date")],
        vec![vec![date(2019, 4, 1)], vec![date(2043, 1, 1)]],
    )?;
    let today = date(2020, 6, 1).as_datetime().unwrap();

    let (out, report) = RangeClamper::at_most(Bound::Datetime(today))?
        .clamp(&table, "subscription_date")?;

    assert_eq!(
        column(&out, "subscription_date"),
        vec![date(2019, 4, 1), date(2020, 6, 1)]
    );
    assert_eq!(report.clamped.keys().copied().collect::<Vec<_>>(), vec![RowKey(1)]);
    Ok(())
}

#[test]
fn test_domain_range_drives_clamp() -> Result<()> {
    let spec = ColumnSpec::float("rating").with_domain(Domain::Range {
        min: Some(1.0),
        max: Some(5.0),
    });
    let table = Table::from_rows(
        vec![spec.clone()],
        vec![vec![Value::Float(0.5)], vec![Value::Float(4.5)], vec![Value::Float(6.0)]],
    )?;

    let (out, _) = RangeClamper::from_domain(&spec)?.clamp(&table, "rating")?;

    assert_eq!(
        column(&out, "rating"),
        vec![Value::Float(1.0), Value::Float(4.5), Value::Float(5.0)]
    );
    Ok(())
}

#[test]
fn test_clamp_rejections() -> Result<()> {
    assert!(RangeClamper::new(Some(Bound::Number(5.0)), Some(Bound::Number(1.0))).is_err());
    assert!(RangeClamper::at_most(Bound::Number(f64::NAN)).is_err());

    let text = Table::from_rows(vec![ColumnSpec::text("t")], vec![vec![Value::text("a")]])?;
    let clamper = RangeClamper::at_most(Bound::Number(1.0))?;
    assert!(matches!(
        clamper.clamp(&text, "t"),
        Err(CleanError::UnsupportedType { .. })
    ));

    let labels = Table::from_rows(
        vec![ColumnSpec::categorical("c")],
        vec![vec![Value::category("big")]],
    )?;
    assert!(matches!(
        clamper.clamp(&labels, "c"),
        Err(CleanError::TypeCoercion { .. })
    ));
    Ok(())
}

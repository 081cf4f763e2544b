use super::{airlines, column};
use crate::cleaning::*;
use crate::error::CleanError;
use crate::table::*;
use anyhow::Result;

fn wait_binner() -> Result<Binner> {
    Ok(Binner::new(
        vec![0.0, 60.0, 180.0, f64::INFINITY],
        ["short", "medium", "long"],
    )?)
}

#[test]
fn test_wait_times_binned() -> Result<()> {
    let flights = airlines();

    let (out, report) = wait_binner()?.bin(&flights, "wait_min", "wait_type")?;

    assert_eq!(
        column(&out, "wait_type"),
        vec![
            Value::category("short"),
            Value::category("medium"),
            Value::category("medium"),
            Value::category("long")
        ]
    );
    assert_eq!(column(&out, "wait_min"), column(&flights, "wait_min"));
    assert!(!report.has_anomalies());

    let vocabulary = out.column_spec("wait_type")?.vocabulary().cloned();
    assert_eq!(vocabulary.map(|v| v.len()), Some(3));
    Ok(())
}

#[test]
fn test_edges_open_upper_interval_except_last() -> Result<()> {
    let binner = Binner::new(vec![10.0, 60.0, 61.0, 200.0], ["short", "medium", "long"])?;
    let table = Table::from_rows(
        vec![ColumnSpec::float("wait")],
        [10.0, 60.0, 61.0, 200.0]
            .into_iter()
            .map(|v| vec![Value::Float(v)])
            .collect(),
    )?;

    let (out, _) = binner.bin(&table, "wait", "label")?;

    assert_eq!(
        column(&out, "label"),
        vec![
            Value::category("short"),
            Value::category("medium"),
            Value::category("long"),
            Value::category("long")
        ]
    );
    Ok(())
}

#[test]
fn test_out_of_range_is_flagged_missing_is_not() -> Result<()> {
    let table = Table::from_rows(
        vec![ColumnSpec::integer("wait")],
        vec![
            vec![Value::Int(-5)],
            vec![Value::Missing],
            vec![Value::Int(30)],
        ],
    )?;
    let binner = Binner::new(vec![0.0, 60.0], ["short"])?;

    let (out, report) = binner.bin(&table, "wait", "label")?;
    assert_eq!(
        column(&out, "label"),
        vec![Value::Missing, Value::Missing, Value::category("short")]
    );
    assert_eq!(report.flagged.iter().copied().collect::<Vec<_>>(), vec![RowKey(0)]);
    assert_eq!(
        report.anomalies,
        vec![Anomaly::Unbinned {
            row: RowKey(0),
            value: -5.0
        }]
    );

    let (labelled, _) = binner
        .with_unbinned_label("other")
        .bin(&table, "wait", "label")?;
    assert_eq!(column(&labelled, "label")[0], Value::category("other"));
    assert_eq!(labelled.column_spec("label")?.vocabulary().map(|v| v.len()), Some(2));
    assert_eq!(column(&labelled, "label")[1], Value::Missing);
    Ok(())
}

#[test]
fn test_bin_errors() -> Result<()> {
    let flights = airlines();
    let binner = wait_binner()?;
    assert!(matches!(
        binner.bin(&flights, "day", "x"),
        Err(CleanError::UnsupportedType { .. })
    ));
    assert!(matches!(
        binner.bin(&flights, "wait_min", "day"),
        Err(CleanError::DuplicateColumn(_))
    ));
    assert!(Binner::new(vec![0.0, 60.0], ["a", "b"]).is_err());
    assert!(Binner::new(vec![60.0, 0.0], ["a"]).is_err());
    Ok(())
}

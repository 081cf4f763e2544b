use super::{FUNDS, banking, column};
use crate::cleaning::*;
use crate::error::CleanError;
use crate::table::*;
use anyhow::Result;
use chrono::NaiveDate;
use std::collections::BTreeSet;

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 6, 1).unwrap()
}

#[test]
fn test_fund_sum_partitions_records() -> Result<()> {
    let bank = banking();

    let outcome = CrossFieldValidator::validate(&bank, &SumEquals::new(FUNDS, "inv_amount"))?;

    assert_eq!(
        column(&outcome.consistent, "cust_id"),
        vec![Value::text("870A9281"), Value::text("F2158F66")]
    );
    assert_eq!(
        column(&outcome.inconsistent, "cust_id"),
        vec![Value::text("166B05B0"), Value::text("BFC13E88")]
    );
    assert_eq!(
        outcome.consistent.len() + outcome.inconsistent_count(),
        bank.len()
    );
    assert_eq!(outcome.report.flagged_count(), 2);
    Ok(())
}

#[test]
fn test_missing_operand_is_inconsistent_and_reported() -> Result<()> {
    let bank = banking();
    let outcome = CrossFieldValidator::validate(&bank, &SumEquals::new(FUNDS, "inv_amount"))?;

    assert!(outcome.report.anomalies.contains(&Anomaly::MissingOperand {
        row: RowKey(2),
        column: "fund_D".to_owned(),
    }));
    assert!(
        outcome
            .report
            .anomalies
            .iter()
            .any(|a| matches!(a, Anomaly::InvariantViolation { row: RowKey(1), .. }))
    );
    Ok(())
}

#[test]
fn test_tolerance_accepts_small_drift() -> Result<()> {
    let bank = banking();
    let loose = SumEquals::new(FUNDS, "inv_amount").tolerance(Tolerance::Absolute(1.0));

    let violations = CrossFieldValidator::violations(&bank, &loose)?;

    // Only the row with a missing fund remains
    assert_eq!(violations.into_iter().collect::<Vec<_>>(), vec![RowKey(2)]);
    Ok(())
}

#[test]
fn test_age_by_year_difference() -> Result<()> {
    let bank = banking();
    let check = AgeMatches::new("birth_date", "Age", as_of());

    let outcome = CrossFieldValidator::validate(&bank, &check)?;

    assert_eq!(
        column(&outcome.inconsistent, "cust_id"),
        vec![Value::text("F2158F66")]
    );
    Ok(())
}

#[test]
fn test_age_completed_years_and_tolerance() -> Result<()> {
    let bank = banking();
    let strict = AgeMatches::new("birth_date", "Age", as_of()).method(AgeMethod::Completed);
    assert_eq!(
        CrossFieldValidator::violations(&bank, &strict)?,
        BTreeSet::from([RowKey(0), RowKey(1)])
    );

    let lenient = strict.tolerance_years(1);
    assert!(CrossFieldValidator::violations(&bank, &lenient)?.is_empty());
    Ok(())
}

#[test]
fn test_closure_invariant() -> Result<()> {
    let bank = banking();
    let positive = FnInvariant::new("acct_amount > 150", ["acct_amount"], |record| {
        Ok(record.get("acct_amount")?.as_f64().is_some_and(|v| v > 150.0))
    });

    let outcome = CrossFieldValidator::validate(&bank, &positive)?;
    assert_eq!(outcome.consistent.len(), 3);
    assert_eq!(outcome.inconsistent.keys()?, vec![RowKey(0)]);
    Ok(())
}

#[test]
fn test_invariant_column_errors() {
    let bank = banking();
    assert!(matches!(
        CrossFieldValidator::validate(&bank, &SumEquals::new(["fund_Z"], "inv_amount")),
        Err(CleanError::UnknownColumn(_))
    ));
    assert!(matches!(
        CrossFieldValidator::validate(&bank, &SumEquals::new(["cust_id"], "inv_amount")),
        Err(CleanError::UnsupportedType { .. })
    ));
}

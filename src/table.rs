//! In-memory table shared by every cleaning operation.
//!
//! A [`Table`] wraps a Polars [`DataFrame`] together with the declared [`ColumnSpec`] of
//! each column. The frame carries one hidden `UInt64` column, [`ROW_KEY`], holding the
//! stable [`RowKey`] of every record, so reports and partitions can refer back to the
//! records they came from even after rows have been split across several tables.
//!
//! Every logical type has exactly one storage dtype (see [`LogicalType::dtype`]) and
//! columns only enter the frame through checked entry points, so the frame always agrees
//! with the schema. Cleaning operations build Polars expressions and hand them to
//! [`Table::evaluate`]; [`Value`] is only used at the edges, to build tables and to read
//! cells back for reports.

pub mod schema;
pub mod value;

pub use schema::{ColumnSpec, Domain};
pub use value::{LogicalType, Value, format_datetime};
pub(crate) use value::{from_millis, to_millis};

use crate::error::{CleanError, Result, ResultExt as _};
use polars::prelude::{
    BooleanChunked, Column, DataFrame, DataType, Expr, IntoLazy as _, NamedFrom as _, Series,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// Name of the hidden key column. User columns may not take it.
pub const ROW_KEY: &str = "__row_key";

/// Stable identity of a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowKey(pub u64);

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct Table {
    schema: Vec<ColumnSpec>,
    frame: DataFrame,
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.frame.equals_missing(&other.frame)
    }
}

impl Table {
    /// Create an empty table, rejecting duplicate column names.
    pub fn new(schema: Vec<ColumnSpec>) -> Result<Self> {
        Self::from_keyed_rows(schema, Vec::new())
    }

    /// Build a table from rows, assigning keys `0..n` in row order.
    pub fn from_rows(schema: Vec<ColumnSpec>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let keyed = (0..).map(RowKey).zip(rows).collect();
        Self::from_keyed_rows(schema, keyed)
    }

    /// Build a table from rows under caller-chosen keys (e.g. the index column of a loaded
    /// file). Rejects wrong widths, repeated keys and values of the wrong type.
    pub fn from_keyed_rows(schema: Vec<ColumnSpec>, rows: Vec<(RowKey, Vec<Value>)>) -> Result<Self> {
        check_names(&schema)?;

        let mut seen = HashSet::with_capacity(rows.len());
        for (key, values) in &rows {
            if values.len() != schema.len() {
                return Err(CleanError::RowWidth {
                    expected: schema.len(),
                    found: values.len(),
                });
            }
            if !seen.insert(*key) {
                return Err(CleanError::DuplicateRowKey(*key));
            }
        }

        let keys: Vec<u64> = rows.iter().map(|(key, _)| key.0).collect();
        let mut columns = Vec::with_capacity(schema.len() + 1);
        columns.push(Column::from(Series::new(ROW_KEY.into(), keys)));
        for (idx, spec) in schema.iter().enumerate() {
            let values: Vec<Value> = rows
                .iter()
                .filter_map(|(_, row)| row.get(idx).cloned())
                .collect();
            columns.push(Column::from(series_from_values(spec, &values)?));
        }

        let frame = DataFrame::new(columns).context("Failed to assemble table")?;
        Ok(Self { schema, frame })
    }

    /// Wrap a loaded frame. Column types are inferred from the dtypes and rows are keyed
    /// by position.
    pub fn from_frame(frame: &DataFrame) -> Result<Self> {
        let mut schema = Vec::with_capacity(frame.width());
        let mut columns = Vec::with_capacity(frame.width());
        for column in frame.get_columns() {
            let name = column.name().to_string();
            let logical_type = LogicalType::from_dtype(column.dtype()).ok_or_else(|| {
                CleanError::DataProcessing(format!(
                    "Column '{name}' has unsupported dtype {}",
                    column.dtype()
                ))
            })?;
            let spec = ColumnSpec::new(name, logical_type);
            let series = column.as_materialized_series().clone();
            columns.push(Column::from(conform_series(&spec, series)?));
            schema.push(spec);
        }
        check_names(&schema)?;

        let mut frame = DataFrame::new(columns)?
            .with_row_index(ROW_KEY.into(), None)
            .context("Failed to index rows")?;
        let keys = frame.column(ROW_KEY)?.cast(&DataType::UInt64)?;
        frame.with_column(keys)?;
        Ok(Self { schema, frame })
    }

    /// The cleaned data as a plain frame, without the key column.
    pub fn to_frame(&self) -> Result<DataFrame> {
        self.frame.drop(ROW_KEY).context("Failed to export table")
    }

    pub(crate) fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn schema(&self) -> &[ColumnSpec] {
        &self.schema
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.schema.iter().map(|s| s.name.as_str())
    }

    pub fn width(&self) -> usize {
        self.schema.len()
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.schema.iter().any(|s| s.name == name)
    }

    pub fn column_spec(&self, name: &str) -> Result<&ColumnSpec> {
        self.schema
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| CleanError::UnknownColumn(name.to_owned()))
    }

    pub fn keys(&self) -> Result<Vec<RowKey>> {
        row_keys(&self.frame)
    }

    /// The stored column.
    pub fn series(&self, name: &str) -> Result<&Series> {
        self.column_spec(name)?;
        Ok(self.frame.column(name)?.as_materialized_series())
    }

    /// Cells of one column in row order.
    pub fn column(&self, name: &str) -> Result<Vec<Value>> {
        let spec = self.column_spec(name)?;
        values_from_series(self.series(name)?, spec.logical_type)
    }

    /// `(key, value)` pairs of one column in row order.
    pub fn column_values(&self, name: &str) -> Result<Vec<(RowKey, Value)>> {
        Ok(self.keys()?.into_iter().zip(self.column(name)?).collect())
    }

    /// Missing cells per column, in schema order.
    pub fn null_counts(&self) -> Vec<(&str, usize)> {
        self.frame
            .get_columns()
            .iter()
            .filter(|c| c.name().as_str() != ROW_KEY)
            .map(|c| (c.name().as_str(), c.null_count()))
            .collect()
    }

    /// Every row materialized for record-at-a-time checks.
    pub fn records(&self) -> Result<Records> {
        let names: Vec<String> = self.column_names().map(str::to_owned).collect();
        let columns = names
            .iter()
            .map(|name| self.column(name))
            .collect::<Result<Vec<_>>>()?;
        Ok(Records {
            keys: self.keys()?,
            names,
            columns,
        })
    }

    /// Return a copy with `spec.name` set to `values`. An existing column of that name is
    /// replaced in place (and may change type); otherwise the column is appended.
    pub fn with_column(&self, spec: ColumnSpec, values: Vec<Value>) -> Result<Self> {
        if values.len() != self.len() {
            return Err(CleanError::InvalidParameter(format!(
                "column '{}' has {} values for {} rows",
                spec.name,
                values.len(),
                self.len()
            )));
        }
        let series = series_from_values(&spec, &values)?;
        self.with_series(spec, series)
    }

    /// Like [`Table::with_column`] for a column computed by Polars. The series is cast to
    /// the storage dtype of `spec`.
    pub(crate) fn with_series(&self, spec: ColumnSpec, series: Series) -> Result<Self> {
        if spec.name == ROW_KEY {
            return Err(reserved());
        }
        if series.len() != self.len() {
            return Err(CleanError::InvalidParameter(format!(
                "column '{}' has {} values for {} rows",
                spec.name,
                series.len(),
                self.len()
            )));
        }
        let series = conform_series(&spec, series)?;

        let mut out = self.clone();
        out.frame
            .with_column(series)
            .with_context(|| format!("Failed to store column '{}'", spec.name))?;
        match out.schema.iter_mut().find(|s| s.name == spec.name) {
            Some(slot) => *slot = spec,
            None => out.schema.push(spec),
        }
        Ok(out)
    }

    /// Run column expressions over the frame, in order. Each expression may refer to the
    /// aliases of the ones before it.
    pub(crate) fn evaluate(&self, steps: Vec<Expr>) -> Result<DataFrame> {
        steps
            .into_iter()
            .fold(self.frame.clone().lazy(), |lf, expr| lf.with_column(expr))
            .collect()
            .context("Failed to evaluate column expressions")
    }

    pub fn drop_columns(&self, names: &[&str]) -> Result<Self> {
        for name in names {
            self.column_spec(name)?;
        }
        let mut out = self.clone();
        for name in names {
            if out.has_column(name) {
                out.frame = out.frame.drop(name)?;
                out.schema.retain(|s| s.name != *name);
            }
        }
        Ok(out)
    }

    pub fn rename_column(&self, from: &str, to: &str) -> Result<Self> {
        self.column_spec(from)?;
        if from == to {
            return Ok(self.clone());
        }
        if to == ROW_KEY {
            return Err(reserved());
        }
        if self.has_column(to) {
            return Err(CleanError::DuplicateColumn(to.to_owned()));
        }

        let mut out = self.clone();
        out.frame.rename(from, to.into())?;
        if let Some(spec) = out.schema.iter_mut().find(|s| s.name == from) {
            spec.name = to.to_owned();
        }
        Ok(out)
    }

    /// Rows selected by `mask`, in original order, under the same schema.
    pub(crate) fn filter(&self, mask: &BooleanChunked) -> Result<Self> {
        Ok(Self {
            schema: self.schema.clone(),
            frame: self.frame.filter(mask).context("Failed to filter rows")?,
        })
    }

    /// Rows whose key is in `keys`, in original order.
    pub fn subset(&self, keys: &BTreeSet<RowKey>) -> Result<Self> {
        self.filter(&self.key_mask(keys)?)
    }

    /// Split rows into `(matching, rest)` by key membership.
    pub fn split(&self, keys: &BTreeSet<RowKey>) -> Result<(Self, Self)> {
        let mask = self.key_mask(keys)?;
        Ok((self.filter(&mask)?, self.filter(&!&mask)?))
    }

    fn key_mask(&self, keys: &BTreeSet<RowKey>) -> Result<BooleanChunked> {
        Ok(self.keys()?.iter().map(|k| keys.contains(k)).collect())
    }
}

/// Materialized rows of a table, see [`Table::records`].
#[derive(Clone, Debug)]
pub struct Records {
    keys: Vec<RowKey>,
    names: Vec<String>,
    columns: Vec<Vec<Value>>,
}

impl Records {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = RecordRef<'_>> + '_ {
        self.keys
            .iter()
            .enumerate()
            .map(move |(row, &key)| RecordRef {
                records: self,
                row,
                key,
            })
    }
}

/// Borrowed view of one record, addressed by column name.
#[derive(Clone, Copy, Debug)]
pub struct RecordRef<'a> {
    records: &'a Records,
    row: usize,
    key: RowKey,
}

impl<'a> RecordRef<'a> {
    pub fn key(&self) -> RowKey {
        self.key
    }

    pub fn get(&self, column: &str) -> Result<&'a Value> {
        self.records
            .names
            .iter()
            .position(|n| n == column)
            .and_then(|idx| self.records.columns.get(idx))
            .and_then(|values| values.get(self.row))
            .ok_or_else(|| CleanError::UnknownColumn(column.to_owned()))
    }
}

fn reserved() -> CleanError {
    CleanError::InvalidParameter(format!("'{ROW_KEY}' is reserved for row keys"))
}

fn check_names(schema: &[ColumnSpec]) -> Result<()> {
    let mut seen = HashSet::new();
    for spec in schema {
        if spec.name == ROW_KEY {
            return Err(reserved());
        }
        if !seen.insert(spec.name.as_str()) {
            return Err(CleanError::DuplicateColumn(spec.name.clone()));
        }
    }
    Ok(())
}

/// Keys of a frame carrying the key column.
pub(crate) fn row_keys(frame: &DataFrame) -> Result<Vec<RowKey>> {
    Ok(frame
        .column(ROW_KEY)?
        .as_materialized_series()
        .u64()?
        .into_iter()
        .flatten()
        .map(RowKey)
        .collect())
}

/// Cast to the storage dtype under the column's name. NaN is stored as null.
fn conform_series(spec: &ColumnSpec, series: Series) -> Result<Series> {
    let name = spec.name.as_str();
    let mut series = series.cast(&spec.logical_type.dtype())?;
    if spec.logical_type == LogicalType::Float {
        let cleaned: Vec<Option<f64>> = series
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect();
        series = Series::new(name.into(), cleaned);
    }
    series.rename(name.into());
    Ok(series)
}

/// Build a column, refusing values whose type disagrees with `spec`.
pub(crate) fn series_from_values(spec: &ColumnSpec, values: &[Value]) -> Result<Series> {
    if let Some(bad) = values.iter().find(|v| !v.conforms_to(spec.logical_type)) {
        return Err(CleanError::TypeMismatch {
            column: spec.name.clone(),
            expected: spec.logical_type,
            found: bad
                .logical_type()
                .map_or_else(|| "missing".to_owned(), |t| t.to_string()),
        });
    }

    let name = spec.name.as_str().into();
    let series = match spec.logical_type {
        LogicalType::Integer => {
            Series::new(name, values.iter().map(Value::as_int).collect::<Vec<_>>())
        }
        LogicalType::Float => Series::new(
            name,
            values
                .iter()
                .map(|v| v.as_f64().filter(|x| !x.is_nan()))
                .collect::<Vec<_>>(),
        ),
        LogicalType::Text | LogicalType::Categorical => {
            Series::new(name, values.iter().map(Value::as_str).collect::<Vec<_>>())
        }
        LogicalType::Datetime => Series::new(
            name,
            values
                .iter()
                .map(|v| v.as_datetime().map(to_millis))
                .collect::<Vec<_>>(),
        )
        .cast(&LogicalType::Datetime.dtype())?,
    };
    Ok(series)
}

/// Read a stored column back as cells of `logical_type`.
pub(crate) fn values_from_series(series: &Series, logical_type: LogicalType) -> Result<Vec<Value>> {
    Ok(match logical_type {
        LogicalType::Integer => series
            .i64()?
            .into_iter()
            .map(|v| v.map_or(Value::Missing, Value::Int))
            .collect(),
        LogicalType::Float => series
            .f64()?
            .into_iter()
            .map(|v| v.map_or(Value::Missing, Value::float))
            .collect(),
        LogicalType::Text => series
            .str()?
            .into_iter()
            .map(|v| v.map_or(Value::Missing, Value::text))
            .collect(),
        LogicalType::Categorical => series
            .str()?
            .into_iter()
            .map(|v| v.map_or(Value::Missing, Value::category))
            .collect(),
        LogicalType::Datetime => series
            .cast(&DataType::Int64)?
            .i64()?
            .into_iter()
            .map(|v| v.and_then(from_millis).map_or(Value::Missing, Value::Datetime))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::NaiveDate;

    fn rides() -> Result<Table> {
        Ok(Table::from_rows(
            vec![
                ColumnSpec::text("duration"),
                ColumnSpec::integer("station_A_id"),
            ],
            vec![
                vec![Value::text("12 minutes"), Value::Int(21)],
                vec![Value::text("24 minutes"), Value::Int(16)],
                vec![Value::Missing, Value::Int(3)],
            ],
        )?)
    }

    #[test]
    fn test_duplicate_schema_names_rejected() {
        let result = Table::new(vec![ColumnSpec::text("a"), ColumnSpec::integer("a")]);
        assert!(matches!(result, Err(CleanError::DuplicateColumn(name)) if name == "a"));

        let result = Table::new(vec![ColumnSpec::integer(ROW_KEY)]);
        assert!(matches!(result, Err(CleanError::InvalidParameter(_))));
    }

    #[test]
    fn test_rows_must_match_declared_types() {
        let schema = || vec![ColumnSpec::text("duration"), ColumnSpec::integer("id")];

        let err = Table::from_rows(schema(), vec![vec![Value::Int(5), Value::Int(1)]]);
        assert!(matches!(err, Err(CleanError::TypeMismatch { .. })));

        let err = Table::from_rows(schema(), vec![vec![Value::Missing]]);
        assert!(matches!(
            err,
            Err(CleanError::RowWidth {
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn test_keyed_rows_keep_their_keys() -> Result<()> {
        let schema = || vec![ColumnSpec::integer("x")];
        let table = Table::from_keyed_rows(
            schema(),
            vec![
                (RowKey(10), vec![Value::Int(1)]),
                (RowKey(4), vec![Value::Int(2)]),
            ],
        )?;
        assert_eq!(table.keys()?, vec![RowKey(10), RowKey(4)]);

        let repeated = Table::from_keyed_rows(
            schema(),
            vec![
                (RowKey(10), vec![Value::Int(1)]),
                (RowKey(10), vec![Value::Int(3)]),
            ],
        );
        assert!(matches!(
            repeated,
            Err(CleanError::DuplicateRowKey(RowKey(10)))
        ));
        Ok(())
    }

    #[test]
    fn test_cells_read_back_unchanged() -> Result<()> {
        let opened = NaiveDate::from_ymd_opt(2018, 3, 5).and_then(|d| d.and_hms_opt(9, 30, 0));
        let row = vec![
            Value::Float(2.5),
            Value::category("Clean"),
            opened.map_or(Value::Missing, Value::Datetime),
        ];
        let table = Table::from_rows(
            vec![
                ColumnSpec::float("amount"),
                ColumnSpec::categorical("cleanliness"),
                ColumnSpec::datetime("opened"),
            ],
            vec![row.clone(), vec![Value::Missing; 3]],
        )?;

        assert_eq!(table.series("amount")?.dtype(), &DataType::Float64);
        assert_eq!(table.records()?.rows().count(), 2);
        for (spec, expected) in table.schema().iter().zip(row) {
            let cells = table.column(&spec.name)?;
            assert_eq!(cells, vec![expected, Value::Missing]);
        }
        assert_eq!(table.null_counts().first(), Some(&("amount", 1)));
        Ok(())
    }

    #[test]
    fn test_with_column_appends_and_replaces() -> Result<()> {
        let table = rides()?;
        let added = table.with_column(
            ColumnSpec::integer("duration_time"),
            vec![Value::Int(12), Value::Int(24), Value::Missing],
        )?;
        assert_eq!(added.width(), 3);
        assert_eq!(table.width(), 2, "source table untouched");

        let replaced = added.with_column(
            ColumnSpec::float("station_A_id"),
            vec![Value::Float(1.0), Value::Float(2.0), Value::Float(3.0)],
        )?;
        assert_eq!(replaced.width(), 3);
        assert_eq!(
            replaced.column_spec("station_A_id")?.logical_type,
            LogicalType::Float
        );
        assert_eq!(
            replaced.column_names().collect::<Vec<_>>(),
            vec!["duration", "station_A_id", "duration_time"]
        );

        let wrong = table.with_column(
            ColumnSpec::integer("bad"),
            vec![Value::text("x"), Value::Missing, Value::Missing],
        );
        assert!(wrong.is_err());
        Ok(())
    }

    #[test]
    fn test_split_is_disjoint_and_exhaustive() -> Result<()> {
        let table = rides()?;
        let chosen: BTreeSet<RowKey> = [RowKey(0), RowKey(2)].into_iter().collect();
        let (picked, rest) = table.split(&chosen)?;
        assert_eq!(picked.len(), 2);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest.keys()?, vec![RowKey(1)]);
        assert_eq!(picked.schema(), table.schema());
        Ok(())
    }

    #[test]
    fn test_drop_and_rename() -> Result<()> {
        let table = rides()?;
        let renamed = table.rename_column("station_A_id", "station")?;
        assert!(renamed.has_column("station"));
        assert!(renamed.rename_column("station", "duration").is_err());

        let dropped = renamed.drop_columns(&["duration"])?;
        assert_eq!(dropped.column_names().collect::<Vec<_>>(), vec!["station"]);
        let records = dropped.records()?;
        let first = records.rows().next().map(|r| r.get("station").cloned());
        assert!(matches!(first, Some(Ok(Value::Int(21)))));
        Ok(())
    }

    #[test]
    fn test_frame_import_and_export() -> Result<()> {
        let frame = DataFrame::new(vec![
            Column::from(Series::new("wait_min".into(), [10i32, 60, 61])),
            Column::from(Series::new(
                "dest_region".into(),
                [Some("EUR"), None, Some("Asia")],
            )),
        ])?;

        let table = Table::from_frame(&frame)?;
        assert_eq!(table.keys()?, vec![RowKey(0), RowKey(1), RowKey(2)]);
        assert_eq!(
            table.column_spec("wait_min")?.logical_type,
            LogicalType::Integer
        );
        assert_eq!(table.column("wait_min")?.get(2), Some(&Value::Int(61)));
        assert_eq!(table.column("dest_region")?.get(1), Some(&Value::Missing));

        let exported = table.to_frame()?;
        assert_eq!(exported.width(), 2);
        assert!(exported.column(ROW_KEY).is_err());
        Ok(())
    }
}

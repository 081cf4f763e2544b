use chrono::{DateTime, NaiveDateTime, Timelike as _};
use polars::prelude::{DataType, TimeUnit};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared logical type of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalType {
    Integer,
    Float,
    Text,
    Categorical,
    Datetime,
}

impl LogicalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Text => "text",
            Self::Categorical => "categorical",
            Self::Datetime => "datetime",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }

    pub fn is_textual(self) -> bool {
        matches!(self, Self::Text | Self::Categorical)
    }

    /// Storage dtype of a column with this type. Categorical labels are stored as strings.
    pub fn dtype(self) -> DataType {
        match self {
            Self::Integer => DataType::Int64,
            Self::Float => DataType::Float64,
            Self::Text | Self::Categorical => DataType::String,
            Self::Datetime => DataType::Datetime(TimeUnit::Milliseconds, None),
        }
    }

    /// Logical type for a loaded column, `None` for dtypes the cleaners do not handle.
    pub fn from_dtype(dtype: &DataType) -> Option<Self> {
        match dtype {
            d if d.is_integer() => Some(Self::Integer),
            d if d.is_float() => Some(Self::Float),
            DataType::String => Some(Self::Text),
            DataType::Date | DataType::Datetime(..) => Some(Self::Datetime),
            _ => None,
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single cell. `Missing` is legal in every column regardless of its declared type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    #[default]
    Missing,
    Int(i64),
    Float(f64),
    Text(String),
    Category(String),
    Datetime(NaiveDateTime),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn category(s: impl Into<String>) -> Self {
        Self::Category(s.into())
    }

    /// Float constructor that maps NaN to `Missing`.
    pub fn float(v: f64) -> Self {
        if v.is_nan() {
            Self::Missing
        } else {
            Self::Float(v)
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// The logical type this value carries, `None` for `Missing`.
    pub fn logical_type(&self) -> Option<LogicalType> {
        match self {
            Self::Missing => None,
            Self::Int(_) => Some(LogicalType::Integer),
            Self::Float(_) => Some(LogicalType::Float),
            Self::Text(_) => Some(LogicalType::Text),
            Self::Category(_) => Some(LogicalType::Categorical),
            Self::Datetime(_) => Some(LogicalType::Datetime),
        }
    }

    pub fn conforms_to(&self, ty: LogicalType) -> bool {
        self.logical_type().is_none_or(|t| t == ty)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Category(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Datetime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Display label for a present value, `None` for `Missing`.
    pub fn label(&self) -> Option<String> {
        match self {
            Self::Missing => None,
            Self::Int(v) => Some(v.to_string()),
            Self::Float(v) => Some(v.to_string()),
            Self::Text(s) | Self::Category(s) => Some(s.clone()),
            Self::Datetime(dt) => Some(format_datetime(*dt)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label() {
            Some(label) => f.write_str(&label),
            None => f.write_str("<missing>"),
        }
    }
}

/// Date-only rendering when the time part is midnight.
pub fn format_datetime(dt: NaiveDateTime) -> String {
    if dt.num_seconds_from_midnight() == 0 && dt.nanosecond() == 0 {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Datetimes are stored as milliseconds since the epoch.
pub(crate) fn to_millis(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

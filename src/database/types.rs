//! SQL Server type mapping to JSON.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use tiberius::xml::XmlData;
use tiberius::{ColumnType, Row};
use uuid::Uuid;

/// One result row: column name to value, in column order.
pub type ResultRow = Map<String, Value>;

/// A single column value read from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Decimal(Decimal),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeUtc(DateTime<Utc>),
}

impl SqlValue {
    /// Convert to the JSON representation returned to tool callers.
    ///
    /// Decimals are emitted as strings so no precision is lost; non-finite
    /// floats become `null`.
    pub fn into_json(self) -> Value {
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Bool(v) => Value::Bool(v),
            SqlValue::I16(v) => Value::from(v),
            SqlValue::I32(v) => Value::from(v),
            SqlValue::I64(v) => Value::from(v),
            SqlValue::U8(v) => Value::from(v),
            SqlValue::F32(v) => float(f64::from(v)),
            SqlValue::F64(v) => float(v),
            SqlValue::String(v) => Value::String(v),
            SqlValue::Bytes(v) => Value::String(format!("0x{}", hex::encode(&v))),
            SqlValue::Decimal(v) => Value::String(v.to_string()),
            SqlValue::Uuid(v) => Value::String(v.to_string()),
            SqlValue::Date(v) => Value::String(v.format("%Y-%m-%d").to_string()),
            SqlValue::Time(v) => Value::String(v.format("%H:%M:%S%.f").to_string()),
            SqlValue::DateTime(v) => Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            SqlValue::DateTimeUtc(v) => Value::String(v.to_rfc3339()),
        }
    }
}

fn float(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

/// Type mapper for converting tiberius rows.
pub struct TypeMapper;

impl TypeMapper {
    /// Extract a value from a tiberius row column.
    pub fn extract_column(row: &Row, idx: usize) -> SqlValue {
        let Some(column) = row.columns().get(idx) else {
            return SqlValue::Null;
        };

        // The driver hands MONEY over as f64; keep it a fixed-point decimal
        if matches!(column.column_type(), ColumnType::Money | ColumnType::Money4) {
            return row
                .try_get::<f64, _>(idx)
                .ok()
                .flatten()
                .and_then(money_to_decimal)
                .map_or(SqlValue::Null, SqlValue::Decimal);
        }

        // Strings (most common)
        if let Some(v) = row.try_get::<&str, _>(idx).ok().flatten() {
            return SqlValue::String(v.to_string());
        }

        // Integers
        if let Some(v) = row.try_get::<i32, _>(idx).ok().flatten() {
            return SqlValue::I32(v);
        }
        if let Some(v) = row.try_get::<i64, _>(idx).ok().flatten() {
            return SqlValue::I64(v);
        }
        if let Some(v) = row.try_get::<i16, _>(idx).ok().flatten() {
            return SqlValue::I16(v);
        }
        // TINYINT is unsigned in SQL Server
        if let Some(v) = row.try_get::<u8, _>(idx).ok().flatten() {
            return SqlValue::U8(v);
        }

        // Floating point
        if let Some(v) = row.try_get::<f64, _>(idx).ok().flatten() {
            return SqlValue::F64(v);
        }
        if let Some(v) = row.try_get::<f32, _>(idx).ok().flatten() {
            return SqlValue::F32(v);
        }

        if let Some(v) = row.try_get::<Decimal, _>(idx).ok().flatten() {
            return SqlValue::Decimal(v);
        }

        if let Some(v) = row.try_get::<bool, _>(idx).ok().flatten() {
            return SqlValue::Bool(v);
        }

        if let Some(v) = row.try_get::<Uuid, _>(idx).ok().flatten() {
            return SqlValue::Uuid(v);
        }

        // Date/Time types
        if let Some(v) = row.try_get::<NaiveDateTime, _>(idx).ok().flatten() {
            return SqlValue::DateTime(v);
        }
        if let Some(v) = row.try_get::<DateTime<Utc>, _>(idx).ok().flatten() {
            return SqlValue::DateTimeUtc(v);
        }
        if let Some(v) = row.try_get::<NaiveDate, _>(idx).ok().flatten() {
            return SqlValue::Date(v);
        }
        if let Some(v) = row.try_get::<NaiveTime, _>(idx).ok().flatten() {
            return SqlValue::Time(v);
        }

        if let Some(v) = row.try_get::<&[u8], _>(idx).ok().flatten() {
            return SqlValue::Bytes(v.to_vec());
        }

        if let Some(v) = row.try_get::<&XmlData, _>(idx).ok().flatten() {
            return SqlValue::String(v.to_string());
        }

        // NULL, or a type with no JSON mapping (sql_variant)
        SqlValue::Null
    }

    /// Convert a whole row, keeping column order.
    pub fn row_to_json(row: &Row) -> ResultRow {
        row.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                (
                    col.name().to_string(),
                    Self::extract_column(row, idx).into_json(),
                )
            })
            .collect()
    }
}

/// MONEY is a 64-bit integer scaled by 10^4.
fn money_to_decimal(v: f64) -> Option<Decimal> {
    let scaled = (v * 10_000.0).round();
    if !scaled.is_finite() || scaled.abs() > i64::MAX as f64 {
        return None;
    }
    Some(Decimal::new(scaled as i64, 4))
}

mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02X}", b)).collect()
    }
}

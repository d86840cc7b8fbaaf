//! Dynamically typed field values and records.
//!
//! [`FieldValue`] is the one value type flowing through conditions, records and
//! bound parameters. It binds to PostgreSQL according to the target column
//! type (a `String` bound to a `uuid` column is parsed as a UUID, an `Integer`
//! bound to `int4` is narrowed), and decodes every column type the CRUD layer
//! reads back.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type};

use crate::error::{CrudError, CrudResult};

/// A record is a canonical (sorted) map of field name to value.
pub type Record = BTreeMap<String, FieldValue>;

/// Build a [`Record`] from `(name, value)` pairs.
pub fn record<K, V, I>(fields: I) -> Record
where
    K: Into<String>,
    V: Into<FieldValue>,
    I: IntoIterator<Item = (K, V)>,
{
    fields
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// A scalar or array value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    String(String),
    StringArray(Vec<String>),
    NumericArray(Vec<f64>),
}

impl FieldValue {
    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Integer(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::String(_) => "string",
            FieldValue::StringArray(_) => "string-array",
            FieldValue::NumericArray(_) => "numeric-array",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Integer(v.into())
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(v)
    }
}

impl From<uuid::Uuid> for FieldValue {
    fn from(v: uuid::Uuid) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(v: Vec<String>) -> Self {
        FieldValue::StringArray(v)
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(v: Vec<&str>) -> Self {
        FieldValue::StringArray(v.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<f64>> for FieldValue {
    fn from(v: Vec<f64>) -> Self {
        FieldValue::NumericArray(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Null, Into::into)
    }
}

type BoxError = Box<dyn Error + Sync + Send>;

fn is_text(ty: &Type) -> bool {
    *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME
}

fn string_to_sql(s: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if *ty == Type::UUID {
        uuid::Uuid::parse_str(s)?.to_sql(ty, out)
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        let value = serde_json::from_str::<serde_json::Value>(s)
            .unwrap_or_else(|_| serde_json::Value::String(s.to_string()));
        value.to_sql(ty, out)
    } else if *ty == Type::INT2 {
        s.parse::<i16>()?.to_sql(ty, out)
    } else if *ty == Type::INT4 {
        s.parse::<i32>()?.to_sql(ty, out)
    } else if *ty == Type::INT8 {
        s.parse::<i64>()?.to_sql(ty, out)
    } else if *ty == Type::BOOL {
        s.parse::<bool>()?.to_sql(ty, out)
    } else if *ty == Type::TIMESTAMPTZ {
        DateTime::parse_from_rfc3339(s)?
            .with_timezone(&Utc)
            .to_sql(ty, out)
    } else if *ty == Type::TIMESTAMP {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")?.to_sql(ty, out)
    } else {
        s.to_sql(ty, out)
    }
}

impl ToSql for FieldValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            FieldValue::Null => Ok(IsNull::Yes),
            FieldValue::Bool(b) => b.to_sql(ty, out),
            FieldValue::Integer(i) => {
                if *ty == Type::INT2 {
                    i16::try_from(*i)?.to_sql(ty, out)
                } else if *ty == Type::INT4 {
                    i32::try_from(*i)?.to_sql(ty, out)
                } else if *ty == Type::FLOAT4 {
                    (*i as f32).to_sql(ty, out)
                } else if *ty == Type::FLOAT8 {
                    (*i as f64).to_sql(ty, out)
                } else if is_text(ty) {
                    i.to_string().to_sql(ty, out)
                } else {
                    i.to_sql(ty, out)
                }
            }
            FieldValue::Float(f) => {
                if *ty == Type::FLOAT4 {
                    (*f as f32).to_sql(ty, out)
                } else if is_text(ty) {
                    f.to_string().to_sql(ty, out)
                } else {
                    f.to_sql(ty, out)
                }
            }
            FieldValue::Timestamp(t) => {
                if *ty == Type::TIMESTAMP {
                    t.naive_utc().to_sql(ty, out)
                } else if *ty == Type::DATE {
                    t.date_naive().to_sql(ty, out)
                } else {
                    t.to_sql(ty, out)
                }
            }
            FieldValue::String(s) => string_to_sql(s, ty, out),
            FieldValue::StringArray(items) => {
                if *ty == Type::UUID_ARRAY {
                    let ids = items
                        .iter()
                        .map(|s| uuid::Uuid::parse_str(s))
                        .collect::<Result<Vec<_>, _>>()?;
                    ids.to_sql(ty, out)
                } else {
                    items.to_sql(ty, out)
                }
            }
            FieldValue::NumericArray(items) => {
                if *ty == Type::INT4_ARRAY {
                    let ints: Vec<i32> = items.iter().map(|f| *f as i32).collect();
                    ints.to_sql(ty, out)
                } else if *ty == Type::INT8_ARRAY {
                    let ints: Vec<i64> = items.iter().map(|f| *f as i64).collect();
                    ints.to_sql(ty, out)
                } else if *ty == Type::FLOAT4_ARRAY {
                    let floats: Vec<f32> = items.iter().map(|f| *f as f32).collect();
                    floats.to_sql(ty, out)
                } else {
                    items.to_sql(ty, out)
                }
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

impl<'a> FromSql<'a> for FieldValue {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        let value = if *ty == Type::BOOL {
            FieldValue::Bool(bool::from_sql(ty, raw)?)
        } else if *ty == Type::INT2 {
            FieldValue::Integer(i16::from_sql(ty, raw)?.into())
        } else if *ty == Type::INT4 {
            FieldValue::Integer(i32::from_sql(ty, raw)?.into())
        } else if *ty == Type::INT8 {
            FieldValue::Integer(i64::from_sql(ty, raw)?)
        } else if *ty == Type::FLOAT4 {
            FieldValue::Float(f32::from_sql(ty, raw)?.into())
        } else if *ty == Type::FLOAT8 {
            FieldValue::Float(f64::from_sql(ty, raw)?)
        } else if is_text(ty) {
            FieldValue::String(String::from_sql(ty, raw)?)
        } else if *ty == Type::UUID {
            FieldValue::String(uuid::Uuid::from_sql(ty, raw)?.to_string())
        } else if *ty == Type::JSON || *ty == Type::JSONB {
            FieldValue::String(serde_json::Value::from_sql(ty, raw)?.to_string())
        } else if *ty == Type::TIMESTAMPTZ {
            FieldValue::Timestamp(DateTime::<Utc>::from_sql(ty, raw)?)
        } else if *ty == Type::TIMESTAMP {
            FieldValue::Timestamp(NaiveDateTime::from_sql(ty, raw)?.and_utc())
        } else if *ty == Type::TEXT_ARRAY || *ty == Type::VARCHAR_ARRAY {
            FieldValue::StringArray(Vec::<String>::from_sql(ty, raw)?)
        } else if *ty == Type::UUID_ARRAY {
            let ids = Vec::<uuid::Uuid>::from_sql(ty, raw)?;
            FieldValue::StringArray(ids.iter().map(ToString::to_string).collect())
        } else if *ty == Type::INT4_ARRAY {
            let ints = Vec::<i32>::from_sql(ty, raw)?;
            FieldValue::NumericArray(ints.into_iter().map(f64::from).collect())
        } else if *ty == Type::INT8_ARRAY {
            let ints = Vec::<i64>::from_sql(ty, raw)?;
            FieldValue::NumericArray(ints.into_iter().map(|i| i as f64).collect())
        } else if *ty == Type::FLOAT8_ARRAY {
            FieldValue::NumericArray(Vec::<f64>::from_sql(ty, raw)?)
        } else {
            return Err(format!("unsupported column type {ty}").into());
        };
        Ok(value)
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, BoxError> {
        Ok(FieldValue::Null)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// Decode every column of `row` into a [`Record`].
pub fn row_to_record(row: &Row) -> CrudResult<Record> {
    let mut out = Record::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value: FieldValue = row
            .try_get(idx)
            .map_err(|e| CrudError::decode(column.name(), e.to_string()))?;
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

/// Decode a batch of rows.
pub fn rows_to_records(rows: &[Row]) -> CrudResult<Vec<Record>> {
    rows.iter().map(row_to_record).collect()
}

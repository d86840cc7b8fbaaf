//! Table models: field descriptions, value-type inference and record validation.
//!
//! A [`Model`] describes the fields a table accepts. The orchestrator applies
//! defaults and validates every record against it before building SQL.
//! [`RecordMapping`] turns typed structs into [`Record`]s through a fixed list
//! of accessors.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::builder::ID_FIELD;
use crate::changeset::{ValidationCode, ValidationError, ValidationErrors};
use crate::error::{CrudError, CrudResult};
use crate::validate;
use crate::value::{FieldValue, Record};

/// Declared or inferred type of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataType {
    String,
    Text,
    Uuid,
    Email,
    Url,
    Json,
    DateTime,
    Integer,
    Float,
    Boolean,
    StringArray,
    NumericArray,
}

impl DataType {
    /// Infer the most specific type of `value`. `None` for `Null`.
    pub fn infer(value: &FieldValue) -> Option<Self> {
        let ty = match value {
            FieldValue::Null => return None,
            FieldValue::Bool(_) => DataType::Boolean,
            FieldValue::Integer(_) => DataType::Integer,
            FieldValue::Float(_) => DataType::Float,
            FieldValue::Timestamp(_) => DataType::DateTime,
            FieldValue::StringArray(_) => DataType::StringArray,
            FieldValue::NumericArray(_) => DataType::NumericArray,
            FieldValue::String(s) => {
                if validate::is_uuid(s) {
                    DataType::Uuid
                } else if validate::is_email(s) {
                    DataType::Email
                } else if validate::is_url(s) {
                    DataType::Url
                } else if validate::is_json_document(s) {
                    DataType::Json
                } else if validate::is_date_time(s) {
                    DataType::DateTime
                } else {
                    DataType::String
                }
            }
        };
        Some(ty)
    }

    /// Whether a value inferred as `actual` may be stored in a field declared as `self`.
    pub fn accepts(&self, actual: DataType, value: &FieldValue) -> bool {
        match self {
            DataType::String | DataType::Text => matches!(value, FieldValue::String(_)),
            DataType::Float => matches!(actual, DataType::Float | DataType::Integer),
            declared => *declared == actual,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::String => "string",
            DataType::Text => "text",
            DataType::Uuid => "uuid",
            DataType::Email => "email",
            DataType::Url => "url",
            DataType::Json => "json",
            DataType::DateTime => "datetime",
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::Boolean => "boolean",
            DataType::StringArray => "string-array",
            DataType::NumericArray => "numeric-array",
        };
        f.write_str(s)
    }
}

/// Custom per-field check; `Err` carries the message.
pub type FieldValidator = fn(&FieldValue) -> Result<(), String>;

/// Description of one model field.
#[derive(Debug, Clone)]
pub struct FieldDesc {
    pub data_type: DataType,
    pub required: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub default_value: Option<FieldValue>,
    pub validate: Option<FieldValidator>,
}

impl FieldDesc {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            required: false,
            min_length: None,
            max_length: None,
            min_value: None,
            max_value: None,
            default_value: None,
            validate: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_value = min;
        self.max_value = max;
        self
    }

    pub fn default_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn validator(mut self, f: FieldValidator) -> Self {
        self.validate = Some(f);
        self
    }
}

/// Field descriptions of one table.
#[derive(Debug, Clone)]
pub struct Model {
    pub table_name: String,
    pub fields: BTreeMap<String, FieldDesc>,
}

impl Model {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, desc: FieldDesc) -> Self {
        self.fields.insert(name.into(), desc);
        self
    }

    /// Fill missing or null fields from their declared defaults.
    pub fn apply_defaults(&self, record: &mut Record) {
        for (name, desc) in &self.fields {
            let Some(default) = &desc.default_value else {
                continue;
            };
            let missing = record.get(name).is_none_or(FieldValue::is_null);
            if missing {
                record.insert(name.clone(), default.clone());
            }
        }
    }

    /// Validate a complete record (create).
    pub fn validate_record(&self, record: &Record) -> Result<(), ValidationErrors> {
        self.check(record, false)
    }

    /// Validate a partial record (update): absent fields are not required.
    pub fn validate_update(&self, record: &Record) -> Result<(), ValidationErrors> {
        self.check(record, true)
    }

    fn check(&self, record: &Record, partial: bool) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        for key in record.keys() {
            if key != ID_FIELD && !self.fields.contains_key(key) {
                errors.push(ValidationError::new(
                    key.clone(),
                    ValidationCode::UnknownField,
                    format!("Invalid key: {key} is not defined in the model"),
                ));
            }
        }

        for (name, desc) in &self.fields {
            match record.get(name) {
                None if partial => {}
                None | Some(FieldValue::Null) => {
                    if desc.required {
                        errors.push(ValidationError::new(
                            name.clone(),
                            ValidationCode::Required,
                            format!("Value is required for field {name}. Can't be Null"),
                        ));
                    }
                }
                Some(value) => check_value(name, desc, value, &mut errors),
            }
        }

        errors.into_result()
    }

    /// Validate a batch, prefixing each message with its record number.
    pub fn validate_records(&self, records: &[Record], partial: bool) -> CrudResult<()> {
        let mut all = ValidationErrors::default();
        for (i, record) in records.iter().enumerate() {
            if let Err(errors) = self.check(record, partial) {
                all.extend(errors.items.into_iter().map(|e| e.in_record(i + 1)));
            }
        }
        all.into_result().map_err(CrudError::from)
    }
}

fn check_value(name: &str, desc: &FieldDesc, value: &FieldValue, errors: &mut ValidationErrors) {
    if let Some(actual) = DataType::infer(value)
        && !desc.data_type.accepts(actual, value)
    {
        errors.push(ValidationError::new(
            name,
            ValidationCode::Type,
            format!(
                "Invalid type for field {name}: expected {}, got {actual}",
                desc.data_type
            ),
        ));
        return;
    }

    if let FieldValue::String(s) = value {
        let len = s.chars().count();
        if desc.min_length.is_some_and(|min| len < min)
            || desc.max_length.is_some_and(|max| len > max)
        {
            errors.push(ValidationError::new(
                name,
                ValidationCode::Len,
                format!(
                    "Length of field {name} must be within [{}, {}], got {len}",
                    desc.min_length.map_or("-".to_string(), |v| v.to_string()),
                    desc.max_length.map_or("-".to_string(), |v| v.to_string()),
                ),
            ));
        }
    }

    if let Some(n) = value.as_f64()
        && (desc.min_value.is_some_and(|min| n < min) || desc.max_value.is_some_and(|max| n > max))
    {
        errors.push(ValidationError::new(
            name,
            ValidationCode::Range,
            format!("Value of field {name} is out of range: {n}"),
        ));
    }

    if let Some(check) = desc.validate
        && let Err(message) = check(value)
    {
        errors.push(ValidationError::new(
            name,
            ValidationCode::Custom("custom".to_string()),
            message,
        ));
    }
}

type Accessor<T> = Box<dyn Fn(&T) -> FieldValue + Send + Sync>;

/// Explicit mapping from a typed value to a [`Record`].
///
/// ```ignore
/// let mapping = RecordMapping::<User>::new()
///     .field("name", |u| u.name.clone().into())?
///     .field("age", |u| u.age.into())?;
/// let rec = mapping.to_record(&user);
/// ```
pub struct RecordMapping<T> {
    fields: Vec<(String, Accessor<T>)>,
}

impl<T> Default for RecordMapping<T> {
    fn default() -> Self {
        Self { fields: Vec::new() }
    }
}

impl<T> RecordMapping<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an accessor. Names must be valid identifiers and unique.
    pub fn field<F>(mut self, name: &str, accessor: F) -> CrudResult<Self>
    where
        F: Fn(&T) -> FieldValue + Send + Sync + 'static,
    {
        crate::ident::Ident::parse(name)?;
        if self.fields.iter().any(|(n, _)| n == name) {
            return Err(CrudError::params(format!("duplicate mapped field: {name}")));
        }
        self.fields.push((name.to_string(), Box::new(accessor)));
        Ok(self)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn to_record(&self, value: &T) -> Record {
        self.fields
            .iter()
            .map(|(name, get)| (name.clone(), get(value)))
            .collect()
    }

    pub fn to_records(&self, values: &[T]) -> Vec<Record> {
        values.iter().map(|v| self.to_record(v)).collect()
    }
}

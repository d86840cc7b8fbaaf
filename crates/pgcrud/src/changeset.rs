//! Validation problems reported by [`crate::model::Model`].

use serde::Serialize;
use std::fmt;

/// Kind of a validation problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationCode {
    /// A required field is absent or null.
    Required,
    /// The value's inferred type does not fit the declared type.
    Type,
    Len,
    Range,
    /// The record carries a key the model does not declare.
    UnknownField,
    Custom(String),
}

impl ValidationCode {
    pub fn as_str(&self) -> &str {
        match self {
            ValidationCode::Required => "required",
            ValidationCode::Type => "type",
            ValidationCode::Len => "len",
            ValidationCode::Range => "range",
            ValidationCode::UnknownField => "unknown_field",
            ValidationCode::Custom(code) => code,
        }
    }
}

impl Serialize for ValidationCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One problem with one field of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: String,
    pub code: ValidationCode,
    pub message: String,
    /// 1-based position in a batch, when validated as part of one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<usize>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, code: ValidationCode, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code,
            message: message.into(),
            record: None,
        }
    }

    /// Tag the error with its batch position and prefix the message with `Record #n: `.
    pub fn in_record(mut self, number: usize) -> Self {
        self.message = format!("Record #{number}: {}", self.message);
        self.record = Some(number);
        self
    }
}

/// Every problem found in a record or batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    pub items: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn push(&mut self, err: ValidationError) {
        self.items.push(err);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.items.iter()
    }

    /// Problems reported for `field`.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a ValidationError> {
        self.items.iter().filter(move |e| e.field == field)
    }

    pub fn into_result(self) -> Result<(), Self> {
        match self.items.is_empty() {
            true => Ok(()),
            false => Err(self),
        }
    }
}

impl Extend<ValidationError> for ValidationErrors {
    fn extend<I: IntoIterator<Item = ValidationError>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for err in &self.items {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            write!(f, "{}: {}", err.field, err.message)?;
        }
        Ok(())
    }
}

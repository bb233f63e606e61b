//! Decoded field values

use indexmap::IndexMap;
use serde::Serialize;

use crate::binary::Pointer;
use crate::error::{Error, Result};

/// A single decoded field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    UInt(u64),
    Int(i64),
    Bool(bool),
    Bytes(Vec<u8>),
    Pointer(Option<Pointer>),
}

/// Fields of one structure, in layout order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Result<&Value> {
        self.fields
            .get(name)
            .ok_or_else(|| Error::MissingField(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Unsigned field value. Booleans read as 0/1.
    pub fn uint(&self, name: &str) -> Result<u64> {
        match self.get(name)? {
            Value::UInt(v) => Ok(*v),
            Value::Bool(b) => Ok(u64::from(*b)),
            _ => Err(mismatch(name, "unsigned integer")),
        }
    }

    /// Signed field value. Unsigned values are widened.
    pub fn int(&self, name: &str) -> Result<i64> {
        match self.get(name)? {
            Value::Int(v) => Ok(*v),
            Value::UInt(v) => i64::try_from(*v).map_err(|_| mismatch(name, "signed integer")),
            _ => Err(mismatch(name, "signed integer")),
        }
    }

    pub fn bool(&self, name: &str) -> Result<bool> {
        match self.get(name)? {
            Value::Bool(b) => Ok(*b),
            _ => Err(mismatch(name, "bool")),
        }
    }

    pub fn bytes(&self, name: &str) -> Result<&[u8]> {
        match self.get(name)? {
            Value::Bytes(b) => Ok(b),
            _ => Err(mismatch(name, "byte array")),
        }
    }

    pub fn pointer(&self, name: &str) -> Result<Option<Pointer>> {
        match self.get(name)? {
            Value::Pointer(p) => Ok(*p),
            _ => Err(mismatch(name, "pointer")),
        }
    }

    /// Pretty JSON dump of the record.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn mismatch(field: &str, expected: &'static str) -> Error {
    Error::FieldTypeMismatch {
        field: field.to_string(),
        expected,
    }
}

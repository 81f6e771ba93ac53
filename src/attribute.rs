//! A string-keyed tagged union used for operator and graph-level
//! attributes (kernel sizes, padding modes, op-specific configuration).

use std::collections::HashMap;

use crate::error::{GPError, GPResult};

/// One attribute value: a scalar or homogeneous array over
/// `{Int, Float, String}`.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Int(i64),
    Float(f64),
    String(String),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
    StringArray(Vec<String>),
}

/// String-keyed attribute bag attached to a Node's operator or to a
/// Graph as a whole.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeMap {
    entries: HashMap<String, AttributeValue>,
}

impl AttributeMap {
    pub fn new() -> Self {
        AttributeMap::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> GPResult<&AttributeValue> {
        self.entries
            .get(key)
            .ok_or_else(|| GPError::out_of_range(format!("attribute key '{key}' not found")))
    }

    pub fn get_int(&self, key: &str) -> GPResult<i64> {
        match self.get(key)? {
            AttributeValue::Int(v) => Ok(*v),
            other => Err(type_mismatch(key, "Int", other)),
        }
    }

    pub fn get_float(&self, key: &str) -> GPResult<f64> {
        match self.get(key)? {
            AttributeValue::Float(v) => Ok(*v),
            other => Err(type_mismatch(key, "Float", other)),
        }
    }

    pub fn get_string(&self, key: &str) -> GPResult<&str> {
        match self.get(key)? {
            AttributeValue::String(v) => Ok(v.as_str()),
            other => Err(type_mismatch(key, "String", other)),
        }
    }

    pub fn get_int_array(&self, key: &str) -> GPResult<&[i64]> {
        match self.get(key)? {
            AttributeValue::IntArray(v) => Ok(v.as_slice()),
            other => Err(type_mismatch(key, "IntArray", other)),
        }
    }

    pub fn get_float_array(&self, key: &str) -> GPResult<&[f64]> {
        match self.get(key)? {
            AttributeValue::FloatArray(v) => Ok(v.as_slice()),
            other => Err(type_mismatch(key, "FloatArray", other)),
        }
    }

    pub fn get_string_array(&self, key: &str) -> GPResult<&[String]> {
        match self.get(key)? {
            AttributeValue::StringArray(v) => Ok(v.as_slice()),
            other => Err(type_mismatch(key, "StringArray", other)),
        }
    }
}

fn type_mismatch(key: &str, expected: &str, found: &AttributeValue) -> GPError {
    GPError::invalid_argument(format!(
        "attribute '{key}': expected {expected}, found {found:?}"
    ))
}

//! Node attribute values and the flat-file attribute schema

use citeforge_common::config::GraphConfig;
use citeforge_common::errors::{AppError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Value of one attribute on one node
///
/// Arrays and objects are kept as canonical JSON text so every value is a
/// scalar that fits a single flat-file field.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AttributeValue {
    /// Absent on the record, or null
    #[default]
    Missing,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    /// Canonical JSON text of an array or object
    Json(String),
}

impl AttributeValue {
    /// Project a JSON value onto an attribute value
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Missing,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => n.as_f64().map(Self::Float).unwrap_or_else(|| Self::Text(n.to_string())),
            },
            Value::String(s) => Self::Text(s.clone()),
            structured => Self::Json(canonical_json(structured)),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Flat-file field text; empty for `Missing`
    pub fn to_field(&self) -> String {
        match self {
            Self::Missing => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) | Self::Json(s) => s.clone(),
        }
    }

    /// Back to JSON; structured values are parsed again
    pub fn to_json(&self) -> Value {
        match self {
            Self::Missing => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Integer(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::Text(s) => Value::String(s.clone()),
            Self::Json(s) => serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone())),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_field())
    }
}

/// Canonical text form of a JSON value (object keys sorted, no whitespace)
pub fn canonical_json(value: &Value) -> String {
    sorted(value).to_string()
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k.clone(), sorted(v))).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// How a flat-file column is read back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeKind {
    #[default]
    Text,
    Integer,
    Float,
    Boolean,
    Structured,
}

/// Attribute name to kind; unknown names are text
#[derive(Debug, Clone, Default)]
pub struct AttributeSchema {
    kinds: HashMap<String, AttributeKind>,
}

impl AttributeSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, kind: AttributeKind) -> Self {
        self.kinds.insert(name.into(), kind);
        self
    }

    pub fn from_config(config: &GraphConfig) -> Self {
        let mut schema = Self::new();
        let lists = [
            (&config.integer_attributes, AttributeKind::Integer),
            (&config.float_attributes, AttributeKind::Float),
            (&config.boolean_attributes, AttributeKind::Boolean),
            (&config.structured_attributes, AttributeKind::Structured),
        ];
        for (names, kind) in lists {
            for name in names {
                schema.kinds.insert(name.clone(), kind);
            }
        }
        schema
    }

    pub fn kind(&self, name: &str) -> AttributeKind {
        self.kinds.get(name).copied().unwrap_or_default()
    }

    /// Parse one flat-file field; empty fields are `Missing`
    pub fn decode(&self, name: &str, field: &str) -> Result<AttributeValue> {
        if field.is_empty() {
            return Ok(AttributeValue::Missing);
        }

        let invalid = |expected: &str| {
            AppError::format(format!(
                "attribute '{}': expected {}, found '{}'",
                name, expected, field
            ))
        };

        let value = match self.kind(name) {
            AttributeKind::Text => AttributeValue::Text(field.to_string()),
            AttributeKind::Integer => {
                AttributeValue::Integer(field.trim().parse().map_err(|_| invalid("an integer"))?)
            }
            AttributeKind::Float => {
                AttributeValue::Float(field.trim().parse().map_err(|_| invalid("a number"))?)
            }
            AttributeKind::Boolean => match field.trim().to_ascii_lowercase().as_str() {
                "true" => AttributeValue::Bool(true),
                "false" => AttributeValue::Bool(false),
                _ => return Err(invalid("a boolean")),
            },
            // Records may carry a plain string where a structure is usual
            AttributeKind::Structured => match serde_json::from_str::<Value>(field) {
                Ok(Value::Null) => AttributeValue::Missing,
                Ok(parsed @ (Value::Array(_) | Value::Object(_))) => {
                    AttributeValue::Json(canonical_json(&parsed))
                }
                Ok(scalar) => AttributeValue::from_json(&scalar),
                Err(_) => AttributeValue::Text(field.to_string()),
            },
        };
        Ok(value)
    }
}

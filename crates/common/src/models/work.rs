//! Work record

use crate::errors::{AppError, Result};
use regex_lite::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Field carrying the work identifier
pub const ID_FIELD: &str = "id";

/// Field carrying the cited work identifiers
pub const REFERENCES_FIELD: &str = "referenced_works";

fn work_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^https?://(?:api\.)?openalex\.org/(?:works/)?([^/?#]+)/?$")
            .expect("work url pattern is valid")
    })
}

/// Reduce a work identifier to its short form
///
/// `https://openalex.org/W2741809807` and `W2741809807` both become
/// `W2741809807`. Other URLs keep their last path segment. Returns `None`
/// for blank input.
pub fn normalize_work_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(caps) = work_url_pattern().captures(trimmed) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }

    trimmed
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// One work as returned by the catalog
///
/// The identifier and references are kept in short form; the full JSON
/// object is retained as the attribute map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkRecord {
    external_id: String,
    referenced_ids: Vec<String>,
    attributes: Map<String, Value>,
}

impl WorkRecord {
    /// Build a record from parts
    pub fn new(
        external_id: impl Into<String>,
        referenced_ids: Vec<String>,
        attributes: Map<String, Value>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            referenced_ids,
            attributes,
        }
    }

    /// Parse a work object from a catalog response
    ///
    /// Fails with `MissingField` when `id` or `referenced_works` is absent.
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Object(attributes) = value else {
            return Err(AppError::malformed("work is not a JSON object"));
        };

        let external_id = attributes
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .and_then(normalize_work_id)
            .ok_or_else(|| AppError::MissingField {
                field: ID_FIELD.to_string(),
            })?;

        let references = attributes
            .get(REFERENCES_FIELD)
            .and_then(Value::as_array)
            .ok_or_else(|| AppError::MissingField {
                field: REFERENCES_FIELD.to_string(),
            })?;

        let referenced_ids = references
            .iter()
            .filter_map(Value::as_str)
            .filter_map(normalize_work_id)
            .collect();

        Ok(Self {
            external_id,
            referenced_ids,
            attributes,
        })
    }

    /// Short-form identifier
    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    /// Short-form identifiers of cited works, in response order
    pub fn referenced_ids(&self) -> &[String] {
        &self.referenced_ids
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_work_id() {
        assert_eq!(
            normalize_work_id("https://openalex.org/W2741809807").as_deref(),
            Some("W2741809807")
        );
        assert_eq!(
            normalize_work_id("https://api.openalex.org/works/W42").as_deref(),
            Some("W42")
        );
        assert_eq!(normalize_work_id(" W7 ").as_deref(), Some("W7"));
        assert_eq!(
            normalize_work_id("https://example.org/records/R9/").as_deref(),
            Some("R9")
        );
        assert_eq!(normalize_work_id("   "), None);
    }

    #[test]
    fn test_from_json() {
        let record = WorkRecord::from_json(json!({
            "id": "https://openalex.org/W1",
            "title": "Attention Is All You Need",
            "referenced_works": [
                "https://openalex.org/W2",
                "https://openalex.org/W3"
            ]
        }))
        .unwrap();

        assert_eq!(record.external_id(), "W1");
        assert_eq!(record.referenced_ids(), &["W2".to_string(), "W3".to_string()]);
        assert_eq!(
            record.attribute("title"),
            Some(&json!("Attention Is All You Need"))
        );
    }

    #[test]
    fn test_missing_references() {
        let err = WorkRecord::from_json(json!({"id": "https://openalex.org/W1"})).unwrap_err();
        assert!(matches!(err, AppError::MissingField { ref field } if field == "referenced_works"));
    }

    #[test]
    fn test_missing_id() {
        let err = WorkRecord::from_json(json!({"referenced_works": []})).unwrap_err();
        assert!(matches!(err, AppError::MissingField { ref field } if field == "id"));
    }

    #[test]
    fn test_non_object_rejected() {
        let err = WorkRecord::from_json(json!(["W1"])).unwrap_err();
        assert!(matches!(err, AppError::MalformedResponse { .. }));
    }
}

//! JSON Schema validation for extracted key facts.
//!
//! The key-fact extractor is asked for a JSON object. Responses are checked
//! against `schemas/key_facts.schema.json` before their fields are trusted;
//! anything that fails falls back to line-based parsing.

use std::sync::OnceLock;
use thiserror::Error;

/// Embedded key-facts schema (loaded at compile time).
const KEY_FACTS_SCHEMA_JSON: &str = include_str!("../schemas/key_facts.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Errors from schema validation.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to load schema: {0}")]
    LoadError(String),
}

fn get_validator() -> Result<&'static jsonschema::Validator, SchemaError> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = serde_json::from_str(KEY_FACTS_SCHEMA_JSON)
            .map_err(|e| format!("Invalid schema JSON: {}", e))?;

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result
        .as_ref()
        .map_err(|e| SchemaError::LoadError(e.clone()))
}

/// Validate an extractor response against the key-facts schema.
///
/// Returns every validation error with its instance path.
pub fn validate_key_facts_schema(value: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(value)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_response_passes() {
        let value = serde_json::json!({
            "incident_date": "March 5",
            "damaged_item": "Roof",
            "claimed_amount": 4500,
            "cause": "Fallen tree",
            "supporting_documents": ["photo", "repair estimate"]
        });
        assert!(validate_key_facts_schema(&value).is_ok());
    }

    #[test]
    fn test_empty_object_passes() {
        assert!(validate_key_facts_schema(&serde_json::json!({})).is_ok());
    }

    #[test]
    fn test_nulls_pass() {
        let value = serde_json::json!({ "incident_date": null, "claimed_amount": null });
        assert!(validate_key_facts_schema(&value).is_ok());
    }

    #[test]
    fn test_wrong_field_type_fails() {
        let value = serde_json::json!({ "incident_date": ["March", 5] });
        let errors = validate_key_facts_schema(&value).unwrap_err();
        assert!(!errors.is_empty());
        assert!(errors[0].contains("incident_date"));
    }

    #[test]
    fn test_non_object_fails() {
        assert!(validate_key_facts_schema(&serde_json::json!("March 5")).is_err());
    }
}

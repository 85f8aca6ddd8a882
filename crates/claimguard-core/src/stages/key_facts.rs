//! Key-fact extraction parsing.
//!
//! The extractor is asked for a JSON object. Models do not always comply, so
//! parsing goes JSON first (validated against the key-facts schema), then
//! falls back to `Heading: value` lines. Neither path fails; unreadable
//! output yields empty facts.

use serde_json::{Map, Value};

use crate::record::{ClaimRecord, RecordError, Stage};
use crate::schema::validate_key_facts_schema;
use crate::types::KeyFacts;

use super::patterns::{clean_value, split_heading, strip_code_fence};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    IncidentDate,
    DamagedItem,
    ClaimedAmount,
    Cause,
    SupportingDocuments,
}

impl Field {
    /// Property name in the key-facts schema.
    fn schema_key(self) -> &'static str {
        match self {
            Field::IncidentDate => "incident_date",
            Field::DamagedItem => "damaged_item",
            Field::ClaimedAmount => "claimed_amount",
            Field::Cause => "cause",
            Field::SupportingDocuments => "supporting_documents",
        }
    }
}

/// Map a JSON key to a field. Accepts snake, camel and title case.
fn field_for_key(key: &str) -> Option<Field> {
    let normalized: String = key
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase();

    match normalized.as_str() {
        "incidentdate" | "dateofincident" => Some(Field::IncidentDate),
        "damageditem" | "itemdamaged" | "damageditems" => Some(Field::DamagedItem),
        "claimedamount" | "amount" | "amountclaimed" => Some(Field::ClaimedAmount),
        "cause" | "causeofdamage" | "causeofloss" => Some(Field::Cause),
        "supportingdocuments" | "documents" | "supportingdocs" => Some(Field::SupportingDocuments),
        _ => None,
    }
}

/// Map a free-text heading to a field.
fn field_for_heading(heading: &str) -> Option<Field> {
    if heading.contains("incident date") || heading.contains("date of incident") {
        Some(Field::IncidentDate)
    } else if heading.contains("damaged") {
        Some(Field::DamagedItem)
    } else if heading.contains("amount") {
        Some(Field::ClaimedAmount)
    } else if heading.contains("cause") {
        Some(Field::Cause)
    } else if heading.contains("supporting") || heading.contains("documents") {
        Some(Field::SupportingDocuments)
    } else {
        None
    }
}

impl KeyFacts {
    /// Parse extractor output. Never fails.
    pub fn parse(text: &str) -> Self {
        if let Some(facts) = Self::parse_json(text) {
            return facts;
        }
        Self::parse_lines(text)
    }

    /// What the pipeline records when the extractor is unavailable.
    pub fn unavailable() -> Self {
        Self::default()
    }

    fn parse_json(text: &str) -> Option<Self> {
        let body = strip_code_fence(text.trim());
        let start = body.find('{')?;
        let end = body.rfind('}')?;
        if end < start {
            return None;
        }

        let value: Value = serde_json::from_str(&body[start..=end]).ok()?;

        // Every accepted spelling is validated under its schema name.
        let mut canonical = Map::new();
        for (key, value) in value.as_object()? {
            if let Some(field) = field_for_key(key) {
                canonical.insert(field.schema_key().to_string(), value.clone());
            }
        }
        let canonical = Value::Object(canonical);
        if let Err(errors) = validate_key_facts_schema(&canonical) {
            tracing::debug!(?errors, "Key facts JSON failed schema validation");
            return None;
        }

        let mut facts = Self::default();
        for (key, value) in canonical.as_object()? {
            if let Some(field) = field_for_key(key) {
                facts.set(field, json_text(value));
            }
        }
        Some(facts)
    }

    fn parse_lines(text: &str) -> Self {
        let mut facts = Self::default();
        for line in text.lines() {
            let Some((heading, value)) = split_heading(line) else {
                continue;
            };
            if let Some(field) = field_for_heading(&heading) {
                if facts.get(field).is_none() {
                    facts.set(field, clean_value(&value));
                }
            }
        }
        facts
    }

    fn get(&self, field: Field) -> Option<&String> {
        match field {
            Field::IncidentDate => self.incident_date.as_ref(),
            Field::DamagedItem => self.damaged_item.as_ref(),
            Field::ClaimedAmount => self.claimed_amount.as_ref(),
            Field::Cause => self.cause.as_ref(),
            Field::SupportingDocuments => self.supporting_documents.as_ref(),
        }
    }

    fn set(&mut self, field: Field, value: Option<String>) {
        let slot = match field {
            Field::IncidentDate => &mut self.incident_date,
            Field::DamagedItem => &mut self.damaged_item,
            Field::ClaimedAmount => &mut self.claimed_amount,
            Field::Cause => &mut self.cause,
            Field::SupportingDocuments => &mut self.supporting_documents,
        };
        *slot = value;
    }
}

fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => clean_value(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(json_text).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        other => clean_value(&other.to_string()),
    }
}

/// Key-Fact Extractor stage (record side). Requires the summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyFactStage;

impl KeyFactStage {
    pub fn new() -> Self {
        Self
    }

    pub fn apply(&self, record: ClaimRecord, extractor_text: &str) -> Result<ClaimRecord, RecordError> {
        record.require(Stage::Summary, Stage::KeyFacts)?;

        let facts = KeyFacts::parse(extractor_text);
        tracing::debug!(
            incident_date = ?facts.incident_date,
            empty = facts.is_empty(),
            "Key facts parsed"
        );
        record.with_key_facts(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let facts = KeyFacts::parse(
            r#"{"incident_date": "March 5", "damaged_item": "Roof", "claimed_amount": "$4,500", "cause": "Fallen tree", "supporting_documents": "Photo"}"#,
        );
        assert_eq!(facts.incident_date.as_deref(), Some("March 5"));
        assert_eq!(facts.damaged_item.as_deref(), Some("Roof"));
        assert_eq!(facts.claimed_amount.as_deref(), Some("$4,500"));
        assert_eq!(facts.cause.as_deref(), Some("Fallen tree"));
        assert_eq!(facts.supporting_documents.as_deref(), Some("Photo"));
    }

    #[test]
    fn test_parse_fenced_json_with_title_case_keys() {
        let text = "Here are the facts:\n```json\n{\"Incident Date\": \"March 5\", \"Claimed Amount\": 4500, \"Supporting Documents\": [\"photo\", \"estimate\"]}\n```";
        let facts = KeyFacts::parse(text);
        assert_eq!(facts.incident_date.as_deref(), Some("March 5"));
        assert_eq!(facts.claimed_amount.as_deref(), Some("4500"));
        assert_eq!(facts.supporting_documents.as_deref(), Some("photo, estimate"));
    }

    #[test]
    fn test_json_placeholders_become_absent() {
        let facts = KeyFacts::parse(r#"{"incidentDate": "Not mentioned", "cause": null}"#);
        assert!(facts.is_empty());
    }

    #[test]
    fn test_parse_line_fallback() {
        let text = "\
- **Incident Date:** March 5
- **Damaged Item:** Roof shingles
- **Claimed Amount:** Not stated
- **Cause:** Storm
- **Supporting Documents:** None";
        let facts = KeyFacts::parse(text);
        assert_eq!(facts.incident_date.as_deref(), Some("March 5"));
        assert_eq!(facts.damaged_item.as_deref(), Some("Roof shingles"));
        assert_eq!(facts.claimed_amount, None);
        assert_eq!(facts.cause.as_deref(), Some("Storm"));
        assert_eq!(facts.supporting_documents, None);
    }

    #[test]
    fn test_schema_violation_falls_back_to_lines() {
        let text = "{\"incident_date\": {\"month\": 3}}\nIncident Date: March 5";
        let facts = KeyFacts::parse(text);
        assert_eq!(facts.incident_date.as_deref(), Some("March 5"));
    }

    #[test]
    fn test_title_case_keys_are_schema_checked() {
        assert_eq!(KeyFacts::parse_json(r#"{"Incident Date": 5}"#), None);
        assert_eq!(KeyFacts::parse_json(r#"{"dateOfIncident": ["March", 5]}"#), None);

        let facts = KeyFacts::parse_json(r#"{"Incident Date": "March 5", "Cause": "storm"}"#).unwrap();
        assert_eq!(facts.incident_date.as_deref(), Some("March 5"));
        assert_eq!(facts.cause.as_deref(), Some("storm"));
    }

    #[test]
    fn test_garbage_yields_empty_facts() {
        assert!(KeyFacts::parse("I could not find anything useful.").is_empty());
        assert!(KeyFacts::parse("").is_empty());
        assert_eq!(KeyFacts::unavailable(), KeyFacts::default());
    }
}

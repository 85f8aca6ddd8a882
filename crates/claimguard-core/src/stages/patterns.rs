//! Shared text patterns for parsing collaborator responses.
//!
//! Summaries and key-fact lists come back as loosely formatted text: bullets,
//! markdown emphasis, emoji prefixes. These helpers normalize that noise so
//! the stage parsers only deal with `heading: value` pairs.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Remarks that mark a summary as incomplete or inconclusive.
    pub static ref INCOMPLETE_REMARK_PATTERN: Regex = Regex::new(
        r"(?i)\b(incomplete|insufficient|unclear|vague|inconclusive|(?:cannot|can't|unable to) (?:be )?(?:determine|confirm|verify)d?|not enough (?:information|detail|details|evidence))\b"
    ).unwrap();

    /// Values a model writes instead of leaving a field out.
    pub static ref PLACEHOLDER_VALUE_PATTERN: Regex = Regex::new(
        r"(?i)^(?:none|null|n/?a|unknown|not (?:stated|mentioned|provided|specified|available|given)|-+)\.?$"
    ).unwrap();

    /// Markdown code fence around a JSON body.
    pub static ref CODE_FENCE_PATTERN: Regex = Regex::new(
        r"(?s)```(?:json)?\s*(.*?)\s*```"
    ).unwrap();
}

/// Split a line into a lowercase heading and its value.
///
/// Leading bullets, emoji and markdown emphasis are dropped. Returns `None`
/// for lines without a colon.
pub fn split_heading(line: &str) -> Option<(String, String)> {
    let trimmed = line.trim_start_matches(|c: char| !c.is_alphanumeric());
    let (heading, value) = trimmed.split_once(':')?;

    let heading = heading.replace("**", "").replace("__", "").trim().to_lowercase();
    if heading.is_empty() {
        return None;
    }
    let value = value.trim_matches(|c: char| c == '*' || c == '_' || c.is_whitespace());

    Some((heading, value.to_string()))
}

/// Check if a remark marks the summary as incomplete.
pub fn is_incomplete_remark(remark: &str) -> bool {
    INCOMPLETE_REMARK_PATTERN.is_match(remark)
}

/// Normalize a field value; placeholders and blanks become `None`.
pub fn clean_value(value: &str) -> Option<String> {
    let value = value.trim().trim_matches('"').trim();
    if value.is_empty() || PLACEHOLDER_VALUE_PATTERN.is_match(value) {
        None
    } else {
        Some(value.to_string())
    }
}

/// Strip a markdown code fence if the whole body is wrapped in one.
pub fn strip_code_fence(text: &str) -> &str {
    CODE_FENCE_PATTERN
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_heading_strips_decoration() {
        assert_eq!(
            split_heading("- 📝 Summary: Tree fell on roof"),
            Some(("summary".to_string(), "Tree fell on roof".to_string()))
        );
        assert_eq!(
            split_heading("**Incident Date:** March 5"),
            Some(("incident date".to_string(), "March 5".to_string()))
        );
        assert_eq!(split_heading("no colon here"), None);
    }

    #[test]
    fn test_incomplete_remarks() {
        assert!(is_incomplete_remark("The description is vague."));
        assert!(is_incomplete_remark("Cannot determine whether the labels support the claim"));
        assert!(is_incomplete_remark("Not enough information to assess"));
        assert!(!is_incomplete_remark("Labels 'roof' and 'tree' support the claim."));
    }

    #[test]
    fn test_clean_value_drops_placeholders() {
        assert_eq!(clean_value("Not mentioned"), None);
        assert_eq!(clean_value("N/A"), None);
        assert_eq!(clean_value("  "), None);
        assert_eq!(clean_value("\"Roof\""), Some("Roof".to_string()));
        assert_eq!(clean_value("$4,500"), Some("$4,500".to_string()));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("{\"a\": 1}"), "{\"a\": 1}");
    }
}

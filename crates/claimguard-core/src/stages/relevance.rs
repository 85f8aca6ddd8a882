//! Content Relevance Checker
//!
//! A label is relevant when it appears, case-insensitively, as a substring of
//! the narrative. No stemming, synonyms or similarity scoring: "sofa" will not
//! match "couch". Callers depend on that exact behavior.

use crate::record::{ClaimRecord, RecordError};
use crate::types::ContentFindings;

#[derive(Debug, Clone, Copy, Default)]
pub struct ContentRelevanceChecker;

impl ContentRelevanceChecker {
    pub fn new() -> Self {
        Self
    }

    /// Index of the first label found in the narrative.
    fn first_match(&self, labels: &[String], narrative: &str) -> Option<usize> {
        let narrative = narrative.to_lowercase();
        labels.iter().position(|label| {
            let label = label.trim().to_lowercase();
            // an empty label is a substring of everything
            !label.is_empty() && narrative.contains(&label)
        })
    }

    /// Check labels against the narrative. An empty label set never matches.
    pub fn check(&self, labels: Vec<String>, narrative: &str) -> ContentFindings {
        let narrative_matches_content = self.first_match(&labels, narrative).is_some();

        tracing::debug!(
            labels = labels.len(),
            narrative_matches_content,
            "Content relevance checked"
        );

        ContentFindings {
            content_labels: labels,
            narrative_matches_content,
        }
    }

    pub fn apply(&self, record: ClaimRecord, labels: Vec<String>) -> Result<ClaimRecord, RecordError> {
        let findings = self.check(labels, record.user_narrative());
        record.with_content(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_overlapping_label_matches() {
        let findings = ContentRelevanceChecker::new()
            .check(labels(&["roof", "tree"]), "A tree fell on my roof");
        assert!(findings.narrative_matches_content);
        assert_eq!(findings.content_labels, labels(&["roof", "tree"]));
    }

    #[test]
    fn test_unrelated_label_does_not_match() {
        let findings = ContentRelevanceChecker::new().check(labels(&["laptop"]), "A tree fell on my roof");
        assert!(!findings.narrative_matches_content);
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let checker = ContentRelevanceChecker::new();
        assert!(checker.check(labels(&["Roof"]), "the ROOF collapsed").narrative_matches_content);
    }

    #[test]
    fn test_synonyms_are_not_matched() {
        let findings = ContentRelevanceChecker::new().check(labels(&["couch"]), "My sofa was soaked");
        assert!(!findings.narrative_matches_content);
    }

    #[test]
    fn test_multi_word_label_matches_as_substring() {
        let checker = ContentRelevanceChecker::new();
        let found = checker.first_match(&labels(&["Sky", "Water damage"]), "Extensive water damage in the hall");
        assert_eq!(found, Some(1));
    }

    #[test]
    fn test_no_labels_never_matches() {
        let findings = ContentRelevanceChecker::new().check(vec![], "A tree fell on my roof");
        assert!(findings.content_labels.is_empty());
        assert!(!findings.narrative_matches_content);
    }

    #[test]
    fn test_blank_label_does_not_match() {
        let findings = ContentRelevanceChecker::new().check(labels(&["", "  "]), "anything at all");
        assert!(!findings.narrative_matches_content);
    }

    proptest! {
        #[test]
        fn prop_label_inside_narrative_always_matches(
            prefix in "[a-z ]{0,20}",
            label in "[a-z]{1,12}",
            suffix in "[a-z ]{0,20}",
        ) {
            let narrative = format!("{}{}{}", prefix, label.to_uppercase(), suffix);
            let findings = ContentRelevanceChecker::new().check(vec![label], &narrative);
            prop_assert!(findings.narrative_matches_content);
        }
    }
}

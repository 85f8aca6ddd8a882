//! Evidence linking for claim decisions.
//!
//! Every fired decision rule cites the record fields it relied on, so a
//! reviewer can trace a verdict back to the fact that produced it.

use serde::{Deserialize, Serialize};

use crate::types::EvidenceSource;

/// A piece of evidence supporting a decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Evidence {
    /// What this evidence supports
    pub claim: String,

    /// Where the evidence comes from
    pub source: EvidenceSource,

    /// Pointer to the record field (e.g., "metadata.capture_timestamp")
    pub pointer: String,
}

impl Evidence {
    /// Evidence from the image metadata findings.
    pub fn from_metadata(claim: impl Into<String>, field: &str) -> Self {
        Self::new(claim, EvidenceSource::ImageMetadata, format!("metadata.{}", field))
    }

    /// Evidence from a content label, or the label set as a whole.
    pub fn from_labels(claim: impl Into<String>, index: Option<usize>) -> Self {
        let pointer = match index {
            Some(i) => format!("content.content_labels[{}]", i),
            None => "content.content_labels".to_string(),
        };
        Self::new(claim, EvidenceSource::ContentLabels, pointer)
    }

    /// Evidence from the user narrative.
    pub fn from_narrative(claim: impl Into<String>) -> Self {
        Self::new(claim, EvidenceSource::Narrative, "intake.user_narrative")
    }

    /// Evidence from the parsed summary.
    pub fn from_summary(claim: impl Into<String>, section: &str) -> Self {
        Self::new(claim, EvidenceSource::Summary, format!("summary.{}", section))
    }

    /// Evidence from an extracted key fact.
    pub fn from_key_facts(claim: impl Into<String>, field: &str) -> Self {
        Self::new(claim, EvidenceSource::KeyFacts, format!("key_facts.{}", field))
    }

    /// Evidence from the misrepresentation finding.
    pub fn from_misrepresentation(claim: impl Into<String>, field: &str) -> Self {
        Self::new(
            claim,
            EvidenceSource::Misrepresentation,
            format!("misrepresentation.{}", field),
        )
    }

    /// Evidence from the caller-supplied policy terms.
    pub fn from_policy(claim: impl Into<String>, field: &str) -> Self {
        Self::new(claim, EvidenceSource::Policy, format!("intake.policy.{}", field))
    }

    fn new(claim: impl Into<String>, source: EvidenceSource, pointer: impl Into<String>) -> Self {
        Self {
            claim: claim.into(),
            source,
            pointer: pointer.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evidence_from_metadata() {
        let evidence = Evidence::from_metadata("No capture timestamp", "capture_timestamp");
        assert_eq!(evidence.source, EvidenceSource::ImageMetadata);
        assert_eq!(evidence.pointer, "metadata.capture_timestamp");
    }

    #[test]
    fn test_evidence_from_labels() {
        let all = Evidence::from_labels("No label overlaps narrative", None);
        assert_eq!(all.pointer, "content.content_labels");

        let one = Evidence::from_labels("Label 'roof' found", Some(2));
        assert_eq!(one.pointer, "content.content_labels[2]");
    }

    #[test]
    fn test_evidence_from_policy() {
        let evidence = Evidence::from_policy("Threshold is 2 days", "allowed_day_threshold");
        assert_eq!(evidence.source, EvidenceSource::Policy);
        assert_eq!(evidence.pointer, "intake.policy.allowed_day_threshold");
    }
}

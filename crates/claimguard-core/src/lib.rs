//! # claimguard-core
//!
//! Deterministic claim evaluation for photo-backed insurance claims.
//!
//! This crate answers one question per claim: approve, reject, or flag for
//! review. It does so from the claim image's own metadata, the labels an
//! image classifier saw, and what the claimant wrote.
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same inputs and collaborator outputs always produce the same record
//! 2. **No network calls**: Collaborator text is passed in; calling services is the runtime's job
//! 3. **Append-only**: Every stage writes its own fields exactly once
//! 4. **Traceable**: Every verdict cites a rule id and the record fields behind it
//!
//! ## Example
//!
//! ```rust,ignore
//! use claimguard_core::{evaluate, ClaimIntake, CollaboratorOutputs, ExifMetadataReader, PolicyTerms};
//!
//! let policy = PolicyTerms::parse("2024-04-01", "2024-05-01", 2)?;
//! let intake = ClaimIntake::new("claim.jpg", "A tree fell on my roof", policy)?;
//! let image = std::fs::read(intake.image_path())?;
//!
//! let record = evaluate(intake, &image, &ExifMetadataReader::new(), &outputs)?;
//! println!("{}", record.verdict_reason().unwrap_or_default());
//! ```

pub mod dates;
pub mod decision;
pub mod evidence;
pub mod record;
pub mod schema;
pub mod stages;
pub mod types;

// Re-export main types at crate root
pub use decision::{DecisionEngine, DecisionInputs, DecisionRule, RuleHit, DEFAULT_RULES};
pub use evidence::Evidence;
pub use record::{ClaimRecord, RecordError, Stage};
pub use schema::{validate_key_facts_schema, SchemaError};
pub use stages::{
    ContentRelevanceChecker, ExifMetadataReader, ImageMetadata, KeyFactStage, MetadataReader,
    MetadataValidator, MisrepresentationDetector, SummaryStage,
};
pub use types::{
    CaptureVsLossDate, CaptureVsPolicy, ClaimError, ClaimIntake, ContentFindings, Decision,
    EvidenceSource, KeyFacts, MetadataFindings, MisrepresentationFinding,
    MisrepresentationReason, NarrativeSummary, PolicyTerms, Verdict,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during evaluation
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Invalid claim input: {0}")]
    Input(#[from] ClaimError),

    #[error("Claim record error: {0}")]
    Record(#[from] RecordError),
}

/// What the external collaborators said about one claim.
///
/// Empty values stand in for an unavailable collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorOutputs {
    /// Image labels, highest confidence first
    #[serde(default)]
    pub labels: Vec<String>,

    /// Summarizer response text
    #[serde(default)]
    pub summary: String,

    /// Key-fact extractor response text
    #[serde(default)]
    pub key_facts: String,
}

/// Run every stage over a claim with collaborator outputs already in hand.
///
/// This is the whole pipeline minus the service calls. Given the same
/// arguments it always returns the same record.
pub fn evaluate(
    intake: ClaimIntake,
    image: &[u8],
    reader: &dyn MetadataReader,
    outputs: &CollaboratorOutputs,
) -> Result<ClaimRecord, EvaluationError> {
    let metadata = reader.read(image);
    let record = ClaimRecord::new(intake);

    let record = MetadataValidator::new().apply(record, &metadata)?;
    let record = ContentRelevanceChecker::new().apply(record, outputs.labels.clone())?;
    let record = SummaryStage::new().apply(record, &outputs.summary)?;
    let record = KeyFactStage::new().apply(record, &outputs.key_facts)?;
    let record = MisrepresentationDetector::new().apply(record)?;
    let record = DecisionEngine::new().apply(record)?;

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    /// Reader that returns fixed metadata regardless of the bytes.
    struct FixedReader(ImageMetadata);

    impl MetadataReader for FixedReader {
        fn read(&self, _image: &[u8]) -> ImageMetadata {
            self.0.clone()
        }
    }

    fn reader(timestamp: Option<&str>) -> FixedReader {
        FixedReader(ImageMetadata::from_raw(timestamp, true))
    }

    fn intake(narrative: &str) -> ClaimIntake {
        let policy = PolicyTerms::parse("2024-04-01", "2024-05-01", 2).unwrap();
        ClaimIntake::new("claim.jpg", narrative, policy).unwrap()
    }

    fn outputs(labels: &[&str], incident_date: &str) -> CollaboratorOutputs {
        CollaboratorOutputs {
            labels: labels.iter().map(|s| s.to_string()).collect(),
            summary: "Summary: A tree fell on the roof.\nVisual Label Relevance: The labels 'roof' and 'tree' support the claim.".to_string(),
            key_facts: format!(
                r#"{{"incident_date": "{}", "damaged_item": "Roof", "cause": "Fallen tree"}}"#,
                incident_date
            ),
        }
    }

    #[test]
    fn test_clean_claim_is_approved() {
        let record = evaluate(
            intake("A tree fell on my roof"),
            b"",
            &reader(Some("2024:05:02 09:15:00")),
            &outputs(&["roof", "tree"], "May 1"),
        )
        .unwrap();

        assert!(record.is_complete());
        assert_eq!(record.verdict(), Some(Verdict::Approve));
        assert_eq!(record.verdict_reason().as_deref(), Some("A1: all checks passed"));
        assert!(record.gps_present());
        assert_eq!(
            record.capture_timestamp(),
            NaiveDateTime::parse_from_str("2024-05-02 09:15:00", "%Y-%m-%d %H:%M:%S").ok()
        );
    }

    #[test]
    fn test_missing_timestamp_is_rejected() {
        let record = evaluate(
            intake("A tree fell on my roof"),
            b"",
            &reader(None),
            &outputs(&["roof"], "May 1"),
        )
        .unwrap();

        assert_eq!(record.verdict(), Some(Verdict::Reject));
        assert_eq!(
            record.verdict_reason().as_deref(),
            Some("R1: capture timestamp missing from image metadata")
        );
    }

    #[test]
    fn test_incident_before_inception_is_rejected() {
        let record = evaluate(
            intake("A tree fell on my roof"),
            b"",
            &reader(Some("2024-05-01")),
            &outputs(&["roof"], "March 5"),
        )
        .unwrap();

        assert_eq!(record.misrepresentation_flag(), Some(true));
        assert_eq!(
            record.misrepresentation_reason(),
            Some("incident before policy inception")
        );
        assert_eq!(record.verdict(), Some(Verdict::Reject));
        assert_eq!(record.decision().map(|d| d.rule_id.as_str()), Some("R4"));
    }

    #[test]
    fn test_capture_far_from_loss_is_flagged() {
        let record = evaluate(
            intake("A tree fell on my roof"),
            b"",
            &reader(Some("2024-05-20")),
            &outputs(&["roof"], "May 1"),
        )
        .unwrap();

        assert_eq!(record.verdict(), Some(Verdict::Flag));
        assert!(record
            .verdict_reason()
            .unwrap()
            .contains("beyond allowed threshold of 2 days"));
    }

    #[test]
    fn test_unavailable_collaborators_degrade() {
        let record = evaluate(
            intake("A tree fell on my roof"),
            b"",
            &reader(Some("2024-05-01")),
            &CollaboratorOutputs::default(),
        )
        .unwrap();

        assert!(record.content_labels().is_empty());
        assert_eq!(record.narrative_matches_content(), Some(false));
        assert_eq!(record.misrepresentation_flag(), Some(false));
        assert_eq!(record.verdict(), Some(Verdict::Reject));
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let run = || {
            evaluate(
                intake("A tree fell on my roof"),
                b"",
                &reader(Some("2024-05-01T12:00:00")),
                &outputs(&["roof", "tree"], "May 1"),
            )
            .unwrap()
        };
        assert_eq!(run(), run());
    }
}

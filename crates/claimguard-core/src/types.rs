//! Core value types shared across pipeline stages.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dates;
use crate::evidence::Evidence;

/// Input errors raised before any stage runs.
#[derive(Error, Debug)]
pub enum ClaimError {
    #[error("Invalid {field}: '{value}' is not a recognizable date")]
    InvalidDate { field: &'static str, value: String },

    #[error("Claim narrative is empty")]
    EmptyNarrative,

    #[error("Failed to read claim image {path}: {source}")]
    ImageUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Policy dates supplied by the caller. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyTerms {
    /// Date coverage began
    pub policy_start_date: NaiveDate,

    /// Date the insured event is claimed to have occurred
    pub date_of_loss: NaiveDate,

    /// Maximum whole days allowed between capture date and date of loss
    pub allowed_day_threshold: u32,
}

impl PolicyTerms {
    pub fn new(policy_start_date: NaiveDate, date_of_loss: NaiveDate, allowed_day_threshold: u32) -> Self {
        Self {
            policy_start_date,
            date_of_loss,
            allowed_day_threshold,
        }
    }

    /// Parse policy dates from caller-supplied strings.
    ///
    /// Accepts a bare calendar date or a full date-time for either field.
    /// Unlike capture timestamps, malformed policy dates are an input error.
    pub fn parse(
        policy_start_date: &str,
        date_of_loss: &str,
        allowed_day_threshold: u32,
    ) -> Result<Self, ClaimError> {
        let start = dates::parse_calendar_date(policy_start_date).ok_or_else(|| {
            ClaimError::InvalidDate {
                field: "policy start date",
                value: policy_start_date.to_string(),
            }
        })?;
        let loss = dates::parse_calendar_date(date_of_loss).ok_or_else(|| ClaimError::InvalidDate {
            field: "date of loss",
            value: date_of_loss.to_string(),
        })?;

        Ok(Self::new(start, loss, allowed_day_threshold))
    }
}

/// The immutable inputs of a single claim submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimIntake {
    /// Stored claim image. Owned by the upload surface; only read here.
    pub image_path: PathBuf,

    /// Free-text description supplied by the claimant
    pub user_narrative: String,

    /// Policy dates and threshold
    pub policy: PolicyTerms,
}

impl ClaimIntake {
    pub fn new(
        image_path: impl Into<PathBuf>,
        user_narrative: impl Into<String>,
        policy: PolicyTerms,
    ) -> Result<Self, ClaimError> {
        let user_narrative = user_narrative.into();
        if user_narrative.trim().is_empty() {
            return Err(ClaimError::EmptyNarrative);
        }

        Ok(Self {
            image_path: image_path.into(),
            user_narrative,
            policy,
        })
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }
}

/// Capture date relative to policy inception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureVsPolicy {
    Valid,
    Invalid,
    Unknown,
}

impl CaptureVsPolicy {
    pub fn is_unknown(&self) -> bool {
        matches!(self, CaptureVsPolicy::Unknown)
    }
}

impl fmt::Display for CaptureVsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureVsPolicy::Valid => write!(f, "valid"),
            CaptureVsPolicy::Invalid => write!(f, "invalid"),
            CaptureVsPolicy::Unknown => write!(f, "unknown"),
        }
    }
}

/// Capture date relative to the date of loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureVsLossDate {
    WithinThreshold,
    TooFar,
    Unknown,
}

impl CaptureVsLossDate {
    pub fn is_unknown(&self) -> bool {
        matches!(self, CaptureVsLossDate::Unknown)
    }
}

impl fmt::Display for CaptureVsLossDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureVsLossDate::WithinThreshold => write!(f, "within threshold"),
            CaptureVsLossDate::TooFar => write!(f, "too far"),
            CaptureVsLossDate::Unknown => write!(f, "unknown"),
        }
    }
}

/// Facts written by the Metadata Validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFindings {
    /// Embedded original-capture time, if the image carries a parsable one
    pub capture_timestamp: Option<NaiveDateTime>,

    /// Whether the image embeds any GPS information
    pub gps_present: bool,

    pub capture_vs_policy: CaptureVsPolicy,

    pub capture_vs_loss_date: CaptureVsLossDate,

    /// Absolute whole-day difference between capture date and date of loss
    pub capture_day_difference: Option<u64>,
}

/// Facts written by the Content Relevance Checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFindings {
    /// Labels in collaborator order (descending confidence)
    pub content_labels: Vec<String>,

    pub narrative_matches_content: bool,
}

/// Summary text returned by the summarization collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeSummary {
    /// Raw text as returned by the collaborator
    pub text: String,

    /// The claim synopsis section
    pub synopsis: Option<String>,

    /// The remark on whether the image labels support the narrative
    pub label_remark: Option<String>,

    /// Whether the summarizer's own remark marks the claim as incomplete
    pub incomplete: bool,
}

/// Structured fields pulled out of the summary. Any field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFacts {
    pub incident_date: Option<String>,
    pub damaged_item: Option<String>,
    pub claimed_amount: Option<String>,
    pub cause: Option<String>,
    pub supporting_documents: Option<String>,
}

impl KeyFacts {
    pub fn is_empty(&self) -> bool {
        self.incident_date.is_none()
            && self.damaged_item.is_none()
            && self.claimed_amount.is_none()
            && self.cause.is_none()
            && self.supporting_documents.is_none()
    }
}

/// Why the Misrepresentation Detector raised its flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MisrepresentationReason {
    IncidentBeforePolicyInception,
    IncidentDateMismatch,
}

impl MisrepresentationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MisrepresentationReason::IncidentBeforePolicyInception => {
                "incident before policy inception"
            }
            MisrepresentationReason::IncidentDateMismatch => {
                "incident date and date of loss mismatch"
            }
        }
    }
}

impl fmt::Display for MisrepresentationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Facts written by the Misrepresentation Detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MisrepresentationFinding {
    pub flagged: bool,

    pub reason: Option<MisrepresentationReason>,

    /// Incident date after year resolution, absent if not extractable
    pub resolved_incident_date: Option<NaiveDate>,
}

impl MisrepresentationFinding {
    /// No flag, no reason.
    pub fn clear(resolved_incident_date: Option<NaiveDate>) -> Self {
        Self {
            flagged: false,
            reason: None,
            resolved_incident_date,
        }
    }

    pub fn flagged(reason: MisrepresentationReason, resolved_incident_date: NaiveDate) -> Self {
        Self {
            flagged: true,
            reason: Some(reason),
            resolved_incident_date: Some(resolved_incident_date),
        }
    }

    /// Reason text, empty when nothing was flagged.
    pub fn reason_text(&self) -> &'static str {
        self.reason.map(|r| r.as_str()).unwrap_or("")
    }
}

/// Terminal verdict of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approve,
    Reject,
    Flag,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Approve => write!(f, "APPROVE"),
            Verdict::Reject => write!(f, "REJECT"),
            Verdict::Flag => write!(f, "FLAG"),
        }
    }
}

/// The Decision Engine's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub verdict: Verdict,

    /// Identifier of the rule that fired (e.g., "R1", "F2", "A1")
    pub rule_id: String,

    /// Short human-readable reason
    pub reason: String,

    /// Record fields that triggered the rule
    #[serde(default)]
    pub evidence: Vec<Evidence>,
}

impl Decision {
    /// Reason prefixed with the rule identifier.
    pub fn verdict_reason(&self) -> String {
        format!("{}: {}", self.rule_id, self.reason)
    }
}

/// Where a piece of evidence points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    ImageMetadata,
    ContentLabels,
    Narrative,
    Summary,
    KeyFacts,
    Misrepresentation,
    Policy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_terms_parse_accepts_both_shapes() {
        let terms = PolicyTerms::parse("2024-04-01", "2024-05-02T10:30:00", 3).unwrap();
        assert_eq!(terms.policy_start_date, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
        assert_eq!(terms.date_of_loss, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        assert_eq!(terms.allowed_day_threshold, 3);
    }

    #[test]
    fn test_policy_terms_malformed_date_fails_fast() {
        let result = PolicyTerms::parse("04/01/2024", "2024-05-02", 3);
        assert!(matches!(
            result,
            Err(ClaimError::InvalidDate { field: "policy start date", .. })
        ));

        let result = PolicyTerms::parse("2024-04-01", "yesterday", 3);
        assert!(matches!(
            result,
            Err(ClaimError::InvalidDate { field: "date of loss", .. })
        ));
    }

    #[test]
    fn test_intake_rejects_blank_narrative() {
        let policy = PolicyTerms::parse("2024-04-01", "2024-05-02", 2).unwrap();
        let result = ClaimIntake::new("claim.jpg", "   \n", policy);
        assert!(matches!(result, Err(ClaimError::EmptyNarrative)));
    }

    #[test]
    fn test_misrepresentation_reason_text() {
        let clear = MisrepresentationFinding::clear(None);
        assert_eq!(clear.reason_text(), "");

        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let flagged =
            MisrepresentationFinding::flagged(MisrepresentationReason::IncidentBeforePolicyInception, date);
        assert_eq!(flagged.reason_text(), "incident before policy inception");
    }

    #[test]
    fn test_verdict_serializes_snake_case() {
        let json = serde_json::to_string(&Verdict::Flag).unwrap();
        assert_eq!(json, "\"flag\"");
    }
}

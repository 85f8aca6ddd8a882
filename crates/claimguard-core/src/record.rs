//! The append-only claim record threaded through the pipeline.
//!
//! Each stage consumes the record and returns it with its own group of
//! fields written. A group can be written exactly once; a second write is
//! refused rather than silently overwriting an earlier stage's facts.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{
    CaptureVsLossDate, CaptureVsPolicy, ClaimIntake, ContentFindings, Decision, KeyFacts,
    MetadataFindings, MisrepresentationFinding, NarrativeSummary, PolicyTerms, Verdict,
};

/// Pipeline stages, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Metadata,
    ContentRelevance,
    Summary,
    KeyFacts,
    Misrepresentation,
    Decision,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Metadata,
        Stage::ContentRelevance,
        Stage::Summary,
        Stage::KeyFacts,
        Stage::Misrepresentation,
        Stage::Decision,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Metadata => "metadata validator",
            Stage::ContentRelevance => "content relevance checker",
            Stage::Summary => "narrative summarizer",
            Stage::KeyFacts => "key-fact extractor",
            Stage::Misrepresentation => "misrepresentation detector",
            Stage::Decision => "decision engine",
        };
        f.write_str(name)
    }
}

/// Violations of the append-only discipline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("Fields of the {0} were already written")]
    AlreadyWritten(Stage),

    #[error("The {needed} has not run yet (required by the {by})")]
    MissingStage { needed: Stage, by: Stage },
}

/// A single claim submission and everything derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRecord {
    intake: ClaimIntake,
    metadata: Option<MetadataFindings>,
    content: Option<ContentFindings>,
    summary: Option<NarrativeSummary>,
    key_facts: Option<KeyFacts>,
    misrepresentation: Option<MisrepresentationFinding>,
    decision: Option<Decision>,
}

fn write_once<T>(slot: &mut Option<T>, value: T, stage: Stage) -> Result<(), RecordError> {
    if slot.is_some() {
        return Err(RecordError::AlreadyWritten(stage));
    }
    *slot = Some(value);
    Ok(())
}

impl ClaimRecord {
    /// Start a record from validated caller inputs.
    pub fn new(intake: ClaimIntake) -> Self {
        Self {
            intake,
            metadata: None,
            content: None,
            summary: None,
            key_facts: None,
            misrepresentation: None,
            decision: None,
        }
    }

    pub fn with_metadata(mut self, findings: MetadataFindings) -> Result<Self, RecordError> {
        write_once(&mut self.metadata, findings, Stage::Metadata)?;
        Ok(self)
    }

    pub fn with_content(mut self, findings: ContentFindings) -> Result<Self, RecordError> {
        write_once(&mut self.content, findings, Stage::ContentRelevance)?;
        Ok(self)
    }

    pub fn with_summary(mut self, summary: NarrativeSummary) -> Result<Self, RecordError> {
        write_once(&mut self.summary, summary, Stage::Summary)?;
        Ok(self)
    }

    pub fn with_key_facts(mut self, key_facts: KeyFacts) -> Result<Self, RecordError> {
        write_once(&mut self.key_facts, key_facts, Stage::KeyFacts)?;
        Ok(self)
    }

    pub fn with_misrepresentation(
        mut self,
        finding: MisrepresentationFinding,
    ) -> Result<Self, RecordError> {
        write_once(&mut self.misrepresentation, finding, Stage::Misrepresentation)?;
        Ok(self)
    }

    pub fn with_decision(mut self, decision: Decision) -> Result<Self, RecordError> {
        write_once(&mut self.decision, decision, Stage::Decision)?;
        Ok(self)
    }

    pub fn intake(&self) -> &ClaimIntake {
        &self.intake
    }

    pub fn policy(&self) -> &PolicyTerms {
        &self.intake.policy
    }

    pub fn user_narrative(&self) -> &str {
        &self.intake.user_narrative
    }

    pub fn metadata(&self) -> Option<&MetadataFindings> {
        self.metadata.as_ref()
    }

    pub fn content(&self) -> Option<&ContentFindings> {
        self.content.as_ref()
    }

    pub fn summary(&self) -> Option<&NarrativeSummary> {
        self.summary.as_ref()
    }

    pub fn key_facts(&self) -> Option<&KeyFacts> {
        self.key_facts.as_ref()
    }

    pub fn misrepresentation(&self) -> Option<&MisrepresentationFinding> {
        self.misrepresentation.as_ref()
    }

    pub fn decision(&self) -> Option<&Decision> {
        self.decision.as_ref()
    }

    pub fn capture_timestamp(&self) -> Option<NaiveDateTime> {
        self.metadata.as_ref().and_then(|m| m.capture_timestamp)
    }

    pub fn gps_present(&self) -> bool {
        self.metadata.as_ref().map(|m| m.gps_present).unwrap_or(false)
    }

    pub fn capture_vs_policy(&self) -> Option<CaptureVsPolicy> {
        self.metadata.as_ref().map(|m| m.capture_vs_policy)
    }

    pub fn capture_vs_loss_date(&self) -> Option<CaptureVsLossDate> {
        self.metadata.as_ref().map(|m| m.capture_vs_loss_date)
    }

    pub fn content_labels(&self) -> &[String] {
        self.content
            .as_ref()
            .map(|c| c.content_labels.as_slice())
            .unwrap_or(&[])
    }

    pub fn narrative_matches_content(&self) -> Option<bool> {
        self.content.as_ref().map(|c| c.narrative_matches_content)
    }

    pub fn misrepresentation_flag(&self) -> Option<bool> {
        self.misrepresentation.as_ref().map(|m| m.flagged)
    }

    pub fn misrepresentation_reason(&self) -> Option<&'static str> {
        self.misrepresentation.as_ref().map(|m| m.reason_text())
    }

    pub fn verdict(&self) -> Option<Verdict> {
        self.decision.as_ref().map(|d| d.verdict)
    }

    pub fn verdict_reason(&self) -> Option<String> {
        self.decision.as_ref().map(|d| d.verdict_reason())
    }

    /// Whether the stage's fields have been written.
    pub fn has_run(&self, stage: Stage) -> bool {
        match stage {
            Stage::Metadata => self.metadata.is_some(),
            Stage::ContentRelevance => self.content.is_some(),
            Stage::Summary => self.summary.is_some(),
            Stage::KeyFacts => self.key_facts.is_some(),
            Stage::Misrepresentation => self.misrepresentation.is_some(),
            Stage::Decision => self.decision.is_some(),
        }
    }

    /// True once the decision engine has written the verdict.
    pub fn is_complete(&self) -> bool {
        Stage::ALL.iter().all(|s| self.has_run(*s))
    }

    /// Fail unless `needed` has already run.
    pub fn require(&self, needed: Stage, by: Stage) -> Result<(), RecordError> {
        if self.has_run(needed) {
            Ok(())
        } else {
            Err(RecordError::MissingStage { needed, by })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PolicyTerms;

    fn intake() -> ClaimIntake {
        let policy = PolicyTerms::parse("2024-04-01", "2024-05-01", 2).unwrap();
        ClaimIntake::new("claim.jpg", "A tree fell on my roof", policy).unwrap()
    }

    fn content(labels: &[&str], matches: bool) -> ContentFindings {
        ContentFindings {
            content_labels: labels.iter().map(|s| s.to_string()).collect(),
            narrative_matches_content: matches,
        }
    }

    #[test]
    fn test_new_record_is_empty() {
        let record = ClaimRecord::new(intake());
        assert!(Stage::ALL.iter().all(|s| !record.has_run(*s)));
        assert!(record.content_labels().is_empty());
        assert_eq!(record.verdict(), None);
    }

    #[test]
    fn test_second_write_is_refused() {
        let record = ClaimRecord::new(intake())
            .with_content(content(&["roof"], true))
            .unwrap();

        let result = record.with_content(content(&["laptop"], false));
        assert_eq!(result, Err(RecordError::AlreadyWritten(Stage::ContentRelevance)));
    }

    #[test]
    fn test_require_reports_missing_stage() {
        let record = ClaimRecord::new(intake());
        assert_eq!(
            record.require(Stage::KeyFacts, Stage::Misrepresentation),
            Err(RecordError::MissingStage {
                needed: Stage::KeyFacts,
                by: Stage::Misrepresentation,
            })
        );
    }

    #[test]
    fn test_record_json_round_trip() {
        let record = ClaimRecord::new(intake())
            .with_content(content(&["roof", "tree"], true))
            .unwrap();

        let json = serde_json::to_string(&record).unwrap();
        let back: ClaimRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}

//! Misrepresentation Detector
//!
//! Compares the incident date stated in the claim against the policy start
//! and the declared date of loss. Only dates are compared; amounts, causes
//! and items are not cross-checked.

use chrono::{Datelike, NaiveDate};

use crate::dates;
use crate::record::{ClaimRecord, RecordError, Stage};
use crate::types::{KeyFacts, MisrepresentationFinding, MisrepresentationReason, PolicyTerms};

#[derive(Debug, Clone, Copy, Default)]
pub struct MisrepresentationDetector;

impl MisrepresentationDetector {
    pub fn new() -> Self {
        Self
    }

    /// Resolve the stated incident date.
    ///
    /// Dates without a year are placed in the policy start year, even when
    /// that lands the incident before inception.
    pub fn resolve(&self, facts: &KeyFacts, policy: &PolicyTerms) -> Option<NaiveDate> {
        let text = facts.incident_date.as_deref()?;
        dates::resolve_incident_date(text, policy.policy_start_date.year())
    }

    pub fn detect(&self, facts: &KeyFacts, policy: &PolicyTerms) -> MisrepresentationFinding {
        let Some(incident) = self.resolve(facts, policy) else {
            tracing::debug!(raw = ?facts.incident_date, "Incident date not resolvable; no flag raised");
            return MisrepresentationFinding::clear(None);
        };

        let finding = if incident < policy.policy_start_date {
            MisrepresentationFinding::flagged(
                MisrepresentationReason::IncidentBeforePolicyInception,
                incident,
            )
        } else if incident != policy.date_of_loss {
            MisrepresentationFinding::flagged(MisrepresentationReason::IncidentDateMismatch, incident)
        } else {
            MisrepresentationFinding::clear(Some(incident))
        };

        tracing::debug!(
            %incident,
            flagged = finding.flagged,
            reason = finding.reason_text(),
            "Misrepresentation checked"
        );
        finding
    }

    /// Requires the key facts.
    pub fn apply(&self, record: ClaimRecord) -> Result<ClaimRecord, RecordError> {
        let facts = record
            .key_facts()
            .ok_or(RecordError::MissingStage {
                needed: Stage::KeyFacts,
                by: Stage::Misrepresentation,
            })?;
        let finding = self.detect(facts, record.policy());
        record.with_misrepresentation(finding)
    }
}

//! Human-readable claim report.
//!
//! Sections follow the claim review sheet: summary, final decision,
//! vision labels, extracted key information and the misrepresentation
//! check, followed by the evaluation table.

use claimguard_core::{CaptureVsLossDate, CaptureVsPolicy, ClaimRecord, KeyFacts};
use claimguard_runtime::{Collaborator, LlmUsage, PipelineOutcome};
use serde::Serialize;
use std::fmt;

/// One row of the evaluation table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationRow {
    pub field: &'static str,
    pub passed: bool,
    pub status: &'static str,
    pub explanation: String,
}

/// Renders a finished record for a reviewer.
pub struct ClaimReport<'a> {
    record: &'a ClaimRecord,
    usage: Option<&'a LlmUsage>,
    degraded: &'a [Collaborator],
}

impl<'a> ClaimReport<'a> {
    pub fn new(record: &'a ClaimRecord) -> Self {
        Self {
            record,
            usage: None,
            degraded: &[],
        }
    }

    /// Report that also lists token usage and degraded collaborators.
    pub fn from_outcome(outcome: &'a PipelineOutcome) -> Self {
        Self {
            record: &outcome.record,
            usage: Some(&outcome.usage),
            degraded: &outcome.degraded,
        }
    }

    pub fn rows(&self) -> Vec<EvaluationRow> {
        let record = self.record;
        let threshold = record.policy().allowed_day_threshold;

        let relevant = record.narrative_matches_content().unwrap_or(false);
        let policy = record.capture_vs_policy().unwrap_or(CaptureVsPolicy::Unknown);
        let loss = record
            .capture_vs_loss_date()
            .unwrap_or(CaptureVsLossDate::Unknown);
        let misrepresented = record.misrepresentation_flag().unwrap_or(false);
        let gps = record.gps_present();

        vec![
            EvaluationRow {
                field: "Image Relevance",
                passed: relevant,
                status: if relevant { "Yes" } else { "No" },
                explanation: if relevant {
                    "Image labels match the claim description.".to_string()
                } else {
                    "Image is not related to the claim description.".to_string()
                },
            },
            EvaluationRow {
                field: "Capture vs Policy Start",
                passed: policy == CaptureVsPolicy::Valid,
                status: match policy {
                    CaptureVsPolicy::Valid => "Valid",
                    CaptureVsPolicy::Invalid => "Invalid",
                    CaptureVsPolicy::Unknown => "Unknown",
                },
                explanation: match policy {
                    CaptureVsPolicy::Valid => "Photo taken after policy started.",
                    CaptureVsPolicy::Invalid => "Photo taken before policy started.",
                    CaptureVsPolicy::Unknown => "No capture date in image metadata.",
                }
                .to_string(),
            },
            EvaluationRow {
                field: "Capture vs Date of Loss",
                passed: loss == CaptureVsLossDate::WithinThreshold,
                status: match loss {
                    CaptureVsLossDate::WithinThreshold => "Close",
                    CaptureVsLossDate::TooFar => "Too Far",
                    CaptureVsLossDate::Unknown => "Unknown",
                },
                explanation: match (loss, self.day_difference()) {
                    (CaptureVsLossDate::WithinThreshold, Some(days)) => format!(
                        "Capture date {} day(s) from date of loss, within {}.",
                        days, threshold
                    ),
                    (CaptureVsLossDate::TooFar, Some(days)) => format!(
                        "Capture date {} day(s) from date of loss, beyond {}.",
                        days, threshold
                    ),
                    _ => "No capture date in image metadata.".to_string(),
                },
            },
            EvaluationRow {
                field: "Misrepresentation Found",
                passed: !misrepresented,
                status: if misrepresented { "Yes" } else { "No" },
                explanation: match record.misrepresentation_reason() {
                    Some(reason) if misrepresented => format!("Conflicting details: {}.", reason),
                    _ => "No misrepresentation found.".to_string(),
                },
            },
            EvaluationRow {
                field: "GPS Location Available",
                passed: gps,
                status: if gps { "Yes" } else { "No" },
                explanation: if gps {
                    "GPS metadata present.".to_string()
                } else {
                    "No GPS metadata found.".to_string()
                },
            },
        ]
    }

    fn day_difference(&self) -> Option<u64> {
        self.record
            .metadata()
            .and_then(|m| m.capture_day_difference)
    }

    fn write_key_facts(f: &mut fmt::Formatter<'_>, facts: &KeyFacts) -> fmt::Result {
        let fields = [
            ("Incident date", &facts.incident_date),
            ("Damaged item", &facts.damaged_item),
            ("Claimed amount", &facts.claimed_amount),
            ("Cause", &facts.cause),
            ("Supporting documents", &facts.supporting_documents),
        ];
        for (label, value) in fields {
            writeln!(f, "  {}: {}", label, value.as_deref().unwrap_or("not stated"))?;
        }
        Ok(())
    }
}

impl fmt::Display for ClaimReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.record;

        writeln!(f, "Claim Evaluation Report")?;
        writeln!(f, "{}", "=".repeat(50))?;
        writeln!(f, "Image: {}", record.intake().image_path().display())?;
        writeln!(
            f,
            "Policy start: {}  Date of loss: {}  Threshold: {} day(s)",
            record.policy().policy_start_date,
            record.policy().date_of_loss,
            record.policy().allowed_day_threshold
        )?;

        writeln!(f, "\nSummary")?;
        writeln!(f, "{}", "-".repeat(50))?;
        match record.summary() {
            Some(summary) if !summary.text.trim().is_empty() => {
                writeln!(f, "{}", summary.text.trim())?;
            }
            _ => writeln!(f, "(no summary available)")?,
        }

        writeln!(f, "\nEvaluation & Final Decision")?;
        writeln!(f, "{}", "-".repeat(50))?;
        match record.decision() {
            Some(decision) => {
                writeln!(f, "Verdict: {}", decision.verdict)?;
                writeln!(f, "Reason:  {}", decision.verdict_reason())?;
                for evidence in &decision.evidence {
                    writeln!(f, "  - {} ({})", evidence.claim, evidence.pointer)?;
                }
            }
            None => writeln!(f, "Verdict: (not decided)")?,
        }

        writeln!(f, "\nVision Labels")?;
        writeln!(f, "{}", "-".repeat(50))?;
        if record.content_labels().is_empty() {
            writeln!(f, "(no labels)")?;
        } else {
            writeln!(f, "{}", record.content_labels().join(", "))?;
        }

        writeln!(f, "\nKey Information Extracted")?;
        writeln!(f, "{}", "-".repeat(50))?;
        match record.key_facts() {
            Some(facts) if !facts.is_empty() => Self::write_key_facts(f, facts)?,
            _ => writeln!(f, "(nothing extracted)")?,
        }

        writeln!(f, "\nMisrepresentation Check")?;
        writeln!(f, "{}", "-".repeat(50))?;
        match record.misrepresentation() {
            Some(finding) if finding.flagged => {
                writeln!(f, "Flagged: {}", finding.reason_text())?;
            }
            Some(_) => writeln!(f, "No misrepresentation found.")?,
            None => writeln!(f, "(not checked)")?,
        }
        if let Some(date) = record.misrepresentation().and_then(|m| m.resolved_incident_date) {
            writeln!(f, "Resolved incident date: {}", date)?;
        }

        writeln!(f, "\nEvaluation Table")?;
        writeln!(f, "{}", "-".repeat(50))?;
        for row in self.rows() {
            let mark = if row.passed { "ok" } else { "!!" };
            writeln!(
                f,
                "[{}] {:<25} {:<8} {}",
                mark, row.field, row.status, row.explanation
            )?;
        }

        if !self.degraded.is_empty() {
            let names: Vec<String> = self.degraded.iter().map(|c| c.to_string()).collect();
            writeln!(f, "\nDegraded collaborators: {}", names.join(", "))?;
        }

        if let Some(usage) = self.usage {
            writeln!(
                f,
                "\nModel usage: {} call(s), {} token(s), {} cache hit(s), est. ${:.6}",
                usage.llm_calls, usage.total_tokens, usage.cache_hits, usage.estimated_cost
            )?;
        }

        Ok(())
    }
}

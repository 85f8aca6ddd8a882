//! Decision Engine: turns accumulated findings into a verdict.
//!
//! The policy is an ordered rule table evaluated top to bottom. The first
//! rule whose check fires decides the verdict; later rules are not consulted.
//! Reject rules come first, then flag rules, then the approve fallback:
//!
//! | Rule | Verdict | Fires when                                         |
//! |------|---------|----------------------------------------------------|
//! | R1   | reject  | no capture timestamp                               |
//! | R2   | reject  | captured before policy start                       |
//! | R3   | reject  | no label appears in the narrative                  |
//! | R4   | reject  | misrepresentation flagged                          |
//! | F1   | flag    | capture too far from date of loss                  |
//! | F2   | flag    | unknown date comparison or no extracted key facts  |
//! | F3   | flag    | summarizer judged the claim incomplete             |
//! | A1   | approve | always                                             |

use std::fmt;

use crate::evidence::Evidence;
use crate::record::{ClaimRecord, RecordError, Stage};
use crate::types::{
    CaptureVsLossDate, CaptureVsPolicy, ContentFindings, Decision, KeyFacts, MetadataFindings,
    MisrepresentationFinding, NarrativeSummary, PolicyTerms, Verdict,
};

/// Everything the rules look at, borrowed from a record whose upstream
/// stages have all run.
#[derive(Debug, Clone, Copy)]
pub struct DecisionInputs<'a> {
    pub policy: &'a PolicyTerms,
    pub metadata: &'a MetadataFindings,
    pub content: &'a ContentFindings,
    pub summary: &'a NarrativeSummary,
    pub key_facts: &'a KeyFacts,
    pub misrepresentation: &'a MisrepresentationFinding,
}

impl<'a> DecisionInputs<'a> {
    pub fn from_record(record: &'a ClaimRecord) -> Result<Self, RecordError> {
        let missing = |needed| RecordError::MissingStage {
            needed,
            by: Stage::Decision,
        };

        Ok(Self {
            policy: record.policy(),
            metadata: record.metadata().ok_or_else(|| missing(Stage::Metadata))?,
            content: record.content().ok_or_else(|| missing(Stage::ContentRelevance))?,
            summary: record.summary().ok_or_else(|| missing(Stage::Summary))?,
            key_facts: record.key_facts().ok_or_else(|| missing(Stage::KeyFacts))?,
            misrepresentation: record
                .misrepresentation()
                .ok_or_else(|| missing(Stage::Misrepresentation))?,
        })
    }
}

/// What a rule reports when it fires.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleHit {
    pub reason: String,
    pub evidence: Vec<Evidence>,
}

impl RuleHit {
    fn new(reason: impl Into<String>, evidence: Vec<Evidence>) -> Self {
        Self {
            reason: reason.into(),
            evidence,
        }
    }
}

/// One row of the rule table.
#[derive(Clone, Copy)]
pub struct DecisionRule {
    pub id: &'static str,
    pub verdict: Verdict,
    pub check: fn(&DecisionInputs<'_>) -> Option<RuleHit>,
}

impl fmt::Debug for DecisionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionRule")
            .field("id", &self.id)
            .field("verdict", &self.verdict)
            .finish_non_exhaustive()
    }
}

/// Built-in rules, in priority order.
pub const DEFAULT_RULES: &[DecisionRule] = &[
    DecisionRule {
        id: "R1",
        verdict: Verdict::Reject,
        check: missing_capture_timestamp,
    },
    DecisionRule {
        id: "R2",
        verdict: Verdict::Reject,
        check: captured_before_policy_start,
    },
    DecisionRule {
        id: "R3",
        verdict: Verdict::Reject,
        check: content_does_not_match,
    },
    DecisionRule {
        id: "R4",
        verdict: Verdict::Reject,
        check: misrepresentation_detected,
    },
    DecisionRule {
        id: "F1",
        verdict: Verdict::Flag,
        check: capture_too_far_from_loss,
    },
    DecisionRule {
        id: "F2",
        verdict: Verdict::Flag,
        check: ambiguous_evidence,
    },
    DecisionRule {
        id: "F3",
        verdict: Verdict::Flag,
        check: summary_incomplete,
    },
    DecisionRule {
        id: "A1",
        verdict: Verdict::Approve,
        check: all_checks_passed,
    },
];

fn missing_capture_timestamp(inputs: &DecisionInputs<'_>) -> Option<RuleHit> {
    if inputs.metadata.capture_timestamp.is_some() {
        return None;
    }
    Some(RuleHit::new(
        "capture timestamp missing from image metadata",
        vec![Evidence::from_metadata("No embedded capture time", "capture_timestamp")],
    ))
}

fn captured_before_policy_start(inputs: &DecisionInputs<'_>) -> Option<RuleHit> {
    if inputs.metadata.capture_vs_policy != CaptureVsPolicy::Invalid {
        return None;
    }
    Some(RuleHit::new(
        "photo captured before policy start date",
        vec![
            Evidence::from_metadata("Capture date precedes policy start", "capture_vs_policy"),
            Evidence::from_policy(
                format!("Policy started {}", inputs.policy.policy_start_date),
                "policy_start_date",
            ),
        ],
    ))
}

fn content_does_not_match(inputs: &DecisionInputs<'_>) -> Option<RuleHit> {
    if inputs.content.narrative_matches_content {
        return None;
    }
    let claim = if inputs.content.content_labels.is_empty() {
        "No content labels available".to_string()
    } else {
        format!("Labels: {}", inputs.content.content_labels.join(", "))
    };
    Some(RuleHit::new(
        "image content does not match claim narrative",
        vec![
            Evidence::from_labels(claim, None),
            Evidence::from_narrative("No label appears in the narrative"),
        ],
    ))
}

fn misrepresentation_detected(inputs: &DecisionInputs<'_>) -> Option<RuleHit> {
    let finding = inputs.misrepresentation;
    if !finding.flagged {
        return None;
    }

    let mut evidence = vec![Evidence::from_misrepresentation(
        finding.reason_text(),
        "reason",
    )];
    if let Some(date) = finding.resolved_incident_date {
        evidence.push(Evidence::from_key_facts(
            format!("Incident date resolved to {}", date),
            "incident_date",
        ));
    }

    Some(RuleHit::new(
        format!("misrepresentation detected: {}", finding.reason_text()),
        evidence,
    ))
}

fn capture_too_far_from_loss(inputs: &DecisionInputs<'_>) -> Option<RuleHit> {
    if inputs.metadata.capture_vs_loss_date != CaptureVsLossDate::TooFar {
        return None;
    }
    let threshold = inputs.policy.allowed_day_threshold;
    let reason = match inputs.metadata.capture_day_difference {
        Some(days) => format!(
            "capture date is {} days from date of loss, beyond allowed threshold of {} days",
            days, threshold
        ),
        None => format!(
            "capture date is beyond allowed threshold of {} days from date of loss",
            threshold
        ),
    };
    Some(RuleHit::new(
        reason,
        vec![
            Evidence::from_metadata("Capture too far from loss", "capture_day_difference"),
            Evidence::from_policy(
                format!("Threshold {} days", threshold),
                "allowed_day_threshold",
            ),
        ],
    ))
}

fn ambiguous_evidence(inputs: &DecisionInputs<'_>) -> Option<RuleHit> {
    let mut unknowns = Vec::new();
    let mut evidence = Vec::new();

    if inputs.metadata.capture_vs_policy.is_unknown() {
        unknowns.push("capture vs policy start unknown");
        evidence.push(Evidence::from_metadata("Unknown", "capture_vs_policy"));
    }
    if inputs.metadata.capture_vs_loss_date.is_unknown() {
        unknowns.push("capture vs date of loss unknown");
        evidence.push(Evidence::from_metadata("Unknown", "capture_vs_loss_date"));
    }
    if inputs.key_facts.is_empty() {
        unknowns.push("no key facts extracted");
        evidence.push(Evidence::from_key_facts("No fields extracted", "incident_date"));
    }

    if unknowns.is_empty() {
        return None;
    }
    Some(RuleHit::new(
        format!("ambiguous evidence: {}", unknowns.join("; ")),
        evidence,
    ))
}

fn summary_incomplete(inputs: &DecisionInputs<'_>) -> Option<RuleHit> {
    if !inputs.summary.incomplete {
        return None;
    }
    let evidence = match &inputs.summary.label_remark {
        Some(remark) => Evidence::from_summary(remark.clone(), "label_remark"),
        None => Evidence::from_summary("Label relevance remark missing", "label_remark"),
    };
    Some(RuleHit::new(
        "claim summary incomplete or inconclusive",
        vec![evidence],
    ))
}

fn all_checks_passed(_inputs: &DecisionInputs<'_>) -> Option<RuleHit> {
    Some(RuleHit::new("all checks passed", Vec::new()))
}

/// Applies a rule table to a record.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    rules: Vec<DecisionRule>,
}

impl DecisionEngine {
    pub fn new() -> Self {
        Self::with_rules(DEFAULT_RULES.to_vec())
    }

    /// Engine over a custom rule table. If no rule fires, the claim is
    /// flagged for review.
    pub fn with_rules(rules: Vec<DecisionRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[DecisionRule] {
        &self.rules
    }

    /// Evaluate the rule table. Fails only when an upstream stage is missing.
    pub fn decide(&self, record: &ClaimRecord) -> Result<Decision, RecordError> {
        let inputs = DecisionInputs::from_record(record)?;
        Ok(self.decide_inputs(&inputs))
    }

    pub fn decide_inputs(&self, inputs: &DecisionInputs<'_>) -> Decision {
        for rule in &self.rules {
            if let Some(hit) = (rule.check)(inputs) {
                tracing::info!(
                    rule_id = rule.id,
                    verdict = %rule.verdict,
                    reason = %hit.reason,
                    "Decision rule fired"
                );
                return Decision {
                    verdict: rule.verdict,
                    rule_id: rule.id.to_string(),
                    reason: hit.reason,
                    evidence: hit.evidence,
                };
            }
        }

        tracing::warn!(rules = self.rules.len(), "No decision rule matched");
        Decision {
            verdict: Verdict::Flag,
            rule_id: "NONE".to_string(),
            reason: "no decision rule matched".to_string(),
            evidence: Vec::new(),
        }
    }

    /// Decide and write the verdict into the record.
    pub fn apply(&self, record: ClaimRecord) -> Result<ClaimRecord, RecordError> {
        let decision = self.decide(&record)?;
        record.with_decision(decision)
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new()
    }
}

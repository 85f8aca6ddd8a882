//! Narrative summary parsing.
//!
//! The summarizer is asked for two sections: a claim synopsis and a remark
//! on whether the image labels support the claim. This module recovers both
//! from free text and decides whether the summarizer judged the claim
//! incomplete.

use crate::record::{ClaimRecord, RecordError};
use crate::types::NarrativeSummary;

use super::patterns::{is_incomplete_remark, split_heading};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Synopsis,
    LabelRemark,
}

fn section_for(heading: &str) -> Option<Section> {
    match heading {
        "summary" | "claim summary" | "synopsis" | "claim synopsis" => Some(Section::Synopsis),
        h if h.contains("label relevance") || h.contains("label support") => {
            Some(Section::LabelRemark)
        }
        _ => None,
    }
}

fn push_text(slot: &mut Option<String>, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    match slot {
        Some(existing) => {
            existing.push(' ');
            existing.push_str(text);
        }
        None => *slot = Some(text.to_string()),
    }
}

impl NarrativeSummary {
    /// Parse collaborator text. Never fails; missing sections stay `None`.
    pub fn parse(text: &str) -> Self {
        let mut synopsis = None;
        let mut label_remark = None;
        let mut current: Option<Section> = None;

        for line in text.lines() {
            if let Some((heading, value)) = split_heading(line) {
                if let Some(section) = section_for(&heading) {
                    current = Some(section);
                    match section {
                        Section::Synopsis => push_text(&mut synopsis, &value),
                        Section::LabelRemark => push_text(&mut label_remark, &value),
                    }
                    continue;
                }
            }

            match current {
                Some(Section::Synopsis) => push_text(&mut synopsis, line),
                Some(Section::LabelRemark) => push_text(&mut label_remark, line),
                None => {}
            }
        }

        let incomplete = match (&synopsis, &label_remark) {
            (Some(_), Some(remark)) => is_incomplete_remark(remark),
            _ => true,
        };

        Self {
            text: text.trim().to_string(),
            synopsis,
            label_remark,
            incomplete,
        }
    }

    /// What the pipeline records when the summarizer is unavailable.
    pub fn unavailable() -> Self {
        Self::parse("")
    }
}

/// Narrative Summarizer stage (record side). The text itself comes from the
/// summarization collaborator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryStage;

impl SummaryStage {
    pub fn new() -> Self {
        Self
    }

    pub fn apply(&self, record: ClaimRecord, summary_text: &str) -> Result<ClaimRecord, RecordError> {
        let summary = NarrativeSummary::parse(summary_text);
        tracing::debug!(
            has_synopsis = summary.synopsis.is_some(),
            has_remark = summary.label_remark.is_some(),
            incomplete = summary.incomplete,
            "Summary parsed"
        );
        record.with_summary(summary)
    }
}

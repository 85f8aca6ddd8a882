//! Prompts for the two text agents.
//!
//! The summarizer answers in two labelled sections and the extractor
//! answers in JSON; the core crate's parsers accept both and tolerate the
//! usual drift (code fences, bullet markers, extra prose).

/// Summarizer system prompt.
pub const SUMMARIZER_SYSTEM_PROMPT: &str = r#"You are an expert insurance assistant.

Analyze the claim you are given. Use only what the claimant wrote and the
image labels listed with it. Do not invent facts.

If the claim leaves out what happened, when it happened, or what was
damaged, say that the claim is incomplete in your label relevance remark.

Return a summary in this format:

- 📝 Summary: <summary of the user claim>
- 🔍 Visual Label Relevance: <does the image content support or contradict the claim?>
"#;

/// Extractor system prompt.
pub const EXTRACTOR_SYSTEM_PROMPT: &str = r#"Extract key claim information from the claim summary you are given.

Return ONLY a JSON object with these keys:
{
  "incident_date": "date of the incident exactly as written, e.g. \"March 5\" or \"2024-03-05\"",
  "damaged_item": "damaged items or property",
  "claimed_amount": "claimed amounts, if stated",
  "cause": "cause of damage",
  "supporting_documents": "supporting documents, if mentioned"
}

Use null for anything the text does not state. Do not guess dates.
"#;

/// Summarizer user message: narrative plus labels.
pub fn summarizer_input(narrative: &str, labels: &[String]) -> String {
    let labels = if labels.is_empty() {
        "No labels found".to_string()
    } else {
        labels.join(", ")
    };

    format!(
        "=== USER CLAIM TEXT ===\n{}\n\n\
         === IMAGE CONTENT LABELS ===\n{}\n\n\
         === TASK ===\n\
         1. Summarize the user's claim.\n\
         2. Comment whether image labels support the claim.\n\n\
         Return:\n\
         - 📝 Summary:\n\
         - 🔍 Visual Label Relevance:\n",
        narrative.trim(),
        labels
    )
}

/// Extractor user message: the summarizer's text.
pub fn extractor_input(summary_text: &str) -> String {
    format!("=== CLAIM SUMMARY ===\n{}\n", summary_text.trim())
}

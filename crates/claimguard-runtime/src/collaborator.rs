//! External collaborators the pipeline depends on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One external service called during a claim evaluation.
///
/// Each collaborator has its own timeout, circuit and token budget so an
/// outage in one does not starve the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collaborator {
    /// Image content labeling
    Labeler,

    /// Narrative summarization (text model)
    Summarizer,

    /// Key-fact extraction (text model)
    Extractor,
}

impl Collaborator {
    pub const ALL: [Collaborator; 3] = [
        Collaborator::Labeler,
        Collaborator::Summarizer,
        Collaborator::Extractor,
    ];

    /// Whether calls to this collaborator consume text-model tokens.
    pub fn uses_tokens(&self) -> bool {
        !matches!(self, Collaborator::Labeler)
    }
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collaborator::Labeler => write!(f, "image labeler"),
            Collaborator::Summarizer => write!(f, "narrative summarizer"),
            Collaborator::Extractor => write!(f, "key-fact extractor"),
        }
    }
}

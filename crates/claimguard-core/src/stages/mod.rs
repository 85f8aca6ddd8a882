//! Pipeline stages.
//!
//! Each stage reads fields written by earlier stages and writes its own.
//! Stages that depend on collaborators take the collaborator's text as an
//! argument; calling the collaborator is the runtime's job.

pub mod key_facts;
pub mod metadata;
pub mod misrepresentation;
pub mod patterns;
pub mod relevance;
pub mod summary;

pub use key_facts::KeyFactStage;
pub use metadata::{ExifMetadataReader, ImageMetadata, MetadataReader, MetadataValidator};
pub use misrepresentation::MisrepresentationDetector;
pub use relevance::ContentRelevanceChecker;
pub use summary::SummaryStage;

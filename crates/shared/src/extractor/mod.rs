//! Content extractors, one per [`ContentType`](crate::models::ContentType).
//!
//! Every extractor turns a source reference into a title and a plain text
//! body. All network and disk side effects stay inside the extractor.

use async_trait::async_trait;

use crate::error::AgentError;
use crate::models::ExtractedContent;

mod document;
mod video;
mod web;

pub use document::{staging_file_name, title_from_file_name, DocumentExtractor, StagedDocument};
pub use video::{VideoTranscriptExtractor, WATCH_URL};
pub use web::{WebPageExtractor, NO_TITLE};

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, source: &str) -> Result<ExtractedContent, AgentError>;
}

/// Collapse runs of whitespace into single spaces
pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

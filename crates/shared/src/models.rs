use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AgentError, ErrorKind, TransitionError};

/// What kind of content a URL references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    WebPage,
    Video,
    Document,
    Unknown,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ContentType::WebPage => "Web Page",
            ContentType::Video => "Video",
            ContentType::Document => "PDF Document",
            ContentType::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// Per-record lifecycle. `Downloaded` is reserved for documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Pending,
    Downloaded,
    Extracted,
    Processed,
    Error,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Processed | Status::Error)
    }
}

/// Title and body produced by an extractor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    pub title: String,
    pub text: String,
}

impl ExtractedContent {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
        }
    }
}

/// Output of the three enrichment steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrichment {
    pub summary: String,
    pub keywords: Vec<String>,
    pub final_summary: String,
    /// At least one step used its local fallback
    pub degraded: bool,
}

/// One unit of work per input URL.
///
/// Fields are only changed through the transition methods, which enforce
/// the lifecycle: `Pending -> {Downloaded (documents only) | Extracted} ->
/// Processed`, with `Error` reachable from any non-terminal state and
/// absorbing once set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    source: String,
    status: Status,
    content_type: Option<ContentType>,
    title: String,
    #[serde(skip)]
    raw_text: String,
    keywords: Vec<String>,
    summary: String,
    final_summary: String,
    error_kind: Option<ErrorKind>,
    error_message: String,
}

impl Record {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            status: Status::Pending,
            content_type: None,
            title: String::new(),
            raw_text: String::new(),
            keywords: Vec::new(),
            summary: String::new(),
            final_summary: String::new(),
            error_kind: None,
            error_message: String::new(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Classification result, `Unknown` until the classifier has run
    pub fn content_type(&self) -> ContentType {
        self.content_type.unwrap_or(ContentType::Unknown)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn final_summary(&self) -> &str {
        &self.final_summary
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error_kind
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    fn illegal(&self, to: Status) -> TransitionError {
        TransitionError {
            source_url: self.source.clone(),
            from: self.status,
            to,
        }
    }

    /// Set the content type. Allowed once, while the record is pending.
    pub fn classify(&mut self, content_type: ContentType) -> Result<(), TransitionError> {
        if self.status != Status::Pending || self.content_type.is_some() {
            return Err(self.illegal(self.status));
        }
        self.content_type = Some(content_type);
        Ok(())
    }

    /// Phase A of two-phase extraction finished.
    pub fn mark_downloaded(&mut self) -> Result<(), TransitionError> {
        if self.status != Status::Pending || self.content_type() != ContentType::Document {
            return Err(self.illegal(Status::Downloaded));
        }
        self.status = Status::Downloaded;
        Ok(())
    }

    pub fn mark_extracted(&mut self, content: ExtractedContent) -> Result<(), TransitionError> {
        let allowed = match self.content_type() {
            ContentType::Document => self.status == Status::Downloaded,
            ContentType::WebPage | ContentType::Video => self.status == Status::Pending,
            ContentType::Unknown => false,
        };
        if !allowed {
            return Err(self.illegal(Status::Extracted));
        }
        self.title = content.title;
        self.raw_text = content.text;
        self.status = Status::Extracted;
        Ok(())
    }

    /// Hand the raw text to enrichment. The record keeps no copy.
    pub fn take_raw_text(&mut self) -> Result<String, TransitionError> {
        if self.status != Status::Extracted {
            return Err(self.illegal(Status::Processed));
        }
        Ok(std::mem::take(&mut self.raw_text))
    }

    pub fn mark_processed(&mut self, enrichment: Enrichment) -> Result<(), TransitionError> {
        if self.status != Status::Extracted {
            return Err(self.illegal(Status::Processed));
        }
        self.raw_text.clear();
        self.summary = enrichment.summary;
        self.keywords = enrichment.keywords;
        self.final_summary = enrichment.final_summary;
        self.status = Status::Processed;
        Ok(())
    }

    /// Record a fatal failure. Refused once the record is terminal.
    pub fn fail(&mut self, error: &AgentError) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(self.illegal(Status::Error));
        }
        self.raw_text.clear();
        self.error_kind = Some(error.kind());
        self.error_message = error.to_string();
        self.status = Status::Error;
        Ok(())
    }
}

/// Complete result of one pipeline run
#[derive(Debug, Serialize, Deserialize)]
pub struct Batch {
    pub created_at: String,
    pub records: Vec<Record>,
}

impl Batch {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            created_at: chrono::Utc::now().to_rfc3339(),
            records,
        }
    }

    pub fn processed(&self) -> impl Iterator<Item = &Record> {
        self.records
            .iter()
            .filter(|r| r.status() == Status::Processed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(|r| r.status() == Status::Error)
    }

    pub fn processed_count(&self) -> usize {
        self.processed().count()
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }
}

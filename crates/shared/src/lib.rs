// Public modules
pub mod ai;
pub mod classifier;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod extractor;
pub mod fetch;
pub mod io;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod testing;

// Re-export commonly used types
pub use ai::{AiCapability, ClaudeClient};
pub use classifier::SourceClassifier;
pub use config::Config;
pub use enrichment::Enricher;
pub use error::{AgentError, ErrorKind, FetchError, TransitionError};
pub use extractor::{DocumentExtractor, Extractor, VideoTranscriptExtractor, WebPageExtractor};
pub use fetch::{Fetcher, HttpFetcher, ProbeResponse};
pub use io::{parse_url_list, read_url_file, save_records_json};
pub use models::{Batch, ContentType, Enrichment, ExtractedContent, Record, Status};
pub use pipeline::{Pipeline, PipelineConfig};
pub use progress::{ChannelObserver, ProgressEvent, ProgressObserver, TracingObserver};
pub use report::{ReportFormat, SnippetReport};

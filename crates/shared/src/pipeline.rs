use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::ai::AiCapability;
use crate::classifier::SourceClassifier;
use crate::config::Config;
use crate::enrichment::Enricher;
use crate::error::{AgentError, TransitionError};
use crate::extractor::{
    DocumentExtractor, Extractor, StagedDocument, VideoTranscriptExtractor, WebPageExtractor,
};
use crate::fetch::Fetcher;
use crate::models::{Batch, ContentType, ExtractedContent, Record, Status};
use crate::progress::{ProgressMeter, ProgressObserver};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub staging_dir: PathBuf,
    pub transcript_languages: Vec<String>,
}

impl PipelineConfig {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            transcript_languages: vec!["en".to_string()],
        }
    }
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        Self {
            staging_dir: config.staging_dir.clone(),
            transcript_languages: config.transcript_languages.clone(),
        }
    }
}

/// Documents that finished phase A, with the index of their record
type DocumentQueue = Vec<(usize, StagedDocument)>;

/// Drives a batch through classification, extraction and enrichment.
///
/// Passes run one after another over the whole batch and visit records in
/// input order. Document parsing only starts after the last download.
/// A failure is recorded on its record and the pass moves on.
pub struct Pipeline {
    config: PipelineConfig,
    classifier: SourceClassifier,
    web: WebPageExtractor,
    video: VideoTranscriptExtractor,
    documents: DocumentExtractor,
    enricher: Enricher,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        fetcher: Arc<dyn Fetcher>,
        ai: Option<Arc<dyn AiCapability>>,
    ) -> Self {
        Self {
            classifier: SourceClassifier::new(fetcher.clone()),
            web: WebPageExtractor::new(fetcher.clone()),
            video: VideoTranscriptExtractor::new(
                fetcher.clone(),
                config.transcript_languages.clone(),
            ),
            documents: DocumentExtractor::new(fetcher, config.staging_dir.clone()),
            enricher: Enricher::new(ai),
            config,
        }
    }

    pub async fn run(
        &self,
        urls: Vec<String>,
        observer: &dyn ProgressObserver,
    ) -> Result<Batch, AgentError> {
        tokio::fs::create_dir_all(&self.config.staging_dir)
            .await
            .map_err(|e| {
                AgentError::StagingUnavailable(format!(
                    "{}: {}",
                    self.config.staging_dir.display(),
                    e
                ))
            })?;

        self.documents.start_batch();

        if !self.enricher.has_ai() {
            observer.on_log("AI capability not configured; summaries will use local fallbacks.");
        }

        let mut records: Vec<Record> = urls.into_iter().map(Record::new).collect();
        let mut meter = ProgressMeter::new(records.len());
        info!(records = records.len(), "starting batch");

        let queue = self
            .classify_and_extract(&mut records, &mut meter, observer)
            .await;
        self.parse_documents(queue, &mut records, &mut meter, observer)
            .await;
        self.enrich(&mut records, &mut meter, observer).await;

        observer.on_progress(meter.finish());

        let batch = Batch::new(records);
        info!(
            processed = batch.processed_count(),
            failed = batch.failed_count(),
            "batch complete"
        );
        Ok(batch)
    }

    async fn classify_and_extract(
        &self,
        records: &mut [Record],
        meter: &mut ProgressMeter,
        observer: &dyn ProgressObserver,
    ) -> DocumentQueue {
        let total = records.len();
        let mut queue = DocumentQueue::new();

        for (index, record) in records.iter_mut().enumerate() {
            let source = record.source().to_string();
            observer.on_log(&format!("({}/{}) Processing URL: {}", index + 1, total, source));

            let content_type = self.classifier.classify(&source).await;
            report(record.classify(content_type));
            observer.on_log(&format!("-> Type: {}", content_type));

            let half_units = match content_type {
                ContentType::WebPage => {
                    let outcome = self.web.extract(&source).await;
                    settle(index, record, outcome, observer);
                    2
                }
                ContentType::Video => {
                    let outcome = self.video.extract(&source).await;
                    settle(index, record, outcome, observer);
                    2
                }
                ContentType::Document => {
                    match self.documents.download(&source).await {
                        Ok(staged) => {
                            report(record.mark_downloaded());
                            observer.on_log(&format!(
                                "-> PDF downloaded to: {}",
                                staged.path.display()
                            ));
                            observer.on_transition(index, &source, record.status());
                            queue.push((index, staged));
                            1
                        }
                        Err(err) => {
                            reject(index, record, &err, observer);
                            2
                        }
                    }
                }
                ContentType::Unknown => {
                    reject(
                        index,
                        record,
                        &AgentError::ClassificationFailed(source.clone()),
                        observer,
                    );
                    2
                }
            };

            observer.on_progress(meter.extracted(half_units));
        }

        queue
    }

    /// Phase B for every queued document, in queue order.
    async fn parse_documents(
        &self,
        queue: DocumentQueue,
        records: &mut [Record],
        meter: &mut ProgressMeter,
        observer: &dyn ProgressObserver,
    ) {
        for (index, staged) in queue {
            let Some(record) = records.get_mut(index) else {
                error!(index, "queued document has no record");
                continue;
            };

            let on_disk = staged
                .path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| staged.file_name.clone());
            observer.on_log(&format!("Extracting content from PDF: {}", on_disk));

            let outcome = self.documents.parse(&staged).await;
            settle(index, record, outcome, observer);
            observer.on_progress(meter.extracted(1));
        }
    }

    async fn enrich(
        &self,
        records: &mut [Record],
        meter: &mut ProgressMeter,
        observer: &dyn ProgressObserver,
    ) {
        let total = records
            .iter()
            .filter(|r| r.status() == Status::Extracted)
            .count();
        let mut done = 0;

        for (index, record) in records.iter_mut().enumerate() {
            if record.status() != Status::Extracted {
                continue;
            }
            observer.on_log(&format!("Generating AI content for: {}", record.source()));

            let raw_text = match record.take_raw_text() {
                Ok(text) => text,
                Err(e) => {
                    report::<()>(Err(e));
                    continue;
                }
            };
            let title = record.title().to_string();
            let enrichment = self.enricher.enrich(&title, raw_text).await;
            let degraded = enrichment.degraded;

            report(record.mark_processed(enrichment));
            observer.on_transition(index, record.source(), record.status());
            if degraded {
                observer.on_log("-> AI content generated (local fallback used).");
            } else {
                observer.on_log("-> AI content generated.");
            }

            done += 1;
            observer.on_progress(meter.enriched(done, total));
        }
    }
}

/// Apply an extraction outcome to its record.
fn settle(
    index: usize,
    record: &mut Record,
    outcome: Result<ExtractedContent, AgentError>,
    observer: &dyn ProgressObserver,
) {
    match outcome {
        Ok(content) => {
            debug!(source = record.source(), title = %content.title, bytes = content.text.len(), "extracted");
            report(record.mark_extracted(content));
            observer.on_log("-> Content extracted successfully.");
            observer.on_transition(index, record.source(), record.status());
        }
        Err(err) => reject(index, record, &err, observer),
    }
}

fn reject(index: usize, record: &mut Record, err: &AgentError, observer: &dyn ProgressObserver) {
    warn!(source = record.source(), kind = %err.kind(), error = %err, "record failed");
    report(record.fail(err));
    observer.on_log(&format!("-> Error: {}", err));
    observer.on_transition(index, record.source(), record.status());
}

/// Transitions are driven in a fixed order, so a refusal is a bug worth
/// logging but never worth stopping the batch for.
fn report<T>(result: Result<T, TransitionError>) {
    if let Err(e) = result {
        error!(error = %e, "state machine refused transition");
    }
}

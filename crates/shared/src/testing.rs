//! Test doubles for the network and AI seams, plus fixture builders.
//!
//! Used by the unit tests of this crate and by the integration tests under
//! `tests/`, so the whole pipeline can run without network access.

use anyhow::{bail, Result};
use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::ai::AiCapability;
use crate::error::FetchError;
use crate::fetch::{Fetcher, ProbeResponse};
use crate::models::Status;
use crate::progress::ProgressObserver;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Default)]
struct MockWeb {
    probes: HashMap<String, ProbeResponse>,
    failing_heads: HashSet<String>,
    pages: HashMap<String, String>,
    files: HashMap<String, Vec<u8>>,
    statuses: HashMap<String, u16>,
    calls: Vec<String>,
}

impl MockWeb {
    fn probe(&self, url: &str) -> Result<ProbeResponse, FetchError> {
        if let Some(probe) = self.probes.get(url) {
            return Ok(probe.clone());
        }
        if self.pages.contains_key(url) {
            return Ok(ProbeResponse::new(200, Some("text/html; charset=utf-8")));
        }
        if self.files.contains_key(url) {
            return Ok(ProbeResponse::new(200, Some("application/pdf")));
        }
        if let Some(status) = self.statuses.get(url) {
            return Ok(ProbeResponse::new(*status, Some("text/html")));
        }
        Err(unreachable_host(url))
    }
}

fn unreachable_host(url: &str) -> FetchError {
    FetchError::Transport {
        url: url.to_string(),
        reason: "no route to host".to_string(),
    }
}

/// Canned responses keyed by URL. Clones share state, so a test can keep
/// one handle to inspect `calls()` after handing another to the pipeline.
#[derive(Clone, Default)]
pub struct MockFetcher {
    state: Arc<Mutex<MockWeb>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer probes of `url` with `probe`
    pub fn with_probe(self, url: &str, probe: ProbeResponse) -> Self {
        lock(&self.state).probes.insert(url.to_string(), probe);
        self
    }

    /// HEAD requests to `url` fail at the transport level
    pub fn with_failing_head(self, url: &str) -> Self {
        lock(&self.state).failing_heads.insert(url.to_string());
        self
    }

    /// Serve `body` as an HTML page
    pub fn with_page(self, url: &str, body: &str) -> Self {
        lock(&self.state)
            .pages
            .insert(url.to_string(), body.to_string());
        self
    }

    /// Serve `bytes` as a PDF download
    pub fn with_file(self, url: &str, bytes: Vec<u8>) -> Self {
        lock(&self.state).files.insert(url.to_string(), bytes);
        self
    }

    /// Page and download requests for `url` get an HTTP error status
    pub fn with_status(self, url: &str, status: u16) -> Self {
        lock(&self.state).statuses.insert(url.to_string(), status);
        self
    }

    /// Every request made so far, e.g. `"HEAD https://..."`
    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }

    fn record(&self, method: &str, url: &str) -> MutexGuard<'_, MockWeb> {
        let mut state = lock(&self.state);
        state.calls.push(format!("{} {}", method, url));
        state
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn probe_head(&self, url: &str) -> Result<ProbeResponse, FetchError> {
        let state = self.record("HEAD", url);
        if state.failing_heads.contains(url) {
            return Err(unreachable_host(url));
        }
        state.probe(url)
    }

    async fn probe_get(&self, url: &str) -> Result<ProbeResponse, FetchError> {
        self.record("PROBE-GET", url).probe(url)
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let state = self.record("GET", url);
        if let Some(status) = state.statuses.get(url) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: *status,
            });
        }
        state
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| unreachable_host(url))
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let bytes = {
            let state = self.record("DOWNLOAD", url);
            if let Some(status) = state.statuses.get(url) {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: *status,
                });
            }
            state
                .files
                .get(url)
                .cloned()
                .ok_or_else(|| unreachable_host(url))?
        };

        tokio::fs::write(dest, &bytes).await?;
        Ok(bytes.len() as u64)
    }
}

/// Scripted AI capability. Steps without a scripted reply fail.
#[derive(Clone, Default)]
pub struct MockAi {
    summary: Option<String>,
    keywords: Option<Vec<String>>,
    rewrite: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl MockAi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails, as if the service were down
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn with_summary(mut self, summary: &str) -> Self {
        self.summary = Some(summary.to_string());
        self
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = Some(keywords.iter().map(|k| k.to_string()).collect());
        self
    }

    pub fn with_rewrite(mut self, rewrite: &str) -> Self {
        self.rewrite = Some(rewrite.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AiCapability for MockAi {
    async fn summarize(&self, _text: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.summary {
            Some(summary) => Ok(summary.clone()),
            None => bail!("summarize unavailable"),
        }
    }

    async fn derive_keywords(&self, _title: &str) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.keywords {
            Some(keywords) => Ok(keywords.clone()),
            None => bail!("keywords unavailable"),
        }
    }

    async fn rewrite(&self, _summary: &str, _keywords: &[String]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.rewrite {
            Some(rewrite) => Ok(rewrite.clone()),
            None => bail!("rewrite unavailable"),
        }
    }
}

/// Observer that keeps everything it is told
#[derive(Default)]
pub struct RecordingObserver {
    progress: Mutex<Vec<u8>>,
    logs: Mutex<Vec<String>>,
    transitions: Mutex<Vec<(usize, String, Status)>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self) -> Vec<u8> {
        lock(&self.progress).clone()
    }

    pub fn logs(&self) -> Vec<String> {
        lock(&self.logs).clone()
    }

    pub fn transitions(&self) -> Vec<(usize, String, Status)> {
        lock(&self.transitions).clone()
    }

    /// Statuses announced for one record, in order
    pub fn statuses_for(&self, index: usize) -> Vec<Status> {
        lock(&self.transitions)
            .iter()
            .filter(|(i, _, _)| *i == index)
            .map(|(_, _, status)| *status)
            .collect()
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_progress(&self, percent: u8) {
        lock(&self.progress).push(percent);
    }

    fn on_log(&self, line: &str) {
        lock(&self.logs).push(line.to_string());
    }

    fn on_transition(&self, index: usize, source: &str, status: Status) {
        lock(&self.transitions).push((index, source.to_string(), status));
    }
}

/// A small HTML page with the body inside `<article>`
pub fn article_html(title: &str, body: &str) -> String {
    format!(
        "<html><head><title>{}</title></head><body><nav>Menu</nav><article><p>{}</p></article></body></html>",
        title, body
    )
}

/// A video watch page carrying player data. `tracks` becomes the caption
/// track list; `None` leaves the captions block out entirely.
pub fn watch_page(title: Option<&str>, tracks: Option<serde_json::Value>) -> String {
    let mut player = serde_json::json!({
        "playabilityStatus": { "status": "OK" },
        "videoDetails": { "videoId": "abc123" },
    });
    if let Some(tracks) = tracks {
        player["captions"] = serde_json::json!({
            "playerCaptionsTracklistRenderer": { "captionTracks": tracks }
        });
    }

    let meta = title
        .map(|t| format!(r#"<meta property="og:title" content="{}">"#, t))
        .unwrap_or_default();

    format!(
        "<html><head>{}</head><body><script>var ytInitialPlayerResponse = {};var meta = {{}};</script></body></html>",
        meta, player
    )
}

/// Timed-text caption XML. Text is inserted as given, so callers control
/// any escaping.
pub fn timed_text_xml(segments: &[(f64, &str)]) -> String {
    let body: String = segments
        .iter()
        .map(|(start, text)| format!(r#"<text start="{}" dur="1.5">{}</text>"#, start, text))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="utf-8" ?><transcript>{}</transcript>"#,
        body
    )
}

/// A minimal PDF with one text line per page and an optional `/Title`
pub fn sample_pdf(title: Option<&str>, pages: &[&str]) -> lopdf::Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if let Some(title) = title {
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(title),
        });
        doc.trailer.set("Info", info_id);
    }

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

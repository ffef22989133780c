use async_trait::async_trait;
use lopdf::{Document, Object};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use url::Url;

use super::Extractor;
use crate::classifier::DOCUMENT_EXTENSION;
use crate::error::AgentError;
use crate::fetch::Fetcher;
use crate::models::ExtractedContent;

/// A document written to the staging directory by phase A
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedDocument {
    /// Where the bytes landed; may carry a collision suffix
    pub path: PathBuf,
    /// Name derived from the source URL, used for the fallback title
    pub file_name: String,
}

/// Two-phase PDF extractor: `download` is I/O bound and `parse` is CPU
/// bound, so the pipeline runs every download before any parse.
pub struct DocumentExtractor {
    fetcher: Arc<dyn Fetcher>,
    staging_dir: PathBuf,
    // Files written during the current batch; a second URL with the same
    // name gets a numbered suffix instead of overwriting a file not yet
    // parsed.
    claimed: Mutex<HashSet<PathBuf>>,
}

impl DocumentExtractor {
    pub fn new(fetcher: Arc<dyn Fetcher>, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            staging_dir: staging_dir.into(),
            claimed: Mutex::new(HashSet::new()),
        }
    }

    /// Forget the staging paths handed out so far. Called once per batch;
    /// files of earlier batches are already parsed and may be overwritten.
    pub fn start_batch(&self) {
        self.claimed.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Phase A: stream the resource into the staging directory.
    pub async fn download(&self, url: &str) -> Result<StagedDocument, AgentError> {
        let file_name = staging_file_name(url);
        let path = self.claim_path(&file_name);

        match self.fetcher.download(url, &path).await {
            Ok(bytes) => {
                debug!(url, bytes, path = %path.display(), "document downloaded");
                Ok(StagedDocument { path, file_name })
            }
            Err(e) => {
                // Don't leave a truncated file behind
                let _ = tokio::fs::remove_file(&path).await;
                Err(AgentError::DownloadFailed(e.to_string()))
            }
        }
    }

    /// Phase B: read a staged file on a blocking worker.
    pub async fn parse(&self, staged: &StagedDocument) -> Result<ExtractedContent, AgentError> {
        let staged = staged.clone();
        tokio::task::spawn_blocking(move || parse_local(&staged.path, &staged.file_name))
            .await
            .map_err(|e| AgentError::ParseFailed(format!("parser task failed: {}", e)))?
    }

    fn claim_path(&self, file_name: &str) -> PathBuf {
        let mut claimed = self.claimed.lock().unwrap_or_else(|e| e.into_inner());

        let candidate = self.staging_dir.join(file_name);
        if claimed.insert(candidate.clone()) {
            return candidate;
        }

        let stem = file_name
            .strip_suffix(&format!(".{}", DOCUMENT_EXTENSION))
            .unwrap_or(file_name);
        let mut counter = 1;
        loop {
            let candidate = self
                .staging_dir
                .join(format!("{}-{}.{}", stem, counter, DOCUMENT_EXTENSION));
            if claimed.insert(candidate.clone()) {
                return candidate;
            }
            counter += 1;
        }
    }
}

#[async_trait]
impl Extractor for DocumentExtractor {
    async fn extract(&self, source: &str) -> Result<ExtractedContent, AgentError> {
        let staged = self.download(source).await?;
        self.parse(&staged).await
    }
}

/// Local file name for a document URL: the decoded last path segment,
/// with the document extension appended when missing.
pub fn staging_file_name(url: &str) -> String {
    let last_segment = Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .unwrap_or_default();

    let decoded = urlencoding::decode(&last_segment)
        .map(|s| s.into_owned())
        .unwrap_or(last_segment);

    let cleaned: String = decoded
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim();

    let mut name = if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "document".to_string()
    } else {
        cleaned.to_string()
    };

    let suffix = format!(".{}", DOCUMENT_EXTENSION);
    if !name.to_lowercase().ends_with(&suffix) {
        name.push_str(&suffix);
    }
    name
}

/// `my_great-paper.pdf` -> `my great paper`
pub fn title_from_file_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().replace(['_', '-'], " "))
        .map(|title| title.trim().to_string())
        .unwrap_or_default()
}

fn parse_local(path: &Path, file_name: &str) -> Result<ExtractedContent, AgentError> {
    let document = Document::load(path)
        .map_err(|e| AgentError::ParseFailed(format!("{}: {}", path.display(), e)))?;

    let title =
        metadata_title(&document).unwrap_or_else(|| title_from_file_name(Path::new(file_name)));

    let pages = document.get_pages();
    let mut texts = Vec::with_capacity(pages.len());
    let mut failures = 0;
    for page_number in pages.keys() {
        match document.extract_text(&[*page_number]) {
            Ok(text) => texts.push(text.trim_end().to_string()),
            Err(e) => {
                warn!(path = %path.display(), page = page_number, error = %e, "page text extraction failed");
                failures += 1;
            }
        }
    }

    if !pages.is_empty() && failures == pages.len() {
        return Err(AgentError::ParseFailed(format!(
            "{}: no page could be read",
            path.display()
        )));
    }

    Ok(ExtractedContent {
        title,
        text: texts.join("\n"),
    })
}

fn metadata_title(document: &Document) -> Option<String> {
    let info = document.trailer.get(b"Info").ok()?;
    let (_, info) = document.dereference(info).ok()?;
    let title = info.as_dict().ok()?.get(b"Title").ok()?;
    let (_, title) = document.dereference(title).ok()?;

    let decoded = match title {
        Object::String(bytes, _) => decode_text_string(bytes),
        _ => return None,
    };
    let decoded = decoded.trim();
    (!decoded.is_empty()).then(|| decoded.to_string())
}

/// PDF text strings are UTF-16BE with a BOM, UTF-8 with a BOM, or
/// PDFDocEncoding (treated as Latin-1).
fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE_u8, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(utf8) = bytes.strip_prefix(&[0xEF_u8, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(utf8).into_owned();
    }
    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_pdf, MockFetcher};

    fn staged(dir: &Path, file_name: &str, bytes: &[u8]) -> StagedDocument {
        let path = dir.join(file_name);
        std::fs::write(&path, bytes).unwrap();
        StagedDocument {
            path,
            file_name: file_name.to_string(),
        }
    }

    #[test]
    fn test_staging_file_name() {
        assert_eq!(staging_file_name("https://site.org/paper.pdf"), "paper.pdf");
        assert_eq!(staging_file_name("https://site.org/PAPER.PDF"), "PAPER.PDF");
        assert_eq!(
            staging_file_name("https://arxiv.org/pdf/2305.15334"),
            "2305.15334.pdf"
        );
        assert_eq!(
            staging_file_name("https://site.org/docs/my%20report.pdf?x=1"),
            "my report.pdf"
        );
        assert_eq!(staging_file_name("https://site.org/"), "document.pdf");
    }

    #[test]
    fn test_title_from_file_name() {
        assert_eq!(
            title_from_file_name(Path::new("/tmp/my_great-paper.pdf")),
            "my great paper"
        );
    }

    #[test]
    fn test_decode_text_string() {
        assert_eq!(decode_text_string(b"Plain"), "Plain");
        assert_eq!(
            decode_text_string(&[0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69]),
            "Hi"
        );
    }

    #[tokio::test]
    async fn test_parse_uses_metadata_title() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = sample_pdf(Some("Attention Is All You Need"), &["Hello"]).unwrap();
        let doc = staged(dir.path(), "paper.pdf", &pdf);

        let extractor = DocumentExtractor::new(Arc::new(MockFetcher::new()), dir.path());
        let content = extractor.parse(&doc).await.unwrap();

        assert_eq!(content.title, "Attention Is All You Need");
        assert!(content.text.contains("Hello"));
    }

    #[tokio::test]
    async fn test_parse_without_metadata_title_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = sample_pdf(None, &["Page one", "Page two"]).unwrap();
        let doc = staged(dir.path(), "quarterly_results-2024.pdf", &pdf);

        let extractor = DocumentExtractor::new(Arc::new(MockFetcher::new()), dir.path());
        let content = extractor.parse(&doc).await.unwrap();

        assert_eq!(content.title, "quarterly results 2024");
        let one = content.text.find("Page one").unwrap();
        let two = content.text.find("Page two").unwrap();
        assert!(one < two);
    }

    #[tokio::test]
    async fn test_fallback_title_ignores_collision_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = sample_pdf(None, &["Body"]).unwrap();
        let mut doc = staged(dir.path(), "paper-1.pdf", &pdf);
        doc.file_name = "paper.pdf".to_string();

        let extractor = DocumentExtractor::new(Arc::new(MockFetcher::new()), dir.path());
        let content = extractor.parse(&doc).await.unwrap();

        assert_eq!(content.title, "paper");
    }

    #[tokio::test]
    async fn test_parse_garbage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let doc = staged(dir.path(), "broken.pdf", b"this is not a pdf");

        let extractor = DocumentExtractor::new(Arc::new(MockFetcher::new()), dir.path());
        let err = extractor.parse(&doc).await.unwrap_err();

        assert!(matches!(err, AgentError::ParseFailed(_)));
    }

    #[tokio::test]
    async fn test_download_failure() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MockFetcher::new().with_status("https://site.org/paper.pdf", 404);
        let extractor = DocumentExtractor::new(Arc::new(fetcher), dir.path());

        let err = extractor
            .download("https://site.org/paper.pdf")
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::DownloadFailed(_)));
        assert!(!dir.path().join("paper.pdf").exists());
    }

    #[tokio::test]
    async fn test_same_file_name_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MockFetcher::new()
            .with_file("https://a.org/paper.pdf", b"first".to_vec())
            .with_file("https://b.org/paper.pdf", b"second".to_vec());
        let extractor = DocumentExtractor::new(Arc::new(fetcher), dir.path());

        let first = extractor.download("https://a.org/paper.pdf").await.unwrap();
        let second = extractor.download("https://b.org/paper.pdf").await.unwrap();

        assert_eq!(first.path, dir.path().join("paper.pdf"));
        assert_eq!(second.path, dir.path().join("paper-1.pdf"));
        assert_eq!(first.file_name, "paper.pdf");
        assert_eq!(second.file_name, "paper.pdf");
        assert_eq!(std::fs::read(&first.path).unwrap(), b"first");
        assert_eq!(std::fs::read(&second.path).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_start_batch_releases_staging_names() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MockFetcher::new().with_file("https://a.org/paper.pdf", b"pdf".to_vec());
        let extractor = DocumentExtractor::new(Arc::new(fetcher), dir.path());

        extractor.download("https://a.org/paper.pdf").await.unwrap();
        extractor.start_batch();
        let again = extractor.download("https://a.org/paper.pdf").await.unwrap();

        assert_eq!(again.path, dir.path().join("paper.pdf"));
    }

    #[tokio::test]
    async fn test_single_call_extract() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MockFetcher::new().with_file(
            "https://site.org/white_paper.pdf",
            sample_pdf(None, &["Body"]).unwrap(),
        );
        let extractor = DocumentExtractor::new(Arc::new(fetcher), dir.path());

        let content = extractor
            .extract("https://site.org/white_paper.pdf")
            .await
            .unwrap();

        assert_eq!(content.title, "white paper");
        assert!(content.text.contains("Body"));
    }

    #[tokio::test]
    async fn test_extract_same_source_twice_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MockFetcher::new().with_file(
            "https://site.org/paper.pdf",
            sample_pdf(None, &["Same body"]).unwrap(),
        );
        let extractor = DocumentExtractor::new(Arc::new(fetcher), dir.path());

        let first = extractor.extract("https://site.org/paper.pdf").await.unwrap();
        let second = extractor.extract("https://site.org/paper.pdf").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.title, "paper");
    }
}

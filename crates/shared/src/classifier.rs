use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::fetch::{Fetcher, ProbeResponse};
use crate::models::ContentType;

pub const DOCUMENT_EXTENSION: &str = "pdf";

/// Pull the video id out of a `youtube.com/watch?v=<id>` or
/// `youtu.be/<id>` URL.
pub fn video_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();

    if host == "youtube.com" || host.ends_with(".youtube.com") {
        return parsed
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.trim().to_string())
            .filter(|id| !id.is_empty());
    }

    if host == "youtu.be" || host == "www.youtu.be" {
        return parsed
            .path_segments()?
            .next()
            .map(|segment| segment.trim().to_string())
            .filter(|id| !id.is_empty());
    }

    None
}

/// True when the URL path ends in the document extension
pub fn has_document_extension(url: &str) -> bool {
    let suffix = format!(".{}", DOCUMENT_EXTENSION);
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_lowercase().ends_with(&suffix),
        Err(_) => url.to_lowercase().ends_with(&suffix),
    }
}

pub struct SourceClassifier {
    fetcher: Arc<dyn Fetcher>,
}

impl SourceClassifier {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Decide a URL's content type. URL shape wins over probing; only two
    /// failed probes give `Unknown`.
    pub async fn classify(&self, url: &str) -> ContentType {
        if video_id(url).is_some() {
            return ContentType::Video;
        }
        if has_document_extension(url) {
            return ContentType::Document;
        }

        // Nothing to probe
        if Url::parse(url).is_err() {
            warn!(url, "not a valid URL");
            return ContentType::Unknown;
        }

        match self.probe(url).await {
            Some(probe) if probe.is_pdf() => ContentType::Document,
            Some(_) => ContentType::WebPage,
            None => ContentType::Unknown,
        }
    }

    async fn probe(&self, url: &str) -> Option<ProbeResponse> {
        match self.fetcher.probe_head(url).await {
            Ok(probe) => return Some(probe),
            Err(e) => debug!(url, error = %e, "HEAD probe failed, retrying with GET"),
        }

        match self.fetcher.probe_get(url).await {
            Ok(probe) => Some(probe),
            Err(e) => {
                warn!(url, error = %e, "both probes failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFetcher;

    fn classifier(fetcher: MockFetcher) -> SourceClassifier {
        SourceClassifier::new(Arc::new(fetcher))
    }

    #[test]
    fn test_video_id_watch_shape() {
        assert_eq!(
            video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            video_id("https://m.youtube.com/watch?feature=share&v=abc"),
            Some("abc".to_string())
        );
    }

    #[test]
    fn test_video_id_short_shape() {
        assert_eq!(video_id("https://youtu.be/abc123"), Some("abc123".to_string()));
        assert_eq!(
            video_id("https://youtu.be/abc123?t=42"),
            Some("abc123".to_string())
        );
    }

    #[test]
    fn test_video_id_rejects_other_shapes() {
        assert_eq!(video_id("https://www.youtube.com/watch"), None);
        assert_eq!(video_id("https://youtu.be/"), None);
        assert_eq!(video_id("https://example.com/watch?v=abc"), None);
        assert_eq!(video_id("not-a-url"), None);
    }

    #[test]
    fn test_document_extension_ignores_case_and_query() {
        assert!(has_document_extension("https://site.org/paper.pdf"));
        assert!(has_document_extension("https://site.org/PAPER.PDF?dl=1"));
        assert!(!has_document_extension("https://site.org/pdf/paper"));
    }

    #[tokio::test]
    async fn test_video_shape_wins_without_probing() {
        let fetcher = MockFetcher::new();
        let classifier = classifier(fetcher.clone());

        let kind = classifier.classify("https://youtu.be/abc123").await;

        assert_eq!(kind, ContentType::Video);
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_probe_content_type_detects_pdf() {
        let fetcher = MockFetcher::new().with_probe(
            "https://arxiv.org/pdf/2305.15334",
            ProbeResponse::new(200, Some("application/pdf")),
        );

        let kind = classifier(fetcher)
            .classify("https://arxiv.org/pdf/2305.15334")
            .await;
        assert_eq!(kind, ContentType::Document);
    }

    #[tokio::test]
    async fn test_head_failure_falls_back_to_get() {
        let fetcher = MockFetcher::new()
            .with_failing_head("https://example.com/report")
            .with_probe(
                "https://example.com/report",
                ProbeResponse::new(200, Some("application/pdf")),
            );

        let kind = classifier(fetcher.clone())
            .classify("https://example.com/report")
            .await;

        assert_eq!(kind, ContentType::Document);
        assert_eq!(
            fetcher.calls(),
            vec![
                "HEAD https://example.com/report".to_string(),
                "PROBE-GET https://example.com/report".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_http_error_status_still_means_web_page() {
        let fetcher = MockFetcher::new().with_probe(
            "https://example.com/article",
            ProbeResponse::new(405, None),
        );

        let kind = classifier(fetcher)
            .classify("https://example.com/article")
            .await;
        assert_eq!(kind, ContentType::WebPage);
    }

    #[tokio::test]
    async fn test_unreachable_and_invalid_urls_are_unknown() {
        let classifier = classifier(MockFetcher::new());

        assert_eq!(
            classifier.classify("https://unreachable.example").await,
            ContentType::Unknown
        );
        assert_eq!(classifier.classify("not-a-url").await, ContentType::Unknown);
    }
}

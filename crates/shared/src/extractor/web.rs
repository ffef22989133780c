use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tracing::debug;

use super::Extractor;
use crate::error::AgentError;
use crate::fetch::Fetcher;
use crate::models::ExtractedContent;

/// Title used when a page has no `<title>`
pub const NO_TITLE: &str = "No Title Found";

/// Main-content candidates, first match wins
const CONTENT_SELECTORS: [&str; 4] = ["article", "main", "div.content", "div#content"];

/// Elements whose text never counts as page content
const SKIPPED_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

pub struct WebPageExtractor {
    fetcher: Arc<dyn Fetcher>,
}

impl WebPageExtractor {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    pub fn parse_page(html: &str) -> ExtractedContent {
        let document = Html::parse_document(html);

        let title = Self::extract_title(&document).unwrap_or_else(|| NO_TITLE.to_string());
        let root = Self::content_root(&document);

        ExtractedContent {
            title,
            text: flatten_text(root),
        }
    }

    fn extract_title(document: &Html) -> Option<String> {
        let title_selector = Selector::parse("title").ok()?;
        document
            .select(&title_selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    }

    fn content_root(document: &Html) -> ElementRef<'_> {
        for selector_str in CONTENT_SELECTORS {
            if let Ok(selector) = Selector::parse(selector_str) {
                if let Some(element) = document.select(&selector).next() {
                    debug!(selector = selector_str, "main content container found");
                    return element;
                }
            }
        }

        // Last resort: the whole page
        document.root_element()
    }
}

#[async_trait]
impl Extractor for WebPageExtractor {
    async fn extract(&self, source: &str) -> Result<ExtractedContent, AgentError> {
        let html = self
            .fetcher
            .get_text(source)
            .await
            .map_err(|e| AgentError::Unreachable(e.to_string()))?;

        Ok(Self::parse_page(&html))
    }
}

/// Visible text of `root`, one trimmed text node per line.
fn flatten_text(root: ElementRef<'_>) -> String {
    root.descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
            });
            if hidden {
                return None;
            }
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFetcher;

    #[test]
    fn test_prefers_article_over_main() {
        let html = r#"<html><head><title> My Post </title></head><body>
            <nav>Home</nav>
            <main><p>Main text</p><article><h1>Headline</h1><p>First   paragraph.</p></article></main>
        </body></html>"#;

        let content = WebPageExtractor::parse_page(html);

        assert_eq!(content.title, "My Post");
        assert_eq!(content.text, "Headline\nFirst   paragraph.");
    }

    #[test]
    fn test_falls_back_to_main() {
        let html = "<html><body><div>Menu</div><main><p>Body</p></main></body></html>";
        assert_eq!(WebPageExtractor::parse_page(html).text, "Body");
    }

    #[test]
    fn test_falls_back_to_content_class_then_id() {
        let by_class =
            r#"<html><body><div>Menu</div><div class="content"><p>By class</p></div></body></html>"#;
        assert_eq!(WebPageExtractor::parse_page(by_class).text, "By class");

        let by_id = r#"<html><body><div>Menu</div><div id="content"><p>By id</p></div></body></html>"#;
        assert_eq!(WebPageExtractor::parse_page(by_id).text, "By id");
    }

    #[test]
    fn test_whole_page_fallback_skips_scripts() {
        let html = r#"<html><head><title>T</title><style>p { color: red }</style></head>
            <body><script>var x = 1;</script><p>Alpha</p><div><span>Beta</span></div></body></html>"#;

        let content = WebPageExtractor::parse_page(html);

        assert_eq!(content.text, "T\nAlpha\nBeta");
    }

    #[test]
    fn test_missing_title_uses_sentinel() {
        let html = "<html><body><article>Text</article></body></html>";
        assert_eq!(WebPageExtractor::parse_page(html).title, NO_TITLE);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let html = "<html><head><title>Same</title></head><body><main><p>a</p><p>b</p></main></body></html>";
        assert_eq!(
            WebPageExtractor::parse_page(html),
            WebPageExtractor::parse_page(html)
        );
    }

    #[tokio::test]
    async fn test_http_error_is_unreachable() {
        let fetcher = MockFetcher::new().with_status("https://example.com/gone", 404);
        let extractor = WebPageExtractor::new(Arc::new(fetcher));

        let err = extractor
            .extract("https://example.com/gone")
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Unreachable(_)));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_extract_fetches_and_parses() {
        let fetcher = MockFetcher::new().with_page(
            "https://example.com/article",
            "<html><head><title>News</title></head><body><article>Story</article></body></html>",
        );
        let extractor = WebPageExtractor::new(Arc::new(fetcher));

        let content = extractor.extract("https://example.com/article").await.unwrap();

        assert_eq!(content, ExtractedContent::new("News", "Story"));
    }

    #[tokio::test]
    async fn test_extracting_same_page_twice_is_stable() {
        let fetcher = MockFetcher::new().with_page(
            "https://example.com/article",
            "<html><head><title>News</title></head><body><main><p>One</p>\n  <p>Two</p></main></body></html>",
        );
        let extractor = WebPageExtractor::new(Arc::new(fetcher));

        let first = extractor.extract("https://example.com/article").await.unwrap();
        let second = extractor.extract("https://example.com/article").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.text, "One\nTwo");
    }
}

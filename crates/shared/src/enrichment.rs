use std::sync::Arc;
use tracing::warn;

use crate::ai::{AiCapability, MAX_KEYWORDS};
use crate::models::Enrichment;

/// Words kept by the fallback summary
pub const SUMMARY_WORDS: usize = 60;

/// Characters removed from rewritten summaries
const MARKUP_CHARS: [char; 8] = ['*', '_', '`', '#', '[', ']', '(', ')'];

/// Summarize, derive keywords, rewrite. Never fails: a missing or failing
/// AI capability yields locally computed results instead.
pub struct Enricher {
    ai: Option<Arc<dyn AiCapability>>,
}

impl Enricher {
    pub fn new(ai: Option<Arc<dyn AiCapability>>) -> Self {
        Self { ai }
    }

    pub fn has_ai(&self) -> bool {
        self.ai.is_some()
    }

    pub async fn enrich(&self, title: &str, raw_text: String) -> Enrichment {
        let (summary, summary_ok) = self.summarize(&raw_text).await;
        drop(raw_text);

        let (keywords, keywords_ok) = self.derive_keywords(title).await;
        let (final_summary, rewrite_ok) = self.rewrite(&summary, &keywords).await;

        Enrichment {
            summary,
            keywords,
            final_summary,
            degraded: !(summary_ok && keywords_ok && rewrite_ok),
        }
    }

    async fn summarize(&self, text: &str) -> (String, bool) {
        if let Some(ai) = &self.ai {
            match ai.summarize(text).await {
                Ok(summary) if !summary.trim().is_empty() => {
                    return (summary.trim().to_string(), true)
                }
                Ok(_) => warn!("AI summary was empty, using truncation"),
                Err(e) => warn!(error = %e, "AI summary failed, using truncation"),
            }
        }
        (fallback_summary(text), false)
    }

    async fn derive_keywords(&self, title: &str) -> (Vec<String>, bool) {
        if let Some(ai) = &self.ai {
            match ai.derive_keywords(title).await {
                Ok(keywords) if !keywords.is_empty() => return (keywords, true),
                Ok(_) => warn!(title, "AI returned no keywords, using title words"),
                Err(e) => warn!(title, error = %e, "AI keywords failed, using title words"),
            }
        }
        (fallback_keywords(title), false)
    }

    async fn rewrite(&self, summary: &str, keywords: &[String]) -> (String, bool) {
        if let Some(ai) = &self.ai {
            match ai.rewrite(summary, keywords).await {
                Ok(text) => {
                    let cleaned = strip_markup(&text);
                    if !cleaned.is_empty() {
                        return (cleaned, true);
                    }
                    warn!("AI rewrite was empty after cleanup, appending keywords");
                }
                Err(e) => warn!(error = %e, "AI rewrite failed, appending keywords"),
            }
        }
        (fallback_rewrite(summary, keywords), false)
    }
}

/// Leading words of the text followed by an ellipsis
pub fn fallback_summary(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().take(SUMMARY_WORDS).collect();
    format!("{}...", words.join(" "))
}

/// First few words of the title, lower-cased
pub fn fallback_keywords(title: &str) -> Vec<String> {
    title
        .split_whitespace()
        .take(MAX_KEYWORDS)
        .map(str::to_lowercase)
        .collect()
}

pub fn fallback_rewrite(summary: &str, keywords: &[String]) -> String {
    format!("{} (Keywords: {})", summary, keywords.join(", "))
}

pub fn strip_markup(text: &str) -> String {
    text.chars()
        .filter(|c| !MARKUP_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockAi;

    #[test]
    fn test_fallback_summary_truncates_to_leading_words() {
        let text = (1..=100).map(|n| n.to_string()).collect::<Vec<_>>().join(" ");
        let summary = fallback_summary(&text);

        assert!(summary.starts_with("1 2 3"));
        assert!(summary.ends_with("59 60..."));
        assert_eq!(summary.split_whitespace().count(), SUMMARY_WORDS);
    }

    #[test]
    fn test_fallback_summary_of_empty_text_is_not_empty() {
        assert_eq!(fallback_summary(""), "...");
    }

    #[test]
    fn test_fallback_keywords() {
        assert_eq!(
            fallback_keywords("Google Gemini AI Is Here Today Finally"),
            vec!["google", "gemini", "ai", "is", "here"]
        );
    }

    #[test]
    fn test_fallback_rewrite() {
        let keywords = vec!["rust".to_string(), "tokio".to_string()];
        assert_eq!(
            fallback_rewrite("A summary.", &keywords),
            "A summary. (Keywords: rust, tokio)"
        );
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(
            strip_markup("  **Bold** _claim_ about `code` [link](url) # "),
            "Bold claim about code linkurl"
        );
    }

    #[tokio::test]
    async fn test_without_ai_everything_degrades() {
        let enricher = Enricher::new(None);

        let enrichment = enricher
            .enrich("Rust Async Book", "Futures are lazy state machines.".to_string())
            .await;

        assert!(enrichment.degraded);
        assert_eq!(enrichment.summary, "Futures are lazy state machines....");
        assert_eq!(enrichment.keywords, vec!["rust", "async", "book"]);
        assert_eq!(
            enrichment.final_summary,
            "Futures are lazy state machines.... (Keywords: rust, async, book)"
        );
    }

    #[tokio::test]
    async fn test_ai_results_are_used_and_cleaned() {
        let ai = MockAi::new()
            .with_summary("A concise summary.")
            .with_keywords(&["async", "rust"])
            .with_rewrite("**A concise** summary about async rust.");
        let enricher = Enricher::new(Some(Arc::new(ai)));

        let enrichment = enricher.enrich("Title", "long text".to_string()).await;

        assert!(!enrichment.degraded);
        assert_eq!(enrichment.summary, "A concise summary.");
        assert_eq!(enrichment.keywords, vec!["async", "rust"]);
        assert_eq!(enrichment.final_summary, "A concise summary about async rust.");
    }

    #[tokio::test]
    async fn test_failing_ai_degrades_each_step() {
        let ai = MockAi::failing();
        let enricher = Enricher::new(Some(Arc::new(ai.clone())));

        let enrichment = enricher.enrich("Some Title", "body words".to_string()).await;

        assert!(enrichment.degraded);
        assert_eq!(enrichment.summary, "body words...");
        assert_eq!(enrichment.keywords, vec!["some", "title"]);
        assert_eq!(
            enrichment.final_summary,
            "body words... (Keywords: some, title)"
        );
        assert_eq!(ai.call_count(), 3);
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Maximum keywords kept from a model reply
pub const MAX_KEYWORDS: usize = 5;

const MAX_INPUT_BYTES: usize = 10_000;
const MAX_ATTEMPTS: u32 = 3;

/// Text-generation capability used by enrichment. Every call may fail;
/// callers degrade instead of propagating.
#[async_trait]
pub trait AiCapability: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String>;

    async fn derive_keywords(&self, title: &str) -> Result<Vec<String>>;

    async fn rewrite(&self, summary: &str, keywords: &[String]) -> Result<String>;
}

#[derive(Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<Content>,
}

#[derive(Deserialize)]
struct Content {
    text: String,
}

pub struct ClaudeClient {
    client: Client,
    api_key: String,
    model: String,
}

impl ClaudeClient {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    async fn complete(&self, prompt: String, max_tokens: u32) -> Result<String> {
        let mut last_error = None;

        for attempt in 0..MAX_ATTEMPTS {
            match self.try_complete(&prompt, max_tokens).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    let is_rate_limit = e.to_string().contains("rate_limit");

                    if attempt + 1 < MAX_ATTEMPTS {
                        // Longer backoff for rate limits
                        let backoff = if is_rate_limit {
                            std::time::Duration::from_secs(15 * (attempt as u64 + 1))
                        } else {
                            std::time::Duration::from_millis(1000 * 2_u64.pow(attempt))
                        };
                        warn!(attempt, ?backoff, error = %e, "Claude request failed, retrying");
                        tokio::time::sleep(backoff).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Max retries reached")))
    }

    async fn try_complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = ClaudeRequest {
            model: self.model.clone(),
            max_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Claude API")?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            anyhow::bail!("Claude API error: {}", error_text);
        }

        let claude_response = response
            .json::<ClaudeResponse>()
            .await
            .context("Failed to parse Claude API response")?;

        let text = claude_response
            .content
            .first()
            .map(|c| c.text.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            anyhow::bail!("Claude API returned an empty reply");
        }
        Ok(text)
    }
}

#[async_trait]
impl AiCapability for ClaudeClient {
    async fn summarize(&self, text: &str) -> Result<String> {
        let prompt = format!(
            r#"Summarize the following content in about 60 words.

RULES:
1. Use ONLY information from the content - no external knowledge
2. Write plain prose, a single paragraph
3. Do not use markdown formatting

Content:
{}"#,
            truncate_utf8(text, MAX_INPUT_BYTES)
        );

        self.complete(prompt, 256).await
    }

    async fn derive_keywords(&self, title: &str) -> Result<Vec<String>> {
        let prompt = format!(
            "Give the top {} SEO keywords for \"{}\". Return them as a single comma-separated list and nothing else.",
            MAX_KEYWORDS, title
        );

        let reply = self.complete(prompt, 128).await?;
        let keywords = parse_keyword_list(&reply);
        if keywords.is_empty() {
            anyhow::bail!("No keywords in reply: {}", reply);
        }
        Ok(keywords)
    }

    async fn rewrite(&self, summary: &str, keywords: &[String]) -> Result<String> {
        let prompt = format!(
            "Rewrite the following summary to naturally include these SEO keywords: '{}'.\n\nSummary: '{}'\n\nDo not include any markdown formatting in your response.",
            keywords.join(", "),
            summary
        );

        self.complete(prompt, 384).await
    }
}

/// Cut `text` to at most `max_bytes`, respecting UTF-8 boundaries
pub(crate) fn truncate_utf8(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Split a model reply into keywords: commas or lines, with list markers
/// and numbering removed.
pub(crate) fn parse_keyword_list(reply: &str) -> Vec<String> {
    reply
        .split([',', '\n'])
        .map(|item| strip_list_marker(item).trim_matches('"').trim().to_string())
        .filter(|item| !item.is_empty())
        .take(MAX_KEYWORDS)
        .collect()
}

fn strip_list_marker(item: &str) -> &str {
    let item = item.trim();
    let unnumbered = item.trim_start_matches(|c: char| c.is_ascii_digit());
    let item = if unnumbered.len() < item.len() {
        // "1." and "2)" are numbering, "5G" is a keyword
        unnumbered
            .strip_prefix(['.', ')'])
            .unwrap_or(item)
    } else {
        item
    };
    item.trim_start_matches(['-', '*', '•']).trim()
}

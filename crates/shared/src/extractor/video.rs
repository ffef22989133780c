use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{normalize_whitespace, Extractor};
use crate::classifier::video_id;
use crate::error::AgentError;
use crate::fetch::Fetcher;
use crate::models::ExtractedContent;

pub const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

const PLAYER_RESPONSE_MARKER: &str = "ytInitialPlayerResponse = ";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    language_code: String,
    #[serde(default)]
    kind: Option<String>,
}

impl CaptionTrack {
    fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }

    fn matches(&self, language: &str) -> bool {
        let code = self.language_code.to_lowercase();
        code == language || code.starts_with(&format!("{}-", language))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Segment {
    start: f64,
    text: String,
}

pub struct VideoTranscriptExtractor {
    fetcher: Arc<dyn Fetcher>,
    languages: Vec<String>,
}

impl VideoTranscriptExtractor {
    pub fn new(fetcher: Arc<dyn Fetcher>, languages: Vec<String>) -> Self {
        let languages = if languages.is_empty() {
            vec!["en".to_string()]
        } else {
            languages.into_iter().map(|l| l.to_lowercase()).collect()
        };
        Self { fetcher, languages }
    }

    async fn fetch_transcript(&self, id: &str) -> Result<String, AgentError> {
        let watch_url = format!("{}{}", WATCH_URL, id);
        let page = self
            .fetcher
            .get_text(&watch_url)
            .await
            .map_err(|e| AgentError::Unreachable(format!("Failed to fetch video page: {}", e)))?;

        let tracks = caption_tracks(&page, id)?;
        let track = self
            .pick_track(&tracks)
            .ok_or_else(|| AgentError::NoTranscript(id.to_string()))?;
        debug!(video = id, language = %track.language_code, generated = track.is_generated(), "caption track selected");

        let timed_text = self
            .fetcher
            .get_text(&track.base_url)
            .await
            .map_err(|e| AgentError::Unreachable(format!("Failed to fetch captions: {}", e)))?;

        let mut segments = parse_timed_text(&timed_text);
        if segments.is_empty() {
            return Err(AgentError::NoTranscript(id.to_string()));
        }
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));

        Ok(segments
            .into_iter()
            .map(|segment| segment.text)
            .collect::<Vec<_>>()
            .join(" "))
    }

    /// Preferred languages in order; manual captions beat generated ones.
    fn pick_track<'a>(&self, tracks: &'a [CaptionTrack]) -> Option<&'a CaptionTrack> {
        self.languages.iter().find_map(|language| {
            tracks
                .iter()
                .find(|t| !t.is_generated() && t.matches(language))
                .or_else(|| tracks.iter().find(|t| t.is_generated() && t.matches(language)))
        })
    }

    /// Title from the page metadata. Never fails the extraction.
    async fn fetch_title(&self, source: &str, id: &str) -> String {
        let title = match self.fetcher.get_text(source).await {
            Ok(html) => page_title(&html),
            Err(e) => {
                warn!(video = id, error = %e, "could not fetch video title");
                None
            }
        };
        title.unwrap_or_else(|| format!("Video: {}", id))
    }
}

#[async_trait]
impl Extractor for VideoTranscriptExtractor {
    async fn extract(&self, source: &str) -> Result<ExtractedContent, AgentError> {
        let id = video_id(source).ok_or_else(|| AgentError::InvalidReference(source.to_string()))?;

        let text = self.fetch_transcript(&id).await?;
        let title = self.fetch_title(source, &id).await;

        Ok(ExtractedContent { title, text })
    }
}

fn player_response(page: &str) -> Option<Value> {
    let start = page.find(PLAYER_RESPONSE_MARKER)? + PLAYER_RESPONSE_MARKER.len();
    let json = page[start..].trim_start();
    if !json.starts_with('{') {
        return None;
    }
    // Parse exactly one value and ignore the script that follows it
    serde_json::Deserializer::from_str(json)
        .into_iter::<Value>()
        .next()?
        .ok()
}

fn caption_tracks(page: &str, id: &str) -> Result<Vec<CaptionTrack>, AgentError> {
    let response = player_response(page).ok_or_else(|| {
        AgentError::Unreachable(format!("Video page for {} carries no player data", id))
    })?;

    if let Some(status) = response.pointer("/playabilityStatus/status").and_then(Value::as_str) {
        if status != "OK" {
            let reason = response
                .pointer("/playabilityStatus/reason")
                .and_then(Value::as_str)
                .unwrap_or(status);
            return Err(AgentError::Unreachable(format!(
                "Video {} is unavailable: {}",
                id, reason
            )));
        }
    }

    let tracks = response
        .pointer("/captions/playerCaptionsTracklistRenderer/captionTracks")
        .cloned()
        .ok_or_else(|| AgentError::TranscriptsDisabled(id.to_string()))?;

    let tracks: Vec<CaptionTrack> = serde_json::from_value(tracks)
        .map_err(|_| AgentError::TranscriptsDisabled(id.to_string()))?;
    if tracks.is_empty() {
        return Err(AgentError::TranscriptsDisabled(id.to_string()));
    }

    Ok(tracks)
}

fn parse_timed_text(xml: &str) -> Vec<Segment> {
    let fragment = Html::parse_fragment(xml);
    let Ok(selector) = Selector::parse("text") else {
        return Vec::new();
    };

    fragment
        .select(&selector)
        .filter_map(|element| {
            let start = element
                .value()
                .attr("start")
                .and_then(|s| s.parse::<f64>().ok())
                .unwrap_or(0.0);
            let raw = element.text().collect::<String>();
            let text = normalize_whitespace(&decode_entities(&raw));
            (!text.is_empty()).then_some(Segment { start, text })
        })
        .collect()
}

/// Caption payloads are often escaped twice; the parser undoes one level.
fn decode_entities(text: &str) -> String {
    text.replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn page_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    if let Ok(selector) = Selector::parse(r#"meta[property="og:title"]"#) {
        if let Some(content) = document
            .select(&selector)
            .next()
            .and_then(|meta| meta.value().attr("content"))
        {
            let title = content.trim();
            if !title.is_empty() {
                return Some(title.to_string());
            }
        }
    }

    let selector = Selector::parse("title").ok()?;
    let title = document
        .select(&selector)
        .next()?
        .text()
        .collect::<String>();
    let title = title.trim().trim_end_matches("- YouTube").trim();
    (!title.is_empty()).then(|| title.to_string())
}

//! Network fetch capability.
//!
//! Extractors and the classifier only talk to the network through the
//! [`Fetcher`] trait so that a whole batch can run against canned
//! responses in tests.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::FetchError;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const PAGE_TIMEOUT: Duration = Duration::from_secs(15);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Headers of a probe request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub content_type: Option<String>,
}

impl ProbeResponse {
    pub fn new(status: u16, content_type: Option<&str>) -> Self {
        Self {
            status,
            content_type: content_type.map(|ct| ct.to_lowercase()),
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("application/pdf"))
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Metadata-only request. Errors only on transport failure.
    async fn probe_head(&self, url: &str) -> Result<ProbeResponse, FetchError>;

    /// Full GET whose body is discarded. Errors only on transport failure.
    async fn probe_get(&self, url: &str) -> Result<ProbeResponse, FetchError>;

    /// Fetch a page body; non-success statuses are errors.
    async fn get_text(&self, url: &str) -> Result<String, FetchError>;

    /// Stream a resource into `dest`, returning the bytes written.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> anyhow::Result<Self> {
        use anyhow::Context;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("en-US,en;q=0.5"),
        );

        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    fn probe_from(response: &reqwest::Response) -> ProbeResponse {
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok());
        ProbeResponse::new(response.status().as_u16(), content_type)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn probe_head(&self, url: &str) -> Result<ProbeResponse, FetchError> {
        debug!(url, "HEAD probe");
        let response = self
            .client
            .head(url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        Ok(Self::probe_from(&response))
    }

    async fn probe_get(&self, url: &str) -> Result<ProbeResponse, FetchError> {
        debug!(url, "GET probe");
        // Dropping the response without reading the body closes the stream
        let response = self
            .client
            .get(url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        Ok(Self::probe_from(&response))
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(PAGE_TIMEOUT)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::from_reqwest(url, e))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(url, bytes = written, path = %dest.display(), "download complete");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_detects_pdf_case_insensitively() {
        assert!(ProbeResponse::new(200, Some("Application/PDF")).is_pdf());
        assert!(ProbeResponse::new(200, Some("application/pdf; charset=binary")).is_pdf());
        assert!(!ProbeResponse::new(200, Some("text/html")).is_pdf());
        assert!(!ProbeResponse::new(200, None).is_pdf());
    }
}

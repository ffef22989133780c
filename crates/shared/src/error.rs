use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::models::Status;

/// Tag for every way a record (or the report) can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    ClassificationFailed,
    Unreachable,
    InvalidReference,
    NoTranscript,
    TranscriptsDisabled,
    DownloadFailed,
    ParseFailed,
    WriteFailed,
    StagingUnavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ClassificationFailed => "ClassificationFailed",
            ErrorKind::Unreachable => "Unreachable",
            ErrorKind::InvalidReference => "InvalidReference",
            ErrorKind::NoTranscript => "NoTranscript",
            ErrorKind::TranscriptsDisabled => "TranscriptsDisabled",
            ErrorKind::DownloadFailed => "DownloadFailed",
            ErrorKind::ParseFailed => "ParseFailed",
            ErrorKind::WriteFailed => "WriteFailed",
            ErrorKind::StagingUnavailable => "StagingUnavailable",
        };
        f.write_str(name)
    }
}

/// Errors raised by extraction, report writing and batch setup.
///
/// Extraction variants are fatal to one record only. `StagingUnavailable`
/// is the single error that aborts a batch before any record is touched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("Could not determine content type or URL is unreachable: {0}")]
    ClassificationFailed(String),

    #[error("Failed to fetch page: {0}")]
    Unreachable(String),

    #[error("Invalid video reference: {0}")]
    InvalidReference(String),

    #[error("No transcript found for video {0}")]
    NoTranscript(String),

    #[error("Transcripts are disabled for video {0}")]
    TranscriptsDisabled(String),

    #[error("Failed to download document: {0}")]
    DownloadFailed(String),

    #[error("Failed to extract content from document: {0}")]
    ParseFailed(String),

    #[error("Failed to write report: {0}")]
    WriteFailed(String),

    #[error("Staging directory unavailable: {0}")]
    StagingUnavailable(String),
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::ClassificationFailed(_) => ErrorKind::ClassificationFailed,
            AgentError::Unreachable(_) => ErrorKind::Unreachable,
            AgentError::InvalidReference(_) => ErrorKind::InvalidReference,
            AgentError::NoTranscript(_) => ErrorKind::NoTranscript,
            AgentError::TranscriptsDisabled(_) => ErrorKind::TranscriptsDisabled,
            AgentError::DownloadFailed(_) => ErrorKind::DownloadFailed,
            AgentError::ParseFailed(_) => ErrorKind::ParseFailed,
            AgentError::WriteFailed(_) => ErrorKind::WriteFailed,
            AgentError::StagingUnavailable(_) => ErrorKind::StagingUnavailable,
        }
    }
}

/// Failures surfaced by the network fetch capability.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = err.status() {
            FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

/// A record transition that the state machine does not allow.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("illegal transition for {source_url}: {from:?} -> {to:?}")]
pub struct TransitionError {
    pub source_url: String,
    pub from: Status,
    pub to: Status,
}

use std::path::{Path, PathBuf};

use reqwest::StatusCode;
use segment_crypto::CryptoError;

#[derive(Debug, thiserror::Error)]
pub enum GrabError {
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error("failed to resolve path `{}`: {source}", path.display())]
    PathResolution {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create staging file `{}`: {source}", path.display())]
    StagingCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP request for {url} failed: {source}")]
    Transfer {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request for {url} failed with HTTP {status}")]
    HttpStatus { url: String, status: StatusCode },

    #[error("failed to write `{}`: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to rename `{}` to `{}`: {source}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while {op} `{}`: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("playlist error: {reason}")]
    Playlist { reason: String },

    #[error("no variant with a parseable resolution among {candidates} candidates")]
    NoUsableVariant { candidates: usize },

    #[error("cannot derive base URL from `{url}`: {reason}")]
    BaseUrl { url: String, reason: &'static str },

    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("failed to decrypt `{}`: {source}", path.display())]
    Decryption {
        path: PathBuf,
        #[source]
        source: CryptoError,
    },

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, GrabError>;

impl GrabError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn playlist(reason: impl Into<String>) -> Self {
        Self::Playlist {
            reason: reason.into(),
        }
    }

    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn io(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether re-running the tool may succeed without changing its inputs.
    ///
    /// Transfer and filesystem failures are transient from the operator's
    /// point of view; a re-run only repeats the missing work.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Configuration { .. }
            | Self::PathResolution { .. }
            | Self::Playlist { .. }
            | Self::NoUsableVariant { .. }
            | Self::BaseUrl { .. }
            | Self::InvalidUrl { .. }
            | Self::Decryption { .. } => false,
            Self::HttpStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::StagingCreate { .. }
            | Self::Transfer { .. }
            | Self::Write { .. }
            | Self::Rename { .. }
            | Self::Io { .. }
            | Self::Task(_) => true,
        }
    }
}

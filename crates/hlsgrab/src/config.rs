use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;

use crate::{GrabError, Result};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

/// Media playlist lines starting with this prefix are segment URLs.
pub const DEFAULT_SEGMENT_PREFIX: &str = "https://";

/// Subdirectory of the output directory receiving decrypted segments.
pub const DECRYPTED_DIR_NAME: &str = "decrypted";

/// Configurable options for a grab run
#[derive(Debug, Clone)]
pub struct GrabConfig {
    /// Directory receiving manifests, playlists and segments
    pub output_dir: PathBuf,

    /// Upper bound on in-flight segment downloads (and decryptions)
    pub max_concurrent_downloads: usize,

    /// Prefix identifying segment lines in the media playlist
    pub segment_prefix: String,

    /// User agent string
    pub user_agent: String,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Overall timeout per request. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,

    /// Raw key file used as AES key and IV
    pub key_file: Option<PathBuf>,

    /// Run the decryption pass after downloading
    pub decrypt: bool,
}

impl Default for GrabConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("downloads"),
            max_concurrent_downloads: 8,
            segment_prefix: DEFAULT_SEGMENT_PREFIX.to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            connect_timeout: Duration::from_secs(30),
            request_timeout: None,
            key_file: None,
            decrypt: true,
        }
    }
}

impl GrabConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_downloads == 0 {
            return Err(GrabError::configuration(
                "max_concurrent_downloads must be at least 1",
            ));
        }
        if self.segment_prefix.is_empty() {
            return Err(GrabError::configuration("segment_prefix must not be empty"));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(GrabError::configuration("output_dir must not be empty"));
        }
        Ok(())
    }

    pub fn decrypted_dir(&self) -> PathBuf {
        self.output_dir.join(DECRYPTED_DIR_NAME)
    }

    /// Path of a downloaded artifact named `name`.
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(Path::new(name))
    }

    /// Build the shared HTTP client.
    pub fn build_client(&self) -> Result<Client> {
        let mut builder = Client::builder()
            .user_agent(&self.user_agent)
            .connect_timeout(self.connect_timeout);
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        builder
            .build()
            .map_err(|e| GrabError::configuration(format!("failed to build HTTP client: {e}")))
    }
}

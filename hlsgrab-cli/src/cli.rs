use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use hlsgrab_engine::{DEFAULT_SEGMENT_PREFIX, DEFAULT_USER_AGENT, GrabConfig, LoggerConfig};

/// Grab every segment of the widest variant of an HLS stream and decrypt it
/// with a local AES key.
#[derive(Parser, Debug)]
#[command(name = "hlsgrab", version, about)]
pub struct Args {
    /// Master playlist URL (must carry a query string)
    #[arg(value_name = "MANIFEST_URL")]
    pub manifest_url: String,

    /// Directory receiving playlists and segments
    #[arg(short, long, env = "HLSGRAB_OUTPUT_DIR", default_value = "downloads")]
    pub output_dir: PathBuf,

    /// Raw AES key file, also used as the IV
    #[arg(short, long, env = "HLSGRAB_KEY_FILE")]
    pub key_file: Option<PathBuf>,

    /// Download only, leave segments encrypted
    #[arg(long)]
    pub no_decrypt: bool,

    /// Maximum concurrent segment downloads
    #[arg(short = 'c', long, env = "HLSGRAB_CONCURRENCY", default_value_t = 8)]
    pub concurrency: usize,

    /// Media playlist lines starting with this prefix are segments
    #[arg(long, env = "HLSGRAB_SEGMENT_PREFIX", default_value = DEFAULT_SEGMENT_PREFIX)]
    pub segment_prefix: String,

    /// Append log file [default: <OUTPUT_DIR>/hlsgrab.log]
    #[arg(long, env = "HLSGRAB_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Interval between log file flushes, in milliseconds
    #[arg(long, env = "HLSGRAB_FLUSH_INTERVAL_MS", default_value_t = 1000)]
    pub flush_interval_ms: u64,

    /// Overall timeout per request, in seconds (none by default)
    #[arg(long, env = "HLSGRAB_TIMEOUT")]
    pub timeout: Option<u64>,

    /// User agent sent with every request
    #[arg(long, env = "HLSGRAB_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Exit with status 1 when any segment failed
    #[arg(long)]
    pub strict: bool,

    /// Enable debug output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    pub fn grab_config(&self) -> GrabConfig {
        GrabConfig {
            output_dir: self.output_dir.clone(),
            max_concurrent_downloads: self.concurrency,
            segment_prefix: self.segment_prefix.clone(),
            user_agent: self.user_agent.clone(),
            request_timeout: self.timeout.map(Duration::from_secs),
            key_file: self.key_file.clone(),
            decrypt: !self.no_decrypt,
            ..Default::default()
        }
    }

    pub fn logger_config(&self) -> LoggerConfig {
        LoggerConfig {
            flush_interval: Duration::from_millis(self.flush_interval_ms.max(1)),
            ..Default::default()
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.output_dir.join("hlsgrab.log"))
    }
}

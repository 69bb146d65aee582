//! Engine of the `hlsgrab` tool.
//!
//! Fetches an HLS master playlist, picks the widest variant, downloads every
//! segment of its media playlist exactly once and decrypts them with a local
//! AES key. Every file lands through a `<name>.temp` staging file and an
//! atomic rename, so re-running after a crash only repeats missing work.

pub mod config;
pub mod error;
pub mod fetcher;
pub mod fs;
pub mod hls;
pub mod logger;

pub use config::{DEFAULT_SEGMENT_PREFIX, DEFAULT_USER_AGENT, GrabConfig};
pub use error::{GrabError, Result};
pub use fetcher::{Fetched, IdempotentFetcher};
pub use hls::{GrabReport, HlsGrabber, SegmentFailure};
pub use logger::{LogHandle, LogRecord, LoggerConfig, Severity};

//! Time-batched append log.
//!
//! Records are pushed synchronously into a bounded in-memory queue and a
//! background task appends them to the log file on a fixed interval, so
//! callers never wait on disk I/O. [`LogHandle::shutdown`] performs the last
//! drain and syncs the file.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::fs;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Time between background drains
    pub flush_interval: Duration,
    /// Records held in memory before new ones are dropped
    pub queue_capacity: usize,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(1),
            queue_capacity: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        })
    }
}

#[derive(Debug, Clone)]
pub struct LogRecord {
    pub severity: Severity,
    pub tag: String,
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl LogRecord {
    fn new(severity: Severity, tag: &str, message: String) -> Self {
        Self {
            severity,
            tag: tag.to_owned(),
            timestamp: Local::now(),
            message,
        }
    }

    /// `[LEVEL][tag][timestamp]: message` followed by a newline.
    pub fn to_line(&self) -> String {
        format!(
            "[{}][{}][{}]: {}\n",
            self.severity,
            self.tag,
            self.timestamp.format("%Y-%m-%dT%H:%M:%S%.3f%:z"),
            self.message
        )
    }

    fn mirror(&self) {
        let (tag, message) = (self.tag.as_str(), self.message.as_str());
        match self.severity {
            Severity::Info => info!(tag, "{message}"),
            Severity::Warn => warn!(tag, "{message}"),
            Severity::Error => error!(tag, "{message}"),
        }
    }
}

#[derive(Default)]
struct LogQueue {
    records: VecDeque<LogRecord>,
    finished: bool,
}

struct Shared {
    path: PathBuf,
    config: LoggerConfig,
    queue: Mutex<LogQueue>,
    // Serializes drains so periodic and final flushes keep FIFO order.
    flush_lock: tokio::sync::Mutex<()>,
    dropped: AtomicU64,
    token: CancellationToken,
}

impl Shared {
    async fn drain(&self, sync: bool) {
        let _flush = self.flush_lock.lock().await;
        let batch: Vec<LogRecord> = self.queue.lock().records.drain(..).collect();
        if batch.is_empty() && !sync {
            return;
        }

        let file = match tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
        {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, discarded = batch.len(), "Failed to open log file");
                self.dropped.fetch_add(batch.len() as u64, Ordering::Relaxed);
                return;
            }
        };

        let mut writer = BufWriter::new(file);
        for record in &batch {
            if let Err(e) = writer.write_all(record.to_line().as_bytes()).await {
                warn!(path = %self.path.display(), error = %e, "Failed to write log record");
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        if let Err(e) = writer.flush().await {
            warn!(path = %self.path.display(), error = %e, "Failed to flush log file");
        }
        if sync {
            if let Err(e) = writer.get_ref().sync_all().await {
                warn!(path = %self.path.display(), error = %e, "Log file sync failed");
            }
        }
    }
}

/// Cloneable handle to a running append log.
#[derive(Clone)]
pub struct LogHandle {
    shared: Arc<Shared>,
}

impl LogHandle {
    /// Start logging to `path` and spawn the background flusher.
    ///
    /// Must be called from within a tokio runtime. The parent directory is
    /// created if missing; the file itself is created on the first drain.
    pub fn start(path: impl Into<PathBuf>, config: LoggerConfig) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::ensure_dir_all_sync(parent)?;
        }

        let shared = Arc::new(Shared {
            path,
            config,
            queue: Mutex::new(LogQueue::default()),
            flush_lock: tokio::sync::Mutex::new(()),
            dropped: AtomicU64::new(0),
            token: CancellationToken::new(),
        });
        tokio::spawn(run_flusher(Arc::downgrade(&shared)));

        Ok(Self { shared })
    }

    pub fn info(&self, tag: &str, message: impl Into<String>) {
        self.submit(Severity::Info, tag, message.into());
    }

    pub fn warn(&self, tag: &str, message: impl Into<String>) {
        self.submit(Severity::Warn, tag, message.into());
    }

    pub fn error(&self, tag: &str, message: impl Into<String>) {
        self.submit(Severity::Error, tag, message.into());
    }

    fn submit(&self, severity: Severity, tag: &str, message: String) {
        let record = LogRecord::new(severity, tag, message);
        record.mirror();

        let mut queue = self.shared.queue.lock();
        if queue.finished || queue.records.len() >= self.shared.config.queue_capacity {
            drop(queue);
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        queue.records.push_back(record);
    }

    /// Mark the log finished, drain every queued record and sync the file.
    ///
    /// Returns once the final drain is done; the background task exits on
    /// its own. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        {
            let mut queue = self.shared.queue.lock();
            if queue.finished {
                return;
            }
            queue.finished = true;
        }
        self.shared.drain(true).await;
        self.shared.token.cancel();
    }

    /// Records discarded because the queue was full, the log was already
    /// shut down, or a write failed.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    pub fn pending(&self) -> usize {
        self.shared.queue.lock().records.len()
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }
}

impl fmt::Debug for LogHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogHandle")
            .field("path", &self.shared.path)
            .field("pending", &self.pending())
            .field("dropped", &self.dropped())
            .finish()
    }
}

async fn run_flusher(shared: Weak<Shared>) {
    let (interval, token) = match shared.upgrade() {
        Some(s) => (s.config.flush_interval, s.token.clone()),
        None => return,
    };
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = ticker.tick() => {}
        }

        let Some(shared) = shared.upgrade() else {
            debug!("Log handles dropped, flusher exiting");
            return;
        };
        if shared.queue.lock().finished {
            debug!(path = %shared.path.display(), "Log finished, flusher exiting");
            return;
        }
        shared.drain(false).await;
    }
}

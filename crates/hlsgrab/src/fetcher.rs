//! Idempotent fetcher: makes sure a destination path holds a URL's content,
//! downloading it at most once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::fs;
use crate::logger::LogHandle;
use crate::{GrabError, Result};

const LOG_TAG: &str = "fetcher";

/// Outcome of [`IdempotentFetcher::ensure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    /// The destination already existed; nothing was transferred.
    Existing(PathBuf),
    /// The destination was downloaded by this call.
    Downloaded { path: PathBuf, bytes: u64 },
}

impl Fetched {
    pub fn path(&self) -> &Path {
        match self {
            Fetched::Existing(path) | Fetched::Downloaded { path, .. } => path,
        }
    }

    pub fn into_path(self) -> PathBuf {
        match self {
            Fetched::Existing(path) | Fetched::Downloaded { path, .. } => path,
        }
    }

    pub fn was_downloaded(&self) -> bool {
        matches!(self, Fetched::Downloaded { .. })
    }
}

type PathLock = Arc<tokio::sync::Mutex<()>>;

pub struct IdempotentFetcher {
    client: Client,
    log: LogHandle,
    in_flight: Mutex<HashMap<PathBuf, PathLock>>,
}

/// Membership in the in-flight map for one path. The entry is removed when
/// the last holder drops.
struct InFlightSlot<'a> {
    map: &'a Mutex<HashMap<PathBuf, PathLock>>,
    path: PathBuf,
    lock: PathLock,
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        let mut map = self.map.lock();
        // One reference in the map, one here.
        if Arc::strong_count(&self.lock) == 2 {
            map.remove(&self.path);
        }
    }
}

impl IdempotentFetcher {
    pub fn new(client: Client, log: LogHandle) -> Self {
        Self {
            client,
            log,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Make sure `path` holds the content of `url`.
    ///
    /// An existing file is trusted as complete. Otherwise the body is
    /// streamed into `<path>.temp` and renamed into place, so a failure never
    /// leaves anything at `path`. Concurrent calls for the same path are
    /// serialized; the later caller observes the finished file.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn ensure(&self, path: &Path, url: &str) -> Result<Fetched> {
        let result = self.ensure_inner(path, url).await;
        if let Err(e) = &result {
            self.log.error(LOG_TAG, format!("{url}: {e}"));
        }
        result
    }

    async fn ensure_inner(&self, path: &Path, url: &str) -> Result<Fetched> {
        let path = std::path::absolute(path).map_err(|source| GrabError::PathResolution {
            path: path.to_path_buf(),
            source,
        })?;

        let slot = self.acquire_slot(&path);
        let _guard = slot.lock.lock().await;

        if fs::exists(&path).await? {
            debug!(path = %path.display(), "Destination exists, skipping transfer");
            return Ok(Fetched::Existing(path));
        }

        let bytes = self.download(&path, url).await?;
        self.log
            .info(LOG_TAG, format!("downloaded {url} ({bytes} bytes)"));
        Ok(Fetched::Downloaded { path, bytes })
    }

    fn acquire_slot(&self, path: &Path) -> InFlightSlot<'_> {
        let lock = self
            .in_flight
            .lock()
            .entry(path.to_path_buf())
            .or_default()
            .clone();
        InFlightSlot {
            map: &self.in_flight,
            path: path.to_path_buf(),
            lock,
        }
    }

    async fn download(&self, path: &Path, url: &str) -> Result<u64> {
        let staging = fs::staging_path(path);
        let mut file =
            tokio::fs::File::create(&staging)
                .await
                .map_err(|source| GrabError::StagingCreate {
                    path: staging.clone(),
                    source,
                })?;

        let transfer_error = |source| GrabError::Transfer {
            url: url.to_string(),
            source,
        };
        let write_error = |source| GrabError::Write {
            path: staging.clone(),
            source,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(transfer_error)?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(GrabError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(transfer_error)?;
            file.write_all(&chunk).await.map_err(write_error)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(write_error)?;
        drop(file);

        fs::rename(&staging, path).await?;
        debug!(url, bytes = written, path = %path.display(), "Transfer complete");
        Ok(written)
    }

    /// Number of paths with a call in progress.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::LoggerConfig;

    #[tokio::test]
    async fn existing_file_needs_no_network() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("seg0.ts");
        std::fs::write(&target, b"cached").unwrap();

        let log = LogHandle::start(dir.path().join("grab.log"), LoggerConfig::default()).unwrap();
        let fetcher = IdempotentFetcher::new(Client::new(), log.clone());

        // Nothing listens on port 9; any request would fail.
        let fetched = fetcher
            .ensure(&target, "http://127.0.0.1:9/seg0.ts")
            .await
            .unwrap();
        assert_eq!(fetched, Fetched::Existing(target.clone()));
        assert!(!fetched.was_downloaded());
        assert_eq!(fetcher.in_flight(), 0);
        log.shutdown().await;
    }

    #[tokio::test]
    async fn connection_failure_leaves_final_path_absent() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("seg1.ts");

        let log = LogHandle::start(dir.path().join("grab.log"), LoggerConfig::default()).unwrap();
        let fetcher = IdempotentFetcher::new(Client::new(), log.clone());

        let err = fetcher
            .ensure(&target, "http://127.0.0.1:9/seg1.ts")
            .await
            .unwrap_err();
        assert!(matches!(err, GrabError::Transfer { .. }), "{err}");
        assert!(!target.exists());
        assert!(fs::staging_path(&target).exists());
        assert_eq!(fetcher.in_flight(), 0);

        log.shutdown().await;
        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert!(contents.contains("[ERROR][fetcher]"));
    }

    #[tokio::test]
    async fn missing_parent_is_a_staging_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nope").join("seg.ts");

        let log = LogHandle::start(dir.path().join("grab.log"), LoggerConfig::default()).unwrap();
        let fetcher = IdempotentFetcher::new(Client::new(), log.clone());

        let err = fetcher
            .ensure(&target, "http://127.0.0.1:9/seg.ts")
            .await
            .unwrap_err();
        assert!(matches!(err, GrabError::StagingCreate { .. }), "{err}");
        log.shutdown().await;
    }

    #[test]
    fn fetched_accessors() {
        let fetched = Fetched::Downloaded {
            path: PathBuf::from("/out/a.ts"),
            bytes: 10,
        };
        assert!(fetched.was_downloaded());
        assert_eq!(fetched.path(), Path::new("/out/a.ts"));
        assert_eq!(fetched.into_path(), PathBuf::from("/out/a.ts"));
    }
}

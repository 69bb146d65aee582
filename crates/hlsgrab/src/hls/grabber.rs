// Run orchestration: manifest -> variant -> media playlist -> segments ->
// decryption. Orchestrator-level failures abort the run; per-segment
// failures are collected into the report.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument};

use super::decryption::{DecryptOutcome, SegmentDecryptor, load_key_material};
use super::playlist::{extract_segment_urls, parse_master};
use super::urls::{media_playlist_url, resolve_base_url, resolve_file_name};
use super::variant::select_variant;
use crate::config::GrabConfig;
use crate::fetcher::{Fetched, IdempotentFetcher};
use crate::fs;
use crate::logger::LogHandle;
use crate::{GrabError, Result};

const LOG_TAG: &str = "grabber";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Download,
    Decrypt,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureStage::Download => "download",
            FailureStage::Decrypt => "decrypt",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFailure {
    pub url: String,
    pub stage: FailureStage,
    pub reason: String,
    /// Whether running again may fix it without changing inputs.
    pub retryable: bool,
}

impl SegmentFailure {
    fn new(url: String, stage: FailureStage, error: &GrabError) -> Self {
        Self {
            url,
            stage,
            reason: error.to_string(),
            retryable: error.is_retryable(),
        }
    }
}

/// Summary of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrabReport {
    pub variant_uri: String,
    pub media_playlist_url: String,
    pub segments_total: usize,
    /// Segments transferred by this run.
    pub downloaded: usize,
    /// Segments already on disk.
    pub skipped: usize,
    pub decrypted: usize,
    pub decrypt_skipped: usize,
    pub failures: Vec<SegmentFailure>,
}

impl GrabReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for GrabReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "segments: {} total, {} downloaded, {} skipped, {} failed, {} decrypted",
            self.segments_total,
            self.downloaded,
            self.skipped,
            self.failed(),
            self.decrypted + self.decrypt_skipped
        )
    }
}

pub struct HlsGrabber {
    config: GrabConfig,
    fetcher: Arc<IdempotentFetcher>,
    log: LogHandle,
}

impl HlsGrabber {
    pub fn new(config: GrabConfig, log: LogHandle) -> Result<Self> {
        config.validate()?;
        let client = config.build_client()?;
        Ok(Self::with_client(config, client, log))
    }

    pub fn with_client(config: GrabConfig, client: Client, log: LogHandle) -> Self {
        let fetcher = Arc::new(IdempotentFetcher::new(client, log.clone()));
        Self {
            config,
            fetcher,
            log,
        }
    }

    /// Grab every segment of the widest variant behind `manifest_url`, then
    /// decrypt what is on disk when a key file is configured.
    #[instrument(skip(self), fields(output = %self.config.output_dir.display()))]
    pub async fn run(&self, manifest_url: &str) -> Result<GrabReport> {
        let result = self.run_inner(manifest_url).await;
        match &result {
            Ok(report) => self.log.info(LOG_TAG, format!("run finished: {report}")),
            Err(e) => self.log.error(LOG_TAG, format!("run aborted: {e}")),
        }
        result
    }

    async fn run_inner(&self, manifest_url: &str) -> Result<GrabReport> {
        fs::ensure_dir_all(&self.config.output_dir).await?;

        // A bad key should fail before any transfer starts.
        let decryptor = match (&self.config.key_file, self.config.decrypt) {
            (Some(key_file), true) => {
                let key = load_key_material(key_file, &self.log).await?;
                Some(Arc::new(SegmentDecryptor::new(
                    key,
                    self.config.decrypted_dir(),
                    self.log.clone(),
                )))
            }
            _ => None,
        };

        let manifest_path = self
            .fetch_artifact(manifest_url)
            .await?
            .into_path();
        let manifest = tokio::fs::read(&manifest_path)
            .await
            .map_err(|e| GrabError::io("reading manifest", &manifest_path, e))?;
        let variants = parse_master(&manifest)?;
        let variant = select_variant(&variants, &self.log)?;

        let base_url = resolve_base_url(manifest_url)?;
        let playlist_url = media_playlist_url(&base_url, &variant.uri)?;
        self.log
            .info(LOG_TAG, format!("media playlist: {playlist_url}"));

        let playlist_path = self.fetch_artifact(&playlist_url).await?.into_path();
        let playlist = tokio::fs::read_to_string(&playlist_path)
            .await
            .map_err(|e| GrabError::io("reading media playlist", &playlist_path, e))?;
        let segments = extract_segment_urls(&playlist, &self.config.segment_prefix);
        if segments.is_empty() {
            self.log.warn(
                LOG_TAG,
                format!(
                    "no lines starting with {:?} in {playlist_url}",
                    self.config.segment_prefix
                ),
            );
        }

        let mut report = GrabReport {
            variant_uri: variant.uri.clone(),
            media_playlist_url: playlist_url,
            segments_total: segments.len(),
            ..Default::default()
        };

        let on_disk = self.download_segments(&segments, &mut report).await?;

        match decryptor {
            Some(decryptor) => {
                fs::ensure_dir_all(decryptor.output_dir()).await?;
                self.decrypt_segments(decryptor, on_disk, &mut report)
                    .await?;
            }
            None => debug!("No key configured, skipping decryption"),
        }

        info!(
            downloaded = report.downloaded,
            skipped = report.skipped,
            failed = report.failed(),
            decrypted = report.decrypted,
            "Grab complete"
        );
        Ok(report)
    }

    async fn fetch_artifact(&self, url: &str) -> Result<Fetched> {
        let path = self.config.artifact_path(&resolve_file_name(url));
        self.fetcher.ensure(&path, url).await
    }

    /// Fetch every segment not yet on disk. Returns the segments present
    /// afterwards as `(url, path)` in playlist order.
    async fn download_segments(
        &self,
        segments: &[String],
        report: &mut GrabReport,
    ) -> Result<Vec<(String, PathBuf)>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_downloads));
        let mut tasks = JoinSet::new();
        let mut task_urls = HashMap::new();
        let mut present = HashSet::new();

        for url in segments {
            let path = self.config.artifact_path(&resolve_file_name(url));
            match fs::exists(&path).await {
                Ok(true) => {
                    debug!(url, "Segment on disk, skipping");
                    report.skipped += 1;
                    present.insert(url.clone());
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    self.log.error(LOG_TAG, format!("{url}: {e}"));
                    report
                        .failures
                        .push(SegmentFailure::new(url.clone(), FailureStage::Download, &e));
                    continue;
                }
            }

            let fetcher = Arc::clone(&self.fetcher);
            let semaphore = Arc::clone(&semaphore);
            let task_url = url.clone();
            let handle = tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| GrabError::configuration("download semaphore closed"))?;
                fetcher.ensure(&path, &task_url).await
            });
            task_urls.insert(handle.id(), url.clone());
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, outcome)) => (id, outcome),
                Err(e) => (e.id(), Err(GrabError::Task(e))),
            };
            let url = task_urls.remove(&id).unwrap_or_default();
            match outcome {
                Ok(Fetched::Downloaded { .. }) => {
                    report.downloaded += 1;
                    present.insert(url);
                }
                Ok(Fetched::Existing(_)) => {
                    report.skipped += 1;
                    present.insert(url);
                }
                Err(e) => report
                    .failures
                    .push(SegmentFailure::new(url, FailureStage::Download, &e)),
            }
        }

        Ok(segments
            .iter()
            .filter(|url| present.contains(*url))
            .map(|url| {
                let path = self.config.artifact_path(&resolve_file_name(url));
                (url.clone(), path)
            })
            .collect())
    }

    async fn decrypt_segments(
        &self,
        decryptor: Arc<SegmentDecryptor>,
        on_disk: Vec<(String, PathBuf)>,
        report: &mut GrabReport,
    ) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_downloads));
        let mut tasks = JoinSet::new();
        let mut task_urls = HashMap::new();
        let mut seen = HashSet::new();

        for (url, path) in on_disk {
            // Playlists may list one file twice.
            if !seen.insert(path.clone()) {
                continue;
            }
            let decryptor = Arc::clone(&decryptor);
            let semaphore = Arc::clone(&semaphore);
            let handle = tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| GrabError::configuration("decrypt semaphore closed"))?;
                decryptor.decrypt_file(&path).await
            });
            task_urls.insert(handle.id(), url);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, outcome)) => (id, outcome),
                Err(e) => (e.id(), Err(GrabError::Task(e))),
            };
            let url = task_urls.remove(&id).unwrap_or_default();
            match outcome {
                Ok(DecryptOutcome::Written { .. }) => report.decrypted += 1,
                Ok(DecryptOutcome::Existing(_)) => report.decrypt_skipped += 1,
                Err(e) => {
                    self.log.error(LOG_TAG, format!("{url}: {e}"));
                    report
                        .failures
                        .push(SegmentFailure::new(url, FailureStage::Decrypt, &e));
                }
            }
        }
        Ok(())
    }
}

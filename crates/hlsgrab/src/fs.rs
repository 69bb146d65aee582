//! Filesystem helpers shared across modules.
//!
//! Every final artifact goes through [`staging_path`] and an atomic rename, so
//! a destination path is either absent or complete.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::{GrabError, Result};

/// Suffix of in-progress files.
pub const STAGING_SUFFIX: &str = ".temp";

/// `<path>.temp`, the staging location for `path`.
pub fn staging_path(path: &Path) -> PathBuf {
    let mut staged = OsString::from(path.as_os_str());
    staged.push(STAGING_SUFFIX);
    PathBuf::from(staged)
}

/// Ensure a directory exists, creating it (recursively) if needed.
pub async fn ensure_dir_all(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| GrabError::io("creating directory", path, e))
}

/// Ensure a directory exists (synchronous variant).
pub fn ensure_dir_all_sync(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| GrabError::io("creating directory", path, e))
}

/// Whether something already occupies `path`.
///
/// Only `NotFound` counts as absent; other metadata errors are surfaced.
pub async fn exists(path: &Path) -> Result<bool> {
    match tokio::fs::metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(GrabError::io("checking", path, e)),
    }
}

/// Write `contents` to `<path>.temp`, then rename it over `path`.
pub async fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let staging = staging_path(path);
    let mut file = tokio::fs::File::create(&staging)
        .await
        .map_err(|source| GrabError::StagingCreate {
            path: staging.clone(),
            source,
        })?;

    file.write_all(contents)
        .await
        .map_err(|source| GrabError::Write {
            path: staging.clone(),
            source,
        })?;
    file.flush().await.map_err(|source| GrabError::Write {
        path: staging.clone(),
        source,
    })?;
    drop(file);

    rename(&staging, path).await
}

pub async fn rename(from: &Path, to: &Path) -> Result<()> {
    tokio::fs::rename(from, to)
        .await
        .map_err(|source| GrabError::Rename {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        })
}

// Segment decryption: loads the key file and offloads AES-CBC work to the
// blocking pool, writing plaintext through the staging protocol.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use segment_crypto::{CryptoError, KeyMaterial};
use tracing::debug;

use crate::fs;
use crate::logger::LogHandle;
use crate::{GrabError, Result};

const LOG_TAG: &str = "decrypt";

/// Read raw key material from `path`.
///
/// A missing file or a length other than 16, 24 or 32 bytes is a
/// configuration error.
pub async fn load_key_material(path: &Path, log: &LogHandle) -> Result<Arc<KeyMaterial>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(GrabError::configuration(format!(
                "key file `{}` does not exist",
                path.display()
            )));
        }
        Err(e) => return Err(GrabError::io("reading key file", path, e)),
    };

    let key = KeyMaterial::from_bytes(bytes).map_err(|e| match e {
        CryptoError::InvalidKeySize(len) => GrabError::configuration(format!(
            "key file `{}` holds {len} bytes, expected 16, 24 or 32",
            path.display()
        )),
        other => GrabError::configuration(other.to_string()),
    })?;

    log.warn(
        LOG_TAG,
        format!(
            "AES-{} key from {} is also used as the IV; segments share one IV",
            key.bits(),
            path.display()
        ),
    );
    Ok(Arc::new(key))
}

/// Result of decrypting one segment file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptOutcome {
    /// Plaintext was already present.
    Existing(PathBuf),
    Written { path: PathBuf, bytes: usize },
}

#[derive(Debug, Clone)]
pub struct SegmentDecryptor {
    key: Arc<KeyMaterial>,
    output_dir: PathBuf,
    log: LogHandle,
}

impl SegmentDecryptor {
    pub fn new(key: Arc<KeyMaterial>, output_dir: impl Into<PathBuf>, log: LogHandle) -> Self {
        Self {
            key,
            output_dir: output_dir.into(),
            log,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Decrypt `source` into the output directory under the same file name.
    pub async fn decrypt_file(&self, source: &Path) -> Result<DecryptOutcome> {
        let name = source.file_name().ok_or_else(|| {
            GrabError::configuration(format!("`{}` has no file name", source.display()))
        })?;
        let target = self.output_dir.join(name);

        if fs::exists(&target).await? {
            debug!(path = %target.display(), "Plaintext exists, skipping");
            return Ok(DecryptOutcome::Existing(target));
        }

        let cipher_text = tokio::fs::read(source)
            .await
            .map_err(|e| GrabError::io("reading segment", source, e))?;

        let key = Arc::clone(&self.key);
        let plain = tokio::task::spawn_blocking(move || key.decrypt_segment(&cipher_text))
            .await?
            .map_err(|source_err| GrabError::Decryption {
                path: source.to_path_buf(),
                source: source_err,
            })?;

        fs::write_atomically(&target, &plain).await?;
        self.log.info(
            LOG_TAG,
            format!("decrypted {} ({} bytes)", target.display(), plain.len()),
        );
        Ok(DecryptOutcome::Written {
            path: target,
            bytes: plain.len(),
        })
    }
}

//! Request-scoped scratch files.
//!
//! A [`ScratchFile`] owns its path on disk and removes it when dropped, so
//! every exit path of a request (success, error, panic unwinding, or the
//! handler future being cancelled) releases the file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ScratchDir { root: root.into() }
    }

    /// Writes `bytes` to a new uniquely named file under the scratch root.
    pub fn write(&self, prefix: &str, suffix: &str, bytes: &[u8]) -> io::Result<ScratchFile> {
        fs::create_dir_all(&self.root)?;
        let mut file = Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile_in(&self.root)?;
        file.write_all(bytes)?;
        file.flush()?;
        debug!(
            "Wrote scratch file {} ({} bytes)",
            file.path().display(),
            bytes.len()
        );
        Ok(ScratchFile { inner: Some(file) })
    }

    /// Same as [`ScratchDir::write`], run on the blocking pool.
    pub async fn persist(
        &self,
        prefix: &str,
        suffix: &str,
        bytes: Vec<u8>,
    ) -> io::Result<ScratchFile> {
        let dir = self.clone();
        let prefix = prefix.to_string();
        let suffix = suffix.to_string();
        tokio::task::spawn_blocking(move || dir.write(&prefix, &suffix, &bytes))
            .await
            .map_err(io::Error::other)?
    }
}

#[derive(Debug)]
pub struct ScratchFile {
    inner: Option<NamedTempFile>,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        match &self.inner {
            Some(file) => file.path(),
            None => Path::new(""),
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        let Some(file) = self.inner.take() else {
            return;
        };
        let path = file.path().to_path_buf();
        match file.close() {
            Ok(()) => debug!("Removed scratch file {}", path.display()),
            Err(err) => warn!("Failed to remove scratch file {}: {}", path.display(), err),
        }
    }
}

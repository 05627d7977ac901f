//! Delivery of finished artifacts.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Error, Result};

/// Hands a completed artifact to its consumer.
///
/// Returning `Ok` means the handoff has happened; callers do not need to wait
/// any further before reusing the slot.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Delivers `artifact` under `file_name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Delivery`] if the artifact could not be handed off.
    async fn deliver(&self, artifact: Bytes, file_name: &str) -> Result<()>;
}

/// Writes artifacts into a directory.
///
/// Bytes go to `{name}.part` first and are renamed into place once fully
/// written, so a reader never sees a truncated file under the final name.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    /// Creates a sink writing into `dir`. The directory is created on first delivery.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the target directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn check_file_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(Error::Delivery(format!("refusing file name {name:?}")));
    }
    Ok(())
}

#[async_trait]
impl DeliverySink for FileSink {
    async fn deliver(&self, artifact: Bytes, file_name: &str) -> Result<()> {
        check_file_name(file_name)?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::Delivery(format!("{}: {e}", self.dir.display())))?;

        let path = self.dir.join(file_name);
        let part = self.dir.join(format!("{file_name}.part"));

        let written = async {
            tokio::fs::write(&part, &artifact).await?;
            tokio::fs::rename(&part, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(Error::Delivery(format!("{}: {e}", path.display())));
        }

        log::debug!("Saved {} ({} bytes)", path.display(), artifact.len());
        Ok(())
    }
}

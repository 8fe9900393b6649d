//! Request-scoped temporary files for uploaded documents.

use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Uploaded file staged on local disk for the duration of one request.
///
/// Call [`StagedUpload::remove`] once the file is no longer needed. A value dropped without
/// being removed still deletes its file: on the blocking pool when a Tokio runtime is running,
/// inline otherwise. Removal failures are logged and otherwise ignored.
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
    media_type: Option<String>,
    removed: bool,
}

impl StagedUpload {
    /// Write `bytes` to a uniquely named file inside `dir`, creating the directory if needed.
    pub async fn write(
        dir: &Path,
        bytes: &[u8],
        media_type: Option<String>,
    ) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(Uuid::new_v4().simple().to_string());
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(path = %path.display(), size = bytes.len(), media_type = ?media_type, "Staged upload");
        Ok(Self::adopt(path, media_type))
    }

    /// Take ownership of a file that already exists on disk.
    pub fn adopt(path: PathBuf, media_type: Option<String>) -> Self {
        Self {
            path,
            media_type,
            removed: false,
        }
    }

    /// Location of the staged file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Media type declared by the client, if any.
    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    /// Delete the staged file without blocking the runtime.
    pub async fn remove(mut self) {
        self.removed = true;
        let result = tokio::fs::remove_file(&self.path).await;
        log_removal(&self.path, result);
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        let path = std::mem::take(&mut self.path);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || remove_now(&path));
            }
            Err(_) => remove_now(&path),
        }
    }
}

fn remove_now(path: &Path) {
    log_removal(path, std::fs::remove_file(path));
}

fn log_removal(path: &Path, result: std::io::Result<()>) {
    match result {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed staged upload"),
        Err(err) => tracing::warn!(
            path = %path.display(),
            error = %err,
            "Failed to remove staged upload"
        ),
    }
}

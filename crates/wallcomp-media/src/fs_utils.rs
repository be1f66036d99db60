//! Filesystem helpers for scratch and output directories.

use std::path::Path;
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Create `dir` and any missing parents.
pub async fn ensure_dir(dir: impl AsRef<Path>) -> MediaResult<()> {
    let dir = dir.as_ref();
    if !dir.exists() {
        tracing::debug!("Creating directory {}", dir.display());
        fs::create_dir_all(dir).await?;
    }
    if !dir.is_dir() {
        return Err(MediaError::internal(format!(
            "{} exists but is not a directory",
            dir.display()
        )));
    }
    Ok(())
}

/// Remove a file, treating "already gone" as success.
///
/// Returns whether a file was actually removed.
pub async fn remove_if_exists(path: impl AsRef<Path>) -> MediaResult<bool> {
    let path = path.as_ref();
    match fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!("Removed {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Check that files can be created inside `dir`, creating it if needed.
pub async fn check_writable(dir: impl AsRef<Path>) -> MediaResult<()> {
    let dir = dir.as_ref();
    ensure_dir(dir).await?;

    // tempfile is blocking; the check file is tiny and removed on drop
    let check_dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || tempfile::NamedTempFile::new_in(&check_dir).map(|_| ()))
        .await
        .map_err(|e| MediaError::internal(format!("Writability check panicked: {}", e)))??;
    Ok(())
}

/// Fallback extension for stored media whose name carries none we trust.
pub const FALLBACK_EXTENSION: &str = "bin";

/// Lowercased extension of a client-supplied file name, safe to reuse in a
/// local file name.
///
/// Anything other than 1-8 ASCII alphanumerics becomes [`FALLBACK_EXTENSION`].
pub fn safe_extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

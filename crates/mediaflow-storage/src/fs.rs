//! Small filesystem helpers shared by the storage and processing crates.

use std::io;
use std::path::Path;
use tokio::fs;

/// Move a file, falling back to copy + delete when a rename is impossible
/// (typically across filesystems). Creates the destination's parent.
pub async fn move_file(source: &Path, destination: &Path) -> io::Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(source, destination).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(e),
        Err(e) => {
            tracing::debug!(
                error = %e,
                source = %source.display(),
                destination = %destination.display(),
                "Rename failed, copying instead"
            );
            fs::copy(source, destination).await?;
            fs::remove_file(source).await
        }
    }
}

/// Remove a directory tree, treating a missing directory as success.
pub async fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path).await {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

//! Filesystem-backed [`AtomicBlobStore`].
//!
//! Writes follow the usual crash-safe sequence:
//!
//! 1. Write data to a temporary file next to the target
//! 2. `fsync` the temporary file
//! 3. Rename it over the target
//! 4. `fsync` the parent directory (Unix)

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use super::AtomicBlobStore;
use crate::storage::{BackendError, BackendResult};

/// Blob store rooted at a directory on the local filesystem.
///
/// Blob paths are relative to the root directory; absolute paths and `..`
/// components are rejected.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    directory: PathBuf,
}

impl FsBlobStore {
    /// Opens a blob store rooted at `directory`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(directory: impl AsRef<Path>) -> BackendResult<Self> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    fn blob_path(&self, path: &str) -> BackendResult<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)));
        if path.is_empty() || escapes {
            return Err(BackendError::AccessDenied(format!(
                "blob path escapes store root: {path}"
            )));
        }
        Ok(self.directory.join(relative))
    }

    fn write_file(target: &Path, bytes: &[u8]) -> io::Result<()> {
        let parent = target
            .parent()
            .ok_or_else(|| io::Error::other("blob path has no parent"))?;
        fs::create_dir_all(parent)?;

        let file_name = target
            .file_name()
            .ok_or_else(|| io::Error::other("blob path has no file name"))?;
        let temp = parent.join(format!(".{}.tmp", file_name.to_string_lossy()));

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);

        if let Err(err) = fs::rename(&temp, target) {
            let _ = fs::remove_file(&temp);
            return Err(err);
        }
        sync_directory(parent)
    }
}

#[cfg(unix)]
fn sync_directory(directory: &Path) -> io::Result<()> {
    File::open(directory)?.sync_all()
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn sync_directory(_directory: &Path) -> io::Result<()> {
    Ok(())
}

impl AtomicBlobStore for FsBlobStore {
    fn read(&self, path: String) -> BackendResult<Option<Vec<u8>>> {
        let target = self.blob_path(&path)?;
        match fs::read(&target) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write_atomic(&self, path: String, bytes: Vec<u8>) -> BackendResult<()> {
        let target = self.blob_path(&path)?;
        Self::write_file(&target, &bytes)?;
        Ok(())
    }
}

//! Locks around root resolution.
//!
//! Two resolvers running at the same time on a fresh device could each
//! generate a root and split them across backends. Two layers rule that out:
//!
//! - [`location_lock`] hands out one process-wide mutex per backend location,
//!   so every manager in the process that touches the same store serializes,
//!   no matter how many instances the host builds.
//! - [`StorageLock`] is an exclusive advisory lock on a shared file (`flock` on
//!   Unix, `LockFileEx` on Windows, both via [`File::lock`]) for hosts with
//!   several processes, such as an app and its extensions.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::SecureUdidError;

static LOCATION_LOCKS: OnceLock<Mutex<HashMap<String, Arc<Mutex<()>>>>> = OnceLock::new();

/// Returns the process-wide mutex for `location`, creating it on first use.
///
/// The same location always yields the same mutex.
#[must_use]
pub fn location_lock(location: &str) -> Arc<Mutex<()>> {
    let mut locks = LOCATION_LOCKS
        .get_or_init(Mutex::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    Arc::clone(locks.entry(location.to_string()).or_default())
}

/// A file-backed lock that serializes resolution across processes.
#[derive(Debug, Clone)]
pub struct StorageLock {
    file: Arc<File>,
    path: PathBuf,
}

/// Guard that holds the exclusive lock for its lifetime.
#[derive(Debug)]
pub struct StorageLockGuard {
    file: Arc<File>,
}

impl StorageLock {
    /// Opens or creates the lock file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its parent directory cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SecureUdidError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| lock_error(&path, &err))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|err| lock_error(&path, &err))?;
        Ok(Self {
            file: Arc::new(file),
            path,
        })
    }

    /// Blocks until the exclusive lock is acquired.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be acquired.
    pub fn lock(&self) -> Result<StorageLockGuard, SecureUdidError> {
        self.file
            .lock()
            .map_err(|err| lock_error(&self.path, &err))?;
        Ok(StorageLockGuard {
            file: Arc::clone(&self.file),
        })
    }
}

impl Drop for StorageLockGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn lock_error(path: &Path, err: &std::io::Error) -> SecureUdidError {
    SecureUdidError::LockUnavailable(format!("{}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use uuid::Uuid;

    fn temp_lock_path() -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("secureudid-lock-{}.lock", Uuid::new_v4()));
        path
    }

    #[test]
    fn test_lock_blocks_second_handle_until_released() {
        let path = temp_lock_path();
        let lock_a = StorageLock::open(&path).expect("open lock");
        let guard = lock_a.lock().expect("acquire lock");

        let acquired = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = mpsc::channel();
        let waiter = {
            let path = path.clone();
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                let lock_b = StorageLock::open(&path).expect("open lock");
                started_tx.send(()).expect("signal start");
                let _guard = lock_b.lock().expect("lock in thread");
                acquired.store(true, Ordering::SeqCst);
            })
        };

        started_rx.recv().expect("wait start");
        thread::sleep(Duration::from_millis(100));
        assert!(!acquired.load(Ordering::SeqCst));

        drop(guard);
        waiter.join().expect("thread join");
        assert!(acquired.load(Ordering::SeqCst));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/dir/resolve.lock");

        let lock = StorageLock::open(&path).expect("open lock");
        drop(lock.lock().expect("acquire lock"));
        assert!(path.exists());
    }

    #[test]
    fn test_location_lock_is_shared_per_location() {
        let location = format!("blob:{}", Uuid::new_v4());
        let a = location_lock(&location);
        let b = location_lock(&location);
        let other = location_lock(&format!("{location}-other"));

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other));
    }
}

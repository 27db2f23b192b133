use crate::error::ErrorCode;
use fs2::FileExt;
use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

/// Default time to wait for another `lb` process to finish writing.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Advisory lock errors for the data directory.
#[derive(Debug)]
pub enum LockError {
    Timeout { path: PathBuf, waited: Duration },
    IoError(io::Error),
}

impl From<io::Error> for LockError {
    fn from(err: io::Error) -> Self {
        Self::IoError(err)
    }
}

impl LockError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::LockContention,
            Self::IoError(_) => ErrorCode::StorageIo,
        }
    }

    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { path, waited } => write!(
                f,
                "{}: lock timed out after {:?} at {}",
                self.code().code(),
                waited,
                path.display()
            ),
            Self::IoError(err) => write!(f, "{}: {}", self.code().code(), err),
        }
    }
}

impl std::error::Error for LockError {}

/// RAII guard for the exclusive store lock held during writes.
///
/// The lock is released when the guard drops.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Poll for an exclusive advisory lock on `path` until `timeout`.
    ///
    /// # Errors
    ///
    /// [`LockError::Timeout`] when another holder keeps the lock, or
    /// [`LockError::IoError`] when the lock file cannot be opened.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        let parent = path
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "lock path has no parent"))?;
        fs::create_dir_all(parent)?;

        let start = Instant::now();
        loop {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(path)?;

            if file.try_lock_exclusive().is_ok() {
                tracing::trace!(path = %path.display(), "store lock acquired");
                return Ok(Self {
                    file,
                    path: path.to_path_buf(),
                });
            }

            if start.elapsed() >= timeout {
                tracing::warn!(path = %path.display(), "store lock timed out");
                return Err(LockError::Timeout {
                    path: path.to_path_buf(),
                    waited: start.elapsed(),
                });
            }

            thread::sleep(Duration::from_millis(10));
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::{LockError, StoreLock};
    use crate::error::ErrorCode;
    use std::{
        sync::{Arc, Barrier},
        thread,
        time::Duration,
    };

    #[test]
    fn lock_allows_acquire_and_release() -> Result<(), LockError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("store.lock");
        let lock = StoreLock::acquire(&path, Duration::from_millis(50))?;
        assert_eq!(lock.path(), path.as_path());
        drop(lock);
        let _again = StoreLock::acquire(&path, Duration::from_millis(50))?;
        Ok(())
    }

    #[test]
    fn lock_creates_missing_parent() -> Result<(), LockError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested/data/store.lock");
        let _lock = StoreLock::acquire(&path, Duration::from_millis(50))?;
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn lock_error_maps_to_machine_code() {
        let timeout = LockError::Timeout {
            path: "store.lock".into(),
            waited: Duration::from_millis(10),
        };
        assert_eq!(timeout.code(), ErrorCode::LockContention);
        assert!(timeout.hint().is_some());
        assert!(timeout.to_string().starts_with("E5003"));
    }

    #[test]
    fn contention_is_resolved_after_holder_releases() -> Result<(), LockError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("store.lock");

        let held = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));

        let held_thread = Arc::clone(&held);
        let release_thread = Arc::clone(&release);
        let path_in_thread = path.clone();
        let handle = thread::spawn(move || {
            let _holder = StoreLock::acquire(&path_in_thread, Duration::from_millis(200)).expect("first lock");
            held_thread.wait();
            release_thread.wait();
        });

        held.wait();
        assert!(matches!(
            StoreLock::acquire(&path, Duration::from_millis(20)),
            Err(LockError::Timeout { .. })
        ));
        release.wait();
        handle.join().expect("holder thread");

        let _follow_up = StoreLock::acquire(&path, Duration::from_millis(50))?;
        Ok(())
    }
}

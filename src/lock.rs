//! Advisory lock around the Telegram session.
//!
//! Two processes resuming the same MTProto auth key race the server-side
//! sequence numbers, so every command that opens a connection holds this
//! lock for its lifetime.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::config::LOCK_FILE;
use crate::error::{Error, Result};

pub struct SessionLock {
    lock_file: Option<File>,
    lock_path: PathBuf,
}

impl SessionLock {
    /// Acquire an exclusive lock inside the state directory.
    pub fn acquire(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let lock_path = dir.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&lock_path)
            .map_err(|e| Error::LockError(format!("Failed to open lock file: {}", e)))?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                lock_file: Some(lock_file),
                lock_path,
            }),
            Err(_) => Err(Error::SessionLocked),
        }
    }

    /// Release the lock manually.
    pub fn release(&mut self) {
        if let Some(ref file) = self.lock_file {
            let _ = file.unlock();
        }
        self.lock_file = None;
        let _ = std::fs::remove_file(&self.lock_path);
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn acquire_creates_lock_file() {
        let dir = tempdir().unwrap();
        let mut lock = SessionLock::acquire(dir.path()).unwrap();
        assert!(dir.path().join(LOCK_FILE).exists());
        lock.release();
    }

    #[test]
    fn release_removes_lock_file() {
        let dir = tempdir().unwrap();
        let mut lock = SessionLock::acquire(dir.path()).unwrap();
        lock.release();
        assert!(!dir.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn drop_releases_automatically() {
        let dir = tempdir().unwrap();
        {
            let _lock = SessionLock::acquire(dir.path()).unwrap();
            assert!(dir.path().join(LOCK_FILE).exists());
        }
        assert!(!dir.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn double_release_is_safe() {
        let dir = tempdir().unwrap();
        let mut lock = SessionLock::acquire(dir.path()).unwrap();
        lock.release();
        lock.release();
    }

    #[test]
    fn second_acquire_fails_while_held() {
        let dir = tempdir().unwrap();
        let mut first = SessionLock::acquire(dir.path()).unwrap();

        // fs2 locks are per-file-handle, so a second handle in the same
        // process is enough to observe the conflict.
        let second = SessionLock::acquire(dir.path());
        assert!(matches!(second, Err(Error::SessionLocked)));

        first.release();
        let third = SessionLock::acquire(dir.path());
        assert!(third.is_ok());
    }
}

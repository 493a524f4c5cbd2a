use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

// Process-level lock guard backed by an OS file lock.
// MIW sizes its work against available memory, so two batches must not run side by side.
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    // Acquire an exclusive lock on the given file path without blocking.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!("creating lock directory failed: {}", parent.display())
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("opening lock file failed: {}", path.display()))?;

        file.try_lock_exclusive()
            .with_context(|| format!("another batch is already running: {}", path.display()))?;
        debug!(lock = %path.display(), "Acquired batch lock");

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!(lock = %self.path.display(), "Released batch lock");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_first_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("batch.lock");

        let first = LockGuard::acquire(&path).unwrap();
        let err = LockGuard::acquire(&path).err().expect("lock should be held");
        assert!(format!("{err:#}").contains("another batch is already running"));

        drop(first);
        assert!(LockGuard::acquire(&path).is_ok());
    }
}

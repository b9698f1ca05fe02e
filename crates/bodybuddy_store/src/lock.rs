//! Advisory lock guarding the store file.
//!
//! The store file is the single shared mutable resource. A sibling
//! `<file>.lock` is held with an exclusive advisory lock for as long as the
//! store is open, so a second process fails fast instead of interleaving
//! journal frames.

use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// An exclusive lock held for the lifetime of an open store.
#[derive(Debug)]
pub(crate) struct StoreLock {
    _file: File,
}

impl StoreLock {
    /// Acquires the lock next to `store_path` without blocking.
    pub(crate) fn acquire(store_path: &Path) -> StoreResult<Self> {
        let path = lock_path(store_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked);
        }

        Ok(Self { _file: file })
    }
}

fn lock_path(store_path: &Path) -> PathBuf {
    let mut name = store_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    store_path.with_file_name(name)
}

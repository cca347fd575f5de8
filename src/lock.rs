//! Cross-process mutual exclusion for one target path.
//!
//! The in-process memo set only prevents redundant work inside one compiler
//! instance; this advisory lock is what keeps independent processes from
//! interleaving writes to the same generated file.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::CompileError;

/// Exclusive, blocking, advisory lock on a `.lock` sibling of the target
/// path. Held for the guard's lifetime and released on every exit path.
///
/// The marker file is never unlinked: removing it would let a later
/// `File::create` at the same path lock a fresh inode while a blocked waiter
/// still holds the old one, putting two writers inside the critical section.
pub struct FileLock {
    file: File,
}

impl FileLock {
    pub fn acquire(target: &Path) -> Result<Self, CompileError> {
        let path = lock_path(target);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| CompileError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = File::create(&path).map_err(|source| CompileError::Lock {
            path: path.clone(),
            source,
        })?;
        // Blocks until granted; compilation is a short, bounded build-time
        // operation, so no timeout is defined.
        file.lock_exclusive().map_err(|source| CompileError::Lock {
            path: path.clone(),
            source,
        })?;
        Ok(FileLock { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn lock_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".lock");
    target.with_file_name(name)
}

// ------------------------------- Tests ------------------------------------ //

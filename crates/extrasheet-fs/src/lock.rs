use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::pristine::PRISTINE_DIR;
use crate::FsError;

const LOCK_FILE: &str = "lock";

/// Exclusive advisory lock on a spreadsheet folder.
///
/// Held for the duration of one `diff`, `push` or `capture`. The lock file
/// holds the owner's pid and is removed when the guard drops. A lock left by
/// a process that no longer exists is reclaimed where liveness can be
/// checked (Linux); elsewhere [`FolderLock::break_lock`] removes it.
#[derive(Debug)]
pub struct FolderLock {
    path: PathBuf,
}

impl FolderLock {
    pub fn acquire(folder: impl AsRef<Path>) -> Result<Self, FsError> {
        let dir = folder.as_ref().join(PRISTINE_DIR);
        fs::create_dir_all(&dir).map_err(FsError::io(&dir))?;
        let path = dir.join(LOCK_FILE);

        match Self::create(&path) {
            Err(FsError::Locked { holder, .. }) if holder_is_gone(&holder) => {
                log::warn!(
                    "reclaiming {} left by exited process {holder}",
                    path.display()
                );
                remove_if_present(&path)?;
                Self::create(&path)
            }
            other => other,
        }
    }

    fn create(path: &Path) -> Result<Self, FsError> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(path)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default();
                return Err(FsError::Locked {
                    path: path.to_path_buf(),
                    holder,
                });
            }
            Err(err) => return Err(FsError::io(path)(err)),
        };

        let guard = Self {
            path: path.to_path_buf(),
        };
        writeln!(file, "{}", std::process::id()).map_err(FsError::io(&guard.path))?;
        log::debug!("acquired {}", guard.path.display());
        Ok(guard)
    }

    /// Removes the lock file of `folder` regardless of its holder. Returns
    /// the recorded holder pid when a lock was present.
    pub fn break_lock(folder: impl AsRef<Path>) -> Result<Option<String>, FsError> {
        let path = folder.as_ref().join(PRISTINE_DIR).join(LOCK_FILE);
        let holder = match fs::read_to_string(&path) {
            Ok(content) => content.trim().to_string(),
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(FsError::io(&path)(err)),
        };
        remove_if_present(&path)?;
        Ok(Some(holder))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn remove_if_present(path: &Path) -> Result<(), FsError> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != ErrorKind::NotFound => Err(FsError::io(path)(err)),
        _ => Ok(()),
    }
}

/// True when `holder` names a pid with no running process.
#[cfg(target_os = "linux")]
fn holder_is_gone(holder: &str) -> bool {
    match holder.parse::<u32>() {
        Ok(pid) => !Path::new("/proc").join(pid.to_string()).exists(),
        Err(_) => false,
    }
}

#[cfg(not(target_os = "linux"))]
fn holder_is_gone(_holder: &str) -> bool {
    false
}

impl Drop for FolderLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            log::warn!("failed to release {}: {err}", self.path.display());
        }
    }
}

//! Single-instance guard.
//!
//! An exclusive OS file lock on `runway-instance.lock` in the temp root keeps
//! a second interactive instance from running against the same workspace.
//! The lock, not the file, is what counts: the OS drops it when its holder
//! dies, so a leftover file from a crashed run never blocks a new one. The
//! pid written into the file is informational.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::core::error::{BootError, BootResult};

/// Lock file name inside the temp root.
pub const LOCK_FILE: &str = "runway-instance.lock";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Locked,
    /// Another process holds the lock; terminal for this process.
    Rejected,
}

#[derive(Debug)]
pub struct SingleInstanceGuard {
    lock_path: PathBuf,
    file: Option<File>,
    state: LockState,
}

impl SingleInstanceGuard {
    pub fn new(lock_path: impl Into<PathBuf>) -> Self {
        SingleInstanceGuard {
            lock_path: lock_path.into(),
            file: None,
            state: LockState::Unlocked,
        }
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    /// Take the exclusive lock, creating the lock file if absent.
    pub fn acquire(&mut self) -> BootResult<()> {
        match self.state {
            LockState::Locked => return Ok(()),
            LockState::Rejected => return Err(self.already_running()),
            LockState::Unlocked => {}
        }

        // A holder may delete the file between our open and our lock; retry
        // on a fresh file when the locked one is no longer linked.
        for _ in 0..3 {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&self.lock_path)
                .map_err(|e| BootError::workspace(&self.lock_path, e))?;

            if let Err(e) = file.try_lock_exclusive() {
                if is_contended(&e) {
                    self.state = LockState::Rejected;
                    let err = self.already_running();
                    tracing::error!(lock = %self.lock_path.display(), "Terminating: already running");
                    return Err(err);
                }
                return Err(BootError::workspace(&self.lock_path, e));
            }
            if !still_linked(&file, &self.lock_path) {
                continue;
            }

            record_pid(&file).map_err(|e| BootError::workspace(&self.lock_path, e))?;
            tracing::debug!(lock = %self.lock_path.display(), "instance lock acquired");
            self.file = Some(file);
            self.state = LockState::Locked;
            return Ok(());
        }
        Err(BootError::workspace(
            &self.lock_path,
            "lock file keeps disappearing",
        ))
    }

    /// Delete the lock file, then unlock. Safe to call repeatedly or without
    /// a prior acquire.
    ///
    /// The file is unlinked while still locked, so a waiter that locks the
    /// old file afterwards finds it unlinked and retries on a fresh one.
    pub fn release(&mut self) {
        let Some(file) = self.file.take() else {
            return;
        };
        let removed = fs::remove_file(&self.lock_path);
        if let Err(e) = FileExt::unlock(&file) {
            tracing::warn!("failed to unlock {}: {}", self.lock_path.display(), e);
        }
        drop(file);
        // Some platforms refuse to delete an open file
        let removed = match removed {
            Err(e) if e.kind() != io::ErrorKind::NotFound => fs::remove_file(&self.lock_path),
            other => other,
        };
        match removed {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                tracing::warn!("failed to remove {}: {}", self.lock_path.display(), e);
            }
            _ => {}
        }
        self.state = LockState::Unlocked;
        tracing::debug!(lock = %self.lock_path.display(), "instance lock released");
    }

    fn already_running(&self) -> BootError {
        BootError::AlreadyRunning {
            lock: self.lock_path.clone(),
            pid: read_pid(&self.lock_path),
        }
    }
}

impl Drop for SingleInstanceGuard {
    fn drop(&mut self) {
        self.release();
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

fn record_pid(mut file: &File) -> io::Result<()> {
    file.set_len(0)?;
    write!(file, "{}", std::process::id())?;
    file.sync_all()
}

fn read_pid(path: &Path) -> Option<u32> {
    let mut text = String::new();
    File::open(path).ok()?.read_to_string(&mut text).ok()?;
    text.trim().parse().ok()
}

#[cfg(unix)]
fn still_linked(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (file.metadata(), fs::metadata(path)) {
        (Ok(held), Ok(current)) => held.dev() == current.dev() && held.ino() == current.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn still_linked(_file: &File, path: &Path) -> bool {
    path.exists()
}

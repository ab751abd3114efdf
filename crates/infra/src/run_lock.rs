//! Exclusive run lock over a reports directory.
//!
//! Two runs writing to the same destination would race on natural-key
//! lookups and both create the same record, so every mutating command holds
//! this lock for its whole duration. The lock is a file holding the owner's
//! PID, created with `create_new` so that two processes cannot both take it.

use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use portalsync_domain::{MigrateError, Result};

use crate::errors::InfraError;

/// Name of the lock file inside the reports directory.
pub const LOCK_FILE_NAME: &str = "portalsync.lock";

/// Lock files held by this process. A file carrying our own PID is only a
/// conflict when it is listed here; otherwise it was left behind by an
/// earlier process that happened to get the same PID.
static HELD: Mutex<BTreeSet<PathBuf>> = Mutex::new(BTreeSet::new());

/// Who the existing lock file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Holder {
    /// A live process other than this one.
    Running(u32),
    /// Nothing holds it: dead owner, recycled PID or unreadable content.
    Abandoned,
}

/// Held run lock; released when dropped.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Take the lock in `directory`, creating the directory when missing.
    ///
    /// Fails with [`MigrateError::RunInProgress`] while another process (or
    /// another lock in this process) holds it. Abandoned lock files are
    /// replaced.
    pub fn acquire(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref();
        fs::create_dir_all(directory).map_err(InfraError::from)?;
        let path = directory.join(LOCK_FILE_NAME);
        let own_pid = std::process::id();

        let mut held = HELD.lock();
        if held.contains(&path) {
            return Err(MigrateError::RunInProgress { pid: own_pid });
        }

        match create_lock_file(&path, own_pid) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::AlreadyExists => match holder_of(&path, own_pid) {
                Holder::Running(pid) => {
                    tracing::warn!(pid, path = %path.display(), "run_lock.held_elsewhere");
                    return Err(MigrateError::RunInProgress { pid });
                }
                Holder::Abandoned => {
                    tracing::warn!(path = %path.display(), "run_lock.replacing_abandoned");
                    match fs::remove_file(&path) {
                        Ok(()) => {}
                        Err(err) if err.kind() == ErrorKind::NotFound => {}
                        Err(err) => return Err(InfraError::from(err).into()),
                    }
                    // A concurrent process may win the race after the removal.
                    create_lock_file(&path, own_pid).map_err(|err| {
                        if err.kind() == ErrorKind::AlreadyExists {
                            MigrateError::RunInProgress { pid: read_pid(&path).unwrap_or(0) }
                        } else {
                            InfraError::from(err).into()
                        }
                    })?;
                }
            },
            Err(err) => return Err(InfraError::from(err).into()),
        }

        held.insert(path.clone());
        tracing::info!(pid = own_pid, path = %path.display(), "run_lock.acquired");
        Ok(Self { path })
    }

    /// Location of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        HELD.lock().remove(&self.path);
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::info!(path = %self.path.display(), "run_lock.released"),
            Err(err) => {
                tracing::warn!(error = %err, path = %self.path.display(), "run_lock.release_failed")
            }
        }
    }
}

fn create_lock_file(path: &Path, pid: u32) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    writeln!(file, "{pid}")
}

fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn holder_of(path: &Path, own_pid: u32) -> Holder {
    match read_pid(path) {
        // Not in `HELD`, so an earlier process with a recycled PID wrote it.
        Some(pid) if pid == own_pid => Holder::Abandoned,
        Some(pid) if process_alive(pid) => Holder::Running(pid),
        _ => Holder::Abandoned,
    }
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(all(unix, not(target_os = "linux")))]
fn process_alive(pid: u32) -> bool {
    // Signal 0 only checks that the process exists.
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn process_alive(pid: u32) -> bool {
    tracing::warn!(pid, "run_lock.liveness_unknown");
    false
}

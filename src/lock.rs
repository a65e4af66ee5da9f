//! Single-instance lock file.
//!
//! The lock file holds the PID of the running bot. A lock left behind by a
//! process that no longer exists is taken over.

use crate::error::LockError;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
    released: bool,
}

impl LockFile {
    /// Take the lock at `path`, failing if a live process holds it.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, LockError> {
        let path = path.into();

        match std::fs::read_to_string(&path) {
            Ok(content) => {
                if let Ok(pid) = content.trim().parse::<u32>() {
                    if pid != std::process::id() && process_alive(pid) {
                        return Err(LockError::AlreadyRunning(pid));
                    }
                    warn!(path = %path.display(), pid, "Replacing stale lock file");
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        std::fs::write(&path, std::process::id().to_string())?;
        info!(path = %path.display(), pid = std::process::id(), "Lock acquired");
        Ok(Self {
            path,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the lock file.
    pub fn release(&mut self) -> Result<(), LockError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Lock released");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(error = %e, "Failed to remove lock file");
        }
    }
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

/// Without procfs there is no cheap liveness probe; treat the holder as alive.
#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}

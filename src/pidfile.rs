use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::LockError;

/// Lock file holding the running process id; removed on drop.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Create the lock, taking over a file left behind by a process that is gone.
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        let io_err = |source| LockError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut file = match create(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(path).map_err(io_err)?;
                match holder.trim().parse::<u32>() {
                    Ok(pid) if is_running(pid) => return Err(LockError::AlreadyRunning(path.to_path_buf())),
                    Ok(pid) => warn!("Removing stale lock {} left by process {pid}", path.display()),
                    Err(_) => warn!("Removing unreadable lock {}", path.display()),
                }
                fs::remove_file(path).map_err(io_err)?;
                // Losing this race to another starting instance still refuses.
                create(path).map_err(|e| match e.kind() {
                    ErrorKind::AlreadyExists => LockError::AlreadyRunning(path.to_path_buf()),
                    _ => io_err(e),
                })?
            }
            Err(e) => return Err(io_err(e)),
        };
        let lock = Self {
            path: path.to_path_buf(),
        };
        write!(file, "{}", std::process::id()).map_err(io_err)?;
        debug!("Wrote {}", path.display());
        Ok(lock)
    }
}

fn create(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

#[cfg(target_os = "linux")]
fn is_running(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

// Without procfs there is no cheap liveness check, so a recorded holder is trusted.
#[cfg(not(target_os = "linux"))]
fn is_running(_pid: u32) -> bool {
    true
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove {}: {e}", self.path.display());
        }
    }
}

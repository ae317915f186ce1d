//! PID-file management for the consumer daemon.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

/// The daemon's PID file, kept under the configured data directory.
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn in_dir(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("streamdrain.pid"),
        }
    }

    /// Record the current process in the PID file.
    pub fn write(&self) -> Result<()> {
        let pid = std::process::id();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("failed to create PID file directory")?;
        }
        fs::write(&self.path, pid.to_string()).context("failed to write PID file")?;
        info!(pid, path = %self.path.display(), "wrote PID file");
        Ok(())
    }

    /// The recorded PID, if the file exists.
    pub fn read(&self) -> Result<Option<u32>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path).context("failed to read PID file")?;
        let pid: u32 = contents
            .trim()
            .parse()
            .context("PID file contains invalid data")?;
        Ok(Some(pid))
    }

    pub fn remove(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).context("failed to remove PID file")?;
            info!(path = %self.path.display(), "removed PID file");
        }
        Ok(())
    }

    /// PID of a live daemon; a stale file is cleared along the way.
    pub fn running_pid(&self) -> Result<Option<u32>> {
        match self.read()? {
            Some(pid) if process_alive(pid) => Ok(Some(pid)),
            Some(_stale) => {
                self.remove()?;
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

/// Check whether a process with the given PID is alive.
fn process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        // Signal 0 sends nothing, it only probes for existence.
        unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}

/// Ask a running daemon to terminate and wait briefly for it to exit.
///
/// Returns `Ok(true)` when a daemon was stopped, `Ok(false)` when none was
/// running.
pub fn stop_daemon(data_dir: &Path) -> Result<bool> {
    let pid_file = PidFile::in_dir(data_dir);
    let Some(pid) = pid_file.running_pid()? else {
        return Ok(false);
    };

    info!(pid, "sending SIGTERM to consumer daemon");
    #[cfg(unix)]
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGTERM);
    }

    // The daemon drains and commits before exiting; give it a few seconds.
    for _ in 0..20 {
        std::thread::sleep(Duration::from_millis(250));
        if !process_alive(pid) {
            pid_file.remove()?;
            return Ok(true);
        }
    }
    anyhow::bail!("consumer daemon (PID {}) did not exit after SIGTERM", pid);
}

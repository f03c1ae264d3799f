use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

// ================ 配置与错误类型 ================

/// Upper bound on a single read from the pty master.
pub const MAX_READ_CHUNK: usize = 1024;

/// Interactive shell used when none is configured.
pub const DEFAULT_SHELL: &str = "/bin/bash";

#[derive(Debug, Clone)]
pub struct PtyConfig {
    /// Shell executable, either absolute or looked up on `PATH`.
    pub shell: PathBuf,
    /// How long the reaper waits after the hangup signal before sending SIGKILL.
    pub kill_grace: Duration,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL),
            kill_grace: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Error)]
pub enum PtyError {
    #[error("failed to spawn shell {shell}: {reason}")]
    Spawn { shell: String, reason: String },
    #[error("pty read failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("pty write failed: {0}")]
    Write(#[source] std::io::Error),
    #[error("pty master already released")]
    Released,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<nix::Error> for PtyError {
    fn from(errno: nix::Error) -> Self {
        PtyError::Io(std::io::Error::from(errno))
    }
}

/// Result of one readiness-driven read on the pty master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were placed at the front of the buffer.
    Data(usize),
    /// Every process attached to the slave side is gone and nothing is left to read.
    Eof,
}

/// How the shell process ended, as reported by the reaper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellExit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ShellExit {
    pub fn from_status(status: std::process::ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;

        Self {
            code: status.code(),
            signal: status.signal(),
        }
    }

    /// The reaper lost track of the child (wait itself failed).
    pub fn unknown() -> Self {
        Self {
            code: None,
            signal: None,
        }
    }
}

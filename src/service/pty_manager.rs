/// PTY manager for spawning shells
use tracing::{error, info};

use crate::app_state::SessionId;
use crate::pty::{self, PtyConfig, PtyError, PtyMaster, ShellProcess};

/// PTY manager responsible for creating pty/shell pairs
#[derive(Debug, Clone)]
pub struct PtyManager {
    config: PtyConfig,
}

impl PtyManager {
    /// Create a new PTY manager
    pub fn new(config: PtyConfig) -> Self {
        Self { config }
    }

    /// Shell path as configured
    pub fn shell(&self) -> String {
        self.config.shell.display().to_string()
    }

    /// Create a new PTY instance with a running shell
    pub fn create_pty(&self, session_id: SessionId) -> Result<(PtyMaster, ShellProcess), PtyError> {
        match pty::spawn_pty(&self.config) {
            Ok((master, process)) => {
                info!(%session_id, pid = process.pid(), "Created new PTY instance");
                Ok((master, process))
            }
            Err(e) => {
                error!(%session_id, "Failed to create PTY: {}", e);
                Err(e)
            }
        }
    }
}

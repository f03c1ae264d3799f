/// Configuration data structures for rs_webshell
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::pty::{DEFAULT_SHELL, PtyConfig};

/// Terminal configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct TerminalConfig {
    pub server: ServerConfig,
    pub shell: ShellConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

impl TerminalConfig {
    /// Check the values serde cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.http_port == 0 {
            return Err(ConfigError::InvalidStructure(
                "server.http_port must be non-zero".to_string(),
            ));
        }
        if self.session.outbound_queue_capacity == 0 {
            return Err(ConfigError::InvalidStructure(
                "session.outbound_queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.server.host, self.server.http_port);
        addr.parse()
            .map_err(|e| ConfigError::InvalidStructure(format!("invalid listen address {addr}: {e}")))
    }

    pub fn pty_config(&self) -> PtyConfig {
        PtyConfig {
            shell: self.shell.resolved_path(),
            kill_grace: self.session.kill_grace(),
        }
    }
}

/// HTTP listener
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8000,
        }
    }
}

/// Shell configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ShellConfig {
    /// Shell executable (optional, defaults to /bin/bash)
    pub path: Option<PathBuf>,
}

impl ShellConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SHELL))
    }
}

/// Per-session bridge tuning
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Output chunks buffered for a slow client before pty reads pause
    pub outbound_queue_capacity: usize,
    /// Delay between SIGHUP and SIGKILL for a shell that does not exit
    pub kill_grace_ms: u64,
    /// How long teardown keeps flushing queued output to the client
    pub drain_timeout_ms: u64,
    /// Bound on the transport close handshake
    pub close_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: 64,
            kill_grace_ms: 2000,
            drain_timeout_ms: 500,
            close_timeout_ms: 1000,
        }
    }
}

impl SessionConfig {
    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by RUST_LOG
    pub level: String,
    pub format: LogFormat,
    /// Also write daily rolling log files here
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            directory: None,
        }
    }
}

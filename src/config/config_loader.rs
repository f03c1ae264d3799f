/// Configuration file loader for rs_webshell
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::{ConfigError, LogFormat, TerminalConfig};

/// Names an explicit configuration file.
pub const CONFIG_PATH_ENV: &str = "WEBSHELL_CONFIG";

/// Configuration loader responsible for loading and parsing configuration files
#[derive(Debug, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self
    }

    /// Load configuration from a file, then apply `WEBSHELL_*` overrides from
    /// the process environment.
    pub fn load_config(&self, config_path: Option<&Path>) -> Result<TerminalConfig, ConfigError> {
        self.load_with(config_path, |name| std::env::var(name).ok())
    }

    /// Same as [`ConfigLoader::load_config`] with an explicit variable lookup.
    pub fn load_with<F>(&self, config_path: Option<&Path>, lookup: F) -> Result<TerminalConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // 处理配置文件路径: 显式路径必须存在, 默认路径可以缺失
        let explicit = config_path
            .map(Path::to_path_buf)
            .or_else(|| lookup(CONFIG_PATH_ENV).map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::FileNotFound(path.display().to_string()));
                }
                self.load_config_from_file(&path)?
            }
            None => {
                let path = default_config_path();
                if path.exists() {
                    info!("Using default configuration file path: {:?}", path);
                    self.load_config_from_file(&path)?
                } else {
                    info!("No configuration file found, using defaults");
                    TerminalConfig::default()
                }
            }
        };

        self.apply_overrides(&mut config, lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_config_from_file(&self, path: &Path) -> Result<TerminalConfig, ConfigError> {
        info!("Loading configuration from file: {:?}", path);

        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        self.parse_config(&contents)
    }

    /// Parse configuration from string content
    pub fn parse_config(&self, content: &str) -> Result<TerminalConfig, ConfigError> {
        let config = toml::from_str::<TerminalConfig>(content)?;
        info!("Configuration parsed successfully");
        Ok(config)
    }

    /// Apply environment overrides on top of the file values.
    pub fn apply_overrides<F>(&self, config: &mut TerminalConfig, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("WEBSHELL_HOST") {
            config.server.host = host;
        }
        if let Some(port) = lookup("WEBSHELL_PORT") {
            config.server.http_port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "WEBSHELL_PORT",
                value: port.clone(),
            })?;
        }
        if let Some(shell) = lookup("WEBSHELL_SHELL") {
            config.shell.path = Some(PathBuf::from(shell));
        }
        if let Some(format) = lookup("WEBSHELL_LOG_FORMAT") {
            config.logging.format = match format.to_ascii_lowercase().as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        name: "WEBSHELL_LOG_FORMAT",
                        value: format,
                    });
                }
            };
        }
        if let Some(dir) = lookup("WEBSHELL_LOG_DIR") {
            config.logging.directory = Some(PathBuf::from(dir));
        }
        Ok(())
    }
}

/// Default configuration path, relative to the working directory
pub fn default_config_path() -> PathBuf {
    PathBuf::from("config.toml")
}

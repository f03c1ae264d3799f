/// Configuration module for the web shell
mod config;
mod config_loader;
mod error;
mod logging;

pub use config::*;
pub use config_loader::{CONFIG_PATH_ENV, ConfigLoader, default_config_path};
pub use error::ConfigError;
pub use logging::init_logging;

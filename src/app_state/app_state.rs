/// Application state shared by the HTTP handlers
use std::sync::Arc;

use crate::app_state::FileStore;
use crate::config::TerminalConfig;
use crate::service::SessionManager;

/// Application state containing shared data across handlers
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<TerminalConfig>,
    /// Terminal sessions and their registry
    pub sessions: SessionManager,
    /// Editor files, unrelated to sessions
    pub files: FileStore,
}

impl AppState {
    /// Create a new instance of AppState with configuration
    pub fn new(config: TerminalConfig) -> Self {
        let sessions = SessionManager::new(&config);
        Self {
            config: Arc::new(config),
            sessions,
            files: FileStore::seeded(),
        }
    }
}

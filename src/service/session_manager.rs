/// Session manager for creating and closing terminal sessions
use std::time::Duration;

use tracing::{info, warn};

use crate::app_state::{CloseReason, SessionId, SessionRegistry, SessionSnapshot, StateCell};
use crate::config::TerminalConfig;
use crate::service::{PtyManager, SessionError, SessionSettings, TerminalSession};

/// Session manager responsible for the lifecycle entry points
#[derive(Debug, Clone)]
pub struct SessionManager {
    registry: SessionRegistry,
    pty: PtyManager,
    settings: SessionSettings,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(config: &TerminalConfig) -> Self {
        Self::with_parts(
            PtyManager::new(config.pty_config()),
            SessionSettings::from(&config.session),
            SessionRegistry::new(),
        )
    }

    pub fn with_parts(pty: PtyManager, settings: SessionSettings, registry: SessionRegistry) -> Self {
        Self {
            registry,
            pty,
            settings,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Spawns a shell for a new session.
    ///
    /// On failure nothing was allocated and nothing is registered. The session
    /// is only registered once a connection is attached to it.
    pub fn open(&self) -> Result<TerminalSession, SessionError> {
        let id = SessionId::new_v4();
        let state = StateCell::new();
        let (master, process) = self.pty.create_pty(id)?;
        Ok(TerminalSession::new(
            id,
            self.pty.shell(),
            master,
            process,
            state,
            self.settings,
            self.registry.clone(),
        ))
    }

    /// Get all sessions
    pub async fn list(&self) -> Vec<SessionSnapshot> {
        self.registry.snapshots().await
    }

    /// Get a session by ID
    pub async fn get(&self, id: &SessionId) -> Result<SessionSnapshot, SessionError> {
        self.registry
            .get(id)
            .await
            .map(|handle| handle.snapshot())
            .ok_or(SessionError::NotFound(*id))
    }

    /// Asks a live session to close.
    ///
    /// Returns `false` when the session was already closing for another reason.
    pub async fn close(&self, id: &SessionId) -> Result<bool, SessionError> {
        let delivered = self
            .registry
            .request_close(id, CloseReason::Requested)
            .await
            .ok_or(SessionError::NotFound(*id))?;
        info!(session_id = %id, delivered, "Close requested");
        Ok(delivered)
    }

    /// Closes every live session and waits, bounded, for them to finish.
    /// Returns how many sessions were live.
    pub async fn shutdown(&self, timeout: Duration) -> usize {
        let count = self.registry.close_all(CloseReason::Shutdown).await;
        if count > 0 {
            info!("Closing {} session(s) for shutdown", count);
        }
        if !self.registry.wait_until_empty(timeout).await {
            let remaining = self.registry.len().await;
            warn!(remaining, "Sessions still open after shutdown timeout");
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::SessionState;
    use crate::protocol::channel_pair;
    use std::path::PathBuf;

    fn manager(shell: &str) -> SessionManager {
        let mut config = TerminalConfig::default();
        config.shell.path = Some(PathBuf::from(shell));
        SessionManager::new(&config)
    }

    #[tokio::test]
    async fn test_open_with_missing_shell_fails_without_registering() {
        let manager = manager("/no/such/shell");
        let err = manager.open().err().unwrap();
        assert!(err.is_spawn_error());
        assert!(manager.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_external_close_through_manager() {
        let manager = manager("/bin/sh");
        let session = manager.open().unwrap();
        let id = session.id();
        let (connection, _client) = channel_pair(16);
        let running = tokio::spawn(session.run(connection));

        // registration happens inside run
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while manager.get(&id).await.is_err() {
            assert!(tokio::time::Instant::now() < deadline);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(manager.get(&id).await.unwrap().state, SessionState::Running);

        assert!(manager.close(&id).await.unwrap());
        let report = running.await.unwrap().unwrap();
        assert_eq!(report.reason, CloseReason::Requested);
        assert!(matches!(manager.close(&id).await, Err(SessionError::NotFound(_))));
    }

    #[test]
    fn test_shutdown_future_is_send() {
        // axum's graceful shutdown runs it on any worker thread
        fn assert_send<T: Send>(_: &T) {}
        let manager = manager("/bin/sh");
        let shutdown = manager.shutdown(Duration::from_millis(10));
        assert_send(&shutdown);
    }

    #[tokio::test]
    async fn test_shutdown_closes_everything() {
        let manager = manager("/bin/sh");
        let mut tasks = Vec::new();
        for _ in 0..3 {
            let mut session = manager.open().unwrap();
            let (connection, client) = channel_pair(16);
            session.attach(connection).await.unwrap();
            tasks.push(tokio::spawn(async move {
                let _client = client;
                let reason = session.wait_for_close().await;
                session.close(reason).await
            }));
        }
        assert_eq!(manager.registry().len().await, 3);

        assert_eq!(manager.shutdown(Duration::from_secs(5)).await, 3);
        assert!(manager.registry().is_empty().await);
        for task in tasks {
            let report = task.await.unwrap().unwrap();
            assert_eq!(report.reason, CloseReason::Shutdown);
        }
    }
}

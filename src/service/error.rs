/// Error types for the service layer
use thiserror::Error;

use crate::app_state::{SessionId, SessionState};

/// Service layer error type
#[derive(Error, Debug)]
pub enum SessionError {
    /// PTY error, including a failed spawn
    #[error("PTY error: {0}")]
    Pty(#[from] crate::pty::PtyError),

    /// No live session with this id
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    /// Operation not allowed in the session's current state
    #[error("Session {id} is {state:?}, cannot {operation}")]
    InvalidState {
        id: SessionId,
        state: SessionState,
        operation: &'static str,
    },
}

impl SessionError {
    /// True when the shell could not be started at all.
    pub fn is_spawn_error(&self) -> bool {
        matches!(self, SessionError::Pty(crate::pty::PtyError::Spawn { .. }))
    }
}

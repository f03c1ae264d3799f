/// Terminal session identity, state machine and shared handle
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::protocol::ConnectionType;

pub type SessionId = Uuid;

/// Terminal session state.
///
/// Ordered: a session only ever moves forward through these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Shell requested, bridge not armed yet
    Created,
    /// Shell spawned and both directions flowing
    Running,
    /// A close trigger fired, teardown in progress
    Closing,
    /// Teardown finished
    Closed,
}

/// Why a session ended. The first one reported wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// EOF on the pty master: the shell and everything on its terminal exited.
    ProcessExited,
    ReadError,
    WriteError,
    /// The client closed the connection or sent a close frame.
    ClientDisconnected,
    /// Receiving from or sending to the client failed.
    TransportError,
    /// Closed through the session API.
    Requested,
    /// Server shutdown.
    Shutdown,
}

impl CloseReason {
    pub fn is_abnormal(self) -> bool {
        matches!(
            self,
            CloseReason::ReadError | CloseReason::WriteError | CloseReason::TransportError
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CloseReason::ProcessExited => "process_exited",
            CloseReason::ReadError => "read_error",
            CloseReason::WriteError => "write_error",
            CloseReason::ClientDisconnected => "client_disconnected",
            CloseReason::TransportError => "transport_error",
            CloseReason::Requested => "requested",
            CloseReason::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ================ 状态机 ================

/// Owner side of a session's state. Transitions are monotonic.
#[derive(Debug)]
pub struct StateCell {
    tx: watch::Sender<SessionState>,
}

impl StateCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionState::Created);
        Self { tx }
    }

    /// Moves to `next` if it is later than the current state.
    /// Returns `false` for a repeated or backward transition.
    pub fn advance(&self, next: SessionState) -> bool {
        self.tx.send_if_modified(|current| {
            if next > *current {
                *current = next;
                true
            } else {
                false
            }
        })
    }

    pub fn current(&self) -> SessionState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-shot close trigger shared by every task of one session.
///
/// Only the first [`CloseTrigger::fire`] is delivered to the supervisor;
/// everything after it is a no-op that returns `false`.
#[derive(Debug, Clone)]
pub struct CloseTrigger {
    tx: mpsc::Sender<CloseReason>,
    reason: Arc<OnceLock<CloseReason>>,
}

impl CloseTrigger {
    pub fn new() -> (Self, mpsc::Receiver<CloseReason>) {
        let (tx, rx) = mpsc::channel(1);
        let trigger = Self {
            tx,
            reason: Arc::new(OnceLock::new()),
        };
        (trigger, rx)
    }

    pub fn fire(&self, reason: CloseReason) -> bool {
        if self.reason.set(reason).is_err() {
            return false;
        }
        // Capacity 1 and a single winner, so this cannot be full. If the
        // supervisor is gone the reason is still recorded.
        let _ = self.tx.try_send(reason);
        true
    }

    /// The winning reason, once one fired.
    pub fn reason(&self) -> Option<CloseReason> {
        self.reason.get().copied()
    }
}

// ================ 会话句柄 ================

/// Registry-side view of a live session.
///
/// Holds no pty or transport resources, only the means to observe the session
/// and ask it to close.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: SessionId,
    pub pid: u32,
    pub shell: String,
    pub connection_type: ConnectionType,
    /// UNIX epoch seconds
    pub created_at: u64,
    state: watch::Receiver<SessionState>,
    trigger: CloseTrigger,
}

impl SessionHandle {
    pub fn new(
        id: SessionId,
        pid: u32,
        shell: String,
        connection_type: ConnectionType,
        state: watch::Receiver<SessionState>,
        trigger: CloseTrigger,
    ) -> Self {
        Self {
            id,
            pid,
            shell,
            connection_type,
            created_at: unix_now(),
            state,
            trigger,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.trigger.reason()
    }

    /// Ask the session to close. `false` if another trigger already won.
    pub fn request_close(&self, reason: CloseReason) -> bool {
        self.trigger.fire(reason)
    }

    /// Resolves once the session reached [`SessionState::Closed`] or its
    /// state owner went away.
    pub async fn wait_closed(&self) {
        let mut state = self.state.clone();
        let _ = state.wait_for(|s| *s == SessionState::Closed).await;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            state: self.state(),
            pid: self.pid,
            shell: self.shell.clone(),
            connection_type: self.connection_type,
            created_at: self.created_at,
            close_reason: self.close_reason(),
        }
    }
}

/// Point-in-time copy of a session's public fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub state: SessionState,
    pub pid: u32,
    pub shell: String,
    pub connection_type: ConnectionType,
    pub created_at: u64,
    pub close_reason: Option<CloseReason>,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_only_moves_forward() {
        let cell = StateCell::new();
        assert_eq!(cell.current(), SessionState::Created);
        assert!(cell.advance(SessionState::Running));
        assert!(cell.advance(SessionState::Closing));
        assert!(!cell.advance(SessionState::Running));
        assert!(!cell.advance(SessionState::Closing));
        assert!(cell.advance(SessionState::Closed));
        assert!(!cell.advance(SessionState::Closed));
        assert_eq!(cell.current(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_first_close_trigger_wins() {
        let (trigger, mut rx) = CloseTrigger::new();
        let other = trigger.clone();

        assert!(trigger.fire(CloseReason::ProcessExited));
        assert!(!other.fire(CloseReason::ClientDisconnected));
        assert!(!trigger.fire(CloseReason::Requested));

        assert_eq!(rx.recv().await, Some(CloseReason::ProcessExited));
        assert!(rx.try_recv().is_err());
        assert_eq!(other.reason(), Some(CloseReason::ProcessExited));
    }

    #[test]
    fn test_fire_after_supervisor_gone_still_records() {
        let (trigger, rx) = CloseTrigger::new();
        drop(rx);
        assert!(trigger.fire(CloseReason::Shutdown));
        assert_eq!(trigger.reason(), Some(CloseReason::Shutdown));
    }

    #[test]
    fn test_snapshot_reflects_state_and_reason() {
        let cell = StateCell::new();
        let (trigger, _rx) = CloseTrigger::new();
        let handle = SessionHandle::new(
            SessionId::new_v4(),
            4242,
            "/bin/sh".to_string(),
            ConnectionType::Channel,
            cell.subscribe(),
            trigger,
        );
        cell.advance(SessionState::Running);
        assert!(handle.request_close(CloseReason::Requested));

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.state, SessionState::Running);
        assert_eq!(snapshot.close_reason, Some(CloseReason::Requested));
        assert_eq!(snapshot.pid, 4242);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["state"], "running");
        assert_eq!(json["close_reason"], "requested");
    }

    #[test]
    fn test_abnormal_reasons() {
        assert!(CloseReason::ReadError.is_abnormal());
        assert!(CloseReason::TransportError.is_abnormal());
        assert!(!CloseReason::ProcessExited.is_abnormal());
        assert_eq!(CloseReason::ClientDisconnected.to_string(), "client_disconnected");
    }
}

/// Session registry: the only state shared between sessions
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::app_state::{CloseReason, SessionHandle, SessionId, SessionSnapshot};

/// Map of live sessions by id. Every access goes through one lock.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<SessionId, SessionHandle>>>,
    emptied: Arc<Notify>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, handle: SessionHandle) {
        let mut sessions = self.sessions.lock().await;
        debug!(session_id = %handle.id, "Registering session");
        sessions.insert(handle.id, handle);
    }

    pub async fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        let sessions = self.sessions.lock().await;
        sessions.get(id).cloned()
    }

    /// Removes a session. Removing an unknown id is a no-op.
    pub async fn remove(&self, id: &SessionId) -> Option<SessionHandle> {
        let mut sessions = self.sessions.lock().await;
        let removed = sessions.remove(id);
        if removed.is_some() {
            debug!(session_id = %id, remaining = sessions.len(), "Deregistered session");
        }
        if sessions.is_empty() {
            self.emptied.notify_waiters();
        }
        removed
    }

    /// Snapshots of every registered session, oldest first.
    pub async fn snapshots(&self) -> Vec<SessionSnapshot> {
        let sessions = self.sessions.lock().await;
        let mut snapshots: Vec<_> = sessions.values().map(SessionHandle::snapshot).collect();
        snapshots.sort_by_key(|s| (s.created_at, s.id));
        snapshots
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Fires the close trigger of one session.
    ///
    /// `None` for an unknown id, otherwise whether this request was the one
    /// that closed it.
    pub async fn request_close(&self, id: &SessionId, reason: CloseReason) -> Option<bool> {
        let sessions = self.sessions.lock().await;
        sessions.get(id).map(|handle| handle.request_close(reason))
    }

    /// Fires the close trigger of every session; returns how many were live.
    pub async fn close_all(&self, reason: CloseReason) -> usize {
        let sessions = self.sessions.lock().await;
        for handle in sessions.values() {
            handle.request_close(reason);
        }
        sessions.len()
    }

    /// Waits until no session is registered. `false` on timeout.
    pub async fn wait_until_empty(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.emptied.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.is_empty().await {
                    return;
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }
}

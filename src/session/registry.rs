//! Process-wide index of live sessions

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, RwLock};
use uuid::Uuid;

use super::Liveness;

/// What the registry keeps for one session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    /// Signalled to ask the session to close
    pub closer: Arc<Notify>,
    pub liveness: Arc<Liveness>,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
    draining: AtomicBool,
}

/// Live sessions, for health reporting and shutdown
///
/// Only handles are shared; session state itself stays with its connection.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Inner>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session; returns its close signal, or `None` once shutdown began
    pub async fn register(&self, id: Uuid, liveness: Arc<Liveness>) -> Option<Arc<Notify>> {
        let mut sessions = self.inner.sessions.write().await;
        if self.inner.draining.load(Ordering::Acquire) {
            return None;
        }
        let closer = Arc::new(Notify::new());
        sessions.insert(
            id,
            SessionHandle {
                closer: Arc::clone(&closer),
                liveness,
            },
        );
        tracing::debug!(session_id = %id, live = sessions.len(), "session registered");
        Some(closer)
    }

    pub async fn deregister(&self, id: Uuid) {
        let mut sessions = self.inner.sessions.write().await;
        if sessions.remove(&id).is_some() {
            tracing::debug!(session_id = %id, live = sessions.len(), "session deregistered");
        }
    }

    /// Whether new connections are still accepted
    #[must_use]
    pub fn is_accepting(&self) -> bool {
        !self.inner.draining.load(Ordering::Acquire)
    }

    /// Refuse new sessions from now on
    pub fn begin_shutdown(&self) {
        self.inner.draining.store(true, Ordering::Release);
    }

    /// Ask every session to close and wait up to `grace` for them to go
    ///
    /// Returns the number of sessions still registered when the wait ended.
    pub async fn close_all(&self, grace: Duration) -> usize {
        self.begin_shutdown();

        {
            let sessions = self.inner.sessions.read().await;
            tracing::info!(sessions = sessions.len(), "closing sessions");
            for handle in sessions.values() {
                handle.closer.notify_one();
            }
        }

        let drained = tokio::time::timeout(grace, async {
            while !self.inner.sessions.read().await.is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

        let remaining = self.len().await;
        if drained.is_err() {
            tracing::warn!(remaining, "sessions still open after grace period");
        }
        remaining
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.inner.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.sessions.read().await.is_empty()
    }

    /// Sessions whose last ping went unanswered
    pub async fn stale_count(&self) -> usize {
        self.inner
            .sessions
            .read()
            .await
            .values()
            .filter(|h| !h.liveness.is_alive())
            .count()
    }
}

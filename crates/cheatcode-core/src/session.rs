//! Per-client conversation histories for the HTTP front end.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::chain::Turn;
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug)]
struct Session {
    history: Vec<Turn>,
    last_active: Instant,
}

/// Conversation histories keyed by session, expiring after a period of inactivity.
///
/// The lock is only held for bookkeeping; callers copy the history out, run
/// the chain, and append the resulting turn afterwards.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, Session>>,
    ttl: Duration,
}

impl SessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn create(&self) -> SessionId {
        let id = SessionId::new();
        self.sessions.lock().await.insert(
            id,
            Session {
                history: Vec::new(),
                last_active: Instant::now(),
            },
        );
        tracing::debug!(session = %id, "session created");
        id
    }

    /// Snapshot of the session's turns, oldest first. Refreshes its expiry.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` if the session does not exist or has expired.
    pub async fn history(&self, id: SessionId) -> Result<Vec<Turn>, CoreError> {
        let mut sessions = self.sessions.lock().await;
        let session = self.live_session(&mut sessions, id)?;
        session.last_active = Instant::now();
        Ok(session.history.clone())
    }

    /// # Errors
    ///
    /// Returns `SessionNotFound` if the session does not exist or has expired.
    pub async fn append_turn(&self, id: SessionId, turn: Turn) -> Result<(), CoreError> {
        let mut sessions = self.sessions.lock().await;
        let session = self.live_session(&mut sessions, id)?;
        session.history.push(turn);
        session.last_active = Instant::now();
        Ok(())
    }

    /// Remove a session. Returns whether it existed.
    pub async fn close(&self, id: SessionId) -> bool {
        let removed = self.sessions.lock().await.remove(&id).is_some();
        if removed {
            tracing::debug!(session = %id, "session closed");
        }
        removed
    }

    /// Drop every expired session, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let ttl = self.ttl;
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.last_active.elapsed() < ttl);
        let purged = before - sessions.len();
        if purged > 0 {
            tracing::debug!(purged, "expired sessions purged");
        }
        purged
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    fn live_session<'a>(
        &self,
        sessions: &'a mut HashMap<SessionId, Session>,
        id: SessionId,
    ) -> Result<&'a mut Session, CoreError> {
        let expired = sessions
            .get(&id)
            .is_some_and(|s| s.last_active.elapsed() >= self.ttl);
        if expired {
            sessions.remove(&id);
            tracing::debug!(session = %id, "session expired");
        }
        sessions.get_mut(&id).ok_or(CoreError::SessionNotFound(id))
    }
}

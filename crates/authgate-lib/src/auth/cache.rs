// ============================
// authgate-lib/src/auth/cache.rs
// ============================
//! The in-memory session tier.
//!
//! All mutation and iteration of the session list happens under one
//! coarse lock, so concurrent lookups never observe a torn list and
//! the cache never holds two records for the same token. The linear
//! scan is fine for the modest session counts a single server handles.
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;

use super::session::Session;

/// In-process cache of active sessions.
#[derive(Clone, Default)]
pub struct SessionCache {
    sessions: Arc<RwLock<Vec<Session>>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session, replacing any existing record with the same
    /// token.
    pub async fn add(&self, session: Session) {
        let mut sessions = self.sessions.write().await;
        sessions.retain(|s| s.token != session.token);
        sessions.push(session);
    }

    /// Find a live session by token. Dead records are never returned.
    pub async fn find_alive(&self, token: &str, lifetime: Duration) -> Option<Session> {
        let sessions = self.sessions.read().await;
        sessions
            .iter()
            .find(|s| s.token == token && s.is_alive(lifetime))
            .cloned()
    }

    /// Refresh `last_access` on a live session and return the updated
    /// record. Revalidating a dead record is a no-op: it stays dead
    /// and `None` is returned.
    pub async fn touch(&self, token: &str, lifetime: Duration) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.iter_mut().find(|s| s.token == token)?;
        if !session.is_alive(lifetime) {
            return None;
        }
        session.last_access = Utc::now();
        Some(session.clone())
    }

    /// Remove every record with the given token. Returns how many
    /// records were dropped.
    pub async fn remove(&self, token: &str) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|s| s.token != token);
        before - sessions.len()
    }

    /// Tokens of every record that has outlived the lifetime window.
    pub async fn dead_tokens(&self, lifetime: Duration) -> Vec<String> {
        let sessions = self.sessions.read().await;
        sessions
            .iter()
            .filter(|s| !s.is_alive(lifetime))
            .map(|s| s.token.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

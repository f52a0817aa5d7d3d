// ============================
// authgate-lib/src/auth/session.rs
// ============================
//! Session records and their liveness model.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Cookie name under which the transport layer carries the session
/// token. Exported so HTTP front ends and clients agree on it.
pub const SESSION_COOKIE_NAME: &str = "__authgate_session__";

/// A session for an authenticated, privileged client connection.
///
/// `token`, `username` and `is_root` never change after creation;
/// `groups` is only replaced by a fresh validation result and
/// `last_access` moves forward on every successful revalidation. The
/// session lifetime is shared manager configuration, not per-record
/// state, which is why [`Session::is_alive`] takes it as a parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub groups: Vec<String>,
    pub is_root: bool,
    pub last_access: DateTime<Utc>,
}

impl Session {
    pub fn new(token: String, username: String, groups: Vec<String>, is_root: bool) -> Self {
        Self {
            token,
            username,
            groups,
            is_root,
            last_access: Utc::now(),
        }
    }

    /// Whether the session is within its sliding lifetime window.
    ///
    /// Once a session has not been accessed for longer than the
    /// lifetime it cannot be resurrected; the user has to log in to a
    /// brand-new session.
    pub fn is_alive(&self, lifetime: Duration) -> bool {
        Utc::now() - self.last_access <= lifetime
    }
}

/// Client-facing authentication prompt data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Realm {
    /// Name shown when prompting for credentials
    pub name: String,
    /// Message shown on failed authentication
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_session_is_alive() {
        let session = Session::new(
            "token".to_string(),
            "alice".to_string(),
            vec!["dev".to_string()],
            false,
        );
        assert!(session.is_alive(Duration::seconds(60)));
    }

    #[test]
    fn test_session_dies_past_lifetime() {
        let mut session = Session::new("token".to_string(), "alice".to_string(), vec![], false);
        session.last_access = Utc::now() - Duration::seconds(95);

        assert!(!session.is_alive(Duration::seconds(60)));
        // A longer window keeps the same record alive.
        assert!(session.is_alive(Duration::seconds(120)));
    }
}

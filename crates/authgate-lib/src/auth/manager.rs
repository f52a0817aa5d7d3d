// ============================
// authgate-lib/src/auth/manager.rs
// ============================
//! Session manager orchestration.
//!
//! Ties the validator chain, the token issuer, the in-memory cache and
//! the optional durable store together. Durable-store failures never
//! fail the caller's request: the affected operation logs once and
//! behaves as if the store were temporarily absent, so sessions keep
//! working in-memory for the current process.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use crate::config::AuthSettings;
use crate::error::AuthError;
use crate::store::{SessionRecord, SessionStore};

use super::cache::SessionCache;
use super::session::{Realm, Session};
use super::token::generate_session_token;
use super::validators::{Backends, ValidatorSet};

/// What a login attempt resolved to.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    /// Authentication is disabled; no session is needed
    NotRequired,
    /// No enabled backend accepted the credentials
    Rejected,
    /// A live session, newly created or revalidated
    Established(Session),
}

impl LoginOutcome {
    pub fn session(self) -> Option<Session> {
        match self {
            LoginOutcome::Established(session) => Some(session),
            _ => None,
        }
    }
}

/// Provides the functionality required to handle user authentication
/// on the server.
pub struct SessionManager {
    enabled: bool,
    lifetime: Duration,
    logins_until_cleanup: u64,
    realm: Realm,
    validators: ValidatorSet,
    cache: SessionCache,
    logins_since_prune: AtomicU64,
    store: RwLock<Option<Arc<dyn SessionStore>>>,
}

impl SessionManager {
    /// Initialise a new session manager.
    ///
    /// `root_hash` is the SHA-256 hex digest of the superuser
    /// credential string, injected by the host rather than read from
    /// configuration. `force_auth` enables the manager even if the
    /// configuration disables authentication.
    pub fn new(
        settings: AuthSettings,
        root_hash: Option<String>,
        backends: Backends,
        force_auth: bool,
    ) -> Result<Self, AuthError> {
        settings.validate()?;

        let mut settings = settings;
        if force_auth && !settings.enabled {
            debug!("authentication was force-enabled");
            settings.enabled = true;
        }
        if settings.soft_expire.is_some() {
            debug!("found deprecated 'soft_expire' key in authentication settings; ignoring it");
        }

        let validators = ValidatorSet::new(&settings, root_hash, backends);

        let mut enabled = settings.enabled;
        if enabled && !validators.has_enabled_method() {
            if force_auth {
                warn!(
                    "authentication was manually enabled, but no usable \
                     authentication backends are configured; the server will \
                     only accept the master superuser (root) credentials"
                );
            } else {
                warn!(
                    "authentication is enabled but no usable authentication \
                     backends are configured; falling back to no authentication"
                );
                enabled = false;
            }
        }

        Ok(Self {
            enabled,
            lifetime: Duration::seconds(settings.session_lifetime as i64),
            logins_until_cleanup: settings.logins_until_cleanup,
            realm: Realm {
                name: settings.realm_name.clone(),
                error: settings.realm_error.clone(),
            },
            validators,
            cache: SessionCache::new(),
            logins_since_prune: AtomicU64::new(0),
            store: RwLock::new(None),
        })
    }

    /// Attach a durable store, or detach it with `None`.
    pub async fn set_store(&self, store: Option<Arc<dyn SessionStore>>) {
        *self.store.write().await = store;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    /// Number of records currently held in the in-memory tier, dead
    /// ones included until they are swept.
    pub async fn active_session_count(&self) -> usize {
        self.cache.len().await
    }

    /// Authenticate a credential string and bind it to a session.
    ///
    /// An existing live session for the resolved token is revalidated
    /// instead of creating a second one; repeated logins by the same
    /// user therefore share one token as long as a durable store is
    /// attached to look it up in.
    pub async fn create_or_get_session(&self, credentials: &str) -> LoginOutcome {
        if !self.enabled {
            return LoginOutcome::NotRequired;
        }

        let logins = self.logins_since_prune.fetch_add(1, Ordering::SeqCst) + 1;
        if logins >= self.logins_until_cleanup {
            self.cleanup().await;
        }

        let Some(validation) = self.validators.validate(credentials) else {
            return LoginOutcome::Rejected;
        };

        // Reuse the first stored token of this user, if any; otherwise
        // mint a fresh one.
        let token = self
            .stored_tokens(&validation.username)
            .await
            .into_iter()
            .next()
            .unwrap_or_else(generate_session_token);

        if let Some(session) = self.cache.touch(&token, self.lifetime).await {
            self.push_last_access(&session).await;
            return LoginOutcome::Established(session);
        }

        let session = Session::new(
            token,
            validation.username,
            validation.groups,
            validation.is_root,
        );
        self.cache.add(session.clone()).await;

        if let Some(store) = self.store().await {
            if let Err(err) = store.insert(&SessionRecord::from(&session)).await {
                error!(error = %err, "couldn't store the login record in the durable store");
            }
        }

        LoginOutcome::Established(session)
    }

    /// Retrieve the live session for a token, refreshing its
    /// last-access timestamp.
    ///
    /// Falls back to the durable store when the token is unknown
    /// locally and promotes the stored record into the cache; its root
    /// flag is recomputed from the system permission table. A dead or
    /// unknown token is invalidated on the way out (lazy expiry).
    pub async fn get_session(&self, token: &str) -> Option<Session> {
        if !self.enabled {
            return None;
        }

        if let Some(session) = self.cache.touch(token, self.lifetime).await {
            self.push_last_access(&session).await;
            return Some(session);
        }

        if let Some(record) = self.load_stored(token).await {
            if let Some(session) = self.promote(record).await {
                return Some(session);
            }
        }

        self.invalidate(token).await;
        None
    }

    /// Remove a token's session from both tiers.
    ///
    /// Idempotent: invalidating an unknown token succeeds. A failed
    /// durable deletion is reported as `false`, but the local removal
    /// is not rolled back.
    pub async fn invalidate(&self, token: &str) -> bool {
        self.cache.remove(token).await;

        if let Some(store) = self.store().await {
            if let Err(err) = store.delete(token).await {
                error!(token, error = %err, "couldn't invalidate the session in the durable store");
                return false;
            }
        }

        true
    }

    /// Batch-remove every dead in-memory session and reset the login
    /// counter. Dead records that only exist in the durable store are
    /// swept lazily by [`SessionManager::get_session`] instead.
    pub async fn cleanup(&self) {
        let dead = self.cache.dead_tokens(self.lifetime).await;
        self.logins_since_prune.store(0, Ordering::SeqCst);

        for token in dead {
            self.invalidate(&token).await;
        }
    }

    /// Turn a stored record into a cached session, provided it is
    /// still alive.
    async fn promote(&self, record: SessionRecord) -> Option<Session> {
        let mut session = Session {
            token: record.token.clone(),
            username: record.user_name.clone(),
            groups: record.group_list(),
            is_root: false,
            last_access: record.last_access,
        };
        if !session.is_alive(self.lifetime) {
            return None;
        }

        session.is_root = self.stored_superuser(&record.user_name).await;

        self.cache.add(session.clone()).await;
        // Promotion counts as an access; refresh both tiers.
        let session = self.cache.touch(&session.token, self.lifetime).await?;
        self.push_last_access(&session).await;
        Some(session)
    }

    async fn store(&self) -> Option<Arc<dyn SessionStore>> {
        self.store.read().await.clone()
    }

    /// Every stored token of a user, or an empty list when the store
    /// is absent or failing.
    async fn stored_tokens(&self, user_name: &str) -> Vec<String> {
        let Some(store) = self.store().await else {
            return Vec::new();
        };
        match store.tokens_for_user(user_name).await {
            Ok(tokens) => tokens,
            Err(err) => {
                error!(user = user_name, error = %err, "couldn't check the login in the durable store");
                Vec::new()
            }
        }
    }

    async fn load_stored(&self, token: &str) -> Option<SessionRecord> {
        let store = self.store().await?;
        match store.load(token).await {
            Ok(record) => record,
            Err(err) => {
                error!(token, error = %err, "couldn't load the session from the durable store");
                None
            }
        }
    }

    async fn stored_superuser(&self, user_name: &str) -> bool {
        let Some(store) = self.store().await else {
            return false;
        };
        match store.is_superuser(user_name).await {
            Ok(is_root) => is_root,
            Err(err) => {
                error!(user = user_name, error = %err, "couldn't check the system permission table");
                false
            }
        }
    }

    /// Propagate a refreshed last-access timestamp to the durable
    /// store.
    async fn push_last_access(&self, session: &Session) {
        if let Some(store) = self.store().await {
            if let Err(err) = store.touch(&session.token, session.last_access).await {
                error!(token = %session.token, error = %err, "couldn't update the usage timestamp in the durable store");
            }
        }
    }
}

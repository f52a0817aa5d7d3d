// ==========================
// tests/manager_tests.rs
// ==========================
//! Integration tests for the session manager.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use authgate_lib::config::{AuthSettings, DictionarySettings};
use authgate_lib::{
    hash_credentials, Backends, FlatFileStore, LoginOutcome, Session, SessionManager,
    SessionRecord, SessionStore, StoreError,
};
use chrono::{DateTime, Duration, Utc};
use tempfile::tempdir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("authgate_lib=debug")
        .try_init();
}

/// Dictionary-only settings: alice/dev, plain bob.
fn dict_settings(lifetime_secs: u64, logins_until_cleanup: u64) -> AuthSettings {
    AuthSettings {
        enabled: true,
        session_lifetime: lifetime_secs,
        logins_until_cleanup,
        method_dictionary: DictionarySettings {
            enabled: true,
            auths: vec!["alice:secret".to_string(), "bob:pw".to_string()],
            groups: HashMap::from([("alice".to_string(), vec!["dev".to_string()])]),
        },
        ..AuthSettings::default()
    }
}

fn manager(settings: AuthSettings) -> SessionManager {
    SessionManager::new(settings, None, Backends::default(), false).unwrap()
}

async fn login(manager: &SessionManager, credentials: &str) -> Session {
    match manager.create_or_get_session(credentials).await {
        LoginOutcome::Established(session) => session,
        other => panic!("expected an established session, got {other:?}"),
    }
}

/// A durable store that fails every call, simulating an outage.
struct FailingStore;

#[async_trait]
impl SessionStore for FailingStore {
    async fn tokens_for_user(&self, _user_name: &str) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Unavailable("store is down".to_string()))
    }

    async fn load(&self, _token: &str) -> Result<Option<SessionRecord>, StoreError> {
        Err(StoreError::Unavailable("store is down".to_string()))
    }

    async fn insert(&self, _record: &SessionRecord) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("store is down".to_string()))
    }

    async fn touch(&self, _token: &str, _last_access: DateTime<Utc>) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("store is down".to_string()))
    }

    async fn delete(&self, _token: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("store is down".to_string()))
    }

    async fn is_superuser(&self, _user_name: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("store is down".to_string()))
    }
}

#[tokio::test]
async fn test_dictionary_login_resolves_identity() {
    init_tracing();
    let manager = manager(dict_settings(60, 30));

    let session = login(&manager, "alice:secret").await;
    assert_eq!(session.username, "alice");
    assert_eq!(session.groups, vec!["dev"]);
    assert!(!session.is_root);

    // Users without a group mapping get an empty group list.
    let session = login(&manager, "bob:pw").await;
    assert!(session.groups.is_empty());
}

#[tokio::test]
async fn test_wrong_credentials_are_rejected() {
    let manager = manager(dict_settings(60, 30));

    assert!(matches!(
        manager.create_or_get_session("alice:wrong").await,
        LoginOutcome::Rejected
    ));
    assert!(matches!(
        manager.create_or_get_session("mallory:whatever").await,
        LoginOutcome::Rejected
    ));
    assert_eq!(manager.active_session_count().await, 0);
}

#[tokio::test]
async fn test_root_hash_wins_regardless_of_backends() {
    let root_hash = hash_credentials("root:adminpw");
    let manager = SessionManager::new(
        dict_settings(60, 30),
        Some(root_hash),
        Backends::default(),
        false,
    )
    .unwrap();

    let session = login(&manager, "root:adminpw").await;
    assert_eq!(session.username, "root");
    assert!(session.is_root);
    assert!(session.groups.is_empty());
}

#[tokio::test]
async fn test_disabled_authentication_is_a_passthrough() {
    let settings = AuthSettings {
        enabled: false,
        ..dict_settings(60, 30)
    };
    let manager = manager(settings);

    assert!(!manager.is_enabled());
    assert!(matches!(
        manager.create_or_get_session("alice:secret").await,
        LoginOutcome::NotRequired
    ));
    assert!(manager.get_session("whatever").await.is_none());
}

#[tokio::test]
async fn test_no_backends_falls_back_to_disabled() {
    let settings = AuthSettings {
        enabled: true,
        ..AuthSettings::default()
    };
    let manager = manager(settings);

    assert!(!manager.is_enabled());
    assert!(matches!(
        manager.create_or_get_session("alice:secret").await,
        LoginOutcome::NotRequired
    ));
}

#[tokio::test]
async fn test_forced_auth_without_backends_is_superuser_only() {
    init_tracing();
    let root_hash = hash_credentials("root:adminpw");
    let manager = SessionManager::new(
        AuthSettings::default(),
        Some(root_hash),
        Backends::default(),
        true,
    )
    .unwrap();

    assert!(manager.is_enabled());
    let session = login(&manager, "root:adminpw").await;
    assert!(session.is_root);

    // Nothing but the superuser credential gets through.
    assert!(matches!(
        manager.create_or_get_session("alice:secret").await,
        LoginOutcome::Rejected
    ));
}

#[tokio::test]
async fn test_get_session_refreshes_last_access() {
    let manager = manager(dict_settings(60, 30));

    let session = login(&manager, "alice:secret").await;
    let first_seen = session.last_access;

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let refreshed = manager.get_session(&session.token).await.unwrap();
    assert!(refreshed.last_access > first_seen);
}

#[tokio::test]
async fn test_expired_session_is_gone_from_both_tiers() {
    let dir = tempdir().unwrap();
    let store = Arc::new(FlatFileStore::new(dir.path()).unwrap());
    let manager = manager(dict_settings(1, 30));
    manager.set_store(Some(store.clone())).await;

    let session = login(&manager, "alice:secret").await;
    assert!(manager.get_session(&session.token).await.is_some());

    tokio::time::sleep(std::time::Duration::from_millis(1300)).await;

    assert!(manager.get_session(&session.token).await.is_none());
    assert_eq!(manager.active_session_count().await, 0);
    assert!(store.load(&session.token).await.unwrap().is_none());
}

#[tokio::test]
async fn test_liveness_window_slides_with_access() {
    // A session last accessed 30s ago is inside a 60s window; one last
    // accessed 95s ago is not.
    let dir = tempdir().unwrap();
    let store = Arc::new(FlatFileStore::new(dir.path()).unwrap());
    let manager = manager(dict_settings(60, 30));
    manager.set_store(Some(store.clone())).await;

    let recent = login(&manager, "alice:secret").await;
    store
        .touch(&recent.token, Utc::now() - Duration::seconds(30))
        .await
        .unwrap();

    let stale = login(&manager, "bob:pw").await;
    store
        .touch(&stale.token, Utc::now() - Duration::seconds(95))
        .await
        .unwrap();

    // A second process with an empty cache sees only the durable tier.
    let other = manager_with_store(&store).await;
    assert!(other.get_session(&recent.token).await.is_some());
    assert!(other.get_session(&stale.token).await.is_none());
    assert!(store.load(&stale.token).await.unwrap().is_none());
}

async fn manager_with_store(store: &Arc<FlatFileStore>) -> SessionManager {
    let manager = manager(dict_settings(60, 30));
    manager.set_store(Some(store.clone())).await;
    manager
}

#[tokio::test]
async fn test_invalidate_is_idempotent() {
    let manager = manager(dict_settings(60, 30));

    assert!(manager.invalidate("no-such-token").await);

    let session = login(&manager, "alice:secret").await;
    assert!(manager.invalidate(&session.token).await);
    assert!(manager.invalidate(&session.token).await);
    assert!(manager.get_session(&session.token).await.is_none());
}

#[tokio::test]
async fn test_cleanup_runs_at_login_threshold() {
    let manager = manager(dict_settings(1, 3));

    let stale = login(&manager, "alice:secret").await;
    tokio::time::sleep(std::time::Duration::from_millis(1300)).await;

    // Second and third successful logins; the third one trips the
    // pruning pass and sweeps alice's dead session.
    login(&manager, "bob:pw").await;
    login(&manager, "bob:pw").await;

    let alive = manager.active_session_count().await;
    assert!(alive >= 1, "bob's sessions must survive the sweep");
    let swept = manager.get_session(&stale.token).await;
    assert!(swept.is_none(), "alice's dead session must be swept");
}

#[tokio::test]
async fn test_sessions_survive_a_process_restart() {
    let dir = tempdir().unwrap();
    let store = Arc::new(FlatFileStore::new(dir.path()).unwrap());

    let first = manager_with_store(&store).await;
    let session = login(&first, "alice:secret").await;
    drop(first);

    // A fresh manager with an empty cache promotes the stored record.
    let second = manager_with_store(&store).await;
    let restored = second.get_session(&session.token).await.unwrap();
    assert_eq!(restored.username, "alice");
    assert_eq!(restored.groups, vec!["dev"]);
    assert!(!restored.is_root);
    assert_eq!(second.active_session_count().await, 1);
}

#[tokio::test]
async fn test_promotion_recomputes_root_from_permission_table() {
    let dir = tempdir().unwrap();
    let store = Arc::new(FlatFileStore::new(dir.path()).unwrap());

    let first = manager_with_store(&store).await;
    let session = login(&first, "alice:secret").await;
    store.grant_superuser("alice").await.unwrap();

    let second = manager_with_store(&store).await;
    let restored = second.get_session(&session.token).await.unwrap();
    assert!(restored.is_root);
}

#[tokio::test]
async fn test_repeated_logins_share_one_token() {
    // Token reuse through the durable store keeps a user on a single
    // session: logging in again revalidates instead of creating a
    // second concurrent session.
    let dir = tempdir().unwrap();
    let store = Arc::new(FlatFileStore::new(dir.path()).unwrap());
    let manager = manager_with_store(&store).await;

    let first = login(&manager, "alice:secret").await;
    let second = login(&manager, "alice:secret").await;

    assert_eq!(first.token, second.token);
    assert!(second.last_access >= first.last_access);
    assert_eq!(manager.active_session_count().await, 1);
    assert_eq!(store.tokens_for_user("alice").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_logins_keep_one_record_per_token() {
    let dir = tempdir().unwrap();
    let store = Arc::new(FlatFileStore::new(dir.path()).unwrap());

    // Seed the durable tier so every task resolves the same token,
    // then race the logins against an empty cache: they all miss and
    // fight over creating the local record.
    let seeded = SessionRecord::new("aaaa1111", "alice", &["dev".to_string()]);
    store.insert(&seeded).await.unwrap();

    let manager = Arc::new(manager_with_store(&store).await);
    assert_eq!(manager.active_session_count().await, 0);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            manager.create_or_get_session("alice:secret").await
        }));
    }
    for handle in handles {
        let outcome = handle.await.unwrap();
        let concurrent = outcome.session().expect("login must succeed");
        assert_eq!(concurrent.token, "aaaa1111");
    }

    assert_eq!(manager.active_session_count().await, 1);
}

#[tokio::test]
async fn test_store_outage_degrades_to_in_memory_sessions() {
    init_tracing();
    let manager = manager(dict_settings(60, 30));
    manager.set_store(Some(Arc::new(FailingStore))).await;

    // The login still succeeds and the session works locally.
    let session = login(&manager, "alice:secret").await;
    let fetched = manager.get_session(&session.token).await.unwrap();
    assert_eq!(fetched.username, "alice");

    // Durable deletion fails, which invalidate reports, but the local
    // record is gone anyway.
    assert!(!manager.invalidate(&session.token).await);
    assert_eq!(manager.active_session_count().await, 0);
}

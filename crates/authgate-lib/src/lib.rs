// ============================
// authgate-lib/src/lib.rs
// ============================
//! Server-side authentication and session management.
//!
//! The crate is the gatekeeper between a transport layer (HTTP, RPC,
//! anything carrying a credential string and a session cookie) and the
//! server's notion of "who is logged in". Credentials are dispatched to
//! a chain of pluggable backends, successful logins are bound to opaque
//! tokens with a sliding expiration window, and sessions live in two
//! tiers: an in-process cache plus an optional durable store that
//! survives restarts and is shared across processes.

pub mod auth;
pub mod config;
pub mod error;
pub mod store;

pub use auth::manager::{LoginOutcome, SessionManager};
pub use auth::session::{Realm, Session, SESSION_COOKIE_NAME};
pub use auth::token::generate_session_token;
pub use auth::validators::{
    hash_credentials, Backends, LdapConnector, PamAuthenticator, ValidationResult,
};
pub use config::{load_settings, AuthSettings, Settings};
pub use error::{AuthError, StoreError};
pub use store::{FlatFileStore, SessionRecord, SessionStore};

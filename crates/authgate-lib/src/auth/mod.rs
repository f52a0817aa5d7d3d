// ============================
// authgate-lib/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod cache;
pub mod manager;
pub mod session;
pub mod token;
pub mod validators;

pub use cache::SessionCache;
pub use manager::{LoginOutcome, SessionManager};
pub use session::{Realm, Session, SESSION_COOKIE_NAME};
pub use token::generate_session_token;
pub use validators::{
    hash_credentials, Backends, LdapConnector, PamAuthenticator, ValidationResult, ValidatorSet,
};

// ============================
// authgate-lib/src/error.rs
// ============================
//! Central error types.
use thiserror::Error;

/// Errors that can abort construction of the session manager.
///
/// Anything that happens after construction is either reported as a
/// plain rejection to the caller or degraded and logged; only broken
/// configuration is fatal.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<figment::Error> for AuthError {
    fn from(err: figment::Error) -> Self {
        AuthError::Config(err.to_string())
    }
}

/// Errors surfaced by a durable session store.
///
/// The session manager never forwards these to its callers. Every call
/// site logs the failure once and carries on as if the store were
/// temporarily absent.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

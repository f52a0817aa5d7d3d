// ============================
// authgate-lib/src/config.rs
// ============================
//! Configuration management.
//!
//! The session manager consumes an already-parsed [`AuthSettings`]
//! structure; [`load_settings`] is the file/env front door for hosts
//! that want the usual layered loading. The root credential hash is
//! injected programmatically at construction and is never read from a
//! configuration file.
use std::collections::HashMap;

use figment::{
    providers::{Env, Format, Json, Toml},
    Figment,
};
use serde::Deserialize;

use crate::error::AuthError;

/// Application settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Authentication and session handling
    pub authentication: AuthSettings,
}

/// Authentication settings block
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Whether clients must authenticate at all
    pub enabled: bool,
    /// Sliding session lifetime in seconds
    pub session_lifetime: u64,
    /// Number of successful logins between pruning passes
    pub logins_until_cleanup: u64,
    /// Realm name presented to clients when prompting for credentials
    pub realm_name: String,
    /// Message presented to clients on failed authentication
    pub realm_error: String,
    /// Deprecated, ignored. Kept so old configuration files still parse.
    pub soft_expire: Option<i64>,
    /// Static credential list backend
    pub method_dictionary: DictionarySettings,
    /// OS-level PAM backend
    pub method_pam: PamSettings,
    /// LDAP directory backend
    pub method_ldap: LdapSettings,
}

/// Settings of the static credential list backend
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DictionarySettings {
    pub enabled: bool,
    /// Accepted `username:secret` entries, matched verbatim
    pub auths: Vec<String>,
    /// Group membership per username
    pub groups: HashMap<String, Vec<String>>,
}

/// Settings of the PAM backend
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PamSettings {
    pub enabled: bool,
    /// PAM service name the host stack authenticates against
    pub service: String,
}

/// Settings of the LDAP backend
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LdapSettings {
    pub enabled: bool,
    /// Directory authorities, tried in order until one accepts the bind
    pub authorities: Vec<LdapAuthority>,
}

/// A single LDAP directory authority
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LdapAuthority {
    pub connection_url: String,
    pub account_base: String,
    pub account_pattern: String,
    pub group_base: Option<String>,
    pub group_pattern: Option<String>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            session_lifetime: 3600,
            logins_until_cleanup: 30,
            realm_name: "authgate".to_string(),
            realm_error: "Not authenticated.".to_string(),
            soft_expire: None,
            method_dictionary: DictionarySettings::default(),
            method_pam: PamSettings::default(),
            method_ldap: LdapSettings::default(),
        }
    }
}

impl Default for PamSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            service: "system-auth".to_string(),
        }
    }
}

impl AuthSettings {
    /// Reject configurations the session manager cannot run with.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.session_lifetime == 0 {
            return Err(AuthError::Config(
                "authentication.session_lifetime must be a positive number of seconds".to_string(),
            ));
        }
        if self.logins_until_cleanup == 0 {
            return Err(AuthError::Config(
                "authentication.logins_until_cleanup must be at least 1".to_string(),
            ));
        }
        if self.method_ldap.enabled && self.method_ldap.authorities.is_empty() {
            return Err(AuthError::Config(
                "authentication.method_ldap is enabled but no authorities are configured"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Load settings from various sources
pub fn load_settings() -> Result<Settings, AuthError> {
    // Try to load from config files first, then environment variables
    let settings: Settings = Figment::new()
        .merge(Toml::file("authgate.toml"))
        .merge(Json::file("authgate.json"))
        .merge(Env::prefixed("AUTHGATE_"))
        .extract()?;

    settings.authentication.validate()?;
    Ok(settings)
}

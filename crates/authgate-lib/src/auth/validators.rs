// ============================
// authgate-lib/src/auth/validators.rs
// ============================
//! The credential validator chain.
//!
//! A credential string is handed to each enabled backend in a fixed
//! order: root, dictionary, PAM, LDAP. The first backend that accepts
//! it resolves the identity; everything else is a plain rejection. PAM
//! and LDAP are host facilities, so they enter the chain as injected
//! trait objects and are force-disabled when the host cannot provide
//! them.
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::warn;

use crate::config::{AuthSettings, LdapAuthority};

/// The identity a backend resolved for an accepted credential string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub username: String,
    pub groups: Vec<String>,
    pub is_root: bool,
}

impl ValidationResult {
    fn plain(username: &str, groups: Vec<String>) -> Self {
        Self {
            username: username.to_string(),
            groups,
            is_root: false,
        }
    }
}

/// Authenticates `username`/`password` pairs against the OS PAM stack.
pub trait PamAuthenticator: Send + Sync {
    fn authenticate(&self, service: &str, username: &str, password: &str) -> bool;
}

/// Binds and queries a single LDAP directory authority.
pub trait LdapConnector: Send + Sync {
    fn bind(&self, authority: &LdapAuthority, username: &str, password: &str) -> bool;
    fn groups(&self, authority: &LdapAuthority, username: &str, password: &str) -> Vec<String>;
}

/// Host backends discovered at startup.
///
/// A `None` slot means the backend failed to initialise on this host;
/// the corresponding method is excluded from the chain no matter what
/// the configuration says.
#[derive(Clone, Default)]
pub struct Backends {
    pub pam: Option<Arc<dyn PamAuthenticator>>,
    pub ldap: Option<Arc<dyn LdapConnector>>,
}

/// SHA-256 hex digest of a credential string.
///
/// Hosts use this to derive the root hash that is injected into the
/// session manager at startup; the root validator compares against it.
pub fn hash_credentials(credentials: &str) -> String {
    let digest = Sha256::digest(credentials.as_bytes());
    format!("{digest:x}")
}

/// The username half of a `username:secret` credential string. A
/// credential without a colon is all username.
pub fn user_name_of(credentials: &str) -> &str {
    credentials
        .split_once(':')
        .map_or(credentials, |(username, _)| username)
}

/// Split a credential string on the first colon only; secrets may
/// contain further colons.
fn split_credentials(credentials: &str) -> Option<(&str, &str)> {
    credentials.split_once(':')
}

/// The ordered set of enabled credential validators.
pub struct ValidatorSet {
    root_hash: Option<String>,
    settings: AuthSettings,
    backends: Backends,
}

impl ValidatorSet {
    /// Build the validator chain, applying host availability on top of
    /// the configuration: a method whose backend is missing is forced
    /// off with a warning.
    pub fn new(settings: &AuthSettings, root_hash: Option<String>, backends: Backends) -> Self {
        let mut settings = settings.clone();

        if settings.method_pam.enabled && backends.pam.is_none() {
            warn!(
                "PAM authentication was enabled but prerequisites are \
                 not available on this host; disabling PAM authentication"
            );
            settings.method_pam.enabled = false;
        }

        if settings.method_ldap.enabled && backends.ldap.is_none() {
            warn!(
                "LDAP authentication was enabled but prerequisites are \
                 not available on this host; disabling LDAP authentication"
            );
            settings.method_ldap.enabled = false;
        }

        Self {
            root_hash,
            settings,
            backends,
        }
    }

    /// Whether any non-root method survived configuration and host
    /// availability checks.
    pub fn has_enabled_method(&self) -> bool {
        self.settings.method_dictionary.enabled
            || self.settings.method_pam.enabled
            || self.settings.method_ldap.enabled
    }

    /// Run the chain. The first accepting validator determines the
    /// result; `None` means every backend rejected the credentials.
    pub fn validate(&self, credentials: &str) -> Option<ValidationResult> {
        self.try_root(credentials)
            .or_else(|| self.try_dictionary(credentials))
            .or_else(|| self.try_pam(credentials))
            .or_else(|| self.try_ldap(credentials))
    }

    /// Authenticate against the injected root credential hash.
    fn try_root(&self, credentials: &str) -> Option<ValidationResult> {
        let root_hash = self.root_hash.as_deref()?;
        if hash_credentials(credentials) != root_hash {
            return None;
        }

        Some(ValidationResult {
            username: user_name_of(credentials).to_string(),
            groups: Vec::new(),
            is_root: true,
        })
    }

    /// Authenticate against the configured credential list.
    fn try_dictionary(&self, credentials: &str) -> Option<ValidationResult> {
        let method = &self.settings.method_dictionary;
        if !method.enabled || !method.auths.iter().any(|entry| entry == credentials) {
            return None;
        }

        let username = user_name_of(credentials);
        let groups = method.groups.get(username).cloned().unwrap_or_default();
        Some(ValidationResult::plain(username, groups))
    }

    /// Authenticate through the host PAM stack.
    fn try_pam(&self, credentials: &str) -> Option<ValidationResult> {
        if !self.settings.method_pam.enabled {
            return None;
        }
        let pam = self.backends.pam.as_ref()?;
        let (username, password) = split_credentials(credentials)?;

        if pam.authenticate(&self.settings.method_pam.service, username, password) {
            // PAM does not hold a group membership list we can
            // reliably query.
            Some(ValidationResult::plain(username, Vec::new()))
        } else {
            None
        }
    }

    /// Authenticate against the configured directory authorities, in
    /// order.
    fn try_ldap(&self, credentials: &str) -> Option<ValidationResult> {
        if !self.settings.method_ldap.enabled {
            return None;
        }
        let ldap = self.backends.ldap.as_ref()?;
        let (username, password) = split_credentials(credentials)?;

        for authority in &self.settings.method_ldap.authorities {
            if ldap.bind(authority, username, password) {
                let groups = ldap.groups(authority, username, password);
                return Some(ValidationResult::plain(username, groups));
            }
        }

        None
    }
}

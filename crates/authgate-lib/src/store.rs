// ============================
// authgate-lib/src/store.rs
// ============================
//! Durable session storage.
//!
//! The session manager treats the durable tier as an optional, fallible
//! remote dependency behind the [`SessionStore`] trait: four record
//! operations plus a superuser membership test, each one a scoped
//! "acquire, use, release" call. [`FlatFileStore`] is the bundled
//! implementation, keeping one JSON document per token under a root
//! directory; a database-backed adapter would implement the same trait.
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs as tokio_fs;

use crate::auth::session::Session;
use crate::error::StoreError;

/// Separator used to flatten the group list into a single column.
const GROUP_SEPARATOR: char = ';';

/// A session as the durable tier stores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub token: String,
    pub user_name: String,
    /// Group list flattened with [`GROUP_SEPARATOR`]
    pub groups: String,
    pub last_access: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(token: &str, user_name: &str, groups: &[String]) -> Self {
        Self {
            token: token.to_string(),
            user_name: user_name.to_string(),
            groups: groups.join(&GROUP_SEPARATOR.to_string()),
            last_access: Utc::now(),
        }
    }

    /// The stored group string split back into a list.
    pub fn group_list(&self) -> Vec<String> {
        self.groups
            .split(GROUP_SEPARATOR)
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl From<&Session> for SessionRecord {
    fn from(session: &Session) -> Self {
        Self {
            token: session.token.clone(),
            user_name: session.username.clone(),
            groups: session.groups.join(&GROUP_SEPARATOR.to_string()),
            last_access: session.last_access,
        }
    }
}

/// Trait for durable session stores
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Tokens of every stored session belonging to the given user
    async fn tokens_for_user(&self, user_name: &str) -> Result<Vec<String>, StoreError>;

    /// Load the stored session for a token, if any
    async fn load(&self, token: &str) -> Result<Option<SessionRecord>, StoreError>;

    /// Insert a session record, replacing any record with the same token
    async fn insert(&self, record: &SessionRecord) -> Result<(), StoreError>;

    /// Update the last-access timestamp of a stored session
    async fn touch(&self, token: &str, last_access: DateTime<Utc>) -> Result<(), StoreError>;

    /// Delete the stored session for a token; deleting an unknown
    /// token is not an error
    async fn delete(&self, token: &str) -> Result<(), StoreError>;

    /// Whether the user is listed in the system permission table
    async fn is_superuser(&self, user_name: &str) -> Result<bool, StoreError>;
}

/// Flat-file implementation of the [`SessionStore`] trait
#[derive(Clone)]
pub struct FlatFileStore {
    root: PathBuf,
}

impl FlatFileStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("sessions"))?;
        Ok(Self { root })
    }

    fn session_path(&self, token: &str) -> PathBuf {
        self.root.join("sessions").join(format!("{token}.json"))
    }

    fn permissions_path(&self) -> PathBuf {
        self.root.join("system_permissions.json")
    }

    /// Tokens are used as file names, so anything that is not a plain
    /// alphanumeric string is treated as unknown.
    fn token_is_storable(token: &str) -> bool {
        !token.is_empty() && token.chars().all(|c| c.is_ascii_alphanumeric())
    }

    async fn read_permissions(&self) -> Result<Vec<String>, StoreError> {
        let path = self.permissions_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = tokio_fs::read(&path).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Add a user to the system permission table. Sessions promoted
    /// from the durable tier get their root flag from this list.
    pub async fn grant_superuser(&self, user_name: &str) -> Result<(), StoreError> {
        let mut users = self.read_permissions().await?;
        if !users.iter().any(|u| u == user_name) {
            users.push(user_name.to_string());
        }
        let raw = serde_json::to_vec(&users)?;
        tokio_fs::write(self.permissions_path(), raw).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FlatFileStore {
    async fn tokens_for_user(&self, user_name: &str) -> Result<Vec<String>, StoreError> {
        let mut tokens = Vec::new();
        let mut entries = tokio_fs::read_dir(self.root.join("sessions")).await?;

        while let Some(entry) = entries.next_entry().await? {
            let raw = tokio_fs::read(entry.path()).await?;
            let record: SessionRecord = serde_json::from_slice(&raw)?;
            if record.user_name == user_name {
                tokens.push(record.token);
            }
        }

        // Directory iteration order is not stable; keep the result
        // deterministic for token reuse.
        tokens.sort();
        Ok(tokens)
    }

    async fn load(&self, token: &str) -> Result<Option<SessionRecord>, StoreError> {
        if !Self::token_is_storable(token) {
            return Ok(None);
        }
        let path = self.session_path(token);
        if !path.exists() {
            return Ok(None);
        }
        let raw = tokio_fs::read(&path).await?;
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    async fn insert(&self, record: &SessionRecord) -> Result<(), StoreError> {
        if !Self::token_is_storable(&record.token) {
            return Err(StoreError::Unavailable(format!(
                "token {:?} is not storable",
                record.token
            )));
        }
        let raw = serde_json::to_vec(record)?;
        tokio_fs::write(self.session_path(&record.token), raw).await?;
        Ok(())
    }

    async fn touch(&self, token: &str, last_access: DateTime<Utc>) -> Result<(), StoreError> {
        let Some(mut record) = self.load(token).await? else {
            return Ok(());
        };
        record.last_access = last_access;
        self.insert(&record).await
    }

    async fn delete(&self, token: &str) -> Result<(), StoreError> {
        if !Self::token_is_storable(token) {
            return Ok(());
        }
        match tokio_fs::remove_file(self.session_path(token)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn is_superuser(&self, user_name: &str) -> Result<bool, StoreError> {
        let users = self.read_permissions().await?;
        Ok(users.iter().any(|u| u == user_name))
    }
}

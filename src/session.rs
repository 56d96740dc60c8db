//! Signed-in identity.
//!
//! The identity is held in a [`SessionContext`] that callers pass to the
//! view and the notes book. It is cached on disk between runs by an
//! [`IdentityStore`]; there is no process-wide session.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::client::dto::UserRecord;
use crate::client::errors::{ClientError, ClientResult};
use crate::client::services::AuthService;

/// Identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Server user id.
    pub id: i64,
    /// Account email.
    pub email: String,
}

impl From<UserRecord> for UserIdentity {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            email: record.email,
        }
    }
}

/// JSON file caching the last signed-in identity.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    path: PathBuf,
}

impl IdentityStore {
    /// Store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the cache file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached identity. A missing file is not an error.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(&self) -> ClientResult<Option<UserIdentity>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Write the identity, replacing any previous one.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub async fn save(&self, identity: &UserIdentity) -> ClientResult<()> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_string_pretty(identity)?;
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, raw).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }

    /// Delete the cached identity. Returns `false` if there was none.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be removed.
    pub async fn clear(&self) -> ClientResult<bool> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

/// Explicit session handed to every component acting for a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    user: UserIdentity,
    session_tag: Uuid,
}

impl SessionContext {
    /// Start a session for `user`.
    #[must_use]
    pub fn new(user: UserIdentity) -> Self {
        Self {
            user,
            session_tag: Uuid::new_v4(),
        }
    }

    /// Signed-in user.
    #[must_use]
    pub const fn user(&self) -> &UserIdentity {
        &self.user
    }

    /// Server id of the signed-in user.
    #[must_use]
    pub const fn user_id(&self) -> i64 {
        self.user.id
    }

    /// Random tag identifying this session in logs.
    #[must_use]
    pub const fn session_tag(&self) -> Uuid {
        self.session_tag
    }

    /// Resume from the cached identity, if any.
    ///
    /// # Errors
    /// Returns an error if the cache exists but is unreadable.
    pub async fn restore(store: &IdentityStore) -> ClientResult<Option<Self>> {
        let Some(user) = store.load().await? else {
            debug!(path = %store.path().display(), "no cached identity");
            return Ok(None);
        };
        let session = Self::new(user);
        info!(user_id = session.user_id(), session = %session.session_tag, "session restored");
        Ok(Some(session))
    }

    /// Log in and cache the identity.
    ///
    /// # Errors
    /// Returns an error if the credentials are empty or refused, or the cache cannot be written.
    pub async fn sign_in(
        auth: &dyn AuthService,
        store: &IdentityStore,
        email: &str,
        password: &str,
    ) -> ClientResult<Self> {
        let (email, password) = credentials(email, password)?;
        let user = UserIdentity::from(auth.login(email, password).await?);
        Self::start(store, user).await
    }

    /// Create an account, then cache the identity.
    ///
    /// # Errors
    /// Returns an error if the credentials are empty or refused, or the cache cannot be written.
    pub async fn register(
        auth: &dyn AuthService,
        store: &IdentityStore,
        email: &str,
        password: &str,
    ) -> ClientResult<Self> {
        let (email, password) = credentials(email, password)?;
        let user = UserIdentity::from(auth.register(email, password).await?);
        Self::start(store, user).await
    }

    /// End the session and forget the cached identity.
    ///
    /// # Errors
    /// Returns an error if the cache file cannot be removed.
    pub async fn sign_out(self, store: &IdentityStore) -> ClientResult<()> {
        store.clear().await?;
        info!(user_id = self.user_id(), session = %self.session_tag, "signed out");
        Ok(())
    }

    async fn start(store: &IdentityStore, user: UserIdentity) -> ClientResult<Self> {
        store.save(&user).await?;
        let session = Self::new(user);
        info!(user_id = session.user_id(), session = %session.session_tag, "signed in");
        Ok(session)
    }
}

fn credentials(email: &str, password: &str) -> ClientResult<(String, String)> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(ClientError::InvalidInput(
            "email and password are required".to_string(),
        ));
    }
    Ok((email.to_string(), password.to_string()))
}

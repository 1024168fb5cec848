use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::store::KeyValueStore;
use crate::models::UserProfile;

/// Key holding the opaque session token
pub const TOKEN_KEY: &str = "estatedesk.token";

/// Key holding the JSON user snapshot
pub const USER_KEY: &str = "estatedesk.user";

/// Value plus the moment it was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

/// What survives a restart: the token, and optionally who it belonged to.
#[derive(Debug, Clone)]
pub struct PersistedCredential {
    pub token: String,
    pub cached_user: Option<CachedData<UserProfile>>,
}

impl PersistedCredential {
    pub fn new(token: impl Into<String>, user: UserProfile) -> Self {
        Self {
            token: token.into(),
            cached_user: Some(CachedData::new(user)),
        }
    }
}

/// Token and user snapshot on top of a [`KeyValueStore`].
///
/// The token is authoritative, the snapshot advisory. Both are written and
/// removed together. Clone is cheap; clones share the backend.
#[derive(Clone)]
pub struct CredentialCache {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Stored token, if any. Blank values count as absent.
    pub fn token(&self) -> Result<Option<String>> {
        Ok(self
            .store
            .get(TOKEN_KEY)?
            .filter(|token| !token.trim().is_empty()))
    }

    /// Last-known user, for display only. Unreadable snapshots yield `None`.
    pub fn cached_user(&self) -> Option<CachedData<UserProfile>> {
        let raw = match self.store.get(USER_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                debug!(error = %e, "Failed to read user snapshot");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(cached) => Some(cached),
            Err(e) => {
                debug!(error = %e, "Ignoring malformed user snapshot");
                None
            }
        }
    }

    pub fn load(&self) -> Result<Option<PersistedCredential>> {
        Ok(self.token()?.map(|token| PersistedCredential {
            token,
            cached_user: self.cached_user(),
        }))
    }

    /// Write token and snapshot in one backend call.
    pub fn save(&self, credential: &PersistedCredential) -> Result<()> {
        match credential.cached_user {
            Some(ref cached) => {
                let snapshot =
                    serde_json::to_string(cached).context("Failed to encode user snapshot")?;
                self.store
                    .set_many(&[(TOKEN_KEY, credential.token.as_str()), (USER_KEY, snapshot.as_str())])
            }
            None => {
                self.store.set(TOKEN_KEY, &credential.token)?;
                self.store.remove(USER_KEY)
            }
        }
    }

    /// Replace only the snapshot, keeping the current token.
    pub fn update_user(&self, user: &UserProfile) -> Result<()> {
        let snapshot = serde_json::to_string(&CachedData::new(user))
            .context("Failed to encode user snapshot")?;
        self.store.set(USER_KEY, &snapshot)
    }

    /// Remove token and snapshot together.
    pub fn purge(&self) -> Result<()> {
        self.store.remove_many(&[TOKEN_KEY, USER_KEY])
    }
}

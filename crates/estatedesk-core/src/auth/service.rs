use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::AuthError;
use crate::api::ApiClient;
use crate::cache::CredentialCache;
use crate::models::{Registration, UserProfile};

/// Token issued by the remote service plus the profile it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthGrant {
    pub token: String,
    pub user: UserProfile,
}

/// Remote account operations the session store depends on.
#[async_trait]
pub trait CredentialService: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<AuthGrant, AuthError>;

    async fn register(&self, registration: &Registration) -> Result<AuthGrant, AuthError>;

    /// Invalidate `token` remotely. Best-effort: failures are logged, never returned.
    async fn logout(&self, token: &str);

    /// Validate `token` and return the profile it belongs to.
    async fn fetch_profile(&self, token: &str) -> Result<UserProfile, AuthError>;

    /// Last-known user from local storage. Display only, never for access control.
    fn cached_user(&self) -> Option<UserProfile>;
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// `/auth/me` answers with either `{ "user": {...} }` or the bare profile.
#[derive(Deserialize)]
#[serde(untagged)]
enum ProfileResponse {
    Wrapped { user: UserProfile },
    Bare(UserProfile),
}

impl ProfileResponse {
    fn into_user(self) -> UserProfile {
        match self {
            ProfileResponse::Wrapped { user } | ProfileResponse::Bare(user) => user,
        }
    }
}

/// [`CredentialService`] backed by the listings REST API.
pub struct HttpCredentialService {
    api: ApiClient,
    cache: CredentialCache,
}

impl HttpCredentialService {
    pub fn new(api: ApiClient, cache: CredentialCache) -> Self {
        Self { api, cache }
    }

    fn check_grant(grant: AuthGrant) -> Result<AuthGrant, AuthError> {
        if grant.token.trim().is_empty() {
            return Err(AuthError::Service("server returned an empty token".to_string()));
        }
        Ok(grant)
    }
}

#[async_trait]
impl CredentialService for HttpCredentialService {
    async fn login(&self, email: &str, password: &str) -> Result<AuthGrant, AuthError> {
        let grant: AuthGrant = self
            .api
            .post("/auth/login", &LoginRequest { email, password })
            .await
            .map_err(AuthError::from_submission)?;
        Self::check_grant(grant)
    }

    async fn register(&self, registration: &Registration) -> Result<AuthGrant, AuthError> {
        let grant: AuthGrant = self
            .api
            .post("/auth/register", registration)
            .await
            .map_err(AuthError::from_submission)?;
        Self::check_grant(grant)
    }

    async fn logout(&self, token: &str) {
        match self.api.with_token(token).post_empty("/auth/logout").await {
            Ok(()) => debug!("Remote session invalidated"),
            Err(e) => warn!(error = %e, "Remote logout failed; continuing with local logout"),
        }
    }

    async fn fetch_profile(&self, token: &str) -> Result<UserProfile, AuthError> {
        let response: ProfileResponse = self.api.with_token(token).get("/auth/me").await?;
        Ok(response.into_user())
    }

    fn cached_user(&self) -> Option<UserProfile> {
        self.cache.cached_user().map(|cached| cached.data)
    }
}

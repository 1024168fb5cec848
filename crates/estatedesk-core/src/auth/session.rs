use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{AuthError, AuthGrant, CredentialService};
use crate::cache::{CredentialCache, PersistedCredential};
use crate::models::{Registration, UserProfile};
use crate::utils::mask_token;

/// Everything the rest of the application may know about the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub is_authenticated: bool,
    pub user: Option<UserProfile>,
    pub loading: bool,
    pub error: Option<String>,
    /// Set once the first bootstrap has finished. Never cleared.
    pub initialized: bool,
}

impl SessionState {
    /// State before bootstrap has run.
    fn pending() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    fn sign_in(&mut self, user: UserProfile) {
        self.is_authenticated = true;
        self.user = Some(user);
        self.error = None;
    }

    fn sign_out(&mut self) {
        self.is_authenticated = false;
        self.user = None;
        self.error = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Initializing,
    Authenticated,
    Unauthenticated,
}

/// Owner of the session state machine.
///
/// Construct one per process and call [`SessionStore::bootstrap`] before
/// anything else. Until bootstrap finishes, login, register and refresh are
/// rejected with [`AuthError::Busy`].
///
/// At most one of bootstrap/login/register/refresh runs at a time; `loading`
/// mirrors that. Logout is never rejected: it bumps the operation epoch so
/// whatever is still in flight lands as stale and is dropped.
pub struct SessionStore {
    service: Arc<dyn CredentialService>,
    cache: CredentialCache,
    state: watch::Sender<SessionState>,
    epoch: AtomicU64,
    busy: AtomicBool,
    bootstrap_started: AtomicBool,
}

/// Held for the duration of one operation. Dropping it clears `loading`.
struct OperationPermit<'a> {
    store: &'a SessionStore,
}

impl Drop for OperationPermit<'_> {
    fn drop(&mut self) {
        self.store.state.send_modify(|state| state.loading = false);
        self.store.busy.store(false, Ordering::Release);
    }
}

/// Marks bootstrap finished however it exits: return, panic, or the future
/// being dropped.
struct BootstrapGuard<'a> {
    store: &'a SessionStore,
}

impl Drop for BootstrapGuard<'_> {
    fn drop(&mut self) {
        self.store.state.send_modify(|state| {
            state.initialized = true;
            state.loading = false;
        });
        self.store.busy.store(false, Ordering::Release);
        debug!(phase = ?self.store.phase(), "Bootstrap finished");
    }
}

impl SessionStore {
    pub fn new(service: Arc<dyn CredentialService>, cache: CredentialCache) -> Self {
        let (state, _) = watch::channel(SessionState::pending());
        Self {
            service,
            cache,
            state,
            epoch: AtomicU64::new(0),
            // Reserved for bootstrap until it finishes
            busy: AtomicBool::new(true),
            bootstrap_started: AtomicBool::new(false),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.borrow().is_authenticated
    }

    pub fn phase(&self) -> SessionPhase {
        let state = self.state.borrow();
        if !state.initialized {
            if self.bootstrap_started.load(Ordering::Acquire) {
                SessionPhase::Initializing
            } else {
                SessionPhase::Uninitialized
            }
        } else if state.is_authenticated {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Unauthenticated
        }
    }

    /// Last-known user from local storage, for optimistic display only.
    pub fn cached_user(&self) -> Option<UserProfile> {
        self.service.cached_user()
    }

    /// Resolves once bootstrap has finished, returning the state at that point.
    pub async fn wait_until_initialized(&self) -> SessionState {
        let mut rx = self.state.subscribe();
        // Err is unreachable while `self` holds the sender
        let state = rx
            .wait_for(|state| state.initialized)
            .await
            .map(|state| state.clone())
            .unwrap_or_else(|_| self.snapshot());
        state
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Reconcile the stored token with the remote service. Runs once; later
    /// calls return immediately.
    pub async fn bootstrap(&self) {
        if self.bootstrap_started.swap(true, Ordering::AcqRel) {
            debug!("Bootstrap already ran");
            return;
        }
        let _finish = BootstrapGuard { store: self };
        let ticket = self.advance_epoch();

        let token = match self.cache.token() {
            Ok(Some(token)) => token,
            Ok(None) => {
                info!("No stored session");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored session, starting signed out");
                self.purge_cache();
                return;
            }
        };

        debug!(token = %mask_token(&token), "Validating stored session");
        match self.service.fetch_profile(&token).await {
            Ok(user) => {
                let email = user.email.clone();
                let restored = self.apply(ticket, |state| {
                    self.store_snapshot(&user);
                    state.sign_in(user);
                });
                if restored {
                    info!(email = %email, "Restored session");
                } else {
                    debug!("Discarding stale bootstrap response");
                }
            }
            Err(e) => {
                if self.is_current(ticket) {
                    info!(reason = %e, "Stored session rejected, signing out");
                    self.purge_cache();
                    self.apply(ticket, SessionState::sign_out);
                } else {
                    debug!(error = %e, "Discarding stale bootstrap failure");
                }
            }
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, AuthError> {
        let _permit = self.begin()?;
        let ticket = self.advance_epoch();

        let email = email.trim();
        if email.is_empty() {
            return Err(self.fail(ticket, AuthError::MissingField("Email")));
        }
        if password.is_empty() {
            return Err(self.fail(ticket, AuthError::MissingField("Password")));
        }

        debug!(email = %email, "Signing in");
        let outcome = self.service.login(email, password).await;
        self.complete_sign_in(ticket, outcome).await
    }

    pub async fn register(&self, registration: &Registration) -> Result<UserProfile, AuthError> {
        let _permit = self.begin()?;
        let ticket = self.advance_epoch();

        let registration = registration.normalized();
        if let Some(field) = registration.missing_field() {
            return Err(self.fail(ticket, AuthError::MissingField(field)));
        }

        debug!(email = %registration.email, "Registering account");
        let outcome = self.service.register(&registration).await;
        self.complete_sign_in(ticket, outcome).await
    }

    /// Sign out locally, then tell the server. Safe to call repeatedly.
    pub async fn logout(&self) {
        let token = match self.cache.token() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read stored token during logout");
                None
            }
        };

        // Under the state lock, so no `apply` can write the cache in between
        self.state.send_modify(|state| {
            self.advance_epoch();
            self.purge_cache();
            state.sign_out();
        });

        if let Some(token) = token {
            self.service.logout(&token).await;
            info!("Signed out");
        } else {
            debug!("Logout with no stored token");
        }
    }

    /// Re-fetch the signed-in user's profile.
    ///
    /// Returns `Ok(None)` when nobody is signed in. If the server no longer
    /// accepts the session, the user is logged out and the error is returned;
    /// it is not recorded in `error`.
    pub async fn refresh_user(&self) -> Result<Option<UserProfile>, AuthError> {
        if !self.is_logged_in() {
            return Ok(None);
        }
        let permit = self.begin()?;
        let ticket = self.advance_epoch();

        let token = match self.cache.token() {
            Ok(Some(token)) => token,
            Ok(None) => {
                warn!("Signed in without a stored token, forcing logout");
                drop(permit);
                self.logout().await;
                return Err(AuthError::SessionExpired);
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored token, forcing logout");
                drop(permit);
                self.logout().await;
                return Err(AuthError::SessionExpired);
            }
        };

        match self.service.fetch_profile(&token).await {
            Ok(user) => {
                let applied = self.apply(ticket, |state| {
                    if state.is_authenticated {
                        self.store_snapshot(&user);
                        state.user = Some(user.clone());
                    }
                });
                if !applied {
                    debug!("Discarding stale profile refresh");
                    return Err(AuthError::Superseded);
                }
                Ok(Some(user))
            }
            Err(e) if self.is_current(ticket) => {
                info!(reason = %e, "Profile refresh failed, forcing logout");
                drop(permit);
                self.logout().await;
                Err(e)
            }
            Err(_) => Err(AuthError::Superseded),
        }
    }

    pub fn clear_error(&self) {
        self.state.send_if_modified(|state| state.error.take().is_some());
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn begin(&self) -> Result<OperationPermit<'_>, AuthError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Rejecting overlapping session operation");
            return Err(AuthError::Busy);
        }
        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });
        Ok(OperationPermit { store: self })
    }

    fn advance_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.epoch.load(Ordering::Acquire) == ticket
    }

    /// Apply `f` only if no newer operation was issued since `ticket`.
    fn apply(&self, ticket: u64, f: impl FnOnce(&mut SessionState)) -> bool {
        let mut applied = false;
        self.state.send_if_modified(|state| {
            if self.epoch.load(Ordering::Acquire) != ticket {
                return false;
            }
            f(state);
            applied = true;
            true
        });
        applied
    }

    /// Record `err` as the visible error (if still current) and hand it back.
    fn fail(&self, ticket: u64, err: AuthError) -> AuthError {
        let message = err.to_string();
        self.apply(ticket, |state| state.error = Some(message));
        err
    }

    /// Persist and publish a grant, or give its token back to the server if
    /// a newer session change got there first.
    async fn complete_sign_in(
        &self,
        ticket: u64,
        outcome: Result<AuthGrant, AuthError>,
    ) -> Result<UserProfile, AuthError> {
        let grant = match outcome {
            Ok(grant) => grant,
            Err(e) => {
                warn!(error = %e, kind = ?e.kind(), "Sign-in failed");
                return Err(self.fail(ticket, e));
            }
        };

        let AuthGrant { token, user } = grant;
        // The write happens under the state lock, so a logout either purges
        // it afterwards or prevents it entirely.
        let signed_in = self.apply(ticket, |state| {
            let credential = PersistedCredential::new(token.as_str(), user.clone());
            if let Err(e) = self.cache.save(&credential) {
                warn!(error = %e, "Failed to persist session");
            }
            state.sign_in(user.clone());
        });

        if signed_in {
            info!(email = %user.email, role = %user.role, "Signed in");
            Ok(user)
        } else {
            debug!(token = %mask_token(&token), "Discarding stale sign-in, revoking its token");
            self.service.logout(&token).await;
            Err(AuthError::Superseded)
        }
    }

    fn store_snapshot(&self, user: &UserProfile) {
        if let Err(e) = self.cache.update_user(user) {
            warn!(error = %e, "Failed to refresh user snapshot");
        }
    }

    fn purge_cache(&self) {
        if let Err(e) = self.cache.purge() {
            warn!(error = %e, "Failed to clear stored session");
        }
    }
}

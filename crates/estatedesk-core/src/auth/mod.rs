//! Session and access control.
//!
//! This module provides:
//! - `SessionStore`: the session state machine (bootstrap, login, register,
//!   logout, refresh)
//! - `CredentialService`: the remote account operations it depends on, with
//!   `HttpCredentialService` as the REST implementation
//! - `RouteGuard` and the view wrappers built on it
//!
//! Nothing outside `SessionStore` mutates `SessionState`.

pub mod error;
pub mod guard;
pub mod service;
pub mod session;
pub mod view;

pub use error::{AuthError, AuthErrorKind};
pub use guard::{check_guest, safe_return_path, GuardDecision, GuestDecision, RouteGuard, LANDING_PATH, LOGIN_PATH};
pub use service::{AuthGrant, CredentialService, HttpCredentialService};
pub use session::{SessionPhase, SessionState, SessionStore};
pub use view::{GuestOnly, Protected, ProtectedRoutes, Redirect, Rendered};

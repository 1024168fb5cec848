//! Access decisions for protected and guest-only views.
//!
//! The guard is a pure function of [`SessionState`]: the same state always
//! yields the same decision, so every call site can share one `RouteGuard`.
//! Until the session has finished bootstrapping the only possible answer is
//! [`GuardDecision::Wait`]; redirecting earlier would bounce a signed-in user
//! to the login view on every reload.

use serde::Serialize;

use super::SessionState;
use crate::models::Role;

/// Path of the login view
pub const LOGIN_PATH: &str = "/login";

/// Default view for signed-in users
pub const LANDING_PATH: &str = "/dashboard";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GuardDecision {
    /// Session not known yet; show a neutral placeholder.
    Wait,
    /// Not signed in; `from` is where the user was headed.
    RedirectToLogin { from: String },
    /// Signed in without the required role.
    RedirectToLanding,
    Allow,
}

impl GuardDecision {
    /// Target path for redirect decisions.
    pub fn redirect_target(&self) -> Option<&'static str> {
        match self {
            GuardDecision::RedirectToLogin { .. } => Some(LOGIN_PATH),
            GuardDecision::RedirectToLanding => Some(LANDING_PATH),
            GuardDecision::Wait | GuardDecision::Allow => None,
        }
    }
}

/// Gate for a protected view, optionally restricted to one role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteGuard {
    required_role: Option<Role>,
}

impl RouteGuard {
    /// Any signed-in user.
    pub fn authenticated() -> Self {
        Self { required_role: None }
    }

    pub fn with_role(role: Role) -> Self {
        Self {
            required_role: Some(role),
        }
    }

    pub fn required_role(&self) -> Option<Role> {
        self.required_role
    }

    pub fn check(&self, state: &SessionState, location: &str) -> GuardDecision {
        if !state.initialized {
            return GuardDecision::Wait;
        }
        let user = match state.user {
            Some(ref user) if state.is_authenticated => user,
            _ => {
                return GuardDecision::RedirectToLogin {
                    from: location.to_string(),
                }
            }
        };
        match self.required_role {
            Some(required) if !user.role.satisfies(required) => GuardDecision::RedirectToLanding,
            _ => GuardDecision::Allow,
        }
    }
}

/// Decision for views only signed-out users should see (login, register).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GuestDecision {
    Wait,
    Allow,
    Redirect { to: String },
}

pub fn check_guest(state: &SessionState, return_to: Option<&str>) -> GuestDecision {
    if !state.initialized {
        GuestDecision::Wait
    } else if state.is_authenticated {
        GuestDecision::Redirect {
            to: safe_return_path(return_to).to_string(),
        }
    } else {
        GuestDecision::Allow
    }
}

/// `candidate` if it is an in-app path worth returning to, else the landing view.
///
/// Rejects anything that could leave the app (`//host`, `scheme:`) and the
/// login view itself.
pub fn safe_return_path(candidate: Option<&str>) -> &str {
    match candidate {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains("://")
                && !path.contains('\\')
                && path != LOGIN_PATH
                && !path.starts_with("/login?") =>
        {
            path
        }
        _ => LANDING_PATH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserProfile;

    fn user(role: Role) -> UserProfile {
        UserProfile {
            id: "1".to_string(),
            name: "Kim".to_string(),
            email: "kim@example.com".to_string(),
            role,
            phone: None,
        }
    }

    fn state(initialized: bool, role: Option<Role>) -> SessionState {
        SessionState {
            is_authenticated: role.is_some(),
            user: role.map(user),
            loading: !initialized,
            error: None,
            initialized,
        }
    }

    #[test]
    fn test_uninitialized_never_redirects() {
        for role in [None, Some(Role::Admin), Some(Role::Client)] {
            let s = state(false, role);
            assert_eq!(RouteGuard::authenticated().check(&s, "/leads"), GuardDecision::Wait);
            assert_eq!(RouteGuard::with_role(Role::Admin).check(&s, "/admin"), GuardDecision::Wait);
        }
    }

    #[test]
    fn test_signed_out_redirects_to_login_with_origin() {
        let decision = RouteGuard::authenticated().check(&state(true, None), "/leads/42");
        assert_eq!(
            decision,
            GuardDecision::RedirectToLogin {
                from: "/leads/42".to_string()
            }
        );
        assert_eq!(decision.redirect_target(), Some(LOGIN_PATH));
    }

    #[test]
    fn test_wrong_role_redirects_to_landing() {
        let decision = RouteGuard::with_role(Role::Admin).check(&state(true, Some(Role::Agent)), "/admin");
        assert_eq!(decision, GuardDecision::RedirectToLanding);
        assert_eq!(decision.redirect_target(), Some(LANDING_PATH));
    }

    #[test]
    fn test_matching_role_allows() {
        let guard = RouteGuard::with_role(Role::Agent);
        assert_eq!(guard.check(&state(true, Some(Role::Agent)), "/leads"), GuardDecision::Allow);
        assert_eq!(
            RouteGuard::authenticated().check(&state(true, Some(Role::Client)), "/dashboard"),
            GuardDecision::Allow
        );
    }

    #[test]
    fn test_authenticated_flag_without_user_is_treated_as_signed_out() {
        let mut s = state(true, None);
        s.is_authenticated = true;
        assert!(matches!(
            RouteGuard::authenticated().check(&s, "/x"),
            GuardDecision::RedirectToLogin { .. }
        ));
    }

    #[test]
    fn test_guest_view() {
        assert_eq!(check_guest(&state(false, None), None), GuestDecision::Wait);
        assert_eq!(check_guest(&state(true, None), Some("/leads")), GuestDecision::Allow);
        assert_eq!(
            check_guest(&state(true, Some(Role::Agent)), Some("/leads")),
            GuestDecision::Redirect {
                to: "/leads".to_string()
            }
        );
        assert_eq!(
            check_guest(&state(true, Some(Role::Agent)), None),
            GuestDecision::Redirect {
                to: LANDING_PATH.to_string()
            }
        );
    }

    #[test]
    fn test_safe_return_path_rejects_external_targets() {
        assert_eq!(safe_return_path(Some("/listings?page=2")), "/listings?page=2");
        assert_eq!(safe_return_path(Some("//evil.example")), LANDING_PATH);
        assert_eq!(safe_return_path(Some("https://evil.example")), LANDING_PATH);
        assert_eq!(safe_return_path(Some("/\\evil.example")), LANDING_PATH);
        assert_eq!(safe_return_path(Some("leads")), LANDING_PATH);
        assert_eq!(safe_return_path(Some(LOGIN_PATH)), LANDING_PATH);
        assert_eq!(safe_return_path(None), LANDING_PATH);
    }

    #[test]
    fn test_decision_serializes_tagged() {
        let json = serde_json::to_value(GuardDecision::RedirectToLogin {
            from: "/leads".to_string(),
        })
        .unwrap();
        assert_eq!(json["kind"], "redirectToLogin");
        assert_eq!(json["from"], "/leads");
    }
}

//! View-level wrappers around [`RouteGuard`].
//!
//! Two shapes exist in the routing layer: wrapping a single view
//! ([`Protected`]) and guarding a subtree of child routes
//! ([`ProtectedRoutes`]). Both defer to the same guard so they cannot drift.

use super::guard::{check_guest, GuardDecision, GuestDecision, RouteGuard};
use super::SessionState;
use crate::models::Role;

/// Where to send the user instead of rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub to: String,
    /// Location to return to after signing in.
    pub from: Option<String>,
}

/// Outcome of rendering a guarded view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered<T> {
    Content(T),
    /// Neutral, non-interactive placeholder.
    Waiting,
    Redirect(Redirect),
}

impl<T> Rendered<T> {
    fn from_decision(decision: GuardDecision, render: impl FnOnce() -> T) -> Self {
        match decision {
            GuardDecision::Wait => Rendered::Waiting,
            GuardDecision::Allow => Rendered::Content(render()),
            GuardDecision::RedirectToLogin { from } => Rendered::Redirect(Redirect {
                to: super::guard::LOGIN_PATH.to_string(),
                from: Some(from),
            }),
            GuardDecision::RedirectToLanding => Rendered::Redirect(Redirect {
                to: super::guard::LANDING_PATH.to_string(),
                from: None,
            }),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Rendered<U> {
        match self {
            Rendered::Content(content) => Rendered::Content(f(content)),
            Rendered::Waiting => Rendered::Waiting,
            Rendered::Redirect(redirect) => Rendered::Redirect(redirect),
        }
    }

    pub fn is_content(&self) -> bool {
        matches!(self, Rendered::Content(_))
    }
}

/// Wrapper form: one view behind a guard.
pub struct Protected<F> {
    guard: RouteGuard,
    view: F,
}

impl<F, T> Protected<F>
where
    F: Fn() -> T,
{
    pub fn new(view: F) -> Self {
        Self {
            guard: RouteGuard::authenticated(),
            view,
        }
    }

    pub fn require_role(mut self, role: Role) -> Self {
        self.guard = RouteGuard::with_role(role);
        self
    }

    pub fn guard(&self) -> RouteGuard {
        self.guard
    }

    /// The view is only invoked when access is allowed.
    pub fn render(&self, state: &SessionState, location: &str) -> Rendered<T> {
        Rendered::from_decision(self.guard.check(state, location), || (self.view)())
    }
}

/// Nested form: a prefix whose child routes share one guard.
pub struct ProtectedRoutes<V> {
    guard: RouteGuard,
    prefix: String,
    children: Vec<(String, V)>,
}

impl<V> ProtectedRoutes<V> {
    pub fn new(prefix: impl Into<String>, guard: RouteGuard) -> Self {
        Self {
            guard,
            prefix: normalize(&prefix.into()),
            children: Vec::new(),
        }
    }

    /// Add a child at `path`, relative to the prefix. `""` is the index route.
    pub fn route(mut self, path: &str, view: V) -> Self {
        let full = normalize(&format!("{}/{}", self.prefix, path.trim_matches('/')));
        self.children.push((full, view));
        self
    }

    pub fn guard(&self) -> RouteGuard {
        self.guard
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(|(path, _)| path.as_str())
    }

    /// Whether `location` falls under this subtree.
    pub fn covers(&self, location: &str) -> bool {
        let path = normalize(strip_query(location));
        self.prefix == "/" || path == self.prefix || path.starts_with(&format!("{}/", self.prefix))
    }

    /// `None` when no child matches; otherwise the guarded child.
    pub fn resolve(&self, state: &SessionState, location: &str) -> Option<Rendered<&V>> {
        let path = normalize(strip_query(location));
        let view = self
            .children
            .iter()
            .find(|(child, _)| *child == path)
            .map(|(_, view)| view)?;
        Some(Rendered::from_decision(self.guard.check(state, location), || view))
    }
}

/// Wrapper for login/register: only shown to signed-out users.
pub struct GuestOnly<F> {
    view: F,
}

impl<F, T> GuestOnly<F>
where
    F: Fn() -> T,
{
    pub fn new(view: F) -> Self {
        Self { view }
    }

    /// `return_to` is the `from` carried by the login redirect, if any.
    pub fn render(&self, state: &SessionState, return_to: Option<&str>) -> Rendered<T> {
        match check_guest(state, return_to) {
            GuestDecision::Wait => Rendered::Waiting,
            GuestDecision::Allow => Rendered::Content((self.view)()),
            GuestDecision::Redirect { to } => Rendered::Redirect(Redirect { to, from: None }),
        }
    }
}

fn strip_query(location: &str) -> &str {
    location.split(['?', '#']).next().unwrap_or(location)
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    let mut out = String::with_capacity(trimmed.len() + 1);
    for segment in trimmed.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

//! The application's route table.
//!
//! Public pages, guest-only pages (login, register) and the guarded areas of
//! the listings app. Agent-only leads and the admin user list show the two
//! guard forms side by side: a nested subtree and a single wrapped view.

use estatedesk_core::auth::{
    GuestOnly, Protected, ProtectedRoutes, Redirect, Rendered, RouteGuard, LOGIN_PATH,
};
use estatedesk_core::{Role, SessionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Home,
    Login,
    Register,
    Dashboard,
    Listings,
    Calendar,
    Leads,
    NewLead,
    Users,
}

impl Screen {
    pub fn title(&self) -> &'static str {
        match self {
            Screen::Home => "Home",
            Screen::Login => "Sign in",
            Screen::Register => "Create account",
            Screen::Dashboard => "Dashboard",
            Screen::Listings => "Listings",
            Screen::Calendar => "Appointments",
            Screen::Leads => "Leads",
            Screen::NewLead => "New lead",
            Screen::Users => "User management",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Screen(Screen),
    Waiting,
    Redirect(Redirect),
    NotFound,
}

impl From<Rendered<Screen>> for Resolution {
    fn from(rendered: Rendered<Screen>) -> Self {
        match rendered {
            Rendered::Content(screen) => Resolution::Screen(screen),
            Rendered::Waiting => Resolution::Waiting,
            Rendered::Redirect(redirect) => Resolution::Redirect(redirect),
        }
    }
}

const USERS_PATH: &str = "/admin/users";
const REGISTER_PATH: &str = "/register";

pub struct AppRoutes {
    app: ProtectedRoutes<Screen>,
    leads: ProtectedRoutes<Screen>,
    users: Protected<fn() -> Screen>,
    login: GuestOnly<fn() -> Screen>,
    register: GuestOnly<fn() -> Screen>,
}

impl AppRoutes {
    pub fn new() -> Self {
        Self {
            app: ProtectedRoutes::new("/", RouteGuard::authenticated())
                .route("dashboard", Screen::Dashboard)
                .route("listings", Screen::Listings)
                .route("calendar", Screen::Calendar),
            leads: ProtectedRoutes::new("/leads", RouteGuard::with_role(Role::Agent))
                .route("", Screen::Leads)
                .route("new", Screen::NewLead),
            users: Protected::new((|| Screen::Users) as fn() -> Screen).require_role(Role::Admin),
            login: GuestOnly::new((|| Screen::Login) as fn() -> Screen),
            register: GuestOnly::new((|| Screen::Register) as fn() -> Screen),
        }
    }

    pub fn resolve(&self, state: &SessionState, location: &str) -> Resolution {
        let (path, query) = split_location(location);
        let return_to = query_param(query, "from");

        match path {
            "/" => Resolution::Screen(Screen::Home),
            LOGIN_PATH => self.login.render(state, return_to.as_deref()).into(),
            REGISTER_PATH => self.register.render(state, return_to.as_deref()).into(),
            USERS_PATH => self.users.render(state, location).into(),
            _ if self.leads.covers(location) => self
                .leads
                .resolve(state, location)
                .map(|rendered| Resolution::from(rendered.map(|screen| *screen)))
                .unwrap_or(Resolution::NotFound),
            _ => self
                .app
                .resolve(state, location)
                .map(|rendered| Resolution::from(rendered.map(|screen| *screen)))
                .unwrap_or(Resolution::NotFound),
        }
    }

    /// Every routable path with a short description of who may see it.
    pub fn describe(&self) -> Vec<(String, String)> {
        let mut rows = vec![
            ("/".to_string(), "public".to_string()),
            (LOGIN_PATH.to_string(), "signed-out only".to_string()),
            (REGISTER_PATH.to_string(), "signed-out only".to_string()),
        ];
        for routes in [&self.app, &self.leads] {
            let access = access_label(routes.guard());
            rows.extend(routes.paths().map(|path| (path.to_string(), access.clone())));
        }
        rows.push((USERS_PATH.to_string(), access_label(self.users.guard())));
        rows
    }
}

impl Default for AppRoutes {
    fn default() -> Self {
        Self::new()
    }
}

/// Location to visit after a redirect, carrying the origin for login.
pub fn follow(redirect: &Redirect) -> String {
    match redirect.from {
        Some(ref from) => format!("{}?from={}", redirect.to, from),
        None => redirect.to.clone(),
    }
}

fn access_label(guard: RouteGuard) -> String {
    match guard.required_role() {
        Some(role) => format!("signed in, role {}", role),
        None => "signed in".to_string(),
    }
}

fn split_location(location: &str) -> (&str, &str) {
    let without_fragment = location.split('#').next().unwrap_or(location);
    match without_fragment.split_once('?') {
        Some((path, query)) => (normalize_path(path), query),
        None => (normalize_path(without_fragment), ""),
    }
}

fn normalize_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// Value of `key` in a query string. The `from` value is everything after
/// `from=`, since origins may carry their own query.
fn query_param(query: &str, key: &str) -> Option<String> {
    let prefix = format!("{}=", key);
    if let Some(rest) = query.strip_prefix(&prefix) {
        return Some(rest.to_string()).filter(|v| !v.is_empty());
    }
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix(&prefix))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use estatedesk_core::auth::LANDING_PATH;
    use estatedesk_core::UserProfile;

    fn state(initialized: bool, role: Option<Role>) -> SessionState {
        SessionState {
            is_authenticated: role.is_some(),
            user: role.map(|role| UserProfile {
                id: "1".to_string(),
                name: "Jo".to_string(),
                email: "jo@example.com".to_string(),
                role,
                phone: None,
            }),
            loading: !initialized,
            error: None,
            initialized,
        }
    }

    #[test]
    fn test_home_is_public() {
        let routes = AppRoutes::new();
        assert_eq!(routes.resolve(&state(false, None), "/"), Resolution::Screen(Screen::Home));
    }

    #[test]
    fn test_everything_guarded_waits_before_bootstrap() {
        let routes = AppRoutes::new();
        for path in ["/dashboard", "/leads", "/leads/new", "/admin/users", "/login"] {
            assert_eq!(routes.resolve(&state(false, None), path), Resolution::Waiting, "{}", path);
        }
    }

    #[test]
    fn test_signed_out_user_is_sent_to_login_and_back() {
        let routes = AppRoutes::new();
        let signed_out = state(true, None);

        let Resolution::Redirect(redirect) = routes.resolve(&signed_out, "/listings") else {
            panic!("expected redirect");
        };
        assert_eq!(redirect.to, LOGIN_PATH);
        let next = follow(&redirect);
        assert_eq!(next, "/login?from=/listings");
        assert_eq!(routes.resolve(&signed_out, &next), Resolution::Screen(Screen::Login));

        // Once signed in, the login page forwards to the original destination
        let signed_in = state(true, Some(Role::Client));
        assert_eq!(
            routes.resolve(&signed_in, &next),
            Resolution::Redirect(Redirect {
                to: "/listings".to_string(),
                from: None,
            })
        );
    }

    #[test]
    fn test_role_restricted_areas() {
        let routes = AppRoutes::new();
        let client = state(true, Some(Role::Client));
        let landing = Resolution::Redirect(Redirect {
            to: LANDING_PATH.to_string(),
            from: None,
        });

        assert_eq!(routes.resolve(&client, "/leads/new"), landing);
        assert_eq!(routes.resolve(&client, "/admin/users"), landing);
        assert_eq!(
            routes.resolve(&state(true, Some(Role::Agent)), "/leads/new"),
            Resolution::Screen(Screen::NewLead)
        );
        assert_eq!(
            routes.resolve(&state(true, Some(Role::Admin)), "/admin/users/"),
            Resolution::Screen(Screen::Users)
        );
    }

    #[test]
    fn test_unknown_paths() {
        let routes = AppRoutes::new();
        let agent = state(true, Some(Role::Agent));
        assert_eq!(routes.resolve(&agent, "/nowhere"), Resolution::NotFound);
        assert_eq!(routes.resolve(&agent, "/leads/archive"), Resolution::NotFound);
    }

    #[test]
    fn test_query_param() {
        assert_eq!(query_param("from=/leads?tab=open", "from").as_deref(), Some("/leads?tab=open"));
        assert_eq!(query_param("x=1&from=/calendar", "from").as_deref(), Some("/calendar"));
        assert_eq!(query_param("from=", "from"), None);
        assert_eq!(query_param("", "from"), None);
    }

    #[test]
    fn test_describe_lists_guarded_paths() {
        let rows = AppRoutes::new().describe();
        assert!(rows.contains(&("/leads/new".to_string(), "signed in, role agent".to_string())));
        assert!(rows.contains(&("/admin/users".to_string(), "signed in, role admin".to_string())));
        assert!(rows.contains(&("/dashboard".to_string(), "signed in".to_string())));
    }
}

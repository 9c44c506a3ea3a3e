use crate::auth::Session;
use crate::model::Role;
use serde::Serialize;

pub const LOGIN_ROUTE: &str = "/SIS-login";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    Public,
    Roles(&'static [Role]),
}

/// Known routes of the UI shell. `:uid` segments match any single segment.
const ROUTES: &[(&str, RouteAccess)] = &[
    (LOGIN_ROUTE, RouteAccess::Public),
    ("/admin-dashboard", RouteAccess::Roles(&[Role::Admin])),
    ("/user-dashboard", RouteAccess::Roles(&[Role::User])),
    ("/sub-admin", RouteAccess::Roles(&[Role::Management])),
    (
        "/user-details/:uid",
        RouteAccess::Roles(&[Role::Admin, Role::Management]),
    ),
];

fn pattern_matches(pattern: &str, path: &str) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or("");
    let pat: Vec<&str> = pattern.trim_matches('/').split('/').collect();
    let got: Vec<&str> = path.trim_matches('/').split('/').collect();
    pat.len() == got.len()
        && pat
            .iter()
            .zip(&got)
            .all(|(p, g)| if p.starts_with(':') { !g.is_empty() } else { p == g })
}

pub fn route_access(path: &str) -> Option<RouteAccess> {
    ROUTES
        .iter()
        .find(|(pattern, _)| pattern_matches(pattern, path))
        .map(|(_, access)| *access)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum GuardDecision {
    /// Auth status unknown; nothing should render yet.
    Loading,
    Authorized,
    Redirect { to: String },
}

/// Decides what the shell does with `allowed` roles on the current session.
/// An empty `allowed` list means the route is public.
pub fn resolve(session: &Session, allowed: &[Role]) -> GuardDecision {
    if allowed.is_empty() {
        return GuardDecision::Authorized;
    }
    match session {
        Session::Loading => GuardDecision::Loading,
        Session::SignedOut => GuardDecision::Redirect {
            to: LOGIN_ROUTE.to_string(),
        },
        Session::SignedIn { user } if allowed.contains(&user.role) => {
            GuardDecision::Authorized
        }
        Session::SignedIn { user } => GuardDecision::Redirect {
            to: user.role.dashboard_route(),
        },
    }
}

pub fn resolve_route(session: &Session, path: &str) -> Option<GuardDecision> {
    match route_access(path)? {
        RouteAccess::Public => Some(GuardDecision::Authorized),
        RouteAccess::Roles(roles) => Some(resolve(session, roles)),
    }
}

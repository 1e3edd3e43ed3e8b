//! Route access decisions driven by the session cookie pair.
//!
//! Rules are checked in order, first match wins:
//! 1. Public page (`/`, `/about`, `/doctors`, `/doctors/{id}`) → ALLOW
//! 2. Guest-only page (`/login`, `/signup`) → ALLOW, or redirect a
//!    signed-in user to their dashboard
//! 3. `/dashboard` → redirect to the role's dashboard, or `/login`
//! 4. Role area (`/dashboard/doctor/**`, `/dashboard/patient/**`) → ALLOW
//!    for that role, redirect other signed-in users to their own dashboard
//! 5. Anything else → ALLOW when authenticated, else redirect to `/login`
//!
//! The cookies are a navigation hint for the UI shell, not a credential.

use crate::auth::Session;
use crate::models::Role;

pub const LOGIN_PATH: &str = "/login";
pub const SIGNUP_PATH: &str = "/signup";
pub const DASHBOARD_PATH: &str = "/dashboard";
pub const DOCTOR_DASHBOARD: &str = "/dashboard/doctor";
pub const PATIENT_DASHBOARD: &str = "/dashboard/patient";

pub const AUTH_COOKIE: &str = "isAuthenticated";
pub const ROLE_COOKIE: &str = "userRole";

/// Landing page for a role.
pub fn dashboard_for(role: Role) -> &'static str {
    match role {
        Role::Doctor => DOCTOR_DASHBOARD,
        Role::Patient => PATIENT_DASHBOARD,
    }
}

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// The `isAuthenticated` / `userRole` cookie pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionCookies {
    pub authenticated: bool,
    pub role: Option<Role>,
}

impl SessionCookies {
    pub fn from_session(session: Option<&Session>) -> Self {
        match session {
            Some(session) => Self {
                authenticated: true,
                role: Some(session.role()),
            },
            None => Self::default(),
        }
    }

    /// Read the pair from a `Cookie` header value. Unknown cookies and
    /// unparseable values are ignored.
    pub fn parse_header(header: &str) -> Self {
        let mut cookies = Self::default();
        for pair in header.split(';') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            match name.trim() {
                AUTH_COOKIE => cookies.authenticated = value.trim() == "true",
                ROLE_COOKIE => cookies.role = value.trim().parse().ok(),
                _ => {}
            }
        }
        cookies
    }

    /// `(name, value)` pairs the UI shell should set after a session change.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![(AUTH_COOKIE, self.authenticated.to_string())];
        if let Some(role) = self.signed_in_role() {
            pairs.push((ROLE_COOKIE, role.as_str().to_string()));
        }
        pairs
    }

    /// Role of a signed-in user; `None` for guests.
    pub fn signed_in_role(&self) -> Option<Role> {
        if self.authenticated {
            self.role
        } else {
            None
        }
    }
}

/// Which rule produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessReason {
    Public,
    GuestOnly,
    DashboardHome,
    RoleArea,
    WrongRole,
    Authenticated,
    Unauthenticated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow(AccessReason),
    Redirect {
        to: &'static str,
        reason: AccessReason,
    },
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }

    pub fn redirect_target(&self) -> Option<&'static str> {
        match self {
            Self::Allow(_) => None,
            Self::Redirect { to, .. } => Some(*to),
        }
    }

    pub fn reason(&self) -> AccessReason {
        match self {
            Self::Allow(reason) | Self::Redirect { reason, .. } => *reason,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// RouteGuard
// ═══════════════════════════════════════════════════════════

pub struct RouteGuard;

impl RouteGuard {
    pub fn decide(cookies: &SessionCookies, path: &str) -> AccessDecision {
        let path = normalize(path);
        let role = cookies.signed_in_role();

        if is_public(path) {
            return AccessDecision::Allow(AccessReason::Public);
        }

        if path == LOGIN_PATH || path == SIGNUP_PATH {
            return match role {
                Some(role) => AccessDecision::Redirect {
                    to: dashboard_for(role),
                    reason: AccessReason::GuestOnly,
                },
                None => AccessDecision::Allow(AccessReason::GuestOnly),
            };
        }

        if path == DASHBOARD_PATH {
            return AccessDecision::Redirect {
                to: role.map_or(LOGIN_PATH, dashboard_for),
                reason: AccessReason::DashboardHome,
            };
        }

        if let Some(required) = role_area(path) {
            return match role {
                Some(role) if role == required => AccessDecision::Allow(AccessReason::RoleArea),
                Some(role) => AccessDecision::Redirect {
                    to: dashboard_for(role),
                    reason: AccessReason::WrongRole,
                },
                None => AccessDecision::Redirect {
                    to: LOGIN_PATH,
                    reason: AccessReason::Unauthenticated,
                },
            };
        }

        if cookies.authenticated {
            AccessDecision::Allow(AccessReason::Authenticated)
        } else {
            AccessDecision::Redirect {
                to: LOGIN_PATH,
                reason: AccessReason::Unauthenticated,
            }
        }
    }

    /// Decide straight from the session service's current session.
    pub fn decide_for_session(session: Option<&Session>, path: &str) -> AccessDecision {
        Self::decide(&SessionCookies::from_session(session), path)
    }
}

/// Drop query string, fragment and trailing slashes.
fn normalize(path: &str) -> &str {
    let end = path.find(&['?', '#'][..]).unwrap_or(path.len());
    let trimmed = path[..end].trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

fn is_public(path: &str) -> bool {
    match path {
        "/" | "/about" | "/doctors" => true,
        _ => path
            .strip_prefix("/doctors/")
            .is_some_and(|id| !id.is_empty() && !id.contains('/')),
    }
}

fn within(path: &str, area: &str) -> bool {
    path == area
        || path
            .strip_prefix(area)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn role_area(path: &str) -> Option<Role> {
    if within(path, DOCTOR_DASHBOARD) {
        Some(Role::Doctor)
    } else if within(path, PATIENT_DASHBOARD) {
        Some(Role::Patient)
    } else {
        None
    }
}

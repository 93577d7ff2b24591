//! Route guard: decides, from the session alone, whether a protected page
//! renders, shows the loading state, or redirects.

use crate::models::{Role, Session};
use crate::redirect::RoleRedirectTable;

pub const LOGIN_PATH: &str = "/login";

pub const ACCESS_DENIED_NOTICE: &str = "Access denied: your account cannot view that page.";

/// GuardDecision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session or role still resolving. Render the loading state, do not redirect.
    Pending,
    /// No user. Send to the login page, remembering where they were headed.
    Unauthenticated { from: String },
    Authorized,
    /// Signed in with the wrong role. Show the notice and send them home.
    Forbidden { notice: String, redirect_to: String },
}

/// evaluate
///
/// A pure function of the session, the route's allowed roles and the current
/// path. An empty `allowed_roles` admits any signed-in user.
pub fn evaluate(
    session: &Session,
    allowed_roles: &[Role],
    current_path: &str,
    table: &RoleRedirectTable,
) -> GuardDecision {
    if session.is_pending() {
        return GuardDecision::Pending;
    }

    if session.user.is_none() {
        return GuardDecision::Unauthenticated {
            from: current_path.to_string(),
        };
    }

    let admitted = allowed_roles.is_empty()
        || session
            .user_role
            .is_some_and(|role| allowed_roles.contains(&role));

    if admitted {
        GuardDecision::Authorized
    } else {
        GuardDecision::Forbidden {
            notice: ACCESS_DENIED_NOTICE.to_string(),
            redirect_to: table.landing_path(session.user_role).to_string(),
        }
    }
}

/// `/login?from=<current path>`, percent-encoded.
pub fn login_location(from: &str) -> String {
    format!("{}?from={}", LOGIN_PATH, urlencoding::encode(from))
}

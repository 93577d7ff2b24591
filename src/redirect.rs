use std::sync::Mutex;

use axum::http::HeaderValue;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Role, Session};

pub const ADMIN_PREFIX: &str = "/admin-dashboard";
pub const MEMBER_PREFIX: &str = "/member-dashboard";
pub const USER_PREFIX: &str = "/dashboard";

/// Landing path for sessions whose role is missing or unrecognized.
pub const DEFAULT_LANDING: &str = "/";

// --- Role Redirect Table ---

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RedirectTableError {
    #[error("role '{0}' has no landing path")]
    MissingRole(Role),
    #[error("role '{0}' has more than one landing path")]
    DuplicateRole(Role),
    #[error("landing path '{0}' must be a site-local path")]
    InvalidPath(String),
}

/// RoleRedirectTable
///
/// Role -> default landing path. Constructed only through [`RoleRedirectTable::validated`]
/// (or `Default`), so every role has exactly one entry and every path is absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRedirectTable {
    entries: Vec<(Role, String)>,
    fallback: String,
}

impl Default for RoleRedirectTable {
    fn default() -> Self {
        Self {
            entries: vec![
                (Role::Admin, ADMIN_PREFIX.to_string()),
                (Role::Member, MEMBER_PREFIX.to_string()),
                (Role::User, USER_PREFIX.to_string()),
            ],
            fallback: DEFAULT_LANDING.to_string(),
        }
    }
}

/// is_navigable
///
/// A site-local path that can travel in a `Location` header: starts with a
/// single `/`, and holds only visible ASCII. `//host` and `/\host` would leave
/// the site; control characters cannot be sent in a header at all.
pub fn is_navigable(path: &str) -> bool {
    path.starts_with('/')
        && !path.starts_with("//")
        && !path.contains('\\')
        && path.bytes().all(|b| b.is_ascii_graphic())
}

fn check_path(path: &str) -> Result<(), RedirectTableError> {
    if is_navigable(path) {
        Ok(())
    } else {
        Err(RedirectTableError::InvalidPath(path.to_string()))
    }
}

impl RoleRedirectTable {
    pub fn validated(
        entries: Vec<(Role, String)>,
        fallback: String,
    ) -> Result<Self, RedirectTableError> {
        for role in Role::ALL {
            match entries.iter().filter(|(r, _)| *r == role).count() {
                0 => return Err(RedirectTableError::MissingRole(role)),
                1 => {}
                _ => return Err(RedirectTableError::DuplicateRole(role)),
            }
        }
        for (_, path) in &entries {
            check_path(path)?;
        }
        check_path(&fallback)?;

        Ok(Self { entries, fallback })
    }

    /// Builds the default table with `ROLE_REDIRECT_{ADMIN,MEMBER,USER,DEFAULT}`
    /// overrides read through `lookup`.
    pub fn from_env_overrides(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, RedirectTableError> {
        let defaults = Self::default();
        let entries = defaults
            .entries
            .into_iter()
            .map(|(role, path)| {
                let key = format!("ROLE_REDIRECT_{}", role.as_str().to_ascii_uppercase());
                (role, lookup(&key).unwrap_or(path))
            })
            .collect();
        let fallback = lookup("ROLE_REDIRECT_DEFAULT").unwrap_or(defaults.fallback);

        Self::validated(entries, fallback)
    }

    /// Default landing path of `role`; the fallback when there is no role.
    pub fn landing_path(&self, role: Option<Role>) -> &str {
        role.and_then(|role| {
            self.entries
                .iter()
                .find(|(r, _)| *r == role)
                .map(|(_, path)| path.as_str())
        })
        .unwrap_or(&self.fallback)
    }
}

// --- Permission Predicate ---

/// Segment-aware prefix test: `/dashboard` matches `/dashboard` and
/// `/dashboard/bookings`, but not `/dashboardx`.
pub fn path_has_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// role_permits
///
/// Which deep links a role may be sent back to after signing in. Members are
/// also accepted for admin links; the route guard still rejects them on arrival.
pub fn role_permits(role: Role, path: &str) -> bool {
    match role {
        Role::Admin => path_has_prefix(path, ADMIN_PREFIX),
        Role::Member => path_has_prefix(path, MEMBER_PREFIX) || path_has_prefix(path, ADMIN_PREFIX),
        Role::User => path_has_prefix(path, USER_PREFIX),
    }
}

// --- Resolution ---

/// Navigation
///
/// A navigation the portal asks the client to perform. `replace` means the
/// current history entry is overwritten rather than pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub to: String,
    pub replace: bool,
}

impl Navigation {
    pub fn replace(to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            replace: true,
        }
    }
}

/// resolve_destination
///
/// Where an authenticated session should land:
/// 1. nowhere, if the role already permits the current path,
/// 2. otherwise a permitted, navigable intended destination,
/// 3. otherwise the role's landing path.
///
/// Returns `None` when the client should stay, which is what makes repeated
/// evaluation converge.
pub fn resolve_destination(
    role: Option<Role>,
    intended_from: Option<&str>,
    current_path: &str,
    table: &RoleRedirectTable,
) -> Option<Navigation> {
    if let Some(role) = role {
        if role_permits(role, current_path) {
            return None;
        }
        if let Some(from) = intended_from {
            if from != current_path && is_navigable(from) && role_permits(role, from) {
                return Some(Navigation::replace(from));
            }
        }
    }

    let to = table.landing_path(role);
    if to == current_path {
        None
    } else {
        Some(Navigation::replace(to))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolutionKey {
    user_id: String,
    role: Option<Role>,
    from: Option<String>,
    current_path: String,
}

/// RedirectResolver
///
/// Runs [`resolve_destination`] for sessions that are authenticated with a
/// known role, memoizing the last decision on the session identity.
#[derive(Debug)]
pub struct RedirectResolver {
    table: RoleRedirectTable,
    last: Mutex<Option<(ResolutionKey, Option<Navigation>)>>,
}

impl RedirectResolver {
    pub fn new(table: RoleRedirectTable) -> Self {
        Self {
            table,
            last: Mutex::new(None),
        }
    }

    /// Returns `None` while the session is pending or anonymous, and when the
    /// client is already where it should be.
    pub fn resolve(
        &self,
        session: &Session,
        intended_from: Option<&str>,
        current_path: &str,
    ) -> Option<Navigation> {
        if session.is_pending() {
            return None;
        }
        let user = session.user.as_ref()?;

        let key = ResolutionKey {
            user_id: user.id.clone(),
            role: session.user_role,
            from: intended_from.map(str::to_string),
            current_path: current_path.to_string(),
        };

        // A poisoned memo only loses the cached decision.
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some((cached_key, decision)) = last.as_ref() {
            if *cached_key == key {
                return decision.clone();
            }
        }

        let decision =
            resolve_destination(session.user_role, intended_from, current_path, &self.table);
        tracing::debug!(
            user = %key.user_id,
            role = ?key.role,
            to = ?decision.as_ref().map(|n| n.to.as_str()),
            "resolved landing destination"
        );
        *last = Some((key, decision.clone()));
        decision
    }
}

/// RenderPass
///
/// Tracks the redirects issued while answering one request. At most one
/// redirect is allowed per pass, and never one back onto the current path.
#[derive(Debug)]
pub struct RenderPass {
    pub id: Uuid,
    current_path: String,
    issued: Option<Navigation>,
}

impl RenderPass {
    pub fn new(current_path: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            current_path: current_path.to_string(),
            issued: None,
        }
    }

    pub fn redirect(&mut self, navigation: Navigation) -> Result<&Navigation, AppError> {
        if HeaderValue::from_str(&navigation.to).is_err() {
            return Err(AppError::InvalidRedirect(navigation.to.escape_debug().to_string()));
        }
        let target = navigation.to.split('?').next().unwrap_or_default();
        if target == self.current_path {
            return Err(AppError::RedirectCycle(format!(
                "{} redirects to itself",
                self.current_path
            )));
        }
        if let Some(previous) = &self.issued {
            return Err(AppError::RedirectCycle(format!(
                "second redirect from {} (already sent to {})",
                self.current_path, previous.to
            )));
        }

        tracing::debug!(pass = %self.id, from = %self.current_path, to = %navigation.to, "redirect");
        Ok(self.issued.insert(navigation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Identity;

    fn session(role: Option<Role>) -> Session {
        Session::authenticated(
            Identity {
                id: "u1".to_string(),
                ..Identity::default()
            },
            role,
        )
    }

    #[test]
    fn prefix_is_segment_aware() {
        assert!(path_has_prefix("/dashboard", "/dashboard"));
        assert!(path_has_prefix("/dashboard/bookings", "/dashboard"));
        assert!(!path_has_prefix("/dashboardx", "/dashboard"));
        assert!(!path_has_prefix("/admin-dashboard", "/dashboard"));
    }

    #[test]
    fn table_rejects_missing_and_duplicate_roles() {
        let missing = RoleRedirectTable::validated(
            vec![(Role::Admin, "/a".into()), (Role::User, "/u".into())],
            "/".into(),
        );
        assert_eq!(missing, Err(RedirectTableError::MissingRole(Role::Member)));

        let duplicate = RoleRedirectTable::validated(
            vec![
                (Role::Admin, "/a".into()),
                (Role::Member, "/m".into()),
                (Role::User, "/u".into()),
                (Role::User, "/u2".into()),
            ],
            "/".into(),
        );
        assert_eq!(duplicate, Err(RedirectTableError::DuplicateRole(Role::User)));
    }

    #[test]
    fn table_rejects_off_site_paths() {
        let result = RoleRedirectTable::validated(
            vec![
                (Role::Admin, "//evil.example".into()),
                (Role::Member, "/m".into()),
                (Role::User, "/u".into()),
            ],
            "/".into(),
        );
        assert!(matches!(result, Err(RedirectTableError::InvalidPath(_))));
    }

    #[test]
    fn env_overrides_replace_single_entries() {
        let table = RoleRedirectTable::from_env_overrides(|key| match key {
            "ROLE_REDIRECT_USER" => Some("/dashboard/bookings".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(table.landing_path(Some(Role::User)), "/dashboard/bookings");
        assert_eq!(table.landing_path(Some(Role::Admin)), "/admin-dashboard");
        assert_eq!(table.landing_path(None), "/");
    }

    #[test]
    fn memoized_resolution_matches_pure_function() {
        let resolver = RedirectResolver::new(RoleRedirectTable::default());
        let s = session(Some(Role::Member));
        let first = resolver.resolve(&s, Some("/member-dashboard/bookings"), "/login");
        let second = resolver.resolve(&s, Some("/member-dashboard/bookings"), "/login");
        assert_eq!(first, second);
        assert_eq!(first, Some(Navigation::replace("/member-dashboard/bookings")));
    }

    #[test]
    fn resolver_ignores_pending_and_anonymous_sessions() {
        let resolver = RedirectResolver::new(RoleRedirectTable::default());
        let mut pending = session(Some(Role::Admin));
        pending.role_loading = true;
        assert_eq!(resolver.resolve(&pending, None, "/login"), None);
        assert_eq!(resolver.resolve(&Session::anonymous(), None, "/login"), None);
    }

    #[test]
    fn render_pass_allows_one_redirect() {
        let mut pass = RenderPass::new("/dashboard");
        assert!(pass.redirect(Navigation::replace("/login?from=%2Fdashboard")).is_ok());
        assert!(matches!(
            pass.redirect(Navigation::replace("/")),
            Err(AppError::RedirectCycle(_))
        ));
    }

    #[test]
    fn render_pass_refuses_self_redirect() {
        let mut pass = RenderPass::new("/member-dashboard");
        assert!(matches!(
            pass.redirect(Navigation::replace("/member-dashboard")),
            Err(AppError::RedirectCycle(_))
        ));
    }

    #[test]
    fn unsendable_destinations_fall_back_to_landing() {
        let table = RoleRedirectTable::default();
        for from in ["/dashboard/\r\nx", "/dashboard/a b", "/dashboard/\\evil", "/dashboard/\u{e9}"] {
            assert!(role_permits(Role::User, from));
            assert!(!is_navigable(from));
            assert_eq!(
                resolve_destination(Some(Role::User), Some(from), "/login", &table),
                Some(Navigation::replace("/dashboard"))
            );
        }
    }

    #[test]
    fn render_pass_refuses_header_breaking_target() {
        let mut pass = RenderPass::new("/login");
        assert!(matches!(
            pass.redirect(Navigation::replace("/dashboard/\r\nx")),
            Err(AppError::InvalidRedirect(_))
        ));
        // Nothing was issued, so a valid redirect is still possible.
        assert!(pass.redirect(Navigation::replace("/dashboard")).is_ok());
    }
}

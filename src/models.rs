use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Identity & Roles ---

/// Role
///
/// The three access tiers of the portal. Serialized lowercase so it matches the
/// `role` field returned by the upstream user profile endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    Member,
    User,
}

impl Role {
    /// Every role, in the order the redirect table is validated against.
    pub const ALL: [Role; 3] = [Role::Admin, Role::Member, Role::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Identity
///
/// The authenticated principal behind a session. `id` is the subject of the
/// bearer token and the key used against `/api/users/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Identity {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Session
///
/// Snapshot of the authentication state for one render pass. Built by the
/// session provider, never mutated by the guard or the redirect resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Session {
    pub user: Option<Identity>,
    pub user_role: Option<Role>,
    pub loading: bool,
    pub role_loading: bool,
}

impl Session {
    /// No user, nothing in flight.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A fully resolved session for `user` holding `role`.
    pub fn authenticated(user: Identity, role: Option<Role>) -> Self {
        Self {
            user: Some(user),
            user_role: role,
            loading: false,
            role_loading: false,
        }
    }

    /// True while either the identity or its role is still being resolved.
    pub fn is_pending(&self) -> bool {
        self.loading || self.role_loading
    }
}

// --- Upstream Records ---

/// CourtRecord
///
/// A bookable court as returned by `GET /api/courts`. The upstream API is a
/// document store, so the identifier arrives as `_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CourtRecord {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    // Sport type, e.g. "tennis". Categories are keyed on this field.
    #[serde(rename = "type")]
    pub court_type: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_per_hour: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// CourtsEnvelope
///
/// Response wrapper of the courts endpoint: `{ success, data, error? }`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CourtsEnvelope {
    pub success: bool,
    #[serde(default)]
    pub data: Vec<CourtRecord>,
    #[serde(default)]
    pub error: Option<String>,
}

/// BookingStatus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum BookingStatus {
    #[default]
    Pending,
    Approved,
    Confirmed,
    Rejected,
    Cancelled,
}

/// BookingRecord
///
/// A booking as returned by `GET /api/bookings/confirmed/{userId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct BookingRecord {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub court_id: Option<String>,
    #[serde(default)]
    pub court_name: Option<String>,
    #[serde(default)]
    pub court_type: Option<String>,
    // Calendar day as sent upstream; formatting is left to the UI.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub slots: Vec<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub status: BookingStatus,
    #[serde(default)]
    #[ts(type = "string | null")]
    pub created_at: Option<DateTime<Utc>>,
}

/// UserProfile
///
/// Profile payload of `GET /api/users/{userId}`. The `role` string is parsed
/// into a [`Role`] by the session provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserProfile {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    #[ts(type = "string | null")]
    pub member_since: Option<DateTime<Utc>>,
}

/// UserEnvelope
///
/// `{ user: UserProfile }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEnvelope {
    pub user: UserProfile,
}

/// Coupon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Coupon {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub code: String,
    // Percentage off, 1..=100.
    pub discount: u8,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    #[ts(type = "string | null")]
    pub expires_at: Option<NaiveDate>,
}

/// CouponsEnvelope
///
/// `{ coupons: [...] }`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CouponsEnvelope {
    #[serde(default)]
    pub coupons: Vec<Coupon>,
}

/// CouponInput
///
/// Create/update payload for the coupon resource. Checked with
/// [`CouponInput::validate`] before it is sent upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CouponInput {
    pub code: String,
    pub discount: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub expires_at: Option<NaiveDate>,
}

/// FieldError
///
/// A single failed form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

impl CouponInput {
    /// Collects every field problem instead of stopping at the first one.
    pub fn validate(&self, today: NaiveDate) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        let code = self.code.trim();
        if code.is_empty() {
            errors.push(FieldError::new("code", "Coupon code is required"));
        } else if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            errors.push(FieldError::new(
                "code",
                "Coupon code may only contain letters, digits, '-' and '_'",
            ));
        }

        if self.discount == 0 || self.discount > 100 {
            errors.push(FieldError::new("discount", "Discount must be between 1 and 100"));
        }

        if let Some(expires) = self.expires_at {
            if expires < today {
                errors.push(FieldError::new("expires_at", "Expiry date is in the past"));
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

// --- View Models (Output) ---

/// Category
///
/// Derived grouping of courts by sport type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Category {
    #[serde(rename = "type")]
    pub category_type: String,
    pub count: usize,
    pub image: Option<String>,
}

/// Page
///
/// One page of a paginated listing. `page` is 1-based and always within
/// `1..=total_pages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

/// ListingView
///
/// A paginated page of data plus the transient notice shown when the fetch
/// behind it failed. `retry` is the link the UI offers for a manual refetch.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ListingView<T> {
    pub title: String,
    pub page: Page<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<String>,
}

/// HomeView
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct HomeView {
    pub featured_courts: Vec<CourtRecord>,
    pub categories: Vec<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

/// LoginView
///
/// Rendered for anonymous visitors of `/login`; `from` echoes the intended
/// destination so the client can post it back after signing in.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginView {
    pub page: String,
    pub from: Option<String>,
}

/// StaticPage
///
/// Descriptor of a content page whose body lives in the UI bundle.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct StaticPage {
    pub slug: String,
    pub title: String,
}

/// DashboardView
///
/// Landing data shared by the three dashboards.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DashboardView {
    pub role: Role,
    pub profile: UserProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_count: Option<usize>,
}

/// BookingsView
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct BookingsView {
    pub bookings: Vec<BookingRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

/// LoadingView
///
/// Returned while the session is still resolving; the client polls again.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoadingView {
    pub loading: bool,
    pub path: String,
}

/// DeniedView
///
/// Body of the redirect issued when a signed-in user hits a route their role
/// may not see.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DeniedView {
    pub notice: String,
    pub redirect_to: String,
}

/// ErrorPage
///
/// The generic error page rendered for unmatched routes and failed handlers.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorPage {
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub fields: Vec<FieldError>,
    pub actions: Vec<String>,
}

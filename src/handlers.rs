use crate::{
    AppState,
    categories,
    errors::AppError,
    guard::LOGIN_PATH,
    models::{
        BookingsView, Category, Coupon, CouponInput, CourtRecord, DashboardView, HomeView,
        ListingView, LoadingView, LoginView, Role, StaticPage, UserProfile,
    },
    redirect::{Navigation, RenderPass},
    session::{CurrentSession, ResolvedSession},
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Cache key of the shared court list.
pub const COURTS_QUERY: &str = "courts";

const FEATURED_COURTS: usize = 6;

const LOAD_FAILED_NOTICE: &str = "Could not load courts. Please try again.";

// --- Query Structs ---

/// PageQuery
///
/// `?page=N&refetch=1` on every paginated listing. `page` is signed so that
/// `page=0` and `page=-3` clamp to the first page instead of failing to parse.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct PageQuery {
    pub page: Option<i64>,
    #[serde(default)]
    pub refetch: Option<u8>,
}

impl PageQuery {
    fn page(&self) -> i64 {
        self.page.unwrap_or(1)
    }

    fn refetch(&self) -> bool {
        self.refetch.is_some_and(|flag| flag != 0)
    }
}

/// LoginQuery
///
/// The intended destination attached by the route guard.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct LoginQuery {
    pub from: Option<String>,
}

/// CouponsView
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CouponsView {
    pub coupons: Vec<Coupon>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

// --- Shared Helpers ---

/// Court list through the query cache.
async fn fetch_courts(state: &AppState, refetch: bool) -> Result<Vec<CourtRecord>, AppError> {
    let api = state.api.clone();
    let limit = state.config.courts_fetch_limit;
    state
        .courts
        .fetch(COURTS_QUERY, refetch, || async move { api.list_courts(limit).await })
        .await
}

fn retry_link(path: &str) -> String {
    format!("{}?refetch=1", path)
}

/// The 503 loading state a pending session renders.
pub fn loading_response(path: &str) -> Response {
    let mut response = (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(LoadingView {
            loading: true,
            path: path.to_string(),
        }),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, header::HeaderValue::from_static("1"));
    response
}

fn redirect_once(pass: &mut RenderPass, navigation: Navigation) -> Response {
    match pass.redirect(navigation) {
        Ok(navigation) => Redirect::to(&navigation.to).into_response(),
        Err(e) => e.into_response(),
    }
}

// --- Public Pages ---

/// home
///
/// [Public Route] Featured courts and the category strip.
#[utoipa::path(get, path = "/", responses((status = 200, description = "Home page", body = HomeView)))]
pub async fn home(State(state): State<AppState>) -> Json<HomeView> {
    match fetch_courts(&state, false).await {
        Ok(courts) => Json(HomeView {
            featured_courts: courts.iter().take(FEATURED_COURTS).cloned().collect(),
            categories: categories::aggregate(&courts),
            notice: None,
        }),
        Err(e) => {
            tracing::warn!("home: court fetch failed: {}", e);
            Json(HomeView {
                featured_courts: Vec::new(),
                categories: Vec::new(),
                notice: Some(LOAD_FAILED_NOTICE.to_string()),
            })
        }
    }
}

/// login_page
///
/// [Public Route] Signed-in visitors are sent on by the redirect resolver
/// (back to their intended destination when their role permits it, else to
/// their landing page). Everyone else gets the login view.
#[utoipa::path(
    get,
    path = "/login",
    params(LoginQuery),
    responses(
        (status = 200, description = "Login view", body = LoginView),
        (status = 303, description = "Already signed in"),
        (status = 503, description = "Session still resolving", body = LoadingView)
    )
)]
pub async fn login_page(
    State(state): State<AppState>,
    CurrentSession(resolved): CurrentSession,
    Query(query): Query<LoginQuery>,
) -> Response {
    let session = &resolved.session;
    if session.user.is_some() {
        if session.is_pending() {
            return loading_response(LOGIN_PATH);
        }
        let mut pass = RenderPass::new(LOGIN_PATH);
        if let Some(navigation) = state
            .resolver
            .resolve(session, query.from.as_deref(), LOGIN_PATH)
        {
            return redirect_once(&mut pass, navigation);
        }
    }

    Json(LoginView {
        page: "login".to_string(),
        from: query.from,
    })
    .into_response()
}

/// register_page
///
/// [Public Route] Signed-in visitors go to their landing page.
#[utoipa::path(get, path = "/register", responses((status = 200, description = "Register view", body = LoginView)))]
pub async fn register_page(
    State(state): State<AppState>,
    CurrentSession(resolved): CurrentSession,
) -> Response {
    let path = "/register";
    if resolved.session.user.is_some() && !resolved.session.is_pending() {
        let mut pass = RenderPass::new(path);
        if let Some(navigation) = state.resolver.resolve(&resolved.session, None, path) {
            return redirect_once(&mut pass, navigation);
        }
    }
    Json(LoginView {
        page: "register".to_string(),
        from: None,
    })
    .into_response()
}

/// list_courts
///
/// [Public Route] All courts, nine per page.
#[utoipa::path(get, path = "/courts", params(PageQuery), responses((status = 200, description = "Paginated courts")))]
pub async fn list_courts(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Json<ListingView<CourtRecord>> {
    let (courts, notice) = match fetch_courts(&state, query.refetch()).await {
        Ok(courts) => (courts, None),
        Err(e) => {
            tracing::warn!("courts: fetch failed: {}", e);
            (Vec::new(), Some(LOAD_FAILED_NOTICE.to_string()))
        }
    };
    let retry = notice.as_ref().map(|_| retry_link("/courts"));

    Json(ListingView {
        title: "Courts".to_string(),
        page: categories::paginate(&courts, query.page()),
        notice,
        retry,
    })
}

/// list_categories
///
/// [Public Route] Courts grouped by sport type. A failed fetch renders an
/// empty set with a retry link rather than stale or synthesized data.
#[utoipa::path(get, path = "/categories", params(PageQuery), responses((status = 200, description = "Paginated categories")))]
pub async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Json<ListingView<Category>> {
    let (grouped, notice) = match fetch_courts(&state, query.refetch()).await {
        Ok(courts) => (categories::aggregate(&courts), None),
        Err(e) => {
            tracing::warn!("categories: fetch failed: {}", e);
            (Vec::new(), Some("Could not load categories. Please try again.".to_string()))
        }
    };
    let retry = notice.as_ref().map(|_| retry_link("/categories"));

    Json(ListingView {
        title: "Categories".to_string(),
        page: categories::paginate(&grouped, query.page()),
        notice,
        retry,
    })
}

/// category_courts
///
/// [Public Route] Courts of a single type.
#[utoipa::path(
    get,
    path = "/categories/{type}",
    params(("type" = String, Path, description = "Sport type"), PageQuery),
    responses((status = 200, description = "Courts of the type"), (status = 404, description = "Unknown type"))
)]
pub async fn category_courts(
    State(state): State<AppState>,
    Path(court_type): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListingView<CourtRecord>>, AppError> {
    let path = format!("/categories/{}", urlencoding::encode(&court_type));
    let courts = match fetch_courts(&state, query.refetch()).await {
        Ok(courts) => courts,
        Err(e) => {
            tracing::warn!("category {}: fetch failed: {}", court_type, e);
            return Ok(Json(ListingView {
                title: court_type,
                page: categories::paginate::<CourtRecord>(&[], 1),
                notice: Some(LOAD_FAILED_NOTICE.to_string()),
                retry: Some(retry_link(&path)),
            }));
        }
    };

    let matching = categories::courts_of_type(&courts, &court_type);
    if matching.is_empty() {
        return Err(AppError::NotFound(format!("No courts in category '{}'", court_type)));
    }

    Ok(Json(ListingView {
        title: court_type,
        page: categories::paginate(&matching, query.page()),
        notice: None,
        retry: None,
    }))
}

#[utoipa::path(get, path = "/privacy", responses((status = 200, description = "Privacy policy", body = StaticPage)))]
pub async fn privacy() -> Json<StaticPage> {
    Json(StaticPage {
        slug: "privacy".to_string(),
        title: "Privacy Policy".to_string(),
    })
}

#[utoipa::path(get, path = "/terms", responses((status = 200, description = "Terms of service", body = StaticPage)))]
pub async fn terms() -> Json<StaticPage> {
    Json(StaticPage {
        slug: "terms".to_string(),
        title: "Terms of Service".to_string(),
    })
}

/// not_found
///
/// Fallback for every unmatched route.
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No page at {}", uri.path()))
}

// --- Dashboards (guarded) ---
//
// These handlers only run behind the route guard, which stores the resolved
// session in the request extensions.

fn profile_of(resolved: &ResolvedSession) -> Result<UserProfile, AppError> {
    resolved
        .profile
        .clone()
        .ok_or_else(|| AppError::NotFound("Your profile could not be found.".to_string()))
}

/// dashboard_home
///
/// [Guarded Route] Landing data of any dashboard. Admins also see how many
/// coupons exist; a failed coupon fetch only drops the count.
#[utoipa::path(get, path = "/dashboard", responses((status = 200, description = "Dashboard", body = DashboardView)))]
pub async fn dashboard_home(
    State(state): State<AppState>,
    Extension(resolved): Extension<ResolvedSession>,
) -> Result<Json<DashboardView>, AppError> {
    let profile = profile_of(&resolved)?;
    let role = resolved
        .session
        .user_role
        .ok_or_else(|| AppError::auth("auth/unauthorized"))?;

    let coupon_count = if role == Role::Admin {
        match resolved.bearer() {
            Ok(token) => match state.api.list_coupons(token).await {
                Ok(coupons) => Some(coupons.len()),
                Err(e) => {
                    tracing::warn!("admin dashboard: coupon fetch failed: {}", e);
                    None
                }
            },
            Err(_) => None,
        }
    } else {
        None
    };

    Ok(Json(DashboardView {
        role,
        profile,
        coupon_count,
    }))
}

/// dashboard_profile
///
/// [Guarded Route]
#[utoipa::path(get, path = "/dashboard/profile", responses((status = 200, description = "Profile", body = UserProfile)))]
pub async fn dashboard_profile(
    Extension(resolved): Extension<ResolvedSession>,
) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(profile_of(&resolved)?))
}

/// my_bookings
///
/// [Guarded Route] Confirmed bookings of the signed-in user. Upstream
/// failures render an empty list with a notice.
#[utoipa::path(get, path = "/dashboard/bookings", responses((status = 200, description = "Bookings", body = BookingsView)))]
pub async fn my_bookings(
    State(state): State<AppState>,
    Extension(resolved): Extension<ResolvedSession>,
) -> Json<BookingsView> {
    let Some(user) = resolved.session.user.as_ref() else {
        return Json(BookingsView {
            bookings: Vec::new(),
            notice: Some("Please sign in to see your bookings.".to_string()),
        });
    };

    let fetched = match resolved.bearer() {
        Ok(token) => state.api.confirmed_bookings(&user.id, token).await,
        Err(e) => Err(e),
    };

    match fetched {
        Ok(bookings) => Json(BookingsView {
            bookings,
            notice: None,
        }),
        Err(e) => {
            tracing::warn!(user = %user.id, "bookings fetch failed: {}", e);
            Json(BookingsView {
                bookings: Vec::new(),
                notice: Some("Could not load your bookings. Please try again.".to_string()),
            })
        }
    }
}

// --- Coupons (admin) ---

/// list_coupons
///
/// [Admin Route]
#[utoipa::path(get, path = "/admin-dashboard/coupons", responses((status = 200, description = "Coupons", body = CouponsView)))]
pub async fn list_coupons(
    State(state): State<AppState>,
    Extension(resolved): Extension<ResolvedSession>,
) -> Result<Json<CouponsView>, AppError> {
    let token = resolved.bearer()?;
    Ok(match state.api.list_coupons(token).await {
        Ok(coupons) => Json(CouponsView {
            coupons,
            notice: None,
        }),
        Err(e) => {
            tracing::warn!("coupon list failed: {}", e);
            Json(CouponsView {
                coupons: Vec::new(),
                notice: Some("Could not load coupons. Please try again.".to_string()),
            })
        }
    })
}

/// create_coupon
///
/// [Admin Route] Validates the form before anything is sent upstream.
#[utoipa::path(
    post,
    path = "/admin-dashboard/coupons",
    request_body = CouponInput,
    responses(
        (status = 201, description = "Created", body = Coupon),
        (status = 422, description = "Invalid fields")
    )
)]
pub async fn create_coupon(
    State(state): State<AppState>,
    Extension(resolved): Extension<ResolvedSession>,
    Json(input): Json<CouponInput>,
) -> Result<(StatusCode, Json<Coupon>), AppError> {
    input
        .validate(Utc::now().date_naive())
        .map_err(AppError::Validation)?;
    let coupon = state.api.create_coupon(resolved.bearer()?, &input).await?;
    tracing::info!(code = %coupon.code, "coupon created");
    Ok((StatusCode::CREATED, Json(coupon)))
}

/// update_coupon
///
/// [Admin Route]
#[utoipa::path(
    put,
    path = "/admin-dashboard/coupons/{id}",
    params(("id" = String, Path, description = "Coupon ID")),
    request_body = CouponInput,
    responses(
        (status = 200, description = "Updated", body = Coupon),
        (status = 404, description = "Not Found"),
        (status = 422, description = "Invalid fields")
    )
)]
pub async fn update_coupon(
    State(state): State<AppState>,
    Extension(resolved): Extension<ResolvedSession>,
    Path(id): Path<String>,
    Json(input): Json<CouponInput>,
) -> Result<Json<Coupon>, AppError> {
    input
        .validate(Utc::now().date_naive())
        .map_err(AppError::Validation)?;
    let coupon = state
        .api
        .update_coupon(resolved.bearer()?, &id, &input)
        .await?;
    Ok(Json(coupon))
}

/// delete_coupon
///
/// [Admin Route]
#[utoipa::path(
    delete,
    path = "/admin-dashboard/coupons/{id}",
    params(("id" = String, Path, description = "Coupon ID")),
    responses((status = 204, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn delete_coupon(
    State(state): State<AppState>,
    Extension(resolved): Extension<ResolvedSession>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.api.delete_coupon(resolved.bearer()?, &id).await?;
    tracing::info!(coupon = %id, "coupon deleted");
    Ok(StatusCode::NO_CONTENT)
}

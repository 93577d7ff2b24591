use axum::{
    Router,
    extract::{FromRef, OriginalUri, Request, State},
    http::{HeaderName, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Redirect, Response},
};
use std::{any::Any, sync::Arc};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod api;
pub mod cache;
pub mod categories;
pub mod config;
pub mod errors;
pub mod guard;
pub mod handlers;
pub mod models;
pub mod redirect;
pub mod session;

// Route groups (public, user/member dashboards, admin dashboard).
pub mod routes;
use routes::{admin, dashboard, public};

use guard::GuardDecision;
use models::{CourtRecord, Role};
use redirect::{Navigation, RedirectResolver, RenderPass};

// --- Public Re-exports ---

pub use api::{ApiState, BookingApi, HttpBookingApi, MockBookingApi};
pub use cache::QueryCache;
pub use config::AppConfig;
pub use errors::AppError;

/// ApiDoc
///
/// OpenAPI document for every page the portal serves, published at
/// `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::home, handlers::login_page, handlers::register_page, handlers::list_courts,
        handlers::list_categories, handlers::category_courts, handlers::privacy, handlers::terms,
        handlers::dashboard_home, handlers::dashboard_profile, handlers::my_bookings,
        handlers::list_coupons, handlers::create_coupon, handlers::update_coupon,
        handlers::delete_coupon
    ),
    components(
        schemas(
            models::Role, models::Identity, models::Session, models::CourtRecord,
            models::BookingRecord, models::BookingStatus, models::UserProfile, models::Coupon,
            models::CouponInput, models::FieldError, models::Category, models::HomeView,
            models::LoginView, models::StaticPage, models::DashboardView, models::BookingsView,
            models::LoadingView, models::DeniedView, models::ErrorPage, handlers::CouponsView,
        )
    ),
    tags(
        (name = "court-booking-portal", description = "Sports facility booking portal")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, cheaply clonable container of everything a render pass needs.
#[derive(Clone)]
pub struct AppState {
    /// Upstream booking API.
    pub api: ApiState,
    /// Query cache of the court list (the only public, shared query).
    pub courts: Arc<QueryCache<Vec<CourtRecord>>>,
    /// Post-login redirect resolver, built from the validated role table.
    pub resolver: Arc<RedirectResolver>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(api: ApiState, config: AppConfig) -> Self {
        Self {
            api,
            courts: Arc::new(QueryCache::new(config.query_stale_time)),
            resolver: Arc::new(RedirectResolver::new(config.role_redirects.clone())),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for ApiState {
    fn from_ref(app_state: &AppState) -> ApiState {
        app_state.api.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// RouteGate
///
/// State of one guard layer: the application state plus the roles the
/// guarded route group admits.
#[derive(Clone)]
pub struct RouteGate {
    pub app: AppState,
    pub allowed: &'static [Role],
}

impl RouteGate {
    pub fn new(app: AppState, allowed: &'static [Role]) -> Self {
        Self { app, allowed }
    }
}

/// guard_middleware
///
/// Resolves the session, asks the route guard for a decision and acts on it.
/// Authorized requests continue with the resolved session in their
/// extensions; every other outcome ends the render pass here.
async fn guard_middleware(State(gate): State<RouteGate>, mut request: Request, next: Next) -> Response {
    // Nested routers see a stripped URI; the guard needs the full path.
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|original| original.0.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let resolved =
        session::resolve_session(request.headers(), &gate.app.config, &gate.app.api).await;
    let decision = guard::evaluate(
        &resolved.session,
        gate.allowed,
        &path,
        &gate.app.config.role_redirects,
    );
    tracing::debug!(path = %path, decision = ?decision, "route guard");

    let mut pass = RenderPass::new(&path);
    match decision {
        GuardDecision::Authorized => {
            request.extensions_mut().insert(resolved);
            next.run(request).await
        }
        GuardDecision::Pending => handlers::loading_response(&path),
        GuardDecision::Unauthenticated { from } => {
            match pass.redirect(Navigation::replace(guard::login_location(&from))) {
                Ok(navigation) => Redirect::to(&navigation.to).into_response(),
                Err(e) => e.into_response(),
            }
        }
        GuardDecision::Forbidden {
            notice,
            redirect_to,
        } => match pass.redirect(Navigation::replace(redirect_to.clone())) {
            Ok(_) => AppError::AuthorizationDenied {
                notice,
                redirect_to,
            }
            .into_response(),
            Err(e) => e.into_response(),
        },
    }
}

fn guarded(router: Router<AppState>, state: &AppState, allowed: &'static [Role]) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(
        RouteGate::new(state.clone(), allowed),
        guard_middleware,
    ))
}

/// handle_panic
///
/// Top-level error boundary: a panicking handler renders the generic error
/// page instead of dropping the connection.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("handler panicked: {}", detail);

    let status = StatusCode::INTERNAL_SERVER_ERROR;
    (status, Json(errors::error_page(status, "Something went wrong."))).into_response()
}

/// create_router
///
/// Assembles the route groups with their guards, the fallback error page and
/// the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(AnyOrigin)
        .allow_origin(AnyOrigin)
        .allow_headers(AnyOrigin)
        .expose_headers([errors::NOTICE_HEADER]);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .nest(
            "/dashboard",
            guarded(dashboard::dashboard_routes(), &state, &[Role::User]),
        )
        .nest(
            "/member-dashboard",
            guarded(dashboard::dashboard_routes(), &state, &[Role::Member]),
        )
        .nest(
            "/admin-dashboard",
            guarded(admin::admin_routes(), &state, &[Role::Admin]),
        )
        .fallback(handlers::not_found)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id))
                .layer(CatchPanicLayer::custom(handle_panic)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one request, correlated by its `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}

use court_booking_portal::{
    AppState,
    api::{ApiState, HttpBookingApi},
    config::{AppConfig, Env},
    create_router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, installs logging, connects the upstream API client
/// and serves the portal.
#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "court_booking_portal=debug,tower_http=info".into());

    // The environment decides the log format, so peek at it before the full
    // config load (which may itself want to log).
    let env = match std::env::var("APP_ENV").as_deref() {
        Ok("production") => Env::Production,
        _ => Env::Local,
    };
    match env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    // Fail-fast on missing production secrets or an invalid role table.
    let config = AppConfig::load();
    tracing::info!("Portal starting in {:?} mode", config.env);
    tracing::info!("Upstream API: {}", config.api_base_url);

    let api = HttpBookingApi::new(&config.api_base_url, config.api_timeout)
        .expect("FATAL: could not build the upstream HTTP client");
    let api = Arc::new(api) as ApiState;

    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState::new(api, config));

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: could not bind the portal address. Check PORTAL_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    axum::serve(listener, app).await.expect("server error");
}

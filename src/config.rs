use std::env;
use std::time::Duration;

use crate::redirect::RoleRedirectTable;

/// AppConfig
///
/// Holds the portal's configuration. Loaded once at startup and shared
/// read-only through the application state (pulled into handlers via FromRef).
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Base URL of the upstream booking REST API.
    pub api_base_url: String,
    // Address the portal binds to.
    pub bind_addr: String,
    // Runtime environment marker. Controls the development login bypass.
    pub env: Env,
    // Secret used to validate incoming bearer tokens.
    pub jwt_secret: String,
    // Per-request timeout of the upstream HTTP client.
    pub api_timeout: Duration,
    // How long a cached query result is served without refetching.
    pub query_stale_time: Duration,
    // `limit` sent to `GET /api/courts`.
    pub courts_fetch_limit: usize,
    // Role -> default landing path, validated during load.
    pub role_redirects: RoleRedirectTable,
}

/// Env
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";

impl Default for AppConfig {
    /// Non-panicking configuration for tests and state scaffolding.
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000".to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
            env: Env::Local,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            api_timeout: Duration::from_secs(10),
            query_stale_time: Duration::from_secs(300),
            courts_fetch_limit: 100,
            role_redirects: RoleRedirectTable::default(),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("{} is not a number ('{}'), using {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from the environment.
    ///
    /// # Panics
    /// Panics when a variable required in production (`API_BASE_URL`,
    /// `JWT_SECRET`) is missing, or when a `ROLE_REDIRECT_*` override produces
    /// an invalid role table. The portal must not start half-configured.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let (api_base_url, jwt_secret) = match env {
            Env::Production => (
                env::var("API_BASE_URL").expect("FATAL: API_BASE_URL required in prod"),
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production."),
            ),
            Env::Local => (
                env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:5000".to_string()),
                env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
            ),
        };

        let role_redirects = RoleRedirectTable::from_env_overrides(|key| env::var(key).ok())
            .unwrap_or_else(|e| panic!("FATAL: invalid role redirect table: {}", e));

        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            bind_addr: env::var("PORTAL_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            env,
            jwt_secret,
            api_timeout: Duration::from_secs(env_u64("API_TIMEOUT_SECS", 10)),
            query_stale_time: Duration::from_secs(env_u64("QUERY_STALE_SECS", 300)),
            courts_fetch_limit: env_u64("COURTS_FETCH_LIMIT", 100) as usize,
            role_redirects,
        }
    }
}

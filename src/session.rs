use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

use crate::{
    api::ApiState,
    config::{AppConfig, Env},
    errors::AppError,
    models::{Identity, Role, Session, UserProfile},
};

/// Claims
///
/// Payload of the bearer token issued by the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id, also the key of `/api/users/{id}`.
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// ResolvedSession
///
/// The session of one request plus what was learned while building it: the
/// raw bearer token (forwarded upstream) and the profile the role came from.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSession {
    pub session: Session,
    pub token: Option<String>,
    pub profile: Option<UserProfile>,
}

impl ResolvedSession {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// The bearer token, or the `Auth` error a protected upstream call would fail with.
    pub fn bearer(&self) -> Result<&str, AppError> {
        self.token
            .as_deref()
            .ok_or_else(|| AppError::auth("auth/missing-token"))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// decode_identity
///
/// Validates the token signature and expiry and returns the identity it names.
pub fn decode_identity(token: &str, secret: &str) -> Result<Identity, AppError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AppError::auth("auth/token-expired"),
            _ => AppError::auth("auth/invalid-token"),
        })?;

    Ok(Identity {
        id: data.claims.sub,
        email: data.claims.email,
        display_name: data.claims.name,
    })
}

/// Looks up the profile behind `identity` and derives the role from it.
///
/// - profile found: role parsed from it (unrecognized strings give no role),
/// - profile missing or lookup failed: signed in, no role.
///
/// The lookup has finished by the time this returns, so the session is always
/// settled (`role_loading` stays false).
async fn with_role(identity: Identity, token: Option<String>, api: &ApiState) -> ResolvedSession {
    match api.user_profile(&identity.id).await {
        Ok(profile) => {
            let role = profile.role.as_deref().and_then(|r| r.parse::<Role>().ok());
            if role.is_none() {
                tracing::warn!(user = %identity.id, role = ?profile.role, "profile has no usable role");
            }
            ResolvedSession {
                session: Session::authenticated(identity, role),
                token,
                profile: Some(profile),
            }
        }
        Err(e) => {
            match e {
                AppError::NotFound(_) => {
                    tracing::warn!(user = %identity.id, "no profile for authenticated user")
                }
                other => tracing::warn!(user = %identity.id, "role lookup failed: {}", other),
            }
            ResolvedSession {
                session: Session::authenticated(identity, None),
                token,
                profile: None,
            }
        }
    }
}

/// resolve_session
///
/// The session provider. Never fails: a missing or invalid token yields an
/// anonymous session, which the route guard turns into a login redirect.
///
/// In `Env::Local` an `x-user-id` header is accepted in place of a token.
pub async fn resolve_session(headers: &HeaderMap, config: &AppConfig, api: &ApiState) -> ResolvedSession {
    if config.env == Env::Local {
        if let Some(user_id) = headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .filter(|id| !id.is_empty())
        {
            let identity = Identity {
                id: user_id.to_string(),
                ..Identity::default()
            };
            let token = bearer_token(headers).map(str::to_string);
            return with_role(identity, token, api).await;
        }
    }

    let Some(token) = bearer_token(headers) else {
        return ResolvedSession::anonymous();
    };

    match decode_identity(token, &config.jwt_secret) {
        Ok(identity) => with_role(identity, Some(token.to_string()), api).await,
        Err(e) => {
            tracing::debug!("rejecting bearer token: {}", e);
            ResolvedSession::anonymous()
        }
    }
}

/// CurrentSession
///
/// Extractor for pages that behave differently for signed-in visitors but are
/// not guarded. Reuses the session the route guard already resolved, if any.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub ResolvedSession);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
    ApiState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(resolved) = parts.extensions.get::<ResolvedSession>() {
            return Ok(CurrentSession(resolved.clone()));
        }

        let api = ApiState::from_ref(state);
        let config = AppConfig::from_ref(state);
        Ok(CurrentSession(resolve_session(&parts.headers, &config, &api).await))
    }
}

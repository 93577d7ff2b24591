use axum::{
    Json,
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::models::{DeniedView, ErrorPage, FieldError};

/// Header carrying the user-visible notice attached to a redirect.
pub const NOTICE_HEADER: HeaderName = HeaderName::from_static("x-portal-notice");

/// AppError
///
/// Every failure a render pass can end in. Handlers return `Result<_, AppError>`
/// and the `IntoResponse` impl below turns the error into the generic error
/// page (or, for authorization denials, a redirect with a notice).
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The upstream API could not be reached or answered with a failure.
    #[error("network failure: {0}")]
    Network(String),

    /// The identity provider or the upstream API rejected the credentials.
    #[error("{message}")]
    Auth { code: String, message: String },

    /// Signed in, but the role may not see the page.
    #[error("{notice}")]
    AuthorizationDenied { notice: String, redirect_to: String },

    #[error("{0}")]
    NotFound(String),

    #[error("validation failed")]
    Validation(Vec<FieldError>),

    /// A second redirect in one render pass, or a redirect onto the current path.
    #[error("redirect cycle: {0}")]
    RedirectCycle(String),

    /// A redirect target that cannot be sent as a `Location` header.
    #[error("invalid redirect target: {0}")]
    InvalidRedirect(String),

    /// The upstream API answered with a body that does not match its contract.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl AppError {
    /// Builds an `Auth` error whose message comes from the provider code table.
    pub fn auth(code: &str) -> Self {
        AppError::Auth {
            code: code.to_string(),
            message: auth_error_message(code).to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Network(_) | AppError::Malformed(_) => StatusCode::BAD_GATEWAY,
            AppError::Auth { .. } => StatusCode::UNAUTHORIZED,
            AppError::AuthorizationDenied { .. } => StatusCode::SEE_OTHER,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::RedirectCycle(_) => StatusCode::FORBIDDEN,
            AppError::InvalidRedirect(_) => StatusCode::BAD_REQUEST,
        }
    }
}

const DEFAULT_AUTH_MESSAGE: &str = "Authentication failed. Please try again.";

// Provider error codes -> messages shown to the user.
const AUTH_MESSAGES: &[(&str, &str)] = &[
    ("auth/invalid-credential", "Invalid email or password."),
    ("auth/user-not-found", "No account found with this email."),
    ("auth/wrong-password", "Incorrect password. Please try again."),
    ("auth/invalid-email", "Please enter a valid email address."),
    ("auth/email-already-in-use", "An account with this email already exists."),
    ("auth/weak-password", "Password must be at least 6 characters."),
    ("auth/too-many-requests", "Too many attempts. Please wait a moment and try again."),
    ("auth/network-request-failed", "Network error. Check your connection and try again."),
    ("auth/popup-closed-by-user", "Sign-in was cancelled before it completed."),
    ("auth/user-disabled", "This account has been disabled."),
    ("auth/missing-token", "Please sign in to continue."),
    ("auth/invalid-token", "Your session is invalid. Please sign in again."),
    ("auth/token-expired", "Your session has expired. Please sign in again."),
    ("auth/unauthorized", "You are not authorized to perform this action."),
];

/// auth_error_message
///
/// Maps a provider-specific error code to a human message, falling back to a
/// generic message for codes the table does not know.
pub fn auth_error_message(code: &str) -> &'static str {
    AUTH_MESSAGES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, message)| *message)
        .unwrap_or(DEFAULT_AUTH_MESSAGE)
}

/// error_page
///
/// The generic error page body: status, message and the two ways out.
pub fn error_page(status: StatusCode, message: impl Into<String>) -> ErrorPage {
    ErrorPage {
        status: status.as_u16(),
        message: message.into(),
        fields: Vec::new(),
        actions: vec!["home".to_string(), "back".to_string()],
    }
}

/// denied_redirect
///
/// `303 See Other` to `redirect_to`, carrying the notice both as a header and
/// in the body so the client can show it after following the redirect.
pub fn denied_redirect(notice: &str, redirect_to: &str) -> Response {
    let mut response = (
        StatusCode::SEE_OTHER,
        Json(DeniedView {
            notice: notice.to_string(),
            redirect_to: redirect_to.to_string(),
        }),
    )
        .into_response();

    let headers = response.headers_mut();
    if let Ok(location) = HeaderValue::from_str(redirect_to) {
        headers.insert(header::LOCATION, location);
    }
    if let Ok(value) = HeaderValue::from_str(notice) {
        headers.insert(NOTICE_HEADER, value);
    }
    response
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            AppError::AuthorizationDenied { notice, redirect_to } => {
                tracing::info!(redirect_to = %redirect_to, "access denied");
                denied_redirect(&notice, &redirect_to)
            }
            AppError::Validation(fields) => {
                let mut page = error_page(status, "Please correct the highlighted fields.");
                page.fields = fields;
                (status, Json(page)).into_response()
            }
            AppError::Network(ref detail) | AppError::Malformed(ref detail) => {
                tracing::warn!("upstream failure: {}", detail);
                (
                    status,
                    Json(error_page(status, "The booking service is unavailable. Please try again.")),
                )
                    .into_response()
            }
            AppError::RedirectCycle(ref detail) => {
                tracing::error!("redirect refused: {}", detail);
                (status, Json(error_page(status, "You do not have access to this page."))).into_response()
            }
            AppError::InvalidRedirect(ref detail) => {
                tracing::warn!("redirect refused: {}", detail);
                (status, Json(error_page(status, "That link cannot be opened."))).into_response()
            }
            other => {
                let message = other.to_string();
                (status, Json(error_page(status, message))).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_map_to_messages() {
        assert_eq!(auth_error_message("auth/wrong-password"), "Incorrect password. Please try again.");
        assert_eq!(auth_error_message("auth/email-already-in-use"), "An account with this email already exists.");
    }

    #[test]
    fn unknown_code_falls_back() {
        assert_eq!(auth_error_message("auth/something-new"), DEFAULT_AUTH_MESSAGE);
        assert_eq!(auth_error_message(""), DEFAULT_AUTH_MESSAGE);
    }

    #[test]
    fn denial_becomes_redirect_with_notice() {
        let response = AppError::AuthorizationDenied {
            notice: "Access denied".to_string(),
            redirect_to: "/member-dashboard".to_string(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/member-dashboard");
        assert_eq!(response.headers()[NOTICE_HEADER], "Access denied");
    }

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(AppError::Network("x".into()).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(AppError::auth("auth/invalid-token").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Validation(vec![]).status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(AppError::RedirectCycle("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::InvalidRedirect("x".into()).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_message_is_shown_verbatim() {
        let err = AppError::NotFound("No page at /x".to_string());
        assert_eq!(err.to_string(), "No page at /x");
    }
}

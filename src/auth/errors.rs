//! Authentication and authorization failure responses.

use axum::{
    http::header,
    response::{IntoResponse, Response},
};

use super::cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, clear_cookie};

/// Guard failures. Authentication arms are fail-closed 401s that also
/// clear both session cookies; `NotOwner` is a 403 with a valid identity
/// behind it, so the cookies stay.
#[derive(Debug)]
pub enum AuthError {
    /// No access-token cookie on the request
    NotAuthenticated,
    /// Access token malformed or signature mismatch
    InvalidToken,
    /// Access expired and the refresh track could not renew it
    SessionExpired,
    /// Refresh token no longer matches the registry entry (logout or
    /// overwrite by a later login)
    TokenRevoked,
    /// Valid identity, but not the owner of the addressed resource
    NotOwner,
    /// Registry or signing backend unavailable; renewal is denied rather
    /// than waved through
    Dependency,
}

impl AuthError {
    fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            AuthError::NotAuthenticated
            | AuthError::InvalidToken
            | AuthError::SessionExpired
            | AuthError::TokenRevoked => StatusCode::UNAUTHORIZED,
            AuthError::NotOwner => StatusCode::FORBIDDEN,
            AuthError::Dependency => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            AuthError::NotAuthenticated => "Not authenticated",
            AuthError::InvalidToken => "Invalid token",
            AuthError::SessionExpired => "Session expired, please log in again",
            AuthError::TokenRevoked => "Session has been revoked",
            AuthError::NotOwner => "Not the owner of this resource",
            AuthError::Dependency => "Service unavailable",
        }
    }

    fn clears_cookies(&self) -> bool {
        matches!(
            self,
            AuthError::NotAuthenticated
                | AuthError::InvalidToken
                | AuthError::SessionExpired
                | AuthError::TokenRevoked
        )
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        use axum::Json;
        use axum::http::HeaderValue;
        use serde::Serialize;

        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        let clears = self.clears_cookies();
        let mut response = (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response();

        if clears {
            // Deletion matches on cookie name and path only, so the
            // Secure attribute can be omitted here.
            let headers = response.headers_mut();
            for name in [ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME] {
                if let Ok(value) = HeaderValue::from_str(&clear_cookie(name, false)) {
                    headers.append(header::SET_COOKIE, value);
                }
            }
        }

        response
    }
}

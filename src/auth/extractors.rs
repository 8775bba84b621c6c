//! The session guard and its renewal state machine.

use std::cell::RefCell;

use axum::{
    extract::{FromRequestParts, Request},
    http::{HeaderValue, header, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::error;

use super::cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, get_cookie, session_cookie};
use super::errors::AuthError;
use crate::jwt::{Claims, JwtConfig, Verification};
use crate::registry::RegistryStore;

tokio::task_local! {
    /// Task-local slot for an access-token cookie minted during renewal.
    /// The guard fills it; the `renewed_access_cookie` layer drains it
    /// onto the response.
    static RENEWED_ACCESS_COOKIE: RefCell<Option<String>>;
}

/// Trait for router state types that carry what the guard needs.
pub trait HasAuthState {
    fn jwt(&self) -> &JwtConfig;
    fn registry(&self) -> &dyn RegistryStore;
    fn secure_cookies(&self) -> bool;
}

/// Session guard extractor. Yields verified, unexpired claims or rejects.
///
/// State machine, in order:
/// 1. access cookie absent: reject without consulting the refresh token;
/// 2. access token invalid (bad signature): reject;
/// 3. access token valid and unexpired: proceed. The registry is not
///    consulted on this branch, so a revoked session stays usable until
///    the access token's own window (minutes) runs out;
/// 4. access token expired with a good signature: renew from the refresh
///    token, which must itself verify AND equal the registry entry for
///    its subject. Renewal mints a new access token and stages it as a
///    Set-Cookie; the refresh token is left untouched and keeps powering
///    renewals until its own window elapses or the registry entry goes.
///
/// Every authorization decision downstream of this extractor is made from
/// a verified, unexpired payload.
pub struct Auth(pub Claims);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthState + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate_request(parts, state).await.map(Auth)
    }
}

async fn authenticate_request<S>(parts: &Parts, state: &S) -> Result<Claims, AuthError>
where
    S: HasAuthState + Send + Sync,
{
    let access_token =
        get_cookie(&parts.headers, ACCESS_COOKIE_NAME).ok_or(AuthError::NotAuthenticated)?;

    match state.jwt().verify_access(access_token) {
        Verification::Valid(claims) => return Ok(claims),
        Verification::Invalid => return Err(AuthError::InvalidToken),
        Verification::Expired(_) => {}
    }

    // Access window elapsed; switch to the refresh track.
    let refresh_token =
        get_cookie(&parts.headers, REFRESH_COOKIE_NAME).ok_or(AuthError::SessionExpired)?;

    let refresh_claims = match state.jwt().verify_refresh(refresh_token) {
        Verification::Valid(claims) => claims,
        Verification::Expired(_) | Verification::Invalid => {
            return Err(AuthError::SessionExpired);
        }
    };

    // The registry holds the single authoritative refresh token per user.
    // Anything else - including a token this server issued earlier - has
    // been revoked by logout or overwritten by a later login.
    let current = state
        .registry()
        .get(refresh_claims.sub)
        .await
        .map_err(|e| {
            error!(user_id = refresh_claims.sub, error = %e, "Registry lookup failed during renewal");
            AuthError::Dependency
        })?;
    if current.as_deref() != Some(refresh_token) {
        return Err(AuthError::TokenRevoked);
    }

    // Mint the replacement access token from the refresh token's payload,
    // not from the expired access token's.
    let renewed = state
        .jwt()
        .sign_access(refresh_claims.sub, &refresh_claims.email, &refresh_claims.name)
        .map_err(|e| {
            error!(user_id = refresh_claims.sub, error = %e, "Failed to sign renewed access token");
            AuthError::Dependency
        })?;

    let cookie = session_cookie(
        ACCESS_COOKIE_NAME,
        &renewed.token,
        renewed.ttl_secs,
        state.secure_cookies(),
    );
    let _ = RENEWED_ACCESS_COOKIE.try_with(|cell| {
        cell.borrow_mut().replace(cookie);
    });

    Ok(Claims {
        iat: renewed.issued_at,
        exp: renewed.expires_at,
        ..refresh_claims
    })
}

/// Response layer that attaches an access-token cookie minted by the
/// guard during silent renewal. Must wrap every router that uses [`Auth`].
pub async fn renewed_access_cookie(request: Request, next: Next) -> Response {
    RENEWED_ACCESS_COOKIE
        .scope(RefCell::new(None), async move {
            let mut response = next.run(request).await;
            let staged = RENEWED_ACCESS_COOKIE.with(|cell| cell.borrow_mut().take());
            if let Some(cookie) = staged {
                if let Ok(value) = HeaderValue::from_str(&cookie) {
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
            }
            response
        })
        .await
}

/// Ownership guard: the session subject must match the resource's owning
/// id. A mismatch is an authorization failure, not an authentication one.
pub fn require_owner(claims: &Claims, owner_id: i64) -> Result<(), AuthError> {
    if claims.sub == owner_id {
        Ok(())
    } else {
        Err(AuthError::NotOwner)
    }
}

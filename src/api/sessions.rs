//! Session issuance endpoints.
//!
//! - POST `/register` - Create an account, then issue a session
//! - POST `/login` - Verify credentials, issue a fresh token pair
//! - POST `/logout` - Revoke the registry entry and clear both cookies
//!
//! Login overwrites any existing registry entry for the user, so logging
//! in on a second device instantly invalidates the first device's refresh
//! token (single-active-session policy).

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
    routing::post,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, warn};

use super::error::{ApiError, ResultExt};
use crate::auth::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, clear_cookie, get_cookie, session_cookie,
};
use crate::db::Database;
use crate::jwt::{JwtConfig, Verification};
use crate::password;
use crate::registry::RegistryStore;

#[derive(Clone)]
pub struct SessionsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub registry: Arc<dyn RegistryStore>,
    pub secure_cookies: bool,
}

pub fn router(state: SessionsState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .with_state(state)
}

#[derive(Deserialize)]
struct RegisterRequest {
    email: String,
    name: String,
    password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

/// Mint an access+refresh pair for the user, persist the refresh token in
/// the registry (overwriting any prior entry), and build both Set-Cookie
/// headers.
async fn issue_session(
    state: &SessionsState,
    id: i64,
    email: &str,
    name: &str,
) -> Result<AppendHeaders<[(axum::http::HeaderName, String); 2]>, ApiError> {
    let access = state.jwt.sign_access(id, email, name).map_err(|e| {
        error!(user_id = id, error = %e, "Failed to sign access token");
        ApiError::internal("Failed to issue session")
    })?;
    let refresh = state.jwt.sign_refresh(id, email, name).map_err(|e| {
        error!(user_id = id, error = %e, "Failed to sign refresh token");
        ApiError::internal("Failed to issue session")
    })?;

    state
        .registry
        .put(id, &refresh.token, state.jwt.refresh_ttl())
        .await
        .map_err(|e| {
            error!(user_id = id, error = %e, "Failed to persist refresh token");
            ApiError::internal("Failed to issue session")
        })?;

    Ok(AppendHeaders([
        (
            SET_COOKIE,
            session_cookie(
                ACCESS_COOKIE_NAME,
                &access.token,
                access.ttl_secs,
                state.secure_cookies,
            ),
        ),
        (
            SET_COOKIE,
            session_cookie(
                REFRESH_COOKIE_NAME,
                &refresh.token,
                refresh.ttl_secs,
                state.secure_cookies,
            ),
        ),
    ]))
}

/// Register a new account and log it in.
async fn register(
    State(state): State<SessionsState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.email.is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    // Exact, case-sensitive email match.
    let existing = state
        .db
        .users()
        .find_by_email(&req.email)
        .await
        .db_err("Failed to look up email")?;
    if existing.is_some() {
        return Err(ApiError::conflict(
            "An account with this email already exists",
        ));
    }

    // bcrypt at cost 12 is CPU-heavy; keep it off the async workers.
    let plaintext = req.password;
    let hash = tokio::task::spawn_blocking(move || password::hash(&plaintext))
        .await
        .map_err(|e| {
            error!(error = %e, "Password hashing task failed");
            ApiError::internal("Failed to register")
        })?
        .map_err(|e| {
            error!(error = %e, "Failed to hash password");
            ApiError::internal("Failed to register")
        })?;

    let id = state
        .db
        .users()
        .create(&req.email, &req.name, &hash)
        .await
        .db_err("Failed to create user")?;

    let cookies = issue_session(&state, id, &req.email, &req.name).await?;
    let user = state
        .db
        .users()
        .find_by_id(id)
        .await
        .db_err("Failed to load new user")?
        .ok_or_else(|| ApiError::internal("User vanished after insert"))?;

    Ok((StatusCode::CREATED, cookies, Json(user.public())))
}

/// Log in with email and password.
async fn login(
    State(state): State<SessionsState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .find_by_email(&req.email)
        .await
        .db_err("Failed to look up email")?
        .ok_or_else(|| ApiError::conflict("No such account"))?;

    let plaintext = req.password;
    let stored_hash = user.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || password::verify(&plaintext, &stored_hash))
        .await
        .map_err(|e| {
            error!(error = %e, "Password verification task failed");
            ApiError::internal("Failed to log in")
        })?
        .map_err(|e| {
            error!(user_id = user.id, error = %e, "Failed to verify password");
            ApiError::internal("Failed to log in")
        })?;

    if !matches {
        return Err(ApiError::conflict("Wrong password"));
    }

    // Fresh pair; the registry upsert revokes any prior device's session.
    let cookies = issue_session(&state, user.id, &user.email, &user.name).await?;

    Ok((StatusCode::OK, cookies, Json(user.public())))
}

/// Logout: delete the registry entry for the subject and clear both
/// cookies. Revocation is best-effort on purpose - a logout with garbage
/// cookies still clears them.
async fn logout(
    State(state): State<SessionsState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let subject = get_cookie(&headers, REFRESH_COOKIE_NAME)
        .and_then(|token| match state.jwt.verify_refresh(token) {
            Verification::Valid(claims) | Verification::Expired(claims) => Some(claims.sub),
            Verification::Invalid => None,
        })
        .or_else(|| {
            get_cookie(&headers, ACCESS_COOKIE_NAME).and_then(|token| {
                match state.jwt.verify_access(token) {
                    Verification::Valid(claims) | Verification::Expired(claims) => Some(claims.sub),
                    Verification::Invalid => None,
                }
            })
        });

    if let Some(sub) = subject {
        if let Err(e) = state.registry.delete(sub).await {
            warn!(user_id = sub, error = %e, "Failed to delete registry entry on logout");
        }
    }

    Ok((
        StatusCode::OK,
        AppendHeaders([
            (
                SET_COOKIE,
                clear_cookie(ACCESS_COOKIE_NAME, state.secure_cookies),
            ),
            (
                SET_COOKIE,
                clear_cookie(REFRESH_COOKIE_NAME, state.secure_cookies),
            ),
        ]),
        Json(serde_json::json!({ "success": true })),
    ))
}

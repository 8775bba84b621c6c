//! Profile endpoints, guarded by the id check: the session subject must
//! match the user id in the path.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;

use super::error::{ApiError, ResultExt};
use crate::auth::{Auth, HasAuthState, require_owner};
use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::registry::RegistryStore;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub registry: Arc<dyn RegistryStore>,
    pub secure_cookies: bool,
}

impl HasAuthState for UsersState {
    fn jwt(&self) -> &JwtConfig {
        &self.jwt
    }

    fn registry(&self) -> &dyn RegistryStore {
        self.registry.as_ref()
    }

    fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }
}

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/{id}", get(get_profile).put(update_profile))
        .with_state(state)
}

async fn get_profile(
    State(state): State<UsersState>,
    Auth(claims): Auth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    require_owner(&claims, id)?;

    let user = state
        .db
        .users()
        .find_by_id(id)
        .await
        .db_err("Failed to load user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(user.public()))
}

#[derive(Deserialize)]
struct UpdateProfileRequest {
    name: String,
}

async fn update_profile(
    State(state): State<UsersState>,
    Auth(claims): Auth,
    Path(id): Path<i64>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_owner(&claims, id)?;

    if req.name.is_empty() {
        return Err(ApiError::bad_request("Name cannot be empty"));
    }

    let updated = state
        .db
        .users()
        .update_name(id, &req.name)
        .await
        .db_err("Failed to update profile")?;
    if !updated {
        return Err(ApiError::not_found("User not found"));
    }

    let user = state
        .db
        .users()
        .find_by_id(id)
        .await
        .db_err("Failed to load user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(user.public()))
}

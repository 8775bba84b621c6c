//! Item endpoints exercising the resource-owner guard: the owning user id
//! is fetched from the store by item id, then compared against the
//! session subject.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;

use super::error::{ApiError, ResultExt};
use crate::auth::{Auth, HasAuthState, require_owner};
use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::registry::RegistryStore;

#[derive(Clone)]
pub struct ItemsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub registry: Arc<dyn RegistryStore>,
    pub secure_cookies: bool,
}

impl HasAuthState for ItemsState {
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

pub fn router(state: ItemsState) -> Router {
    Router::new()
        .route("/", post(create_item))
        .route("/{id}", get(get_item).put(update_item))
        .with_state(state)
}

#[derive(Deserialize)]
struct ItemRequest {
    name: String,
    price: i64,
    #[serde(default)]
    explanation: String,
}

/// Create an item owned by the session subject.
async fn create_item(
    State(state): State<ItemsState>,
    Auth(claims): Auth,
    Json(req): Json<ItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.is_empty() {
        return Err(ApiError::bad_request("Item name cannot be empty"));
    }

    let id = state
        .db
        .items()
        .create(claims.sub, &req.name, req.price, &req.explanation)
        .await
        .db_err("Failed to create item")?;

    let item = state
        .db
        .items()
        .get(id)
        .await
        .db_err("Failed to load item")?
        .ok_or_else(|| ApiError::internal("Item vanished after insert"))?;

    Ok((StatusCode::CREATED, Json(item)))
}

/// Any authenticated user may read an item.
async fn get_item(
    State(state): State<ItemsState>,
    Auth(_claims): Auth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state
        .db
        .items()
        .get(id)
        .await
        .db_err("Failed to load item")?
        .ok_or_else(|| ApiError::not_found("Item not found"))?;

    Ok(Json(item))
}

/// Only the item's owner may update it.
async fn update_item(
    State(state): State<ItemsState>,
    Auth(claims): Auth,
    Path(id): Path<i64>,
    Json(req): Json<ItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state
        .db
        .items()
        .get(id)
        .await
        .db_err("Failed to load item")?
        .ok_or_else(|| ApiError::not_found("Item not found"))?;

    require_owner(&claims, item.user_id)?;

    state
        .db
        .items()
        .update(id, &req.name, req.price, &req.explanation)
        .await
        .db_err("Failed to update item")?;

    let item = state
        .db
        .items()
        .get(id)
        .await
        .db_err("Failed to load item")?
        .ok_or_else(|| ApiError::not_found("Item not found"))?;

    Ok(Json(item))
}

mod error;
mod items;
mod sessions;
mod users;

use axum::Router;
use std::sync::Arc;

use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::registry::RegistryStore;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    registry: Arc<dyn RegistryStore>,
    secure_cookies: bool,
) -> Router {
    let sessions_state = sessions::SessionsState {
        db: db.clone(),
        jwt: jwt.clone(),
        registry: registry.clone(),
        secure_cookies,
    };

    let users_state = users::UsersState {
        db: db.clone(),
        jwt: jwt.clone(),
        registry: registry.clone(),
        secure_cookies,
    };

    let items_state = items::ItemsState {
        db,
        jwt,
        registry,
        secure_cookies,
    };

    Router::new()
        .nest("/sessions", sessions::router(sessions_state))
        .nest("/users", users::router(users_state))
        .nest("/items", items::router(items_state))
}

//! Profile table routes.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use lumina_engine::RemoteRecord;

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::{handle_get, handle_list, handle_put, ProfileQuery};
use crate::AppState;

/// Create profile routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/profiles", get(list_handler))
        .route("/profiles/{id}", get(get_handler).put(put_handler))
}

/// GET /profiles[?pin=XXXX] - every stored record, or those with that PIN.
async fn list_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ProfileQuery>,
) -> Result<Json<Vec<RemoteRecord>>> {
    Ok(Json(handle_list(&state.pool, query).await?))
}

/// GET /profiles/{id} - one record, or 404.
async fn get_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<RemoteRecord>> {
    Ok(Json(handle_get(&state.pool, &id).await?))
}

/// PUT /profiles/{id} - insert or replace a record.
async fn put_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<String>,
    Json(record): Json<RemoteRecord>,
) -> Result<Json<RemoteRecord>> {
    Ok(Json(handle_put(&state.pool, &id, record).await?))
}

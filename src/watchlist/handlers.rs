use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use super::dto::{ToggleRequest, ToggleResponse};
use super::services;
use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppJson},
    state::AppState,
};

pub fn watchlist_routes() -> Router<AppState> {
    Router::new().route("/watchlist", get(get_watchlist).post(toggle_watchlist))
}

#[instrument(skip(state))]
pub async fn get_watchlist(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(services::list(&state, user_id).await?))
}

#[instrument(skip(state))]
pub async fn toggle_watchlist(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(body): AppJson<ToggleRequest>,
) -> Result<Json<ToggleResponse>, AppError> {
    let action = services::toggle(&state, user_id, &body.coin_id).await?;
    Ok(Json(ToggleResponse { action }))
}

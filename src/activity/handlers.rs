use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use crate::{
    auth::extractors::CurrentUser, error::AppResult, state::AppState, store::ActivityLog,
};

const RECENT_LIMIT: i64 = 50;

pub fn activity_routes() -> Router<AppState> {
    Router::new().route("/me/activity", get(my_activity))
}

#[instrument(skip(state, user))]
pub async fn my_activity(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<ActivityLog>>> {
    let entries = state.store.list_activity(user.id, RECENT_LIMIT).await?;
    Ok(Json(entries))
}

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::dto::CreateCategoryRequest;
use crate::{
    activity,
    auth::extractors::Superuser,
    error::{AppError, AppJson, AppResult},
    state::AppState,
    store::Category,
};

const MAX_CATEGORY_LEN: usize = 100;

pub fn category_routes() -> Router<AppState> {
    Router::new().route("/categories", get(list_categories).post(create_category))
}

#[instrument(skip(state))]
pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(state.store.list_categories().await?))
}

#[instrument(skip(state, admin, body))]
pub async fn create_category(
    State(state): State<AppState>,
    Superuser(admin): Superuser,
    AppJson(body): AppJson<CreateCategoryRequest>,
) -> AppResult<(StatusCode, Json<Category>)> {
    let name = body.name.trim();
    if name.is_empty() || name.chars().count() > MAX_CATEGORY_LEN {
        return Err(AppError::validation("Invalid category name"));
    }
    let category = state.store.create_category(name).await?.ok_or_else(|| {
        warn!(%name, "duplicate category");
        AppError::conflict("Category already exists")
    })?;

    info!(category_id = category.id, %name, "category created");
    activity::record(&state, admin.id, format!("created category {}", category.name)).await;
    Ok((StatusCode::CREATED, Json(category)))
}

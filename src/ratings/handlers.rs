use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::{delete, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{RateRequest, RatingView, RatingsResponse};
use super::services::parse_stars;
use crate::{
    activity,
    auth::extractors::CurrentUser,
    error::{AppError, AppJson, AppResult},
    state::AppState,
    store::NewRating,
};

pub fn rating_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/items/:id/ratings",
            post(rate_item).get(get_item_ratings).put(edit_rating),
        )
        .route("/items/:id/ratings/:rating_id", delete(delete_rating))
}

async fn ensure_item(state: &AppState, item_id: Uuid) -> AppResult<()> {
    match state.store.find_item(item_id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::not_found("Item not found")),
    }
}

#[instrument(skip(state, user, body))]
pub async fn rate_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<Uuid>,
    AppJson(body): AppJson<RateRequest>,
) -> AppResult<Json<Value>> {
    let user_id = user.id;
    ensure_item(&state, item_id).await?;

    if state.store.find_user_rating(item_id, user_id).await?.is_some() {
        warn!(%item_id, %user_id, "duplicate rating");
        return Err(AppError::conflict("You have already rated this item."));
    }
    let stars = parse_stars(body.stars.as_ref())?;

    let rating = state
        .store
        .insert_rating(NewRating {
            item_id,
            user_id,
            stars,
            comment: body.comment.unwrap_or_default(),
        })
        .await?
        .ok_or_else(|| {
            warn!(%item_id, %user_id, "duplicate rating lost the insert race");
            AppError::conflict("You have already rated this item.")
        })?;

    info!(rating_id = %rating.id, %item_id, %user_id, stars, "rating submitted");
    activity::record(&state, user_id, format!("rated item {item_id} with {stars} stars")).await;
    Ok(Json(json!({ "message": "Rating submitted successfully." })))
}

/// All ratings of an item plus the requester's own one. An item without
/// ratings yields an empty list.
#[instrument(skip(state, user))]
pub async fn get_item_ratings(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<RatingsResponse>> {
    let user_id = user.id;
    ensure_item(&state, item_id).await?;
    let ratings = state.store.list_ratings(item_id).await?;
    let own = state.store.find_user_rating(item_id, user_id).await?;
    Ok(Json(RatingsResponse {
        ratings: ratings.into_iter().map(RatingView::from).collect(),
        user_rating: own.into(),
    }))
}

#[instrument(skip(state, user, body))]
pub async fn edit_rating(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<Uuid>,
    AppJson(body): AppJson<RateRequest>,
) -> AppResult<Json<Value>> {
    let user_id = user.id;
    let rating = state
        .store
        .find_user_rating(item_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Rating not found"))?;
    let stars = parse_stars(body.stars.as_ref())?;
    let comment = body.comment.unwrap_or_default();

    state
        .store
        .update_rating(rating.id, stars, &comment)
        .await?
        .ok_or_else(|| AppError::not_found("Rating not found"))?;

    info!(rating_id = %rating.id, %item_id, %user_id, stars, "rating updated");
    activity::record(&state, user_id, format!("edited rating of item {item_id}")).await;
    Ok(Json(json!({ "message": "Rating updated successfully." })))
}

#[instrument(skip(state, user))]
pub async fn delete_rating(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((item_id, rating_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    let rating = state
        .store
        .find_rating(rating_id, item_id)
        .await?
        .ok_or_else(|| AppError::not_found("Rating not found"))?;

    if rating.user_id != user.id && !user.is_superuser {
        warn!(%rating_id, user_id = %user.id, "rating delete denied");
        return Err(AppError::forbidden(
            "You do not have permission to delete this rating.",
        ));
    }
    state.store.delete_rating(rating_id).await?;

    info!(%rating_id, %item_id, user_id = %user.id, "rating deleted");
    activity::record(&state, user.id, format!("deleted rating {rating_id}")).await;
    Ok((
        [(header::LOCATION, format!("/api/v1/items/{item_id}"))],
        Json(json!({ "message": "Rating deleted successfully." })),
    ))
}

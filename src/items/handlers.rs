use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{
    CreateItemRequest, EditItemRequest, ItemDetailResponse, ItemListResponse, ItemView,
    ListParams,
};
use super::services::{
    changes_from_request, ensure_category, filter_from_params, remove_image, replace_image,
    validate_name, UploadItem, IMAGE_URL_TTL_SECS, RELATED_LIMIT,
};
use crate::{
    activity,
    auth::extractors::{CurrentUser, Superuser},
    error::{AppError, AppJson, AppResult},
    ratings::dto::RatingView,
    state::AppState,
    store::NewItem,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/items", get(list_items))
        .route("/items/:id", get(get_item))
        .route("/items/:id/image", get(get_image))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/items", post(create_item))
        .route("/items/:id", axum::routing::put(edit_item).delete(delete_item))
        .route(
            "/items/:id/image",
            post(upload_image).layer(DefaultBodyLimit::max(10 * 1024 * 1024)), // 10MB
        )
}

fn item_location(id: Uuid) -> String {
    format!("/api/v1/items/{id}")
}

#[instrument(skip(state))]
pub async fn list_items(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<ItemListResponse>> {
    let filter = filter_from_params(&params)?;
    let items = state.store.list_items(&filter).await?;
    let categories = state.store.list_categories().await?;
    Ok(Json(ItemListResponse {
        items: items.into_iter().map(ItemView::from).collect(),
        query: filter.query.unwrap_or_default(),
        category_id: filter.category_id.unwrap_or(0),
        categories,
    }))
}

#[instrument(skip(state))]
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ItemDetailResponse>> {
    let item = state
        .store
        .find_item(id)
        .await?
        .ok_or_else(|| AppError::not_found("Item not found"))?;
    let related = state.store.related_items(&item, RELATED_LIMIT).await?;
    let ratings = state.store.list_ratings(id).await?;
    Ok(Json(ItemDetailResponse {
        item: item.into(),
        related_items: related.into_iter().map(ItemView::from).collect(),
        ratings: ratings.into_iter().map(RatingView::from).collect(),
    }))
}

#[instrument(skip(state, user, body))]
pub async fn create_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(body): AppJson<CreateItemRequest>,
) -> AppResult<impl IntoResponse> {
    let user_id = user.id;
    let name = validate_name(&body.name)?;
    ensure_category(&state, body.category_id).await?;

    let item = state
        .store
        .create_item(
            user_id,
            NewItem {
                name,
                description: body.description,
                category_id: body.category_id,
            },
        )
        .await?;

    info!(item_id = %item.id, %user_id, "item created");
    activity::record(&state, user_id, format!("created item {}", item.id)).await;
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, item_location(item.id))],
        Json(ItemView::from(item)),
    ))
}

/// Edits an item owned by the requester. Items owned by someone else are
/// reported exactly like missing ones.
#[instrument(skip(state, user, body))]
pub async fn edit_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    AppJson(body): AppJson<EditItemRequest>,
) -> AppResult<impl IntoResponse> {
    let user_id = user.id;
    if state.store.find_owned_item(id, user_id).await?.is_none() {
        warn!(item_id = %id, %user_id, "edit of missing or foreign item");
        return Err(AppError::not_found("Item not found"));
    }
    let changes = changes_from_request(&state, body).await?;
    let item = state
        .store
        .update_item(id, user_id, changes)
        .await?
        .ok_or_else(|| AppError::not_found("Item not found"))?;

    info!(item_id = %id, %user_id, "item edited");
    activity::record(&state, user_id, format!("edited item {id}")).await;
    Ok((
        [(header::LOCATION, item_location(id))],
        Json(ItemView::from(item)),
    ))
}

#[instrument(skip(state, admin))]
pub async fn delete_item(
    State(state): State<AppState>,
    Superuser(admin): Superuser,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let item = state
        .store
        .find_item(id)
        .await?
        .ok_or_else(|| AppError::not_found("Item not found"))?;
    if !state.store.delete_item(id).await? {
        return Err(AppError::not_found("Item not found"));
    }
    if let Some(key) = &item.image_key {
        remove_image(&state, key).await;
    }

    info!(item_id = %id, admin_id = %admin.id, "item deleted");
    activity::record(&state, admin.id, format!("deleted item {id}")).await;
    Ok((
        [(header::LOCATION, "/api/v1/items".to_string())],
        Json(json!({ "message": "Item deleted." })),
    ))
}

/// Multipart upload; the file goes in field `image` (or `file`).
#[instrument(skip(state, user, mp))]
pub async fn upload_image(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    mut mp: Multipart,
) -> AppResult<Json<ItemView>> {
    let user_id = user.id;
    let item = state
        .store
        .find_owned_item(id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Item not found"))?;

    let mut upload = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::validation(e.body_text()))?
    {
        if matches!(field.name(), Some("image") | Some("file")) {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".into());
            let body = field
                .bytes()
                .await
                .map_err(|e| AppError::validation(e.body_text()))?;
            upload = Some(UploadItem { body, content_type });
            break;
        }
    }
    let upload = upload.ok_or_else(|| AppError::validation("image is required"))?;

    replace_image(&state, &item, upload).await?;
    activity::record(&state, user_id, format!("set image of item {id}")).await;

    let item = state
        .store
        .find_item(id)
        .await?
        .ok_or_else(|| AppError::not_found("Item not found"))?;
    Ok(Json(item.into()))
}

/// Redirects to a short-lived presigned URL of the item image.
#[instrument(skip(state))]
pub async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Redirect> {
    let key = state
        .store
        .find_item(id)
        .await?
        .and_then(|i| i.image_key)
        .ok_or_else(|| AppError::not_found("Image not found"))?;
    let url = state.storage.presign_get(&key, IMAGE_URL_TTL_SECS).await?;
    Ok(Redirect::temporary(&url))
}

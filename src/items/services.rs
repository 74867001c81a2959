use anyhow::Context;
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{EditItemRequest, ListParams};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
    store::{Item, ItemChanges, ItemFilter},
};

pub const RELATED_LIMIT: i64 = 3;
pub const IMAGE_URL_TTL_SECS: u64 = 10 * 60;
const MAX_NAME_LEN: usize = 255;

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

/// Turns raw query parameters into a store filter.
///
/// A blank query and an absent, empty or `0` category all mean "no filter".
pub fn filter_from_params(params: &ListParams) -> AppResult<ItemFilter> {
    let query = params
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string);

    let category_id = match params.category.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match raw.parse::<i64>() {
            Ok(0) => None,
            Ok(id) if id > 0 => Some(id),
            _ => return Err(AppError::validation("Invalid category")),
        },
    };

    Ok(ItemFilter { query, category_id })
}

pub fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation("Name is too long"));
    }
    Ok(name.to_string())
}

pub async fn ensure_category(state: &AppState, category_id: i64) -> AppResult<()> {
    match state.store.find_category(category_id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::validation("Unknown category")),
    }
}

/// Validates an edit request into store changes.
pub async fn changes_from_request(
    state: &AppState,
    body: EditItemRequest,
) -> AppResult<ItemChanges> {
    let name = body.name.as_deref().map(validate_name).transpose()?;
    if let Some(category_id) = body.category_id {
        ensure_category(state, category_id).await?;
    }
    Ok(ItemChanges {
        name,
        description: body.description,
        category_id: body.category_id,
        is_sold: body.is_sold,
    })
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

fn image_key(item: &Item, ext: &str) -> String {
    format!("items/{}/{}-{}.{}", item.created_by, item.id, Uuid::new_v4(), ext)
}

/// Uploads a new image for `item` and drops the previous object, if any.
pub async fn replace_image(state: &AppState, item: &Item, upload: UploadItem) -> AppResult<String> {
    if upload.body.is_empty() {
        return Err(AppError::validation("Image is empty"));
    }
    let ext = ext_from_mime(&upload.content_type)
        .ok_or_else(|| AppError::validation("Unsupported image type"))?;
    let key = image_key(item, ext);

    state
        .storage
        .put_object(&key, upload.body, &upload.content_type)
        .await?;
    state
        .store
        .set_item_image(item.id, &key)
        .await
        .context("link image to item")?;
    info!(item_id = %item.id, %key, "item image stored");

    if let Some(old) = &item.image_key {
        remove_image(state, old).await;
    }
    Ok(key)
}

pub async fn remove_image(state: &AppState, key: &str) {
    if let Err(e) = state.storage.delete_object(key).await {
        warn!(error = %format!("{e:#}"), %key, "stale image not removed");
    }
}

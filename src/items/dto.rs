use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::ratings::dto::RatingView;
use crate::store::{Category, Item};

/// `GET /items?query=&category=`; both optional.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub query: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ItemView {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category_id: i64,
    pub is_sold: bool,
    pub created_by: Uuid,
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Item> for ItemView {
    fn from(i: Item) -> Self {
        Self {
            image_url: i.image_key.as_ref().map(|_| format!("/api/v1/items/{}/image", i.id)),
            id: i.id,
            name: i.name,
            description: i.description,
            category_id: i.category_id,
            is_sold: i.is_sold,
            created_by: i.created_by,
            created_at: i.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ItemListResponse {
    pub items: Vec<ItemView>,
    pub query: String,
    pub category_id: i64, // 0 when unfiltered
    pub categories: Vec<Category>,
}

#[derive(Debug, Serialize)]
pub struct ItemDetailResponse {
    pub item: ItemView,
    pub related_items: Vec<ItemView>,
    pub ratings: Vec<RatingView>,
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category_id: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct EditItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub is_sold: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
}

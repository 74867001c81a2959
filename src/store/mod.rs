use async_trait::async_trait;
use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgStore;

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // argon2, never exposed
    pub is_superuser: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category_id: i64,
    pub is_sold: bool,
    pub created_by: Uuid,
    pub image_key: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Rating {
    pub id: Uuid,
    pub item_id: Uuid,
    pub user_id: Uuid,
    pub stars: i16,
    pub comment: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A rating joined with the author's username.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RatingEntry {
    pub id: Uuid,
    pub item_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub stars: i16,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ContactMessage {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub message: String,
    pub user_id: Option<Uuid>,
    pub item_id: Option<Uuid>,
    pub recipient_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ActivityLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_superuser: bool,
}

#[derive(Debug, Clone)]
pub struct NewItem {
    pub name: String,
    pub description: String,
    pub category_id: i64,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ItemChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub is_sold: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewRating {
    pub item_id: Uuid,
    pub user_id: Uuid,
    pub stars: i16,
    pub comment: String,
}

#[derive(Debug, Clone)]
pub struct NewContactMessage {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub message: String,
    pub user_id: Option<Uuid>,
    pub item_id: Option<Uuid>,
    pub recipient_id: Option<Uuid>,
}

/// Named filters for the public listing. Only unsold items are ever listed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFilter {
    /// Case-insensitive substring over name or description.
    pub query: Option<String>,
    pub category_id: Option<i64>,
}

impl ItemFilter {
    pub fn matches(&self, item: &Item) -> bool {
        if item.is_sold {
            return false;
        }
        if let Some(category_id) = self.category_id {
            if item.category_id != category_id {
                return false;
            }
        }
        match &self.query {
            Some(q) => {
                let q = q.to_lowercase();
                item.name.to_lowercase().contains(&q)
                    || item.description.to_lowercase().contains(&q)
            }
            None => true,
        }
    }
}

/// Repository over every marketplace record.
///
/// Insert methods that can collide with a unique constraint return
/// `Ok(None)` instead of an error so callers can report a conflict.
#[async_trait]
pub trait MarketStore: Send + Sync {
    async fn create_user(&self, user: NewUser) -> anyhow::Result<Option<User>>;
    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    async fn list_categories(&self) -> anyhow::Result<Vec<Category>>;
    async fn find_category(&self, id: i64) -> anyhow::Result<Option<Category>>;
    async fn create_category(&self, name: &str) -> anyhow::Result<Option<Category>>;

    /// Unsold items matching `filter`, newest first.
    async fn list_items(&self, filter: &ItemFilter) -> anyhow::Result<Vec<Item>>;
    async fn find_item(&self, id: Uuid) -> anyhow::Result<Option<Item>>;
    async fn find_owned_item(&self, id: Uuid, owner: Uuid) -> anyhow::Result<Option<Item>>;
    /// Unsold items of the same category, excluding `item`, newest first.
    async fn related_items(&self, item: &Item, limit: i64) -> anyhow::Result<Vec<Item>>;
    async fn create_item(&self, owner: Uuid, item: NewItem) -> anyhow::Result<Item>;
    async fn update_item(
        &self,
        id: Uuid,
        owner: Uuid,
        changes: ItemChanges,
    ) -> anyhow::Result<Option<Item>>;
    async fn set_item_image(&self, id: Uuid, key: &str) -> anyhow::Result<()>;
    async fn delete_item(&self, id: Uuid) -> anyhow::Result<bool>;

    /// Atomic check-and-create; `None` when the (item, user) pair already rated.
    async fn insert_rating(&self, rating: NewRating) -> anyhow::Result<Option<Rating>>;
    /// All ratings of an item, oldest first.
    async fn list_ratings(&self, item_id: Uuid) -> anyhow::Result<Vec<RatingEntry>>;
    async fn find_user_rating(&self, item_id: Uuid, user_id: Uuid)
        -> anyhow::Result<Option<Rating>>;
    async fn find_rating(&self, rating_id: Uuid, item_id: Uuid) -> anyhow::Result<Option<Rating>>;
    async fn update_rating(
        &self,
        rating_id: Uuid,
        stars: i16,
        comment: &str,
    ) -> anyhow::Result<Option<Rating>>;
    async fn delete_rating(&self, rating_id: Uuid) -> anyhow::Result<bool>;

    async fn insert_message(&self, msg: NewContactMessage) -> anyhow::Result<ContactMessage>;
    /// Newest first. `visible_to = None` lists every message.
    async fn list_messages(&self, visible_to: Option<Uuid>) -> anyhow::Result<Vec<ContactMessage>>;
    async fn find_message(&self, id: Uuid) -> anyhow::Result<Option<ContactMessage>>;
    async fn delete_message(&self, id: Uuid) -> anyhow::Result<bool>;

    async fn log_activity(&self, user_id: Uuid, action: &str) -> anyhow::Result<()>;
    async fn list_activity(&self, user_id: Uuid, limit: i64) -> anyhow::Result<Vec<ActivityLog>>;
}

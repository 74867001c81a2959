use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    ActivityLog, Category, ContactMessage, Item, ItemChanges, ItemFilter, MarketStore,
    NewContactMessage, NewItem, NewRating, NewUser, Rating, RatingEntry, User,
};

/// In-process store for tests. Vectors keep insertion order, which is
/// creation order, so "newest first" is a reverse walk.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    categories: Vec<Category>,
    items: Vec<Item>,
    ratings: Vec<Rating>,
    messages: Vec<ContactMessage>,
    activity: Vec<ActivityLog>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store poisoned")
    }
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> anyhow::Result<Option<User>> {
        let mut inner = self.lock();
        if inner
            .users
            .iter()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Ok(None);
        }
        let row = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            is_superuser: user.is_superuser,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.push(row.clone());
        Ok(Some(row))
    }

    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_categories(&self) -> anyhow::Result<Vec<Category>> {
        let mut rows = self.lock().categories.clone();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn find_category(&self, id: i64) -> anyhow::Result<Option<Category>> {
        Ok(self.lock().categories.iter().find(|c| c.id == id).cloned())
    }

    async fn create_category(&self, name: &str) -> anyhow::Result<Option<Category>> {
        let mut inner = self.lock();
        if inner.categories.iter().any(|c| c.name == name) {
            return Ok(None);
        }
        let id = inner.categories.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        let row = Category { id, name: name.to_string() };
        inner.categories.push(row.clone());
        Ok(Some(row))
    }

    async fn list_items(&self, filter: &ItemFilter) -> anyhow::Result<Vec<Item>> {
        Ok(self
            .lock()
            .items
            .iter()
            .rev()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect())
    }

    async fn find_item(&self, id: Uuid) -> anyhow::Result<Option<Item>> {
        Ok(self.lock().items.iter().find(|i| i.id == id).cloned())
    }

    async fn find_owned_item(&self, id: Uuid, owner: Uuid) -> anyhow::Result<Option<Item>> {
        Ok(self
            .lock()
            .items
            .iter()
            .find(|i| i.id == id && i.created_by == owner)
            .cloned())
    }

    async fn related_items(&self, item: &Item, limit: i64) -> anyhow::Result<Vec<Item>> {
        Ok(self
            .lock()
            .items
            .iter()
            .rev()
            .filter(|i| i.category_id == item.category_id && !i.is_sold && i.id != item.id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn create_item(&self, owner: Uuid, item: NewItem) -> anyhow::Result<Item> {
        let row = Item {
            id: Uuid::new_v4(),
            name: item.name,
            description: item.description,
            category_id: item.category_id,
            is_sold: false,
            created_by: owner,
            image_key: None,
            created_at: OffsetDateTime::now_utc(),
        };
        self.lock().items.push(row.clone());
        Ok(row)
    }

    async fn update_item(
        &self,
        id: Uuid,
        owner: Uuid,
        changes: ItemChanges,
    ) -> anyhow::Result<Option<Item>> {
        let mut inner = self.lock();
        let Some(item) = inner
            .items
            .iter_mut()
            .find(|i| i.id == id && i.created_by == owner)
        else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            item.name = name;
        }
        if let Some(description) = changes.description {
            item.description = description;
        }
        if let Some(category_id) = changes.category_id {
            item.category_id = category_id;
        }
        if let Some(is_sold) = changes.is_sold {
            item.is_sold = is_sold;
        }
        Ok(Some(item.clone()))
    }

    async fn set_item_image(&self, id: Uuid, key: &str) -> anyhow::Result<()> {
        if let Some(item) = self.lock().items.iter_mut().find(|i| i.id == id) {
            item.image_key = Some(key.to_string());
        }
        Ok(())
    }

    async fn delete_item(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        let before = inner.items.len();
        inner.items.retain(|i| i.id != id);
        if inner.items.len() == before {
            return Ok(false);
        }
        inner.ratings.retain(|r| r.item_id != id);
        for m in inner.messages.iter_mut().filter(|m| m.item_id == Some(id)) {
            m.item_id = None;
        }
        Ok(true)
    }

    async fn insert_rating(&self, rating: NewRating) -> anyhow::Result<Option<Rating>> {
        let mut inner = self.lock();
        if inner
            .ratings
            .iter()
            .any(|r| r.item_id == rating.item_id && r.user_id == rating.user_id)
        {
            return Ok(None);
        }
        let row = Rating {
            id: Uuid::new_v4(),
            item_id: rating.item_id,
            user_id: rating.user_id,
            stars: rating.stars,
            comment: rating.comment,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.ratings.push(row.clone());
        Ok(Some(row))
    }

    async fn list_ratings(&self, item_id: Uuid) -> anyhow::Result<Vec<RatingEntry>> {
        let inner = self.lock();
        Ok(inner
            .ratings
            .iter()
            .filter(|r| r.item_id == item_id)
            .map(|r| RatingEntry {
                id: r.id,
                item_id: r.item_id,
                user_id: r.user_id,
                username: inner
                    .users
                    .iter()
                    .find(|u| u.id == r.user_id)
                    .map(|u| u.username.clone())
                    .unwrap_or_default(),
                stars: r.stars,
                comment: r.comment.clone(),
            })
            .collect())
    }

    async fn find_user_rating(
        &self,
        item_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<Rating>> {
        Ok(self
            .lock()
            .ratings
            .iter()
            .find(|r| r.item_id == item_id && r.user_id == user_id)
            .cloned())
    }

    async fn find_rating(&self, rating_id: Uuid, item_id: Uuid) -> anyhow::Result<Option<Rating>> {
        Ok(self
            .lock()
            .ratings
            .iter()
            .find(|r| r.id == rating_id && r.item_id == item_id)
            .cloned())
    }

    async fn update_rating(
        &self,
        rating_id: Uuid,
        stars: i16,
        comment: &str,
    ) -> anyhow::Result<Option<Rating>> {
        let mut inner = self.lock();
        let Some(rating) = inner.ratings.iter_mut().find(|r| r.id == rating_id) else {
            return Ok(None);
        };
        rating.stars = stars;
        rating.comment = comment.to_string();
        Ok(Some(rating.clone()))
    }

    async fn delete_rating(&self, rating_id: Uuid) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        let before = inner.ratings.len();
        inner.ratings.retain(|r| r.id != rating_id);
        Ok(inner.ratings.len() < before)
    }

    async fn insert_message(&self, msg: NewContactMessage) -> anyhow::Result<ContactMessage> {
        let row = ContactMessage {
            id: Uuid::new_v4(),
            first_name: msg.first_name,
            last_name: msg.last_name,
            email: msg.email,
            message: msg.message,
            user_id: msg.user_id,
            item_id: msg.item_id,
            recipient_id: msg.recipient_id,
            sent_at: OffsetDateTime::now_utc(),
        };
        self.lock().messages.push(row.clone());
        Ok(row)
    }

    async fn list_messages(&self, visible_to: Option<Uuid>) -> anyhow::Result<Vec<ContactMessage>> {
        Ok(self
            .lock()
            .messages
            .iter()
            .rev()
            .filter(|m| match visible_to {
                None => true,
                Some(uid) => m.user_id == Some(uid) || m.recipient_id == Some(uid),
            })
            .cloned()
            .collect())
    }

    async fn find_message(&self, id: Uuid) -> anyhow::Result<Option<ContactMessage>> {
        Ok(self.lock().messages.iter().find(|m| m.id == id).cloned())
    }

    async fn delete_message(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        let before = inner.messages.len();
        inner.messages.retain(|m| m.id != id);
        Ok(inner.messages.len() < before)
    }

    async fn log_activity(&self, user_id: Uuid, action: &str) -> anyhow::Result<()> {
        self.lock().activity.push(ActivityLog {
            id: Uuid::new_v4(),
            user_id,
            action: action.to_string(),
            timestamp: OffsetDateTime::now_utc(),
        });
        Ok(())
    }

    async fn list_activity(&self, user_id: Uuid, limit: i64) -> anyhow::Result<Vec<ActivityLog>> {
        Ok(self
            .lock()
            .activity
            .iter()
            .rev()
            .filter(|a| a.user_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

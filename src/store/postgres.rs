use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{
    ActivityLog, Category, ContactMessage, Item, ItemChanges, ItemFilter, MarketStore,
    NewContactMessage, NewItem, NewRating, NewUser, Rating, RatingEntry, User,
};

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { db })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .context("run migrations")?;
        Ok(())
    }
}

/// Builds an ILIKE pattern that matches `query` literally anywhere in the column.
pub(crate) fn like_pattern(query: &str) -> String {
    let mut out = String::with_capacity(query.len() + 2);
    out.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[async_trait]
impl MarketStore for PgStore {
    async fn create_user(&self, user: NewUser) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, is_superuser)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT DO NOTHING
            RETURNING id, username, email, password_hash, is_superuser, created_at
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_superuser)
        .fetch_optional(&self.db)
        .await
        .context("insert user")?;
        Ok(row)
    }

    async fn find_user(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, is_superuser, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user")?;
        Ok(row)
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, is_superuser, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(row)
    }

    async fn list_categories(&self) -> anyhow::Result<Vec<Category>> {
        let rows = sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY name")
            .fetch_all(&self.db)
            .await
            .context("list categories")?;
        Ok(rows)
    }

    async fn find_category(&self, id: i64) -> anyhow::Result<Option<Category>> {
        let row = sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find category")?;
        Ok(row)
    }

    async fn create_category(&self, name: &str) -> anyhow::Result<Option<Category>> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name)
            VALUES ($1)
            ON CONFLICT (name) DO NOTHING
            RETURNING id, name
            "#,
        )
        .bind(name)
        .fetch_optional(&self.db)
        .await
        .context("insert category")?;
        Ok(row)
    }

    async fn list_items(&self, filter: &ItemFilter) -> anyhow::Result<Vec<Item>> {
        let mut qb = QueryBuilder::<Postgres>::new(
            r#"
            SELECT id, name, description, category_id, is_sold, created_by, image_key, created_at
            FROM items
            WHERE is_sold = FALSE
            "#,
        );
        if let Some(category_id) = filter.category_id {
            qb.push(" AND category_id = ").push_bind(category_id);
        }
        if let Some(query) = &filter.query {
            let pattern = like_pattern(query);
            qb.push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(r" ESCAPE '\' OR description ILIKE ")
                .push_bind(pattern)
                .push(r" ESCAPE '\')");
        }
        qb.push(" ORDER BY created_at DESC, id DESC");

        let rows = qb
            .build_query_as::<Item>()
            .fetch_all(&self.db)
            .await
            .context("list items")?;
        Ok(rows)
    }

    async fn find_item(&self, id: Uuid) -> anyhow::Result<Option<Item>> {
        let row = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, name, description, category_id, is_sold, created_by, image_key, created_at
            FROM items
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find item")?;
        Ok(row)
    }

    async fn find_owned_item(&self, id: Uuid, owner: Uuid) -> anyhow::Result<Option<Item>> {
        let row = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, name, description, category_id, is_sold, created_by, image_key, created_at
            FROM items
            WHERE id = $1 AND created_by = $2
            "#,
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await
        .context("find owned item")?;
        Ok(row)
    }

    async fn related_items(&self, item: &Item, limit: i64) -> anyhow::Result<Vec<Item>> {
        let rows = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, name, description, category_id, is_sold, created_by, image_key, created_at
            FROM items
            WHERE category_id = $1 AND is_sold = FALSE AND id <> $2
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(item.category_id)
        .bind(item.id)
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .context("related items")?;
        Ok(rows)
    }

    async fn create_item(&self, owner: Uuid, item: NewItem) -> anyhow::Result<Item> {
        let row = sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO items (name, description, category_id, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, description, category_id, is_sold, created_by, image_key, created_at
            "#,
        )
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.category_id)
        .bind(owner)
        .fetch_one(&self.db)
        .await
        .context("insert item")?;
        Ok(row)
    }

    async fn update_item(
        &self,
        id: Uuid,
        owner: Uuid,
        changes: ItemChanges,
    ) -> anyhow::Result<Option<Item>> {
        let row = sqlx::query_as::<_, Item>(
            r#"
            UPDATE items
               SET name = COALESCE($3, name),
                   description = COALESCE($4, description),
                   category_id = COALESCE($5, category_id),
                   is_sold = COALESCE($6, is_sold)
             WHERE id = $1 AND created_by = $2
            RETURNING id, name, description, category_id, is_sold, created_by, image_key, created_at
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(changes.name)
        .bind(changes.description)
        .bind(changes.category_id)
        .bind(changes.is_sold)
        .fetch_optional(&self.db)
        .await
        .context("update item")?;
        Ok(row)
    }

    async fn set_item_image(&self, id: Uuid, key: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE items SET image_key = $2 WHERE id = $1")
            .bind(id)
            .bind(key)
            .execute(&self.db)
            .await
            .context("set item image")?;
        Ok(())
    }

    async fn delete_item(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete item")?;
        Ok(res.rows_affected() > 0)
    }

    async fn insert_rating(&self, rating: NewRating) -> anyhow::Result<Option<Rating>> {
        // the unique (item_id, user_id) constraint decides concurrent submissions
        let row = sqlx::query_as::<_, Rating>(
            r#"
            INSERT INTO ratings (item_id, user_id, stars, comment)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (item_id, user_id) DO NOTHING
            RETURNING id, item_id, user_id, stars, comment, created_at
            "#,
        )
        .bind(rating.item_id)
        .bind(rating.user_id)
        .bind(rating.stars)
        .bind(&rating.comment)
        .fetch_optional(&self.db)
        .await
        .context("insert rating")?;
        Ok(row)
    }

    async fn list_ratings(&self, item_id: Uuid) -> anyhow::Result<Vec<RatingEntry>> {
        let rows = sqlx::query_as::<_, RatingEntry>(
            r#"
            SELECT r.id, r.item_id, r.user_id, u.username, r.stars, r.comment
              FROM ratings r
              JOIN users u ON u.id = r.user_id
             WHERE r.item_id = $1
             ORDER BY r.created_at ASC, r.id ASC
            "#,
        )
        .bind(item_id)
        .fetch_all(&self.db)
        .await
        .context("list ratings")?;
        Ok(rows)
    }

    async fn find_user_rating(
        &self,
        item_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<Rating>> {
        let row = sqlx::query_as::<_, Rating>(
            r#"
            SELECT id, item_id, user_id, stars, comment, created_at
            FROM ratings
            WHERE item_id = $1 AND user_id = $2
            "#,
        )
        .bind(item_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("find user rating")?;
        Ok(row)
    }

    async fn find_rating(&self, rating_id: Uuid, item_id: Uuid) -> anyhow::Result<Option<Rating>> {
        let row = sqlx::query_as::<_, Rating>(
            r#"
            SELECT id, item_id, user_id, stars, comment, created_at
            FROM ratings
            WHERE id = $1 AND item_id = $2
            "#,
        )
        .bind(rating_id)
        .bind(item_id)
        .fetch_optional(&self.db)
        .await
        .context("find rating")?;
        Ok(row)
    }

    async fn update_rating(
        &self,
        rating_id: Uuid,
        stars: i16,
        comment: &str,
    ) -> anyhow::Result<Option<Rating>> {
        let row = sqlx::query_as::<_, Rating>(
            r#"
            UPDATE ratings
               SET stars = $2, comment = $3
             WHERE id = $1
            RETURNING id, item_id, user_id, stars, comment, created_at
            "#,
        )
        .bind(rating_id)
        .bind(stars)
        .bind(comment)
        .fetch_optional(&self.db)
        .await
        .context("update rating")?;
        Ok(row)
    }

    async fn delete_rating(&self, rating_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM ratings WHERE id = $1")
            .bind(rating_id)
            .execute(&self.db)
            .await
            .context("delete rating")?;
        Ok(res.rows_affected() > 0)
    }

    async fn insert_message(&self, msg: NewContactMessage) -> anyhow::Result<ContactMessage> {
        let row = sqlx::query_as::<_, ContactMessage>(
            r#"
            INSERT INTO contact_messages
                (first_name, last_name, email, message, user_id, item_id, recipient_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, first_name, last_name, email, message,
                      user_id, item_id, recipient_id, sent_at
            "#,
        )
        .bind(&msg.first_name)
        .bind(&msg.last_name)
        .bind(&msg.email)
        .bind(&msg.message)
        .bind(msg.user_id)
        .bind(msg.item_id)
        .bind(msg.recipient_id)
        .fetch_one(&self.db)
        .await
        .context("insert contact message")?;
        Ok(row)
    }

    async fn list_messages(&self, visible_to: Option<Uuid>) -> anyhow::Result<Vec<ContactMessage>> {
        let rows = sqlx::query_as::<_, ContactMessage>(
            r#"
            SELECT id, first_name, last_name, email, message,
                   user_id, item_id, recipient_id, sent_at
              FROM contact_messages
             WHERE $1::uuid IS NULL OR user_id = $1 OR recipient_id = $1
             ORDER BY sent_at DESC, id DESC
            "#,
        )
        .bind(visible_to)
        .fetch_all(&self.db)
        .await
        .context("list contact messages")?;
        Ok(rows)
    }

    async fn find_message(&self, id: Uuid) -> anyhow::Result<Option<ContactMessage>> {
        let row = sqlx::query_as::<_, ContactMessage>(
            r#"
            SELECT id, first_name, last_name, email, message,
                   user_id, item_id, recipient_id, sent_at
              FROM contact_messages
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find contact message")?;
        Ok(row)
    }

    async fn delete_message(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM contact_messages WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete contact message")?;
        Ok(res.rows_affected() > 0)
    }

    async fn log_activity(&self, user_id: Uuid, action: &str) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO activity_logs (user_id, action) VALUES ($1, $2)")
            .bind(user_id)
            .bind(action)
            .execute(&self.db)
            .await
            .context("insert activity log")?;
        Ok(())
    }

    async fn list_activity(&self, user_id: Uuid, limit: i64) -> anyhow::Result<Vec<ActivityLog>> {
        let rows = sqlx::query_as::<_, ActivityLog>(
            r#"
            SELECT id, user_id, action, timestamp
              FROM activity_logs
             WHERE user_id = $1
             ORDER BY timestamp DESC, id DESC
             LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .context("list activity")?;
        Ok(rows)
    }
}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::MessageRequest;
use super::services::{can_delete, can_view, validate_message};
use crate::{
    activity,
    auth::extractors::{CurrentUser, MaybeUser},
    error::{AppError, AppJson, AppResult},
    state::AppState,
    store::ContactMessage,
};

pub fn inbox_routes() -> Router<AppState> {
    Router::new()
        .route("/inbox", get(inbox))
        .route("/inbox/new/:item_id", post(new_conversation))
        .route("/inbox/:id", get(detail).delete(delete_message))
}

pub fn contact_routes() -> Router<AppState> {
    Router::new().route("/contact", post(contact))
}

#[instrument(skip(state, user))]
pub async fn inbox(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<ContactMessage>>> {
    let scope = (!user.is_superuser).then_some(user.id);
    Ok(Json(state.store.list_messages(scope).await?))
}

/// Message to the seller of an item.
#[instrument(skip(state, user, body))]
pub async fn new_conversation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<Uuid>,
    AppJson(body): AppJson<MessageRequest>,
) -> AppResult<(StatusCode, Json<ContactMessage>)> {
    let item = state
        .store
        .find_item(item_id)
        .await?
        .ok_or_else(|| AppError::not_found("Item not found"))?;
    if item.created_by == user.id {
        return Err(AppError::validation("You cannot message yourself about your own item"));
    }

    let msg = validate_message(body, Some(user.id), Some(item.id), Some(item.created_by))?;
    let msg = state.store.insert_message(msg).await?;

    info!(message_id = %msg.id, %item_id, sender = %user.id, "message sent");
    activity::record(&state, user.id, format!("sent message about item {item_id}")).await;
    Ok((StatusCode::CREATED, Json(msg)))
}

/// Public contact form; signed-in senders are linked to the message.
#[instrument(skip(state, body))]
pub async fn contact(
    State(state): State<AppState>,
    MaybeUser(user_id): MaybeUser,
    AppJson(body): AppJson<MessageRequest>,
) -> AppResult<(StatusCode, Json<ContactMessage>)> {
    let msg = validate_message(body, user_id, None, None)?;
    let msg = state.store.insert_message(msg).await?;

    info!(message_id = %msg.id, "contact message received");
    if let Some(user_id) = user_id {
        activity::record(&state, user_id, "sent contact message").await;
    }
    Ok((StatusCode::CREATED, Json(msg)))
}

#[instrument(skip(state, user))]
pub async fn detail(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ContactMessage>> {
    let msg = state
        .store
        .find_message(id)
        .await?
        .filter(|m| can_view(m, &user))
        .ok_or_else(|| AppError::not_found("Message not found"))?;
    Ok(Json(msg))
}

#[instrument(skip(state, user))]
pub async fn delete_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let msg = state
        .store
        .find_message(id)
        .await?
        .filter(|m| can_view(m, &user))
        .ok_or_else(|| AppError::not_found("Message not found"))?;
    if !can_delete(&msg, &user) {
        warn!(message_id = %id, user_id = %user.id, "message delete denied");
        return Err(AppError::forbidden(
            "You do not have permission to delete this message.",
        ));
    }
    state.store.delete_message(id).await?;

    info!(message_id = %id, user_id = %user.id, "message deleted");
    activity::record(&state, user.id, format!("deleted message {id}")).await;
    Ok(Json(json!({ "message": "Message deleted." })))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};
    use uuid::Uuid;

    use crate::test_support::TestApp;

    fn body() -> Value {
        json!({
            "first_name": "Ada",
            "last_name": "Lovelace",
            "email": "ada@example.com",
            "message": "Still available?"
        })
    }

    #[tokio::test]
    async fn buyer_messages_seller_and_both_see_it() {
        let app = TestApp::new();
        let seller = app.user("seller", false).await;
        let buyer = app.user("buyer", false).await;
        let stranger = app.user("stranger", false).await;
        let admin = app.user("admin", true).await;
        let books = app.category("Books").await;
        let item = app.item(&seller, "Atlas", "", &books).await;

        let uri = format!("/api/v1/inbox/new/{}", item.id);
        let (status, msg) = app.request(Method::POST, &uri, Some(&app.token(&buyer)), Some(body())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(msg["recipient_id"], seller.id.to_string());
        assert_eq!(msg["user_id"], buyer.id.to_string());

        for (who, expected) in [(&seller, 1), (&buyer, 1), (&stranger, 0), (&admin, 1)] {
            let (status, v) = app.request(Method::GET, "/api/v1/inbox", Some(&app.token(who)), None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(v.as_array().unwrap().len(), expected, "{}", who.username);
        }

        let detail = format!("/api/v1/inbox/{}", msg["id"].as_str().unwrap());
        let (status, v) = app.request(Method::GET, &detail, Some(&app.token(&seller)), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["message"], "Still available?");
        let (status, _) = app.request(Method::GET, &detail, Some(&app.token(&stranger)), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cannot_message_own_item_or_missing_item() {
        let app = TestApp::new();
        let seller = app.user("seller", false).await;
        let books = app.category("Books").await;
        let item = app.item(&seller, "Atlas", "", &books).await;
        let token = app.token(&seller);

        let uri = format!("/api/v1/inbox/new/{}", item.id);
        let (status, _) = app.request(Method::POST, &uri, Some(&token), Some(body())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/v1/inbox/new/{}", Uuid::new_v4());
        let (status, _) = app.request(Method::POST, &uri, Some(&token), Some(body())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_by_recipient_or_superuser() {
        let app = TestApp::new();
        let seller = app.user("seller", false).await;
        let buyer = app.user("buyer", false).await;
        let admin = app.user("admin", true).await;
        let books = app.category("Books").await;
        let item = app.item(&seller, "Atlas", "", &books).await;
        let uri = format!("/api/v1/inbox/new/{}", item.id);

        let (_, first) = app.request(Method::POST, &uri, Some(&app.token(&buyer)), Some(body())).await;
        let (_, second) = app.request(Method::POST, &uri, Some(&app.token(&buyer)), Some(body())).await;

        let first = format!("/api/v1/inbox/{}", first["id"].as_str().unwrap());
        let (status, _) = app.request(Method::DELETE, &first, Some(&app.token(&buyer)), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, v) = app.request(Method::DELETE, &first, Some(&app.token(&seller)), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["message"], "Message deleted.");

        let second = format!("/api/v1/inbox/{}", second["id"].as_str().unwrap());
        let (status, _) = app.request(Method::DELETE, &second, Some(&app.token(&admin)), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app.request(Method::DELETE, &second, Some(&app.token(&admin)), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn contact_form_is_public_and_links_signed_in_sender() {
        let app = TestApp::new();
        let user = app.user("visitor", false).await;
        let admin = app.user("admin", true).await;

        let (status, v) = app.request(Method::POST, "/api/v1/contact", None, Some(body())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(v["user_id"], Value::Null);

        let (status, v) = app
            .request(Method::POST, "/api/v1/contact", Some(&app.token(&user)), Some(body()))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(v["user_id"], user.id.to_string());

        let (status, _) = app
            .request(Method::POST, "/api/v1/contact", None, Some(json!({"first_name": "", "email": "x", "message": ""})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, v) = app.request(Method::GET, "/api/v1/inbox", Some(&app.token(&admin)), None).await;
        assert_eq!(v.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn contact_form_missing_field_is_a_json_400() {
        let app = TestApp::new();
        let (status, v) = app
            .request(Method::POST, "/api/v1/contact", None, Some(json!({"first_name": "Ada", "email": "a@b.co"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(v["error"].as_str().unwrap().contains("missing field `message`"));
    }
}

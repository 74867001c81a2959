use uuid::Uuid;

use super::dto::MessageRequest;
use crate::{
    auth::services::is_valid_email,
    error::{AppError, AppResult},
    store::{ContactMessage, NewContactMessage, User},
};

const MAX_NAME_LEN: usize = 100;

/// Checks and normalizes the form fields of a contact message.
pub fn validate_message(
    req: MessageRequest,
    user_id: Option<Uuid>,
    item_id: Option<Uuid>,
    recipient_id: Option<Uuid>,
) -> AppResult<NewContactMessage> {
    let first_name = req.first_name.trim().to_string();
    let last_name = req.last_name.trim().to_string();
    let email = req.email.trim().to_lowercase();
    let message = req.message.trim().to_string();

    if first_name.is_empty() {
        return Err(AppError::validation("First name is required"));
    }
    if first_name.chars().count() > MAX_NAME_LEN || last_name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation("Name is too long"));
    }
    if !is_valid_email(&email) {
        return Err(AppError::validation("Invalid email"));
    }
    if message.is_empty() {
        return Err(AppError::validation("Message is required"));
    }

    Ok(NewContactMessage {
        first_name,
        last_name,
        email,
        message,
        user_id,
        item_id,
        recipient_id,
    })
}

/// Superusers see everything; others only what they sent or received.
pub fn can_view(msg: &ContactMessage, user: &User) -> bool {
    user.is_superuser || msg.user_id == Some(user.id) || msg.recipient_id == Some(user.id)
}

pub fn can_delete(msg: &ContactMessage, user: &User) -> bool {
    user.is_superuser || msg.recipient_id == Some(user.id)
}

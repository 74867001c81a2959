pub mod handlers;

use tracing::warn;
use uuid::Uuid;

use crate::state::AppState;
use axum::Router;

const MAX_ACTION_LEN: usize = 255;

pub fn router() -> Router<AppState> {
    handlers::activity_routes()
}

/// Appends an audit entry. Failures are logged and swallowed.
pub async fn record(state: &AppState, user_id: Uuid, action: impl Into<String>) {
    let mut action = action.into();
    if action.chars().count() > MAX_ACTION_LEN {
        action = action.chars().take(MAX_ACTION_LEN).collect();
    }
    if let Err(e) = state.store.log_activity(user_id, &action).await {
        warn!(error = %format!("{e:#}"), %user_id, "activity log write failed");
    }
}

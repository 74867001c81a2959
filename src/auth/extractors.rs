use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use super::services::{JwtKeys, TokenKind};
use crate::{error::AppError, state::AppState, store::User};

/// Validated access token; carries the user ID.
pub struct AuthUser(pub Uuid);

/// Authenticated user with the record loaded from the store.
pub struct CurrentUser(pub User);

/// Authenticated user holding superuser rights.
pub struct Superuser(pub User);

/// Requester ID when a valid access token is present, otherwise `None`.
pub struct MaybeUser(pub Option<Uuid>);

fn bearer_token(parts: &Parts) -> Option<Result<&str, AppError>> {
    let header = parts.headers.get(axum::http::header::AUTHORIZATION)?;
    let token = header
        .to_str()
        .ok()
        .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
        .ok_or_else(|| AppError::unauthorized("Invalid Authorization header"));
    Some(token)
}

fn access_claims(keys: &JwtKeys, token: &str) -> Result<Uuid, AppError> {
    let claims = keys.verify(token).map_err(|_| {
        warn!("invalid or expired token");
        AppError::unauthorized("Invalid or expired token")
    })?;
    if claims.kind != TokenKind::Access {
        return Err(AppError::unauthorized("Access token required"));
    }
    Ok(claims.sub)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))??;
        Ok(AuthUser(access_claims(&keys, token)?))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let user_id = match bearer_token(parts) {
            Some(Ok(token)) => access_claims(&keys, token).ok(),
            _ => None,
        };
        Ok(MaybeUser(user_id))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user_id) = AuthUser::from_request_parts(parts, state).await?;
        let user = state
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::unauthorized("User not found"))?;
        Ok(CurrentUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Superuser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_superuser {
            warn!(user_id = %user.id, "superuser required");
            return Err(AppError::forbidden("Superuser access required"));
        }
        Ok(Superuser(user))
    }
}

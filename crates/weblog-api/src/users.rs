//! User directory and profile maintenance.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::{info, warn};

use weblog_core::Error;
use weblog_types::api::{ChangePasswordRequest, Claims, UpdateUserRequest, UserSearchQuery};
use weblog_types::models::User;

use crate::auth::{AppState, hash_password, password_matches, validate_nickname, validate_password};
use crate::error::{ApiError, blocking};

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    blocking(move || {
        let row = state
            .db
            .get_user_by_id(user_id)?
            .ok_or_else(|| Error::UserNotFound(user_id.to_string()))?;
        Ok(row.into_user()?)
    })
    .await
    .map(Json)
}

/// Exact username lookup; how a client finds someone to pair with.
pub async fn search_user(
    State(state): State<AppState>,
    Query(query): Query<UserSearchQuery>,
) -> Result<Json<User>, ApiError> {
    let username = query.username.trim().to_string();
    if username.is_empty() {
        return Err(Error::Validation("Username cannot be empty".into()).into());
    }

    blocking(move || {
        let row = state
            .db
            .get_user_by_username(&username)?
            .ok_or(Error::UserNotFound(username))?;
        Ok(row.into_user()?)
    })
    .await
    .map(Json)
}

/// Owner only.
pub async fn update_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    ensure_self(&claims, user_id, "update")?;
    let nickname = req.nickname.trim().to_string();
    validate_nickname(&nickname)?;

    let user = blocking(move || {
        state
            .db
            .update_user(user_id, &nickname)?
            .ok_or_else(|| Error::UserNotFound(user_id.to_string()))
    })
    .await?;
    info!("{} ({}) updated their profile", user.username, user.id);

    Ok(Json(user))
}

/// Owner only. The current password must match before the new one is
/// hashed and stored.
pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<i64>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    ensure_self(&claims, user_id, "change the password of")?;
    validate_password(&req.new_password)?;

    let db = state.db.clone();
    let row = blocking(move || {
        db.get_user_by_id(user_id)?
            .ok_or_else(|| Error::UserNotFound(user_id.to_string()))
    })
    .await?;

    if !password_matches(&req.old_password, &row.password, row.id)? {
        warn!("Wrong current password on password change for {}", row.username);
        return Err(Error::Validation("Current password is incorrect".into()).into());
    }

    let password_hash = hash_password(&req.new_password)?;
    let updated = blocking(move || Ok(state.db.update_password(user_id, &password_hash)?)).await?;
    if !updated {
        return Err(Error::UserNotFound(user_id.to_string()).into());
    }
    info!("{} ({}) changed their password", row.username, row.id);

    Ok(StatusCode::NO_CONTENT)
}

fn ensure_self(claims: &Claims, user_id: i64, action: &str) -> Result<(), ApiError> {
    if claims.sub != user_id {
        warn!("User {} tried to {} user {}", claims.sub, action, user_id);
        return Err(Error::PermissionDenied.into());
    }
    Ok(())
}

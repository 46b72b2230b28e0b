use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{info, warn};

use weblog_core::{ContentService, Error, RelationshipEngine};
use weblog_db::Database;
use weblog_db::queries::{insert_user, query_user_by_username};
use weblog_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::error::{ApiError, blocking};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub relationships: RelationshipEngine,
    pub content: ContentService,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim().to_string();
    let nickname = req.nickname.trim().to_string();
    validate_registration(&username, &req.password, &nickname)?;

    let password_hash = hash_password(&req.password)?;

    let db = state.db.clone();
    let name = username.clone();
    let user_id = blocking(move || {
        // Check and insert under one lock so a concurrent register cannot
        // slip in between.
        let created = db.with_conn(|conn| {
            if query_user_by_username(conn, &name)?.is_some() {
                return Ok(None);
            }
            insert_user(conn, &name, &password_hash, &nickname).map(Some)
        })?;
        created.ok_or(Error::UsernameTaken(name))
    })
    .await?;

    let token = create_token(&state.jwt_secret, state.jwt_ttl_hours, user_id, &username)?;
    info!("Registered {} ({})", username, user_id);

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let username = req.username.clone();
    let user = blocking(move || Ok(db.get_user_by_username(&username)?))
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !password_matches(&req.password, &user.password, user.id)? {
        warn!("Failed login for {}", user.username);
        return Err(ApiError::InvalidCredentials);
    }

    let token = create_token(&state.jwt_secret, state.jwt_ttl_hours, user.id, &user.username)?;

    Ok(Json(LoginResponse {
        user_id: user.id,
        username: user.username,
        nickname: user.nickname,
        token,
    }))
}

pub fn create_token(secret: &str, ttl_hours: i64, user_id: i64, username: &str) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::hours(ttl_hours)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::internal(format!("token encoding failed: {}", e)))
}

/// Argon2id with a fresh salt.
pub(crate) fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::internal(format!("password hashing failed: {}", e)))?
        .to_string())
}

pub(crate) fn password_matches(password: &str, stored_hash: &str, user_id: i64) -> Result<bool, ApiError> {
    let parsed_hash = PasswordHash::new(stored_hash)
        .map_err(|e| ApiError::internal(format!("stored hash for {} is malformed: {}", user_id, e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn invalid(msg: &str) -> Result<(), ApiError> {
    Err(Error::Validation(msg.to_string()).into())
}

fn validate_registration(username: &str, password: &str, nickname: &str) -> Result<(), ApiError> {
    if username.len() < 3 || username.len() > 20 {
        return invalid("Username must be between 3 and 20 characters");
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return invalid("Username may only contain letters, digits and underscores");
    }
    validate_password(password)?;
    validate_nickname(nickname)
}

pub(crate) fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < 8 {
        return invalid("Password must be at least 8 characters");
    }
    Ok(())
}

pub(crate) fn validate_nickname(nickname: &str) -> Result<(), ApiError> {
    let nick_len = nickname.chars().count();
    if nick_len == 0 || nick_len > 50 {
        return invalid("Nickname must be between 1 and 50 characters");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_rules() {
        assert!(validate_registration("alice", "password1", "Ali").is_ok());
        assert!(validate_registration("al", "password1", "Ali").is_err());
        assert!(validate_registration("a".repeat(21).as_str(), "password1", "Ali").is_err());
        assert!(validate_registration("ali ce", "password1", "Ali").is_err());
        assert!(validate_registration("alice", "short", "Ali").is_err());
        assert!(validate_registration("alice", "password1", "").is_err());
        assert!(validate_registration("alice", "password1", &"n".repeat(51)).is_err());
    }

    #[test]
    fn hashes_verify_only_their_password() {
        let hash = hash_password("password123").unwrap();
        assert!(password_matches("password123", &hash, 1).unwrap());
        assert!(!password_matches("password124", &hash, 1).unwrap());
        assert!(password_matches("password123", "not-a-phc-string", 1).is_err());
    }
}

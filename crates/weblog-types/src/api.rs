use serde::{Deserialize, Serialize};

use crate::models::{Comment, Post, Relationship, RelationshipStatus, RelationshipType, Timestamp, User};

// -- JWT Claims --

/// JWT claims shared across weblog-api (REST middleware) and weblog-gateway
/// (real-time channel handshake).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub nickname: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user_id: i64,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: i64,
    pub username: String,
    pub nickname: String,
    pub token: String,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub nickname: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UserSearchQuery {
    pub username: String,
}

// -- Relationships --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PartnerUsernameRequest {
    pub partner_username: String,
}

/// One row of a relationship listing, seen from the caller's side: `partner`
/// is the other member (or the requester/target for pending listings).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipResponse {
    pub id: i64,
    pub relationship_type: RelationshipType,
    pub status: RelationshipStatus,
    pub requester_id: i64,
    pub created_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    pub partner_id: i64,
    pub partner_username: String,
    pub partner_nickname: String,
}

impl RelationshipResponse {
    pub fn new(rel: &Relationship, partner_id: i64, partner: Option<&User>) -> Self {
        Self {
            id: rel.id,
            relationship_type: rel.kind,
            status: rel.status,
            requester_id: rel.requester,
            created_at: rel.created_at,
            ended_at: rel.ended_at,
            partner_id,
            partner_username: partner.map_or_else(|| "Unknown".to_string(), |u| u.username.clone()),
            partner_nickname: partner.map_or_else(|| "Unknown".to_string(), |u| u.nickname.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoupleStatus {
    Coupled,
    Single,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipStatusResponse {
    pub status: CoupleStatus,
    pub partner_id: Option<i64>,
    pub partner_username: Option<String>,
    pub partner_nickname: Option<String>,
    pub relationship_id: Option<i64>,
}

// -- Posts & comments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContentRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    #[serde(flatten)]
    pub post: Post,
    pub author_username: String,
    pub author_nickname: String,
    pub comments_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    #[serde(flatten)]
    pub comment: Comment,
    pub author_username: String,
    pub author_nickname: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CommentBatchRequest {
    pub comment_ids: Vec<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total: i64,
}

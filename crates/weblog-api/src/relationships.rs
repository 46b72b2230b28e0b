use std::collections::HashMap;

use axum::{Extension, Json, extract::State};

use weblog_core::Error;
use weblog_db::Database;
use weblog_types::api::{
    Claims, CoupleStatus, PartnerUsernameRequest, RelationshipResponse, RelationshipStatusResponse,
};
use weblog_types::models::Relationship;

use crate::auth::AppState;
use crate::error::{ApiError, blocking};

pub async fn send_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PartnerUsernameRequest>,
) -> Result<Json<RelationshipResponse>, ApiError> {
    blocking(move || {
        let rel = state
            .relationships
            .send_pair_request_by_username(claims.sub, req.partner_username.trim())?;
        view_one(&state.db, &rel, claims.sub)
    })
    .await
    .map(Json)
}

pub async fn accept_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PartnerUsernameRequest>,
) -> Result<Json<RelationshipResponse>, ApiError> {
    blocking(move || {
        let rel = state
            .relationships
            .accept_pair_request_by_username(claims.sub, req.partner_username.trim())?;
        view_one(&state.db, &rel, claims.sub)
    })
    .await
    .map(Json)
}

pub async fn reject_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PartnerUsernameRequest>,
) -> Result<Json<RelationshipResponse>, ApiError> {
    blocking(move || {
        let rel = state
            .relationships
            .reject_pair_request_by_username(claims.sub, req.partner_username.trim())?;
        view_one(&state.db, &rel, claims.sub)
    })
    .await
    .map(Json)
}

pub async fn unpair(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<RelationshipResponse>, ApiError> {
    blocking(move || {
        let rel = state.relationships.unpair(claims.sub)?;
        view_one(&state.db, &rel, claims.sub)
    })
    .await
    .map(Json)
}

pub async fn status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<RelationshipStatusResponse>, ApiError> {
    let info = blocking(move || state.relationships.couple_info(claims.sub)).await?;

    let response = match info {
        Some(info) => RelationshipStatusResponse {
            status: CoupleStatus::Coupled,
            partner_id: Some(info.partner.id),
            partner_username: Some(info.partner.username),
            partner_nickname: Some(info.partner.nickname),
            relationship_id: Some(info.relationship.id),
        },
        None => RelationshipStatusResponse {
            status: CoupleStatus::Single,
            partner_id: None,
            partner_username: None,
            partner_nickname: None,
            relationship_id: None,
        },
    };
    Ok(Json(response))
}

pub async fn history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<RelationshipResponse>>, ApiError> {
    blocking(move || {
        let rels = state.relationships.history(claims.sub)?;
        view_many(&state.db, &rels, claims.sub)
    })
    .await
    .map(Json)
}

/// Requests waiting on the caller.
pub async fn pending(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<RelationshipResponse>>, ApiError> {
    blocking(move || {
        let rels = state.relationships.pending_incoming(claims.sub)?;
        view_many(&state.db, &rels, claims.sub)
    })
    .await
    .map(Json)
}

/// Requests the caller sent that are still open.
pub async fn sent(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<RelationshipResponse>>, ApiError> {
    blocking(move || {
        let rels = state.relationships.pending_outgoing(claims.sub)?;
        view_many(&state.db, &rels, claims.sub)
    })
    .await
    .map(Json)
}

fn view_one(db: &Database, rel: &Relationship, viewer: i64) -> weblog_core::Result<RelationshipResponse> {
    view_many(db, std::slice::from_ref(rel), viewer)?
        .pop()
        .ok_or_else(|| Error::Store(anyhow::anyhow!("relationship {} has no view", rel.id)))
}

/// Render rows from the viewer's side, resolving every partner in one query.
fn view_many(db: &Database, rels: &[Relationship], viewer: i64) -> weblog_core::Result<Vec<RelationshipResponse>> {
    let partner_ids: Vec<i64> = rels.iter().filter_map(|r| r.other(viewer)).collect();
    let partners: HashMap<i64, _> = db
        .get_users_by_ids(&partner_ids)?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    Ok(rels
        .iter()
        .map(|rel| {
            let partner_id = rel.other(viewer).unwrap_or_default();
            RelationshipResponse::new(rel, partner_id, partners.get(&partner_id))
        })
        .collect())
}

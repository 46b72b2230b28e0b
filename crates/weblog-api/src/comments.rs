use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use weblog_core::Page;
use weblog_types::api::{Claims, CommentBatchRequest, CommentResponse, ContentRequest, PageQuery, PageResponse};
use weblog_types::models::Comment;

use crate::auth::{AppState, AppStateInner};
use crate::error::{ApiError, blocking};

pub async fn create_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
    Json(req): Json<ContentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut views = blocking(move || {
        let comment = state.content.create_comment(claims.sub, post_id, &req.content)?;
        view_comments(&state, vec![comment])
    })
    .await?;
    let view = views
        .pop()
        .ok_or_else(|| ApiError::internal(format!("new comment on post {} has no view", post_id)))?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Oldest first.
pub async fn list_comments(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PageResponse<CommentResponse>>, ApiError> {
    let page = Page::comments(query.page, query.size);
    blocking(move || {
        let (comments, total) = state.content.list_comments(claims.sub, post_id, page)?;
        Ok(PageResponse {
            items: view_comments(&state, comments)?,
            page: page.page,
            size: page.size,
            total,
        })
    })
    .await
    .map(Json)
}

/// Look up several comments at once. Ids the caller may not read, or that
/// do not exist, are left out of the result.
pub async fn batch_comments(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CommentBatchRequest>,
) -> Result<Json<Vec<CommentResponse>>, ApiError> {
    blocking(move || {
        let comments = state.content.comments_by_ids(claims.sub, &req.comment_ids)?;
        view_comments(&state, comments)
    })
    .await
    .map(Json)
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    blocking(move || state.content.delete_comment(claims.sub, comment_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn view_comments(state: &AppStateInner, comments: Vec<Comment>) -> weblog_core::Result<Vec<CommentResponse>> {
    let mut author_ids: Vec<i64> = comments.iter().map(|c| c.user_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let authors: HashMap<i64, _> = state
        .db
        .get_users_by_ids(&author_ids)?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    Ok(comments
        .into_iter()
        .map(|comment| {
            let author = authors.get(&comment.user_id);
            CommentResponse {
                author_username: author.map_or_else(|| "Unknown".to_string(), |u| u.username.clone()),
                author_nickname: author.map_or_else(|| "Unknown".to_string(), |u| u.nickname.clone()),
                comment,
            }
        })
        .collect())
}

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use weblog_core::{Error, Page};
use weblog_types::api::{Claims, ContentRequest, PageQuery, PageResponse, PostResponse};
use weblog_types::models::Post;

use crate::auth::{AppState, AppStateInner};
use crate::error::{ApiError, blocking};

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ContentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let view = blocking(move || {
        let post = state.content.create_post(claims.sub, &req.content)?;
        view_one(&state, post)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// The caller's feed: their posts and their partner's, newest first.
pub async fn feed(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PageResponse<PostResponse>>, ApiError> {
    let page = Page::posts(query.page, query.size);
    blocking(move || {
        let (posts, total) = state.content.feed(claims.sub, page)?;
        view_page(&state, posts, page, total)
    })
    .await
    .map(Json)
}

pub async fn get_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
) -> Result<Json<PostResponse>, ApiError> {
    blocking(move || {
        let post = state.content.get_post(claims.sub, post_id)?;
        view_one(&state, post)
    })
    .await
    .map(Json)
}

pub async fn update_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
    Json(req): Json<ContentRequest>,
) -> Result<Json<PostResponse>, ApiError> {
    blocking(move || {
        let post = state.content.update_post(claims.sub, post_id, &req.content)?;
        view_one(&state, post)
    })
    .await
    .map(Json)
}

pub async fn delete_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    blocking(move || state.content.delete_post(claims.sub, post_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn user_posts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(owner_id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PageResponse<PostResponse>>, ApiError> {
    let page = Page::posts(query.page, query.size);
    blocking(move || {
        let (posts, total) = state.content.posts_by_user(claims.sub, owner_id, page)?;
        view_page(&state, posts, page, total)
    })
    .await
    .map(Json)
}

fn view_one(state: &AppStateInner, post: Post) -> weblog_core::Result<PostResponse> {
    let id = post.id;
    view_posts(state, vec![post])?
        .pop()
        .ok_or_else(|| Error::Store(anyhow::anyhow!("post {} has no view", id)))
}

fn view_page(
    state: &AppStateInner,
    posts: Vec<Post>,
    page: Page,
    total: i64,
) -> weblog_core::Result<PageResponse<PostResponse>> {
    Ok(PageResponse {
        items: view_posts(state, posts)?,
        page: page.page,
        size: page.size,
        total,
    })
}

/// Attach author names and comment counts, one query each.
fn view_posts(state: &AppStateInner, posts: Vec<Post>) -> weblog_core::Result<Vec<PostResponse>> {
    let post_ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
    let mut author_ids: Vec<i64> = posts.iter().map(|p| p.user_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let authors: HashMap<i64, _> = state
        .db
        .get_users_by_ids(&author_ids)?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();
    let counts = state.content.comment_counts(&post_ids)?;

    Ok(posts
        .into_iter()
        .map(|post| {
            let author = authors.get(&post.user_id);
            PostResponse {
                author_username: author.map_or_else(|| "Unknown".to_string(), |u| u.username.clone()),
                author_nickname: author.map_or_else(|| "Unknown".to_string(), |u| u.nickname.clone()),
                comments_count: counts.get(&post.id).copied().unwrap_or(0),
                post,
            }
        })
        .collect())
}

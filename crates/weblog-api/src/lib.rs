//! REST surface: auth, users, relationships, posts and comments.

pub mod auth;
pub mod comments;
pub mod error;
pub mod middleware;
pub mod posts;
pub mod relationships;
pub mod users;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
};

use crate::auth::AppState;
use crate::middleware::require_auth;

/// All `/api` routes. Everything except register and login requires a
/// bearer token.
pub fn routes(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/api/relationships/pair-request", post(relationships::send_request))
        .route("/api/relationships/accept-request", post(relationships::accept_request))
        .route("/api/relationships/reject-request", post(relationships::reject_request))
        .route("/api/relationships/unpair", delete(relationships::unpair))
        .route("/api/relationships/status", get(relationships::status))
        .route("/api/relationships/history", get(relationships::history))
        .route("/api/relationships/pending", get(relationships::pending))
        .route("/api/relationships/sent", get(relationships::sent))
        .route("/api/posts", post(posts::create_post).get(posts::feed))
        .route(
            "/api/posts/{post_id}",
            get(posts::get_post).put(posts::update_post).delete(posts::delete_post),
        )
        .route("/api/users/search", get(users::search_user))
        .route("/api/users/{user_id}", get(users::get_user).put(users::update_user))
        .route("/api/users/{user_id}/password", put(users::change_password))
        .route("/api/users/{user_id}/posts", get(posts::user_posts))
        .route(
            "/api/posts/{post_id}/comments",
            post(comments::create_comment).get(comments::list_comments),
        )
        .route("/api/comments/batch", post(comments::batch_comments))
        .route("/api/comments/{comment_id}", delete(comments::delete_comment))
        .layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

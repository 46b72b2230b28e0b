use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use weblog_db::Database;
use weblog_db::content;
use weblog_db::encode::now;
use weblog_db::queries::query_user_by_id;
use weblog_types::models::{Comment, Post, UserRef};

use crate::error::{Error, Result};
use crate::events::{DomainEvent, EventSink};
use crate::relationship::{RelationshipEngine, load_user};

const DEFAULT_POST_PAGE: u32 = 10;
const DEFAULT_COMMENT_PAGE: u32 = 20;
const MAX_PAGE: u32 = 100;

/// Zero-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub size: u32,
}

impl Page {
    pub fn posts(page: Option<u32>, size: Option<u32>) -> Self {
        Self::with_default(page, size, DEFAULT_POST_PAGE)
    }

    pub fn comments(page: Option<u32>, size: Option<u32>) -> Self {
        Self::with_default(page, size, DEFAULT_COMMENT_PAGE)
    }

    fn with_default(page: Option<u32>, size: Option<u32>, default_size: u32) -> Self {
        let size = match size {
            Some(0) | None => default_size,
            Some(s) => s.min(MAX_PAGE),
        };
        Self { page: page.unwrap_or(0), size }
    }

    pub fn offset(&self) -> u32 {
        self.page.saturating_mul(self.size)
    }
}

/// Posts and comments. Every read and write goes through
/// [`RelationshipEngine::can_access_content`].
#[derive(Clone)]
pub struct ContentService {
    db: Arc<Database>,
    relationships: RelationshipEngine,
    events: Arc<dyn EventSink>,
}

impl ContentService {
    pub fn new(db: Arc<Database>, relationships: RelationshipEngine, events: Arc<dyn EventSink>) -> Self {
        Self { db, relationships, events }
    }

    // -- Posts --

    pub fn create_post(&self, author_id: i64, body: &str) -> Result<Post> {
        let body = validate_body(body, "Post")?;
        let author = self.load_author(author_id)?;

        let post = self.db.with_conn(|conn| content::insert_post(conn, author_id, body, &now()))?;
        info!("{} ({}) created post {}", author.username, author.id, post.id);

        if let Some(partner_id) = self.relationships.partner_of(author_id)? {
            self.events.emit(DomainEvent::PostCreated {
                author,
                partner_id,
                post_id: post.id,
                content: post.content.clone(),
            });
        }
        Ok(post)
    }

    pub fn get_post(&self, viewer_id: i64, post_id: i64) -> Result<Post> {
        let post = self.find_post(post_id)?;
        self.ensure_access(viewer_id, post.user_id)?;
        Ok(post)
    }

    pub fn update_post(&self, user_id: i64, post_id: i64, body: &str) -> Result<Post> {
        let body = validate_body(body, "Post")?;

        let (post, author) = self.db.with_tx::<_, _, Error>(|tx| {
            let post = content::get_post(tx, post_id)?.ok_or(Error::PostNotFound(post_id))?;
            if post.user_id != user_id {
                warn!("User {} tried to edit post {} owned by {}", user_id, post_id, post.user_id);
                return Err(Error::PermissionDenied);
            }
            let author = UserRef::from(&load_user(tx, user_id)?);
            Ok((content::update_post(tx, post_id, body, &now())?, author))
        })?;
        info!("{} ({}) updated post {}", author.username, author.id, post.id);

        if let Some(partner_id) = self.relationships.partner_of(user_id)? {
            self.events.emit(DomainEvent::PostUpdated {
                author,
                partner_id,
                post_id: post.id,
                content: post.content.clone(),
            });
        }
        Ok(post)
    }

    pub fn delete_post(&self, user_id: i64, post_id: i64) -> Result<()> {
        let author = self.db.with_tx::<_, _, Error>(|tx| {
            let post = content::get_post(tx, post_id)?.ok_or(Error::PostNotFound(post_id))?;
            if post.user_id != user_id {
                warn!("User {} tried to delete post {} owned by {}", user_id, post_id, post.user_id);
                return Err(Error::PermissionDenied);
            }
            let author = UserRef::from(&load_user(tx, user_id)?);
            content::delete_post(tx, post_id)?;
            Ok(author)
        })?;
        info!("{} ({}) deleted post {}", author.username, author.id, post_id);

        if let Some(partner_id) = self.relationships.partner_of(user_id)? {
            self.events.emit(DomainEvent::PostDeleted { author, partner_id, post_id });
        }
        Ok(())
    }

    /// The viewer's own posts and their partner's, newest first.
    pub fn feed(&self, viewer_id: i64, page: Page) -> Result<(Vec<Post>, i64)> {
        let mut visible = vec![viewer_id];
        if let Some(partner_id) = self.relationships.partner_of(viewer_id)? {
            visible.push(partner_id);
        }
        Ok(self
            .db
            .with_conn(|conn| content::list_posts_by_users(conn, &visible, page.size, page.offset()))?)
    }

    pub fn posts_by_user(&self, viewer_id: i64, owner_id: i64, page: Page) -> Result<(Vec<Post>, i64)> {
        self.load_author(owner_id)?;
        self.ensure_access(viewer_id, owner_id)?;
        Ok(self
            .db
            .with_conn(|conn| content::list_posts_by_users(conn, &[owner_id], page.size, page.offset()))?)
    }

    pub fn comment_counts(&self, post_ids: &[i64]) -> Result<HashMap<i64, i64>> {
        Ok(self.db.with_conn(|conn| content::count_comments_for_posts(conn, post_ids))?)
    }

    // -- Comments --

    pub fn create_comment(&self, author_id: i64, post_id: i64, body: &str) -> Result<Comment> {
        let body = validate_body(body, "Comment")?;
        let post = self.find_post(post_id)?;
        self.ensure_access(author_id, post.user_id)?;
        let author = self.load_author(author_id)?;

        let comment = self
            .db
            .with_conn(|conn| content::insert_comment(conn, post_id, author_id, body, &now()))?;
        info!("{} ({}) commented {} on post {}", author.username, author.id, comment.id, post_id);

        if author_id != post.user_id {
            self.events.emit(DomainEvent::CommentCreated {
                author,
                post_owner_id: post.user_id,
                post_id,
                comment_id: comment.id,
                content: comment.content.clone(),
            });
        }
        Ok(comment)
    }

    /// Comments on a post, oldest first.
    pub fn list_comments(&self, viewer_id: i64, post_id: i64, page: Page) -> Result<(Vec<Comment>, i64)> {
        let post = self.find_post(post_id)?;
        self.ensure_access(viewer_id, post.user_id)?;
        Ok(self
            .db
            .with_conn(|conn| content::list_comments(conn, post_id, page.size, page.offset()))?)
    }

    /// Only the comment's author may delete it.
    pub fn delete_comment(&self, user_id: i64, comment_id: i64) -> Result<()> {
        let (post, author) = self.db.with_tx::<_, _, Error>(|tx| {
            let comment = content::get_comment(tx, comment_id)?.ok_or(Error::CommentNotFound(comment_id))?;
            if comment.user_id != user_id {
                warn!("User {} tried to delete comment {} owned by {}", user_id, comment_id, comment.user_id);
                return Err(Error::PermissionDenied);
            }
            let post = content::get_post(tx, comment.post_id)?.ok_or(Error::PostNotFound(comment.post_id))?;
            let author = UserRef::from(&load_user(tx, user_id)?);
            content::delete_comment(tx, comment_id)?;
            Ok((post, author))
        })?;
        info!("{} ({}) deleted comment {} on post {}", author.username, author.id, comment_id, post.id);

        if user_id != post.user_id {
            self.events.emit(DomainEvent::CommentDeleted {
                author,
                post_owner_id: post.user_id,
                post_id: post.id,
                comment_id,
            });
        }
        Ok(())
    }

    /// The subset of `comment_ids` the viewer may read, in id order.
    /// Unknown ids and comments on posts outside the viewer's couple are
    /// dropped.
    pub fn comments_by_ids(&self, viewer_id: i64, comment_ids: &[i64]) -> Result<Vec<Comment>> {
        let mut ids = comment_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let (comments, owners) = self.db.with_conn(|conn| {
            let comments = content::get_comments_by_ids(conn, &ids)?;
            let mut post_ids: Vec<i64> = comments.iter().map(|c| c.post_id).collect();
            post_ids.sort_unstable();
            post_ids.dedup();
            let owners = content::post_owners(conn, &post_ids)?;
            Ok((comments, owners))
        })?;

        let mut allowed: HashMap<i64, bool> = HashMap::new();
        let mut visible = Vec::with_capacity(comments.len());
        for comment in comments {
            let Some(&owner_id) = owners.get(&comment.post_id) else {
                continue;
            };
            let ok = match allowed.get(&owner_id) {
                Some(&ok) => ok,
                None => {
                    let ok = self.relationships.can_access_content(viewer_id, owner_id)?;
                    allowed.insert(owner_id, ok);
                    ok
                }
            };
            if ok {
                visible.push(comment);
            }
        }
        Ok(visible)
    }

    fn find_post(&self, post_id: i64) -> Result<Post> {
        self.db
            .with_conn(|conn| content::get_post(conn, post_id))?
            .ok_or(Error::PostNotFound(post_id))
    }

    fn ensure_access(&self, viewer_id: i64, owner_id: i64) -> Result<()> {
        if self.relationships.can_access_content(viewer_id, owner_id)? {
            Ok(())
        } else {
            Err(Error::PermissionDenied)
        }
    }

    fn load_author(&self, user_id: i64) -> Result<UserRef> {
        let row = self
            .db
            .with_conn(|conn| query_user_by_id(conn, user_id))?
            .ok_or_else(|| Error::UserNotFound(user_id.to_string()))?;
        Ok(UserRef::from(&row.into_user()?))
    }
}

fn validate_body<'a>(body: &'a str, what: &str) -> Result<&'a str> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{} content cannot be empty", what)));
    }
    Ok(trimmed)
}

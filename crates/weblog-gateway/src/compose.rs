//! Turns domain events into the notifications users actually see.

use serde_json::{Map, Value, json};

use weblog_core::DomainEvent;
use weblog_types::events::{NotificationEvent, NotificationType};
use weblog_types::models::{Timestamp, UserRef};

const EXCERPT_CHARS: usize = 50;

pub fn compose(event: DomainEvent, now: Timestamp) -> Vec<NotificationEvent> {
    match event {
        DomainEvent::PairRequested { from, to } => vec![notify(
            NotificationType::PairRequest,
            &from,
            to.id,
            format!("{} sent you a pair request", from.display_name()),
            Map::new(),
            now,
        )],
        DomainEvent::PairAccepted { accepter, requester } => vec![notify(
            NotificationType::PairRequestAccepted,
            &accepter,
            requester.id,
            format!("{} accepted your pair request", accepter.display_name()),
            Map::new(),
            now,
        )],
        DomainEvent::PairRejected { rejecter, requester } => vec![notify(
            NotificationType::PairRequestRejected,
            &rejecter,
            requester.id,
            format!("{} rejected your pair request", rejecter.display_name()),
            Map::new(),
            now,
        )],
        DomainEvent::RelationshipEnded { initiator, partner } => vec![
            notify(
                NotificationType::RelationshipEnded,
                &initiator,
                partner.id,
                format!("Your relationship with {} has ended", initiator.display_name()),
                Map::new(),
                now,
            ),
            notify(
                NotificationType::RelationshipEnded,
                &partner,
                initiator.id,
                format!("Your relationship with {} has ended", partner.display_name()),
                Map::new(),
                now,
            ),
        ],
        DomainEvent::PostCreated { author, partner_id, post_id, content } => {
            let mut data = Map::new();
            data.insert("postId".into(), json!(post_id));
            data.insert("postContent".into(), json!(excerpt(&content)));
            vec![notify(
                NotificationType::NewPost,
                &author,
                partner_id,
                format!("{} published a new post", author.display_name()),
                data,
                now,
            )]
        }
        DomainEvent::PostUpdated { author, partner_id, post_id, content } => {
            let mut data = Map::new();
            data.insert("postId".into(), json!(post_id));
            data.insert("postContent".into(), json!(excerpt(&content)));
            vec![notify(
                NotificationType::PostUpdated,
                &author,
                partner_id,
                format!("{} updated a post", author.display_name()),
                data,
                now,
            )]
        }
        DomainEvent::PostDeleted { author, partner_id, post_id } => {
            let mut data = Map::new();
            data.insert("postId".into(), json!(post_id));
            vec![notify(
                NotificationType::PostDeleted,
                &author,
                partner_id,
                format!("{} deleted a post", author.display_name()),
                data,
                now,
            )]
        }
        DomainEvent::CommentCreated { author, post_owner_id, post_id, comment_id, content } => {
            let mut data = Map::new();
            data.insert("postId".into(), json!(post_id));
            data.insert("commentId".into(), json!(comment_id));
            data.insert("commentContent".into(), json!(excerpt(&content)));
            vec![notify(
                NotificationType::NewComment,
                &author,
                post_owner_id,
                format!("{} commented on your post", author.display_name()),
                data,
                now,
            )]
        }
        DomainEvent::CommentDeleted { author, post_owner_id, post_id, comment_id } => {
            let mut data = Map::new();
            data.insert("postId".into(), json!(post_id));
            data.insert("commentId".into(), json!(comment_id));
            vec![notify(
                NotificationType::CommentDeleted,
                &author,
                post_owner_id,
                format!("{} deleted a comment on your post", author.display_name()),
                data,
                now,
            )]
        }
    }
}

fn notify(
    kind: NotificationType,
    from: &UserRef,
    to_user_id: i64,
    message: String,
    mut data: Map<String, Value>,
    timestamp: Timestamp,
) -> NotificationEvent {
    data.insert("fromUserName".into(), json!(from.username));
    data.insert("fromUserNickname".into(), json!(from.display_name()));
    NotificationEvent {
        kind,
        from_user_id: from.id,
        to_user_id,
        message,
        data,
        timestamp,
    }
}

/// First 50 characters, with `...` appended when something was cut.
pub fn excerpt(content: &str) -> String {
    let mut chars = content.char_indices();
    match chars.nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

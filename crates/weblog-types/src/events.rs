use serde::{Deserialize, Serialize};

use crate::models::Timestamp;

/// Notification kinds pushed over the real-time channel. The client renders
/// on this tag alone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    PairRequest,
    PairRequestAccepted,
    PairRequestRejected,
    NewPost,
    PostUpdated,
    NewComment,
    PostDeleted,
    CommentDeleted,
    RelationshipEnded,
}

/// A notification sent FROM server TO one client.
///
/// Wire shape: `{type, fromUserId, toUserId, message, data, timestamp}` with
/// the timestamp rendered as `yyyy-MM-ddTHH:mm:ss`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub from_user_id: i64,
    pub to_user_id: i64,
    pub message: String,
    pub data: serde_json::Map<String, serde_json::Value>,
    #[serde(with = "wire_time")]
    pub timestamp: Timestamp,
}

mod wire_time {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&ts.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(D::Error::custom)
    }
}

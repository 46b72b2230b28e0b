use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// All timestamps are UTC wall-clock values without an offset.
pub type Timestamp = NaiveDateTime;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub nickname: String,
    pub created_at: Timestamp,
}

/// The acting side of a domain event: enough to render a notification
/// without another directory lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: i64,
    pub username: String,
    pub nickname: String,
}

impl UserRef {
    /// Nickname if set, otherwise the username.
    pub fn display_name(&self) -> &str {
        if self.nickname.trim().is_empty() {
            &self.username
        } else {
            &self.nickname
        }
    }
}

impl From<&User> for UserRef {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            nickname: user.nickname.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipStatus {
    Pending,
    Active,
    Inactive,
}

impl RelationshipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "ACTIVE" => Some(Self::Active),
            "INACTIVE" => Some(Self::Inactive),
            _ => None,
        }
    }

    /// Edges of the pairing state machine. ACTIVE is only reachable from
    /// PENDING, and INACTIVE only re-enters the machine through PENDING.
    pub fn can_transition_to(&self, next: RelationshipStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Active)
                | (Self::Pending, Self::Inactive)
                | (Self::Active, Self::Inactive)
                | (Self::Inactive, Self::Pending)
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    #[default]
    Couple,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Couple => "COUPLE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "COUPLE" => Some(Self::Couple),
            _ => None,
        }
    }
}

/// A pairing between two users. `user_a < user_b` always holds; the pair is
/// unordered and `requester` records who initiated the current request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub id: i64,
    pub user_a: i64,
    pub user_b: i64,
    pub requester: i64,
    pub kind: RelationshipType,
    pub status: RelationshipStatus,
    pub created_at: Timestamp,
    pub ended_at: Option<Timestamp>,
}

impl Relationship {
    pub fn contains(&self, user_id: i64) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }

    /// The member that is not `user_id`, or `None` if `user_id` is not a member.
    pub fn other(&self, user_id: i64) -> Option<i64> {
        if user_id == self.user_a {
            Some(self.user_b)
        } else if user_id == self.user_b {
            Some(self.user_a)
        } else {
            None
        }
    }

    /// The member who received the current request.
    pub fn target(&self) -> i64 {
        if self.requester == self.user_a {
            self.user_b
        } else {
            self.user_a
        }
    }
}

/// Normalize an unordered pair to its canonical `(low, high)` key.
pub fn canonical_pair(x: i64, y: i64) -> (i64, i64) {
    if x < y { (x, y) } else { (y, x) }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use RelationshipStatus::*;

    #[test]
    fn state_machine_edges() {
        assert!(Pending.can_transition_to(Active));
        assert!(Pending.can_transition_to(Inactive));
        assert!(Active.can_transition_to(Inactive));
        assert!(Inactive.can_transition_to(Pending));

        assert!(!Active.can_transition_to(Pending));
        assert!(!Inactive.can_transition_to(Active));
        assert!(!Active.can_transition_to(Active));
    }

    #[test]
    fn canonical_pair_orders_low_high() {
        assert_eq!(canonical_pair(9, 2), (2, 9));
        assert_eq!(canonical_pair(2, 9), (2, 9));
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let mut u = UserRef { id: 1, username: "alice".into(), nickname: "  ".into() };
        assert_eq!(u.display_name(), "alice");
        u.nickname = "Al".into();
        assert_eq!(u.display_name(), "Al");
    }
}

use weblog_types::models::UserRef;

/// Something that happened in the domain and that someone may want to hear
/// about. Emitted only after the change is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    PairRequested {
        from: UserRef,
        to: UserRef,
    },
    PairAccepted {
        accepter: UserRef,
        requester: UserRef,
    },
    PairRejected {
        rejecter: UserRef,
        requester: UserRef,
    },
    RelationshipEnded {
        initiator: UserRef,
        partner: UserRef,
    },
    PostCreated {
        author: UserRef,
        partner_id: i64,
        post_id: i64,
        content: String,
    },
    PostUpdated {
        author: UserRef,
        partner_id: i64,
        post_id: i64,
        content: String,
    },
    PostDeleted {
        author: UserRef,
        partner_id: i64,
        post_id: i64,
    },
    CommentCreated {
        author: UserRef,
        post_owner_id: i64,
        post_id: i64,
        comment_id: i64,
        content: String,
    },
    CommentDeleted {
        author: UserRef,
        post_owner_id: i64,
        post_id: i64,
        comment_id: i64,
    },
}

/// Receiver of domain events. `emit` must not block and cannot fail: the
/// action that produced the event has already committed.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DomainEvent);
}

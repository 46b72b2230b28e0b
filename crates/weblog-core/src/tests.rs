use std::sync::{Arc, Mutex};
use std::thread;

use weblog_db::Database;
use weblog_types::models::RelationshipStatus;

use crate::{ContentService, DomainEvent, Error, ErrorKind, EventSink, Page, RelationshipEngine};

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingSink {
    fn take(&self) -> Vec<DomainEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: DomainEvent) {
        self.events.lock().unwrap().push(event);
    }
}

struct Fixture {
    db: Arc<Database>,
    sink: Arc<RecordingSink>,
    engine: RelationshipEngine,
    content: ContentService,
}

fn setup() -> Fixture {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let sink = Arc::new(RecordingSink::default());
    let engine = RelationshipEngine::new(db.clone(), sink.clone());
    let content = ContentService::new(db.clone(), engine.clone(), sink.clone());
    Fixture { db, sink, engine, content }
}

impl Fixture {
    fn user(&self, name: &str) -> i64 {
        self.db.create_user(name, "hash", &format!("{}-nick", name)).unwrap()
    }

    fn pair(&self, a: i64, b: i64) {
        self.engine.send_pair_request(a, b).unwrap();
        self.engine.accept_pair_request(b, a).unwrap();
        self.sink.take();
    }
}

// -- Access gating --

#[test]
fn owner_always_sees_own_content() {
    let f = setup();
    let alice = f.user("alice");
    assert!(f.engine.can_access_content(alice, alice).unwrap());
}

#[test]
fn access_is_symmetric_for_partners_and_denied_to_others() {
    let f = setup();
    let alice = f.user("alice");
    let bob = f.user("bob");
    let carol = f.user("carol");

    assert!(!f.engine.can_access_content(alice, bob).unwrap());

    f.pair(alice, bob);
    assert!(f.engine.can_access_content(alice, bob).unwrap());
    assert!(f.engine.can_access_content(bob, alice).unwrap());
    assert!(!f.engine.can_access_content(carol, alice).unwrap());
    assert!(!f.engine.can_access_content(alice, carol).unwrap());
}

#[test]
fn pending_request_grants_no_access() {
    let f = setup();
    let alice = f.user("alice");
    let bob = f.user("bob");
    f.engine.send_pair_request(alice, bob).unwrap();
    assert!(!f.engine.can_access_content(bob, alice).unwrap());
}

// -- State machine --

#[test]
fn request_then_accept_makes_partners() {
    let f = setup();
    let alice = f.user("alice");
    let bob = f.user("bob");

    let pending = f.engine.send_pair_request_by_username(alice, "bob").unwrap();
    assert_eq!(pending.status, RelationshipStatus::Pending);
    assert_eq!(pending.requester, alice);

    let events = f.sink.take();
    assert!(matches!(&events[..], [DomainEvent::PairRequested { from, to }] if from.id == alice && to.id == bob));

    let active = f.engine.accept_pair_request_by_username(bob, "alice").unwrap();
    assert_eq!(active.id, pending.id);
    assert_eq!(active.status, RelationshipStatus::Active);
    assert_eq!(f.engine.partner_of(alice).unwrap(), Some(bob));
    assert_eq!(f.engine.partner_of(bob).unwrap(), Some(alice));

    let info = f.engine.couple_info(alice).unwrap().unwrap();
    assert_eq!(info.partner.username, "bob");

    let events = f.sink.take();
    assert!(matches!(
        &events[..],
        [DomainEvent::PairAccepted { accepter, requester }] if accepter.id == bob && requester.id == alice
    ));
}

#[test]
fn self_pairing_is_rejected() {
    let f = setup();
    let alice = f.user("alice");
    let err = f.engine.send_pair_request(alice, alice).unwrap_err();
    assert!(matches!(err, Error::SelfPairing));
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn unknown_target_is_not_found() {
    let f = setup();
    let alice = f.user("alice");
    let err = f.engine.send_pair_request_by_username(alice, "ghost").unwrap_err();
    assert!(matches!(err, Error::UserNotFound(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn duplicate_request_conflicts_in_either_direction() {
    let f = setup();
    let alice = f.user("alice");
    let bob = f.user("bob");
    f.engine.send_pair_request(alice, bob).unwrap();

    let again = f.engine.send_pair_request(alice, bob).unwrap_err();
    assert!(matches!(again, Error::RequestAlreadyExists(_)));
    let reverse = f.engine.send_pair_request(bob, alice).unwrap_err();
    assert_eq!(reverse.kind(), ErrorKind::Conflict);
}

#[test]
fn user_holds_at_most_one_pending_request() {
    let f = setup();
    let alice = f.user("alice");
    let bob = f.user("bob");
    let carol = f.user("carol");
    let dave = f.user("dave");

    f.engine.send_pair_request(alice, bob).unwrap();
    assert!(matches!(f.engine.send_pair_request(alice, carol), Err(Error::RequestAlreadyExists(id)) if id == alice));
    assert!(matches!(f.engine.send_pair_request(dave, bob), Err(Error::RequestAlreadyExists(id)) if id == bob));
}

#[test]
fn paired_users_cannot_take_new_requests() {
    let f = setup();
    let alice = f.user("alice");
    let bob = f.user("bob");
    let carol = f.user("carol");
    f.pair(alice, bob);

    assert!(matches!(f.engine.send_pair_request(carol, alice), Err(Error::AlreadyPaired(id)) if id == alice));
    assert!(matches!(f.engine.send_pair_request(bob, carol), Err(Error::AlreadyPaired(id)) if id == bob));
    assert!(matches!(f.engine.send_pair_request(alice, bob), Err(Error::AlreadyPaired(_))));
}

#[test]
fn accept_requires_the_right_direction() {
    let f = setup();
    let alice = f.user("alice");
    let bob = f.user("bob");
    f.engine.send_pair_request(alice, bob).unwrap();

    // alice cannot accept her own request
    let err = f.engine.accept_pair_request(alice, bob).unwrap_err();
    assert!(matches!(err, Error::NoPendingRequest));
    let err = f.engine.reject_pair_request(alice, bob).unwrap_err();
    assert!(matches!(err, Error::NoPendingRequest));

    assert!(f.engine.accept_pair_request(bob, alice).is_ok());
}

#[test]
fn accept_without_request_is_not_found() {
    let f = setup();
    let alice = f.user("alice");
    let bob = f.user("bob");
    let err = f.engine.accept_pair_request(bob, alice).unwrap_err();
    assert!(matches!(err, Error::NoPendingRequest));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn reject_then_resend_reuses_the_row() {
    let f = setup();
    let alice = f.user("alice");
    let bob = f.user("bob");

    let first = f.engine.send_pair_request(alice, bob).unwrap();
    let rejected = f.engine.reject_pair_request(bob, alice).unwrap();
    assert_eq!(rejected.status, RelationshipStatus::Inactive);
    assert!(rejected.ended_at.is_some());

    f.sink.take();
    let again = f.engine.send_pair_request(bob, alice).unwrap();
    assert_eq!(again.id, first.id);
    assert_eq!(again.status, RelationshipStatus::Pending);
    assert_eq!(again.requester, bob);
    assert!(again.ended_at.is_none());
    assert!(again.created_at >= first.created_at);
    assert_eq!(f.engine.history(alice).unwrap().len(), 1);
}

#[test]
fn reject_emits_event_to_requester() {
    let f = setup();
    let alice = f.user("alice");
    let bob = f.user("bob");
    f.engine.send_pair_request(alice, bob).unwrap();
    f.sink.take();

    f.engine.reject_pair_request_by_username(bob, "alice").unwrap();
    let events = f.sink.take();
    assert!(matches!(
        &events[..],
        [DomainEvent::PairRejected { rejecter, requester }] if rejecter.id == bob && requester.id == alice
    ));
}

#[test]
fn unpair_frees_both_members() {
    let f = setup();
    let alice = f.user("alice");
    let bob = f.user("bob");
    let carol = f.user("carol");
    f.pair(alice, bob);

    let ended = f.engine.unpair(bob).unwrap();
    assert_eq!(ended.status, RelationshipStatus::Inactive);
    assert!(ended.ended_at.is_some());
    assert_eq!(f.engine.partner_of(alice).unwrap(), None);
    assert_eq!(f.engine.partner_of(bob).unwrap(), None);
    assert!(!f.engine.can_access_content(alice, bob).unwrap());

    let events = f.sink.take();
    assert!(matches!(
        &events[..],
        [DomainEvent::RelationshipEnded { initiator, partner }] if initiator.id == bob && partner.id == alice
    ));

    // both may pair again, with anyone
    f.engine.send_pair_request(alice, carol).unwrap();
}

#[test]
fn unpair_without_partner_is_not_found() {
    let f = setup();
    let alice = f.user("alice");
    assert!(matches!(f.engine.unpair(alice), Err(Error::NoActiveRelationship)));
}

#[test]
fn pending_listings_split_by_direction() {
    let f = setup();
    let alice = f.user("alice");
    let bob = f.user("bob");
    f.engine.send_pair_request(alice, bob).unwrap();

    assert_eq!(f.engine.pending_outgoing(alice).unwrap().len(), 1);
    assert!(f.engine.pending_incoming(alice).unwrap().is_empty());
    assert_eq!(f.engine.pending_incoming(bob).unwrap().len(), 1);
    assert!(f.engine.pending_outgoing(bob).unwrap().is_empty());
}

// -- Content --

#[test]
fn posts_are_private_to_the_couple() {
    let f = setup();
    let alice = f.user("alice");
    let bob = f.user("bob");
    let carol = f.user("carol");

    let post = f.content.create_post(alice, "  first  ").unwrap();
    assert_eq!(post.content, "first");
    assert!(f.sink.take().is_empty(), "no partner, nobody to notify");

    assert!(matches!(f.content.get_post(bob, post.id), Err(Error::PermissionDenied)));

    f.pair(alice, bob);
    assert_eq!(f.content.get_post(bob, post.id).unwrap().id, post.id);
    assert!(matches!(f.content.get_post(carol, post.id), Err(Error::PermissionDenied)));
    assert!(matches!(
        f.content.posts_by_user(carol, alice, Page::posts(None, None)),
        Err(Error::PermissionDenied)
    ));
}

#[test]
fn feed_merges_self_and_partner() {
    let f = setup();
    let alice = f.user("alice");
    let bob = f.user("bob");
    let carol = f.user("carol");
    f.pair(alice, bob);

    f.content.create_post(alice, "a1").unwrap();
    f.content.create_post(bob, "b1").unwrap();
    f.content.create_post(carol, "c1").unwrap();

    let (posts, total) = f.content.feed(alice, Page::posts(None, None)).unwrap();
    assert_eq!(total, 2);
    assert!(posts.iter().all(|p| p.user_id == alice || p.user_id == bob));

    let (posts, total) = f.content.feed(carol, Page::posts(None, None)).unwrap();
    assert_eq!(total, 1);
    assert_eq!(posts[0].content, "c1");
}

#[test]
fn post_events_reach_the_partner() {
    let f = setup();
    let alice = f.user("alice");
    let bob = f.user("bob");
    f.pair(alice, bob);

    let post = f.content.create_post(alice, "hello").unwrap();
    f.content.update_post(alice, post.id, "hello again").unwrap();
    f.content.delete_post(alice, post.id).unwrap();

    let events = f.sink.take();
    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], DomainEvent::PostCreated { partner_id, .. } if *partner_id == bob));
    assert!(matches!(&events[1], DomainEvent::PostUpdated { content, .. } if content == "hello again"));
    assert!(matches!(&events[2], DomainEvent::PostDeleted { post_id, .. } if *post_id == post.id));
}

#[test]
fn only_the_author_edits_or_deletes_a_post() {
    let f = setup();
    let alice = f.user("alice");
    let bob = f.user("bob");
    f.pair(alice, bob);
    let post = f.content.create_post(alice, "mine").unwrap();

    assert!(matches!(f.content.update_post(bob, post.id, "ours"), Err(Error::PermissionDenied)));
    assert!(matches!(f.content.delete_post(bob, post.id), Err(Error::PermissionDenied)));
    assert!(matches!(f.content.delete_post(alice, 9999), Err(Error::PostNotFound(9999))));
}

#[test]
fn blank_post_is_a_validation_error() {
    let f = setup();
    let alice = f.user("alice");
    let err = f.content.create_post(alice, "   ").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn partner_comments_notify_the_post_owner() {
    let f = setup();
    let alice = f.user("alice");
    let bob = f.user("bob");
    let carol = f.user("carol");
    f.pair(alice, bob);
    let post = f.content.create_post(alice, "post").unwrap();
    f.sink.take();

    let own = f.content.create_comment(alice, post.id, "self note").unwrap();
    assert!(f.sink.take().is_empty());

    let comment = f.content.create_comment(bob, post.id, "nice").unwrap();
    let events = f.sink.take();
    assert!(matches!(
        &events[..],
        [DomainEvent::CommentCreated { post_owner_id, comment_id, .. }] if *post_owner_id == alice && *comment_id == comment.id
    ));

    assert!(matches!(f.content.create_comment(carol, post.id, "hi"), Err(Error::PermissionDenied)));

    let (comments, total) = f.content.list_comments(bob, post.id, Page::comments(None, None)).unwrap();
    assert_eq!(total, 2);
    assert_eq!(comments[0].id, own.id);
    assert_eq!(f.content.comment_counts(&[post.id]).unwrap().get(&post.id), Some(&2));
}

#[test]
fn only_the_comment_author_deletes_it() {
    let f = setup();
    let alice = f.user("alice");
    let bob = f.user("bob");
    f.pair(alice, bob);
    let post = f.content.create_post(alice, "post").unwrap();
    let comment = f.content.create_comment(bob, post.id, "nice").unwrap();
    f.sink.take();

    assert!(matches!(f.content.delete_comment(alice, comment.id), Err(Error::PermissionDenied)));
    f.content.delete_comment(bob, comment.id).unwrap();

    let events = f.sink.take();
    assert!(matches!(
        &events[..],
        [DomainEvent::CommentDeleted { post_owner_id, .. }] if *post_owner_id == alice
    ));
    assert!(matches!(f.content.delete_comment(bob, comment.id), Err(Error::CommentNotFound(_))));
}

#[test]
fn unpairing_revokes_content_access() {
    let f = setup();
    let alice = f.user("alice");
    let bob = f.user("bob");
    f.pair(alice, bob);
    let post = f.content.create_post(alice, "while together").unwrap();
    f.engine.unpair(alice).unwrap();

    assert!(matches!(f.content.get_post(bob, post.id), Err(Error::PermissionDenied)));
    assert!(matches!(f.content.list_comments(bob, post.id, Page::comments(None, None)), Err(Error::PermissionDenied)));
}

#[test]
fn editing_or_deleting_a_vanished_post_is_not_found() {
    let f = setup();
    let alice = f.user("alice");
    let post = f.content.create_post(alice, "short lived").unwrap();
    f.content.delete_post(alice, post.id).unwrap();

    let err = f.content.update_post(alice, post.id, "still here?").unwrap_err();
    assert!(matches!(err, Error::PostNotFound(id) if id == post.id));
    let err = f.content.delete_post(alice, post.id).unwrap_err();
    assert!(matches!(err, Error::PostNotFound(_)));
}

#[test]
fn deleting_a_comment_twice_is_not_found() {
    let f = setup();
    let alice = f.user("alice");
    let bob = f.user("bob");
    f.pair(alice, bob);

    let post = f.content.create_post(alice, "hello").unwrap();
    let comment = f.content.create_comment(bob, post.id, "hi").unwrap();
    f.content.delete_comment(bob, comment.id).unwrap();

    let err = f.content.delete_comment(bob, comment.id).unwrap_err();
    assert!(matches!(err, Error::CommentNotFound(id) if id == comment.id));
}

#[test]
fn comment_batch_is_filtered_per_post() {
    let f = setup();
    let alice = f.user("alice");
    let bob = f.user("bob");
    let carol = f.user("carol");
    f.pair(alice, bob);

    let ours = f.content.create_post(alice, "ours").unwrap();
    let mine = f.content.create_post(carol, "mine").unwrap();
    let c1 = f.content.create_comment(bob, ours.id, "one").unwrap();
    let c2 = f.content.create_comment(carol, mine.id, "two").unwrap();

    let ids = [c2.id, c1.id, c1.id, 4242];
    let seen: Vec<i64> = f.content.comments_by_ids(alice, &ids).unwrap().iter().map(|c| c.id).collect();
    assert_eq!(seen, vec![c1.id]);
    let seen: Vec<i64> = f.content.comments_by_ids(carol, &ids).unwrap().iter().map(|c| c.id).collect();
    assert_eq!(seen, vec![c2.id]);
    assert!(f.content.comments_by_ids(alice, &[]).unwrap().is_empty());
}

// -- Contention --

#[test]
fn concurrent_pairing_never_double_books_a_user() {
    let f = setup();
    let users: Vec<i64> = (0..6).map(|i| f.user(&format!("user{}", i))).collect();

    let handles: Vec<_> = (0..30)
        .map(|t| {
            let engine = f.engine.clone();
            let a = users[t % users.len()];
            let b = users[(t / users.len() + t + 1) % users.len()];
            thread::spawn(move || {
                for round in 0..20 {
                    let _ = engine.send_pair_request(a, b);
                    let _ = engine.accept_pair_request(b, a);
                    if (t + round) % 7 == 0 {
                        let _ = engine.unpair(a);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for &user in &users {
        let live: Vec<_> = f
            .engine
            .history(user)
            .unwrap()
            .into_iter()
            .filter(|rel| rel.status != RelationshipStatus::Inactive)
            .collect();
        assert!(live.len() <= 1, "user {} is in {} live relationships", user, live.len());

        if let Some(partner) = f.engine.partner_of(user).unwrap() {
            assert_eq!(f.engine.partner_of(partner).unwrap(), Some(user));
        }
    }
}

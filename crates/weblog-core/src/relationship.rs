use std::sync::Arc;

use tracing::{debug, info};

use weblog_db::Database;
use weblog_db::encode::now;
use weblog_db::queries::query_user_by_id;
use weblog_db::relationships;
use weblog_db::rusqlite::Connection;
use weblog_types::models::{Relationship, RelationshipStatus, User, UserRef};

use crate::error::{Error, Result};
use crate::events::{DomainEvent, EventSink};

/// The caller's current partner and the relationship that binds them.
#[derive(Debug, Clone)]
pub struct CoupleInfo {
    pub relationship: Relationship,
    pub partner: User,
}

/// Owns every write to the relationships table. Each mutation runs as one
/// IMMEDIATE transaction, so the existence, monogamy and duplicate checks
/// and the final write cannot interleave with another mutation. Events are
/// emitted after commit.
#[derive(Clone)]
pub struct RelationshipEngine {
    db: Arc<Database>,
    events: Arc<dyn EventSink>,
}

impl RelationshipEngine {
    pub fn new(db: Arc<Database>, events: Arc<dyn EventSink>) -> Self {
        Self { db, events }
    }

    // -- Transitions --

    pub fn send_pair_request(&self, from_id: i64, to_id: i64) -> Result<Relationship> {
        if from_id == to_id {
            return Err(Error::SelfPairing);
        }

        let (rel, from, to) = self.db.with_tx::<_, _, Error>(|tx| {
            let from = load_user(tx, from_id)?;
            let to = load_user(tx, to_id)?;

            for uid in [from_id, to_id] {
                if relationships::find_active_for(tx, uid)?.is_some() {
                    return Err(Error::AlreadyPaired(uid));
                }
            }
            for uid in [from_id, to_id] {
                if relationships::find_pending_for(tx, uid)?.is_some() {
                    return Err(Error::RequestAlreadyExists(uid));
                }
            }

            let now = now();
            let rel = match relationships::find_between(tx, from_id, to_id)? {
                Some(existing) => match existing.status {
                    RelationshipStatus::Active => return Err(Error::AlreadyPaired(from_id)),
                    RelationshipStatus::Pending => return Err(Error::RequestAlreadyExists(from_id)),
                    RelationshipStatus::Inactive => {
                        info!("Reactivating relationship {} for {} -> {}", existing.id, from_id, to_id);
                        relationships::reactivate(tx, existing.id, from_id, &now)?
                    }
                },
                None => relationships::insert_pending(tx, from_id, to_id, &now)?,
            };

            Ok((rel, UserRef::from(&from), UserRef::from(&to)))
        })?;

        info!("{} ({}) sent pair request to {} ({})", from.username, from.id, to.username, to.id);
        self.events.emit(DomainEvent::PairRequested { from, to });
        Ok(rel)
    }

    pub fn send_pair_request_by_username(&self, from_id: i64, username: &str) -> Result<Relationship> {
        let to_id = self.resolve_username(username)?;
        self.send_pair_request(from_id, to_id)
    }

    /// Accept the PENDING request that `requester_id` sent to `accepting_id`.
    pub fn accept_pair_request(&self, accepting_id: i64, requester_id: i64) -> Result<Relationship> {
        let (rel, accepter, requester) = self.db.with_tx::<_, _, Error>(|tx| {
            let (pending, accepter, requester) = load_incoming(tx, accepting_id, requester_id)?;

            for uid in [accepting_id, requester_id] {
                if relationships::find_active_for(tx, uid)?.is_some() {
                    return Err(Error::AlreadyPaired(uid));
                }
            }

            let rel = relationships::transition(
                tx,
                pending.id,
                RelationshipStatus::Pending,
                RelationshipStatus::Active,
                &now(),
            )?;
            Ok((rel, accepter, requester))
        })?;

        info!("{} ({}) accepted pair request from {} ({})", accepter.username, accepter.id, requester.username, requester.id);
        self.events.emit(DomainEvent::PairAccepted { accepter, requester });
        Ok(rel)
    }

    pub fn accept_pair_request_by_username(&self, accepting_id: i64, requester: &str) -> Result<Relationship> {
        let requester_id = self.resolve_username(requester)?;
        self.accept_pair_request(accepting_id, requester_id)
    }

    /// Reject the PENDING request that `requester_id` sent to `rejecting_id`.
    pub fn reject_pair_request(&self, rejecting_id: i64, requester_id: i64) -> Result<Relationship> {
        let (rel, rejecter, requester) = self.db.with_tx::<_, _, Error>(|tx| {
            let (pending, rejecter, requester) = load_incoming(tx, rejecting_id, requester_id)?;
            let rel = relationships::transition(
                tx,
                pending.id,
                RelationshipStatus::Pending,
                RelationshipStatus::Inactive,
                &now(),
            )?;
            Ok((rel, rejecter, requester))
        })?;

        info!("{} ({}) rejected pair request from {} ({})", rejecter.username, rejecter.id, requester.username, requester.id);
        self.events.emit(DomainEvent::PairRejected { rejecter, requester });
        Ok(rel)
    }

    pub fn reject_pair_request_by_username(&self, rejecting_id: i64, requester: &str) -> Result<Relationship> {
        let requester_id = self.resolve_username(requester)?;
        self.reject_pair_request(rejecting_id, requester_id)
    }

    /// End the caller's ACTIVE relationship. Both members are notified.
    pub fn unpair(&self, user_id: i64) -> Result<Relationship> {
        let (rel, initiator, partner) = self.db.with_tx::<_, _, Error>(|tx| {
            let active = relationships::find_active_for(tx, user_id)?
                .ok_or(Error::NoActiveRelationship)?;
            let partner_id = active
                .other(user_id)
                .ok_or(Error::NoActiveRelationship)?;

            let initiator = load_user(tx, user_id)?;
            let partner = load_user(tx, partner_id)?;

            let rel = relationships::transition(
                tx,
                active.id,
                RelationshipStatus::Active,
                RelationshipStatus::Inactive,
                &now(),
            )?;
            Ok((rel, UserRef::from(&initiator), UserRef::from(&partner)))
        })?;

        info!("Ended relationship {} between {} and {}", rel.id, initiator.id, partner.id);
        self.events.emit(DomainEvent::RelationshipEnded { initiator, partner });
        Ok(rel)
    }

    // -- Queries --

    /// The other member of the caller's ACTIVE relationship, if any.
    pub fn partner_of(&self, user_id: i64) -> Result<Option<i64>> {
        let active = self.db.with_conn(|conn| relationships::find_active_for(conn, user_id))?;
        Ok(active.and_then(|rel| rel.other(user_id)))
    }

    pub fn couple_info(&self, user_id: i64) -> Result<Option<CoupleInfo>> {
        let info = self.db.with_conn(|conn| {
            let Some(relationship) = relationships::find_active_for(conn, user_id)? else {
                return Ok(None);
            };
            let Some(partner_id) = relationship.other(user_id) else {
                return Ok(None);
            };
            let partner = match query_user_by_id(conn, partner_id)? {
                Some(row) => row.into_user()?,
                None => return Ok(None),
            };
            Ok(Some(CoupleInfo { relationship, partner }))
        })?;
        Ok(info)
    }

    /// The sole authorization primitive: a viewer may see an owner's content
    /// if they are the owner or the owner's active partner.
    pub fn can_access_content(&self, viewer_id: i64, owner_id: i64) -> Result<bool> {
        if viewer_id == owner_id {
            return Ok(true);
        }
        let allowed = self
            .db
            .with_conn(|conn| relationships::active_between(conn, viewer_id, owner_id))?;
        if !allowed {
            debug!("Access denied: {} -> content of {}", viewer_id, owner_id);
        }
        Ok(allowed)
    }

    pub fn history(&self, user_id: i64) -> Result<Vec<Relationship>> {
        Ok(self.db.with_conn(|conn| relationships::list_for_user(conn, user_id))?)
    }

    pub fn pending_incoming(&self, user_id: i64) -> Result<Vec<Relationship>> {
        Ok(self.db.with_conn(|conn| relationships::list_pending_incoming(conn, user_id))?)
    }

    pub fn pending_outgoing(&self, user_id: i64) -> Result<Vec<Relationship>> {
        Ok(self.db.with_conn(|conn| relationships::list_pending_outgoing(conn, user_id))?)
    }

    fn resolve_username(&self, username: &str) -> Result<i64> {
        self.db
            .get_user_by_username(username)?
            .map(|row| row.id)
            .ok_or_else(|| Error::UserNotFound(username.to_string()))
    }
}

pub(crate) fn load_user(conn: &Connection, id: i64) -> Result<User> {
    let row = query_user_by_id(conn, id)?.ok_or_else(|| Error::UserNotFound(id.to_string()))?;
    Ok(row.into_user()?)
}

/// Find the PENDING row where `requester_id` asked `target_id`. A request in
/// the opposite direction does not count.
fn load_incoming(conn: &Connection, target_id: i64, requester_id: i64) -> Result<(Relationship, UserRef, UserRef)> {
    let target = load_user(conn, target_id)?;
    let requester = load_user(conn, requester_id)?;

    let pending = relationships::find_between(conn, target_id, requester_id)?
        .filter(|rel| rel.status == RelationshipStatus::Pending && rel.requester == requester_id)
        .ok_or(Error::NoPendingRequest)?;

    Ok((pending, UserRef::from(&target), UserRef::from(&requester)))
}

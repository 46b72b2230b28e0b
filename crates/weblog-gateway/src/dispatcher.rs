use tracing::{debug, warn};

use weblog_types::events::NotificationEvent;

use crate::presence::PresenceRegistry;

/// What happened to one notification. Informational only; a notification
/// that could not be delivered is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Offline,
    Dropped,
}

/// Pushes notifications to whoever is online. No retry, no queue.
#[derive(Clone)]
pub struct NotificationDispatcher {
    presence: PresenceRegistry,
}

impl NotificationDispatcher {
    pub fn new(presence: PresenceRegistry) -> Self {
        Self { presence }
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    pub async fn dispatch(&self, event: NotificationEvent) -> DeliveryOutcome {
        let to = event.to_user_id;
        let kind = event.kind;

        let Some(channel) = self.presence.resolve(to).await else {
            debug!("User {} offline, dropping {:?}", to, kind);
            return DeliveryOutcome::Offline;
        };

        match channel.send(event) {
            Ok(()) => {
                debug!("Delivered {:?} to user {}", kind, to);
                DeliveryOutcome::Delivered
            }
            Err(_) => {
                warn!("Stale channel for user {}, dropping {:?}", to, kind);
                self.presence.unregister_connection(to, channel.conn_id()).await;
                DeliveryOutcome::Dropped
            }
        }
    }

    pub async fn dispatch_all(&self, events: Vec<NotificationEvent>) -> Vec<DeliveryOutcome> {
        let mut outcomes = Vec::with_capacity(events.len());
        for event in events {
            outcomes.push(self.dispatch(event).await);
        }
        outcomes
    }
}

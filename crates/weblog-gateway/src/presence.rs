use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

use weblog_types::events::NotificationEvent;

/// Send half of one live notification connection. The receiving half is
/// owned by the connection task; dropping this closes that task's feed.
#[derive(Debug, Clone)]
pub struct NotificationChannel {
    conn_id: Uuid,
    tx: mpsc::UnboundedSender<NotificationEvent>,
}

impl NotificationChannel {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NotificationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                conn_id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    pub fn conn_id(&self) -> Uuid {
        self.conn_id
    }

    /// Hands the event back if the receiving side is gone.
    pub fn send(&self, event: NotificationEvent) -> Result<(), NotificationEvent> {
        self.tx.send(event).map_err(|e| e.0)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Who is online right now: user id -> their one live channel.
///
/// Last connection wins. A second connection for the same user replaces the
/// first, whose feed then ends.
#[derive(Clone, Default)]
pub struct PresenceRegistry {
    channels: Arc<RwLock<HashMap<i64, NotificationChannel>>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, user_id: i64, channel: NotificationChannel) {
        let replaced = self.channels.write().await.insert(user_id, channel);
        if let Some(old) = replaced {
            debug!("User {} reconnected, replacing connection {}", user_id, old.conn_id);
        }
    }

    /// Build a fresh channel for `user_id` and register it. Returns the
    /// connection id and the receiving half.
    pub async fn connect(&self, user_id: i64) -> (Uuid, mpsc::UnboundedReceiver<NotificationEvent>) {
        let (channel, rx) = NotificationChannel::new();
        let conn_id = channel.conn_id;
        self.register(user_id, channel).await;
        (conn_id, rx)
    }

    pub async fn unregister(&self, user_id: i64) {
        self.channels.write().await.remove(&user_id);
    }

    /// Remove the entry only if it still belongs to `conn_id`. A newer
    /// connection that has taken over is left alone.
    pub async fn unregister_connection(&self, user_id: i64, conn_id: Uuid) -> bool {
        let mut channels = self.channels.write().await;
        match channels.get(&user_id) {
            Some(current) if current.conn_id == conn_id => {
                channels.remove(&user_id);
                true
            }
            _ => false,
        }
    }

    pub async fn is_online(&self, user_id: i64) -> bool {
        self.channels
            .read()
            .await
            .get(&user_id)
            .is_some_and(|ch| !ch.is_closed())
    }

    /// Users whose feed is still open. Entries left behind by a dropped
    /// receiver are not counted.
    pub async fn online_count(&self) -> usize {
        self.channels
            .read()
            .await
            .values()
            .filter(|ch| !ch.is_closed())
            .count()
    }

    pub async fn resolve(&self, user_id: i64) -> Option<NotificationChannel> {
        self.channels.read().await.get(&user_id).cloned()
    }

    /// Drop every entry. Open connections see their feed end.
    pub async fn clear(&self) {
        let mut channels = self.channels.write().await;
        let count = channels.len();
        channels.clear();
        debug!("Presence cleared ({} entries)", count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_marks_user_online() {
        let presence = PresenceRegistry::new();
        let (_conn, _rx) = presence.connect(1).await;

        assert!(presence.is_online(1).await);
        assert!(!presence.is_online(2).await);
        assert_eq!(presence.online_count().await, 1);
    }

    #[tokio::test]
    async fn dropped_receiver_reads_as_offline() {
        let presence = PresenceRegistry::new();
        let (_conn, rx) = presence.connect(1).await;
        let (_other, _other_rx) = presence.connect(2).await;
        drop(rx);
        assert!(!presence.is_online(1).await);
        assert_eq!(presence.online_count().await, 1);
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let presence = PresenceRegistry::new();
        let (_conn, _rx) = presence.connect(1).await;

        presence.unregister(1).await;
        presence.unregister(1).await;
        presence.unregister(42).await;
        assert!(!presence.is_online(1).await);
        assert_eq!(presence.online_count().await, 0);
    }

    #[tokio::test]
    async fn last_connection_wins() {
        let presence = PresenceRegistry::new();
        let (first, mut first_rx) = presence.connect(1).await;
        let (second, _second_rx) = presence.connect(1).await;
        assert_ne!(first, second);
        assert_eq!(presence.online_count().await, 1);

        // the replaced channel's sender was dropped
        assert!(first_rx.recv().await.is_none());

        // the stale connection closing does not evict its replacement
        assert!(!presence.unregister_connection(1, first).await);
        assert!(presence.is_online(1).await);

        assert!(presence.unregister_connection(1, second).await);
        assert!(!presence.is_online(1).await);
    }

    #[tokio::test]
    async fn clear_drops_everyone() {
        let presence = PresenceRegistry::new();
        let (_a, mut rx_a) = presence.connect(1).await;
        let (_b, _rx_b) = presence.connect(2).await;

        presence.clear().await;
        assert_eq!(presence.online_count().await, 0);
        assert!(rx_a.recv().await.is_none());
    }
}

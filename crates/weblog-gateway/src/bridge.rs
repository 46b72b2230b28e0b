use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use weblog_core::{DomainEvent, EventSink};

use crate::compose::compose;
use crate::dispatcher::NotificationDispatcher;

/// [`EventSink`] that queues domain events for a background task, which
/// composes and dispatches them. Emitting never waits on delivery.
#[derive(Clone)]
pub struct NotificationBridge {
    tx: mpsc::UnboundedSender<DomainEvent>,
}

impl NotificationBridge {
    /// Start the drain task. It ends once every bridge handle is dropped.
    pub fn spawn(dispatcher: NotificationDispatcher) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<DomainEvent>();

        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let notifications = compose(event, Utc::now().naive_utc());
                let outcomes = dispatcher.dispatch_all(notifications).await;
                debug!("Dispatched notifications: {:?}", outcomes);
            }
            debug!("Notification bridge stopped");
        });

        (Self { tx }, handle)
    }
}

impl EventSink for NotificationBridge {
    fn emit(&self, event: DomainEvent) {
        if self.tx.send(event).is_err() {
            warn!("Notification bridge is closed, event dropped");
        }
    }
}

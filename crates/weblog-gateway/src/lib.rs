//! Real-time notification delivery: who is online, how a domain event
//! becomes a notification, and the WebSocket connection that carries it.

pub mod bridge;
pub mod compose;
pub mod connection;
pub mod dispatcher;
pub mod endpoints;
pub mod presence;

pub use bridge::NotificationBridge;
pub use dispatcher::{DeliveryOutcome, NotificationDispatcher};
pub use endpoints::routes;
pub use presence::{NotificationChannel, PresenceRegistry};

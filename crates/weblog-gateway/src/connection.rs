use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::{debug, info, warn};

use weblog_types::api::Claims;

use crate::presence::PresenceRegistry;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const MAX_MISSED_PONGS: u8 = 2;

/// Pick the token for the upgrade request: `?token=` first, then a bearer
/// header. Blank values count as absent.
pub fn extract_token<'a>(query_token: Option<&'a str>, bearer: Option<&'a str>) -> Option<&'a str> {
    query_token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .or_else(|| bearer.map(str::trim).filter(|t| !t.is_empty()))
}

/// Verify a token and return `(user_id, username)`.
pub fn resolve_identity(token: &str, jwt_secret: &str) -> Option<(i64, String)> {
    match decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    ) {
        Ok(data) => Some((data.claims.sub, data.claims.username)),
        Err(e) => {
            debug!("Rejected notification token: {}", e);
            None
        }
    }
}

/// Serve one authenticated notification connection until either side goes
/// away. The JWT was already validated at the HTTP upgrade.
pub async fn handle_connection(socket: WebSocket, presence: PresenceRegistry, user_id: i64, username: String) {
    let (mut sender, mut receiver) = socket.split();
    let (conn_id, mut feed) = presence.connect(user_id).await;
    info!("{} ({}) connected for notifications ({})", username, user_id, conn_id);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward notifications -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                next = feed.recv() => {
                    // None: this connection was replaced or presence was cleared
                    let Some(event) = next else { break };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to serialize notification: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= MAX_MISSED_PONGS {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = sender.send(Message::Close(None)).await;
    });

    let username_recv = username.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    debug!(
                        "{} ({}) sent text on notification channel, ignoring: {}",
                        username_recv,
                        user_id,
                        text.chars().take(200).collect::<String>()
                    );
                }
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    presence.unregister_connection(user_id, conn_id).await;
    info!("{} ({}) disconnected from notifications", username, user_id);
}

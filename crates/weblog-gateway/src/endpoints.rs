//! HTTP side of the gateway: the notification upgrade and a health check.

use axum::{
    Json, Router,
    extract::{
        Query, State, WebSocketUpgrade,
        ws::rejection::WebSocketUpgradeRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::connection::{self, extract_token, resolve_identity};
use crate::presence::PresenceRegistry;

#[derive(Clone)]
struct GatewayState {
    presence: PresenceRegistry,
    jwt_secret: String,
}

#[derive(Debug, Deserialize)]
struct WsParams {
    token: Option<String>,
}

/// `/ws/notifications` and `/health`.
pub fn routes(presence: PresenceRegistry, jwt_secret: String) -> Router {
    Router::new()
        .route("/ws/notifications", get(ws_upgrade))
        .route("/health", get(health))
        .with_state(GatewayState { presence, jwt_secret })
}

/// Authenticate at the HTTP upgrade: `?token=` or a bearer header, 401
/// otherwise. The token is checked before the upgrade itself, so a bad
/// token never reaches presence.
async fn ws_upgrade(
    State(state): State<GatewayState>,
    Query(params): Query<WsParams>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let header_token = bearer.as_ref().map(|TypedHeader(auth)| auth.token());
    let identity = extract_token(params.token.as_deref(), header_token)
        .and_then(|token| resolve_identity(token, &state.jwt_secret));

    let Some((user_id, username)) = identity else {
        warn!("Rejected notification upgrade: missing or invalid token");
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "missing or invalid token" }))).into_response();
    };

    match ws {
        Ok(ws) => ws.on_upgrade(move |socket| connection::handle_connection(socket, state.presence, user_id, username)),
        Err(rejection) => {
            warn!("{} ({}) sent a malformed upgrade: {}", username, user_id, rejection);
            rejection.into_response()
        }
    }
}

async fn health(State(state): State<GatewayState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "onlineUsers": state.presence.online_count().await,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use http_body_util::BodyExt;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::Value;
    use tower::ServiceExt;
    use weblog_types::api::Claims;

    const SECRET: &str = "gateway-secret";

    fn valid_token() -> String {
        let claims = Claims {
            sub: 7,
            username: "alice".into(),
            exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    fn upgrade_request(uri: &str, bearer: Option<&str>) -> Request<Body> {
        let mut req = Request::builder()
            .uri(uri)
            .header(header::CONNECTION, "upgrade")
            .header(header::UPGRADE, "websocket")
            .header(header::SEC_WEBSOCKET_VERSION, "13")
            .header(header::SEC_WEBSOCKET_KEY, "dGhlIHNhbXBsZSBub25jZQ==");
        if let Some(token) = bearer {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        req.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn upgrade_without_valid_token_is_unauthorized() {
        let presence = PresenceRegistry::new();
        let app = routes(presence.clone(), SECRET.into());

        let forged = {
            let claims = Claims {
                sub: 7,
                username: "alice".into(),
                exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
            };
            encode(&Header::default(), &claims, &EncodingKey::from_secret(b"other-secret")).unwrap()
        };
        let cases = [
            upgrade_request("/ws/notifications", None),
            upgrade_request("/ws/notifications?token=", None),
            upgrade_request("/ws/notifications?token=garbage", None),
            upgrade_request("/ws/notifications", Some("garbage")),
            upgrade_request(&format!("/ws/notifications?token={}", forged), None),
        ];

        for req in cases {
            let uri = req.uri().to_string();
            let resp = app.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{}", uri);
            let bytes = resp.into_body().collect().await.unwrap().to_bytes();
            let body: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(body["error"], "missing or invalid token");
        }
        assert_eq!(presence.online_count().await, 0);
        assert!(!presence.is_online(7).await);
    }

    #[tokio::test]
    async fn valid_token_passes_the_auth_check() {
        let presence = PresenceRegistry::new();
        let app = routes(presence.clone(), SECRET.into());

        // A plain request carries no upgradable connection, so the upgrade
        // itself is refused, just not with 401.
        let plain = Request::builder()
            .uri(format!("/ws/notifications?token={}", valid_token()))
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(plain).await.unwrap();
        assert_ne!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.status().is_client_error());

        let resp = app
            .oneshot(upgrade_request("/ws/notifications", Some(&valid_token())))
            .await
            .unwrap();
        assert_ne!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn health_reports_open_feeds() {
        let presence = PresenceRegistry::new();
        let app = routes(presence.clone(), SECRET.into());
        let (_conn, _rx) = presence.connect(1).await;
        let (_stale, stale_rx) = presence.connect(2).await;
        drop(stale_rx);

        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["onlineUsers"], 1);
    }
}

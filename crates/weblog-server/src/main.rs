mod config;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use weblog_api::auth::{AppState, AppStateInner};
use weblog_core::{ContentService, EventSink, RelationshipEngine};
use weblog_db::Database;
use weblog_gateway::{NotificationBridge, NotificationDispatcher, PresenceRegistry};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weblog=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);

    // Real-time side: presence, dispatcher, and the bridge services emit into
    let presence = PresenceRegistry::new();
    let dispatcher = NotificationDispatcher::new(presence.clone());
    let (bridge, bridge_task) = NotificationBridge::spawn(dispatcher);
    let events: Arc<dyn EventSink> = Arc::new(bridge);

    let relationships = RelationshipEngine::new(db.clone(), events.clone());
    let content = ContentService::new(db.clone(), relationships.clone(), events);

    let app_state: AppState = Arc::new(AppStateInner {
        db,
        relationships,
        content,
        jwt_secret: config.jwt_secret.clone(),
        jwt_ttl_hours: config.jwt_ttl_hours,
    });

    // Routes
    let app = Router::new()
        .merge(weblog_api::routes(app_state.clone()))
        .merge(weblog_gateway::routes(presence.clone(), config.jwt_secret.clone()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = config.addr()?;
    info!("Weblog server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Closing every feed ends the open connection tasks; dropping the last
    // sink handle lets the bridge drain and stop.
    presence.clear().await;
    drop(app_state);
    if tokio::time::timeout(std::time::Duration::from_secs(5), bridge_task).await.is_err() {
        warn!("Notification bridge did not stop in time");
    }
    info!("Weblog server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

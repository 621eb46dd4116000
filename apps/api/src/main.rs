use axum::{
    http::{header, Method},
    routing::get,
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commons_api::config::Config;
use commons_api::repositories::{CommunityRepository, MessageRepository, UserRepository};
use commons_api::routes::{
    health_router, messages_router, push_router, HealthState, MessagesState, PushState,
};
use commons_api::services::{DeliveryService, LocalMediaStore, LogNotifier};
use commons_api::websocket::{self, ConnectionRegistry, RoomManager};

/// How often stale connections are swept
const STALE_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Build the CORS layer based on configuration.
///
/// In production mode:
/// - If `CORS_ORIGINS` is set, only those origins are allowed
/// - If `CORS_ORIGINS` is not set, CORS requests are rejected (no origins allowed)
///
/// In development mode:
/// - If `CORS_ORIGINS` is set, those origins are used
/// - If `CORS_ORIGINS` is not set, permissive CORS is used for convenience
fn build_cors_layer(config: &Config) -> CorsLayer {
    let is_production = config.is_production();

    match &config.cors_allowed_origins {
        Some(origins) if !origins.is_empty() => {
            let allowed_origins: Vec<_> = origins
                .iter()
                .filter_map(|origin| {
                    origin.parse().ok().or_else(|| {
                        tracing::warn!("Invalid CORS origin '{}', skipping", origin);
                        None
                    })
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::error!("No valid CORS origins configured, CORS requests will be rejected");
                CorsLayer::new()
            } else {
                tracing::info!(
                    "CORS configured with {} allowed origin(s): {:?}",
                    allowed_origins.len(),
                    origins
                );
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([
                        Method::GET,
                        Method::POST,
                        Method::PUT,
                        Method::PATCH,
                        Method::DELETE,
                        Method::OPTIONS,
                    ])
                    .allow_headers([
                        header::AUTHORIZATION,
                        header::CONTENT_TYPE,
                        header::ACCEPT,
                        header::ORIGIN,
                        header::HeaderName::from_static("x-user-id"),
                    ])
                    .allow_credentials(true)
                    .max_age(Duration::from_secs(3600))
            }
        }
        _ if is_production => {
            tracing::warn!(
                "CORS_ORIGINS not configured in production mode. \
                 CORS requests will be rejected. Set CORS_ORIGINS to allow cross-origin requests."
            );
            CorsLayer::new()
        }
        _ => {
            tracing::warn!(
                "Using permissive CORS in development mode. \
                 Set CORS_ORIGINS for production-like behavior."
            );
            CorsLayer::permissive()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "commons_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    tracing::info!("Starting Commons API server on port {}", config.port);

    // Initialize database pool
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database().max_connections)
        .acquire_timeout(Duration::from_secs(config.database().connect_timeout_secs))
        .connect(&config.database().url)
        .await?;
    tracing::info!("Database connection established");

    // Persistence boundaries
    let message_repo = MessageRepository::new(pool.clone());
    let community_repo = CommunityRepository::new(pool.clone());
    let user_repo = UserRepository::new(pool.clone());

    // Process-local live state: rebuilt from scratch on restart, when all
    // clients reconnect and re-join
    let registry = ConnectionRegistry::new();
    let rooms = RoomManager::new();

    // The delivery engine shared by the event channel and the HTTP fallback
    let delivery = DeliveryService::new(
        Arc::new(message_repo),
        Arc::new(community_repo),
        Arc::new(LogNotifier),
        registry.clone(),
        rooms.clone(),
        Duration::from_millis(config.persist_timeout_ms),
    );
    tracing::info!("DeliveryService initialized");

    let media_store = Arc::new(LocalMediaStore::new(config.common.media_dir.clone()));

    let health_state = HealthState::new(pool.clone());
    let messages_state = MessagesState::new(delivery.clone(), media_store);
    let push_state = PushState::new(user_repo);

    // Sweep connections that missed their heartbeats; they get the same
    // cleanup as an explicit close
    let sweep_registry = registry.clone();
    let sweep_rooms = rooms.clone();
    let idle_ms = (config.ws_idle_timeout_secs * 1000) as i64;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STALE_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            for connection_id in sweep_registry.sweep_stale(idle_ms) {
                sweep_rooms.leave_all(connection_id);
            }
        }
    });

    // Build the CORS layer from configuration
    let cors_layer = build_cors_layer(&config);

    // Build the router
    let app = Router::new()
        .route("/", get(root))
        // Event channel: /ws?user_id=<uuid>
        .route("/ws", get(websocket::ws_handler))
        // Nested health routes: /health, /health/live, /health/ready
        .nest("/health", health_router(health_state))
        // Message fallback path: /conversations/:id/messages
        .nest("/conversations", messages_router(messages_state))
        // Push-token registration: /push-tokens
        .nest("/push-tokens", push_router(push_state))
        // Shared live state for the event-channel handler
        .layer(axum::Extension(registry))
        .layer(axum::Extension(rooms))
        .layer(axum::Extension(delivery))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn root() -> &'static str {
    "Commons - community messaging API"
}

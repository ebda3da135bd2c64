mod config;

use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use hearth_api::auth::{AppState, AppStateInner, decode_token};
use hearth_api::error::ApiError;
use hearth_api::storage::Storage;
use hearth_gateway::connection;
use hearth_gateway::dispatcher::Dispatcher;
use hearth_workflow::Workflows;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hearth=debug,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;

    let db = hearth_db::Database::open(&config.db_path)?;
    let dispatcher = Dispatcher::with_capacity(config.feed_capacity);
    let workflows = Workflows::new(Arc::new(db), dispatcher);
    let storage = Storage::new(config.storage_dir.clone()).await?;

    let app_state: AppState = Arc::new(AppStateInner {
        workflows,
        jwt_secret: config.jwt_secret.clone(),
        storage,
        public_url: config.public_url.clone(),
        max_artifact_bytes: config.max_artifact_bytes,
    });

    let gateway = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(GatewayState {
            app: app_state.clone(),
            outbox_capacity: config.gateway_outbox_capacity,
        });

    let app = hearth_api::router(app_state)
        .merge(gateway)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        );

    let addr = config.addr()?;
    info!("Hearth server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[derive(Clone)]
struct GatewayState {
    app: AppState,
    outbox_capacity: usize,
}

#[derive(Debug, Deserialize)]
struct GatewayQuery {
    token: String,
}

/// GET /gateway?token=<jwt>. Browsers cannot set headers on a WebSocket
/// handshake, so the token rides in the query string and is checked before
/// the upgrade.
async fn ws_upgrade(
    State(state): State<GatewayState>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let claims = decode_token(&state.app.jwt_secret, &query.token).map_err(|e| {
        debug!("Gateway handshake rejected: {}", e);
        ApiError::unauthorized()
    })?;

    let dispatcher = state.app.workflows.dispatcher().clone();
    Ok(ws.on_upgrade(move |socket| {
        connection::handle_connection(
            socket,
            dispatcher,
            claims.sub,
            claims.display_name,
            state.outbox_capacity,
        )
    }))
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable ({}), waiting for Ctrl+C", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}

mod auth;
mod handlers;
mod location_hub;
mod persistence;
mod state;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::routing::get;
use axum::Router;
use serde_json::json;
use socketioxide::SocketIo;
use tokio::sync::{mpsc, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use auth::AuthEngine;
use handlers::{on_connect, SharedState};
use location_hub::{start_location_hub, AlertEvent, HubConfig};
use persistence::load_state;
use state::{new_alert, ALERT_SNAPSHOT_LIMIT};

// ─── Time Sync Endpoint ───────────────────────────────────────────────────────

async fn time_sync() -> axum::Json<serde_json::Value> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    axum::Json(json!({ "serverTime": now }))
}

// ─── Alert Event Task ─────────────────────────────────────────────────────────

/// Consume alert-worthy transitions from the location hub: persist a stored
/// alert and broadcast the refreshed feed.
async fn run_alert_task(
    mut rx: mpsc::Receiver<AlertEvent>,
    shared: SharedState,
    io: SocketIo,
) {
    while let Some(event) = rx.recv().await {
        let snap = {
            let mut state = shared.write().await;
            let alert = state.push_alert(new_alert(&event.bus_id, event.alert_type, &event.message));
            info!("Alert from hub: {:?} for {} ({})", event.alert_type, event.bus_id, alert.id);
            state.alerts_snapshot(ALERT_SNAPSHOT_LIMIT)
        };
        let _ = io.emit("alerts-snapshot", &snap);

        let state = shared.read().await;
        if let Err(e) = persistence::save_state(&state).await {
            tracing::warn!("Failed to persist fleet state: {e}");
        }
    }
}

// ─── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleet_backend=info,socketioxide=warn".into()),
        )
        .init();

    info!("🚌 Fleet Monitoring Backend starting...");

    // Load persisted state (seeds the sample fleet on first start)
    let fleet_state = load_state().await;
    let shared: SharedState = Arc::new(RwLock::new(fleet_state));
    let auth = AuthEngine::new();

    // Build Socket.IO layer
    let (socket_layer, io) = SocketIo::builder().build_layer();

    let shared_sock = shared.clone();
    let auth_sock = auth.clone();
    io.ns("/", move |socket: socketioxide::extract::SocketRef| {
        let shared = shared_sock.clone();
        let auth = auth_sock.clone();
        async move {
            on_connect(socket, shared, auth).await;
        }
    });

    // Location hub (UDP telemetry in) + alert event task
    let (alert_tx, alert_rx) = mpsc::channel::<AlertEvent>(64);
    tokio::spawn(start_location_hub(
        HubConfig::default(),
        shared.clone(),
        io.clone(),
        alert_tx,
    ));
    tokio::spawn(run_alert_task(alert_rx, shared.clone(), io.clone()));

    // CORS — allow all origins (keeps parity with the dashboard dev server)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build Axum router
    let app = Router::new()
        .route("/sync", get(time_sync))
        .route("/health", get(|| async { "fleet-backend ok" }))
        .layer(socket_layer)
        .layer(cors);

    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");
    info!("🚀 Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

use std::sync::Arc;

use fleet_types::{AlertType, LiveLocation};
use serde_json::{json, Value};
use socketioxide::extract::{Data, SocketRef};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::auth::{AuthEngine, Role};
use crate::persistence::save_state;
use crate::state::{new_alert, seed_fleet, FleetState, ALERT_SNAPSHOT_LIMIT};

// ─── Shared State Types ───────────────────────────────────────────────────────

pub type SharedState = Arc<RwLock<FleetState>>;

// ─── Snapshot helpers ─────────────────────────────────────────────────────────

/// Send the full collection snapshots to one socket. Clients replace their
/// local collections wholesale on every snapshot.
async fn emit_snapshots(s: &SocketRef, shared: &SharedState) {
    let state = shared.read().await;
    let _ = s.emit("buses-snapshot", &state.buses);
    let _ = s.emit("routes-snapshot", &state.routes);
    let _ = s.emit("locations-snapshot", &state.live_locations);
    let _ = s.emit("alerts-snapshot", &state.alerts_snapshot(ALERT_SNAPSHOT_LIMIT));
}

/// Broadcast the alert feed to everyone (sender included) after a mutation.
async fn broadcast_alerts(s: &SocketRef, shared: &SharedState) {
    let snap = shared.read().await.alerts_snapshot(ALERT_SNAPSHOT_LIMIT);
    let _ = s.broadcast().emit("alerts-snapshot", &snap);
    let _ = s.emit("alerts-snapshot", &snap);
}

async fn persist(shared: &SharedState) {
    let state = shared.read().await;
    if let Err(e) = save_state(&state).await {
        warn!("Failed to persist fleet state: {e}");
    }
}

// ─── Main Connection Handler ──────────────────────────────────────────────────

pub async fn on_connect(socket: SocketRef, shared: SharedState, auth: Arc<AuthEngine>) {
    let socket_id = socket.id.to_string();
    info!("Client connected: {socket_id}");

    // Cleanup on disconnect
    socket.on_disconnect({
        let auth = auth.clone();
        let sid = socket_id.clone();
        move |_: SocketRef| async move {
            auth.remove_role(&sid).await;
            info!("Client disconnected, role cleaned: {sid}");
        }
    });

    // ── register ──────────────────────────────────────────────────────────────
    {
        let socket = socket.clone();
        let shared = shared.clone();
        let auth = auth.clone();
        socket.on("register", move |s: SocketRef, Data::<Value>(data)| {
            let shared = shared.clone();
            let auth = auth.clone();
            async move {
                let token = data["token"].as_str().unwrap_or("unknown");
                let role = match Role::from_token(token) {
                    Some(r) => r,
                    None => {
                        warn!("Client {}: rejected, unknown registration token", s.id);
                        let _ = s.disconnect();
                        return;
                    }
                };

                auth.set_role(&s.id.to_string(), role).await;
                info!("Client {}: registered as {}", s.id, role.as_str());
                let _ = s.join(role.as_str().to_string());

                {
                    let state = shared.read().await;
                    let _ = s.emit("init-state", &*state);
                }
                emit_snapshots(&s, &shared).await;
            }
        });
    }

    // ── latency-ping ──────────────────────────────────────────────────────────
    {
        let socket = socket.clone();
        socket.on("latency-ping", move |s: SocketRef, Data::<Value>(data)| async move {
            let _ = s.emit("latency-pong", &data);
        });
    }

    // ── location-update ───────────────────────────────────────────────────────
    // Merge-write: fields present in the payload overwrite, the rest of an
    // existing record is untouched. A full record is required for a bus that
    // has no location yet.
    {
        let socket = socket.clone();
        let shared = shared.clone();
        socket.on("location-update", move |s: SocketRef, Data::<Value>(data)| {
            let shared = shared.clone();
            async move {
                let bus_id = match data["busId"].as_str() {
                    Some(id) => id.to_string(),
                    None => return,
                };

                let snapshot = {
                    let mut state = shared.write().await;
                    let merged = match state.live_locations.get(&bus_id) {
                        Some(existing) => {
                            let mut base = serde_json::to_value(existing).unwrap_or_default();
                            if let (Some(obj), Some(patch)) = (base.as_object_mut(), data.as_object()) {
                                for (k, v) in patch {
                                    obj.insert(k.clone(), v.clone());
                                }
                            }
                            serde_json::from_value::<LiveLocation>(base)
                        }
                        None => serde_json::from_value::<LiveLocation>(data.clone()),
                    };
                    match merged {
                        Ok(loc) => state.merge_location(loc),
                        Err(e) => {
                            warn!("location-update for {bus_id} rejected: {e}");
                            return;
                        }
                    }
                    state.live_locations.clone()
                };

                let _ = s.broadcast().emit("locations-snapshot", &snapshot);
                let _ = s.emit("locations-snapshot", &snapshot);
            }
        });
    }

    // ── create-alert ──────────────────────────────────────────────────────────
    {
        let socket = socket.clone();
        let shared = shared.clone();
        socket.on("create-alert", move |s: SocketRef, Data::<Value>(data)| {
            let shared = shared.clone();
            async move {
                let bus_id = match data["busId"].as_str() {
                    Some(id) => id.to_string(),
                    None => return,
                };
                let alert_type = match serde_json::from_value::<AlertType>(data["type"].clone()) {
                    Ok(t) => t,
                    Err(e) => {
                        warn!("create-alert rejected: bad type: {e}");
                        return;
                    }
                };
                let message = data["message"].as_str().unwrap_or("").to_string();

                let id = {
                    let mut state = shared.write().await;
                    let alert = state.push_alert(new_alert(&bus_id, alert_type, &message));
                    info!("Alert created: {} {:?} for {}", alert.id, alert_type, bus_id);
                    alert.id.clone()
                };

                let _ = s.emit("alert-created", &json!({ "id": id }));
                broadcast_alerts(&s, &shared).await;
                persist(&shared).await;
            }
        });
    }

    // ── resolve-alert ─────────────────────────────────────────────────────────
    {
        let socket = socket.clone();
        let shared = shared.clone();
        let auth = auth.clone();
        socket.on("resolve-alert", move |s: SocketRef, Data::<Value>(data)| {
            let shared = shared.clone();
            let auth = auth.clone();
            async move {
                if auth.get_role(&s.id.to_string()).await != Some(Role::Admin) {
                    warn!("Unauthorized resolve-alert attempt by: {}", s.id);
                    return;
                }
                let alert_id = match data["alertId"].as_str() {
                    Some(id) => id.to_string(),
                    None => return,
                };

                let resolved = shared.write().await.resolve_alert(&alert_id);
                if !resolved {
                    let _ = s.emit("operation-error", &json!({
                        "op": "resolve-alert",
                        "message": format!("alert {alert_id} not found or already resolved"),
                    }));
                    return;
                }

                broadcast_alerts(&s, &shared).await;
                persist(&shared).await;
            }
        });
    }

    // ── get-driver ────────────────────────────────────────────────────────────
    {
        let socket = socket.clone();
        let shared = shared.clone();
        socket.on("get-driver", move |s: SocketRef, Data::<Value>(data)| {
            let shared = shared.clone();
            async move {
                let driver_id = match data["driverId"].as_str() {
                    Some(id) => id.to_string(),
                    None => return,
                };
                let state = shared.read().await;
                match state.drivers.get(&driver_id) {
                    Some(driver) => {
                        let _ = s.emit("driver-info", driver);
                    }
                    None => {
                        let _ = s.emit("operation-error", &json!({
                            "op": "get-driver",
                            "message": format!("driver {driver_id} not found"),
                        }));
                    }
                }
            }
        });
    }

    // ── seed-data ─────────────────────────────────────────────────────────────
    {
        let socket = socket.clone();
        let shared = shared.clone();
        let auth = auth.clone();
        socket.on("seed-data", move |s: SocketRef, Data::<Value>(_)| {
            let shared = shared.clone();
            let auth = auth.clone();
            async move {
                if auth.get_role(&s.id.to_string()).await != Some(Role::Admin) {
                    warn!("Unauthorized seed-data attempt by: {}", s.id);
                    return;
                }

                {
                    let mut state = shared.write().await;
                    seed_fleet(&mut state);
                    info!("🌱 Fleet re-seeded by {}", s.id);
                }

                emit_snapshots(&s, &shared).await;
                let state = shared.read().await;
                let _ = s.broadcast().emit("buses-snapshot", &state.buses);
                let _ = s.broadcast().emit("routes-snapshot", &state.routes);
                drop(state);
                persist(&shared).await;
            }
        });
    }
}

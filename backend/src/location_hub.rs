//! # location_hub
//!
//! Receives telemetry datagrams from simulated buses via UDP, validates them,
//! and merges the resulting live locations into the shared fleet state.
//!
//! ## Architecture
//! Runs as a separate Tokio task (tokio::spawn) alongside the Socket.IO
//! handler. It:
//!   1. Binds a UDP socket on port 5555 (configurable via FLEET_UDP_PORT env)
//!   2. Receives `TelemetryEnvelope` JSON datagrams
//!   3. Validates sequence numbers (stale/duplicate rejection)
//!   4. Merges locations into the `liveLocations` collection
//!   5. Broadcasts a full `locations-snapshot` via Socket.IO
//!
//! Overspeed and emergency transitions are forwarded on an mpsc channel so
//! the socket layer can persist a stored alert and broadcast the alert feed.
//! UDP errors never crash the server.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use fleet_types::{AlertType, MotionStatus, TelemetryEnvelope};
use socketioxide::SocketIo;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::handlers::SharedState;

// ── Configuration ─────────────────────────────────────────────────────────────

pub struct HubConfig {
    /// UDP port to listen on (default 5555)
    pub udp_port: u16,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            udp_port: std::env::var("FLEET_UDP_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5555),
        }
    }
}

// ── Sequence Number Tracker (stale/duplicate rejection) ───────────────────────

/// Tracks the last seen sequence number per bus. Exact duplicates and large
/// backward jumps are rejected; small reorders within the window pass.
struct SeqTracker {
    last_seq: HashMap<String, u32>,
}

impl SeqTracker {
    fn new() -> Self {
        Self { last_seq: HashMap::new() }
    }

    fn accept(&mut self, bus_id: &str, seq_num: u32) -> bool {
        let last = self.last_seq.entry(bus_id.to_string()).or_insert(0);
        let diff = seq_num.wrapping_sub(*last);
        if diff == 0 || diff > 1000 {
            warn!("hub: rejected packet from {bus_id}: seq {seq_num} (last: {last})");
            return false;
        }
        *last = seq_num;
        true
    }
}

// ── Alert event channel message ───────────────────────────────────────────────

pub struct AlertEvent {
    pub bus_id: String,
    pub alert_type: AlertType,
    pub message: String,
}

// ── Main UDP listener task ────────────────────────────────────────────────────

/// Start the location hub UDP listener as a background Tokio task. Alert-worthy
/// status transitions go out on `alert_tx` for the socket layer to persist.
pub async fn start_location_hub(
    config: HubConfig,
    shared: SharedState,
    io: SocketIo,
    alert_tx: mpsc::Sender<AlertEvent>,
) {
    let addr = format!("0.0.0.0:{}", config.udp_port);
    let socket = match UdpSocket::bind(&addr).await {
        Ok(s) => {
            info!("📡 Location hub listening on UDP {addr}");
            Arc::new(s)
        }
        Err(e) => {
            warn!("Location hub: could not bind UDP {addr}: {e} (no simulator feed — ignoring)");
            return;
        }
    };

    let mut seq_tracker = SeqTracker::new();
    let mut last_status: HashMap<String, MotionStatus> = HashMap::new();
    let mut buf = vec![0u8; 4096];

    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, src)) => {
                process_packet(
                    &buf[..len],
                    src,
                    &mut seq_tracker,
                    &mut last_status,
                    &shared,
                    &io,
                    &alert_tx,
                )
                .await;
            }
            Err(e) => {
                // Never crash — log and continue
                warn!("Location hub: UDP recv error: {e}");
            }
        }
    }
}

async fn process_packet(
    data: &[u8],
    src: SocketAddr,
    seq_tracker: &mut SeqTracker,
    last_status: &mut HashMap<String, MotionStatus>,
    shared: &SharedState,
    io: &SocketIo,
    alert_tx: &mpsc::Sender<AlertEvent>,
) {
    let env: TelemetryEnvelope = match serde_json::from_slice(data) {
        Ok(e) => e,
        Err(e) => {
            debug!("hub: malformed packet from {src}: {e}");
            return;
        }
    };

    if !seq_tracker.accept(&env.bus_id, env.seq_num) {
        return;
    }

    let bus_id = env.bus_id.clone();
    let speed = env.speed_kmh;
    let status = env.status;
    debug!("hub: {bus_id} seq={} speed={speed:.1}km/h status={status:?}", env.seq_num);

    // Edge-triggered alert conditions: fire on the transition, not every tick
    let prev = last_status.insert(bus_id.clone(), status);
    let transitioned = prev != Some(status);
    if transitioned {
        match status {
            MotionStatus::Overspeed => {
                let _ = alert_tx.try_send(AlertEvent {
                    bus_id: bus_id.clone(),
                    alert_type: AlertType::Overspeed,
                    message: format!("Bus speed reached {speed:.0} km/h"),
                });
            }
            MotionStatus::Emergency => {
                let _ = alert_tx.try_send(AlertEvent {
                    bus_id: bus_id.clone(),
                    alert_type: AlertType::Emergency,
                    message: "Emergency signal received from driver".to_string(),
                });
            }
            _ => {}
        }
    }

    let snapshot = {
        let mut state = shared.write().await;
        state.merge_location(env.into_location());
        state.live_locations.clone()
    };

    let _ = io.emit("locations-snapshot", &snapshot);
}

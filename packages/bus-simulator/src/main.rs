//! main.rs — Bus simulator entry point
//!
//! Runs three concurrent loops:
//!   1. Motion loop: advances the bus along its route at update_rate_hz,
//!      builds a telemetry envelope, sends it to the backend hub via UDP
//!   2. Event loop: one random-event draw every event_period_s
//!   3. WebSocket server: control panel on port 9090 (pause/resume, speed,
//!      emergency/accident triggers, live telemetry + alert feed)
//!
//! All errors in steady state are logged, never fatal; the sim keeps running
//! even when the backend hub is offline.

mod alerts;
mod events;
mod proximity;
mod route_path;
mod sim;
mod speed_model;
mod telemetry;
mod udp_tx;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{broadcast, RwLock};
use tokio::time::interval;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use events::{EventBand, EventTable};
use proximity::PointOfInterest;
use route_path::RoutePath;
use sim::BusSim;
use telemetry::TelemetryBuilder;
use udp_tx::UdpTransmitter;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "bus-sim", about = "School bus fleet motion simulator")]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    /// UDP hub address of the fleet backend
    #[arg(long, default_value = "127.0.0.1:5555")]
    hub_addr: String,
    /// Simulation speed multiplier (1.0 = real-time)
    #[arg(long, default_value = "1.0")]
    speed: f64,
    /// Motion tick rate override, Hz
    #[arg(long)]
    tick_rate: Option<f64>,
    /// Control panel WebSocket port
    #[arg(long, default_value = "9090")]
    ctrl_port: u16,
}

// ── Shared state ──────────────────────────────────────────────────────────────

struct SimState {
    sim: BusSim,
    builder: TelemetryBuilder,
    paused: bool,
    speed: f64,
    epoch_counter: u64,
    /// Latest telemetry frame, sent to control clients on connect.
    last_telemetry: Option<String>,
}

type SharedState = Arc<RwLock<SimState>>;

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bus_sim=info".into()),
        )
        .init();

    let args = Args::parse();

    let config_str = std::fs::read_to_string(&args.config)
        .unwrap_or_else(|_| include_str!("../config.toml").to_string());
    let cfg: FullConfig = toml::from_str(&config_str).expect("Invalid config.toml");

    let update_rate_hz = args.tick_rate.unwrap_or(cfg.simulation.update_rate_hz);

    info!(
        "🚌 Bus simulator starting — bus {} on {} at {update_rate_hz} Hz",
        cfg.bus.bus_id, cfg.bus.route_id
    );

    let sim = build_sim(&cfg);
    let builder = TelemetryBuilder::new(&cfg.bus.bus_id, &cfg.bus.driver_id, &cfg.bus.route_id);

    let shared: SharedState = Arc::new(RwLock::new(SimState {
        sim,
        builder,
        paused: false,
        speed: args.speed,
        epoch_counter: 0,
        last_telemetry: None,
    }));

    let transmitter =
        Arc::new(UdpTransmitter::new(&args.hub_addr).expect("Failed to bind UDP socket"));

    // Broadcast channel for control-panel telemetry
    let (telem_tx, _) = broadcast::channel::<String>(64);
    let telem_tx = Arc::new(telem_tx);

    let motion_state = shared.clone();
    let motion_tx = transmitter.clone();
    let motion_telem = telem_tx.clone();
    tokio::spawn(async move {
        motion_loop(motion_state, motion_tx, motion_telem, update_rate_hz).await;
    });

    let event_state = shared.clone();
    let event_period = cfg.simulation.event_period_s;
    tokio::spawn(async move {
        event_loop(event_state, event_period).await;
    });

    let ctrl_addr = format!("0.0.0.0:{}", args.ctrl_port);
    info!("🖥  Control panel WebSocket at ws://{ctrl_addr}");

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(|| async { "bus-sim ok" }))
        .with_state((shared.clone(), telem_tx.clone()))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let listener = tokio::net::TcpListener::bind(&ctrl_addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

fn build_sim(cfg: &FullConfig) -> BusSim {
    let mut sim = BusSim::new();
    if let Some(routes) = &cfg.routes {
        let primary = RoutePath::parse(&routes.primary).expect("Invalid primary route path");
        let diversion = RoutePath::parse(&routes.diversion).expect("Invalid diversion route path");
        sim = sim.with_routes(primary, diversion);
    }
    if let Some(pois) = &cfg.pois {
        sim = sim.with_pois(pois.clone());
    }
    if let Some(ev) = &cfg.events {
        let table = EventTable::from_bands(ev.bands.clone());
        if !table.bands_disjoint() {
            warn!("Event table has overlapping bands; earlier rows win");
        }
        sim = sim.with_event_table(table);
    }
    sim
}

// ── Motion loop ───────────────────────────────────────────────────────────────

async fn motion_loop(
    state: SharedState,
    tx: Arc<UdpTransmitter>,
    telem: Arc<broadcast::Sender<String>>,
    update_rate_hz: f64,
) {
    let epoch_ms = (1000.0 / update_rate_hz).max(1.0) as u64;
    let mut ticker = interval(Duration::from_millis(epoch_ms));
    let mut rng = StdRng::from_entropy();

    info!("⏱  Motion loop running at {update_rate_hz} Hz ({epoch_ms}ms epoch)");

    loop {
        ticker.tick().await;

        let frame = {
            let mut s = state.write().await;
            if s.paused {
                continue;
            }

            let dt = (epoch_ms as f64 / 1000.0) * s.speed;
            s.sim.tick(dt, &mut rng);
            s.epoch_counter += 1;

            let envelope = {
                let SimState { sim, builder, .. } = &mut *s;
                builder.envelope(sim, &mut rng)
            };
            tx.send(&envelope);

            let frame = serde_json::json!({
                "type": "telemetry",
                "epoch": s.epoch_counter,
                "progress": s.sim.progress(),
                "bus": envelope,
                "alerts": s.sim.alerts().entries(),
                "geofencePopup": s.sim.geofence_popup(),
            })
            .to_string();
            s.last_telemetry = Some(frame.clone());

            if s.epoch_counter % 600 == 0 {
                let st = s.sim.state();
                info!(
                    "epoch={} | speed={:.1}km/h | status={:?} | progress={:.3}",
                    s.epoch_counter,
                    st.speed_kmh,
                    st.status,
                    s.sim.progress()
                );
            }
            frame
        };

        let _ = telem.send(frame);
    }
}

// ── Event loop ────────────────────────────────────────────────────────────────

async fn event_loop(state: SharedState, event_period_s: f64) {
    let mut ticker = interval(Duration::from_secs_f64(event_period_s.max(0.5)));
    let mut rng = StdRng::from_entropy();

    loop {
        ticker.tick().await;

        let mut s = state.write().await;
        if s.paused {
            continue;
        }
        let dice: f64 = rng.gen();
        if let Some(outcome) = s.sim.roll_event(dice) {
            info!("🎲 dice={dice:.3} → {outcome:?}");
        }
    }
}

// ── WebSocket control handler ─────────────────────────────────────────────────

async fn ws_handler(
    ws: WebSocketUpgrade,
    State((state, telem_tx)): State<(SharedState, Arc<broadcast::Sender<String>>)>,
) -> Response {
    ws.on_upgrade(move |socket| handle_ws(socket, state, telem_tx))
}

async fn handle_ws(
    mut socket: WebSocket,
    state: SharedState,
    telem_tx: Arc<broadcast::Sender<String>>,
) {
    let mut telem_rx = telem_tx.subscribe();

    // Send the latest frame immediately on connect
    if let Some(frame) = state.read().await.last_telemetry.as_ref() {
        let _ = socket.send(Message::Text(frame.to_string())).await;
    }

    loop {
        tokio::select! {
            Ok(msg) = telem_rx.recv() => {
                if socket.send(Message::Text(msg)).await.is_err() { break; }
            }
            Some(Ok(Message::Text(cmd))) = socket.recv() => {
                handle_command(&state, &cmd).await;
            }
            else => break,
        }
    }
}

/// Handle commands from the control panel.
/// Commands are JSON: { "cmd": "...", "args": {...} }
async fn handle_command(state: &SharedState, raw: &str) {
    let v: serde_json::Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => return,
    };
    let cmd = v["cmd"].as_str().unwrap_or("");
    match cmd {
        "pause" => {
            state.write().await.paused = true;
            info!("⏸ Sim paused");
        }
        "resume" => {
            state.write().await.paused = false;
            info!("▶ Sim resumed");
        }
        "reset" => {
            state.write().await.sim.reset();
            info!("↺ Sim reset to route start");
        }
        "set_speed" => {
            if let Some(sp) = v["args"]["speed"].as_f64() {
                state.write().await.speed = sp.clamp(0.1, 20.0);
                info!("⚡ Sim speed set to {sp}×");
            }
        }
        "trigger_emergency" => {
            state.write().await.sim.trigger_emergency();
            info!("🆘 Emergency triggered");
        }
        "clear_emergency" => {
            state.write().await.sim.clear_emergency();
            info!("Emergency cleared");
        }
        "trigger_accident" => {
            state.write().await.sim.trigger_accident();
            info!("💥 Accident reported");
        }
        _ => warn!("Unknown control command: {cmd}"),
    }
}

// ── Config structs ────────────────────────────────────────────────────────────

#[derive(Debug, serde::Deserialize)]
struct FullConfig {
    bus: BusConfig,
    simulation: SimulationConfig,
    routes: Option<RoutesConfig>,
    pois: Option<Vec<PointOfInterest>>,
    events: Option<EventsConfig>,
}

#[derive(Debug, serde::Deserialize)]
struct BusConfig {
    bus_id: String,
    driver_id: String,
    route_id: String,
}

#[derive(Debug, serde::Deserialize)]
struct SimulationConfig {
    update_rate_hz: f64,
    event_period_s: f64,
}

#[derive(Debug, serde::Deserialize)]
struct RoutesConfig {
    primary: String,
    diversion: String,
}

#[derive(Debug, serde::Deserialize)]
struct EventsConfig {
    bands: Vec<EventBand>,
}

//! # fleet-types
//!
//! Shared record types for the school bus fleet suite.
//!
//! These types are used by:
//! - `bus-simulator`: producing `TelemetryEnvelope` datagrams each motion epoch
//! - `fleet-backend`: receiving telemetry, storing fleet documents, and
//!   broadcasting collection snapshots to dashboard clients
//!
//! ## Conventions
//!
//! - Simulator geometry is a planar 2D coordinate space (not geodetic); the
//!   telemetry layer projects it onto lat/lon around the school anchor.
//! - `VehicleStatus` is always derived from speed, never stored on its own.
//! - Externally visible records serialize camelCase to match the dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Planar geometry ───────────────────────────────────────────────────────────

/// 2D point in the route plane (arbitrary map units).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn dist(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

// ── Vehicle state enums ───────────────────────────────────────────────────────

/// Speed threshold below which the vehicle counts as stopped (km/h).
pub const STOPPED_BELOW_KMH: f64 = 0.5;
/// Speed threshold above which the vehicle counts as overspeeding (km/h).
pub const OVERSPEED_ABOVE_KMH: f64 = 50.0;

/// Derived vehicle status. Always a pure function of the clamped speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleStatus {
    Normal,
    Stopped,
    Overspeed,
}

impl VehicleStatus {
    /// Status derivation: ≤ 0.5 km/h → Stopped, > 50 km/h → Overspeed.
    pub fn from_speed(speed_kmh: f64) -> Self {
        if speed_kmh <= STOPPED_BELOW_KMH {
            Self::Stopped
        } else if speed_kmh > OVERSPEED_ABOVE_KMH {
            Self::Overspeed
        } else {
            Self::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GpsSignal {
    Strong,
    Weak,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrafficStatus {
    Clear,
    Heavy,
    Rerouting,
}

// ── Alerts ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertType {
    Geofence,
    Overspeed,
    Normal,
    Emergency,
    Accident,
    Traffic,
    Diversion,
    Gps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertStatus {
    Active,
    /// Terminal. An alert never transitions back to Active.
    Resolved,
}

/// In-memory alert log record (simulator session log, capped at 10 entries).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    /// Human-readable clock time, e.g. "08:45 AM".
    pub time: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub message: String,
    pub status: AlertStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    /// Default severity band per alert type, matching the dashboard's store.
    pub fn for_type(alert_type: AlertType) -> Self {
        match alert_type {
            AlertType::Emergency | AlertType::Accident => Self::Critical,
            AlertType::Overspeed => Self::High,
            AlertType::Diversion | AlertType::Traffic | AlertType::Gps => Self::Medium,
            AlertType::Geofence | AlertType::Normal => Self::Low,
        }
    }
}

/// Persisted alert document (backend `alerts` collection, append-only).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAlert {
    pub id: String,
    pub bus_id: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub message: String,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    /// Server-assigned creation time.
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

// ── Live location feed ────────────────────────────────────────────────────────

/// Wire status of a moving vehicle. Unlike [`VehicleStatus`] this includes the
/// driver-triggered emergency condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionStatus {
    Normal,
    Stopped,
    Overspeed,
    Emergency,
}

impl MotionStatus {
    pub fn from_vehicle(status: VehicleStatus, emergency: bool) -> Self {
        if emergency {
            return Self::Emergency;
        }
        match status {
            VehicleStatus::Normal => Self::Normal,
            VehicleStatus::Stopped => Self::Stopped,
            VehicleStatus::Overspeed => Self::Overspeed,
        }
    }
}

/// Live GPS record, one per bus, merge-written into the `liveLocations`
/// collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveLocation {
    pub bus_id: String,
    pub driver_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// 0–360 degrees.
    pub heading: f64,
    /// km/h.
    pub speed: f64,
    /// Estimated fix accuracy in meters.
    pub accuracy: f64,
    pub timestamp: DateTime<Utc>,
    pub is_moving: bool,
    pub route_id: String,
    pub next_stop: String,
    /// Minutes to the next stop, when a usable speed estimate exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_to_next_stop: Option<f64>,
    pub status: MotionStatus,
}

// ── Fleet documents ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VehicleType {
    Minibus,
    Standard,
    DoubleDecker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusStatus {
    Active,
    Inactive,
    Maintenance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bus {
    pub id: String,
    pub bus_number: String,
    pub route_id: String,
    pub driver_id: Option<String>,
    pub vehicle_type: VehicleType,
    pub capacity: u32,
    pub status: BusStatus,
    pub license_plate: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStop {
    pub stop_name: String,
    pub stop_order: u32,
    pub latitude: f64,
    pub longitude: f64,
    /// Minutes from route start.
    pub estimated_arrival: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: String,
    pub route_name: String,
    pub route_code: String,
    pub start_point: String,
    pub end_point: String,
    pub stops: Vec<RouteStop>,
    pub estimated_duration: u32,
    pub is_active: bool,
    pub color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DriverStatus {
    Available,
    OnDuty,
    OffDuty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: String,
    pub uid: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub license_number: String,
    pub assigned_bus_id: Option<String>,
    pub status: DriverStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ── Telemetry wire envelope (simulator → backend hub, UDP) ───────────────────

/// One datagram per bus per motion epoch. JSON on the wire.
///
/// The hub validates `seq_num` (stale/duplicate rejection) before merging the
/// payload into the `liveLocations` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEnvelope {
    pub bus_id: String,
    pub driver_id: String,
    /// Monotonically increasing per-bus sequence number.
    pub seq_num: u32,
    /// Planar route-plane position (for dashboard overlays).
    pub x: f64,
    pub y: f64,
    /// Projected geodetic position around the school anchor.
    pub latitude: f64,
    pub longitude: f64,
    pub heading_deg: f64,
    pub speed_kmh: f64,
    pub accuracy_m: f64,
    pub status: MotionStatus,
    pub gps_signal: GpsSignal,
    pub traffic_status: TrafficStatus,
    pub is_diverted: bool,
    pub is_moving: bool,
    pub route_id: String,
    pub next_stop: String,
    pub eta_min: Option<f64>,
    pub timestamp_ms: u64,
}

impl TelemetryEnvelope {
    /// Convert into the stored live-location record.
    pub fn into_location(self) -> LiveLocation {
        let timestamp = DateTime::<Utc>::from_timestamp_millis(self.timestamp_ms as i64)
            .unwrap_or_else(Utc::now);
        LiveLocation {
            bus_id: self.bus_id,
            driver_id: self.driver_id,
            latitude: self.latitude,
            longitude: self.longitude,
            heading: self.heading_deg.rem_euclid(360.0),
            speed: self.speed_kmh,
            accuracy: self.accuracy_m,
            timestamp,
            is_moving: self.is_moving,
            route_id: self.route_id,
            next_stop: self.next_stop,
            eta_to_next_stop: self.eta_min,
            status: self.status,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

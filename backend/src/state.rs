use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use fleet_types::{
    AlertSeverity, AlertStatus, AlertType, Bus, BusStatus, Driver, DriverStatus, LiveLocation,
    Route, RouteStop, StoredAlert, VehicleType,
};

/// Default number of alerts delivered in a snapshot.
pub const ALERT_SNAPSHOT_LIMIT: usize = 20;

// ─── Full Fleet State ─────────────────────────────────────────────────────────

/// The five store collections. `live_locations` is ephemeral runtime data and
/// is never persisted; everything else survives restarts via fleet.json.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FleetState {
    pub buses: HashMap<String, Bus>,
    pub routes: HashMap<String, Route>,
    pub drivers: HashMap<String, Driver>,
    /// Most-recent-first, append-only.
    pub alerts: Vec<StoredAlert>,
    // Ephemeral — populated at runtime, not persisted
    #[serde(default)]
    pub live_locations: HashMap<String, LiveLocation>,
}

impl FleetState {
    pub fn is_empty(&self) -> bool {
        self.buses.is_empty() && self.routes.is_empty() && self.drivers.is_empty()
    }

    /// The most recent alerts, capped for snapshot delivery.
    pub fn alerts_snapshot(&self, limit: usize) -> Vec<StoredAlert> {
        self.alerts.iter().take(limit).cloned().collect()
    }

    /// Insert a new alert at the front, resolving the prior Active alert of
    /// the same type for the same bus. Returns a reference to the new record.
    pub fn push_alert(&mut self, alert: StoredAlert) -> &StoredAlert {
        let now = alert.created_at;
        for existing in &mut self.alerts {
            if existing.bus_id == alert.bus_id
                && existing.alert_type == alert.alert_type
                && existing.status == AlertStatus::Active
            {
                existing.status = AlertStatus::Resolved;
                existing.resolved_at = Some(now);
            }
        }
        self.alerts.insert(0, alert);
        &self.alerts[0]
    }

    /// Resolve an alert by id. Returns false when the id is unknown or the
    /// alert is already resolved.
    pub fn resolve_alert(&mut self, alert_id: &str) -> bool {
        match self.alerts.iter_mut().find(|a| a.id == alert_id) {
            Some(a) if a.status == AlertStatus::Active => {
                a.status = AlertStatus::Resolved;
                a.resolved_at = Some(Utc::now());
                true
            }
            _ => false,
        }
    }

    /// Merge a location update into the collection: present fields overwrite,
    /// the rest of an existing record is untouched.
    pub fn merge_location(&mut self, location: LiveLocation) {
        self.live_locations.insert(location.bus_id.clone(), location);
    }
}

// ─── Seed Data ────────────────────────────────────────────────────────────────

/// The sample fleet loaded on first start or on an explicit seed-data request:
/// two buses, two routes, two drivers.
pub fn seed_fleet(state: &mut FleetState) {
    let now = Utc::now();

    state.buses.insert(
        "bus_001".into(),
        Bus {
            id: "bus_001".into(),
            bus_number: "SB-042".into(),
            route_id: "route_001".into(),
            driver_id: Some("driver_001".into()),
            vehicle_type: VehicleType::Standard,
            capacity: 45,
            status: BusStatus::Active,
            license_plate: "KA-01-AB-1234".into(),
            created_at: now,
            updated_at: now,
        },
    );
    state.buses.insert(
        "bus_002".into(),
        Bus {
            id: "bus_002".into(),
            bus_number: "SB-087".into(),
            route_id: "route_002".into(),
            driver_id: Some("driver_002".into()),
            vehicle_type: VehicleType::Minibus,
            capacity: 25,
            status: BusStatus::Active,
            license_plate: "KA-01-CD-5678".into(),
            created_at: now,
            updated_at: now,
        },
    );

    state.routes.insert(
        "route_001".into(),
        Route {
            id: "route_001".into(),
            route_name: "Central School Route".into(),
            route_code: "R1".into(),
            start_point: "Central School".into(),
            end_point: "North Suburbs".into(),
            stops: vec![
                stop("Central School", 1, 12.9716, 77.5946, 0),
                stop("Emma's Home", 2, 12.9750, 77.5980, 5),
                stop("Liam's Home", 3, 12.9800, 77.6020, 10),
                stop("Noah's Home", 4, 12.9850, 77.6060, 15),
                stop("Olivia's Home", 5, 12.9900, 77.6100, 20),
            ],
            estimated_duration: 25,
            is_active: true,
            color: "#3B82F6".into(),
        },
    );
    state.routes.insert(
        "route_002".into(),
        Route {
            id: "route_002".into(),
            route_name: "East Side Express".into(),
            route_code: "R2".into(),
            start_point: "Central School".into(),
            end_point: "East Hills".into(),
            stops: vec![
                stop("Central School", 1, 12.9716, 77.5946, 0),
                stop("Ava's Home", 2, 12.9680, 77.6000, 7),
                stop("Max's Home", 3, 12.9650, 77.6080, 14),
            ],
            estimated_duration: 20,
            is_active: true,
            color: "#10B981".into(),
        },
    );

    state.drivers.insert(
        "driver_001".into(),
        Driver {
            id: "driver_001".into(),
            uid: "driver_001".into(),
            name: "Robert Johnson".into(),
            phone: "+91-9876543210".into(),
            email: "robert.driver@school.com".into(),
            license_number: "DL-KA-2020-12345".into(),
            assigned_bus_id: Some("bus_001".into()),
            status: DriverStatus::OnDuty,
            photo: None,
            created_at: now,
        },
    );
    state.drivers.insert(
        "driver_002".into(),
        Driver {
            id: "driver_002".into(),
            uid: "driver_002".into(),
            name: "Michael Chen".into(),
            phone: "+91-9876543211".into(),
            email: "michael.driver@school.com".into(),
            license_number: "DL-KA-2021-67890".into(),
            assigned_bus_id: Some("bus_002".into()),
            status: DriverStatus::OnDuty,
            photo: None,
            created_at: now,
        },
    );
}

fn stop(name: &str, order: u32, lat: f64, lon: f64, eta: u32) -> RouteStop {
    RouteStop {
        stop_name: name.into(),
        stop_order: order,
        latitude: lat,
        longitude: lon,
        estimated_arrival: eta,
    }
}

/// Build a new stored alert with a server-assigned id and timestamp.
pub fn new_alert(bus_id: &str, alert_type: AlertType, message: &str) -> StoredAlert {
    StoredAlert {
        id: uuid::Uuid::new_v4().to_string(),
        bus_id: bus_id.into(),
        alert_type,
        message: message.into(),
        severity: AlertSeverity::for_type(alert_type),
        status: AlertStatus::Active,
        created_at: Utc::now(),
        resolved_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_creates_the_sample_fleet() {
        let mut state = FleetState::default();
        assert!(state.is_empty());
        seed_fleet(&mut state);
        assert_eq!(state.buses.len(), 2);
        assert_eq!(state.routes.len(), 2);
        assert_eq!(state.drivers.len(), 2);
        assert_eq!(state.routes["route_001"].stops.len(), 5);
        assert_eq!(state.drivers["driver_001"].assigned_bus_id.as_deref(), Some("bus_001"));
    }

    #[test]
    fn push_alert_resolves_prior_same_type_same_bus() {
        let mut state = FleetState::default();
        state.push_alert(new_alert("bus_001", AlertType::Overspeed, "55 km/h"));
        state.push_alert(new_alert("bus_002", AlertType::Overspeed, "52 km/h"));
        state.push_alert(new_alert("bus_001", AlertType::Overspeed, "58 km/h"));

        assert_eq!(state.alerts.len(), 3);
        // Newest first and active.
        assert_eq!(state.alerts[0].message, "58 km/h");
        assert_eq!(state.alerts[0].status, AlertStatus::Active);
        // bus_002's alert untouched.
        assert_eq!(state.alerts[1].bus_id, "bus_002");
        assert_eq!(state.alerts[1].status, AlertStatus::Active);
        // bus_001's first alert resolved with a timestamp.
        assert_eq!(state.alerts[2].status, AlertStatus::Resolved);
        assert!(state.alerts[2].resolved_at.is_some());
    }

    #[test]
    fn resolve_is_explicit_and_terminal() {
        let mut state = FleetState::default();
        let id = state
            .push_alert(new_alert("bus_001", AlertType::Geofence, "entered zone"))
            .id
            .clone();

        assert!(state.resolve_alert(&id));
        // Second resolve is a no-op.
        assert!(!state.resolve_alert(&id));
        assert!(!state.resolve_alert("no-such-id"));
    }

    #[test]
    fn snapshot_is_capped_by_recency() {
        let mut state = FleetState::default();
        for i in 0..30 {
            state.push_alert(new_alert("bus_001", AlertType::Normal, &format!("note {i}")));
        }
        let snap = state.alerts_snapshot(ALERT_SNAPSHOT_LIMIT);
        assert_eq!(snap.len(), ALERT_SNAPSHOT_LIMIT);
        assert_eq!(snap[0].message, "note 29");
    }
}

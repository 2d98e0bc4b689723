//! telemetry.rs — Wire envelope assembly
//!
//! Projects the planar sim state onto geodetic coordinates around the school
//! anchor, picks the next stop with a distance/speed ETA, and stamps each
//! envelope with a per-bus sequence number so the backend hub can reject
//! stale or duplicate datagrams.

use std::time::{SystemTime, UNIX_EPOCH};

use fleet_types::{GpsSignal, MotionStatus, TelemetryEnvelope, STOPPED_BELOW_KMH};
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::proximity::PoiKind;
use crate::sim::BusSim;

/// School anchor, the (100, 485) planar origin of both routes.
pub const ANCHOR_LAT: f64 = 12.9716;
pub const ANCHOR_LON: f64 = 77.5946;

/// Meters per planar map unit.
pub const METERS_PER_UNIT: f64 = 10.0;
/// Meters per degree of latitude.
const METERS_PER_DEG_LAT: f64 = 111_320.0;

/// Mean GPS fix accuracy in meters with a strong signal.
const ACCURACY_MEAN_M: f64 = 4.0;
const ACCURACY_STDDEV_M: f64 = 1.2;

/// Planar (x, y) → (lat, lon) around the school anchor. SVG y grows
/// southward, so north is negative y.
pub fn project(x: f64, y: f64, anchor: (f64, f64)) -> (f64, f64) {
    let (alat, alon) = anchor;
    let north_m = (485.0 - y) * METERS_PER_UNIT;
    let east_m = (x - 100.0) * METERS_PER_UNIT;
    let lat = alat + north_m / METERS_PER_DEG_LAT;
    let lon = alon + east_m / (METERS_PER_DEG_LAT * alat.to_radians().cos());
    (lat, lon)
}

fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Builds envelopes for one bus, holding the identity fields and the
/// monotonic sequence counter.
pub struct TelemetryBuilder {
    pub bus_id: String,
    pub driver_id: String,
    pub route_id: String,
    seq: u32,
}

impl TelemetryBuilder {
    pub fn new(bus_id: impl Into<String>, driver_id: impl Into<String>, route_id: impl Into<String>) -> Self {
        Self {
            bus_id: bus_id.into(),
            driver_id: driver_id.into(),
            route_id: route_id.into(),
            seq: 0,
        }
    }

    /// Next stop by planar distance: the closest student home, falling back
    /// to the school when no homes are configured. Returns the stop label and
    /// the ETA in minutes (None while effectively stopped).
    fn next_stop(&self, sim: &BusSim) -> (String, Option<f64>) {
        let pos = sim.state().pos;
        let mut best: Option<(&str, f64)> = None;
        for poi in sim.points_of_interest() {
            let label = match &poi.kind {
                PoiKind::StudentHome { .. } => poi.label.as_str(),
                PoiKind::School => continue,
            };
            let d = pos.dist(&poi.pos);
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((label, d));
            }
        }
        let (label, dist_units) = match best {
            Some(b) => b,
            None => return ("Central School".to_string(), None),
        };

        let speed = sim.state().speed_kmh;
        let eta = if speed > STOPPED_BELOW_KMH {
            let meters = dist_units * METERS_PER_UNIT;
            let m_per_min = speed * 1000.0 / 60.0;
            Some(meters / m_per_min)
        } else {
            None
        };
        (label.to_string(), eta)
    }

    /// Assemble one envelope from the current sim state and advance the
    /// sequence counter.
    pub fn envelope<R: Rng + ?Sized>(&mut self, sim: &BusSim, rng: &mut R) -> TelemetryEnvelope {
        let state = sim.state();
        let (latitude, longitude) = project(state.pos.x, state.pos.y, (ANCHOR_LAT, ANCHOR_LON));
        let (next_stop, eta_min) = self.next_stop(sim);

        // Fix accuracy degrades with the signal.
        let noise = Normal::new(ACCURACY_MEAN_M, ACCURACY_STDDEV_M)
            .map(|n| n.sample(rng))
            .unwrap_or(ACCURACY_MEAN_M);
        let accuracy_m = match state.gps_signal {
            GpsSignal::Strong => noise,
            GpsSignal::Weak => noise * 3.0,
            GpsSignal::None => noise * 8.0,
        }
        .max(1.0);

        self.seq = self.seq.wrapping_add(1);
        TelemetryEnvelope {
            bus_id: self.bus_id.clone(),
            driver_id: self.driver_id.clone(),
            seq_num: self.seq,
            x: state.pos.x,
            y: state.pos.y,
            latitude,
            longitude,
            heading_deg: state.heading_deg.rem_euclid(360.0),
            speed_kmh: state.speed_kmh,
            accuracy_m,
            status: MotionStatus::from_vehicle(state.status, state.emergency),
            gps_signal: state.gps_signal,
            traffic_status: state.traffic_status,
            is_diverted: state.is_diverted,
            is_moving: state.speed_kmh > STOPPED_BELOW_KMH,
            route_id: self.route_id.clone(),
            next_stop,
            eta_min,
            timestamp_ms: unix_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn anchor_projects_to_itself() {
        let (lat, lon) = project(100.0, 485.0, (ANCHOR_LAT, ANCHOR_LON));
        assert!((lat - ANCHOR_LAT).abs() < 1e-12);
        assert!((lon - ANCHOR_LON).abs() < 1e-12);
    }

    #[test]
    fn north_and_east_have_the_right_sign() {
        // Up and to the right of the school on the map.
        let (lat, lon) = project(200.0, 385.0, (ANCHOR_LAT, ANCHOR_LON));
        assert!(lat > ANCHOR_LAT);
        assert!(lon > ANCHOR_LON);
        // 1000 m north ≈ 0.009°.
        assert!((lat - ANCHOR_LAT - 0.008983).abs() < 1e-4);
    }

    #[test]
    fn sequence_numbers_increase() {
        let mut rng = StdRng::seed_from_u64(1);
        let sim = BusSim::new();
        let mut builder = TelemetryBuilder::new("bus_001", "driver_001", "route_001");
        let a = builder.envelope(&sim, &mut rng);
        let b = builder.envelope(&sim, &mut rng);
        assert_eq!(b.seq_num, a.seq_num + 1);
    }

    #[test]
    fn envelope_reflects_sim_state() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut sim = BusSim::new();
        sim.tick(1.0 / 60.0, &mut rng);

        let mut builder = TelemetryBuilder::new("bus_001", "driver_001", "route_001");
        let env = builder.envelope(&sim, &mut rng);
        assert_eq!(env.bus_id, "bus_001");
        assert!(env.is_moving);
        assert!(env.accuracy_m >= 1.0);
        assert!(env.heading_deg >= 0.0 && env.heading_deg < 360.0);
        // Route start is closest to Emma's pickup.
        assert_eq!(env.next_stop, "Emma's Home");
        assert!(env.eta_min.is_some());
    }

    #[test]
    fn no_eta_while_stopped() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut sim = BusSim::new();
        // Brake to a stop.
        sim.roll_event(0.05);
        for _ in 0..120 {
            sim.tick(1.0 / 60.0, &mut rng);
        }
        assert!(sim.state().speed_kmh <= STOPPED_BELOW_KMH);

        let mut builder = TelemetryBuilder::new("bus_001", "driver_001", "route_001");
        let env = builder.envelope(&sim, &mut rng);
        assert!(env.eta_min.is_none());
        assert!(!env.is_moving);
    }
}

//! speed_model.rs — Per-tick speed, status, and GPS-signal rules
//!
//! All deltas are per motion tick at the nominal rate (60 Hz reference
//! scale). The rules are applied in a fixed order; a sudden stop short
//! circuits everything else. Status is re-derived from the clamped speed on
//! every tick and never stored independently.

use fleet_types::{GpsSignal, VehicleStatus};
use rand::Rng;

/// Deceleration per tick while a sudden stop is active.
pub const SUDDEN_STOP_DECEL: f64 = 1.5;
/// Deceleration per tick while near a point of interest.
pub const NEAR_DECEL: f64 = 0.4;
/// Minimum cruise speed near a point of interest.
pub const NEAR_FLOOR: f64 = 12.0;
/// Acceleration per tick on open road, applied below the cruise target.
pub const ACCEL: f64 = 0.2;
pub const CRUISE_TARGET: f64 = 45.0;
pub const CRUISE_CAP: f64 = 48.0;
/// Uniform jitter half-width, km/h.
pub const JITTER: f64 = 0.25;
/// Penalty per tick in heavy traffic.
pub const TRAFFIC_PENALTY: f64 = 0.8;
/// Speed floor under the heavy-traffic penalty.
pub const TRAFFIC_FLOOR: f64 = 5.0;

/// Inputs to one speed update, snapshotted before the tick commits.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpeedContext {
    pub any_near: bool,
    pub sudden_stop: bool,
    pub traffic_heavy: bool,
}

/// Compute the next speed from the previous one. Result is always ≥ 0.
pub fn next_speed<R: Rng + ?Sized>(prev: f64, ctx: SpeedContext, rng: &mut R) -> f64 {
    if ctx.sudden_stop {
        // Rapid deceleration toward a full stop; all other rules skipped.
        return (prev - SUDDEN_STOP_DECEL).max(0.0);
    }

    let mut speed = if ctx.any_near {
        (prev - NEAR_DECEL).max(NEAR_FLOOR)
    } else if prev < CRUISE_TARGET {
        (prev + ACCEL).min(CRUISE_CAP)
    } else {
        prev
    };

    // Jitter for realism.
    speed += rng.gen_range(-JITTER..=JITTER);

    if ctx.traffic_heavy {
        speed = (speed - TRAFFIC_PENALTY).max(TRAFFIC_FLOOR);
    }

    speed.max(0.0)
}

/// Status derivation from the clamped speed (delegates to the shared enum).
pub fn status_for(speed: f64) -> VehicleStatus {
    VehicleStatus::from_speed(speed)
}

/// GPS signal for this tick: during an outage the fix flaps between Weak and
/// None at random; otherwise Strong.
pub fn gps_signal<R: Rng + ?Sized>(outage_active: bool, rng: &mut R) -> GpsSignal {
    if outage_active {
        if rng.gen_bool(0.5) {
            GpsSignal::Weak
        } else {
            GpsSignal::None
        }
    } else {
        GpsSignal::Strong
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn speed_never_goes_negative() {
        let mut rng = StdRng::seed_from_u64(7);
        let contexts = [
            SpeedContext { any_near: false, sudden_stop: false, traffic_heavy: false },
            SpeedContext { any_near: true, sudden_stop: false, traffic_heavy: false },
            SpeedContext { any_near: false, sudden_stop: true, traffic_heavy: false },
            SpeedContext { any_near: false, sudden_stop: false, traffic_heavy: true },
            SpeedContext { any_near: true, sudden_stop: true, traffic_heavy: true },
        ];
        for ctx in contexts {
            let mut speed = 0.0;
            for _ in 0..500 {
                speed = next_speed(speed, ctx, &mut rng);
                assert!(speed >= 0.0, "negative speed under {ctx:?}");
            }
        }
    }

    #[test]
    fn status_thresholds() {
        assert_eq!(status_for(0.3), VehicleStatus::Stopped);
        assert_eq!(status_for(51.0), VehicleStatus::Overspeed);
        assert_eq!(status_for(30.0), VehicleStatus::Normal);
    }

    #[test]
    fn sudden_stop_decays_strictly() {
        let mut rng = StdRng::seed_from_u64(42);
        let ctx = SpeedContext { sudden_stop: true, ..Default::default() };
        let mut speed = 30.0;
        for tick in 0..4 {
            let next = next_speed(speed, ctx, &mut rng);
            assert!(next < speed, "speed rose during sudden stop at tick {tick}");
            speed = next;
        }
        assert!(speed <= 30.0 - 4.0 * SUDDEN_STOP_DECEL + 1e-9);
    }

    #[test]
    fn sudden_stop_floors_at_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        let ctx = SpeedContext { sudden_stop: true, ..Default::default() };
        assert_eq!(next_speed(1.0, ctx, &mut rng), 0.0);
        assert_eq!(next_speed(0.0, ctx, &mut rng), 0.0);
    }

    #[test]
    fn near_poi_decelerates_toward_floor() {
        let mut rng = StdRng::seed_from_u64(3);
        let ctx = SpeedContext { any_near: true, ..Default::default() };
        let mut speed = 40.0;
        for _ in 0..200 {
            speed = next_speed(speed, ctx, &mut rng);
        }
        // Settles around the floor, within jitter.
        assert!(speed >= NEAR_FLOOR - JITTER && speed <= NEAR_FLOOR + JITTER + NEAR_DECEL);
    }

    #[test]
    fn open_road_accelerates_toward_cruise() {
        let mut rng = StdRng::seed_from_u64(9);
        let ctx = SpeedContext::default();
        let mut speed = 20.0;
        for _ in 0..400 {
            speed = next_speed(speed, ctx, &mut rng);
        }
        assert!(speed > CRUISE_TARGET - 2.0);
        assert!(speed <= CRUISE_CAP + JITTER);
    }

    #[test]
    fn heavy_traffic_holds_the_floor() {
        let mut rng = StdRng::seed_from_u64(11);
        let ctx = SpeedContext { traffic_heavy: true, ..Default::default() };
        let mut speed = 10.0;
        for _ in 0..100 {
            speed = next_speed(speed, ctx, &mut rng);
            assert!(speed >= TRAFFIC_FLOOR - 1e-9);
        }
    }

    #[test]
    fn gps_flaps_only_during_outage() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            assert_eq!(gps_signal(false, &mut rng), GpsSignal::Strong);
        }
        let mut saw_weak = false;
        let mut saw_none = false;
        for _ in 0..200 {
            match gps_signal(true, &mut rng) {
                GpsSignal::Weak => saw_weak = true,
                GpsSignal::None => saw_none = true,
                GpsSignal::Strong => panic!("strong fix during outage"),
            }
        }
        assert!(saw_weak && saw_none);
    }
}

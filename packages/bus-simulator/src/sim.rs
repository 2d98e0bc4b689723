//! sim.rs — Simulation controller
//!
//! `BusSim` owns the complete state of one simulated bus and advances it in
//! two ways: `tick(dt)` runs the motion update (progress, position, proximity,
//! speed, status, GPS) and `roll_event(dice)` runs the periodic event
//! injector. Timed conditions end through an explicit set of pending reverts
//! fired by the tick loop, so teardown is just dropping the struct and
//! `reset()` cancels everything in one place.

use fleet_types::{AlertType, GpsSignal, Point, TrafficStatus, VehicleStatus};
use rand::Rng;

use crate::alerts::AlertLog;
use crate::events::{EventOutcome, EventTable, FORCED_OVERSPEED_KMH};
use crate::proximity::{self, PointOfInterest, ENTER_RADIUS, NEAR_RADIUS};
use crate::route_path::{
    ProgressCursor, RoutePath, RouteVariant, DIVERSION_ROUTE, PRIMARY_ROUTE,
};
use crate::speed_model::{self, SpeedContext};

/// Nominal motion tick rate the per-tick constants are calibrated to.
pub const MOTION_TICK_HZ: f64 = 60.0;
/// Progress gained per tick per unit of (speed / 100).
pub const PROGRESS_FACTOR: f64 = 0.0006;
/// Seconds the geofence popup stays up before the next entry can fire.
pub const POPUP_DISMISS_S: f64 = 5.0;
/// Speed at route start.
pub const INITIAL_SPEED_KMH: f64 = 35.0;

/// Everything the dashboard sees about the vehicle.
#[derive(Debug, Clone)]
pub struct VehicleState {
    pub pos: Point,
    pub heading_deg: f64,
    pub speed_kmh: f64,
    pub status: VehicleStatus,
    pub gps_signal: GpsSignal,
    pub traffic_status: TrafficStatus,
    pub is_diverted: bool,
    pub accident_detected: bool,
    pub emergency: bool,
}

/// One-shot state restoration, applied by the tick loop once its deadline
/// passes. Applying a revert whose condition is already clear is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RevertAction {
    ClearSuddenStop,
    ClearGpsOutage,
    EndDiversion,
    DismissPopup,
}

#[derive(Debug, Clone, Copy)]
struct PendingRevert {
    fire_at: f64,
    action: RevertAction,
}

pub struct BusSim {
    clock_s: f64,
    primary: RoutePath,
    diversion: RoutePath,
    variant: RouteVariant,
    cursor: ProgressCursor,
    pois: Vec<PointOfInterest>,
    state: VehicleState,
    sudden_stop: bool,
    gps_outage: bool,
    /// Student name shown in the active geofence popup, if any. Entry events
    /// are suppressed while a popup is up.
    popup: Option<String>,
    alerts: AlertLog,
    events: EventTable,
    pending: Vec<PendingRevert>,
}

impl BusSim {
    pub fn new() -> Self {
        // The authored route constants are known-good; parse failure here is
        // a programming error, not a runtime condition.
        let primary = RoutePath::parse(PRIMARY_ROUTE)
            .unwrap_or_else(|e| panic!("primary route constant: {e}"));
        let diversion = RoutePath::parse(DIVERSION_ROUTE)
            .unwrap_or_else(|e| panic!("diversion route constant: {e}"));
        let start = primary.start();
        Self {
            clock_s: 0.0,
            primary,
            diversion,
            variant: RouteVariant::Primary,
            cursor: ProgressCursor::new(),
            pois: proximity::default_pois(),
            state: VehicleState {
                pos: start,
                heading_deg: 0.0,
                speed_kmh: INITIAL_SPEED_KMH,
                status: VehicleStatus::Normal,
                gps_signal: GpsSignal::Strong,
                traffic_status: TrafficStatus::Clear,
                is_diverted: false,
                accident_detected: false,
                emergency: false,
            },
            sudden_stop: false,
            gps_outage: false,
            popup: None,
            alerts: AlertLog::with_seed_history(),
            events: EventTable::standard(),
            pending: Vec::new(),
        }
    }

    /// Replace the built-in route pair. Resets the cursor to the new start.
    pub fn with_routes(mut self, primary: RoutePath, diversion: RoutePath) -> Self {
        self.primary = primary;
        self.diversion = diversion;
        self.variant = RouteVariant::Primary;
        self.cursor.reset();
        self.state.pos = self.primary.start();
        self
    }

    pub fn with_pois(mut self, pois: Vec<PointOfInterest>) -> Self {
        self.pois = pois;
        self
    }

    pub fn with_event_table(mut self, events: EventTable) -> Self {
        self.events = events;
        self
    }

    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    pub fn progress(&self) -> f64 {
        self.cursor.get()
    }

    pub fn alerts(&self) -> &AlertLog {
        &self.alerts
    }

    pub fn active_route(&self) -> &RoutePath {
        match self.variant {
            RouteVariant::Primary => &self.primary,
            RouteVariant::Diversion => &self.diversion,
        }
    }

    pub fn route_variant(&self) -> RouteVariant {
        self.variant
    }

    pub fn geofence_popup(&self) -> Option<&str> {
        self.popup.as_deref()
    }

    pub fn points_of_interest(&self) -> &[PointOfInterest] {
        &self.pois
    }

    fn schedule(&mut self, delay_s: f64, action: RevertAction) {
        self.pending.push(PendingRevert { fire_at: self.clock_s + delay_s, action });
    }

    fn apply_revert(&mut self, action: RevertAction) {
        match action {
            RevertAction::ClearSuddenStop => self.sudden_stop = false,
            RevertAction::ClearGpsOutage => self.gps_outage = false,
            RevertAction::EndDiversion => {
                self.state.is_diverted = false;
                self.state.traffic_status = TrafficStatus::Clear;
                self.variant = RouteVariant::Primary;
            }
            RevertAction::DismissPopup => self.popup = None,
        }
    }

    fn fire_due_reverts(&mut self) {
        let now = self.clock_s;
        let due: Vec<RevertAction> = self
            .pending
            .iter()
            .filter(|r| r.fire_at <= now)
            .map(|r| r.action)
            .collect();
        self.pending.retain(|r| r.fire_at > now);
        for action in due {
            self.apply_revert(action);
        }
    }

    /// One motion update. `dt` is the wall-clock step in seconds; per-tick
    /// model constants are scaled by `dt * MOTION_TICK_HZ` for progress, while
    /// the speed rules apply once per call at reference scale.
    pub fn tick<R: Rng + ?Sized>(&mut self, dt: f64, rng: &mut R) {
        self.clock_s += dt;
        self.fire_due_reverts();

        // Progress freezes under a sudden stop; the bus brakes in place.
        if !self.sudden_stop {
            let delta = (self.state.speed_kmh / 100.0) * PROGRESS_FACTOR * dt * MOTION_TICK_HZ;
            self.cursor.advance(delta);
        }

        let (pos, heading) = self.active_route().sample(self.cursor.get());

        let prox = proximity::classify(pos, &self.pois, NEAR_RADIUS, ENTER_RADIUS);
        let any_near = prox.any_near;
        let entered = prox
            .entered
            .and_then(|poi| poi.student_name())
            .map(str::to_owned);

        // Geofence entry fires only while no popup is showing; the popup
        // itself suppresses repeats until its 5 s dismissal.
        if let Some(student) = entered {
            if self.popup.is_none() && !self.sudden_stop {
                self.alerts.record(
                    AlertType::Geofence,
                    format!("Bus entered {student}'s geofence zone"),
                );
                self.popup = Some(student);
                self.schedule(POPUP_DISMISS_S, RevertAction::DismissPopup);
            }
        }

        let ctx = SpeedContext {
            any_near,
            sudden_stop: self.sudden_stop,
            traffic_heavy: self.state.traffic_status == TrafficStatus::Heavy,
        };
        let speed = speed_model::next_speed(self.state.speed_kmh, ctx, rng);

        self.state.pos = pos;
        self.state.heading_deg = heading;
        self.state.speed_kmh = speed;
        self.state.status = speed_model::status_for(speed);
        self.state.gps_signal = speed_model::gps_signal(self.gps_outage, rng);
    }

    /// One event-injector pass with an externally drawn dice value in [0,1).
    /// Returns the outcome that fired, if any.
    pub fn roll_event(&mut self, dice: f64) -> Option<EventOutcome> {
        let diverted = self.state.is_diverted;
        let sudden_stop = self.sudden_stop;
        let gps_outage = self.gps_outage;
        let band = self.events.draw(dice, |outcome| match outcome {
            EventOutcome::Diversion => diverted,
            EventOutcome::SuddenStop => sudden_stop,
            EventOutcome::GpsOutage => gps_outage,
            // No overspeed burst while braking for a stop.
            EventOutcome::Overspeed => sudden_stop,
        })?;

        match band.outcome {
            EventOutcome::Diversion => {
                self.state.is_diverted = true;
                self.state.traffic_status = TrafficStatus::Rerouting;
                self.variant = RouteVariant::Diversion;
                self.alerts
                    .record(AlertType::Diversion, "Route diversion active due to road work");
                self.schedule(band.duration_s, RevertAction::EndDiversion);
            }
            EventOutcome::SuddenStop => {
                self.sudden_stop = true;
                self.schedule(band.duration_s, RevertAction::ClearSuddenStop);
            }
            EventOutcome::GpsOutage => {
                self.gps_outage = true;
                self.schedule(band.duration_s, RevertAction::ClearGpsOutage);
            }
            EventOutcome::Overspeed => {
                self.state.speed_kmh = FORCED_OVERSPEED_KMH;
                self.state.status = speed_model::status_for(FORCED_OVERSPEED_KMH);
                self.alerts
                    .record(AlertType::Overspeed, "Bus speed reached 55 km/h on open road");
            }
        }
        Some(band.outcome)
    }

    /// Driver panic button.
    pub fn trigger_emergency(&mut self) {
        self.state.emergency = true;
        self.alerts
            .record(AlertType::Emergency, "Emergency button pressed by driver");
    }

    pub fn clear_emergency(&mut self) {
        self.state.emergency = false;
    }

    /// Impact-sensor report.
    pub fn trigger_accident(&mut self) {
        self.state.accident_detected = true;
        self.alerts
            .record(AlertType::Accident, "Possible accident detected by impact sensor");
    }

    /// Back to route start, all transient conditions and pending reverts
    /// cancelled. The alert log keeps its history.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.cursor.reset();
        self.variant = RouteVariant::Primary;
        self.sudden_stop = false;
        self.gps_outage = false;
        self.popup = None;
        let start = self.primary.start();
        self.state = VehicleState {
            pos: start,
            heading_deg: 0.0,
            speed_kmh: INITIAL_SPEED_KMH,
            status: VehicleStatus::Normal,
            gps_signal: GpsSignal::Strong,
            traffic_status: TrafficStatus::Clear,
            is_diverted: false,
            accident_detected: false,
            emergency: false,
        };
    }
}

impl Default for BusSim {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_types::AlertStatus;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const DT: f64 = 1.0 / MOTION_TICK_HZ;

    fn run_ticks(sim: &mut BusSim, rng: &mut StdRng, n: usize) {
        for _ in 0..n {
            sim.tick(DT, rng);
        }
    }

    #[test]
    fn progress_stays_in_unit_interval() {
        let mut sim = BusSim::new();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..20_000 {
            sim.tick(DT, &mut rng);
            let p = sim.progress();
            assert!((0.0..1.0).contains(&p), "progress {p} out of range");
        }
    }

    #[test]
    fn sudden_stop_freezes_progress_and_reverts() {
        let mut sim = BusSim::new();
        let mut rng = StdRng::seed_from_u64(2);
        run_ticks(&mut sim, &mut rng, 60);

        assert_eq!(sim.roll_event(0.05), Some(EventOutcome::SuddenStop));
        let frozen = sim.progress();
        run_ticks(&mut sim, &mut rng, 60);
        assert_eq!(sim.progress(), frozen);
        assert!(sim.state().speed_kmh < INITIAL_SPEED_KMH);

        // 4 s condition: after 5 s of ticking the revert has fired and the
        // bus moves again.
        run_ticks(&mut sim, &mut rng, 300);
        assert!(sim.progress() > frozen);
    }

    #[test]
    fn diversion_switches_route_and_ends_on_schedule() {
        let mut sim = BusSim::new();
        let mut rng = StdRng::seed_from_u64(3);

        assert_eq!(sim.roll_event(0.95), Some(EventOutcome::Diversion));
        assert!(sim.state().is_diverted);
        assert_eq!(sim.state().traffic_status, TrafficStatus::Rerouting);
        assert_eq!(sim.route_variant(), RouteVariant::Diversion);

        // Still diverted while active, and the same outcome cannot stack.
        assert_eq!(sim.roll_event(0.95), None);

        // 12 s condition.
        run_ticks(&mut sim, &mut rng, 13 * 60);
        assert!(!sim.state().is_diverted);
        assert_eq!(sim.state().traffic_status, TrafficStatus::Clear);
        assert_eq!(sim.route_variant(), RouteVariant::Primary);
    }

    #[test]
    fn forced_overspeed_is_one_shot_and_decays() {
        let mut sim = BusSim::new();
        let mut rng = StdRng::seed_from_u64(4);

        assert_eq!(sim.roll_event(0.83), Some(EventOutcome::Overspeed));
        assert_eq!(sim.state().speed_kmh, FORCED_OVERSPEED_KMH);
        assert_eq!(sim.state().status, VehicleStatus::Overspeed);
        assert_eq!(sim.alerts().entries()[0].alert_type, AlertType::Overspeed);

        // No revert is scheduled; the speed model pulls it back under the
        // threshold on its own (no acceleration above cruise target).
        run_ticks(&mut sim, &mut rng, 40 * 60);
        assert!(sim.state().speed_kmh < FORCED_OVERSPEED_KMH);
    }

    #[test]
    fn overspeed_blocked_during_sudden_stop() {
        let mut sim = BusSim::new();
        assert_eq!(sim.roll_event(0.05), Some(EventOutcome::SuddenStop));
        assert_eq!(sim.roll_event(0.83), None);
    }

    #[test]
    fn gps_outage_flaps_then_recovers() {
        let mut sim = BusSim::new();
        let mut rng = StdRng::seed_from_u64(5);

        assert_eq!(sim.roll_event(0.42), Some(EventOutcome::GpsOutage));
        let mut saw_degraded = false;
        for _ in 0..60 {
            sim.tick(DT, &mut rng);
            if sim.state().gps_signal != GpsSignal::Strong {
                saw_degraded = true;
            }
        }
        assert!(saw_degraded);

        // 5 s condition.
        run_ticks(&mut sim, &mut rng, 6 * 60);
        assert_eq!(sim.state().gps_signal, GpsSignal::Strong);
    }

    #[test]
    fn geofence_entry_records_once_per_popup() {
        let mut sim = BusSim::new();
        let mut rng = StdRng::seed_from_u64(6);

        // Drive until a geofence alert appears (the route passes through
        // every student zone each lap).
        let mut entered_at = None;
        for tick in 0..60_000 {
            sim.tick(DT, &mut rng);
            if sim.geofence_popup().is_some() {
                entered_at = Some(tick);
                break;
            }
        }
        let entered_at = entered_at.expect("route never reached a geofence zone");
        let geofence_count = |sim: &BusSim| {
            sim.alerts()
                .entries()
                .iter()
                .filter(|a| a.alert_type == AlertType::Geofence && a.status == AlertStatus::Active)
                .count()
        };
        assert_eq!(geofence_count(&sim), 1);

        // While the popup is up, repeated ticks inside the zone do not stack
        // alerts.
        for _ in 0..10 {
            sim.tick(DT, &mut rng);
        }
        assert_eq!(geofence_count(&sim), 1);

        // The popup dismisses itself after 5 s with no manual intervention.
        run_ticks(&mut sim, &mut rng, 6 * 60);
        assert!(sim.geofence_popup().is_none());
        let _ = entered_at;
    }

    #[test]
    fn reset_cancels_pending_reverts() {
        let mut sim = BusSim::new();
        let mut rng = StdRng::seed_from_u64(7);

        sim.roll_event(0.95);
        sim.roll_event(0.05);
        sim.reset();
        assert!(!sim.state().is_diverted);
        assert_eq!(sim.progress(), 0.0);

        // A fresh diversion after reset must run its full 12 s; a leftover
        // revert from before the reset would end it early.
        run_ticks(&mut sim, &mut rng, 60);
        sim.roll_event(0.95);
        run_ticks(&mut sim, &mut rng, 6 * 60);
        assert!(sim.state().is_diverted);
    }

    #[test]
    fn manual_triggers_raise_alerts() {
        let mut sim = BusSim::new();
        sim.trigger_emergency();
        assert!(sim.state().emergency);
        assert_eq!(sim.alerts().entries()[0].alert_type, AlertType::Emergency);

        sim.trigger_accident();
        assert!(sim.state().accident_detected);
        assert_eq!(sim.alerts().entries()[0].alert_type, AlertType::Accident);
    }
}

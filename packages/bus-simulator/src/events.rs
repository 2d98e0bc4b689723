//! events.rs — Random event injection
//!
//! One uniform draw per event period maps onto a table of disjoint
//! probability bands, checked in priority order. Each band carries the
//! duration of the condition it triggers; a zero duration marks a one-shot
//! (the speed model decays a forced overspeed on its own). An outcome that is
//! already active never re-triggers. The dice value is injected so the policy
//! is unit-testable with a deterministic source.

use serde::Deserialize;

/// Speed forced by the temporary-overspeed outcome (km/h).
pub const FORCED_OVERSPEED_KMH: f64 = 55.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    /// Switch to the diversion route, Rerouting traffic status.
    Diversion,
    /// Freeze progress and decelerate hard (traffic light / stop sign).
    SuddenStop,
    /// GPS fix flaps between Weak and None.
    GpsOutage,
    /// Force speed to [`FORCED_OVERSPEED_KMH`] once.
    Overspeed,
}

/// One row of the outcome table: `[lo, hi)` on the unit interval.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct EventBand {
    pub outcome: EventOutcome,
    pub lo: f64,
    pub hi: f64,
    /// Seconds the condition stays active; 0 for one-shots.
    pub duration_s: f64,
}

impl EventBand {
    fn contains(&self, dice: f64) -> bool {
        dice >= self.lo && dice < self.hi
    }
}

#[derive(Debug, Clone)]
pub struct EventTable {
    bands: Vec<EventBand>,
}

impl EventTable {
    /// The standard injection policy, in priority order.
    pub fn standard() -> Self {
        Self {
            bands: vec![
                EventBand { outcome: EventOutcome::Diversion, lo: 0.92, hi: 1.0, duration_s: 12.0 },
                EventBand { outcome: EventOutcome::SuddenStop, lo: 0.0, hi: 0.08, duration_s: 4.0 },
                EventBand { outcome: EventOutcome::GpsOutage, lo: 0.40, hi: 0.45, duration_s: 5.0 },
                EventBand { outcome: EventOutcome::Overspeed, lo: 0.80, hi: 0.85, duration_s: 0.0 },
            ],
        }
    }

    pub fn from_bands(bands: Vec<EventBand>) -> Self {
        Self { bands }
    }

    pub fn bands(&self) -> &[EventBand] {
        &self.bands
    }

    /// Pick the first band containing `dice` whose outcome is not blocked.
    /// At most one outcome fires per draw.
    pub fn draw(&self, dice: f64, blocked: impl Fn(EventOutcome) -> bool) -> Option<EventBand> {
        self.bands
            .iter()
            .find(|band| band.contains(dice) && !blocked(band.outcome))
            .copied()
    }

    /// True if no two bands overlap on the unit interval.
    pub fn bands_disjoint(&self) -> bool {
        for (i, a) in self.bands.iter().enumerate() {
            for b in self.bands.iter().skip(i + 1) {
                if a.lo < b.hi && b.lo < a.hi {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_bands_are_disjoint() {
        assert!(EventTable::standard().bands_disjoint());
    }

    #[test]
    fn dice_maps_to_expected_outcomes() {
        let table = EventTable::standard();
        let free = |_| false;
        assert_eq!(table.draw(0.95, free).map(|b| b.outcome), Some(EventOutcome::Diversion));
        assert_eq!(table.draw(0.05, free).map(|b| b.outcome), Some(EventOutcome::SuddenStop));
        assert_eq!(table.draw(0.42, free).map(|b| b.outcome), Some(EventOutcome::GpsOutage));
        assert_eq!(table.draw(0.83, free).map(|b| b.outcome), Some(EventOutcome::Overspeed));
        assert!(table.draw(0.60, free).is_none());
    }

    #[test]
    fn active_outcome_never_retriggers() {
        let table = EventTable::standard();
        let diversion_active = |o| o == EventOutcome::Diversion;
        assert!(table.draw(0.95, diversion_active).is_none());
        // Other bands still fire.
        assert_eq!(
            table.draw(0.42, diversion_active).map(|b| b.outcome),
            Some(EventOutcome::GpsOutage)
        );
    }

    #[test]
    fn durations_match_reference_scale() {
        let table = EventTable::standard();
        let dur = |o| table.bands().iter().find(|b| b.outcome == o).map(|b| b.duration_s);
        assert_eq!(dur(EventOutcome::Diversion), Some(12.0));
        assert_eq!(dur(EventOutcome::SuddenStop), Some(4.0));
        assert_eq!(dur(EventOutcome::GpsOutage), Some(5.0));
        assert_eq!(dur(EventOutcome::Overspeed), Some(0.0));
    }
}

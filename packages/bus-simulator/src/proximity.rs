//! proximity.rs — Geofence proximity classification
//!
//! Two radii around each point of interest: a wide "near" radius that only
//! influences the speed model, and a strict "enter" radius that raises a
//! geofence alert. Entry is reported for student homes only, and repeat
//! suppression while already inside a zone is the caller's job (gated on the
//! active popup).

use fleet_types::Point;
use serde::Deserialize;

/// Distance under which the vehicle counts as near a point of interest.
pub const NEAR_RADIUS: f64 = 50.0;
/// Distance under which the vehicle has entered a student geofence zone.
pub const ENTER_RADIUS: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PoiKind {
    /// A student pickup point; `student` names the child for alerts.
    StudentHome { student: String },
    School,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PointOfInterest {
    pub id: String,
    pub label: String,
    pub pos: Point,
    #[serde(flatten)]
    pub kind: PoiKind,
}

impl PointOfInterest {
    pub fn student_home(id: &str, label: &str, student: &str, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            pos: Point::new(x, y),
            kind: PoiKind::StudentHome { student: student.into() },
        }
    }

    pub fn school(id: &str, label: &str, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            pos: Point::new(x, y),
            kind: PoiKind::School,
        }
    }

    pub fn student_name(&self) -> Option<&str> {
        match &self.kind {
            PoiKind::StudentHome { student } => Some(student),
            PoiKind::School => None,
        }
    }
}

/// Result of one proximity pass.
#[derive(Debug, Clone, Copy)]
pub struct Proximity<'a> {
    /// True if any point of interest (student or school) is within the near
    /// radius; drives the speed model's slowdown.
    pub any_near: bool,
    /// First student home within the enter radius, if any.
    pub entered: Option<&'a PointOfInterest>,
}

/// Classify the vehicle position against all points of interest.
pub fn classify<'a>(
    point: Point,
    pois: &'a [PointOfInterest],
    near_radius: f64,
    enter_radius: f64,
) -> Proximity<'a> {
    let mut any_near = false;
    let mut entered = None;
    for poi in pois {
        let d = point.dist(&poi.pos);
        if d < near_radius {
            any_near = true;
        }
        if entered.is_none()
            && d < enter_radius
            && matches!(poi.kind, PoiKind::StudentHome { .. })
        {
            entered = Some(poi);
        }
    }
    Proximity { any_near, entered }
}

/// The default roster: four student homes plus the school.
pub fn default_pois() -> Vec<PointOfInterest> {
    vec![
        PointOfInterest::student_home("s1", "Emma's Home", "Emma", 200.0, 215.0),
        PointOfInterest::student_home("s2", "Noah's Home", "Noah", 400.0, 385.0),
        PointOfInterest::student_home("s3", "Olivia's Home", "Olivia", 600.0, 215.0),
        PointOfInterest::student_home("s4", "Liam's Home", "Liam", 400.0, 115.0),
        PointOfInterest::school("school", "Central School", 100.0, 485.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn near_is_wider_than_enter() {
        let pois = default_pois();
        // 30 units from Emma's home: near but not entered.
        let p = Point::new(230.0, 215.0);
        let prox = classify(p, &pois, NEAR_RADIUS, ENTER_RADIUS);
        assert!(prox.any_near);
        assert!(prox.entered.is_none());
    }

    #[test]
    fn entry_reports_the_student() {
        let pois = default_pois();
        let p = Point::new(205.0, 215.0);
        let prox = classify(p, &pois, NEAR_RADIUS, ENTER_RADIUS);
        assert!(prox.any_near);
        assert_eq!(prox.entered.and_then(|poi| poi.student_name()), Some("Emma"));
    }

    #[test]
    fn school_never_counts_as_entered() {
        let pois = default_pois();
        // On top of the school.
        let p = Point::new(100.0, 485.0);
        let prox = classify(p, &pois, NEAR_RADIUS, ENTER_RADIUS);
        assert!(prox.any_near);
        assert!(prox.entered.is_none());
    }

    #[test]
    fn far_from_everything() {
        let pois = default_pois();
        let prox = classify(Point::new(-500.0, -500.0), &pois, NEAR_RADIUS, ENTER_RADIUS);
        assert!(!prox.any_near);
        assert!(prox.entered.is_none());
    }
}

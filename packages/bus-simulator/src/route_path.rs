//! route_path.rs — Route geometry
//!
//! Routes are authored as SVG-subset path strings (the same strings the
//! dashboard overlays draw), parsed into a piecewise-linear polyline with
//! cumulative arc lengths. Sampling is pure: a normalized progress value in
//! [0,1] maps to a point by arc-length interpolation, and the forward tangent
//! comes from a second sample slightly ahead.

use fleet_types::Point;
use thiserror::Error;

/// Primary pickup loop.
pub const PRIMARY_ROUTE: &str =
    "M 100 485 V 400 H 200 V 200 H 300 V 100 H 500 V 200 H 600 V 400 H 400 V 500 H 700 V 100";

/// Road-work diversion variant of the primary loop.
pub const DIVERSION_ROUTE: &str =
    "M 100 485 V 400 H 200 V 200 H 300 V 100 H 500 V 200 H 600 V 400 H 400 V 450 H 350 V 550 H 700 V 100";

/// Progress lookahead used to estimate the forward tangent.
const TANGENT_EPSILON: f64 = 0.0005;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("path must begin with a move-to command")]
    MissingMoveTo,
    #[error("unsupported path command '{0}'")]
    UnsupportedCommand(char),
    #[error("malformed coordinate near '{0}'")]
    BadCoordinate(String),
    #[error("path has no length")]
    Degenerate,
}

/// Which of the two authored routes a vehicle is following.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteVariant {
    Primary,
    Diversion,
}

/// Piecewise-linear route path with precomputed arc lengths.
#[derive(Debug, Clone)]
pub struct RoutePath {
    points: Vec<Point>,
    /// Cumulative arc length at each vertex. Last entry = total length.
    cumulative: Vec<f64>,
    total_len: f64,
}

impl RoutePath {
    /// Parse an absolute-coordinate SVG path subset: `M x y`, `L x y`,
    /// `H x`, `V y`. Relative commands and curves are not supported.
    pub fn parse(d: &str) -> Result<Self, PathError> {
        let mut tokens = d.split_whitespace().peekable();
        let mut points: Vec<Point> = Vec::new();
        let mut cmd: Option<char> = None;

        let parse_num = |tok: &str| -> Result<f64, PathError> {
            tok.parse::<f64>()
                .map_err(|_| PathError::BadCoordinate(tok.to_string()))
        };

        while let Some(tok) = tokens.next() {
            if tok.len() == 1 && tok.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
                cmd = Some(tok.chars().next().unwrap_or_default());
                continue;
            }
            let cur = points.last().copied();
            match cmd {
                Some('M') | Some('L') => {
                    if cmd == Some('L') && cur.is_none() {
                        return Err(PathError::MissingMoveTo);
                    }
                    let x = parse_num(tok)?;
                    let y = match tokens.next() {
                        Some(t) => parse_num(t)?,
                        None => return Err(PathError::BadCoordinate(tok.to_string())),
                    };
                    points.push(Point::new(x, y));
                }
                Some('H') => {
                    let cur = cur.ok_or(PathError::MissingMoveTo)?;
                    points.push(Point::new(parse_num(tok)?, cur.y));
                }
                Some('V') => {
                    let cur = cur.ok_or(PathError::MissingMoveTo)?;
                    points.push(Point::new(cur.x, parse_num(tok)?));
                }
                Some(c) => return Err(PathError::UnsupportedCommand(c)),
                None => return Err(PathError::MissingMoveTo),
            }
        }

        if points.len() < 2 {
            return Err(PathError::Degenerate);
        }

        let mut cumulative = Vec::with_capacity(points.len());
        let mut total = 0.0;
        cumulative.push(0.0);
        for w in points.windows(2) {
            total += w[0].dist(&w[1]);
            cumulative.push(total);
        }
        if total <= 0.0 {
            return Err(PathError::Degenerate);
        }

        Ok(Self { points, cumulative, total_len: total })
    }

    pub fn total_length(&self) -> f64 {
        self.total_len
    }

    pub fn start(&self) -> Point {
        self.points[0]
    }

    /// Point at a normalized progress value. Input is clamped into [0,1]
    /// before sampling, so there is no invalid-progress error path.
    pub fn point_at(&self, progress: f64) -> Point {
        let target = progress.clamp(0.0, 1.0) * self.total_len;
        // cumulative is sorted; find the segment containing target.
        let idx = match self
            .cumulative
            .binary_search_by(|len| len.partial_cmp(&target).unwrap_or(std::cmp::Ordering::Less))
        {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        if idx + 1 >= self.points.len() {
            return self.points[self.points.len() - 1];
        }
        let seg_start = self.cumulative[idx];
        let seg_len = self.cumulative[idx + 1] - seg_start;
        let t = if seg_len > 0.0 { (target - seg_start) / seg_len } else { 0.0 };
        let a = self.points[idx];
        let b = self.points[idx + 1];
        Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
    }

    /// Sample the path: returns the point at `progress` and the forward
    /// tangent angle in degrees, taken from a lookahead sample clamped to 1.
    pub fn sample(&self, progress: f64) -> (Point, f64) {
        let p = self.point_at(progress);
        let ahead = self.point_at((progress.clamp(0.0, 1.0) + TANGENT_EPSILON).min(1.0));
        let angle = (ahead.y - p.y).atan2(ahead.x - p.x).to_degrees();
        (p, angle)
    }
}

// ── Progress cursor ───────────────────────────────────────────────────────────

/// Normalized position along the route, always in [0,1). Wraps each lap.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressCursor(f64);

impl ProgressCursor {
    pub fn new() -> Self {
        Self(0.0)
    }

    pub fn get(&self) -> f64 {
        self.0
    }

    /// Advance by `delta` laps, wrapping modulo 1. Result never leaves [0,1).
    pub fn advance(&mut self, delta: f64) {
        self.0 = (self.0 + delta).rem_euclid(1.0);
        if self.0 >= 1.0 {
            self.0 = 0.0;
        }
    }

    pub fn reset(&mut self) {
        self.0 = 0.0;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Distance from a point to the nearest segment of the polyline.
    fn dist_to_path(path: &RoutePath, p: Point) -> f64 {
        path.points
            .windows(2)
            .map(|w| {
                let (a, b) = (w[0], w[1]);
                let len2 = (b.x - a.x).powi(2) + (b.y - a.y).powi(2);
                if len2 == 0.0 {
                    return p.dist(&a);
                }
                let t = (((p.x - a.x) * (b.x - a.x) + (p.y - a.y) * (b.y - a.y)) / len2)
                    .clamp(0.0, 1.0);
                p.dist(&Point::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y)))
            })
            .fold(f64::INFINITY, f64::min)
    }

    #[test]
    fn sample_at_zero_is_path_start() {
        let path = RoutePath::parse(PRIMARY_ROUTE).unwrap();
        let (p, angle) = path.sample(0.0);
        assert_eq!(p, Point::new(100.0, 485.0));
        assert!(angle.is_finite());
    }

    #[test]
    fn sampled_points_lie_on_the_path() {
        let path = RoutePath::parse(PRIMARY_ROUTE).unwrap();
        for i in 0..100 {
            let progress = i as f64 / 100.0;
            let (p, angle) = path.sample(progress);
            assert!(dist_to_path(&path, p) < 1e-6, "off-path at progress {progress}");
            assert!(angle.is_finite());
        }
    }

    #[test]
    fn out_of_range_progress_is_clamped() {
        let path = RoutePath::parse(PRIMARY_ROUTE).unwrap();
        assert_eq!(path.point_at(-0.5), path.start());
        let end = path.point_at(1.0);
        assert_eq!(path.point_at(2.0), end);
    }

    #[test]
    fn diversion_route_parses_and_differs() {
        let primary = RoutePath::parse(PRIMARY_ROUTE).unwrap();
        let diversion = RoutePath::parse(DIVERSION_ROUTE).unwrap();
        assert_eq!(diversion.start(), primary.start());
        assert!((diversion.total_length() - primary.total_length()).abs() > 1.0);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(RoutePath::parse("H 100"), Err(PathError::MissingMoveTo)));
        assert!(matches!(RoutePath::parse("M 1 2 Q 3 4"), Err(PathError::UnsupportedCommand('Q'))));
        assert!(matches!(RoutePath::parse("M 1 x"), Err(PathError::BadCoordinate(_))));
        assert!(matches!(RoutePath::parse("M 1 2"), Err(PathError::Degenerate)));
    }

    #[test]
    fn cursor_wraps_modulo_one() {
        let mut cursor = ProgressCursor::new();
        cursor.advance(0.999);
        cursor.advance(0.01);
        assert!((cursor.get() - 0.009).abs() < 1e-9);
        assert!(cursor.get() >= 0.0 && cursor.get() < 1.0);

        // Exact lap boundary lands back on zero.
        let mut cursor = ProgressCursor::new();
        cursor.advance(1.0);
        assert_eq!(cursor.get(), 0.0);
    }
}

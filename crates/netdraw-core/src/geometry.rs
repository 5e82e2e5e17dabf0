// ── Geometry helpers ──
//
// Pure math used by hit-testing, interface dots, stream arcs and
// viewport fitting. Coordinates are virtual (unscaled) canvas units
// unless a function says otherwise.

use serde::{Deserialize, Serialize};

/// A point in canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        distance(self.x, self.y, other.x, other.y)
    }
}

/// An axis-aligned rectangle given by two corners in any order.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Rect {
    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn left(&self) -> f64 {
        self.x1.min(self.x2)
    }

    pub fn right(&self) -> f64 {
        self.x1.max(self.x2)
    }

    pub fn top(&self) -> f64 {
        self.y1.min(self.y2)
    }

    pub fn bottom(&self) -> f64 {
        self.y1.max(self.y2)
    }

    pub fn width(&self) -> f64 {
        self.right() - self.left()
    }

    pub fn height(&self) -> f64 {
        self.bottom() - self.top()
    }

    /// Same extent with `x1 <= x2` and `y1 <= y2`.
    pub fn normalized(&self) -> Rect {
        Rect::new(self.left(), self.top(), self.right(), self.bottom())
    }

    /// Strict containment: points on the border are outside.
    pub fn contains_strict(&self, x: f64, y: f64) -> bool {
        x > self.left() && x < self.right() && y > self.top() && y < self.bottom()
    }

    /// Inclusive containment, grown by `margin` on every side.
    pub fn contains_with_margin(&self, x: f64, y: f64, margin: f64) -> bool {
        x >= self.left() - margin
            && x <= self.right() + margin
            && y >= self.top() - margin
            && y <= self.bottom() + margin
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x1 + dx, self.y1 + dy, self.x2 + dx, self.y2 + dy)
    }

    /// True when `(x, y)` is within `tolerance` of any of the four edges.
    pub fn on_border(&self, x: f64, y: f64, tolerance: f64) -> bool {
        if !self.contains_with_margin(x, y, tolerance) {
            return false;
        }
        (x - self.left()).abs() < tolerance
            || (x - self.right()).abs() < tolerance
            || (y - self.top()).abs() < tolerance
            || (y - self.bottom()).abs() < tolerance
    }
}

// ── Scalar helpers ───────────────────────────────────────────────────

pub fn distance(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    (x2 - x1).hypot(y2 - y1)
}

/// Shortest distance from `p` to the segment `a`–`b`.
pub fn point_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq < f64::EPSILON {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    p.distance(Point::new(a.x + t * dx, a.y + t * dy))
}

/// Angle of the vector from `from` to `to`, in radians.
pub fn slope_angle(from: Point, to: Point) -> f64 {
    (to.y - from.y).atan2(to.x - from.x)
}

pub fn polar_to_cartesian(center: Point, radius: f64, angle: f64) -> Point {
    Point::new(
        center.x + radius * angle.cos(),
        center.y + radius * angle.sin(),
    )
}

pub fn cartesian_to_polar(center: Point, p: Point) -> (f64, f64) {
    (center.distance(p), slope_angle(center, p))
}

/// Point where the segment from `center` towards `toward` crosses the
/// circle of `radius` around `center`. Degenerates to `center`.
pub fn circle_exit(center: Point, radius: f64, toward: Point) -> Point {
    if center.distance(toward) < f64::EPSILON {
        return center;
    }
    polar_to_cartesian(center, radius, slope_angle(center, toward))
}

/// Intersection of segments `a1`–`a2` and `b1`–`b2`, if they cross.
pub fn segment_intersection(a1: Point, a2: Point, b1: Point, b2: Point) -> Option<Point> {
    let d = (a2.x - a1.x) * (b2.y - b1.y) - (a2.y - a1.y) * (b2.x - b1.x);
    if d.abs() < f64::EPSILON {
        return None;
    }
    let t = ((b1.x - a1.x) * (b2.y - b1.y) - (b1.y - a1.y) * (b2.x - b1.x)) / d;
    let u = ((b1.x - a1.x) * (a2.y - a1.y) - (b1.y - a1.y) * (a2.x - a1.x)) / d;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(Point::new(a1.x + t * (a2.x - a1.x), a1.y + t * (a2.y - a1.y)))
    } else {
        None
    }
}

/// Control point of a quadratic arc between `from` and `to`, pushed
/// sideways from the midpoint by `offset` units.
pub fn arc_control_point(from: Point, to: Point, offset: f64) -> Point {
    let mid = Point::new((from.x + to.x) / 2.0, (from.y + to.y) / 2.0);
    let normal = slope_angle(from, to) - std::f64::consts::FRAC_PI_2;
    polar_to_cartesian(mid, offset, normal)
}

/// Linear interpolation between `a` and `b` at `t` in `[0, 1]`.
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn point_segment_distance_clamps_to_endpoints() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        assert!((point_segment_distance(Point::new(5.0, 3.0), a, b) - 3.0).abs() < EPS);
        assert!((point_segment_distance(Point::new(-4.0, 3.0), a, b) - 5.0).abs() < EPS);
        assert!((point_segment_distance(Point::new(1.0, 1.0), a, a) - 2f64.sqrt()).abs() < EPS);
    }

    #[test]
    fn strict_containment_excludes_border() {
        let r = Rect::new(100.0, 100.0, 0.0, 0.0);
        assert!(r.contains_strict(50.0, 50.0));
        assert!(!r.contains_strict(0.0, 50.0));
        assert!(!r.contains_strict(150.0, 50.0));
        assert_eq!(r.normalized(), Rect::new(0.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn border_hit_needs_proximity_to_an_edge() {
        let r = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert!(r.on_border(5.0, 50.0, 10.0));
        assert!(r.on_border(50.0, 108.0, 10.0));
        assert!(!r.on_border(50.0, 50.0, 10.0));
        assert!(!r.on_border(50.0, 130.0, 10.0));
    }

    #[test]
    fn circle_exit_faces_target() {
        let p = circle_exit(Point::new(0.0, 0.0), 50.0, Point::new(200.0, 0.0));
        assert!((p.x - 50.0).abs() < EPS && p.y.abs() < EPS);
        let same = circle_exit(Point::new(3.0, 4.0), 50.0, Point::new(3.0, 4.0));
        assert_eq!(same, Point::new(3.0, 4.0));
    }

    #[test]
    fn segments_cross_or_not() {
        let hit = segment_intersection(
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 0.0),
        )
        .unwrap();
        assert!((hit.x - 5.0).abs() < EPS && (hit.y - 5.0).abs() < EPS);
        assert!(
            segment_intersection(
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(0.0, 1.0),
                Point::new(1.0, 1.0),
            )
            .is_none()
        );
    }

    #[test]
    fn arc_control_point_is_perpendicular() {
        let c = arc_control_point(Point::new(0.0, 0.0), Point::new(100.0, 0.0), 20.0);
        assert!((c.x - 50.0).abs() < EPS);
        assert!((c.y + 20.0).abs() < EPS);
        let (r, _) = cartesian_to_polar(Point::new(50.0, 0.0), c);
        assert!((r - 20.0).abs() < EPS);
    }
}

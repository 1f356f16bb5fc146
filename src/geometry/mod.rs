//! Geometry primitives shared by the mesh and curvilinear engines.
//!
//! All kernel geometry is two-dimensional `f64`. A [`Projection`] selects the
//! metric: planar (cartesian) or spherical (geographic longitude/latitude in
//! degrees). The projection is fixed per session at allocation time, so every
//! routine here takes it as an explicit argument rather than caching it.

pub mod polyline;

use serde::{Deserialize, Serialize};

use crate::error::MeshForgeError;

/// Tolerance below which lengths and areas are treated as degenerate.
pub const EPS: f64 = 1e-12;

/// Mean earth radius used by the spherical metric, in meters.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// A point in the two-dimensional computational plane.
///
/// Under [`Projection::Spherical`], `x` is longitude and `y` is latitude,
/// both in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Component-wise subtraction, yielding a displacement vector.
    #[inline]
    pub fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    /// Component-wise addition.
    #[inline]
    pub fn add(self, other: Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    /// Scale both components.
    #[inline]
    pub fn scale(self, factor: f64) -> Point {
        Point::new(self.x * factor, self.y * factor)
    }

    /// Euclidean norm of the point interpreted as a vector.
    #[inline]
    pub fn norm(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Both coordinates finite.
    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Dot product of two displacement vectors.
#[inline]
pub fn dot(a: Point, b: Point) -> f64 {
    a.x * b.x + a.y * b.y
}

/// Z-component of the cross product of two displacement vectors.
#[inline]
pub fn cross(a: Point, b: Point) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Linear interpolation between two points.
#[inline]
pub fn lerp(a: Point, b: Point, t: f64) -> Point {
    Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
}

/// Coordinate-system flag fixed at session allocation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Projection {
    /// Planar cartesian coordinates.
    #[default]
    Cartesian,
    /// Spherical coordinates (longitude/latitude, degrees).
    Spherical,
}

impl Projection {
    /// Distance between two points under this metric.
    ///
    /// Spherical distances use the haversine formula on [`EARTH_RADIUS`].
    pub fn distance(self, a: Point, b: Point) -> f64 {
        match self {
            Projection::Cartesian => a.sub(b).norm(),
            Projection::Spherical => {
                let phi1 = a.y.to_radians();
                let phi2 = b.y.to_radians();
                let dphi = (b.y - a.y).to_radians();
                let dlambda = (b.x - a.x).to_radians();
                let h = (dphi / 2.0).sin().powi(2)
                    + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
                2.0 * EARTH_RADIUS * h.sqrt().clamp(-1.0, 1.0).asin()
            }
        }
    }

    /// Squared distance; avoids the square root for cartesian comparisons.
    pub fn squared_distance(self, a: Point, b: Point) -> f64 {
        match self {
            Projection::Cartesian => {
                let d = a.sub(b);
                dot(d, d)
            }
            Projection::Spherical => {
                let d = self.distance(a, b);
                d * d
            }
        }
    }

    /// Midpoint of the segment `a`-`b`.
    ///
    /// Under the spherical metric the coordinate average is used, which is
    /// adequate for the cell-scale segments the kernel works with.
    pub fn midpoint(self, a: Point, b: Point) -> Point {
        Point::new((a.x + b.x) * 0.5, (a.y + b.y) * 0.5)
    }
}

/// Signed area of a closed polygon ring (positive when counter-clockwise).
///
/// The ring may or may not repeat its first point at the end.
pub fn signed_area(ring: &[Point]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    let n = ring.len();
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        sum += cross(a, b);
    }
    0.5 * sum
}

/// Area-weighted centroid of a polygon ring.
///
/// Falls back to the vertex average for (near-)degenerate rings.
pub fn mass_center(ring: &[Point]) -> Point {
    let area = signed_area(ring);
    if area.abs() <= EPS {
        return vertex_average(ring);
    }
    let n = ring.len();
    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        let w = cross(a, b);
        cx += (a.x + b.x) * w;
        cy += (a.y + b.y) * w;
    }
    let f = 1.0 / (6.0 * area);
    Point::new(cx * f, cy * f)
}

/// Plain average of the ring vertices.
pub fn vertex_average(ring: &[Point]) -> Point {
    if ring.is_empty() {
        return Point::default();
    }
    let mut sum = Point::default();
    for p in ring {
        sum = sum.add(*p);
    }
    sum.scale(1.0 / ring.len() as f64)
}

/// Circumcenter of the triangle `a`, `b`, `c`.
///
/// Returns an error when the triangle is (near-)collinear.
pub fn circumcenter(a: Point, b: Point, c: Point) -> Result<Point, MeshForgeError> {
    let d = 2.0 * cross(b.sub(a), c.sub(a));
    if d.abs() <= EPS {
        return Err(MeshForgeError::InvalidGeometry(
            "circumcenter of collinear triangle".into(),
        ));
    }
    let a2 = dot(a, a);
    let b2 = dot(b, b);
    let c2 = dot(c, c);
    let ux = (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d;
    let uy = (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d;
    Ok(Point::new(ux, uy))
}

/// Closest point to `p` on the segment `a`-`b`, with its parameter in `[0,1]`.
pub fn project_on_segment(p: Point, a: Point, b: Point) -> (Point, f64) {
    let ab = b.sub(a);
    let len2 = dot(ab, ab);
    if len2 <= EPS {
        return (a, 0.0);
    }
    let t = (dot(p.sub(a), ab) / len2).clamp(0.0, 1.0);
    (lerp(a, b, t), t)
}

/// Whether segments `a1`-`a2` and `b1`-`b2` properly intersect.
///
/// Shared endpoints do not count as an intersection.
pub fn segments_cross(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    let d1 = cross(a2.sub(a1), b1.sub(a1));
    let d2 = cross(a2.sub(a1), b2.sub(a1));
    let d3 = cross(b2.sub(b1), a1.sub(b1));
    let d4 = cross(b2.sub(b1), a2.sub(b1));
    d1 * d2 < -EPS && d3 * d4 < -EPS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cartesian_distance() {
        let p = Projection::Cartesian;
        assert!((p.distance(Point::new(0.0, 0.0), Point::new(3.0, 4.0)) - 5.0).abs() < EPS);
    }

    #[test]
    fn spherical_distance_quarter_meridian() {
        let p = Projection::Spherical;
        let d = p.distance(Point::new(0.0, 0.0), Point::new(0.0, 90.0));
        let expected = std::f64::consts::FRAC_PI_2 * EARTH_RADIUS;
        assert!((d - expected).abs() / expected < 1e-9);
    }

    #[test]
    fn unit_square_area_and_centroid() {
        let ring = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ];
        assert!((signed_area(&ring) - 1.0).abs() < EPS);
        let c = mass_center(&ring);
        assert!((c.x - 0.5).abs() < EPS && (c.y - 0.5).abs() < EPS);
    }

    #[test]
    fn circumcenter_of_right_triangle() {
        let c = circumcenter(
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(0.0, 2.0),
        )
        .unwrap();
        assert!((c.x - 1.0).abs() < EPS && (c.y - 1.0).abs() < EPS);
    }

    #[test]
    fn circumcenter_rejects_collinear() {
        let r = circumcenter(
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(2.0, 2.0),
        );
        assert!(matches!(r, Err(MeshForgeError::InvalidGeometry(_))));
    }

    #[test]
    fn segment_projection_clamps() {
        let (q, t) = project_on_segment(
            Point::new(5.0, 1.0),
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
        );
        assert_eq!(t, 1.0);
        assert!((q.x - 2.0).abs() < EPS);
    }

    #[test]
    fn crossing_segments_detected() {
        assert!(segments_cross(
            Point::new(0.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
            Point::new(2.0, 0.0),
        ));
        // Touching at an endpoint is not a crossing.
        assert!(!segments_cross(
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(1.0, 1.0),
            Point::new(2.0, 0.0),
        ));
    }
}

//! Flat geometry exchange lists and polygon/polyline queries.
//!
//! The boundary exchange format is a [`GeometryList`]: parallel `x`/`y`
//! (and optional `values`) arrays in which the reserved constant
//! [`SEPARATOR`] splits the sequence into independent parts, and
//! [`INNER_OUTER_SEPARATOR`] marks the transition from a polygon's outer
//! ring to its inner rings. Sentinels exist only in this exchange form:
//! unpacking produces explicit [`Polyline`] parts and [`Polygon`] rings,
//! and none of the kernel algorithms ever see a magic coordinate.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::MeshForgeError;
use crate::geometry::{EPS, Point, Projection, project_on_segment};

/// Reserved x/y value splitting a flat list into independent parts.
pub const SEPARATOR: f64 = -999.0;

/// Reserved x/y value separating a polygon's outer ring from inner rings.
pub const INNER_OUTER_SEPARATOR: f64 = -998.0;

/// Flat separator-delimited coordinate list, the boundary exchange form.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometryList {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// Optional per-coordinate values; either empty or coordinate-sized.
    pub values: Vec<f64>,
}

impl GeometryList {
    /// Build a list from coordinate arrays, validating the length invariants.
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, MeshForgeError> {
        Self::with_values(x, y, Vec::new())
    }

    /// Build a list carrying per-coordinate values.
    pub fn with_values(x: Vec<f64>, y: Vec<f64>, values: Vec<f64>) -> Result<Self, MeshForgeError> {
        if x.len() != y.len() {
            return Err(MeshForgeError::CoordinateLengthMismatch {
                x_len: x.len(),
                y_len: y.len(),
            });
        }
        if !values.is_empty() && values.len() != x.len() {
            return Err(MeshForgeError::ValuesLengthMismatch {
                values_len: values.len(),
                coordinate_len: x.len(),
            });
        }
        Ok(Self { x, y, values })
    }

    /// Number of coordinate entries, separators included.
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Split into explicit parts at [`SEPARATOR`] entries.
    ///
    /// Empty runs between consecutive separators are dropped. The
    /// inner/outer sentinel is treated as a part break here as well; use
    /// [`Polygon::from_geometry_list`] to retain ring roles.
    pub fn parts(&self) -> Vec<Polyline> {
        let mut parts = Vec::new();
        let mut current = Polyline::default();
        let has_values = !self.values.is_empty();
        for i in 0..self.x.len() {
            if is_separator(self.x[i]) {
                if !current.points.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
                continue;
            }
            current.points.push(Point::new(self.x[i], self.y[i]));
            if has_values {
                current.values.push(self.values[i]);
            }
        }
        if !current.points.is_empty() {
            parts.push(current);
        }
        parts
    }

    /// Flatten explicit parts back into the separator-delimited form.
    pub fn from_parts(parts: &[Polyline]) -> Self {
        let mut out = GeometryList::default();
        let carry_values = parts.iter().any(|p| !p.values.is_empty());
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                out.x.push(SEPARATOR);
                out.y.push(SEPARATOR);
                if carry_values {
                    out.values.push(SEPARATOR);
                }
            }
            for (j, p) in part.points.iter().enumerate() {
                out.x.push(p.x);
                out.y.push(p.y);
                if carry_values {
                    out.values.push(part.values.get(j).copied().unwrap_or(0.0));
                }
            }
        }
        out
    }
}

fn is_separator(v: f64) -> bool {
    (v - SEPARATOR).abs() <= EPS || (v - INNER_OUTER_SEPARATOR).abs() <= EPS
}

/// One explicit geometry part: an open polyline or closed ring.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    pub points: Vec<Point>,
    /// Per-point values; empty when the source list carried none.
    pub values: Vec<f64>,
}

impl Polyline {
    pub fn from_points(points: Vec<Point>) -> Self {
        Self {
            points,
            values: Vec::new(),
        }
    }

    /// Whether first and last point coincide.
    pub fn is_closed(&self) -> bool {
        match (self.points.first(), self.points.last()) {
            (Some(a), Some(b)) => a.sub(*b).norm() <= EPS,
            _ => false,
        }
    }

    /// Total length under the given metric.
    pub fn length(&self, projection: Projection) -> f64 {
        self.points
            .iter()
            .tuple_windows()
            .map(|(a, b)| projection.distance(*a, *b))
            .sum()
    }

    /// Index of the segment closest to `target` and the projected point.
    ///
    /// `None` for polylines with fewer than two points.
    pub fn closest_segment(&self, target: Point, projection: Projection) -> Option<(usize, Point)> {
        let mut best: Option<(usize, Point, f64)> = None;
        for (i, (a, b)) in self.points.iter().tuple_windows().enumerate() {
            let (q, _) = project_on_segment(target, *a, *b);
            let d = projection.squared_distance(target, q);
            if best.map_or(true, |(_, _, bd)| d < bd) {
                best = Some((i, q, d));
            }
        }
        best.map(|(i, q, _)| (i, q))
    }
}

/// Index of the point in `points` closest to `target` within `search_radius`.
///
/// `None` when nothing lies within the radius — a valid outcome, not a
/// failure.
pub fn closest_point_within(
    points: &[Point],
    target: Point,
    search_radius: f64,
    projection: Projection,
) -> Option<usize> {
    let limit = search_radius * search_radius;
    let mut best: Option<(usize, f64)> = None;
    for (i, p) in points.iter().enumerate() {
        let d = projection.squared_distance(target, *p);
        if d <= limit && best.map_or(true, |(_, bd)| d < bd) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}

/// A polygon with one outer ring and zero or more inner rings (holes).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Polygon {
    outer: Vec<Point>,
    inners: Vec<Vec<Point>>,
}

impl Polygon {
    /// Build from an explicit outer ring; the closing duplicate point, if
    /// present, is dropped.
    pub fn new(outer: Vec<Point>) -> Result<Self, MeshForgeError> {
        let outer = strip_closure(outer);
        if outer.len() < 3 {
            return Err(MeshForgeError::TooFewPoints {
                needed: 3,
                got: outer.len(),
            });
        }
        Ok(Self {
            outer,
            inners: Vec::new(),
        })
    }

    /// Interpret the first part of a geometry list as a polygon.
    ///
    /// Within the part, an [`INNER_OUTER_SEPARATOR`] entry switches from the
    /// outer ring to inner rings; subsequent [`SEPARATOR`] entries split
    /// further inner rings.
    pub fn from_geometry_list(list: &GeometryList) -> Result<Self, MeshForgeError> {
        let mut rings: Vec<Vec<Point>> = Vec::new();
        let mut current: Vec<Point> = Vec::new();
        for i in 0..list.x.len() {
            if is_separator(list.x[i]) {
                if !current.is_empty() {
                    rings.push(std::mem::take(&mut current));
                }
                continue;
            }
            current.push(Point::new(list.x[i], list.y[i]));
        }
        if !current.is_empty() {
            rings.push(current);
        }
        let mut rings = rings.into_iter();
        let outer = rings
            .next()
            .ok_or(MeshForgeError::TooFewPoints { needed: 3, got: 0 })?;
        let mut polygon = Polygon::new(outer)?;
        for ring in rings {
            let ring = strip_closure(ring);
            if ring.len() >= 3 {
                polygon.inners.push(ring);
            }
        }
        Ok(polygon)
    }

    /// The outer ring, without closing duplicate.
    #[inline]
    pub fn outer(&self) -> &[Point] {
        &self.outer
    }

    /// Point-in-polygon test honoring inner rings.
    pub fn contains(&self, p: Point) -> bool {
        if !ring_contains(&self.outer, p) {
            return false;
        }
        !self.inners.iter().any(|ring| ring_contains(ring, p))
    }

    /// Closest point on the polygon perimeter (outer ring only).
    pub fn project_to_perimeter(&self, p: Point, projection: Projection) -> Point {
        let mut best = self.outer[0];
        let mut best_d = f64::INFINITY;
        let n = self.outer.len();
        for i in 0..n {
            let a = self.outer[i];
            let b = self.outer[(i + 1) % n];
            let (q, _) = project_on_segment(p, a, b);
            let d = projection.squared_distance(p, q);
            if d < best_d {
                best_d = d;
                best = q;
            }
        }
        best
    }
}

fn strip_closure(mut ring: Vec<Point>) -> Vec<Point> {
    if ring.len() >= 2 {
        let first = ring[0];
        let last = ring[ring.len() - 1];
        if first.sub(last).norm() <= EPS {
            ring.pop();
        }
    }
    ring
}

/// Even-odd crossing test against a single ring (no closing duplicate).
fn ring_contains(ring: &[Point], p: Point) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let a = ring[i];
        let b = ring[j];
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Resample the perimeter interval of `polygon` between vertex indices
/// `first` and `second` so that no sub-edge exceeds `target_edge_length`.
///
/// The remainder of the perimeter is carried over unchanged; the result is
/// the refined closed ring.
pub fn refine_polygon_interval(
    polygon: &Polygon,
    first: usize,
    second: usize,
    target_edge_length: f64,
    projection: Projection,
) -> Result<Polyline, MeshForgeError> {
    let ring = polygon.outer();
    let n = ring.len();
    if first >= n || second >= n {
        return Err(MeshForgeError::NodeIndexOutOfRange {
            index: first.max(second) as i64,
            count: n,
        });
    }
    if target_edge_length <= EPS {
        return Err(MeshForgeError::InvalidParameter {
            name: "target_edge_length",
            reason: "must be positive",
        });
    }
    let mut out: Vec<Point> = Vec::new();
    let mut i = first;
    loop {
        let a = ring[i];
        let next = (i + 1) % n;
        let b = ring[next];
        out.push(a);
        let within_interval = interval_contains(first, second, i, n);
        if within_interval {
            let len = projection.distance(a, b);
            let pieces = (len / target_edge_length).ceil().max(1.0) as usize;
            for k in 1..pieces {
                out.push(crate::geometry::lerp(a, b, k as f64 / pieces as f64));
            }
        }
        if next == first {
            break;
        }
        i = next;
    }
    // Close the ring explicitly.
    out.push(ring[first]);
    Ok(Polyline::from_points(out))
}

/// Whether edge starting at vertex `i` lies on the perimeter walk from
/// `first` to `second` (circular, in index order).
fn interval_contains(first: usize, second: usize, i: usize, n: usize) -> bool {
    let span = (second + n - first) % n;
    let offset = (i + n - first) % n;
    offset < span
}

/// Mark which points of `selected` fall inside `selecting`.
///
/// Returns a copy of `selected` whose `values` hold 1.0 for selected points
/// and 0.0 otherwise; separator entries keep the separator value.
pub fn points_in_polygon(
    selecting: &Polygon,
    selected: &GeometryList,
) -> Result<GeometryList, MeshForgeError> {
    let mut out = selected.clone();
    out.values = Vec::with_capacity(selected.len());
    for i in 0..selected.len() {
        if is_separator(selected.x[i]) {
            out.values.push(SEPARATOR);
        } else if selecting.contains(Point::new(selected.x[i], selected.y[i])) {
            out.values.push(1.0);
        } else {
            out.values.push(0.0);
        }
    }
    Ok(out)
}

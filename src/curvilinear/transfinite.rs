//! Transfinite (Coons patch) curvilinear grid generation.
//!
//! The interior of the grid blends the four boundary-curve
//! parameterizations along both grid axes. Boundary curves come from
//! spline parts, polygon perimeter intervals, or a triangle perimeter with
//! a split third side.

use crate::error::MeshForgeError;
use crate::geometry::polyline::{Polygon, Polyline};
use crate::geometry::{Point, Projection, lerp};
use crate::params::CurvilinearParameters;
use crate::spline::{evaluate_spline, resample};

use super::CurvilinearGrid;

/// Interpolated points per control-point segment when discretizing
/// boundary splines ahead of arc-length resampling.
const SPLINE_DENSITY: usize = 20;

/// Generate a grid from four boundary splines.
///
/// The first two parts are opposite boundaries discretized to
/// `n_refinement + 1` points, the last two the cross boundaries at
/// `m_refinement + 1`; extra parts are ignored.
pub fn from_splines(
    parts: &[Polyline],
    params: &CurvilinearParameters,
    projection: Projection,
) -> Result<CurvilinearGrid, MeshForgeError> {
    params.validate()?;
    if parts.len() < 4 {
        return Err(MeshForgeError::TooFewPoints {
            needed: 4,
            got: parts.len(),
        });
    }
    if parts.len() > 4 {
        log::warn!(
            "spline transfinite generation uses 4 boundary splines, ignoring {} extra",
            parts.len() - 4
        );
    }
    let num_n = params.n_refinement + 1;
    let num_m = params.m_refinement + 1;

    let bottom = discretize(&parts[0], num_n, projection)?;
    let mut top = discretize(&parts[1], num_n, projection)?;
    let mut left = discretize(&parts[2], num_m, projection)?;
    let mut right = discretize(&parts[3], num_m, projection)?;

    // Orient all four curves consistently with the bottom spline.
    if projection.distance(bottom[0], top[0]) > projection.distance(bottom[0], top[num_n - 1]) {
        top.reverse();
    }
    if projection.distance(bottom[0], left[0]) > projection.distance(bottom[0], left[num_m - 1]) {
        left.reverse();
    }
    let far = bottom[num_n - 1];
    if projection.distance(far, right[0]) > projection.distance(far, right[num_m - 1]) {
        right.reverse();
    }

    let mut grid = transfinite(&bottom, &top, &left, &right)?;
    smooth_interior(
        &mut grid,
        params.smoothing_iterations,
        params.smoothing_parameter,
    );
    Ok(grid)
}

/// Generate a grid over a polygon perimeter from three or four corners.
///
/// With `use_fourth_side` the fourth corner is implied opposite `node1`
/// such that opposite perimeter intervals pair up; otherwise the interval
/// from `node3` back to `node1` is split at its middle into the remaining
/// two sides.
pub fn from_polygon(
    polygon: &Polygon,
    node1: usize,
    node2: usize,
    node3: usize,
    use_fourth_side: bool,
    projection: Projection,
) -> Result<CurvilinearGrid, MeshForgeError> {
    let ring = polygon.outer();
    let len = ring.len();
    for &corner in &[node1, node2, node3] {
        if corner >= len {
            return Err(MeshForgeError::NodeIndexOutOfRange {
                index: corner as i64,
                count: len,
            });
        }
    }
    let count1 = circular_steps(node1, node2, len);
    let count2 = circular_steps(node2, node3, len);
    if count1 == 0 || count2 == 0 {
        return Err(MeshForgeError::InvalidGeometry(
            "polygon corners must be distinct".into(),
        ));
    }
    let p = count1 + 1;
    let q = count2 + 1;

    let bottom = perimeter_interval(ring, node1, node2);
    let right = perimeter_interval(ring, node2, node3);

    let (top, left) = if use_fourth_side {
        let node4 = (node3 + count1) % len;
        let count4 = circular_steps(node4, node1, len);
        if count4 != count2 {
            return Err(MeshForgeError::InvalidGeometry(format!(
                "opposite polygon sides do not pair up: {count2} vs {count4} intervals"
            )));
        }
        let top_rev = perimeter_interval(ring, node3, node4);
        let left_rev = perimeter_interval(ring, node4, node1);
        (reversed(top_rev), reversed(left_rev))
    } else {
        let count3 = circular_steps(node3, node1, len);
        if count3 < 2 {
            return Err(MeshForgeError::InvalidGeometry(
                "closing interval too short to split into two sides".into(),
            ));
        }
        let third = perimeter_interval(ring, node3, node1);
        let mid = third.len() / 2;
        let top = resample(&reversed(third[..=mid].to_vec()), p, projection)?;
        let left = resample(&reversed(third[mid..].to_vec()), q, projection)?;
        (top, left)
    };

    let top = resample(&top, p, projection)?;
    let left = resample(&left, q, projection)?;
    transfinite(&bottom, &top, &left, &right)
}

/// Generate a grid over a triangular perimeter; the third side is split to
/// act as both the top and left boundary, collapsing one grid corner.
pub fn from_triangle(
    polygon: &Polygon,
    node1: usize,
    node2: usize,
    node3: usize,
    projection: Projection,
) -> Result<CurvilinearGrid, MeshForgeError> {
    let ring = polygon.outer();
    let len = ring.len();
    for &corner in &[node1, node2, node3] {
        if corner >= len {
            return Err(MeshForgeError::NodeIndexOutOfRange {
                index: corner as i64,
                count: len,
            });
        }
    }
    let count1 = circular_steps(node1, node2, len);
    let count2 = circular_steps(node2, node3, len);
    if count1 == 0 || count2 == 0 {
        return Err(MeshForgeError::InvalidGeometry(
            "triangle corners must be distinct".into(),
        ));
    }
    let p = count1 + 1;
    let q = count2 + 1;

    let bottom = perimeter_interval(ring, node1, node2);
    let right = perimeter_interval(ring, node2, node3);
    let third = resample(
        &perimeter_interval(ring, node3, node1),
        p + q - 1,
        projection,
    )?;
    let top = reversed(third[..p].to_vec());
    let left = reversed(third[p - 1..].to_vec());
    transfinite(&bottom, &top, &left, &right)
}

/// Coons patch blend of four boundary curves.
///
/// `bottom`/`top` must share a length (`num_n`), as must `left`/`right`
/// (`num_m`); the four corner mismatches are distributed linearly over the
/// curves before blending.
pub(crate) fn transfinite(
    bottom: &[Point],
    top: &[Point],
    left: &[Point],
    right: &[Point],
) -> Result<CurvilinearGrid, MeshForgeError> {
    let num_n = bottom.len();
    let num_m = left.len();
    if top.len() != num_n || right.len() != num_m {
        return Err(MeshForgeError::InvalidGeometry(format!(
            "boundary curve lengths mismatch: bottom {num_n} vs top {}, left {num_m} vs right {}",
            top.len(),
            right.len()
        )));
    }
    if num_n < 2 || num_m < 2 {
        return Err(MeshForgeError::InvalidGeometry(
            "transfinite boundaries need at least 2 points each".into(),
        ));
    }

    // Consistent corners: average each pair of adjacent curve endpoints,
    // then snap the curves onto them.
    let c00 = bottom[0].add(left[0]).scale(0.5);
    let c01 = bottom[num_n - 1].add(right[0]).scale(0.5);
    let c10 = top[0].add(left[num_m - 1]).scale(0.5);
    let c11 = top[num_n - 1].add(right[num_m - 1]).scale(0.5);
    let bottom = snap_ends(bottom, c00, c01);
    let top = snap_ends(top, c10, c11);
    let left = snap_ends(left, c00, c10);
    let right = snap_ends(right, c01, c11);

    let mut rows: Vec<Vec<Option<Point>>> = Vec::with_capacity(num_m);
    for i in 0..num_m {
        let v = i as f64 / (num_m - 1) as f64;
        let mut row = Vec::with_capacity(num_n);
        for (j, (&b, &t)) in bottom.iter().zip(top.iter()).enumerate() {
            let u = j as f64 / (num_n - 1) as f64;
            let linear = b.scale(1.0 - v).add(t.scale(v)).add(
                left[i].scale(1.0 - u).add(right[i].scale(u)),
            );
            let corner = c00
                .scale((1.0 - u) * (1.0 - v))
                .add(c01.scale(u * (1.0 - v)))
                .add(c10.scale((1.0 - u) * v))
                .add(c11.scale(u * v));
            row.push(Some(linear.sub(corner)));
        }
        rows.push(row);
    }
    CurvilinearGrid::from_rows(rows)
}

/// Distribute endpoint mismatch linearly along a curve.
fn snap_ends(curve: &[Point], start: Point, end: Point) -> Vec<Point> {
    let n = curve.len();
    let d0 = start.sub(curve[0]);
    let d1 = end.sub(curve[n - 1]);
    curve
        .iter()
        .enumerate()
        .map(|(k, &p)| {
            let t = k as f64 / (n - 1) as f64;
            p.add(d0.scale(1.0 - t)).add(d1.scale(t))
        })
        .collect()
}

/// Spline-interpolate a part's control points and resample to `count`.
fn discretize(
    part: &Polyline,
    count: usize,
    projection: Projection,
) -> Result<Vec<Point>, MeshForgeError> {
    if part.points.len() < 2 {
        return Err(MeshForgeError::TooFewPoints {
            needed: 2,
            got: part.points.len(),
        });
    }
    let dense = evaluate_spline(&part.points, SPLINE_DENSITY);
    resample(&dense, count, projection)
}

fn circular_steps(from: usize, to: usize, len: usize) -> usize {
    (to + len - from) % len
}

/// Perimeter points walking circularly from `from` to `to`, inclusive.
fn perimeter_interval(ring: &[Point], from: usize, to: usize) -> Vec<Point> {
    let len = ring.len();
    let steps = circular_steps(from, to, len);
    (0..=steps).map(|k| ring[(from + k) % len]).collect()
}

fn reversed(mut points: Vec<Point>) -> Vec<Point> {
    points.reverse();
    points
}

/// Laplacian relaxation of interior nodes, under-relaxed by `weight`.
fn smooth_interior(grid: &mut CurvilinearGrid, iterations: usize, weight: f64) {
    let (num_m, num_n) = grid.dimensions();
    for _ in 0..iterations {
        for m in 1..num_m.saturating_sub(1) {
            for n in 1..num_n.saturating_sub(1) {
                let (Some(center), Some(a), Some(b), Some(c), Some(d)) = (
                    grid.node(m, n),
                    grid.node(m - 1, n),
                    grid.node(m + 1, n),
                    grid.node(m, n - 1),
                    grid.node(m, n + 1),
                ) else {
                    continue;
                };
                let average = a.add(b).add(c).add(d).scale(0.25);
                grid.set_node(m, n, Some(lerp(center, average, weight)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::polyline::Polyline;

    fn part(points: &[(f64, f64)]) -> Polyline {
        Polyline::from_points(points.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    #[test]
    fn splines_produce_requested_resolution() {
        let parts = vec![
            part(&[(2.0, 1.0), (4.0, 3.0), (7.0, 4.0)]),
            part(&[(-1.0, 4.0), (1.0, 6.0), (5.0, 7.0)]),
            part(&[(3.0, 1.0), (-2.0, 6.0)]),
            part(&[(7.0, 3.0), (4.0, 8.0)]),
        ];
        let params = CurvilinearParameters {
            m_refinement: 10,
            n_refinement: 10,
            ..Default::default()
        };
        let grid = from_splines(&parts, &params, Projection::Cartesian).unwrap();
        assert_eq!(grid.dimensions(), (11, 11));
        // Every node was generated.
        for m in 0..11 {
            for n in 0..11 {
                assert!(grid.node(m, n).is_some());
            }
        }
    }

    #[test]
    fn splines_resolution_follows_refinement_split() {
        let parts = vec![
            part(&[(217.0, -24.0), (431.0, 195.0), (806.0, 399.0)]),
            part(&[(29.0, 201.0), (234.0, 372.0), (642.0, 592.0)]),
            part(&[(2.3, 280.0), (280.0, -28.0)]),
            part(&[(507.0, 603.0), (748.0, 334.0)]),
        ];
        let params = CurvilinearParameters {
            m_refinement: 20,
            n_refinement: 40,
            ..Default::default()
        };
        let grid = from_splines(&parts, &params, Projection::Cartesian).unwrap();
        assert_eq!(grid.dimensions(), (21, 41));
    }

    #[test]
    fn square_polygon_three_corner_grid() {
        // 6---5---4
        // |       |
        // 7       3
        // |       |
        // 0---1---2
        let polygon = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 5.0),
            Point::new(10.0, 10.0),
            Point::new(5.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(0.0, 5.0),
            Point::new(0.0, 0.0),
        ])
        .unwrap();
        let grid =
            from_polygon(&polygon, 0, 2, 4, false, Projection::Cartesian).unwrap();
        assert_eq!(grid.dimensions(), (3, 3));
        // The blended interior node sits at the square center.
        let center = grid.node(1, 1).unwrap();
        assert!((center.x - 5.0).abs() < 1e-9);
        assert!((center.y - 5.0).abs() < 1e-9);
    }

    #[test]
    fn polygon_with_fourth_side_pairs_opposite_intervals() {
        let polygon = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 5.0),
            Point::new(10.0, 10.0),
            Point::new(5.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(0.0, 5.0),
        ])
        .unwrap();
        let grid = from_polygon(&polygon, 0, 2, 4, true, Projection::Cartesian).unwrap();
        assert_eq!(grid.dimensions(), (3, 3));
    }

    #[test]
    fn triangle_grid_from_ten_point_ring() {
        let ring: Vec<Point> = vec![
            Point::new(444.5, 437.2),
            Point::new(427.7, 382.7),
            Point::new(405.6, 317.7),
            Point::new(381.1, 262.5),
            Point::new(451.1, 262.9),
            Point::new(528.8, 263.3),
            Point::new(593.4, 266.6),
            Point::new(558.6, 324.7),
            Point::new(526.7, 377.8),
            Point::new(444.1, 436.7),
        ];
        let polygon = Polygon::new(ring).unwrap();
        let grid = from_triangle(&polygon, 0, 3, 6, Projection::Cartesian).unwrap();
        assert_eq!(grid.dimensions(), (4, 4));
    }

    #[test]
    fn mismatched_sides_rejected() {
        let polygon = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ])
        .unwrap();
        // Fourth corner would land past the available perimeter interval.
        let r = from_polygon(&polygon, 0, 2, 3, true, Projection::Cartesian);
        assert!(matches!(r, Err(MeshForgeError::InvalidGeometry(_))));
    }
}

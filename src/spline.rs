//! Cubic spline evaluation along control-point sequences.
//!
//! The engine uses the classic second-derivative formulation: a tridiagonal
//! solve yields the second derivative of the curve at every control point,
//! after which any parameter value between two control points evaluates in
//! closed form. End conditions are natural (zero curvature), which matches
//! the not-a-knot-like behavior of the boundary splines consumed by the
//! curvilinear generators closely enough at the resolutions used there.

use crate::error::MeshForgeError;
use crate::geometry::{Point, Projection, lerp};

/// Number of output points for `n` control points and `k` interpolated
/// points per segment: `(n - 1) * k + n`.
pub fn spline_point_count(control_points: usize, points_per_segment: usize) -> usize {
    if control_points < 2 {
        return 0;
    }
    (control_points - 1) * points_per_segment + control_points
}

/// Evaluate the spline through `corners` with `points_per_segment`
/// interpolated points between each consecutive pair.
///
/// Every corner point appears exactly in the output at its position;
/// `output[0]` and `output[last]` equal the first and last corner. Parts
/// with fewer than two points yield an empty output.
pub fn evaluate_spline(corners: &[Point], points_per_segment: usize) -> Vec<Point> {
    let n = corners.len();
    if n < 2 {
        return Vec::new();
    }
    let second = second_derivatives(corners);
    let mut out = Vec::with_capacity(spline_point_count(n, points_per_segment));
    for i in 0..n - 1 {
        out.push(corners[i]);
        for k in 1..=points_per_segment {
            let t = k as f64 / (points_per_segment + 1) as f64;
            out.push(eval_segment(corners[i], corners[i + 1], second[i], second[i + 1], t));
        }
    }
    out.push(corners[n - 1]);
    out
}

/// Second derivatives of the interpolating spline at every control point,
/// natural end conditions, unit parameter spacing.
fn second_derivatives(points: &[Point]) -> Vec<Point> {
    let n = points.len();
    let mut u = vec![Point::default(); n];
    let mut second = vec![Point::default(); n];
    // Forward sweep of the tridiagonal system.
    for i in 1..n - 1 {
        let sig = 0.5;
        let px = sig * second[i - 1].x + 2.0;
        let py = sig * second[i - 1].y + 2.0;
        second[i].x = (sig - 1.0) / px;
        second[i].y = (sig - 1.0) / py;
        let dx =
            points[i + 1].x - 2.0 * points[i].x + points[i - 1].x;
        let dy =
            points[i + 1].y - 2.0 * points[i].y + points[i - 1].y;
        u[i].x = (3.0 * dx - sig * u[i - 1].x) / px;
        u[i].y = (3.0 * dy - sig * u[i - 1].y) / py;
    }
    // Back substitution; ends stay at zero curvature.
    for i in (1..n - 1).rev() {
        second[i].x = second[i].x * second[i + 1].x + u[i].x;
        second[i].y = second[i].y * second[i + 1].y + u[i].y;
    }
    second[0] = Point::default();
    second[n - 1] = Point::default();
    second
}

/// Closed-form cubic evaluation between two control points at fraction `t`.
fn eval_segment(a: Point, b: Point, sa: Point, sb: Point, t: f64) -> Point {
    let ca = 1.0 - t;
    let cb = t;
    let qa = (ca.powi(3) - ca) / 6.0;
    let qb = (cb.powi(3) - cb) / 6.0;
    Point::new(
        ca * a.x + cb * b.x + qa * sa.x + qb * sb.x,
        ca * a.y + cb * b.y + qa * sa.y + qb * sb.y,
    )
}

/// Resample a discretized curve to exactly `count` points, uniformly by arc
/// length under the given metric.
///
/// Endpoints are preserved exactly.
pub fn resample(
    points: &[Point],
    count: usize,
    projection: Projection,
) -> Result<Vec<Point>, MeshForgeError> {
    if points.len() < 2 {
        return Err(MeshForgeError::TooFewPoints {
            needed: 2,
            got: points.len(),
        });
    }
    if count < 2 {
        return Err(MeshForgeError::InvalidParameter {
            name: "count",
            reason: "resampling needs at least two output points",
        });
    }
    let mut cumulative = Vec::with_capacity(points.len());
    cumulative.push(0.0);
    for i in 1..points.len() {
        let d = projection.distance(points[i - 1], points[i]);
        cumulative.push(cumulative[i - 1] + d);
    }
    let total = *cumulative.last().unwrap();
    if total <= crate::geometry::EPS {
        return Err(MeshForgeError::InvalidGeometry(
            "cannot resample a zero-length curve".into(),
        ));
    }
    let mut out = Vec::with_capacity(count);
    out.push(points[0]);
    let mut seg = 0usize;
    for k in 1..count - 1 {
        let target = total * k as f64 / (count - 1) as f64;
        while seg + 1 < cumulative.len() - 1 && cumulative[seg + 1] < target {
            seg += 1;
        }
        let span = cumulative[seg + 1] - cumulative[seg];
        let t = if span <= crate::geometry::EPS {
            0.0
        } else {
            (target - cumulative[seg]) / span
        };
        out.push(lerp(points[seg], points[seg + 1], t));
    }
    out.push(points[points.len() - 1]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::EPS;

    #[test]
    fn count_law_holds() {
        let corners = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(2.0, 0.0),
            Point::new(3.0, 1.0),
        ];
        for k in 0..6 {
            let out = evaluate_spline(&corners, k);
            assert_eq!(out.len(), spline_point_count(corners.len(), k));
        }
    }

    #[test]
    fn corners_preserved_exactly() {
        let corners = vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 2.0),
            Point::new(8.0, -1.0),
        ];
        let k = 5;
        let out = evaluate_spline(&corners, k);
        assert_eq!(out[0], corners[0]);
        assert_eq!(out[k + 1], corners[1]);
        assert_eq!(out[out.len() - 1], corners[2]);
    }

    #[test]
    fn degenerate_part_yields_empty_output() {
        assert!(evaluate_spline(&[Point::new(1.0, 1.0)], 4).is_empty());
        assert!(evaluate_spline(&[], 4).is_empty());
    }

    #[test]
    fn straight_line_stays_straight() {
        let corners = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(2.0, 0.0),
        ];
        for p in evaluate_spline(&corners, 7) {
            assert!(p.y.abs() < 1e-10);
        }
    }

    #[test]
    fn resample_preserves_endpoints_and_spacing() {
        let pts = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(4.0, 0.0),
        ];
        let out = resample(&pts, 5, Projection::Cartesian).unwrap();
        assert_eq!(out.len(), 5);
        assert_eq!(out[0], pts[0]);
        assert_eq!(out[4], pts[2]);
        for (i, p) in out.iter().enumerate() {
            assert!((p.x - i as f64).abs() < EPS);
        }
    }
}

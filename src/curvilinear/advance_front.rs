//! Front-advancing curvilinear grid growth from a center spline.
//!
//! The grid grows layer by layer away from the discretized center spline.
//! Layer height starts at `aspect_ratio` times the local along-spline
//! spacing and grows geometrically until the configured average width is
//! covered. Where the advancing front folds over itself or two front nodes
//! land on top of each other, the affected nodes are left unset and local
//! advance stops.

use crate::error::MeshForgeError;
use crate::geometry::polyline::Polyline;
use crate::geometry::{EPS, Point, Projection, circumcenter, segments_cross};
use crate::params::{CurvilinearParameters, SplinesToCurvilinearParameters};
use crate::spline::{evaluate_spline, resample};

use super::CurvilinearGrid;

const SPLINE_DENSITY: usize = 20;

/// Grow a curvilinear grid outward from the first spline part.
///
/// Additional parts are accepted for interface compatibility with callers
/// that supply cross splines, but the growth envelope is taken from
/// `growth.average_width`.
pub fn from_splines_orthogonal(
    parts: &[Polyline],
    curvilinear: &CurvilinearParameters,
    growth: &SplinesToCurvilinearParameters,
    projection: Projection,
) -> Result<CurvilinearGrid, MeshForgeError> {
    curvilinear.validate()?;
    growth.validate()?;
    let center_part = parts
        .first()
        .ok_or(MeshForgeError::TooFewPoints { needed: 1, got: 0 })?;
    if center_part.points.len() < 2 {
        return Err(MeshForgeError::TooFewPoints {
            needed: 2,
            got: center_part.points.len(),
        });
    }
    if parts.len() > 1 {
        log::debug!(
            "orthogonal growth uses the first spline as center line; {} cross splines unused",
            parts.len() - 1
        );
    }

    let dense = evaluate_spline(&center_part.points, SPLINE_DENSITY);
    let count = curvilinear.m_refinement + 1;
    let center = if growth.curvature_adapted_grid_spacing {
        curvature_adapted_resample(&dense, count, projection)?
    } else {
        resample(&dense, count, projection)?
    };

    let length: f64 = center
        .windows(2)
        .map(|w| projection.distance(w[0], w[1]))
        .sum();
    let spacing = length / curvilinear.m_refinement as f64;
    if spacing <= EPS {
        return Err(MeshForgeError::InvalidGeometry(
            "center spline has zero length".into(),
        ));
    }

    // Geometric layer-height schedule up to half (or the full) width.
    let target = if growth.grow_grid_outside {
        growth.average_width * 0.5
    } else {
        growth.average_width
    };
    let mut heights = Vec::new();
    let mut h = growth.aspect_ratio * spacing;
    let mut covered = 0.0;
    while covered < target && heights.len() < curvilinear.n_refinement {
        heights.push(h.min(target - covered).max(EPS));
        covered += h;
        h *= growth.aspect_ratio_grow_factor;
    }
    if heights.is_empty() {
        return Err(MeshForgeError::InvalidGeometry(
            "growth parameters produce no layers".into(),
        ));
    }

    let up = advance_layers(&center, &heights, 1.0, growth, projection);
    let mut rows: Vec<Vec<Option<Point>>> = Vec::new();
    if growth.grow_grid_outside {
        let down = advance_layers(&center, &heights, -1.0, growth, projection);
        for row in down.into_iter().rev() {
            rows.push(row);
        }
    }
    rows.push(center.iter().map(|&p| Some(p)).collect());
    rows.extend(up);
    CurvilinearGrid::from_rows(rows)
}

/// Advance the front through the layer schedule on one side of the center.
fn advance_layers(
    center: &[Point],
    heights: &[f64],
    side: f64,
    growth: &SplinesToCurvilinearParameters,
    projection: Projection,
) -> Vec<Vec<Option<Point>>> {
    let count = center.len();
    let mut rows = Vec::with_capacity(heights.len());
    let mut front: Vec<Option<Point>> = center.iter().map(|&p| Some(p)).collect();
    for &height in heights {
        let mut next: Vec<Option<Point>> = vec![None; count];
        for i in 0..count {
            let Some(p) = front[i] else { continue };
            let Some(normal) = front_normal(&front, i) else {
                continue;
            };
            next[i] = Some(p.add(normal.scale(side * height)));
        }
        collapse_coincident(&mut next, growth.nodes_on_top_of_each_other_tolerance, projection);
        if growth.check_front_collisions {
            drop_collisions(&front, &mut next);
        }
        let stalled = next.iter().all(Option::is_none);
        rows.push(next.clone());
        front = next;
        if stalled {
            log::warn!("advancing front stalled; remaining layers left unset");
            break;
        }
    }
    // Pad rows skipped after a stall so every row has the same length.
    while rows.len() < heights.len() {
        rows.push(vec![None; count]);
    }
    rows
}

/// Unit normal of the front polyline at node `i` (left of the direction of
/// travel).
fn front_normal(front: &[Option<Point>], i: usize) -> Option<Point> {
    let prev = if i > 0 { front[i - 1] } else { None };
    let next = front.get(i + 1).copied().flatten();
    let (a, b) = match (prev, next) {
        (Some(a), Some(b)) => (a, b),
        (None, Some(b)) => (front[i]?, b),
        (Some(a), None) => (a, front[i]?),
        (None, None) => return None,
    };
    let d = b.sub(a);
    let norm = d.norm();
    if norm <= EPS {
        return None;
    }
    Some(Point::new(-d.y / norm, d.x / norm))
}

/// Unset nodes that landed within `tolerance` of an earlier front node.
fn collapse_coincident(row: &mut [Option<Point>], tolerance: f64, projection: Projection) {
    for i in 1..row.len() {
        let Some(p) = row[i] else { continue };
        for j in 0..i {
            if let Some(q) = row[j] {
                if projection.distance(p, q) < tolerance {
                    row[i] = None;
                    break;
                }
            }
        }
    }
}

/// Unset nodes whose advance segment crosses another advance segment,
/// which marks a folded front.
fn drop_collisions(front: &[Option<Point>], next: &mut [Option<Point>]) {
    let advances: Vec<Option<(Point, Point)>> = front
        .iter()
        .zip(next.iter())
        .map(|(f, n)| match (f, n) {
            (Some(f), Some(n)) => Some((*f, *n)),
            _ => None,
        })
        .collect();
    for i in 0..advances.len() {
        let Some((a1, a2)) = advances[i] else { continue };
        for (j, other) in advances.iter().enumerate() {
            if i == j {
                continue;
            }
            let Some((b1, b2)) = *other else { continue };
            if segments_cross(a1, a2, b1, b2) {
                next[i] = None;
                break;
            }
        }
    }
}

/// Resample with spacing inversely scaled by local curvature, so tightly
/// curved stretches receive more nodes.
fn curvature_adapted_resample(
    points: &[Point],
    count: usize,
    projection: Projection,
) -> Result<Vec<Point>, MeshForgeError> {
    if points.len() < 3 {
        return resample(points, count, projection);
    }
    // Weight each segment by 1 + normalized curvature of its endpoints.
    let mut curvature = vec![0.0f64; points.len()];
    for i in 1..points.len() - 1 {
        if let Ok(cc) = circumcenter(points[i - 1], points[i], points[i + 1]) {
            let radius = projection.distance(cc, points[i]);
            if radius > EPS {
                curvature[i] = 1.0 / radius;
            }
        }
    }
    let scale = projection.distance(points[0], points[points.len() - 1]).max(EPS);
    let mut weighted = Vec::with_capacity(points.len());
    weighted.push(0.0);
    for i in 1..points.len() {
        let base = projection.distance(points[i - 1], points[i]);
        let k = 0.5 * (curvature[i - 1] + curvature[i]) * scale;
        weighted.push(weighted[i - 1] + base * (1.0 + k));
    }
    let total = *weighted.last().unwrap();
    if total <= EPS {
        return Err(MeshForgeError::InvalidGeometry(
            "cannot resample a zero-length curve".into(),
        ));
    }
    let mut out = Vec::with_capacity(count);
    out.push(points[0]);
    let mut seg = 0usize;
    for k in 1..count - 1 {
        let target = total * k as f64 / (count - 1) as f64;
        while seg + 1 < weighted.len() - 1 && weighted[seg + 1] < target {
            seg += 1;
        }
        let span = weighted[seg + 1] - weighted[seg];
        let t = if span <= EPS {
            0.0
        } else {
            (target - weighted[seg]) / span
        };
        out.push(crate::geometry::lerp(points[seg], points[seg + 1], t));
    }
    out.push(points[points.len() - 1]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_part() -> Polyline {
        Polyline::from_points(vec![
            Point::new(0.0, 0.0),
            Point::new(50.0, 0.0),
            Point::new(100.0, 0.0),
        ])
    }

    #[test]
    fn straight_spline_grows_symmetric_layers() {
        let curvilinear = CurvilinearParameters {
            m_refinement: 10,
            n_refinement: 20,
            ..Default::default()
        };
        let growth = SplinesToCurvilinearParameters {
            aspect_ratio: 0.2,
            aspect_ratio_grow_factor: 1.2,
            average_width: 20.0,
            curvature_adapted_grid_spacing: false,
            ..Default::default()
        };
        let grid = from_splines_orthogonal(
            &[line_part()],
            &curvilinear,
            &growth,
            Projection::Cartesian,
        )
        .unwrap();
        let (num_m, num_n) = grid.dimensions();
        assert_eq!(num_n, 11);
        // Layers on both sides of the center line.
        assert!(num_m >= 3);
        assert!(num_m % 2 == 1);

        let center_row = num_m / 2;
        for n in 0..num_n {
            let p = grid.node(center_row, n).unwrap();
            assert!((p.y - 0.0).abs() < 1e-9);
            assert!((p.x - 10.0 * n as f64).abs() < 1e-9);
        }
        // The rows above/below mirror each other across the center line.
        let above = grid.node(center_row + 1, 5).unwrap();
        let below = grid.node(center_row - 1, 5).unwrap();
        assert!((above.y + below.y).abs() < 1e-9);
        assert!(above.y > 0.0);
    }

    #[test]
    fn one_sided_growth_keeps_center_as_first_row() {
        let curvilinear = CurvilinearParameters {
            m_refinement: 4,
            n_refinement: 10,
            ..Default::default()
        };
        let growth = SplinesToCurvilinearParameters {
            aspect_ratio: 0.5,
            average_width: 30.0,
            grow_grid_outside: false,
            curvature_adapted_grid_spacing: false,
            ..Default::default()
        };
        let grid = from_splines_orthogonal(
            &[line_part()],
            &curvilinear,
            &growth,
            Projection::Cartesian,
        )
        .unwrap();
        let (num_m, num_n) = grid.dimensions();
        assert_eq!(num_n, 5);
        let first = grid.node(0, 0).unwrap();
        assert!((first.y - 0.0).abs() < 1e-9);
        // Cumulative layer height approaches the requested width.
        let top = grid.node(num_m - 1, 0).unwrap();
        assert!(top.y > 0.0 && top.y <= 30.0 + 1e-9);
    }

    #[test]
    fn layer_heights_grow_geometrically() {
        let curvilinear = CurvilinearParameters {
            m_refinement: 10,
            n_refinement: 10,
            ..Default::default()
        };
        let growth = SplinesToCurvilinearParameters {
            aspect_ratio: 0.3,
            aspect_ratio_grow_factor: 1.5,
            average_width: 40.0,
            grow_grid_outside: false,
            curvature_adapted_grid_spacing: false,
            ..Default::default()
        };
        let grid = from_splines_orthogonal(
            &[line_part()],
            &curvilinear,
            &growth,
            Projection::Cartesian,
        )
        .unwrap();
        let h1 = grid.node(1, 0).unwrap().y - grid.node(0, 0).unwrap().y;
        let h2 = grid.node(2, 0).unwrap().y - grid.node(1, 0).unwrap().y;
        assert!(h2 > h1);
        assert!((h2 / h1 - 1.5).abs() < 1e-6);
    }

    #[test]
    fn missing_center_spline_rejected() {
        let r = from_splines_orthogonal(
            &[],
            &CurvilinearParameters::default(),
            &SplinesToCurvilinearParameters::default(),
            Projection::Cartesian,
        );
        assert!(matches!(r, Err(MeshForgeError::TooFewPoints { .. })));
    }
}

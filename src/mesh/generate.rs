//! Triangular mesh generation from scattered samples and closed polygons.
//!
//! Sample triangulation is an incremental Bowyer–Watson Delaunay build over
//! a super-triangle. Polygon meshing seeds the interior with a staggered
//! lattice at the average perimeter edge length, triangulates perimeter and
//! seeds together, and keeps only the triangles whose centroid lies inside
//! the polygon.

use hashbrown::HashSet;

use crate::error::MeshForgeError;
use crate::geometry::polyline::Polygon;
use crate::geometry::{self, EPS, Point};
use crate::mesh::{Edge, Mesh2d};

/// Triangle as counter-clockwise point indices.
type Tri = [usize; 3];

impl Mesh2d {
    /// Replace the mesh with an unconstrained Delaunay triangulation of the
    /// sample points.
    pub fn from_samples(&mut self, samples: &[Point]) -> Result<(), MeshForgeError> {
        if samples.len() < 3 {
            return Err(MeshForgeError::TooFewPoints {
                needed: 3,
                got: samples.len(),
            });
        }
        let triangles = delaunay(samples)?;
        self.assemble_triangles(samples, &triangles)
    }

    /// Replace the mesh with a triangulation of the polygon interior.
    ///
    /// Triangle size follows the average length of the polygon perimeter
    /// edges.
    pub fn from_polygon(&mut self, polygon: &Polygon) -> Result<(), MeshForgeError> {
        let ring = polygon.outer();
        let n = ring.len();
        let mut perimeter_length = 0.0;
        for i in 0..n {
            perimeter_length += self.projection().distance(ring[i], ring[(i + 1) % n]);
        }
        let h = perimeter_length / n as f64;
        if h <= EPS {
            return Err(MeshForgeError::InvalidGeometry(
                "polygon perimeter has zero length".into(),
            ));
        }

        let mut points: Vec<Point> = ring.to_vec();
        points.extend(interior_seeds(polygon, h));

        let triangles = delaunay(&points)?;
        let kept: Vec<Tri> = triangles
            .into_iter()
            .filter(|t| {
                let centroid = geometry::vertex_average(&[
                    points[t[0]],
                    points[t[1]],
                    points[t[2]],
                ]);
                polygon.contains(centroid)
            })
            .collect();
        if kept.is_empty() {
            return Err(MeshForgeError::InvalidGeometry(
                "polygon triangulation produced no interior triangles".into(),
            ));
        }
        self.assemble_triangles(&points, &kept)
    }

    /// Install triangles as the mesh state, dropping unused seed points.
    fn assemble_triangles(
        &mut self,
        points: &[Point],
        triangles: &[Tri],
    ) -> Result<(), MeshForgeError> {
        let mut edges: HashSet<(usize, usize)> = HashSet::with_capacity(triangles.len() * 2);
        for t in triangles {
            for k in 0..3 {
                let a = t[k];
                let b = t[(k + 1) % 3];
                edges.insert((a.min(b), a.max(b)));
            }
        }
        let mut edge_list: Vec<Edge> = edges
            .into_iter()
            .map(|(a, b)| Edge::new(a, b))
            .collect();
        edge_list.sort_by_key(|e| (e.first, e.second));
        self.set(points.to_vec(), edge_list)?;
        self.remove_unused_generation_seeds();
        Ok(())
    }

    fn remove_unused_generation_seeds(&mut self) {
        let mut keep = vec![false; self.node_count()];
        for edge in self.edges() {
            keep[edge.first] = true;
            keep[edge.second] = true;
        }
        if keep.iter().any(|&k| !k) {
            self.remove_nodes(&keep);
        }
    }
}

/// Staggered lattice of interior points spaced `h`, kept clear of the
/// perimeter by half a spacing.
fn interior_seeds(polygon: &Polygon, h: f64) -> Vec<Point> {
    let ring = polygon.outer();
    let (mut min_x, mut min_y, mut max_x, mut max_y) =
        (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in ring {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    let row_step = h * 3f64.sqrt() * 0.5;
    let clearance2 = (0.5 * h) * (0.5 * h);
    let mut seeds = Vec::new();
    let mut row = 0usize;
    let mut y = min_y + row_step;
    while y < max_y {
        let offset = if row % 2 == 0 { 0.0 } else { 0.5 * h };
        let mut x = min_x + offset + 0.5 * h;
        while x < max_x {
            let p = Point::new(x, y);
            if polygon.contains(p) && perimeter_clearance2(ring, p) >= clearance2 {
                seeds.push(p);
            }
            x += h;
        }
        row += 1;
        y += row_step;
    }
    seeds
}

fn perimeter_clearance2(ring: &[Point], p: Point) -> f64 {
    let n = ring.len();
    let mut best = f64::INFINITY;
    for i in 0..n {
        let (q, _) = geometry::project_on_segment(p, ring[i], ring[(i + 1) % n]);
        let d = geometry::dot(p.sub(q), p.sub(q));
        best = best.min(d);
    }
    best
}

/// Incremental Bowyer–Watson Delaunay triangulation.
///
/// Near-coincident input points are collapsed onto their first occurrence;
/// the result only references surviving points.
pub(crate) fn delaunay(points: &[Point]) -> Result<Vec<Tri>, MeshForgeError> {
    let n = points.len();
    let (mut min_x, mut min_y, mut max_x, mut max_y) =
        (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        if !p.is_finite() {
            return Err(MeshForgeError::InvalidGeometry(
                "sample point with non-finite coordinates".into(),
            ));
        }
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    let span = (max_x - min_x).max(max_y - min_y).max(1.0);
    let cx = (min_x + max_x) * 0.5;
    let cy = (min_y + max_y) * 0.5;

    // Super-triangle comfortably enclosing every sample.
    let mut all: Vec<Point> = points.to_vec();
    let s0 = n;
    all.push(Point::new(cx - 20.0 * span, cy - 10.0 * span));
    all.push(Point::new(cx + 20.0 * span, cy - 10.0 * span));
    all.push(Point::new(cx, cy + 20.0 * span));

    let mut triangles: Vec<Tri> = vec![[s0, s0 + 1, s0 + 2]];
    let mut skipped = 0usize;

    'insert: for p in 0..n {
        // Collapse duplicates: triangulating coincident points would
        // produce degenerate cavities.
        for q in 0..p {
            if all[p].sub(all[q]).norm() <= EPS {
                skipped += 1;
                continue 'insert;
            }
        }
        let mut cavity: Vec<Tri> = Vec::new();
        triangles.retain(|t| {
            if in_circumcircle(&all, *t, all[p]) {
                cavity.push(*t);
                false
            } else {
                true
            }
        });
        if cavity.is_empty() {
            return Err(MeshForgeError::InvalidGeometry(format!(
                "triangulation lost sample {p}: no containing circumcircle"
            )));
        }
        // Cavity boundary: edges used by exactly one cavity triangle.
        let mut boundary: Vec<(usize, usize)> = Vec::new();
        for t in &cavity {
            for k in 0..3 {
                let a = t[k];
                let b = t[(k + 1) % 3];
                if let Some(pos) = boundary
                    .iter()
                    .position(|&(x, y)| (x == b && y == a) || (x == a && y == b))
                {
                    boundary.swap_remove(pos);
                } else {
                    boundary.push((a, b));
                }
            }
        }
        for (a, b) in boundary {
            triangles.push(orient_ccw(&all, [a, b, p]));
        }
    }
    if skipped > 0 {
        log::debug!("triangulation collapsed {skipped} coincident sample points");
    }

    let mut result: Vec<Tri> = triangles
        .into_iter()
        .filter(|t| t.iter().all(|&v| v < n))
        .filter(|t| {
            geometry::signed_area(&[all[t[0]], all[t[1]], all[t[2]]]).abs() > EPS
        })
        .collect();
    result.sort();
    if result.is_empty() {
        return Err(MeshForgeError::InvalidGeometry(
            "triangulation produced no valid triangles".into(),
        ));
    }
    Ok(result)
}

fn orient_ccw(all: &[Point], t: Tri) -> Tri {
    if geometry::signed_area(&[all[t[0]], all[t[1]], all[t[2]]]) < 0.0 {
        [t[0], t[2], t[1]]
    } else {
        t
    }
}

/// Whether `p` lies strictly inside the circumcircle of triangle `t`.
fn in_circumcircle(all: &[Point], t: Tri, p: Point) -> bool {
    let t = orient_ccw(all, t);
    let (a, b, c) = (all[t[0]], all[t[1]], all[t[2]]);
    let ax = a.x - p.x;
    let ay = a.y - p.y;
    let bx = b.x - p.x;
    let by = b.y - p.y;
    let cx = c.x - p.x;
    let cy = c.y - p.y;
    let det = (ax * ax + ay * ay) * (bx * cy - cx * by)
        - (bx * bx + by * by) * (ax * cy - cx * ay)
        + (cx * cx + cy * cy) * (ax * by - bx * ay);
    det > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Projection;

    #[test]
    fn four_corner_samples_triangulate() {
        let samples = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ];
        let tris = delaunay(&samples).unwrap();
        assert_eq!(tris.len(), 2);

        let mut mesh = Mesh2d::new(Projection::Cartesian);
        mesh.from_samples(&samples).unwrap();
        assert_eq!(mesh.node_count(), 4);
        assert_eq!(mesh.edge_count(), 5);
        assert_eq!(mesh.administration().faces.len(), 2);
    }

    #[test]
    fn triangulation_has_no_degenerate_faces() {
        let samples = [
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.1),
            Point::new(4.0, 0.0),
            Point::new(1.0, 2.0),
            Point::new(3.0, 2.1),
            Point::new(2.0, 4.0),
        ];
        let mut mesh = Mesh2d::new(Projection::Cartesian);
        mesh.from_samples(&samples).unwrap();
        let admin = mesh.administration();
        assert!(!admin.faces.is_empty());
        for area in &admin.face_areas {
            assert!(*area > EPS);
        }
    }

    /// Square ring of side `side` sampled every `step` units.
    fn sampled_square(side: f64, step: f64) -> Polygon {
        let mut ring = Vec::new();
        let pieces = (side / step) as usize;
        for k in 0..pieces {
            ring.push(Point::new(k as f64 * step, 0.0));
        }
        for k in 0..pieces {
            ring.push(Point::new(side, k as f64 * step));
        }
        for k in 0..pieces {
            ring.push(Point::new(side - k as f64 * step, side));
        }
        for k in 0..pieces {
            ring.push(Point::new(0.0, side - k as f64 * step));
        }
        Polygon::new(ring).unwrap()
    }

    #[test]
    fn polygon_meshing_fills_a_square() {
        let polygon = sampled_square(30.0, 5.0);
        let perimeter_count = polygon.outer().len();
        let mut mesh = Mesh2d::new(Projection::Cartesian);
        mesh.from_polygon(&polygon).unwrap();
        // Interior seeds were added beyond the perimeter points.
        assert!(mesh.node_count() > perimeter_count);
        assert!(!mesh.administration().faces.is_empty());
        // Every face centroid stays inside the polygon.
        for c in &mesh.administration().face_mass_centers {
            assert!(polygon.contains(*c));
        }
    }

    #[test]
    fn too_few_samples_rejected() {
        let mut mesh = Mesh2d::new(Projection::Cartesian);
        let r = mesh.from_samples(&[Point::new(0.0, 0.0), Point::new(1.0, 0.0)]);
        assert!(matches!(r, Err(MeshForgeError::TooFewPoints { .. })));
        assert!(mesh.is_empty());
    }
}

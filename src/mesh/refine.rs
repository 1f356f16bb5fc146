//! Mesh refinement by edge bisection, and Delaunay edge flipping.
//!
//! Refinement marks edges, then rebuilds the mesh connectivity in one
//! sweep: marked edges are replaced by their halves and affected faces are
//! re-tessellated (midpoint triangle for fully split triangles, center
//! subdivision for fully split quads, centroid fan otherwise). The sweep is
//! applied at most `max_refinement_iterations` times for sample-driven
//! refinement and once for polygon-driven refinement, so both terminate in
//! bounded work even when new elements keep qualifying.

use hashbrown::{HashMap, HashSet};

use crate::error::MeshForgeError;
use crate::geometry::polyline::Polygon;
use crate::geometry::{self, Point};
use crate::mesh::{Edge, Mesh2d};
use crate::params::{AveragingMethod, InterpolationParameters, SampleRefineParameters};

impl Mesh2d {
    /// Bisect every edge whose endpoints both lie strictly inside `polygon`.
    pub fn refine_based_on_polygon(
        &mut self,
        polygon: &Polygon,
        interpolation: &InterpolationParameters,
    ) -> Result<(), MeshForgeError> {
        interpolation.validate()?;
        if self.is_empty() {
            return Err(MeshForgeError::EmptyState("mesh"));
        }
        let marked: HashSet<usize> = (0..self.edge_count())
            .filter(|&e| {
                let edge = &self.edges()[e];
                polygon.contains(self.nodes()[edge.first])
                    && polygon.contains(self.nodes()[edge.second])
            })
            .collect();
        if marked.is_empty() {
            return Ok(());
        }
        let mut scratch = self.clone();
        scratch.split_marked_edges(&marked, true)?;
        *self = scratch;
        Ok(())
    }

    /// Refine faces whose interpolated sample value requests further splits.
    ///
    /// A sample value of `k` asks for `k` successive bisection passes of the
    /// surrounding faces; each pass splits every edge of a qualifying face.
    pub fn refine_based_on_samples(
        &mut self,
        samples: &[(Point, f64)],
        interpolation: &InterpolationParameters,
        refinement: &SampleRefineParameters,
    ) -> Result<(), MeshForgeError> {
        interpolation.validate()?;
        refinement.validate()?;
        if self.is_empty() {
            return Err(MeshForgeError::EmptyState("mesh"));
        }
        if samples.is_empty() {
            return Err(MeshForgeError::TooFewPoints { needed: 1, got: 0 });
        }
        let mut scratch = self.clone();
        for pass in 0..interpolation.max_refinement_iterations {
            let marked = scratch.mark_edges_from_samples(samples, interpolation, refinement, pass);
            if marked.is_empty() {
                break;
            }
            scratch.split_marked_edges(&marked, refinement.connect_hanging_nodes)?;
        }
        *self = scratch;
        Ok(())
    }

    fn mark_edges_from_samples(
        &self,
        samples: &[(Point, f64)],
        interpolation: &InterpolationParameters,
        refinement: &SampleRefineParameters,
        pass: usize,
    ) -> HashSet<usize> {
        let admin = self.administration();
        let mut marked = HashSet::new();
        for (f, face) in admin.faces.iter().enumerate() {
            let center = admin.face_mass_centers[f];
            let size = face
                .nodes
                .iter()
                .map(|&n| self.projection().distance(center, self.nodes()[n]))
                .fold(0.0f64, f64::max);
            let radius = interpolation.relative_search_radius * size;
            let Some(value) = interpolate_at(
                samples,
                center,
                radius,
                interpolation,
                self,
            ) else {
                continue;
            };
            // Each completed pass consumes one refinement level.
            if value - (pass as f64) < 1.0 {
                continue;
            }
            let min_edge = face
                .edges
                .iter()
                .filter_map(|&e| self.edge_length(e))
                .fold(f64::INFINITY, f64::min);
            if min_edge * 0.5 < refinement.minimum_cell_size {
                continue;
            }
            marked.extend(face.edges.iter().copied());
        }
        marked
    }

    fn edge_length(&self, e: usize) -> Option<f64> {
        let edge = self.edges().get(e)?;
        Some(
            self.projection()
                .distance(self.nodes()[edge.first], self.nodes()[edge.second]),
        )
    }

    /// Rebuild the mesh with the marked edges bisected.
    fn split_marked_edges(
        &mut self,
        marked: &HashSet<usize>,
        connect_hanging_nodes: bool,
    ) -> Result<(), MeshForgeError> {
        let admin = self.administration().clone();
        let mut nodes = self.nodes().to_vec();
        let mut midpoint: HashMap<usize, usize> = HashMap::with_capacity(marked.len());
        for &e in marked {
            let edge = &self.edges()[e];
            let mid = geometry::lerp(nodes[edge.first], nodes[edge.second], 0.5);
            midpoint.insert(e, nodes.len());
            nodes.push(mid);
        }

        let mut edges: HashSet<(usize, usize)> = HashSet::new();
        fn push(edges: &mut HashSet<(usize, usize)>, a: usize, b: usize) {
            if a != b {
                edges.insert((a.min(b), a.max(b)));
            }
        }
        for (e, edge) in self.edges().iter().enumerate() {
            match midpoint.get(&e) {
                Some(&mid) => {
                    push(&mut edges, edge.first, mid);
                    push(&mut edges, mid, edge.second);
                }
                None => push(&mut edges, edge.first, edge.second),
            }
        }

        for face in &admin.faces {
            let splits: Vec<Option<usize>> = face
                .edges
                .iter()
                .map(|e| midpoint.get(e).copied())
                .collect();
            let split_count = splits.iter().flatten().count();
            if split_count == 0 {
                continue;
            }
            let arity = face.nodes.len();
            if arity == 3 && split_count == 3 {
                // Midpoint triangle: four similar children.
                let m: Vec<usize> = splits.iter().map(|s| s.unwrap()).collect();
                push(&mut edges, m[0], m[1]);
                push(&mut edges, m[1], m[2]);
                push(&mut edges, m[2], m[0]);
            } else if arity == 4 && split_count == 4 {
                // Center subdivision: four child quads.
                let ring: Vec<Point> = face.nodes.iter().map(|&n| nodes[n]).collect();
                let center = geometry::mass_center(&ring);
                let center_index = nodes.len();
                nodes.push(center);
                for s in splits.iter().flatten() {
                    push(&mut edges, center_index, *s);
                }
            } else if connect_hanging_nodes {
                // Centroid fan over the midpoint-augmented ring.
                let ring: Vec<Point> = face.nodes.iter().map(|&n| nodes[n]).collect();
                let center = geometry::mass_center(&ring);
                let center_index = nodes.len();
                nodes.push(center);
                for k in 0..arity {
                    push(&mut edges, center_index, face.nodes[k]);
                    if let Some(mid) = splits[k] {
                        push(&mut edges, center_index, mid);
                    }
                }
            }
            // Without hanging-node connection the augmented ring simply
            // becomes a higher-arity face.
        }

        let mut edge_list: Vec<Edge> = edges
            .into_iter()
            .map(|(a, b)| Edge::new(a, b))
            .collect();
        edge_list.sort_by_key(|e| (e.first, e.second));
        self.set(nodes, edge_list)
    }

    /// Flip edges between triangle pairs toward the Delaunay criterion.
    ///
    /// With `triangulate_required`, non-triangular faces are first split
    /// into centroid fans so every face takes part in flipping.
    pub fn flip_edges(&mut self, triangulate_required: bool) -> Result<(), MeshForgeError> {
        if self.is_empty() {
            return Err(MeshForgeError::EmptyState("mesh"));
        }
        let mut scratch = self.clone();
        if triangulate_required {
            let faces_to_fan: Vec<usize> = {
                let admin = scratch.administration();
                (0..admin.faces.len())
                    .filter(|&f| admin.faces[f].nodes.len() > 3)
                    .collect()
            };
            if !faces_to_fan.is_empty() {
                scratch.fan_triangulate(&faces_to_fan)?;
            }
        }

        // Bounded flip sweeps; each sweep applies at most one flip per
        // edge and stops early once no flip fires.
        for _ in 0..10 {
            let flips = scratch.collect_delaunay_flips();
            if flips.is_empty() {
                break;
            }
            for (e, new_edge) in flips {
                scratch.edges[e] = new_edge;
            }
            scratch.invalidate_cache();
        }
        *self = scratch;
        Ok(())
    }

    fn fan_triangulate(&mut self, faces: &[usize]) -> Result<(), MeshForgeError> {
        let admin = self.administration().clone();
        let mut nodes = self.nodes().to_vec();
        let mut edges: HashSet<(usize, usize)> = self
            .edges()
            .iter()
            .map(|e| (e.first.min(e.second), e.first.max(e.second)))
            .collect();
        for &f in faces {
            let face = &admin.faces[f];
            let ring: Vec<Point> = face.nodes.iter().map(|&n| nodes[n]).collect();
            let center = geometry::mass_center(&ring);
            let center_index = nodes.len();
            nodes.push(center);
            for &n in &face.nodes {
                edges.insert((n.min(center_index), n.max(center_index)));
            }
        }
        let mut edge_list: Vec<Edge> = edges
            .into_iter()
            .map(|(a, b)| Edge::new(a, b))
            .collect();
        edge_list.sort_by_key(|e| (e.first, e.second));
        self.set(nodes, edge_list)
    }

    /// Edges whose adjacent triangle pair violates the Delaunay criterion,
    /// with their replacement diagonal. At most one flip per face per call.
    fn collect_delaunay_flips(&self) -> Vec<(usize, Edge)> {
        let admin = self.administration();
        let mut used_faces: HashSet<usize> = HashSet::new();
        let mut flips = Vec::new();
        for e in 0..self.edge_count() {
            let [Some(f1), Some(f2)] = admin.edge_faces[e] else {
                continue;
            };
            if admin.faces[f1].nodes.len() != 3 || admin.faces[f2].nodes.len() != 3 {
                continue;
            }
            if used_faces.contains(&f1) || used_faces.contains(&f2) {
                continue;
            }
            let edge = self.edges()[e];
            let Some(b) = opposite_vertex(&admin.faces[f1].nodes, edge) else {
                continue;
            };
            let Some(d) = opposite_vertex(&admin.faces[f2].nodes, edge) else {
                continue;
            };
            if b == d {
                continue;
            }
            let (pa, pc) = (self.nodes()[edge.first], self.nodes()[edge.second]);
            let (pb, pd) = (self.nodes()[b], self.nodes()[d]);
            // Flip only convex quads, and only when the opposite vertex
            // breaks the circumcircle of the neighbor triangle.
            if !geometry::segments_cross(pa, pc, pb, pd) {
                continue;
            }
            if circumcircle_violated(pa, pb, pc, pd) {
                flips.push((e, Edge::new(b, d)));
                used_faces.insert(f1);
                used_faces.insert(f2);
            }
        }
        flips
    }
}

/// Interpolate a sample value at `at` from samples within `radius`.
fn interpolate_at(
    samples: &[(Point, f64)],
    at: Point,
    radius: f64,
    interpolation: &InterpolationParameters,
    mesh: &Mesh2d,
) -> Option<f64> {
    let projection = mesh.projection();
    let in_range = samples
        .iter()
        .filter(|(p, _)| projection.distance(*p, at) <= radius);
    match interpolation.averaging_method {
        AveragingMethod::ClosestPoint => in_range
            .min_by(|(a, _), (b, _)| {
                projection
                    .distance(*a, at)
                    .partial_cmp(&projection.distance(*b, at))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(_, v)| *v),
        AveragingMethod::SimpleAveraging => {
            let values: Vec<f64> = in_range.map(|(_, v)| *v).collect();
            if values.len() < interpolation.minimum_points {
                return None;
            }
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
        AveragingMethod::Max => in_range.map(|(_, v)| *v).fold(None, |acc, v| {
            Some(acc.map_or(v, |a: f64| a.max(v)))
        }),
        AveragingMethod::Min => in_range.map(|(_, v)| *v).fold(None, |acc, v| {
            Some(acc.map_or(v, |a: f64| a.min(v)))
        }),
    }
}

fn opposite_vertex(face_nodes: &[usize], edge: Edge) -> Option<usize> {
    face_nodes
        .iter()
        .copied()
        .find(|&n| n != edge.first && n != edge.second)
}

/// `d` lies strictly inside the circumcircle of the CCW triangle `a, b, c`.
fn circumcircle_violated(a: Point, b: Point, c: Point, d: Point) -> bool {
    let (a, b, c) = if geometry::signed_area(&[a, b, c]) < 0.0 {
        (a, c, b)
    } else {
        (a, b, c)
    };
    let ax = a.x - d.x;
    let ay = a.y - d.y;
    let bx = b.x - d.x;
    let by = b.y - d.y;
    let cx = c.x - d.x;
    let cy = c.y - d.y;
    let det = (ax * ax + ay * ay) * (bx * cy - cx * by)
        - (bx * bx + by * by) * (ax * cy - cx * ay)
        + (cx * cx + cy * cy) * (ax * by - bx * ay);
    det > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Projection;
    use crate::mesh::tests::rectilinear_3x3;

    fn covering_polygon() -> Polygon {
        Polygon::new(vec![
            Point::new(-0.5, -0.5),
            Point::new(2.5, -0.5),
            Point::new(2.5, 2.5),
            Point::new(-0.5, 2.5),
        ])
        .unwrap()
    }

    #[test]
    fn polygon_refinement_splits_inside_edges() {
        let mut mesh = rectilinear_3x3();
        let nodes_before = mesh.node_count();
        mesh.refine_based_on_polygon(&covering_polygon(), &InterpolationParameters::default())
            .unwrap();
        // All 12 edges split: one midpoint each, plus 4 face centers.
        assert_eq!(mesh.node_count(), nodes_before + 12 + 4);
        let admin = mesh.administration();
        assert_eq!(admin.faces.len(), 16);
        for face in &admin.faces {
            assert_eq!(face.nodes.len(), 4);
        }
    }

    #[test]
    fn polygon_refinement_outside_is_noop() {
        let mut mesh = rectilinear_3x3();
        let far = Polygon::new(vec![
            Point::new(10.0, 10.0),
            Point::new(12.0, 10.0),
            Point::new(12.0, 12.0),
            Point::new(10.0, 12.0),
        ])
        .unwrap();
        let before = mesh.snapshot();
        mesh.refine_based_on_polygon(&far, &InterpolationParameters::default())
            .unwrap();
        assert_eq!(mesh.snapshot(), before);
    }

    #[test]
    fn sample_refinement_obeys_levels_and_terminates() {
        let mut mesh = rectilinear_3x3();
        // Level-1 refinement everywhere.
        let samples = vec![
            (Point::new(0.5, 0.5), 1.0),
            (Point::new(1.5, 0.5), 1.0),
            (Point::new(0.5, 1.5), 1.0),
            (Point::new(1.5, 1.5), 1.0),
        ];
        let interpolation = InterpolationParameters {
            max_refinement_iterations: 5,
            averaging_method: AveragingMethod::ClosestPoint,
            ..Default::default()
        };
        let refinement = SampleRefineParameters {
            minimum_cell_size: 0.01,
            ..Default::default()
        };
        mesh.refine_based_on_samples(&samples, &interpolation, &refinement)
            .unwrap();
        // One level: each quad becomes four.
        assert_eq!(mesh.administration().faces.len(), 16);
    }

    #[test]
    fn minimum_cell_size_stops_refinement() {
        let mut mesh = rectilinear_3x3();
        let samples = vec![(Point::new(1.0, 1.0), 10.0)];
        let interpolation = InterpolationParameters {
            max_refinement_iterations: 10,
            averaging_method: AveragingMethod::ClosestPoint,
            relative_search_radius: 3.0,
            ..Default::default()
        };
        let refinement = SampleRefineParameters {
            minimum_cell_size: 0.4,
            ..Default::default()
        };
        mesh.refine_based_on_samples(&samples, &interpolation, &refinement)
            .unwrap();
        // Cells bottom out at the minimum size instead of looping forever.
        let shortest = (0..mesh.edge_count())
            .filter_map(|e| mesh.edge_length(e))
            .fold(f64::INFINITY, f64::min);
        assert!(shortest >= 0.2);
    }

    #[test]
    fn flip_recovers_delaunay_diagonal() {
        // Convex quad carrying the non-Delaunay diagonal (1,3): the flip
        // must replace it with (0,2).
        let mut mesh = Mesh2d::new(Projection::Cartesian);
        mesh.set(
            vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(9.0, 2.0),
                Point::new(2.0, 3.0),
            ],
            vec![
                Edge::new(0, 1),
                Edge::new(1, 2),
                Edge::new(2, 3),
                Edge::new(3, 0),
                Edge::new(1, 3),
            ],
        )
        .unwrap();
        mesh.flip_edges(false).unwrap();
        let has_good = mesh
            .edges()
            .iter()
            .any(|e| e.touches(0) && e.touches(2));
        let has_bad = mesh
            .edges()
            .iter()
            .any(|e| e.touches(1) && e.touches(3));
        assert!(has_good && !has_bad);
    }
}

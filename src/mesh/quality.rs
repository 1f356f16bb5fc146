//! Edge quality metrics and small-element cleanup.
//!
//! Both metrics are per-edge and undefined (reported as `None`) on edges
//! with fewer than two adjacent faces; the session boundary converts the
//! absent value to the `-999.0` sentinel expected by callers.

use hashbrown::HashSet;

use crate::error::MeshForgeError;
use crate::geometry::{self, EPS, Point};
use crate::mesh::Mesh2d;

impl Mesh2d {
    /// Orthogonality deviation per edge.
    ///
    /// The value is |cos| of the angle between the edge and the segment
    /// joining the circumcenters of its two adjacent faces: 0 for a
    /// perfectly orthogonal edge, approaching 1 as the edge degenerates.
    pub fn orthogonality(&self) -> Vec<Option<f64>> {
        let admin = self.administration();
        (0..self.edge_count())
            .map(|e| {
                let [Some(f1), Some(f2)] = admin.edge_faces[e] else {
                    return None;
                };
                let edge = &self.edges()[e];
                let ev = self.nodes()[edge.second].sub(self.nodes()[edge.first]);
                let cv = admin.face_circumcenters[f2].sub(admin.face_circumcenters[f1]);
                let denominator = ev.norm() * cv.norm();
                if denominator <= EPS {
                    return None;
                }
                Some((geometry::dot(ev, cv) / denominator).abs())
            })
            .collect()
    }

    /// Smoothness deviation per edge.
    ///
    /// The ratio (>= 1) of the distances from the two adjacent face mass
    /// centers to the edge center: 1 for evenly sized neighbors, growing
    /// with size disparity.
    pub fn smoothness(&self) -> Vec<Option<f64>> {
        let admin = self.administration();
        (0..self.edge_count())
            .map(|e| {
                let [Some(f1), Some(f2)] = admin.edge_faces[e] else {
                    return None;
                };
                let edge = &self.edges()[e];
                let center = self
                    .projection()
                    .midpoint(self.nodes()[edge.first], self.nodes()[edge.second]);
                let d1 = self
                    .projection()
                    .distance(admin.face_mass_centers[f1], center);
                let d2 = self
                    .projection()
                    .distance(admin.face_mass_centers[f2], center);
                let (lo, hi) = if d1 < d2 { (d1, d2) } else { (d2, d1) };
                if lo <= EPS {
                    return None;
                }
                Some(hi / lo)
            })
            .collect()
    }

    /// Mass centers of triangles with an interior angle greater than 90°.
    pub fn obtuse_triangle_mass_centers(&self) -> Vec<Point> {
        let admin = self.administration();
        admin
            .faces
            .iter()
            .zip(&admin.face_mass_centers)
            .filter(|(face, _)| face.nodes.len() == 3 && {
                let ring: Vec<Point> = face.nodes.iter().map(|&n| self.nodes()[n]).collect();
                is_obtuse(&ring)
            })
            .map(|(_, center)| *center)
            .collect()
    }

    /// Centers of flow edges shorter than `threshold`.
    ///
    /// A flow edge connects the circumcenters of the two faces sharing a
    /// mesh edge.
    pub fn small_flow_edge_centers(&self, threshold: f64) -> Result<Vec<Point>, MeshForgeError> {
        if threshold <= 0.0 {
            return Err(MeshForgeError::InvalidParameter {
                name: "small_flow_edges_length_threshold",
                reason: "must be positive",
            });
        }
        let admin = self.administration();
        let mut centers = Vec::new();
        for e in 0..self.edge_count() {
            let [Some(f1), Some(f2)] = admin.edge_faces[e] else {
                continue;
            };
            let c1 = admin.face_circumcenters[f1];
            let c2 = admin.face_circumcenters[f2];
            if self.projection().distance(c1, c2) < threshold {
                centers.push(self.projection().midpoint(c1, c2));
            }
        }
        Ok(centers)
    }

    /// Delete small flow edges and small/obtuse triangles in one pass.
    ///
    /// Flow edges shorter than `threshold` are removed by dropping the
    /// shared mesh edge, merging the two adjacent faces. Triangles whose
    /// area falls below `min_fractional_area` of the average area of their
    /// neighbors collapse along their shortest edge, re-triangulating the
    /// surrounding region through the merged node.
    pub fn delete_small_flow_edges_and_small_triangles(
        &mut self,
        threshold: f64,
        min_fractional_area: f64,
    ) -> Result<(), MeshForgeError> {
        if min_fractional_area <= 0.0 || min_fractional_area >= 1.0 {
            return Err(MeshForgeError::InvalidParameter {
                name: "min_fractional_area_triangles",
                reason: "must lie strictly between 0 and 1",
            });
        }
        let mut scratch = self.clone();
        scratch.drop_small_flow_edges(threshold)?;
        scratch.collapse_small_triangles(min_fractional_area)?;
        *self = scratch;
        Ok(())
    }

    fn drop_small_flow_edges(&mut self, threshold: f64) -> Result<(), MeshForgeError> {
        if threshold <= 0.0 {
            return Err(MeshForgeError::InvalidParameter {
                name: "small_flow_edges_length_threshold",
                reason: "must be positive",
            });
        }
        let doomed: HashSet<usize> = {
            let admin = self.administration();
            let mut doomed = HashSet::new();
            for e in 0..self.edge_count() {
                let [Some(f1), Some(f2)] = admin.edge_faces[e] else {
                    continue;
                };
                let d = self.projection().distance(
                    admin.face_circumcenters[f1],
                    admin.face_circumcenters[f2],
                );
                if d < threshold {
                    // Only merge faces while the combined cell stays small
                    // enough to be a face again.
                    let combined =
                        admin.faces[f1].nodes.len() + admin.faces[f2].nodes.len() - 2;
                    if combined <= crate::mesh::MAX_NODES_PER_FACE {
                        doomed.insert(e);
                    }
                }
            }
            doomed
        };
        if !doomed.is_empty() {
            let mut idx = 0;
            self.edges.retain(|_| {
                let keep = !doomed.contains(&idx);
                idx += 1;
                keep
            });
            self.invalidate_cache();
        }
        Ok(())
    }

    fn collapse_small_triangles(&mut self, min_fractional_area: f64) -> Result<(), MeshForgeError> {
        // One collapse invalidates face indexing, so apply one per sweep
        // until no small triangle remains.
        loop {
            let collapse = {
                let admin = self.administration();
                let mut found = None;
                'faces: for (f, face) in admin.faces.iter().enumerate() {
                    if face.nodes.len() != 3 {
                        continue;
                    }
                    let mut neighbor_total = 0.0;
                    let mut neighbor_count = 0usize;
                    for &e in &face.edges {
                        for adj in admin.edge_faces[e].iter().flatten() {
                            if *adj != f {
                                neighbor_total += admin.face_areas[*adj];
                                neighbor_count += 1;
                            }
                        }
                    }
                    if neighbor_count == 0 {
                        continue;
                    }
                    let average = neighbor_total / neighbor_count as f64;
                    if admin.face_areas[f] < min_fractional_area * average {
                        // Collapse the shortest edge of the triangle.
                        let mut best: Option<(usize, usize, f64)> = None;
                        for k in 0..3 {
                            let a = face.nodes[k];
                            let b = face.nodes[(k + 1) % 3];
                            let len = self.projection().distance(self.nodes()[a], self.nodes()[b]);
                            if best.map_or(true, |(_, _, bl)| len < bl) {
                                best = Some((a, b, len));
                            }
                        }
                        if let Some((a, b, _)) = best {
                            found = Some((a.max(b), a.min(b)));
                            break 'faces;
                        }
                    }
                }
                found
            };
            match collapse {
                Some((from, into)) => self.merge_two_nodes(from, into)?,
                None => return Ok(()),
            }
        }
    }
}

/// Any interior angle of the triangle ring greater than 90°.
fn is_obtuse(ring: &[Point]) -> bool {
    debug_assert_eq!(ring.len(), 3);
    for i in 0..3 {
        let prev = ring[(i + 2) % 3];
        let curr = ring[i];
        let next = ring[(i + 1) % 3];
        if geometry::dot(prev.sub(curr), next.sub(curr)) < 0.0 {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Projection;
    use crate::mesh::tests::rectilinear_3x3;
    use crate::mesh::{Edge, Mesh2d};

    #[test]
    fn orthogonality_of_rectilinear_grid() {
        let mesh = rectilinear_3x3();
        let values = mesh.orthogonality();
        assert_eq!(values.len(), 12);
        let defined: Vec<f64> = values.iter().flatten().copied().collect();
        // Exactly the 4 interior edges carry a value, each exactly 0.
        assert_eq!(defined.len(), 4);
        for v in defined {
            assert!(v.abs() < 1e-12);
        }
    }

    #[test]
    fn smoothness_of_uniform_grid_is_one() {
        let mesh = rectilinear_3x3();
        let values = mesh.smoothness();
        assert_eq!(values.len(), 12);
        let defined: Vec<f64> = values.iter().flatten().copied().collect();
        assert_eq!(defined.len(), 4);
        for v in defined {
            assert!((v - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn displaced_grid_loses_orthogonality() {
        let mut mesh = rectilinear_3x3();
        mesh.move_node(Point::new(1.3, 1.3), 4).unwrap();
        let values = mesh.orthogonality();
        let worst = values
            .iter()
            .flatten()
            .copied()
            .fold(0.0f64, f64::max);
        assert!(worst > 0.0);
    }

    #[test]
    fn obtuse_triangle_detection() {
        let mut mesh = Mesh2d::new(Projection::Cartesian);
        // One right triangle (not obtuse) and one clearly obtuse triangle.
        mesh.set(
            vec![
                Point::new(0.0, 0.0),
                Point::new(4.0, 0.0),
                Point::new(0.0, 3.0),
                Point::new(8.0, 0.5),
            ],
            vec![
                Edge::new(0, 1),
                Edge::new(1, 2),
                Edge::new(2, 0),
                Edge::new(1, 3),
                Edge::new(3, 2),
            ],
        )
        .unwrap();
        let centers = mesh.obtuse_triangle_mass_centers();
        assert_eq!(centers.len(), 1);
        assert!(centers[0].x > 2.0);
    }

    #[test]
    fn small_flow_edges_reported_and_removed() {
        // Two triangles over a thin quad share edge (1,3); their
        // circumcenters nearly coincide, so the flow edge is short.
        let nodes = vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 4.0),
            Point::new(0.0, 4.0),
        ];
        let edges = vec![
            Edge::new(0, 1),
            Edge::new(1, 2),
            Edge::new(2, 3),
            Edge::new(3, 0),
            Edge::new(1, 3),
        ];
        let mut mesh = Mesh2d::new(Projection::Cartesian);
        mesh.set(nodes, edges).unwrap();

        // Both circumcenters sit at the square center: flow length 0.
        let centers = mesh.small_flow_edge_centers(0.5).unwrap();
        assert_eq!(centers.len(), 1);
        assert!((centers[0].x - 2.0).abs() < 1e-12);

        mesh.delete_small_flow_edges_and_small_triangles(0.5, 0.1)
            .unwrap();
        // The diagonal is gone; one quad face remains.
        assert_eq!(mesh.edge_count(), 4);
        assert_eq!(mesh.administration().faces.len(), 1);
        assert!(mesh.small_flow_edge_centers(0.5).unwrap().is_empty());
    }

    #[test]
    fn threshold_validation() {
        let mesh = rectilinear_3x3();
        assert!(matches!(
            mesh.small_flow_edge_centers(0.0),
            Err(MeshForgeError::InvalidParameter { .. })
        ));
    }
}

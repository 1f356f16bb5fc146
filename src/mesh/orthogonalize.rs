//! Iterative mesh orthogonalization and edge flipping.
//!
//! The solver runs a fixed iteration schedule: `outer_iterations` passes,
//! each recomputing the face administration once and then sweeping
//! `boundary_iterations` boundary updates and `inner_iterations` interior
//! updates. Convergence is by count, never by residual, so two runs with
//! the same parameters perform exactly the same work.

use crate::error::MeshForgeError;
use crate::geometry::polyline::Polygon;
use crate::geometry::{self, EPS, Point};
use crate::mesh::Mesh2d;
use crate::params::OrthogonalizationParameters;

/// Whether boundary nodes may be pulled onto the land boundary polyline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LandBoundaryProjection {
    /// Boundary nodes stay on the mesh's own boundary.
    None,
    /// Boundary nodes are projected onto the supplied land boundary.
    ToLandBoundary,
}

impl Mesh2d {
    /// Orthogonalize node positions inside `polygon`.
    ///
    /// Interior nodes blend a smoothing target (the neighbor average) with
    /// an orthogonality target derived from the adjacent face circumcenters,
    /// weighted by `orthogonalization_to_smoothing_factor`. Boundary nodes
    /// of degree two (corners) are pinned; other boundary nodes relax along
    /// the boundary, optionally projected onto `land_boundary`.
    ///
    /// On any failure the mesh is left exactly as it was.
    pub fn orthogonalize(
        &mut self,
        projection_mode: LandBoundaryProjection,
        params: &OrthogonalizationParameters,
        polygon: Option<&Polygon>,
        land_boundary: Option<&[Point]>,
    ) -> Result<(), MeshForgeError> {
        params.validate()?;
        if self.is_empty() {
            return Err(MeshForgeError::EmptyState("mesh"));
        }
        let mut scratch = self.clone();
        scratch.orthogonalize_in_place(projection_mode, params, polygon, land_boundary)?;
        *self = scratch;
        Ok(())
    }

    fn orthogonalize_in_place(
        &mut self,
        projection_mode: LandBoundaryProjection,
        params: &OrthogonalizationParameters,
        polygon: Option<&Polygon>,
        land_boundary: Option<&[Point]>,
    ) -> Result<(), MeshForgeError> {
        let factor = params.orthogonalization_to_smoothing_factor;
        let movable: Vec<bool> = self
            .nodes()
            .iter()
            .map(|&p| polygon.map_or(true, |poly| poly.contains(p)))
            .collect();

        for outer in 0..params.outer_iterations {
            let (interior, boundary, neighbors, boundary_neighbors, circum_targets) =
                self.classify_nodes();

            let mut displacement: f64 = 0.0;
            for _ in 0..params.boundary_iterations {
                for &n in &boundary {
                    if !movable[n] {
                        continue;
                    }
                    let Some((a, b)) = boundary_neighbors[n] else {
                        continue;
                    };
                    let target = self.nodes()[a].add(self.nodes()[b]).scale(0.5);
                    // Local scale: half the mean distance to the two
                    // boundary neighbors. Land projection only captures
                    // nodes already close to the land boundary.
                    let local = 0.25
                        * (self.projection().distance(target, self.nodes()[a])
                            + self.projection().distance(target, self.nodes()[b]));
                    let projected = match (projection_mode, land_boundary) {
                        (LandBoundaryProjection::ToLandBoundary, Some(line))
                            if line.len() >= 2 =>
                        {
                            let on_land = self.project_to_polyline(target, line);
                            if self.projection().distance(target, on_land) <= local {
                                on_land
                            } else {
                                self.project_to_polyline(target, &boundary_ring_of(self, n))
                            }
                        }
                        _ => self.project_to_polyline(target, &boundary_ring_of(self, n)),
                    };
                    displacement += self.projection().distance(self.nodes[n], projected);
                    self.nodes[n] = projected;
                }
            }

            for _ in 0..params.inner_iterations {
                for &n in &interior {
                    if !movable[n] {
                        continue;
                    }
                    let adjacent = &neighbors[n];
                    if adjacent.is_empty() {
                        continue;
                    }
                    let mut smooth = Point::default();
                    for &m in adjacent {
                        smooth = smooth.add(self.nodes()[m]);
                    }
                    let smooth = smooth.scale(1.0 / adjacent.len() as f64);

                    let ortho = orthogonality_target(self, n, &circum_targets[n]);
                    let target = ortho.scale(factor).add(smooth.scale(1.0 - factor));
                    displacement += self.projection().distance(self.nodes[n], target);
                    self.nodes[n] = target;
                }
            }
            self.invalidate_cache();
            log::debug!(
                "orthogonalization outer pass {}: accumulated displacement {:.6e}",
                outer,
                displacement
            );
        }
        Ok(())
    }

    /// Partition nodes into interior and boundary and collect per-node
    /// adjacency used by the sweeps.
    #[allow(clippy::type_complexity)]
    fn classify_nodes(
        &self,
    ) -> (
        Vec<usize>,
        Vec<usize>,
        Vec<Vec<usize>>,
        Vec<Option<(usize, usize)>>,
        Vec<Vec<(usize, [Point; 2])>>,
    ) {
        let admin = self.administration();
        let node_count = self.node_count();
        let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); node_count];
        let mut on_boundary = vec![false; node_count];
        let mut boundary_adjacent: Vec<Vec<usize>> = vec![Vec::new(); node_count];
        let mut circum_targets: Vec<Vec<(usize, [Point; 2])>> = vec![Vec::new(); node_count];

        for (e, edge) in self.edges().iter().enumerate() {
            neighbors[edge.first].push(edge.second);
            neighbors[edge.second].push(edge.first);
            let faces: Vec<usize> = admin.edge_faces[e].iter().flatten().copied().collect();
            if faces.len() < 2 {
                on_boundary[edge.first] = true;
                on_boundary[edge.second] = true;
                if faces.len() == 1 {
                    boundary_adjacent[edge.first].push(edge.second);
                    boundary_adjacent[edge.second].push(edge.first);
                }
            } else {
                let c1 = admin.face_circumcenters[faces[0]];
                let c2 = admin.face_circumcenters[faces[1]];
                circum_targets[edge.first].push((edge.second, [c1, c2]));
                circum_targets[edge.second].push((edge.first, [c1, c2]));
            }
        }

        let mut interior = Vec::new();
        let mut boundary = Vec::new();
        let mut boundary_neighbors: Vec<Option<(usize, usize)>> = vec![None; node_count];
        for n in 0..node_count {
            if on_boundary[n] {
                // Corner nodes (two incident edges) stay pinned; others
                // relax between their two boundary neighbors.
                if neighbors[n].len() > 2 && boundary_adjacent[n].len() == 2 {
                    boundary_neighbors[n] = Some((boundary_adjacent[n][0], boundary_adjacent[n][1]));
                    boundary.push(n);
                }
            } else if !neighbors[n].is_empty() {
                interior.push(n);
            }
        }
        (interior, boundary, neighbors, boundary_neighbors, circum_targets)
    }
}

/// Position for node `n` that reduces the deviation of its edges from
/// perpendicularity to the adjacent circumcenter segments.
fn orthogonality_target(
    mesh: &Mesh2d,
    n: usize,
    contributions: &[(usize, [Point; 2])],
) -> Point {
    let u = mesh.nodes()[n];
    if contributions.is_empty() {
        return u;
    }
    let mut delta = Point::default();
    let mut used = 0usize;
    for &(other, [c1, c2]) in contributions {
        let c = c2.sub(c1);
        let norm = c.norm();
        if norm <= EPS {
            continue;
        }
        let direction = c.scale(1.0 / norm);
        let excess = geometry::dot(mesh.nodes()[other].sub(u), direction);
        delta = delta.add(direction.scale(excess));
        used += 1;
    }
    if used == 0 {
        return u;
    }
    u.add(delta.scale(1.0 / used as f64))
}

/// The boundary loop that contains node `n`, as a point ring for
/// projection; falls back to the node's own position.
fn boundary_ring_of(mesh: &Mesh2d, n: usize) -> Vec<Point> {
    for ring in mesh.boundary_polygons() {
        let target = mesh.nodes()[n];
        if ring
            .iter()
            .any(|p| p.sub(target).norm() <= EPS)
        {
            return ring;
        }
    }
    vec![mesh.nodes()[n]; 2]
}

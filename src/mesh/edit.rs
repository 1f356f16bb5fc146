//! Atomic topology edits on [`Mesh2d`].
//!
//! Every mutating operation validates its input against the current state
//! before touching anything, and multi-step edits build into a scratch copy
//! that is swapped in only on full success, so a failed call never leaves a
//! partially applied mutation behind.

use hashbrown::{HashMap, HashSet};

use crate::error::MeshForgeError;
use crate::geometry::polyline::{Polygon, closest_point_within};
use crate::geometry::{Point, lerp, project_on_segment};
use crate::mesh::{Edge, Mesh2d, validate_edge};

/// Strategy for [`Mesh2d::delete_in_polygon`], selecting which element kind
/// is classified against the polygon and through which representative point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteMeshOption {
    /// Delete nodes whose position lies inside, cascading to their edges.
    NodesInside,
    /// Delete edges whose midpoint lies inside, cascading to orphaned nodes.
    EdgesWithCenterInside,
    /// Delete faces whose mass center lies inside, cascading to edges and
    /// nodes used only by deleted faces.
    FacesWithCenterInside,
}

impl Mesh2d {
    /// Insert a new free node and return its index.
    pub fn insert_node(&mut self, x: f64, y: f64) -> Result<usize, MeshForgeError> {
        let p = Point::new(x, y);
        if !p.is_finite() {
            return Err(MeshForgeError::InvalidGeometry(
                "node coordinates must be finite".into(),
            ));
        }
        self.nodes.push(p);
        self.invalidate_cache();
        Ok(self.nodes.len() - 1)
    }

    /// Insert an edge between two existing nodes and return its index.
    ///
    /// Re-inserting an existing edge returns the existing index unchanged.
    pub fn insert_edge(&mut self, first: usize, second: usize) -> Result<usize, MeshForgeError> {
        let edge = Edge::new(first, second);
        validate_edge(&edge, self.nodes.len())?;
        if let Some(existing) = self
            .edges
            .iter()
            .position(|e| e.touches(first) && e.touches(second))
        {
            return Ok(existing);
        }
        self.edges.push(edge);
        self.invalidate_cache();
        Ok(self.edges.len() - 1)
    }

    /// Delete a node, cascading to every edge that references it.
    ///
    /// Remaining node indices are compacted; edge endpoints are remapped so
    /// no dangling index survives the call.
    pub fn delete_node(&mut self, index: usize) -> Result<(), MeshForgeError> {
        self.node(index)?;
        let mut keep = vec![true; self.nodes.len()];
        keep[index] = false;
        self.remove_nodes(&keep);
        Ok(())
    }

    /// Move an existing node to a new position.
    pub fn move_node(&mut self, position: Point, index: usize) -> Result<(), MeshForgeError> {
        self.node(index)?;
        if !position.is_finite() {
            return Err(MeshForgeError::InvalidGeometry(
                "node coordinates must be finite".into(),
            ));
        }
        self.nodes[index] = position;
        self.invalidate_cache();
        Ok(())
    }

    /// Index of the node closest to `point` within `search_radius`.
    pub fn closest_node(&self, point: Point, search_radius: f64) -> Option<usize> {
        closest_point_within(&self.nodes, point, search_radius, self.projection)
    }

    /// Index of the edge whose center is closest to `point`.
    pub fn closest_edge(&self, point: Point) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for e in 0..self.edges.len() {
            let center = self
                .projection
                .midpoint(self.nodes[self.edges[e].first], self.nodes[self.edges[e].second]);
            let d = self.projection.squared_distance(point, center);
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((e, d));
            }
        }
        best.map(|(e, _)| e)
    }

    /// Delete the edge whose center is closest to `point`.
    pub fn delete_edge(&mut self, point: Point) -> Result<(), MeshForgeError> {
        let edge = self
            .closest_edge(point)
            .ok_or(MeshForgeError::EmptyState("edge array"))?;
        self.edges.remove(edge);
        self.invalidate_cache();
        Ok(())
    }

    /// Merge `first` into `second`: edges of `first` are rewired to
    /// `second`, degenerate and duplicate edges dropped, and `first`
    /// removed.
    pub fn merge_two_nodes(&mut self, first: usize, second: usize) -> Result<(), MeshForgeError> {
        self.node(first)?;
        self.node(second)?;
        if first == second {
            return Err(MeshForgeError::DegenerateEdge(first));
        }
        for edge in &mut self.edges {
            if edge.first == first {
                edge.first = second;
            }
            if edge.second == first {
                edge.second = second;
            }
        }
        dedup_edges(&mut self.edges);
        let mut keep = vec![true; self.nodes.len()];
        keep[first] = false;
        self.remove_nodes(&keep);
        Ok(())
    }

    /// Merge every pair of nodes closer than `merging_distance`, restricted
    /// to nodes inside `polygon` when one is given.
    ///
    /// Connected clusters collapse onto their lowest-indexed member.
    pub fn merge_nodes(
        &mut self,
        polygon: Option<&Polygon>,
        merging_distance: f64,
    ) -> Result<(), MeshForgeError> {
        if merging_distance < 0.0 {
            return Err(MeshForgeError::InvalidParameter {
                name: "merging_distance",
                reason: "must be non-negative",
            });
        }
        let candidates: Vec<usize> = (0..self.nodes.len())
            .filter(|&n| polygon.map_or(true, |p| p.contains(self.nodes[n])))
            .collect();

        // Bucket candidates on a grid of cell size `merging_distance` so
        // only neighboring buckets need pairwise checks.
        let cell = merging_distance.max(crate::geometry::EPS);
        let mut buckets: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
        for &n in &candidates {
            let key = (
                (self.nodes[n].x / cell).floor() as i64,
                (self.nodes[n].y / cell).floor() as i64,
            );
            buckets.entry(key).or_default().push(n);
        }

        let mut parent: Vec<usize> = (0..self.nodes.len()).collect();
        for &n in &candidates {
            let key = (
                (self.nodes[n].x / cell).floor() as i64,
                (self.nodes[n].y / cell).floor() as i64,
            );
            for dx in -1..=1 {
                for dy in -1..=1 {
                    let Some(neighbors) = buckets.get(&(key.0 + dx, key.1 + dy)) else {
                        continue;
                    };
                    for &m in neighbors {
                        if m <= n {
                            continue;
                        }
                        let d = self.projection.distance(self.nodes[n], self.nodes[m]);
                        if d < merging_distance {
                            union(&mut parent, n, m);
                        }
                    }
                }
            }
        }

        // Rewire edges onto cluster representatives.
        let mut changed = false;
        for edge in &mut self.edges {
            let a = find(&mut parent, edge.first);
            let b = find(&mut parent, edge.second);
            if a != edge.first || b != edge.second {
                changed = true;
            }
            edge.first = a;
            edge.second = b;
        }
        let mut keep = vec![true; self.nodes.len()];
        for n in 0..self.nodes.len() {
            if find(&mut parent, n) != n {
                keep[n] = false;
                changed = true;
            }
        }
        if changed {
            dedup_edges(&mut self.edges);
            self.remove_nodes(&keep);
        }
        Ok(())
    }

    /// Delete mesh elements selected by a polygon.
    ///
    /// `invert` flips the inside test of the chosen representative points.
    pub fn delete_in_polygon(
        &mut self,
        polygon: &Polygon,
        option: DeleteMeshOption,
        invert: bool,
    ) -> Result<(), MeshForgeError> {
        let selected = |p: Point| polygon.contains(p) != invert;
        match option {
            DeleteMeshOption::NodesInside => {
                let keep: Vec<bool> = self.nodes.iter().map(|&p| !selected(p)).collect();
                self.remove_nodes(&keep);
            }
            DeleteMeshOption::EdgesWithCenterInside => {
                let nodes = self.nodes.clone();
                let projection = self.projection;
                self.edges.retain(|e| {
                    !selected(projection.midpoint(nodes[e.first], nodes[e.second]))
                });
                self.invalidate_cache();
                self.remove_orphan_nodes();
            }
            DeleteMeshOption::FacesWithCenterInside => {
                let keep_edge = {
                    let admin = self.administration();
                    let deleted: Vec<bool> = admin
                        .face_mass_centers
                        .iter()
                        .map(|&c| selected(c))
                        .collect();
                    // An edge survives if any adjacent face survives, or if
                    // it bounds no face at all.
                    let mut keep_edge = vec![false; self.edges.len()];
                    for (e, adjacency) in admin.edge_faces.iter().enumerate() {
                        let facing: Vec<usize> = adjacency.iter().flatten().copied().collect();
                        keep_edge[e] = facing.is_empty() || facing.iter().any(|&f| !deleted[f]);
                    }
                    keep_edge
                };
                let mut idx = 0;
                self.edges.retain(|_| {
                    let keep = keep_edge[idx];
                    idx += 1;
                    keep
                });
                self.invalidate_cache();
                self.remove_orphan_nodes();
            }
        }
        Ok(())
    }

    /// Indices of hanging edges: edges with an endpoint used by no face.
    pub fn hanging_edges(&self) -> Vec<usize> {
        let admin = self.administration();
        (0..self.edges.len())
            .filter(|&e| {
                let edge = &self.edges[e];
                !admin.node_in_face[edge.first] || !admin.node_in_face[edge.second]
            })
            .collect()
    }

    /// Delete hanging edges until none remain.
    ///
    /// Nodes are kept; a second call is a no-op.
    pub fn delete_hanging_edges(&mut self) -> Result<(), MeshForgeError> {
        loop {
            let hanging = self.hanging_edges();
            if hanging.is_empty() {
                return Ok(());
            }
            let doomed: HashSet<usize> = hanging.into_iter().collect();
            let mut idx = 0;
            self.edges.retain(|_| {
                let keep = !doomed.contains(&idx);
                idx += 1;
                keep
            });
            self.invalidate_cache();
        }
    }

    /// Node indices inside (or outside, with `inside == false`) the polygon.
    pub fn nodes_in_polygon(&self, polygon: &Polygon, inside: bool) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|&n| polygon.contains(self.nodes[n]) == inside)
            .collect()
    }

    /// Split `edge` at its midpoint, returning the new node index.
    ///
    /// The original edge is replaced by its two halves.
    pub(crate) fn split_edge(&mut self, edge: usize) -> Result<usize, MeshForgeError> {
        let e = *self
            .edges
            .get(edge)
            .ok_or(MeshForgeError::EdgeIndexOutOfRange {
                index: edge as i64,
                count: self.edges.len(),
            })?;
        let mid = lerp(self.nodes[e.first], self.nodes[e.second], 0.5);
        self.nodes.push(mid);
        let mid_index = self.nodes.len() - 1;
        self.edges[edge] = Edge::new(e.first, mid_index);
        self.edges.push(Edge::new(mid_index, e.second));
        self.invalidate_cache();
        Ok(mid_index)
    }

    /// Drop nodes flagged `false` in `keep`, cascading to their edges and
    /// compacting all indices.
    pub(crate) fn remove_nodes(&mut self, keep: &[bool]) {
        debug_assert_eq!(keep.len(), self.nodes.len());
        let mut remap = vec![usize::MAX; self.nodes.len()];
        let mut next = 0usize;
        for (n, &k) in keep.iter().enumerate() {
            if k {
                remap[n] = next;
                next += 1;
            }
        }
        let mut idx = 0;
        self.nodes.retain(|_| {
            let k = keep[idx];
            idx += 1;
            k
        });
        self.edges.retain_mut(|edge| {
            if keep[edge.first] && keep[edge.second] {
                edge.first = remap[edge.first];
                edge.second = remap[edge.second];
                true
            } else {
                false
            }
        });
        self.invalidate_cache();
    }

    /// Drop nodes referenced by no edge.
    fn remove_orphan_nodes(&mut self) {
        let mut keep = vec![false; self.nodes.len()];
        for edge in &self.edges {
            keep[edge.first] = true;
            keep[edge.second] = true;
        }
        if keep.iter().any(|&k| !k) {
            self.remove_nodes(&keep);
        }
    }

    /// Project `point` onto the closest segment of `boundary`.
    pub(crate) fn project_to_polyline(&self, point: Point, boundary: &[Point]) -> Point {
        let mut best = point;
        let mut best_d = f64::INFINITY;
        for w in boundary.windows(2) {
            let (q, _) = project_on_segment(point, w[0], w[1]);
            let d = self.projection.squared_distance(point, q);
            if d < best_d {
                best_d = d;
                best = q;
            }
        }
        best
    }
}

/// Normalize endpoint order and drop duplicate or degenerate edges.
fn dedup_edges(edges: &mut Vec<Edge>) {
    let mut seen: HashSet<(usize, usize)> = HashSet::with_capacity(edges.len());
    edges.retain(|e| {
        if e.first == e.second {
            return false;
        }
        seen.insert((e.first.min(e.second), e.first.max(e.second)))
    });
}

fn find(parent: &mut Vec<usize>, mut n: usize) -> usize {
    while parent[n] != n {
        parent[n] = parent[parent[n]];
        n = parent[n];
    }
    n
}

fn union(parent: &mut Vec<usize>, a: usize, b: usize) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        // Lower index wins so clusters collapse deterministically.
        let (lo, hi) = (ra.min(rb), ra.max(rb));
        parent[hi] = lo;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Projection;
    use crate::mesh::tests::rectilinear_3x3;

    #[test]
    fn insert_and_delete_node_keeps_indices_consistent() {
        let mut mesh = rectilinear_3x3();
        let n = mesh.insert_node(5.0, 5.0).unwrap();
        assert_eq!(n, 9);
        mesh.insert_edge(8, n).unwrap();
        assert_eq!(mesh.edge_count(), 13);

        mesh.delete_node(n).unwrap();
        assert_eq!(mesh.node_count(), 9);
        assert_eq!(mesh.edge_count(), 12);
        for edge in mesh.edges() {
            assert!(edge.first < 9 && edge.second < 9);
        }
    }

    #[test]
    fn delete_interior_node_cascades_edges() {
        let mut mesh = rectilinear_3x3();
        // Node 4 is the center with 4 incident edges.
        mesh.delete_node(4).unwrap();
        assert_eq!(mesh.node_count(), 8);
        assert_eq!(mesh.edge_count(), 8);
        assert_eq!(mesh.administration().faces.len(), 0);
    }

    #[test]
    fn insert_edge_rejects_bad_indices() {
        let mut mesh = rectilinear_3x3();
        assert!(matches!(
            mesh.insert_edge(0, 42),
            Err(MeshForgeError::NodeIndexOutOfRange { .. })
        ));
        assert!(matches!(
            mesh.insert_edge(3, 3),
            Err(MeshForgeError::DegenerateEdge(3))
        ));
        assert_eq!(mesh.edge_count(), 12);
    }

    #[test]
    fn duplicate_edge_insert_is_stable() {
        let mut mesh = rectilinear_3x3();
        let existing = mesh.insert_edge(0, 1).unwrap();
        assert_eq!(existing, 0);
        assert_eq!(mesh.edge_count(), 12);
    }

    #[test]
    fn closest_queries_and_edge_deletion() {
        let mut mesh = rectilinear_3x3();
        assert_eq!(mesh.closest_node(Point::new(1.9, 1.9), 0.5), Some(8));
        assert_eq!(mesh.closest_node(Point::new(10.0, 10.0), 0.5), None);

        // Center of edge (0,1) is (0.5, 0).
        let e = mesh.closest_edge(Point::new(0.5, -0.2)).unwrap();
        assert_eq!(e, 0);
        mesh.delete_edge(Point::new(0.5, -0.2)).unwrap();
        assert_eq!(mesh.edge_count(), 11);
    }

    #[test]
    fn merge_two_nodes_rewires_edges() {
        let mut mesh = rectilinear_3x3();
        mesh.merge_two_nodes(1, 4).unwrap();
        assert_eq!(mesh.node_count(), 8);
        // Edge (0,1) now ends at the merged node; edge (1,4) vanished.
        assert_eq!(mesh.edge_count(), 11);
        for edge in mesh.edges() {
            assert!(edge.first != edge.second);
        }
    }

    #[test]
    fn merge_nodes_collapses_close_pairs() {
        let mut mesh = Mesh2d::new(Projection::Cartesian);
        mesh.set(
            vec![
                Point::new(0.0, 0.0),
                Point::new(0.005, 0.0),
                Point::new(1.0, 0.0),
            ],
            vec![Edge::new(0, 2), Edge::new(1, 2)],
        )
        .unwrap();
        mesh.merge_nodes(None, 0.01).unwrap();
        assert_eq!(mesh.node_count(), 2);
        assert_eq!(mesh.edge_count(), 1);
    }

    #[test]
    fn delete_in_polygon_nodes_inside() {
        let mut mesh = rectilinear_3x3();
        let polygon = Polygon::new(vec![
            Point::new(0.5, 0.5),
            Point::new(1.5, 0.5),
            Point::new(1.5, 1.5),
            Point::new(0.5, 1.5),
        ])
        .unwrap();
        mesh.delete_in_polygon(&polygon, DeleteMeshOption::NodesInside, false)
            .unwrap();
        // Only the center node lies inside.
        assert_eq!(mesh.node_count(), 8);
        assert_eq!(mesh.edge_count(), 8);
    }

    #[test]
    fn delete_in_polygon_inverted_clears_outside() {
        let mut mesh = rectilinear_3x3();
        let polygon = Polygon::new(vec![
            Point::new(0.5, 0.5),
            Point::new(1.5, 0.5),
            Point::new(1.5, 1.5),
            Point::new(0.5, 1.5),
        ])
        .unwrap();
        mesh.delete_in_polygon(&polygon, DeleteMeshOption::NodesInside, true)
            .unwrap();
        assert_eq!(mesh.node_count(), 1);
        assert_eq!(mesh.edge_count(), 0);
    }

    #[test]
    fn hanging_edge_detection_and_idempotent_delete() {
        let mut mesh = rectilinear_3x3();
        let free = mesh.insert_node(3.0, 1.0).unwrap();
        mesh.insert_edge(5, free).unwrap();
        let hanging = mesh.hanging_edges();
        assert_eq!(hanging.len(), 1);

        mesh.delete_hanging_edges().unwrap();
        assert!(mesh.hanging_edges().is_empty());
        let edges_after = mesh.edge_count();

        mesh.delete_hanging_edges().unwrap();
        assert_eq!(mesh.edge_count(), edges_after);
        assert_eq!(mesh.administration().faces.len(), 4);
    }

    #[test]
    fn nodes_in_polygon_selection() {
        let mesh = rectilinear_3x3();
        let polygon = Polygon::new(vec![
            Point::new(-0.5, -0.5),
            Point::new(1.5, -0.5),
            Point::new(1.5, 2.5),
            Point::new(-0.5, 2.5),
        ])
        .unwrap();
        let inside = mesh.nodes_in_polygon(&polygon, true);
        assert_eq!(inside, vec![0, 1, 3, 4, 6, 7]);
        let outside = mesh.nodes_in_polygon(&polygon, false);
        assert_eq!(outside, vec![2, 5, 8]);
    }

    #[test]
    fn split_edge_replaces_with_halves() {
        let mut mesh = rectilinear_3x3();
        let mid = mesh.split_edge(0).unwrap();
        assert_eq!(mesh.node_count(), 10);
        assert_eq!(mesh.edge_count(), 13);
        let p = mesh.node(mid).unwrap();
        assert!((p.x - 0.5).abs() < 1e-12 && p.y.abs() < 1e-12);
    }
}

//! Unstructured mesh state: nodes, edges, and derived face administration.
//!
//! A [`Mesh2d`] owns node coordinates and node-pair edges; faces are not
//! stored but *derived* from the edge graph by an administration pass that
//! walks angularly-sorted half-edges and keeps the bounded interior cycles.
//! The administration (faces, edge-face adjacency, face centers, areas) is
//! cached in a `OnceCell` and dropped on every mutation, so queries after a
//! successful mutating call can never observe dangling indices.

pub mod edit;
pub mod generate;
pub mod orthogonalize;
pub mod quality;
pub mod refine;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::MeshForgeError;
use crate::geometry::{self, EPS, Point, Projection};

/// Largest face arity the administration will accept as a mesh cell.
pub const MAX_NODES_PER_FACE: usize = 6;

/// An undirected edge between two node indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub first: usize,
    pub second: usize,
}

impl Edge {
    #[inline]
    pub fn new(first: usize, second: usize) -> Self {
        Self { first, second }
    }

    /// The endpoint opposite to `node`, if `node` is an endpoint.
    #[inline]
    pub fn other(&self, node: usize) -> Option<usize> {
        if self.first == node {
            Some(self.second)
        } else if self.second == node {
            Some(self.first)
        } else {
            None
        }
    }

    #[inline]
    pub fn touches(&self, node: usize) -> bool {
        self.first == node || self.second == node
    }
}

/// A derived mesh cell: a closed node cycle plus the edges it traverses.
#[derive(Clone, Debug, PartialEq)]
pub struct Face {
    pub nodes: Vec<usize>,
    pub edges: Vec<usize>,
}

/// Cached derived topology and geometry, rebuilt on demand after mutations.
#[derive(Clone, Debug, Default)]
pub struct Administration {
    pub faces: Vec<Face>,
    /// Up to two adjacent faces per edge, in traversal order.
    pub edge_faces: Vec<[Option<usize>; 2]>,
    pub face_mass_centers: Vec<Point>,
    pub face_circumcenters: Vec<Point>,
    pub face_areas: Vec<f64>,
    /// Whether each node is used by at least one face.
    pub node_in_face: Vec<bool>,
}

/// Bulk snapshot of the mesh in flat-array exchange form.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh2dData {
    pub node_x: Vec<f64>,
    pub node_y: Vec<f64>,
    /// Flattened node-index pairs, two entries per edge.
    pub edge_nodes: Vec<usize>,
    /// Flattened per-face node cycles.
    pub face_nodes: Vec<usize>,
    pub nodes_per_face: Vec<usize>,
    pub edge_x: Vec<f64>,
    pub edge_y: Vec<f64>,
    pub face_x: Vec<f64>,
    pub face_y: Vec<f64>,
}

/// Element counts reported ahead of a bulk fetch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mesh2dDimensions {
    pub node_count: usize,
    pub edge_count: usize,
    pub face_count: usize,
    /// Total length of the flattened face-node array.
    pub face_node_count: usize,
}

/// Mutable unstructured mesh state.
#[derive(Clone, Debug)]
pub struct Mesh2d {
    projection: Projection,
    nodes: Vec<Point>,
    edges: Vec<Edge>,
    admin: OnceCell<Administration>,
}

impl Mesh2d {
    /// Empty mesh under the given coordinate metric.
    pub fn new(projection: Projection) -> Self {
        Self {
            projection,
            nodes: Vec::new(),
            edges: Vec::new(),
            admin: OnceCell::new(),
        }
    }

    #[inline]
    pub fn projection(&self) -> Projection {
        self.projection
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn nodes(&self) -> &[Point] {
        &self.nodes
    }

    #[inline]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node position, with range checking.
    pub fn node(&self, index: usize) -> Result<Point, MeshForgeError> {
        self.nodes
            .get(index)
            .copied()
            .ok_or(MeshForgeError::NodeIndexOutOfRange {
                index: index as i64,
                count: self.nodes.len(),
            })
    }

    /// Replace the whole mesh state from node and edge arrays.
    ///
    /// Faces are derived lazily afterward; the previous state is untouched
    /// when validation fails.
    pub fn set(&mut self, nodes: Vec<Point>, edges: Vec<Edge>) -> Result<(), MeshForgeError> {
        for (i, p) in nodes.iter().enumerate() {
            if !p.is_finite() {
                return Err(MeshForgeError::InvalidGeometry(format!(
                    "node {i} has non-finite coordinates"
                )));
            }
        }
        for edge in &edges {
            validate_edge(edge, nodes.len())?;
        }
        self.nodes = nodes;
        self.edges = edges;
        self.invalidate_cache();
        Ok(())
    }

    /// Drop all cached derived state; called after every mutation.
    pub(crate) fn invalidate_cache(&mut self) {
        self.admin = OnceCell::new();
    }

    /// Derived topology, computing it on first access since the last
    /// mutation.
    pub fn administration(&self) -> &Administration {
        self.admin.get_or_init(|| build_administration(self))
    }

    /// Midpoint of an edge under the mesh metric.
    pub fn edge_center(&self, edge: usize) -> Result<Point, MeshForgeError> {
        let e = self
            .edges
            .get(edge)
            .ok_or(MeshForgeError::EdgeIndexOutOfRange {
                index: edge as i64,
                count: self.edges.len(),
            })?;
        Ok(self
            .projection
            .midpoint(self.nodes[e.first], self.nodes[e.second]))
    }

    /// Element counts for the two-phase size-then-fetch protocol.
    pub fn dimensions(&self) -> Mesh2dDimensions {
        let admin = self.administration();
        Mesh2dDimensions {
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            face_count: admin.faces.len(),
            face_node_count: admin.faces.iter().map(|f| f.nodes.len()).sum(),
        }
    }

    /// Full snapshot, including derived edge centers and face mass centers.
    pub fn snapshot(&self) -> Mesh2dData {
        let admin = self.administration();
        let mut data = Mesh2dData {
            node_x: self.nodes.iter().map(|p| p.x).collect(),
            node_y: self.nodes.iter().map(|p| p.y).collect(),
            ..Default::default()
        };
        for edge in &self.edges {
            data.edge_nodes.push(edge.first);
            data.edge_nodes.push(edge.second);
            let c = self
                .projection
                .midpoint(self.nodes[edge.first], self.nodes[edge.second]);
            data.edge_x.push(c.x);
            data.edge_y.push(c.y);
        }
        for (face, center) in admin.faces.iter().zip(&admin.face_mass_centers) {
            data.face_nodes.extend_from_slice(&face.nodes);
            data.nodes_per_face.push(face.nodes.len());
            data.face_x.push(center.x);
            data.face_y.push(center.y);
        }
        data
    }

    /// Boundary loops as closed polylines, one part per loop.
    ///
    /// Boundary edges are those with exactly one adjacent face; hanging
    /// edges do not contribute.
    pub fn boundary_polygons(&self) -> Vec<Vec<Point>> {
        let admin = self.administration();
        let boundary: Vec<usize> = (0..self.edges.len())
            .filter(|&e| {
                admin.edge_faces[e][0].is_some() && admin.edge_faces[e][1].is_none()
            })
            .collect();
        // node -> incident boundary edges
        let mut node_edges: hashbrown::HashMap<usize, Vec<usize>> = hashbrown::HashMap::new();
        for &e in &boundary {
            node_edges.entry(self.edges[e].first).or_default().push(e);
            node_edges.entry(self.edges[e].second).or_default().push(e);
        }
        let mut visited = vec![false; self.edges.len()];
        let mut loops = Vec::new();
        for &start in &boundary {
            if visited[start] {
                continue;
            }
            let mut cycle = vec![self.edges[start].first];
            let mut node = self.edges[start].second;
            let mut edge = start;
            visited[start] = true;
            loop {
                cycle.push(node);
                let next = node_edges
                    .get(&node)
                    .and_then(|es| es.iter().find(|&&e| e != edge && !visited[e]).copied());
                match next {
                    Some(e) => {
                        visited[e] = true;
                        node = self.edges[e].other(node).unwrap_or(node);
                        edge = e;
                    }
                    None => break,
                }
            }
            if cycle.first() == cycle.last() {
                cycle.pop();
            }
            if cycle.len() >= 3 {
                let mut points: Vec<Point> = cycle.iter().map(|&n| self.nodes[n]).collect();
                // Close the loop explicitly for the exchange form.
                points.push(points[0]);
                loops.push(points);
            }
        }
        loops
    }
}

pub(crate) fn validate_edge(edge: &Edge, node_count: usize) -> Result<(), MeshForgeError> {
    if edge.first >= node_count {
        return Err(MeshForgeError::NodeIndexOutOfRange {
            index: edge.first as i64,
            count: node_count,
        });
    }
    if edge.second >= node_count {
        return Err(MeshForgeError::NodeIndexOutOfRange {
            index: edge.second as i64,
            count: node_count,
        });
    }
    if edge.first == edge.second {
        return Err(MeshForgeError::DegenerateEdge(edge.first));
    }
    Ok(())
}

/// Incident edges per node, each list sorted by outgoing direction angle.
///
/// Edges excluded by `active` (when given) are left out entirely.
pub(crate) fn sorted_node_edges(
    nodes: &[Point],
    edges: &[Edge],
    active: Option<&[bool]>,
) -> Vec<Vec<usize>> {
    let mut node_edges: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (e, edge) in edges.iter().enumerate() {
        if active.is_some_and(|mask| !mask[e]) {
            continue;
        }
        node_edges[edge.first].push(e);
        node_edges[edge.second].push(e);
    }
    for (n, incident) in node_edges.iter_mut().enumerate() {
        incident.sort_by(|&a, &b| {
            let ta = outgoing_angle(nodes, edges, n, a);
            let tb = outgoing_angle(nodes, edges, n, b);
            ta.partial_cmp(&tb).unwrap_or(std::cmp::Ordering::Equal)
        });
    }
    node_edges
}

/// Mask of edges that can bound a face: the 2-core of the edge graph.
///
/// Pendant chains (edges ending in a degree-1 node) can never close a
/// cycle and would derail the angular face walk, so they are peeled off
/// iteratively before tracing.
fn two_core_mask(node_count: usize, edges: &[Edge]) -> Vec<bool> {
    let mut active = vec![true; edges.len()];
    let mut incident: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    for (e, edge) in edges.iter().enumerate() {
        incident[edge.first].push(e);
        incident[edge.second].push(e);
    }
    let mut degree: Vec<usize> = incident.iter().map(Vec::len).collect();
    let mut pending: Vec<usize> = (0..node_count).filter(|&n| degree[n] == 1).collect();
    while let Some(n) = pending.pop() {
        if degree[n] != 1 {
            continue;
        }
        if let Some(&e) = incident[n].iter().find(|&&e| active[e]) {
            active[e] = false;
            degree[n] -= 1;
            if let Some(other) = edges[e].other(n) {
                degree[other] = degree[other].saturating_sub(1);
                if degree[other] == 1 {
                    pending.push(other);
                }
            }
        }
    }
    active
}

fn outgoing_angle(nodes: &[Point], edges: &[Edge], node: usize, edge: usize) -> f64 {
    let other = edges[edge].other(node).unwrap_or(node);
    let d = nodes[other].sub(nodes[node]);
    d.y.atan2(d.x)
}

/// Walk all directed half-edges and keep the bounded interior cycles.
fn build_administration(mesh: &Mesh2d) -> Administration {
    let nodes = &mesh.nodes;
    let edges = &mesh.edges;
    let core = two_core_mask(nodes.len(), edges);
    let node_edges = sorted_node_edges(nodes, edges, Some(&core));

    // visited[2e] covers the first->second direction, visited[2e+1] the other.
    let mut visited = vec![false; edges.len() * 2];
    let mut faces = Vec::new();
    let mut degenerate = 0usize;

    for start_edge in 0..edges.len() {
        if !core[start_edge] {
            continue;
        }
        for dir in 0..2 {
            if visited[start_edge * 2 + dir] {
                continue;
            }
            if let Some(cycle) = trace_cycle(nodes, edges, &node_edges, &mut visited, start_edge, dir)
            {
                let ring: Vec<Point> = cycle.nodes.iter().map(|&n| nodes[n]).collect();
                if geometry::signed_area(&ring) > EPS {
                    faces.push(cycle);
                } else {
                    degenerate += 1;
                }
            }
        }
    }
    if degenerate > 1 {
        // One discarded cycle is the outer boundary; more means slivers.
        log::debug!("administration discarded {} degenerate cycles", degenerate - 1);
    }

    let mut edge_faces = vec![[None, None]; edges.len()];
    for (f, face) in faces.iter().enumerate() {
        for &e in &face.edges {
            let slot = &mut edge_faces[e];
            if slot[0].is_none() {
                slot[0] = Some(f);
            } else if slot[1].is_none() {
                slot[1] = Some(f);
            } else {
                log::warn!("edge {e} bounded by more than two faces; extra face ignored");
            }
        }
    }

    let mut node_in_face = vec![false; nodes.len()];
    let mut face_mass_centers = Vec::with_capacity(faces.len());
    let mut face_circumcenters = Vec::with_capacity(faces.len());
    let mut face_areas = Vec::with_capacity(faces.len());
    for face in &faces {
        let ring: Vec<Point> = face.nodes.iter().map(|&n| nodes[n]).collect();
        for &n in &face.nodes {
            node_in_face[n] = true;
        }
        face_mass_centers.push(geometry::mass_center(&ring));
        face_areas.push(geometry::signed_area(&ring).abs());
        let cc = if ring.len() == 3 {
            geometry::circumcenter(ring[0], ring[1], ring[2])
                .unwrap_or_else(|_| geometry::vertex_average(&ring))
        } else {
            geometry::vertex_average(&ring)
        };
        face_circumcenters.push(cc);
    }

    Administration {
        faces,
        edge_faces,
        face_mass_centers,
        face_circumcenters,
        face_areas,
        node_in_face,
    }
}

/// Trace one face cycle starting from the given directed half-edge.
///
/// At each node the walk continues along the clockwise-most edge relative
/// to the reversed incoming direction, which traces interior faces
/// counter-clockwise. Returns `None` for cycles that revisit a node, exceed
/// [`MAX_NODES_PER_FACE`], or collapse to fewer than three nodes.
fn trace_cycle(
    nodes: &[Point],
    edges: &[Edge],
    node_edges: &[Vec<usize>],
    visited: &mut [bool],
    start_edge: usize,
    dir: usize,
) -> Option<Face> {
    let (mut from, mut to) = if dir == 0 {
        (edges[start_edge].first, edges[start_edge].second)
    } else {
        (edges[start_edge].second, edges[start_edge].first)
    };
    let first_node = from;
    let mut cycle_nodes = Vec::with_capacity(4);
    let mut cycle_edges = Vec::with_capacity(4);
    let mut edge = start_edge;
    visited[start_edge * 2 + dir] = true;

    for _ in 0..=MAX_NODES_PER_FACE {
        cycle_nodes.push(from);
        cycle_edges.push(edge);
        if to == first_node {
            if cycle_nodes.len() < 3 || has_duplicates(&cycle_nodes) {
                return None;
            }
            return Some(Face {
                nodes: cycle_nodes,
                edges: cycle_edges,
            });
        }
        // Pick the predecessor of the reversed incoming edge in the CCW
        // angular order around `to`; fall back to turning around at
        // dead ends.
        let incident = &node_edges[to];
        let back = incident.iter().position(|&e| e == edge)?;
        let next_edge = if incident.len() == 1 {
            edge
        } else {
            incident[(back + incident.len() - 1) % incident.len()]
        };
        let next_to = edges[next_edge].other(to)?;
        let next_dir = if edges[next_edge].first == to { 0 } else { 1 };
        if visited[next_edge * 2 + next_dir] {
            return None;
        }
        visited[next_edge * 2 + next_dir] = true;
        from = to;
        to = next_to;
        edge = next_edge;
    }
    None
}

fn has_duplicates(indices: &[usize]) -> bool {
    let mut seen = hashbrown::HashSet::with_capacity(indices.len());
    indices.iter().any(|&i| !seen.insert(i))
}

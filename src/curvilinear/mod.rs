//! Structured (curvilinear) grid state and block editing.
//!
//! A [`CurvilinearGrid`] is a `num_m` x `num_n` array of nodes stored
//! row-major by `m`. Nodes that generation could not place are `None`
//! internally; the sentinel coordinate appears only in the exchange
//! snapshot. For uniform grids `n` varies along x and `m` along y.

pub mod advance_front;
pub mod orthogonalize;
pub mod transfinite;

use serde::{Deserialize, Serialize};

use crate::error::MeshForgeError;
use crate::geometry::polyline::Polygon;
use crate::geometry::{Point, Projection, lerp};
use crate::mesh::{Edge, Mesh2d};
use crate::params::MakeGridParameters;

/// Sentinel coordinate for unset grid nodes in the exchange snapshot.
pub const UNSET_COORDINATE: f64 = -999.0;

/// Snapshot of the grid in flat-array exchange form.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CurvilinearData {
    pub num_m: usize,
    pub num_n: usize,
    pub node_x: Vec<f64>,
    pub node_y: Vec<f64>,
}

/// Mutable structured grid state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CurvilinearGrid {
    num_m: usize,
    num_n: usize,
    nodes: Vec<Option<Point>>,
}

impl CurvilinearGrid {
    /// Grid with no nodes; dimension queries report 0 x 0.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from explicit rows; every row must have the same length.
    pub fn from_rows(rows: Vec<Vec<Option<Point>>>) -> Result<Self, MeshForgeError> {
        let num_m = rows.len();
        let num_n = rows.first().map_or(0, Vec::len);
        if num_m < 2 || num_n < 2 {
            return Err(MeshForgeError::InvalidGeometry(
                "curvilinear grid needs at least 2 x 2 nodes".into(),
            ));
        }
        let mut nodes = Vec::with_capacity(num_m * num_n);
        for (m, row) in rows.into_iter().enumerate() {
            if row.len() != num_n {
                return Err(MeshForgeError::InvalidGeometry(format!(
                    "grid row {m} has {} nodes, expected {num_n}",
                    row.len()
                )));
            }
            nodes.extend(row);
        }
        Ok(Self { num_m, num_n, nodes })
    }

    /// `(num_m, num_n)`; `(0, 0)` for an empty or converted grid.
    #[inline]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.num_m, self.num_n)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    fn index(&self, m: usize, n: usize) -> usize {
        m * self.num_n + n
    }

    /// Node at `(m, n)`, `None` when unset or out of range.
    pub fn node(&self, m: usize, n: usize) -> Option<Point> {
        if m >= self.num_m || n >= self.num_n {
            return None;
        }
        self.nodes[self.index(m, n)]
    }

    pub(crate) fn set_node(&mut self, m: usize, n: usize, value: Option<Point>) {
        let idx = self.index(m, n);
        self.nodes[idx] = value;
    }

    /// Uniform rectangular grid; when `polygon` is given the grid covers
    /// its bounding box and nodes outside the polygon stay unset.
    pub fn make_uniform(
        params: &MakeGridParameters,
        polygon: Option<&Polygon>,
    ) -> Result<Self, MeshForgeError> {
        params.validate()?;
        let (origin, columns, rows) = match polygon {
            None => (
                Point::new(params.origin_x, params.origin_y),
                params.num_columns,
                params.num_rows,
            ),
            Some(polygon) => {
                let ring = polygon.outer();
                let min_x = ring.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
                let min_y = ring.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
                let max_x = ring.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
                let max_y = ring.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
                (
                    Point::new(min_x, min_y),
                    ((max_x - min_x) / params.block_size_x).ceil().max(1.0) as usize,
                    ((max_y - min_y) / params.block_size_y).ceil().max(1.0) as usize,
                )
            }
        };
        let (sin, cos) = params.angle.to_radians().sin_cos();
        let mut rows_out: Vec<Vec<Option<Point>>> = Vec::with_capacity(rows + 1);
        for i in 0..=rows {
            let mut row = Vec::with_capacity(columns + 1);
            for j in 0..=columns {
                let dx = j as f64 * params.block_size_x;
                let dy = i as f64 * params.block_size_y;
                let p = Point::new(
                    origin.x + dx * cos - dy * sin,
                    origin.y + dx * sin + dy * cos,
                );
                let keep = polygon.map_or(true, |poly| poly.contains(p));
                row.push(keep.then_some(p));
            }
            rows_out.push(row);
        }
        Self::from_rows(rows_out)
    }

    /// Grid indices of the valid node closest to `point`.
    pub fn closest_node(&self, point: Point, projection: Projection) -> Option<(usize, usize)> {
        let mut best: Option<((usize, usize), f64)> = None;
        for m in 0..self.num_m {
            for n in 0..self.num_n {
                let Some(p) = self.node(m, n) else { continue };
                let d = projection.squared_distance(point, p);
                if best.map_or(true, |(_, bd)| d < bd) {
                    best = Some(((m, n), d));
                }
            }
        }
        best.map(|(mn, _)| mn)
    }

    /// Subdivide the grid lines between the two picked points.
    ///
    /// The two closest grid nodes span a block; along its dominant axis
    /// every spanned interval is replaced by `refinement` intervals, the
    /// new lines interpolated linearly.
    pub fn refine(
        &mut self,
        first: Point,
        second: Point,
        refinement: usize,
        projection: Projection,
    ) -> Result<(), MeshForgeError> {
        if refinement == 0 {
            return Err(MeshForgeError::InvalidParameter {
                name: "refinement",
                reason: "must be at least 1",
            });
        }
        let (lo, hi, axis) = self.picked_span(first, second, projection)?;
        if refinement == 1 || lo == hi {
            return Ok(());
        }
        match axis {
            Axis::N => {
                let num_n = self.num_n;
                let new_n = num_n + (hi - lo) * (refinement - 1);
                let mut nodes = Vec::with_capacity(self.num_m * new_n);
                for m in 0..self.num_m {
                    for n in 0..num_n {
                        if n >= lo && n < hi {
                            let a = self.node(m, n);
                            let b = self.node(m, n + 1);
                            for k in 0..refinement {
                                if k == 0 {
                                    nodes.push(a);
                                } else {
                                    nodes.push(interpolate(a, b, k as f64 / refinement as f64));
                                }
                            }
                        } else {
                            nodes.push(self.node(m, n));
                        }
                    }
                }
                self.num_n = new_n;
                self.nodes = nodes;
            }
            Axis::M => {
                let num_m = self.num_m;
                let new_m = num_m + (hi - lo) * (refinement - 1);
                let mut rows: Vec<Vec<Option<Point>>> = Vec::with_capacity(new_m);
                for m in 0..num_m {
                    rows.push((0..self.num_n).map(|n| self.node(m, n)).collect());
                    if m >= lo && m < hi {
                        for k in 1..refinement {
                            let t = k as f64 / refinement as f64;
                            rows.push(
                                (0..self.num_n)
                                    .map(|n| interpolate(self.node(m, n), self.node(m + 1, n), t))
                                    .collect(),
                            );
                        }
                    }
                }
                self.num_m = new_m;
                self.nodes = rows.into_iter().flatten().collect();
            }
        }
        Ok(())
    }

    /// Remove the grid lines strictly between the two picked points.
    ///
    /// Over a block that matches a prior [`refine`](Self::refine) span this
    /// restores the original line count; over a partial overlap it is a
    /// best-effort monotonic removal.
    pub fn derefine(
        &mut self,
        first: Point,
        second: Point,
        projection: Projection,
    ) -> Result<(), MeshForgeError> {
        let (lo, hi, axis) = self.picked_span(first, second, projection)?;
        if hi <= lo + 1 {
            return Ok(());
        }
        match axis {
            Axis::N => {
                let keep: Vec<usize> = (0..self.num_n)
                    .filter(|&n| n <= lo || n >= hi)
                    .collect();
                let mut nodes = Vec::with_capacity(self.num_m * keep.len());
                for m in 0..self.num_m {
                    for &n in &keep {
                        nodes.push(self.node(m, n));
                    }
                }
                self.num_n = keep.len();
                self.nodes = nodes;
            }
            Axis::M => {
                let keep: Vec<usize> = (0..self.num_m)
                    .filter(|&m| m <= lo || m >= hi)
                    .collect();
                let mut nodes = Vec::with_capacity(keep.len() * self.num_n);
                for &m in &keep {
                    for n in 0..self.num_n {
                        nodes.push(self.node(m, n));
                    }
                }
                self.num_m = keep.len();
                self.nodes = nodes;
            }
        }
        Ok(())
    }

    fn picked_span(
        &self,
        first: Point,
        second: Point,
        projection: Projection,
    ) -> Result<(usize, usize, Axis), MeshForgeError> {
        if self.is_empty() {
            return Err(MeshForgeError::EmptyState("curvilinear grid"));
        }
        let (m1, n1) = self
            .closest_node(first, projection)
            .ok_or(MeshForgeError::EmptyState("curvilinear grid"))?;
        let (m2, n2) = self
            .closest_node(second, projection)
            .ok_or(MeshForgeError::EmptyState("curvilinear grid"))?;
        let dn = n1.abs_diff(n2);
        let dm = m1.abs_diff(m2);
        if dn >= dm {
            Ok((n1.min(n2), n1.max(n2), Axis::N))
        } else {
            Ok((m1.min(m2), m1.max(m2), Axis::M))
        }
    }

    /// Flatten the grid into the unstructured mesh: every complete cell
    /// becomes a quad face. Grid state is cleared afterwards, so dimension
    /// queries report 0 x 0.
    ///
    /// Existing mesh content is preserved; converted nodes append after it.
    pub fn convert_to_mesh2d(&mut self, mesh: &mut Mesh2d) -> Result<(), MeshForgeError> {
        if self.is_empty() {
            return Err(MeshForgeError::EmptyState("curvilinear grid"));
        }
        let mut nodes: Vec<Point> = mesh.nodes().to_vec();
        let mut index = vec![None; self.nodes.len()];
        for m in 0..self.num_m {
            for n in 0..self.num_n {
                if let Some(p) = self.node(m, n) {
                    index[self.index(m, n)] = Some(nodes.len());
                    nodes.push(p);
                }
            }
        }
        let mut edges: Vec<Edge> = mesh.edges().to_vec();
        for m in 0..self.num_m {
            for n in 0..self.num_n {
                let Some(a) = index[self.index(m, n)] else { continue };
                if n + 1 < self.num_n {
                    if let Some(b) = index[self.index(m, n + 1)] {
                        edges.push(Edge::new(a, b));
                    }
                }
                if m + 1 < self.num_m {
                    if let Some(b) = index[self.index(m + 1, n)] {
                        edges.push(Edge::new(a, b));
                    }
                }
            }
        }
        mesh.set(nodes, edges)?;
        *self = CurvilinearGrid::empty();
        Ok(())
    }

    /// Exchange snapshot; unset nodes carry [`UNSET_COORDINATE`].
    pub fn snapshot(&self) -> CurvilinearData {
        let mut data = CurvilinearData {
            num_m: self.num_m,
            num_n: self.num_n,
            node_x: Vec::with_capacity(self.nodes.len()),
            node_y: Vec::with_capacity(self.nodes.len()),
        };
        for node in &self.nodes {
            match node {
                Some(p) => {
                    data.node_x.push(p.x);
                    data.node_y.push(p.y);
                }
                None => {
                    data.node_x.push(UNSET_COORDINATE);
                    data.node_y.push(UNSET_COORDINATE);
                }
            }
        }
        data
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Axis {
    M,
    N,
}

fn interpolate(a: Option<Point>, b: Option<Point>, t: f64) -> Option<Point> {
    match (a, b) {
        (Some(a), Some(b)) => Some(lerp(a, b, t)),
        _ => None,
    }
}

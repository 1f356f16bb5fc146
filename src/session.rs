//! Session registry and the operation boundary exposed to callers.
//!
//! A [`SessionId`] is the sole cross-boundary identity: an opaque non-zero
//! handle mapping to one owned [`SessionState`] in a process-wide sharded
//! registry. Every operation looks its session up by handle, fails with
//! [`MeshForgeError::UnknownSession`] when absent, and returns a `Result`
//! whose [`CallStatus`](crate::error::CallStatus) projection is the
//! tri-state status code of the call; error text travels inside the error
//! value instead of a process-global last-error slot.
//!
//! Sentinel conversions live only here: separator-delimited
//! [`GeometryList`]s are unpacked at entry, and "no match" results leave as
//! the `-1` index or [`MISSING_VALUE`] the external protocol expects.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::curvilinear::orthogonalize::CurvilinearOrthogonalization;
use crate::curvilinear::{CurvilinearData, CurvilinearGrid, advance_front, transfinite};
use crate::error::MeshForgeError;
use crate::geometry::polyline::{GeometryList, Polygon, Polyline, points_in_polygon, refine_polygon_interval};
use crate::geometry::{Point, Projection};
use crate::mesh::edit::DeleteMeshOption;
use crate::mesh::orthogonalize::LandBoundaryProjection;
use crate::mesh::{Edge, Mesh2d, Mesh2dData, Mesh2dDimensions};
use crate::params::{
    CurvilinearParameters, InterpolationParameters, MakeGridParameters,
    OrthogonalizationParameters, SampleRefineParameters, SplinesToCurvilinearParameters,
};
use crate::spline::evaluate_spline;

/// Sentinel value for "no data" in exchange arrays.
pub const MISSING_VALUE: f64 = -999.0;

/// Opaque non-zero session handle.
///
/// `repr(transparent)` over `NonZeroU64`, so it crosses an FFI boundary
/// exactly like a `u64`; 0 is reserved as the invalid handle.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct SessionId(NonZeroU64);

impl SessionId {
    /// Wrap a raw non-zero handle.
    pub fn new(raw: u64) -> Result<Self, MeshForgeError> {
        NonZeroU64::new(raw)
            .map(SessionId)
            .ok_or(MeshForgeError::InvalidSessionId)
    }

    /// The raw handle value.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Debug for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SessionId").field(&self.get()).finish()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// All state owned by one session, dropped atomically on deallocation.
#[derive(Clone, Debug)]
pub struct SessionState {
    projection: Projection,
    mesh: Mesh2d,
    grid: CurvilinearGrid,
    orthogonalization: Option<CurvilinearOrthogonalization>,
}

static REGISTRY: Lazy<DashMap<SessionId, SessionState>> = Lazy::new(DashMap::new);
static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Create a session and return its handle.
///
/// `is_geographic` fixes the coordinate metric (planar vs spherical) for
/// the session's lifetime.
pub fn allocate(is_geographic: bool) -> SessionId {
    let projection = if is_geographic {
        Projection::Spherical
    } else {
        Projection::Cartesian
    };
    let raw = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
    let id = SessionId(NonZeroU64::new(raw).expect("handle counter starts at 1"));
    REGISTRY.insert(
        id,
        SessionState {
            projection,
            mesh: Mesh2d::new(projection),
            grid: CurvilinearGrid::empty(),
            orthogonalization: None,
        },
    );
    id
}

/// Destroy a session, releasing all owned state.
pub fn deallocate(id: SessionId) -> Result<(), MeshForgeError> {
    REGISTRY
        .remove(&id)
        .map(|_| ())
        .ok_or(MeshForgeError::UnknownSession(id.get()))
}

fn with_session<R>(
    id: SessionId,
    f: impl FnOnce(&mut SessionState) -> Result<R, MeshForgeError>,
) -> Result<R, MeshForgeError> {
    let mut entry = REGISTRY
        .get_mut(&id)
        .ok_or(MeshForgeError::UnknownSession(id.get()))?;
    f(entry.value_mut())
}

fn node_index(index: i32, count: usize) -> Result<usize, MeshForgeError> {
    if index < 0 || index as usize >= count {
        return Err(MeshForgeError::NodeIndexOutOfRange {
            index: index as i64,
            count,
        });
    }
    Ok(index as usize)
}

fn found(index: Option<usize>) -> i32 {
    index.map_or(-1, |i| i as i32)
}

fn polygon_from(list: &GeometryList) -> Result<Polygon, MeshForgeError> {
    Polygon::from_geometry_list(list)
}

fn optional_polygon(list: &GeometryList) -> Result<Option<Polygon>, MeshForgeError> {
    if list.is_empty() {
        Ok(None)
    } else {
        Polygon::from_geometry_list(list).map(Some)
    }
}

// ---------------------------------------------------------------------------
// Mesh2d state transfer
// ---------------------------------------------------------------------------

/// Replace the session's mesh from flat exchange arrays.
pub fn mesh2d_set(id: SessionId, data: &Mesh2dData) -> Result<(), MeshForgeError> {
    if data.node_x.len() != data.node_y.len() {
        return Err(MeshForgeError::CoordinateLengthMismatch {
            x_len: data.node_x.len(),
            y_len: data.node_y.len(),
        });
    }
    if data.edge_nodes.len() % 2 != 0 {
        return Err(MeshForgeError::InvalidGeometry(
            "edge_nodes array must hold node pairs".into(),
        ));
    }
    let nodes: Vec<Point> = data
        .node_x
        .iter()
        .zip(&data.node_y)
        .map(|(&x, &y)| Point::new(x, y))
        .collect();
    let edges: Vec<Edge> = data
        .edge_nodes
        .chunks_exact(2)
        .map(|pair| Edge::new(pair[0], pair[1]))
        .collect();
    with_session(id, |state| state.mesh.set(nodes, edges))
}

/// Element counts for sizing the receive buffers of [`mesh2d_get`].
pub fn mesh2d_dimensions(id: SessionId) -> Result<Mesh2dDimensions, MeshForgeError> {
    with_session(id, |state| Ok(state.mesh.dimensions()))
}

/// Full mesh snapshot, including derived edge centers and face centers.
pub fn mesh2d_get(id: SessionId) -> Result<Mesh2dData, MeshForgeError> {
    with_session(id, |state| Ok(state.mesh.snapshot()))
}

// ---------------------------------------------------------------------------
// Mesh2d topology edits
// ---------------------------------------------------------------------------

/// Insert a node; returns the new node index.
pub fn mesh2d_insert_node(id: SessionId, x: f64, y: f64) -> Result<i32, MeshForgeError> {
    with_session(id, |state| Ok(state.mesh.insert_node(x, y)? as i32))
}

/// Insert an edge between two nodes; returns the edge index.
pub fn mesh2d_insert_edge(
    id: SessionId,
    start_node: i32,
    end_node: i32,
) -> Result<i32, MeshForgeError> {
    with_session(id, |state| {
        let count = state.mesh.node_count();
        let start = node_index(start_node, count)?;
        let end = node_index(end_node, count)?;
        Ok(state.mesh.insert_edge(start, end)? as i32)
    })
}

/// Delete the node with the given index.
pub fn mesh2d_delete_node(id: SessionId, index: i32) -> Result<(), MeshForgeError> {
    with_session(id, |state| {
        let index = node_index(index, state.mesh.node_count())?;
        state.mesh.delete_node(index)
    })
}

/// Move a node to a new position.
pub fn mesh2d_move_node(id: SessionId, x: f64, y: f64, index: i32) -> Result<(), MeshForgeError> {
    with_session(id, |state| {
        let index = node_index(index, state.mesh.node_count())?;
        state.mesh.move_node(Point::new(x, y), index)
    })
}

/// Delete the edge closest to a point, by edge-center distance.
pub fn mesh2d_delete_edge(id: SessionId, x: f64, y: f64) -> Result<(), MeshForgeError> {
    with_session(id, |state| state.mesh.delete_edge(Point::new(x, y)))
}

/// Index of the closest edge to a point; `-1` when the mesh has no edges.
pub fn mesh2d_get_edge(id: SessionId, x: f64, y: f64) -> Result<i32, MeshForgeError> {
    with_session(id, |state| Ok(found(state.mesh.closest_edge(Point::new(x, y)))))
}

/// Index of the closest node within `search_radius`; `-1` when no node is
/// in range.
pub fn mesh2d_get_node_index(
    id: SessionId,
    x: f64,
    y: f64,
    search_radius: f64,
) -> Result<i32, MeshForgeError> {
    with_session(id, |state| {
        Ok(found(state.mesh.closest_node(Point::new(x, y), search_radius)))
    })
}

/// Merge node pairs closer than `merging_distance`, inside the polygon
/// when one is given.
pub fn mesh2d_merge_nodes(
    id: SessionId,
    polygon: &GeometryList,
    merging_distance: f64,
) -> Result<(), MeshForgeError> {
    let polygon = optional_polygon(polygon)?;
    with_session(id, |state| {
        state.mesh.merge_nodes(polygon.as_ref(), merging_distance)
    })
}

/// Merge `first_node` into `second_node`.
pub fn mesh2d_merge_two_nodes(
    id: SessionId,
    first_node: i32,
    second_node: i32,
) -> Result<(), MeshForgeError> {
    with_session(id, |state| {
        let count = state.mesh.node_count();
        let first = node_index(first_node, count)?;
        let second = node_index(second_node, count)?;
        state.mesh.merge_two_nodes(first, second)
    })
}

/// Delete mesh elements selected by a polygon.
pub fn mesh2d_delete(
    id: SessionId,
    polygon: &GeometryList,
    option: DeleteMeshOption,
    invert_deletion: bool,
) -> Result<(), MeshForgeError> {
    let polygon = polygon_from(polygon)?;
    with_session(id, |state| {
        state.mesh.delete_in_polygon(&polygon, option, invert_deletion)
    })
}

/// Number of hanging edges; callers size the fetch buffer from this.
pub fn mesh2d_count_hanging_edges(id: SessionId) -> Result<usize, MeshForgeError> {
    with_session(id, |state| Ok(state.mesh.hanging_edges().len()))
}

/// Indices of all hanging edges.
pub fn mesh2d_get_hanging_edges(id: SessionId) -> Result<Vec<usize>, MeshForgeError> {
    with_session(id, |state| Ok(state.mesh.hanging_edges()))
}

/// Delete all hanging edges; idempotent.
pub fn mesh2d_delete_hanging_edges(id: SessionId) -> Result<(), MeshForgeError> {
    with_session(id, |state| state.mesh.delete_hanging_edges())
}

/// Node indices selected by a polygon.
pub fn mesh2d_get_nodes_in_polygons(
    id: SessionId,
    polygon: &GeometryList,
    inside: bool,
) -> Result<Vec<usize>, MeshForgeError> {
    let polygon = polygon_from(polygon)?;
    with_session(id, |state| Ok(state.mesh.nodes_in_polygon(&polygon, inside)))
}

// ---------------------------------------------------------------------------
// Mesh2d generation, refinement, quality
// ---------------------------------------------------------------------------

/// Triangulate the interior of a polygon into the session mesh.
pub fn mesh2d_make_mesh_from_polygon(
    id: SessionId,
    polygon: &GeometryList,
) -> Result<(), MeshForgeError> {
    let polygon = polygon_from(polygon)?;
    with_session(id, |state| state.mesh.from_polygon(&polygon))
}

/// Delaunay-triangulate scattered sample points into the session mesh.
pub fn mesh2d_make_mesh_from_samples(
    id: SessionId,
    samples: &GeometryList,
) -> Result<(), MeshForgeError> {
    let points: Vec<Point> = samples
        .parts()
        .into_iter()
        .flat_map(|part| part.points)
        .collect();
    with_session(id, |state| state.mesh.from_samples(&points))
}

/// Refine the mesh from sample refinement levels.
pub fn mesh2d_refine_based_on_samples(
    id: SessionId,
    samples: &GeometryList,
    interpolation: &InterpolationParameters,
    refinement: &SampleRefineParameters,
) -> Result<(), MeshForgeError> {
    let mut values: Vec<(Point, f64)> = Vec::new();
    for part in samples.parts() {
        if part.values.len() != part.points.len() {
            return Err(MeshForgeError::ValuesLengthMismatch {
                values_len: part.values.len(),
                coordinate_len: part.points.len(),
            });
        }
        values.extend(part.points.iter().copied().zip(part.values.iter().copied()));
    }
    with_session(id, |state| {
        state
            .mesh
            .refine_based_on_samples(&values, interpolation, refinement)
    })
}

/// Bisect every mesh edge inside the polygon.
pub fn mesh2d_refine_based_on_polygon(
    id: SessionId,
    polygon: &GeometryList,
    interpolation: &InterpolationParameters,
) -> Result<(), MeshForgeError> {
    let polygon = polygon_from(polygon)?;
    with_session(id, |state| {
        state.mesh.refine_based_on_polygon(&polygon, interpolation)
    })
}

/// Flip edges toward the Delaunay criterion.
pub fn mesh2d_flip_edges(id: SessionId, triangulation_required: bool) -> Result<(), MeshForgeError> {
    with_session(id, |state| state.mesh.flip_edges(triangulation_required))
}

/// Per-edge orthogonality with edge centers; undefined edges carry
/// [`MISSING_VALUE`].
pub fn mesh2d_get_orthogonality(id: SessionId) -> Result<GeometryList, MeshForgeError> {
    with_session(id, |state| {
        metric_list(&state.mesh, state.mesh.orthogonality())
    })
}

/// Per-edge smoothness with edge centers; undefined edges carry
/// [`MISSING_VALUE`].
pub fn mesh2d_get_smoothness(id: SessionId) -> Result<GeometryList, MeshForgeError> {
    with_session(id, |state| metric_list(&state.mesh, state.mesh.smoothness()))
}

fn metric_list(
    mesh: &Mesh2d,
    values: Vec<Option<f64>>,
) -> Result<GeometryList, MeshForgeError> {
    let mut x = Vec::with_capacity(values.len());
    let mut y = Vec::with_capacity(values.len());
    for e in 0..values.len() {
        let center = mesh.edge_center(e)?;
        x.push(center.x);
        y.push(center.y);
    }
    GeometryList::with_values(
        x,
        y,
        values
            .into_iter()
            .map(|v| v.unwrap_or(MISSING_VALUE))
            .collect(),
    )
}

/// Orthogonalize the session mesh inside a polygon.
pub fn mesh2d_compute_orthogonalization(
    id: SessionId,
    projection_mode: LandBoundaryProjection,
    params: &OrthogonalizationParameters,
    polygon: &GeometryList,
    land_boundary: &GeometryList,
) -> Result<(), MeshForgeError> {
    let polygon = optional_polygon(polygon)?;
    let land: Vec<Point> = land_boundary
        .parts()
        .into_iter()
        .flat_map(|part| part.points)
        .collect();
    with_session(id, |state| {
        state.mesh.orthogonalize(
            projection_mode,
            params,
            polygon.as_ref(),
            if land.is_empty() { None } else { Some(&land) },
        )
    })
}

/// Total node count across all mesh boundary polygons, separators
/// included.
pub fn mesh2d_count_mesh_boundaries_as_polygons(id: SessionId) -> Result<usize, MeshForgeError> {
    Ok(mesh2d_get_mesh_boundaries_as_polygons(id)?.len())
}

/// Mesh boundary loops as separator-delimited closed polygons.
pub fn mesh2d_get_mesh_boundaries_as_polygons(
    id: SessionId,
) -> Result<GeometryList, MeshForgeError> {
    with_session(id, |state| {
        let loops = state.mesh.boundary_polygons();
        let parts: Vec<Polyline> = loops.into_iter().map(Polyline::from_points).collect();
        Ok(GeometryList::from_parts(&parts))
    })
}

/// Number of obtuse triangles in the session mesh.
pub fn mesh2d_count_obtuse_triangles(id: SessionId) -> Result<usize, MeshForgeError> {
    with_session(id, |state| Ok(state.mesh.obtuse_triangle_mass_centers().len()))
}

/// Mass centers of obtuse triangles.
pub fn mesh2d_get_obtuse_triangles_mass_centers(
    id: SessionId,
) -> Result<GeometryList, MeshForgeError> {
    with_session(id, |state| {
        let centers = state.mesh.obtuse_triangle_mass_centers();
        GeometryList::new(
            centers.iter().map(|p| p.x).collect(),
            centers.iter().map(|p| p.y).collect(),
        )
    })
}

/// Number of flow edges shorter than the threshold.
pub fn mesh2d_count_small_flow_edge_centers(
    id: SessionId,
    threshold: f64,
) -> Result<usize, MeshForgeError> {
    with_session(id, |state| Ok(state.mesh.small_flow_edge_centers(threshold)?.len()))
}

/// Centers of flow edges shorter than the threshold.
pub fn mesh2d_get_small_flow_edge_centers(
    id: SessionId,
    threshold: f64,
) -> Result<GeometryList, MeshForgeError> {
    with_session(id, |state| {
        let centers = state.mesh.small_flow_edge_centers(threshold)?;
        GeometryList::new(
            centers.iter().map(|p| p.x).collect(),
            centers.iter().map(|p| p.y).collect(),
        )
    })
}

/// Delete small flow edges and small triangles together.
pub fn mesh2d_delete_small_flow_edges_and_small_triangles(
    id: SessionId,
    threshold: f64,
    min_fractional_area: f64,
) -> Result<(), MeshForgeError> {
    with_session(id, |state| {
        state
            .mesh
            .delete_small_flow_edges_and_small_triangles(threshold, min_fractional_area)
    })
}

// ---------------------------------------------------------------------------
// Stateless geometry helpers
// ---------------------------------------------------------------------------

/// Spline points through the corner points of every part.
///
/// Output length per part follows the `(N-1)*k + N` law of the spline
/// engine; parts are separated in the output as in the input.
pub fn get_splines(
    geometry: &GeometryList,
    points_per_segment: usize,
) -> Result<GeometryList, MeshForgeError> {
    let parts: Vec<Polyline> = geometry
        .parts()
        .into_iter()
        .map(|part| Polyline::from_points(evaluate_spline(&part.points, points_per_segment)))
        .filter(|part| !part.points.is_empty())
        .collect();
    Ok(GeometryList::from_parts(&parts))
}

/// Resample a polygon perimeter interval to a target edge length.
pub fn polygon_refine(
    id: SessionId,
    polygon: &GeometryList,
    first_node: i32,
    second_node: i32,
    target_edge_length: f64,
) -> Result<GeometryList, MeshForgeError> {
    let polygon = polygon_from(polygon)?;
    with_session(id, |state| {
        let refined = refine_polygon_interval(
            &polygon,
            node_index(first_node, polygon.outer().len())?,
            node_index(second_node, polygon.outer().len())?,
            target_edge_length,
            state.projection,
        )?;
        Ok(GeometryList::from_parts(&[refined]))
    })
}

/// Mark which points of `selected` lie inside `selecting` (1.0/0.0 mask in
/// `values`).
pub fn get_points_in_polygon(
    selecting: &GeometryList,
    selected: &GeometryList,
) -> Result<GeometryList, MeshForgeError> {
    let polygon = polygon_from(selecting)?;
    points_in_polygon(&polygon, selected)
}

// ---------------------------------------------------------------------------
// Curvilinear operations
// ---------------------------------------------------------------------------

/// Generate the session grid by transfinite interpolation of boundary
/// splines.
pub fn curvilinear_compute_transfinite_from_splines(
    id: SessionId,
    splines: &GeometryList,
    params: &CurvilinearParameters,
) -> Result<(), MeshForgeError> {
    let parts = splines.parts();
    with_session(id, |state| {
        state.grid = transfinite::from_splines(&parts, params, state.projection)?;
        Ok(())
    })
}

/// Grow the session grid orthogonally from the first spline.
pub fn curvilinear_compute_orthogonal_from_splines(
    id: SessionId,
    splines: &GeometryList,
    params: &CurvilinearParameters,
    growth: &SplinesToCurvilinearParameters,
) -> Result<(), MeshForgeError> {
    let parts = splines.parts();
    with_session(id, |state| {
        state.grid =
            advance_front::from_splines_orthogonal(&parts, params, growth, state.projection)?;
        Ok(())
    })
}

/// Generate the session grid from a polygon perimeter and three corners.
pub fn curvilinear_compute_transfinite_from_polygon(
    id: SessionId,
    polygon: &GeometryList,
    first_node: i32,
    second_node: i32,
    third_node: i32,
    use_fourth_side: bool,
) -> Result<(), MeshForgeError> {
    let polygon = polygon_from(polygon)?;
    let len = polygon.outer().len();
    with_session(id, |state| {
        state.grid = transfinite::from_polygon(
            &polygon,
            node_index(first_node, len)?,
            node_index(second_node, len)?,
            node_index(third_node, len)?,
            use_fourth_side,
            state.projection,
        )?;
        Ok(())
    })
}

/// Generate the session grid from a triangular perimeter.
pub fn curvilinear_compute_transfinite_from_triangle(
    id: SessionId,
    polygon: &GeometryList,
    first_node: i32,
    second_node: i32,
    third_node: i32,
) -> Result<(), MeshForgeError> {
    let polygon = polygon_from(polygon)?;
    let len = polygon.outer().len();
    with_session(id, |state| {
        state.grid = transfinite::from_triangle(
            &polygon,
            node_index(first_node, len)?,
            node_index(second_node, len)?,
            node_index(third_node, len)?,
            state.projection,
        )?;
        Ok(())
    })
}

/// Generate a uniform session grid, optionally masked by a polygon.
pub fn curvilinear_make_uniform(
    id: SessionId,
    params: &MakeGridParameters,
    polygon: &GeometryList,
) -> Result<(), MeshForgeError> {
    let polygon = optional_polygon(polygon)?;
    with_session(id, |state| {
        state.grid = CurvilinearGrid::make_uniform(params, polygon.as_ref())?;
        Ok(())
    })
}

/// `(num_m, num_n)` of the session grid; `(0, 0)` when absent.
pub fn curvilinear_get_dimensions(id: SessionId) -> Result<(usize, usize), MeshForgeError> {
    with_session(id, |state| Ok(state.grid.dimensions()))
}

/// Snapshot of the session grid.
pub fn curvilinear_get(id: SessionId) -> Result<CurvilinearData, MeshForgeError> {
    with_session(id, |state| Ok(state.grid.snapshot()))
}

/// Subdivide grid lines between two picked points.
pub fn curvilinear_refine(
    id: SessionId,
    first_x: f64,
    first_y: f64,
    second_x: f64,
    second_y: f64,
    refinement: usize,
) -> Result<(), MeshForgeError> {
    with_session(id, |state| {
        state.grid.refine(
            Point::new(first_x, first_y),
            Point::new(second_x, second_y),
            refinement,
            state.projection,
        )
    })
}

/// Remove grid lines between two picked points.
pub fn curvilinear_derefine(
    id: SessionId,
    first_x: f64,
    first_y: f64,
    second_x: f64,
    second_y: f64,
) -> Result<(), MeshForgeError> {
    with_session(id, |state| {
        state.grid.derefine(
            Point::new(first_x, first_y),
            Point::new(second_x, second_y),
            state.projection,
        )
    })
}

/// Establish the orthogonalization schedule for the session grid.
pub fn curvilinear_initialize_orthogonalize(
    id: SessionId,
    params: &OrthogonalizationParameters,
) -> Result<(), MeshForgeError> {
    with_session(id, |state| {
        state.orthogonalization = Some(CurvilinearOrthogonalization::initialize(*params)?);
        Ok(())
    })
}

/// Restrict the pending orthogonalization to a block.
pub fn curvilinear_set_block_orthogonalize(
    id: SessionId,
    first_x: f64,
    first_y: f64,
    second_x: f64,
    second_y: f64,
) -> Result<(), MeshForgeError> {
    with_session(id, |state| {
        state
            .orthogonalization
            .as_mut()
            .ok_or(MeshForgeError::EmptyState("orthogonalization state"))?
            .set_block(Point::new(first_x, first_y), Point::new(second_x, second_y));
        Ok(())
    })
}

/// Run the pending orthogonalization on the session grid.
pub fn curvilinear_orthogonalize(id: SessionId) -> Result<(), MeshForgeError> {
    with_session(id, |state| {
        let ortho = state
            .orthogonalization
            .as_ref()
            .ok_or(MeshForgeError::EmptyState("orthogonalization state"))?
            .clone();
        ortho.orthogonalize(&mut state.grid, state.projection)
    })
}

/// Drop the pending orthogonalization sub-state.
pub fn curvilinear_finalize_orthogonalize(id: SessionId) -> Result<(), MeshForgeError> {
    with_session(id, |state| {
        state.orthogonalization = None;
        Ok(())
    })
}

/// Convert the session grid into the session mesh and clear the grid.
pub fn curvilinear_convert_to_mesh2d(id: SessionId) -> Result<(), MeshForgeError> {
    with_session(id, |state| {
        let mut grid = std::mem::take(&mut state.grid);
        let result = grid.convert_to_mesh2d(&mut state.mesh);
        state.grid = grid;
        result
    })
}

#[cfg(test)]
mod layout_tests {
    //! `SessionId` must stay layout-compatible with `u64` for the FFI
    //! boundary.
    use super::*;
    use static_assertions::{assert_eq_align, assert_eq_size};

    assert_eq_size!(SessionId, u64);

    #[test]
    fn alignment_matches_u64() {
        assert_eq_align!(SessionId, u64);
    }

    #[test]
    fn zero_handle_rejected() {
        assert!(matches!(
            SessionId::new(0),
            Err(MeshForgeError::InvalidSessionId)
        ));
        assert_eq!(SessionId::new(7).unwrap().get(), 7);
    }

    #[test]
    fn debug_and_display() {
        let id = SessionId::new(7).unwrap();
        assert_eq!(format!("{id:?}"), "SessionId(7)");
        assert_eq!(format!("{id}"), "7");
    }
}

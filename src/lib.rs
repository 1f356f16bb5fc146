//! # mesh-forge
//!
//! mesh-forge is a stateful engine for constructing, editing and refining
//! the computational meshes used by hydrodynamic and other numerical
//! models. Sessions own mutable mesh state behind opaque handles; every
//! operation is a self-contained transaction that either updates the state
//! or leaves it untouched.
//!
//! ## Features
//! - Unstructured [`mesh::Mesh2d`] state with derived face administration,
//!   atomic topology edits, polygon-based deletion, hanging-edge cleanup,
//!   Delaunay generation, refinement and iterative orthogonalization
//! - Structured [`curvilinear::CurvilinearGrid`] state with transfinite and
//!   front-advancing generation, block refinement/derefinement, block
//!   orthogonalization and conversion to the unstructured mesh
//! - A spline engine and separator-delimited geometry exchange lists
//! - A process-wide [`session`] registry mapping opaque handles to owned
//!   state, with a per-call tri-state status channel
//!
//! ## Determinism
//!
//! All algorithms are iteration-count driven rather than residual driven:
//! two runs with the same parameters perform exactly the same work.
//!
//! ## Usage
//!
//! ```rust
//! use mesh_forge::prelude::*;
//!
//! let id = mesh_forge::session::allocate(false);
//! let grid = MakeGridParameters { num_columns: 3, num_rows: 3, ..Default::default() };
//! mesh_forge::session::curvilinear_make_uniform(id, &grid, &GeometryList::default())?;
//! assert_eq!(mesh_forge::session::curvilinear_get_dimensions(id)?, (4, 4));
//! mesh_forge::session::curvilinear_convert_to_mesh2d(id)?;
//! assert_eq!(mesh_forge::session::mesh2d_dimensions(id)?.face_count, 9);
//! mesh_forge::session::deallocate(id)?;
//! # Ok::<(), mesh_forge::error::MeshForgeError>(())
//! ```

pub mod curvilinear;
pub mod error;
pub mod geometry;
pub mod mesh;
pub mod params;
pub mod session;
pub mod spline;

/// A convenient prelude to import the most-used types.
pub mod prelude {
    pub use crate::curvilinear::orthogonalize::CurvilinearOrthogonalization;
    pub use crate::curvilinear::{CurvilinearData, CurvilinearGrid, UNSET_COORDINATE};
    pub use crate::error::{CallStatus, MeshForgeError};
    pub use crate::geometry::polyline::{
        GeometryList, Polygon, Polyline, INNER_OUTER_SEPARATOR, SEPARATOR,
    };
    pub use crate::geometry::{Point, Projection};
    pub use crate::mesh::edit::DeleteMeshOption;
    pub use crate::mesh::orthogonalize::LandBoundaryProjection;
    pub use crate::mesh::{Edge, Mesh2d, Mesh2dData, Mesh2dDimensions};
    pub use crate::params::{
        AveragingMethod, CurvilinearParameters, InterpolationParameters, MakeGridParameters,
        OrthogonalizationParameters, SampleRefineParameters, SplinesToCurvilinearParameters,
    };
    pub use crate::session::{MISSING_VALUE, SessionId};
    pub use crate::spline::{evaluate_spline, spline_point_count};
}

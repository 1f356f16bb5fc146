//! Parameter bundles for the mesh and curvilinear algorithms.
//!
//! Plain value structs: named numeric/boolean fields, no behavior beyond
//! range validation. Defaults mirror the values the algorithms were tuned
//! with in production use.

use serde::{Deserialize, Serialize};

use crate::error::MeshForgeError;

/// Iteration counts and blend weights for orthogonalization.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrthogonalizationParameters {
    /// Number of outer passes; geometry administration is recomputed once
    /// per outer pass.
    pub outer_iterations: usize,
    /// Boundary-node sweeps per outer pass.
    pub boundary_iterations: usize,
    /// Interior-node sweeps per outer pass.
    pub inner_iterations: usize,
    /// Blend between the orthogonality target (1.0) and the smoothing
    /// target (0.0).
    pub orthogonalization_to_smoothing_factor: f64,
    /// Blend between areal and angle-based smoothing contributions.
    pub areal_to_angle_smoothing_factor: f64,
}

impl Default for OrthogonalizationParameters {
    fn default() -> Self {
        Self {
            outer_iterations: 2,
            boundary_iterations: 25,
            inner_iterations: 25,
            orthogonalization_to_smoothing_factor: 0.975,
            areal_to_angle_smoothing_factor: 1.0,
        }
    }
}

impl OrthogonalizationParameters {
    pub fn validate(&self) -> Result<(), MeshForgeError> {
        if !(0.0..=1.0).contains(&self.orthogonalization_to_smoothing_factor) {
            return Err(MeshForgeError::InvalidParameter {
                name: "orthogonalization_to_smoothing_factor",
                reason: "must lie in [0, 1]",
            });
        }
        if !(0.0..=1.0).contains(&self.areal_to_angle_smoothing_factor) {
            return Err(MeshForgeError::InvalidParameter {
                name: "areal_to_angle_smoothing_factor",
                reason: "must lie in [0, 1]",
            });
        }
        Ok(())
    }
}

/// How sample values are combined when interpolating onto a face.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AveragingMethod {
    /// Arithmetic mean of the samples in the search area.
    #[default]
    SimpleAveraging,
    /// Value of the single closest sample.
    ClosestPoint,
    /// Maximum sample value in the search area.
    Max,
    /// Minimum sample value in the search area.
    Min,
}

/// Controls for sample-to-mesh interpolation during refinement.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterpolationParameters {
    /// Upper bound on successive refinement passes.
    pub max_refinement_iterations: usize,
    pub averaging_method: AveragingMethod,
    /// Minimum number of samples required for an averaged value.
    pub minimum_points: usize,
    /// Search radius as a multiple of the local face size.
    pub relative_search_radius: f64,
}

impl Default for InterpolationParameters {
    fn default() -> Self {
        Self {
            max_refinement_iterations: 3,
            averaging_method: AveragingMethod::SimpleAveraging,
            minimum_points: 1,
            relative_search_radius: 1.01,
        }
    }
}

impl InterpolationParameters {
    pub fn validate(&self) -> Result<(), MeshForgeError> {
        if self.max_refinement_iterations == 0 {
            return Err(MeshForgeError::InvalidParameter {
                name: "max_refinement_iterations",
                reason: "must be at least 1",
            });
        }
        if self.relative_search_radius <= 0.0 {
            return Err(MeshForgeError::InvalidParameter {
                name: "relative_search_radius",
                reason: "must be positive",
            });
        }
        Ok(())
    }
}

/// Controls specific to sample-driven refinement.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SampleRefineParameters {
    /// Faces with edges shorter than this are never split further.
    pub minimum_cell_size: f64,
    /// Reconnect hanging nodes created by partial splits.
    pub connect_hanging_nodes: bool,
    /// Consider samples outside the mesh when interpolating.
    pub account_for_samples_outside: bool,
}

impl Default for SampleRefineParameters {
    fn default() -> Self {
        Self {
            minimum_cell_size: 0.5,
            connect_hanging_nodes: true,
            account_for_samples_outside: false,
        }
    }
}

impl SampleRefineParameters {
    pub fn validate(&self) -> Result<(), MeshForgeError> {
        if self.minimum_cell_size <= 0.0 {
            return Err(MeshForgeError::InvalidParameter {
                name: "minimum_cell_size",
                reason: "must be positive",
            });
        }
        Ok(())
    }
}

/// Resolution and smoothing controls for curvilinear grid generation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurvilinearParameters {
    /// Number of intervals along the m axis.
    pub m_refinement: usize,
    /// Number of intervals along the n axis.
    pub n_refinement: usize,
    /// Interior smoothing sweeps applied after transfinite blending.
    pub smoothing_iterations: usize,
    /// Under-relaxation of each smoothing sweep.
    pub smoothing_parameter: f64,
    pub attraction_parameter: f64,
}

impl Default for CurvilinearParameters {
    fn default() -> Self {
        Self {
            m_refinement: 20,
            n_refinement: 40,
            smoothing_iterations: 10,
            smoothing_parameter: 0.5,
            attraction_parameter: 0.0,
        }
    }
}

impl CurvilinearParameters {
    pub fn validate(&self) -> Result<(), MeshForgeError> {
        if self.m_refinement == 0 || self.n_refinement == 0 {
            return Err(MeshForgeError::InvalidParameter {
                name: "m_refinement/n_refinement",
                reason: "must be at least 1",
            });
        }
        if !(0.0..=1.0).contains(&self.smoothing_parameter) {
            return Err(MeshForgeError::InvalidParameter {
                name: "smoothing_parameter",
                reason: "must lie in [0, 1]",
            });
        }
        Ok(())
    }
}

/// Controls for front-advancing orthogonal grid growth from a spline.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SplinesToCurvilinearParameters {
    /// Height of the first layer relative to the local along-spline spacing.
    pub aspect_ratio: f64,
    /// Multiplicative growth of layer height per advancing layer.
    pub aspect_ratio_grow_factor: f64,
    /// Total width of the grown grid, measured across the center spline.
    pub average_width: f64,
    /// Densify the along-spline discretization where curvature is high.
    pub curvature_adapted_grid_spacing: bool,
    /// Grow layers on both sides of the center spline.
    pub grow_grid_outside: bool,
    /// Nodes closer than this are considered coincident by the front.
    pub nodes_on_top_of_each_other_tolerance: f64,
    /// Abort advancing where front segments cross at angles sharper than
    /// this cosine.
    pub min_cosine_crossing_angles: f64,
    /// Stop local advance when the front would collide with itself.
    pub check_front_collisions: bool,
    /// Drop near-degenerate cells at the front after growth.
    pub remove_skinny_triangles: bool,
}

impl Default for SplinesToCurvilinearParameters {
    fn default() -> Self {
        Self {
            aspect_ratio: 0.1,
            aspect_ratio_grow_factor: 1.1,
            average_width: 500.0,
            curvature_adapted_grid_spacing: true,
            grow_grid_outside: true,
            nodes_on_top_of_each_other_tolerance: 1e-4,
            min_cosine_crossing_angles: 0.95,
            check_front_collisions: false,
            remove_skinny_triangles: false,
        }
    }
}

impl SplinesToCurvilinearParameters {
    pub fn validate(&self) -> Result<(), MeshForgeError> {
        if self.aspect_ratio <= 0.0 {
            return Err(MeshForgeError::InvalidParameter {
                name: "aspect_ratio",
                reason: "must be positive",
            });
        }
        if self.aspect_ratio_grow_factor < 1.0 {
            return Err(MeshForgeError::InvalidParameter {
                name: "aspect_ratio_grow_factor",
                reason: "must be at least 1",
            });
        }
        if self.average_width <= 0.0 {
            return Err(MeshForgeError::InvalidParameter {
                name: "average_width",
                reason: "must be positive",
            });
        }
        Ok(())
    }
}

/// Layout of a uniform rectangular grid.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MakeGridParameters {
    pub num_columns: usize,
    pub num_rows: usize,
    /// Rotation of the grid around its origin, degrees counter-clockwise.
    pub angle: f64,
    pub origin_x: f64,
    pub origin_y: f64,
    pub block_size_x: f64,
    pub block_size_y: f64,
}

impl Default for MakeGridParameters {
    fn default() -> Self {
        Self {
            num_columns: 3,
            num_rows: 3,
            angle: 0.0,
            origin_x: 0.0,
            origin_y: 0.0,
            block_size_x: 10.0,
            block_size_y: 10.0,
        }
    }
}

impl MakeGridParameters {
    pub fn validate(&self) -> Result<(), MeshForgeError> {
        if self.num_columns == 0 || self.num_rows == 0 {
            return Err(MeshForgeError::InvalidParameter {
                name: "num_columns/num_rows",
                reason: "must be at least 1",
            });
        }
        if self.block_size_x <= 0.0 || self.block_size_y <= 0.0 {
            return Err(MeshForgeError::InvalidParameter {
                name: "block_size",
                reason: "must be positive",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        OrthogonalizationParameters::default().validate().unwrap();
        InterpolationParameters::default().validate().unwrap();
        SampleRefineParameters::default().validate().unwrap();
        CurvilinearParameters::default().validate().unwrap();
        SplinesToCurvilinearParameters::default().validate().unwrap();
        MakeGridParameters::default().validate().unwrap();
    }

    #[test]
    fn out_of_range_blend_rejected() {
        let params = OrthogonalizationParameters {
            orthogonalization_to_smoothing_factor: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(MeshForgeError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn serde_round_trip() {
        let params = MakeGridParameters {
            num_columns: 10,
            num_rows: 10,
            ..Default::default()
        };
        let json = serde_json::to_string(&params).unwrap();
        let back: MakeGridParameters = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }
}

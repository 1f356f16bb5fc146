//! Multi-call block orthogonalization of a curvilinear grid.
//!
//! The protocol mirrors the session boundary: `initialize` fixes the
//! iteration schedule, `set_block` restricts the solve to a rectangular
//! sub-region picked by coordinates, and `orthogonalize` runs the sweeps.
//! Without a block the whole grid is relaxed. Nodes outside the block are
//! never touched.

use crate::error::MeshForgeError;
use crate::geometry::{Point, Projection, lerp};
use crate::params::OrthogonalizationParameters;

use super::CurvilinearGrid;

/// In-progress orthogonalization state held by a session between calls.
#[derive(Clone, Debug)]
pub struct CurvilinearOrthogonalization {
    params: OrthogonalizationParameters,
    block: Option<(Point, Point)>,
}

impl CurvilinearOrthogonalization {
    /// Establish the iteration schedule for subsequent calls.
    pub fn initialize(params: OrthogonalizationParameters) -> Result<Self, MeshForgeError> {
        params.validate()?;
        Ok(Self {
            params,
            block: None,
        })
    }

    /// Restrict the solve to the rectangle picked by two corner points.
    pub fn set_block(&mut self, first: Point, second: Point) {
        self.block = Some((first, second));
    }

    /// Run the configured sweeps on `grid`.
    pub fn orthogonalize(
        &self,
        grid: &mut CurvilinearGrid,
        projection: Projection,
    ) -> Result<(), MeshForgeError> {
        if grid.is_empty() {
            return Err(MeshForgeError::EmptyState("curvilinear grid"));
        }
        let (num_m, num_n) = grid.dimensions();
        let (m_range, n_range) = match self.block {
            None => ((0, num_m - 1), (0, num_n - 1)),
            Some((first, second)) => {
                let (m1, n1) = grid
                    .closest_node(first, projection)
                    .ok_or(MeshForgeError::EmptyState("curvilinear grid"))?;
                let (m2, n2) = grid
                    .closest_node(second, projection)
                    .ok_or(MeshForgeError::EmptyState("curvilinear grid"))?;
                ((m1.min(m2), m1.max(m2)), (n1.min(n2), n1.max(n2)))
            }
        };

        // Gentle under-relaxation: the orthogonalization weight leaves
        // most of each step to the smoothing target.
        let weight = 1.0 - self.params.orthogonalization_to_smoothing_factor;
        for _ in 0..self.params.outer_iterations {
            for _ in 0..self.params.boundary_iterations {
                self.sweep_boundary(grid, num_m, num_n, m_range, n_range, weight);
            }
            for _ in 0..self.params.inner_iterations {
                self.sweep_interior(grid, num_m, num_n, m_range, n_range, weight);
            }
        }
        Ok(())
    }

    /// Relax grid-boundary nodes inside the block along their boundary
    /// line; corners stay pinned.
    #[allow(clippy::too_many_arguments)]
    fn sweep_boundary(
        &self,
        grid: &mut CurvilinearGrid,
        num_m: usize,
        num_n: usize,
        (m_lo, m_hi): (usize, usize),
        (n_lo, n_hi): (usize, usize),
        weight: f64,
    ) {
        for m in m_lo..=m_hi {
            for n in n_lo..=n_hi {
                let on_m_edge = m == 0 || m == num_m - 1;
                let on_n_edge = n == 0 || n == num_n - 1;
                if on_m_edge == on_n_edge {
                    // Interior node or pinned corner.
                    continue;
                }
                let (a, b) = if on_m_edge {
                    (grid.node(m, n.wrapping_sub(1)), grid.node(m, n + 1))
                } else {
                    (grid.node(m.wrapping_sub(1), n), grid.node(m + 1, n))
                };
                let (Some(center), Some(a), Some(b)) = (grid.node(m, n), a, b) else {
                    continue;
                };
                let target = a.add(b).scale(0.5);
                grid.set_node(m, n, Some(lerp(center, target, weight)));
            }
        }
    }

    /// Relax interior nodes inside the block toward their four-neighbor
    /// average.
    #[allow(clippy::too_many_arguments)]
    fn sweep_interior(
        &self,
        grid: &mut CurvilinearGrid,
        num_m: usize,
        num_n: usize,
        (m_lo, m_hi): (usize, usize),
        (n_lo, n_hi): (usize, usize),
        weight: f64,
    ) {
        for m in m_lo.max(1)..=m_hi.min(num_m.saturating_sub(2)) {
            for n in n_lo.max(1)..=n_hi.min(num_n.saturating_sub(2)) {
                let (Some(center), Some(a), Some(b), Some(c), Some(d)) = (
                    grid.node(m, n),
                    grid.node(m - 1, n),
                    grid.node(m + 1, n),
                    grid.node(m, n - 1),
                    grid.node(m, n + 1),
                ) else {
                    continue;
                };
                let target = a.add(b).add(c).add(d).scale(0.25);
                grid.set_node(m, n, Some(lerp(center, target, weight)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::MakeGridParameters;

    fn distorted_grid() -> CurvilinearGrid {
        let mut grid = CurvilinearGrid::make_uniform(
            &MakeGridParameters {
                num_columns: 4,
                num_rows: 4,
                block_size_x: 1.0,
                block_size_y: 1.0,
                ..Default::default()
            },
            None,
        )
        .unwrap();
        // Push one interior node off the lattice.
        grid.set_node(2, 2, Some(Point::new(2.4, 2.4)));
        grid
    }

    fn params() -> OrthogonalizationParameters {
        OrthogonalizationParameters {
            outer_iterations: 1,
            boundary_iterations: 25,
            inner_iterations: 25,
            orthogonalization_to_smoothing_factor: 0.975,
            ..Default::default()
        }
    }

    #[test]
    fn whole_grid_relaxation_pulls_node_back() {
        let mut grid = distorted_grid();
        let ortho = CurvilinearOrthogonalization::initialize(params()).unwrap();
        ortho
            .orthogonalize(&mut grid, Projection::Cartesian)
            .unwrap();
        let p = grid.node(2, 2).unwrap();
        assert!(p.x < 2.4 && p.x >= 2.0);
        assert!(p.y < 2.4 && p.y >= 2.0);
    }

    #[test]
    fn block_restriction_freezes_outside_nodes() {
        let mut grid = distorted_grid();
        // Also distort a node that the block excludes.
        grid.set_node(1, 1, Some(Point::new(1.3, 1.3)));
        let outside_before = grid.node(1, 1).unwrap();

        let mut ortho = CurvilinearOrthogonalization::initialize(params()).unwrap();
        ortho.set_block(Point::new(2.0, 2.0), Point::new(4.0, 4.0));
        ortho
            .orthogonalize(&mut grid, Projection::Cartesian)
            .unwrap();

        // The blocked-out distortion did not move.
        assert_eq!(grid.node(1, 1).unwrap(), outside_before);
        // The distortion inside the block relaxed.
        let inside = grid.node(2, 2).unwrap();
        assert!(inside.x < 2.4);
    }

    #[test]
    fn corners_stay_pinned() {
        let mut grid = distorted_grid();
        let ortho = CurvilinearOrthogonalization::initialize(params()).unwrap();
        ortho
            .orthogonalize(&mut grid, Projection::Cartesian)
            .unwrap();
        assert_eq!(grid.node(0, 0), Some(Point::new(0.0, 0.0)));
        assert_eq!(grid.node(4, 4), Some(Point::new(4.0, 4.0)));
    }
}

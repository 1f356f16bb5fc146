//! Mesh generation and refinement through the session boundary.

use mesh_forge::error::MeshForgeError;
use mesh_forge::prelude::*;
use mesh_forge::session;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

#[test]
fn triangulation_from_scattered_samples() {
    let mut rng = SmallRng::seed_from_u64(7);
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for _ in 0..40 {
        xs.push(rng.gen_range(0.0..100.0));
        ys.push(rng.gen_range(0.0..100.0));
    }
    let samples = GeometryList::new(xs, ys).unwrap();

    let id = session::allocate(false);
    session::mesh2d_make_mesh_from_samples(id, &samples).unwrap();

    let dims = session::mesh2d_dimensions(id).unwrap();
    assert_eq!(dims.node_count, 40);
    assert!(dims.face_count > 0);

    // All derived faces are triangles with positive area.
    let data = session::mesh2d_get(id).unwrap();
    for &count in &data.nodes_per_face {
        assert_eq!(count, 3);
    }

    session::deallocate(id).unwrap();
}

#[test]
fn triangulation_from_polygon_stays_inside() {
    // 30x30 square sampled every 5 units along the perimeter.
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for k in 0..6 {
        xs.push(k as f64 * 5.0);
        ys.push(0.0);
    }
    for k in 0..6 {
        xs.push(30.0);
        ys.push(k as f64 * 5.0);
    }
    for k in 0..6 {
        xs.push(30.0 - k as f64 * 5.0);
        ys.push(30.0);
    }
    for k in 0..6 {
        xs.push(0.0);
        ys.push(30.0 - k as f64 * 5.0);
    }
    let perimeter_count = xs.len();
    let polygon = GeometryList::new(xs, ys).unwrap();

    let id = session::allocate(false);
    session::mesh2d_make_mesh_from_polygon(id, &polygon).unwrap();

    let dims = session::mesh2d_dimensions(id).unwrap();
    // Interior was seeded beyond the perimeter points.
    assert!(dims.node_count > perimeter_count);
    assert!(dims.face_count > 2);

    let data = session::mesh2d_get(id).unwrap();
    for (&x, &y) in data.face_x.iter().zip(&data.face_y) {
        assert!((0.0..=30.0).contains(&x));
        assert!((0.0..=30.0).contains(&y));
    }

    session::deallocate(id).unwrap();
}

#[test]
fn degenerate_sample_set_reports_invalid_geometry() {
    let samples = GeometryList::new(vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 2.0]).unwrap();
    let id = session::allocate(false);
    let result = session::mesh2d_make_mesh_from_samples(id, &samples);
    assert!(matches!(result, Err(MeshForgeError::InvalidGeometry(_))));
    assert_eq!(CallStatus::of(&result), CallStatus::InvalidGeometry);
    // Failed generation left the session mesh untouched.
    assert_eq!(session::mesh2d_dimensions(id).unwrap().node_count, 0);
    session::deallocate(id).unwrap();
}

#[test]
fn polygon_refinement_quadruples_faces() {
    let id = session::allocate(false);
    session::mesh2d_set(
        id,
        &Mesh2dData {
            node_x: vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0, 0.0, 1.0, 2.0],
            node_y: vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0],
            edge_nodes: vec![
                0, 1, 1, 2, 3, 4, 4, 5, 6, 7, 7, 8, 0, 3, 1, 4, 2, 5, 3, 6, 4, 7, 5, 8,
            ],
            ..Default::default()
        },
    )
    .unwrap();

    let covering = GeometryList::new(
        vec![-0.5, 2.5, 2.5, -0.5, -0.5],
        vec![-0.5, -0.5, 2.5, 2.5, -0.5],
    )
    .unwrap();
    session::mesh2d_refine_based_on_polygon(id, &covering, &InterpolationParameters::default())
        .unwrap();

    assert_eq!(session::mesh2d_dimensions(id).unwrap().face_count, 16);
    session::deallocate(id).unwrap();
}

#[test]
fn sample_refinement_level_one_splits_each_quad_once() {
    let id = session::allocate(false);
    session::mesh2d_set(
        id,
        &Mesh2dData {
            node_x: vec![0.0, 10.0, 0.0, 10.0],
            node_y: vec![0.0, 0.0, 10.0, 10.0],
            edge_nodes: vec![0, 1, 1, 3, 3, 2, 2, 0],
            ..Default::default()
        },
    )
    .unwrap();

    let samples = GeometryList::with_values(vec![5.0], vec![5.0], vec![1.0]).unwrap();
    let interpolation = InterpolationParameters {
        averaging_method: AveragingMethod::ClosestPoint,
        max_refinement_iterations: 4,
        ..Default::default()
    };
    let refinement = SampleRefineParameters {
        minimum_cell_size: 0.5,
        ..Default::default()
    };
    session::mesh2d_refine_based_on_samples(id, &samples, &interpolation, &refinement).unwrap();

    let dims = session::mesh2d_dimensions(id).unwrap();
    assert_eq!(dims.face_count, 4);
    // 4 corners + 4 edge midpoints + 1 center.
    assert_eq!(dims.node_count, 9);

    session::deallocate(id).unwrap();
}

#[test]
fn flip_edges_restores_delaunay_diagonal() {
    let id = session::allocate(false);
    session::mesh2d_set(
        id,
        &Mesh2dData {
            node_x: vec![0.0, 10.0, 9.0, 2.0],
            node_y: vec![0.0, 0.0, 2.0, 3.0],
            edge_nodes: vec![0, 1, 1, 2, 2, 3, 3, 0, 1, 3],
            ..Default::default()
        },
    )
    .unwrap();

    session::mesh2d_flip_edges(id, false).unwrap();

    let data = session::mesh2d_get(id).unwrap();
    let edges: Vec<(usize, usize)> = data
        .edge_nodes
        .chunks_exact(2)
        .map(|pair| (pair[0].min(pair[1]), pair[0].max(pair[1])))
        .collect();
    assert!(edges.contains(&(0, 2)));
    assert!(!edges.contains(&(1, 3)));

    session::deallocate(id).unwrap();
}

#[test]
fn polygon_perimeter_refinement_returns_resampled_ring() {
    let id = session::allocate(false);
    let polygon = GeometryList::new(
        vec![0.0, 10.0, 10.0, 0.0, 0.0],
        vec![0.0, 0.0, 10.0, 10.0, 0.0],
    )
    .unwrap();
    let refined = session::polygon_refine(id, &polygon, 0, 1, 2.0).unwrap();
    let parts = refined.parts();
    assert_eq!(parts.len(), 1);
    // Bottom edge resampled into 5 pieces, rest untouched, ring closed.
    assert_eq!(parts[0].points.len(), 9);
    assert!(parts[0].is_closed());
    session::deallocate(id).unwrap();
}

#[test]
fn points_in_polygon_mask() {
    let selecting = GeometryList::new(
        vec![0.0, 10.0, 10.0, 0.0, 0.0],
        vec![0.0, 0.0, 10.0, 10.0, 0.0],
    )
    .unwrap();
    let selected = GeometryList::new(vec![5.0, 15.0, 2.0], vec![5.0, 5.0, 9.0]).unwrap();
    let mask = session::get_points_in_polygon(&selecting, &selected).unwrap();
    assert_eq!(mask.values, vec![1.0, 0.0, 1.0]);
}

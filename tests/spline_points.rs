use mesh_forge::prelude::*;
use mesh_forge::session::get_splines;
use proptest::prelude::*;

fn corner_list(points: &[(f64, f64)]) -> GeometryList {
    GeometryList::new(
        points.iter().map(|&(x, _)| x).collect(),
        points.iter().map(|&(_, y)| y).collect(),
    )
    .unwrap()
}

#[test]
fn output_length_follows_count_law() {
    let corners = [(0.0, 0.0), (10.0, 5.0), (20.0, -3.0), (30.0, 2.0)];
    let k = 7;
    let out = get_splines(&corner_list(&corners), k).unwrap();
    assert_eq!(out.len(), (corners.len() - 1) * k + corners.len());
}

#[test]
fn endpoints_and_corners_are_exact() {
    let corners = [(1.5, -2.0), (4.0, 4.0), (9.0, 1.0)];
    let k = 4;
    let out = get_splines(&corner_list(&corners), k).unwrap();
    assert_eq!((out.x[0], out.y[0]), corners[0]);
    let last = out.len() - 1;
    assert_eq!((out.x[last], out.y[last]), corners[2]);
    // The middle corner sits at its exact slot.
    assert_eq!((out.x[k + 1], out.y[k + 1]), corners[1]);
}

#[test]
fn multi_part_input_processed_independently() {
    let list = GeometryList::new(
        vec![0.0, 10.0, SEPARATOR, 5.0, 6.0, 7.0],
        vec![0.0, 0.0, SEPARATOR, 1.0, 2.0, 1.0],
    )
    .unwrap();
    let k = 3;
    let out = get_splines(&list, k).unwrap();
    let parts = out.parts();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].points.len(), 2 + k);
    assert_eq!(parts[1].points.len(), 3 + 2 * k);
}

#[test]
fn single_point_part_yields_no_output() {
    let list = GeometryList::new(
        vec![3.0, SEPARATOR, 0.0, 1.0],
        vec![3.0, SEPARATOR, 0.0, 1.0],
    )
    .unwrap();
    let out = get_splines(&list, 5).unwrap();
    let parts = out.parts();
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].points.len(), 7);
}

#[test]
fn straight_control_points_stay_collinear() {
    let corners = [(0.0, 2.0), (5.0, 2.0), (10.0, 2.0), (15.0, 2.0)];
    let out = get_splines(&corner_list(&corners), 9).unwrap();
    for &y in &out.y {
        assert!((y - 2.0).abs() < 1e-9);
    }
}

proptest! {
    #[test]
    fn count_law_holds_for_any_input(
        n in 2usize..12,
        k in 0usize..20,
        seed in 0u64..1000,
    ) {
        // Deterministic pseudo-random corner points from the seed.
        let corners: Vec<Point> = (0..n)
            .map(|i| {
                let t = (seed as f64 + i as f64) * 0.7;
                Point::new(i as f64 * 10.0 + t.sin(), t.cos() * 5.0)
            })
            .collect();
        let out = evaluate_spline(&corners, k);
        prop_assert_eq!(out.len(), spline_point_count(n, k));
        prop_assert_eq!(out[0], corners[0]);
        prop_assert_eq!(out[out.len() - 1], corners[n - 1]);
    }
}

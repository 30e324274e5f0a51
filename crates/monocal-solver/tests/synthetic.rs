use monocal_core::{
    camera_matrix, object_grid, Distortion, DistortionKind, ImagePoint, ImageSize,
    IntrinsicModel, PatternShape, Solver, SolverFlags, ViewCorrespondence,
};
use monocal_solver::{ZhangSolveError, ZhangSolver};
use nalgebra::{Rotation3, Vector3};

const SQUARE: f32 = 30.0;

fn ground_truth() -> IntrinsicModel {
    IntrinsicModel::new(
        camera_matrix(800.0, 790.0, 330.0, 245.0),
        Distortion {
            k1: -0.12,
            k2: 0.03,
            p1: 0.0005,
            p2: -0.0003,
            ..Distortion::zero(DistortionKind::RadialTangential)
        },
        ImageSize::new(640, 480),
    )
}

fn board_rotations() -> Vec<Rotation3<f64>> {
    vec![
        Rotation3::from_euler_angles(0.25, 0.0, 0.0),
        Rotation3::from_euler_angles(0.0, 0.3, 0.1),
        Rotation3::from_euler_angles(-0.2, -0.25, -0.05),
        Rotation3::from_euler_angles(0.15, -0.1, 0.3),
        Rotation3::from_euler_angles(-0.3, 0.2, 0.0),
    ]
}

fn synthetic_views(model: &IntrinsicModel, count: usize) -> Vec<ViewCorrespondence> {
    let shape = PatternShape::new(6, 8);
    let obj = object_grid(shape, SQUARE);
    let centre = Vector3::new(3.5 * SQUARE as f64, 2.5 * SQUARE as f64, 0.0);

    board_rotations()
        .into_iter()
        .take(count)
        .map(|rot| {
            let t = Vector3::new(0.0, 0.0, 600.0) - rot * centre;
            let img: Vec<ImagePoint> = obj
                .iter()
                .map(|p| {
                    let pc = rot * Vector3::new(p.x as f64, p.y as f64, 0.0) + t;
                    let px = model.project(&pc).expect("in front of camera");
                    ImagePoint::new(px[0] as f32, px[1] as f32)
                })
                .collect();
            ViewCorrespondence::new(img, obj.clone()).expect("matching counts")
        })
        .collect()
}

#[test]
fn recovers_intrinsics_and_distortion() {
    let gt = ground_truth();
    let views = synthetic_views(&gt, 5);

    let out = ZhangSolver::default()
        .solve(&views, gt.image_size, SolverFlags::empty())
        .expect("solve");

    assert!(out.rms_error < 1e-3, "rms {}", out.rms_error);
    assert!((out.camera_matrix[(0, 0)] - 800.0).abs() < 0.1);
    assert!((out.camera_matrix[(1, 1)] - 790.0).abs() < 0.1);
    assert!((out.camera_matrix[(0, 2)] - 330.0).abs() < 0.1);
    assert!((out.camera_matrix[(1, 2)] - 245.0).abs() < 0.1);
    assert_eq!(out.distortion.kind, DistortionKind::RadialTangential);
    assert!((out.distortion.k1 + 0.12).abs() < 1e-3, "k1 {}", out.distortion.k1);
    assert!((out.distortion.p1 - 0.0005).abs() < 1e-4);

    assert_eq!(out.rotations.len(), 5);
    assert_eq!(out.translations.len(), 5);
    for (w, rot) in out.rotations.iter().zip(board_rotations()) {
        assert!((w - rot.scaled_axis()).norm() < 1e-3);
    }
    let per_view = out.per_view_rms.expect("per-view rms");
    assert_eq!(per_view.len(), 5);
    assert!(per_view.iter().all(|e| *e < 1e-3));
}

#[test]
fn zero_tangent_flag_fixes_p1_p2() {
    let gt = ground_truth();
    let views = synthetic_views(&gt, 4);

    let out = ZhangSolver::default()
        .solve(&views, gt.image_size, SolverFlags::ZERO_TANGENT_DIST)
        .expect("solve");

    assert_eq!(out.distortion.kind, DistortionKind::Radial);
    assert_eq!(out.distortion.p1, 0.0);
    assert_eq!(out.distortion.p2, 0.0);
    assert_eq!(out.distortion.coefficients().len(), 3);
    assert!(out.rms_error.is_finite());
}

#[test]
fn rational_flag_estimates_eight_coefficients() {
    let gt = ground_truth();
    let views = synthetic_views(&gt, 5);

    let out = ZhangSolver::default()
        .solve(&views, gt.image_size, SolverFlags::RATIONAL_MODEL)
        .expect("solve");

    assert_eq!(out.distortion.kind, DistortionKind::RationalTangential);
    assert_eq!(out.distortion.coefficients().len(), 8);
    assert!(out.rms_error < 1e-2, "rms {}", out.rms_error);
}

#[test]
fn fewer_than_three_views_fail() {
    let gt = ground_truth();
    let views = synthetic_views(&gt, 2);

    let err = ZhangSolver::default()
        .solve(&views, gt.image_size, SolverFlags::empty())
        .unwrap_err();
    assert_eq!(err, ZhangSolveError::NotEnoughViews { needed: 3, got: 2 });
}

#[test]
fn non_planar_target_is_rejected() {
    let gt = ground_truth();
    let mut views = synthetic_views(&gt, 3);
    let mut obj = views[1].object_points().to_vec();
    obj[0].z = 5.0;
    views[1] = ViewCorrespondence::new(views[1].image_points().to_vec(), obj).unwrap();

    let err = ZhangSolver::default()
        .solve(&views, gt.image_size, SolverFlags::empty())
        .unwrap_err();
    assert_eq!(err, ZhangSolveError::NonPlanarTarget { view: 1 });
}

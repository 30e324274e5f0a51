use nalgebra::{Matrix3, Rotation3, Vector3};

/// Pose of a `z = 0` target from its homography and the camera matrix.
///
/// Returns `(axis_angle, translation)` with the target in front of the camera.
pub fn pose_from_homography(
    k: &Matrix3<f64>,
    h: &Matrix3<f64>,
) -> Option<(Vector3<f64>, Vector3<f64>)> {
    let k_inv = k.try_inverse()?;
    let a1 = k_inv * h.column(0);
    let a2 = k_inv * h.column(1);
    let a3 = k_inv * h.column(2);

    let norm = 0.5 * (a1.norm() + a2.norm());
    if norm < 1e-12 {
        return None;
    }
    let mut lambda = 1.0 / norm;
    if (lambda * a3).z < 0.0 {
        lambda = -lambda;
    }

    let r1 = lambda * a1;
    let r2 = lambda * a2;
    let r3 = r1.cross(&r2);
    let r = Matrix3::from_columns(&[r1, r2, r3]);

    // Closest rotation in the Frobenius sense.
    let svd = r.svd(true, true);
    let mut u = svd.u?;
    let v_t = svd.v_t?;
    let mut r_orth = u * v_t;
    if r_orth.determinant() < 0.0 {
        u.column_mut(2).neg_mut();
        r_orth = u * v_t;
    }

    let rotation = Rotation3::from_matrix_unchecked(r_orth).scaled_axis();
    let translation = lambda * a3;
    (rotation.iter().all(|v| v.is_finite()) && translation.iter().all(|v| v.is_finite()))
        .then_some((rotation, translation))
}

use std::f32::consts::{FRAC_PI_2, PI};

/// Absolute difference between two angles (radians), in `[0, π]`.
pub fn angle_diff_abs(a: f32, b: f32) -> f32 {
    let two_pi = 2.0 * PI;
    let mut diff = (b - a).rem_euclid(two_pi);
    if diff >= PI {
        diff -= two_pi;
    }
    diff.abs()
}

/// Whether two directions are orthogonal within `tolerance` radians.
pub fn is_orthogonal(reference_angle: f32, other_angle: f32, tolerance: f32) -> bool {
    let diff_abs = angle_diff_abs(reference_angle, other_angle);
    (FRAC_PI_2 - diff_abs).abs() <= tolerance.abs()
}

/// Angle between an undirected axis (defined modulo π) and a directed
/// vector angle. Returns a value in `[0, π/2]`.
pub fn axis_vec_diff(axis_angle: f32, vec_angle: f32) -> f32 {
    let diff_abs = angle_diff_abs(axis_angle, vec_angle);
    diff_abs.min(PI - diff_abs)
}

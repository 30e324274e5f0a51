//! Plane-to-image homographies from point correspondences.

use nalgebra::{DMatrix, Matrix3, Point2, Vector3};

/// Projective map of the target plane into the image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    /// Map a point; points sent to infinity come back non-finite.
    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * p.to_homogeneous();
        Point2::new(v.x / v.z, v.y / v.z)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }

    /// RMS distance between `H * src` and `dst`, in `dst` units.
    pub fn transfer_rms(&self, src: &[Point2<f64>], dst: &[Point2<f64>]) -> f64 {
        if src.is_empty() {
            return 0.0;
        }
        let sum: f64 = src
            .iter()
            .zip(dst)
            .map(|(s, d)| (self.apply(*s) - *d).norm_squared())
            .sum();
        (sum / src.len() as f64).sqrt()
    }
}

/// Similarity that moves a point set to its centroid with mean radius √2.
struct Conditioner {
    t: Matrix3<f64>,
}

impl Conditioner {
    fn fit(pts: &[Point2<f64>]) -> Self {
        let n = pts.len() as f64;
        let centroid = pts.iter().fold(Vector3::zeros(), |acc, p| acc + p.to_homogeneous()) / n;
        let (cx, cy) = (centroid.x, centroid.y);
        let radius = pts
            .iter()
            .map(|p| (p.x - cx).hypot(p.y - cy))
            .sum::<f64>()
            / n;
        let s = if radius > 1e-12 {
            std::f64::consts::SQRT_2 / radius
        } else {
            1.0
        };
        Self {
            t: Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0),
        }
    }

    fn apply(&self, p: &Point2<f64>) -> (f64, f64) {
        let v = self.t * p.to_homogeneous();
        (v.x, v.y)
    }
}

/// Right null vector of `a` as a row-major 3x3 matrix.
fn null_vector(a: DMatrix<f64>) -> Option<Matrix3<f64>> {
    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let (idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|x, y| x.1.total_cmp(y.1))?;
    let row = v_t.row(idx);
    Some(Matrix3::from_iterator(row.iter().copied()).transpose())
}

/// Estimate `H` with `dst ~ H * src` by the conditioned DLT.
///
/// Needs at least four pairs; `None` for mismatched inputs or when the
/// solution cannot be scaled to `H[2,2] == 1`.
pub fn estimate_homography(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Homography> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }

    let cs = Conditioner::fit(src);
    let cd = Conditioner::fit(dst);

    // Zero rows keep the system at least 9x9 so the SVD returns all of V.
    let mut a = DMatrix::<f64>::zeros((2 * src.len()).max(9), 9);
    for (k, (s, d)) in src.iter().zip(dst).enumerate() {
        let (x, y) = cs.apply(s);
        let (u, v) = cd.apply(d);
        let r = 2 * k;
        a.row_mut(r)
            .copy_from_slice(&[x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, -u]);
        a.row_mut(r + 1)
            .copy_from_slice(&[0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y, -v]);
    }

    let hn = null_vector(a)?;
    let h = cd.t.try_inverse()? * hn * cs.t;
    let scale = h[(2, 2)];
    if scale.abs() < 1e-12 || !h.iter().all(|v| v.is_finite()) {
        return None;
    }
    Some(Homography::new(h / scale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tilted_board() -> Homography {
        Homography::new(Matrix3::new(
            0.8, 0.05, 120.0, //
            -0.02, 1.1, 80.0, //
            0.0009, -0.0004, 1.0,
        ))
    }

    fn grid(cols: usize, rows: usize, step: f64) -> Vec<Point2<f64>> {
        (0..rows)
            .flat_map(|r| (0..cols).map(move |c| Point2::new(c as f64 * step, r as f64 * step)))
            .collect()
    }

    #[test]
    fn recovers_h_from_a_square_grid() {
        let truth = tilted_board();
        let src = grid(6, 4, 30.0);
        let dst: Vec<_> = src.iter().map(|&p| truth.apply(p)).collect();

        let est = estimate_homography(&src, &dst).expect("estimate");
        assert_relative_eq!(est.h, truth.h, epsilon = 1e-7);
        assert!(est.transfer_rms(&src, &dst) < 1e-8);
    }

    #[test]
    fn minimal_four_point_case() {
        let truth = tilted_board();
        let src = grid(2, 2, 150.0);
        let dst: Vec<_> = src.iter().map(|&p| truth.apply(p)).collect();

        let est = estimate_homography(&src, &dst).expect("estimate");
        let p = Point2::new(75.0, 40.0);
        assert_relative_eq!(est.apply(p), truth.apply(p), epsilon = 1e-6);
    }

    #[test]
    fn inverse_maps_back() {
        let h = tilted_board();
        let inv = h.inverse().expect("invertible");
        let p = Point2::new(320.0, 200.0);
        assert_relative_eq!(inv.apply(h.apply(p)), p, epsilon = 1e-9);
    }

    #[test]
    fn transfer_rms_measures_offset() {
        let identity = Homography::new(Matrix3::identity());
        let src = grid(3, 3, 10.0);
        let dst: Vec<_> = src.iter().map(|p| Point2::new(p.x + 3.0, p.y + 4.0)).collect();
        assert_relative_eq!(identity.transfer_rms(&src, &dst), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn mismatched_lengths_fail() {
        let src = [Point2::new(0.0, 0.0); 4];
        let dst = [Point2::new(1.0, 1.0); 3];
        assert!(estimate_homography(&src, &dst).is_none());
    }
}

use nalgebra::{DMatrix, Matrix3, SVector};

/// `v_ij(H)` row of Zhang's constraint system.
fn v_ij(h: &Matrix3<f64>, i: usize, j: usize) -> SVector<f64, 6> {
    let hi = h.column(i);
    let hj = h.column(j);
    SVector::<f64, 6>::from_row_slice(&[
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ])
}

/// Closed-form camera matrix from plane homographies (Zhang), zero skew.
///
/// Needs at least 3 homographies in general position. Returns `None` for a
/// degenerate configuration, e.g. all boards parallel to the image plane.
pub fn intrinsics_from_homographies(hs: &[Matrix3<f64>]) -> Option<Matrix3<f64>> {
    if hs.len() < 3 {
        return None;
    }

    let mut v = DMatrix::<f64>::zeros(2 * hs.len(), 6);
    for (k, h) in hs.iter().enumerate() {
        let h = h / h.norm();
        let v11 = v_ij(&h, 0, 0);
        let v22 = v_ij(&h, 1, 1);
        let v12 = v_ij(&h, 0, 1);
        v.row_mut(2 * k).copy_from(&v12.transpose());
        v.row_mut(2 * k + 1).copy_from(&(v11 - v22).transpose());
    }

    let svd = v.svd(false, true);
    let v_t = svd.v_t?;
    let (min_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))?;
    let b = v_t.row(min_idx);

    let (b11, b12, b22, b13, b23, b33) = (b[0], b[1], b[2], b[3], b[4], b[5]);

    let denom = b11 * b22 - b12 * b12;
    let denom_norm = b11 * b11 + b22 * b22;
    if denom_norm <= 0.0 || denom.abs() / denom_norm <= 1e-9 || b11.abs() < 1e-15 {
        return None;
    }

    let v0 = (b12 * b13 - b11 * b23) / denom;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;

    let alpha2 = lambda / b11;
    let beta2 = lambda * b11 / denom;
    if !(alpha2 > 0.0 && beta2 > 0.0) {
        return None;
    }
    let alpha = alpha2.sqrt();
    let beta = beta2.sqrt();
    let gamma = -b12 * alpha * alpha * beta / lambda;
    let u0 = gamma * v0 / beta - b13 * alpha * alpha / lambda;

    let k = Matrix3::new(alpha, 0.0, u0, 0.0, beta, v0, 0.0, 0.0, 1.0);
    k.iter().all(|v| v.is_finite()).then_some(k)
}

use monocal_core::{Distortion, DistortionKind, ImageSize, IntrinsicModel, ViewCorrespondence};
use nalgebra::{DMatrix, DVector, Matrix3, Rotation3, Vector3};

use crate::lm::{finite_difference_step, NllsProblem};

/// Residual assigned to a point that lands behind the camera.
const BEHIND_CAMERA_RESIDUAL: f64 = 1e4;

const NUM_INTRINSICS: usize = 4;
const POSE_DIM: usize = 6;

/// One view in solver precision.
#[derive(Debug, Clone)]
pub(crate) struct PlanarView {
    pub object: Vec<Vector3<f64>>,
    pub image: Vec<[f64; 2]>,
}

impl PlanarView {
    pub fn from_correspondence(view: &ViewCorrespondence) -> Self {
        Self {
            object: view
                .object_points()
                .iter()
                .map(|p| Vector3::new(p.x as f64, p.y as f64, p.z as f64))
                .collect(),
            image: view
                .image_points()
                .iter()
                .map(|p| [p.x as f64, p.y as f64])
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.image.len()
    }
}

/// Joint refinement of `fx fy cx cy`, the active distortion terms and all
/// view poses.
///
/// Parameter layout: `[fx, fy, cx, cy, d_0..d_n, (w, t)_0, (w, t)_1, ...]`
/// with `d` in the preset's conventional order and `w` axis-angle.
pub(crate) struct ReprojectionProblem<'a> {
    views: &'a [PlanarView],
    kind: DistortionKind,
    image_size: ImageSize,
    offsets: Vec<usize>,
    num_residuals: usize,
}

impl<'a> ReprojectionProblem<'a> {
    pub fn new(views: &'a [PlanarView], kind: DistortionKind, image_size: ImageSize) -> Self {
        let mut offsets = Vec::with_capacity(views.len());
        let mut acc = 0;
        for v in views {
            offsets.push(acc);
            acc += 2 * v.len();
        }
        Self {
            views,
            kind,
            image_size,
            offsets,
            num_residuals: acc,
        }
    }

    fn num_distortion(&self) -> usize {
        self.kind.coefficient_count()
    }

    fn pose_offset(&self, view: usize) -> usize {
        NUM_INTRINSICS + self.num_distortion() + POSE_DIM * view
    }

    pub fn pack(
        &self,
        camera_matrix: &Matrix3<f64>,
        distortion: &Distortion,
        poses: &[(Vector3<f64>, Vector3<f64>)],
    ) -> DVector<f64> {
        let mut x = DVector::zeros(self.num_params());
        x[0] = camera_matrix[(0, 0)];
        x[1] = camera_matrix[(1, 1)];
        x[2] = camera_matrix[(0, 2)];
        x[3] = camera_matrix[(1, 2)];
        let coeffs = Distortion {
            kind: self.kind,
            ..*distortion
        }
        .coefficients();
        for (k, c) in coeffs.into_iter().enumerate() {
            x[NUM_INTRINSICS + k] = c;
        }
        for (v, (w, t)) in poses.iter().enumerate() {
            let o = self.pose_offset(v);
            x.fixed_rows_mut::<3>(o).copy_from(w);
            x.fixed_rows_mut::<3>(o + 3).copy_from(t);
        }
        x
    }

    pub fn decode_model(&self, x: &DVector<f64>) -> IntrinsicModel {
        let k = Matrix3::new(x[0], 0.0, x[2], 0.0, x[1], x[3], 0.0, 0.0, 1.0);
        let n = self.num_distortion();
        let coeffs: Vec<f64> = x.rows(NUM_INTRINSICS, n).iter().copied().collect();
        let distortion = Distortion::from_coefficients(self.kind, &coeffs)
            .unwrap_or(Distortion::zero(self.kind));
        IntrinsicModel::new(k, distortion, self.image_size)
    }

    pub fn decode_pose(&self, x: &DVector<f64>, view: usize) -> (Vector3<f64>, Vector3<f64>) {
        let o = self.pose_offset(view);
        (
            x.fixed_rows::<3>(o).into_owned(),
            x.fixed_rows::<3>(o + 3).into_owned(),
        )
    }

    fn view_residuals(
        &self,
        model: &IntrinsicModel,
        x: &DVector<f64>,
        view: usize,
        out: &mut [f64],
    ) {
        let (w, t) = self.decode_pose(x, view);
        let rot = Rotation3::new(w);
        for (k, (p, m)) in self.views[view]
            .object
            .iter()
            .zip(&self.views[view].image)
            .enumerate()
        {
            let pc = rot * p + t;
            match model.project(&pc) {
                Some(px) => {
                    out[2 * k] = px[0] - m[0];
                    out[2 * k + 1] = px[1] - m[1];
                }
                None => {
                    out[2 * k] = BEHIND_CAMERA_RESIDUAL;
                    out[2 * k + 1] = BEHIND_CAMERA_RESIDUAL;
                }
            }
        }
    }

    /// Residual range of `view` inside the stacked residual vector.
    pub fn residual_range(&self, view: usize) -> std::ops::Range<usize> {
        let start = self.offsets[view];
        start..start + 2 * self.views[view].len()
    }
}

impl NllsProblem for ReprojectionProblem<'_> {
    fn num_params(&self) -> usize {
        NUM_INTRINSICS + self.num_distortion() + POSE_DIM * self.views.len()
    }

    fn num_residuals(&self) -> usize {
        self.num_residuals
    }

    fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
        let model = self.decode_model(x);
        let mut r = DVector::zeros(self.num_residuals);
        for v in 0..self.views.len() {
            let range = self.residual_range(v);
            self.view_residuals(&model, x, v, &mut r.as_mut_slice()[range]);
        }
        r
    }

    /// Pose columns only touch their own view, so they are differenced per view.
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let base = self.residuals(x);
        let n = self.num_params();
        let mut j = DMatrix::zeros(self.num_residuals, n);
        let mut xp = x.clone();

        let shared = NUM_INTRINSICS + self.num_distortion();
        for k in 0..shared {
            let h = finite_difference_step(x[k]);
            xp[k] = x[k] + h;
            let rp = self.residuals(&xp);
            j.set_column(k, &((rp - &base) / h));
            xp[k] = x[k];
        }

        let model = self.decode_model(x);
        for v in 0..self.views.len() {
            let range = self.residual_range(v);
            let mut buf = vec![0.0; range.len()];
            let o = self.pose_offset(v);
            for k in o..o + POSE_DIM {
                let h = finite_difference_step(x[k]);
                xp[k] = x[k] + h;
                self.view_residuals(&model, &xp, v, &mut buf);
                for (row, value) in range.clone().zip(&buf) {
                    j[(row, k)] = (value - base[row]) / h;
                }
                xp[k] = x[k];
            }
        }

        j
    }
}

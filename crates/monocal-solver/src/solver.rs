use log::{debug, warn};
use monocal_core::{
    estimate_homography, Distortion, DistortionKind, ImageSize, Solver, SolverFlags, SolverOutput,
    ViewCorrespondence,
};
use nalgebra::{Matrix3, Point2, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::lm::{LmBackend, NllsProblem, SolveOptions};
use crate::pose::pose_from_homography;
use crate::problem::{PlanarView, ReprojectionProblem};
use crate::zhang::intrinsics_from_homographies;

/// Fewest views for which the closed-form initialisation is defined.
pub const MIN_VIEWS: usize = 3;

/// Largest `|z|` accepted for a planar target point.
const PLANAR_Z_TOLERANCE: f64 = 1e-6;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ZhangSolveError {
    #[error("need at least {needed} views, got {got}")]
    NotEnoughViews { needed: usize, got: usize },

    #[error("view {view} has {got} points, need at least 4")]
    TooFewPoints { view: usize, got: usize },

    #[error("view {view} is not a planar z = 0 target")]
    NonPlanarTarget { view: usize },

    #[error("image size must be non-empty")]
    EmptyImageSize,

    #[error("homography estimation failed for view {view}")]
    DegenerateHomography { view: usize },

    #[error("pose initialisation failed for view {view}")]
    DegeneratePose { view: usize },

    #[error("refinement produced non-finite parameters")]
    NonFinite,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ZhangSolverParams {
    pub lm: SolveOptions,
}

/// Planar-target calibration: Zhang initialisation, then joint LM refinement.
#[derive(Debug, Clone, Default)]
pub struct ZhangSolver {
    pub params: ZhangSolverParams,
}

impl ZhangSolver {
    pub fn new(params: ZhangSolverParams) -> Self {
        Self { params }
    }

    fn validate(
        views: &[ViewCorrespondence],
        image_size: ImageSize,
    ) -> Result<Vec<PlanarView>, ZhangSolveError> {
        if views.len() < MIN_VIEWS {
            return Err(ZhangSolveError::NotEnoughViews {
                needed: MIN_VIEWS,
                got: views.len(),
            });
        }
        if image_size.is_empty() {
            return Err(ZhangSolveError::EmptyImageSize);
        }

        views
            .iter()
            .enumerate()
            .map(|(i, v)| {
                if v.len() < 4 {
                    return Err(ZhangSolveError::TooFewPoints { view: i, got: v.len() });
                }
                let view = PlanarView::from_correspondence(v);
                if view.object.iter().any(|p| p.z.abs() > PLANAR_Z_TOLERANCE) {
                    return Err(ZhangSolveError::NonPlanarTarget { view: i });
                }
                Ok(view)
            })
            .collect()
    }

    fn homographies(views: &[PlanarView]) -> Result<Vec<Matrix3<f64>>, ZhangSolveError> {
        views
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let src: Vec<Point2<f64>> =
                    v.object.iter().map(|p| Point2::new(p.x, p.y)).collect();
                let dst: Vec<Point2<f64>> =
                    v.image.iter().map(|p| Point2::new(p[0], p[1])).collect();
                let h = estimate_homography(&src, &dst)
                    .ok_or(ZhangSolveError::DegenerateHomography { view: i })?;
                debug!(
                    "view {i}: homography transfer rms {:.4}px",
                    h.transfer_rms(&src, &dst)
                );
                Ok(h.h)
            })
            .collect()
    }

    /// Closed-form K on homographies expressed in a centred, scaled pixel frame.
    fn initial_camera_matrix(hs: &[Matrix3<f64>], image_size: ImageSize) -> Matrix3<f64> {
        let w = image_size.width as f64;
        let h = image_size.height as f64;
        let s = w.max(h);
        let (c0x, c0y) = (0.5 * (w - 1.0), 0.5 * (h - 1.0));
        let n = Matrix3::new(1.0 / s, 0.0, -c0x / s, 0.0, 1.0 / s, -c0y / s, 0.0, 0.0, 1.0);
        let n_inv = Matrix3::new(s, 0.0, c0x, 0.0, s, c0y, 0.0, 0.0, 1.0);

        let hn: Vec<Matrix3<f64>> = hs.iter().map(|hm| n * hm).collect();
        match intrinsics_from_homographies(&hn) {
            Some(kn) => n_inv * kn,
            None => {
                warn!("closed-form intrinsics degenerate; starting from a centred guess");
                Matrix3::new(s, 0.0, c0x, 0.0, s, c0y, 0.0, 0.0, 1.0)
            }
        }
    }
}

impl Solver for ZhangSolver {
    type Error = ZhangSolveError;

    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, views),
            fields(num_views = views.len(), flags = flags.bits())
        )
    )]
    fn solve(
        &self,
        views: &[ViewCorrespondence],
        image_size: ImageSize,
        flags: SolverFlags,
    ) -> Result<SolverOutput, Self::Error> {
        let planar = Self::validate(views, image_size)?;
        let kind = DistortionKind::from_flags(flags);

        let hs = Self::homographies(&planar)?;
        let k0 = Self::initial_camera_matrix(&hs, image_size);
        debug!(
            "initial fx={:.2} fy={:.2} cx={:.2} cy={:.2}",
            k0[(0, 0)],
            k0[(1, 1)],
            k0[(0, 2)],
            k0[(1, 2)]
        );

        let poses = hs
            .iter()
            .enumerate()
            .map(|(i, h)| {
                pose_from_homography(&k0, h).ok_or(ZhangSolveError::DegeneratePose { view: i })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let problem = ReprojectionProblem::new(&planar, kind, image_size);
        let x0 = problem.pack(&k0, &Distortion::zero(kind), &poses);
        let (x, report) = LmBackend.solve(&problem, x0, &self.params.lm);
        debug!(
            "lm finished after {} evaluations, cost {:.6e}, converged {}",
            report.iterations, report.final_cost, report.converged
        );
        if !x.iter().all(|v| v.is_finite()) {
            return Err(ZhangSolveError::NonFinite);
        }

        let model = problem.decode_model(&x);
        let residuals = problem.residuals(&x);

        let total_points: usize = planar.iter().map(|v| v.len()).sum();
        let rms_error = (residuals.norm_squared() / total_points as f64).sqrt();
        let per_view_rms = planar
            .iter()
            .enumerate()
            .map(|(v, view)| {
                let sq: f64 = residuals.as_slice()[problem.residual_range(v)]
                    .iter()
                    .map(|r| r * r)
                    .sum();
                (sq / view.len() as f64).sqrt()
            })
            .collect();

        let (rotations, translations): (Vec<Vector3<f64>>, Vec<Vector3<f64>>) =
            (0..planar.len()).map(|v| problem.decode_pose(&x, v)).unzip();

        Ok(SolverOutput {
            camera_matrix: model.camera_matrix,
            distortion: model.distortion,
            rotations,
            translations,
            rms_error,
            per_view_rms: Some(per_view_rms),
        })
    }
}

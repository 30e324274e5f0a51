//! Intrinsic camera model, calibration options and the solver flag boundary.

use std::ops::{BitOr, BitOrAssign};

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::{Distortion, DistortionKind, ImageSize};

/// Which distortion terms a calibration solve estimates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationOptions {
    /// Estimate the rational radial model (`k4 k5 k6`) on top of `k1 k2 k3`.
    #[serde(default)]
    pub extended_radial_model: bool,
    /// Estimate tangential terms `p1 p2`; when off they are fixed at zero.
    #[serde(default = "default_true")]
    pub tangential_distortion: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CalibrationOptions {
    fn default() -> Self {
        Self {
            extended_radial_model: false,
            tangential_distortion: true,
        }
    }
}

impl CalibrationOptions {
    /// Translate to the flag set handed to a solver.
    pub fn solver_flags(&self) -> SolverFlags {
        let mut flags = SolverFlags::empty();
        if !self.tangential_distortion {
            flags |= SolverFlags::ZERO_TANGENT_DIST;
        }
        if self.extended_radial_model {
            flags |= SolverFlags::RATIONAL_MODEL;
        }
        flags
    }

    pub fn distortion_kind(&self) -> DistortionKind {
        DistortionKind::from_flags(self.solver_flags())
    }
}

/// Flag set understood by [`crate::Solver`] implementations.
///
/// Bit values follow the widespread calibration-library convention so that
/// adapters can forward them unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SolverFlags(u32);

impl SolverFlags {
    pub const ZERO_TANGENT_DIST: SolverFlags = SolverFlags(1 << 3);
    pub const RATIONAL_MODEL: SolverFlags = SolverFlags(1 << 14);

    pub const fn empty() -> Self {
        SolverFlags(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits_retain(bits: u32) -> Self {
        SolverFlags(bits)
    }

    #[inline]
    pub const fn contains(self, other: SolverFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for SolverFlags {
    type Output = SolverFlags;

    fn bitor(self, rhs: SolverFlags) -> SolverFlags {
        SolverFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for SolverFlags {
    fn bitor_assign(&mut self, rhs: SolverFlags) {
        self.0 |= rhs.0;
    }
}

/// Camera matrix + distortion, as produced by a successful solve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntrinsicModel {
    /// `[[fx, 0, cx], [0, fy, cy], [0, 0, 1]]`.
    pub camera_matrix: Matrix3<f64>,
    pub distortion: Distortion,
    /// Resolution of the calibration images.
    pub image_size: ImageSize,
}

impl IntrinsicModel {
    pub fn new(camera_matrix: Matrix3<f64>, distortion: Distortion, image_size: ImageSize) -> Self {
        Self {
            camera_matrix,
            distortion,
            image_size,
        }
    }

    #[inline]
    pub fn fx(&self) -> f64 {
        self.camera_matrix[(0, 0)]
    }

    #[inline]
    pub fn fy(&self) -> f64 {
        self.camera_matrix[(1, 1)]
    }

    #[inline]
    pub fn cx(&self) -> f64 {
        self.camera_matrix[(0, 2)]
    }

    #[inline]
    pub fn cy(&self) -> f64 {
        self.camera_matrix[(1, 2)]
    }

    pub fn is_finite(&self) -> bool {
        self.camera_matrix.iter().all(|v| v.is_finite()) && self.distortion.is_finite()
    }

    /// Project a point given in camera coordinates to distorted pixels.
    pub fn project(&self, p_cam: &Vector3<f64>) -> Option<[f64; 2]> {
        if p_cam.z <= 1e-12 {
            return None;
        }
        let n = [p_cam.x / p_cam.z, p_cam.y / p_cam.z];
        let [xd, yd] = self.distortion.distort_normalized(n);
        Some([
            self.fx() * xd + self.camera_matrix[(0, 1)] * yd + self.cx(),
            self.fy() * yd + self.cy(),
        ])
    }

    /// Map a distorted pixel to its undistorted pixel position (same K).
    pub fn undistort_pixel(&self, pixel: [f64; 2]) -> Option<[f64; 2]> {
        let y = (pixel[1] - self.cy()) / self.fy();
        let x = (pixel[0] - self.cx() - self.camera_matrix[(0, 1)] * y) / self.fx();
        let [xu, yu] = self.distortion.undistort_normalized([x, y], 20)?;
        Some([self.fx() * xu + self.cx(), self.fy() * yu + self.cy()])
    }
}

/// Camera matrix with zero skew.
pub fn camera_matrix(fx: f64, fy: f64, cx: f64, cy: f64) -> Matrix3<f64> {
    Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0)
}

/// An [`IntrinsicModel`] tagged with the solve that produced it.
///
/// `version` increases by one on every successful solve; consumers compare
/// versions, never model values, to detect a change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VersionedModel {
    pub version: u64,
    pub model: IntrinsicModel,
}

/// Pose of the target in one view: `p_cam = R(rotation) * p_obj + translation`.
///
/// `rotation` is an axis-angle vector (direction = axis, norm = angle).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewPose {
    pub rotation: Vector3<f64>,
    pub translation: Vector3<f64>,
}

//! Brown-Conrady lens distortion with the optional rational radial term.

use crate::SolverFlags;
use serde::{Deserialize, Serialize};

/// Named distortion presets.
///
/// The preset decides which coefficients a solver estimates and how many
/// coefficients [`Distortion::coefficients`] reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistortionKind {
    /// `k1 k2 k3`.
    Radial,
    /// `k1 k2 p1 p2 k3`.
    #[default]
    RadialTangential,
    /// `k1 k2 k3 k4 k5 k6`.
    Rational,
    /// `k1 k2 p1 p2 k3 k4 k5 k6`.
    RationalTangential,
}

impl DistortionKind {
    /// Preset selected by a solver flag set.
    pub fn from_flags(flags: SolverFlags) -> Self {
        let tangential = !flags.contains(SolverFlags::ZERO_TANGENT_DIST);
        let rational = flags.contains(SolverFlags::RATIONAL_MODEL);
        match (rational, tangential) {
            (false, false) => DistortionKind::Radial,
            (false, true) => DistortionKind::RadialTangential,
            (true, false) => DistortionKind::Rational,
            (true, true) => DistortionKind::RationalTangential,
        }
    }

    pub fn coefficient_count(self) -> usize {
        match self {
            DistortionKind::Radial => 3,
            DistortionKind::RadialTangential => 5,
            DistortionKind::Rational => 6,
            DistortionKind::RationalTangential => 8,
        }
    }

    #[inline]
    pub fn has_tangential(self) -> bool {
        matches!(
            self,
            DistortionKind::RadialTangential | DistortionKind::RationalTangential
        )
    }

    #[inline]
    pub fn is_rational(self) -> bool {
        matches!(
            self,
            DistortionKind::Rational | DistortionKind::RationalTangential
        )
    }
}

/// Distortion coefficients.
///
/// Terms that the preset does not estimate are kept at zero, so
/// [`Distortion::distort_normalized`] is valid for every preset.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct Distortion {
    pub kind: DistortionKind,
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    #[serde(default)]
    pub k4: f64,
    #[serde(default)]
    pub k5: f64,
    #[serde(default)]
    pub k6: f64,
    #[serde(default)]
    pub p1: f64,
    #[serde(default)]
    pub p2: f64,
}

impl Distortion {
    /// All-zero coefficients for the preset.
    pub fn zero(kind: DistortionKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Build from the conventional coefficient vector of `kind`.
    ///
    /// Returns `None` when the slice length does not match the preset.
    pub fn from_coefficients(kind: DistortionKind, c: &[f64]) -> Option<Self> {
        if c.len() != kind.coefficient_count() {
            return None;
        }
        let mut d = Self::zero(kind);
        match kind {
            DistortionKind::Radial => {
                d.k1 = c[0];
                d.k2 = c[1];
                d.k3 = c[2];
            }
            DistortionKind::RadialTangential => {
                d.k1 = c[0];
                d.k2 = c[1];
                d.p1 = c[2];
                d.p2 = c[3];
                d.k3 = c[4];
            }
            DistortionKind::Rational => {
                d.k1 = c[0];
                d.k2 = c[1];
                d.k3 = c[2];
                d.k4 = c[3];
                d.k5 = c[4];
                d.k6 = c[5];
            }
            DistortionKind::RationalTangential => {
                d.k1 = c[0];
                d.k2 = c[1];
                d.p1 = c[2];
                d.p2 = c[3];
                d.k3 = c[4];
                d.k4 = c[5];
                d.k5 = c[6];
                d.k6 = c[7];
            }
        }
        Some(d)
    }

    /// Conventional coefficient vector; its length depends on the preset.
    pub fn coefficients(&self) -> Vec<f64> {
        match self.kind {
            DistortionKind::Radial => vec![self.k1, self.k2, self.k3],
            DistortionKind::RadialTangential => vec![self.k1, self.k2, self.p1, self.p2, self.k3],
            DistortionKind::Rational => {
                vec![self.k1, self.k2, self.k3, self.k4, self.k5, self.k6]
            }
            DistortionKind::RationalTangential => vec![
                self.k1, self.k2, self.p1, self.p2, self.k3, self.k4, self.k5, self.k6,
            ],
        }
    }

    pub fn is_finite(&self) -> bool {
        [
            self.k1, self.k2, self.k3, self.k4, self.k5, self.k6, self.p1, self.p2,
        ]
        .iter()
        .all(|v| v.is_finite())
    }

    /// Apply distortion to normalized (`z = 1`) camera coordinates.
    #[inline]
    pub fn distort_normalized(&self, xy: [f64; 2]) -> [f64; 2] {
        let [x, y] = xy;
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let mut radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;
        if self.kind.is_rational() {
            radial /= 1.0 + self.k4 * r2 + self.k5 * r4 + self.k6 * r6;
        }
        let xy2 = 2.0 * x * y;
        let x_tan = self.p1 * xy2 + self.p2 * (r2 + 2.0 * x * x);
        let y_tan = self.p1 * (r2 + 2.0 * y * y) + self.p2 * xy2;
        [x * radial + x_tan, y * radial + y_tan]
    }

    /// Invert [`Distortion::distort_normalized`] by fixed-point iteration.
    ///
    /// Returns `None` if the iteration leaves the finite domain.
    pub fn undistort_normalized(&self, distorted: [f64; 2], max_iters: usize) -> Option<[f64; 2]> {
        let [xd, yd] = distorted;
        let mut x = xd;
        let mut y = yd;
        for _ in 0..max_iters {
            let r2 = x * x + y * y;
            let r4 = r2 * r2;
            let r6 = r4 * r2;
            let mut inv_radial = 1.0 + self.k4 * r2 + self.k5 * r4 + self.k6 * r6;
            let num = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;
            if !self.kind.is_rational() {
                inv_radial = 1.0;
            }
            if num.abs() < 1e-12 {
                return None;
            }
            let inv = inv_radial / num;
            let xy2 = 2.0 * x * y;
            let dx = self.p1 * xy2 + self.p2 * (r2 + 2.0 * x * x);
            let dy = self.p1 * (r2 + 2.0 * y * y) + self.p2 * xy2;
            let nx = (xd - dx) * inv;
            let ny = (yd - dy) * inv;
            if !nx.is_finite() || !ny.is_finite() {
                return None;
            }
            let step = (nx - x).abs() + (ny - y).abs();
            x = nx;
            y = ny;
            if step < 1e-14 {
                break;
            }
        }
        Some([x, y])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn coefficient_count_follows_flags() {
        let cases = [
            (SolverFlags::empty(), 5),
            (SolverFlags::ZERO_TANGENT_DIST, 3),
            (SolverFlags::RATIONAL_MODEL, 8),
            (SolverFlags::RATIONAL_MODEL | SolverFlags::ZERO_TANGENT_DIST, 6),
        ];
        for (flags, n) in cases {
            let kind = DistortionKind::from_flags(flags);
            assert_eq!(kind.coefficient_count(), n);
            assert_eq!(Distortion::zero(kind).coefficients().len(), n);
        }
    }

    #[test]
    fn coefficients_use_conventional_order() {
        let c = [0.1, -0.2, 0.001, -0.002, 0.05];
        let d = Distortion::from_coefficients(DistortionKind::RadialTangential, &c).unwrap();
        assert_eq!(d.p1, 0.001);
        assert_eq!(d.k3, 0.05);
        assert_eq!(d.coefficients(), c.to_vec());
        assert!(Distortion::from_coefficients(DistortionKind::Rational, &c).is_none());
    }

    #[test]
    fn zero_distortion_is_identity() {
        let d = Distortion::zero(DistortionKind::RationalTangential);
        assert_eq!(d.distort_normalized([0.3, -0.2]), [0.3, -0.2]);
    }

    #[test]
    fn undistort_inverts_distort() {
        let d = Distortion {
            kind: DistortionKind::RationalTangential,
            k1: -0.25,
            k2: 0.08,
            k3: -0.01,
            k4: 0.02,
            k5: 0.0,
            k6: 0.0,
            p1: 0.0015,
            p2: -0.001,
        };
        let p = [0.21, -0.17];
        let q = d.distort_normalized(p);
        let back = d.undistort_normalized(q, 50).unwrap();
        assert_relative_eq!(back[0], p[0], epsilon = 1e-9);
        assert_relative_eq!(back[1], p[1], epsilon = 1e-9);
    }
}

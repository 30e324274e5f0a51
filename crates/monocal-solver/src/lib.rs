//! Default camera-model solver for planar calibration targets.
//!
//! [`ZhangSolver`] implements [`monocal_core::Solver`]: DLT homographies,
//! Zhang's closed-form intrinsics, pose decomposition and a dense
//! Levenberg-Marquardt refinement of intrinsics, distortion and poses.

mod lm;
mod pose;
mod problem;
mod solver;
mod zhang;

pub use lm::{LmBackend, NllsProblem, SolveOptions, SolveReport};
pub use pose::pose_from_homography;
pub use solver::{ZhangSolveError, ZhangSolver, ZhangSolverParams, MIN_VIEWS};
pub use zhang::intrinsics_from_homographies;

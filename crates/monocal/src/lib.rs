//! Monocular camera calibration and undistortion.
//!
//! This crate provides:
//! - the calibration state machine ([`Calibrator`]): collect chessboard views
//!   from images, solve for the intrinsic model, keep versioned results;
//! - [`UndistortionCache`], which rebuilds its remap table only when the
//!   model version or the output size changes;
//! - [`CalibrationSession`] bundling both;
//! - (feature `image`) default adapters for `chess-corners` and the `image`
//!   crate, and (feature `cli`) the `monocal` binary.
//!
//! ## Quickstart
//!
//! ```no_run
//! use monocal::detect::ChessCornerDetector;
//! use monocal::imaging::FsImageLoader;
//! use monocal::solver::ZhangSolver;
//! use monocal::core::PatternShape;
//! use monocal::{CalibrationSession, Calibrator};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let calibrator = Calibrator::new(
//!     ChessCornerDetector::default(),
//!     ZhangSolver::default(),
//!     FsImageLoader,
//! );
//! let mut session = CalibrationSession::new(calibrator);
//!
//! let paths = ["left01.png", "left02.png", "left03.png"];
//! let added = session.collect_from_images(paths, PatternShape::new(6, 9));
//! println!("{added} views");
//!
//! let size = session.calibrator.observed_image_size().ok_or("no image loaded")?;
//! let rms = session.solve(size)?;
//! println!("rms = {rms:.3}px");
//!
//! let img = FsImageLoader.load_color(std::path::Path::new("left01.png"))?;
//! let undistorted = session.undistort(&img, None)?;
//! undistorted.save("left01_undistorted.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `monocal::core`: types, store, distortion model, maps, capability traits.
//! - `monocal::chessboard`: ordered chessboard grids from ChESS corners.
//! - `monocal::solver`: Zhang + Levenberg-Marquardt camera solver.

pub use monocal_chessboard as chessboard;
pub use monocal_core as core;
pub use monocal_solver as solver;

mod calibrator;
mod error;
pub mod io;
mod resample;
mod session;
mod undistort;

#[cfg(feature = "image")]
pub mod detect;
#[cfg(feature = "image")]
pub mod imaging;

pub use calibrator::{CalibrationResult, Calibrator, CalibratorParams, CollectEvent};
pub use error::{CalibrateError, SolverOutputError, UndistortError};
pub use resample::BilinearResampler;
pub use session::CalibrationSession;
pub use undistort::UndistortionCache;

pub use monocal_core::{
    CalibrationOptions, ImagePoint, ImageSize, IntrinsicModel, PatternShape, SolverFlags,
    VersionedModel, ViewPose,
};

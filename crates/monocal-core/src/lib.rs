//! Core types and utilities for monocular camera calibration.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete corner detector, solver backend or image type;
//! those plug in through the capability traits in [`Detector`], [`Solver`],
//! [`MapBuilder`], [`Resampler`] and [`ImageLoader`].
//!
//! Contents:
//! - pattern geometry ([`PatternShape`], [`object_grid`]),
//! - append-only correspondence storage ([`CorrespondenceStore`]),
//! - the intrinsic model with named distortion presets ([`IntrinsicModel`],
//!   [`Distortion`], [`CalibrationOptions`], [`SolverFlags`]),
//! - dense undistortion maps and bilinear remapping ([`UndistortionMap`]),
//! - a DLT homography estimator and a stderr logger (`MONOCAL_LOG`).

mod capability;
mod distortion;
mod homography;
mod image;
mod logger;
mod model;
mod remap;
mod store;
mod types;

pub use capability::{
    Detector, ImageLoadError, ImageLoader, MapBuilder, Resampler, Solver, SolverOutput,
};
pub use distortion::{Distortion, DistortionKind};
pub use homography::{estimate_homography, Homography};
pub use image::{
    sample_bilinear, sample_bilinear_interleaved, sample_bilinear_u8, GrayImage, GrayImageView,
};
pub use model::{
    camera_matrix, CalibrationOptions, IntrinsicModel, SolverFlags, VersionedModel, ViewPose,
};
pub use remap::{
    build_undistort_map, remap_gray, remap_interleaved, BrownConradyMapBuilder, UndistortionMap,
};
pub use store::{CorrespondenceStore, StoreError, ViewCorrespondence};
pub use types::{object_grid, ImagePoint, ImageSize, ObjectPoint, PatternShape};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, level_from_env, LOG_ENV};

//! Boundaries to the collaborators a calibration pipeline consumes.
//!
//! Each trait is a narrow capability: corner detection, the camera-model
//! solve, undistortion map construction, remapping and image loading.
//! Default implementations live in the sibling crates; tests plug in doubles.

use std::path::{Path, PathBuf};

use nalgebra::{Matrix3, Vector3};

use crate::{
    Distortion, GrayImage, GrayImageView, ImagePoint, ImageSize, PatternShape, SolverFlags,
    UndistortionMap, ViewCorrespondence,
};

/// Finds the ordered feature points of a pattern in a grayscale image.
pub trait Detector {
    /// Row-major feature points, or `None` when the pattern was not found.
    ///
    /// Callers treat any result whose length differs from
    /// `shape.point_count()` as a miss.
    fn detect(&self, image: &GrayImageView<'_>, shape: PatternShape) -> Option<Vec<ImagePoint>>;
}

/// Output of a camera-model solve.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverOutput {
    pub camera_matrix: Matrix3<f64>,
    pub distortion: Distortion,
    /// Axis-angle rotation per view, in input order.
    pub rotations: Vec<Vector3<f64>>,
    /// Translation per view, in input order.
    pub translations: Vec<Vector3<f64>>,
    /// RMS reprojection error in pixels over all points.
    pub rms_error: f64,
    /// RMS reprojection error per view, when the solver reports it.
    pub per_view_rms: Option<Vec<f64>>,
}

/// Estimates intrinsics, distortion and per-view poses from correspondences.
pub trait Solver {
    type Error: std::error::Error + Send + Sync + 'static;

    fn solve(
        &self,
        views: &[ViewCorrespondence],
        image_size: ImageSize,
        flags: SolverFlags,
    ) -> Result<SolverOutput, Self::Error>;
}

/// Builds a dense undistortion map for a camera model.
pub trait MapBuilder {
    fn build(
        &self,
        camera_matrix: &Matrix3<f64>,
        distortion: &Distortion,
        output_size: ImageSize,
    ) -> UndistortionMap;
}

/// Resamples an image through a map with linear interpolation.
pub trait Resampler<I> {
    fn resample(&self, image: &I, map: &UndistortionMap) -> I;
}

/// Failure to read or decode one image.
#[derive(thiserror::Error, Debug)]
#[error("failed to load image {path}: {reason}")]
pub struct ImageLoadError {
    pub path: PathBuf,
    pub reason: String,
}

impl ImageLoadError {
    pub fn new(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Loads calibration images as grayscale.
pub trait ImageLoader {
    fn load_gray(&self, path: &Path) -> Result<GrayImage, ImageLoadError>;
}

impl<T: Detector + ?Sized> Detector for &T {
    fn detect(&self, image: &GrayImageView<'_>, shape: PatternShape) -> Option<Vec<ImagePoint>> {
        (**self).detect(image, shape)
    }
}

impl<T: ImageLoader + ?Sized> ImageLoader for &T {
    fn load_gray(&self, path: &Path) -> Result<GrayImage, ImageLoadError> {
        (**self).load_gray(path)
    }
}

impl<T: MapBuilder + ?Sized> MapBuilder for &T {
    fn build(
        &self,
        camera_matrix: &Matrix3<f64>,
        distortion: &Distortion,
        output_size: ImageSize,
    ) -> UndistortionMap {
        (**self).build(camera_matrix, distortion, output_size)
    }
}

impl<I, T: Resampler<I> + ?Sized> Resampler<I> for &T {
    fn resample(&self, image: &I, map: &UndistortionMap) -> I {
        (**self).resample(image, map)
    }
}

impl<T: Solver + ?Sized> Solver for &T {
    type Error = T::Error;

    fn solve(
        &self,
        views: &[ViewCorrespondence],
        image_size: ImageSize,
        flags: SolverFlags,
    ) -> Result<SolverOutput, Self::Error> {
        (**self).solve(views, image_size, flags)
    }
}

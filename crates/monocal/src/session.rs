use std::path::Path;

use monocal_core::{
    BrownConradyMapBuilder, CalibrationOptions, Detector, ImageLoader, ImageSize, IntrinsicModel,
    MapBuilder, PatternShape, Resampler, Solver,
};

use crate::calibrator::{Calibrator, CollectEvent};
use crate::error::{CalibrateError, UndistortError};
use crate::resample::BilinearResampler;
use crate::undistort::UndistortionCache;

/// A calibrator and its undistortion cache, owned together by the caller.
///
/// For shared use wrap the whole session in one `Mutex`; the model version
/// read by [`CalibrationSession::undistort`] is then always current.
pub struct CalibrationSession<D, S, L, B = BrownConradyMapBuilder, R = BilinearResampler> {
    pub calibrator: Calibrator<D, S, L>,
    pub cache: UndistortionCache<B, R>,
}

impl<D, S, L> CalibrationSession<D, S, L> {
    pub fn new(calibrator: Calibrator<D, S, L>) -> Self {
        Self {
            calibrator,
            cache: UndistortionCache::default(),
        }
    }
}

impl<D, S, L, B, R> CalibrationSession<D, S, L, B, R> {
    pub fn with_cache(calibrator: Calibrator<D, S, L>, cache: UndistortionCache<B, R>) -> Self {
        Self { calibrator, cache }
    }

    pub fn set_options(&mut self, options: CalibrationOptions) {
        self.calibrator.set_options(options);
    }

    pub fn current_model(&self) -> Option<&IntrinsicModel> {
        self.calibrator.current_model()
    }
}

impl<D: Detector, S, L: ImageLoader, B, R> CalibrationSession<D, S, L, B, R> {
    pub fn collect_from_images<P, I>(&mut self, paths: I, shape: PatternShape) -> usize
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = P>,
    {
        self.calibrator.collect_from_images(paths, shape)
    }

    pub fn collect_from_images_with<P, I, F>(
        &mut self,
        paths: I,
        shape: PatternShape,
        observer: F,
    ) -> usize
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = P>,
        F: FnMut(CollectEvent<'_>),
    {
        self.calibrator.collect_from_images_with(paths, shape, observer)
    }
}

impl<D, S: Solver, L, B, R> CalibrationSession<D, S, L, B, R> {
    pub fn solve(&mut self, image_size: ImageSize) -> Result<f64, CalibrateError> {
        self.calibrator.solve(image_size)
    }
}

impl<D, S, L, B: MapBuilder, R> CalibrationSession<D, S, L, B, R> {
    /// Undistort with the calibrator's current model.
    pub fn undistort<I>(
        &mut self,
        image: &I,
        output_size: Option<ImageSize>,
    ) -> Result<I, UndistortError>
    where
        R: Resampler<I>,
    {
        self.cache
            .undistort(self.calibrator.versioned_model(), image, output_size)
    }
}

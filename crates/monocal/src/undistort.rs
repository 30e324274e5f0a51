//! Lazily built undistortion map keyed on the model version.

use log::debug;
use monocal_core::{
    BrownConradyMapBuilder, ImageSize, MapBuilder, Resampler, UndistortionMap, VersionedModel,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::error::UndistortError;
use crate::resample::BilinearResampler;

struct CachedMap {
    version: u64,
    map: UndistortionMap,
}

/// Undistorts images with a map that is rebuilt only when the model version
/// or the requested output size changes.
pub struct UndistortionCache<B = BrownConradyMapBuilder, R = BilinearResampler> {
    builder: B,
    resampler: R,
    cached: Option<CachedMap>,
}

impl Default for UndistortionCache {
    fn default() -> Self {
        Self::new(BrownConradyMapBuilder, BilinearResampler)
    }
}

impl<B, R> UndistortionCache<B, R> {
    pub fn new(builder: B, resampler: R) -> Self {
        Self {
            builder,
            resampler,
            cached: None,
        }
    }

    /// Whether the cached map belongs to `model` at `size`.
    pub fn is_fresh(&self, model: &VersionedModel, size: ImageSize) -> bool {
        self.cached
            .as_ref()
            .is_some_and(|c| c.version == model.version && c.map.size() == size)
    }

    /// Drop the cached map; the next request rebuilds it.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    pub fn map(&self) -> Option<&UndistortionMap> {
        self.cached.as_ref().map(|c| &c.map)
    }

    /// Version of the model the cached map was built from.
    pub fn cached_version(&self) -> Option<u64> {
        self.cached.as_ref().map(|c| c.version)
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    pub fn resampler(&self) -> &R {
        &self.resampler
    }
}

impl<B: MapBuilder, R> UndistortionCache<B, R> {
    /// Map for `model` at `size`, built if the cache is stale.
    pub fn map_for(&mut self, model: &VersionedModel, size: ImageSize) -> &UndistortionMap {
        refresh(&mut self.cached, &self.builder, model, size)
    }

    /// Remove lens distortion from `image`.
    ///
    /// `output_size` defaults to the size the model was calibrated for.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    pub fn undistort<I>(
        &mut self,
        model: Option<&VersionedModel>,
        image: &I,
        output_size: Option<ImageSize>,
    ) -> Result<I, UndistortError>
    where
        R: Resampler<I>,
    {
        let model = model.ok_or(UndistortError::NoCalibration)?;
        let size = output_size.unwrap_or(model.model.image_size);
        let map = refresh(&mut self.cached, &self.builder, model, size);
        Ok(self.resampler.resample(image, map))
    }
}

fn refresh<'a, B: MapBuilder>(
    cached: &'a mut Option<CachedMap>,
    builder: &B,
    model: &VersionedModel,
    size: ImageSize,
) -> &'a UndistortionMap {
    let stale = cached
        .as_ref()
        .is_none_or(|c| c.version != model.version || c.map.size() != size);
    if stale {
        *cached = None;
    }
    let entry = cached.get_or_insert_with(|| {
        debug!(
            "building {}x{} undistortion map for model version {}",
            size.width, size.height, model.version
        );
        CachedMap {
            version: model.version,
            map: builder.build(&model.model.camera_matrix, &model.model.distortion, size),
        }
    });
    &entry.map
}

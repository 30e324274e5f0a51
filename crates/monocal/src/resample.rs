use monocal_core::{remap_gray, GrayImage, Resampler, UndistortionMap};

/// Bilinear remapping with a black constant border.
#[derive(Clone, Copy, Debug, Default)]
pub struct BilinearResampler;

impl Resampler<GrayImage> for BilinearResampler {
    fn resample(&self, image: &GrayImage, map: &UndistortionMap) -> GrayImage {
        remap_gray(&image.view(), map)
    }
}

//! `image` crate adapters: file loading and remapping of its buffer types.

use std::path::Path;

use image::{DynamicImage, ImageBuffer, ImageReader, Pixel};
use monocal_core::{
    remap_interleaved, GrayImage, GrayImageView, ImageLoadError, ImageLoader, Resampler,
    UndistortionMap,
};

use crate::resample::BilinearResampler;

/// Convert an `image::GrayImage` into the lightweight core view type.
pub fn gray_view(img: &image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

pub fn to_core_gray(img: &image::GrayImage) -> GrayImage {
    GrayImage {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw().clone(),
    }
}

/// `None` if the core buffer length does not match its dimensions.
pub fn from_core_gray(img: GrayImage) -> Option<image::GrayImage> {
    image::GrayImage::from_raw(img.width as u32, img.height as u32, img.data)
}

/// Reads images from the filesystem with the `image` crate decoders.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsImageLoader;

impl FsImageLoader {
    /// Decode an image without converting its color type.
    pub fn load_color(&self, path: &Path) -> Result<DynamicImage, ImageLoadError> {
        ImageReader::open(path)
            .map_err(|e| ImageLoadError::new(path, e))?
            .decode()
            .map_err(|e| ImageLoadError::new(path, e))
    }
}

impl ImageLoader for FsImageLoader {
    fn load_gray(&self, path: &Path) -> Result<GrayImage, ImageLoadError> {
        let img = self.load_color(path)?.to_luma8();
        Ok(to_core_gray(&img))
    }
}

fn remap_buffer<P>(img: &ImageBuffer<P, Vec<u8>>, map: &UndistortionMap) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let channels = P::CHANNEL_COUNT as usize;
    let size = map.size();
    let data = remap_interleaved(
        img.as_raw(),
        img.width() as usize,
        img.height() as usize,
        channels,
        map,
    );
    ImageBuffer::from_raw(size.width, size.height, data)
        .unwrap_or_else(|| ImageBuffer::new(size.width, size.height))
}

impl Resampler<image::GrayImage> for BilinearResampler {
    fn resample(&self, image: &image::GrayImage, map: &UndistortionMap) -> image::GrayImage {
        remap_buffer(image, map)
    }
}

impl Resampler<image::RgbImage> for BilinearResampler {
    fn resample(&self, image: &image::RgbImage, map: &UndistortionMap) -> image::RgbImage {
        remap_buffer(image, map)
    }
}

impl Resampler<image::RgbaImage> for BilinearResampler {
    fn resample(&self, image: &image::RgbaImage, map: &UndistortionMap) -> image::RgbaImage {
        remap_buffer(image, map)
    }
}

/// 8-bit layouts are remapped as they are; other color types go through RGBA8.
impl Resampler<DynamicImage> for BilinearResampler {
    fn resample(&self, image: &DynamicImage, map: &UndistortionMap) -> DynamicImage {
        match image {
            DynamicImage::ImageLuma8(img) => DynamicImage::ImageLuma8(remap_buffer(img, map)),
            DynamicImage::ImageLumaA8(img) => DynamicImage::ImageLumaA8(remap_buffer(img, map)),
            DynamicImage::ImageRgb8(img) => DynamicImage::ImageRgb8(remap_buffer(img, map)),
            DynamicImage::ImageRgba8(img) => DynamicImage::ImageRgba8(remap_buffer(img, map)),
            other => DynamicImage::ImageRgba8(remap_buffer(&other.to_rgba8(), map)),
        }
    }
}

//! Dense undistortion maps and bilinear remapping.

use nalgebra::Matrix3;

use crate::{
    sample_bilinear_interleaved, Distortion, GrayImage, GrayImageView, ImageSize, MapBuilder,
};

/// Per-pixel source coordinates for an output image.
///
/// For output pixel `(u, v)` the resampler reads the source at
/// `(map_x[v * w + u], map_y[v * w + u])`.
#[derive(Clone, Debug, PartialEq)]
pub struct UndistortionMap {
    size: ImageSize,
    map_x: Vec<f32>,
    map_y: Vec<f32>,
}

impl UndistortionMap {
    /// Assemble a map; `None` if either table does not have `size` entries.
    pub fn from_parts(size: ImageSize, map_x: Vec<f32>, map_y: Vec<f32>) -> Option<Self> {
        let n = size.pixel_count();
        (map_x.len() == n && map_y.len() == n).then_some(Self { size, map_x, map_y })
    }

    /// Map that samples every output pixel at the same source pixel.
    pub fn identity(size: ImageSize) -> Self {
        let w = size.width as usize;
        let n = size.pixel_count();
        let mut map_x = Vec::with_capacity(n);
        let mut map_y = Vec::with_capacity(n);
        for k in 0..n {
            map_x.push((k % w) as f32);
            map_y.push((k / w) as f32);
        }
        Self { size, map_x, map_y }
    }

    #[inline]
    pub fn size(&self) -> ImageSize {
        self.size
    }

    pub fn map_x(&self) -> &[f32] {
        &self.map_x
    }

    pub fn map_y(&self) -> &[f32] {
        &self.map_y
    }

    /// Source position for output pixel `(u, v)`.
    #[inline]
    pub fn get(&self, u: u32, v: u32) -> Option<(f32, f32)> {
        if u >= self.size.width || v >= self.size.height {
            return None;
        }
        let k = v as usize * self.size.width as usize + u as usize;
        Some((self.map_x[k], self.map_y[k]))
    }
}

/// Build the undistortion map for `camera_matrix` / `distortion`.
///
/// The output keeps the input camera matrix: each output pixel is normalized
/// with K, pushed through the distortion model and projected back with K.
pub fn build_undistort_map(
    camera_matrix: &Matrix3<f64>,
    distortion: &Distortion,
    output_size: ImageSize,
) -> UndistortionMap {
    let fx = camera_matrix[(0, 0)];
    let fy = camera_matrix[(1, 1)];
    let skew = camera_matrix[(0, 1)];
    let cx = camera_matrix[(0, 2)];
    let cy = camera_matrix[(1, 2)];

    let n = output_size.pixel_count();
    let mut map_x = Vec::with_capacity(n);
    let mut map_y = Vec::with_capacity(n);

    for v in 0..output_size.height {
        let y = (v as f64 - cy) / fy;
        for u in 0..output_size.width {
            let x = (u as f64 - cx - skew * y) / fx;
            let [xd, yd] = distortion.distort_normalized([x, y]);
            map_x.push((fx * xd + skew * yd + cx) as f32);
            map_y.push((fy * yd + cy) as f32);
        }
    }

    UndistortionMap {
        size: output_size,
        map_x,
        map_y,
    }
}

/// [`MapBuilder`] for the Brown-Conrady / rational models.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrownConradyMapBuilder;

impl MapBuilder for BrownConradyMapBuilder {
    fn build(
        &self,
        camera_matrix: &Matrix3<f64>,
        distortion: &Distortion,
        output_size: ImageSize,
    ) -> UndistortionMap {
        build_undistort_map(camera_matrix, distortion, output_size)
    }
}

/// Remap an interleaved 8-bit buffer with bilinear interpolation.
///
/// The result has the map's size and the same channel count; samples that
/// fall outside the source are black.
pub fn remap_interleaved(
    data: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    map: &UndistortionMap,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(map.size.pixel_count() * channels);
    for (&sx, &sy) in map.map_x.iter().zip(&map.map_y) {
        for c in 0..channels {
            let v = sample_bilinear_interleaved(data, width, height, channels, c, sx, sy);
            out.push(v.round().clamp(0.0, 255.0) as u8);
        }
    }
    out
}

/// Grayscale convenience wrapper around [`remap_interleaved`].
pub fn remap_gray(src: &GrayImageView<'_>, map: &UndistortionMap) -> GrayImage {
    GrayImage {
        width: map.size.width as usize,
        height: map.size.height as usize,
        data: remap_interleaved(src.data, src.width, src.height, 1, map),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{camera_matrix, DistortionKind};
    use approx::assert_relative_eq;

    #[test]
    fn zero_distortion_builds_identity_map() {
        let k = camera_matrix(500.0, 500.0, 32.0, 24.0);
        let size = ImageSize::new(64, 48);
        let d = Distortion::zero(DistortionKind::RadialTangential);
        let map = build_undistort_map(&k, &d, size);
        let id = UndistortionMap::identity(size);
        assert_eq!(map.size(), size);
        for (a, b) in map.map_x().iter().zip(id.map_x()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-3);
        }
        for (a, b) in map.map_y().iter().zip(id.map_y()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-3);
        }
    }

    #[test]
    fn barrel_distortion_pulls_corners_inward() {
        let k = camera_matrix(300.0, 300.0, 160.0, 120.0);
        let d = Distortion {
            k1: -0.3,
            ..Distortion::zero(DistortionKind::RadialTangential)
        };
        let map = build_undistort_map(&k, &d, ImageSize::new(320, 240));

        // Principal point maps onto itself.
        let (px, py) = map.get(160, 120).unwrap();
        assert_relative_eq!(px, 160.0, epsilon = 1e-3);
        assert_relative_eq!(py, 120.0, epsilon = 1e-3);

        // The output corner samples a source point closer to the centre.
        let (sx, sy) = map.get(0, 0).unwrap();
        assert!(sx > 0.0 && sy > 0.0);
        assert!(map.get(320, 0).is_none());
    }

    #[test]
    fn identity_remap_copies_pixels() {
        let src = GrayImage::from_raw(3, 2, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let map = UndistortionMap::identity(ImageSize::new(3, 2));
        assert_eq!(remap_gray(&src.view(), &map), src);
    }

    #[test]
    fn remap_keeps_channel_layout() {
        let rgb = vec![10, 20, 30, 40, 50, 60];
        let map = UndistortionMap::identity(ImageSize::new(2, 1));
        assert_eq!(remap_interleaved(&rgb, 2, 1, 3, &map), rgb);

        // Half-pixel shift blends neighbours per channel.
        let shifted =
            UndistortionMap::from_parts(ImageSize::new(1, 1), vec![0.5], vec![0.0]).unwrap();
        assert_eq!(remap_interleaved(&rgb, 2, 1, 3, &shifted), vec![25, 35, 45]);
    }

    #[test]
    fn rational_pole_remaps_to_black() {
        // 1 - r^2 in the denominator vanishes on the unit circle, 20 px out.
        let k = camera_matrix(20.0, 20.0, 32.0, 24.0);
        let d = Distortion {
            k4: -1.0,
            ..Distortion::zero(DistortionKind::Rational)
        };
        let size = ImageSize::new(64, 48);
        let map = build_undistort_map(&k, &d, size);
        let (px, _) = map.get(52, 24).unwrap();
        assert!(!px.is_finite() || px.abs() > 1e6);

        let src = GrayImage::from_raw(64, 48, vec![200; 64 * 48]).unwrap();
        let out = remap_gray(&src.view(), &map);
        assert_eq!((out.width, out.height), (64, 48));
        assert_eq!(out.get(32, 24), Some(200));
        assert_eq!(out.get(52, 24), Some(0));
    }

    #[test]
    fn from_parts_checks_table_sizes() {
        let size = ImageSize::new(2, 2);
        assert!(UndistortionMap::from_parts(size, vec![0.0; 4], vec![0.0; 3]).is_none());
    }
}

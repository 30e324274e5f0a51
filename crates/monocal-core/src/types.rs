use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// Sub-pixel image coordinate produced by a corner detector.
pub type ImagePoint = Point2<f32>;

/// Point on the calibration target in its own reference frame.
///
/// Planar targets always have `z == 0`.
pub type ObjectPoint = Point3<f32>;

/// Shape of a planar pattern in *inner* corners.
///
/// `rows` counts corners along the vertical board axis, `cols` along the
/// horizontal one. A detection for this shape carries exactly `rows * cols`
/// points in row-major order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternShape {
    pub rows: u32,
    pub cols: u32,
}

impl PatternShape {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }

    /// Number of feature points per view.
    #[inline]
    pub fn point_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    /// A grid needs at least 2×2 corners to constrain anything.
    pub fn is_valid(&self) -> bool {
        self.rows >= 2 && self.cols >= 2
    }
}

/// Image resolution in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Object points of a planar grid, row-major, `(X, Y, 0)` with
/// `X = col * square_size`, `Y = row * square_size`.
pub fn object_grid(shape: PatternShape, square_size: f32) -> Vec<ObjectPoint> {
    let mut pts = Vec::with_capacity(shape.point_count());
    for y in 0..shape.rows {
        for x in 0..shape.cols {
            pts.push(ObjectPoint::new(
                x as f32 * square_size,
                y as f32 * square_size,
                0.0,
            ));
        }
    }
    pts
}

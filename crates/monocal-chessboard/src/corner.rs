use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// A ChESS-style X-junction.
///
/// `orientation` is the direction (radians, modulo π) of the diagonal through
/// the bright squares; adjacent grid corners have orthogonal orientations.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct Corner {
    pub position: Point2<f32>,
    pub orientation: f32,
    pub strength: f32,
}

impl Corner {
    pub fn new(x: f32, y: f32, orientation: f32, strength: f32) -> Self {
        Self {
            position: Point2::new(x, y),
            orientation,
            strength,
        }
    }
}

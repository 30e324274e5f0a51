//! ChESS corner detection wired to the chessboard grid detector.

use chess_corners::{find_chess_corners_image, ChessConfig, CornerDescriptor};
use monocal_chessboard::{ChessboardDetector, ChessboardParams, Corner};
use monocal_core::{Detector, GrayImageView, ImagePoint, PatternShape};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Reasonable default settings for the `chess-corners` ChESS detector.
pub fn default_chess_config() -> ChessConfig {
    let mut cfg = ChessConfig::single_scale();
    cfg.params.threshold_rel = 0.2;
    cfg.params.nms_radius = 2;
    cfg
}

fn adapt_chess_corner(c: &CornerDescriptor) -> Corner {
    Corner::new(c.x, c.y, c.orientation, c.response)
}

/// Detect ChESS corners with `chess-corners`.
pub fn detect_corners(img: &image::GrayImage, cfg: &ChessConfig) -> Vec<Corner> {
    find_chess_corners_image(img, cfg)
        .iter()
        .map(adapt_chess_corner)
        .collect()
}

/// [`Detector`] running `chess-corners` and then [`ChessboardDetector`].
pub struct ChessCornerDetector {
    pub chess: ChessConfig,
    pub board: ChessboardDetector,
}

impl Default for ChessCornerDetector {
    fn default() -> Self {
        Self::new(ChessboardParams::default())
    }
}

impl ChessCornerDetector {
    pub fn new(params: ChessboardParams) -> Self {
        Self {
            chess: default_chess_config(),
            board: ChessboardDetector::new(params),
        }
    }
}

impl Detector for ChessCornerDetector {
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "debug",
            skip(self, image),
            fields(width = image.width, height = image.height)
        )
    )]
    fn detect(&self, image: &GrayImageView<'_>, shape: PatternShape) -> Option<Vec<ImagePoint>> {
        let img = image::GrayImage::from_raw(
            image.width as u32,
            image.height as u32,
            image.data.to_vec(),
        )?;
        let corners = detect_corners(&img, &self.chess);
        log::debug!("{} ChESS corners", corners.len());
        self.board
            .detect_from_corners(&corners, shape)
            .map(|det| det.corners)
    }
}

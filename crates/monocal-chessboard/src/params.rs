use serde::{Deserialize, Serialize};

/// Neighbor search settings for the grid graph.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GridGraphParams {
    pub min_spacing_pix: f32,
    pub max_spacing_pix: f32,
    /// Candidates examined per corner in the KD-tree query (self included).
    pub k_neighbors: usize,
    pub orientation_tolerance_deg: f32,
}

impl Default for GridGraphParams {
    fn default() -> Self {
        Self {
            min_spacing_pix: 5.0,
            max_spacing_pix: 200.0,
            k_neighbors: 9,
            orientation_tolerance_deg: 22.5,
        }
    }
}

/// Parameters of the chessboard detector.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ChessboardParams {
    /// Minimal corner strength to consider.
    pub min_strength: f32,

    /// Derive the spacing window from the median nearest-neighbor distance
    /// instead of using `graph.min_spacing_pix` / `graph.max_spacing_pix`
    /// verbatim.
    pub adaptive_spacing: bool,

    /// Spacing window around the median distance, as `(low, high)` factors.
    pub spacing_window: (f32, f32),

    pub graph: GridGraphParams,
}

impl Default for ChessboardParams {
    fn default() -> Self {
        Self {
            min_strength: 0.0,
            adaptive_spacing: true,
            spacing_window: (0.6, 1.6),
            graph: GridGraphParams::default(),
        }
    }
}

//! Chessboard grid recovery from ChESS corners.
//!
//! Pipeline:
//! 1. Filter corners by strength.
//! 2. Estimate the grid spacing from nearest-neighbor distances.
//! 3. For each corner, keep up to 4 neighbors (right/left/up/down) whose
//!    distance fits the spacing window and whose edge runs at ~45° to both
//!    corner diagonals.
//! 4. BFS each connected component and assign integer coordinates `(i, j)`.
//! 5. Accept the unique fully populated `rows x cols` window (up to a 90°
//!    rotation) and emit its corners row-major.

mod corner;
mod detector;
mod geom;
mod gridgraph;
mod params;

pub use corner::Corner;
pub use detector::{ChessboardDetection, ChessboardDetector};
pub use gridgraph::{GridGraph, NeighborDirection, NodeNeighbor};
pub use params::{ChessboardParams, GridGraphParams};

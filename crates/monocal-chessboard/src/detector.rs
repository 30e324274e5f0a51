use std::collections::HashMap;

use log::debug;
use monocal_core::{ImagePoint, PatternShape};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::gridgraph::{
    assign_grid_coordinates, connected_components, median_nearest_distance, GridGraph,
};
use crate::params::ChessboardParams;
use crate::Corner;

/// Ordered inner corners of one chessboard.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ChessboardDetection {
    /// Row-major corners, `shape.rows * shape.cols` entries.
    pub corners: Vec<ImagePoint>,
    /// The board rows run along the image x axis.
    pub transposed: bool,
}

/// Window of the grid that holds the full board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Placement {
    i0: i32,
    j0: i32,
    transposed: bool,
}

/// Chessboard detector over a cloud of ChESS corners.
#[derive(Clone, Debug, Default)]
pub struct ChessboardDetector {
    pub params: ChessboardParams,
}

impl ChessboardDetector {
    pub fn new(params: ChessboardParams) -> Self {
        Self { params }
    }

    /// Find the `shape.rows x shape.cols` inner-corner grid among `corners`.
    ///
    /// Returns `None` when no component holds a fully populated window of the
    /// requested shape, or when more than one window qualifies.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, corners), fields(num_corners = corners.len()))
    )]
    pub fn detect_from_corners(
        &self,
        corners: &[Corner],
        shape: PatternShape,
    ) -> Option<ChessboardDetection> {
        if !shape.is_valid() {
            return None;
        }

        let strong: Vec<Corner> = corners
            .iter()
            .copied()
            .filter(|c| c.strength >= self.params.min_strength)
            .collect();
        debug!(
            "{} of {} corners pass the strength filter",
            strong.len(),
            corners.len()
        );
        if strong.len() < shape.point_count() {
            return None;
        }

        let mut graph_params = self.params.graph.clone();
        if self.params.adaptive_spacing {
            let spacing = median_nearest_distance(&strong)?;
            let (lo, hi) = self.params.spacing_window;
            graph_params.min_spacing_pix = lo * spacing;
            graph_params.max_spacing_pix = hi * spacing;
            debug!("median corner spacing {spacing:.2}px");
        }

        let graph = GridGraph::new(&strong, &graph_params);
        let mut components = connected_components(&graph);
        components.retain(|c| c.len() >= shape.point_count());
        components.sort_by_key(|c| std::cmp::Reverse(c.len()));

        let mut found: Option<ChessboardDetection> = None;
        for component in &components {
            let Some(coords) = assign_grid_coordinates(&graph, component) else {
                debug!("component of {} corners has inconsistent edges", component.len());
                continue;
            };
            let cells: HashMap<(i32, i32), usize> =
                coords.iter().map(|&(node, i, j)| ((i, j), node)).collect();

            let placements = full_placements(&cells, shape);
            match placements.as_slice() {
                [] => continue,
                [placement] => {
                    if found.is_some() {
                        debug!("several components hold the board; ambiguous");
                        return None;
                    }
                    found = Some(collect_corners(&strong, &cells, shape, *placement));
                }
                _ => {
                    debug!("{} windows fit the board; ambiguous", placements.len());
                    return None;
                }
            }
        }

        found
    }
}

/// All windows of `shape` (either orientation) whose cells are all occupied.
fn full_placements(cells: &HashMap<(i32, i32), usize>, shape: PatternShape) -> Vec<Placement> {
    let (mut i_min, mut i_max, mut j_min, mut j_max) = (i32::MAX, i32::MIN, i32::MAX, i32::MIN);
    for &(i, j) in cells.keys() {
        i_min = i_min.min(i);
        i_max = i_max.max(i);
        j_min = j_min.min(j);
        j_max = j_max.max(j);
    }

    let rows = shape.rows as i32;
    let cols = shape.cols as i32;
    let mut orientations = vec![(cols, rows, false)];
    if rows != cols {
        orientations.push((rows, cols, true));
    }

    let mut out = Vec::new();
    for (w, h, transposed) in orientations {
        for j0 in j_min..=(j_max - h + 1) {
            for i0 in i_min..=(i_max - w + 1) {
                let full = (0..h)
                    .all(|dj| (0..w).all(|di| cells.contains_key(&(i0 + di, j0 + dj))));
                if full {
                    out.push(Placement { i0, j0, transposed });
                }
            }
        }
    }
    out
}

/// Row-major corners for a placement.
///
/// A transposed board is read as a 90° rotation (never a mirror) so that the
/// planar object frame keeps its handedness.
fn collect_corners(
    corners: &[Corner],
    cells: &HashMap<(i32, i32), usize>,
    shape: PatternShape,
    placement: Placement,
) -> ChessboardDetection {
    let rows = shape.rows as i32;
    let cols = shape.cols as i32;
    let mut out = Vec::with_capacity(shape.point_count());
    for r in 0..rows {
        for c in 0..cols {
            let cell = if placement.transposed {
                (placement.i0 + r, placement.j0 + (cols - 1 - c))
            } else {
                (placement.i0 + c, placement.j0 + r)
            };
            let node = cells[&cell];
            out.push(corners[node].position);
        }
    }
    ChessboardDetection {
        corners: out,
        transposed: placement.transposed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_4;

    fn board(cols: usize, rows: usize, spacing: f32, origin: (f32, f32)) -> Vec<Corner> {
        let mut corners = Vec::new();
        for j in 0..rows {
            for i in 0..cols {
                let orientation = if (i + j) % 2 == 0 {
                    FRAC_PI_4
                } else {
                    3.0 * FRAC_PI_4
                };
                corners.push(Corner::new(
                    origin.0 + i as f32 * spacing,
                    origin.1 + j as f32 * spacing,
                    orientation,
                    1.0,
                ));
            }
        }
        corners
    }

    #[test]
    fn orders_shuffled_corners_row_major() {
        let mut corners = board(4, 3, 20.0, (50.0, 40.0));
        corners.reverse();
        corners.swap(2, 7);

        let det = ChessboardDetector::default()
            .detect_from_corners(&corners, PatternShape::new(3, 4))
            .expect("board found");
        assert!(!det.transposed);
        assert_eq!(det.corners.len(), 12);
        for (k, p) in det.corners.iter().enumerate() {
            assert_relative_eq!(p.x, 50.0 + (k % 4) as f32 * 20.0);
            assert_relative_eq!(p.y, 40.0 + (k / 4) as f32 * 20.0);
        }
    }

    #[test]
    fn transposed_board_is_read_as_rotation() {
        // Image shows 3 columns by 4 rows while the board is 3 rows x 4 cols.
        let corners = board(3, 4, 15.0, (0.0, 0.0));
        let det = ChessboardDetector::default()
            .detect_from_corners(&corners, PatternShape::new(3, 4))
            .expect("board found");
        assert!(det.transposed);
        // First row runs from the bottom to the top of image column 0.
        assert_relative_eq!(det.corners[0].x, 0.0);
        assert_relative_eq!(det.corners[0].y, 45.0);
        assert_relative_eq!(det.corners[3].y, 0.0);
        assert_relative_eq!(det.corners[4].x, 15.0);
    }

    #[test]
    fn wrong_shape_is_rejected() {
        let corners = board(4, 3, 20.0, (0.0, 0.0));
        let det = ChessboardDetector::default();
        assert!(det
            .detect_from_corners(&corners, PatternShape::new(5, 5))
            .is_none());
        assert!(det
            .detect_from_corners(&corners[..11], PatternShape::new(3, 4))
            .is_none());
    }

    #[test]
    fn larger_grid_is_ambiguous() {
        let corners = board(6, 5, 20.0, (0.0, 0.0));
        assert!(ChessboardDetector::default()
            .detect_from_corners(&corners, PatternShape::new(3, 4))
            .is_none());
    }

    #[test]
    fn weak_corners_are_filtered() {
        let mut corners = board(4, 3, 20.0, (0.0, 0.0));
        corners[5].strength = 0.1;
        let params = ChessboardParams {
            min_strength: 0.5,
            ..Default::default()
        };
        assert!(ChessboardDetector::new(params)
            .detect_from_corners(&corners, PatternShape::new(3, 4))
            .is_none());
    }

    #[test]
    fn isolated_clutter_does_not_break_detection() {
        let mut corners = board(4, 3, 20.0, (100.0, 100.0));
        corners.push(Corner::new(10.0, 10.0, FRAC_PI_4, 1.0));
        corners.push(Corner::new(400.0, 30.0, 0.0, 1.0));

        let det = ChessboardDetector::default()
            .detect_from_corners(&corners, PatternShape::new(3, 4))
            .expect("board found");
        assert_relative_eq!(det.corners[0].x, 100.0);
        assert_relative_eq!(det.corners[11].y, 140.0);
    }
}

//! Neighbour graph over ChESS corners and its integer grid labelling.

use std::collections::{HashMap, VecDeque};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Vector2;

use crate::geom::{angle_diff_abs, axis_vec_diff, is_orthogonal};
use crate::params::GridGraphParams;
use crate::Corner;

/// Image-axis direction of a grid edge (y grows downwards).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NeighborDirection {
    Right = 0,
    Left = 1,
    Up = 2,
    Down = 3,
}

impl NeighborDirection {
    /// Dominant image axis of `offset`; ties go to the vertical axis.
    pub fn from_offset(offset: &Vector2<f32>) -> Self {
        match (offset.x.abs() > offset.y.abs(), offset.x >= 0.0, offset.y >= 0.0) {
            (true, true, _) => NeighborDirection::Right,
            (true, false, _) => NeighborDirection::Left,
            (false, _, true) => NeighborDirection::Down,
            (false, _, false) => NeighborDirection::Up,
        }
    }

    /// Grid step `(di, dj)` taken when following this edge.
    pub fn step(self) -> (i32, i32) {
        match self {
            NeighborDirection::Right => (1, 0),
            NeighborDirection::Left => (-1, 0),
            NeighborDirection::Up => (0, -1),
            NeighborDirection::Down => (0, 1),
        }
    }
}

/// Accepted edge from one corner to another.
#[derive(Clone, Debug)]
pub struct NodeNeighbor {
    pub direction: NeighborDirection,
    pub index: usize,
    pub distance: f32,
    /// Sum of angular misfits in radians; lower is better.
    pub score: f32,
}

impl NodeNeighbor {
    fn beats(&self, other: &NodeNeighbor) -> bool {
        match self.score.total_cmp(&other.score) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Equal => self.distance < other.distance,
            std::cmp::Ordering::Greater => false,
        }
    }
}

/// kd-tree over corner positions; item ids are corner indices.
struct CornerIndex {
    points: Vec<[f32; 2]>,
    tree: KdTree<f32, 2>,
}

impl CornerIndex {
    fn build(corners: &[Corner]) -> Self {
        let points: Vec<[f32; 2]> = corners
            .iter()
            .map(|c| [c.position.x, c.position.y])
            .collect();
        let tree = KdTree::from(&points);
        Self { points, tree }
    }

    /// Up to `k` other corners nearest to corner `i`, closest first.
    fn others_near(&self, i: usize, k: usize) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.tree
            .nearest_n::<SquaredEuclidean>(&self.points[i], k + 1)
            .into_iter()
            .map(|nn| (nn.item as usize, nn.distance.sqrt()))
            .filter(move |&(j, _)| j != i)
            .take(k)
    }
}

/// Score the edge `corner -> other`, or `None` if it cannot be a grid edge.
fn grid_edge(
    corner: &Corner,
    other: &Corner,
    other_index: usize,
    params: &GridGraphParams,
) -> Option<NodeNeighbor> {
    let tol = params.orientation_tolerance_deg.to_radians();

    // Adjacent chessboard corners have swapped dark/light diagonals.
    if !is_orthogonal(corner.orientation, other.orientation, tol) {
        return None;
    }

    let offset = other.position - corner.position;
    let distance = offset.norm();
    if !(params.min_spacing_pix..=params.max_spacing_pix).contains(&distance) {
        return None;
    }

    // The edge bisects both corners' diagonals.
    let heading = offset.y.atan2(offset.x);
    let misfit_here = (axis_vec_diff(corner.orientation, heading) - FRAC_PI_4).abs();
    let misfit_there = (axis_vec_diff(other.orientation, heading) - FRAC_PI_4).abs();
    if misfit_here.max(misfit_there) > tol {
        return None;
    }
    let misfit_pair = (FRAC_PI_2 - angle_diff_abs(corner.orientation, other.orientation)).abs();

    Some(NodeNeighbor {
        direction: NeighborDirection::from_offset(&offset),
        index: other_index,
        distance,
        score: misfit_here + misfit_there + misfit_pair,
    })
}

/// 4-connected neighbour graph over a corner cloud.
pub struct GridGraph {
    /// For each corner, at most one neighbour per direction.
    pub neighbors: Vec<Vec<NodeNeighbor>>,
}

impl GridGraph {
    pub fn new(corners: &[Corner], params: &GridGraphParams) -> Self {
        if corners.is_empty() {
            return Self {
                neighbors: Vec::new(),
            };
        }

        let index = CornerIndex::build(corners);
        let neighbors = corners
            .iter()
            .enumerate()
            .map(|(i, corner)| {
                let mut slots: [Option<NodeNeighbor>; 4] = Default::default();
                for (j, _) in index.others_near(i, params.k_neighbors) {
                    let Some(edge) = grid_edge(corner, &corners[j], j, params) else {
                        continue;
                    };
                    let slot = &mut slots[edge.direction as usize];
                    if slot.as_ref().is_none_or(|kept| edge.beats(kept)) {
                        *slot = Some(edge);
                    }
                }
                slots.into_iter().flatten().collect()
            })
            .collect();

        Self { neighbors }
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}

/// Median distance from each corner to its closest other corner.
///
/// Coincident duplicates are ignored; `None` below two distinct corners.
pub fn median_nearest_distance(corners: &[Corner]) -> Option<f32> {
    if corners.len() < 2 {
        return None;
    }
    let index = CornerIndex::build(corners);
    let mut gaps: Vec<f32> = (0..corners.len())
        .filter_map(|i| index.others_near(i, 1).next().map(|(_, d)| d))
        .filter(|&d| d > 0.0)
        .collect();
    if gaps.is_empty() {
        return None;
    }
    let mid = gaps.len() / 2;
    let (_, median, _) = gaps.select_nth_unstable_by(mid, f32::total_cmp);
    Some(*median)
}

/// Node sets of the graph's connected components, treating edges as
/// undirected reachability from each start node.
pub fn connected_components(graph: &GridGraph) -> Vec<Vec<usize>> {
    let mut label: Vec<Option<usize>> = vec![None; graph.len()];
    let mut components: Vec<Vec<usize>> = Vec::new();

    for seed in 0..graph.len() {
        if label[seed].is_some() {
            continue;
        }
        let id = components.len();
        label[seed] = Some(id);
        let mut members = vec![seed];
        let mut cursor = 0;
        while cursor < members.len() {
            let node = members[cursor];
            cursor += 1;
            for edge in &graph.neighbors[node] {
                if label[edge.index].is_none() {
                    label[edge.index] = Some(id);
                    members.push(edge.index);
                }
            }
        }
        components.push(members);
    }

    components
}

/// BFS integer coordinates `(node, i, j)` for one component.
///
/// Returns `None` when the edges are inconsistent, i.e. two nodes land on the
/// same cell or one node is reached at two different cells.
pub fn assign_grid_coordinates(
    graph: &GridGraph,
    component: &[usize],
) -> Option<Vec<(usize, i32, i32)>> {
    let start = *component.first()?;
    let mut cell_of: HashMap<usize, (i32, i32)> = HashMap::with_capacity(component.len());
    let mut node_at: HashMap<(i32, i32), usize> = HashMap::with_capacity(component.len());
    let mut coords = Vec::with_capacity(component.len());
    let mut queue = VecDeque::from([start]);

    cell_of.insert(start, (0, 0));
    node_at.insert((0, 0), start);

    while let Some(node) = queue.pop_front() {
        let (i, j) = cell_of[&node];
        coords.push((node, i, j));

        for edge in &graph.neighbors[node] {
            let (di, dj) = edge.direction.step();
            let cell = (i + di, j + dj);
            match (cell_of.get(&edge.index), node_at.get(&cell)) {
                (Some(&seen), _) if seen != cell => return None,
                (Some(_), _) => {}
                (None, Some(_)) => return None,
                (None, None) => {
                    cell_of.insert(edge.index, cell);
                    node_at.insert(cell, edge.index);
                    queue.push_back(edge.index);
                }
            }
        }
    }

    Some(coords)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIAG_A: f32 = FRAC_PI_4;
    const DIAG_B: f32 = 3.0 * FRAC_PI_4;

    /// Ideal checkerboard corners, row-major, alternating diagonals.
    fn checker(cols: usize, rows: usize, pitch: f32) -> Vec<Corner> {
        (0..rows)
            .flat_map(|r| {
                (0..cols).map(move |c| {
                    let diag = if (r + c) % 2 == 0 { DIAG_A } else { DIAG_B };
                    Corner::new(c as f32 * pitch, r as f32 * pitch, diag, 1.0)
                })
            })
            .collect()
    }

    fn params_for_pitch_10() -> GridGraphParams {
        GridGraphParams {
            min_spacing_pix: 5.0,
            max_spacing_pix: 15.0,
            ..Default::default()
        }
    }

    fn target(graph: &GridGraph, node: usize, dir: NeighborDirection) -> Option<usize> {
        graph.neighbors[node]
            .iter()
            .find(|e| e.direction == dir)
            .map(|e| e.index)
    }

    #[test]
    fn offsets_map_to_dominant_axis() {
        use NeighborDirection::*;
        assert_eq!(NeighborDirection::from_offset(&Vector2::new(5.0, 1.0)), Right);
        assert_eq!(NeighborDirection::from_offset(&Vector2::new(-5.0, 1.0)), Left);
        assert_eq!(NeighborDirection::from_offset(&Vector2::new(0.5, 4.0)), Down);
        assert_eq!(NeighborDirection::from_offset(&Vector2::new(0.5, -4.0)), Up);
    }

    #[test]
    fn interior_corner_links_all_four_sides() {
        // 4 x 3 board, node 5 sits at column 1, row 1.
        let graph = GridGraph::new(&checker(4, 3, 10.0), &params_for_pitch_10());
        assert_eq!(graph.neighbors[5].len(), 4);
        assert_eq!(target(&graph, 5, NeighborDirection::Left), Some(4));
        assert_eq!(target(&graph, 5, NeighborDirection::Right), Some(6));
        assert_eq!(target(&graph, 5, NeighborDirection::Up), Some(1));
        assert_eq!(target(&graph, 5, NeighborDirection::Down), Some(9));

        // Corners of the board only see two neighbours.
        assert_eq!(graph.neighbors[0].len(), 2);
        assert_eq!(graph.neighbors[11].len(), 2);
    }

    #[test]
    fn parallel_diagonals_never_link() {
        let corners = [
            Corner::new(0.0, 0.0, DIAG_A, 1.0),
            Corner::new(10.0, 0.0, DIAG_A, 1.0),
        ];
        let graph = GridGraph::new(&corners, &params_for_pitch_10());
        assert!(graph.neighbors.iter().all(Vec::is_empty));
    }

    #[test]
    fn spacing_window_is_enforced() {
        let corners = [
            Corner::new(0.0, 0.0, DIAG_A, 1.0),
            Corner::new(0.0, 40.0, DIAG_B, 1.0),
            Corner::new(3.0, 0.0, DIAG_B, 1.0),
        ];
        let graph = GridGraph::new(&corners, &params_for_pitch_10());
        assert!(graph.neighbors.iter().all(Vec::is_empty));
    }

    #[test]
    fn better_aligned_candidate_wins_its_slot() {
        let corners = [
            Corner::new(0.0, 0.0, DIAG_A, 1.0),
            Corner::new(12.0, 0.0, DIAG_B + 0.15, 1.0),
            Corner::new(10.0, 0.5, DIAG_B, 1.0),
        ];
        let graph = GridGraph::new(&corners, &params_for_pitch_10());
        assert_eq!(graph.neighbors[0].len(), 1);
        assert_eq!(target(&graph, 0, NeighborDirection::Right), Some(2));
    }

    #[test]
    fn separate_boards_form_separate_components() {
        let mut corners = checker(3, 3, 10.0);
        corners.extend(checker(2, 2, 10.0).into_iter().map(|mut c| {
            c.position.x += 200.0;
            c
        }));
        let graph = GridGraph::new(&corners, &params_for_pitch_10());
        let mut sizes: Vec<usize> = connected_components(&graph).iter().map(Vec::len).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![4, 9]);
    }

    #[test]
    fn labelling_matches_board_layout() {
        let (cols, rows) = (5, 3);
        let graph = GridGraph::new(&checker(cols, rows, 10.0), &params_for_pitch_10());
        let components = connected_components(&graph);
        assert_eq!(components.len(), 1);

        let coords = assign_grid_coordinates(&graph, &components[0]).expect("consistent");
        assert_eq!(coords.len(), cols * rows);
        let (_, i0, j0) = coords[0];
        let origin = coords[0].0;
        for (node, i, j) in coords {
            let di = node as i32 % cols as i32 - origin as i32 % cols as i32;
            let dj = node as i32 / cols as i32 - origin as i32 / cols as i32;
            assert_eq!((i - i0, j - j0), (di, dj));
        }
    }

    #[test]
    fn median_gap_ignores_duplicates() {
        let mut corners = checker(4, 4, 17.0);
        corners.push(corners[0]);
        let gap = median_nearest_distance(&corners).expect("gap");
        assert!((gap - 17.0).abs() < 1e-4);
        assert!(median_nearest_distance(&corners[..1]).is_none());
    }
}

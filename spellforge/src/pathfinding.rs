//! Line of sight and A* pathfinding over a [`TileGrid`].

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::Vec2;

use crate::grid::{GridCoord, TileGrid};

/// Bresenham line of sight between two pixel positions.
///
/// Every tile on the rasterized line, endpoints included, must be floor. A
/// point outside floor never has line of sight.
pub fn has_line_of_sight(grid: &TileGrid, a: Vec2, b: Vec2) -> bool {
    let GridCoord { x: mut x0, y: mut y0 } = grid.world_to_grid(a);
    let GridCoord { x: x1, y: y1 } = grid.world_to_grid(b);

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if !grid.is_floor(GridCoord::new(x0, y0)) {
            return false;
        }
        if x0 == x1 && y0 == y1 {
            return true;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// A* pathfinding algorithm.
pub struct AStarPathfinder;

#[derive(Clone, Copy, PartialEq, Eq)]
struct NodeWithCost {
    index: usize,
    f_cost: i32,
    h_cost: i32,
    seq: u32,
}

impl Ord for NodeWithCost {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap: lowest f, then lowest h, then oldest entry.
        other
            .f_cost
            .cmp(&self.f_cost)
            .then_with(|| other.h_cost.cmp(&self.h_cost))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for NodeWithCost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl AStarPathfinder {
    /// Find a path between two pixel positions.
    ///
    /// Returns the pixel centers of every tile after the start tile, ending at
    /// the goal tile, or `None` when no floor route exists. Start and goal in
    /// the same tile yield an empty path.
    pub fn find_path(grid: &TileGrid, start_world: Vec2, goal_world: Vec2) -> Option<Vec<Vec2>> {
        let start = grid.world_to_grid(start_world);
        let goal = grid.world_to_grid(goal_world);
        let tiles = Self::find_path_grid(grid, start, goal)?;
        Some(
            tiles
                .into_iter()
                .skip(1)
                .map(|c| grid.grid_to_world(c))
                .collect(),
        )
    }

    /// Find a path of tile coordinates, including both `start` and `goal`.
    ///
    /// The start tile only has to be in bounds; the goal must be floor. All
    /// search state lives in this call.
    pub fn find_path_grid(grid: &TileGrid, start: GridCoord, goal: GridCoord) -> Option<Vec<GridCoord>> {
        let start_index = grid.index(&start)?;
        let goal_index = grid.index(&goal)?;
        if !grid.is_floor(goal) {
            return None;
        }
        if start_index == goal_index {
            return Some(vec![start]);
        }

        let cells = grid.width() * grid.height();
        let mut g_score = vec![i32::MAX; cells];
        let mut came_from: Vec<Option<usize>> = vec![None; cells];
        let mut closed = vec![false; cells];
        let mut open_set = BinaryHeap::new();
        let mut seq = 0u32;

        g_score[start_index] = 0;
        let h = start.manhattan_distance(&goal);
        open_set.push(NodeWithCost {
            index: start_index,
            f_cost: h,
            h_cost: h,
            seq,
        });

        while let Some(NodeWithCost { index, .. }) = open_set.pop() {
            if index == goal_index {
                return Some(Self::reconstruct(grid, &came_from, goal_index));
            }
            if closed[index] {
                continue;
            }
            closed[index] = true;

            let current = grid.coord_of(index);
            let tentative_g = g_score[index] + 1;
            for neighbor in grid.neighbors_4(&current) {
                if !grid.is_floor(neighbor) {
                    continue;
                }
                let Some(n) = grid.index(&neighbor) else {
                    continue;
                };
                if closed[n] || tentative_g >= g_score[n] {
                    continue;
                }
                came_from[n] = Some(index);
                g_score[n] = tentative_g;
                let h_cost = neighbor.manhattan_distance(&goal);
                seq += 1;
                open_set.push(NodeWithCost {
                    index: n,
                    f_cost: tentative_g + h_cost,
                    h_cost,
                    seq,
                });
            }
        }

        None
    }

    fn reconstruct(grid: &TileGrid, came_from: &[Option<usize>], goal_index: usize) -> Vec<GridCoord> {
        let mut path = vec![grid.coord_of(goal_index)];
        let mut node = goal_index;
        while let Some(prev) = came_from[node] {
            path.push(grid.coord_of(prev));
            node = prev;
        }
        path.reverse();
        path
    }
}

//! Procedural room-and-corridor level generation.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::grid::{GridCoord, Tile, TileGrid};
use crate::rng::XorShift32;

/// Generation parameters. Ranges are inclusive, sizes are in tiles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelGenParams {
    pub width: usize,
    pub height: usize,
    /// Number of room placement attempts.
    pub attempts: u32,
    pub room_min_w: i32,
    pub room_min_h: i32,
    pub room_max_w: i32,
    pub room_max_h: i32,
    pub corridor_min_w: i32,
    pub corridor_max_w: i32,
    /// 0 picks a random seed.
    pub seed: u32,
}

impl Default for LevelGenParams {
    fn default() -> Self {
        Self {
            width: 80,
            height: 45,
            attempts: 18,
            room_min_w: 6,
            room_min_h: 6,
            room_max_w: 12,
            room_max_h: 10,
            corridor_min_w: 2,
            corridor_max_w: 4,
            seed: 0,
        }
    }
}

/// Axis-aligned room placed by the generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Room {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Room {
    pub fn center(&self) -> GridCoord {
        GridCoord::new(self.x + self.w / 2, self.y + self.h / 2)
    }
}

/// Generate a level with a fresh generator seeded from `params.seed`.
pub fn generate(params: &LevelGenParams) -> (TileGrid, Vec<Room>) {
    let mut rng = XorShift32::new(params.seed);
    generate_with(params, &mut rng)
}

/// Generate a level, drawing from an existing generator.
///
/// Starts fully solid, carves rooms and connects each room's center to the
/// previous room's center with an L-shaped corridor, then runs the outline pass.
pub fn generate_with(params: &LevelGenParams, rng: &mut XorShift32) -> (TileGrid, Vec<Room>) {
    let mut grid = TileGrid::new(params.width, params.height);
    let mut rooms: Vec<Room> = Vec::with_capacity(params.attempts as usize);
    let gw = params.width as i32;
    let gh = params.height as i32;

    for _ in 0..params.attempts {
        let w = rng.range(params.room_min_w, params.room_max_w);
        let h = rng.range(params.room_min_h, params.room_max_h);

        // Keep a one-tile border; small grids clamp the range instead of failing.
        let x_max = (gw - w - 2).max(1);
        let y_max = (gh - h - 2).max(1);
        let x = rng.range(1, x_max);
        let y = rng.range(1, y_max);

        let room = Room { x, y, w, h };
        grid.set_rect(x, y, w, h, Tile::FLOOR);

        let width = rng.range(params.corridor_min_w, params.corridor_max_w).max(1);
        if let Some(prev) = rooms.last() {
            carve_corridor(&mut grid, prev.center(), room.center(), width, rng);
        }
        rooms.push(room);
    }

    outline_walls(&mut grid);
    debug!(
        "generated {}x{} level: {} rooms, {} floor tiles",
        params.width,
        params.height,
        rooms.len(),
        grid.floor_count()
    );
    (grid, rooms)
}

/// Carve an L-shaped corridor, randomly horizontal-first or vertical-first.
fn carve_corridor(grid: &mut TileGrid, a: GridCoord, b: GridCoord, width: i32, rng: &mut XorShift32) {
    if rng.coin() {
        carve_span(grid, a, GridCoord::new(b.x, a.y), width);
        carve_span(grid, GridCoord::new(b.x, a.y), b, width);
    } else {
        carve_span(grid, a, GridCoord::new(a.x, b.y), width);
        carve_span(grid, GridCoord::new(a.x, b.y), b, width);
    }
}

/// Carve a straight horizontal or vertical span `width` tiles thick, centered
/// on the line. Odd widths are symmetric; even widths lean toward +x/+y.
fn carve_span(grid: &mut TileGrid, a: GridCoord, b: GridCoord, width: i32) {
    let width = width.max(1);
    let half = width / 2;
    if a.y == b.y {
        let (x1, x2) = (a.x.min(b.x), a.x.max(b.x));
        grid.set_rect(x1, a.y - half, x2 - x1 + 1, width, Tile::FLOOR);
    } else if a.x == b.x {
        let (y1, y2) = (a.y.min(b.y), a.y.max(b.y));
        grid.set_rect(a.x - half, y1, width, y2 - y1 + 1, Tile::FLOOR);
    }
}

/// Re-mark every non-floor tile as wall. Idempotent; it never changes the
/// floor region.
fn outline_walls(grid: &mut TileGrid) {
    let coords: Vec<GridCoord> = grid.iter_coords().filter(|c| !grid.is_floor(*c)).collect();
    for c in coords {
        grid.set(c, Tile::WALL);
    }
}

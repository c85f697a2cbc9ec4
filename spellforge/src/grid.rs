//! Tile grid for procedurally generated levels.
//!
//! Tiles are stored row-major (`y * width + x`). Every in-bounds cell is always
//! initialized; out-of-bounds queries return `None` or a documented default.

use glam::Vec2;

/// Size of one tile in pixels. One tile is also one physics meter.
pub const TILE_SIZE: f32 = 32.0;

/// Integer tile coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCoord {
    pub x: i32,
    pub y: i32,
}

impl GridCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another coordinate.
    pub fn manhattan_distance(&self, other: &GridCoord) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TileId {
    Wall = 0,
    Floor = 1,
}

/// Per-tile property bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TileFlags(u8);

impl TileFlags {
    pub const WALKABLE: Self = Self(1 << 0);
    pub const OPAQUE: Self = Self(1 << 1);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for TileFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Tile {
    pub id: TileId,
    pub flags: TileFlags,
}

impl Tile {
    pub const WALL: Tile = Tile {
        id: TileId::Wall,
        flags: TileFlags::OPAQUE,
    };
    pub const FLOOR: Tile = Tile {
        id: TileId::Floor,
        flags: TileFlags::WALKABLE,
    };

    /// Build a tile with the flags implied by its id.
    pub fn new(id: TileId) -> Self {
        match id {
            TileId::Wall => Self::WALL,
            TileId::Floor => Self::FLOOR,
        }
    }

    pub fn is_floor(&self) -> bool {
        self.id == TileId::Floor
    }

    pub fn is_wall(&self) -> bool {
        self.id == TileId::Wall
    }
}

/// Dense wall/floor grid for one level.
#[derive(Clone, Debug)]
pub struct TileGrid {
    width: usize,
    height: usize,
    tiles: Vec<Tile>, // Row-major: [y * width + x]
}

impl TileGrid {
    /// Create a fully solid grid.
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, Tile::WALL)
    }

    /// Create a grid with every cell set to `tile`.
    pub fn filled(width: usize, height: usize, tile: Tile) -> Self {
        Self {
            width,
            height,
            tiles: vec![tile; width * height],
        }
    }

    /// Parse rows of `#` (wall) and `.` (floor). Any other character is a wall.
    /// Short rows are padded with wall.
    pub fn from_rows(rows: &[&str]) -> Self {
        let height = rows.len();
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
        let mut grid = Self::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                if c == '.' {
                    grid.set(GridCoord::new(x as i32, y as i32), Tile::FLOOR);
                }
            }
        }
        grid
    }

    /// Width in tiles.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in tiles.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Size of the whole level in pixels.
    pub fn pixel_size(&self) -> Vec2 {
        Vec2::new(
            self.width as f32 * TILE_SIZE,
            self.height as f32 * TILE_SIZE,
        )
    }

    /// Whether the coordinate lies inside the grid.
    pub fn in_bounds(&self, coord: &GridCoord) -> bool {
        coord.x >= 0
            && coord.x < self.width as i32
            && coord.y >= 0
            && coord.y < self.height as i32
    }

    /// Row-major index of a coordinate, or `None` when out of bounds.
    pub fn index(&self, coord: &GridCoord) -> Option<usize> {
        if !self.in_bounds(coord) {
            return None;
        }
        Some((coord.y as usize) * self.width + (coord.x as usize))
    }

    /// Coordinate for a row-major index.
    pub fn coord_of(&self, index: usize) -> GridCoord {
        GridCoord::new((index % self.width) as i32, (index / self.width) as i32)
    }

    /// Tile at `coord`, or `None` when out of bounds.
    pub fn tile_at(&self, coord: GridCoord) -> Option<Tile> {
        self.index(&coord).map(|i| self.tiles[i])
    }

    /// Set one tile. Returns `false` if the coordinate is out of bounds.
    pub fn set(&mut self, coord: GridCoord, tile: Tile) -> bool {
        match self.index(&coord) {
            Some(i) => {
                self.tiles[i] = tile;
                true
            }
            None => false,
        }
    }

    /// Overwrite every tile.
    pub fn fill(&mut self, tile: Tile) {
        self.tiles.iter_mut().for_each(|t| *t = tile);
    }

    /// Set a rectangle of tiles, clamped to the grid.
    pub fn set_rect(&mut self, x: i32, y: i32, w: i32, h: i32, tile: Tile) {
        let x1 = x.max(0);
        let y1 = y.max(0);
        let x2 = (x + w - 1).min(self.width as i32 - 1);
        let y2 = (y + h - 1).min(self.height as i32 - 1);
        for yy in y1..=y2 {
            for xx in x1..=x2 {
                self.set(GridCoord::new(xx, yy), tile);
            }
        }
    }

    /// Out of bounds is never floor.
    pub fn is_floor(&self, coord: GridCoord) -> bool {
        self.tile_at(coord).is_some_and(|t| t.is_floor())
    }

    /// Out of bounds is not a wall (used for perimeter side detection).
    pub fn is_wall(&self, coord: GridCoord) -> bool {
        self.tile_at(coord).is_some_and(|t| t.is_wall())
    }

    /// Out of bounds blocks movement.
    pub fn blocks(&self, coord: GridCoord) -> bool {
        self.tile_at(coord).map_or(true, |t| t.is_wall())
    }

    /// True when every tile within `radius` (a square) of `coord` is floor.
    pub fn has_clearance(&self, coord: GridCoord, radius: i32) -> bool {
        (-radius..=radius)
            .all(|dy| (-radius..=radius).all(|dx| self.is_floor(coord.offset(dx, dy))))
    }

    /// In-bounds 4-neighbors in the fixed order right, left, down, up.
    pub fn neighbors_4(&self, coord: &GridCoord) -> impl Iterator<Item = GridCoord> + '_ {
        let c = *coord;
        [(1, 0), (-1, 0), (0, 1), (0, -1)]
            .into_iter()
            .map(move |(dx, dy)| c.offset(dx, dy))
            .filter(move |n| self.in_bounds(n))
    }

    /// Iterate over all coordinates, row by row.
    pub fn iter_coords(&self) -> impl Iterator<Item = GridCoord> {
        let width = self.width as i32;
        let height = self.height as i32;
        (0..height).flat_map(move |y| (0..width).map(move |x| GridCoord::new(x, y)))
    }

    /// Number of floor tiles.
    pub fn floor_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.is_floor()).count()
    }

    /// Convert a pixel position to the tile containing it.
    pub fn world_to_grid(&self, world_pos: Vec2) -> GridCoord {
        GridCoord {
            x: (world_pos.x / TILE_SIZE).floor() as i32,
            y: (world_pos.y / TILE_SIZE).floor() as i32,
        }
    }

    /// Pixel position of a tile's center.
    pub fn grid_to_world(&self, coord: GridCoord) -> Vec2 {
        Vec2::new(
            (coord.x as f32 + 0.5) * TILE_SIZE,
            (coord.y as f32 + 0.5) * TILE_SIZE,
        )
    }

    /// Move an AABB by `velocity` and push it out of blocking tiles.
    ///
    /// Axis-separated: X is applied and resolved first, then Y using the
    /// resolved X. A fast diagonal move can clip a wall corner; this sweep is
    /// an approximation, not a continuous test.
    pub fn collide_aabb_vs_walls(&self, position: Vec2, half: Vec2, velocity: Vec2) -> Vec2 {
        const EPS: f32 = 0.001;
        let cell = |v: f32| (v / TILE_SIZE).floor() as i32;
        let mut x = position.x;
        let mut y = position.y;

        x += velocity.x;
        let left = cell(x - half.x);
        let right = cell(x + half.x - EPS);
        let top = cell(y - half.y);
        let bottom = cell(y + half.y - EPS);
        if velocity.x > 0.0 {
            if (top..=bottom).any(|ty| self.blocks(GridCoord::new(right, ty))) {
                x = right as f32 * TILE_SIZE - half.x;
            }
        } else if velocity.x < 0.0
            && (top..=bottom).any(|ty| self.blocks(GridCoord::new(left, ty)))
        {
            x = (left + 1) as f32 * TILE_SIZE + half.x;
        }

        y += velocity.y;
        let left = cell(x - half.x);
        let right = cell(x + half.x - EPS);
        let top = cell(y - half.y);
        let bottom = cell(y + half.y - EPS);
        if velocity.y > 0.0 {
            if (left..=right).any(|tx| self.blocks(GridCoord::new(tx, bottom))) {
                y = bottom as f32 * TILE_SIZE - half.y;
            }
        } else if velocity.y < 0.0
            && (left..=right).any(|tx| self.blocks(GridCoord::new(tx, top)))
        {
            y = (top + 1) as f32 * TILE_SIZE + half.y;
        }

        Vec2::new(x, y)
    }
}

//! Static collision geometry extracted from the wall tiles of a level.
//!
//! Wall perimeters are traced over a lattice of tile corners into closed,
//! rectilinear loops, then collinear points are collapsed so every remaining
//! vertex is a corner.

use glam::Vec2;

use crate::grid::{TileGrid, TILE_SIZE};

/// A closed polygon in pixel space. The last point connects back to the first.
pub type Contour = Vec<Vec2>;

const RIGHT: usize = 0;
const DOWN: usize = 1;
const LEFT: usize = 2;
const UP: usize = 3;

/// Directed perimeter edges over the `(w + 1) x (h + 1)` corner lattice.
///
/// Each lattice vertex has at most one outgoing edge per cardinal direction.
/// Edges are wound so the wall is always on the right-hand side (screen space,
/// y down).
struct EdgeGraph {
    stride: usize,
    out: Vec<Option<usize>>,
    used: Vec<bool>,
}

impl EdgeGraph {
    fn from_grid(grid: &TileGrid) -> Self {
        let stride = grid.width() + 1;
        let vertex_count = stride * (grid.height() + 1);
        let mut out = vec![None; vertex_count * 4];
        let vid = |x: i32, y: i32| y as usize * stride + x as usize;

        for c in grid.iter_coords().filter(|c| grid.is_wall(*c)) {
            let (x, y) = (c.x, c.y);
            if !grid.is_wall(c.offset(0, -1)) {
                out[vid(x, y) * 4 + RIGHT] = Some(vid(x + 1, y));
            }
            if !grid.is_wall(c.offset(1, 0)) {
                out[vid(x + 1, y) * 4 + DOWN] = Some(vid(x + 1, y + 1));
            }
            if !grid.is_wall(c.offset(0, 1)) {
                out[vid(x + 1, y + 1) * 4 + LEFT] = Some(vid(x, y + 1));
            }
            if !grid.is_wall(c.offset(-1, 0)) {
                out[vid(x, y + 1) * 4 + UP] = Some(vid(x, y));
            }
        }

        let used = vec![false; out.len()];
        Self { stride, out, used }
    }

    fn vertex_count(&self) -> usize {
        self.out.len() / 4
    }

    fn is_free(&self, v: usize, d: usize) -> bool {
        self.out[v * 4 + d].is_some() && !self.used[v * 4 + d]
    }

    fn to_pixels(&self, v: usize) -> Vec2 {
        Vec2::new(
            (v % self.stride) as f32 * TILE_SIZE,
            (v / self.stride) as f32 * TILE_SIZE,
        )
    }

    /// Follow unused edges from `(start, start_dir)` until the loop closes.
    ///
    /// Returns the visited vertices (start once, not repeated at the end), or
    /// `None` if the walk dead-ends away from its start.
    fn trace(&mut self, start: usize, start_dir: usize) -> Option<Vec<usize>> {
        let mut vertices = vec![start];
        let (mut v, mut d) = (start, start_dir);
        let mut budget = self.out.len();

        while budget > 0 {
            budget -= 1;
            self.used[v * 4 + d] = true;
            let next = self.out[v * 4 + d]?;

            let mut chosen = None;
            for candidate in [(d + 1) & 3, d, (d + 3) & 3] {
                if next == start && candidate == start_dir {
                    return Some(vertices);
                }
                if self.is_free(next, candidate) {
                    chosen = Some(candidate);
                    break;
                }
            }

            match chosen {
                Some(nd) => {
                    vertices.push(next);
                    v = next;
                    d = nd;
                }
                None if next == start => return Some(vertices),
                None => return None,
            }
        }
        None
    }
}

/// Trace every wall perimeter of `grid` into simplified closed contours.
///
/// Out-of-bounds counts as non-wall for side detection, so the map's outer
/// boundary produces a loop as well as every floor region inside it. Loops are
/// emitted in lattice scan order, which makes the output deterministic.
pub fn trace_wall_contours(grid: &TileGrid) -> Vec<Contour> {
    if grid.width() == 0 || grid.height() == 0 {
        return Vec::new();
    }

    let mut graph = EdgeGraph::from_grid(grid);
    let mut contours = Vec::new();

    for v0 in 0..graph.vertex_count() {
        for d0 in 0..4 {
            if !graph.is_free(v0, d0) {
                continue;
            }
            let Some(vertices) = graph.trace(v0, d0) else {
                log::warn!("discarding open wall contour starting at lattice vertex {v0}");
                continue;
            };
            let points: Vec<Vec2> = vertices.iter().map(|&v| graph.to_pixels(v)).collect();
            let simplified = collapse_collinear(&points);
            if simplified.len() >= 3 {
                contours.push(simplified);
            }
        }
    }

    log::debug!(
        "traced {} wall contours with {} vertices",
        contours.len(),
        contours.iter().map(Vec::len).sum::<usize>()
    );
    contours
}

/// True when `a -> b -> c` continues straight ahead.
fn continues_straight(a: Vec2, b: Vec2, c: Vec2) -> bool {
    const EPS: f32 = 1e-3;
    let ab = b - a;
    let bc = c - b;
    ab.perp_dot(bc).abs() <= EPS && ab.dot(bc) > 0.0
}

/// Drop every point that lies on a straight run of a closed polygon.
pub fn collapse_collinear(points: &[Vec2]) -> Vec<Vec2> {
    let mut pts: Vec<Vec2> = Vec::with_capacity(points.len());
    for &p in points {
        let n = pts.len();
        if n >= 2 && continues_straight(pts[n - 2], pts[n - 1], p) {
            pts[n - 1] = p;
        } else {
            pts.push(p);
        }
    }

    while pts.len() >= 3 && continues_straight(pts[pts.len() - 2], pts[pts.len() - 1], pts[0]) {
        pts.pop();
    }
    while pts.len() >= 3 && continues_straight(pts[pts.len() - 1], pts[0], pts[1]) {
        pts.remove(0);
    }
    pts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridCoord, Tile};
    use proptest::prelude::*;

    fn perimeter(contour: &Contour) -> f32 {
        let n = contour.len();
        (0..n).map(|i| contour[i].distance(contour[(i + 1) % n])).sum()
    }

    fn exposed_faces(grid: &TileGrid) -> usize {
        grid.iter_coords()
            .filter(|c| grid.is_wall(*c))
            .map(|c| {
                [(0, -1), (1, 0), (0, 1), (-1, 0)]
                    .iter()
                    .filter(|(dx, dy)| !grid.is_wall(c.offset(*dx, *dy)))
                    .count()
            })
            .sum()
    }

    fn as_set(contour: &Contour) -> Vec<(i32, i32)> {
        let mut pts: Vec<(i32, i32)> = contour.iter().map(|p| (p.x as i32, p.y as i32)).collect();
        pts.sort_unstable();
        pts
    }

    #[test]
    fn solid_block_with_room_gives_two_rectangles() {
        let mut grid = TileGrid::new(8, 6);
        grid.set_rect(2, 2, 3, 2, Tile::FLOOR);
        let contours = trace_wall_contours(&grid);
        assert_eq!(contours.len(), 2);
        assert!(contours.iter().all(|c| c.len() == 4));

        assert_eq!(as_set(&contours[0]), vec![(0, 0), (0, 192), (256, 0), (256, 192)]);
        assert_eq!(as_set(&contours[1]), vec![(64, 64), (64, 128), (160, 64), (160, 128)]);
    }

    #[test]
    fn all_floor_grid_has_no_contours() {
        let grid = TileGrid::filled(5, 5, Tile::FLOOR);
        assert!(trace_wall_contours(&grid).is_empty());
    }

    #[test]
    fn empty_grid_has_no_contours() {
        assert!(trace_wall_contours(&TileGrid::new(0, 0)).is_empty());
    }

    #[test]
    fn single_pillar_is_a_square() {
        let mut grid = TileGrid::filled(5, 5, Tile::FLOOR);
        grid.set(GridCoord::new(2, 2), Tile::WALL);
        let contours = trace_wall_contours(&grid);
        assert_eq!(contours.len(), 1);
        assert_eq!(as_set(&contours[0]), vec![(64, 64), (64, 96), (96, 64), (96, 96)]);
    }

    #[test]
    fn l_shaped_room_has_six_corners() {
        let grid = TileGrid::from_rows(&[
            "#######",
            "#...###",
            "#...###",
            "#.....#",
            "#.....#",
            "#######",
        ]);
        let contours = trace_wall_contours(&grid);
        assert_eq!(contours.len(), 2);
        assert_eq!(contours[0].len(), 4);
        assert_eq!(contours[1].len(), 6);
    }

    #[test]
    fn diagonal_pillars_stay_separate_loops() {
        let mut grid = TileGrid::filled(4, 4, Tile::FLOOR);
        grid.set(GridCoord::new(1, 1), Tile::WALL);
        grid.set(GridCoord::new(2, 2), Tile::WALL);
        let contours = trace_wall_contours(&grid);
        assert_eq!(contours.len(), 2);
        assert!(contours.iter().all(|c| c.len() == 4));
    }

    #[test]
    fn tracing_is_deterministic() {
        let params = crate::levelgen::LevelGenParams {
            seed: 77,
            ..Default::default()
        };
        let (grid, _) = crate::levelgen::generate(&params);
        assert_eq!(trace_wall_contours(&grid), trace_wall_contours(&grid));
    }

    #[test]
    fn generated_level_perimeter_is_conserved() {
        let params = crate::levelgen::LevelGenParams {
            seed: 5,
            ..Default::default()
        };
        let (grid, _) = crate::levelgen::generate(&params);
        let contours = trace_wall_contours(&grid);
        let total: f32 = contours.iter().map(perimeter).sum();
        assert_eq!(total, exposed_faces(&grid) as f32 * TILE_SIZE);
    }

    #[test]
    fn collapse_handles_mid_edge_start() {
        let pts = [
            Vec2::new(1.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(2.0, 1.0),
            Vec2::new(2.0, 2.0),
            Vec2::new(1.0, 2.0),
            Vec2::new(0.0, 2.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(0.0, 0.0),
        ];
        let out = collapse_collinear(&pts);
        assert_eq!(
            out,
            vec![
                Vec2::new(2.0, 0.0),
                Vec2::new(2.0, 2.0),
                Vec2::new(0.0, 2.0),
                Vec2::new(0.0, 0.0),
            ]
        );
    }

    proptest! {
        #[test]
        fn every_exposed_face_is_traced_once(
            (w, h, cells) in (1usize..9, 1usize..9)
                .prop_flat_map(|(w, h)| (Just(w), Just(h), proptest::collection::vec(any::<bool>(), w * h)))
        ) {
            let mut grid = TileGrid::filled(w, h, Tile::FLOOR);
            for (i, wall) in cells.into_iter().enumerate() {
                if wall {
                    grid.set(grid.coord_of(i), Tile::WALL);
                }
            }
            let contours = trace_wall_contours(&grid);
            let total: f32 = contours.iter().map(perimeter).sum();
            prop_assert_eq!(total, exposed_faces(&grid) as f32 * TILE_SIZE);
            for c in &contours {
                prop_assert!(c.len() >= 4);
                prop_assert_eq!(c.len() % 2, 0);
            }
        }
    }
}

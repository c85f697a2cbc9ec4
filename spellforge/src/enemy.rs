//! Enemy chase AI: line of sight, periodic A* repaths, waypoint following and
//! force-based arrival steering.

use std::collections::BTreeMap;

use glam::Vec2;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::bridge::{BodySpec, DeletionRequest, PhysicsBridge};
use crate::entity::{Color, EntityId, EntityKind, EntityRegistry};
use crate::error::SimResult;
use crate::grid::{GridCoord, TileGrid};
use crate::pathfinding::{has_line_of_sight, AStarPathfinder};
use crate::physics::{CollisionLayer, PhysicsWorld};
use crate::rng::XorShift32;

const SLOWED_COLOR: Color = Color::rgb(120, 200, 255);
const WOUNDED_COLOR: Color = Color::rgb(255, 100, 100);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChaseTuning {
    /// Seconds between A* repaths.
    pub repath_interval: f32,
    /// Distance in px at which a waypoint counts as reached.
    pub waypoint_reach: f32,
    /// Speed tapers to zero over `[stop_radius, 2 * stop_radius]` from the player.
    pub stop_radius: f32,
    /// Base chase speed in px/s.
    pub chase_speed: f32,
    pub accel_gain: f32,
    pub brake_gain: f32,
    /// Speed factor while slowed.
    pub slow_factor: f32,
    pub half_extent: f32,
    pub max_health: f32,
    pub density: f32,
    pub linear_damping: f32,
    /// Random tile tries per enemy when spawning.
    pub spawn_tries: u32,
}

impl Default for ChaseTuning {
    fn default() -> Self {
        Self {
            repath_interval: 0.35,
            waypoint_reach: 8.0,
            stop_radius: 28.0,
            chase_speed: 40.0,
            accel_gain: 4.0,
            brake_gain: 6.0,
            slow_factor: 0.4,
            half_extent: 10.0,
            max_health: 100.0,
            density: 1.0,
            linear_damping: 0.0,
            spawn_tries: 500,
        }
    }
}

/// AI state of one live enemy.
#[derive(Clone, Debug, PartialEq)]
pub struct EnemyState {
    pub entity: EntityId,
    pub health: f32,
    pub max_health: f32,
    /// Seconds of slow effect left.
    pub slow_timer: f32,
    pub path: Vec<Vec2>,
    pub waypoint: usize,
    pub repath_cooldown: f32,
}

impl EnemyState {
    fn new(entity: EntityId, max_health: f32) -> Self {
        Self {
            entity,
            health: max_health,
            max_health,
            slow_timer: 0.0,
            path: Vec::new(),
            waypoint: 0,
            repath_cooldown: 0.0,
        }
    }

    pub fn is_slowed(&self) -> bool {
        self.slow_timer > 0.0
    }

    fn color(&self) -> Color {
        if self.is_slowed() {
            SLOWED_COLOR
        } else if self.health < self.max_health * 0.5 {
            WOUNDED_COLOR
        } else {
            Color::GREEN
        }
    }
}

/// Drives every enemy's steering. State is keyed by entity id, so it stays
/// valid while the entity pool reshuffles.
#[derive(Debug)]
pub struct EnemyController {
    tuning: ChaseTuning,
    states: BTreeMap<EntityId, EnemyState>,
}

impl EnemyController {
    pub fn new(tuning: ChaseTuning) -> Self {
        Self {
            tuning,
            states: BTreeMap::new(),
        }
    }

    pub fn tuning(&self) -> &ChaseTuning {
        &self.tuning
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.states.contains_key(&entity)
    }

    pub fn state(&self, entity: EntityId) -> Option<&EnemyState> {
        self.states.get(&entity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnemyState> {
        self.states.values()
    }

    /// Drop an enemy's AI state. Returns whether it existed.
    pub fn remove(&mut self, entity: EntityId) -> bool {
        self.states.remove(&entity).is_some()
    }

    /// Spawn one enemy with a dynamic body at `position`.
    pub fn spawn_at(
        &mut self,
        position: Vec2,
        registry: &mut EntityRegistry,
        bridge: &mut PhysicsBridge,
        physics: &mut PhysicsWorld,
    ) -> SimResult<EntityId> {
        let half = Vec2::splat(self.tuning.half_extent);
        let id = registry.create(EntityKind::Enemy, position, half, Color::GREEN);
        let spec = BodySpec::dynamic_box(half, self.tuning.density, CollisionLayer::Enemy)
            .with_damping(self.tuning.linear_damping);
        if let Err(e) = bridge.spawn_body(physics, id, position, &spec) {
            registry.remove(id);
            return Err(e);
        }
        self.states
            .insert(id, EnemyState::new(id, self.tuning.max_health));
        Ok(id)
    }

    /// Spawn up to `count` enemies on random floor tiles at least `min_dist`
    /// px from the player. An enemy that finds no tile within its tries is
    /// skipped.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        &mut self,
        count: u32,
        min_dist: f32,
        player_pos: Vec2,
        grid: &TileGrid,
        rng: &mut XorShift32,
        registry: &mut EntityRegistry,
        bridge: &mut PhysicsBridge,
        physics: &mut PhysicsWorld,
    ) -> Vec<EntityId> {
        let mut spawned = Vec::new();
        if grid.width() == 0 || grid.height() == 0 {
            return spawned;
        }
        let max_x = grid.width() as i32 - 1;
        let max_y = grid.height() as i32 - 1;

        for _ in 0..count {
            let mut placed = None;
            for _ in 0..self.tuning.spawn_tries {
                let coord = GridCoord::new(rng.range(0, max_x), rng.range(0, max_y));
                if !grid.is_floor(coord) {
                    continue;
                }
                let position = grid.grid_to_world(coord);
                if position.distance(player_pos) >= min_dist {
                    placed = Some(position);
                    break;
                }
            }
            let Some(position) = placed else {
                warn!("no spawn tile found for enemy after {} tries", self.tuning.spawn_tries);
                continue;
            };
            match self.spawn_at(position, registry, bridge, physics) {
                Ok(id) => spawned.push(id),
                Err(e) => warn!("enemy spawn failed: {e}"),
            }
        }

        info!("spawned {} of {count} enemies", spawned.len());
        spawned
    }

    /// Subtract health and extend the slow effect. Returns the remaining
    /// health, or `None` for an unknown enemy.
    pub fn damage(&mut self, entity: EntityId, amount: f32, slow_for: f32) -> Option<f32> {
        let state = self.states.get_mut(&entity)?;
        state.health -= amount;
        state.slow_timer = state.slow_timer.max(slow_for);
        debug!("{entity:?} took {amount} damage, {} left", state.health);
        Some(state.health)
    }

    /// Run one AI tick for every enemy.
    ///
    /// Dead enemies are queued for deletion and deactivated; enemies without a
    /// valid body are skipped for this tick.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        dt: f32,
        player_pos: Vec2,
        speed_multiplier: f32,
        grid: &TileGrid,
        registry: &mut EntityRegistry,
        bridge: &mut PhysicsBridge,
        physics: &mut PhysicsWorld,
    ) {
        let t = &self.tuning;
        let ids: Vec<EntityId> = self.states.keys().copied().collect();

        for id in ids {
            let Some(body) = bridge.body_of(id).filter(|b| physics.is_valid(*b)) else {
                warn!("enemy {id:?} has no valid body, skipping");
                continue;
            };
            let Some(position) = physics.position(body) else {
                continue;
            };
            let Some(state) = self.states.get_mut(&id) else {
                continue;
            };

            if state.health <= 0.0 {
                bridge.queue_deletion(DeletionRequest {
                    entity: id,
                    kind: EntityKind::Enemy,
                    position,
                });
                registry.deactivate(id);
                self.states.remove(&id);
                info!("enemy {id:?} died at ({:.0}, {:.0})", position.x, position.y);
                continue;
            }

            state.slow_timer = (state.slow_timer - dt).max(0.0);
            state.repath_cooldown -= dt;
            let needs_repath = state.repath_cooldown <= 0.0 || state.waypoint >= state.path.len();

            let visible = has_line_of_sight(grid, position, player_pos);
            if visible {
                state.path.clear();
                state.waypoint = 0;
            }
            if needs_repath {
                state.repath_cooldown = t.repath_interval;
                if !visible {
                    state.path = AStarPathfinder::find_path(grid, position, player_pos).unwrap_or_default();
                    state.waypoint = 0;
                    debug!("enemy {id:?} repathed: {} waypoints", state.path.len());
                }
            }

            let mut target = player_pos;
            if let Some(&wp) = state.path.get(state.waypoint) {
                if position.distance(wp) <= t.waypoint_reach {
                    state.waypoint += 1;
                }
                if let Some(&wp) = state.path.get(state.waypoint) {
                    target = wp;
                }
            }

            let to_target = target - position;
            let dist = to_target.length();
            let dir = if dist > 1.0 { to_target / dist } else { Vec2::ZERO };

            let slow = if state.is_slowed() { t.slow_factor } else { 1.0 };
            let mut speed = t.chase_speed * speed_multiplier * slow;
            let to_player = position.distance(player_pos);
            if to_player < 2.0 * t.stop_radius {
                speed *= ((to_player - t.stop_radius) / t.stop_radius).max(0.0);
            }

            let velocity = physics.linear_velocity(body).unwrap_or(Vec2::ZERO);
            let mut force = (dir * speed - velocity) * t.accel_gain;
            if to_player < t.stop_radius {
                force -= velocity * t.brake_gain;
            }
            physics.apply_force(body, force);

            registry.set_color(id, state.color());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Tile, TILE_SIZE};

    struct Arena {
        grid: TileGrid,
        physics: PhysicsWorld,
        registry: EntityRegistry,
        bridge: PhysicsBridge,
        enemies: EnemyController,
    }

    impl Arena {
        fn new(grid: TileGrid, tuning: ChaseTuning) -> Self {
            Self {
                grid,
                physics: PhysicsWorld::new(),
                registry: EntityRegistry::new(),
                bridge: PhysicsBridge::new(),
                enemies: EnemyController::new(tuning),
            }
        }

        fn enemy_on_tile(&mut self, x: i32, y: i32) -> EntityId {
            let pos = self.grid.grid_to_world(GridCoord::new(x, y));
            self.enemies
                .spawn_at(pos, &mut self.registry, &mut self.bridge, &mut self.physics)
                .unwrap()
        }

        fn tick(&mut self, player: Vec2) {
            self.enemies.update(
                0.05,
                player,
                1.0,
                &self.grid,
                &mut self.registry,
                &mut self.bridge,
                &mut self.physics,
            );
            self.physics.step(0.05, 4);
            self.bridge.sync_positions(&self.physics, &mut self.registry);
        }

        fn position(&self, id: EntityId) -> Vec2 {
            self.physics.position(self.bridge.body_of(id).unwrap()).unwrap()
        }
    }

    #[test]
    fn open_room_chase_reaches_player() {
        let grid = TileGrid::filled(20, 20, Tile::FLOOR);
        let player = grid.grid_to_world(GridCoord::new(19, 19));
        let path = AStarPathfinder::find_path(&grid, grid.grid_to_world(GridCoord::new(0, 0)), player).unwrap();
        assert_eq!(path.len(), 38);

        // The default stop radius parks the enemy about 28 px out. Shrink it
        // so arrival within waypoint reach is observable.
        let tuning = ChaseTuning {
            stop_radius: 4.0,
            ..ChaseTuning::default()
        };
        let mut arena = Arena::new(grid, tuning);
        let enemy = arena.enemy_on_tile(0, 0);

        let mut reached_at = None;
        for tick in 0..2000 {
            arena.tick(player);
            if arena.position(enemy).distance(player) < 8.0 {
                reached_at = Some(tick);
                break;
            }
        }
        assert!(reached_at.is_some(), "enemy stalled at {:?}", arena.position(enemy));
    }

    #[test]
    fn default_tuning_settles_in_taper_band() {
        let grid = TileGrid::filled(20, 20, Tile::FLOOR);
        let player = grid.grid_to_world(GridCoord::new(19, 19));
        let tuning = ChaseTuning::default();
        let mut arena = Arena::new(grid, tuning.clone());
        let enemy = arena.enemy_on_tile(0, 0);

        for _ in 0..2000 {
            arena.tick(player);
        }

        let dist = arena.position(enemy).distance(player);
        assert!(
            dist >= tuning.stop_radius - 1.0 && dist <= 2.0 * tuning.stop_radius,
            "enemy rests {dist} px from the player"
        );
        let body = arena.bridge.body_of(enemy).unwrap();
        let speed = arena.physics.linear_velocity(body).unwrap().length();
        assert!(speed < 1.0, "enemy still moving at {speed} px/s");
    }

    #[test]
    fn blocked_enemy_follows_a_path() {
        let grid = TileGrid::from_rows(&[
            "..........",
            "..........",
            ".....#....",
            ".....#....",
            ".....#....",
            "..........",
        ]);
        let player = grid.grid_to_world(GridCoord::new(8, 3));
        let mut arena = Arena::new(grid, ChaseTuning::default());
        let enemy = arena.enemy_on_tile(2, 3);
        arena.tick(player);

        let state = arena.enemies.state(enemy).unwrap();
        assert!(!state.path.is_empty());
        assert_eq!(*state.path.last().unwrap(), player);
        assert!((state.repath_cooldown - 0.35).abs() < 1e-6);
    }

    #[test]
    fn visible_player_clears_the_path() {
        let grid = TileGrid::filled(10, 10, Tile::FLOOR);
        let mut arena = Arena::new(grid, ChaseTuning::default());
        let enemy = arena.enemy_on_tile(1, 1);
        arena.enemies.states.get_mut(&enemy).unwrap().path = vec![Vec2::splat(100.0)];
        arena.tick(Vec2::splat(8.5 * TILE_SIZE));
        assert!(arena.enemies.state(enemy).unwrap().path.is_empty());
    }

    #[test]
    fn enemy_without_body_is_skipped() {
        let grid = TileGrid::filled(6, 6, Tile::FLOOR);
        let mut arena = Arena::new(grid, ChaseTuning::default());
        let enemy = arena.enemy_on_tile(1, 1);
        let body = arena.bridge.unregister_body(enemy).unwrap();
        arena.physics.destroy_body(body);
        arena.enemies.damage(enemy, 500.0, 0.0);

        arena.tick(Vec2::splat(100.0));
        assert!(arena.enemies.contains(enemy));
        assert_eq!(arena.bridge.pending_deletions(), 0);
        assert!(arena.registry.is_active_kind(enemy, EntityKind::Enemy));
    }

    #[test]
    fn lethal_damage_queues_deletion_on_next_update() {
        let grid = TileGrid::filled(6, 6, Tile::FLOOR);
        let mut arena = Arena::new(grid, ChaseTuning::default());
        let enemy = arena.enemy_on_tile(1, 1);
        assert_eq!(arena.enemies.damage(enemy, 60.0, 0.0), Some(40.0));
        assert_eq!(arena.enemies.damage(enemy, 60.0, 0.0), Some(-20.0));

        arena.tick(Vec2::splat(150.0));
        assert!(!arena.enemies.contains(enemy));
        assert!(arena.bridge.is_queued(enemy));
        assert!(!arena.registry.is_active_kind(enemy, EntityKind::Enemy));

        let report = arena
            .bridge
            .flush_deletions(&mut arena.physics, &mut arena.registry, &mut arena.enemies);
        assert_eq!(report.corpses.len(), 1);
        assert_eq!(report.enemies_killed, 1);
    }

    #[test]
    fn unknown_enemy_takes_no_damage() {
        let mut enemies = EnemyController::new(ChaseTuning::default());
        let mut registry = EntityRegistry::new();
        let prop = registry.create(EntityKind::Prop, Vec2::ZERO, Vec2::ONE, Color::BLACK);
        assert_eq!(enemies.damage(prop, 10.0, 0.0), None);
    }

    #[test]
    fn color_cues_follow_state() {
        let grid = TileGrid::filled(6, 6, Tile::FLOOR);
        let mut arena = Arena::new(grid, ChaseTuning::default());
        let enemy = arena.enemy_on_tile(1, 1);
        let far = Vec2::splat(5.5 * TILE_SIZE);

        arena.tick(far);
        assert_eq!(arena.registry.get(enemy).unwrap().color, Color::GREEN);

        arena.enemies.damage(enemy, 10.0, 1.0);
        arena.tick(far);
        assert_eq!(arena.registry.get(enemy).unwrap().color, SLOWED_COLOR);

        arena.enemies.damage(enemy, 50.0, 0.0);
        for _ in 0..30 {
            arena.tick(far);
        }
        assert_eq!(arena.registry.get(enemy).unwrap().color, WOUNDED_COLOR);
    }

    #[test]
    fn slowed_enemy_moves_slower() {
        let grid = TileGrid::filled(30, 3, Tile::FLOOR);
        let player = grid.grid_to_world(GridCoord::new(29, 1));
        let mut arena = Arena::new(grid, ChaseTuning::default());
        let fast = arena.enemy_on_tile(0, 0);
        let slow = arena.enemy_on_tile(0, 2);
        arena.enemies.damage(slow, 1.0, 100.0);

        for _ in 0..40 {
            arena.tick(player);
        }
        assert!(arena.position(fast).x > arena.position(slow).x + 20.0);
    }

    #[test]
    fn spawn_respects_minimum_distance() {
        let grid = TileGrid::filled(20, 20, Tile::FLOOR);
        let player = grid.grid_to_world(GridCoord::new(10, 10));
        let mut arena = Arena::new(grid, ChaseTuning::default());
        let mut rng = XorShift32::new(31);
        let ids = arena.enemies.spawn(
            8,
            160.0,
            player,
            &arena.grid,
            &mut rng,
            &mut arena.registry,
            &mut arena.bridge,
            &mut arena.physics,
        );
        assert_eq!(ids.len(), 8);
        assert_eq!(arena.enemies.len(), 8);
        for id in ids {
            assert!(arena.registry.get(id).unwrap().position.distance(player) >= 160.0);
        }
    }

    #[test]
    fn spawn_on_solid_grid_places_nothing() {
        let grid = TileGrid::new(8, 8);
        let mut arena = Arena::new(grid, ChaseTuning::default());
        let mut rng = XorShift32::new(4);
        let ids = arena.enemies.spawn(
            3,
            0.0,
            Vec2::ZERO,
            &arena.grid,
            &mut rng,
            &mut arena.registry,
            &mut arena.bridge,
            &mut arena.physics,
        );
        assert!(ids.is_empty());
        assert!(arena.registry.is_empty());
    }
}

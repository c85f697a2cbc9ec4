//! Per-level simulation state and the fixed tick pipeline.

use glam::Vec2;
use log::{debug, info, warn};

use crate::bridge::{BodySpec, PhysicsBridge};
use crate::combat::{self, ProjectileSystem};
use crate::config::SimConfig;
use crate::enemy::EnemyController;
use crate::entity::{spawn_props, Element, EntityRegistry};
use crate::error::SimResult;
use crate::geometry::trace_wall_contours;
use crate::grid::TileGrid;
use crate::levelgen::{generate_with, Room};
use crate::physics::{CollisionLayer, PhysicsWorld};
use crate::player::Player;
use crate::rng::XorShift32;
use crate::waves::WaveDirector;

/// Input sampled by the host for one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TickInput {
    /// Movement direction; normalized internally.
    pub move_dir: Vec2,
    /// Aim point in world pixels.
    pub aim: Vec2,
    pub fire: bool,
    /// Keep nearby props orbiting.
    pub hold: bool,
    /// Throw held props. Takes precedence over `hold` for this tick.
    pub launch: bool,
    pub select_element: Option<Element>,
}

/// What happened during one tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub enemies_killed: u32,
    pub removed: usize,
    pub spawned: usize,
    pub wave_started: bool,
    pub game_over: bool,
}

/// Everything that lives for exactly one level.
pub struct SimulationState {
    config: SimConfig,
    rng: XorShift32,
    grid: TileGrid,
    rooms: Vec<Room>,
    wall_loops: usize,
    physics: PhysicsWorld,
    bridge: PhysicsBridge,
    registry: EntityRegistry,
    enemies: EnemyController,
    projectiles: ProjectileSystem,
    player: Player,
    waves: WaveDirector,
    /// Enemies owed by triggered waves, spawned at the start of the next
    /// tick's creation phase.
    pending_spawns: u32,
    ticks: u64,
    game_over: bool,
}

impl SimulationState {
    /// Build a fresh level from `config`.
    pub fn new(config: SimConfig) -> SimResult<Self> {
        config.validate()?;
        let mut rng = XorShift32::new(config.level.seed);
        info!("building level with seed state {}", rng.state());

        let (grid, rooms) = generate_with(&config.level, &mut rng);
        let contours = trace_wall_contours(&grid);
        let mut physics = PhysicsWorld::new();
        physics.add_static_loops(&contours);

        let player = Player::spawn(&config.player, &grid, &mut rng, &mut physics)?;
        let mut registry = EntityRegistry::new();
        let mut bridge = PhysicsBridge::new();

        let props = &config.props;
        let half = Vec2::splat(props.half_extent);
        let spec = BodySpec::dynamic_box(half, props.density, CollisionLayer::DynamicProp)
            .with_damping(props.linear_damping);
        for id in spawn_props(&mut registry, &grid, &mut rng, props.min_count, props.max_count, half) {
            let Some(position) = registry.get(id).map(|e| e.position) else {
                continue;
            };
            if let Err(e) = bridge.spawn_body(&mut physics, id, position, &spec) {
                warn!("prop {id:?} has no body: {e}");
                registry.remove(id);
            }
        }

        let mut enemies = EnemyController::new(config.chase.clone());
        enemies.spawn(
            config.waves.initial_count,
            config.waves.min_spawn_distance,
            player.position(),
            &grid,
            &mut rng,
            &mut registry,
            &mut bridge,
            &mut physics,
        );

        Ok(Self {
            waves: WaveDirector::new(config.waves.clone()),
            config,
            rng,
            grid,
            rooms,
            wall_loops: contours.len(),
            physics,
            bridge,
            registry,
            enemies,
            projectiles: ProjectileSystem::new(),
            player,
            pending_spawns: 0,
            ticks: 0,
            game_over: false,
        })
    }

    /// Tear everything down and build a new level. A configured seed is
    /// advanced so the next level differs.
    pub fn restart(&mut self) -> SimResult<()> {
        let mut config = self.config.clone();
        if config.level.seed != 0 {
            config.level.seed = self.rng.next_u32().max(1);
        }
        *self = Self::new(config)?;
        info!("level restarted");
        Ok(())
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    /// Number of closed wall loops handed to the physics world.
    pub fn wall_loop_count(&self) -> usize {
        self.wall_loops
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn bridge(&self) -> &PhysicsBridge {
        &self.bridge
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn enemies(&self) -> &EnemyController {
        &self.enemies
    }

    pub fn projectiles(&self) -> &ProjectileSystem {
        &self.projectiles
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn waves(&self) -> &WaveDirector {
        &self.waves
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    /// Advance one fixed tick. Does nothing once the run is over.
    pub fn tick(&mut self, input: &TickInput) -> TickReport {
        let mut report = TickReport::default();
        if self.game_over {
            report.game_over = true;
            return report;
        }
        let dt = self.config.physics.tick;
        let combat_tuning = &self.config.combat;

        // Player input.
        if let Some(element) = input.select_element {
            self.player.set_element(element);
        }
        self.player.apply_input(&mut self.physics, input.move_dir);

        // Enemy AI reads last tick's positions.
        self.enemies.update(
            dt,
            self.player.position(),
            self.waves.speed_multiplier(),
            &self.grid,
            &mut self.registry,
            &mut self.bridge,
            &mut self.physics,
        );

        // Abilities.
        let player_pos = self.player.position();
        if input.launch {
            combat::launch_props(combat_tuning, player_pos, &mut self.registry, &self.bridge, &mut self.physics);
        } else if input.hold {
            combat::hold_props(
                combat_tuning,
                player_pos,
                self.player.element(),
                &mut self.registry,
                &self.bridge,
                &mut self.physics,
            );
        } else {
            combat::release_props(&mut self.registry);
        }
        if input.fire {
            if let Err(e) = self.projectiles.fire(
                combat_tuning,
                &mut self.physics,
                player_pos,
                self.player.half_extent(),
                input.aim,
                self.player.element(),
            ) {
                warn!("projectile spawn failed: {e}");
            }
        }

        self.physics.step(dt, self.config.physics.substeps);

        self.player.sync(&self.physics);
        self.bridge.sync_positions(&self.physics, &mut self.registry);

        // Contacts of this step only.
        let events = self.physics.contact_events().clone();
        if self
            .bridge
            .process_player_enemy_contact(&events, self.player.body(), &self.registry)
        {
            self.game_over = true;
            info!("game over after {} ticks, {} kills", self.ticks, self.waves.kills());
        }
        self.projectiles.process_hits(
            combat_tuning,
            &events,
            &mut self.physics,
            &self.bridge,
            &self.registry,
            &mut self.enemies,
        );
        combat::process_prop_hits(
            combat_tuning,
            &events,
            &mut self.bridge,
            &self.registry,
            &mut self.enemies,
            &self.physics,
        );

        self.projectiles.update(dt, combat_tuning, &mut self.physics);

        // New entities are created before this tick's deletions are flushed.
        if self.pending_spawns > 0 {
            let count = std::mem::take(&mut self.pending_spawns);
            report.spawned = self
                .enemies
                .spawn(
                    count,
                    self.config.waves.min_spawn_distance,
                    self.player.position(),
                    &self.grid,
                    &mut self.rng,
                    &mut self.registry,
                    &mut self.bridge,
                    &mut self.physics,
                )
                .len();
        }

        let flush = self
            .bridge
            .flush_deletions(&mut self.physics, &mut self.registry, &mut self.enemies);
        report.enemies_killed = flush.enemies_killed;
        report.removed = flush.removed;
        let due = self.waves.record_kills(flush.enemies_killed);
        if due > 0 {
            report.wave_started = true;
            self.pending_spawns += due;
        }

        self.ticks += 1;
        report.game_over = self.game_over;
        debug!(
            "tick {}: {} enemies, {} projectiles, {} bodies",
            self.ticks,
            self.enemies.len(),
            self.projectiles.len(),
            self.physics.body_count()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;

    fn config(seed: u32) -> SimConfig {
        let mut config = SimConfig::default();
        config.level.seed = seed;
        config
    }

    fn enemy_ids(sim: &SimulationState) -> Vec<crate::entity::EntityId> {
        sim.enemies.iter().map(|s| s.entity).collect()
    }

    #[test]
    fn new_level_is_consistent() {
        let sim = SimulationState::new(config(21)).unwrap();
        assert!(sim.wall_loop_count() >= 2);
        assert!(sim.grid().is_floor(sim.grid().world_to_grid(sim.player().position())));
        assert_eq!(sim.enemies().len(), 4);
        assert_eq!(sim.registry().count_active(EntityKind::Enemy), 4);
        for entity in sim.registry().active() {
            let body = sim.bridge().body_of(entity.id).unwrap();
            assert!(sim.physics().is_valid(body));
        }
        for state in sim.enemies().iter() {
            let p = sim.registry().get(state.entity).unwrap().position;
            assert!(p.distance(sim.player().position()) >= 200.0);
        }
    }

    #[test]
    fn same_seed_builds_same_level() {
        let a = SimulationState::new(config(5)).unwrap();
        let b = SimulationState::new(config(5)).unwrap();
        assert_eq!(a.rooms(), b.rooms());
        assert_eq!(a.player().position(), b.player().position());
        let pa: Vec<Vec2> = a.registry().iter().map(|e| e.position).collect();
        let pb: Vec<Vec2> = b.registry().iter().map(|e| e.position).collect();
        assert_eq!(pa, pb);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut bad = config(1);
        bad.level.width = 1;
        assert!(SimulationState::new(bad).is_err());
    }

    #[test]
    fn idle_ticks_advance() {
        let mut sim = SimulationState::new(config(8)).unwrap();
        for _ in 0..10 {
            sim.tick(&TickInput::default());
        }
        assert!(sim.ticks() > 0);
    }

    #[test]
    fn touching_an_enemy_ends_the_run() {
        let mut sim = SimulationState::new(config(13)).unwrap();
        let near = sim.player().position() + Vec2::new(20.0, 0.0);
        sim.enemies
            .spawn_at(near, &mut sim.registry, &mut sim.bridge, &mut sim.physics)
            .unwrap();

        let report = sim.tick(&TickInput::default());
        assert!(report.game_over);
        assert!(sim.is_game_over());

        let ticks = sim.ticks();
        let report = sim.tick(&TickInput::default());
        assert!(report.game_over);
        assert_eq!(sim.ticks(), ticks);

        sim.restart().unwrap();
        assert!(!sim.is_game_over());
        assert_eq!(sim.ticks(), 0);
        assert_ne!(sim.config().level.seed, 13);
    }

    #[test]
    fn kills_leave_corpses_and_trigger_waves() {
        let mut cfg = config(34);
        cfg.waves.kill_threshold = 2;
        let mut sim = SimulationState::new(cfg).unwrap();
        let props_before = sim.registry().count_active(EntityKind::Prop);
        let initial = enemy_ids(&sim);
        for id in &initial {
            sim.enemies.damage(*id, 1000.0, 0.0);
        }

        let report = sim.tick(&TickInput::default());
        assert_eq!(report.enemies_killed, 4);
        assert!(report.wave_started);
        assert_eq!(sim.waves().wave(), 2);
        assert_eq!(sim.registry().count_active(EntityKind::Enemy), 0);
        assert_eq!(sim.registry().count_active(EntityKind::Prop), props_before + 4);
        for id in &initial {
            assert!(sim.bridge().body_of(*id).is_none());
            assert!(!sim.enemies().contains(*id));
        }

        // Wave enemies: (3 + 1) + (3 + 2).
        let report = sim.tick(&TickInput::default());
        assert_eq!(report.spawned, 9);
        assert_eq!(sim.enemies().len(), 9);
        assert!((sim.waves().speed_multiplier() - 1.2).abs() < 1e-6);
    }

    /// Remove every prop so shots from the spawn point have a clear lane.
    fn clear_props(sim: &mut SimulationState) {
        let props: Vec<_> = sim
            .registry
            .active()
            .filter(|e| e.kind == EntityKind::Prop)
            .map(|e| e.id)
            .collect();
        for id in props {
            if let Some(body) = sim.bridge.unregister_body(id) {
                sim.physics.destroy_body(body);
            }
            sim.registry.remove(id);
        }
    }

    #[test]
    fn firing_spawns_a_projectile() {
        let mut sim = SimulationState::new(config(55)).unwrap();
        clear_props(&mut sim);
        let input = TickInput {
            fire: true,
            aim: sim.player().position() + Vec2::new(100.0, 0.0),
            select_element: Some(Element::Ice),
            ..TickInput::default()
        };
        sim.tick(&input);
        assert_eq!(sim.player().element(), Element::Ice);
        assert_eq!(sim.projectiles().len(), 1);

        // Still on cooldown: no second shot, and the first one is in flight.
        sim.tick(&input);
        assert_eq!(sim.projectiles().len(), 1);
    }

    #[test]
    fn diagonal_shot_leaves_the_player() {
        let mut sim = SimulationState::new(config(55)).unwrap();
        clear_props(&mut sim);
        let input = TickInput {
            fire: true,
            aim: sim.player().position() + Vec2::new(100.0, 100.0),
            ..TickInput::default()
        };
        sim.tick(&input);
        assert_eq!(sim.projectiles().len(), 1);

        sim.tick(&TickInput::default());
        assert_eq!(sim.projectiles().len(), 1);
        let shot = sim.projectiles().iter().next().unwrap();
        let p = sim.physics().position(shot.body).unwrap();
        let away = p - sim.player().position();
        assert!(away.x > 0.0 && away.y > 0.0);
    }
}

// spellforge/src/physics.rs
//! Narrow wrapper over the rapier world.
//!
//! Everything outside this module speaks pixels and [`BodyHandle`]s. One tile
//! is one meter; conversion happens only here.

use glam::Vec2;

use crate::error::{SimError, SimResult};
use crate::geometry::Contour;
use crate::grid::TILE_SIZE;

// Rapier is private implementation detail: do NOT re-export it.
use rapier2d::prelude::*;

pub const PIXELS_PER_METER: f32 = TILE_SIZE;

fn to_meters(v: Vec2) -> Vector<Real> {
    vector![v.x / PIXELS_PER_METER, v.y / PIXELS_PER_METER]
}

fn to_pixels(v: &Vector<Real>) -> Vec2 {
    Vec2::new(v.x * PIXELS_PER_METER, v.y * PIXELS_PER_METER)
}

/// Opaque handle to a body in the physics world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyHandle(RigidBodyHandle);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
    Static,
    Dynamic,
}

/// Collider shapes, sized in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
    Box { half: Vec2 },
    Circle { radius: f32 },
}

/// Collision categories. Everything collides with everything, except
/// projectiles ignore other projectiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CollisionLayer {
    Static,
    Player,
    DynamicProp,
    Enemy,
    Projectile,
}

impl CollisionLayer {
    const ALL: u32 = u32::MAX;

    pub const fn bits(self) -> u32 {
        match self {
            CollisionLayer::Static => 0x0001,
            CollisionLayer::Player => 0x0002,
            CollisionLayer::DynamicProp => 0x0004,
            CollisionLayer::Enemy => 0x0008,
            CollisionLayer::Projectile => 0x0010,
        }
    }

    pub const fn mask(self) -> u32 {
        match self {
            CollisionLayer::Projectile => Self::ALL & !CollisionLayer::Projectile.bits(),
            _ => Self::ALL,
        }
    }

    /// Whether colliders on these two layers generate contacts.
    pub const fn interacts_with(self, other: CollisionLayer) -> bool {
        self.bits() & other.mask() != 0 && other.bits() & self.mask() != 0
    }

    fn groups(self) -> InteractionGroups {
        InteractionGroups::new(self.bits(), self.mask())
    }
}

/// Two bodies that touched during a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BodyPair {
    pub a: BodyHandle,
    pub b: BodyHandle,
}

impl BodyPair {
    pub fn involves(&self, body: BodyHandle) -> bool {
        self.a == body || self.b == body
    }

    /// The participant that is not `body`, if `body` is one of them.
    pub fn other(&self, body: BodyHandle) -> Option<BodyHandle> {
        if self.a == body {
            Some(self.b)
        } else if self.b == body {
            Some(self.a)
        } else {
            None
        }
    }
}

/// Contact events of the most recent [`PhysicsWorld::step`] only.
#[derive(Clone, Debug, Default)]
pub struct ContactEvents {
    pub begin: Vec<BodyPair>,
    pub hit: Vec<BodyPair>,
    pub end: Vec<BodyPair>,
}

impl ContactEvents {
    /// Begin-touch and hit events, the ones that mean "in contact now".
    pub fn touching(&self) -> impl Iterator<Item = &BodyPair> {
        self.begin.iter().chain(self.hit.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.begin.is_empty() && self.hit.is_empty() && self.end.is_empty()
    }

    fn clear(&mut self) {
        self.begin.clear();
        self.hit.clear();
        self.end.clear();
    }
}

pub struct PhysicsWorld {
    // --- rapier internals ---
    pipeline: PhysicsPipeline,
    integration_parameters: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: BroadPhase,
    narrow_phase: NarrowPhase,
    rigid_bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,

    // Event channels
    event_recv_collision: crossbeam_channel::Receiver<CollisionEvent>,
    event_recv_contact_force: crossbeam_channel::Receiver<ContactForceEvent>,
    event_handler: ChannelEventCollector,

    events: ContactEvents,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    /// Create an empty top-down world (no gravity).
    pub fn new() -> Self {
        let (send_col, recv_col) = crossbeam_channel::unbounded();
        let (send_force, recv_force) = crossbeam_channel::unbounded();
        let event_handler = ChannelEventCollector::new(send_col, send_force);

        Self {
            pipeline: PhysicsPipeline::new(),
            integration_parameters: IntegrationParameters::default(),
            island_manager: IslandManager::new(),
            broad_phase: BroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),

            event_recv_collision: recv_col,
            event_recv_contact_force: recv_force,
            event_handler,

            events: ContactEvents::default(),
        }
    }

    /// Create a body without colliders. Position in pixels.
    pub fn create_body(&mut self, kind: BodyKind, position: Vec2, linear_damping: f32) -> BodyHandle {
        let rb_type = match kind {
            BodyKind::Static => RigidBodyType::Fixed,
            BodyKind::Dynamic => RigidBodyType::Dynamic,
        };
        let body = RigidBodyBuilder::new(rb_type)
            .translation(to_meters(position))
            .linear_damping(linear_damping)
            .build();
        BodyHandle(self.rigid_bodies.insert(body))
    }

    /// Remove a body and its colliders. Returns whether it existed.
    pub fn destroy_body(&mut self, body: BodyHandle) -> bool {
        self.rigid_bodies
            .remove(
                body.0,
                &mut self.island_manager,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some()
    }

    pub fn is_valid(&self, body: BodyHandle) -> bool {
        self.rigid_bodies.contains(body.0)
    }

    pub fn body_count(&self) -> usize {
        self.rigid_bodies.len()
    }

    /// Attach a solid collider that reports begin/end and hit events.
    pub fn add_collider(
        &mut self,
        body: BodyHandle,
        shape: Shape,
        density: f32,
        layer: CollisionLayer,
    ) -> SimResult<()> {
        if !self.is_valid(body) {
            return Err(SimError::StaleBody(body));
        }
        let rapier_shape = match shape {
            Shape::Box { half } => {
                SharedShape::cuboid(half.x / PIXELS_PER_METER, half.y / PIXELS_PER_METER)
            }
            Shape::Circle { radius } => SharedShape::ball(radius / PIXELS_PER_METER),
        };
        let collider = ColliderBuilder::new(rapier_shape)
            .density(density)
            .collision_groups(layer.groups())
            .active_events(ActiveEvents::COLLISION_EVENTS | ActiveEvents::CONTACT_FORCE_EVENTS)
            .build();
        self.colliders
            .insert_with_parent(collider, body.0, &mut self.rigid_bodies);
        Ok(())
    }

    /// Create one fixed body owning a closed chain per contour.
    pub fn add_static_loops(&mut self, contours: &[Contour]) -> BodyHandle {
        let ground = self.create_body(BodyKind::Static, Vec2::ZERO, 0.0);
        for contour in contours.iter().filter(|c| c.len() >= 3) {
            let vertices: Vec<Point<Real>> = contour
                .iter()
                .map(|p| point![p.x / PIXELS_PER_METER, p.y / PIXELS_PER_METER])
                .collect();
            let n = vertices.len() as u32;
            let indices: Vec<[u32; 2]> = (0..n).map(|i| [i, (i + 1) % n]).collect();
            let collider = ColliderBuilder::polyline(vertices, Some(indices))
                .collision_groups(CollisionLayer::Static.groups())
                .build();
            self.colliders
                .insert_with_parent(collider, ground.0, &mut self.rigid_bodies);
        }
        ground
    }

    /// Advance by `dt` seconds split into `substeps` equal steps.
    ///
    /// Forces added since the previous step act for the whole `dt` and are
    /// cleared afterwards. Contact events from the previous call are replaced.
    pub fn step(&mut self, dt: f32, substeps: u32) {
        let substeps = substeps.max(1);
        self.events.clear();
        self.integration_parameters.dt = dt / substeps as f32;

        let gravity = vector![0.0, 0.0];
        let hooks = &();

        for _ in 0..substeps {
            self.pipeline.step(
                &gravity,
                &self.integration_parameters,
                &mut self.island_manager,
                &mut self.broad_phase,
                &mut self.narrow_phase,
                &mut self.rigid_bodies,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                &mut self.ccd_solver,
                hooks,
                &self.event_handler,
            );
            self.collect_events();
        }

        for (_, body) in self.rigid_bodies.iter_mut() {
            body.reset_forces(false);
        }
    }

    /// Events generated by the last step.
    pub fn contact_events(&self) -> &ContactEvents {
        &self.events
    }

    // ------------------------------
    // Per-body queries/actions
    // ------------------------------

    pub fn position(&self, body: BodyHandle) -> Option<Vec2> {
        let b = self.rigid_bodies.get(body.0)?;
        Some(to_pixels(b.translation()))
    }

    /// Linear velocity in pixels per second.
    pub fn linear_velocity(&self, body: BodyHandle) -> Option<Vec2> {
        let b = self.rigid_bodies.get(body.0)?;
        Some(to_pixels(b.linvel()))
    }

    pub fn set_linear_velocity(&mut self, body: BodyHandle, vel: Vec2) {
        if let Some(b) = self.rigid_bodies.get_mut(body.0) {
            b.set_linvel(to_meters(vel), true);
        }
    }

    /// Add a force at the center of mass, in pixel units.
    pub fn apply_force(&mut self, body: BodyHandle, force: Vec2) {
        if let Some(b) = self.rigid_bodies.get_mut(body.0) {
            b.add_force(to_meters(force), true);
        }
    }

    /// Apply an impulse at the center of mass, in pixel units.
    pub fn apply_impulse(&mut self, body: BodyHandle, impulse: Vec2) {
        if let Some(b) = self.rigid_bodies.get_mut(body.0) {
            b.apply_impulse(to_meters(impulse), true);
        }
    }

    pub fn lock_rotations(&mut self, body: BodyHandle, locked: bool) {
        if let Some(b) = self.rigid_bodies.get_mut(body.0) {
            b.lock_rotations(locked, true);
        }
    }

    /// Continuous collision detection for fast bodies.
    pub fn enable_ccd(&mut self, body: BodyHandle, enabled: bool) {
        if let Some(b) = self.rigid_bodies.get_mut(body.0) {
            b.enable_ccd(enabled);
        }
    }

    // ------------------------------
    // Private helpers
    // ------------------------------

    fn collect_events(&mut self) {
        while let Ok(ev) = self.event_recv_collision.try_recv() {
            match ev {
                CollisionEvent::Started(c1, c2, _) => {
                    if let Some(pair) = self.map_pair(c1, c2) {
                        self.events.begin.push(pair);
                    }
                }
                CollisionEvent::Stopped(c1, c2, _) => {
                    if let Some(pair) = self.map_pair(c1, c2) {
                        self.events.end.push(pair);
                    }
                }
            }
        }

        while let Ok(ev) = self.event_recv_contact_force.try_recv() {
            if let Some(pair) = self.map_pair(ev.collider1, ev.collider2) {
                self.events.hit.push(pair);
            }
        }
    }

    /// Colliders removed during the step no longer resolve and are dropped.
    fn map_pair(&self, c1: ColliderHandle, c2: ColliderHandle) -> Option<BodyPair> {
        let b1 = self.colliders.get(c1)?.parent()?;
        let b2 = self.colliders.get(c2)?.parent()?;
        Some(BodyPair {
            a: BodyHandle(b1),
            b: BodyHandle(b2),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn box_body(world: &mut PhysicsWorld, pos: Vec2, layer: CollisionLayer) -> BodyHandle {
        let body = world.create_body(BodyKind::Dynamic, pos, 0.0);
        world
            .add_collider(body, Shape::Box { half: Vec2::splat(10.0) }, 1.0, layer)
            .unwrap();
        body
    }

    #[test]
    fn layers_filter_projectile_pairs() {
        use CollisionLayer::*;
        assert!(Player.interacts_with(Enemy));
        assert!(Projectile.interacts_with(Enemy));
        assert!(Projectile.interacts_with(Static));
        assert!(DynamicProp.interacts_with(Projectile));
        assert!(!Projectile.interacts_with(Projectile));
    }

    #[test]
    fn positions_round_trip_in_pixels() {
        let mut world = PhysicsWorld::new();
        let body = box_body(&mut world, Vec2::new(96.0, 64.0), CollisionLayer::DynamicProp);
        let p = world.position(body).unwrap();
        assert!((p - Vec2::new(96.0, 64.0)).length() < 1e-3);
    }

    #[test]
    fn velocity_moves_body_without_gravity() {
        let mut world = PhysicsWorld::new();
        let body = box_body(&mut world, Vec2::new(100.0, 100.0), CollisionLayer::Player);
        world.set_linear_velocity(body, Vec2::new(32.0, 0.0));
        for _ in 0..20 {
            world.step(0.05, 4);
        }
        let p = world.position(body).unwrap();
        assert!((p.x - 132.0).abs() < 0.5, "x = {}", p.x);
        assert!((p.y - 100.0).abs() < 1e-3);
    }

    #[test]
    fn forces_are_cleared_after_each_step() {
        let mut world = PhysicsWorld::new();
        let body = box_body(&mut world, Vec2::ZERO, CollisionLayer::DynamicProp);
        world.apply_force(body, Vec2::new(50.0, 0.0));
        world.step(0.05, 1);
        let v1 = world.linear_velocity(body).unwrap();
        world.step(0.05, 1);
        let v2 = world.linear_velocity(body).unwrap();
        assert!(v1.x > 0.0);
        assert!((v2.x - v1.x).abs() < 1e-4);
    }

    #[test]
    fn destroyed_body_is_invalid_and_rejects_colliders() {
        let mut world = PhysicsWorld::new();
        let body = box_body(&mut world, Vec2::ZERO, CollisionLayer::Enemy);
        assert!(world.destroy_body(body));
        assert!(!world.destroy_body(body));
        assert!(!world.is_valid(body));
        assert!(world.position(body).is_none());
        let err = world.add_collider(body, Shape::Circle { radius: 4.0 }, 1.0, CollisionLayer::Enemy);
        assert!(matches!(err, Err(SimError::StaleBody(_))));
    }

    #[test]
    fn overlapping_bodies_report_begin_contact() {
        let mut world = PhysicsWorld::new();
        let a = box_body(&mut world, Vec2::new(100.0, 100.0), CollisionLayer::Player);
        let b = box_body(&mut world, Vec2::new(110.0, 100.0), CollisionLayer::Enemy);
        world.step(0.05, 4);
        let events = world.contact_events();
        assert!(events
            .begin
            .iter()
            .any(|p| p.involves(a) && p.other(a) == Some(b)));

        // Events only describe the latest step.
        world.step(0.05, 4);
        assert!(world.contact_events().begin.iter().all(|p| !(p.involves(a) && p.involves(b))));
    }

    #[test]
    fn projectiles_pass_through_each_other() {
        let mut world = PhysicsWorld::new();
        let a = box_body(&mut world, Vec2::new(50.0, 50.0), CollisionLayer::Projectile);
        let b = box_body(&mut world, Vec2::new(55.0, 50.0), CollisionLayer::Projectile);
        world.step(0.05, 4);
        assert!(!world.contact_events().touching().any(|p| p.involves(a) && p.involves(b)));
    }

    #[test]
    fn static_loops_block_dynamic_bodies() {
        let mut world = PhysicsWorld::new();
        // A 4x4 tile box, walls drawn as one closed loop.
        let contour = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(128.0, 0.0),
            Vec2::new(128.0, 128.0),
            Vec2::new(0.0, 128.0),
        ];
        world.add_static_loops(&[contour]);
        let body = box_body(&mut world, Vec2::new(64.0, 64.0), CollisionLayer::Player);
        world.set_linear_velocity(body, Vec2::new(200.0, 0.0));
        for _ in 0..40 {
            world.step(0.05, 4);
        }
        let p = world.position(body).unwrap();
        assert!(p.x < 128.0, "escaped to x = {}", p.x);
    }
}

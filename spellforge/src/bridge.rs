//! Entity ↔ body identity and deferred mutation of the physics world.

use std::collections::{HashMap, HashSet};

use glam::Vec2;
use log::{debug, info, warn};

use crate::enemy::EnemyController;
use crate::entity::{Color, EntityId, EntityKind, EntityRegistry};
use crate::error::SimResult;
use crate::physics::{BodyHandle, BodyKind, CollisionLayer, ContactEvents, PhysicsWorld, Shape};

pub const CORPSE_HALF_EXTENT: f32 = 6.0;
pub const CORPSE_DENSITY: f32 = 5.0;

/// How to build the body that backs an entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodySpec {
    pub kind: BodyKind,
    pub shape: Shape,
    pub density: f32,
    pub layer: CollisionLayer,
    pub linear_damping: f32,
}

impl BodySpec {
    /// Rotation-locked dynamic box.
    pub fn dynamic_box(half: Vec2, density: f32, layer: CollisionLayer) -> Self {
        Self {
            kind: BodyKind::Dynamic,
            shape: Shape::Box { half },
            density,
            layer,
            linear_damping: 0.0,
        }
    }

    pub fn with_damping(mut self, damping: f32) -> Self {
        self.linear_damping = damping;
        self
    }
}

/// A dead entity waiting for the post-step flush.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeletionRequest {
    pub entity: EntityId,
    pub kind: EntityKind,
    pub position: Vec2,
}

/// What a [`PhysicsBridge::flush_deletions`] call did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub removed: usize,
    pub corpses: Vec<EntityId>,
    pub enemies_killed: u32,
}

#[derive(Debug, Default)]
pub struct PhysicsBridge {
    bodies: HashMap<EntityId, BodyHandle>,
    owners: HashMap<BodyHandle, EntityId>,
    pending: Vec<DeletionRequest>,
    queued: HashSet<EntityId>,
}

impl PhysicsBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `entity` with `body`, replacing any previous association of
    /// either side.
    pub fn register_body(&mut self, entity: EntityId, body: BodyHandle) {
        if let Some(old_body) = self.bodies.insert(entity, body) {
            self.owners.remove(&old_body);
        }
        if let Some(old_entity) = self.owners.insert(body, entity) {
            if old_entity != entity {
                self.bodies.remove(&old_entity);
            }
        }
    }

    /// Drop both directions of the mapping. Returns the body that was mapped.
    pub fn unregister_body(&mut self, entity: EntityId) -> Option<BodyHandle> {
        let body = self.bodies.remove(&entity)?;
        self.owners.remove(&body);
        Some(body)
    }

    /// Body backing `entity`, if any.
    pub fn body_of(&self, entity: EntityId) -> Option<BodyHandle> {
        self.bodies.get(&entity).copied()
    }

    /// Entity that owns `body`, if any.
    pub fn entity_of(&self, body: BodyHandle) -> Option<EntityId> {
        self.owners.get(&body).copied()
    }

    /// Number of entity/body pairs.
    pub fn mapped_count(&self) -> usize {
        self.bodies.len()
    }

    /// Create a body for an existing entity and register it.
    pub fn spawn_body(
        &mut self,
        physics: &mut PhysicsWorld,
        entity: EntityId,
        position: Vec2,
        spec: &BodySpec,
    ) -> SimResult<BodyHandle> {
        let body = physics.create_body(spec.kind, position, spec.linear_damping);
        physics.lock_rotations(body, true);
        if let Err(e) = physics.add_collider(body, spec.shape, spec.density, spec.layer) {
            physics.destroy_body(body);
            return Err(e);
        }
        self.register_body(entity, body);
        Ok(body)
    }

    /// Defer destruction of an entity until the next flush. Returns false
    /// when the entity was already queued.
    pub fn queue_deletion(&mut self, request: DeletionRequest) -> bool {
        if !self.queued.insert(request.entity) {
            return false;
        }
        debug!("queued {:?} {:?} for deletion", request.kind, request.entity);
        self.pending.push(request);
        true
    }

    /// Whether `entity` is waiting for the next flush.
    pub fn is_queued(&self, entity: EntityId) -> bool {
        self.queued.contains(&entity)
    }

    /// Queued deletions not yet flushed.
    pub fn pending_deletions(&self) -> usize {
        self.pending.len()
    }

    /// Apply every queued deletion. Must run after the physics step.
    ///
    /// Enemy deletions leave a corpse prop at the death position and drop the
    /// enemy's AI state.
    pub fn flush_deletions(
        &mut self,
        physics: &mut PhysicsWorld,
        registry: &mut EntityRegistry,
        enemies: &mut EnemyController,
    ) -> FlushReport {
        let mut report = FlushReport::default();
        let pending = std::mem::take(&mut self.pending);
        self.queued.clear();

        for req in pending {
            if let Some(body) = self.unregister_body(req.entity) {
                if !physics.destroy_body(body) {
                    warn!("body of {:?} was already gone at flush", req.entity);
                }
            }
            if registry.get(req.entity).is_none() {
                continue;
            }
            registry.deactivate(req.entity);
            registry.remove(req.entity);
            report.removed += 1;

            if req.kind == EntityKind::Enemy {
                enemies.remove(req.entity);
                report.enemies_killed += 1;
                match self.spawn_corpse(physics, registry, req.position) {
                    Ok(corpse) => report.corpses.push(corpse),
                    Err(e) => warn!("failed to spawn corpse for {:?}: {e}", req.entity),
                }
            }
        }

        if report.removed > 0 {
            debug!(
                "flushed {} deletions, {} enemies killed",
                report.removed, report.enemies_killed
            );
        }
        report
    }

    /// Decorative prop left behind by a dead enemy.
    pub fn spawn_corpse(
        &mut self,
        physics: &mut PhysicsWorld,
        registry: &mut EntityRegistry,
        position: Vec2,
    ) -> SimResult<EntityId> {
        let half = Vec2::splat(CORPSE_HALF_EXTENT);
        let id = registry.create(EntityKind::Prop, position, half, Color::BLACK);
        let spec = BodySpec::dynamic_box(half, CORPSE_DENSITY, CollisionLayer::DynamicProp);
        if let Err(e) = self.spawn_body(physics, id, position, &spec) {
            registry.remove(id);
            return Err(e);
        }
        info!("corpse {id:?} spawned at ({:.0}, {:.0})", position.x, position.y);
        Ok(id)
    }

    /// True when the player touched an active enemy during the last step.
    ///
    /// Reads events only; unmapped or stale bodies simply don't match.
    pub fn process_player_enemy_contact(
        &self,
        events: &ContactEvents,
        player_body: BodyHandle,
        registry: &EntityRegistry,
    ) -> bool {
        for pair in events.touching() {
            let Some(other) = pair.other(player_body) else {
                continue;
            };
            let Some(entity) = self.entity_of(other) else {
                continue;
            };
            if registry.is_active_kind(entity, EntityKind::Enemy) {
                info!("player touched enemy {entity:?}");
                return true;
            }
        }
        false
    }

    /// Copy body positions back into the registry after a step.
    pub fn sync_positions(&self, physics: &PhysicsWorld, registry: &mut EntityRegistry) {
        for (&entity, &body) in &self.bodies {
            if let Some(position) = physics.position(body) {
                registry.set_position(entity, position);
            }
        }
    }
}

//! Player offense: elemental projectiles and telekinetic props.

use std::collections::HashSet;

use glam::Vec2;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::bridge::{DeletionRequest, PhysicsBridge};
use crate::enemy::EnemyController;
use crate::entity::{Charge, Element, EntityId, EntityKind, EntityRegistry};
use crate::error::SimResult;
use crate::physics::{BodyHandle, BodyKind, CollisionLayer, ContactEvents, PhysicsWorld, Shape};

/// Damage dealt by one elemental hit, plus how long it slows.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HitEffect {
    pub damage: f32,
    pub slow: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatTuning {
    /// Gap in px between the shooter's box corner and a new projectile.
    pub spawn_margin: f32,
    pub projectile_radius: f32,
    pub projectile_density: f32,
    /// Launch impulse in px-scaled units.
    pub projectile_impulse: f32,
    /// Seconds before an unspent projectile is removed.
    pub projectile_lifetime: f32,
    /// Minimum seconds between shots.
    pub fire_interval: f32,
    pub fire_projectile: HitEffect,
    pub ice_projectile: HitEffect,
    pub fire_prop: HitEffect,
    pub ice_prop: HitEffect,
    /// Orbit radius in px of held props.
    pub orbit_radius: f32,
    /// Pull toward the orbit radius.
    pub orbit_spring: f32,
    /// Tangential push that keeps held props circling.
    pub orbit_spin: f32,
    pub launch_impulse: f32,
}

impl Default for CombatTuning {
    fn default() -> Self {
        Self {
            spawn_margin: 2.0,
            projectile_radius: 4.0,
            projectile_density: 0.5,
            projectile_impulse: 5.0,
            projectile_lifetime: 3.0,
            fire_interval: 0.25,
            fire_projectile: HitEffect { damage: 50.0, slow: 0.0 },
            ice_projectile: HitEffect { damage: 25.0, slow: 2.0 },
            fire_prop: HitEffect { damage: 100.0, slow: 0.0 },
            ice_prop: HitEffect { damage: 90.0, slow: 3.0 },
            orbit_radius: 64.0,
            orbit_spring: 10.0,
            orbit_spin: 8.0,
            launch_impulse: 40.0,
        }
    }
}

impl CombatTuning {
    /// Distance from the shooter's center at which a projectile spawns. The
    /// box corner is the farthest point of the shooter, so shots at any angle
    /// start clear of it.
    pub fn spawn_distance(&self, shooter_half: f32) -> f32 {
        shooter_half * std::f32::consts::SQRT_2 + self.projectile_radius + self.spawn_margin
    }

    pub fn projectile_effect(&self, element: Element) -> HitEffect {
        match element {
            Element::Fire => self.fire_projectile,
            Element::Ice => self.ice_projectile,
        }
    }

    pub fn prop_effect(&self, element: Element) -> HitEffect {
        match element {
            Element::Fire => self.fire_prop,
            Element::Ice => self.ice_prop,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projectile {
    pub body: BodyHandle,
    pub element: Element,
    pub age: f32,
}

/// Live projectiles. They are not registry entities and own their bodies.
#[derive(Debug, Default)]
pub struct ProjectileSystem {
    projectiles: Vec<Projectile>,
    cooldown: f32,
}

impl ProjectileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.projectiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projectiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Projectile> {
        self.projectiles.iter()
    }

    /// Fire from a shooter box centered at `origin` toward `aim`. Returns
    /// `Ok(None)` while on cooldown or when the aim point is the origin itself.
    pub fn fire(
        &mut self,
        tuning: &CombatTuning,
        physics: &mut PhysicsWorld,
        origin: Vec2,
        shooter_half: f32,
        aim: Vec2,
        element: Element,
    ) -> SimResult<Option<BodyHandle>> {
        let dir = (aim - origin).normalize_or_zero();
        if self.cooldown > 0.0 || dir == Vec2::ZERO {
            return Ok(None);
        }

        let position = origin + dir * tuning.spawn_distance(shooter_half);
        let body = physics.create_body(BodyKind::Dynamic, position, 0.0);
        physics.enable_ccd(body, true);
        physics.add_collider(
            body,
            Shape::Circle {
                radius: tuning.projectile_radius,
            },
            tuning.projectile_density,
            CollisionLayer::Projectile,
        )?;
        physics.apply_impulse(body, dir * tuning.projectile_impulse);

        self.projectiles.push(Projectile { body, element, age: 0.0 });
        self.cooldown = tuning.fire_interval;
        debug!("fired {element:?} projectile");
        Ok(Some(body))
    }

    /// Apply this step's projectile hits. Any begin-touch retires the
    /// projectile; damage lands only on active enemies. Returns the number of
    /// enemies hit.
    pub fn process_hits(
        &mut self,
        tuning: &CombatTuning,
        events: &ContactEvents,
        physics: &mut PhysicsWorld,
        bridge: &PhysicsBridge,
        registry: &EntityRegistry,
        enemies: &mut EnemyController,
    ) -> usize {
        let mut spent: HashSet<BodyHandle> = HashSet::new();
        let mut hits = 0;

        for pair in &events.begin {
            for (mine, other) in [(pair.a, pair.b), (pair.b, pair.a)] {
                if spent.contains(&mine) {
                    continue;
                }
                let Some(projectile) = self.projectiles.iter().find(|p| p.body == mine) else {
                    continue;
                };
                spent.insert(mine);

                let Some(target) = bridge.entity_of(other) else {
                    continue;
                };
                if !registry.is_active_kind(target, EntityKind::Enemy) {
                    continue;
                }
                let effect = tuning.projectile_effect(projectile.element);
                enemies.damage(target, effect.damage, effect.slow);
                hits += 1;
            }
        }

        // Bodies are destroyed only after every event has been read.
        if !spent.is_empty() {
            self.projectiles.retain(|p| !spent.contains(&p.body));
            for body in spent {
                physics.destroy_body(body);
            }
        }
        hits
    }

    /// Age projectiles and the fire cooldown; expired projectiles are removed.
    pub fn update(&mut self, dt: f32, tuning: &CombatTuning, physics: &mut PhysicsWorld) {
        self.cooldown = (self.cooldown - dt).max(0.0);
        self.projectiles.retain_mut(|p| {
            p.age += dt;
            if p.age >= tuning.projectile_lifetime {
                physics.destroy_body(p.body);
                false
            } else {
                true
            }
        });
    }
}

/// Grab nearby props into an orbit around the player.
///
/// Props first grabbed take the current element as their charge and keep it.
pub fn hold_props(
    tuning: &CombatTuning,
    player_pos: Vec2,
    element: Element,
    registry: &mut EntityRegistry,
    bridge: &PhysicsBridge,
    physics: &mut PhysicsWorld,
) -> usize {
    let orbit = tuning.orbit_radius;
    let candidates: Vec<EntityId> = registry
        .active()
        .filter(|e| e.kind != EntityKind::Enemy)
        .map(|e| e.id)
        .collect();

    let mut held = 0;
    for id in candidates {
        let Some(body) = bridge.body_of(id) else {
            continue;
        };
        let Some(position) = physics.position(body) else {
            continue;
        };
        let offset = position - player_pos;
        let dist = offset.length();
        if !(2.0..=2.0 * orbit).contains(&dist) {
            continue;
        }

        // A prop keeps its element while held; a fresh grab takes the current one.
        let charge = match registry.charge(id) {
            Some(c) if c.held => c,
            _ => {
                registry.set_color(id, element.color());
                Charge { element, held: true }
            }
        };
        registry.set_charge(id, charge);

        let dir = offset / dist;
        let tangent = Vec2::new(-dir.y, dir.x);
        let radial_error = dist - orbit;
        let impulse = dir * (-radial_error * tuning.orbit_spring * 0.02)
            + tangent * (tuning.orbit_spin * 0.015);
        physics.apply_impulse(body, impulse);
        if let Some(v) = physics.linear_velocity(body) {
            physics.set_linear_velocity(body, v * 0.97);
        }
        held += 1;
    }
    held
}

/// Throw held props in the orbit band radially outward and release them.
pub fn launch_props(
    tuning: &CombatTuning,
    player_pos: Vec2,
    registry: &mut EntityRegistry,
    bridge: &PhysicsBridge,
    physics: &mut PhysicsWorld,
) -> usize {
    let orbit = tuning.orbit_radius;
    let held: Vec<(EntityId, Charge)> = registry
        .active()
        .filter_map(|e| registry.charge(e.id).filter(|c| c.held).map(|c| (e.id, c)))
        .collect();

    let mut launched = 0;
    for (id, charge) in held {
        registry.set_charge(id, Charge { held: false, ..charge });
        let Some(body) = bridge.body_of(id) else {
            continue;
        };
        let Some(position) = physics.position(body) else {
            continue;
        };
        let offset = position - player_pos;
        let dist = offset.length();
        if dist < 0.5 * orbit || dist > 1.5 * orbit {
            continue;
        }
        physics.apply_impulse(body, offset / dist * tuning.launch_impulse);
        launched += 1;
    }
    if launched > 0 {
        info!("launched {launched} props");
    }
    launched
}

/// Mark every held prop as released without throwing it.
pub fn release_props(registry: &mut EntityRegistry) {
    let held: Vec<(EntityId, Charge)> = registry
        .active()
        .filter_map(|e| registry.charge(e.id).filter(|c| c.held).map(|c| (e.id, c)))
        .collect();
    for (id, charge) in held {
        registry.set_charge(id, Charge { held: false, ..charge });
    }
}

/// Charged props that touched an enemy this step deal their element's damage
/// and are queued for deletion. Returns the number of hits.
pub fn process_prop_hits(
    tuning: &CombatTuning,
    events: &ContactEvents,
    bridge: &mut PhysicsBridge,
    registry: &EntityRegistry,
    enemies: &mut EnemyController,
    physics: &PhysicsWorld,
) -> usize {
    let mut hits = 0;
    for pair in events.touching() {
        let (Some(a), Some(b)) = (bridge.entity_of(pair.a), bridge.entity_of(pair.b)) else {
            continue;
        };
        for (prop, enemy) in [(a, b), (b, a)] {
            if !registry.is_active_kind(enemy, EntityKind::Enemy) || bridge.is_queued(prop) {
                continue;
            }
            let Some(charge) = registry.charge(prop) else {
                continue;
            };
            let Some(entity) = registry.get_active(prop) else {
                continue;
            };
            let effect = tuning.prop_effect(charge.element);
            enemies.damage(enemy, effect.damage, effect.slow);
            let position = bridge
                .body_of(prop)
                .and_then(|b| physics.position(b))
                .unwrap_or(entity.position);
            bridge.queue_deletion(DeletionRequest {
                entity: prop,
                kind: entity.kind,
                position,
            });
            info!("{:?} prop {prop:?} hit enemy {enemy:?}", charge.element);
            hits += 1;
        }
    }
    hits
}

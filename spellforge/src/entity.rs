//! Gameplay entities and their registry.
//!
//! Entities live in a packed array for dense iteration. A side map from
//! [`EntityId`] to slot keeps lookups stable across swap-removal.

use std::collections::HashMap;

use glam::Vec2;
use log::info;

use crate::grid::TileGrid;
use crate::rng::XorShift32;

/// Unique identifier for an entity. Never reused within a registry's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u32);

impl EntityId {
    /// Get the underlying integer ID (useful for debugging or logs).
    pub fn to_u32(self) -> u32 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Prop,
    Enemy,
    Item,
    Ability,
}

/// Elemental charge carried by projectiles and telekinetic props.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Element {
    Fire,
    Ice,
}

impl Element {
    pub fn color(self) -> Color {
        match self {
            Element::Fire => Color::rgb(255, 80, 20),
            Element::Ice => Color::rgb(100, 180, 255),
        }
    }
}

/// RGBA color exposed to the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const BLACK: Color = Color([0, 0, 0, 255]);
    pub const GREEN: Color = Color([0, 228, 48, 255]);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }
}

/// Telekinesis state of a prop. Only props that have been grabbed carry one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Charge {
    pub element: Element,
    /// Currently orbiting the player.
    pub held: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    /// Center in pixels.
    pub position: Vec2,
    pub half_extent: Vec2,
    pub color: Color,
    pub active: bool,
}

/// Owns every gameplay entity of one level.
#[derive(Debug)]
pub struct EntityRegistry {
    next_id: u32,
    pool: Vec<Entity>,
    slots: HashMap<EntityId, usize>,
    charges: HashMap<EntityId, Charge>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            pool: Vec::new(),
            slots: HashMap::new(),
            charges: HashMap::new(),
        }
    }

    /// Create an active entity and return its id.
    pub fn create(&mut self, kind: EntityKind, position: Vec2, half_extent: Vec2, color: Color) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.slots.insert(id, self.pool.len());
        self.pool.push(Entity {
            id,
            kind,
            position,
            half_extent,
            color,
            active: true,
        });
        id
    }

    /// Mark an entity inactive without removing it. Returns whether it was active.
    pub fn deactivate(&mut self, id: EntityId) -> bool {
        match self.get_mut(id) {
            Some(e) if e.active => {
                e.active = false;
                true
            }
            _ => false,
        }
    }

    /// Remove an entity from the pool, moving the last entity into its slot.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let slot = self.slots.remove(&id)?;
        let removed = self.pool.swap_remove(slot);
        if let Some(moved) = self.pool.get(slot) {
            self.slots.insert(moved.id, slot);
        }
        self.charges.remove(&id);
        Some(removed)
    }

    /// Look up an entity by id, active or not.
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.slots.get(&id).map(|&slot| &self.pool[slot])
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let slot = *self.slots.get(&id)?;
        self.pool.get_mut(slot)
    }

    /// Only active entities.
    pub fn get_active(&self, id: EntityId) -> Option<&Entity> {
        self.get(id).filter(|e| e.active)
    }

    pub fn is_active_kind(&self, id: EntityId, kind: EntityKind) -> bool {
        self.get_active(id).is_some_and(|e| e.kind == kind)
    }

    pub fn set_position(&mut self, id: EntityId, position: Vec2) {
        if let Some(e) = self.get_mut(id) {
            e.position = position;
        }
    }

    pub fn set_color(&mut self, id: EntityId, color: Color) {
        if let Some(e) = self.get_mut(id) {
            e.color = color;
        }
    }

    pub fn charge(&self, id: EntityId) -> Option<Charge> {
        self.charges.get(&id).copied()
    }

    pub fn set_charge(&mut self, id: EntityId, charge: Charge) {
        if self.slots.contains_key(&id) {
            self.charges.insert(id, charge);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.pool.iter()
    }

    pub fn active(&self) -> impl Iterator<Item = &Entity> {
        self.pool.iter().filter(|e| e.active)
    }

    pub fn count_active(&self, kind: EntityKind) -> usize {
        self.active().filter(|e| e.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// True when an AABB overlaps any active entity.
    pub fn overlaps_any(&self, position: Vec2, half_extent: Vec2) -> bool {
        self.active().any(|e| {
            let d = (e.position - position).abs();
            d.x <= e.half_extent.x + half_extent.x && d.y <= e.half_extent.y + half_extent.y
        })
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Scatter crate props over open floor.
///
/// Candidates are floor tiles whose 3x3 neighborhood is all floor. They are
/// shuffled and consumed until a random target in `[min_count, max_count]` is
/// reached, skipping any whose box would overlap an existing entity.
pub fn spawn_props(
    registry: &mut EntityRegistry,
    grid: &TileGrid,
    rng: &mut XorShift32,
    min_count: u32,
    max_count: u32,
    half_extent: Vec2,
) -> Vec<EntityId> {
    let mut candidates: Vec<_> = grid
        .iter_coords()
        .filter(|c| grid.is_floor(*c) && grid.has_clearance(*c, 1))
        .collect();
    if candidates.is_empty() {
        return Vec::new();
    }

    let max_count = max_count.max(min_count);
    let target = rng.range(min_count as i32, max_count as i32) as usize;
    rng.shuffle(&mut candidates);

    let mut spawned = Vec::with_capacity(target);
    for coord in candidates {
        if spawned.len() >= target {
            break;
        }
        let position = grid.grid_to_world(coord);
        if registry.overlaps_any(position, half_extent) {
            continue;
        }
        spawned.push(registry.create(EntityKind::Prop, position, half_extent, Color::BLACK));
    }

    info!("scattered {} props (target {target})", spawned.len());
    spawned
}

/// Pixel center of a random floor tile with a `(2r+1)^2` floor clearance, or
/// the level center when none exists.
pub fn find_open_spawn(grid: &TileGrid, rng: &mut XorShift32, radius: i32) -> Vec2 {
    let candidates: Vec<_> = grid
        .iter_coords()
        .filter(|c| grid.is_floor(*c) && grid.has_clearance(*c, radius))
        .collect();
    if candidates.is_empty() {
        return grid.pixel_size() * 0.5;
    }
    let pick = rng.range(0, candidates.len() as i32 - 1) as usize;
    grid.grid_to_world(candidates[pick])
}

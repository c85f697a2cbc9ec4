//! The player avatar. It owns a physics body but is not a registry entity.

use glam::Vec2;
use log::info;
use serde::{Deserialize, Serialize};

use crate::entity::{find_open_spawn, Element};
use crate::error::SimResult;
use crate::grid::TileGrid;
use crate::physics::{BodyHandle, BodyKind, CollisionLayer, PhysicsWorld, Shape};
use crate::rng::XorShift32;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerTuning {
    /// Movement speed in px/s.
    pub speed: f32,
    pub half_extent: f32,
    pub linear_damping: f32,
    pub density: f32,
    /// Required floor radius (in tiles) around the spawn tile.
    pub spawn_clearance: i32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            speed: 200.0,
            half_extent: 12.0,
            linear_damping: 10.0,
            density: 1.0,
            spawn_clearance: 3,
        }
    }
}

#[derive(Debug)]
pub struct Player {
    body: BodyHandle,
    position: Vec2,
    half_extent: f32,
    speed: f32,
    element: Element,
}

impl Player {
    /// Spawn on a random open floor tile, or the level center if the level
    /// has no open area.
    pub fn spawn(
        tuning: &PlayerTuning,
        grid: &TileGrid,
        rng: &mut XorShift32,
        physics: &mut PhysicsWorld,
    ) -> SimResult<Self> {
        let position = find_open_spawn(grid, rng, tuning.spawn_clearance);
        let body = physics.create_body(BodyKind::Dynamic, position, tuning.linear_damping);
        physics.lock_rotations(body, true);
        physics.add_collider(
            body,
            Shape::Box {
                half: Vec2::splat(tuning.half_extent),
            },
            tuning.density,
            CollisionLayer::Player,
        )?;
        info!("player spawned at ({:.0}, {:.0})", position.x, position.y);
        Ok(Self {
            body,
            position,
            half_extent: tuning.half_extent,
            speed: tuning.speed,
            element: Element::Fire,
        })
    }

    pub fn body(&self) -> BodyHandle {
        self.body
    }

    /// Position as of the last [`Player::sync`].
    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn half_extent(&self) -> f32 {
        self.half_extent
    }

    pub fn element(&self) -> Element {
        self.element
    }

    pub fn set_element(&mut self, element: Element) {
        self.element = element;
    }

    /// Set velocity from an input direction. Non-unit input is normalized;
    /// zero input stops the player.
    pub fn apply_input(&self, physics: &mut PhysicsWorld, direction: Vec2) {
        let velocity = direction.normalize_or_zero() * self.speed;
        physics.set_linear_velocity(self.body, velocity);
    }

    /// Read the body position back after a physics step.
    pub fn sync(&mut self, physics: &PhysicsWorld) {
        if let Some(p) = physics.position(self.body) {
            self.position = p;
        }
    }
}

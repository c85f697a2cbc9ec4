//! SpellForge - simulation core of a top-down action game.
//!
//! Procedural tile levels, enemy chase AI over A* paths, static wall colliders
//! traced from the tile grid, and the entity/physics-body lifecycle that ties
//! gameplay state to a rapier world.

pub mod bridge;
pub mod combat;
pub mod config;
pub mod enemy;
pub mod entity;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod levelgen;
pub mod pathfinding;
pub mod physics;
pub mod player;
pub mod rng;
pub mod sim;
pub mod waves;

pub use crate::bridge::{BodySpec, DeletionRequest, FlushReport, PhysicsBridge};
pub use crate::combat::{CombatTuning, ProjectileSystem};
pub use crate::config::SimConfig;
pub use crate::enemy::{ChaseTuning, EnemyController, EnemyState};
pub use crate::entity::{Color, Element, Entity, EntityId, EntityKind, EntityRegistry};
pub use crate::error::{SimError, SimResult};
pub use crate::geometry::{trace_wall_contours, Contour};
pub use crate::grid::{GridCoord, Tile, TileGrid, TILE_SIZE};
pub use crate::levelgen::{generate, LevelGenParams, Room};
pub use crate::pathfinding::{has_line_of_sight, AStarPathfinder};
pub use crate::physics::{BodyHandle, BodyKind, CollisionLayer, ContactEvents, PhysicsWorld};
pub use crate::player::Player;
pub use crate::sim::{SimulationState, TickInput, TickReport};
pub use crate::waves::WaveDirector;
pub use glam::Vec2;

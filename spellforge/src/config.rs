//! Serde configuration for one simulation run.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::combat::CombatTuning;
use crate::enemy::ChaseTuning;
use crate::error::{SimError, SimResult};
use crate::levelgen::LevelGenParams;
use crate::player::PlayerTuning;
use crate::waves::WaveTuning;

/// Fixed-step settings for the physics world.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsTuning {
    /// Seconds per simulation tick.
    pub tick: f32,
    pub substeps: u32,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            tick: 1.0 / 20.0,
            substeps: 4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropTuning {
    pub min_count: u32,
    pub max_count: u32,
    pub half_extent: f32,
    pub density: f32,
    pub linear_damping: f32,
}

impl Default for PropTuning {
    fn default() -> Self {
        Self {
            min_count: 10,
            max_count: 20,
            half_extent: 10.0,
            density: 1.0,
            linear_damping: 2.0,
        }
    }
}

/// Every tunable of one run. Missing JSON fields keep their defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub level: LevelGenParams,
    pub physics: PhysicsTuning,
    pub player: PlayerTuning,
    pub props: PropTuning,
    pub chase: ChaseTuning,
    pub combat: CombatTuning,
    pub waves: WaveTuning,
}

impl SimConfig {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> SimResult<()> {
        let l = &self.level;
        if l.width < 3 || l.height < 3 {
            return Err(SimError::GridTooSmall {
                width: l.width,
                height: l.height,
            });
        }
        check(l.room_min_w >= 1 && l.room_min_h >= 1, "room sizes must be positive")?;
        check(
            l.room_min_w <= l.room_max_w && l.room_min_h <= l.room_max_h,
            "room min size exceeds max size",
        )?;
        check(
            l.corridor_min_w >= 1 && l.corridor_min_w <= l.corridor_max_w,
            "corridor width range is empty",
        )?;
        check(
            self.physics.tick > 0.0 && self.physics.tick.is_finite(),
            "physics tick must be positive",
        )?;
        check(self.physics.substeps >= 1, "physics substeps must be at least 1")?;
        check(self.props.min_count <= self.props.max_count, "prop min count exceeds max count")?;
        check(self.chase.stop_radius > 0.0, "stop radius must be positive")?;
        check(self.chase.repath_interval > 0.0, "repath interval must be positive")?;
        check(self.waves.kill_threshold >= 1, "wave kill threshold must be at least 1")?;
        check(self.combat.projectile_lifetime > 0.0, "projectile lifetime must be positive")?;
        Ok(())
    }
}

fn check(ok: bool, message: &str) -> SimResult<()> {
    if ok {
        Ok(())
    } else {
        Err(SimError::InvalidConfig(message.to_string()))
    }
}

//! Kill-driven enemy waves and the global speed multiplier.

use log::info;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveTuning {
    /// Enemies spawned with the level.
    pub initial_count: u32,
    /// A new wave starts every `kill_threshold` kills.
    pub kill_threshold: u32,
    /// Added to the enemy speed multiplier per wave.
    pub speed_increment: f32,
    /// Wave `n` spawns `base_count + n` enemies.
    pub base_count: u32,
    /// Minimum spawn distance from the player in px.
    pub min_spawn_distance: f32,
}

impl Default for WaveTuning {
    fn default() -> Self {
        Self {
            initial_count: 4,
            kill_threshold: 5,
            speed_increment: 0.1,
            base_count: 3,
            min_spawn_distance: 200.0,
        }
    }
}

#[derive(Debug)]
pub struct WaveDirector {
    tuning: WaveTuning,
    wave: u32,
    kills: u32,
    next_threshold: u32,
    speed_multiplier: f32,
}

impl WaveDirector {
    pub fn new(tuning: WaveTuning) -> Self {
        let next_threshold = tuning.kill_threshold.max(1);
        Self {
            tuning,
            wave: 0,
            kills: 0,
            next_threshold,
            speed_multiplier: 1.0,
        }
    }

    pub fn wave(&self) -> u32 {
        self.wave
    }

    pub fn kills(&self) -> u32 {
        self.kills
    }

    pub fn speed_multiplier(&self) -> f32 {
        self.speed_multiplier
    }

    /// Count kills and return how many enemies to spawn for every wave they
    /// triggered (0 when no threshold was crossed).
    pub fn record_kills(&mut self, count: u32) -> u32 {
        self.kills += count;
        let mut to_spawn = 0;
        while self.kills >= self.next_threshold {
            self.wave += 1;
            self.next_threshold += self.tuning.kill_threshold.max(1);
            self.speed_multiplier += self.tuning.speed_increment;
            to_spawn += self.tuning.base_count + self.wave;
            info!(
                "wave {} triggered at {} kills, speed x{:.2}",
                self.wave, self.kills, self.speed_multiplier
            );
        }
        to_spawn
    }
}

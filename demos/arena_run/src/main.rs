//! Headless arena run: builds a level and drives it with scripted input.
//!
//! Usage: `arena_run [ticks] [config.json]`. Set `RUST_LOG=info` (or `debug`)
//! to watch spawns, deaths and waves.

use std::path::Path;

use anyhow::{Context, Result};
use glam::Vec2;
use log::info;
use spellforge::{Element, SimConfig, SimulationState, TickInput};

const DEFAULT_TICKS: u64 = 1200;
const MAX_RUNS: u32 = 3;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let ticks = match args.next() {
        Some(s) => s.parse::<u64>().with_context(|| format!("invalid tick count {s:?}"))?,
        None => DEFAULT_TICKS,
    };
    let config = match args.next() {
        Some(path) => SimConfig::load_from_file(Path::new(&path))?,
        None => SimConfig::default(),
    };

    let mut sim = SimulationState::new(config)?;
    info!(
        "level ready: {} rooms, {} wall loops, {} entities",
        sim.rooms().len(),
        sim.wall_loop_count(),
        sim.registry().len()
    );

    let mut runs = 1;
    let mut total_kills = 0;
    for t in 0..ticks {
        let input = scripted_input(&sim, t);
        let report = sim.tick(&input);
        total_kills += report.enemies_killed;

        if report.game_over {
            info!("run {runs} ended at tick {} on wave {}", sim.ticks(), sim.waves().wave());
            if runs >= MAX_RUNS {
                break;
            }
            runs += 1;
            sim.restart()?;
        }
    }

    info!(
        "finished: {runs} run(s), {total_kills} kills, wave {}, {} enemies alive",
        sim.waves().wave(),
        sim.enemies().len()
    );
    Ok(())
}

/// Circle around, shoot at the closest enemy and pulse telekinesis.
fn scripted_input(sim: &SimulationState, t: u64) -> TickInput {
    let player = sim.player().position();
    let angle = t as f32 * 0.05;
    let nearest = sim
        .enemies()
        .iter()
        .filter_map(|s| sim.registry().get_active(s.entity))
        .map(|e| e.position)
        .min_by(|a, b| a.distance(player).total_cmp(&b.distance(player)));

    TickInput {
        move_dir: Vec2::new(angle.cos(), angle.sin()),
        aim: nearest.unwrap_or(player + Vec2::X),
        fire: nearest.is_some(),
        hold: t % 80 < 60,
        launch: t % 80 == 60,
        select_element: match t % 400 {
            0 => Some(Element::Fire),
            200 => Some(Element::Ice),
            _ => None,
        },
    }
}

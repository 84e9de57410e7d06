//! Hopline - headless movement sandbox
//!
//! Builds a small arena, scripts player input for a scenario and runs the
//! locomotion controller, logging mode changes and a summary every second.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use glam::{Quat, Vec2, Vec3};
use hopline_physics::{
    CollisionWorld, CommandButtons, ContentFlags, MovementConfig, MovementController, MovementEvent,
    MovementState, PhysicalMaterial, PlayerCommand, Setting,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scenario {
    /// Sprint straight across the arena floor
    FlatRun,
    /// Hold jump and strafe with a sweeping yaw
    Bunnyhop,
    /// Run off the raised ledge
    LedgeDrop,
    /// Launch straight up and report the apex
    Apex,
}

#[derive(Parser)]
#[command(name = "hopline")]
#[command(about = "Headless character movement sandbox", long_about = None)]
struct Cli {
    /// Movement config (TOML). Defaults apply when omitted.
    #[arg(short, long, env = "HOPLINE_CONFIG")]
    config: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value = "flat-run")]
    scenario: Scenario,

    /// Number of ticks to simulate
    #[arg(short, long, default_value = "600")]
    ticks: u32,

    /// Simulation rate in Hz
    #[arg(long, default_value = "60")]
    tick_rate: f32,

    /// Runtime setting such as "jump_boost aligned" (repeatable)
    #[arg(long = "set", value_name = "SETTING")]
    settings: Vec<String>,
}

// ============================================================================
// Arena
// ============================================================================

const SPAWN: Vec3 = Vec3::new(0.0, 0.0, 120.0);
const LEDGE_SPAWN: Vec3 = Vec3::new(-1600.0, 0.0, 280.0);

fn build_arena() -> CollisionWorld {
    let mut world = CollisionWorld::new();

    // Floor
    world.add_box(Vec3::new(0.0, 0.0, -50.0), Vec3::new(4000.0, 4000.0, 50.0), ContentFlags::SOLID);

    // Icy strip
    world.add_box_with_material(
        Vec3::new(0.0, 800.0, 1.0),
        Vec3::new(1000.0, 150.0, 1.0),
        ContentFlags::SOLID,
        PhysicalMaterial::new(0.1),
    );

    // Ramp up to the east wall
    world.add_oriented_box(
        Vec3::new(1600.0, 0.0, 0.0),
        Vec3::new(500.0, 400.0, 20.0),
        Quat::from_rotation_y(-20.0_f32.to_radians()),
        ContentFlags::SOLID,
        None,
    );
    world.add_box(Vec3::new(2200.0, 0.0, 300.0), Vec3::new(20.0, 2000.0, 300.0), ContentFlags::SOLID);

    // Ledge in the west
    world.add_box(Vec3::new(-1600.0, 0.0, 100.0), Vec3::new(300.0, 400.0, 100.0), ContentFlags::SOLID);

    // Water pool in the south
    world.add_water_volume(Vec3::new(0.0, -1200.0, 80.0), Vec3::new(400.0, 400.0, 80.0));

    log::debug!("arena built with {} brushes", world.brush_count());
    world
}

// ============================================================================
// Input scripts
// ============================================================================

fn scripted_command(scenario: Scenario, tick: u32, tick_rate: f32) -> PlayerCommand {
    match scenario {
        Scenario::FlatRun => PlayerCommand::moving(Vec2::Y).with(CommandButtons::SPRINT),
        Scenario::LedgeDrop => PlayerCommand::moving(Vec2::Y),
        Scenario::Apex => PlayerCommand::default(),
        Scenario::Bunnyhop => {
            // Alternate strafe direction every half second and turn into it
            let half_seconds = (tick as f32 / (tick_rate * 0.5)) as u32;
            let side = if half_seconds % 2 == 0 { 1.0 } else { -1.0 };
            let mut command = PlayerCommand::moving(Vec2::new(side, 1.0)).with(CommandButtons::JUMP);
            command.look_intent.x = -side * 1.5 / tick_rate;
            command
        }
    }
}

fn load_config(cli: &Cli) -> Result<MovementConfig> {
    let mut config = match &cli.config {
        Some(path) => MovementConfig::load(path)
            .with_context(|| format!("loading movement config {}", path.display()))?,
        None => MovementConfig::default(),
    };

    for line in &cli.settings {
        let setting: Setting = line
            .parse()
            .with_context(|| format!("parsing setting {:?}", line))?;
        config = setting
            .applied_to(&config)
            .with_context(|| format!("applying setting {:?}", line))?;
    }

    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if !(cli.tick_rate.is_finite() && cli.tick_rate > 0.0) {
        anyhow::bail!("tick rate must be positive, got {}", cli.tick_rate);
    }
    let config = load_config(&cli)?;
    let controller = MovementController::new(config);
    let world = build_arena();

    let spawn = if cli.scenario == Scenario::LedgeDrop {
        LEDGE_SPAWN
    } else {
        SPAWN
    };
    let mut state = MovementState::new(spawn);
    controller.spawn_at(&mut state, spawn, &world);
    if cli.scenario == Scenario::Apex {
        controller.launch(&mut state, Vec3::Z * 600.0);
    }

    log::info!(
        "running {:?} for {} ticks at {} Hz",
        cli.scenario,
        cli.ticks,
        cli.tick_rate
    );

    let dt = 1.0 / cli.tick_rate;
    let ticks_per_second = cli.tick_rate.round().max(1.0) as u32;
    let mut top_speed: f32 = 0.0;
    let mut jumps = 0;

    for tick in 0..cli.ticks {
        let command = scripted_command(cli.scenario, tick, cli.tick_rate);
        for event in controller.update(&mut state, &command, &world, dt) {
            match event {
                MovementEvent::ModeChanged(change) => {
                    log::info!("tick {}: {:?} -> {:?}", tick, change.previous, change.new)
                }
                MovementEvent::Jumped { boosted } => {
                    jumps += 1;
                    log::debug!("tick {}: jump (boosted: {})", tick, boosted);
                }
                MovementEvent::Apex => log::info!("tick {}: apex at z={:.1}", tick, state.position().z),
                MovementEvent::Landed { impact_velocity } => {
                    log::info!("tick {}: landed at {:.0} cm/s", tick, -impact_velocity.z)
                }
                MovementEvent::EnteredWater => log::info!("tick {}: splash", tick),
            }
        }
        top_speed = top_speed.max(state.horizontal_speed());

        if (tick + 1) % ticks_per_second == 0 {
            let p = state.position();
            log::info!(
                "t={:.1}s pos=({:.0}, {:.0}, {:.0}) speed={:.1} mode={:?} friction={:.2}",
                state.elapsed,
                p.x,
                p.y,
                p.z,
                state.horizontal_speed(),
                state.mode,
                state.surface_friction()
            );
        }
    }

    log::info!(
        "done: top speed {:.1} cm/s, {} jumps, final mode {:?}",
        top_speed,
        jumps,
        state.mode
    );
    Ok(())
}

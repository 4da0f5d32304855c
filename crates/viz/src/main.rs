//! Headless simulation viewer
//!
//! Run with: cargo run -p viz
//!
//! Examples:
//!   cargo run -p viz -- --frames 300 --focus blue-001
//!   cargo run -p viz -- --config scenario.toml --frames 0 --dump display.json

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;
use clap::Parser;
use viz::{RunLimits, SimVizPlugin, VizConfig};

/// Headless simulation viewer
#[derive(Parser, Debug)]
#[command(name = "viz")]
#[command(about = "Headless viewer for the bridged platform simulation")]
struct Args {
    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Frames to run before exiting; 0 runs until the scenario completes
    #[arg(long, default_value_t = 600)]
    frames: u32,

    /// UI frames per second
    #[arg(long, default_value_t = 30.0)]
    frame_rate: f64,

    /// Overrides the scenario seed
    #[arg(long)]
    seed: Option<u64>,

    /// Platform of interest
    #[arg(long)]
    focus: Option<String>,

    /// Write the final display state as JSON to this file
    #[arg(long)]
    dump: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => VizConfig::from_file(path).unwrap_or_else(|e| {
            eprintln!("Failed to load {}: {}", path.display(), e);
            process::exit(2);
        }),
        None => VizConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.host.scenario.seed = seed;
    }
    if args.focus.is_some() {
        config.display.focus = args.focus;
    }

    if !(args.frame_rate.is_finite() && args.frame_rate > 0.0) {
        eprintln!("--frame-rate must be positive");
        process::exit(2);
    }
    let frame_time = Duration::from_secs_f64(1.0 / args.frame_rate);

    App::new()
        .add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(frame_time)))
        .add_plugins(LogPlugin::default())
        .insert_resource(config)
        .insert_resource(RunLimits {
            max_frames: args.frames,
            dump_path: args.dump,
        })
        .add_plugins(SimVizPlugin)
        .run();
}

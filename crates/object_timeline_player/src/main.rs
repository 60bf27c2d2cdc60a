// SPDX-License-Identifier: MIT OR Apache-2.0
//! Headless timeline player.
//!
//! Builds a small demo world, creates its autoplaying door timeline and
//! steps it at a fixed rate, logging notifications through `tracing`.

mod cli;
mod demo;

use clap::Parser;
use cli::Args;
use demo::DemoWorld;
use object_timeline::{ConfigError, FrameTime, RuntimeConfig, TickScheduler};
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Error type for the player
#[derive(Debug, thiserror::Error)]
enum PlayerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid log filter
    #[error("Invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(path) = &args.dump_config {
        return match config.save(path) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Failed to write {}: {e}", path.display());
                ExitCode::FAILURE
            }
        };
    }

    if let Err(e) = init_tracing(&config, args.verbosity) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    tracing::info!("Starting timeline player v{}", env!("CARGO_PKG_VERSION"));
    run(&args, &config);
    ExitCode::SUCCESS
}

fn load_config(args: &Args) -> Result<RuntimeConfig, PlayerError> {
    match &args.config {
        Some(path) => Ok(RuntimeConfig::load(path)?),
        None => Ok(RuntimeConfig::default()),
    }
}

fn init_tracing(config: &RuntimeConfig, verbosity: u8) -> Result<(), PlayerError> {
    // RUST_LOG wins over the configured filter
    let mut env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_filter)?,
    };
    match verbosity {
        0 => {}
        1 => env_filter = env_filter.add_directive("object_timeline=debug".parse()?),
        _ => env_filter = env_filter.add_directive("trace".parse()?),
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    Ok(())
}

fn run(args: &Args, config: &RuntimeConfig) {
    let mut world = DemoWorld::new();
    let mut scheduler = TickScheduler::from_config(config);
    let time = FrameTime::dilated(args.delta, args.dilation);

    for _ in 0..args.steps {
        let report = scheduler.tick(&mut world.registry, &world.objects, time);
        for key in &report.finished {
            tracing::debug!("Frame {}: {key} finished", report.frame);
        }
        if !world.is_playing() {
            tracing::info!("All timelines stopped after {} steps", report.frame);
            break;
        }
    }

    if let Some(instance) = world.registry.get(world.door, demo::OPEN_TIMELINE) {
        tracing::info!(
            "{} on {}: position {:.3}, {:?}",
            instance.name(),
            instance.owner(),
            instance.position(),
            instance.state()
        );
    }
}

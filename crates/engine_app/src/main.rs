//! # engine_app
//!
//! Demonstration driver for the engine world. Loads an optional JSON
//! configuration, registers the demo systems and runs the fixed-timestep
//! tick loop, logging entity activity as it goes.
//!
//! ```text
//! engine_app [config.json]
//! ```
//!
//! The configuration file holds a `world` section (see
//! [`WorldConfiguration`]) and a `tick` section (see [`TickConfig`]); missing
//! fields keep their defaults.

mod demo;
mod tick;

use std::fs;

use anyhow::{Context, Result};
use engine_world::{World, WorldConfiguration};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

use demo::DemoConfig;
use tick::{TickConfig, TickLoop};

/// Top-level configuration file layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct AppConfig {
    world: WorldConfiguration,
    tick: TickConfig,
}

impl AppConfig {
    fn load(path: &str) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("reading configuration from {path}"))?;
        serde_json::from_str(&json).with_context(|| format!("parsing configuration in {path}"))
    }
}

fn main() -> Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("engine_app=info".parse()?))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load(&path)?,
        None => AppConfig {
            tick: TickConfig {
                tick_rate: 60.0,
                max_ticks: 300,
            },
            ..AppConfig::default()
        },
    };
    info!(
        expected_entity_count = config.world.expected_entity_count,
        always_delay_component_removal = config.world.always_delay_component_removal,
        tick_rate = config.tick.tick_rate,
        max_ticks = config.tick.max_ticks,
        "engine starting"
    );

    let mut world = World::with_config(config.world);
    let activity = demo::install(&mut world, &DemoConfig::new(config.tick.step()));

    let mut tick_loop = TickLoop::new(config.tick, world);
    tick_loop.run();

    let totals = activity.get();
    info!(
        ticks = tick_loop.tick_id(),
        live = tick_loop.world().entity_count(),
        spawned = totals.inserted,
        expired = totals.removed,
        "simulation finished"
    );

    tick_loop.world_mut().dispose()?;
    info!("engine shut down");
    Ok(())
}

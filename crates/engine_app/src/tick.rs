//! Fixed-timestep tick loop.
//!
//! Every tick runs one [`World::process`]: each enabled system in order,
//! with pending structural changes converged before each system and once
//! more at the end, followed by reclaiming deleted entities.

use std::time::{Duration, Instant};

use engine_world::World;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Configuration for the tick loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
}

impl TickConfig {
    /// Simulated seconds per tick.
    #[must_use]
    pub fn step(&self) -> f64 {
        1.0 / self.tick_rate
    }
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
        }
    }
}

/// Drives a [`World`] at a fixed rate.
#[derive(Debug)]
pub struct TickLoop {
    /// Current tick counter.
    tick_id: u64,
    /// Tick configuration.
    config: TickConfig,
    /// The simulated world.
    world: World,
}

impl TickLoop {
    /// Create a tick loop over `world`.
    #[must_use]
    pub fn new(config: TickConfig, world: World) -> Self {
        Self {
            tick_id: 0,
            config,
            world,
        }
    }

    /// Returns the current tick counter.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    /// Returns a reference to the world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Returns a mutable reference to the world.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Run one tick of the simulation.
    pub fn tick(&mut self) {
        self.tick_id += 1;
        debug!(tick_id = self.tick_id, "tick start");

        self.world.process();

        debug!(
            tick_id = self.tick_id,
            entities = self.world.entity_count(),
            "tick end"
        );
    }

    /// Run the tick loop for the configured number of ticks, or indefinitely.
    pub fn run(&mut self) {
        let tick_duration = Duration::from_secs_f64(self.config.step());
        let mut tick_count = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "starting tick loop"
        );

        loop {
            let start = Instant::now();

            self.tick();

            tick_count += 1;
            if self.config.max_ticks > 0 && tick_count >= self.config.max_ticks {
                info!(ticks = tick_count, "tick loop complete");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < tick_duration {
                std::thread::sleep(tick_duration - elapsed);
            } else {
                warn!(
                    tick_id = self.tick_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = tick_duration.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        }
    }
}

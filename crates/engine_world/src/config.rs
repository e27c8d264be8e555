//! World configuration.

use serde::{Deserialize, Serialize};

use crate::error::WorldError;

/// Tunables applied when a [`World`](crate::World) is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfiguration {
    /// Initial capacity of every entity-indexed array.
    pub expected_entity_count: usize,
    /// Use delayed removal for every component type, not only those that
    /// request it.
    pub always_delay_component_removal: bool,
}

impl WorldConfiguration {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the expected entity count.
    #[must_use]
    pub fn with_expected_entity_count(mut self, count: usize) -> Self {
        self.expected_entity_count = count;
        self
    }

    /// Force delayed removal for every component type.
    #[must_use]
    pub fn with_always_delay_component_removal(mut self, value: bool) -> Self {
        self.always_delay_component_removal = value;
        self
    }

    /// Parse a configuration from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, WorldError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for WorldConfiguration {
    fn default() -> Self {
        Self {
            expected_entity_count: 128,
            always_delay_component_removal: false,
        }
    }
}

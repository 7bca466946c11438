//! Core configuration for inochi2d-core.

use serde::{Deserialize, Serialize};

/// Runtime defaults applied when a puppet is loaded.
/// Values present in the puppet's own `physics` block take precedence.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Pixels that count as one meter for the physics system.
    pub pixels_per_meter: f32,
    /// Gravity in meters per second squared.
    pub gravity: f32,
    /// Whether physics drivers run on update.
    pub physics_enabled: bool,
    /// Largest integration step handed to a physics driver, in seconds.
    /// Longer frames are split into sub-steps.
    pub max_physics_step: f32,
    /// Initial base-vertex mode of the puppet's draw list.
    pub use_base_vertex: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pixels_per_meter: 1000.0,
            gravity: 9.8,
            physics_enabled: true,
            max_physics_step: 0.01,
            use_base_vertex: false,
        }
    }
}

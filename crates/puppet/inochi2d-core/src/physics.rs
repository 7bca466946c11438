//! Pendulum physics drivers (`SimplePhysics` nodes).
//!
//! A driver hangs a bob below its anchor and swings it under gravity. Moving
//! the anchor leaves the bob behind in world space, which changes the angle;
//! the driver writes the resulting angle or offset into its parameter.
//! Screen space: +y points down, so the rest position is straight below.

use std::f32::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use crate::math::Vec2;

/// Longest frame a driver simulates; longer deltas are truncated.
pub const MAX_FRAME_TIME: f32 = 1.0;

/// Upper bound on integration sub-steps per frame.
pub const MAX_SUBSTEPS: u32 = 1024;

/// Split a frame of `dt` seconds into at most [`MAX_SUBSTEPS`] steps of at
/// most `max_step` seconds. Returns the step count and step length.
fn substeps(dt: f32, max_step: f32) -> (u32, f32) {
    let dt = dt.min(MAX_FRAME_TIME);
    let max_step = if max_step > 0.0 { max_step } else { dt };
    let steps = ((dt / max_step).ceil() as u32).clamp(1, MAX_SUBSTEPS);
    (steps, dt / steps as f32)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhysicsModel {
    #[default]
    Pendulum,
    /// Evaluated as a rigid pendulum.
    SpringPendulum,
}

/// How the bob state maps onto the driven parameter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapMode {
    /// x = angle / (pi/2), y = stretch ratio - 1.
    #[default]
    AngleLength,
    /// Bob offset from rest divided by the pendulum length.
    #[serde(rename = "XY")]
    Xy,
}

/// Puppet-wide inputs to a physics step.
#[derive(Clone, Copy, Debug)]
pub struct PhysicsEnv {
    pub gravity: f32,
    pub pixels_per_meter: f32,
    pub max_step: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct PendulumState {
    bob: Vec2,
    angular_velocity: f32,
    initialized: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PendulumDriver {
    /// uuid of the driven parameter.
    pub param: u32,
    pub model: PhysicsModel,
    pub map_mode: MapMode,
    /// Multiplier on the puppet's gravity.
    pub gravity: f32,
    /// Length in pixels.
    pub length: f32,
    pub frequency: f32,
    pub angle_damping: f32,
    pub output_scale: Vec2,
    /// Anchor follows the node's local transform instead of its world transform.
    pub local_only: bool,
    state: PendulumState,
}

impl PendulumDriver {
    pub fn new(param: u32) -> Self {
        Self {
            param,
            model: PhysicsModel::Pendulum,
            map_mode: MapMode::AngleLength,
            gravity: 1.0,
            length: 100.0,
            frequency: 1.0,
            angle_damping: 0.5,
            output_scale: Vec2::ONE,
            local_only: false,
            state: PendulumState::default(),
        }
    }

    fn len(&self) -> f32 {
        self.length.max(1e-3)
    }

    /// Forget the current swing; the next step starts at rest.
    pub fn reset(&mut self) {
        self.state = PendulumState::default();
    }

    fn rest_bob(&self, anchor: Vec2) -> Vec2 {
        anchor + Vec2::new(0.0, self.len())
    }

    /// Current angle from straight down, in radians.
    pub fn angle(&self, anchor: Vec2) -> f32 {
        if !self.state.initialized {
            return 0.0;
        }
        let d = self.state.bob - anchor;
        d.x.atan2(d.y)
    }

    /// Advance the pendulum by `dt` seconds with the anchor at `anchor`.
    pub fn step(&mut self, anchor: Vec2, dt: f32, env: &PhysicsEnv) {
        if !self.state.initialized {
            self.state.bob = self.rest_bob(anchor);
            self.state.angular_velocity = 0.0;
            self.state.initialized = true;
        }
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }
        if dt > MAX_FRAME_TIME {
            log::debug!(
                "pendulum for parameter {}: frame of {dt}s truncated to {MAX_FRAME_TIME}s",
                self.param
            );
        }

        let len = self.len();
        let g = env.gravity * self.gravity * env.pixels_per_meter;
        let omega2 = (g / len).max(0.0) * self.frequency * self.frequency;
        let damping = 2.0 * self.angle_damping * omega2.sqrt();

        let mut angle = self.angle(anchor);
        let mut vel = self.state.angular_velocity;
        let (steps, h) = substeps(dt, env.max_step);
        for _ in 0..steps {
            let acc = -omega2 * angle.sin() - damping * vel;
            vel += acc * h;
            angle += vel * h;
        }
        if !angle.is_finite() || !vel.is_finite() {
            log::warn!("pendulum for parameter {} diverged, resetting", self.param);
            self.state.bob = self.rest_bob(anchor);
            self.state.angular_velocity = 0.0;
            return;
        }
        self.state.angular_velocity = vel;
        self.state.bob = anchor + Vec2::new(angle.sin(), angle.cos()) * len;
    }

    /// Parameter value produced by the current state.
    pub fn output(&self, anchor: Vec2) -> Vec2 {
        let raw = if !self.state.initialized {
            Vec2::ZERO
        } else {
            match self.map_mode {
                MapMode::AngleLength => {
                    let stretch = (self.state.bob - anchor).length() / self.len() - 1.0;
                    Vec2::new(self.angle(anchor) / FRAC_PI_2, stretch)
                }
                MapMode::Xy => (self.state.bob - self.rest_bob(anchor)) * (1.0 / self.len()),
            }
        };
        Vec2::new(raw.x * self.output_scale.x, raw.y * self.output_scale.y)
    }
}

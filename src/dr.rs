//! Domain randomization.
//!
//! `DrConfig` turns a reality profile into concrete sampling ranges
//! (explicit gap knobs win, otherwise documented defaults around the
//! profile's nominal values), and `DrSampler` draws immutable
//! `Realization`s from them with independent uniform draws per field.

use serde::{Deserialize, Serialize};

use crate::engine::SimRng;
use crate::profile::{MassScale, RealityProfile, Range};

/// Concrete per-field sampling ranges for one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrConfig {
    pub mass_scale: Range,
    pub friction: Range,
    pub restitution: Range,
    pub gravity_z: Range,
    pub noise_scale: Range,
    pub latency_steps: (usize, usize),
    pub camera_degrade_prob: f64,
    pub action_delay: (usize, usize),
    pub action_noise_scale: Range,
}

impl DrConfig {
    /// Derive ranges from a profile.
    ///
    /// Defaults when a knob is absent: mass ±5% around the scalar scale,
    /// friction ±10%, restitution ±0.05 clamped at zero, gravity-z ±0.1,
    /// noise scale ×0.5 to ×2, latency [max(0, l-1), l+2], no action delay
    /// or action noise.
    #[must_use]
    pub fn from_profile(profile: &RealityProfile) -> Self {
        let knobs = &profile.gap_knobs;
        let physics = &profile.physics;
        let sensors = &profile.sensors;

        let mass_scale = match knobs.mass_scale {
            MassScale::Range(r) => r,
            MassScale::Scalar(s) => Range {
                low: s * 0.95,
                high: s * 1.05,
            },
        };
        let friction = knobs.friction_range.unwrap_or(Range {
            low: physics.friction * 0.9,
            high: physics.friction * 1.1,
        });
        let restitution = knobs.restitution_range.unwrap_or(Range {
            low: (physics.restitution - 0.05).max(0.0),
            high: physics.restitution + 0.05,
        });
        let gravity_z = knobs.gravity_z_range.unwrap_or(Range {
            low: physics.gravity[2] - 0.1,
            high: physics.gravity[2] + 0.1,
        });
        let noise_scale = knobs.noise_scale_range.unwrap_or(Range {
            low: sensors.noise_scale * 0.5,
            high: sensors.noise_scale * 2.0,
        });
        let latency_steps = knobs.latency_steps_range.unwrap_or((
            sensors.latency_steps.saturating_sub(1),
            sensors.latency_steps + 2,
        ));
        let action_delay = knobs.action_delay_range.unwrap_or((0, 0));
        let action_noise_scale = knobs
            .action_noise_scale_range
            .unwrap_or(Range { low: 0.0, high: 0.0 });

        Self {
            mass_scale,
            friction,
            restitution,
            gravity_z,
            noise_scale,
            latency_steps,
            camera_degrade_prob: knobs.camera_degrade_prob,
            action_delay,
            action_noise_scale,
        }
    }
}

/// One sampled reality: immutable once drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Realization {
    pub mass_scale: f64,
    pub friction: f64,
    pub restitution: f64,
    pub gravity_z: f64,
    pub noise_scale: f64,
    pub latency_steps: usize,
    pub camera_degrade: bool,
    pub action_delay: usize,
    pub action_noise_scale: f64,
}

/// Seeded sampler over a `DrConfig`.
#[derive(Debug, Clone)]
pub struct DrSampler {
    config: DrConfig,
    rng: SimRng,
}

impl DrSampler {
    /// Create a sampler with an explicit seed.
    #[must_use]
    pub fn new(config: DrConfig, seed: u64) -> Self {
        Self {
            config,
            rng: SimRng::new(seed),
        }
    }

    /// Convenience: derive the config from a profile first.
    #[must_use]
    pub fn from_profile(profile: &RealityProfile, seed: u64) -> Self {
        Self::new(DrConfig::from_profile(profile), seed)
    }

    /// The ranges this sampler draws from.
    #[must_use]
    pub const fn config(&self) -> &DrConfig {
        &self.config
    }

    fn sample_usize_range(&mut self, (low, high): (usize, usize)) -> usize {
        if low >= high {
            low
        } else {
            low + self.rng.gen_index(high - low + 1)
        }
    }

    /// Draw one realization. Fields are sampled independently, in a fixed
    /// order, so a given seed yields the same sequence of realizations.
    pub fn sample(&mut self) -> Realization {
        let c = &self.config;
        let mass_scale = self.rng.gen_range_f64(c.mass_scale.low, c.mass_scale.high);
        let friction = self.rng.gen_range_f64(c.friction.low, c.friction.high);
        let restitution = self
            .rng
            .gen_range_f64(c.restitution.low, c.restitution.high)
            .max(0.0);
        let gravity_z = self.rng.gen_range_f64(c.gravity_z.low, c.gravity_z.high);
        let noise_scale = self
            .rng
            .gen_range_f64(c.noise_scale.low, c.noise_scale.high);
        let latency_range = c.latency_steps;
        let delay_range = c.action_delay;
        let degrade_prob = c.camera_degrade_prob;
        let action_noise = c.action_noise_scale;

        let latency_steps = self.sample_usize_range(latency_range);
        let camera_degrade = self.rng.gen_f64() < degrade_prob;
        let action_delay = self.sample_usize_range(delay_range);
        let action_noise_scale = self.rng.gen_range_f64(action_noise.low, action_noise.high);

        Realization {
            mass_scale,
            friction,
            restitution,
            gravity_z,
            noise_scale,
            latency_steps,
            camera_degrade,
            action_delay,
            action_noise_scale,
        }
    }

    /// Draw `n` realizations.
    #[must_use]
    pub fn sample_n(&mut self, n: usize) -> Vec<Realization> {
        (0..n).map(|_| self.sample()).collect()
    }
}

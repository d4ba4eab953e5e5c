//! Reality profiles.
//!
//! A `RealityProfile` describes one "pseudo-real" deployment target: its
//! physics constants, sensor imperfections, and the gap knobs that drive
//! domain randomization and the Q-Plugin. Profiles parse from YAML or JSON
//! strings; the crate never reads files itself.
//!
//! Missing fields fall back to documented defaults via `#[serde(default)]`,
//! and `validate()` rejects semantically invalid values (non-positive
//! timestep, negative noise scales, inverted ranges).

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::dr::Realization;
use crate::error::{SimError, SimResult};
use crate::noise::QPluginKnobs;

/// Physics block of a reality profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PhysicsProfile {
    /// World gravity vector, m/s².
    pub gravity: [f64; 3],
    /// Ground friction coefficient.
    #[validate(range(min = 0.0))]
    pub friction: f64,
    /// Contact restitution coefficient.
    #[validate(range(min = 0.0, max = 1.0))]
    pub restitution: f64,
    /// Integration timestep, seconds.
    #[validate(range(min = 0.000001))]
    pub timestep: f64,
}

impl Default for PhysicsProfile {
    fn default() -> Self {
        Self {
            gravity: [0.0, 0.0, -9.81],
            friction: 0.5,
            restitution: 0.0,
            timestep: 0.01,
        }
    }
}

/// Sensor block of a reality profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SensorProfile {
    /// Observation delay applied by the latency decorator, in steps.
    pub latency_steps: usize,
    /// Base sensor noise standard deviation.
    #[validate(range(min = 0.0))]
    pub noise_scale: f64,
    /// Whether camera degradation is active for this profile.
    pub camera_degrade: bool,
}

impl Default for SensorProfile {
    fn default() -> Self {
        Self {
            latency_steps: 0,
            noise_scale: 0.01,
            camera_degrade: false,
        }
    }
}

/// An inclusive `[low, high]` sampling range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub low: f64,
    pub high: f64,
}

impl Range {
    /// Construct a range, rejecting inverted bounds.
    pub fn new(low: f64, high: f64) -> SimResult<Self> {
        if low > high {
            return Err(SimError::config(format!(
                "range low {low} exceeds high {high}"
            )));
        }
        Ok(Self { low, high })
    }

    /// Width of the range.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.high - self.low
    }
}

/// Mass scale knob: either a fixed scalar (randomized ±5% around it) or an
/// explicit range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MassScale {
    /// Fixed scalar; the DR sampler randomizes ±5% around it.
    Scalar(f64),
    /// Explicit sampling range.
    Range(Range),
}

impl Default for MassScale {
    fn default() -> Self {
        Self::Scalar(1.0)
    }
}

/// Gap knobs: optional explicit DR ranges plus Q-Plugin configuration.
///
/// Absent ranges are derived from the physics/sensor blocks by
/// `DrConfig::from_profile`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapKnobs {
    pub friction_range: Option<Range>,
    pub mass_scale: MassScale,
    pub restitution_range: Option<Range>,
    pub gravity_z_range: Option<Range>,
    pub noise_scale_range: Option<Range>,
    pub latency_steps_range: Option<(usize, usize)>,
    /// Probability that a sampled realization degrades the camera.
    pub camera_degrade_prob: f64,
    /// Action delay in steps, sampled uniformly.
    pub action_delay_range: Option<(usize, usize)>,
    /// Gaussian action-noise std, sampled uniformly.
    pub action_noise_scale_range: Option<Range>,
    /// Q-Plugin noise configuration for this profile.
    pub q_plugin: Option<QPluginKnobs>,
}

/// One pseudo-reality target: physics, sensors, and gap knobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RealityProfile {
    #[validate(nested)]
    pub physics: PhysicsProfile,
    #[validate(nested)]
    pub sensors: SensorProfile,
    pub gap_knobs: GapKnobs,
}

impl RealityProfile {
    /// Parse a profile from a YAML string and validate it.
    pub fn from_yaml(source: &str) -> SimResult<Self> {
        let profile: Self = serde_yaml::from_str(source)?;
        profile.validate_semantic()?;
        Ok(profile)
    }

    /// Parse a profile from a JSON string and validate it.
    pub fn from_json(source: &str) -> SimResult<Self> {
        let profile: Self = serde_json::from_str(source)?;
        profile.validate_semantic()?;
        Ok(profile)
    }

    /// Run declarative plus cross-field validation.
    pub fn validate_semantic(&self) -> SimResult<()> {
        self.validate()?;

        let ranges = [
            ("friction_range", self.gap_knobs.friction_range),
            ("restitution_range", self.gap_knobs.restitution_range),
            ("gravity_z_range", self.gap_knobs.gravity_z_range),
            ("noise_scale_range", self.gap_knobs.noise_scale_range),
            (
                "action_noise_scale_range",
                self.gap_knobs.action_noise_scale_range,
            ),
        ];
        for (name, range) in ranges {
            if let Some(r) = range {
                if r.low > r.high {
                    return Err(SimError::config(format!(
                        "{name}: low {} exceeds high {}",
                        r.low, r.high
                    )));
                }
            }
        }
        if let Some((low, high)) = self.gap_knobs.latency_steps_range {
            if low > high {
                return Err(SimError::config(format!(
                    "latency_steps_range: low {low} exceeds high {high}"
                )));
            }
        }
        if let MassScale::Range(r) = self.gap_knobs.mass_scale {
            if r.low > r.high {
                return Err(SimError::config(format!(
                    "mass_scale: low {} exceeds high {}",
                    r.low, r.high
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.gap_knobs.camera_degrade_prob) {
            return Err(SimError::config(format!(
                "camera_degrade_prob {} outside [0, 1]",
                self.gap_knobs.camera_degrade_prob
            )));
        }
        Ok(())
    }

    /// Apply a sampled realization, yielding the concrete per-episode
    /// profile. The original profile is untouched.
    #[must_use]
    pub fn overlay(&self, realization: &Realization) -> Self {
        let mut derived = self.clone();
        derived.physics.friction = realization.friction;
        derived.physics.restitution = realization.restitution;
        derived.physics.gravity[2] = realization.gravity_z;
        derived.sensors.noise_scale = realization.noise_scale;
        derived.sensors.latency_steps = realization.latency_steps;
        derived.sensors.camera_degrade = realization.camera_degrade;
        derived
    }
}

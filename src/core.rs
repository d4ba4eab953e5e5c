//! The stepping core.
//!
//! `SimCore` owns a physics engine, a sensor stack, and the optional noise
//! and residual collaborators, and exposes four stepping modes:
//!
//! - [`SimCore::step`]: fully deterministic, no noise anywhere.
//! - [`SimCore::step_stochastic`]: deterministic dynamics, noisy sensors.
//! - [`SimCore::step_quantum`]: Q-Plugin state perturbation plus noisy
//!   sensors.
//! - [`SimCore::step_dr`]: action noise, optional Q-Plugin, optional
//!   residual correction, noisy sensors.
//!
//! One built core serves exactly one episode. Domain randomization never
//! mutates a live core; a fresh core is assembled per episode through
//! [`SimCoreBuilder`].

use serde::{Deserialize, Serialize};

use crate::engine::SimRng;
use crate::error::{SimError, SimResult};
use crate::noise::QPlugin;
use crate::physics::PhysicsEngine;
use crate::residual::ResidualModel;
use crate::sensors::SensorModel;
use crate::state::{Action, Observation, SimState, StateDelta};

/// Everything one step produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutput {
    /// Simulation time after the step, seconds.
    pub t: f64,
    /// True state after the step (post perturbation and residual).
    pub state: SimState,
    /// Sensor readings for the post-step state.
    pub observation: Observation,
    /// The commanded action.
    pub action: Action,
    /// The action actually applied, when DR action noise fired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noisy_action: Option<Action>,
    /// Residual correction applied this step, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub residual_delta: Option<StateDelta>,
    /// Whether the Q-Plugin perturbed the state this step.
    pub q_plugin_used: bool,
}

/// Deterministic stepping core. See the module docs for the mode matrix.
pub struct SimCore {
    physics: Box<dyn PhysicsEngine>,
    sensors: Vec<Box<dyn SensorModel>>,
    dt: f64,
    rng: SimRng,
    t: f64,
    state: SimState,
    q_plugin: Option<QPlugin>,
    residual: Option<Box<dyn ResidualModel>>,
    action_noise_scale: f64,
}

impl SimCore {
    /// Start building a core.
    #[must_use]
    pub fn builder() -> SimCoreBuilder {
        SimCoreBuilder::new()
    }

    /// Current simulation time, seconds.
    #[must_use]
    pub const fn t(&self) -> f64 {
        self.t
    }

    /// Timestep, seconds.
    #[must_use]
    pub const fn dt(&self) -> f64 {
        self.dt
    }

    /// Current true state.
    #[must_use]
    pub const fn state(&self) -> &SimState {
        &self.state
    }

    /// Reset time to zero, optionally overriding the state and the seed.
    pub fn reset(&mut self, state: Option<SimState>, seed: Option<u64>) -> SimResult<()> {
        self.t = 0.0;
        if let Some(seed) = seed {
            self.rng.reseed(seed);
            if let Some(q) = &mut self.q_plugin {
                q.reseed(seed.wrapping_add(1));
            }
        }
        if let Some(state) = state {
            self.physics.set_state(&state)?;
        }
        for sensor in &mut self.sensors {
            sensor.reset();
        }
        self.state = self.physics.state();
        Ok(())
    }

    fn observe(&mut self, noisy: bool) -> Observation {
        let mut observation = Observation::new();
        for sensor in &mut self.sensors {
            let rng = if noisy { Some(&mut self.rng) } else { None };
            let reading = sensor.observe(&self.state, self.t, rng);
            observation.insert(sensor.name().to_string(), reading);
        }
        observation
    }

    fn advance(&mut self, action: &Action) -> SimResult<()> {
        self.physics.apply_action(action, self.dt)?;
        self.physics.step(self.dt)?;
        self.t += self.dt;
        self.state = self.physics.state();
        Ok(())
    }

    /// Fully deterministic step: exact dynamics, noiseless sensors.
    pub fn step(&mut self, action: &Action) -> SimResult<StepOutput> {
        self.advance(action)?;
        let observation = self.observe(false);
        Ok(StepOutput {
            t: self.t,
            state: self.state.clone(),
            observation,
            action: action.clone(),
            noisy_action: None,
            residual_delta: None,
            q_plugin_used: false,
        })
    }

    /// Deterministic dynamics with noisy sensors.
    pub fn step_stochastic(&mut self, action: &Action) -> SimResult<StepOutput> {
        self.advance(action)?;
        let observation = self.observe(true);
        Ok(StepOutput {
            t: self.t,
            state: self.state.clone(),
            observation,
            action: action.clone(),
            noisy_action: None,
            residual_delta: None,
            q_plugin_used: false,
        })
    }

    /// Q-Plugin step: the post-step state is perturbed by structured noise
    /// driven by pre-step contact diagnostics, then written back into the
    /// engine so the perturbation compounds.
    pub fn step_quantum(&mut self, action: &Action) -> SimResult<StepOutput> {
        let q = self
            .q_plugin
            .as_mut()
            .ok_or_else(|| SimError::config("step_quantum requires a Q-Plugin"))?;

        // Contacts are captured before the step in this mode.
        let diagnostics = self.physics.diagnostics();
        self.physics.apply_action(action, self.dt)?;
        self.physics.step(self.dt)?;
        self.t += self.dt;

        let stepped = self.physics.state();
        let perturbed = q.perturb_state(&stepped, action, &diagnostics);
        self.physics.set_state(&perturbed)?;
        self.state = self.physics.state();

        let observation = self.observe(true);
        Ok(StepOutput {
            t: self.t,
            state: self.state.clone(),
            observation,
            action: action.clone(),
            noisy_action: None,
            residual_delta: None,
            q_plugin_used: true,
        })
    }

    /// Domain-randomized step: gaussian action noise, optional Q-Plugin
    /// perturbation, optional residual correction, noisy sensors.
    pub fn step_dr(&mut self, action: &Action) -> SimResult<StepOutput> {
        let (applied, noisy_action) = if self.action_noise_scale > 0.0 {
            let noisy = self.noisy_action(action);
            (noisy.clone(), Some(noisy))
        } else {
            (action.clone(), None)
        };

        self.physics.apply_action(&applied, self.dt)?;
        self.physics.step(self.dt)?;
        self.t += self.dt;

        let mut q_plugin_used = false;
        if let Some(q) = &mut self.q_plugin {
            // DR mode reads contacts after the step.
            let diagnostics = self.physics.diagnostics();
            let stepped = self.physics.state();
            let perturbed = q.perturb_state(&stepped, &applied, &diagnostics);
            self.physics.set_state(&perturbed)?;
            q_plugin_used = true;
        }

        let mut residual_delta = None;
        if let Some(residual) = &self.residual {
            let current = self.physics.state();
            let delta = residual.predict_delta(&current, &applied);
            let mut corrected = current;
            for (p, d) in corrected
                .joint_positions
                .iter_mut()
                .zip(&delta.joint_positions)
            {
                *p += d;
            }
            for (v, d) in corrected
                .joint_velocities
                .iter_mut()
                .zip(&delta.joint_velocities)
            {
                *v += d;
            }
            self.physics.set_state(&corrected)?;
            residual_delta = Some(delta);
        }

        self.state = self.physics.state();
        let observation = self.observe(true);
        Ok(StepOutput {
            t: self.t,
            state: self.state.clone(),
            observation,
            action: action.clone(),
            noisy_action,
            residual_delta,
            q_plugin_used,
        })
    }

    fn noisy_action(&mut self, action: &Action) -> Action {
        let scale = self.action_noise_scale;
        let mut noisy = action.clone();
        if let Some(targets) = &mut noisy.joint_targets {
            for t in targets.iter_mut() {
                *t += self.rng.gen_normal(0.0, scale);
            }
        }
        if let Some(torques) = &mut noisy.joint_torques {
            for t in torques.iter_mut() {
                *t += self.rng.gen_normal(0.0, scale);
            }
        }
        if let Some(v) = &mut noisy.base_velocity {
            for c in v.iter_mut() {
                *c += self.rng.gen_normal(0.0, scale);
            }
        }
        noisy
    }
}

/// Assembles a `SimCore` for one episode.
///
/// Randomized collaborators (sensor noise scales, latency, Q-Plugin, action
/// noise) are baked in here from the overlaid profile, so the built core is
/// immutable configuration-wise for its whole episode.
pub struct SimCoreBuilder {
    physics: Option<Box<dyn PhysicsEngine>>,
    sensors: Vec<Box<dyn SensorModel>>,
    dt: f64,
    seed: u64,
    q_plugin: Option<QPlugin>,
    residual: Option<Box<dyn ResidualModel>>,
    action_noise_scale: f64,
}

impl Default for SimCoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SimCoreBuilder {
    /// Empty builder with dt 0.01 and seed 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            physics: None,
            sensors: Vec::new(),
            dt: 0.01,
            seed: 0,
            q_plugin: None,
            residual: None,
            action_noise_scale: 0.0,
        }
    }

    /// Set the physics engine (required).
    #[must_use]
    pub fn physics(mut self, physics: Box<dyn PhysicsEngine>) -> Self {
        self.physics = Some(physics);
        self
    }

    /// Append a sensor.
    #[must_use]
    pub fn sensor(mut self, sensor: Box<dyn SensorModel>) -> Self {
        self.sensors.push(sensor);
        self
    }

    /// Set the timestep, seconds.
    #[must_use]
    pub const fn dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    /// Set the episode seed.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Attach a Q-Plugin.
    #[must_use]
    pub fn q_plugin(mut self, q_plugin: QPlugin) -> Self {
        self.q_plugin = Some(q_plugin);
        self
    }

    /// Attach a residual model.
    #[must_use]
    pub fn residual(mut self, residual: Box<dyn ResidualModel>) -> Self {
        self.residual = Some(residual);
        self
    }

    /// Set the DR action-noise standard deviation.
    #[must_use]
    pub const fn action_noise_scale(mut self, scale: f64) -> Self {
        self.action_noise_scale = scale;
        self
    }

    /// Build the core.
    pub fn build(self) -> SimResult<SimCore> {
        let physics = self
            .physics
            .ok_or_else(|| SimError::config("SimCore requires a physics engine"))?;
        if self.dt <= 0.0 || !self.dt.is_finite() {
            return Err(SimError::config(format!("invalid dt {}", self.dt)));
        }
        if self.action_noise_scale < 0.0 {
            return Err(SimError::config(format!(
                "action_noise_scale must be non-negative, got {}",
                self.action_noise_scale
            )));
        }
        let state = physics.state();
        Ok(SimCore {
            physics,
            sensors: self.sensors,
            dt: self.dt,
            rng: SimRng::new(self.seed),
            t: 0.0,
            state,
            q_plugin: self.q_plugin,
            residual: self.residual,
            action_noise_scale: self.action_noise_scale,
        })
    }
}

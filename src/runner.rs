//! Episode runner.
//!
//! Assembles a fresh `SimCore` from an `EpisodeConfig`, drives it with a
//! scripted action sequence, and returns the timeline, summary metrics, and
//! a replay bundle that reproduces the episode bit-for-bit.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::core::{SimCore, StepOutput};
use crate::dr::Realization;
use crate::error::{SimError, SimResult};
use crate::noise::{QPlugin, QPluginKnobs};
use crate::physics::planar_arm::NUM_JOINTS;
use crate::physics::{PlanarArmEngine, PlanarArmParams};
use crate::profile::{MassScale, RealityProfile};
use crate::residual::MlpResidual;
use crate::sensors::{CameraSensor, ImuSensor, LatencySensor, LidarSensor, SensorModel};
use crate::state::{Action, Observation, SimState};

/// Stepping mode for an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepMode {
    Deterministic,
    Stochastic,
    Quantum,
    DomainRandomized,
}

/// Everything needed to run (or re-run) one episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeConfig {
    /// Number of steps.
    pub steps: usize,
    /// Timestep, seconds.
    pub dt: f64,
    /// Episode seed; every stochastic collaborator derives from it.
    pub seed: u64,
    /// Stepping mode.
    pub mode: StepMode,
    /// Attach the Q-Plugin (implied by `StepMode::Quantum`).
    pub use_q_plugin: bool,
    /// Attach the test residual model in DR mode.
    pub use_residual: bool,
    /// The reality profile to run against.
    pub profile: RealityProfile,
    /// Sampled DR realization, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realization: Option<Realization>,
}

impl EpisodeConfig {
    /// A deterministic episode against the given profile.
    #[must_use]
    pub fn new(profile: RealityProfile, steps: usize, seed: u64) -> Self {
        Self {
            steps,
            dt: profile.physics.timestep,
            seed,
            mode: StepMode::Deterministic,
            use_q_plugin: false,
            use_residual: false,
            profile,
            realization: None,
        }
    }
}

/// One recorded step. `step_time_ms` is wall-clock and excluded from the
/// determinism contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: usize,
    pub t: f64,
    pub state: SimState,
    pub observation: Observation,
    pub action: Action,
    pub q_plugin_used: bool,
    pub step_time_ms: f64,
}

/// Episode summary metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeMetrics {
    pub steps: usize,
    pub dt: f64,
    pub num_joints: usize,
    pub avg_step_time_ms: f64,
    pub total_time_s: f64,
    pub end_effector_position: [f64; 3],
    pub total_joint_travel_rad: f64,
}

impl EpisodeMetrics {
    /// Flatten into a named scalar map for gap-metric consumption.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        map.insert("steps".to_string(), self.steps as f64);
        map.insert("dt".to_string(), self.dt);
        map.insert("num_joints".to_string(), self.num_joints as f64);
        map.insert("avg_step_time_ms".to_string(), self.avg_step_time_ms);
        map.insert("total_time_s".to_string(), self.total_time_s);
        map.insert("end_effector_x".to_string(), self.end_effector_position[0]);
        map.insert("end_effector_z".to_string(), self.end_effector_position[2]);
        map.insert(
            "total_joint_travel_rad".to_string(),
            self.total_joint_travel_rad,
        );
        map
    }
}

/// Everything needed to reproduce an episode bit-for-bit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayBundle {
    pub config: EpisodeConfig,
    pub initial_state: SimState,
    pub actions: Vec<Action>,
}

/// Full result of one episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeReport {
    pub metrics: EpisodeMetrics,
    pub timeline: Vec<StepRecord>,
    pub replay: ReplayBundle,
}

/// Scripted sinusoidal joint targets: a pure function of the step index,
/// joint count, horizon, and seed, so replays regenerate identical actions.
#[must_use]
pub fn scripted_action(step: usize, num_joints: usize, steps: usize, seed: u64) -> Action {
    let t = step as f64 / steps.max(1) as f64;
    let targets = (0..num_joints)
        .map(|j| {
            let j = j as f64;
            let freq = 0.5 + j * 0.3;
            let phase = j * 0.7 + seed as f64 * 0.01;
            let amplitude = 0.8 - j * 0.15;
            amplitude * (2.0 * std::f64::consts::PI * freq * t + phase).sin()
        })
        .collect();
    Action::with_targets(targets)
}

fn build_sensors(profile: &RealityProfile) -> Vec<Box<dyn SensorModel>> {
    let noise = profile.sensors.noise_scale;
    let latency = profile.sensors.latency_steps;
    let raw: Vec<Box<dyn SensorModel>> = vec![
        Box::new(ImuSensor::new(noise)),
        Box::new(CameraSensor::new(noise, profile.sensors.camera_degrade)),
        Box::new(LidarSensor::new(LidarSensor::DEFAULT_RAYS, noise)),
    ];
    raw.into_iter()
        .map(|s| Box::new(LatencySensor::new(s, latency)) as Box<dyn SensorModel>)
        .collect()
}

/// Assemble a fresh core for the given episode configuration.
pub fn build_core(config: &EpisodeConfig) -> SimResult<SimCore> {
    let profile = match &config.realization {
        Some(r) => config.profile.overlay(r),
        None => config.profile.clone(),
    };

    let mass_scale = config.realization.as_ref().map_or_else(
        || match profile.gap_knobs.mass_scale {
            MassScale::Scalar(s) => s,
            MassScale::Range(_) => 1.0,
        },
        |r| r.mass_scale,
    );
    let params = PlanarArmParams::from_profile(&profile, mass_scale);

    let mut builder = SimCore::builder()
        .physics(Box::new(PlanarArmEngine::new(params)))
        .dt(config.dt)
        .seed(config.seed);

    for sensor in build_sensors(&profile) {
        builder = builder.sensor(sensor);
    }

    let needs_q = config.use_q_plugin || config.mode == StepMode::Quantum;
    if needs_q {
        let q_seed = config.seed.wrapping_add(1);
        let q = match QPlugin::from_profile(&profile, q_seed)? {
            Some(q) => q,
            None => QPlugin::new(QPluginKnobs::default(), q_seed)?,
        };
        builder = builder.q_plugin(q);
    }

    if config.use_residual {
        let residual =
            MlpResidual::random_weights(NUM_JOINTS, NUM_JOINTS, 16, config.seed.wrapping_add(2));
        builder = builder.residual(Box::new(residual));
    }

    if let Some(r) = &config.realization {
        builder = builder.action_noise_scale(r.action_noise_scale);
    }

    builder.build()
}

fn dispatch(core: &mut SimCore, mode: StepMode, action: &Action) -> SimResult<StepOutput> {
    match mode {
        StepMode::Deterministic => core.step(action),
        StepMode::Stochastic => core.step_stochastic(action),
        StepMode::Quantum => core.step_quantum(action),
        StepMode::DomainRandomized => core.step_dr(action),
    }
}

fn run_core(
    config: &EpisodeConfig,
    mut core: SimCore,
    recorded_actions: Option<&[Action]>,
) -> SimResult<EpisodeReport> {
    let initial_state = core.state().clone();
    let mut timeline = Vec::with_capacity(config.steps);
    let mut actions = Vec::with_capacity(config.steps);
    let mut total_travel = 0.0;
    let mut prev_positions = initial_state.joint_positions.clone();
    let wall_start = Instant::now();

    for step in 0..config.steps {
        let action = match recorded_actions {
            Some(recorded) => recorded
                .get(step)
                .cloned()
                .ok_or_else(|| SimError::replay(format!("missing action for step {step}")))?,
            None => scripted_action(step, initial_state.num_joints(), config.steps, config.seed),
        };
        let started = Instant::now();
        let out = dispatch(&mut core, config.mode, &action)?;
        let step_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        for (p, q) in out.state.joint_positions.iter().zip(&prev_positions) {
            total_travel += (p - q).abs();
        }
        prev_positions.clone_from(&out.state.joint_positions);

        actions.push(action.clone());
        timeline.push(StepRecord {
            step,
            t: out.t,
            state: out.state,
            observation: out.observation,
            action,
            q_plugin_used: out.q_plugin_used,
            step_time_ms,
        });
    }

    let total_time_s = wall_start.elapsed().as_secs_f64();
    let avg_step_time_ms = if timeline.is_empty() {
        0.0
    } else {
        timeline.iter().map(|r| r.step_time_ms).sum::<f64>() / timeline.len() as f64
    };
    let end_effector_position = timeline
        .last()
        .map_or(initial_state.end_effector, |r| r.state.end_effector);

    Ok(EpisodeReport {
        metrics: EpisodeMetrics {
            steps: config.steps,
            dt: config.dt,
            num_joints: initial_state.num_joints(),
            avg_step_time_ms,
            total_time_s,
            end_effector_position,
            total_joint_travel_rad: total_travel,
        },
        timeline,
        replay: ReplayBundle {
            config: config.clone(),
            initial_state,
            actions,
        },
    })
}

/// Run one episode from scratch with the scripted action sequence.
pub fn run_episode(config: &EpisodeConfig) -> SimResult<EpisodeReport> {
    let core = build_core(config)?;
    run_core(config, core, None)
}

/// Re-run a recorded episode. States and observations match the original
/// bit-for-bit; only `step_time_ms` differs.
pub fn replay_episode(bundle: &ReplayBundle) -> SimResult<EpisodeReport> {
    if bundle.actions.len() != bundle.config.steps {
        return Err(SimError::replay(format!(
            "bundle has {} actions for {} steps",
            bundle.actions.len(),
            bundle.config.steps
        )));
    }
    let mut core = build_core(&bundle.config)?;
    core.reset(Some(bundle.initial_state.clone()), Some(bundle.config.seed))?;
    run_core(&bundle.config, core, Some(&bundle.actions))
}

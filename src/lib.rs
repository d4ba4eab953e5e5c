//! # gapsim
//!
//! Deterministic physics/sensor/noise stepping core with a
//! sim-to-pseudo-reality evaluation layer.
//!
//! The crate simulates a simple robot against configurable "pseudo-real"
//! reality profiles and measures how far design-condition behavior drifts
//! under perturbed physics, noisy sensors, structured state-dependent noise
//! (the Q-Plugin), and domain randomization.
//!
//! ## Determinism contract
//!
//! Every stochastic component is seeded explicitly. Identical (profile,
//! seed, action sequence) triples produce bit-identical trajectories, and
//! any recorded episode replays exactly from its [`runner::ReplayBundle`].
//!
//! ## Layout
//!
//! - [`core`]: the stepping core and its per-episode builder.
//! - [`physics`]: the engine trait plus the planar-arm reference stub.
//! - [`sensors`]: IMU, camera, lidar, and the latency decorator.
//! - [`noise`]: the Q-Plugin and its quantum sampling circuit.
//! - [`residual`]: residual dynamics correction models.
//! - [`profile`] / [`dr`]: reality profiles and domain randomization.
//! - [`runner`]: episode execution and replay.
//! - [`eval`]: batch evaluation, adversarial search, gap metrics.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::similar_names
)]

pub mod core;
pub mod dr;
pub mod engine;
pub mod error;
pub mod eval;
pub mod noise;
pub mod physics;
pub mod profile;
pub mod residual;
pub mod runner;
pub mod sensors;
pub mod state;

pub use crate::core::{SimCore, SimCoreBuilder, StepOutput};
pub use crate::dr::{DrConfig, DrSampler, Realization};
pub use crate::engine::SimRng;
pub use crate::error::{SimError, SimResult};
pub use crate::noise::{NoiseDistribution, NoiseSampler, QPlugin, QPluginKnobs};
pub use crate::physics::{PhysicsEngine, PlanarArmEngine, PlanarArmParams};
pub use crate::profile::RealityProfile;
pub use crate::residual::{MlpResidual, ResidualModel, ZeroResidual};
pub use crate::runner::{
    run_episode, replay_episode, EpisodeConfig, EpisodeReport, ReplayBundle, StepMode,
};
pub use crate::sensors::SensorModel;
pub use crate::state::{Action, Observation, SensorReading, SimState};

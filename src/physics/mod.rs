//! Physics engine seam.
//!
//! `SimCore` drives any `PhysicsEngine`; the crate ships the
//! [`planar_arm::PlanarArmEngine`] reference implementation.

pub mod planar_arm;

use crate::error::SimResult;
use crate::state::{Action, EngineDiagnostics, SimState};

pub use planar_arm::{PlanarArmEngine, PlanarArmParams};

/// Stepping interface every physics backend implements.
///
/// Engines are deterministic: given the same state and action sequence they
/// produce bit-identical trajectories. All stochasticity lives outside the
/// engine (Q-Plugin, sensors, DR).
pub trait PhysicsEngine: Send {
    /// Apply an action's commands (targets, torques, base velocity) to the
    /// internal actuation state. Does not advance time.
    fn apply_action(&mut self, action: &Action, dt: f64) -> SimResult<()>;

    /// Advance the world by `dt` seconds.
    fn step(&mut self, dt: f64) -> SimResult<()>;

    /// Snapshot the current state.
    fn state(&self) -> SimState;

    /// Overwrite the internal state, e.g. after a noise perturbation or a
    /// residual correction.
    fn set_state(&mut self, state: &SimState) -> SimResult<()>;

    /// Contact diagnostics for the current state.
    fn diagnostics(&self) -> EngineDiagnostics {
        EngineDiagnostics::default()
    }
}

//! Residual dynamics correction.
//!
//! A residual model predicts an additive correction to the simulator's joint
//! state, standing in for a learned sim-to-real correction. Inference only;
//! weights are fixed at construction.

use serde::{Deserialize, Serialize};

use crate::engine::SimRng;
use crate::state::{Action, SimState, StateDelta};

/// Correction seam applied after the physics step in DR mode.
pub trait ResidualModel: Send {
    /// Predict the correction for the post-step state and the action that
    /// produced it.
    fn predict_delta(&self, state: &SimState, action: &Action) -> StateDelta;
}

/// Residual that predicts nothing. Useful as a baseline and for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroResidual;

impl ResidualModel for ZeroResidual {
    fn predict_delta(&self, state: &SimState, _action: &Action) -> StateDelta {
        StateDelta::zeroed(state.num_joints())
    }
}

/// Single-hidden-layer tanh MLP over `[joint_positions ‖ joint_velocities ‖
/// joint_targets]`, predicting a joint-position delta.
///
/// Targets absent from the action are fed as zeros.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpResidual {
    state_dim: usize,
    action_dim: usize,
    hidden_dim: usize,
    /// Row-major `[hidden_dim x input_dim]`.
    w1: Vec<f64>,
    b1: Vec<f64>,
    /// Row-major `[output_dim x hidden_dim]`.
    w2: Vec<f64>,
    b2: Vec<f64>,
}

impl MlpResidual {
    /// Build from explicit weights.
    #[must_use]
    pub fn new(
        state_dim: usize,
        action_dim: usize,
        hidden_dim: usize,
        w1: Vec<f64>,
        b1: Vec<f64>,
        w2: Vec<f64>,
        b2: Vec<f64>,
    ) -> Self {
        Self {
            state_dim,
            action_dim,
            hidden_dim,
            w1,
            b1,
            w2,
            b2,
        }
    }

    /// Random small weights (scale 1e-3) for testing the inference path.
    ///
    /// `state_dim` counts joints; the input layer sees positions,
    /// velocities, and targets, so `2 * state_dim + action_dim` inputs.
    #[must_use]
    pub fn random_weights(state_dim: usize, action_dim: usize, hidden_dim: usize, seed: u64) -> Self {
        let mut rng = SimRng::new(seed);
        let input_dim = 2 * state_dim + action_dim;
        let scale = 1e-3;
        let w1 = (0..hidden_dim * input_dim)
            .map(|_| rng.gen_normal(0.0, scale))
            .collect();
        let b1 = vec![0.0; hidden_dim];
        let w2 = (0..state_dim * hidden_dim)
            .map(|_| rng.gen_normal(0.0, scale))
            .collect();
        let b2 = vec![0.0; state_dim];
        Self::new(state_dim, action_dim, hidden_dim, w1, b1, w2, b2)
    }

    fn input_vector(&self, state: &SimState, action: &Action) -> Vec<f64> {
        let mut input = Vec::with_capacity(2 * self.state_dim + self.action_dim);
        for i in 0..self.state_dim {
            input.push(state.joint_positions.get(i).copied().unwrap_or(0.0));
        }
        for i in 0..self.state_dim {
            input.push(state.joint_velocities.get(i).copied().unwrap_or(0.0));
        }
        for i in 0..self.action_dim {
            let target = action
                .joint_targets
                .as_ref()
                .and_then(|t| t.get(i).copied())
                .unwrap_or(0.0);
            input.push(target);
        }
        input
    }
}

impl ResidualModel for MlpResidual {
    fn predict_delta(&self, state: &SimState, action: &Action) -> StateDelta {
        let input = self.input_vector(state, action);
        let input_dim = input.len();

        let mut hidden = vec![0.0; self.hidden_dim];
        for (h, hv) in hidden.iter_mut().enumerate() {
            let mut acc = self.b1.get(h).copied().unwrap_or(0.0);
            for (i, x) in input.iter().enumerate() {
                acc += self.w1.get(h * input_dim + i).copied().unwrap_or(0.0) * x;
            }
            *hv = acc.tanh();
        }

        let mut output = vec![0.0; self.state_dim];
        for (o, ov) in output.iter_mut().enumerate() {
            let mut acc = self.b2.get(o).copied().unwrap_or(0.0);
            for (h, hv) in hidden.iter().enumerate() {
                acc += self.w2.get(o * self.hidden_dim + h).copied().unwrap_or(0.0) * hv;
            }
            *ov = acc;
        }

        StateDelta {
            joint_positions: output,
            joint_velocities: vec![0.0; self.state_dim],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_residual() {
        let r = ZeroResidual;
        let state = SimState::zeroed(4);
        let delta = r.predict_delta(&state, &Action::noop());
        assert_eq!(delta, StateDelta::zeroed(4));
    }

    #[test]
    fn test_mlp_output_shape() {
        let r = MlpResidual::random_weights(4, 4, 16, 42);
        let state = SimState::zeroed(4);
        let delta = r.predict_delta(&state, &Action::noop());
        assert_eq!(delta.joint_positions.len(), 4);
        assert_eq!(delta.joint_velocities.len(), 4);
    }

    #[test]
    fn test_mlp_deterministic() {
        let r = MlpResidual::random_weights(4, 4, 16, 42);
        let mut state = SimState::zeroed(4);
        state.joint_positions = vec![0.5, -0.3, 0.2, 0.1];
        let action = Action::with_targets(vec![0.1; 4]);
        assert_eq!(
            r.predict_delta(&state, &action),
            r.predict_delta(&state, &action)
        );
    }

    #[test]
    fn test_mlp_depends_on_state() {
        let r = MlpResidual::random_weights(4, 4, 16, 42);
        let zero = SimState::zeroed(4);
        let mut moved = SimState::zeroed(4);
        moved.joint_positions = vec![1.0, 1.0, 1.0, 1.0];
        assert_ne!(
            r.predict_delta(&zero, &Action::noop()).joint_positions,
            r.predict_delta(&moved, &Action::noop()).joint_positions
        );
    }

    #[test]
    fn test_mlp_small_weights_small_output() {
        let r = MlpResidual::random_weights(4, 4, 16, 42);
        let mut state = SimState::zeroed(4);
        state.joint_positions = vec![1.0; 4];
        let delta = r.predict_delta(&state, &Action::noop());
        for d in delta.joint_positions {
            assert!(d.abs() < 0.01, "delta {d} unexpectedly large");
        }
    }
}

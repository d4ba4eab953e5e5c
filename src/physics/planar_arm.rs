//! Reference physics stub: a 4-joint planar arm on a mobile base.
//!
//! Dynamics are deliberately simple (semi-implicit Euler, per-joint gravity
//! torque, viscous damping, hard joint limits with a bounce) but fully
//! deterministic and parameterized, which is what the gap-evaluation layer
//! needs from a stand-in engine.

use crate::error::{SimError, SimResult};
use crate::profile::RealityProfile;
use crate::state::{Action, Contact, EngineDiagnostics, SimState};

use super::PhysicsEngine;

/// Number of arm joints.
pub const NUM_JOINTS: usize = 4;

/// Link lengths, meters, shoulder to wrist.
pub const LINK_LENGTHS: [f64; NUM_JOINTS] = [0.15, 0.12, 0.10, 0.08];

/// Symmetric joint limit, radians.
const JOINT_LIMIT: f64 = 2.5;

/// Per-link mass, kilograms.
const LINK_MASS: f64 = 0.1;

/// Velocity retained when bouncing off a joint limit.
const LIMIT_RESTITUTION: f64 = 0.3;

/// Arm base height above the ground plane, meters.
const BASE_HEIGHT: f64 = 0.15;

/// Link z below this counts as ground contact.
const CONTACT_THRESHOLD: f64 = 0.01;

/// PD position-control gains.
const KP: f64 = 8.0;
const KD: f64 = 1.5;

/// Per-step multiplicative decay on base velocity.
const BASE_FRICTION_DECAY: f64 = 0.98;

/// Physical parameters the profile and DR layer can vary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarArmParams {
    /// Vertical gravity component, m/s².
    pub gravity_z: f64,
    /// Multiplier on link masses.
    pub mass_scale: f64,
    /// Viscous joint damping coefficient.
    pub joint_damping: f64,
}

impl Default for PlanarArmParams {
    fn default() -> Self {
        Self {
            gravity_z: -9.81,
            mass_scale: 1.0,
            joint_damping: 0.3,
        }
    }
}

impl PlanarArmParams {
    /// Build parameters from a (possibly overlaid) profile plus the mass
    /// scale a DR realization chose.
    #[must_use]
    pub fn from_profile(profile: &RealityProfile, mass_scale: f64) -> Self {
        Self {
            gravity_z: profile.physics.gravity[2],
            mass_scale,
            joint_damping: Self::default().joint_damping,
        }
    }
}

/// 4-joint planar arm engine. Kinematics live in the XZ plane; the base
/// translates freely in XY.
#[derive(Debug, Clone)]
pub struct PlanarArmEngine {
    params: PlanarArmParams,
    base_position: [f64; 3],
    base_velocity: [f64; 3],
    joint_positions: [f64; NUM_JOINTS],
    joint_velocities: [f64; NUM_JOINTS],
    /// Torques accumulated by `apply_action`, consumed by `step`.
    pending_torques: [f64; NUM_JOINTS],
}

impl PlanarArmEngine {
    /// Create an engine at rest with the given parameters.
    #[must_use]
    pub fn new(params: PlanarArmParams) -> Self {
        Self {
            params,
            base_position: [0.0; 3],
            base_velocity: [0.0; 3],
            joint_positions: [0.0; NUM_JOINTS],
            joint_velocities: [0.0; NUM_JOINTS],
            pending_torques: [0.0; NUM_JOINTS],
        }
    }

    /// Current parameters.
    #[must_use]
    pub const fn params(&self) -> PlanarArmParams {
        self.params
    }

    /// Gravity torque on joint `j`: remaining arm mass times moment arm,
    /// scaled by a fixed 0.1 moment factor.
    fn gravity_torque(&self, j: usize) -> f64 {
        let remaining_length: f64 = LINK_LENGTHS[j..].iter().sum();
        self.params.gravity_z
            * self.params.mass_scale
            * LINK_MASS
            * remaining_length
            * self.joint_positions[j].sin()
            * 0.1
    }

    /// Forward kinematics in the XZ plane from the base top.
    fn link_positions(&self) -> Vec<[f64; 3]> {
        let mut positions = Vec::with_capacity(NUM_JOINTS);
        let mut x = self.base_position[0];
        let mut z = self.base_position[2] + BASE_HEIGHT;
        let mut angle = 0.0;
        for j in 0..NUM_JOINTS {
            angle += self.joint_positions[j];
            x += LINK_LENGTHS[j] * angle.sin();
            z += LINK_LENGTHS[j] * angle.cos();
            positions.push([x, self.base_position[1], z.max(0.0)]);
        }
        positions
    }
}

impl PhysicsEngine for PlanarArmEngine {
    fn apply_action(&mut self, action: &Action, _dt: f64) -> SimResult<()> {
        self.pending_torques = [0.0; NUM_JOINTS];

        if let Some(targets) = &action.joint_targets {
            if targets.len() != NUM_JOINTS {
                return Err(SimError::physics(format!(
                    "expected {NUM_JOINTS} joint targets, got {}",
                    targets.len()
                )));
            }
            for j in 0..NUM_JOINTS {
                let err = targets[j] - self.joint_positions[j];
                self.pending_torques[j] += KP * err - KD * self.joint_velocities[j];
            }
        }

        if let Some(torques) = &action.joint_torques {
            if torques.len() != NUM_JOINTS {
                return Err(SimError::physics(format!(
                    "expected {NUM_JOINTS} joint torques, got {}",
                    torques.len()
                )));
            }
            for j in 0..NUM_JOINTS {
                self.pending_torques[j] += torques[j];
            }
        }

        if let Some(v) = action.base_velocity {
            self.base_velocity = v;
        }

        Ok(())
    }

    fn step(&mut self, dt: f64) -> SimResult<()> {
        if dt <= 0.0 || !dt.is_finite() {
            return Err(SimError::physics(format!("invalid timestep {dt}")));
        }

        // Semi-implicit Euler: velocity first, then position.
        for j in 0..NUM_JOINTS {
            let torque = self.pending_torques[j] + self.gravity_torque(j)
                - self.params.joint_damping * self.joint_velocities[j];
            let inertia = self.params.mass_scale * LINK_MASS * LINK_LENGTHS[j] * LINK_LENGTHS[j];
            // Guard against degenerate mass scales.
            let inertia = inertia.max(1e-9);
            self.joint_velocities[j] += torque / inertia * dt;
            self.joint_positions[j] += self.joint_velocities[j] * dt;

            if self.joint_positions[j] > JOINT_LIMIT {
                self.joint_positions[j] = JOINT_LIMIT;
                self.joint_velocities[j] = -self.joint_velocities[j].abs() * LIMIT_RESTITUTION;
            } else if self.joint_positions[j] < -JOINT_LIMIT {
                self.joint_positions[j] = -JOINT_LIMIT;
                self.joint_velocities[j] = self.joint_velocities[j].abs() * LIMIT_RESTITUTION;
            }
        }

        for i in 0..3 {
            self.base_position[i] += self.base_velocity[i] * dt;
            self.base_velocity[i] *= BASE_FRICTION_DECAY;
        }
        // Base stays on the ground plane.
        self.base_position[2] = self.base_position[2].max(0.0);

        Ok(())
    }

    fn state(&self) -> SimState {
        let link_positions = self.link_positions();
        let end_effector = link_positions
            .last()
            .copied()
            .unwrap_or([0.0, 0.0, BASE_HEIGHT]);
        SimState {
            base_position: self.base_position,
            base_orientation: [0.0, 0.0, 0.0, 1.0],
            base_velocity: self.base_velocity,
            joint_positions: self.joint_positions.to_vec(),
            joint_velocities: self.joint_velocities.to_vec(),
            link_positions,
            end_effector,
        }
    }

    fn set_state(&mut self, state: &SimState) -> SimResult<()> {
        if state.joint_positions.len() != NUM_JOINTS || state.joint_velocities.len() != NUM_JOINTS {
            return Err(SimError::physics(format!(
                "state has {} joints, engine has {NUM_JOINTS}",
                state.joint_positions.len()
            )));
        }
        self.base_position = state.base_position;
        self.base_velocity = state.base_velocity;
        for j in 0..NUM_JOINTS {
            self.joint_positions[j] = state.joint_positions[j].clamp(-JOINT_LIMIT, JOINT_LIMIT);
            self.joint_velocities[j] = state.joint_velocities[j];
        }
        Ok(())
    }

    fn diagnostics(&self) -> EngineDiagnostics {
        let contacts: Vec<Contact> = self
            .link_positions()
            .into_iter()
            .enumerate()
            .filter(|(_, p)| p[2] <= CONTACT_THRESHOLD)
            .map(|(link_index, position)| Contact {
                link_index,
                position,
                normal_force: 0.5,
            })
            .collect();
        EngineDiagnostics {
            num_contacts: contacts.len(),
            contacts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> PlanarArmEngine {
        PlanarArmEngine::new(PlanarArmParams::default())
    }

    #[test]
    fn test_rest_state_shape() {
        let e = engine();
        let s = e.state();
        assert_eq!(s.num_joints(), NUM_JOINTS);
        // Straight-up arm: end effector at base height plus total length.
        let total: f64 = LINK_LENGTHS.iter().sum();
        assert!((s.end_effector[2] - (BASE_HEIGHT + total)).abs() < 1e-9);
        assert!((s.end_effector[0]).abs() < 1e-9);
    }

    #[test]
    fn test_determinism() {
        let mut e1 = engine();
        let mut e2 = engine();
        let action = Action::with_targets(vec![0.5, -0.3, 0.2, 0.1]);
        for _ in 0..200 {
            e1.apply_action(&action, 0.01).unwrap();
            e1.step(0.01).unwrap();
            e2.apply_action(&action, 0.01).unwrap();
            e2.step(0.01).unwrap();
        }
        assert_eq!(e1.state(), e2.state());
    }

    #[test]
    fn test_pd_control_converges() {
        let mut e = engine();
        let action = Action::with_targets(vec![0.5, 0.0, 0.0, 0.0]);
        for _ in 0..2000 {
            e.apply_action(&action, 0.01).unwrap();
            e.step(0.01).unwrap();
        }
        let s = e.state();
        assert!(
            (s.joint_positions[0] - 0.5).abs() < 0.2,
            "joint 0 did not approach target: {}",
            s.joint_positions[0]
        );
    }

    #[test]
    fn test_joint_limits_respected() {
        let mut e = engine();
        let action = Action {
            joint_torques: Some(vec![100.0, 100.0, 100.0, 100.0]),
            ..Action::default()
        };
        for _ in 0..500 {
            e.apply_action(&action, 0.01).unwrap();
            e.step(0.01).unwrap();
            for &p in &e.state().joint_positions {
                assert!(p.abs() <= JOINT_LIMIT + 1e-9, "joint exceeded limit: {p}");
            }
        }
    }

    #[test]
    fn test_base_velocity_decays() {
        let mut e = engine();
        let action = Action {
            base_velocity: Some([1.0, 0.0, 0.0]),
            ..Action::default()
        };
        e.apply_action(&action, 0.01).unwrap();
        e.step(0.01).unwrap();
        let v1 = e.state().base_velocity[0];
        // No new command: velocity keeps decaying.
        for _ in 0..100 {
            e.apply_action(&Action::noop(), 0.01).unwrap();
            e.step(0.01).unwrap();
        }
        let v2 = e.state().base_velocity[0];
        assert!(v2 < v1);
        assert!(v2 > 0.0);
    }

    #[test]
    fn test_wrong_action_arity_rejected() {
        let mut e = engine();
        let action = Action::with_targets(vec![0.0, 0.0]);
        assert!(e.apply_action(&action, 0.01).is_err());
    }

    #[test]
    fn test_set_state_roundtrip() {
        let mut e = engine();
        let mut s = e.state();
        s.joint_positions = vec![0.3, -0.2, 0.1, 0.05];
        s.joint_velocities = vec![0.1, 0.0, -0.1, 0.0];
        e.set_state(&s).unwrap();
        let back = e.state();
        assert_eq!(back.joint_positions, s.joint_positions);
        assert_eq!(back.joint_velocities, s.joint_velocities);
    }

    #[test]
    fn test_set_state_wrong_arity_rejected() {
        let mut e = engine();
        let s = SimState::zeroed(2);
        assert!(e.set_state(&s).is_err());
    }

    #[test]
    fn test_invalid_timestep_rejected() {
        let mut e = engine();
        assert!(e.step(0.0).is_err());
        assert!(e.step(-0.01).is_err());
        assert!(e.step(f64::NAN).is_err());
    }

    #[test]
    fn test_contact_when_arm_folded_down() {
        let mut e = engine();
        let mut s = e.state();
        // Fold the first joint far past horizontal so links dip to the ground.
        s.joint_positions = vec![2.5, 2.5, 0.0, 0.0];
        e.set_state(&s).unwrap();
        let d = e.diagnostics();
        assert!(d.num_contacts > 0, "expected ground contact");
        assert_eq!(d.num_contacts, d.contacts.len());
    }

    #[test]
    fn test_no_contact_at_rest() {
        let e = engine();
        assert_eq!(e.diagnostics().num_contacts, 0);
    }

    #[test]
    fn test_mass_scale_changes_trajectory() {
        let mut light = PlanarArmEngine::new(PlanarArmParams {
            mass_scale: 0.5,
            ..PlanarArmParams::default()
        });
        let mut heavy = PlanarArmEngine::new(PlanarArmParams {
            mass_scale: 2.0,
            ..PlanarArmParams::default()
        });
        let action = Action::with_targets(vec![0.5, 0.0, 0.0, 0.0]);
        for _ in 0..50 {
            light.apply_action(&action, 0.01).unwrap();
            light.step(0.01).unwrap();
            heavy.apply_action(&action, 0.01).unwrap();
            heavy.step(0.01).unwrap();
        }
        assert_ne!(
            light.state().joint_positions,
            heavy.state().joint_positions
        );
    }
}

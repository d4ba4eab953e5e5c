//! Core state, action, and observation types.
//!
//! Everything that crosses the physics/sensor/evaluation seams is a typed
//! struct that derives serde, so trajectories and reports can be persisted
//! by external writers without the core touching the filesystem.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Full simulator state snapshot.
///
/// Owned by the physics engine; `SimCore` keeps its own copy synchronized
/// after each step. Cloning is cheap enough to record per step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimState {
    /// Mobile base position in world frame, meters.
    pub base_position: [f64; 3],
    /// Base orientation quaternion (x, y, z, w).
    pub base_orientation: [f64; 4],
    /// Base linear velocity, m/s.
    pub base_velocity: [f64; 3],
    /// Joint angles, radians.
    pub joint_positions: Vec<f64>,
    /// Joint angular velocities, rad/s.
    pub joint_velocities: Vec<f64>,
    /// World-frame positions of each link end.
    pub link_positions: Vec<[f64; 3]>,
    /// End-effector position in world frame.
    pub end_effector: [f64; 3],
}

impl SimState {
    /// A zeroed state with the given joint count.
    #[must_use]
    pub fn zeroed(num_joints: usize) -> Self {
        Self {
            base_position: [0.0; 3],
            base_orientation: [0.0, 0.0, 0.0, 1.0],
            base_velocity: [0.0; 3],
            joint_positions: vec![0.0; num_joints],
            joint_velocities: vec![0.0; num_joints],
            link_positions: vec![[0.0; 3]; num_joints],
            end_effector: [0.0; 3],
        }
    }

    /// Number of joints in this state.
    #[must_use]
    pub fn num_joints(&self) -> usize {
        self.joint_positions.len()
    }
}

impl Default for SimState {
    fn default() -> Self {
        Self::zeroed(0)
    }
}

/// Commanded action for one step.
///
/// Absent fields are no-ops: an all-`None` action steps passive dynamics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// PD position targets, one per joint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joint_targets: Option<Vec<f64>>,
    /// Direct joint torques, N·m.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joint_torques: Option<Vec<f64>>,
    /// Commanded base velocity, m/s.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_velocity: Option<[f64; 3]>,
}

impl Action {
    /// Action that commands nothing.
    #[must_use]
    pub fn noop() -> Self {
        Self::default()
    }

    /// Position-control action.
    #[must_use]
    pub fn with_targets(targets: Vec<f64>) -> Self {
        Self {
            joint_targets: Some(targets),
            ..Self::default()
        }
    }
}

/// One sensor's output for a step.
///
/// The enum is closed: adding a sensor kind is a source-level change, which
/// keeps perception-gap comparison exhaustive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SensorReading {
    /// Inertial measurement: scalar acceleration proxy, gyro rates, and a
    /// forward-velocity estimate.
    Imu {
        acc: f64,
        gyro: [f64; 3],
        vel_estimate: f64,
    },
    /// Camera stub: image shape plus a scalar scene statistic. `degraded`
    /// marks episodes where the degrade knob fired.
    Camera {
        shape: [u32; 2],
        value: f64,
        degraded: bool,
    },
    /// Lidar stub: one range per ray, meters.
    Lidar { ranges: Vec<f64> },
}

impl SensorReading {
    /// Numeric fields used for perception-gap comparison.
    ///
    /// Camera contributes only its scalar statistic (shape and the degrade
    /// flag are not comparable magnitudes).
    #[must_use]
    pub fn numeric_fields(&self) -> Vec<f64> {
        match self {
            Self::Imu {
                acc,
                gyro,
                vel_estimate,
            } => {
                let mut v = vec![*acc];
                v.extend_from_slice(gyro);
                v.push(*vel_estimate);
                v
            }
            Self::Camera { value, .. } => vec![*value],
            Self::Lidar { ranges } => ranges.clone(),
        }
    }
}

/// Named sensor readings for one step. `BTreeMap` keeps iteration order
/// deterministic for serialization and gap comparison.
pub type Observation = BTreeMap<String, SensorReading>;

/// Additive correction predicted by a residual model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDelta {
    /// Per-joint position correction, radians.
    pub joint_positions: Vec<f64>,
    /// Per-joint velocity correction, rad/s.
    pub joint_velocities: Vec<f64>,
}

impl StateDelta {
    /// Zero delta for the given joint count.
    #[must_use]
    pub fn zeroed(num_joints: usize) -> Self {
        Self {
            joint_positions: vec![0.0; num_joints],
            joint_velocities: vec![0.0; num_joints],
        }
    }
}

/// A single ground-contact event reported by the physics engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Index of the contacting link.
    pub link_index: usize,
    /// World-frame contact position.
    pub position: [f64; 3],
    /// Normal force magnitude, newtons.
    pub normal_force: f64,
}

/// Engine-side diagnostics consumed by state-dependent noise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineDiagnostics {
    /// Number of active contacts this step.
    pub num_contacts: usize,
    /// The contacts themselves.
    pub contacts: Vec<Contact>,
}

//! Sensor models.
//!
//! A sensor maps the true simulator state to a `SensorReading`. When handed
//! an RNG it adds its configured noise; without one it is exactly
//! deterministic, which is what the deterministic stepping mode and the
//! dynamics-gap metric rely on.

pub mod camera;
pub mod imu;
pub mod latency;
pub mod lidar;

use crate::engine::SimRng;
use crate::state::{SensorReading, SimState};

pub use camera::CameraSensor;
pub use imu::ImuSensor;
pub use latency::LatencySensor;
pub use lidar::LidarSensor;

/// Interface every sensor model implements.
pub trait SensorModel: Send {
    /// Stable name used as the observation key.
    fn name(&self) -> &str;

    /// Produce a reading for the given state at simulation time `t`.
    ///
    /// `rng: None` means noiseless deterministic output.
    fn observe(&mut self, state: &SimState, t: f64, rng: Option<&mut SimRng>) -> SensorReading;

    /// Drop any state carried across steps, e.g. delay buffers. Invoked on
    /// episode reset; stateless sensors keep the default no-op.
    fn reset(&mut self) {}
}

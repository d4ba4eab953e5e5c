//! Lidar stub.

use crate::engine::SimRng;
use crate::state::{SensorReading, SimState};

use super::SensorModel;

/// Planar lidar stub with a configurable ray count.
///
/// Scene geometry is a single wall one meter ahead of the origin, so ranges
/// respond to base motion without a real raycaster.
#[derive(Debug, Clone)]
pub struct LidarSensor {
    name: String,
    num_rays: usize,
    noise_scale: f64,
}

impl LidarSensor {
    /// Default ray count.
    pub const DEFAULT_RAYS: usize = 16;

    /// Create a lidar with the given ray count and noise scale.
    #[must_use]
    pub fn new(num_rays: usize, noise_scale: f64) -> Self {
        Self {
            name: "lidar".to_string(),
            num_rays,
            noise_scale,
        }
    }
}

impl SensorModel for LidarSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn observe(&mut self, state: &SimState, _t: f64, rng: Option<&mut SimRng>) -> SensorReading {
        let base_range = 1.0 - state.base_position[0];
        let mut ranges: Vec<f64> = (0..self.num_rays)
            .map(|i| {
                // Spread rays over a half circle; off-axis rays see the wall
                // at a longer slant range.
                let angle = (i as f64 / self.num_rays.max(1) as f64 - 0.5) * std::f64::consts::PI;
                let slant = base_range / angle.cos().abs().max(0.1);
                slant.clamp(0.05, 10.0)
            })
            .collect();

        if let Some(rng) = rng {
            for r in &mut ranges {
                *r = (*r + rng.gen_normal(0.0, self.noise_scale)).max(0.05);
            }
        }

        SensorReading::Lidar { ranges }
    }
}

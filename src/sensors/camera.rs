//! Camera stub.

use crate::engine::SimRng;
use crate::state::{SensorReading, SimState};

use super::SensorModel;

/// Camera stub reporting a scalar scene statistic instead of pixels.
///
/// With `degrade` set, an extra ±10% multiplicative perturbation models a
/// dirty or miscalibrated lens; the flag is surfaced in the reading.
#[derive(Debug, Clone)]
pub struct CameraSensor {
    name: String,
    shape: [u32; 2],
    noise_scale: f64,
    degrade: bool,
}

impl CameraSensor {
    /// Create a camera with the given noise scale and degrade flag.
    #[must_use]
    pub fn new(noise_scale: f64, degrade: bool) -> Self {
        Self {
            name: "camera".to_string(),
            shape: [64, 64],
            noise_scale,
            degrade,
        }
    }
}

impl SensorModel for CameraSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn observe(&mut self, state: &SimState, t: f64, rng: Option<&mut SimRng>) -> SensorReading {
        // Scene statistic: base x position with slow drift over time.
        let mut value = state.base_position[0] + t * 0.01;

        if let Some(rng) = rng {
            value += rng.gen_normal(0.0, self.noise_scale);
            if self.degrade {
                value *= 1.0 + rng.gen_range_f64(-0.1, 0.1);
            }
        }

        SensorReading::Camera {
            shape: self.shape,
            value,
            degraded: self.degrade,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_without_rng() {
        let mut cam = CameraSensor::new(0.01, true);
        let mut state = SimState::zeroed(4);
        state.base_position[0] = 0.5;

        let a = cam.observe(&state, 2.0, None);
        if let SensorReading::Camera {
            value, degraded, ..
        } = a
        {
            assert!((value - 0.52).abs() < 1e-12);
            assert!(degraded);
        } else {
            panic!("wrong reading kind");
        }
    }

    #[test]
    fn test_degrade_widens_spread() {
        let state = {
            let mut s = SimState::zeroed(4);
            s.base_position[0] = 1.0;
            s
        };
        let spread = |degrade: bool, seed: u64| {
            let mut cam = CameraSensor::new(0.0, degrade);
            let mut rng = SimRng::new(seed);
            let values: Vec<f64> = (0..2000)
                .map(|_| match cam.observe(&state, 0.0, Some(&mut rng)) {
                    SensorReading::Camera { value, .. } => value,
                    _ => unreachable!(),
                })
                .collect();
            let mean: f64 = values.iter().sum::<f64>() / values.len() as f64;
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
        };
        assert!(spread(true, 42) > spread(false, 42));
    }
}

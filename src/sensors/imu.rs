//! IMU stub.

use crate::engine::SimRng;
use crate::state::{SensorReading, SimState};

use super::SensorModel;

/// Inertial measurement stub: gyro rates from the first three joint
/// velocities, a base-acceleration proxy, and a forward-velocity estimate.
#[derive(Debug, Clone)]
pub struct ImuSensor {
    name: String,
    noise_scale: f64,
}

impl ImuSensor {
    /// Create an IMU with the given noise standard deviation.
    #[must_use]
    pub fn new(noise_scale: f64) -> Self {
        Self {
            name: "imu".to_string(),
            noise_scale,
        }
    }
}

impl SensorModel for ImuSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn observe(&mut self, state: &SimState, _t: f64, rng: Option<&mut SimRng>) -> SensorReading {
        // Acceleration proxy: horizontal base speed magnitude.
        let mut acc = (state.base_velocity[0].powi(2) + state.base_velocity[1].powi(2)).sqrt();
        let mut gyro = [0.0; 3];
        for (i, g) in gyro.iter_mut().enumerate() {
            *g = state.joint_velocities.get(i).copied().unwrap_or(0.0);
        }
        let mut vel_estimate = state.base_velocity[0];

        if let Some(rng) = rng {
            acc += rng.gen_normal(0.0, self.noise_scale);
            for g in &mut gyro {
                *g += rng.gen_normal(0.0, self.noise_scale);
            }
            vel_estimate += rng.gen_normal(0.0, self.noise_scale);
        }

        SensorReading::Imu {
            acc,
            gyro,
            vel_estimate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_without_rng() {
        let mut imu = ImuSensor::new(0.05);
        let mut state = SimState::zeroed(4);
        state.base_velocity = [0.3, 0.0, 0.0];
        state.joint_velocities = vec![0.1, -0.2, 0.3, 0.0];

        let a = imu.observe(&state, 0.0, None);
        let b = imu.observe(&state, 0.0, None);
        assert_eq!(a, b);

        if let SensorReading::Imu {
            gyro, vel_estimate, ..
        } = a
        {
            assert_eq!(gyro, [0.1, -0.2, 0.3]);
            assert!((vel_estimate - 0.3).abs() < 1e-12);
        } else {
            panic!("wrong reading kind");
        }
    }

    #[test]
    fn test_noise_applied_with_rng() {
        let mut imu = ImuSensor::new(0.05);
        let state = SimState::zeroed(4);
        let clean = imu.observe(&state, 0.0, None);
        let mut rng = SimRng::new(42);
        let noisy = imu.observe(&state, 0.0, Some(&mut rng));
        assert_ne!(clean, noisy);
    }

    #[test]
    fn test_noise_reproducible() {
        let mut imu = ImuSensor::new(0.05);
        let state = SimState::zeroed(4);
        let mut rng1 = SimRng::new(7);
        let mut rng2 = SimRng::new(7);
        let a = imu.observe(&state, 0.0, Some(&mut rng1));
        let b = imu.observe(&state, 0.0, Some(&mut rng2));
        assert_eq!(a, b);
    }
}

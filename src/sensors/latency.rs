//! Latency decorator.

use std::collections::VecDeque;

use crate::engine::SimRng;
use crate::state::{SensorReading, SimState};

use super::SensorModel;

/// Wraps a sensor and delays its readings by a fixed number of steps.
///
/// During warm-up (fewer than `latency_steps` readings buffered) the live
/// reading is emitted. That mirrors a sensor whose pipeline has not filled
/// yet; it is a known modeling shortcut and kept as-is.
pub struct LatencySensor {
    inner: Box<dyn SensorModel>,
    latency_steps: usize,
    buffer: VecDeque<SensorReading>,
}

impl LatencySensor {
    /// Wrap `inner` with a delay of `latency_steps` steps.
    #[must_use]
    pub fn new(inner: Box<dyn SensorModel>, latency_steps: usize) -> Self {
        Self {
            inner,
            latency_steps,
            buffer: VecDeque::with_capacity(latency_steps + 1),
        }
    }

    /// Configured delay in steps.
    #[must_use]
    pub const fn latency_steps(&self) -> usize {
        self.latency_steps
    }
}

impl SensorModel for LatencySensor {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn observe(&mut self, state: &SimState, t: f64, rng: Option<&mut SimRng>) -> SensorReading {
        let live = self.inner.observe(state, t, rng);
        if self.latency_steps == 0 {
            return live;
        }

        self.buffer.push_back(live.clone());
        if self.buffer.len() > self.latency_steps + 1 {
            self.buffer.pop_front();
        }
        if self.buffer.len() > self.latency_steps {
            // Front is exactly latency_steps old.
            self.buffer.front().cloned().unwrap_or(live)
        } else {
            live
        }
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.inner.reset();
    }
}

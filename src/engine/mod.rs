//! Engine infrastructure: deterministic randomness.

pub mod rng;

pub use rng::SimRng;

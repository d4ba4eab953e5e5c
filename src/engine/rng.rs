//! Deterministic random number generation.
//!
//! Implements PCG (Permuted Congruential Generator) seeded streams.
//!
//! # Reproducibility Guarantee
//!
//! Given the same seed, all random number sequences are bitwise-identical
//! across runs and platforms. Every stochastic component in the crate draws
//! from a `SimRng` it was handed explicitly; there is no global or
//! wall-clock-seeded randomness anywhere.

use rand::prelude::*;
use rand_pcg::Pcg64;

/// Deterministic, reproducible random number generator.
///
/// Based on PCG (Permuted Congruential Generator) which provides:
/// - Excellent statistical properties
/// - Fast generation
/// - Predictable sequences from seed
#[derive(Debug, Clone)]
pub struct SimRng {
    /// Master seed for reproducibility.
    master_seed: u64,
    /// Internal PCG state.
    rng: Pcg64,
}

impl SimRng {
    /// Create a new RNG with the given master seed.
    #[must_use]
    pub fn new(master_seed: u64) -> Self {
        let rng = Pcg64::seed_from_u64(master_seed);
        Self { master_seed, rng }
    }

    /// Get the master seed.
    #[must_use]
    pub const fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Restart the stream from a new seed.
    pub fn reseed(&mut self, seed: u64) {
        self.master_seed = seed;
        self.rng = Pcg64::seed_from_u64(seed);
    }

    /// Generate a random f64 in [0, 1).
    pub fn gen_f64(&mut self) -> f64 {
        self.rng.gen()
    }

    /// Generate a random f64 in the given range.
    ///
    /// # Panics
    ///
    /// Panics if `min > max`.
    pub fn gen_range_f64(&mut self, min: f64, max: f64) -> f64 {
        assert!(min <= max, "Invalid range: min > max");
        min + (max - min) * self.gen_f64()
    }

    /// Generate a random u64.
    pub fn gen_u64(&mut self) -> u64 {
        self.rng.gen()
    }

    /// Generate a random usize in `[0, n)`.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn gen_index(&mut self, n: usize) -> usize {
        assert!(n > 0, "Invalid range: n must be positive");
        self.rng.gen_range(0..n)
    }

    /// Generate n random f64 samples in [0, 1).
    #[must_use]
    pub fn sample_n(&mut self, n: usize) -> Vec<f64> {
        (0..n).map(|_| self.gen_f64()).collect()
    }

    /// Generate a standard normal sample using Box-Muller transform.
    pub fn gen_standard_normal(&mut self) -> f64 {
        // Box-Muller transform
        let u1 = self.gen_f64();
        let u2 = self.gen_f64();

        // Avoid log(0)
        let u1 = if u1 < f64::EPSILON { f64::EPSILON } else { u1 };

        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    /// Generate a normal sample with given mean and std.
    pub fn gen_normal(&mut self, mean: f64, std: f64) -> f64 {
        mean + std * self.gen_standard_normal()
    }

    /// Generate a zero-mean Laplace sample with the given scale parameter b,
    /// via inverse-CDF sampling.
    pub fn gen_laplace(&mut self, scale: f64) -> f64 {
        let u = self.gen_f64() - 0.5;
        let magnitude = (1.0 - 2.0 * u.abs()).max(f64::EPSILON);
        -scale * u.signum() * magnitude.ln()
    }

    /// Generate a zero-median Cauchy sample with the given scale parameter,
    /// via inverse-CDF sampling.
    pub fn gen_cauchy(&mut self, scale: f64) -> f64 {
        let u = self.gen_f64();
        scale * (std::f64::consts::PI * (u - 0.5)).tan()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Falsification test: reproducibility holds for any seed.
        #[test]
        fn prop_reproducibility(seed in 0u64..u64::MAX) {
            let mut rng1 = SimRng::new(seed);
            let mut rng2 = SimRng::new(seed);

            let seq1: Vec<f64> = (0..100).map(|_| rng1.gen_f64()).collect();
            let seq2: Vec<f64> = (0..100).map(|_| rng2.gen_f64()).collect();

            prop_assert_eq!(seq1, seq2);
        }

        /// Falsification test: values in [0, 1) for any seed.
        #[test]
        fn prop_unit_interval(seed in 0u64..u64::MAX) {
            let mut rng = SimRng::new(seed);

            for _ in 0..100 {
                let v = rng.gen_f64();
                prop_assert!(v >= 0.0 && v < 1.0, "Value {} not in [0, 1)", v);
            }
        }

        /// Falsification test: Laplace and Cauchy samples are finite.
        #[test]
        fn prop_heavy_tails_finite(seed in 0u64..u64::MAX) {
            let mut rng = SimRng::new(seed);
            for _ in 0..100 {
                prop_assert!(rng.gen_laplace(1.0).is_finite());
                prop_assert!(rng.gen_cauchy(1.0).is_finite());
            }
        }
    }
}

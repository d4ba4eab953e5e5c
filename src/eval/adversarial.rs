//! Adversarial profile search.
//!
//! A (μ+λ) evolutionary search over named profile parameters, looking for
//! the parameter vector on which the evaluated objective performs worst.
//! With `minimize = false` the objective is a score the caller wants high,
//! so the adversary drives it down; with `minimize = true` the adversary
//! drives it up.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::SimRng;
use crate::error::{SimError, SimResult};
use crate::profile::{MassScale, RealityProfile, Range};

/// Convergence threshold on the generation-to-generation worst score.
const CONVERGENCE_EPS: f64 = 1e-6;

/// One searchable parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchBounds {
    pub name: String,
    pub low: f64,
    pub high: f64,
    /// Nominal value, used as the mutation fallback for parameters a
    /// parent is missing.
    pub default: f64,
}

impl SearchBounds {
    /// Construct bounds, rejecting inverted or default-out-of-range values.
    pub fn new(name: impl Into<String>, low: f64, high: f64, default: f64) -> SimResult<Self> {
        let name = name.into();
        if low > high {
            return Err(SimError::evaluation(format!(
                "bounds for {name}: low {low} exceeds high {high}"
            )));
        }
        if default < low || default > high {
            return Err(SimError::evaluation(format!(
                "bounds for {name}: default {default} outside [{low}, {high}]"
            )));
        }
        Ok(Self {
            name,
            low,
            high,
            default,
        })
    }
}

/// Search hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdversarialConfig {
    /// Number of generations to evaluate.
    pub max_iterations: usize,
    /// Individuals per generation.
    pub population_size: usize,
    /// Fraction of the population kept as elites.
    pub elite_frac: f64,
    /// Mutation std as a fraction of each parameter's range.
    pub mutation_scale: f64,
    /// Search seed.
    pub seed: u64,
    /// Whether the caller wants the objective low (adversary then seeks
    /// high values).
    pub minimize: bool,
}

impl Default for AdversarialConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            population_size: 10,
            elite_frac: 0.3,
            mutation_scale: 0.2,
            seed: 42,
            minimize: false,
        }
    }
}

/// Per-generation history entry: running best/worst so far plus the
/// generation's mean score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationStats {
    pub generation: usize,
    pub best_score: f64,
    pub worst_score: f64,
    pub mean_score: f64,
}

/// Search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Parameter vector with the worst observed score.
    pub worst_params: BTreeMap<String, f64>,
    /// Worst score observed across the whole run.
    pub worst_score: f64,
    /// Parameter vector with the best observed score.
    pub best_params: BTreeMap<String, f64>,
    /// Best score observed across the whole run.
    pub best_score: f64,
    pub history: Vec<GenerationStats>,
    /// Whether the running worst moved less than the convergence threshold
    /// over the final two generations.
    pub converged: bool,
    /// Total objective evaluations.
    pub evaluations: usize,
}

type Individual = BTreeMap<String, f64>;

fn random_individual(bounds: &[SearchBounds], rng: &mut SimRng) -> Individual {
    bounds
        .iter()
        .map(|b| (b.name.clone(), rng.gen_range_f64(b.low, b.high)))
        .collect()
}

fn mutate(parent: &Individual, bounds: &[SearchBounds], scale: f64, rng: &mut SimRng) -> Individual {
    bounds
        .iter()
        .map(|b| {
            let base = parent.get(&b.name).copied().unwrap_or(b.default);
            let range = (b.high - b.low).max(f64::EPSILON);
            let value = (base + rng.gen_normal(0.0, scale * range)).clamp(b.low, b.high);
            (b.name.clone(), value)
        })
        .collect()
}

/// Run the search. The objective receives one parameter map per evaluation;
/// an `Err` scores as maximally adversarial and is logged, never propagated.
pub fn adversarial_search<F>(
    bounds: &[SearchBounds],
    config: &AdversarialConfig,
    mut objective: F,
) -> SimResult<SearchResult>
where
    F: FnMut(&BTreeMap<String, f64>) -> SimResult<f64>,
{
    if bounds.is_empty() {
        return Err(SimError::evaluation("adversarial search needs bounds"));
    }
    if config.population_size == 0 {
        return Err(SimError::evaluation("population_size must be positive"));
    }
    if !(0.0..=1.0).contains(&config.elite_frac) {
        return Err(SimError::evaluation(format!(
            "elite_frac {} outside [0, 1]",
            config.elite_frac
        )));
    }

    let mut rng = SimRng::new(config.seed);
    let n_elite = ((config.elite_frac * config.population_size as f64).round() as usize)
        .clamp(1, config.population_size);
    // Worse-for-the-caller means lower when the caller maximizes.
    let adversarial_cmp = |a: f64, b: f64| if config.minimize { a > b } else { a < b };
    let failure_score = if config.minimize {
        f64::INFINITY
    } else {
        f64::NEG_INFINITY
    };

    // Generation 0 is sampled uniformly within the bounds.
    let mut population: Vec<Individual> = (0..config.population_size)
        .map(|_| random_individual(bounds, &mut rng))
        .collect();

    let mut evaluations = 0usize;
    let mut history = Vec::with_capacity(config.max_iterations);
    let mut run_worst: Option<(f64, Individual)> = None;
    let mut run_best: Option<(f64, Individual)> = None;

    for generation in 0..config.max_iterations {
        let mut scored: Vec<(f64, Individual)> = Vec::with_capacity(population.len());
        for individual in &population {
            evaluations += 1;
            let score = match objective(individual) {
                Ok(s) => s,
                Err(e) => {
                    warn!(generation, error = %e, "objective evaluation failed");
                    failure_score
                }
            };
            scored.push((score, individual.clone()));
        }

        for (score, individual) in &scored {
            if run_worst
                .as_ref()
                .map_or(true, |(w, _)| adversarial_cmp(*score, *w))
            {
                run_worst = Some((*score, individual.clone()));
            }
            if run_best
                .as_ref()
                .map_or(true, |(b, _)| adversarial_cmp(*b, *score))
            {
                run_best = Some((*score, individual.clone()));
            }
        }

        // Sort so that the most adversarial individuals come first.
        scored.sort_by(|a, b| {
            if config.minimize {
                b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal)
            } else {
                a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal)
            }
        });

        let finite: Vec<f64> = scored.iter().map(|s| s.0).filter(|s| s.is_finite()).collect();
        let mean = if finite.is_empty() {
            scored[0].0
        } else {
            finite.iter().sum::<f64>() / finite.len() as f64
        };
        if let (Some((worst, _)), Some((best, _))) = (&run_worst, &run_best) {
            history.push(GenerationStats {
                generation,
                best_score: *best,
                worst_score: *worst,
                mean_score: mean,
            });
            if generation % 10 == 0 {
                info!(generation, mean, best = *best, worst = *worst, "adversarial generation");
            }
        }

        if generation + 1 == config.max_iterations {
            break;
        }

        // (μ+λ): elites survive, the rest are mutated offspring of a
        // randomly chosen elite.
        let elites: Vec<Individual> = scored.iter().take(n_elite).map(|s| s.1.clone()).collect();
        let mut next = elites.clone();
        while next.len() < config.population_size {
            let parent = rng.gen_index(n_elite);
            let child = mutate(&elites[parent], bounds, config.mutation_scale, &mut rng);
            next.push(child);
        }
        population = next;
    }

    // Convergence is assessed after the fact, never cut short.
    let converged = history.len() > 1 && {
        let last = &history[history.len() - 1];
        let prev = &history[history.len() - 2];
        (last.worst_score - prev.worst_score).abs() < CONVERGENCE_EPS
    };

    let (worst_score, worst_params) = run_worst
        .ok_or_else(|| SimError::evaluation("adversarial search produced no evaluations"))?;
    let (best_score, best_params) = run_best
        .ok_or_else(|| SimError::evaluation("adversarial search produced no evaluations"))?;

    Ok(SearchResult {
        worst_params,
        worst_score,
        best_params,
        best_score,
        history,
        converged,
        evaluations,
    })
}

/// Search space over a profile's gap knobs: friction, restitution, sensor
/// noise, and mass scale, seeded at the profile's nominal values. Explicit
/// knob ranges win over the stock defaults, so the adversary stays inside
/// the same envelope domain randomization samples from.
pub fn bounds_from_profile(profile: &RealityProfile) -> SimResult<Vec<SearchBounds>> {
    let knobs = &profile.gap_knobs;
    let friction = knobs.friction_range.unwrap_or(Range { low: 0.3, high: 0.7 });
    let restitution = knobs.restitution_range.unwrap_or(Range { low: 0.0, high: 0.2 });
    let noise = knobs.noise_scale_range.unwrap_or(Range {
        low: 0.005,
        high: 0.05,
    });
    let mass = match knobs.mass_scale {
        MassScale::Range(r) => r,
        MassScale::Scalar(_) => Range { low: 0.8, high: 1.2 },
    };
    Ok(vec![
        SearchBounds::new(
            "friction",
            friction.low,
            friction.high,
            profile.physics.friction.clamp(friction.low, friction.high),
        )?,
        SearchBounds::new(
            "restitution",
            restitution.low,
            restitution.high,
            profile.physics.restitution.clamp(restitution.low, restitution.high),
        )?,
        SearchBounds::new(
            "noise_scale",
            noise.low,
            noise.high,
            profile.sensors.noise_scale.clamp(noise.low, noise.high),
        )?,
        SearchBounds::new("mass_scale", mass.low, mass.high, 1.0_f64.clamp(mass.low, mass.high))?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> Vec<SearchBounds> {
        vec![
            SearchBounds::new("x", -1.0, 1.0, 0.0).unwrap(),
            SearchBounds::new("y", -1.0, 1.0, 0.0).unwrap(),
        ]
    }

    fn get(params: &BTreeMap<String, f64>, key: &str) -> f64 {
        params.get(key).copied().unwrap_or(0.0)
    }

    #[test]
    fn test_bounds_validation() {
        assert!(SearchBounds::new("x", 1.0, 0.0, 0.5).is_err());
        assert!(SearchBounds::new("x", 0.0, 1.0, 2.0).is_err());
    }

    #[test]
    fn test_empty_bounds_rejected() {
        let result = adversarial_search(&[], &AdversarialConfig::default(), |_| Ok(0.0));
        assert!(result.is_err());
    }

    #[test]
    fn test_finds_low_corner_when_maximizing_caller() {
        // Caller's score is x + y; the adversary should push both to -1.
        let config = AdversarialConfig {
            max_iterations: 40,
            population_size: 16,
            ..AdversarialConfig::default()
        };
        let result = adversarial_search(&bounds(), &config, |p| Ok(get(p, "x") + get(p, "y")))
            .unwrap();
        assert!(result.worst_score < -1.5, "worst {}", result.worst_score);
        assert!(get(&result.worst_params, "x") < -0.5);
        assert!(get(&result.worst_params, "y") < -0.5);
    }

    #[test]
    fn test_minimize_seeks_high_scores() {
        let config = AdversarialConfig {
            max_iterations: 40,
            population_size: 16,
            minimize: true,
            ..AdversarialConfig::default()
        };
        let result = adversarial_search(&bounds(), &config, |p| Ok(get(p, "x") + get(p, "y")))
            .unwrap();
        assert!(result.worst_score > 1.5, "worst {}", result.worst_score);
    }

    #[test]
    fn test_single_generation_worst_is_population_min() {
        // One iteration means exactly one evaluated generation; the worst
        // score is the minimum of the four generation-0 scores.
        let config = AdversarialConfig {
            max_iterations: 1,
            population_size: 4,
            seed: 7,
            ..AdversarialConfig::default()
        };
        let mut seen = Vec::new();
        let result = adversarial_search(&bounds(), &config, |p| {
            let s = get(p, "x") * 2.0 + get(p, "y");
            seen.push(s);
            Ok(s)
        })
        .unwrap();
        let min = seen.iter().copied().fold(f64::INFINITY, f64::min);
        assert!((result.worst_score - min).abs() < 1e-12);
        assert_eq!(result.evaluations, 4);
        assert_eq!(result.history.len(), 1);
    }

    #[test]
    fn test_runs_exactly_max_iterations_generations() {
        let config = AdversarialConfig {
            max_iterations: 3,
            population_size: 5,
            ..AdversarialConfig::default()
        };
        let result = adversarial_search(&bounds(), &config, |p| Ok(get(p, "x"))).unwrap();
        assert_eq!(result.evaluations, 15);
        assert_eq!(result.history.len(), 3);
    }

    #[test]
    fn test_best_and_worst_params_reproduce_their_scores() {
        let config = AdversarialConfig {
            max_iterations: 10,
            population_size: 8,
            ..AdversarialConfig::default()
        };
        let objective = |p: &BTreeMap<String, f64>| get(p, "x").powi(2) - get(p, "y");
        let result = adversarial_search(&bounds(), &config, |p| Ok(objective(p))).unwrap();
        // The tracked extremes are real evaluated individuals.
        assert!((objective(&result.worst_params) - result.worst_score).abs() < 1e-12);
        assert!((objective(&result.best_params) - result.best_score).abs() < 1e-12);
        assert!(result.worst_score <= result.best_score);
    }

    #[test]
    fn test_failed_evaluations_scored_adversarial() {
        let config = AdversarialConfig {
            max_iterations: 2,
            population_size: 4,
            ..AdversarialConfig::default()
        };
        let result = adversarial_search(&bounds(), &config, |p| {
            if get(p, "x") > 0.0 {
                Err(SimError::evaluation("unstable"))
            } else {
                Ok(1.0)
            }
        })
        .unwrap();
        // At least one failure is near-certain with random init; the worst
        // score is then -inf.
        assert!(result.worst_score == f64::NEG_INFINITY || result.worst_score == 1.0);
    }

    #[test]
    fn test_reproducible() {
        let config = AdversarialConfig {
            max_iterations: 10,
            population_size: 8,
            ..AdversarialConfig::default()
        };
        let run = || {
            adversarial_search(&bounds(), &config, |p| Ok(get(p, "x").powi(2) + get(p, "y")))
                .unwrap()
        };
        let a = run();
        let b = run();
        assert_eq!(a.worst_score.to_bits(), b.worst_score.to_bits());
        assert_eq!(a.worst_params, b.worst_params);
        assert_eq!(a.evaluations, b.evaluations);
    }

    #[test]
    fn test_constant_objective_converges() {
        let config = AdversarialConfig {
            max_iterations: 50,
            population_size: 6,
            ..AdversarialConfig::default()
        };
        let result = adversarial_search(&bounds(), &config, |_| Ok(3.5)).unwrap();
        // Convergence is reported after the fact; all generations still run.
        assert!(result.converged);
        assert_eq!(result.history.len(), 50);
    }

    #[test]
    fn test_bounds_from_profile_defaults() {
        let profile = RealityProfile::default();
        let bounds = bounds_from_profile(&profile).unwrap();
        let names: Vec<&str> = bounds.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["friction", "restitution", "noise_scale", "mass_scale"]
        );
        assert!((bounds[0].low - 0.3).abs() < 1e-12);
        assert!((bounds[0].high - 0.7).abs() < 1e-12);
        assert!((bounds[0].default - 0.5).abs() < 1e-12);
        assert!((bounds[3].low - 0.8).abs() < 1e-12);
        assert!((bounds[3].high - 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_bounds_from_profile_honors_gap_knobs() {
        let mut profile = RealityProfile::default();
        profile.gap_knobs.friction_range = Some(crate::profile::Range { low: 0.1, high: 0.2 });
        profile.gap_knobs.mass_scale =
            MassScale::Range(crate::profile::Range { low: 0.9, high: 1.1 });
        let bounds = bounds_from_profile(&profile).unwrap();
        assert!((bounds[0].low - 0.1).abs() < 1e-12);
        assert!((bounds[0].high - 0.2).abs() < 1e-12);
        // The nominal friction 0.5 clamps into the knob range.
        assert!((bounds[0].default - 0.2).abs() < 1e-12);
        assert!((bounds[3].low - 0.9).abs() < 1e-12);
        assert!((bounds[3].high - 1.1).abs() < 1e-12);
    }
}

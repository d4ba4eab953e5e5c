//! Batch evaluation across profiles.
//!
//! Runs the same episode grid against every profile. Episode seeds are
//! `base_seed + episode_index`, reused across profiles, so cross-profile
//! differences come from the profiles alone. A failed episode is recorded
//! and the batch keeps going.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::dr::DrSampler;
use crate::error::SimResult;
use crate::profile::RealityProfile;
use crate::runner::{run_episode, EpisodeConfig, EpisodeMetrics, StepMode};

/// Batch run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Named profiles to evaluate.
    pub profiles: Vec<(String, RealityProfile)>,
    /// Episodes per profile.
    pub episodes_per_profile: usize,
    /// Steps per episode.
    pub steps: usize,
    /// Base seed; episode `i` runs with `base_seed + i` in every profile.
    pub base_seed: u64,
    /// Stepping mode for every episode.
    pub mode: StepMode,
    /// Attach the Q-Plugin.
    pub use_q_plugin: bool,
    /// Attach the test residual model.
    pub use_residual: bool,
    /// Sample a fresh DR realization per episode.
    pub randomize: bool,
}

impl BatchConfig {
    /// Minimal batch over the given profiles.
    #[must_use]
    pub fn new(profiles: Vec<(String, RealityProfile)>) -> Self {
        Self {
            profiles,
            episodes_per_profile: 5,
            steps: 100,
            base_seed: 42,
            mode: StepMode::Stochastic,
            use_q_plugin: false,
            use_residual: false,
            randomize: false,
        }
    }
}

/// Terminal status of one episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum EpisodeStatus {
    Completed,
    Failed { message: String },
}

/// One episode's outcome within a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeOutcome {
    pub profile: String,
    pub episode: usize,
    pub seed: u64,
    pub status: EpisodeStatus,
    /// Present when the episode completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<EpisodeMetrics>,
}

/// Per-profile aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub profile: String,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// Mean of completed episodes' average step times, ms.
    pub avg_step_time_ms: f64,
    /// Wall-clock total across completed episodes, seconds.
    pub total_time_s: f64,
}

/// Spread of per-profile average step times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossProfileStats {
    pub num_profiles: usize,
    pub mean_step_time_ms: f64,
    pub std_step_time_ms: f64,
    pub min_step_time_ms: f64,
    pub max_step_time_ms: f64,
}

/// Full batch result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<EpisodeOutcome>,
    pub summaries: Vec<ProfileSummary>,
    pub cross_profile: CrossProfileStats,
}

/// Run the full batch. Individual episode failures are recorded, never
/// propagated.
pub fn run_batch(config: &BatchConfig) -> SimResult<BatchReport> {
    let mut outcomes = Vec::new();
    let mut summaries = Vec::new();

    for (name, profile) in &config.profiles {
        info!(
            profile = name.as_str(),
            episodes = config.episodes_per_profile,
            "running batch profile"
        );
        let mut sampler = DrSampler::from_profile(profile, config.base_seed);
        let mut completed = 0usize;
        let mut failed = 0usize;
        let mut step_time_sum = 0.0;
        let mut total_time = 0.0;

        for episode in 0..config.episodes_per_profile {
            let seed = config.base_seed + episode as u64;
            let realization = config.randomize.then(|| sampler.sample());
            let episode_config = EpisodeConfig {
                steps: config.steps,
                dt: profile.physics.timestep,
                seed,
                mode: config.mode,
                use_q_plugin: config.use_q_plugin,
                use_residual: config.use_residual,
                profile: profile.clone(),
                realization,
            };

            match run_episode(&episode_config) {
                Ok(report) => {
                    completed += 1;
                    step_time_sum += report.metrics.avg_step_time_ms;
                    total_time += report.metrics.total_time_s;
                    outcomes.push(EpisodeOutcome {
                        profile: name.clone(),
                        episode,
                        seed,
                        status: EpisodeStatus::Completed,
                        metrics: Some(report.metrics),
                    });
                }
                Err(e) => {
                    failed += 1;
                    error!(
                        profile = name.as_str(),
                        episode,
                        error = %e,
                        "episode failed"
                    );
                    outcomes.push(EpisodeOutcome {
                        profile: name.clone(),
                        episode,
                        seed,
                        status: EpisodeStatus::Failed {
                            message: e.to_string(),
                        },
                        metrics: None,
                    });
                }
            }
        }

        summaries.push(ProfileSummary {
            profile: name.clone(),
            total: config.episodes_per_profile,
            completed,
            failed,
            avg_step_time_ms: if completed > 0 {
                step_time_sum / completed as f64
            } else {
                0.0
            },
            total_time_s: total_time,
        });
    }

    let cross_profile = cross_profile_stats(&summaries);
    Ok(BatchReport {
        outcomes,
        summaries,
        cross_profile,
    })
}

fn cross_profile_stats(summaries: &[ProfileSummary]) -> CrossProfileStats {
    let times: Vec<f64> = summaries.iter().map(|s| s.avg_step_time_ms).collect();
    if times.is_empty() {
        return CrossProfileStats {
            num_profiles: 0,
            mean_step_time_ms: 0.0,
            std_step_time_ms: 0.0,
            min_step_time_ms: 0.0,
            max_step_time_ms: 0.0,
        };
    }
    let n = times.len() as f64;
    let mean = times.iter().sum::<f64>() / n;
    let variance = times.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / n;
    let min = times.iter().copied().fold(f64::INFINITY, f64::min);
    let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    CrossProfileStats {
        num_profiles: times.len(),
        mean_step_time_ms: mean,
        std_step_time_ms: variance.sqrt(),
        min_step_time_ms: min,
        max_step_time_ms: max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_profiles() -> Vec<(String, RealityProfile)> {
        let design = RealityProfile::default();
        let mut rough = RealityProfile::default();
        rough.physics.friction = 0.9;
        rough.sensors.noise_scale = 0.05;
        rough.sensors.latency_steps = 2;
        vec![
            ("design".to_string(), design),
            ("rough".to_string(), rough),
        ]
    }

    #[test]
    fn test_batch_shape() {
        let config = BatchConfig {
            episodes_per_profile: 3,
            steps: 20,
            ..BatchConfig::new(two_profiles())
        };
        let report = run_batch(&config).unwrap();
        assert_eq!(report.outcomes.len(), 6);
        assert_eq!(report.summaries.len(), 2);
        assert_eq!(report.cross_profile.num_profiles, 2);
        for s in &report.summaries {
            assert_eq!(s.completed, 3);
            assert_eq!(s.failed, 0);
        }
    }

    #[test]
    fn test_episode_seeds_reused_across_profiles() {
        let config = BatchConfig {
            episodes_per_profile: 3,
            steps: 10,
            ..BatchConfig::new(two_profiles())
        };
        let report = run_batch(&config).unwrap();
        let seeds_for = |name: &str| -> Vec<u64> {
            report
                .outcomes
                .iter()
                .filter(|o| o.profile == name)
                .map(|o| o.seed)
                .collect()
        };
        assert_eq!(seeds_for("design"), seeds_for("rough"));
        assert_eq!(seeds_for("design"), vec![42, 43, 44]);
    }

    #[test]
    fn test_randomized_batch_completes() {
        let config = BatchConfig {
            episodes_per_profile: 4,
            steps: 15,
            mode: StepMode::DomainRandomized,
            randomize: true,
            use_q_plugin: true,
            ..BatchConfig::new(two_profiles())
        };
        let report = run_batch(&config).unwrap();
        assert!(report
            .summaries
            .iter()
            .all(|s| s.completed == 4 && s.failed == 0));
    }

    #[test]
    fn test_cross_profile_stats_degenerate() {
        let stats = cross_profile_stats(&[]);
        assert_eq!(stats.num_profiles, 0);
        assert!((stats.mean_step_time_ms).abs() < 1e-12);
    }
}

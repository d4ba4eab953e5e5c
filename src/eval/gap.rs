//! Gap metrics.
//!
//! Quantifies how far an evaluation run diverges from a design-condition
//! run along three axes:
//!
//! - `G_dyn`: state-trajectory divergence (dynamics gap),
//! - `G_perc`: observation divergence (perception gap),
//! - `G_perf`: relative metric degradation (performance gap),
//!
//! plus rank stability and profile gap width for cross-profile studies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::profile::RealityProfile;
use crate::runner::{EpisodeReport, StepRecord};

/// Dynamics gap: mean per-step L2 distance between state vectors.
///
/// Compares base position, joint positions, and end effector; timelines of
/// unequal length are truncated to the shorter one. Empty input yields 0.
#[must_use]
pub fn compute_g_dyn(design: &[StepRecord], eval: &[StepRecord]) -> f64 {
    let n = design.len().min(eval.len());
    if n == 0 {
        return 0.0;
    }

    let flatten = |r: &StepRecord| -> Vec<f64> {
        let mut v = Vec::with_capacity(6 + r.state.joint_positions.len());
        v.extend_from_slice(&r.state.base_position);
        v.extend_from_slice(&r.state.joint_positions);
        v.extend_from_slice(&r.state.end_effector);
        v
    };

    let mut total = 0.0;
    for (d, e) in design.iter().zip(eval.iter()).take(n) {
        let dv = flatten(d);
        let ev = flatten(e);
        let sq: f64 = dv
            .iter()
            .zip(ev.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum();
        total += sq.sqrt();
    }
    total / n as f64
}

/// Perception gap: mean per-step RMS-style distance over shared sensor
/// fields. Sensors present in only one timeline are skipped.
#[must_use]
pub fn compute_g_perc(design: &[StepRecord], eval: &[StepRecord]) -> f64 {
    let n = design.len().min(eval.len());
    if n == 0 {
        return 0.0;
    }

    let mut total = 0.0;
    for (d, e) in design.iter().zip(eval.iter()).take(n) {
        let mut sq_sum = 0.0;
        let mut count = 0usize;
        for (name, d_reading) in &d.observation {
            let Some(e_reading) = e.observation.get(name) else {
                continue;
            };
            let df = d_reading.numeric_fields();
            let ef = e_reading.numeric_fields();
            for (a, b) in df.iter().zip(ef.iter()) {
                sq_sum += (a - b).powi(2);
                count += 1;
            }
        }
        total += sq_sum.sqrt() / count.max(1) as f64;
    }
    total / n as f64
}

/// Whether a metric is better when higher. Unknown metrics default to true.
fn higher_is_better(name: &str) -> bool {
    match name {
        "success_rate" | "cumulative_reward" => true,
        "avg_step_time_ms" | "total_time_s" | "replay_error" => false,
        _ => true,
    }
}

/// Performance gap: mean absolute relative degradation over shared metrics.
///
/// For a higher-is-better metric the drop is `design - eval`; otherwise
/// `eval - design`. Each drop is normalized by `|design|` (zero when the
/// design value is zero) and the magnitudes are averaged.
#[must_use]
pub fn compute_g_perf(design: &BTreeMap<String, f64>, eval: &BTreeMap<String, f64>) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    for (name, d) in design {
        let Some(e) = eval.get(name) else { continue };
        let drop = if higher_is_better(name) { d - e } else { e - d };
        let relative = if *d == 0.0 { 0.0 } else { drop / d.abs() };
        total += relative.abs();
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

/// Absolute and relative degradation of one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceDrop {
    pub metric: String,
    pub design_value: f64,
    pub eval_value: f64,
    /// `eval - design` for lower-is-better metrics, `design - eval`
    /// otherwise.
    pub absolute_drop: f64,
    /// Absolute drop over `|design|`.
    pub relative_drop: f64,
}

/// Degradation of a single named metric present in both maps.
pub fn compute_performance_drop(
    design: &BTreeMap<String, f64>,
    eval: &BTreeMap<String, f64>,
    metric: &str,
) -> SimResult<PerformanceDrop> {
    let d = *design
        .get(metric)
        .ok_or_else(|| SimError::evaluation(format!("metric '{metric}' missing from design")))?;
    let e = *eval
        .get(metric)
        .ok_or_else(|| SimError::evaluation(format!("metric '{metric}' missing from eval")))?;
    let absolute_drop = if higher_is_better(metric) { d - e } else { e - d };
    let relative_drop = if d == 0.0 { 0.0 } else { absolute_drop / d.abs() };
    Ok(PerformanceDrop {
        metric: metric.to_string(),
        design_value: d,
        eval_value: e,
        absolute_drop,
        relative_drop,
    })
}

/// One method's result on one profile, the unit of rank-stability input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodRun {
    pub profile_id: String,
    /// Named scalar metrics, e.g. from `EpisodeMetrics::to_map`.
    pub metrics: BTreeMap<String, f64>,
}

/// Rank-stability summary across profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankStability {
    /// Method ranking per profile, best first.
    pub per_profile_rankings: BTreeMap<String, Vec<String>>,
    /// Profile pairs whose top-ranked method differs.
    pub rank_inversions: usize,
    pub is_stable: bool,
}

/// Rank methods on `metric_key` within each profile and count the profile
/// pairs whose winner flips. A rank inversion means one method beats
/// another in one profile but loses in another. Runs missing the metric
/// are skipped; fewer than two methods is trivially stable.
#[must_use]
pub fn compute_rank_stability(
    results_by_method: &BTreeMap<String, Vec<MethodRun>>,
    metric_key: &str,
    lower_is_better: bool,
) -> RankStability {
    if results_by_method.len() < 2 {
        return RankStability {
            per_profile_rankings: BTreeMap::new(),
            rank_inversions: 0,
            is_stable: true,
        };
    }

    let mut per_profile: BTreeMap<String, Vec<(String, f64)>> = BTreeMap::new();
    for (method, runs) in results_by_method {
        for run in runs {
            let Some(value) = run.metrics.get(metric_key) else {
                continue;
            };
            per_profile
                .entry(run.profile_id.clone())
                .or_default()
                .push((method.clone(), *value));
        }
    }

    let mut per_profile_rankings: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (profile_id, mut scores) in per_profile {
        // Stable sort; method-name order breaks ties.
        scores.sort_by(|a, b| {
            let ord = a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal);
            if lower_is_better {
                ord
            } else {
                ord.reverse()
            }
        });
        per_profile_rankings.insert(profile_id, scores.into_iter().map(|(m, _)| m).collect());
    }

    let ids: Vec<&String> = per_profile_rankings.keys().collect();
    let mut rank_inversions = 0usize;
    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            let a = &per_profile_rankings[ids[i]];
            let b = &per_profile_rankings[ids[j]];
            if a.len() >= 2 && b.len() >= 2 && a.first() != b.first() {
                rank_inversions += 1;
            }
        }
    }

    RankStability {
        per_profile_rankings,
        rank_inversions,
        is_stable: rank_inversions == 0,
    }
}

/// Distances between two profiles in parameter space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapWidth {
    pub l1: f64,
    pub l2: f64,
    /// Cosine similarity of the two parameter vectors; zero when either
    /// vector is zero.
    pub cosine_similarity: f64,
}

fn profile_vector(p: &RealityProfile) -> [f64; 5] {
    [
        p.physics.friction,
        p.physics.restitution,
        p.physics.gravity[2],
        p.sensors.noise_scale,
        p.sensors.latency_steps as f64,
    ]
}

/// Distance between two profiles over the five headline parameters
/// (friction, restitution, gravity-z, noise scale, latency).
#[must_use]
pub fn compute_gap_width(a: &RealityProfile, b: &RealityProfile) -> GapWidth {
    let va = profile_vector(a);
    let vb = profile_vector(b);
    let l1: f64 = va.iter().zip(vb.iter()).map(|(x, y)| (x - y).abs()).sum();
    let l2: f64 = va
        .iter()
        .zip(vb.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt();
    let dot: f64 = va.iter().zip(vb.iter()).map(|(x, y)| x * y).sum();
    let na: f64 = va.iter().map(|x| x * x).sum::<f64>().sqrt();
    let nb: f64 = vb.iter().map(|x| x * x).sum::<f64>().sqrt();
    let cosine_similarity = if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    };
    GapWidth {
        l1,
        l2,
        cosine_similarity,
    }
}

/// Pearson correlation, `None` when either series has (near-)zero variance
/// or the lengths differ.
#[must_use]
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (a, b) in x.iter().zip(y.iter()) {
        cov += (a - mx) * (b - my);
        vx += (a - mx).powi(2);
        vy += (b - my).powi(2);
    }
    if vx < 1e-12 || vy < 1e-12 {
        return None;
    }
    Some(cov / (vx.sqrt() * vy.sqrt()))
}

/// All three headline gap metrics for a design/eval episode pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapReport {
    pub g_dyn: f64,
    pub g_perc: f64,
    pub g_perf: f64,
}

/// Convenience wrapper over two episode reports.
#[must_use]
pub fn compute_all_gap_metrics(design: &EpisodeReport, eval: &EpisodeReport) -> GapReport {
    GapReport {
        g_dyn: compute_g_dyn(&design.timeline, &eval.timeline),
        g_perc: compute_g_perc(&design.timeline, &eval.timeline),
        g_perf: compute_g_perf(&design.metrics.to_map(), &eval.metrics.to_map()),
    }
}

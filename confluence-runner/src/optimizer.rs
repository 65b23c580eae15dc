//! Finite-difference gradient ascent over box-constrained parameters.
//!
//! `gradient_ascent` is generic over the objective; `WeightOptimizer` binds it
//! to the performance score of a fixed signal set.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use confluence_core::domain::{BoxConstraints, HistoricalSignal, WeightVector};

use crate::score::{PerformanceScorer, ScoreConfig};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub learning_rate: f64,
    pub iterations: usize,
    /// Central-difference step.
    pub epsilon: f64,
    /// Multiply the learning rate by `decay_factor` every `decay_every` iterations.
    pub decay_every: usize,
    pub decay_factor: f64,
    /// Evaluate per-dimension partials on the rayon pool.
    pub parallel: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            iterations: 100,
            epsilon: 0.01,
            decay_every: 25,
            decay_factor: 0.9,
            parallel: false,
        }
    }
}

/// Best point found by [`gradient_ascent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Optimum {
    pub params: Vec<f64>,
    pub score: f64,
    /// Objective at the clamped starting point.
    pub initial_score: f64,
    /// Best score seen after each iteration.
    pub best_trace: Vec<f64>,
    pub iterations: usize,
}

fn clamp_into(params: &mut [f64], bounds: &[(f64, f64)]) {
    for (v, &(lo, hi)) in params.iter_mut().zip(bounds) {
        *v = v.clamp(lo, hi);
    }
}

/// Central-difference partial derivative along `dim`.
fn partial<F>(objective: &F, point: &[f64], dim: usize, epsilon: f64) -> f64
where
    F: Fn(&[f64]) -> f64,
{
    let mut probe = point.to_vec();
    probe[dim] = point[dim] + epsilon;
    let up = objective(&probe);
    probe[dim] = point[dim] - epsilon;
    let down = objective(&probe);
    (up - down) / (2.0 * epsilon)
}

/// Maximize `objective` from `initial` within `bounds`.
///
/// Each iteration estimates every partial by central difference, updates all
/// dimensions at once, and clamps back into the box. The best point seen is
/// tracked separately since clamped ascent is not monotone. Runs exactly
/// `config.iterations` iterations.
pub fn gradient_ascent<F>(initial: &[f64], bounds: &[(f64, f64)], config: &OptimizerConfig, objective: F) -> Optimum
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    debug_assert_eq!(initial.len(), bounds.len(), "one bound per parameter");

    let mut current = initial.to_vec();
    clamp_into(&mut current, bounds);

    let initial_score = objective(&current);
    let mut best = current.clone();
    let mut best_score = initial_score;
    let mut best_trace = Vec::with_capacity(config.iterations);
    let mut learning_rate = config.learning_rate;

    for iteration in 0..config.iterations {
        if iteration > 0 && config.decay_every > 0 && iteration % config.decay_every == 0 {
            learning_rate *= config.decay_factor;
        }

        let gradient: Vec<f64> = if config.parallel {
            (0..current.len())
                .into_par_iter()
                .map(|dim| partial(&objective, &current, dim, config.epsilon))
                .collect()
        } else {
            (0..current.len())
                .map(|dim| partial(&objective, &current, dim, config.epsilon))
                .collect()
        };

        for (v, g) in current.iter_mut().zip(&gradient) {
            *v += learning_rate * g;
        }
        clamp_into(&mut current, bounds);

        let score = objective(&current);
        if score > best_score {
            best_score = score;
            best.clone_from(&current);
        }
        best_trace.push(best_score);
    }

    Optimum {
        params: best,
        score: best_score,
        initial_score,
        best_trace,
        iterations: config.iterations,
    }
}

/// Result of optimizing a weight vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub weights: WeightVector,
    pub score: f64,
    pub initial_score: f64,
    pub best_trace: Vec<f64>,
}

/// Gradient ascent on the performance score of a fixed signal list.
#[derive(Debug, Clone, Default)]
pub struct WeightOptimizer {
    pub config: OptimizerConfig,
    pub constraints: BoxConstraints,
    pub score: ScoreConfig,
}

impl WeightOptimizer {
    pub fn new(config: OptimizerConfig, constraints: BoxConstraints, score: ScoreConfig) -> Self {
        Self {
            config,
            constraints,
            score,
        }
    }

    pub fn optimize(&self, signals: &[HistoricalSignal], seed: &WeightVector) -> OptimizationResult {
        let scorer = PerformanceScorer::new(signals, self.score);
        let objective = |params: &[f64]| WeightVector::from_slice(params).map_or(0.0, |w| scorer.score(&w));

        let optimum = gradient_ascent(&seed.to_array(), &self.constraints.to_array(), &self.config, objective);
        let weights = WeightVector::from_slice(&optimum.params).unwrap_or_else(|| self.constraints.clamp(seed));

        debug!(
            signals = signals.len(),
            resolved = scorer.resolved_count(),
            initial = optimum.initial_score,
            best = optimum.score,
            "weights optimized"
        );

        OptimizationResult {
            weights,
            score: optimum.score,
            initial_score: optimum.initial_score,
            best_trace: optimum.best_trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parabola(p: &[f64]) -> f64 {
        -(p[0] - 15.0).powi(2)
    }

    #[test]
    fn converges_to_unimodal_peak() {
        let cfg = OptimizerConfig::default();
        let opt = gradient_ascent(&[5.0], &[(1.0, 25.0)], &cfg, parabola);
        assert!((opt.params[0] - 15.0).abs() < cfg.epsilon, "got {}", opt.params[0]);
        assert_eq!(opt.best_trace.len(), cfg.iterations);
    }

    #[test]
    fn peak_outside_box_stops_at_bound() {
        let opt = gradient_ascent(&[2.0], &[(1.0, 10.0)], &OptimizerConfig::default(), parabola);
        assert_eq!(opt.params[0], 10.0);
    }

    #[test]
    fn start_is_clamped_before_scoring() {
        let opt = gradient_ascent(
            &[100.0],
            &[(1.0, 25.0)],
            &OptimizerConfig {
                iterations: 0,
                ..OptimizerConfig::default()
            },
            parabola,
        );
        assert_eq!(opt.params, vec![25.0]);
        assert_eq!(opt.initial_score, -100.0);
    }

    #[test]
    fn parallel_matches_sequential() {
        let objective = |p: &[f64]| -(p[0] - 3.0).powi(2) - 2.0 * (p[1] - 7.0).powi(2) + p[2];
        let bounds = [(0.0, 10.0); 3];
        let seq = gradient_ascent(&[1.0, 1.0, 1.0], &bounds, &OptimizerConfig::default(), objective);
        let par = gradient_ascent(
            &[1.0, 1.0, 1.0],
            &bounds,
            &OptimizerConfig {
                parallel: true,
                ..OptimizerConfig::default()
            },
            objective,
        );
        assert_eq!(seq, par);
    }

    #[test]
    fn learning_rate_decays() {
        // Linear objective: each step moves by exactly lr, so the total distance
        // is 25 × 1.0 + 25 × 0.9.
        let cfg = OptimizerConfig {
            learning_rate: 1.0,
            iterations: 50,
            ..OptimizerConfig::default()
        };
        let opt = gradient_ascent(&[0.0], &[(0.0, 1000.0)], &cfg, |p| p[0]);
        assert!((opt.params[0] - 47.5).abs() < 1e-6);
    }

    #[test]
    fn empty_signal_set_keeps_seed() {
        let seed = WeightVector::default();
        let result = WeightOptimizer::default().optimize(&[], &seed);
        assert_eq!(result.weights, seed);
        assert_eq!(result.score, 0.0);
    }
}

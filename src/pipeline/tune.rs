//! Bayesian hyperparameter search over the boosting parameter space.
//!
//! The tuner models p(x | y) with a pair of kernel density estimators
//! fitted to the good and bad halves of the observation history
//! (Bergstra et al., 2011). Each guided iteration samples candidate
//! points in the unit cube and keeps the one maximizing the expected
//! improvement ratio l(x) / g(x). The first [`TunerBudget::init_points`]
//! probes are uniform random.
//!
//! The objective is a caller-supplied closure scoring a concrete
//! [`BoostParams`]; higher scores are better. Model selection against a
//! validation split plugs in negative log-loss.

use rand::{Rng as _, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{BoostParams, ParamError, TrainError, TunedParams};

/// Quantile separating good from bad observations.
const GAMMA: f64 = 0.25;
/// Candidates sampled per guided iteration.
const N_CANDIDATES: usize = 24;
/// Division guard for the density ratio.
const DENSITY_EPS: f64 = 1e-10;

/// Dimensions of the search cube, in fixed order.
const N_DIMS: usize = 8;

/// Inclusive search bounds per dimension: rounds, depth, learning rate,
/// row subsample, column subsample, gamma, alpha, lambda.
const BOUNDS: [(f64, f64); N_DIMS] = [
    (100.0, 300.0),
    (3.0, 10.0),
    (0.01, 0.1),
    (0.6, 1.0),
    (0.6, 1.0),
    (0.0, 5.0),
    (0.0, 1.0),
    (1.0, 5.0),
];

// =============================================================================
// Errors
// =============================================================================

/// Errors raised during hyperparameter search.
#[derive(Debug, Error)]
pub enum TuneError {
    /// The objective failed on a probe; the whole search is abandoned.
    #[error("objective evaluation failed")]
    Objective(#[from] TrainError),
    #[error("probe produced invalid parameters")]
    Params(#[from] ParamError),
    #[error("objective returned a non-finite score")]
    NonFiniteScore,
    #[error("tuning budget has zero probes")]
    EmptyBudget,
}

// =============================================================================
// Budget
// =============================================================================

/// Probe counts for the two search phases.
#[derive(Debug, Clone, Copy)]
pub struct TunerBudget {
    /// Uniform random probes before the density model kicks in.
    pub init_points: usize,
    /// Model-guided probes.
    pub n_iter: usize,
}

impl Default for TunerBudget {
    fn default() -> Self {
        Self {
            init_points: 5,
            n_iter: 25,
        }
    }
}

impl TunerBudget {
    pub fn total(&self) -> usize {
        self.init_points + self.n_iter
    }
}

// =============================================================================
// Candidate decoding
// =============================================================================

/// Map a unit-cube point onto concrete boosting parameters.
///
/// Integer-valued dimensions (rounds, depth, gamma, lambda) are rounded
/// to the nearest whole value.
fn params_from_unit(unit: &[f64; N_DIMS], seed: u64) -> Result<BoostParams, ParamError> {
    let scale = |dim: usize| {
        let (low, high) = BOUNDS[dim];
        low + unit[dim] * (high - low)
    };

    BoostParams::builder()
        .n_rounds(scale(0).round() as u32)
        .max_depth(scale(1).round() as u32)
        .learning_rate(scale(2) as f32)
        .subsample(scale(3) as f32)
        .colsample_bytree(scale(4) as f32)
        .gamma(scale(5).round() as u32)
        .reg_alpha(scale(6) as f32)
        .reg_lambda(scale(7).round() as u32)
        .seed(seed)
        .build()
}

// =============================================================================
// Density model
// =============================================================================

/// One completed probe: unit-cube point and its score.
#[derive(Debug, Clone)]
struct Observation {
    unit: [f64; N_DIMS],
    score: f64,
}

/// Scott's-rule bandwidth: h = std * n^(-1/5).
fn bandwidth(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 1.0;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / n;
    // Floor prevents a degenerate zero-width kernel.
    variance.sqrt().max(0.01) * n.powf(-0.2)
}

/// Gaussian KDE density at `point`.
fn kde_density(samples: &[f64], point: f64, bandwidth: f64) -> f64 {
    if samples.is_empty() {
        return 1.0;
    }
    let n = samples.len() as f64;
    let sum: f64 = samples
        .iter()
        .map(|&x| {
            let z = (point - x) / bandwidth;
            (-0.5 * z * z).exp()
        })
        .sum();
    sum / ((2.0 * std::f64::consts::PI).sqrt() * bandwidth * n)
}

/// Per-dimension product density of `candidate` under `group`.
fn group_density(candidate: &[f64; N_DIMS], group: &[&Observation]) -> f64 {
    let mut density = 1.0;
    for dim in 0..N_DIMS {
        let samples: Vec<f64> = group.iter().map(|o| o.unit[dim]).collect();
        let h = bandwidth(&samples);
        density *= kde_density(&samples, candidate[dim], h);
    }
    density
}

// =============================================================================
// Tuner
// =============================================================================

/// Sequential model-based optimizer over the boosting parameter space.
pub struct BayesianTuner {
    budget: TunerBudget,
    seed: u64,
    history: Vec<Observation>,
}

impl BayesianTuner {
    pub fn new(budget: TunerBudget, seed: u64) -> Self {
        Self {
            budget,
            seed,
            history: Vec::new(),
        }
    }

    /// Run the full probe budget against `objective`, maximizing its
    /// score, and return the best parameters found.
    ///
    /// An objective error on any probe aborts the search.
    pub fn maximize<F>(&mut self, mut objective: F) -> Result<TunedParams, TuneError>
    where
        F: FnMut(&BoostParams) -> Result<f64, TrainError>,
    {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed);
        let started = std::time::Instant::now();

        let mut best: Option<(BoostParams, f64)> = None;
        for probe in 0..self.budget.total() {
            let unit = if probe < self.budget.init_points {
                Self::sample_unit(&mut rng)
            } else {
                self.suggest(&mut rng)
            };

            let params = params_from_unit(&unit, self.seed)?;
            let score = objective(&params)?;
            if !score.is_finite() {
                return Err(TuneError::NonFiniteScore);
            }
            debug!(probe, score, ?params, "probe evaluated");

            self.history.push(Observation { unit, score });
            let improved = best.as_ref().map_or(true, |(_, s)| score > *s);
            if improved {
                info!(probe, score, "new best probe");
                best = Some((params, score));
            }
        }

        let (params, score) = best.ok_or(TuneError::EmptyBudget)?;
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            best_score = score,
            "hyperparameter search finished"
        );
        Ok(TunedParams {
            params,
            log_loss: -score,
        })
    }

    fn sample_unit(rng: &mut Xoshiro256PlusPlus) -> [f64; N_DIMS] {
        std::array::from_fn(|_| rng.random::<f64>())
    }

    /// Pick the candidate with the best expected-improvement ratio.
    fn suggest(&self, rng: &mut Xoshiro256PlusPlus) -> [f64; N_DIMS] {
        let (good, bad) = self.split_history();

        let mut best_unit = Self::sample_unit(rng);
        let mut best_ratio = f64::NEG_INFINITY;
        for _ in 0..N_CANDIDATES {
            let unit = Self::sample_unit(rng);
            let ratio = group_density(&unit, &good) / (group_density(&unit, &bad) + DENSITY_EPS);
            if ratio > best_ratio {
                best_ratio = ratio;
                best_unit = unit;
            }
        }
        best_unit
    }

    /// Split the history at the gamma quantile, best scores first.
    fn split_history(&self) -> (Vec<&Observation>, Vec<&Observation>) {
        let mut sorted: Vec<&Observation> = self.history.iter().collect();
        sorted.sort_by(|a, b| b.score.total_cmp(&a.score));

        let n_good = ((sorted.len() as f64) * GAMMA).ceil() as usize;
        let n_good = n_good.clamp(1, sorted.len().saturating_sub(1).max(1));
        let bad = sorted.split_off(n_good.min(sorted.len()));
        (sorted, bad)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn unit_point_maps_inside_bounds() {
        let params = params_from_unit(&[0.0; N_DIMS], 7).unwrap();
        assert_eq!(params.n_rounds, 100);
        assert_eq!(params.max_depth, 3);
        assert_abs_diff_eq!(params.learning_rate, 0.01, epsilon = 1e-6);
        assert_abs_diff_eq!(params.subsample, 0.6, epsilon = 1e-6);
        assert_eq!(params.gamma, 0);
        assert_eq!(params.reg_lambda, 1);

        let params = params_from_unit(&[1.0; N_DIMS], 7).unwrap();
        assert_eq!(params.n_rounds, 300);
        assert_eq!(params.max_depth, 10);
        assert_abs_diff_eq!(params.learning_rate, 0.1, epsilon = 1e-6);
        assert_abs_diff_eq!(params.colsample_bytree, 1.0, epsilon = 1e-6);
        assert_eq!(params.gamma, 5);
        assert_eq!(params.reg_lambda, 5);
    }

    #[test]
    fn integer_dimensions_round_to_whole_values() {
        let params = params_from_unit(&[0.499, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5], 7).unwrap();
        assert_eq!(params.n_rounds, 200);
        assert_eq!(params.reg_lambda, 3);
    }

    #[test]
    fn maximize_finds_a_good_learning_rate() {
        // Score peaks when the learning rate is near the top of its range.
        let budget = TunerBudget {
            init_points: 5,
            n_iter: 20,
        };
        let mut tuner = BayesianTuner::new(budget, 42);
        let tuned = tuner
            .maximize(|p| Ok(-((p.learning_rate as f64 - 0.1).powi(2))))
            .unwrap();
        assert!(tuned.params.learning_rate > 0.05);
        assert!(tuned.log_loss < 0.01);
    }

    #[test]
    fn objective_error_aborts_the_search() {
        let mut tuner = BayesianTuner::new(TunerBudget::default(), 1);
        let result = tuner.maximize(|_| Err(TrainError::EmptyDataset));
        assert!(matches!(result, Err(TuneError::Objective(_))));
    }

    #[test]
    fn non_finite_score_is_rejected() {
        let mut tuner = BayesianTuner::new(TunerBudget::default(), 1);
        let result = tuner.maximize(|_| Ok(f64::NAN));
        assert!(matches!(result, Err(TuneError::NonFiniteScore)));
    }

    #[test]
    fn zero_probe_budget_is_an_error() {
        let budget = TunerBudget {
            init_points: 0,
            n_iter: 0,
        };
        let result = BayesianTuner::new(budget, 1).maximize(|_| Ok(0.0));
        assert!(matches!(result, Err(TuneError::EmptyBudget)));
    }

    #[test]
    fn search_is_deterministic_for_a_seed() {
        let budget = TunerBudget {
            init_points: 3,
            n_iter: 5,
        };
        let run = || {
            BayesianTuner::new(budget, 9)
                .maximize(|p| Ok(f64::from(p.subsample)))
                .unwrap()
        };
        let a = run();
        let b = run();
        assert_eq!(a.params, b.params);
        assert_eq!(a.log_loss, b.log_loss);
    }
}

//! ABC acceptance and posterior adjustment.
//!
//! `run_abc` arranges the inputs: it normalizes summary columns by MAD,
//! accepts the `tol` fraction closest to the target, and hands the accepted
//! set to the requested adjustment. The rejection path stores accepted
//! parameters verbatim; local-linear fits a weighted regression of parameters
//! on summaries and shifts the draws to the target; the neural-network path
//! delegates to a caller-supplied [`PosteriorAdjuster`] and stores its output
//! verbatim.

use std::sync::Arc;

use eam_core::{Error, Result};
use nalgebra::{DMatrix, DVector};

use crate::input::{AbcInput, Matrix};
use crate::stats;

/// Posterior approximation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbcMethod {
    /// Accepted draws, unadjusted.
    Rejection,
    /// Epanechnikov-weighted local-linear regression adjustment.
    LocalLinear,
    /// External adjustment via [`PosteriorAdjuster`].
    NeuralNet,
}

/// External posterior-adjustment seam (the neural-network path).
pub trait PosteriorAdjuster: Send + Sync {
    /// Adjust accepted draws toward the target; returns the adjusted matrix
    /// (same columns as `accepted_params`).
    fn adjust(
        &self,
        accepted_params: &Matrix,
        accepted_stats: &Matrix,
        target: &[f64],
        weights: &[f64],
    ) -> Result<Matrix>;
}

/// ABC call options.
#[derive(Clone)]
pub struct AbcConfig {
    /// Accepted fraction of the pool, in `(0, 1]`.
    pub tol: f64,
    /// Posterior approximation method.
    pub method: AbcMethod,
    /// Adjuster for [`AbcMethod::NeuralNet`].
    pub adjuster: Option<Arc<dyn PosteriorAdjuster>>,
}

impl AbcConfig {
    /// Rejection sampling at the given tolerance.
    pub fn rejection(tol: f64) -> Self {
        Self { tol, method: AbcMethod::Rejection, adjuster: None }
    }

    /// Local-linear adjustment at the given tolerance.
    pub fn local_linear(tol: f64) -> Self {
        Self { tol, method: AbcMethod::LocalLinear, adjuster: None }
    }
}

/// ABC outcome: accepted draws plus (method-dependent) adjusted draws.
#[derive(Debug, Clone)]
pub enum AbcResult {
    Rejection {
        /// Accepted parameter rows.
        unadj: Matrix,
    },
    LocalLinear {
        /// Accepted parameter rows.
        unadj: Matrix,
        /// Regression-adjusted draws.
        adj: Matrix,
    },
    NeuralNet {
        /// Accepted parameter rows.
        unadj: Matrix,
        /// Externally adjusted draws, stored verbatim.
        adj: Matrix,
    },
}

impl AbcResult {
    /// Posterior draws: adjusted when available, otherwise accepted.
    pub fn posterior_samples(&self) -> &Matrix {
        match self {
            AbcResult::Rejection { unadj } => unadj,
            AbcResult::LocalLinear { adj, .. } => adj,
            AbcResult::NeuralNet { adj, .. } => adj,
        }
    }

    /// Accepted (unadjusted) draws.
    pub fn unadjusted(&self) -> &Matrix {
        match self {
            AbcResult::Rejection { unadj } => unadj,
            AbcResult::LocalLinear { unadj, .. } => unadj,
            AbcResult::NeuralNet { unadj, .. } => unadj,
        }
    }
}

/// Run one ABC pass over the pool.
pub fn run_abc(input: &AbcInput, config: &AbcConfig) -> Result<AbcResult> {
    if !(config.tol.is_finite() && config.tol > 0.0 && config.tol <= 1.0) {
        return Err(Error::Validation(format!("tol must be in (0, 1], got {}", config.tol)));
    }
    let n = input.n_rows();
    if n == 0 {
        return Err(Error::EmptyResults("ABC requires a non-empty simulation pool".to_string()));
    }

    let distances = normalized_distances(input);
    let n_accept = ((config.tol * n as f64).ceil() as usize).clamp(1, n);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| distances[a].total_cmp(&distances[b]).then(a.cmp(&b)));
    let accepted: Vec<usize> = order[..n_accept].to_vec();

    let unadj = input.param.select_rows(&accepted);
    let accepted_stats = input.sumstat.select_rows(&accepted);
    let weights = epanechnikov_weights(&accepted.iter().map(|&i| distances[i]).collect::<Vec<_>>());

    match config.method {
        AbcMethod::Rejection => Ok(AbcResult::Rejection { unadj }),
        AbcMethod::LocalLinear => {
            let adj = local_linear_adjust(&unadj, &accepted_stats, &input.target, &weights)?;
            Ok(AbcResult::LocalLinear { unadj, adj })
        }
        AbcMethod::NeuralNet => {
            let adjuster = config.adjuster.as_ref().ok_or_else(|| {
                Error::ConfigInvalid(
                    "AbcMethod::NeuralNet requires an adjuster implementation".to_string(),
                )
            })?;
            let adj = adjuster.adjust(&unadj, &accepted_stats, &input.target, &weights)?;
            Ok(AbcResult::NeuralNet { unadj, adj })
        }
    }
}

/// Euclidean distance to the target over MAD-normalized summary columns.
///
/// Degenerate columns fall back to SD, then to scale 1.
fn normalized_distances(input: &AbcInput) -> Vec<f64> {
    let n = input.n_rows();
    let s = input.target.len();

    let scales: Vec<f64> = (0..s)
        .map(|j| {
            let col = input.sumstat.column_at(j);
            let m = stats::mad(&col);
            if m > 0.0 {
                return m;
            }
            let d = stats::sd(&col);
            if d > 0.0 {
                d
            } else {
                1.0
            }
        })
        .collect();

    (0..n)
        .map(|i| {
            let row = &input.sumstat.rows()[i];
            row.iter()
                .zip(&input.target)
                .zip(&scales)
                .map(|((x, t), scale)| {
                    let z = (x - t) / scale;
                    z * z
                })
                .sum::<f64>()
                .sqrt()
        })
        .collect()
}

/// Epanechnikov kernel weights over accepted distances; all-ones when the
/// acceptance radius is zero.
fn epanechnikov_weights(accepted_distances: &[f64]) -> Vec<f64> {
    let d_max = accepted_distances.iter().copied().fold(0.0f64, f64::max);
    if d_max <= 0.0 {
        return vec![1.0; accepted_distances.len()];
    }
    accepted_distances
        .iter()
        .map(|&d| {
            let u = d / d_max;
            (1.0 - u * u).max(1e-12)
        })
        .collect()
}

/// Weighted local-linear adjustment: regress each parameter on the centered
/// summaries and shift draws to the target point,
/// `θ*_i = θ_i − (s_i − s_obs)ᵀ β`.
fn local_linear_adjust(
    params: &Matrix,
    sumstats: &Matrix,
    target: &[f64],
    weights: &[f64],
) -> Result<Matrix> {
    let n = params.n_rows();
    let s = target.len();
    if n <= s + 1 {
        return Err(Error::Computation(format!(
            "local-linear adjustment needs more accepted draws ({n}) than regressors ({})",
            s + 1
        )));
    }

    // Design matrix: intercept + centered summaries, row-weighted by √w.
    let mut x = DMatrix::<f64>::zeros(n, s + 1);
    for i in 0..n {
        let w = weights[i].sqrt();
        x[(i, 0)] = w;
        for j in 0..s {
            x[(i, j + 1)] = w * (sumstats.rows()[i][j] - target[j]);
        }
    }
    let svd = x.svd(true, true);

    let mut adjusted = vec![vec![0.0; params.n_cols()]; n];
    for p in 0..params.n_cols() {
        let y = DVector::from_iterator(
            n,
            (0..n).map(|i| weights[i].sqrt() * params.rows()[i][p]),
        );
        let beta = svd
            .solve(&y, 1e-12)
            .map_err(|e| Error::Computation(format!("local-linear solve failed: {e}")))?;
        for i in 0..n {
            let mut shift = 0.0;
            for j in 0..s {
                shift += (sumstats.rows()[i][j] - target[j]) * beta[j + 1];
            }
            adjusted[i][p] = params.rows()[i][p] - shift;
        }
    }

    Matrix::new(params.names().to_vec(), adjusted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, StandardNormal, Uniform};

    /// Linear synthetic pool: s = 2θ + noise, target at θ = 1.5.
    fn linear_pool(n: usize, noise_sd: f64, seed: u64) -> AbcInput {
        let mut rng = StdRng::seed_from_u64(seed);
        let theta_dist = Uniform::new(0.0, 3.0).unwrap();
        let mut param_rows = Vec::with_capacity(n);
        let mut stat_rows = Vec::with_capacity(n);
        for _ in 0..n {
            let theta: f64 = theta_dist.sample(&mut rng);
            let eps: f64 = StandardNormal.sample(&mut rng);
            param_rows.push(vec![theta]);
            stat_rows.push(vec![2.0 * theta + noise_sd * eps]);
        }
        AbcInput::new(
            vec![3.0], // s_obs = 2·1.5
            Matrix::new(vec!["theta".into()], param_rows).unwrap(),
            Matrix::new(vec!["s".into()], stat_rows).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn rejection_accepts_tol_fraction_closest_to_target() {
        let input = linear_pool(1000, 0.0, 1);
        let result = run_abc(&input, &AbcConfig::rejection(0.1)).unwrap();
        let post = result.posterior_samples();
        assert_eq!(post.n_rows(), 100);
        // Noise-free: accepted thetas are those closest to 1.5.
        for row in post.rows() {
            assert!((row[0] - 1.5).abs() < 0.2, "theta = {}", row[0]);
        }
    }

    #[test]
    fn local_linear_shrinks_posterior_error() {
        let input = linear_pool(2000, 0.3, 2);
        let rej = run_abc(&input, &AbcConfig::rejection(0.2)).unwrap();
        let lin = run_abc(&input, &AbcConfig::local_linear(0.2)).unwrap();

        let spread = |m: &Matrix| stats::sd(&m.column("theta").unwrap());
        assert!(
            spread(lin.posterior_samples()) < spread(rej.posterior_samples()),
            "adjustment should tighten the posterior"
        );
        // Adjusted posterior centers near the true value.
        let center = stats::median(&lin.posterior_samples().column("theta").unwrap());
        assert_relative_eq!(center, 1.5, epsilon = 0.1);
    }

    #[test]
    fn local_linear_keeps_unadjusted_draws() {
        let input = linear_pool(500, 0.3, 3);
        let result = run_abc(&input, &AbcConfig::local_linear(0.2)).unwrap();
        assert_eq!(result.unadjusted().n_rows(), result.posterior_samples().n_rows());
        assert_ne!(result.unadjusted(), result.posterior_samples());
    }

    #[test]
    fn neural_net_without_adjuster_is_config_error() {
        let input = linear_pool(100, 0.1, 4);
        let config =
            AbcConfig { tol: 0.5, method: AbcMethod::NeuralNet, adjuster: None };
        assert!(matches!(run_abc(&input, &config), Err(Error::ConfigInvalid(_))));
    }

    #[test]
    fn neural_net_stores_adjuster_output_verbatim() {
        struct Shift;
        impl PosteriorAdjuster for Shift {
            fn adjust(
                &self,
                accepted_params: &Matrix,
                _accepted_stats: &Matrix,
                _target: &[f64],
                _weights: &[f64],
            ) -> Result<Matrix> {
                let rows = accepted_params
                    .rows()
                    .iter()
                    .map(|r| r.iter().map(|x| x + 100.0).collect())
                    .collect();
                Matrix::new(accepted_params.names().to_vec(), rows)
            }
        }
        let input = linear_pool(100, 0.1, 5);
        let config = AbcConfig {
            tol: 0.5,
            method: AbcMethod::NeuralNet,
            adjuster: Some(Arc::new(Shift)),
        };
        let result = run_abc(&input, &config).unwrap();
        let adj = result.posterior_samples().column("theta").unwrap();
        let unadj = result.unadjusted().column("theta").unwrap();
        for (a, u) in adj.iter().zip(&unadj) {
            assert_relative_eq!(a - u, 100.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn empty_pool_is_empty_results() {
        let input = AbcInput::new(
            vec![0.0],
            Matrix::new(vec!["theta".into()], vec![]).unwrap(),
            Matrix::new(vec!["s".into()], vec![]).unwrap(),
        )
        .unwrap();
        assert!(matches!(
            run_abc(&input, &AbcConfig::rejection(0.1)),
            Err(Error::EmptyResults(_))
        ));
    }

    #[test]
    fn bad_tolerance_rejected() {
        let input = linear_pool(10, 0.1, 6);
        assert!(run_abc(&input, &AbcConfig::rejection(0.0)).is_err());
        assert!(run_abc(&input, &AbcConfig::rejection(1.5)).is_err());
    }
}

//! Posterior density curves (Gaussian KDE, Silverman bandwidth).
//!
//! Output is plot-ready data; rendering itself lives outside this workspace.

use eam_core::{Error, Result};

use crate::abc::AbcResult;
use crate::stats;

const SQRT_2PI: f64 = 2.506_628_274_631_000_5;

/// Density curve of one posterior parameter.
#[derive(Debug, Clone)]
pub struct DensityCurve {
    /// Parameter name.
    pub parameter: String,
    /// Evaluation grid.
    pub grid: Vec<f64>,
    /// Density at each grid point.
    pub density: Vec<f64>,
}

/// Kernel density estimate per posterior parameter over an `n_grid`-point
/// grid spanning the draws ± 3 bandwidths.
pub fn posterior_density(result: &AbcResult, n_grid: usize) -> Result<Vec<DensityCurve>> {
    if n_grid < 2 {
        return Err(Error::Validation(format!("n_grid must be >= 2, got {n_grid}")));
    }
    let post = result.posterior_samples();
    if post.n_rows() == 0 {
        return Err(Error::EmptyResults("posterior has no rows".to_string()));
    }

    let mut curves = Vec::with_capacity(post.n_cols());
    for (p, name) in post.names().iter().enumerate() {
        let samples = post.column_at(p);
        let bw = silverman_bandwidth(&samples);

        let lo = samples.iter().copied().fold(f64::INFINITY, f64::min) - 3.0 * bw;
        let hi = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max) + 3.0 * bw;
        let step = (hi - lo) / (n_grid - 1) as f64;

        let grid: Vec<f64> = (0..n_grid).map(|i| lo + step * i as f64).collect();
        let norm = 1.0 / (samples.len() as f64 * bw * SQRT_2PI);
        let density: Vec<f64> = grid
            .iter()
            .map(|&x| {
                samples
                    .iter()
                    .map(|&s| {
                        let z = (x - s) / bw;
                        (-0.5 * z * z).exp()
                    })
                    .sum::<f64>()
                    * norm
            })
            .collect();

        curves.push(DensityCurve { parameter: name.clone(), grid, density });
    }
    Ok(curves)
}

/// Silverman's rule of thumb: `0.9 · min(sd, iqr/1.34) · n^(−1/5)`, floored
/// to stay positive for degenerate samples.
fn silverman_bandwidth(samples: &[f64]) -> f64 {
    let n = samples.len() as f64;
    let sd = stats::sd(samples);
    let iqr = stats::quantile_linear(samples, 0.75) - stats::quantile_linear(samples, 0.25);
    let spread = if iqr > 0.0 { sd.min(iqr / 1.34) } else { sd };
    let bw = 0.9 * spread * n.powf(-0.2);
    if bw > 0.0 {
        bw
    } else {
        1e-3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Matrix;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn gaussian_result(n: usize, mean: f64, sd: f64) -> AbcResult {
        let mut rng = StdRng::seed_from_u64(5);
        let d = Normal::new(mean, sd).unwrap();
        let rows = (0..n).map(|_| vec![d.sample(&mut rng)]).collect();
        AbcResult::Rejection { unadj: Matrix::new(vec!["mu".into()], rows).unwrap() }
    }

    #[test]
    fn density_peaks_near_the_sample_mean() {
        let curves = posterior_density(&gaussian_result(2000, 3.0, 0.5), 256).unwrap();
        assert_eq!(curves.len(), 1);
        let curve = &curves[0];
        let peak = curve
            .density
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| curve.grid[i])
            .unwrap();
        assert!((peak - 3.0).abs() < 0.2, "peak at {peak}");
    }

    #[test]
    fn density_integrates_to_one() {
        let curves = posterior_density(&gaussian_result(500, 0.0, 1.0), 512).unwrap();
        let curve = &curves[0];
        let step = curve.grid[1] - curve.grid[0];
        let mass: f64 = curve.density.iter().sum::<f64>() * step;
        assert!((mass - 1.0).abs() < 0.02, "mass = {mass}");
    }

    #[test]
    fn degenerate_sample_still_produces_a_curve() {
        let rows = vec![vec![2.0]; 10];
        let result =
            AbcResult::Rejection { unadj: Matrix::new(vec!["mu".into()], rows).unwrap() };
        let curves = posterior_density(&result, 64).unwrap();
        assert!(curves[0].density.iter().all(|d| d.is_finite()));
    }
}

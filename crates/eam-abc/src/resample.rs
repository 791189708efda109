//! Bootstrap resampling of the simulation pool with per-iteration ABC.

use eam_core::{Error, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::abc::{run_abc, AbcConfig, AbcResult};
use crate::input::AbcInput;
use crate::stats;

/// Per-iteration RNG stream derived from the run seed.
#[inline]
fn iteration_rng(seed: u64, iteration: u64) -> StdRng {
    StdRng::seed_from_u64(seed.wrapping_mul(2654435761).wrapping_add(iteration))
}

/// Resample the pool `n_iterations` times and run ABC on each draw.
///
/// Each iteration draws `n_samples` row indices with or without replacement
/// (without replacement and `n_samples == N` gives a permutation of the full
/// pool) and calls [`run_abc`] with the same options. Iterations use
/// deterministic per-iteration streams, so a fixed `seed` reproduces the
/// whole sequence regardless of parallel scheduling.
///
/// # Errors
/// [`Error::ResampleSizeExceeded`] when `replace` is false and
/// `n_samples > N`. Oversampling *with* replacement is allowed (a warning is
/// printed, the run continues).
pub fn resample_abc(
    input: &AbcInput,
    n_iterations: usize,
    n_samples: usize,
    replace: bool,
    config: &AbcConfig,
    seed: u64,
) -> Result<Vec<AbcResult>> {
    let n = input.n_rows();
    if n == 0 {
        return Err(Error::EmptyResults("resample_abc requires a non-empty pool".to_string()));
    }
    if n_samples == 0 {
        return Err(Error::Validation("n_samples must be >= 1".to_string()));
    }
    if !replace && n_samples > n {
        return Err(Error::ResampleSizeExceeded { requested: n_samples, available: n });
    }
    if replace && n_samples > n {
        eprintln!(
            "resample_abc: n_samples ({n_samples}) exceeds pool size ({n}); sampling with replacement"
        );
    }

    (0..n_iterations as u64)
        .into_par_iter()
        .map(|iteration| {
            let mut rng = iteration_rng(seed, iteration);
            let indices = draw_indices(&mut rng, n, n_samples, replace);
            run_abc(&input.select_rows(&indices), config)
        })
        .collect()
}

fn draw_indices(rng: &mut StdRng, n: usize, n_samples: usize, replace: bool) -> Vec<usize> {
    use rand::Rng;
    if replace {
        (0..n_samples).map(|_| rng.random_range(0..n)).collect()
    } else {
        rand::seq::index::sample(rng, n, n_samples).into_vec()
    }
}

/// One forest-plot row: a parameter's posterior location in one iteration.
#[derive(Debug, Clone)]
pub struct ForestRow {
    /// Resample iteration (1-based).
    pub iteration: usize,
    /// Parameter name.
    pub parameter: String,
    /// Posterior median.
    pub median: f64,
    /// Lower quantile bound.
    pub lower: f64,
    /// Upper quantile bound.
    pub upper: f64,
}

/// Shape resample results for forest plotting: one row per iteration per
/// parameter, with quantile bounds at `(1 − ci_level)/2` on each side.
pub fn forest_rows(results: &[AbcResult], ci_level: f64) -> Result<Vec<ForestRow>> {
    check_ci(ci_level)?;
    if results.is_empty() {
        return Err(Error::EmptyResults("forest_rows requires at least one result".to_string()));
    }
    let alpha = (1.0 - ci_level) / 2.0;

    let mut rows = Vec::new();
    for (k, result) in results.iter().enumerate() {
        let post = result.posterior_samples();
        for (p, name) in post.names().iter().enumerate() {
            let column = post.column_at(p);
            rows.push(ForestRow {
                iteration: k + 1,
                parameter: name.clone(),
                median: stats::median(&column),
                lower: stats::quantile_linear(&column, alpha),
                upper: stats::quantile_linear(&column, 1.0 - alpha),
            });
        }
    }
    Ok(rows)
}

/// Per-parameter summary of the `K × P` matrix of posterior medians.
#[derive(Debug, Clone)]
pub struct MedianSummary {
    /// Parameter name.
    pub parameter: String,
    /// Mean of the per-iteration medians.
    pub mean: f64,
    /// Median of the per-iteration medians.
    pub median: f64,
    /// Quantile at `(1 − ci_level)/2`.
    pub lower: f64,
    /// Quantile at `1 − (1 − ci_level)/2`.
    pub upper: f64,
}

/// Summary of a resample run; quantile column labels carry the bounds
/// literally (e.g. `q2.5` / `q97.5` at `ci_level = 0.95`).
#[derive(Debug, Clone)]
pub struct ResampleMedianSummary {
    /// One row per parameter.
    pub rows: Vec<MedianSummary>,
    /// Label of the lower-bound column.
    pub lower_label: String,
    /// Label of the upper-bound column.
    pub upper_label: String,
}

/// Collapse each iteration's posterior to parameter medians, then summarize
/// each parameter across iterations.
pub fn summarise_resample_medians(
    results: &[AbcResult],
    ci_level: f64,
) -> Result<ResampleMedianSummary> {
    check_ci(ci_level)?;
    if results.is_empty() {
        return Err(Error::EmptyResults(
            "summarise_resample_medians requires at least one result".to_string(),
        ));
    }

    let names = results[0].posterior_samples().names().to_vec();
    for result in results {
        if result.posterior_samples().names() != names.as_slice() {
            return Err(Error::Validation(
                "resample results disagree on parameter columns".to_string(),
            ));
        }
    }

    let alpha = (1.0 - ci_level) / 2.0;
    // K × P medians.
    let medians: Vec<Vec<f64>> = results
        .iter()
        .map(|r| {
            let post = r.posterior_samples();
            (0..post.n_cols()).map(|p| stats::median(&post.column_at(p))).collect()
        })
        .collect();

    let rows = names
        .iter()
        .enumerate()
        .map(|(p, name)| {
            let column: Vec<f64> = medians.iter().map(|row| row[p]).collect();
            MedianSummary {
                parameter: name.clone(),
                mean: stats::mean(&column),
                median: stats::median(&column),
                lower: stats::quantile_linear(&column, alpha),
                upper: stats::quantile_linear(&column, 1.0 - alpha),
            }
        })
        .collect();

    Ok(ResampleMedianSummary {
        rows,
        lower_label: format!("q{}", trim_pct(alpha * 100.0)),
        upper_label: format!("q{}", trim_pct((1.0 - alpha) * 100.0)),
    })
}

/// Summarize one result's posterior draws per parameter (mean, median,
/// symmetric quantile bounds). Same shape and labels as
/// [`summarise_resample_medians`], computed over the draws themselves.
pub fn summarise_posterior(result: &AbcResult, ci_level: f64) -> Result<ResampleMedianSummary> {
    check_ci(ci_level)?;
    let post = result.posterior_samples();
    if post.n_rows() == 0 {
        return Err(Error::EmptyResults("posterior has no rows to summarize".to_string()));
    }
    let alpha = (1.0 - ci_level) / 2.0;

    let rows = post
        .names()
        .iter()
        .enumerate()
        .map(|(p, name)| {
            let column = post.column_at(p);
            MedianSummary {
                parameter: name.clone(),
                mean: stats::mean(&column),
                median: stats::median(&column),
                lower: stats::quantile_linear(&column, alpha),
                upper: stats::quantile_linear(&column, 1.0 - alpha),
            }
        })
        .collect();

    Ok(ResampleMedianSummary {
        rows,
        lower_label: format!("q{}", trim_pct(alpha * 100.0)),
        upper_label: format!("q{}", trim_pct((1.0 - alpha) * 100.0)),
    })
}

fn check_ci(ci_level: f64) -> Result<()> {
    if !(ci_level.is_finite() && ci_level > 0.0 && ci_level < 1.0) {
        return Err(Error::Validation(format!("ci_level must be in (0, 1), got {ci_level}")));
    }
    Ok(())
}

fn trim_pct(pct: f64) -> String {
    if (pct - pct.round()).abs() < 1e-9 {
        format!("{}", pct.round() as i64)
    } else {
        format!("{pct}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Matrix;

    fn pool(n: usize) -> AbcInput {
        let param_rows: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64, 10.0 + i as f64]).collect();
        let stat_rows: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64]).collect();
        AbcInput::new(
            vec![5.0],
            Matrix::new(vec!["a".into(), "b".into()], param_rows).unwrap(),
            Matrix::new(vec!["s".into()], stat_rows).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn returns_one_result_per_iteration_with_bounded_rows() {
        let results =
            resample_abc(&pool(10), 3, 5, false, &AbcConfig::rejection(1.0), 7).unwrap();
        assert_eq!(results.len(), 3);
        for r in &results {
            assert!(r.unadjusted().n_rows() <= 5);
        }
    }

    #[test]
    fn without_replacement_oversampling_fails() {
        let err =
            resample_abc(&pool(10), 3, 11, false, &AbcConfig::rejection(1.0), 7).unwrap_err();
        match err {
            Error::ResampleSizeExceeded { requested, available } => {
                assert_eq!(requested, 11);
                assert_eq!(available, 10);
            }
            other => panic!("expected ResampleSizeExceeded, got {other:?}"),
        }
    }

    #[test]
    fn with_replacement_oversampling_warns_and_continues() {
        let results =
            resample_abc(&pool(10), 2, 15, true, &AbcConfig::rejection(1.0), 7).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].unadjusted().n_rows(), 15);
    }

    #[test]
    fn full_pool_without_replacement_is_a_permutation() {
        let input = pool(10);
        let results =
            resample_abc(&input, 4, 10, false, &AbcConfig::rejection(1.0), 3).unwrap();
        for r in &results {
            let mut a: Vec<f64> = r.unadjusted().column("a").unwrap();
            a.sort_by(f64::total_cmp);
            let expect: Vec<f64> = (0..10).map(|i| i as f64).collect();
            assert_eq!(a, expect, "each iteration must be a permutation of the pool");
        }
    }

    #[test]
    fn fixed_seed_reproduces_the_sequence() {
        let input = pool(20);
        let config = AbcConfig::rejection(0.5);
        let r1 = resample_abc(&input, 3, 10, true, &config, 99).unwrap();
        let r2 = resample_abc(&input, 3, 10, true, &config, 99).unwrap();
        for (a, b) in r1.iter().zip(&r2) {
            assert_eq!(a.unadjusted(), b.unadjusted());
        }
    }

    #[test]
    fn median_summary_labels_carry_bounds_literally() {
        let results =
            resample_abc(&pool(20), 5, 10, true, &AbcConfig::rejection(0.5), 1).unwrap();
        let summary = summarise_resample_medians(&results, 0.95).unwrap();
        assert_eq!(summary.lower_label, "q2.5");
        assert_eq!(summary.upper_label, "q97.5");
        assert_eq!(summary.rows.len(), 2);
        for row in &summary.rows {
            assert!(row.lower <= row.median && row.median <= row.upper);
            assert!(row.mean.is_finite());
        }
        // Column b is a + 10 everywhere, so its summary shifts by 10.
        let a = &summary.rows[0];
        let b = &summary.rows[1];
        assert!((b.median - a.median - 10.0).abs() < 1e-9);
    }

    #[test]
    fn forest_rows_shape() {
        let results =
            resample_abc(&pool(20), 3, 10, true, &AbcConfig::rejection(0.5), 2).unwrap();
        let rows = forest_rows(&results, 0.9).unwrap();
        assert_eq!(rows.len(), 3 * 2);
        assert_eq!(rows[0].iteration, 1);
        assert_eq!(rows[0].parameter, "a");
        assert_eq!(rows[1].parameter, "b");
        assert!(rows.iter().all(|r| r.lower <= r.upper));
    }

    #[test]
    fn posterior_summary_of_known_draws() {
        let rows = (1..=9).map(|i| vec![i as f64]).collect();
        let result = AbcResult::Rejection {
            unadj: Matrix::new(vec!["a".into()], rows).unwrap(),
        };
        let summary = summarise_posterior(&result, 0.5).unwrap();
        assert_eq!(summary.lower_label, "q25");
        assert_eq!(summary.upper_label, "q75");
        let row = &summary.rows[0];
        assert!((row.median - 5.0).abs() < 1e-12);
        assert!((row.mean - 5.0).abs() < 1e-12);
        assert!((row.lower - 3.0).abs() < 1e-12);
        assert!((row.upper - 7.0).abs() < 1e-12);
    }

    #[test]
    fn empty_results_rejected() {
        assert!(matches!(
            summarise_resample_medians(&[], 0.95),
            Err(Error::EmptyResults(_))
        ));
        assert!(matches!(forest_rows(&[], 0.95), Err(Error::EmptyResults(_))));
    }
}

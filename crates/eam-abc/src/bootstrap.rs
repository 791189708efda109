//! Posterior row bootstrap.

use eam_core::{Error, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::abc::AbcResult;
use crate::input::Matrix;

/// Sample `n_samples` rows from a result's posterior draws.
///
/// Columns match the posterior. Without replacement, `n_samples` must not
/// exceed the number of posterior rows ([`Error::ResampleSizeExceeded`]);
/// with replacement, oversampling warns and continues.
pub fn bootstrap_posterior(
    result: &AbcResult,
    n_samples: usize,
    replace: bool,
    seed: u64,
) -> Result<Matrix> {
    let posterior = result.posterior_samples();
    let n = posterior.n_rows();
    if n == 0 {
        return Err(Error::EmptyResults("posterior has no rows to bootstrap".to_string()));
    }
    if n_samples == 0 {
        return Err(Error::Validation("n_samples must be >= 1".to_string()));
    }
    if !replace && n_samples > n {
        return Err(Error::ResampleSizeExceeded { requested: n_samples, available: n });
    }
    if replace && n_samples > n {
        eprintln!(
            "bootstrap_posterior: n_samples ({n_samples}) exceeds posterior size ({n}); sampling with replacement"
        );
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let indices = if replace {
        use rand::Rng;
        (0..n_samples).map(|_| rng.random_range(0..n)).collect::<Vec<_>>()
    } else {
        rand::seq::index::sample(&mut rng, n, n_samples).into_vec()
    };
    Ok(posterior.select_rows(&indices))
}

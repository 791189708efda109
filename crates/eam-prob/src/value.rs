//! The deterministic-or-stochastic value sum type.

use eam_core::{Error, Result};
use rand::rngs::StdRng;

use crate::dist::Dist;

/// Recycle `values` to length `n` by tiling.
///
/// Succeeds when the input length is 1, `n`, or a divisor of `n`; returns
/// `None` otherwise. Empty input only recycles to `n = 0`.
pub fn recycle(values: &[f64], n: usize) -> Option<Vec<f64>> {
    let k = values.len();
    if k == n {
        return Some(values.to_vec());
    }
    if k == 0 || n % k != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        out.extend_from_slice(values);
    }
    Some(out)
}

/// A value produced by formula evaluation: either a concrete vector or a
/// distribution capability still to be sampled.
#[derive(Debug, Clone)]
pub enum Value {
    /// Concrete numbers; recycled to the evaluation length on realization.
    Deterministic(Vec<f64>),
    /// A distribution from which exactly `n` i.i.d. samples are drawn.
    Stochastic(Dist),
}

impl Value {
    /// Wrap a scalar.
    pub fn scalar(x: f64) -> Self {
        Value::Deterministic(vec![x])
    }

    /// Realize to exactly `n` numbers.
    ///
    /// The stochastic branch draws `n` samples; the deterministic branch
    /// recycles. Recycling failures surface as `Validation` here — callers
    /// that know the binding name wrap them into `LengthMismatch`.
    pub fn realize(&self, n: usize, rng: &mut StdRng) -> Result<Vec<f64>> {
        match self {
            Value::Stochastic(dist) => dist.sample(n, rng),
            Value::Deterministic(values) => recycle(values, n).ok_or_else(|| {
                Error::Validation(format!(
                    "value of length {} cannot recycle to {}",
                    values.len(),
                    n
                ))
            }),
        }
    }

    /// Length of the deterministic payload, or `None` for a distribution.
    pub fn len_hint(&self) -> Option<usize> {
        match self {
            Value::Deterministic(v) => Some(v.len()),
            Value::Stochastic(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dist::DistKind;
    use rand::SeedableRng;

    #[test]
    fn recycle_laws() {
        assert_eq!(recycle(&[2.0], 3), Some(vec![2.0, 2.0, 2.0]));
        assert_eq!(recycle(&[1.0, 2.0], 4), Some(vec![1.0, 2.0, 1.0, 2.0]));
        assert_eq!(recycle(&[1.0, 2.0, 3.0], 3), Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(recycle(&[1.0, 2.0, 3.0], 2), None);
        assert_eq!(recycle(&[], 2), None);
    }

    #[test]
    fn realize_scalar_broadcasts() {
        let mut rng = StdRng::seed_from_u64(1);
        let v = Value::scalar(5.0).realize(4, &mut rng).unwrap();
        assert_eq!(v, vec![5.0; 4]);
    }

    #[test]
    fn realize_distribution_draws_n() {
        let mut rng = StdRng::seed_from_u64(1);
        let d = Dist::new(DistKind::Uniform, vec![vec![0.0], vec![1.0]]).unwrap();
        let v = Value::Stochastic(d).realize(7, &mut rng).unwrap();
        assert_eq!(v.len(), 7);
    }
}

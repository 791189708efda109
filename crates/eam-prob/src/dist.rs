//! Parameterized distribution capability.
//!
//! A [`Dist`] bundles a distribution family with already-realized parameter
//! vectors. Sampling draws `n` independent values; parameter vectors recycle
//! elementwise, so a length-`n` parameter gives each draw its own
//! parameterization while a length-1 parameter is shared by all draws.

use eam_core::{Error, Result};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Beta, Binomial, Distribution, Exp, Gamma, LogNormal, Normal, Poisson, Uniform};
use statrs::distribution::{ContinuousCDF, Normal as StatNormal};

use crate::value::recycle;

/// Distribution family selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistKind {
    /// `Uniform(low, high)`.
    Uniform,
    /// `Normal(mean, sd)`.
    Normal,
    /// `LogNormal(mu, sigma)`: `ln X ~ Normal(mu, sigma)`.
    LogNormal,
    /// `Binomial(size, p)`; `size` is rounded to the nearest non-negative integer.
    Binomial,
    /// `Beta(alpha, beta)`.
    Beta,
    /// `Gamma(shape, scale)`.
    Gamma,
    /// `Exponential(rate)`.
    Exponential,
    /// `Poisson(lambda)`.
    Poisson,
    /// `TruncNormal(mean, sd, low, high)` via inverse-CDF on the truncated mass.
    TruncNormal,
}

impl DistKind {
    /// Number of parameters the family takes.
    pub fn arity(&self) -> usize {
        match self {
            DistKind::Uniform
            | DistKind::Normal
            | DistKind::LogNormal
            | DistKind::Binomial
            | DistKind::Beta
            | DistKind::Gamma => 2,
            DistKind::Exponential | DistKind::Poisson => 1,
            DistKind::TruncNormal => 4,
        }
    }

    /// Family name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            DistKind::Uniform => "uniform",
            DistKind::Normal => "normal",
            DistKind::LogNormal => "lognormal",
            DistKind::Binomial => "binomial",
            DistKind::Beta => "beta",
            DistKind::Gamma => "gamma",
            DistKind::Exponential => "exponential",
            DistKind::Poisson => "poisson",
            DistKind::TruncNormal => "tnorm",
        }
    }
}

/// A distribution with realized parameter vectors.
#[derive(Debug, Clone)]
pub struct Dist {
    kind: DistKind,
    params: Vec<Vec<f64>>,
}

impl Dist {
    /// Bundle a family with its parameter vectors.
    ///
    /// # Errors
    /// `Validation` if the parameter count does not match the family arity or
    /// any parameter vector is empty.
    pub fn new(kind: DistKind, params: Vec<Vec<f64>>) -> Result<Self> {
        if params.len() != kind.arity() {
            return Err(Error::Validation(format!(
                "{} takes {} parameters, got {}",
                kind.name(),
                kind.arity(),
                params.len()
            )));
        }
        if params.iter().any(|p| p.is_empty()) {
            return Err(Error::Validation(format!(
                "{} received an empty parameter vector",
                kind.name()
            )));
        }
        Ok(Self { kind, params })
    }

    /// Distribution family.
    pub fn kind(&self) -> DistKind {
        self.kind
    }

    /// Draw exactly `n` independent samples.
    ///
    /// Parameter vectors recycle to length `n` elementwise; a parameter whose
    /// length is neither 1, `n`, nor a divisor of `n` is rejected.
    pub fn sample(&self, n: usize, rng: &mut StdRng) -> Result<Vec<f64>> {
        if n == 0 {
            return Err(Error::Validation("sample count must be >= 1".to_string()));
        }
        let params: Vec<Vec<f64>> = self
            .params
            .iter()
            .map(|p| {
                recycle(p, n).ok_or_else(|| {
                    Error::Validation(format!(
                        "{} parameter of length {} cannot recycle to {}",
                        self.kind.name(),
                        p.len(),
                        n
                    ))
                })
            })
            .collect::<Result<_>>()?;

        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            out.push(self.draw_one(&params, i, rng)?);
        }
        Ok(out)
    }

    fn draw_one(&self, params: &[Vec<f64>], i: usize, rng: &mut StdRng) -> Result<f64> {
        let bad = |what: &str, v: f64| {
            Error::Validation(format!("{}: {} invalid ({})", self.kind.name(), what, v))
        };
        match self.kind {
            DistKind::Uniform => {
                let (low, high) = (params[0][i], params[1][i]);
                if !(low.is_finite() && high.is_finite() && low < high) {
                    return Err(bad("bounds", high - low));
                }
                let d = Uniform::new(low, high)
                    .map_err(|e| Error::Validation(format!("uniform: {e}")))?;
                Ok(d.sample(rng))
            }
            DistKind::Normal => {
                let (mean, sd) = (params[0][i], params[1][i]);
                if !(sd.is_finite() && sd > 0.0) {
                    return Err(bad("sd", sd));
                }
                let d =
                    Normal::new(mean, sd).map_err(|e| Error::Validation(format!("normal: {e}")))?;
                Ok(d.sample(rng))
            }
            DistKind::LogNormal => {
                let (mu, sigma) = (params[0][i], params[1][i]);
                if !(sigma.is_finite() && sigma > 0.0) {
                    return Err(bad("sigma", sigma));
                }
                let d = LogNormal::new(mu, sigma)
                    .map_err(|e| Error::Validation(format!("lognormal: {e}")))?;
                Ok(d.sample(rng))
            }
            DistKind::Binomial => {
                let (size, p) = (params[0][i], params[1][i]);
                if !(size.is_finite() && size >= 0.0) {
                    return Err(bad("size", size));
                }
                if !(0.0..=1.0).contains(&p) {
                    return Err(bad("p", p));
                }
                let d = Binomial::new(size.round() as u64, p)
                    .map_err(|e| Error::Validation(format!("binomial: {e}")))?;
                Ok(d.sample(rng) as f64)
            }
            DistKind::Beta => {
                let (alpha, beta) = (params[0][i], params[1][i]);
                if !(alpha > 0.0 && beta > 0.0) {
                    return Err(bad("shape", alpha.min(beta)));
                }
                let d =
                    Beta::new(alpha, beta).map_err(|e| Error::Validation(format!("beta: {e}")))?;
                Ok(d.sample(rng))
            }
            DistKind::Gamma => {
                let (shape, scale) = (params[0][i], params[1][i]);
                if !(shape > 0.0 && scale > 0.0) {
                    return Err(bad("shape/scale", shape.min(scale)));
                }
                let d = Gamma::new(shape, scale)
                    .map_err(|e| Error::Validation(format!("gamma: {e}")))?;
                Ok(d.sample(rng))
            }
            DistKind::Exponential => {
                let rate = params[0][i];
                if !(rate.is_finite() && rate > 0.0) {
                    return Err(bad("rate", rate));
                }
                let d = Exp::new(rate).map_err(|e| Error::Validation(format!("exponential: {e}")))?;
                Ok(d.sample(rng))
            }
            DistKind::Poisson => {
                let lambda = params[0][i];
                if !(lambda.is_finite() && lambda > 0.0) {
                    return Err(bad("lambda", lambda));
                }
                let d = Poisson::new(lambda)
                    .map_err(|e| Error::Validation(format!("poisson: {e}")))?;
                Ok(d.sample(rng))
            }
            DistKind::TruncNormal => {
                let (mean, sd) = (params[0][i], params[1][i]);
                let (low, high) = (params[2][i], params[3][i]);
                if !(sd.is_finite() && sd > 0.0) {
                    return Err(bad("sd", sd));
                }
                if !(low < high) {
                    return Err(bad("bounds", high - low));
                }
                let std = StatNormal::new(0.0, 1.0)
                    .map_err(|e| Error::Computation(format!("tnorm: {e}")))?;
                let a = std.cdf((low - mean) / sd);
                let b = std.cdf((high - mean) / sd);
                if !(b - a).is_finite() || b - a <= 0.0 {
                    return Err(Error::Computation(format!(
                        "tnorm: no probability mass in ({low}, {high})"
                    )));
                }
                let u: f64 = rng.random();
                let z = std.inverse_cdf(a + u * (b - a));
                Ok(mean + sd * z)
            }
        }
    }
}

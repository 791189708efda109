//! Noise callables and their factory.
//!
//! A noise callable has signature `(count, dt) → vector` and is rebuilt per
//! trial by a factory that closes over the trial's resolved bindings. The
//! callable owns the base time scaling (it receives `dt`); the coupling mode
//! decides how its output enters the accumulator update.

use std::str::FromStr;
use std::sync::Arc;

use eam_core::{Error, Result};
use eam_formula::Env;
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};

/// Per-trial noise callable: `(rng, count, dt) → vector of length count`.
pub type NoiseFn = Box<dyn FnMut(&mut StdRng, usize, f64) -> Vec<f64> + Send>;

/// Factory constructing a [`NoiseFn`] from a trial's resolved bindings.
pub type NoiseFactory = Arc<dyn Fn(&Env) -> Result<NoiseFn> + Send + Sync>;

/// How the noise draw enters the accumulator update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseMechanism {
    /// `x += v·dt + ε`.
    Add,
    /// `x += v·dt + x·ε`. The spelling `"mult"` is accepted as an alias.
    MultEvidence,
    /// `x += v·dt + ε·√dt` (one extra `√dt` on top of the callable's own scaling).
    MultT,
}

impl NoiseMechanism {
    /// Canonical configuration spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            NoiseMechanism::Add => "add",
            NoiseMechanism::MultEvidence => "mult_evidence",
            NoiseMechanism::MultT => "mult_t",
        }
    }

    /// Apply the coupling to a raw draw given the current accumulator value.
    #[inline]
    pub fn couple(&self, eps: f64, x: f64, dt: f64) -> f64 {
        match self {
            NoiseMechanism::Add => eps,
            NoiseMechanism::MultEvidence => x * eps,
            NoiseMechanism::MultT => eps * dt.sqrt(),
        }
    }
}

impl FromStr for NoiseMechanism {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "add" => Ok(NoiseMechanism::Add),
            "mult" | "mult_evidence" => Ok(NoiseMechanism::MultEvidence),
            "mult_t" => Ok(NoiseMechanism::MultT),
            other => Err(Error::ConfigInvalid(format!("unknown noise_mechanism '{other}'"))),
        }
    }
}

/// Gaussian noise: draws `sd · √dt · z`, `z ~ N(0, 1)`.
///
/// `sd` is read from the trial bindings when present (first element),
/// defaulting to 1.0.
pub fn gaussian_noise_factory() -> NoiseFactory {
    Arc::new(|env: &Env| {
        let sd = env.get_scalar("sd").unwrap_or(1.0);
        if !(sd.is_finite() && sd >= 0.0) {
            return Err(Error::Validation(format!("noise sd must be finite and >= 0, got {sd}")));
        }
        Ok(Box::new(move |rng: &mut StdRng, count: usize, dt: f64| {
            let scale = sd * dt.sqrt();
            (0..count)
                .map(|_| {
                    let z: f64 = StandardNormal.sample(rng);
                    scale * z
                })
                .collect()
        }) as NoiseFn)
    })
}

/// All-zero noise. Realizes the ballistic (LBA) convention: the two-boundary
/// kernel run without diffusion.
pub fn zero_noise_factory() -> NoiseFactory {
    Arc::new(|_env: &Env| {
        Ok(Box::new(move |_rng: &mut StdRng, count: usize, _dt: f64| vec![0.0; count]) as NoiseFn)
    })
}

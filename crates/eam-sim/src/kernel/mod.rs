//! Euler-Maruyama integrator kernels.
//!
//! All three kernels share one contract: per-item parameter vectors of length
//! `n_items`, a time grid `t_k = k·dt` bounded by `max_t`, a noise callable,
//! and a coupling mode. They emit boundary crossings in the order they occur,
//! at most one per step: when several items cross within the same step the
//! smallest `item_idx` wins and the others stay active (a `dt`-resolution
//! artifact — shrink `dt` to sharpen it). Items that never cross before
//! `max_t` produce no record.

mod ddm;
mod lca;

use eam_core::{Error, Result};
use eam_formula::Env;
use eam_prob::recycle;
use rand::rngs::StdRng;

use crate::backend::Backend;
use crate::noise::{NoiseFn, NoiseMechanism};

/// One boundary crossing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossing {
    /// 1-based accumulator index.
    pub item_idx: usize,
    /// Crossing time plus the item's non-decision time.
    pub rt: f64,
    /// `+1` upper / `-1` lower for the two-boundary kernel, `None` otherwise.
    pub choice: Option<i8>,
}

/// Shared stepping parameters.
#[derive(Debug, Clone, Copy)]
pub struct StepSettings {
    /// Simulated-time horizon.
    pub max_t: f64,
    /// Euler step.
    pub dt: f64,
    /// Stop after this many crossings.
    pub max_reached: usize,
    /// Noise coupling mode.
    pub mechanism: NoiseMechanism,
}

impl StepSettings {
    fn validate(&self, n_items: usize) -> Result<()> {
        if n_items == 0 {
            return Err(Error::InvalidKernelInput("n_items must be >= 1".to_string()));
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(Error::InvalidKernelInput(format!("dt must be > 0, got {}", self.dt)));
        }
        if !(self.max_t.is_finite() && self.max_t > 0.0) {
            return Err(Error::InvalidKernelInput(format!(
                "max_t must be > 0, got {}",
                self.max_t
            )));
        }
        if self.max_reached == 0 || self.max_reached > n_items {
            return Err(Error::InvalidKernelInput(format!(
                "max_reached must be in [1, {n_items}], got {}",
                self.max_reached
            )));
        }
        Ok(())
    }
}

/// Integrate one trial with the routed kernel.
///
/// `item_env` holds the trial's resolved item-level bindings; length-1
/// entries (condition- or trial-level values flowing down) recycle to
/// `n_items`.
pub fn simulate_trial(
    backend: Backend,
    item_env: &Env,
    n_items: usize,
    settings: &StepSettings,
    noise: &mut NoiseFn,
    rng: &mut StdRng,
) -> Result<Vec<Crossing>> {
    settings.validate(n_items)?;
    let v = required(item_env, "V", n_items)?;
    let ndt = optional(item_env, "ndt", n_items, 0.0)?;
    let z = optional(item_env, "Z", n_items, 0.0)?;

    match backend {
        Backend::Ddm => {
            let a = required(item_env, "A", n_items)?;
            ddm::ddm_1b(&v, &a, &ndt, &z, settings, noise, rng)
        }
        Backend::Ddm2b => {
            let a_upper = required(item_env, "A_upper", n_items)?;
            let a_lower = required(item_env, "A_lower", n_items)?;
            for i in 0..n_items {
                if a_lower[i] >= a_upper[i] {
                    return Err(Error::InvalidKernelInput(format!(
                        "A_lower must be < A_upper (item {}: {} vs {})",
                        i + 1,
                        a_lower[i],
                        a_upper[i]
                    )));
                }
            }
            ddm::ddm_2b(&v, &a_upper, &a_lower, &ndt, &z, settings, noise, rng)
        }
        Backend::LcaGi => {
            let a = required(item_env, "A", n_items)?;
            let beta = required(item_env, "beta", n_items)?;
            let kappa = required(item_env, "kappa", n_items)?;
            lca::lca_gi(&v, &a, &beta, &kappa, &ndt, &z, settings, noise, rng)
        }
    }
}

fn required(env: &Env, name: &str, n_items: usize) -> Result<Vec<f64>> {
    let values = env
        .get(name)
        .ok_or_else(|| Error::InvalidKernelInput(format!("missing parameter '{name}'")))?;
    let out = recycle(values, n_items).ok_or_else(|| {
        Error::InvalidKernelInput(format!(
            "parameter '{name}' has length {}, expected {n_items}",
            values.len()
        ))
    })?;
    if out.iter().any(|x| !x.is_finite()) {
        return Err(Error::InvalidKernelInput(format!("parameter '{name}' contains non-finite values")));
    }
    Ok(out)
}

fn optional(env: &Env, name: &str, n_items: usize, default: f64) -> Result<Vec<f64>> {
    match env.get(name) {
        Some(_) => required(env, name, n_items),
        None => Ok(vec![default; n_items]),
    }
}

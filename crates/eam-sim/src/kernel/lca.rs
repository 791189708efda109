//! Leaky competing accumulator with global inhibition.
//!
//! Per-step update for active item `i`:
//! `x_i += (V_i − beta_i·x_i − kappa_i·Σ_j x_j)·dt + ε_i`
//! where the sum runs over all active items (self included) at the start of
//! the step, and `ε_i` is the coupled noise draw. The per-step noise vector
//! has length `n_active` (independent streams per accumulator).

use eam_core::Result;
use rand::rngs::StdRng;

use crate::kernel::{Crossing, StepSettings};
use crate::noise::NoiseFn;

pub(crate) fn lca_gi(
    v: &[f64],
    a: &[f64],
    beta: &[f64],
    kappa: &[f64],
    ndt: &[f64],
    z: &[f64],
    settings: &StepSettings,
    noise: &mut NoiseFn,
    rng: &mut StdRng,
) -> Result<Vec<Crossing>> {
    let mut x = z.to_vec();
    let mut active: Vec<usize> = (0..v.len()).collect();
    let mut out = Vec::with_capacity(settings.max_reached);

    let mut k: u64 = 0;
    loop {
        k += 1;
        let t = k as f64 * settings.dt;
        if t > settings.max_t {
            break;
        }

        let eps = noise(rng, active.len(), settings.dt);
        let total: f64 = active.iter().map(|&i| x[i]).sum();
        for (pos, &i) in active.iter().enumerate() {
            let drift = v[i] - beta[i] * x[i] - kappa[i] * total;
            let coupled = settings.mechanism.couple(eps[pos], x[i], settings.dt);
            x[i] += drift * settings.dt + coupled;
        }

        if let Some(pos) = active.iter().position(|&i| x[i] >= a[i]) {
            let i = active[pos];
            out.push(Crossing { item_idx: i + 1, rt: t + ndt[i], choice: None });
            active.remove(pos);
            if out.len() == settings.max_reached || active.is_empty() {
                break;
            }
        }
    }
    Ok(out)
}

//! Drift-diffusion kernels (one- and two-boundary).
//!
//! Per step, one noise value is drawn and shared by all active accumulators
//! (the per-step noise vector has length 1 for the DDM family); independent
//! streams across items are the LCA kernel's territory.

use eam_core::Result;
use rand::rngs::StdRng;

use crate::kernel::{Crossing, StepSettings};
use crate::noise::NoiseFn;

/// Single-boundary upper-hit drift diffusion.
pub(crate) fn ddm_1b(
    v: &[f64],
    a: &[f64],
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

        let eps = noise(rng, 1, settings.dt)[0];
        for &i in &active {
            let coupled = settings.mechanism.couple(eps, x[i], settings.dt);
            x[i] += v[i] * settings.dt + coupled;
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

/// Two-boundary drift diffusion; `choice` is `+1` (upper) or `-1` (lower).
pub(crate) fn ddm_2b(
    v: &[f64],
    a_upper: &[f64],
    a_lower: &[f64],
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

        let eps = noise(rng, 1, settings.dt)[0];
        for &i in &active {
            let coupled = settings.mechanism.couple(eps, x[i], settings.dt);
            x[i] += v[i] * settings.dt + coupled;
        }

        let hit = active
            .iter()
            .position(|&i| x[i] >= a_upper[i] || x[i] <= a_lower[i]);
        if let Some(pos) = hit {
            let i = active[pos];
            let choice = if x[i] >= a_upper[i] { 1i8 } else { -1i8 };
            out.push(Crossing { item_idx: i + 1, rt: t + ndt[i], choice: Some(choice) });
            active.remove(pos);
            if out.len() == settings.max_reached || active.is_empty() {
                break;
            }
        }
    }
    Ok(out)
}

//! Chunked simulation driver.
//!
//! Work is embarrassingly parallel across chunks: each chunk owns a disjoint
//! range of conditions, derives its own RNG stream from the run seed, and
//! writes its own partition subdirectory. Within a chunk execution is
//! strictly sequential, so a run's dataset is identical for any worker count.

use std::path::Path;

use eam_core::{Error, Result};
use eam_formula::{evaluate_bindings, Env};
use eam_prob::recycle;
use eam_store::{Column, Dataset, Table, CHUNK_IDX, CONDITION_IDX};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::backend::Backend;
use crate::config::{ConfigManifest, ResolvedConfig, SimulationConfig};
use crate::kernel::{simulate_trial, StepSettings};
use crate::output::SimulationOutput;

/// Run a simulation into `out_dir`.
///
/// Creates `out_dir` (must be absent or empty), persists the config manifest,
/// pre-evaluates the condition tier, then executes chunks serially or on a
/// Rayon pool bounded by `n_cores`. A failing chunk aborts the run; already
/// written partitions stay on disk and the directory can be inspected, but no
/// output handle is returned.
pub fn run_simulation(config: &SimulationConfig, out_dir: &Path) -> Result<SimulationOutput> {
    let resolved = config.resolve()?;
    prepare_out_dir(out_dir)?;

    ConfigManifest::from_config(config, &resolved).save(out_dir)?;

    // Condition tier: one evaluation for the whole run, seeded directly from
    // the run seed.
    let mut prior_rng = StdRng::seed_from_u64(resolved.rand_seed);
    let cond_env = evaluate_bindings(
        &config.prior_formulas,
        &config.prior_params,
        config.n_conditions,
        &mut prior_rng,
    )?;

    let conditions = conditions_table(&cond_env, config.n_conditions, &resolved)?;
    let cond_ds = Dataset::create(out_dir.join("evaluated_conditions"))?;
    for chunk_idx in 1..=resolved.n_chunks as u64 {
        let rows = condition_rows_of_chunk(config.n_conditions, &resolved, chunk_idx);
        cond_ds.write_partition(chunk_idx, &conditions.take(&rows))?;
    }

    let data_ds = Dataset::create(out_dir.join("dataset"))?;
    let chunk_ids: Vec<u64> = (1..=resolved.n_chunks as u64).collect();
    let work = |chunk_idx: &u64| -> Result<()> {
        let table = simulate_chunk(config, &resolved, &cond_env, *chunk_idx)?;
        data_ds.write_partition(*chunk_idx, &table)
    };

    if config.parallel {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(resolved.n_cores)
            .build()
            .map_err(|e| Error::Computation(format!("failed to create thread pool: {e}")))?;
        pool.install(|| chunk_ids.par_iter().map(work).collect::<Result<Vec<()>>>())?;
    } else {
        for chunk_idx in &chunk_ids {
            work(chunk_idx)?;
        }
    }

    SimulationOutput::from_dir(out_dir)
}

/// Per-chunk RNG stream: same hash-mix for serial and parallel execution, so
/// datasets are reproducible across worker counts.
fn chunk_rng(rand_seed: u64, chunk_idx: u64) -> StdRng {
    StdRng::seed_from_u64(rand_seed.wrapping_mul(2654435761).wrapping_add(chunk_idx))
}

fn prepare_out_dir(out_dir: &Path) -> Result<()> {
    if out_dir.exists() {
        if !out_dir.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} exists and is not a directory", out_dir.display()),
            )));
        }
        if std::fs::read_dir(out_dir)?.next().is_some() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("output directory {} is not empty", out_dir.display()),
            )));
        }
    } else {
        std::fs::create_dir_all(out_dir)?;
    }
    Ok(())
}

/// 0-based row indices of the conditions assigned to `chunk_idx`.
fn condition_rows_of_chunk(
    n_conditions: usize,
    resolved: &ResolvedConfig,
    chunk_idx: u64,
) -> Vec<usize> {
    let per_chunk = resolved.n_conditions_per_chunk;
    let start = (chunk_idx as usize - 1) * per_chunk;
    let end = (start + per_chunk).min(n_conditions);
    (start..end).collect()
}

/// Materialize the evaluated condition tier as a table with `condition_idx`
/// (1-based, dense) and `chunk_idx = ceil(condition_idx / per_chunk)`.
fn conditions_table(
    cond_env: &Env,
    n_conditions: usize,
    resolved: &ResolvedConfig,
) -> Result<Table> {
    let mut table = Table::new();
    for (name, values) in cond_env.iter() {
        let full = recycle(values, n_conditions).ok_or_else(|| Error::LengthMismatch {
            name: name.to_string(),
            len: values.len(),
            n: n_conditions,
        })?;
        table.push_column(name, Column::Float64(full))?;
    }
    let idx: Vec<i64> = (1..=n_conditions as i64).collect();
    let chunk: Vec<i64> = idx
        .iter()
        .map(|&i| (i as usize).div_ceil(resolved.n_conditions_per_chunk) as i64)
        .collect();
    table.push_column(CONDITION_IDX, Column::Int64(idx))?;
    table.push_column(CHUNK_IDX, Column::Int64(chunk))?;
    Ok(table)
}

/// Execute one chunk: all trials of all its conditions, flattened to one row
/// per boundary crossing.
fn simulate_chunk(
    config: &SimulationConfig,
    resolved: &ResolvedConfig,
    cond_env: &Env,
    chunk_idx: u64,
) -> Result<Table> {
    let mut rng = chunk_rng(resolved.rand_seed, chunk_idx);
    let settings = StepSettings {
        max_t: config.max_t,
        dt: config.dt,
        max_reached: config.max_reached,
        mechanism: config.noise_mechanism,
    };
    let with_choice = resolved.backend == Backend::Ddm2b;

    let mut condition_idx = Vec::new();
    let mut trial_idx = Vec::new();
    let mut rank_idx = Vec::new();
    let mut item_idx = Vec::new();
    let mut rt = Vec::new();
    let mut choice = Vec::new();
    let cond_names: Vec<String> = cond_env.names().to_vec();
    let mut cond_cols: Vec<Vec<f64>> = vec![Vec::new(); cond_names.len()];

    for row in condition_rows_of_chunk(config.n_conditions, resolved, chunk_idx) {
        let cond_row = cond_env.row(row);
        let cond_number = (row + 1) as i64;

        let trial_env = evaluate_bindings(
            &config.between_trial_formulas,
            &cond_row,
            config.n_trials_per_condition,
            &mut rng,
        )?;

        for trial in 0..config.n_trials_per_condition {
            let trial_row = trial_env.row(trial);
            let item_env = evaluate_bindings(
                &config.item_formulas,
                &trial_row,
                config.n_items,
                &mut rng,
            )?;
            let mut noise = (config.noise_factory)(&trial_row)?;

            let crossings = simulate_trial(
                resolved.backend,
                &item_env,
                config.n_items,
                &settings,
                &mut noise,
                &mut rng,
            )?;

            for (rank, crossing) in crossings.iter().enumerate() {
                condition_idx.push(cond_number);
                trial_idx.push((trial + 1) as i64);
                rank_idx.push((rank + 1) as i64);
                item_idx.push(crossing.item_idx as i64);
                rt.push(crossing.rt);
                if with_choice {
                    choice.push(crossing.choice.unwrap_or(0));
                }
                for (c, name) in cond_names.iter().enumerate() {
                    cond_cols[c].push(cond_row.get_scalar(name).unwrap_or(f64::NAN));
                }
            }
        }
    }

    let n_rows = condition_idx.len();
    let mut table = Table::new();
    table.push_column(CONDITION_IDX, Column::Int64(condition_idx))?;
    table.push_column("trial_idx", Column::Int64(trial_idx))?;
    table.push_column("rank_idx", Column::Int64(rank_idx))?;
    table.push_column("item_idx", Column::Int64(item_idx))?;
    table.push_column("rt", Column::Float64(rt))?;
    if with_choice {
        table.push_column("choice", Column::Int8(choice))?;
    }
    for (name, values) in cond_names.iter().zip(cond_cols) {
        table.push_column(name.clone(), Column::Float64(values))?;
    }
    table.push_column(CHUNK_IDX, Column::Int64(vec![chunk_idx as i64; n_rows]))?;
    Ok(table)
}

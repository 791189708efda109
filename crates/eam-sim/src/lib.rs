//! # eam-sim
//!
//! Simulation engine for evidence-accumulation decision models.
//!
//! A [`SimulationConfig`] declares a model as three tiers of formula bindings
//! (condition priors, between-trial draws, item derivations) plus grid and
//! time parameters. [`run_simulation`] pre-evaluates the condition tier,
//! partitions conditions into chunks, executes chunks serially or on a Rayon
//! pool with per-chunk derived seeds, integrates every trial with one of the
//! three Euler-Maruyama kernels, and streams boundary-crossing rows to a
//! partitioned Parquet dataset owned by the returned [`SimulationOutput`].

mod backend;
mod config;
mod driver;
pub mod kernel;
mod noise;
mod output;

pub use backend::{route, Backend};
pub use config::{ConfigManifest, ResolvedConfig, SimulationConfig, CONFIG_FILE};
pub use driver::run_simulation;
pub use kernel::{simulate_trial, Crossing, StepSettings};
pub use noise::{gaussian_noise_factory, zero_noise_factory, NoiseFactory, NoiseFn, NoiseMechanism};
pub use output::SimulationOutput;

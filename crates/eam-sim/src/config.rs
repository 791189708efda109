//! Simulation configuration: validation, chunk-size heuristic, persistence.

use std::path::Path;

use eam_core::{Error, Result};
use eam_formula::{Binding, Env};
use serde::{Deserialize, Serialize};

use crate::backend::{route, Backend};
use crate::noise::{gaussian_noise_factory, NoiseFactory, NoiseMechanism};

/// Manifest file name inside an output directory.
pub const CONFIG_FILE: &str = "config.json";

/// Rough upper bound on rows held in memory per chunk.
const MAX_ROWS_PER_CHUNK: usize = 200_000;

/// A complete simulation recipe.
///
/// Construct with [`SimulationConfig::new`], fill the public fields, then let
/// the driver resolve it; [`SimulationConfig::resolve`] can also be called
/// directly to validate up front.
pub struct SimulationConfig {
    /// Model name (`ddm`, `ddm-1b`, `ddm-2b`, `rdm`, `lba`, `lca`, `lca-gi`, `lfm`).
    pub model: String,
    /// Explicit backend override; skips routing (the `AmbiguousModel` escape).
    pub backend: Option<Backend>,
    /// Named constants visible to every formula tier.
    pub prior_params: Env,
    /// Condition-level bindings, evaluated once with `n = n_conditions`.
    pub prior_formulas: Vec<Binding>,
    /// Between-trial bindings, evaluated per condition with `n = n_trials_per_condition`.
    pub between_trial_formulas: Vec<Binding>,
    /// Item-level bindings, evaluated per trial with `n = n_items`.
    pub item_formulas: Vec<Binding>,
    /// Number of conditions.
    pub n_conditions: usize,
    /// Trials per condition.
    pub n_trials_per_condition: usize,
    /// Accumulators per trial.
    pub n_items: usize,
    /// Stop a trial after this many boundary crossings (`<= n_items`).
    pub max_reached: usize,
    /// Simulated-time horizon per trial.
    pub max_t: f64,
    /// Euler step.
    pub dt: f64,
    /// Noise coupling mode.
    pub noise_mechanism: NoiseMechanism,
    /// Per-trial noise constructor.
    pub noise_factory: NoiseFactory,
    /// Conditions per chunk; `None` applies the heuristic.
    pub n_conditions_per_chunk: Option<usize>,
    /// Execute chunks on a Rayon pool.
    pub parallel: bool,
    /// Worker count; auto-filled when parallel and absent.
    pub n_cores: Option<usize>,
    /// Seed for the whole run; auto-filled when parallel and absent.
    pub rand_seed: Option<u64>,
}

impl SimulationConfig {
    /// Recipe skeleton with a gaussian noise factory and 1×1×1 grid.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            backend: None,
            prior_params: Env::new(),
            prior_formulas: Vec::new(),
            between_trial_formulas: Vec::new(),
            item_formulas: Vec::new(),
            n_conditions: 1,
            n_trials_per_condition: 1,
            n_items: 1,
            max_reached: 1,
            max_t: 1.0,
            dt: 1e-3,
            noise_mechanism: NoiseMechanism::Add,
            noise_factory: gaussian_noise_factory(),
            n_conditions_per_chunk: None,
            parallel: false,
            n_cores: None,
            rand_seed: None,
        }
    }

    /// Every name bound anywhere: prior constants plus all formula LHS.
    pub fn bound_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.prior_params.names().to_vec();
        for binding in self
            .prior_formulas
            .iter()
            .chain(&self.between_trial_formulas)
            .chain(&self.item_formulas)
        {
            if !names.contains(&binding.name) {
                names.push(binding.name.clone());
            }
        }
        names
    }

    /// Validate the recipe and fix every free knob.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        if self.n_conditions == 0 {
            return Err(Error::ConfigInvalid("n_conditions must be >= 1".to_string()));
        }
        if self.n_trials_per_condition == 0 {
            return Err(Error::ConfigInvalid("n_trials_per_condition must be >= 1".to_string()));
        }
        if self.n_items == 0 {
            return Err(Error::ConfigInvalid("n_items must be >= 1".to_string()));
        }
        if self.max_reached == 0 || self.max_reached > self.n_items {
            return Err(Error::ConfigInvalid(format!(
                "max_reached must be in [1, n_items={}], got {}",
                self.n_items, self.max_reached
            )));
        }
        if !(self.max_t.is_finite() && self.max_t > 0.0) {
            return Err(Error::ConfigInvalid(format!("max_t must be > 0, got {}", self.max_t)));
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(Error::ConfigInvalid(format!("dt must be > 0, got {}", self.dt)));
        }

        let bound = self.bound_names();
        let backend = match self.backend {
            Some(b) => b,
            None => route(&self.model, &bound)?,
        };
        for param in backend.required_params() {
            if !bound.iter().any(|n| n == param) {
                return Err(Error::ConfigInvalid(format!(
                    "backend {} requires parameter '{param}' as a formula LHS or prior key",
                    backend.as_str()
                )));
            }
        }

        let n_cores = if self.parallel {
            let auto = std::thread::available_parallelism().map(|p| p.get()).unwrap_or(2);
            self.n_cores.unwrap_or(auto.saturating_sub(1)).max(1)
        } else {
            self.n_cores.unwrap_or(1).max(1)
        };
        let rand_seed = match self.rand_seed {
            Some(seed) => seed,
            None if self.parallel => rand::random::<u64>(),
            None => 0,
        };

        let n_conditions_per_chunk = match self.n_conditions_per_chunk {
            Some(k) if k >= 1 => k,
            Some(_) => {
                return Err(Error::ConfigInvalid(
                    "n_conditions_per_chunk must be >= 1".to_string(),
                ))
            }
            None => chunk_heuristic(
                self.n_conditions,
                self.n_trials_per_condition,
                self.n_items,
                self.parallel,
                n_cores,
            ),
        };
        let n_chunks = self.n_conditions.div_ceil(n_conditions_per_chunk);

        Ok(ResolvedConfig { backend, n_cores, rand_seed, n_conditions_per_chunk, n_chunks })
    }
}

/// Knobs fixed by [`SimulationConfig::resolve`].
#[derive(Debug, Clone, Copy)]
pub struct ResolvedConfig {
    /// Routed (or explicitly chosen) kernel.
    pub backend: Backend,
    /// Worker count.
    pub n_cores: usize,
    /// Seed for the whole run.
    pub rand_seed: u64,
    /// Conditions per chunk.
    pub n_conditions_per_chunk: usize,
    /// `ceil(n_conditions / n_conditions_per_chunk)`.
    pub n_chunks: usize,
}

/// Chunk-size heuristic: target roughly `√n_conditions` partitions (clamped
/// into `[n_cores, 10·n_cores]` when parallel), then cap the per-chunk row
/// count at [`MAX_ROWS_PER_CHUNK`].
fn chunk_heuristic(
    n_conditions: usize,
    n_trials: usize,
    n_items: usize,
    parallel: bool,
    n_cores: usize,
) -> usize {
    let mut target = (n_conditions as f64).sqrt().round().max(1.0) as usize;
    if parallel {
        target = target.clamp(n_cores, 10 * n_cores);
    }
    let per_chunk = n_conditions.div_ceil(target).max(1);
    let rows_per_condition = (n_items * n_trials).max(1);
    let cap = (MAX_ROWS_PER_CHUNK / rows_per_condition).max(1);
    per_chunk.min(cap)
}

/// Serializable projection of a resolved configuration.
///
/// Callables (noise factory, user functions) are not serializable; the
/// manifest records names and knobs so a directory can be rehydrated and
/// audited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigManifest {
    pub model: String,
    pub backend: String,
    pub n_conditions: usize,
    pub n_trials_per_condition: usize,
    pub n_items: usize,
    pub max_reached: usize,
    pub max_t: f64,
    pub dt: f64,
    pub noise_mechanism: String,
    pub n_conditions_per_chunk: usize,
    pub n_chunks: usize,
    pub parallel: bool,
    pub n_cores: usize,
    pub rand_seed: u64,
    pub prior_param_names: Vec<String>,
    pub prior_formula_names: Vec<String>,
    pub between_trial_formula_names: Vec<String>,
    pub item_formula_names: Vec<String>,
}

impl ConfigManifest {
    /// Build from a recipe and its resolved knobs.
    pub fn from_config(config: &SimulationConfig, resolved: &ResolvedConfig) -> Self {
        let names = |bindings: &[Binding]| bindings.iter().map(|b| b.name.clone()).collect();
        Self {
            model: config.model.clone(),
            backend: resolved.backend.as_str().to_string(),
            n_conditions: config.n_conditions,
            n_trials_per_condition: config.n_trials_per_condition,
            n_items: config.n_items,
            max_reached: config.max_reached,
            max_t: config.max_t,
            dt: config.dt,
            noise_mechanism: config.noise_mechanism.as_str().to_string(),
            n_conditions_per_chunk: resolved.n_conditions_per_chunk,
            n_chunks: resolved.n_chunks,
            parallel: config.parallel,
            n_cores: resolved.n_cores,
            rand_seed: resolved.rand_seed,
            prior_param_names: config.prior_params.names().to_vec(),
            prior_formula_names: names(&config.prior_formulas),
            between_trial_formula_names: names(&config.between_trial_formulas),
            item_formula_names: names(&config.item_formulas),
        }
    }

    /// Write `config.json` into `dir`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join(CONFIG_FILE), json)?;
        Ok(())
    }

    /// Read `config.json` from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.is_file() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("not a simulation output directory (missing {})", path.display()),
            )));
        }
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eam_formula::Expr;

    fn ddm_config() -> SimulationConfig {
        let mut config = SimulationConfig::new("ddm");
        config.prior_formulas = vec![
            Binding::new("V", Expr::uniform(Expr::constant(0.5), Expr::constant(2.0))),
            Binding::new("A", Expr::constant(1.0)),
        ];
        config.n_conditions = 16;
        config.n_trials_per_condition = 10;
        config
    }

    #[test]
    fn resolve_routes_and_defaults() {
        let resolved = ddm_config().resolve().unwrap();
        assert_eq!(resolved.backend, Backend::Ddm);
        assert_eq!(resolved.n_cores, 1);
        assert_eq!(resolved.rand_seed, 0);
        assert!(resolved.n_conditions_per_chunk >= 1);
        assert_eq!(
            resolved.n_chunks,
            16usize.div_ceil(resolved.n_conditions_per_chunk)
        );
    }

    #[test]
    fn missing_kernel_parameter_rejected() {
        let mut config = ddm_config();
        config.prior_formulas.pop(); // drop A
        config.item_formulas.clear();
        // Routing still picks the one-boundary kernel; the missing boundary
        // parameter surfaces as a configuration error.
        let err = config.resolve().unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)));
    }

    #[test]
    fn missing_drift_is_config_invalid() {
        let mut config = ddm_config();
        config.prior_formulas.remove(0); // drop V, keep A so routing succeeds
        assert!(matches!(config.resolve(), Err(Error::ConfigInvalid(_))));
    }

    #[test]
    fn explicit_backend_skips_routing() {
        let mut config = ddm_config();
        config.model = "something-else".into();
        config.backend = Some(Backend::Ddm);
        assert_eq!(config.resolve().unwrap().backend, Backend::Ddm);
    }

    #[test]
    fn max_reached_validated() {
        let mut config = ddm_config();
        config.n_items = 2;
        config.max_reached = 3;
        assert!(matches!(config.resolve(), Err(Error::ConfigInvalid(_))));
    }

    #[test]
    fn non_positive_dt_rejected() {
        let mut config = ddm_config();
        config.dt = 0.0;
        assert!(matches!(config.resolve(), Err(Error::ConfigInvalid(_))));
    }

    #[test]
    fn heuristic_caps_rows_per_chunk() {
        // 1000 trials × 10 items = 10_000 rows per condition → at most 20
        // conditions per chunk under the 200k cap.
        let per_chunk = chunk_heuristic(100, 1000, 10, false, 1);
        assert!(per_chunk <= 20);
        assert!(per_chunk >= 1);
    }

    #[test]
    fn heuristic_targets_sqrt_partitions_serial() {
        // 100 conditions, tiny rows: ~10 partitions of ~10.
        let per_chunk = chunk_heuristic(100, 1, 1, false, 1);
        assert_eq!(per_chunk, 10);
    }

    #[test]
    fn parallel_autofills_cores_and_seed() {
        let mut config = ddm_config();
        config.parallel = true;
        let resolved = config.resolve().unwrap();
        assert!(resolved.n_cores >= 1);
    }

    #[test]
    fn manifest_roundtrip() {
        let config = ddm_config();
        let resolved = config.resolve().unwrap();
        let manifest = ConfigManifest::from_config(&config, &resolved);

        let dir = tempfile::tempdir().unwrap();
        manifest.save(dir.path()).unwrap();
        let back = ConfigManifest::load(dir.path()).unwrap();
        assert_eq!(back.model, "ddm");
        assert_eq!(back.backend, "ddm");
        assert_eq!(back.prior_formula_names, vec!["V".to_string(), "A".to_string()]);
        assert_eq!(back.n_chunks, resolved.n_chunks);
    }

    #[test]
    fn load_missing_manifest_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(ConfigManifest::load(dir.path()), Err(Error::Io(_))));
    }
}

//! Backend routing: model name + formula LHS names → integrator kernel.

use eam_core::{Error, Result};

/// Concrete integrator kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Single-boundary upper-hit drift diffusion.
    Ddm,
    /// Two-boundary drift diffusion (also serves RDM, LBA, LFM).
    Ddm2b,
    /// Leaky competing accumulator with global inhibition.
    LcaGi,
}

impl Backend {
    /// Display name used in manifests and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Ddm => "ddm",
            Backend::Ddm2b => "ddm_2b",
            Backend::LcaGi => "lca_gi",
        }
    }

    /// Parse a manifest backend string.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "ddm" => Ok(Backend::Ddm),
            "ddm_2b" => Ok(Backend::Ddm2b),
            "lca_gi" => Ok(Backend::LcaGi),
            other => Err(Error::ConfigInvalid(format!("unknown backend '{other}'"))),
        }
    }

    /// Physical parameters the kernel requires as formula LHS or prior keys.
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            Backend::Ddm => &["V", "A"],
            Backend::Ddm2b => &["V", "A_upper", "A_lower"],
            Backend::LcaGi => &["V", "A", "beta", "kappa"],
        }
    }
}

/// Route a model string plus the set of all bound names to a backend.
///
/// Exactly one detector must fire. Zero hits is `UnknownModel`; more than
/// one is `AmbiguousModel` (disambiguate by setting the backend explicitly
/// on the config). A plain `ddm` routes one-boundary unless `A_upper` is
/// bound; whether the routed kernel's parameters are actually present is
/// checked later, at config validation. `lba` routes to the two-boundary
/// kernel: ballistic behavior is obtained with a zero-noise factory.
pub fn route(model: &str, bound_names: &[String]) -> Result<Backend> {
    let model_lc = model.to_ascii_lowercase();
    let has = |name: &str| bound_names.iter().any(|n| n == name);

    let mut hits: Vec<(&'static str, Backend)> = Vec::new();
    if matches!(model_lc.as_str(), "ddm-2b" | "rdm") {
        hits.push(("two-boundary model name", Backend::Ddm2b));
    }
    if model_lc == "ddm" && has("A_upper") {
        hits.push(("ddm with A_upper", Backend::Ddm2b));
    }
    if (model_lc == "ddm" && !has("A_upper")) || model_lc == "ddm-1b" {
        hits.push(("one-boundary ddm", Backend::Ddm));
    }
    if matches!(model_lc.as_str(), "lca" | "lca-gi") {
        hits.push(("lca", Backend::LcaGi));
    }
    if matches!(model_lc.as_str(), "lfm" | "lba") {
        hits.push(("ballistic/filtering two-boundary", Backend::Ddm2b));
    }

    match hits.len() {
        0 => Err(Error::UnknownModel(model.to_string())),
        1 => Ok(hits[0].1),
        _ => Err(Error::AmbiguousModel {
            model: model.to_string(),
            candidates: hits.iter().map(|(d, b)| format!("{} ({d})", b.as_str())).collect(),
        }),
    }
}

//! # eam-abc
//!
//! Posterior approximation by matching simulated to observed summary
//! statistics.
//!
//! [`SummaryStatSpec`] declares grouped aggregations once and applies them to
//! many tables; [`build_abc_input`] aligns simulation parameters, simulated
//! summaries, and target summaries into congruent matrices; [`run_abc`]
//! performs tolerance-based acceptance with optional local-linear (or
//! delegated neural-network) adjustment; [`resample_abc`] bootstraps the
//! simulation pool with a posterior recomputation per iteration.

mod abc;
mod bootstrap;
mod density;
mod input;
mod resample;
pub mod stats;
mod summary;

pub use abc::{run_abc, AbcConfig, AbcMethod, AbcResult, PosteriorAdjuster};
pub use bootstrap::bootstrap_posterior;
pub use density::{posterior_density, DensityCurve};
pub use input::{build_abc_input, AbcInput, Matrix};
pub use resample::{
    forest_rows, resample_abc, summarise_posterior, summarise_resample_medians, ForestRow,
    MedianSummary, ResampleMedianSummary,
};
pub use summary::{
    compose, join_summary_tables, Agg, AggValue, NamedAgg, SpecAtom, SummaryStatSpec,
    SummaryTable, UserAgg,
};

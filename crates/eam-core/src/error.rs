//! Error types for eamkit.

use thiserror::Error;

/// eamkit error type.
///
/// One variant per failure category; structured variants carry the fields a
/// caller needs to react programmatically.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error (also used for unusable / unrecognizable output directories).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid simulation configuration (missing formula LHS, non-positive
    /// knob, `max_reached > n_items`, unknown noise mechanism, ...).
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Model string matched no backend detector.
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// Model string + formula names matched more than one backend detector.
    #[error("Ambiguous model '{model}': candidate backends {candidates:?}")]
    AmbiguousModel {
        /// Model string as supplied by the user.
        model: String,
        /// Names of all backends whose detectors fired.
        candidates: Vec<String>,
    },

    /// Formula evaluation produced a value whose length is neither 1, `n`,
    /// nor a divisor of `n`.
    #[error("Length mismatch for '{name}': value has length {len}, cannot recycle to {n}")]
    LengthMismatch {
        /// LHS name of the offending binding.
        name: String,
        /// Actual value length.
        len: usize,
        /// Requested evaluation length.
        n: usize,
    },

    /// An integrator kernel received malformed per-item vectors.
    #[error("Invalid kernel input: {0}")]
    InvalidKernelInput(String),

    /// Joining two applied summary tables whose `wider_by` metadata differs.
    #[error("wider_by mismatch: left {left:?}, right {right:?}")]
    WiderByMismatch {
        /// `wider_by` keys of the left table.
        left: Vec<String>,
        /// `wider_by` keys of the right table.
        right: Vec<String>,
    },

    /// `n_samples > N` requested without replacement.
    #[error("Resample size exceeded: requested {requested} from pool of {available} without replacement")]
    ResampleSizeExceeded {
        /// Requested draw count.
        requested: usize,
        /// Available pool size.
        available: usize,
    },

    /// An operation required a non-empty posterior / summary pool.
    #[error("Empty results: {0}")]
    EmptyResults(String),

    /// Generic validation error for malformed inputs outside the categories
    /// above.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Numerical computation failure.
    #[error("Computation error: {0}")]
    Computation(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

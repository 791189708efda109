//! # eam-core
//!
//! Shared error surface for the eamkit workspace.
//!
//! Every other crate in the workspace returns [`Result`] and maps its failure
//! modes onto a distinct [`Error`] variant, so callers can dispatch on kind
//! without string matching.

mod error;

pub use error::{Error, Result};

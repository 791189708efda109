//! # eam-formula
//!
//! Symbolic `name ← expression` bindings and their sequential resolution.
//!
//! A model is declared as three ordered binding lists (condition priors,
//! between-trial draws, item derivations). Each list is resolved against a
//! mutable [`Env`] with [`evaluate_bindings`]: expressions may reference any
//! earlier-resolved name, may evaluate to a deterministic vector (recycled
//! length-1 → `n`) or to a distribution capability (sampled exactly `n`
//! times).

mod ast;
mod env;
mod eval;

pub use ast::{Binding, Expr, Op, UserFn};
pub use env::Env;
pub use eval::evaluate_bindings;

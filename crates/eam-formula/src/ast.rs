//! Closed expression AST for formula bindings.
//!
//! The grammar is deliberately small: constants, references to
//! earlier-resolved names, elementwise operations, distribution draws, and a
//! user-function escape hatch for vector operations the closed set does not
//! cover.

use std::fmt;
use std::sync::Arc;

use eam_core::Result;
use eam_prob::DistKind;

/// Elementwise operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Min,
    Max,
    Neg,
    Exp,
    Ln,
    Sqrt,
    Abs,
}

impl Op {
    /// Operand count.
    pub fn arity(&self) -> usize {
        match self {
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Pow | Op::Min | Op::Max => 2,
            Op::Neg | Op::Exp | Op::Ln | Op::Sqrt | Op::Abs => 1,
        }
    }
}

/// User-supplied vector function with a display name.
#[derive(Clone)]
pub struct UserFn {
    name: String,
    f: Arc<dyn Fn(&[Vec<f64>]) -> Result<Vec<f64>> + Send + Sync>,
}

impl UserFn {
    /// Wrap a callable under a display name.
    pub fn new(
        name: impl Into<String>,
        f: impl Fn(&[Vec<f64>]) -> Result<Vec<f64>> + Send + Sync + 'static,
    ) -> Self {
        Self { name: name.into(), f: Arc::new(f) }
    }

    /// Apply the callable to realized argument vectors.
    pub fn call(&self, args: &[Vec<f64>]) -> Result<Vec<f64>> {
        (self.f)(args)
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for UserFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserFn").field("name", &self.name).finish()
    }
}

/// A formula expression.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Constant vector (length 1 for scalars).
    Const(Vec<f64>),
    /// Reference to an earlier-resolved name.
    Ref(String),
    /// Elementwise operation over sub-expressions.
    App(Op, Vec<Expr>),
    /// Distribution draw; parameters are themselves expressions.
    Draw(DistKind, Vec<Expr>),
    /// User-function application over realized argument vectors.
    User(UserFn, Vec<Expr>),
}

impl Expr {
    /// Scalar constant.
    pub fn constant(x: f64) -> Self {
        Expr::Const(vec![x])
    }

    /// Vector constant.
    pub fn vector(xs: Vec<f64>) -> Self {
        Expr::Const(xs)
    }

    /// Reference to a resolved name.
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Ref(name.into())
    }

    /// `Uniform(low, high)` draw.
    pub fn uniform(low: Expr, high: Expr) -> Self {
        Expr::Draw(DistKind::Uniform, vec![low, high])
    }

    /// `Normal(mean, sd)` draw.
    pub fn normal(mean: Expr, sd: Expr) -> Self {
        Expr::Draw(DistKind::Normal, vec![mean, sd])
    }

    /// `LogNormal(mu, sigma)` draw.
    pub fn lognormal(mu: Expr, sigma: Expr) -> Self {
        Expr::Draw(DistKind::LogNormal, vec![mu, sigma])
    }

    /// `Binomial(size, p)` draw.
    pub fn binomial(size: Expr, p: Expr) -> Self {
        Expr::Draw(DistKind::Binomial, vec![size, p])
    }

    /// `TruncNormal(mean, sd, low, high)` draw.
    pub fn tnorm(mean: Expr, sd: Expr, low: Expr, high: Expr) -> Self {
        Expr::Draw(DistKind::TruncNormal, vec![mean, sd, low, high])
    }

    /// Elementwise power.
    pub fn pow(self, rhs: Expr) -> Self {
        Expr::App(Op::Pow, vec![self, rhs])
    }

    /// Elementwise natural exponential.
    pub fn exp(self) -> Self {
        Expr::App(Op::Exp, vec![self])
    }

    /// Elementwise natural log.
    pub fn ln(self) -> Self {
        Expr::App(Op::Ln, vec![self])
    }

    /// Elementwise minimum against `rhs`.
    pub fn min(self, rhs: Expr) -> Self {
        Expr::App(Op::Min, vec![self, rhs])
    }

    /// Elementwise maximum against `rhs`.
    pub fn max(self, rhs: Expr) -> Self {
        Expr::App(Op::Max, vec![self, rhs])
    }
}

impl std::ops::Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        Expr::App(Op::Add, vec![self, rhs])
    }
}

impl std::ops::Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        Expr::App(Op::Sub, vec![self, rhs])
    }
}

impl std::ops::Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        Expr::App(Op::Mul, vec![self, rhs])
    }
}

impl std::ops::Div for Expr {
    type Output = Expr;
    fn div(self, rhs: Expr) -> Expr {
        Expr::App(Op::Div, vec![self, rhs])
    }
}

impl std::ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::App(Op::Neg, vec![self])
    }
}

/// A `(lhs_name, expression)` pair.
#[derive(Debug, Clone)]
pub struct Binding {
    /// Name the resolved value is bound to.
    pub name: String,
    /// Expression resolved against the environment.
    pub expr: Expr,
}

impl Binding {
    /// Bind `expr` to `name`.
    pub fn new(name: impl Into<String>, expr: Expr) -> Self {
        Self { name: name.into(), expr }
    }
}

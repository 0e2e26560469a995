//! Preconditioning strategies for the trust-region subproblem.
//!
//! A preconditioner approximates the inverse of the Riemannian Hessian and
//! is applied to residuals inside the truncated conjugate-gradient loop.
//! Problems that do not precondition simply expose none; solvers receive
//! an `Option<&dyn Preconditioner>` and treat `None` as the identity.

use crate::{error::Result, types::Matrix};
use std::fmt::Debug;

/// Preconditioner applied to tangent vectors.
pub trait Preconditioner: Debug {
    /// Applies the preconditioner to a tangent vector `ydot` at `y`.
    ///
    /// The returned matrix must lie in the tangent space at `y`.
    fn apply(&self, y: &Matrix, ydot: &Matrix) -> Result<Matrix>;

    /// Returns the name of this preconditioner.
    fn name(&self) -> &str {
        "Generic Preconditioner"
    }
}

/// Kind of preconditioner a problem should build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PreconditionerKind {
    /// No preconditioning (identity).
    None,
    /// Inverse of the diagonal of the data matrix.
    Jacobi,
    /// Cholesky factorization of the diagonally regularized data matrix.
    #[default]
    RegularizedCholesky,
}

impl PreconditionerKind {
    /// Human-readable description used in log output.
    pub fn description(&self) -> &'static str {
        match self {
            PreconditionerKind::None => "the identity preconditioner",
            PreconditionerKind::Jacobi => "Jacobi preconditioner",
            PreconditionerKind::RegularizedCholesky => "regularized Cholesky preconditioner",
        }
    }
}

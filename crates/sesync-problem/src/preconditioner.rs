//! Preconditioners for the SE-Sync trust-region subproblem.
//!
//! Both preconditioners approximate the inverse of the Riemannian Hessian by
//! the inverse of the (constant) data matrix, applied on the right, and then
//! project the result back onto the tangent space.

use crate::stiefel_product::StiefelProduct;
use nalgebra::{Cholesky, Dyn};
use sesync_core::{
    error::{ManifoldError, Result},
    preconditioner::Preconditioner,
    types::{shape_of, Matrix, Vector},
};

/// Diagonal (Jacobi) preconditioner.
///
/// Applies `P_Y(Ydot * diag(M)^{-1})`.
#[derive(Debug, Clone)]
pub struct JacobiPreconditioner {
    inverse_diagonal: Vector,
    geometry: StiefelProduct,
}

impl JacobiPreconditioner {
    /// Builds the preconditioner from the data matrix.
    pub fn new(data: &Matrix, geometry: StiefelProduct) -> Result<Self> {
        let diagonal = data.diagonal();
        if diagonal.iter().any(|&v| !(v > 0.0)) {
            return Err(ManifoldError::numerical_error(
                "Jacobi preconditioner requires a positive diagonal",
            ));
        }
        Ok(Self {
            inverse_diagonal: diagonal.map(|v| 1.0 / v),
            geometry,
        })
    }
}

impl Preconditioner for JacobiPreconditioner {
    fn apply(&self, y: &Matrix, ydot: &Matrix) -> Result<Matrix> {
        if ydot.ncols() != self.inverse_diagonal.len() {
            return Err(ManifoldError::dimension_mismatch(
                format!("(r, {})", self.inverse_diagonal.len()),
                shape_of(ydot),
            ));
        }
        let mut scaled = ydot.clone();
        for (mut column, &w) in scaled.column_iter_mut().zip(self.inverse_diagonal.iter()) {
            column *= w;
        }
        self.geometry.project_tangent(y, &scaled)
    }

    fn name(&self) -> &str {
        "Jacobi"
    }
}

/// Regularized Cholesky preconditioner.
///
/// Applies `P_Y(Ydot * (M + delta I)^{-1})` with `delta` a small multiple of
/// the largest diagonal entry of `M`, so the factorization exists even though
/// the data matrix is only positive semidefinite.
#[derive(Debug, Clone)]
pub struct RegularizedCholeskyPreconditioner {
    factor: Cholesky<f64, Dyn>,
    regularization: f64,
    geometry: StiefelProduct,
}

impl RegularizedCholeskyPreconditioner {
    /// Relative regularization applied to the data matrix diagonal.
    pub const RELATIVE_REGULARIZATION: f64 = 1e-4;

    /// Factors `M + delta I`.
    pub fn new(data: &Matrix, geometry: StiefelProduct) -> Result<Self> {
        let max_diagonal = data.diagonal().max();
        if !(max_diagonal > 0.0) {
            return Err(ManifoldError::numerical_error(
                "data matrix has no positive diagonal entry",
            ));
        }
        let regularization = Self::RELATIVE_REGULARIZATION * max_diagonal;
        let k = data.nrows();
        let factor = Cholesky::new(data + Matrix::identity(k, k) * regularization).ok_or_else(|| {
            ManifoldError::numerical_error("regularized data matrix is not positive definite")
        })?;
        Ok(Self {
            factor,
            regularization,
            geometry,
        })
    }

    /// Diagonal shift `delta` added before factorization.
    pub fn regularization(&self) -> f64 {
        self.regularization
    }
}

impl Preconditioner for RegularizedCholeskyPreconditioner {
    fn apply(&self, y: &Matrix, ydot: &Matrix) -> Result<Matrix> {
        if ydot.ncols() != self.factor.l_dirty().nrows() {
            return Err(ManifoldError::dimension_mismatch(
                format!("(r, {})", self.factor.l_dirty().nrows()),
                shape_of(ydot),
            ));
        }
        // Ydot (M + delta I)^{-1} = ((M + delta I)^{-1} Ydot^T)^T
        let solved = self.factor.solve(&ydot.transpose()).transpose();
        self.geometry.project_tangent(y, &solved)
    }

    fn name(&self) -> &str {
        "Regularized Cholesky"
    }
}

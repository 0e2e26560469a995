//! Interfaces between the Riemannian Staircase and the problem it solves.
//!
//! The staircase never touches problem data directly. Everything it needs,
//! from objective evaluation to the optimality certificate, goes through
//! the two traits defined here:
//!
//! - [`RiemannianObjective`]: the capability set consumed by the
//!   trust-region solver (objective, gradients, Hessian-vector products,
//!   retraction, metric, optional preconditioner).
//! - [`ManifoldProblem`]: the additional operations consumed by the
//!   staircase controller (rank mutation, initialization, certificate,
//!   rounding).

use crate::{
    error::Result,
    preconditioner::Preconditioner,
    types::{Matrix, Vector},
};

/// Smooth objective on an embedded matrix manifold.
///
/// Points and tangent vectors are both represented as `r x k` matrices;
/// the manifold is embedded in `R^{r x k}`.
pub trait RiemannianObjective {
    /// Evaluates the objective F(Y).
    fn evaluate_objective(&self, y: &Matrix) -> Result<f64>;

    /// Computes the Euclidean gradient of F at Y.
    fn euclidean_gradient(&self, y: &Matrix) -> Result<Matrix>;

    /// Converts a Euclidean gradient into the Riemannian gradient at Y.
    fn riemannian_gradient_from_euclidean(&self, y: &Matrix, nabla_f: &Matrix) -> Result<Matrix>;

    /// Computes the Riemannian gradient of F at Y.
    fn riemannian_gradient(&self, y: &Matrix) -> Result<Matrix> {
        let nabla_f = self.euclidean_gradient(y)?;
        self.riemannian_gradient_from_euclidean(y, &nabla_f)
    }

    /// Riemannian Hessian-vector product Hess F(Y)[Ydot].
    ///
    /// `nabla_f` is the Euclidean gradient at `y`, cached by the caller.
    fn hessian_vector_product(&self, y: &Matrix, nabla_f: &Matrix, ydot: &Matrix)
        -> Result<Matrix>;

    /// Retracts the tangent vector `ydot` at `y` back onto the manifold.
    fn retract(&self, y: &Matrix, ydot: &Matrix) -> Result<Matrix>;

    /// Riemannian metric at `y`.
    ///
    /// Embedded submanifolds inherit the Frobenius inner product.
    fn inner_product(&self, _y: &Matrix, v1: &Matrix, v2: &Matrix) -> f64 {
        v1.dot(v2)
    }

    /// Preconditioner for the trust-region subproblem, if one is enabled.
    fn preconditioner(&self) -> Option<&dyn Preconditioner> {
        None
    }
}

/// Result of a minimum-eigenvalue computation on the certificate matrix.
#[derive(Debug, Clone)]
pub struct Certificate {
    /// Whether the eigenvalue computation met its tolerance within budget
    pub converged: bool,
    /// Minimum eigenvalue estimate
    pub lambda_min: f64,
    /// Unit-norm eigenvector estimate for `lambda_min`
    pub v_min: Vector,
    /// Number of restarts performed by the eigen-solver
    pub iterations: usize,
}

/// A rank-restricted relaxation that can be driven by the staircase.
///
/// Implementations hold the active relaxation rank as mutable state; the
/// staircase is its only writer.
pub trait ManifoldProblem: RiemannianObjective {
    /// Sets the rank of the rank-restricted relaxation.
    fn set_relaxation_rank(&mut self, rank: usize) -> Result<()>;

    /// Returns the current relaxation rank.
    fn relaxation_rank(&self) -> usize;

    /// Number of columns `k` of an iterate.
    fn embedding_dimension(&self) -> usize;

    /// Chordal initialization lifted to the current relaxation rank.
    fn chordal_initialization(&self) -> Result<Matrix>;

    /// Random point on the manifold at the current relaxation rank.
    fn random_sample(&self) -> Result<Matrix>;

    /// Minimum eigenpair of the certificate matrix evaluated at `y`.
    fn compute_certificate_min_eig(
        &self,
        y: &Matrix,
        max_iterations: usize,
        tolerance: f64,
        num_lanczos_vectors: usize,
    ) -> Result<Certificate>;

    /// Rounds a relaxed iterate to a feasible estimate.
    fn round_solution(&self, y: &Matrix) -> Result<Matrix>;

    /// Objective of the original problem at a rounded estimate.
    fn evaluate_rounded_objective(&self, xhat: &Matrix) -> Result<f64>;
}

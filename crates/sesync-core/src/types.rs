//! Type aliases and numerical constants.
//!
//! SE-Sync works in double precision throughout; iterates, tangent vectors
//! and data matrices are all dense column-major `nalgebra` matrices.

/// Dense matrix type used for iterates, tangent vectors and data matrices.
pub type Matrix = nalgebra::DMatrix<f64>;

/// Dense vector type used for eigenvectors and measurements.
pub type Vector = nalgebra::DVector<f64>;

/// Numerical constants shared across the workspace.
pub mod constants {
    /// Tolerance used when checking that rotation blocks are orthonormal.
    pub const ORTHOGONALITY_TOLERANCE: f64 = 1e-8;

    /// Relative breakdown threshold for Krylov iterations.
    pub const BREAKDOWN_TOLERANCE: f64 = 1e-12;
}

/// Returns `(rows, cols)` of a matrix formatted for error messages.
pub fn shape_of(m: &Matrix) -> String {
    format!("({}, {})", m.nrows(), m.ncols())
}

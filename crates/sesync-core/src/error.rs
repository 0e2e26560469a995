//! Error types for manifold operations and optimization.
//!
//! Degraded staircase outcomes (an imprecise eigenvalue computation, a failed
//! saddle escape, an exhausted rank budget) are *not* errors; they are
//! reported through the staircase status. The types here cover invalid
//! input and numerical breakdowns that make a computation meaningless.

use thiserror::Error;

/// Errors that can occur during manifold and problem operations.
#[derive(Debug, Clone, Error)]
pub enum ManifoldError {
    /// Point is not on the manifold.
    ///
    /// Raised when an iterate has the wrong shape for the current
    /// relaxation or its rotation blocks are not orthonormal.
    #[error("Point is not on the manifold: {reason}")]
    InvalidPoint {
        /// Description of why the point is invalid
        reason: String,
    },

    /// Dimension mismatch between matrices.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions
        expected: String,
        /// Actual dimensions
        actual: String,
    },

    /// Numerical instability detected.
    ///
    /// This error occurs when a factorization or decomposition fails, or
    /// when a computation produces non-finite values.
    #[error("Numerical instability detected: {reason}")]
    NumericalError {
        /// Description of the numerical issue
        reason: String,
    },

    /// A relative pose measurement (or the graph they form) is unusable.
    #[error("Invalid measurement: {reason}")]
    InvalidMeasurement {
        /// Description of the problem with the measurement set
        reason: String,
    },
}

impl ManifoldError {
    /// Create an InvalidPoint error with a custom reason.
    pub fn invalid_point<S: Into<String>>(reason: S) -> Self {
        Self::InvalidPoint {
            reason: reason.into(),
        }
    }

    /// Create a DimensionMismatch error.
    pub fn dimension_mismatch<S1, S2>(expected: S1, actual: S2) -> Self
    where
        S1: std::fmt::Display,
        S2: std::fmt::Display,
    {
        Self::DimensionMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a NumericalError with a custom reason.
    pub fn numerical_error<S: Into<String>>(reason: S) -> Self {
        Self::NumericalError {
            reason: reason.into(),
        }
    }

    /// Create an InvalidMeasurement error with a custom reason.
    pub fn invalid_measurement<S: Into<String>>(reason: S) -> Self {
        Self::InvalidMeasurement {
            reason: reason.into(),
        }
    }
}

/// Errors that can occur while configuring or running an optimizer.
#[derive(Debug, Clone, Error)]
pub enum OptimizerError {
    /// Invalid optimizer configuration.
    ///
    /// This error occurs when the solver or the staircase is configured
    /// with invalid parameters (e.g. a negative tolerance or rmax < r0).
    #[error("Invalid optimizer configuration: {reason}")]
    InvalidConfiguration {
        /// Description of the configuration error
        reason: String,
        /// Name of the invalid parameter
        parameter: String,
        /// Value that was invalid
        value: String,
    },

    /// Propagated manifold error.
    #[error("Manifold operation failed: {0}")]
    ManifoldError(#[from] ManifoldError),
}

impl OptimizerError {
    /// Create an InvalidConfiguration error.
    pub fn invalid_configuration<S1, S2, S3>(reason: S1, parameter: S2, value: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::InvalidConfiguration {
            reason: reason.into(),
            parameter: parameter.into(),
            value: value.into(),
        }
    }
}

/// Result type alias for operations that can produce ManifoldError.
pub type Result<T> = std::result::Result<T, ManifoldError>;

/// Result type alias for optimizer operations.
pub type OptimizerResult<T> = std::result::Result<T, OptimizerError>;

//! Core traits and types for the SE-Sync Riemannian Staircase.
//!
//! This crate provides the abstractions shared by the solver, the problem
//! implementation and the staircase controller.
//!
//! # Modules
//!
//! - [`callback`]: Per-iteration callbacks for the trust-region solver
//! - [`error`]: Error types for manifold operations and optimization
//! - [`executor`]: Thread-pool executor for block-wise kernels
//! - [`lanczos`]: Minimum eigenpair of symmetric operators
//! - [`preconditioner`]: Preconditioner interface
//! - [`problem`]: Objective and problem interfaces driven by the staircase
//! - [`types`]: Type aliases and numerical constants

pub mod callback;
pub mod error;
pub mod executor;
pub mod lanczos;
pub mod preconditioner;
pub mod problem;
pub mod types;

// Re-export commonly used items at the crate root
pub use error::{ManifoldError, OptimizerError, OptimizerResult, Result};

/// Prelude module for convenient imports.
///
/// # Example
/// ```
/// use sesync_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::callback::{IterateRecorder, IterationCallback, IterationInfo};
    pub use crate::error::{ManifoldError, OptimizerError, OptimizerResult, Result};
    pub use crate::executor::KernelExecutor;
    pub use crate::lanczos::{minimum_eigenpair, EigenResult};
    pub use crate::preconditioner::{Preconditioner, PreconditionerKind};
    pub use crate::problem::{Certificate, ManifoldProblem, RiemannianObjective};
    pub use crate::types::{Matrix, Vector};
}

//! # SE-Sync
//!
//! Certifiably correct pose-graph optimization with the Riemannian Staircase.
//!
//! Given noisy relative pose measurements, SE-Sync solves a semidefinite
//! relaxation of maximum-likelihood pose-graph optimization through a
//! sequence of low-rank Riemannian optimizations. Each rank-restricted
//! solution is checked with a minimum-eigenvalue certificate; when the
//! certificate holds, the rounded estimate comes with a bound on its
//! suboptimality, and when it fails the iterate is a saddle point that is
//! escaped into the next rank.
//!
//! ## Crate Organization
//!
//! - [`sesync_core`]: Interfaces, errors, callbacks and the Lanczos eigen-solver
//! - [`sesync_problem`]: The SE-Sync relaxation of a measurement set
//! - [`sesync_optim`]: The Riemannian trust-region solver
//! - this crate: The staircase controller, saddle escape and results
//!
//! ## Quick Start
//!
//! ```rust
//! use sesync::prelude::*;
//!
//! let measurements = vec![
//!     RelativePoseMeasurement::planar(0, 1, 0.1, [1.0, 0.0], 10.0, 10.0),
//!     RelativePoseMeasurement::planar(1, 2, 0.1, [1.0, 0.0], 10.0, 10.0),
//!     RelativePoseMeasurement::planar(2, 0, -0.2, [-2.0, 0.0], 10.0, 10.0),
//! ];
//!
//! let options = SESyncOptions::new()
//!     .with_staircase(StaircaseOptions::new().with_ranks(3, 5))
//!     .with_num_threads(1);
//! let result = sesync(&measurements, &options, None)?;
//!
//! println!("status: {}, suboptimality bound: {:e}", result.status, result.suboptimality_bound);
//! # Ok::<(), sesync::OptimizerError>(())
//! ```

pub mod escape;
pub mod options;
pub mod result;
pub mod staircase;

pub use sesync_core;
pub use sesync_optim;
pub use sesync_problem;

pub use escape::{escape_saddle, EscapeOutcome};
pub use options::{InitializationMethod, SESyncOptions, StaircaseOptions};
pub use result::{EscapeRecord, StaircaseResult, StaircaseStatus};
pub use staircase::Staircase;

pub use sesync_core::{ManifoldError, OptimizerError, OptimizerResult};

use sesync_core::types::Matrix;
use sesync_problem::{RelativePoseMeasurement, SESyncProblem};

/// Builds the SE-Sync problem for `measurements` and runs the staircase.
///
/// `initial_point`, when given, must be an `r0 x k` point of the manifold
/// for the configured formulation.
pub fn sesync(
    measurements: &[RelativePoseMeasurement],
    options: &SESyncOptions,
    initial_point: Option<Matrix>,
) -> OptimizerResult<StaircaseResult> {
    options.validate()?;
    let mut problem = SESyncProblem::new(measurements, options.problem.clone())?;
    Staircase::new(options.staircase.clone()).run(&mut problem, initial_point)
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        escape_saddle, sesync, EscapeOutcome, EscapeRecord, InitializationMethod, SESyncOptions,
        Staircase, StaircaseOptions, StaircaseResult, StaircaseStatus,
    };
    pub use sesync_core::prelude::*;
    pub use sesync_optim::{TerminationReason, TrustRegion, TrustRegionConfig};
    pub use sesync_problem::{
        Formulation, ProblemConfig, RelativePoseMeasurement, SESyncProblem,
    };
}

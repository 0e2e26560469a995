//! SE-Sync Problem - the pose-graph relaxation driven by the staircase.
//!
//! This crate turns a list of relative pose measurements into the
//! rank-restricted semidefinite relaxation used by SE-Sync and implements
//! [`ManifoldProblem`](sesync_core::problem::ManifoldProblem) for it.
//!
//! # Modules
//!
//! - [`measurement`]: Relative pose measurements and graph validation
//! - [`data_matrices`]: Connection Laplacians and the reduced quadratic form
//! - [`stiefel_product`]: Geometry of the product of Stiefel manifolds
//! - [`preconditioner`]: Jacobi and regularized Cholesky preconditioners
//! - [`config`]: Problem construction options
//! - [`problem`]: [`SESyncProblem`]
//!
//! # Example
//!
//! ```rust
//! use sesync_core::problem::{ManifoldProblem, RiemannianObjective};
//! use sesync_problem::{ProblemConfig, RelativePoseMeasurement, SESyncProblem};
//!
//! let measurements = vec![
//!     RelativePoseMeasurement::planar(0, 1, 0.0, [1.0, 0.0], 1.0, 1.0),
//!     RelativePoseMeasurement::planar(1, 2, 0.0, [1.0, 0.0], 1.0, 1.0),
//! ];
//! let problem = SESyncProblem::new(&measurements, ProblemConfig::new().with_num_threads(1))?;
//! let y = problem.chordal_initialization()?;
//! assert!(problem.evaluate_objective(&y)? < 1e-10);
//! # Ok::<(), sesync_core::OptimizerError>(())
//! ```

pub mod config;
pub mod data_matrices;
pub mod measurement;
pub mod preconditioner;
pub mod problem;
pub mod stiefel_product;

pub use config::{Formulation, ProblemConfig};
pub use data_matrices::DataMatrices;
pub use measurement::{validate_measurements, GraphSummary, RelativePoseMeasurement};
pub use preconditioner::{JacobiPreconditioner, RegularizedCholeskyPreconditioner};
pub use problem::SESyncProblem;
pub use stiefel_product::StiefelProduct;

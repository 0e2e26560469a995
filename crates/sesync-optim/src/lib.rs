//! SE-Sync Optimization - Riemannian trust-region solver.
//!
//! This crate provides the fixed-rank local solver used at every step of the
//! Riemannian Staircase: a truncated-Newton trust-region method with a
//! preconditioned Steihaug-Toint conjugate gradient inner solver.
//!
//! # Examples
//!
//! ```rust
//! use sesync_optim::{TrustRegion, TrustRegionConfig};
//!
//! let solver = TrustRegion::new(
//!     TrustRegionConfig::new()
//!         .with_gradient_tolerance(1e-6)
//!         .with_max_iterations(500),
//! );
//! assert_eq!(solver.config().max_iterations, 500);
//!
//! // Run optimization (problem and initial_point defined elsewhere)
//! // let result = solver.solve(&problem, &initial_point, None, None)?;
//! ```

pub mod trust_region;

pub use trust_region::{TerminationReason, TrustRegion, TrustRegionConfig, TrustRegionResult};

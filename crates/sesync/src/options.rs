//! Options for the Riemannian Staircase and the `sesync` entry point.

use sesync_core::{
    error::{OptimizerError, OptimizerResult},
    preconditioner::PreconditionerKind,
};
use sesync_optim::TrustRegionConfig;
use sesync_problem::{Formulation, ProblemConfig};
use std::time::Duration;

/// How the staircase obtains its first iterate when none is supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InitializationMethod {
    /// Chordal relaxation of the rotation subproblem
    #[default]
    Chordal,
    /// Random point of the manifold
    Random,
}

/// Configuration of the Riemannian Staircase.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StaircaseOptions {
    /// Initial relaxation rank
    pub r0: usize,
    /// Maximum relaxation rank
    pub rmax: usize,
    /// Gradient norm stopping tolerance of each rank-restricted solve
    pub grad_norm_tol: f64,
    /// Relative function decrease stopping tolerance
    pub rel_func_decrease_tol: f64,
    /// Step size stopping tolerance
    pub stepsize_tol: f64,
    /// Maximum trust-region iterations per rank
    pub max_iterations: usize,
    /// Maximum truncated CG iterations per trust-region iteration
    pub max_tcg_iterations: usize,
    /// Optional wall-clock limit for each rank-restricted solve
    pub max_time: Option<Duration>,
    /// Certificate tolerance: lambda_min > -min_eig_num_tol certifies optimality
    pub min_eig_num_tol: f64,
    /// Maximum eigen-solver restarts
    pub max_eig_iterations: usize,
    /// Krylov basis size of the eigen-solver
    pub num_lanczos_vectors: usize,
    /// Initialization used when no initial iterate is supplied
    pub initialization: InitializationMethod,
    /// Whether to keep every accepted iterate of every solve
    pub log_iterates: bool,
}

impl Default for StaircaseOptions {
    fn default() -> Self {
        Self {
            r0: 5,
            rmax: 10,
            grad_norm_tol: 1e-2,
            rel_func_decrease_tol: 1e-5,
            stepsize_tol: 1e-3,
            max_iterations: 1000,
            max_tcg_iterations: 10000,
            max_time: None,
            min_eig_num_tol: 1e-5,
            max_eig_iterations: 10000,
            num_lanczos_vectors: 20,
            initialization: InitializationMethod::Chordal,
            log_iterates: false,
        }
    }
}

impl StaircaseOptions {
    /// Creates options with the SE-Sync defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial and maximum relaxation ranks.
    pub fn with_ranks(mut self, r0: usize, rmax: usize) -> Self {
        self.r0 = r0;
        self.rmax = rmax;
        self
    }

    /// Sets the gradient norm tolerance.
    pub fn with_grad_norm_tol(mut self, tol: f64) -> Self {
        self.grad_norm_tol = tol;
        self
    }

    /// Sets the relative function decrease tolerance.
    pub fn with_rel_func_decrease_tol(mut self, tol: f64) -> Self {
        self.rel_func_decrease_tol = tol;
        self
    }

    /// Sets the step size tolerance.
    pub fn with_stepsize_tol(mut self, tol: f64) -> Self {
        self.stepsize_tol = tol;
        self
    }

    /// Sets the per-rank trust-region iteration budget.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the truncated CG iteration budget.
    pub fn with_max_tcg_iterations(mut self, max_tcg_iterations: usize) -> Self {
        self.max_tcg_iterations = max_tcg_iterations;
        self
    }

    /// Sets a per-rank wall-clock limit.
    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }

    /// Sets the certificate tolerance.
    pub fn with_min_eig_num_tol(mut self, tol: f64) -> Self {
        self.min_eig_num_tol = tol;
        self
    }

    /// Sets the eigen-solver restart budget.
    pub fn with_max_eig_iterations(mut self, max_eig_iterations: usize) -> Self {
        self.max_eig_iterations = max_eig_iterations;
        self
    }

    /// Sets the Krylov basis size.
    pub fn with_num_lanczos_vectors(mut self, num_lanczos_vectors: usize) -> Self {
        self.num_lanczos_vectors = num_lanczos_vectors;
        self
    }

    /// Sets the initialization method.
    pub fn with_initialization(mut self, initialization: InitializationMethod) -> Self {
        self.initialization = initialization;
        self
    }

    /// Enables or disables iterate logging.
    pub fn with_log_iterates(mut self, log_iterates: bool) -> Self {
        self.log_iterates = log_iterates;
        self
    }

    /// Checks that every option is admissible.
    pub fn validate(&self) -> OptimizerResult<()> {
        if self.r0 < 1 {
            return Err(OptimizerError::invalid_configuration(
                "initial rank must be at least 1",
                "r0",
                self.r0.to_string(),
            ));
        }
        if self.rmax < self.r0 {
            return Err(OptimizerError::invalid_configuration(
                format!("maximum rank must be at least r0 = {}", self.r0),
                "rmax",
                self.rmax.to_string(),
            ));
        }
        let positive = [
            ("grad_norm_tol", self.grad_norm_tol),
            ("min_eig_num_tol", self.min_eig_num_tol),
        ];
        for (name, value) in positive {
            if !(value > 0.0) || !value.is_finite() {
                return Err(OptimizerError::invalid_configuration(
                    "must be positive and finite",
                    name,
                    value.to_string(),
                ));
            }
        }
        let nonnegative = [
            ("rel_func_decrease_tol", self.rel_func_decrease_tol),
            ("stepsize_tol", self.stepsize_tol),
        ];
        for (name, value) in nonnegative {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(OptimizerError::invalid_configuration(
                    "must be nonnegative and finite",
                    name,
                    value.to_string(),
                ));
            }
        }
        if self.num_lanczos_vectors < 1 {
            return Err(OptimizerError::invalid_configuration(
                "at least one Lanczos vector is required",
                "num_lanczos_vectors",
                "0",
            ));
        }
        Ok(())
    }

    /// Trust-region configuration for each rank-restricted solve.
    pub fn trust_region_config(&self) -> TrustRegionConfig {
        let mut config = TrustRegionConfig::new()
            .with_gradient_tolerance(self.grad_norm_tol)
            .with_relative_decrease_tolerance(self.rel_func_decrease_tol)
            .with_stepsize_tolerance(self.stepsize_tol)
            .with_max_iterations(self.max_iterations)
            .with_max_tcg_iterations(self.max_tcg_iterations);
        if let Some(max_time) = self.max_time {
            config = config.with_max_time(max_time);
        }
        config
    }
}

/// Options of the [`sesync`](crate::sesync) entry point.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SESyncOptions {
    /// Staircase options
    pub staircase: StaircaseOptions,
    /// Problem construction options
    pub problem: ProblemConfig,
}

impl SESyncOptions {
    /// Creates options with the SE-Sync defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the staircase options.
    pub fn with_staircase(mut self, staircase: StaircaseOptions) -> Self {
        self.staircase = staircase;
        self
    }

    /// Sets the problem formulation.
    pub fn with_formulation(mut self, formulation: Formulation) -> Self {
        self.problem.formulation = formulation;
        self
    }

    /// Sets the preconditioner.
    pub fn with_preconditioner(mut self, preconditioner: PreconditionerKind) -> Self {
        self.problem.preconditioner = preconditioner;
        self
    }

    /// Sets the kernel thread count.
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.problem.num_threads = num_threads;
        self
    }

    /// Sets the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.problem.seed = seed;
        self
    }

    /// Checks both option groups.
    pub fn validate(&self) -> OptimizerResult<()> {
        self.staircase.validate()?;
        self.problem.validate()
    }
}

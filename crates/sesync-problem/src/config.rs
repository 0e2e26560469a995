//! Problem construction options.

use sesync_core::{
    error::{OptimizerError, OptimizerResult},
    preconditioner::PreconditionerKind,
};

/// Which quadratic form the relaxation optimizes over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Formulation {
    /// Translations eliminated analytically; iterates are r x dn.
    #[default]
    Simplified,
    /// Translations kept as explicit variables; iterates are r x (n + dn).
    Explicit,
}

impl Formulation {
    /// Human-readable description used in log output.
    pub fn description(&self) -> &'static str {
        match self {
            Formulation::Simplified => "simplified (translations eliminated)",
            Formulation::Explicit => "explicit (translations retained)",
        }
    }
}

/// Configuration of an [`SESyncProblem`](crate::SESyncProblem).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProblemConfig {
    /// Problem formulation
    pub formulation: Formulation,
    /// Preconditioner used by the trust-region subproblem
    pub preconditioner: PreconditionerKind,
    /// Number of threads for block-wise kernels
    pub num_threads: usize,
    /// Seed for random sampling and the eigen-solver start vector
    pub seed: u64,
}

impl Default for ProblemConfig {
    fn default() -> Self {
        Self {
            formulation: Formulation::default(),
            preconditioner: PreconditionerKind::default(),
            num_threads: num_cpus::get().max(1),
            seed: 0,
        }
    }
}

impl ProblemConfig {
    /// Creates a configuration with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the formulation.
    pub fn with_formulation(mut self, formulation: Formulation) -> Self {
        self.formulation = formulation;
        self
    }

    /// Sets the preconditioner.
    pub fn with_preconditioner(mut self, preconditioner: PreconditionerKind) -> Self {
        self.preconditioner = preconditioner;
        self
    }

    /// Sets the kernel thread count.
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Sets the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Checks the configuration.
    pub fn validate(&self) -> OptimizerResult<()> {
        if self.num_threads == 0 {
            return Err(OptimizerError::invalid_configuration(
                "at least one thread is required",
                "num_threads",
                "0",
            ));
        }
        Ok(())
    }
}

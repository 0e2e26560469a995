//! Per-iteration callbacks for the trust-region solver.
//!
//! Callbacks observe every outer trust-region iteration and may request an
//! early stop. The staircase uses [`IterateRecorder`] to keep the sequence
//! of iterates when iterate logging is enabled.

use crate::{error::Result, types::Matrix};
use std::time::Duration;

/// Information passed to callbacks after each trust-region iteration.
#[derive(Debug)]
pub struct IterationInfo<'a> {
    /// Outer iteration index (starting at 0)
    pub iteration: usize,
    /// Elapsed time since the solve started
    pub elapsed: Duration,
    /// Current iterate (after the accept/reject decision)
    pub point: &'a Matrix,
    /// Objective value at `point`
    pub value: f64,
    /// Riemannian gradient norm at `point`
    pub gradient_norm: f64,
    /// Trust-region radius used for this iteration
    pub radius: f64,
    /// Inner truncated-CG iterations spent on this step
    pub inner_iterations: usize,
    /// The proposed step
    pub step: &'a Matrix,
    /// Actual decrease of the objective produced by the proposed step
    pub decrease: f64,
    /// Ratio of actual to predicted reduction
    pub rho: f64,
    /// Whether the step was accepted
    pub accepted: bool,
}

/// Trait for trust-region callbacks.
pub trait IterationCallback {
    /// Called before the first iteration.
    fn on_optimization_start(&mut self, initial_point: &Matrix) -> Result<()> {
        let _ = initial_point;
        Ok(())
    }

    /// Called at the end of each iteration.
    ///
    /// Returns `true` to continue optimization, `false` to stop early.
    fn on_iteration_end(&mut self, info: &IterationInfo<'_>) -> Result<bool>;
}

/// Records the sequence of iterates visited by the solver.
#[derive(Debug, Default, Clone)]
pub struct IterateRecorder {
    iterates: Vec<Matrix>,
}

impl IterateRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded iterates, in visiting order.
    pub fn iterates(&self) -> &[Matrix] {
        &self.iterates
    }

    /// Consumes the recorder, returning the recorded iterates.
    pub fn into_iterates(self) -> Vec<Matrix> {
        self.iterates
    }
}

impl IterationCallback for IterateRecorder {
    fn on_optimization_start(&mut self, initial_point: &Matrix) -> Result<()> {
        self.iterates.push(initial_point.clone());
        Ok(())
    }

    fn on_iteration_end(&mut self, info: &IterationInfo<'_>) -> Result<bool> {
        if info.accepted {
            self.iterates.push(info.point.clone());
        }
        Ok(true)
    }
}

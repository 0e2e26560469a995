//! Outcome of a Riemannian Staircase run.

use sesync_core::types::{Matrix, Vector};
use sesync_optim::TerminationReason;
use std::fmt;
use std::time::Duration;

/// Why the staircase stopped.
///
/// Every status carries a usable rounded estimate; only
/// [`GlobalOptimum`](StaircaseStatus::GlobalOptimum) comes with a
/// certificate of global optimality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StaircaseStatus {
    /// The certificate matrix is positive semidefinite up to tolerance.
    GlobalOptimum,
    /// The minimum-eigenvalue computation did not converge.
    EigenvalueImprecise,
    /// No acceptable step away from a saddle point was found.
    SaddleEscapeFailed,
    /// A saddle point was found at the maximum relaxation rank.
    RankLimitReached,
}

impl StaircaseStatus {
    /// Whether the returned solution is certified globally optimal.
    pub fn is_certified(&self) -> bool {
        matches!(self, StaircaseStatus::GlobalOptimum)
    }
}

impl fmt::Display for StaircaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StaircaseStatus::GlobalOptimum => "global optimum",
            StaircaseStatus::EigenvalueImprecise => "eigenvalue computation imprecise",
            StaircaseStatus::SaddleEscapeFailed => "saddle escape failed",
            StaircaseStatus::RankLimitReached => "rank limit reached",
        };
        f.write_str(text)
    }
}

/// One saddle escape attempt.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EscapeRecord {
    /// Rank of the saddle point
    pub from_rank: usize,
    /// Minimum eigenvalue of the certificate at the saddle
    pub lambda_min: f64,
    /// Objective value at the saddle
    pub saddle_value: f64,
    /// Objective value at the accepted point, if any
    pub escaped_value: Option<f64>,
    /// Last step size tried (the accepted one on success)
    pub step_size: f64,
    /// Number of step sizes tried
    pub trials: usize,
}

impl EscapeRecord {
    /// Whether the escape produced a point at rank `from_rank + 1`.
    pub fn succeeded(&self) -> bool {
        self.escaped_value.is_some()
    }
}

/// Everything recorded during a staircase run.
///
/// Per-rank vectors are indexed by the position of the rank in
/// [`ranks`](Self::ranks).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StaircaseResult {
    /// Termination status
    pub status: StaircaseStatus,
    /// Final iterate of the relaxation
    pub y_opt: Matrix,
    /// Relaxation objective F(Y_opt)
    pub sdp_value: f64,
    /// Riemannian gradient norm at Y_opt
    pub gradient_norm: f64,
    /// Minimum eigenvalue of the last converged certificate
    pub lambda_min: Option<f64>,
    /// Eigenvector for `lambda_min`
    pub v_min: Option<Vector>,
    /// Rounded pose estimate [t | R] (d x (n + dn))
    pub xhat: Matrix,
    /// Objective of the original problem at `xhat`
    pub rounded_value: f64,
    /// `rounded_value - sdp_value`
    pub suboptimality_bound: f64,
    /// Relaxation ranks visited, in order
    pub ranks: Vec<usize>,
    /// Objective trace of the solve at each rank
    pub function_values: Vec<Vec<f64>>,
    /// Gradient norm trace of the solve at each rank
    pub gradient_norms: Vec<Vec<f64>>,
    /// Trust-region termination reason at each rank
    pub termination_reasons: Vec<TerminationReason>,
    /// Wall-clock time of the solve at each rank
    pub elapsed_optimization_times: Vec<Duration>,
    /// Minimum eigenvalue at each rank whose certificate converged
    pub minimum_eigenvalues: Vec<f64>,
    /// Time spent computing each converged certificate
    pub minimum_eigenvalue_computation_times: Vec<Duration>,
    /// Saddle escape attempts
    pub escapes: Vec<EscapeRecord>,
    /// Accepted iterates of every solve (empty unless iterate logging is on)
    pub iterates: Vec<Matrix>,
    /// Time spent building the initial iterate
    pub initialization_time: Duration,
    /// Total wall-clock time of the run
    pub total_computation_time: Duration,
}

impl StaircaseResult {
    /// Rank of the final iterate.
    pub fn final_rank(&self) -> usize {
        self.y_opt.nrows()
    }

    /// Whether the solution is certified globally optimal.
    pub fn is_certified(&self) -> bool {
        self.status.is_certified()
    }

    /// Relative suboptimality bound `(F(xhat) - F(Y_opt)) / F(Y_opt)`.
    pub fn relative_suboptimality_bound(&self) -> f64 {
        self.suboptimality_bound / self.sdp_value.abs().max(f64::EPSILON)
    }
}

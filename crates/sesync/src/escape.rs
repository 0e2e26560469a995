//! Escaping saddle points by increasing the relaxation rank.
//!
//! A critical point `Y` of the rank-`r` relaxation whose certificate matrix
//! has a negative eigenvalue `lambda_min` with eigenvector `v_min` is a
//! saddle point. Lifting `Y` to rank `r + 1` by a zero row makes
//! `Ydot = [0; v_min^T]` a second-order descent direction, and a short
//! backtracking search along it produces a point from which the next
//! rank-restricted solve can make progress.

use log::debug;
use sesync_core::{
    error::{ManifoldError, Result},
    problem::RiemannianObjective,
    types::{shape_of, Matrix, Vector},
};

/// Scale of the first trial step, relative to `grad_norm_tol / |lambda_min|`.
pub const INITIAL_STEP_SCALE: f64 = 200.0;

/// Smallest step size tried before giving up.
pub const MIN_STEP_SIZE: f64 = 1e-6;

/// Result of a saddle escape attempt.
#[derive(Debug, Clone)]
pub enum EscapeOutcome {
    /// An acceptable rank-(r + 1) point was found.
    Escaped {
        /// The accepted point
        point: Matrix,
        /// Objective value at `point`
        value: f64,
        /// Accepted step size
        step_size: f64,
        /// Number of step sizes tried
        trials: usize,
    },
    /// Every step size down to [`MIN_STEP_SIZE`] was rejected.
    Failed {
        /// Number of step sizes tried
        trials: usize,
        /// Smallest step size tried
        last_step_size: f64,
    },
}

/// Searches for a descent step out of the saddle point `y`.
///
/// A trial point is accepted when it strictly decreases the objective and
/// its Riemannian gradient norm exceeds `grad_norm_tol`, so that the next
/// solve does not stop immediately. The search is deterministic.
pub fn escape_saddle<O>(
    objective: &O,
    y: &Matrix,
    lambda_min: f64,
    v_min: &Vector,
    grad_norm_tol: f64,
) -> Result<EscapeOutcome>
where
    O: RiemannianObjective + ?Sized,
{
    if !lambda_min.is_finite() || lambda_min >= 0.0 {
        return Err(ManifoldError::numerical_error(format!(
            "saddle escape requires a negative finite eigenvalue, got {lambda_min}"
        )));
    }
    if !(grad_norm_tol > 0.0) || !grad_norm_tol.is_finite() {
        return Err(ManifoldError::numerical_error(format!(
            "saddle escape requires a positive gradient tolerance, got {grad_norm_tol}"
        )));
    }
    let (r, k) = y.shape();
    if v_min.len() != k {
        return Err(ManifoldError::dimension_mismatch(
            format!("eigenvector of length {k} for iterate {}", shape_of(y)),
            v_min.len(),
        ));
    }

    let saddle_value = objective.evaluate_objective(y)?;

    let mut y_aug = Matrix::zeros(r + 1, k);
    y_aug.rows_mut(0, r).copy_from(y);
    let mut direction = Matrix::zeros(r + 1, k);
    direction.row_mut(r).copy_from(&v_min.transpose());

    let mut step_size = INITIAL_STEP_SCALE * grad_norm_tol / lambda_min.abs();
    let mut trials = 0;
    loop {
        step_size /= 2.0;
        trials += 1;

        let candidate = objective.retract(&y_aug, &(&direction * step_size))?;
        let value = objective.evaluate_objective(&candidate)?;
        if value < saddle_value {
            let gradient = objective.riemannian_gradient(&candidate)?;
            let gradient_norm = objective.inner_product(&candidate, &gradient, &gradient).sqrt();
            debug!(
                "Escape trial {trials}: alpha = {step_size:.3e}, F = {value:.6e} (saddle {saddle_value:.6e}), |g| = {gradient_norm:.3e}"
            );
            if gradient_norm > grad_norm_tol {
                return Ok(EscapeOutcome::Escaped {
                    point: candidate,
                    value,
                    step_size,
                    trials,
                });
            }
        } else {
            debug!(
                "Escape trial {trials}: alpha = {step_size:.3e}, F = {value:.6e} does not decrease {saddle_value:.6e}"
            );
        }

        if step_size <= MIN_STEP_SIZE {
            return Ok(EscapeOutcome::Failed {
                trials,
                last_step_size: step_size,
            });
        }
    }
}

//! Riemannian truncated-Newton trust-region optimizer.
//!
//! Trust region methods use a local quadratic model of the objective within a
//! "trust region" where the model is assumed to be accurate. This is the
//! solver used for every fixed-rank subproblem of the Riemannian Staircase.
//!
//! # Algorithm Overview
//!
//! At each iteration, the trust region method:
//! 1. Builds the quadratic model m(s) = f + <g, s> + 0.5 <s, H s> in the
//!    tangent space, with H the Riemannian Hessian
//! 2. Approximately minimizes the model within the radius using a
//!    preconditioned Steihaug-Toint truncated conjugate gradient method
//! 3. Retracts the step and evaluates the actual vs predicted reduction
//! 4. Accepts or rejects the step and updates the radius
//!
//! Accepted steps never increase the objective.
//!
//! # References
//!
//! - Absil et al., "Trust-Region Methods on Riemannian Manifolds" (2007)
//! - Conn et al., "Trust Region Methods" (2000)
//! - Nocedal & Wright, "Numerical Optimization" (2006)

use log::{debug, trace};
use sesync_core::{
    callback::{IterationCallback, IterationInfo},
    error::{ManifoldError, OptimizerError, OptimizerResult, Result},
    preconditioner::Preconditioner,
    problem::RiemannianObjective,
    types::Matrix,
};
use std::time::{Duration, Instant};

/// Configuration for the Trust Region optimizer.
#[derive(Debug, Clone)]
pub struct TrustRegionConfig {
    /// Stopping tolerance for the norm of the Riemannian gradient
    pub gradient_tolerance: f64,
    /// Stopping tolerance for the relative decrease of an accepted step
    pub relative_decrease_tolerance: f64,
    /// Stopping tolerance for the norm of an accepted step
    pub stepsize_tolerance: f64,
    /// Maximum number of outer iterations
    pub max_iterations: usize,
    /// Maximum number of truncated CG iterations per outer iteration
    pub max_tcg_iterations: usize,
    /// Optional wall-clock limit
    pub max_time: Option<Duration>,
    /// Initial trust region radius
    pub initial_radius: f64,
    /// Maximum trust region radius
    pub max_radius: f64,
    /// Minimum trust region radius (below this, the algorithm terminates)
    pub min_radius: f64,
    /// Ratio threshold for accepting a step (eta in literature)
    pub acceptance_ratio: f64,
    /// Ratio threshold for increasing the trust region (typically 0.75)
    pub increase_threshold: f64,
    /// Ratio threshold for decreasing the trust region (typically 0.25)
    pub decrease_threshold: f64,
    /// Factor for increasing the trust region radius (typically 2.0)
    pub increase_factor: f64,
    /// Factor for decreasing the trust region radius (typically 0.25)
    pub decrease_factor: f64,
    /// Exponent of the superlinear tCG residual target
    pub theta: f64,
    /// Linear factor of the tCG residual target
    pub kappa: f64,
    /// Regularization of the reduction ratio near convergence
    pub rho_regularization: f64,
}

impl Default for TrustRegionConfig {
    fn default() -> Self {
        Self {
            gradient_tolerance: 1e-2,
            relative_decrease_tolerance: 1e-5,
            stepsize_tolerance: 1e-3,
            max_iterations: 1000,
            max_tcg_iterations: 10000,
            max_time: None,
            initial_radius: 1.0,
            max_radius: 1e4,
            min_radius: 1e-10,
            acceptance_ratio: 0.1,
            increase_threshold: 0.75,
            decrease_threshold: 0.25,
            increase_factor: 2.0,
            decrease_factor: 0.25,
            theta: 1.0,
            kappa: 0.1,
            rho_regularization: 1e3,
        }
    }
}

impl TrustRegionConfig {
    /// Creates a new configuration with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the gradient norm stopping tolerance.
    pub fn with_gradient_tolerance(mut self, tol: f64) -> Self {
        self.gradient_tolerance = tol;
        self
    }

    /// Sets the relative decrease stopping tolerance.
    pub fn with_relative_decrease_tolerance(mut self, tol: f64) -> Self {
        self.relative_decrease_tolerance = tol;
        self
    }

    /// Sets the step size stopping tolerance.
    pub fn with_stepsize_tolerance(mut self, tol: f64) -> Self {
        self.stepsize_tolerance = tol;
        self
    }

    /// Sets the maximum number of outer iterations.
    pub fn with_max_iterations(mut self, max_iter: usize) -> Self {
        self.max_iterations = max_iter;
        self
    }

    /// Sets the maximum tCG iterations.
    pub fn with_max_tcg_iterations(mut self, max_iter: usize) -> Self {
        self.max_tcg_iterations = max_iter;
        self
    }

    /// Sets a wall-clock limit.
    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }

    /// Sets the initial trust region radius.
    pub fn with_initial_radius(mut self, radius: f64) -> Self {
        self.initial_radius = radius;
        self
    }

    /// Sets the maximum trust region radius.
    pub fn with_max_radius(mut self, radius: f64) -> Self {
        self.max_radius = radius;
        self
    }

    /// Sets the minimum trust region radius.
    pub fn with_min_radius(mut self, radius: f64) -> Self {
        self.min_radius = radius;
        self
    }

    /// Sets the acceptance ratio threshold.
    pub fn with_acceptance_ratio(mut self, ratio: f64) -> Self {
        self.acceptance_ratio = ratio;
        self
    }

    /// Checks that every parameter is in its admissible range.
    pub fn validate(&self) -> OptimizerResult<()> {
        let nonnegative = [
            ("gradient_tolerance", self.gradient_tolerance),
            ("relative_decrease_tolerance", self.relative_decrease_tolerance),
            ("stepsize_tolerance", self.stepsize_tolerance),
            ("min_radius", self.min_radius),
        ];
        for (name, value) in nonnegative {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(OptimizerError::invalid_configuration(
                    "must be finite and nonnegative",
                    name,
                    value.to_string(),
                ));
            }
        }
        if !(self.initial_radius > 0.0) || self.initial_radius > self.max_radius {
            return Err(OptimizerError::invalid_configuration(
                "must be positive and at most max_radius",
                "initial_radius",
                self.initial_radius.to_string(),
            ));
        }
        if !(self.acceptance_ratio >= 0.0 && self.acceptance_ratio < self.increase_threshold) {
            return Err(OptimizerError::invalid_configuration(
                "must lie in [0, increase_threshold)",
                "acceptance_ratio",
                self.acceptance_ratio.to_string(),
            ));
        }
        if !(self.decrease_factor > 0.0 && self.decrease_factor < 1.0) {
            return Err(OptimizerError::invalid_configuration(
                "must lie in (0, 1)",
                "decrease_factor",
                self.decrease_factor.to_string(),
            ));
        }
        if !(self.increase_factor > 1.0) {
            return Err(OptimizerError::invalid_configuration(
                "must be greater than 1",
                "increase_factor",
                self.increase_factor.to_string(),
            ));
        }
        Ok(())
    }
}

/// Reason the trust-region solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TerminationReason {
    /// Riemannian gradient norm fell below the tolerance
    GradientNorm,
    /// Relative decrease of an accepted step fell below the tolerance
    RelativeDecrease,
    /// Norm of an accepted step fell below the tolerance
    StepSize,
    /// Outer iteration budget exhausted
    MaxIterations,
    /// Wall-clock limit exceeded
    MaxTime,
    /// Trust region radius shrank below its minimum
    RadiusCollapsed,
    /// The iteration callback requested early termination
    CallbackRequest,
}

/// Outcome of a trust-region solve.
#[derive(Debug, Clone)]
pub struct TrustRegionResult {
    /// Final iterate
    pub point: Matrix,
    /// Objective value at `point`
    pub value: f64,
    /// Riemannian gradient norm at `point`
    pub gradient_norm: f64,
    /// Objective value after every outer iteration (first entry: initial value)
    pub objective_values: Vec<f64>,
    /// Gradient norm after every outer iteration (first entry: initial norm)
    pub gradient_norms: Vec<f64>,
    /// Wall-clock time spent in the solve
    pub elapsed: Duration,
    /// Number of outer iterations performed
    pub iterations: usize,
    /// Total number of truncated CG iterations
    pub inner_iterations: usize,
    /// Why the solver stopped
    pub termination_reason: TerminationReason,
}

/// Radius bookkeeping of the outer loop.
#[derive(Debug)]
struct TrustRegionState {
    /// Current trust region radius
    radius: f64,
    /// Number of rejected steps in a row
    consecutive_rejections: usize,
}

impl TrustRegionState {
    fn new(initial_radius: f64) -> Self {
        Self {
            radius: initial_radius,
            consecutive_rejections: 0,
        }
    }

    /// Updates the trust region radius based on the reduction ratio.
    fn update_radius(&mut self, ratio: f64, boundary_hit: bool, config: &TrustRegionConfig) {
        if ratio < config.decrease_threshold {
            // Poor agreement: shrink trust region
            self.radius *= config.decrease_factor;
        } else if ratio > config.increase_threshold && boundary_hit {
            // Good agreement at the boundary: expand trust region
            self.radius = (self.radius * config.increase_factor).min(config.max_radius);
        }
    }

    fn record_step(&mut self, accepted: bool) {
        if accepted {
            self.consecutive_rejections = 0;
        } else {
            self.consecutive_rejections += 1;
        }
    }
}

/// Why the inner solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TcgStop {
    NegativeCurvature,
    ExceededRadius,
    ResidualReached,
    MaxIterations,
    ZeroResidual,
}

impl TcgStop {
    fn hit_boundary(self) -> bool {
        matches!(self, TcgStop::NegativeCurvature | TcgStop::ExceededRadius)
    }
}

/// Output of the truncated CG inner solver.
#[derive(Debug)]
struct TcgOutput {
    step: Matrix,
    hessian_step: Matrix,
    iterations: usize,
    stop: TcgStop,
}

/// Preconditioned Steihaug-Toint truncated CG for the trust region subproblem.
///
/// Solves approximately
/// min_s  m(s) = f + <g, s> + 0.5 <s, H s>
/// s.t.   ||s||_P <= Delta
///
/// where `s` is in the tangent space and `||.||_P` is the norm induced by
/// the preconditioner (the Riemannian norm when there is none).
struct SteihaugToint;

impl SteihaugToint {
    #[allow(clippy::too_many_arguments)]
    fn solve<O>(
        objective: &O,
        point: &Matrix,
        nabla_f: &Matrix,
        gradient: &Matrix,
        gradient_norm: f64,
        radius: f64,
        preconditioner: Option<&dyn Preconditioner>,
        config: &TrustRegionConfig,
    ) -> Result<TcgOutput>
    where
        O: RiemannianObjective + ?Sized,
    {
        let inner = |a: &Matrix, b: &Matrix| objective.inner_product(point, a, b);
        let precondition = |r: &Matrix| -> Result<Matrix> {
            match preconditioner {
                Some(p) => p.apply(point, r),
                None => Ok(r.clone()),
            }
        };

        let (rows, cols) = point.shape();
        let mut step = Matrix::zeros(rows, cols);
        let mut hessian_step = Matrix::zeros(rows, cols);

        let mut residual = gradient.clone();
        let mut z = precondition(&residual)?;
        let mut z_r = inner(&z, &residual);
        let mut direction = -&z;

        // <s, P s>, <s, P d>, <d, P d>
        let mut s_ps = 0.0;
        let mut s_pd = 0.0;
        let mut d_pd = z_r;
        let radius_sq = radius * radius;

        let target = gradient_norm * gradient_norm.powf(config.theta).min(config.kappa);

        for j in 0..config.max_tcg_iterations {
            if !(z_r > 0.0) {
                return Ok(TcgOutput {
                    step,
                    hessian_step,
                    iterations: j,
                    stop: TcgStop::ZeroResidual,
                });
            }

            let hd = objective.hessian_vector_product(point, nabla_f, &direction)?;
            let curvature = inner(&direction, &hd);
            let alpha = z_r / curvature;
            let s_ps_new = s_ps + 2.0 * alpha * s_pd + alpha * alpha * d_pd;

            if curvature <= 0.0 || s_ps_new >= radius_sq {
                // Move to the boundary along the current direction.
                let tau = (-s_pd + (s_pd * s_pd + d_pd * (radius_sq - s_ps)).max(0.0).sqrt()) / d_pd;
                step += &direction * tau;
                hessian_step += &hd * tau;
                let stop = if curvature <= 0.0 {
                    TcgStop::NegativeCurvature
                } else {
                    TcgStop::ExceededRadius
                };
                return Ok(TcgOutput {
                    step,
                    hessian_step,
                    iterations: j + 1,
                    stop,
                });
            }

            step += &direction * alpha;
            hessian_step += &hd * alpha;
            s_ps = s_ps_new;

            residual += &hd * alpha;
            let residual_norm = inner(&residual, &residual).sqrt();
            if residual_norm <= target {
                return Ok(TcgOutput {
                    step,
                    hessian_step,
                    iterations: j + 1,
                    stop: TcgStop::ResidualReached,
                });
            }

            z = precondition(&residual)?;
            let z_r_new = inner(&z, &residual);
            let beta = z_r_new / z_r;
            z_r = z_r_new;

            direction = &direction * beta - &z;
            s_pd = beta * (s_pd + alpha * d_pd);
            d_pd = z_r + beta * beta * d_pd;
        }

        Ok(TcgOutput {
            step,
            hessian_step,
            iterations: config.max_tcg_iterations,
            stop: TcgStop::MaxIterations,
        })
    }
}

/// Trust Region optimizer for embedded Riemannian manifolds.
#[derive(Debug, Clone)]
pub struct TrustRegion {
    config: TrustRegionConfig,
}

impl TrustRegion {
    /// Creates a new Trust Region optimizer with the given configuration.
    pub fn new(config: TrustRegionConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &TrustRegionConfig {
        &self.config
    }

    /// Returns the optimizer name.
    pub fn name(&self) -> &str {
        "Riemannian Trust Region"
    }

    /// Minimizes `objective` starting from `initial_point`.
    ///
    /// The preconditioner and the callback are optional; `None` selects the
    /// identity preconditioner and disables per-iteration observation.
    pub fn solve<O>(
        &self,
        objective: &O,
        initial_point: &Matrix,
        preconditioner: Option<&dyn Preconditioner>,
        mut callback: Option<&mut dyn IterationCallback>,
    ) -> OptimizerResult<TrustRegionResult>
    where
        O: RiemannianObjective + ?Sized,
    {
        self.config.validate()?;
        let config = &self.config;
        let start_time = Instant::now();

        let mut point = initial_point.clone();
        let mut value = objective.evaluate_objective(&point)?;
        if !value.is_finite() {
            return Err(ManifoldError::numerical_error("objective is not finite at the initial point").into());
        }
        let mut nabla_f = objective.euclidean_gradient(&point)?;
        let mut gradient = objective.riemannian_gradient_from_euclidean(&point, &nabla_f)?;
        let mut gradient_norm = objective.inner_product(&point, &gradient, &gradient).sqrt();

        let mut objective_values = vec![value];
        let mut gradient_norms = vec![gradient_norm];
        let mut state = TrustRegionState::new(config.initial_radius);
        let mut iterations = 0;
        let mut inner_iterations = 0;

        if let Some(cb) = callback.as_deref_mut() {
            cb.on_optimization_start(&point)?;
        }

        let termination_reason = loop {
            if gradient_norm < config.gradient_tolerance {
                break TerminationReason::GradientNorm;
            }
            if iterations >= config.max_iterations {
                break TerminationReason::MaxIterations;
            }
            if config.max_time.is_some_and(|limit| start_time.elapsed() >= limit) {
                break TerminationReason::MaxTime;
            }
            if state.radius < config.min_radius {
                break TerminationReason::RadiusCollapsed;
            }

            let radius = state.radius;
            let tcg = SteihaugToint::solve(
                objective,
                &point,
                &nabla_f,
                &gradient,
                gradient_norm,
                radius,
                preconditioner,
                config,
            )?;
            inner_iterations += tcg.iterations;

            let step_norm = objective.inner_product(&point, &tcg.step, &tcg.step).sqrt();
            let model_change = objective.inner_product(&point, &gradient, &tcg.step)
                + 0.5 * objective.inner_product(&point, &tcg.step, &tcg.hessian_step);

            let trial = objective.retract(&point, &tcg.step)?;
            let trial_value = objective.evaluate_objective(&trial)?;
            let decrease = value - trial_value;

            // Regularized ratio of actual to predicted reduction
            let reg = value.abs().max(1.0) * f64::EPSILON * config.rho_regularization;
            let rho_num = decrease + reg;
            let rho_den = -model_change + reg;
            let rho = if rho_den > 0.0 && trial_value.is_finite() {
                rho_num / rho_den
            } else {
                f64::NEG_INFINITY
            };

            let accepted = rho >= config.acceptance_ratio && trial_value <= value;
            state.update_radius(rho, tcg.stop.hit_boundary(), config);
            state.record_step(accepted);
            iterations += 1;

            trace!(
                "TR iter {iterations}: f = {value:.6e}, |g| = {gradient_norm:.3e}, \
                 radius = {radius:.3e}, tCG iters = {}, ({:?}), rho = {rho:.3e}, accepted = {accepted}",
                tcg.iterations,
                tcg.stop
            );

            let previous_value = value;
            if accepted {
                point = trial;
                value = trial_value;
                nabla_f = objective.euclidean_gradient(&point)?;
                gradient = objective.riemannian_gradient_from_euclidean(&point, &nabla_f)?;
                gradient_norm = objective.inner_product(&point, &gradient, &gradient).sqrt();
            }
            objective_values.push(value);
            gradient_norms.push(gradient_norm);

            if let Some(cb) = callback.as_deref_mut() {
                let info = IterationInfo {
                    iteration: iterations - 1,
                    elapsed: start_time.elapsed(),
                    point: &point,
                    value,
                    gradient_norm,
                    radius,
                    inner_iterations: tcg.iterations,
                    step: &tcg.step,
                    decrease,
                    rho,
                    accepted,
                };
                if !cb.on_iteration_end(&info)? {
                    break TerminationReason::CallbackRequest;
                }
            }

            if accepted {
                let relative_decrease = decrease / (previous_value.abs() + f64::EPSILON);
                if relative_decrease < config.relative_decrease_tolerance {
                    break TerminationReason::RelativeDecrease;
                }
                if step_norm < config.stepsize_tolerance {
                    break TerminationReason::StepSize;
                }
            }
        };

        let elapsed = start_time.elapsed();
        debug!(
            "Trust region finished after {iterations} iterations ({inner_iterations} tCG): \
             f = {value:.6e}, |g| = {gradient_norm:.3e}, reason = {termination_reason:?}, \
             rejections in a row = {}",
            state.consecutive_rejections
        );

        Ok(TrustRegionResult {
            point,
            value,
            gradient_norm,
            objective_values,
            gradient_norms,
            elapsed,
            iterations,
            inner_iterations,
            termination_reason,
        })
    }
}

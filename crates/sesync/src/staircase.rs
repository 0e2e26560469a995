//! The Riemannian Staircase controller.
//!
//! Solves a sequence of rank-restricted relaxations of increasing rank.
//! After each solve the optimality certificate is checked; a certified
//! iterate ends the run, a saddle point is escaped into the next rank.
//!
//! ```text
//! INITIALIZING -> SOLVING(r0)
//! SOLVING(r)    -> CERTIFYING(r)
//! CERTIFYING(r) -> DONE(GlobalOptimum) | DONE(EigenvalueImprecise)
//!                | DONE(RankLimitReached) | ESCAPING(r)
//! ESCAPING(r)   -> SOLVING(r + 1) | DONE(SaddleEscapeFailed)
//! ```

use crate::{
    escape::{escape_saddle, EscapeOutcome},
    options::{InitializationMethod, StaircaseOptions},
    result::{EscapeRecord, StaircaseResult, StaircaseStatus},
};
use log::{debug, info, warn};
use sesync_core::{
    callback::{IterateRecorder, IterationCallback},
    error::{ManifoldError, OptimizerResult},
    problem::ManifoldProblem,
    types::{shape_of, Matrix, Vector},
};
use sesync_optim::TrustRegion;
use std::time::{Duration, Instant};

/// Riemannian Staircase driver.
#[derive(Debug, Clone)]
pub struct Staircase {
    options: StaircaseOptions,
}

impl Staircase {
    /// Creates a staircase with the given options.
    pub fn new(options: StaircaseOptions) -> Self {
        Self { options }
    }

    /// Returns the options.
    pub fn options(&self) -> &StaircaseOptions {
        &self.options
    }

    /// Runs the staircase on `problem`.
    ///
    /// `initial_point`, when given, must be an `r0 x k` point of the manifold
    /// and is used verbatim; otherwise the configured initialization is
    /// computed at rank `r0`. The problem's relaxation rank is left at the
    /// final rank.
    pub fn run<P>(&self, problem: &mut P, initial_point: Option<Matrix>) -> OptimizerResult<StaircaseResult>
    where
        P: ManifoldProblem + ?Sized,
    {
        self.options.validate()?;
        let options = &self.options;
        let total_start = Instant::now();

        info!(
            "Riemannian Staircase: r0 = {}, rmax = {}, grad_norm_tol = {:e}, rel_func_decrease_tol = {:e}, \
             stepsize_tol = {:e}, max_iterations = {}, max_tcg_iterations = {}, min_eig_num_tol = {:e}, \
             max_eig_iterations = {}, num_lanczos_vectors = {}",
            options.r0,
            options.rmax,
            options.grad_norm_tol,
            options.rel_func_decrease_tol,
            options.stepsize_tol,
            options.max_iterations,
            options.max_tcg_iterations,
            options.min_eig_num_tol,
            options.max_eig_iterations,
            options.num_lanczos_vectors
        );

        // INITIALIZING
        problem.set_relaxation_rank(options.r0)?;
        let init_start = Instant::now();
        let mut y = match initial_point {
            Some(y0) => {
                let expected = (options.r0, problem.embedding_dimension());
                if y0.shape() != expected {
                    return Err(ManifoldError::dimension_mismatch(
                        format!("({}, {})", expected.0, expected.1),
                        shape_of(&y0),
                    )
                    .into());
                }
                info!("Using user-supplied initial iterate");
                y0
            }
            None => match options.initialization {
                InitializationMethod::Chordal => {
                    info!("Computing chordal initialization");
                    problem.chordal_initialization()?
                }
                InitializationMethod::Random => {
                    info!("Sampling random initialization");
                    problem.random_sample()?
                }
            },
        };
        let initialization_time = init_start.elapsed();
        info!("Initialization finished in {:.3} s", initialization_time.as_secs_f64());
        debug!("State: INITIALIZING -> SOLVING({})", options.r0);

        let solver = TrustRegion::new(options.trust_region_config());

        let mut ranks = Vec::new();
        let mut function_values = Vec::new();
        let mut gradient_norms = Vec::new();
        let mut termination_reasons = Vec::new();
        let mut elapsed_optimization_times = Vec::new();
        let mut minimum_eigenvalues = Vec::new();
        let mut minimum_eigenvalue_computation_times: Vec<Duration> = Vec::new();
        let mut escapes = Vec::new();
        let mut iterates = Vec::new();
        let mut lambda_min: Option<f64> = None;
        let mut v_min: Option<Vector> = None;

        let mut rank = options.r0;
        let (status, y_opt, sdp_value, gradient_norm) = loop {
            // SOLVING(r)
            problem.set_relaxation_rank(rank)?;
            info!("Solving Riemannian optimization problem at rank {rank}");

            let mut recorder = options.log_iterates.then(IterateRecorder::new);
            let callback = recorder.as_mut().map(|r| r as &mut dyn IterationCallback);
            let solve = solver.solve(&*problem, &y, problem.preconditioner(), callback)?;

            info!(
                "Rank {rank}: {} iterations ({} tCG) in {:.3} s, F = {:.6e}, |grad F| = {:.3e}, stop: {:?}",
                solve.iterations,
                solve.inner_iterations,
                solve.elapsed.as_secs_f64(),
                solve.value,
                solve.gradient_norm,
                solve.termination_reason
            );

            ranks.push(rank);
            function_values.push(solve.objective_values);
            gradient_norms.push(solve.gradient_norms);
            termination_reasons.push(solve.termination_reason);
            elapsed_optimization_times.push(solve.elapsed);
            if let Some(recorder) = recorder {
                iterates.extend(recorder.into_iterates());
            }
            let y_opt = solve.point;

            // CERTIFYING(r)
            debug!("State: SOLVING({rank}) -> CERTIFYING({rank})");
            let eig_start = Instant::now();
            let certificate = problem.compute_certificate_min_eig(
                &y_opt,
                options.max_eig_iterations,
                options.min_eig_num_tol,
                options.num_lanczos_vectors,
            )?;
            let eig_time = eig_start.elapsed();

            if !certificate.converged {
                warn!(
                    "Minimum eigenvalue computation did not converge after {} iterations (estimate {:.6e})",
                    certificate.iterations, certificate.lambda_min
                );
                debug!("State: CERTIFYING({rank}) -> DONE(EigenvalueImprecise)");
                break (
                    StaircaseStatus::EigenvalueImprecise,
                    y_opt,
                    solve.value,
                    solve.gradient_norm,
                );
            }

            info!(
                "Minimum eigenvalue {:.6e} computed in {:.3} s ({} iterations)",
                certificate.lambda_min,
                eig_time.as_secs_f64(),
                certificate.iterations
            );
            minimum_eigenvalues.push(certificate.lambda_min);
            minimum_eigenvalue_computation_times.push(eig_time);
            lambda_min = Some(certificate.lambda_min);

            if certificate.lambda_min > -options.min_eig_num_tol {
                info!("Found global optimum at rank {rank}");
                debug!("State: CERTIFYING({rank}) -> DONE(GlobalOptimum)");
                v_min = Some(certificate.v_min);
                break (
                    StaircaseStatus::GlobalOptimum,
                    y_opt,
                    solve.value,
                    solve.gradient_norm,
                );
            }

            if rank + 1 > options.rmax {
                warn!(
                    "Saddle point at the maximum rank {rank} (lambda_min = {:.6e})",
                    certificate.lambda_min
                );
                debug!("State: CERTIFYING({rank}) -> DONE(RankLimitReached)");
                v_min = Some(certificate.v_min);
                break (
                    StaircaseStatus::RankLimitReached,
                    y_opt,
                    solve.value,
                    solve.gradient_norm,
                );
            }

            // ESCAPING(r)
            debug!("State: CERTIFYING({rank}) -> ESCAPING({rank})");
            info!(
                "Saddle point detected (lambda_min = {:.6e}); escaping to rank {}",
                certificate.lambda_min,
                rank + 1
            );
            let outcome = escape_saddle(
                &*problem,
                &y_opt,
                certificate.lambda_min,
                &certificate.v_min,
                options.grad_norm_tol,
            )?;
            v_min = Some(certificate.v_min);

            match outcome {
                EscapeOutcome::Escaped {
                    point,
                    value,
                    step_size,
                    trials,
                } => {
                    info!("Escaped with step size {step_size:.3e} after {trials} trial(s), F = {value:.6e}");
                    escapes.push(EscapeRecord {
                        from_rank: rank,
                        lambda_min: certificate.lambda_min,
                        saddle_value: solve.value,
                        escaped_value: Some(value),
                        step_size,
                        trials,
                    });
                    debug!("State: ESCAPING({rank}) -> SOLVING({})", rank + 1);
                    y = point;
                    rank += 1;
                }
                EscapeOutcome::Failed {
                    trials,
                    last_step_size,
                } => {
                    warn!("Saddle escape failed after {trials} trial(s), last step size {last_step_size:.3e}");
                    escapes.push(EscapeRecord {
                        from_rank: rank,
                        lambda_min: certificate.lambda_min,
                        saddle_value: solve.value,
                        escaped_value: None,
                        step_size: last_step_size,
                        trials,
                    });
                    debug!("State: ESCAPING({rank}) -> DONE(SaddleEscapeFailed)");
                    break (
                        StaircaseStatus::SaddleEscapeFailed,
                        y_opt,
                        solve.value,
                        solve.gradient_norm,
                    );
                }
            }
        };

        // Rounding
        let xhat = problem.round_solution(&y_opt)?;
        let rounded_value = problem.evaluate_rounded_objective(&xhat)?;
        let suboptimality_bound = rounded_value - sdp_value;
        let total_computation_time = total_start.elapsed();

        info!(
            "Staircase finished ({status}) at rank {} in {:.3} s: F(Y) = {sdp_value:.6e}, \
             F(xhat) = {rounded_value:.6e}, suboptimality bound = {suboptimality_bound:.6e}",
            y_opt.nrows(),
            total_computation_time.as_secs_f64()
        );

        Ok(StaircaseResult {
            status,
            y_opt,
            sdp_value,
            gradient_norm,
            lambda_min,
            v_min,
            xhat,
            rounded_value,
            suboptimality_bound,
            ranks,
            function_values,
            gradient_norms,
            termination_reasons,
            elapsed_optimization_times,
            minimum_eigenvalues,
            minimum_eigenvalue_computation_times,
            escapes,
            iterates,
            initialization_time,
            total_computation_time,
        })
    }
}

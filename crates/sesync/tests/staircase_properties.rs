//! Structural properties of staircase runs and of the saddle escape.

mod common;

use common::*;
use nalgebra::DVector;
use proptest::prelude::*;
use sesync::prelude::*;

#[test]
fn test_objective_traces_are_monotone() {
    let measurements = noisy_planar_graph(10, 0.1, 9);
    let mut p = problem(&measurements, ProblemConfig::new());
    p.set_relaxation_rank(2).unwrap();
    let y0 = p.random_sample().unwrap();

    let result = Staircase::new(tight_options(2, 6)).run(&mut p, Some(y0)).unwrap();
    for trace in &result.function_values {
        for pair in trace.windows(2) {
            assert!(pair[1] <= pair[0], "objective increased: {} -> {}", pair[0], pair[1]);
        }
    }
    assert_eq!(result.function_values.len(), result.ranks.len());
    assert_eq!(result.gradient_norms.len(), result.ranks.len());
    assert_eq!(result.termination_reasons.len(), result.ranks.len());
}

#[test]
fn test_rank_grows_by_one_per_escape() {
    let mut p = problem(&identity_cycle(), ProblemConfig::new());
    let result = Staircase::new(tight_options(2, 6))
        .run(&mut p, Some(reflected_saddle()))
        .unwrap();

    for pair in result.ranks.windows(2) {
        assert_eq!(pair[1], pair[0] + 1);
    }
    let successful = result.escapes.iter().filter(|e| e.succeeded()).count();
    assert_eq!(result.ranks.len(), successful + 1);
    for (escape, &rank) in result.escapes.iter().zip(&result.ranks) {
        assert_eq!(escape.from_rank, rank);
    }
}

#[test]
fn test_certified_results_have_nonnegative_bound() {
    for seed in 0..3 {
        let options = SESyncOptions::new()
            .with_staircase(tight_options(3, 8))
            .with_num_threads(1);
        let result = sesync(&noisy_planar_graph(9, 0.05, seed), &options, None).unwrap();
        if result.is_certified() {
            assert!(result.suboptimality_bound >= -1e-6, "seed {seed}: {}", result.suboptimality_bound);
        }
    }
}

/// A problem whose objective is constant, so every saddle escape fails.
#[derive(Debug)]
struct FlatProblem {
    rank: usize,
    columns: usize,
}

impl RiemannianObjective for FlatProblem {
    fn evaluate_objective(&self, _y: &Matrix) -> Result<f64> {
        Ok(1.0)
    }

    fn euclidean_gradient(&self, y: &Matrix) -> Result<Matrix> {
        Ok(Matrix::zeros(y.nrows(), y.ncols()))
    }

    fn riemannian_gradient_from_euclidean(&self, _y: &Matrix, nabla_f: &Matrix) -> Result<Matrix> {
        Ok(nabla_f.clone())
    }

    fn hessian_vector_product(&self, _y: &Matrix, _nabla_f: &Matrix, ydot: &Matrix) -> Result<Matrix> {
        Ok(Matrix::zeros(ydot.nrows(), ydot.ncols()))
    }

    fn retract(&self, y: &Matrix, ydot: &Matrix) -> Result<Matrix> {
        Ok(y + ydot)
    }
}

impl ManifoldProblem for FlatProblem {
    fn set_relaxation_rank(&mut self, rank: usize) -> Result<()> {
        self.rank = rank;
        Ok(())
    }

    fn relaxation_rank(&self) -> usize {
        self.rank
    }

    fn embedding_dimension(&self) -> usize {
        self.columns
    }

    fn chordal_initialization(&self) -> Result<Matrix> {
        Ok(Matrix::from_element(self.rank, self.columns, 1.0))
    }

    fn random_sample(&self) -> Result<Matrix> {
        self.chordal_initialization()
    }

    fn compute_certificate_min_eig(&self, _y: &Matrix, _: usize, _: f64, _: usize) -> Result<Certificate> {
        Ok(Certificate {
            converged: true,
            lambda_min: -1.0,
            v_min: DVector::from_element(self.columns, 1.0 / (self.columns as f64).sqrt()),
            iterations: 1,
        })
    }

    fn round_solution(&self, y: &Matrix) -> Result<Matrix> {
        Ok(y.rows(0, 1).into_owned())
    }

    fn evaluate_rounded_objective(&self, _xhat: &Matrix) -> Result<f64> {
        Ok(1.0)
    }
}

#[test]
fn test_failed_escape_is_reported() {
    let mut p = FlatProblem { rank: 0, columns: 4 };
    let result = Staircase::new(StaircaseOptions::new().with_ranks(2, 5))
        .run(&mut p, None)
        .unwrap();

    assert_eq!(result.status, StaircaseStatus::SaddleEscapeFailed);
    assert_eq!(result.ranks, vec![2]);
    assert_eq!(result.escapes.len(), 1);
    let escape = &result.escapes[0];
    assert!(!escape.succeeded());
    // 200 * 1e-2 / 1 = 2, halved until <= 1e-6
    assert_eq!(escape.trials, 21);
    assert_eq!(result.final_rank(), 2);
    assert_eq!(result.suboptimality_bound, 0.0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_escape_is_deterministic_and_lifts_rank(angle in -3.0f64..3.0, reflect in any::<bool>()) {
        // Rotating (and possibly reflecting) the saddle gives another saddle
        // of the same value and spectrum.
        let mut g = rot2(angle);
        if reflect {
            let mut row = g.row_mut(0);
            row.neg_mut();
        }
        let y = &g * reflected_saddle();

        let p = problem(&identity_cycle(), ProblemConfig::new());
        let cert = p.compute_certificate_min_eig(&y, 100, 1e-10, 20).unwrap();
        prop_assert!((cert.lambda_min + 3.0).abs() < 1e-8);

        let first = escape_saddle(&p, &y, cert.lambda_min, &cert.v_min, 1e-6).unwrap();
        let second = escape_saddle(&p, &y, cert.lambda_min, &cert.v_min, 1e-6).unwrap();
        match (first, second) {
            (
                EscapeOutcome::Escaped { point: a, value: fa, step_size: sa, trials: ta },
                EscapeOutcome::Escaped { point: b, value: fb, step_size: sb, trials: tb },
            ) => {
                prop_assert_eq!(&a, &b);
                prop_assert_eq!(fa, fb);
                prop_assert_eq!(sa, sb);
                prop_assert_eq!(ta, tb);
                prop_assert_eq!(a.nrows(), 3);
                prop_assert!(fa < 8.0);
                prop_assert!(p.geometry().check_point(&a).is_ok());
            }
            other => prop_assert!(false, "escape failed: {:?}", other),
        }
    }
}

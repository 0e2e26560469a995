//! Integration tests for the SE-Sync problem.
//!
//! These tests check the differential geometry (gradient and Hessian against
//! finite differences), the optimality certificate against a dense
//! eigendecomposition, and the initialization and rounding procedures.

use approx::assert_relative_eq;
use pretty_assertions::assert_eq;
use nalgebra::{DVector, Rotation3, Vector3};
use proptest::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;
use sesync_core::{
    preconditioner::PreconditionerKind,
    problem::{ManifoldProblem, RiemannianObjective},
    types::Matrix,
};
use sesync_problem::{Formulation, ProblemConfig, RelativePoseMeasurement, SESyncProblem};

fn rot2(theta: f64) -> Matrix {
    let (s, c) = theta.sin_cos();
    Matrix::from_row_slice(2, 2, &[c, -s, s, c])
}

/// Measurements generated from ground truth poses, optionally perturbed.
fn measurements_from_poses(
    rotations: &[Matrix],
    translations: &[DVector<f64>],
    edges: &[(usize, usize)],
    noise: f64,
    rng: &mut StdRng,
) -> Vec<RelativePoseMeasurement> {
    edges
        .iter()
        .map(|&(i, j)| {
            let d = rotations[i].nrows();
            let r_ij = rotations[i].transpose() * &rotations[j];
            let t_ij = rotations[i].transpose() * (&translations[j] - &translations[i]);
            let perturbation = Matrix::from_fn(d, d, |_, _| noise * rng.sample::<f64, _>(StandardNormal));
            let rotation = sesync_problem::stiefel_product::project_to_rotation(&(r_ij + perturbation))
                .unwrap();
            let translation = t_ij + DVector::from_fn(d, |_, _| noise * rng.sample::<f64, _>(StandardNormal));
            RelativePoseMeasurement::new(i, j, rotation, translation, 5.0, 2.0)
        })
        .collect()
}

fn planar_graph(noise: f64, seed: u64) -> Vec<RelativePoseMeasurement> {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = 5;
    let rotations: Vec<Matrix> = (0..n).map(|i| rot2(0.4 * i as f64 - 0.3)).collect();
    let translations: Vec<DVector<f64>> = (0..n)
        .map(|i| DVector::from_column_slice(&[(i as f64).cos() * 2.0, (i as f64).sin() * 2.0]))
        .collect();
    let edges = [(0, 1), (1, 2), (2, 3), (3, 4), (4, 0), (0, 2), (1, 3)];
    measurements_from_poses(&rotations, &translations, &edges, noise, &mut rng)
}

fn spatial_graph(noise: f64, seed: u64) -> Vec<RelativePoseMeasurement> {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = 4;
    let rotations: Vec<Matrix> = (0..n)
        .map(|i| {
            let axis = Vector3::new(0.3 * i as f64, -0.2, 0.5 + 0.1 * i as f64);
            let r = Rotation3::from_scaled_axis(axis);
            Matrix::from_iterator(3, 3, r.matrix().iter().cloned())
        })
        .collect();
    let translations: Vec<DVector<f64>> = (0..n)
        .map(|i| DVector::from_column_slice(&[i as f64, (i * i) as f64 * 0.3, -0.5 * i as f64]))
        .collect();
    let edges = [(0, 1), (1, 2), (2, 3), (3, 0), (0, 2)];
    measurements_from_poses(&rotations, &translations, &edges, noise, &mut rng)
}

fn problem(measurements: &[RelativePoseMeasurement], formulation: Formulation) -> SESyncProblem {
    let config = ProblemConfig::new()
        .with_formulation(formulation)
        .with_preconditioner(PreconditionerKind::None)
        .with_num_threads(1)
        .with_seed(17);
    SESyncProblem::new(measurements, config).unwrap()
}

fn random_tangent(p: &SESyncProblem, y: &Matrix, rng: &mut StdRng) -> Matrix {
    let v = Matrix::from_fn(y.nrows(), y.ncols(), |_, _| rng.sample::<f64, _>(StandardNormal));
    let t = p.geometry().project_tangent(y, &v).unwrap();
    let norm = t.norm();
    t / norm
}

#[test]
fn test_gradient_matches_finite_differences() {
    for formulation in [Formulation::Simplified, Formulation::Explicit] {
        let p = {
            let mut p = problem(&planar_graph(0.1, 1), formulation);
            p.set_relaxation_rank(4).unwrap();
            p
        };
        let mut rng = StdRng::seed_from_u64(2);
        let y = p.random_sample().unwrap();
        let v = random_tangent(&p, &y, &mut rng);

        let h = 1e-6;
        let f_plus = p.evaluate_objective(&p.retract(&y, &(&v * h)).unwrap()).unwrap();
        let f_minus = p.evaluate_objective(&p.retract(&y, &(&v * -h)).unwrap()).unwrap();
        let directional = (f_plus - f_minus) / (2.0 * h);

        let grad = p.riemannian_gradient(&y).unwrap();
        assert_relative_eq!(grad.dot(&v), directional, epsilon = 1e-5, max_relative = 1e-5);
    }
}

#[test]
fn test_hessian_matches_second_order_finite_differences() {
    for formulation in [Formulation::Simplified, Formulation::Explicit] {
        let mut p = problem(&spatial_graph(0.05, 3), formulation);
        p.set_relaxation_rank(5).unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        let y = p.random_sample().unwrap();
        let v = random_tangent(&p, &y, &mut rng);

        let h = 1e-4;
        let f0 = p.evaluate_objective(&y).unwrap();
        let f_plus = p.evaluate_objective(&p.retract(&y, &(&v * h)).unwrap()).unwrap();
        let f_minus = p.evaluate_objective(&p.retract(&y, &(&v * -h)).unwrap()).unwrap();
        let curvature = (f_plus - 2.0 * f0 + f_minus) / (h * h);

        let nabla_f = p.euclidean_gradient(&y).unwrap();
        let hv = p.hessian_vector_product(&y, &nabla_f, &v).unwrap();
        assert_relative_eq!(hv.dot(&v), curvature, epsilon = 1e-3, max_relative = 1e-3);
    }
}

#[test]
fn test_hessian_is_symmetric_and_tangent() {
    let mut p = problem(&planar_graph(0.2, 5), Formulation::Explicit);
    p.set_relaxation_rank(3).unwrap();
    let mut rng = StdRng::seed_from_u64(6);
    let y = p.random_sample().unwrap();
    let u = random_tangent(&p, &y, &mut rng);
    let v = random_tangent(&p, &y, &mut rng);

    let nabla_f = p.euclidean_gradient(&y).unwrap();
    let hu = p.hessian_vector_product(&y, &nabla_f, &u).unwrap();
    let hv = p.hessian_vector_product(&y, &nabla_f, &v).unwrap();
    assert_relative_eq!(hu.dot(&v), u.dot(&hv), epsilon = 1e-9, max_relative = 1e-9);

    let projected = p.geometry().project_tangent(&y, &hu).unwrap();
    assert_relative_eq!(projected, hu, epsilon = 1e-10);
}

#[test]
fn test_chordal_initialization_recovers_noiseless_poses() {
    for measurements in [planar_graph(0.0, 0), spatial_graph(0.0, 0)] {
        for formulation in [Formulation::Simplified, Formulation::Explicit] {
            let mut p = problem(&measurements, formulation);
            p.set_relaxation_rank(p.dimension() + 2).unwrap();
            let y = p.chordal_initialization().unwrap();

            assert_eq!(y.nrows(), p.dimension() + 2);
            assert_eq!(y.ncols(), p.embedding_dimension());
            assert!(p.geometry().check_point(&y).is_ok());
            assert!(p.evaluate_objective(&y).unwrap().abs() < 1e-9);
            assert!(p.riemannian_gradient(&y).unwrap().norm() < 1e-8);

            let xhat = p.round_solution(&y).unwrap();
            assert!(p.evaluate_rounded_objective(&xhat).unwrap().abs() < 1e-9);
        }
    }
}

#[test]
fn test_formulations_agree_on_optimal_translations() {
    let measurements = planar_graph(0.1, 9);
    let simplified = problem(&measurements, Formulation::Simplified);
    let explicit = problem(&measurements, Formulation::Explicit);

    let rotations = simplified.chordal_rotations().unwrap();
    let f_simplified = simplified.evaluate_objective(&rotations).unwrap();

    let y_explicit = explicit.chordal_initialization().unwrap();
    let f_explicit = explicit.evaluate_objective(&y_explicit).unwrap();
    assert_relative_eq!(f_simplified, f_explicit, epsilon = 1e-9, max_relative = 1e-9);
}

#[test]
fn test_rounding_undoes_lifting_and_rotation() {
    let measurements = spatial_graph(0.0, 0);
    let mut p = problem(&measurements, Formulation::Simplified);
    let rotations = p.chordal_rotations().unwrap();

    // Embed the rank-3 solution into R^5 with a random orthogonal map
    p.set_relaxation_rank(5).unwrap();
    let mut rng = StdRng::seed_from_u64(8);
    let g = Matrix::from_fn(5, 5, |_, _| rng.sample::<f64, _>(StandardNormal));
    let q = g.qr().q();
    let mut lifted = Matrix::zeros(5, rotations.ncols());
    lifted.rows_mut(0, 3).copy_from(&rotations);
    let y = q * lifted;

    let xhat = p.round_solution(&y).unwrap();
    assert_eq!(xhat.shape(), (3, 4 + 12));
    assert!(p.evaluate_rounded_objective(&xhat).unwrap() < 1e-9);
    for i in 0..4 {
        let block = xhat.columns(4 + 3 * i, 3).into_owned();
        assert_relative_eq!(block.determinant(), 1.0, epsilon = 1e-9);
    }
}

#[test]
fn test_rounding_flips_reflected_solutions() {
    let measurements = planar_graph(0.0, 0);
    let p = problem(&measurements, Formulation::Simplified);
    let rotations = p.chordal_rotations().unwrap();

    let mut reflected = rotations.clone();
    let mut row = reflected.row_mut(1);
    row.neg_mut();

    let xhat = p.round_solution(&reflected).unwrap();
    assert!(p.evaluate_rounded_objective(&xhat).unwrap() < 1e-9);
}

#[test]
fn test_rounding_keeps_majority_orientation_for_odd_pose_count() {
    // Three poses, one reflected block. Singular vectors are only defined up
    // to sign, so the rounded orientation must not depend on them: the two
    // proper blocks decide it.
    let measurements: Vec<_> = [(0, 1), (1, 2), (2, 0)]
        .iter()
        .map(|&(i, j)| RelativePoseMeasurement::planar(i, j, 0.0, [0.0, 0.0], 1.0, 1.0))
        .collect();
    let p = problem(&measurements, Formulation::Simplified);

    let (r1, r2, r3) = (rot2(0.3), rot2(1.1), rot2(-0.7));
    let mut y = Matrix::zeros(2, 6);
    y.columns_mut(0, 2).copy_from(&r1);
    y.columns_mut(2, 2).copy_from(&r2);
    y.columns_mut(4, 2)
        .copy_from(&(&r3 * Matrix::from_diagonal(&DVector::from_column_slice(&[1.0, -0.8]))));

    for flip_first_row in [false, true] {
        let mut y = y.clone();
        if flip_first_row {
            let mut row = y.row_mut(0);
            row.neg_mut();
        }
        let xhat = p.round_solution(&y).unwrap();
        let block = |i: usize| xhat.columns(3 + 2 * i, 2).into_owned();
        for i in 0..3 {
            assert_relative_eq!(block(i).determinant(), 1.0, epsilon = 1e-12);
        }
        assert_relative_eq!(block(0).transpose() * block(1), rot2(0.8), epsilon = 1e-10);
        assert_relative_eq!(block(0).transpose() * block(2), rot2(-1.0), epsilon = 1e-10);
    }
}

#[test]
fn test_certificate_at_reflected_saddle() {
    // Planar 3-cycle with identity measurements; blocks (I, I, diag(1, -1))
    // form a critical point whose certificate has minimum eigenvalue -3.
    let measurements: Vec<_> = [(0, 1), (1, 2), (2, 0)]
        .iter()
        .map(|&(i, j)| RelativePoseMeasurement::planar(i, j, 0.0, [0.0, 0.0], 1.0, 1.0))
        .collect();
    let p = problem(&measurements, Formulation::Simplified);

    let mut y = Matrix::zeros(2, 6);
    y.view_mut((0, 0), (2, 2)).fill_with_identity();
    y.view_mut((0, 2), (2, 2)).fill_with_identity();
    y[(0, 4)] = 1.0;
    y[(1, 5)] = -1.0;

    assert!(p.riemannian_gradient(&y).unwrap().norm() < 1e-12);
    assert_relative_eq!(p.evaluate_objective(&y).unwrap(), 8.0, epsilon = 1e-12);

    let cert = p.compute_certificate_min_eig(&y, 100, 1e-8, 20).unwrap();
    assert!(cert.converged);
    assert_relative_eq!(cert.lambda_min, -3.0, epsilon = 1e-8);

    let expected = [0.0, 1.0, 0.0, 1.0, 0.0, 2.0];
    let sign = cert.v_min[5].signum();
    for (k, &e) in expected.iter().enumerate() {
        assert_relative_eq!(cert.v_min[k] * sign, e / 6.0_f64.sqrt(), epsilon = 1e-6);
    }
}

#[test]
fn test_rank_below_dimension_rejected() {
    let mut p = problem(&spatial_graph(0.0, 0), Formulation::Simplified);
    assert!(p.set_relaxation_rank(2).is_err());
    assert_eq!(p.relaxation_rank(), 3);
    p.set_relaxation_rank(4).unwrap();
    assert_eq!(p.relaxation_rank(), 4);
}

#[test]
fn test_random_sample_is_seeded() {
    let measurements = planar_graph(0.1, 0);
    let mut a = problem(&measurements, Formulation::Explicit);
    let mut b = problem(&measurements, Formulation::Explicit);
    a.set_relaxation_rank(4).unwrap();
    b.set_relaxation_rank(4).unwrap();

    let ya = a.random_sample().unwrap();
    assert_eq!(ya, b.random_sample().unwrap());
    assert_eq!(ya.shape(), (4, 5 + 10));
    assert!(a.geometry().check_point(&ya).is_ok());
}

#[test]
fn test_wrong_shape_is_an_error() {
    let p = problem(&planar_graph(0.0, 0), Formulation::Simplified);
    let bad = Matrix::zeros(2, 7);
    assert!(p.evaluate_objective(&bad).is_err());
    assert!(p.compute_certificate_min_eig(&bad, 10, 1e-6, 5).is_err());
    assert!(p.round_solution(&bad).is_err());
    assert!(p.evaluate_rounded_objective(&bad).is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_certificate_matches_dense_eigendecomposition(seed in 0u64..1000, rank in 2usize..5) {
        let mut p = problem(&planar_graph(0.2, seed), Formulation::Simplified);
        p.set_relaxation_rank(rank).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        let y = p.geometry().random_point(rank, &mut rng).unwrap();

        let s = p.certificate_matrix(&y).unwrap();
        let dense_min = s.clone().symmetric_eigen().eigenvalues.min();
        let cert = p.compute_certificate_min_eig(&y, 1000, 1e-10, 20).unwrap();

        prop_assert!(cert.converged);
        prop_assert!((cert.lambda_min - dense_min).abs() < 1e-7 * dense_min.abs().max(1.0));
        let residual = (&s * &cert.v_min - &cert.v_min * cert.lambda_min).norm();
        prop_assert!(residual < 1e-8 * cert.lambda_min.abs().max(1.0));
    }
}

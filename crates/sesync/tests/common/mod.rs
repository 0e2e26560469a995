//! Shared fixtures for the staircase integration tests.

#![allow(dead_code)]

use nalgebra::{DVector, Rotation3, Vector3};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;
use sesync::prelude::*;
use sesync_problem::stiefel_product::project_to_rotation;

pub fn rot2(theta: f64) -> Matrix {
    let (s, c) = theta.sin_cos();
    Matrix::from_row_slice(2, 2, &[c, -s, s, c])
}

pub fn rot3(axis: [f64; 3]) -> Matrix {
    let r = Rotation3::from_scaled_axis(Vector3::new(axis[0], axis[1], axis[2]));
    Matrix::from_iterator(3, 3, r.matrix().iter().cloned())
}

/// Measurements generated from ground truth poses with Gaussian noise.
pub fn measurements_from_poses(
    rotations: &[Matrix],
    translations: &[DVector<f64>],
    edges: &[(usize, usize)],
    noise: f64,
    seed: u64,
) -> Vec<RelativePoseMeasurement> {
    let mut rng = StdRng::seed_from_u64(seed);
    edges
        .iter()
        .map(|&(i, j)| {
            let d = rotations[i].nrows();
            let r_ij = rotations[i].transpose() * &rotations[j];
            let t_ij = rotations[i].transpose() * (&translations[j] - &translations[i]);
            let rotation = if noise > 0.0 {
                let perturbation =
                    Matrix::from_fn(d, d, |_, _| noise * rng.sample::<f64, _>(StandardNormal));
                project_to_rotation(&(r_ij + perturbation)).unwrap()
            } else {
                r_ij
            };
            let translation =
                t_ij + DVector::from_fn(d, |_, _| noise * rng.sample::<f64, _>(StandardNormal));
            RelativePoseMeasurement::new(i, j, rotation, translation, 20.0, 10.0)
        })
        .collect()
}

/// Noiseless planar 3-pose cycle.
pub fn planar_cycle() -> Vec<RelativePoseMeasurement> {
    let rotations = [rot2(0.0), rot2(0.9), rot2(-0.6)];
    let translations = [
        DVector::from_column_slice(&[0.0, 0.0]),
        DVector::from_column_slice(&[2.0, 0.5]),
        DVector::from_column_slice(&[1.0, 1.5]),
    ];
    measurements_from_poses(&rotations, &translations, &[(0, 1), (1, 2), (2, 0)], 0.0, 0)
}

/// Noiseless spatial 3-pose cycle.
pub fn spatial_cycle() -> Vec<RelativePoseMeasurement> {
    let rotations = [rot3([0.0, 0.0, 0.0]), rot3([0.3, -0.5, 0.2]), rot3([-0.7, 0.1, 0.9])];
    let translations = [
        DVector::from_column_slice(&[0.0, 0.0, 0.0]),
        DVector::from_column_slice(&[1.0, 0.2, -0.3]),
        DVector::from_column_slice(&[0.4, 1.1, 0.8]),
    ];
    measurements_from_poses(&rotations, &translations, &[(0, 1), (1, 2), (2, 0)], 0.0, 0)
}

/// Planar trajectory of `n` poses on a circle with odometry and loop closures.
pub fn noisy_planar_graph(n: usize, noise: f64, seed: u64) -> Vec<RelativePoseMeasurement> {
    let rotations: Vec<Matrix> = (0..n)
        .map(|i| rot2(2.0 * std::f64::consts::PI * i as f64 / n as f64))
        .collect();
    let translations: Vec<DVector<f64>> = (0..n)
        .map(|i| {
            let phi = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
            DVector::from_column_slice(&[3.0 * phi.cos(), 3.0 * phi.sin()])
        })
        .collect();
    let mut edges: Vec<(usize, usize)> = (0..n).map(|i| (i, (i + 1) % n)).collect();
    edges.extend((0..n).step_by(3).map(|i| (i, (i + n / 2) % n)));
    measurements_from_poses(&rotations, &translations, &edges, noise, seed)
}

/// Planar 3-cycle whose measurements are all identities with unit weights.
pub fn identity_cycle() -> Vec<RelativePoseMeasurement> {
    [(0, 1), (1, 2), (2, 0)]
        .iter()
        .map(|&(i, j)| RelativePoseMeasurement::planar(i, j, 0.0, [0.0, 0.0], 1.0, 1.0))
        .collect()
}

/// Rank-2 critical point of the identity cycle (simplified formulation):
/// blocks (I, I, diag(1, -1)). Its certificate has minimum eigenvalue -3.
pub fn reflected_saddle() -> Matrix {
    let mut y = Matrix::zeros(2, 6);
    y.view_mut((0, 0), (2, 2)).fill_with_identity();
    y.view_mut((0, 2), (2, 2)).fill_with_identity();
    y[(0, 4)] = 1.0;
    y[(1, 5)] = -1.0;
    y
}

pub fn problem(measurements: &[RelativePoseMeasurement], config: ProblemConfig) -> SESyncProblem {
    SESyncProblem::new(measurements, config.with_num_threads(1)).unwrap()
}

/// Options with tolerances tight enough that each rank converges fully.
pub fn tight_options(r0: usize, rmax: usize) -> StaircaseOptions {
    StaircaseOptions::new()
        .with_ranks(r0, rmax)
        .with_grad_norm_tol(1e-6)
        .with_rel_func_decrease_tol(0.0)
        .with_stepsize_tol(0.0)
}

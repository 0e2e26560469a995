//! Data matrices of the SE-Sync quadratic form.
//!
//! With the pose estimate arranged as `X = [t_1 ... t_n | R_1 ... R_n]`
//! (d x (n + dn)), the maximum-likelihood objective is
//!
//! ```text
//! sum_e kappa_e ||R_j - R_i R_ij||_F^2 + tau_e ||t_j - t_i - R_i t_ij||_2^2
//!     = tr(X M X^T),   M = [ L(W^tau)   V              ]
//!                          [ V^T        L(G^rho) + Sigma ]
//! ```
//!
//! Eliminating the translations in closed form gives the simplified
//! rotation-only matrix `Q = L(G^rho) + Sigma - V^T L(W^tau)^+ V`, and the
//! optimal translations for rotations `R` are `t = R T` with
//! `T = -V^T L(W^tau)^+`.

use crate::measurement::{validate_measurements, RelativePoseMeasurement};
use log::debug;
use nalgebra::Cholesky;
use sesync_core::{
    error::{ManifoldError, Result},
    types::Matrix,
};

/// Dense data matrices for a measurement set.
#[derive(Debug, Clone)]
pub struct DataMatrices {
    num_poses: usize,
    dimension: usize,
    /// Full quadratic form M, (n + dn) x (n + dn)
    full: Matrix,
    /// Rotational connection Laplacian L(G^rho), dn x dn
    rotation_laplacian: Matrix,
    /// Simplified quadratic form Q, dn x dn
    reduced: Matrix,
    /// Translation recovery map T, dn x n
    translation_map: Matrix,
}

impl DataMatrices {
    /// Builds the data matrices from a measurement set.
    pub fn from_measurements(measurements: &[RelativePoseMeasurement]) -> Result<Self> {
        let summary = validate_measurements(measurements)?;
        let n = summary.num_poses;
        let d = summary.dimension;
        let k = n + d * n;
        let rot = |i: usize| n + d * i;

        let mut full = Matrix::zeros(k, k);
        let mut rotation_laplacian = Matrix::zeros(d * n, d * n);

        for m in measurements {
            let (i, j) = (m.i, m.j);
            let r_ij = &m.rotation;
            let rr_t = r_ij * r_ij.transpose();

            // kappa ||R_j - R_i R_ij||^2
            let (bi, bj) = (d * i, d * j);
            let lap = &mut rotation_laplacian;
            let mut block = lap.view_mut((bj, bj), (d, d));
            block += Matrix::identity(d, d) * m.kappa;
            let mut block = lap.view_mut((bi, bi), (d, d));
            block += &rr_t * m.kappa;
            let mut block = lap.view_mut((bi, bj), (d, d));
            block -= r_ij * m.kappa;
            let mut block = lap.view_mut((bj, bi), (d, d));
            block -= r_ij.transpose() * m.kappa;

            // tau ||t_j - t_i - R_i t_ij||^2 as tau (X a)(X a)^T with sparse a
            let mut a: Vec<(usize, f64)> = Vec::with_capacity(d + 2);
            a.push((j, 1.0));
            a.push((i, -1.0));
            for c in 0..d {
                a.push((rot(i) + c, -m.translation[c]));
            }
            for &(p, vp) in &a {
                for &(q, vq) in &a {
                    full[(p, q)] += m.tau * vp * vq;
                }
            }
        }

        {
            let mut block = full.view_mut((n, n), (d * n, d * n));
            block += &rotation_laplacian;
        }

        let translation_laplacian = full.view((0, 0), (n, n)).into_owned();
        let coupling = full.view((0, n), (n, d * n)).into_owned();
        let rotation_part = full.view((n, n), (d * n, d * n)).into_owned();

        // L(W^tau)^+ = (L + 11^T/n)^{-1} - 11^T/n for a connected graph
        let ones = Matrix::from_element(n, n, 1.0 / n as f64);
        let shifted = &translation_laplacian + &ones;
        let chol = Cholesky::new(shifted).ok_or_else(|| {
            ManifoldError::numerical_error("translational Laplacian is singular; is the graph connected?")
        })?;
        let pseudo_inverse = chol.inverse() - &ones;

        let translation_map = -(coupling.transpose() * &pseudo_inverse);
        let mut reduced = rotation_part + &translation_map * &coupling;
        symmetrize(&mut reduced);

        debug!(
            "Built data matrices for {n} poses in dimension {d} from {} measurements",
            summary.num_measurements
        );

        Ok(Self {
            num_poses: n,
            dimension: d,
            full,
            rotation_laplacian,
            reduced,
            translation_map,
        })
    }

    /// Number of poses n.
    pub fn num_poses(&self) -> usize {
        self.num_poses
    }

    /// Pose dimension d.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Full quadratic form M over `[t | R]`.
    pub fn full(&self) -> &Matrix {
        &self.full
    }

    /// Simplified rotation-only quadratic form Q.
    pub fn reduced(&self) -> &Matrix {
        &self.reduced
    }

    /// Rotational connection Laplacian L(G^rho).
    pub fn rotation_laplacian(&self) -> &Matrix {
        &self.rotation_laplacian
    }

    /// Translational weight-graph Laplacian L(W^tau).
    pub fn translation_laplacian(&self) -> Matrix {
        self.full.view((0, 0), (self.num_poses, self.num_poses)).into_owned()
    }

    /// Coupling matrix V between translations and rotations.
    pub fn coupling(&self) -> Matrix {
        let n = self.num_poses;
        self.full.view((0, n), (n, self.dimension * n)).into_owned()
    }

    /// Map T such that `R T` are the optimal translations for rotations `R`.
    pub fn translation_map(&self) -> &Matrix {
        &self.translation_map
    }

    /// Optimal translations (d x n) for the rotation estimate `r` (d x dn).
    pub fn recover_translations(&self, r: &Matrix) -> Matrix {
        r * &self.translation_map
    }
}

fn symmetrize(m: &mut Matrix) {
    let t = m.transpose();
    *m += t;
    *m *= 0.5;
}

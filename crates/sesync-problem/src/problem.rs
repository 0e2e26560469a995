//! The SE-Sync rank-restricted semidefinite relaxation.
//!
//! [`SESyncProblem`] owns the data matrices of a measurement set and
//! implements [`ManifoldProblem`] on the product of Stiefel manifolds
//! St(d, r)^n (times R^{r x n} in the explicit formulation). The relaxation
//! rank `r` is the only mutable state and is changed by the staircase.

use crate::{
    config::{Formulation, ProblemConfig},
    data_matrices::DataMatrices,
    measurement::RelativePoseMeasurement,
    preconditioner::{JacobiPreconditioner, RegularizedCholeskyPreconditioner},
    stiefel_product::{project_to_rotation, StiefelProduct},
};
use log::{debug, info};
use nalgebra::{Cholesky, SVD};
use rand::{rngs::SmallRng, SeedableRng};
use sesync_core::{
    error::{ManifoldError, OptimizerResult, Result},
    executor::KernelExecutor,
    lanczos::minimum_eigenpair,
    preconditioner::{Preconditioner, PreconditionerKind},
    problem::{Certificate, ManifoldProblem, RiemannianObjective},
    types::{shape_of, Matrix},
};

/// Special Euclidean synchronization problem.
#[derive(Debug)]
pub struct SESyncProblem {
    config: ProblemConfig,
    data: DataMatrices,
    /// Q (simplified) or M (explicit)
    objective_matrix: Matrix,
    geometry: StiefelProduct,
    rank: usize,
    preconditioner: Option<Box<dyn Preconditioner + Send + Sync>>,
}

impl SESyncProblem {
    /// Builds the problem from a measurement set.
    ///
    /// The relaxation rank starts at the pose dimension d.
    pub fn new(measurements: &[RelativePoseMeasurement], config: ProblemConfig) -> OptimizerResult<Self> {
        config.validate()?;
        let data = DataMatrices::from_measurements(measurements)?;
        let n = data.num_poses();
        let d = data.dimension();

        let (objective_matrix, offset) = match config.formulation {
            Formulation::Simplified => (data.reduced().clone(), 0),
            Formulation::Explicit => (data.full().clone(), n),
        };

        let executor = KernelExecutor::new(config.num_threads)?;
        let geometry = StiefelProduct::new(n, d, offset, executor);

        let preconditioner: Option<Box<dyn Preconditioner + Send + Sync>> = match config.preconditioner {
            PreconditionerKind::None => None,
            PreconditionerKind::Jacobi => Some(Box::new(JacobiPreconditioner::new(
                &objective_matrix,
                geometry.clone(),
            )?)),
            PreconditionerKind::RegularizedCholesky => Some(Box::new(
                RegularizedCholeskyPreconditioner::new(&objective_matrix, geometry.clone())?,
            )),
        };

        info!(
            "Constructed SE-Sync problem: {n} poses in dimension {d}, {} measurements, {} formulation, {}, {} thread(s)",
            measurements.len(),
            config.formulation.description(),
            config.preconditioner.description(),
            config.num_threads
        );

        Ok(Self {
            config,
            data,
            objective_matrix,
            geometry,
            rank: d,
            preconditioner,
        })
    }

    /// Number of poses n.
    pub fn num_poses(&self) -> usize {
        self.data.num_poses()
    }

    /// Pose dimension d.
    pub fn dimension(&self) -> usize {
        self.data.dimension()
    }

    /// Problem formulation.
    pub fn formulation(&self) -> Formulation {
        self.config.formulation
    }

    /// Problem configuration.
    pub fn config(&self) -> &ProblemConfig {
        &self.config
    }

    /// Data matrices of the measurement set.
    pub fn data(&self) -> &DataMatrices {
        &self.data
    }

    /// Quadratic form optimized by the relaxation (Q or M).
    pub fn objective_matrix(&self) -> &Matrix {
        &self.objective_matrix
    }

    /// Manifold geometry of the iterates.
    pub fn geometry(&self) -> &StiefelProduct {
        &self.geometry
    }

    /// Certificate matrix S(Y) = M - Lambda(Y).
    pub fn certificate_matrix(&self, y: &Matrix) -> Result<Matrix> {
        self.geometry.check_shape(y)?;
        let ym = y * &self.objective_matrix;
        let lambda = self.geometry.sym_block_diag_product(y, &ym);

        let d = self.dimension();
        let mut s = self.objective_matrix.clone();
        for (i, block) in lambda.iter().enumerate() {
            let start = self.geometry.block_start(i);
            let mut view = s.view_mut((start, start), (d, d));
            view -= block;
        }
        Ok(s)
    }

    /// Rotation estimate (d x dn) from the chordal relaxation, pose 0 anchored at I.
    pub fn chordal_rotations(&self) -> Result<Matrix> {
        let n = self.num_poses();
        let d = self.dimension();
        let laplacian = self.data.rotation_laplacian();

        let rest = d * (n - 1);
        let l_rr = laplacian.view((d, d), (rest, rest)).into_owned();
        let l_r0 = laplacian.view((d, 0), (rest, d)).into_owned();
        let chol = Cholesky::new(l_rr).ok_or_else(|| {
            ManifoldError::numerical_error("anchored connection Laplacian is not positive definite")
        })?;
        let x_rest = -chol.solve(&l_r0);

        let mut rotations = Matrix::zeros(d, d * n);
        rotations.view_mut((0, 0), (d, d)).fill_with_identity();
        for i in 1..n {
            let block = x_rest.view((d * (i - 1), 0), (d, d)).transpose();
            rotations
                .view_mut((0, d * i), (d, d))
                .copy_from(&project_to_rotation(&block)?);
        }
        Ok(rotations)
    }

    /// Assembles `[t | R]` for a rotation estimate with optimal translations.
    fn pose_estimate(&self, rotations: &Matrix) -> Matrix {
        let n = self.num_poses();
        let d = self.dimension();
        let translations = self.data.recover_translations(rotations);
        let mut xhat = Matrix::zeros(d, n + d * n);
        xhat.columns_mut(0, n).copy_from(&translations);
        xhat.columns_mut(n, d * n).copy_from(rotations);
        xhat
    }

    /// Rank-d point of the manifold for a rotation estimate.
    fn point_from_rotations(&self, rotations: &Matrix) -> Matrix {
        match self.config.formulation {
            Formulation::Simplified => rotations.clone(),
            Formulation::Explicit => self.pose_estimate(rotations),
        }
    }

    /// Pads `x` (d x k) with zero rows up to `rank` rows.
    fn lift(&self, x: &Matrix, rank: usize) -> Matrix {
        let mut y = Matrix::zeros(rank, x.ncols());
        y.rows_mut(0, x.nrows()).copy_from(x);
        y
    }
}

impl RiemannianObjective for SESyncProblem {
    fn evaluate_objective(&self, y: &Matrix) -> Result<f64> {
        self.geometry.check_shape(y)?;
        Ok((y * &self.objective_matrix).dot(y))
    }

    fn euclidean_gradient(&self, y: &Matrix) -> Result<Matrix> {
        self.geometry.check_shape(y)?;
        Ok(y * &self.objective_matrix * 2.0)
    }

    fn riemannian_gradient_from_euclidean(&self, y: &Matrix, nabla_f: &Matrix) -> Result<Matrix> {
        self.geometry.project_tangent(y, nabla_f)
    }

    fn hessian_vector_product(&self, y: &Matrix, nabla_f: &Matrix, ydot: &Matrix) -> Result<Matrix> {
        self.geometry.check_shape(ydot)?;
        let lambda = self.geometry.sym_block_diag_product(y, nabla_f);
        let euclidean = ydot * &self.objective_matrix * 2.0;
        let curvature = self.geometry.multiply_blocks(ydot, &lambda);
        self.geometry.project_tangent(y, &(euclidean - curvature))
    }

    fn retract(&self, y: &Matrix, ydot: &Matrix) -> Result<Matrix> {
        self.geometry.retract(y, ydot)
    }

    fn preconditioner(&self) -> Option<&dyn Preconditioner> {
        self.preconditioner
            .as_deref()
            .map(|p| p as &dyn Preconditioner)
    }
}

impl ManifoldProblem for SESyncProblem {
    fn set_relaxation_rank(&mut self, rank: usize) -> Result<()> {
        let d = self.dimension();
        if rank < d {
            return Err(ManifoldError::dimension_mismatch(
                format!("relaxation rank >= {d}"),
                rank,
            ));
        }
        if rank != self.rank {
            debug!("Relaxation rank changed from {} to {rank}", self.rank);
            self.rank = rank;
        }
        Ok(())
    }

    fn relaxation_rank(&self) -> usize {
        self.rank
    }

    fn embedding_dimension(&self) -> usize {
        self.geometry.num_columns()
    }

    fn chordal_initialization(&self) -> Result<Matrix> {
        let rotations = self.chordal_rotations()?;
        Ok(self.lift(&self.point_from_rotations(&rotations), self.rank))
    }

    fn random_sample(&self) -> Result<Matrix> {
        let mut rng = SmallRng::seed_from_u64(self.config.seed.wrapping_add(self.rank as u64));
        self.geometry.random_point(self.rank, &mut rng)
    }

    fn compute_certificate_min_eig(
        &self,
        y: &Matrix,
        max_iterations: usize,
        tolerance: f64,
        num_lanczos_vectors: usize,
    ) -> Result<Certificate> {
        let s = self.certificate_matrix(y)?;
        let eig = minimum_eigenpair(&s, max_iterations, tolerance, num_lanczos_vectors, self.config.seed)?;
        Ok(Certificate {
            converged: eig.converged,
            lambda_min: eig.eigenvalue,
            v_min: eig.eigenvector,
            iterations: eig.iterations,
        })
    }

    fn round_solution(&self, y: &Matrix) -> Result<Matrix> {
        self.geometry.check_shape(y)?;
        let n = self.num_poses();
        let d = self.dimension();

        let svd = SVD::new(y.clone(), true, false);
        let u = svd
            .u
            .ok_or_else(|| ManifoldError::numerical_error("SVD failed while rounding"))?;
        let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
        order.sort_by(|&a, &b| svd.singular_values[b].total_cmp(&svd.singular_values[a]));

        // X = U_d^T Y, the best rank-d approximation of Y^T Y
        let mut x = Matrix::zeros(d, y.ncols());
        for (row, &idx) in order.iter().take(d).enumerate() {
            x.row_mut(row).copy_from(&(u.column(idx).transpose() * y));
        }

        let mut rotations = x.columns(self.geometry.offset(), d * n).into_owned();
        let positive = (0..n)
            .filter(|&i| rotations.columns(d * i, d).determinant() > 0.0)
            .count();
        // Keep the orientation of the majority of blocks
        if 2 * positive < n {
            let mut last = rotations.row_mut(d - 1);
            last.neg_mut();
        }

        for i in 0..n {
            let block = project_to_rotation(&rotations.columns(d * i, d).into_owned())?;
            rotations.columns_mut(d * i, d).copy_from(&block);
        }

        Ok(self.pose_estimate(&rotations))
    }

    fn evaluate_rounded_objective(&self, xhat: &Matrix) -> Result<f64> {
        let n = self.num_poses();
        let d = self.dimension();
        if xhat.shape() != (d, n + d * n) {
            return Err(ManifoldError::dimension_mismatch(
                format!("({d}, {})", n + d * n),
                shape_of(xhat),
            ));
        }
        match self.config.formulation {
            Formulation::Simplified => {
                let rotations = xhat.columns(n, d * n);
                Ok((rotations * self.data.reduced()).dot(&rotations))
            }
            Formulation::Explicit => Ok((xhat * self.data.full()).dot(xhat)),
        }
    }
}

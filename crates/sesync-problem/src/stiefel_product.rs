//! Product of Stiefel manifolds St(d, r)^n, optionally with Euclidean factors.
//!
//! An iterate is an `r x k` matrix whose first `offset` columns are free
//! (Euclidean translation columns) and whose remaining `d * n` columns are
//! `n` blocks `Y_i` with orthonormal columns, `Y_i^T Y_i = I_d`.
//!
//! # Geometry
//!
//! - **Tangent space**: `V_i` with `Y_i^T V_i + V_i^T Y_i = 0` on each block,
//!   anything on the Euclidean columns
//! - **Projection**: `P_Y(V)_i = V_i - Y_i sym(Y_i^T V_i)`
//! - **Retraction**: polar (SVD) projection of `Y_i + V_i` onto St(d, r),
//!   additive on the Euclidean columns
//! - **Metric**: Frobenius inner product inherited from `R^{r x k}`
//!
//! The rank `r` is never stored: every operation reads it from the shape
//! of its arguments, so one geometry serves every level of the staircase.

use nalgebra::{DVector, SVD};
use rand::Rng;
use rand_distr::StandardNormal;
use sesync_core::{
    error::{ManifoldError, Result},
    executor::KernelExecutor,
    types::{constants::ORTHOGONALITY_TOLERANCE, shape_of, Matrix},
};

/// Block structure of a product of Stiefel manifolds.
#[derive(Debug, Clone)]
pub struct StiefelProduct {
    /// Number of Stiefel blocks (n)
    num_blocks: usize,
    /// Columns per block (d)
    block_dim: usize,
    /// Number of leading Euclidean columns
    offset: usize,
    executor: KernelExecutor,
}

impl StiefelProduct {
    /// Creates the product of `num_blocks` copies of St(`block_dim`, r)
    /// preceded by `offset` Euclidean columns.
    pub fn new(num_blocks: usize, block_dim: usize, offset: usize, executor: KernelExecutor) -> Self {
        Self {
            num_blocks,
            block_dim,
            offset,
            executor,
        }
    }

    /// Number of Stiefel blocks.
    pub fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    /// Columns per Stiefel block.
    pub fn block_dim(&self) -> usize {
        self.block_dim
    }

    /// Number of leading Euclidean columns.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Total number of columns k.
    pub fn num_columns(&self) -> usize {
        self.offset + self.num_blocks * self.block_dim
    }

    /// Executor used for the per-block kernels.
    pub fn executor(&self) -> &KernelExecutor {
        &self.executor
    }

    /// First column of block `i`.
    #[inline]
    pub fn block_start(&self, i: usize) -> usize {
        self.offset + i * self.block_dim
    }

    /// Checks that `m` has `k` columns and at least `d` rows.
    pub fn check_shape(&self, m: &Matrix) -> Result<()> {
        if m.ncols() != self.num_columns() || m.nrows() < self.block_dim {
            return Err(ManifoldError::dimension_mismatch(
                format!("(r >= {}, {})", self.block_dim, self.num_columns()),
                shape_of(m),
            ));
        }
        Ok(())
    }

    /// Checks that `y` is a point of the manifold.
    pub fn check_point(&self, y: &Matrix) -> Result<()> {
        self.check_shape(y)?;
        let d = self.block_dim;
        for i in 0..self.num_blocks {
            let block = y.columns(self.block_start(i), d);
            let defect = (block.transpose() * block - Matrix::identity(d, d)).norm();
            if defect > ORTHOGONALITY_TOLERANCE.sqrt() {
                return Err(ManifoldError::invalid_point(format!(
                    "block {i} is not orthonormal (defect {defect:.3e})"
                )));
            }
        }
        Ok(())
    }

    /// Projects `v` onto the tangent space at `y`.
    pub fn project_tangent(&self, y: &Matrix, v: &Matrix) -> Result<Matrix> {
        self.check_shape(y)?;
        if v.shape() != y.shape() {
            return Err(ManifoldError::dimension_mismatch(shape_of(y), shape_of(v)));
        }
        let d = self.block_dim;
        let corrections = self.executor.map_blocks(self.num_blocks, |i| {
            let start = self.block_start(i);
            let yi = y.columns(start, d);
            let vi = v.columns(start, d);
            yi * sym(&(yi.transpose() * vi))
        });

        let mut result = v.clone();
        for (i, correction) in corrections.iter().enumerate() {
            let mut block = result.columns_mut(self.block_start(i), d);
            block -= correction;
        }
        Ok(result)
    }

    /// Symmetric block-diagonal part of `a^T b` over the Stiefel blocks.
    ///
    /// Returns the `n` blocks `sym(A_i^T B_i)`, each `d x d`.
    pub fn sym_block_diag_product(&self, a: &Matrix, b: &Matrix) -> Vec<Matrix> {
        let d = self.block_dim;
        self.executor.map_blocks(self.num_blocks, |i| {
            let start = self.block_start(i);
            sym(&(a.columns(start, d).transpose() * b.columns(start, d)))
        })
    }

    /// Right-multiplies the Stiefel blocks of `v` by the given `d x d` blocks.
    ///
    /// Euclidean columns of the result are zero.
    pub fn multiply_blocks(&self, v: &Matrix, blocks: &[Matrix]) -> Matrix {
        let d = self.block_dim;
        let mut result = Matrix::zeros(v.nrows(), v.ncols());
        for (i, b) in blocks.iter().enumerate() {
            let start = self.block_start(i);
            result
                .columns_mut(start, d)
                .copy_from(&(v.columns(start, d) * b));
        }
        result
    }

    /// Retracts the tangent vector `v` at `y`.
    pub fn retract(&self, y: &Matrix, v: &Matrix) -> Result<Matrix> {
        self.check_shape(y)?;
        if v.shape() != y.shape() {
            return Err(ManifoldError::dimension_mismatch(shape_of(y), shape_of(v)));
        }
        let moved = y + v;
        self.project_to_manifold(&moved)
    }

    /// Projects every Stiefel block of `m` onto St(d, r).
    pub fn project_to_manifold(&self, m: &Matrix) -> Result<Matrix> {
        self.check_shape(m)?;
        let d = self.block_dim;
        let blocks = self.executor.try_map_blocks(self.num_blocks, |i| {
            project_to_stiefel(&m.columns(self.block_start(i), d).into_owned())
        })?;

        let mut result = m.clone();
        for (i, block) in blocks.iter().enumerate() {
            result.columns_mut(self.block_start(i), d).copy_from(block);
        }
        Ok(result)
    }

    /// Samples a point with Gaussian Euclidean columns and uniformly
    /// distributed Stiefel blocks.
    pub fn random_point<R: Rng>(&self, rank: usize, rng: &mut R) -> Result<Matrix> {
        let gaussian = Matrix::from_fn(rank, self.num_columns(), |_, _| rng.sample(StandardNormal));
        self.project_to_manifold(&gaussian)
    }
}

/// Symmetric part of a square matrix.
pub(crate) fn sym(m: &Matrix) -> Matrix {
    (m + m.transpose()) * 0.5
}

/// Closest matrix with orthonormal columns (polar factor) to `m` (r x d, r >= d).
pub fn project_to_stiefel(m: &Matrix) -> Result<Matrix> {
    let svd = SVD::new(m.clone(), true, true);
    match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => Ok(u * v_t),
        _ => Err(ManifoldError::numerical_error("SVD failed during Stiefel projection")),
    }
}

/// Closest rotation in SO(d) to the square matrix `m`.
pub fn project_to_rotation(m: &Matrix) -> Result<Matrix> {
    let d = m.nrows();
    if m.ncols() != d {
        return Err(ManifoldError::dimension_mismatch("square matrix", shape_of(m)));
    }
    let svd = SVD::new(m.clone(), true, true);
    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => return Err(ManifoldError::numerical_error("SVD failed during rotation projection")),
    };
    let det = (&u * &v_t).determinant();
    if det >= 0.0 {
        return Ok(u * v_t);
    }
    // Flip the direction of the smallest singular value.
    let smallest = svd.singular_values.imin();
    let mut signs = DVector::from_element(d, 1.0);
    signs[smallest] = -1.0;
    Ok(u * Matrix::from_diagonal(&signs) * v_t)
}

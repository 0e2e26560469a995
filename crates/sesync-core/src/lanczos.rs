//! Thick-restart Lanczos iteration for the minimum eigenpair of a symmetric
//! operator.
//!
//! Each restart builds a basis of at most `num_lanczos_vectors` vectors
//! with full reorthogonalization and extracts Ritz pairs by Rayleigh-Ritz
//! projection. The next basis starts from the Ritz vectors of the smallest
//! half of the Ritz values and is extended by the Krylov sequence of the
//! residual of the smallest one, so clustered eigenvalues at the bottom of
//! the spectrum stay resolved across restarts. When the Krylov space
//! becomes invariant before the basis is full, the basis is extended with a
//! fresh random vector so that eigenvalues invisible from the start vector
//! are still found.
//!
//! Convergence is declared when the Ritz residual satisfies
//! `||A x - theta x|| <= tolerance * max(1, |theta|)`.

use crate::{
    error::{ManifoldError, Result},
    types::{constants::BREAKDOWN_TOLERANCE, Matrix, Vector},
};
use log::{debug, trace};
use nalgebra::SymmetricEigen;
use rand::{rngs::SmallRng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

/// Outcome of a minimum-eigenpair computation.
#[derive(Debug, Clone)]
pub struct EigenResult {
    /// Whether the residual tolerance was met within the restart budget
    pub converged: bool,
    /// Smallest Ritz value found
    pub eigenvalue: f64,
    /// Unit-norm Ritz vector for `eigenvalue`
    pub eigenvector: Vector,
    /// Number of restarts performed
    pub iterations: usize,
    /// Residual norm `||A x - theta x||` of the returned pair
    pub residual: f64,
}

/// Computes the minimum eigenpair of a dense symmetric matrix.
pub fn minimum_eigenpair(
    a: &Matrix,
    max_iterations: usize,
    tolerance: f64,
    num_lanczos_vectors: usize,
    seed: u64,
) -> Result<EigenResult> {
    if a.nrows() != a.ncols() {
        return Err(ManifoldError::dimension_mismatch(
            "square matrix",
            format!("({}, {})", a.nrows(), a.ncols()),
        ));
    }
    minimum_eigenpair_with(
        a.nrows(),
        |x| a * x,
        max_iterations,
        tolerance,
        num_lanczos_vectors,
        seed,
    )
}

/// Computes the minimum eigenpair of a symmetric operator given by `apply`.
pub fn minimum_eigenpair_with<F>(
    dim: usize,
    apply: F,
    max_iterations: usize,
    tolerance: f64,
    num_lanczos_vectors: usize,
    seed: u64,
) -> Result<EigenResult>
where
    F: Fn(&Vector) -> Vector,
{
    if dim == 0 {
        return Err(ManifoldError::dimension_mismatch("dim > 0", 0));
    }
    if !(tolerance > 0.0) {
        return Err(ManifoldError::numerical_error(format!(
            "eigenvalue tolerance must be positive, got {tolerance}"
        )));
    }

    let basis_size = num_lanczos_vectors.clamp(1, dim);
    let keep = (basis_size / 2).max(1);
    let mut rng = SmallRng::seed_from_u64(seed);

    let mut x = random_unit_vector(dim, &mut rng);
    let mut ax = apply(&x);
    let mut theta = x.dot(&ax);
    let mut residual_vector = &ax - &x * theta;
    let mut residual = residual_vector.norm();
    let mut kept = vec![x.clone()];
    let mut kept_images = vec![ax.clone()];

    for iteration in 0..max_iterations {
        let (basis, images) = thick_restart_basis(
            kept,
            kept_images,
            &residual_vector,
            &apply,
            basis_size,
            &mut rng,
        );
        let k = basis.len();

        let v = Matrix::from_columns(&basis);
        let av = Matrix::from_columns(&images);
        let h = v.transpose() * &av;
        let h = (&h + h.transpose()) * 0.5;

        let eig = SymmetricEigen::new(h);
        let mut order: Vec<usize> = (0..eig.eigenvalues.len()).collect();
        order.sort_by(|&a, &b| eig.eigenvalues[a].total_cmp(&eig.eigenvalues[b]));

        let mut ritz_vectors = Vec::with_capacity(keep);
        let mut ritz_images = Vec::with_capacity(keep);
        for &idx in order.iter().take(keep) {
            let y = eig.eigenvectors.column(idx);
            let mut ritz_vector = &v * &y;
            let mut ritz_image = &av * &y;
            let norm = ritz_vector.norm();
            if !norm.is_finite() || norm == 0.0 || !eig.eigenvalues[idx].is_finite() {
                return Err(ManifoldError::numerical_error(format!(
                    "Lanczos iteration broke down after {k} basis vectors"
                )));
            }
            ritz_vector /= norm;
            ritz_image /= norm;
            ritz_vectors.push(ritz_vector);
            ritz_images.push(ritz_image);
        }

        let smallest = *order
            .first()
            .ok_or_else(|| ManifoldError::numerical_error("empty Rayleigh-Ritz projection"))?;
        x = ritz_vectors[0].clone();
        ax = ritz_images[0].clone();
        theta = eig.eigenvalues[smallest];
        residual_vector = &ax - &x * theta;
        residual = residual_vector.norm();

        trace!("Lanczos restart {iteration}: theta = {theta:.6e}, residual = {residual:.3e}, basis = {k}");
        if residual <= tolerance * theta.abs().max(1.0) {
            return Ok(EigenResult {
                converged: true,
                eigenvalue: theta,
                eigenvector: x,
                iterations: iteration + 1,
                residual,
            });
        }

        kept = ritz_vectors;
        kept_images = ritz_images;
    }

    debug!("Lanczos did not converge in {max_iterations} restarts: theta = {theta:.6e}, residual = {residual:.3e}");
    Ok(EigenResult {
        converged: false,
        eigenvalue: theta,
        eigenvector: x,
        iterations: max_iterations,
        residual,
    })
}

/// Builds the next search basis: the retained Ritz vectors, followed by the
/// Krylov sequence of `direction`, together with the images of every basis
/// vector under the operator.
fn thick_restart_basis<F>(
    kept: Vec<Vector>,
    kept_images: Vec<Vector>,
    direction: &Vector,
    apply: &F,
    basis_size: usize,
    rng: &mut SmallRng,
) -> (Vec<Vector>, Vec<Vector>)
where
    F: Fn(&Vector) -> Vector,
{
    let dim = direction.len();
    let mut basis: Vec<Vector> = Vec::with_capacity(basis_size);
    let mut images: Vec<Vector> = Vec::with_capacity(basis_size);

    // Ritz vectors are orthonormal up to rounding; the images follow the
    // same linear combinations, so no extra operator applications are needed.
    for (mut u, mut au) in kept.into_iter().zip(kept_images) {
        for _ in 0..2 {
            for (b, ab) in basis.iter().zip(&images) {
                let c = b.dot(&u);
                u.axpy(-c, b, 1.0);
                au.axpy(-c, ab, 1.0);
            }
        }
        let norm = u.norm();
        if norm > 0.5 {
            basis.push(u / norm);
            images.push(au / norm);
        }
    }

    let mut candidate = direction.clone();
    while basis.len() < basis_size {
        let scale = candidate.norm();
        orthogonalize(&mut candidate, &basis);
        let mut norm = candidate.norm();

        if norm <= BREAKDOWN_TOLERANCE * scale.max(1.0) {
            // Invariant subspace: continue with a fresh direction.
            if basis.len() >= dim {
                break;
            }
            candidate = random_unit_vector(dim, rng);
            orthogonalize(&mut candidate, &basis);
            norm = candidate.norm();
            if norm <= BREAKDOWN_TOLERANCE {
                break;
            }
        }

        candidate /= norm;
        let image = apply(&candidate);
        basis.push(candidate);
        images.push(image.clone());
        candidate = image;
    }

    (basis, images)
}

/// Two passes of classical Gram-Schmidt against `basis`.
fn orthogonalize(v: &mut Vector, basis: &[Vector]) {
    for _ in 0..2 {
        for b in basis {
            let c = b.dot(v);
            v.axpy(-c, b, 1.0);
        }
    }
}

fn random_unit_vector(dim: usize, rng: &mut SmallRng) -> Vector {
    let mut v = Vector::from_fn(dim, |_, _| StandardNormal.sample(&mut *rng));
    let norm = v.norm();
    if norm > 0.0 {
        v /= norm;
    } else {
        v[0] = 1.0;
    }
    v
}

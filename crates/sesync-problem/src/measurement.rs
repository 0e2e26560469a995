//! Relative pose measurements and measurement-graph validation.
//!
//! A measurement `(i, j, R_ij, t_ij, kappa, tau)` states that pose `j`,
//! expressed in the frame of pose `i`, has rotation `R_ij` and translation
//! `t_ij`. The weights `kappa` and `tau` are the concentration parameters
//! of the rotational and translational noise models.

use nalgebra::{DMatrix, DVector};
use sesync_core::{
    error::{ManifoldError, Result},
    types::{constants::ORTHOGONALITY_TOLERANCE, Matrix, Vector},
};

/// A noisy relative transform between two poses.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RelativePoseMeasurement {
    /// Index of the first pose
    pub i: usize,
    /// Index of the second pose
    pub j: usize,
    /// Relative rotation R_ij (d x d)
    pub rotation: Matrix,
    /// Relative translation t_ij (length d)
    pub translation: Vector,
    /// Rotational concentration parameter
    pub kappa: f64,
    /// Translational precision
    pub tau: f64,
}

impl RelativePoseMeasurement {
    /// Creates a measurement between poses `i` and `j`.
    pub fn new(i: usize, j: usize, rotation: Matrix, translation: Vector, kappa: f64, tau: f64) -> Self {
        Self {
            i,
            j,
            rotation,
            translation,
            kappa,
            tau,
        }
    }

    /// Creates a planar measurement from a heading change and a translation.
    pub fn planar(i: usize, j: usize, theta: f64, translation: [f64; 2], kappa: f64, tau: f64) -> Self {
        let (s, c) = theta.sin_cos();
        Self::new(
            i,
            j,
            DMatrix::from_row_slice(2, 2, &[c, -s, s, c]),
            DVector::from_column_slice(&translation),
            kappa,
            tau,
        )
    }

    /// Dimension of the space the poses live in.
    pub fn dimension(&self) -> usize {
        self.rotation.nrows()
    }

    /// Checks the measurement in isolation.
    pub fn validate(&self) -> Result<()> {
        let d = self.rotation.nrows();
        if d < 2 || self.rotation.ncols() != d {
            return Err(ManifoldError::invalid_measurement(format!(
                "measurement ({}, {}): rotation must be a square matrix of size at least 2, got {}x{}",
                self.i,
                self.j,
                self.rotation.nrows(),
                self.rotation.ncols()
            )));
        }
        if self.translation.len() != d {
            return Err(ManifoldError::invalid_measurement(format!(
                "measurement ({}, {}): translation has length {}, expected {d}",
                self.i,
                self.j,
                self.translation.len()
            )));
        }
        if self.i == self.j {
            return Err(ManifoldError::invalid_measurement(format!(
                "measurement ({}, {}) relates a pose to itself",
                self.i, self.j
            )));
        }
        for (name, w) in [("kappa", self.kappa), ("tau", self.tau)] {
            if !(w > 0.0) || !w.is_finite() {
                return Err(ManifoldError::invalid_measurement(format!(
                    "measurement ({}, {}): {name} must be positive and finite, got {w}",
                    self.i, self.j
                )));
            }
        }
        if self.rotation.iter().chain(self.translation.iter()).any(|v| !v.is_finite()) {
            return Err(ManifoldError::invalid_measurement(format!(
                "measurement ({}, {}) contains non-finite entries",
                self.i, self.j
            )));
        }
        let gram = self.rotation.transpose() * &self.rotation;
        let defect = (gram - Matrix::identity(d, d)).norm();
        if defect > 1e3 * ORTHOGONALITY_TOLERANCE {
            return Err(ManifoldError::invalid_measurement(format!(
                "measurement ({}, {}): rotation is not orthogonal (defect {defect:.3e})",
                self.i, self.j
            )));
        }
        Ok(())
    }
}

/// Summary of a validated measurement set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphSummary {
    /// Number of poses (largest pose index + 1)
    pub num_poses: usize,
    /// Dimension of the poses
    pub dimension: usize,
    /// Number of measurements
    pub num_measurements: usize,
}

/// Validates a measurement set and returns its size.
///
/// Every measurement must be individually valid, all must share one
/// dimension, and the graph they form over poses `0..n` must be connected.
pub fn validate_measurements(measurements: &[RelativePoseMeasurement]) -> Result<GraphSummary> {
    let first = measurements
        .first()
        .ok_or_else(|| ManifoldError::invalid_measurement("at least one measurement is required"))?;
    let dimension = first.dimension();

    let mut num_poses = 0;
    for m in measurements {
        m.validate()?;
        if m.dimension() != dimension {
            return Err(ManifoldError::invalid_measurement(format!(
                "measurement ({}, {}) has dimension {}, expected {dimension}",
                m.i,
                m.j,
                m.dimension()
            )));
        }
        num_poses = num_poses.max(m.i + 1).max(m.j + 1);
    }

    // Union-find over pose indices
    let mut parent: Vec<usize> = (0..num_poses).collect();
    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }
    let mut components = num_poses;
    for m in measurements {
        let (a, b) = (find(&mut parent, m.i), find(&mut parent, m.j));
        if a != b {
            parent[a] = b;
            components -= 1;
        }
    }
    if components != 1 {
        return Err(ManifoldError::invalid_measurement(format!(
            "measurement graph over {num_poses} poses has {components} connected components"
        )));
    }

    Ok(GraphSummary {
        num_poses,
        dimension,
        num_measurements: measurements.len(),
    })
}

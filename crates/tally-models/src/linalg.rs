//! Symmetric eigen-decomposition and pseudo-inverse.
//!
//! Normal-equation matrices built from lagged sales and sparse markdown
//! columns are routinely singular (constant columns, duplicated weeks), so the
//! solver works through eigenvalues and discards near-zero directions instead
//! of inverting directly.

use crate::error::ModelError;
use ndarray::{Array1, Array2};

/// Rotations per matrix element before giving up on convergence.
const SWEEPS_PER_ELEMENT: usize = 50;

/// Off-diagonal magnitude treated as converged.
const CONVERGENCE_TOLERANCE: f64 = 1e-12;

/// Eigenvalues relative to the largest one below this are treated as zero.
const RELATIVE_CUTOFF: f64 = 1e-10;

/// Result of eigenvalue decomposition
#[derive(Debug, Clone)]
pub struct EigenDecomposition {
    /// Eigenvalues (sorted in descending order)
    pub eigenvalues: Array1<f64>,
    /// Eigenvectors (columns are eigenvectors)
    pub eigenvectors: Array2<f64>,
}

/// Jacobi eigenvalue decomposition for symmetric matrices.
///
/// Repeatedly zeroes the largest off-diagonal element with a plane rotation
/// until every off-diagonal element is below `tolerance` or `max_iterations`
/// rotations have been applied.
///
/// # Errors
/// Returns [`ModelError::DimensionMismatch`] if `matrix` is not square.
pub fn jacobi_eigendecomp(
    matrix: &Array2<f64>,
    max_iterations: usize,
    tolerance: f64,
) -> Result<EigenDecomposition, ModelError> {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return Err(ModelError::DimensionMismatch {
            expected: n,
            actual: matrix.ncols(),
        });
    }

    let mut a = matrix.clone();
    let mut v = Array2::<f64>::eye(n);

    if n > 1 {
        for _ in 0..max_iterations {
            let (p, q, max_val) = find_largest_off_diagonal(&a);
            if max_val.abs() < tolerance {
                break;
            }
            let (cos_theta, sin_theta) = compute_rotation(a[[p, p]], a[[q, q]], a[[p, q]]);
            apply_jacobi_rotation(&mut a, &mut v, p, q, cos_theta, sin_theta);
        }
    }

    let eigenvalues: Array1<f64> = a.diag().to_owned();

    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&i, &j| eigenvalues[j].total_cmp(&eigenvalues[i]));

    let sorted_eigenvalues = indices.iter().map(|&i| eigenvalues[i]).collect();
    let mut sorted_eigenvectors = Array2::<f64>::zeros((n, n));
    for (new_idx, &old_idx) in indices.iter().enumerate() {
        sorted_eigenvectors
            .column_mut(new_idx)
            .assign(&v.column(old_idx));
    }

    Ok(EigenDecomposition {
        eigenvalues: sorted_eigenvalues,
        eigenvectors: sorted_eigenvectors,
    })
}

fn find_largest_off_diagonal(matrix: &Array2<f64>) -> (usize, usize, f64) {
    let n = matrix.nrows();
    let mut max_val = 0.0;
    let mut p = 0;
    let mut q = 1;

    for i in 0..n {
        for j in (i + 1)..n {
            let val = matrix[[i, j]].abs();
            if val > max_val {
                max_val = val;
                p = i;
                q = j;
            }
        }
    }

    (p, q, matrix[[p, q]])
}

/// Returns (cos_theta, sin_theta) for the rotation zeroing `apq`.
fn compute_rotation(app: f64, aqq: f64, apq: f64) -> (f64, f64) {
    if apq.abs() < 1e-15 {
        return (1.0, 0.0);
    }

    let tau = (aqq - app) / (2.0 * apq);
    let t = if tau >= 0.0 {
        1.0 / (tau + (1.0 + tau * tau).sqrt())
    } else {
        -1.0 / (-tau + (1.0 + tau * tau).sqrt())
    };

    let cos_theta = 1.0 / (1.0 + t * t).sqrt();
    (cos_theta, t * cos_theta)
}

fn apply_jacobi_rotation(
    a: &mut Array2<f64>,
    v: &mut Array2<f64>,
    p: usize,
    q: usize,
    cos_theta: f64,
    sin_theta: f64,
) {
    let n = a.nrows();

    let app = a[[p, p]];
    let aqq = a[[q, q]];
    let apq = a[[p, q]];

    a[[p, p]] = cos_theta * cos_theta * app - 2.0 * cos_theta * sin_theta * apq
        + sin_theta * sin_theta * aqq;
    a[[q, q]] = sin_theta * sin_theta * app
        + 2.0 * cos_theta * sin_theta * apq
        + cos_theta * cos_theta * aqq;
    a[[p, q]] = 0.0;
    a[[q, p]] = 0.0;

    for i in 0..n {
        if i != p && i != q {
            let aip = a[[i, p]];
            let aiq = a[[i, q]];

            a[[i, p]] = cos_theta * aip - sin_theta * aiq;
            a[[p, i]] = a[[i, p]];

            a[[i, q]] = sin_theta * aip + cos_theta * aiq;
            a[[q, i]] = a[[i, q]];
        }
    }

    for i in 0..n {
        let vip = v[[i, p]];
        let viq = v[[i, q]];

        v[[i, p]] = cos_theta * vip - sin_theta * viq;
        v[[i, q]] = sin_theta * vip + cos_theta * viq;
    }
}

/// Moore-Penrose pseudo-inverse of a symmetric positive semi-definite matrix.
///
/// Eigenvalues below `1e-10` times the largest are dropped, which yields the
/// minimum-norm solution for rank-deficient systems.
///
/// # Errors
/// - [`ModelError::DimensionMismatch`] if `matrix` is not square
/// - [`ModelError::Numerical`] if the decomposition produces non-finite values
pub fn symmetric_pseudo_inverse(matrix: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
    let n = matrix.nrows();
    let max_iterations = SWEEPS_PER_ELEMENT * n.max(1) * n.max(1);
    let decomp = jacobi_eigendecomp(matrix, max_iterations, CONVERGENCE_TOLERANCE)?;

    if decomp.eigenvalues.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::Numerical(
            "non-finite eigenvalue in normal equations".to_string(),
        ));
    }

    let largest = decomp
        .eigenvalues
        .iter()
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let cutoff = largest * RELATIVE_CUTOFF;

    let inverted = decomp
        .eigenvalues
        .mapv(|v| if v.abs() > cutoff && v != 0.0 { 1.0 / v } else { 0.0 });

    // V * diag(1/λ) * V^T
    let scaled = &decomp.eigenvectors * &inverted.insert_axis(ndarray::Axis(0));
    Ok(scaled.dot(&decomp.eigenvectors.t()))
}

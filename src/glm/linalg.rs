//! Small dense linear algebra on symmetric positive (semi-)definite matrices

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Lower-triangular Cholesky factor.
///
/// Non-positive pivots are replaced by a tiny epsilon so that nearly singular
/// X'WX matrices still produce a usable (heavily regularized) factor.
/// Returns the factor and whether any pivot had to be patched.
pub fn cholesky(a: ArrayView2<f64>) -> (Array2<f64>, bool) {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    let mut patched = false;
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if !(sum > 0.0) {
                    sum = 1e-12;
                    patched = true;
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    (l, patched)
}

/// Solve L L' x = b given the Cholesky factor L
pub fn cholesky_solve(l: &Array2<f64>, b: ArrayView1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[[i, j]] * y[j];
        }
        y[i] = sum / l[[i, i]];
    }
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum -= l[[j, i]] * x[j];
        }
        x[i] = sum / l[[i, i]];
    }
    x
}

/// Solve the symmetric system A x = b
pub fn solve_symmetric(a: ArrayView2<f64>, b: ArrayView1<f64>) -> Array1<f64> {
    let (l, _) = cholesky(a);
    cholesky_solve(&l, b)
}

/// Inverse of a symmetric positive definite matrix
pub fn invert_symmetric(a: ArrayView2<f64>) -> Array2<f64> {
    let n = a.nrows();
    let (l, _) = cholesky(a);
    let mut inv = Array2::<f64>::zeros((n, n));
    let mut e = Array1::<f64>::zeros(n);
    for i in 0..n {
        e.fill(0.0);
        e[i] = 1.0;
        inv.column_mut(i).assign(&cholesky_solve(&l, e.view()));
    }
    inv
}

/// log |A| for a symmetric positive definite matrix; None when A is singular
pub fn log_det_symmetric(a: ArrayView2<f64>) -> Option<f64> {
    let (l, patched) = cholesky(a);
    if patched {
        return None;
    }
    Some(2.0 * l.diag().iter().map(|d| d.ln()).sum::<f64>())
}

/// X' diag(w) X
pub fn weighted_crossprod(x: &Array2<f64>, w: ArrayView1<f64>) -> Array2<f64> {
    let weighted = x * &w.insert_axis(ndarray::Axis(1));
    x.t().dot(&weighted)
}

//! Cholesky based solves for the handful of regressors used by the
//! spatial regression models. Systems here are at most a few dozen wide, so
//! a plain triangular solve is enough.
#![allow(missing_docs)]

use anyhow::{bail, ensure, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// A pivot that lost this many orders of magnitude relative to the diagonal
/// is treated as zero.
const RELATIVE_PIVOT_TOLERANCE: f64 = 1e-12;

/// Lower triangular `L` with `L * L^T == a`.
pub fn cholesky(a: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
    ensure!(a.is_square(), "matrix must be square, got {:?}", a.dim());
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if !sum.is_finite() || sum <= a[[i, i]].abs() * RELATIVE_PIVOT_TOLERANCE {
                    bail!("matrix is singular or not positive definite (pivot {i})");
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    Ok(l)
}

fn forward_substitution(l: &Array2<f64>, b: ArrayView1<'_, f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * y[k];
        }
        y[i] = sum / l[[i, i]];
    }
    y
}

fn backward_substitution(l: &Array2<f64>, y: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = y[i];
        for k in (i + 1)..n {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }
    x
}

/// Solve `a * x = b` for symmetric positive definite `a`.
pub fn cholesky_solve(a: ArrayView2<'_, f64>, b: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
    ensure!(
        a.nrows() == b.len(),
        "dimension mismatch: {:?} vs {}",
        a.dim(),
        b.len()
    );
    let l = cholesky(a)?;
    let y = forward_substitution(&l, b);
    Ok(backward_substitution(&l, &y))
}

/// Inverse of a symmetric positive definite matrix.
pub fn spd_inverse(a: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
    let l = cholesky(a)?;
    let n = a.nrows();
    let mut inverse = Array2::<f64>::zeros((n, n));
    let mut unit = Array1::<f64>::zeros(n);
    for col in 0..n {
        unit.fill(0.0);
        unit[col] = 1.0;
        let y = forward_substitution(&l, unit.view());
        let x = backward_substitution(&l, &y);
        inverse.column_mut(col).assign(&x);
    }
    Ok(inverse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_solve() -> Result<()> {
        let a = array![[4.0, 12.0, -16.0], [12.0, 37.0, -43.0], [-16.0, -43.0, 98.0]];
        let l = cholesky(a.view())?;
        assert_eq!(l, array![[2.0, 0.0, 0.0], [6.0, 1.0, 0.0], [-8.0, 5.0, 3.0]]);

        let b = array![1.0, 2.0, 3.0];
        let x = cholesky_solve(a.view(), b.view())?;
        let residual = a.dot(&x) - &b;
        assert!(residual.iter().all(|r| r.abs() < 1e-9));
        Ok(())
    }

    #[test]
    fn test_inverse() -> Result<()> {
        let a = array![[2.0, 1.0], [1.0, 3.0]];
        let inv = spd_inverse(a.view())?;
        let eye = a.dot(&inv);
        assert!((eye[[0, 0]] - 1.0).abs() < 1e-12);
        assert!(eye[[0, 1]].abs() < 1e-12);
        assert!((eye[[1, 1]] - 1.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_singular() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        assert!(cholesky(a.view()).is_err());
        let a = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        assert!(cholesky(a.view()).is_err());
    }
}

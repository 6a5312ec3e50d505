#![allow(missing_docs)]

use crate::rank::rank_columns;
use anyhow::{ensure, Result};
use ndarray::{Array2, ArrayView2, Axis};

/// Center every column and scale it to unit norm. Constant columns become
/// all zeros, so they correlate as 0 with everything.
fn standardize_columns(matrix: ArrayView2<'_, f64>) -> Array2<f64> {
    let mut out = matrix.to_owned();
    for mut column in out.axis_iter_mut(Axis(1)) {
        let n = column.len() as f64;
        let m = column.sum() / n;
        column.mapv_inplace(|v| v - m);
        let norm = column.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            column.mapv_inplace(|v| v / norm);
        } else {
            column.fill(0.0);
        }
    }
    out
}

/// Pearson correlation between every column of `a` (rows of the output) and
/// every column of `b` (columns of the output).
pub fn pearson_columns(a: ArrayView2<'_, f64>, b: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
    ensure!(
        a.nrows() == b.nrows(),
        "cannot correlate columns of different length ({} vs {})",
        a.nrows(),
        b.nrows()
    );
    let za = standardize_columns(a);
    let zb = standardize_columns(b);
    Ok(za.t().dot(&zb))
}

/// Spearman correlation between the columns of `a` and `b`.
pub fn spearman_columns(a: ArrayView2<'_, f64>, b: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
    pearson_columns(rank_columns(a).view(), rank_columns(b).view())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_pearson_perfect() -> Result<()> {
        let a = array![[1.0], [2.0], [3.0]];
        let b = array![[2.0, 3.0, 1.0], [4.0, 2.0, 1.0], [6.0, 1.0, 1.0]];
        let corr = pearson_columns(a.view(), b.view())?;
        assert_eq!(corr.dim(), (1, 3));
        assert!((corr[[0, 0]] - 1.0).abs() < 1e-12);
        assert!((corr[[0, 1]] + 1.0).abs() < 1e-12);
        assert_eq!(corr[[0, 2]], 0.0);
        Ok(())
    }

    #[test]
    fn test_spearman_monotone() -> Result<()> {
        let a = array![[1.0], [10.0], [100.0], [1000.0]];
        let b = array![[0.1], [0.2], [0.3], [0.4]];
        let corr = spearman_columns(a.view(), b.view())?;
        assert!((corr[[0, 0]] - 1.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_length_mismatch() {
        let a = array![[1.0], [2.0]];
        let b = array![[1.0], [2.0], [3.0]];
        assert!(pearson_columns(a.view(), b.view()).is_err());
    }
}

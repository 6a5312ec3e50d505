//! Spatial weights from nearest neighbours.
#![allow(missing_docs)]

use anyhow::{ensure, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;
use stats::distances_from;

/// Sparse row-wise spatial weights: `rows[i]` lists `(j, w_ij)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialWeights {
    rows: Vec<Vec<(usize, f64)>>,
}

impl SpatialWeights {
    pub fn n(&self) -> usize {
        self.rows.len()
    }

    pub fn neighbors(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        self.rows[i].iter().map(|(j, _)| *j)
    }

    /// `W y`
    pub fn lag(&self, y: ArrayView1<'_, f64>) -> Array1<f64> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|&(j, w)| w * y[j]).sum())
            .collect()
    }

    /// `W x` applied to every column of `x`.
    pub fn lag_columns(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        let mut out = Array2::zeros(x.dim());
        for (col, mut target) in x.axis_iter(Axis(1)).zip(out.axis_iter_mut(Axis(1))) {
            target.assign(&self.lag(col));
        }
        out
    }
}

/// The `k` nearest neighbours of every point, excluding the point itself,
/// each weighted `1/k` so rows sum to one. Equal distances are broken by
/// index.
pub fn knn_weights(positions: ArrayView2<'_, f64>, k: usize) -> Result<SpatialWeights> {
    let n = positions.nrows();
    ensure!(k > 0, "number of neighbours must be positive");
    ensure!(
        k < n,
        "{k} neighbours requested but there are only {n} observations"
    );
    let weight = 1.0 / k as f64;
    let rows = (0..n)
        .into_par_iter()
        .map(|i| {
            let dist = distances_from(positions.row(i), positions);
            let mut candidates: Vec<(f64, usize)> = dist
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(j, d)| (*d, j))
                .collect();
            let cmp = |a: &(f64, usize), b: &(f64, usize)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
            candidates.select_nth_unstable_by(k - 1, cmp);
            candidates.truncate(k);
            candidates.sort_by(cmp);
            candidates.into_iter().map(|(_, j)| (j, weight)).collect()
        })
        .collect();
    Ok(SpatialWeights { rows })
}

#![allow(missing_docs)]

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;

pub fn euclidean(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Distance from `point` to every row of `points`.
pub fn distances_from(point: ArrayView1<'_, f64>, points: ArrayView2<'_, f64>) -> Array1<f64> {
    points
        .axis_iter(Axis(0))
        .map(|row| euclidean(point, row))
        .collect()
}

/// Full `n x n` distance matrix between the rows of `points`, computed one
/// row per rayon task.
pub fn pairwise_distances(points: ArrayView2<'_, f64>) -> Array2<f64> {
    let n = points.nrows();
    let rows: Vec<Array1<f64>> = (0..n)
        .into_par_iter()
        .map(|i| distances_from(points.row(i), points))
        .collect();
    let mut out = Array2::zeros((n, n));
    for (mut target, row) in out.axis_iter_mut(Axis(0)).zip(rows) {
        target.assign(&row);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_pairwise_distances() {
        let points = array![[0.0, 0.0], [3.0, 4.0], [6.0, 8.0]];
        let dist = pairwise_distances(points.view());
        assert_eq!(dist[[0, 1]], 5.0);
        assert_eq!(dist[[1, 0]], 5.0);
        assert_eq!(dist[[0, 2]], 10.0);
        assert_eq!(dist.diag().to_vec(), vec![0.0, 0.0, 0.0]);
        assert_eq!(
            distances_from(points.row(2), points.view()).to_vec(),
            vec![10.0, 5.0, 0.0]
        );
    }
}

#![allow(missing_docs)]

use ndarray::{Array2, ArrayView2, Axis};

/// 1-based ranks. Tied values all receive the mean of the ranks they span,
/// which matches `scipy.stats.rankdata(method="average")`.
pub fn rank_average(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start+1 ..= end share one rank
        let shared = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = shared;
        }
        start = end;
    }
    ranks
}

/// Rank every column of `matrix` independently.
pub fn rank_columns(matrix: ArrayView2<'_, f64>) -> Array2<f64> {
    let mut ranked = Array2::zeros(matrix.raw_dim());
    for (column, mut target) in matrix
        .axis_iter(Axis(1))
        .zip(ranked.axis_iter_mut(Axis(1)))
    {
        let ranks = rank_average(&column.to_vec());
        for (slot, rank) in target.iter_mut().zip(ranks) {
            *slot = rank;
        }
    }
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;

    #[test]
    fn test_rank_without_ties() {
        assert_eq!(rank_average(&[3.0, 1.0, 2.0]), vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_rank_with_ties() {
        assert_eq!(
            rank_average(&[0.0, 2.0, 0.0, 5.0, 2.0, 0.0]),
            vec![2.0, 4.5, 2.0, 6.0, 4.5, 2.0]
        );
        assert!(rank_average(&[]).is_empty());
    }

    #[test]
    fn test_rank_columns() {
        let matrix = array![[1.0, 7.0], [3.0, 7.0], [2.0, 1.0]];
        let ranked = rank_columns(matrix.view());
        assert_eq!(ranked, array![[1.0, 2.5], [3.0, 2.5], [2.0, 1.0]]);
    }

    proptest! {
        #[test]
        fn rank_sum_is_triangular(values in prop::collection::vec(-50i32..50, 1..64)) {
            let values: Vec<f64> = values.into_iter().map(f64::from).collect();
            let n = values.len() as f64;
            let total: f64 = rank_average(&values).iter().sum();
            prop_assert!((total - n * (n + 1.0) / 2.0).abs() < 1e-9);
        }

        #[test]
        fn ranks_preserve_order(values in prop::collection::vec(-1e3f64..1e3, 2..32)) {
            let ranks = rank_average(&values);
            for i in 0..values.len() {
                for j in 0..values.len() {
                    if values[i] < values[j] {
                        prop_assert!(ranks[i] < ranks[j]);
                    }
                }
            }
        }
    }
}

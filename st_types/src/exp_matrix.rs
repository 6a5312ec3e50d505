//! Cell x gene expression storage.
#![allow(missing_docs)]

use ndarray::{Array1, Array2, Axis};
use sprs::{CsMat, TriMat};

/// Expression values with cells on rows and genes on columns. Both layouts
/// answer the same queries; sparse storage is CSR so row access is cheap.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpMatrix {
    Sparse(CsMat<f64>),
    Dense(Array2<f64>),
}

impl From<CsMat<f64>> for ExpMatrix {
    fn from(value: CsMat<f64>) -> Self {
        if value.is_csr() {
            ExpMatrix::Sparse(value)
        } else {
            ExpMatrix::Sparse(value.to_csr())
        }
    }
}

impl From<Array2<f64>> for ExpMatrix {
    fn from(value: Array2<f64>) -> Self {
        ExpMatrix::Dense(value)
    }
}

impl ExpMatrix {
    /// Build a CSR matrix from `(row, col, value)` triplets. Repeated
    /// coordinates are summed.
    pub fn from_triplets(
        shape: (usize, usize),
        triplets: impl IntoIterator<Item = (usize, usize, f64)>,
    ) -> Self {
        let mut tri = TriMat::new(shape);
        for (row, col, value) in triplets {
            tri.add_triplet(row, col, value);
        }
        let csr: CsMat<f64> = tri.to_csr();
        ExpMatrix::Sparse(csr)
    }

    pub fn shape(&self) -> (usize, usize) {
        match self {
            ExpMatrix::Sparse(m) => m.shape(),
            ExpMatrix::Dense(m) => m.dim(),
        }
    }

    pub fn n_cells(&self) -> usize {
        self.shape().0
    }

    pub fn n_genes(&self) -> usize {
        self.shape().1
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, ExpMatrix::Sparse(_))
    }

    /// Number of stored non-zero entries.
    pub fn nnz(&self) -> usize {
        match self {
            ExpMatrix::Sparse(m) => m.data().iter().filter(|v| **v != 0.0).count(),
            ExpMatrix::Dense(m) => m.iter().filter(|v| **v != 0.0).count(),
        }
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        match self {
            ExpMatrix::Sparse(m) => m.get(row, col).copied().unwrap_or(0.0),
            ExpMatrix::Dense(m) => m[[row, col]],
        }
    }

    /// Iterate the non-zero entries in row-major order.
    pub fn iter_nonzero(&self) -> Box<dyn Iterator<Item = (usize, usize, f64)> + '_> {
        match self {
            ExpMatrix::Sparse(m) => Box::new(
                m.outer_iterator()
                    .enumerate()
                    .flat_map(|(row, vec)| {
                        vec.iter()
                            .map(move |(col, &value)| (row, col, value))
                            .collect::<Vec<_>>()
                    })
                    .filter(|(_, _, value)| *value != 0.0),
            ),
            ExpMatrix::Dense(m) => Box::new(
                m.indexed_iter()
                    .filter(|(_, value)| **value != 0.0)
                    .map(|((row, col), &value)| (row, col, value)),
            ),
        }
    }

    pub fn row_dense(&self, row: usize) -> Array1<f64> {
        match self {
            ExpMatrix::Sparse(m) => {
                let mut out = Array1::zeros(m.cols());
                if let Some(vec) = m.outer_view(row) {
                    for (col, &value) in vec.iter() {
                        out[col] += value;
                    }
                }
                out
            }
            ExpMatrix::Dense(m) => m.row(row).to_owned(),
        }
    }

    pub fn column_dense(&self, col: usize) -> Array1<f64> {
        match self {
            ExpMatrix::Sparse(m) => {
                let mut out = Array1::zeros(m.rows());
                for (row, vec) in m.outer_iterator().enumerate() {
                    if let Some(&value) = vec.get(col) {
                        out[row] = value;
                    }
                }
                out
            }
            ExpMatrix::Dense(m) => m.column(col).to_owned(),
        }
    }

    pub fn to_dense(&self) -> Array2<f64> {
        match self {
            ExpMatrix::Sparse(m) => {
                let mut out = Array2::zeros(m.shape());
                for (row, vec) in m.outer_iterator().enumerate() {
                    for (col, &value) in vec.iter() {
                        out[[row, col]] += value;
                    }
                }
                out
            }
            ExpMatrix::Dense(m) => m.clone(),
        }
    }

    /// Dense copy of the columns in `cols`, in the order given.
    pub fn dense_columns(&self, cols: &[usize]) -> Array2<f64> {
        let mut position = vec![None; self.n_genes()];
        for (k, &col) in cols.iter().enumerate() {
            position[col] = Some(k);
        }
        let mut out = Array2::zeros((self.n_cells(), cols.len()));
        match self {
            ExpMatrix::Sparse(m) => {
                for (row, vec) in m.outer_iterator().enumerate() {
                    for (col, &value) in vec.iter() {
                        if let Some(k) = position[col] {
                            out[[row, k]] = value;
                        }
                    }
                }
            }
            ExpMatrix::Dense(m) => {
                for (k, &col) in cols.iter().enumerate() {
                    out.column_mut(k).assign(&m.column(col));
                }
            }
        }
        out
    }

    /// Keep the given rows and columns, in the order given. The layout is
    /// preserved.
    pub fn select(&self, rows: &[usize], cols: &[usize]) -> ExpMatrix {
        match self {
            ExpMatrix::Sparse(m) => {
                let mut col_map = vec![None; m.cols()];
                for (k, &col) in cols.iter().enumerate() {
                    col_map[col] = Some(k);
                }
                let mut tri = TriMat::new((rows.len(), cols.len()));
                for (new_row, &row) in rows.iter().enumerate() {
                    if let Some(vec) = m.outer_view(row) {
                        for (col, &value) in vec.iter() {
                            if let Some(new_col) = col_map[col] {
                                tri.add_triplet(new_row, new_col, value);
                            }
                        }
                    }
                }
                let csr: CsMat<f64> = tri.to_csr();
                ExpMatrix::Sparse(csr)
            }
            ExpMatrix::Dense(m) => {
                ExpMatrix::Dense(m.select(Axis(0), rows).select(Axis(1), cols))
            }
        }
    }

    /// Apply `f` to every stored value. For sparse storage implicit zeros are
    /// left untouched, so `f` should map zero to zero.
    pub fn map_values(&self, f: impl Fn(f64) -> f64) -> ExpMatrix {
        match self {
            ExpMatrix::Sparse(m) => ExpMatrix::Sparse(m.map(|&v| f(v))),
            ExpMatrix::Dense(m) => ExpMatrix::Dense(m.mapv(f)),
        }
    }

    /// Multiply every entry of row `i` by `factors[i]`.
    pub fn scale_rows(&self, factors: &[f64]) -> ExpMatrix {
        match self {
            ExpMatrix::Sparse(m) => {
                let mut out = m.clone();
                for (row, mut vec) in out.outer_iterator_mut().enumerate() {
                    for (_, value) in vec.iter_mut() {
                        *value *= factors[row];
                    }
                }
                ExpMatrix::Sparse(out)
            }
            ExpMatrix::Dense(m) => {
                let mut out = m.clone();
                for (mut row, &factor) in out.axis_iter_mut(Axis(0)).zip(factors) {
                    row *= factor;
                }
                ExpMatrix::Dense(out)
            }
        }
    }

    pub fn row_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.n_cells()];
        for (row, _, value) in self.iter_nonzero() {
            sums[row] += value;
        }
        sums
    }

    pub fn col_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.n_genes()];
        for (_, col, value) in self.iter_nonzero() {
            sums[col] += value;
        }
        sums
    }

    /// Count of non-zero entries per row.
    pub fn row_nonzero(&self) -> Vec<usize> {
        let mut counts = vec![0; self.n_cells()];
        for (row, _, _) in self.iter_nonzero() {
            counts[row] += 1;
        }
        counts
    }

    /// Count of non-zero entries per column.
    pub fn col_nonzero(&self) -> Vec<usize> {
        let mut counts = vec![0; self.n_genes()];
        for (_, col, _) in self.iter_nonzero() {
            counts[col] += 1;
        }
        counts
    }

    /// Sum rows that share a label. Returns `labels.len() x n_genes`, row `k`
    /// holding the sum over cells with `assignment[cell] == k`.
    pub fn sum_rows_by(&self, assignment: &[usize], n_labels: usize) -> Array2<f64> {
        let mut out = Array2::zeros((n_labels, self.n_genes()));
        for (row, col, value) in self.iter_nonzero() {
            out[[assignment[row], col]] += value;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> ExpMatrix {
        ExpMatrix::from_triplets(
            (3, 3),
            vec![(0, 0, 1.0), (0, 2, 2.0), (1, 1, 3.0), (2, 0, 4.0), (2, 0, 1.0)],
        )
    }

    #[test]
    fn test_layouts_agree() {
        let sparse = sample();
        let dense = ExpMatrix::from(sparse.to_dense());
        assert_eq!(
            sparse.to_dense(),
            array![[1.0, 0.0, 2.0], [0.0, 3.0, 0.0], [5.0, 0.0, 0.0]]
        );
        assert_eq!(sparse.row_sums(), dense.row_sums());
        assert_eq!(sparse.col_sums(), vec![6.0, 3.0, 2.0]);
        assert_eq!(sparse.col_nonzero(), dense.col_nonzero());
        assert_eq!(sparse.row_nonzero(), vec![2, 1, 1]);
        assert_eq!(sparse.column_dense(0), dense.column_dense(0));
        assert_eq!(sparse.row_dense(2), array![5.0, 0.0, 0.0]);
        assert_eq!(sparse.get(1, 1), 3.0);
        assert_eq!(sparse.get(1, 2), 0.0);
        assert_eq!(sparse.nnz(), 4);
    }

    #[test]
    fn test_select() {
        let sparse = sample();
        let picked = sparse.select(&[2, 0], &[2, 0]);
        assert!(picked.is_sparse());
        assert_eq!(picked.to_dense(), array![[0.0, 5.0], [2.0, 1.0]]);
        let dense = ExpMatrix::from(sparse.to_dense()).select(&[2, 0], &[2, 0]);
        assert_eq!(dense.to_dense(), picked.to_dense());
        assert_eq!(sparse.dense_columns(&[1, 0]), array![[0.0, 1.0], [3.0, 0.0], [0.0, 5.0]]);
    }

    #[test]
    fn test_scale_and_group() {
        let sparse = sample();
        let scaled = sparse.scale_rows(&[2.0, 1.0, 0.5]);
        assert_eq!(scaled.row_sums(), vec![6.0, 3.0, 2.5]);
        let logged = sparse.map_values(|v| v * 10.0);
        assert_eq!(logged.get(0, 2), 20.0);
        let grouped = sparse.sum_rows_by(&[0, 1, 0], 2);
        assert_eq!(grouped, array![[6.0, 0.0, 2.0], [0.0, 3.0, 0.0]]);
    }
}

#![allow(missing_docs)]

use crate::result::{AnalysisResult, ClusterResult, ResultStore};
use crate::{BinType, Cells, DataError, ExpMatrix, Genes};
use ndarray::{Array2, Axis};

/// An expression matrix with its cell and gene annotation, spatial
/// positions and accumulated analysis results.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpData {
    cells: Cells,
    genes: Genes,
    matrix: ExpMatrix,
    position: Array2<f64>,
    bin_type: BinType,
    results: ResultStore,
}

impl ExpData {
    pub fn new(
        cells: Cells,
        genes: Genes,
        matrix: ExpMatrix,
        position: Array2<f64>,
        bin_type: BinType,
    ) -> Result<Self, DataError> {
        let (rows, cols) = matrix.shape();
        if rows != cells.len() || cols != genes.len() {
            return Err(DataError::ShapeMismatch(format!(
                "matrix is {rows}x{cols} but there are {} cells and {} genes",
                cells.len(),
                genes.len()
            )));
        }
        if position.dim() != (rows, 2) {
            return Err(DataError::ShapeMismatch(format!(
                "positions are {:?}, expected ({rows}, 2)",
                position.dim()
            )));
        }
        Ok(ExpData {
            cells,
            genes,
            matrix,
            position,
            bin_type,
            results: ResultStore::default(),
        })
    }

    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn n_genes(&self) -> usize {
        self.genes.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.n_cells(), self.n_genes())
    }

    pub fn cells(&self) -> &Cells {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut Cells {
        &mut self.cells
    }

    pub fn genes(&self) -> &Genes {
        &self.genes
    }

    pub fn genes_mut(&mut self) -> &mut Genes {
        &mut self.genes
    }

    pub fn matrix(&self) -> &ExpMatrix {
        &self.matrix
    }

    /// Replace the expression values. The shape must not change.
    pub fn set_matrix(&mut self, matrix: ExpMatrix) -> Result<(), DataError> {
        if matrix.shape() != self.matrix.shape() {
            return Err(DataError::ShapeMismatch(format!(
                "new matrix is {:?}, expected {:?}",
                matrix.shape(),
                self.matrix.shape()
            )));
        }
        self.matrix = matrix;
        Ok(())
    }

    pub fn position(&self) -> &Array2<f64> {
        &self.position
    }

    pub fn bin_type(&self) -> BinType {
        self.bin_type
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    pub fn cell_index(&self, name: &str) -> Option<usize> {
        self.cells.index_of(name)
    }

    pub fn gene_index(&self, name: &str) -> Option<usize> {
        self.genes.index_of(name)
    }

    /// Store a result under `key`. Cluster results become the cell column
    /// `key`.
    pub fn insert_result(&mut self, key: &str, result: AnalysisResult) -> Result<(), DataError> {
        match result {
            AnalysisResult::Cluster(cluster) => {
                self.cells.set_categorical(key, cluster.groups)?;
                self.results.mark_cluster(key.to_string());
            }
            other => self.results.insert(key.to_string(), other),
        }
        Ok(())
    }

    pub fn result(&self, key: &str) -> Option<&AnalysisResult> {
        self.results.get(key)
    }

    pub fn remove_result(&mut self, key: &str) -> Option<AnalysisResult> {
        let cluster = self.results.is_cluster_key(key);
        let removed = self.results.remove(key);
        if cluster {
            let groups = self.cells.categorical(key).map(<[String]>::to_vec);
            self.cells.remove(key);
            return groups.map(|groups| AnalysisResult::Cluster(ClusterResult { groups }));
        }
        removed
    }

    /// Group labels for `key`, read from the cell columns.
    pub fn cluster(&self, key: &str) -> Result<&[String], DataError> {
        self.cells
            .categorical(key)
            .ok_or_else(|| DataError::not_found("cluster column", key))
    }

    /// True when `key` names a stored result or a cell column.
    pub fn contains(&self, key: &str) -> bool {
        self.results.contains(key) || self.cells.contains(key)
    }

    /// Subset by position. Annotation columns follow the selection; results
    /// other than cluster columns are dropped since they describe the full
    /// data.
    pub fn sub_by_index(&self, cells: &[usize], genes: &[usize]) -> ExpData {
        let mut results = ResultStore::default();
        for key in self.results.cluster_keys() {
            results.mark_cluster(key.clone());
        }
        ExpData {
            cells: self.cells.select(cells),
            genes: self.genes.select(genes),
            matrix: self.matrix.select(cells, genes),
            position: self.position.select(Axis(0), cells),
            bin_type: self.bin_type,
            results,
        }
    }

    /// Subset by name. `None` keeps every cell (or gene); unknown names are
    /// errors.
    pub fn sub_by_name<S: AsRef<str>>(
        &self,
        cells: Option<&[S]>,
        genes: Option<&[S]>,
    ) -> Result<ExpData, DataError> {
        let cell_idx = match cells {
            Some(names) => self.cells.indices_of(names)?,
            None => (0..self.n_cells()).collect(),
        };
        let gene_idx = match genes {
            Some(names) => self.genes.indices_of(names)?,
            None => (0..self.n_genes()).collect(),
        };
        Ok(self.sub_by_index(&cell_idx, &gene_idx))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ndarray::array;

    pub(crate) fn toy_data() -> ExpData {
        let cells = Cells::cells(vec!["c0".into(), "c1".into(), "c2".into()]).unwrap();
        let genes = Genes::genes(vec!["g0".into(), "MT-1".into()]).unwrap();
        let matrix = ExpMatrix::from_triplets((3, 2), vec![(0, 0, 1.0), (1, 1, 2.0), (2, 0, 3.0)]);
        let position = array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        ExpData::new(cells, genes, matrix, position, BinType::Bins(1)).unwrap()
    }

    #[test]
    fn test_shape_checks() {
        let cells = Cells::cells(vec!["c0".into()]).unwrap();
        let genes = Genes::genes(vec!["g0".into()]).unwrap();
        let err = ExpData::new(
            cells.clone(),
            genes.clone(),
            ExpMatrix::Dense(Array2::zeros((2, 1))),
            Array2::zeros((1, 2)),
            BinType::CellBins,
        );
        assert!(matches!(err, Err(DataError::ShapeMismatch(_))));
        let err = ExpData::new(
            cells,
            genes,
            ExpMatrix::Dense(Array2::zeros((1, 1))),
            Array2::zeros((1, 3)),
            BinType::CellBins,
        );
        assert!(matches!(err, Err(DataError::ShapeMismatch(_))));
    }

    #[test]
    fn test_cluster_routing() {
        let mut data = toy_data();
        data.insert_result(
            "leiden",
            AnalysisResult::Cluster(ClusterResult {
                groups: vec!["1".into(), "2".into(), "1".into()],
            }),
        )
        .unwrap();
        assert!(data.contains("leiden"));
        assert!(data.result("leiden").is_none());
        assert_eq!(data.cluster("leiden").unwrap(), ["1", "2", "1"]);

        let bad = AnalysisResult::Cluster(ClusterResult {
            groups: vec!["1".into()],
        });
        assert!(data.insert_result("short", bad).is_err());

        let removed = data.remove_result("leiden").unwrap();
        assert_eq!(removed.kind(), "cluster");
        assert!(!data.contains("leiden"));
    }

    #[test]
    fn test_subset() {
        let mut data = toy_data();
        data.cells_mut()
            .set_categorical("leiden", vec!["a".into(), "b".into(), "c".into()])
            .unwrap();
        let sub = data
            .sub_by_name(Some(&["c2", "c0"][..]), Some(&["g0"][..])).unwrap();
        assert_eq!(sub.shape(), (2, 1));
        assert_eq!(sub.matrix().to_dense(), array![[3.0], [1.0]]);
        assert_eq!(sub.position(), &array![[0.0, 1.0], [0.0, 0.0]]);
        assert_eq!(sub.cells().categorical("leiden").unwrap(), ["c", "a"]);
        assert!(data.sub_by_name(Some(&["nope"][..]), None).is_err());
        let all = data.sub_by_name::<&str>(None, None).unwrap();
        assert_eq!(all.shape(), data.shape());
    }
}

use ndarray::Array2;
use st_types::{AnalysisResult, BinType, Cells, ClusterResult, ExpData, ExpMatrix, Genes};

/// Cells `c0..`, the given genes, positions `(i, 2i)`.
pub(crate) fn dense_data(matrix: Array2<f64>, genes: &[&str]) -> ExpData {
    let n = matrix.nrows();
    let cells = Cells::cells((0..n).map(|i| format!("c{i}")).collect()).unwrap();
    let genes = Genes::genes(genes.iter().map(|g| g.to_string()).collect()).unwrap();
    let position = Array2::from_shape_fn((n, 2), |(i, j)| (i * (j + 1)) as f64);
    ExpData::new(cells, genes, ExpMatrix::Dense(matrix), position, BinType::CellBins).unwrap()
}

pub(crate) fn with_cluster(mut data: ExpData, key: &str, groups: &[&str]) -> ExpData {
    data.insert_result(
        key,
        AnalysisResult::Cluster(ClusterResult {
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }),
    )
    .unwrap();
    data
}

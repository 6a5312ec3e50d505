//! Typed analysis outputs and the keyed store that holds them.
#![allow(missing_docs)]

use ndarray::{Array2, Array3};

/// One group label per cell, for example a leiden clustering or a cell-type
/// annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterResult {
    pub groups: Vec<String>,
}

/// Output of a co-occurrence analysis.
///
/// `values[[c, n, r]]` is the score of neighbor `neighbors[n]` around center
/// group `groups[c]` for the distance ring ending at `thresholds[r]`. In
/// cluster mode `neighbors == groups`; in gene mode `neighbors` are genes.
#[derive(Debug, Clone, PartialEq)]
pub struct CoOccurrenceResult {
    pub groups: Vec<String>,
    pub neighbors: Vec<String>,
    pub thresholds: Vec<f64>,
    pub values: Array3<f64>,
}

impl CoOccurrenceResult {
    /// Rows are neighbors and columns are center groups for ring `ring`.
    pub fn ring_table(&self, ring: usize) -> Array2<f64> {
        self.values
            .index_axis(ndarray::Axis(2), ring)
            .t()
            .to_owned()
    }
}

/// Per observation reference-label scores from SingleR.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleRResult {
    /// observation names (cells or clusters)
    pub bins: Vec<String>,
    /// label assigned after fine tuning
    pub groups: Vec<String>,
    /// best label before fine tuning
    pub first_labels: Vec<String>,
    /// reference labels, the columns of `scores`
    pub labels: Vec<String>,
    pub scores: Array2<f64>,
}

/// Spatial lag regression coefficients: genes on rows, explanatory
/// variables (intercept, group dummies, the lag term) on columns.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialLagResult {
    pub genes: Vec<String>,
    pub variables: Vec<String>,
    pub coeff: Array2<f64>,
    pub zstat: Array2<f64>,
    pub pval: Array2<f64>,
}

impl SpatialLagResult {
    /// Column headers in `{variable}_lag_coeff`, `_lag_zstat`, `_lag_pval`
    /// triples.
    pub fn column_names(&self) -> Vec<String> {
        self.variables
            .iter()
            .flat_map(|v| {
                ["coeff", "zstat", "pval"]
                    .into_iter()
                    .map(move |suffix| format!("{v}_lag_{suffix}"))
            })
            .collect()
    }
}

/// Anything an analysis can leave behind on an `ExpData`.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisResult {
    Cluster(ClusterResult),
    /// A derived cell x gene matrix, for example from a non-inplace normalize.
    Matrix(Array2<f64>),
    CoOccurrence(CoOccurrenceResult),
    SingleR(SingleRResult),
    SpatialLag(SpatialLagResult),
}

impl AnalysisResult {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisResult::Cluster(_) => "cluster",
            AnalysisResult::Matrix(_) => "matrix",
            AnalysisResult::CoOccurrence(_) => "co_occurrence",
            AnalysisResult::SingleR(_) => "single_r",
            AnalysisResult::SpatialLag(_) => "spatial_lag",
        }
    }
}

/// Non-cluster results keyed by name, in insertion order. Cluster results
/// live in the cell annotations; only their keys are tracked here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultStore {
    entries: Vec<(String, AnalysisResult)>,
    cluster_keys: Vec<String>,
}

impl ResultStore {
    pub fn get(&self, key: &str) -> Option<&AnalysisResult> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some() || self.is_cluster_key(key)
    }

    pub fn is_cluster_key(&self, key: &str) -> bool {
        self.cluster_keys.iter().any(|k| k == key)
    }

    pub fn cluster_keys(&self) -> &[String] {
        &self.cluster_keys
    }

    /// Keys of the stored non-cluster results, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub(crate) fn insert(&mut self, key: String, result: AnalysisResult) {
        self.cluster_keys.retain(|k| *k != key);
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = result,
            None => self.entries.push((key, result)),
        }
    }

    pub(crate) fn mark_cluster(&mut self, key: String) {
        self.entries.retain(|(k, _)| *k != key);
        if !self.is_cluster_key(&key) {
            self.cluster_keys.push(key);
        }
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<AnalysisResult> {
        self.cluster_keys.retain(|k| k != key);
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.cluster_keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_replaces_and_routes() {
        let mut store = ResultStore::default();
        store.insert("norm".into(), AnalysisResult::Matrix(Array2::zeros((1, 1))));
        store.insert("norm".into(), AnalysisResult::Matrix(Array2::ones((1, 1))));
        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["norm"]);
        assert_eq!(
            store.get("norm"),
            Some(&AnalysisResult::Matrix(Array2::ones((1, 1))))
        );

        store.mark_cluster("leiden".into());
        assert!(store.contains("leiden"));
        assert!(store.get("leiden").is_none());

        store.mark_cluster("norm".into());
        assert!(store.get("norm").is_none());
        assert_eq!(store.cluster_keys(), ["leiden", "norm"]);
    }

    #[test]
    fn test_lag_column_names() {
        let res = SpatialLagResult {
            genes: vec!["g".into()],
            variables: vec!["const".into(), "W_log_exp".into()],
            coeff: Array2::zeros((1, 2)),
            zstat: Array2::zeros((1, 2)),
            pval: Array2::zeros((1, 2)),
        };
        assert_eq!(
            res.column_names(),
            vec![
                "const_lag_coeff",
                "const_lag_zstat",
                "const_lag_pval",
                "W_log_exp_lag_coeff",
                "W_log_exp_lag_zstat",
                "W_log_exp_lag_pval"
            ]
        );
    }
}

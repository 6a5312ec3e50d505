//! A stateful analysis session over one `ExpData`.
#![allow(missing_docs)]

use crate::preprocess::{self, CellFilter, CoordinateFilter, GeneFilter, TargetSum};
use crate::single_r::{single_r, SingleRParams};
use crate::time_series::{self, FuzzyCParams, PValCombination};
use anyhow::{ensure, Context, Result};
use log::info;
use spatial::{co_occurrence, spatial_lag, CoOccurrenceParams, SpatialLagParams};
use st_types::{AnalysisResult, ClusterResult, ExpData, ExpMatrix};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

/// Run `f`, logging its start, its end and the time it took.
fn logged<T>(name: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    info!("start to run {name}...");
    let start = Instant::now();
    let out = f().with_context(|| format!("{name} failed"))?;
    info!("{name} end, consume time {:.4}s.", start.elapsed().as_secs_f64());
    Ok(out)
}

/// Holds the working data, an optional raw checkpoint and, per kind of
/// result, the keys that results of that kind were stored under (most
/// recent last).
#[derive(Debug, Clone)]
pub struct StPipeline {
    data: ExpData,
    raw: Option<ExpData>,
    key_record: BTreeMap<String, Vec<String>>,
}

impl StPipeline {
    pub fn new(data: ExpData) -> Self {
        StPipeline {
            data,
            raw: None,
            key_record: BTreeMap::new(),
        }
    }

    pub fn data(&self) -> &ExpData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut ExpData {
        &mut self.data
    }

    pub fn into_data(self) -> ExpData {
        self.data
    }

    pub fn raw(&self) -> Option<&ExpData> {
        self.raw.as_ref()
    }

    /// Save a copy of the current data as the raw data.
    pub fn raw_checkpoint(&mut self) {
        self.raw = Some(self.data.clone());
    }

    /// Replace the current data with the raw checkpoint.
    pub fn reset_raw_data(&mut self) -> Result<()> {
        self.data = self
            .raw
            .clone()
            .context("no raw data, run raw_checkpoint first")?;
        Ok(())
    }

    pub fn key_record(&self) -> &BTreeMap<String, Vec<String>> {
        &self.key_record
    }

    /// Record `res_key` as the latest result of kind `key`.
    pub fn reset_key_record(&mut self, key: &str, res_key: &str) {
        let keys = self.key_record.entry(key.to_string()).or_default();
        keys.retain(|k| k != res_key);
        keys.push(res_key.to_string());
    }

    pub fn cal_qc(&mut self) -> Result<()> {
        logged("cal_qc", || preprocess::cal_qc(&mut self.data))
    }

    /// Keep the cells passing `filter`. With `inplace` the working data is
    /// replaced and `None` returned, otherwise the filtered copy is returned.
    pub fn filter_cells(&mut self, filter: &CellFilter, inplace: bool) -> Result<Option<ExpData>> {
        let filtered = logged("filter_cells", || preprocess::filter_cells(&self.data, filter))?;
        Ok(self.replace_or_return(filtered, inplace))
    }

    pub fn filter_genes(&mut self, filter: &GeneFilter, inplace: bool) -> Result<Option<ExpData>> {
        let filtered = logged("filter_genes", || preprocess::filter_genes(&self.data, filter))?;
        Ok(self.replace_or_return(filtered, inplace))
    }

    pub fn filter_coordinates(
        &mut self,
        filter: &CoordinateFilter,
        inplace: bool,
    ) -> Result<Option<ExpData>> {
        let filtered = logged("filter_coordinates", || {
            preprocess::filter_coordinates(&self.data, filter)
        })?;
        Ok(self.replace_or_return(filtered, inplace))
    }

    fn replace_or_return(&mut self, data: ExpData, inplace: bool) -> Option<ExpData> {
        if inplace {
            self.data = data;
            None
        } else {
            Some(data)
        }
    }

    /// Either replace the matrix or store the dense result under `res_key`.
    fn store_matrix(&mut self, matrix: ExpMatrix, inplace: bool, res_key: &str) -> Result<()> {
        if inplace {
            self.data.set_matrix(matrix)?;
        } else {
            self.data
                .insert_result(res_key, AnalysisResult::Matrix(matrix.to_dense()))?;
        }
        Ok(())
    }

    pub fn log1p(&mut self, inplace: bool, res_key: &str) -> Result<()> {
        logged("log1p", || {
            let matrix = preprocess::log1p(self.data.matrix());
            self.store_matrix(matrix, inplace, res_key)
        })
    }

    pub fn normalize_total(&mut self, target: TargetSum, inplace: bool, res_key: &str) -> Result<()> {
        logged("normalize_total", || {
            let matrix = preprocess::normalize_total(self.data.matrix(), target);
            self.store_matrix(matrix, inplace, res_key)
        })
    }

    pub fn scale(
        &mut self,
        zero_center: bool,
        max_value: Option<f64>,
        inplace: bool,
        res_key: &str,
    ) -> Result<()> {
        logged("scale", || {
            let scaled = preprocess::scale(self.data.matrix(), zero_center, max_value);
            self.store_matrix(ExpMatrix::Dense(scaled), inplace, res_key)
        })
    }

    /// Rename the groups of cluster `cluster_res_key` through `mapping` and
    /// store the renamed labels as cluster `res_key`. Every group needs a
    /// new name.
    pub fn annotation(
        &mut self,
        mapping: &HashMap<String, String>,
        cluster_res_key: &str,
        res_key: &str,
    ) -> Result<()> {
        logged("annotation", || {
            let groups = self
                .data
                .cluster(cluster_res_key)?
                .iter()
                .map(|g| {
                    mapping
                        .get(g)
                        .cloned()
                        .with_context(|| format!("no annotation for group {g}"))
                })
                .collect::<Result<Vec<_>>>()?;
            self.data
                .insert_result(res_key, AnalysisResult::Cluster(ClusterResult { groups }))?;
            Ok(())
        })?;
        self.reset_key_record("cluster", res_key);
        Ok(())
    }

    pub fn co_occurrence(
        &mut self,
        use_col: &str,
        params: &CoOccurrenceParams,
        res_key: &str,
    ) -> Result<()> {
        logged("co_occurrence", || {
            let result = co_occurrence(&self.data, use_col, params)?;
            self.data
                .insert_result(res_key, AnalysisResult::CoOccurrence(result))?;
            Ok(())
        })
    }

    pub fn spatial_lag(
        &mut self,
        cluster_res_key: &str,
        params: &SpatialLagParams,
        res_key: &str,
    ) -> Result<()> {
        ensure!(
            self.data.contains(cluster_res_key),
            "{cluster_res_key} is not in the result, run a clustering first"
        );
        logged("spatial_lag", || {
            let result = spatial_lag(&self.data, cluster_res_key, params)?;
            self.data
                .insert_result(res_key, AnalysisResult::SpatialLag(result))?;
            Ok(())
        })
    }

    /// Annotate with SingleR against `reference`. The score table is stored
    /// under `res_key`; when cells are annotated one by one their labels
    /// also become the cluster column `ref_use_col`.
    pub fn single_r(
        &mut self,
        reference: &ExpData,
        ref_use_col: &str,
        test_cluster_col: Option<&str>,
        params: &SingleRParams,
        res_key: &str,
    ) -> Result<()> {
        logged("single_r", || {
            let result = single_r(&self.data, reference, ref_use_col, test_cluster_col, params)?;
            if test_cluster_col.is_none() {
                self.data.insert_result(
                    ref_use_col,
                    AnalysisResult::Cluster(ClusterResult {
                        groups: result.groups.clone(),
                    }),
                )?;
            }
            self.data
                .insert_result(res_key, AnalysisResult::SingleR(result))?;
            Ok(())
        })?;
        if test_cluster_col.is_none() {
            self.reset_key_record("cluster", ref_use_col);
        }
        Ok(())
    }

    pub fn tvg_marker<S: AsRef<str>>(
        &mut self,
        use_col: &str,
        branch: &[S],
        combination: PValCombination,
    ) -> Result<()> {
        logged("tvg_marker", || {
            time_series::tvg_marker(&mut self.data, use_col, branch, combination)
        })
    }

    pub fn fuzzy_c_gene_pattern_cluster<S: AsRef<str>>(
        &mut self,
        clusters: usize,
        params: &FuzzyCParams,
        tvg: Option<(&str, &[S])>,
    ) -> Result<()> {
        logged("fuzzy_c_gene_pattern_cluster", || {
            time_series::fuzzy_c_gene_pattern_cluster(&mut self.data, clusters, params, tvg)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::{N_GENES_BY_COUNTS, TOTAL_COUNTS};
    use crate::testing::{dense_data, with_cluster};
    use ndarray::array;

    fn pipeline() -> StPipeline {
        let data = dense_data(
            array![[1.0, 0.0], [3.0, 1.0], [0.0, 0.0], [2.0, 2.0]],
            &["a", "b"],
        );
        StPipeline::new(with_cluster(data, "leiden", &["1", "2", "1", "2"]))
    }

    #[test]
    fn test_raw_checkpoint() -> Result<()> {
        let mut pipe = pipeline();
        assert!(pipe.reset_raw_data().is_err());
        pipe.raw_checkpoint();
        pipe.log1p(true, "log1p")?;
        assert!((pipe.data().matrix().get(0, 0) - 2f64.ln()).abs() < 1e-12);
        pipe.reset_raw_data()?;
        assert_eq!(pipe.data().matrix().get(0, 0), 1.0);
        Ok(())
    }

    #[test]
    fn test_not_inplace_stores_matrix() -> Result<()> {
        let mut pipe = pipeline();
        pipe.normalize_total(TargetSum::Fixed(4.0), false, "normalize_total")?;
        assert_eq!(pipe.data().matrix().get(1, 0), 3.0);
        match pipe.data().result("normalize_total") {
            Some(AnalysisResult::Matrix(m)) => assert_eq!(m.row(1), array![3.0, 1.0]),
            other => panic!("unexpected {other:?}"),
        }

        pipe.scale(true, None, false, "scale")?;
        assert!(matches!(pipe.data().result("scale"), Some(AnalysisResult::Matrix(_))));
        Ok(())
    }

    #[test]
    fn test_filters() -> Result<()> {
        let mut pipe = pipeline();
        pipe.cal_qc()?;
        assert_eq!(
            pipe.data().cells().numeric(TOTAL_COUNTS).unwrap(),
            [1.0, 4.0, 0.0, 4.0]
        );
        let filter = CellFilter {
            min_gene: Some(1),
            ..Default::default()
        };
        let copy = pipe.filter_cells(&filter, false)?.unwrap();
        assert_eq!(copy.n_cells(), 3);
        assert_eq!(pipe.data().n_cells(), 4);

        assert!(pipe.filter_cells(&filter, true)?.is_none());
        assert_eq!(pipe.data().cells().names(), ["c0", "c1", "c3"]);
        // qc columns and clusters follow the cells
        assert_eq!(
            pipe.data().cells().numeric(N_GENES_BY_COUNTS).unwrap(),
            [1.0, 2.0, 2.0]
        );
        assert_eq!(pipe.data().cluster("leiden")?, ["1", "2", "2"]);
        Ok(())
    }

    #[test]
    fn test_annotation_and_key_record() -> Result<()> {
        let mut pipe = pipeline();
        let mapping: HashMap<String, String> = [("1", "neuron"), ("2", "glia")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        pipe.annotation(&mapping, "leiden", "anno")?;
        assert_eq!(pipe.data().cluster("anno")?, ["neuron", "glia", "neuron", "glia"]);
        pipe.annotation(&mapping, "leiden", "anno2")?;
        pipe.annotation(&mapping, "leiden", "anno")?;
        assert_eq!(pipe.key_record()["cluster"], ["anno2", "anno"]);

        let partial: HashMap<String, String> =
            [("1".to_string(), "neuron".to_string())].into_iter().collect();
        assert!(pipe.annotation(&partial, "leiden", "bad").is_err());
        assert!(!pipe.data().contains("bad"));
        Ok(())
    }

    #[test]
    fn test_spatial_lag_needs_cluster() {
        let mut pipe = pipeline();
        assert!(pipe
            .spatial_lag("louvain", &SpatialLagParams::default(), "spatial_lag")
            .is_err());
    }
}

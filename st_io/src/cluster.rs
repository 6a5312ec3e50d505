#![allow(missing_docs)]

use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;
use st_types::{AnalysisResult, ClusterResult, ExpData};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct ClusterRow {
    bins: String,
    group: String,
}

/// Read a `bins,group` CSV into `(cell name, group)` pairs.
pub fn read_cluster_csv(path: &Path) -> Result<Vec<(String, String)>> {
    let mut reader = csv::Reader::from_path(path).with_context(|| path.display().to_string())?;
    reader
        .deserialize::<ClusterRow>()
        .map(|row| {
            let ClusterRow { bins, group } = row?;
            Ok((bins, group))
        })
        .collect::<Result<_>>()
        .with_context(|| path.display().to_string())
}

/// Store the grouping as cluster result `key`. Every cell of `data` must
/// appear in `rows`; rows for unknown cells are ignored.
pub fn attach_cluster(data: &mut ExpData, key: &str, rows: &[(String, String)]) -> Result<()> {
    let lookup: HashMap<&str, &str> = rows
        .iter()
        .map(|(bins, group)| (bins.as_str(), group.as_str()))
        .collect();
    let groups = data
        .cells()
        .names()
        .iter()
        .map(|cell| {
            lookup
                .get(cell.as_str())
                .map(|g| g.to_string())
                .with_context(|| format!("cell {cell} has no group in cluster {key}"))
        })
        .collect::<Result<Vec<_>>>()?;
    let unused = rows
        .iter()
        .filter(|(bins, _)| data.cell_index(bins).is_none())
        .count();
    if unused > 0 {
        warn!("{unused} rows of cluster {key} name cells that are not in the data");
    }
    data.insert_result(key, AnalysisResult::Cluster(ClusterResult { groups }))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gem::{gem_to_exp_data, parse_gem};
    use st_types::BinType;

    #[test]
    fn test_attach_cluster() -> Result<()> {
        let records = parse_gem("geneID\tx\ty\tUMICount\tlabel\nA\t0\t0\t1\t1\nA\t1\t0\t1\t2\n".as_bytes())?;
        let mut data = gem_to_exp_data(&records, BinType::CellBins)?;

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("cluster.csv");
        std::fs::write(&path, "bins,group\n2,b\n1,a\n9,c\n")?;
        let rows = read_cluster_csv(&path)?;
        attach_cluster(&mut data, "leiden", &rows)?;
        assert_eq!(data.cluster("leiden")?, ["a", "b"]);

        let partial = vec![("1".to_string(), "a".to_string())];
        assert!(attach_cluster(&mut data, "partial", &partial).is_err());
        Ok(())
    }
}

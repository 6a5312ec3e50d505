//! Co-occurrence of groups (or of groups and genes) as a function of
//! distance.
#![allow(missing_docs)]

use anyhow::{bail, ensure, Context, Result};
use log::info;
use ndarray::{Array2, Array3, ArrayView2, Axis};
use rayon::prelude::*;
use st_types::{AnalysisResult, Categories, CoOccurrenceResult, ExpData, MsData};
use stats::{distances_from, euclidean, linspace};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoOccurrenceMethod {
    /// Fraction of center cells with a neighbor group in each ring.
    Stereopy,
    /// Pair-count enrichment, conditioned on the center group.
    Squidpy,
}

impl FromStr for CoOccurrenceMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "stereopy" => CoOccurrenceMethod::Stereopy,
            "squidpy" => CoOccurrenceMethod::Squidpy,
            _ => bail!("unknown co-occurrence method {s}, expected stereopy or squidpy"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CoOccurrenceParams {
    pub method: CoOccurrenceMethod,
    /// Stereopy only: outer radius of the last ring.
    pub dist_thres: f64,
    /// Stereopy only: number of rings.
    pub steps: usize,
    /// Stereopy only: score genes around each group instead of groups.
    pub genes: Option<Vec<String>>,
    /// Stereopy only: expression needed for a gene to count.
    pub gene_thresh: f64,
    /// Squidpy only: number of distance thresholds.
    pub num_thresholds: usize,
}

impl Default for CoOccurrenceParams {
    fn default() -> Self {
        CoOccurrenceParams {
            method: CoOccurrenceMethod::Stereopy,
            dist_thres: 300.0,
            steps: 10,
            genes: None,
            gene_thresh: 0.0,
            num_thresholds: 50,
        }
    }
}

/// Ring `r` of `[t_r, t_{r+1})`.
fn ring_left_closed(thresholds: &[f64], d: f64) -> Option<usize> {
    let idx = thresholds.partition_point(|t| *t <= d);
    (idx >= 1 && idx < thresholds.len()).then(|| idx - 1)
}

/// Ring `r` of `(t_r, t_{r+1}]`.
fn ring_right_closed(thresholds: &[f64], d: f64) -> Option<usize> {
    let idx = thresholds.partition_point(|t| *t < d);
    (idx >= 1 && idx < thresholds.len()).then(|| idx - 1)
}

/// For every cell, flag which targets are present in each ring around it
/// and add one count per flagged target to the cell's group. `targets_of(y)`
/// lists the target indices cell `y` contributes.
fn count_ring_presence<'a>(
    position: ArrayView2<'_, f64>,
    codes: &[usize],
    n_groups: usize,
    n_targets: usize,
    thresholds: &[f64],
    targets_of: impl Fn(usize) -> &'a [usize] + Sync,
) -> Array3<f64> {
    let rings = thresholds.len() - 1;
    let zeros = || Array3::<f64>::zeros((n_groups, n_targets, rings));
    (0..position.nrows())
        .into_par_iter()
        .fold(zeros, |mut acc, x| {
            let dist = distances_from(position.row(x), position);
            let mut present = Array2::from_elem((rings, n_targets), false);
            for (y, &d) in dist.iter().enumerate() {
                if let Some(r) = ring_left_closed(thresholds, d) {
                    for &t in targets_of(y) {
                        present[[r, t]] = true;
                    }
                }
            }
            let center = codes[x];
            for ((r, t), &p) in present.indexed_iter() {
                if p {
                    acc[[center, t, r]] += 1.0;
                }
            }
            acc
        })
        .reduce(zeros, |a, b| a + b)
}

fn divide_by_group_size(values: &mut Array3<f64>, cats: &Categories) {
    for (mut center, size) in values.axis_iter_mut(Axis(0)).zip(cats.counts()) {
        center /= size as f64;
    }
}

fn co_occurrence_stereopy(
    data: &ExpData,
    cats: &Categories,
    params: &CoOccurrenceParams,
) -> Result<CoOccurrenceResult> {
    ensure!(params.steps > 0, "co-occurrence needs at least one step");
    let thresholds = linspace(0.0, params.dist_thres, params.steps + 1);
    let position = data.position().view();

    let (neighbors, mut values) = match &params.genes {
        None => {
            let own: Vec<[usize; 1]> = cats.codes.iter().map(|&c| [c]).collect();
            let values = count_ring_presence(
                position,
                &cats.codes,
                cats.len(),
                cats.len(),
                &thresholds,
                |y| own[y].as_slice(),
            );
            (cats.names.clone(), values)
        }
        Some(genes) => {
            let gene_idx = data.genes().indices_of(genes)?;
            let mut expressed = vec![Vec::new(); data.n_cells()];
            for (k, &g) in gene_idx.iter().enumerate() {
                for (cell, &v) in data.matrix().column_dense(g).iter().enumerate() {
                    if v >= params.gene_thresh && v > 0.0 {
                        expressed[cell].push(k);
                    }
                }
            }
            let values = count_ring_presence(
                position,
                &cats.codes,
                cats.len(),
                genes.len(),
                &thresholds,
                |y| expressed[y].as_slice(),
            );
            (genes.clone(), values)
        }
    };
    divide_by_group_size(&mut values, cats);
    Ok(CoOccurrenceResult {
        groups: cats.names.clone(),
        neighbors,
        thresholds: thresholds[1..].to_vec(),
        values,
    })
}

/// Threshold range from the points with the smallest and largest
/// coordinate sums: half the distance between the extremes, and the
/// distance between the two smallest.
fn squidpy_threshold_range(position: ArrayView2<'_, f64>) -> (f64, f64) {
    let sums: Vec<f64> = position.rows().into_iter().map(|r| r.sum()).collect();
    let mut order: Vec<usize> = (0..sums.len()).collect();
    order.sort_by(|&a, &b| sums[a].total_cmp(&sums[b]).then(a.cmp(&b)));
    let (min_idx, min_idx2) = (order[0], order[1]);
    let max_idx = (0..sums.len()).fold(0, |best, i| if sums[i] > sums[best] { i } else { best });
    let t_max = euclidean(position.row(min_idx), position.row(max_idx)) / 2.0;
    let t_min = euclidean(position.row(min_idx), position.row(min_idx2));
    (t_min, t_max)
}

fn co_occurrence_squidpy(
    data: &ExpData,
    cats: &Categories,
    params: &CoOccurrenceParams,
) -> Result<CoOccurrenceResult> {
    ensure!(
        params.num_thresholds >= 2,
        "squidpy co-occurrence needs at least two thresholds"
    );
    let position = data.position().view();
    let (t_min, t_max) = squidpy_threshold_range(position);
    let thresholds = linspace(t_min, t_max, params.num_thresholds);
    let rings = thresholds.len() - 1;
    let g = cats.len();

    let zeros = || Array3::<f64>::zeros((g, g, rings));
    let pairs = (0..position.nrows())
        .into_par_iter()
        .fold(zeros, |mut acc, x| {
            let dist = distances_from(position.row(x), position);
            let i = cats.codes[x];
            for (y, &d) in dist.iter().enumerate() {
                if let Some(r) = ring_right_closed(&thresholds, d) {
                    acc[[i, cats.codes[y], r]] += 1.0;
                }
            }
            acc
        })
        .reduce(zeros, |a, b| a + b);

    let mut values = Array3::zeros((g, g, rings));
    for r in 0..rings {
        let counts = pairs.index_axis(Axis(2), r);
        let total = counts.sum();
        for i in 0..g {
            let row_sum = counts.row(i).sum();
            let prob = row_sum / total;
            for j in 0..g {
                values[[i, j, r]] = counts[[i, j]] / row_sum / prob;
            }
        }
    }
    Ok(CoOccurrenceResult {
        groups: cats.names.clone(),
        neighbors: cats.names.clone(),
        thresholds: thresholds[1..].to_vec(),
        values,
    })
}

/// Co-occurrence of the groups in cell column `use_col`.
pub fn co_occurrence(
    data: &ExpData,
    use_col: &str,
    params: &CoOccurrenceParams,
) -> Result<CoOccurrenceResult> {
    ensure!(
        data.n_cells() >= 2,
        "co-occurrence needs at least two cells, got {}",
        data.n_cells()
    );
    let cats = Categories::from_labels(data.cluster(use_col)?);
    info!(
        "co-occurrence ({:?}) of {} groups over {} cells",
        params.method,
        cats.len(),
        data.n_cells()
    );
    match params.method {
        CoOccurrenceMethod::Stereopy => co_occurrence_stereopy(data, &cats, params),
        CoOccurrenceMethod::Squidpy => {
            if params.genes.is_some() {
                bail!("a gene list is only supported by the stereopy method");
            }
            co_occurrence_squidpy(data, &cats, params)
        }
    }
}

/// Per group fraction of cells found in each slice of `slices`, indexed
/// `[slice][group]`. Groups absent from every slice get zero.
fn group_ratios(ms: &MsData, slices: &[&str], use_col: &str, cats: &Categories) -> Result<Vec<Vec<f64>>> {
    let mut counts = vec![vec![0.0; cats.len()]; slices.len()];
    for (s, name) in slices.iter().enumerate() {
        let data = ms
            .get(name)
            .with_context(|| format!("slice {name} is not in the collection"))?;
        for label in data.cluster(use_col)? {
            if let Some(g) = cats.index_of(label) {
                counts[s][g] += 1.0;
            }
        }
    }
    for g in 0..cats.len() {
        let total: f64 = counts.iter().map(|c| c[g]).sum();
        for c in counts.iter_mut() {
            c[g] = if total > 0.0 { c[g] / total } else { 0.0 };
        }
    }
    Ok(counts)
}

fn integrate_slice_group(
    ms: &MsData,
    slices: &[&str],
    use_col: &str,
    use_key: &str,
    cats: &Categories,
    thresholds: &mut Option<Vec<f64>>,
) -> Result<Array3<f64>> {
    let ratios = group_ratios(ms, slices, use_col, cats)?;
    let mut merged: Option<Array3<f64>> = None;
    for (s, name) in slices.iter().enumerate() {
        let data = ms
            .get(name)
            .with_context(|| format!("slice {name} is not in the collection"))?;
        let result = match data.result(use_key) {
            Some(AnalysisResult::CoOccurrence(result)) => result,
            _ => bail!("slice {name} has no co-occurrence result {use_key}"),
        };
        ensure!(
            result.groups == result.neighbors,
            "slice {name}: only group co-occurrence results can be integrated"
        );
        match thresholds {
            Some(t) => ensure!(
                *t == result.thresholds,
                "slice {name} uses different distance thresholds"
            ),
            None => *thresholds = Some(result.thresholds.clone()),
        }
        let rings = result.thresholds.len();
        let merged = merged.get_or_insert_with(|| Array3::zeros((cats.len(), cats.len(), rings)));
        let to_global: Vec<Option<usize>> =
            result.groups.iter().map(|g| cats.index_of(g)).collect();
        for ((c, n, r), &v) in result.values.indexed_iter() {
            if let (Some(gc), Some(gn)) = (to_global[c], to_global[n]) {
                merged[[gc, gn, r]] += v * ratios[s][gc];
            }
        }
    }
    merged.context("empty slice group")
}

/// Combine per-slice co-occurrence results stored under `use_key`.
///
/// `scope` lists slices separated by `,`; a second group after `|` is
/// subtracted from the first. Each slice contributes in proportion to its
/// share of each center group's cells, so per-slice fractions pool into
/// the fraction over all center cells.
pub fn ms_co_occur_integrate(
    ms: &MsData,
    scope: &str,
    use_col: &str,
    use_key: &str,
) -> Result<CoOccurrenceResult> {
    let slice_groups: Vec<Vec<&str>> = scope
        .split('|')
        .map(|group| group.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
        .collect();
    ensure!(
        slice_groups.len() <= 2,
        "co-occurrence integration compares at most two slice groups, got {}",
        slice_groups.len()
    );
    ensure!(
        slice_groups.iter().all(|g| !g.is_empty()),
        "empty slice group in scope '{scope}'"
    );
    let cats = Categories::from_labels(&ms.merged_obs(use_col)?);

    let mut thresholds = None;
    let mut merged = Vec::with_capacity(slice_groups.len());
    for slices in &slice_groups {
        merged.push(integrate_slice_group(
            ms,
            slices,
            use_col,
            use_key,
            &cats,
            &mut thresholds,
        )?);
    }
    let values = match merged.as_slice() {
        [single] => single.clone(),
        [case, control] => case - control,
        _ => bail!("empty scope"),
    };
    Ok(CoOccurrenceResult {
        groups: cats.names.clone(),
        neighbors: cats.names,
        thresholds: thresholds.unwrap_or_default(),
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use st_types::{BinType, Cells, ClusterResult, ExpMatrix, Genes};

    fn line_data(labels: &[&str], xs: &[f64]) -> ExpData {
        let n = labels.len();
        let cells = Cells::cells((0..n).map(|i| format!("c{i}")).collect()).unwrap();
        let genes = Genes::genes(vec!["g0".into(), "g1".into()]).unwrap();
        let matrix = ExpMatrix::from_triplets((n, 2), (0..n).map(|i| (i, 0, i as f64)));
        let mut position = Array2::zeros((n, 2));
        for (i, &x) in xs.iter().enumerate() {
            position[[i, 0]] = x;
        }
        let mut data = ExpData::new(cells, genes, matrix, position, BinType::CellBins).unwrap();
        data.insert_result(
            "leiden",
            AnalysisResult::Cluster(ClusterResult {
                groups: labels.iter().map(|s| s.to_string()).collect(),
            }),
        )
        .unwrap();
        data
    }

    #[test]
    fn test_rings() {
        let t = [0.0, 1.0, 2.0];
        assert_eq!(ring_left_closed(&t, 0.0), Some(0));
        assert_eq!(ring_left_closed(&t, 1.0), Some(1));
        assert_eq!(ring_left_closed(&t, 2.0), None);
        assert_eq!(ring_right_closed(&t, 0.0), None);
        assert_eq!(ring_right_closed(&t, 1.0), Some(0));
        assert_eq!(ring_right_closed(&t, 2.0), Some(1));
        assert_eq!(ring_right_closed(&t, 2.5), None);
    }

    #[test]
    fn test_stereopy_groups() -> Result<()> {
        // a at 0 and 1, b at 3
        let data = line_data(&["a", "a", "b"], &[0.0, 1.0, 3.0]);
        let params = CoOccurrenceParams {
            dist_thres: 4.0,
            steps: 2,
            ..Default::default()
        };
        let res = co_occurrence(&data, "leiden", &params)?;
        assert_eq!(res.groups, ["a", "b"]);
        assert_eq!(res.thresholds, [2.0, 4.0]);
        // ring [0, 2): each a sees a; b sees only itself
        assert_eq!(res.values[[0, 0, 0]], 1.0);
        assert_eq!(res.values[[0, 1, 0]], 0.0);
        assert_eq!(res.values[[1, 1, 0]], 1.0);
        assert_eq!(res.values[[1, 0, 0]], 0.0);
        // ring [2, 4): only the a at 0 sees b at 3, and a at 1 sees b at 3 (d=2)
        assert_eq!(res.values[[0, 1, 1]], 1.0);
        assert_eq!(res.values[[1, 0, 1]], 1.0);
        assert_eq!(res.values[[0, 0, 1]], 0.0);
        Ok(())
    }

    #[test]
    fn test_stereopy_genes() -> Result<()> {
        // g0 holds the cell index as expression: c0 = 0, c1 = 1, c2 = 2
        let data = line_data(&["a", "a", "b"], &[0.0, 1.0, 3.0]);
        let params = CoOccurrenceParams {
            dist_thres: 4.0,
            steps: 2,
            genes: Some(vec!["g0".into(), "g1".into()]),
            gene_thresh: 2.0,
            ..Default::default()
        };
        let res = co_occurrence(&data, "leiden", &params)?;
        assert_eq!(res.neighbors, ["g0", "g1"]);
        // only c2 expresses g0 above the threshold
        assert_eq!(res.values[[1, 0, 0]], 1.0);
        assert_eq!(res.values[[0, 0, 0]], 0.0);
        assert_eq!(res.values[[0, 0, 1]], 1.0);
        assert_eq!(res.values.index_axis(Axis(1), 1).sum(), 0.0);

        let unknown = CoOccurrenceParams {
            genes: Some(vec!["nope".into()]),
            ..Default::default()
        };
        assert!(co_occurrence(&data, "leiden", &unknown).is_err());
        Ok(())
    }

    #[test]
    fn test_squidpy() -> Result<()> {
        let data = line_data(&["a", "b", "a", "b"], &[0.0, 1.0, 2.25, 3.5]);
        let (t_min, t_max) = squidpy_threshold_range(data.position().view());
        assert_eq!((t_min, t_max), (1.0, 1.75));
        let params = CoOccurrenceParams {
            method: CoOccurrenceMethod::Squidpy,
            num_thresholds: 2,
            ..Default::default()
        };
        // one ring (1, 1.75]: the pairs 1-2 and 2-3 at distance 1.25, both a-b
        let res = co_occurrence(&data, "leiden", &params)?;
        assert_eq!(res.thresholds, [1.75]);
        assert!(res.values[[0, 0, 0]].abs() < 1e-12);
        // C = [[0,2],[2,0]], probs = [0.5, 0.5], score = 2 / 2 / 0.5
        assert!((res.values[[0, 1, 0]] - 2.0).abs() < 1e-12);
        assert!((res.values[[1, 0, 0]] - 2.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_too_few_cells() {
        let data = line_data(&["a"], &[0.0]);
        assert!(co_occurrence(&data, "leiden", &CoOccurrenceParams::default()).is_err());
    }

    fn with_result(mut data: ExpData, values: Array3<f64>, groups: &[&str]) -> ExpData {
        let groups: Vec<String> = groups.iter().map(|s| s.to_string()).collect();
        data.insert_result(
            "co",
            AnalysisResult::CoOccurrence(CoOccurrenceResult {
                groups: groups.clone(),
                neighbors: groups,
                thresholds: vec![1.0],
                values,
            }),
        )
        .unwrap();
        data
    }

    #[test]
    fn test_integrate() -> Result<()> {
        // slice s0: a,a,b ; slice s1: a,b,b,b
        let s0 = with_result(
            line_data(&["a", "a", "b"], &[0.0, 1.0, 2.0]),
            Array3::from_shape_vec((2, 2, 1), vec![1.0, 1.0, 1.0, 1.0])?,
            &["a", "b"],
        );
        let s1 = with_result(
            line_data(&["a", "b", "b", "b"], &[0.0, 1.0, 2.0, 3.0]),
            Array3::from_shape_vec((2, 2, 1), vec![2.0, 2.0, 2.0, 2.0])?,
            &["a", "b"],
        );
        let ms = MsData::new(vec![s0, s1], vec!["s0".into(), "s1".into()])?;

        let merged = ms_co_occur_integrate(&ms, "s0,s1", "leiden", "co")?;
        // a: 2/3 in s0, 1/3 in s1 ; b: 1/4 in s0, 3/4 in s1
        let expect_a = 1.0 * 2.0 / 3.0 + 2.0 / 3.0;
        let expect_b = 1.0 * 0.25 + 2.0 * 0.75;
        assert!((merged.values[[0, 0, 0]] - expect_a).abs() < 1e-12);
        assert!((merged.values[[1, 1, 0]] - expect_b).abs() < 1e-12);

        let diff = ms_co_occur_integrate(&ms, "s0|s1", "leiden", "co")?;
        assert_eq!(diff.values, array![[[-1.0], [-1.0]], [[-1.0], [-1.0]]]);

        assert!(ms_co_occur_integrate(&ms, "s0|s1|s0", "leiden", "co").is_err());
        assert!(ms_co_occur_integrate(&ms, "s0,zz", "leiden", "co").is_err());
        Ok(())
    }

    #[test]
    fn test_integrate_weights_by_center_group() -> Result<()> {
        // s0: a,a,b with 0.6 for neighbor b around center a ; s1: a,b,b,b all zero
        let mut values = Array3::zeros((2, 2, 1));
        values[[0, 1, 0]] = 0.6;
        let s0 = with_result(line_data(&["a", "a", "b"], &[0.0, 1.0, 2.0]), values, &["a", "b"]);
        let s1 = with_result(
            line_data(&["a", "b", "b", "b"], &[0.0, 1.0, 2.0, 3.0]),
            Array3::zeros((2, 2, 1)),
            &["a", "b"],
        );
        let ms = MsData::new(vec![s0, s1], vec!["s0".into(), "s1".into()])?;

        // s0 holds 2 of the 3 a cells
        let pooled = ms_co_occur_integrate(&ms, "s0,s1", "leiden", "co")?;
        assert!((pooled.values[[0, 1, 0]] - 0.4).abs() < 1e-12);
        assert_eq!(pooled.values[[1, 0, 0]], 0.0);

        let diff = ms_co_occur_integrate(&ms, "s0|s1", "leiden", "co")?;
        assert!((diff.values[[0, 1, 0]] - 0.6).abs() < 1e-12);
        assert_eq!(diff.values[[1, 0, 0]], 0.0);

        // s1 repeated on the control side pools with itself and stays zero
        let diff = ms_co_occur_integrate(&ms, "s0,s1|s1", "leiden", "co")?;
        assert!((diff.values[[0, 1, 0]] - 0.4).abs() < 1e-12);
        Ok(())
    }
}

//! Time variable genes along a branch of ordered groups, and fuzzy C-means
//! clustering of their expression patterns.
#![allow(missing_docs)]

use anyhow::{bail, ensure, Result};
use itertools::Itertools;
use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use st_types::ExpData;
use stats::{chi2_sf, euclidean, mean, ttest_ind, Alternative};
use std::str::FromStr;

pub const SCORES: &str = "scores";
pub const GREATER_P: &str = "greater_p";
pub const LESS_P: &str = "less_p";
pub const LOG_FC: &str = "log2fc";
pub const LESS_PVALUE: &str = "less_pvalue";
pub const GREATER_PVALUE: &str = "greater_pvalue";
pub const FEATURE_P: &str = "feature_p";
pub const FUZZY_C_WEIGHT: &str = "fuzzy_c_weight";
pub const FUZZY_C_RESULT: &str = "fuzzy_c_result";

const PSEUDO_COUNT: f64 = 1e-9;
/// Initial memberships are drawn from `1..INIT_MAX` before normalising.
const INIT_MAX: u32 = 10_000;

/// How the p-values of consecutive comparisons combine into one per gene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PValCombination {
    Mean,
    Fisher,
    Fdr,
}

impl FromStr for PValCombination {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "mean" => PValCombination::Mean,
            "fisher" => PValCombination::Fisher,
            "fdr" => PValCombination::Fdr,
            _ => bail!("unknown p-value combination {s}, expected mean, fisher or fdr"),
        })
    }
}

impl PValCombination {
    /// Combine each row of `p` (genes x comparisons).
    fn combine(self, p: ArrayView2<'_, f64>) -> Array1<f64> {
        match self {
            PValCombination::Mean => p.map_axis(Axis(1), |row| mean(&row.to_vec())),
            PValCombination::Fisher => {
                // zeros would make the statistic infinite
                let floor = p
                    .iter()
                    .copied()
                    .filter(|v| *v > 0.0)
                    .reduce(f64::min)
                    .unwrap_or(f64::MIN_POSITIVE);
                let df = p.ncols() as f64;
                p.map_axis(Axis(1), |row| {
                    let stat: f64 = row.iter().map(|v| -2.0 * v.max(floor).ln()).sum();
                    chi2_sf(stat, df)
                })
            }
            PValCombination::Fdr => {
                p.map_axis(Axis(1), |row| 1.0 - row.iter().map(|v| 1.0 - v).product::<f64>())
            }
        }
    }
}

/// Statistics of one gene for one step of the branch.
#[derive(Debug, Clone, Copy)]
struct Step {
    score: f64,
    less_p: f64,
    greater_p: f64,
    log2fc: f64,
}

fn compare(later: &[f64], earlier: &[f64]) -> Step {
    let less = ttest_ind(later, earlier, Alternative::Less);
    let greater = ttest_ind(later, earlier, Alternative::Greater);
    let nan_to = |v: f64, fill: f64| if v.is_nan() { fill } else { v };
    Step {
        score: nan_to(greater.statistic, 0.0),
        less_p: nan_to(less.pvalue, 1.0),
        greater_p: nan_to(greater.pvalue, 1.0),
        log2fc: ((mean(later) + PSEUDO_COUNT) / (mean(earlier) + PSEUDO_COUNT)).log2(),
    }
}

/// Find genes whose expression changes along `branch`, the ordered groups
/// of cell column `use_col`. Each consecutive pair of groups is compared by
/// one-sided t-tests (later vs earlier). Per gene results are stored on the
/// genes: matrices `scores`, `greater_p`, `less_p`, `log2fc` with one column
/// per step, and columns `less_pvalue`, `greater_pvalue` (combined) and
/// `log2fc` (mean over steps).
pub fn tvg_marker<S: AsRef<str>>(
    data: &mut ExpData,
    use_col: &str,
    branch: &[S],
    combination: PValCombination,
) -> Result<()> {
    ensure!(
        branch.len() >= 2,
        "a branch needs at least two groups, got {}",
        branch.len()
    );
    let labels = data.cluster(use_col)?;
    let mut members = Vec::with_capacity(branch.len());
    for group in branch {
        let group = group.as_ref();
        let cells: Vec<usize> = labels
            .iter()
            .positions(|l| l == group)
            .collect();
        ensure!(!cells.is_empty(), "group {group} is not present in {use_col}");
        members.push(cells);
    }
    info!(
        "time variable genes over {} groups of {use_col}",
        branch.len()
    );

    let matrix = data.matrix();
    let steps: Vec<Vec<Step>> = (0..data.n_genes())
        .into_par_iter()
        .map(|g| {
            let column = matrix.column_dense(g);
            let values: Vec<Vec<f64>> = members
                .iter()
                .map(|cells| cells.iter().map(|&c| column[c]).collect())
                .collect();
            values
                .iter()
                .tuple_windows()
                .map(|(earlier, later)| compare(later, earlier))
                .collect()
        })
        .collect();

    let shape = (data.n_genes(), branch.len() - 1);
    let table = |f: fn(&Step) -> f64| Array2::from_shape_fn(shape, |(g, s)| f(&steps[g][s]));
    let scores = table(|s| s.score);
    let less_p = table(|s| s.less_p);
    let greater_p = table(|s| s.greater_p);
    let log2fc = table(|s| s.log2fc);

    let less_pvalue = combination.combine(less_p.view());
    let greater_pvalue = combination.combine(greater_p.view());
    let mean_fc = log2fc.map_axis(Axis(1), |row| mean(&row.to_vec()));

    let genes = data.genes_mut();
    genes.set_matrix(SCORES, scores)?;
    genes.set_matrix(GREATER_P, greater_p)?;
    genes.set_matrix(LESS_P, less_p)?;
    genes.set_matrix(LOG_FC, log2fc)?;
    genes.set_numeric(LESS_PVALUE, less_pvalue.to_vec())?;
    genes.set_numeric(GREATER_PVALUE, greater_pvalue.to_vec())?;
    genes.set_numeric(LOG_FC, mean_fc.to_vec())?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct FuzzyCParams {
    /// fuzzifier, must exceed 1
    pub m: f64,
    pub max_iter: usize,
    pub epsilon: f64,
    pub seed: u64,
}

impl Default for FuzzyCParams {
    fn default() -> Self {
        FuzzyCParams {
            m: 2.0,
            max_iter: 10_000,
            epsilon: 1e-7,
            seed: 0,
        }
    }
}

/// Memberships of `c` clusters given the distance of a point to every
/// center. A point sitting on centers belongs to them equally.
fn memberships(dist: &[f64], m: f64) -> Vec<f64> {
    let on_center = dist.iter().filter(|d| **d == 0.0).count();
    if on_center > 0 {
        return dist
            .iter()
            .map(|d| if *d == 0.0 { 1.0 / on_center as f64 } else { 0.0 })
            .collect();
    }
    let power = 2.0 / (m - 1.0);
    dist.iter()
        .map(|dj| 1.0 / dist.iter().map(|dk| (dj / dk).powf(power)).sum::<f64>())
        .collect()
}

/// Fuzzy C-means over the rows of `data`. Returns the membership matrix,
/// rows x clusters, each row summing to one.
pub fn fuzzy_c(data: ArrayView2<'_, f64>, clusters: usize, params: &FuzzyCParams) -> Result<Array2<f64>> {
    ensure!(params.m > 1.0, "fuzzifier must exceed 1, got {}", params.m);
    ensure!(
        (1..=data.nrows()).contains(&clusters),
        "cannot form {clusters} clusters from {} observations",
        data.nrows()
    );
    let mut rng = SmallRng::seed_from_u64(params.seed);
    let mut u = Array2::from_shape_fn((data.nrows(), clusters), |_| {
        f64::from(rng.random_range(1..INIT_MAX))
    });
    for mut row in u.axis_iter_mut(Axis(0)) {
        let total = row.sum();
        row /= total;
    }

    for epoch in 1..=params.max_iter {
        let um = u.mapv(|v| v.powf(params.m));
        let weights = um.sum_axis(Axis(0));
        let mut centers = um.t().dot(&data);
        for (mut center, w) in centers.axis_iter_mut(Axis(0)).zip(&weights) {
            center /= *w;
        }

        let updated: Vec<Vec<f64>> = (0..data.nrows())
            .into_par_iter()
            .map(|i| {
                let dist: Vec<f64> = centers
                    .axis_iter(Axis(0))
                    .map(|center| euclidean(data.row(i), center))
                    .collect();
                memberships(&dist, params.m)
            })
            .collect();
        let updated = Array2::from_shape_fn(u.dim(), |(i, j)| updated[i][j]);

        let mut shift = 0.0f64;
        Zip::from(&updated).and(&u).for_each(|a, b| shift = shift.max((a - b).abs()));
        u = updated;
        if epoch % 100 == 0 {
            debug!("fuzzy c-means epoch {epoch}: max membership change {shift:e}");
        }
        if shift < params.epsilon {
            debug!("fuzzy c-means converged after {epoch} epochs");
            return Ok(u);
        }
    }
    info!(
        "fuzzy c-means stopped after {} epochs without reaching {:e}",
        params.max_iter, params.epsilon
    );
    Ok(u)
}

/// Signed significance of every step: `max(1 - greater_p, 1 - less_p)`,
/// negative where the decrease is the stronger signal.
fn feature_p(greater_p: &Array2<f64>, less_p: &Array2<f64>) -> Array2<f64> {
    Zip::from(greater_p).and(less_p).map_collect(|g, l| {
        let (up, down) = (1.0 - g, 1.0 - l);
        if up >= down {
            up
        } else {
            -down
        }
    })
}

/// Cluster genes by the pattern of their branch statistics with fuzzy
/// C-means. The statistics of a previous `tvg_marker` are used; when there
/// are none, `tvg` names the column and branch to compute them from.
/// Stores the matrices `feature_p` and `fuzzy_c_weight` and the hard
/// assignment `fuzzy_c_result`.
pub fn fuzzy_c_gene_pattern_cluster<S: AsRef<str>>(
    data: &mut ExpData,
    clusters: usize,
    params: &FuzzyCParams,
    tvg: Option<(&str, &[S])>,
) -> Result<()> {
    let computed = data.genes().matrix(GREATER_P).is_some() && data.genes().matrix(LESS_P).is_some();
    if !computed {
        let Some((use_col, branch)) = tvg else {
            bail!("{GREATER_P} and {LESS_P} are missing, run tvg_marker first or give a branch");
        };
        tvg_marker(data, use_col, branch, PValCombination::Fisher)?;
    }
    let genes = data.genes();
    let (Some(greater_p), Some(less_p)) = (genes.matrix(GREATER_P), genes.matrix(LESS_P)) else {
        bail!("{GREATER_P} and {LESS_P} are missing");
    };
    let features = feature_p(greater_p, less_p);
    let weights = fuzzy_c(features.view(), clusters, params)?;
    let assignment: Vec<f64> = weights
        .axis_iter(Axis(0))
        .map(|row| row.iter().position_max_by(|a, b| a.total_cmp(b)).unwrap_or(0) as f64)
        .collect();

    let genes = data.genes_mut();
    genes.set_matrix(FEATURE_P, features)?;
    genes.set_matrix(FUZZY_C_WEIGHT, weights)?;
    genes.set_numeric(FUZZY_C_RESULT, assignment)?;
    Ok(())
}

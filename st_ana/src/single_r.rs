//! Reference based cell type annotation (SingleR).
//!
//! Every label of the reference is summarised by the per-gene median of its
//! cells. The genes that separate each ordered pair of labels form the
//! scoring space; a test observation scores against a label as a percentile
//! of its Spearman correlations with that label's reference cells. Labels
//! scoring close to the best are then narrowed down on ever more specific
//! gene sets.
#![allow(missing_docs)]

use anyhow::{ensure, Result};
use itertools::Itertools;
use log::{debug, info};
use ndarray::{Array2, ArrayView1, Axis};
use rayon::prelude::*;
use st_types::{Categories, ExpData, SingleRResult};
use stats::{median, pearson_columns, percentile, rank_average, rank_columns, variance};
use std::collections::BTreeSet;
use std::time::Instant;

/// Fine tuning gives up on gene sets smaller than this.
const MIN_FINE_TUNE_GENES: usize = 20;

#[derive(Debug, Clone)]
pub struct SingleRParams {
    /// Percentile of the per-cell correlations used as a label score.
    pub quantile: f64,
    /// Labels scoring within this of the best are kept for fine tuning.
    pub fine_tune_threshold: f64,
    /// Upper bound on fine tuning rounds, 0 for no bound.
    pub fine_tune_times: usize,
}

impl Default for SingleRParams {
    fn default() -> Self {
        SingleRParams {
            quantile: 80.0,
            fine_tune_threshold: 0.05,
            fine_tune_times: 0,
        }
    }
}

/// Number of marker genes taken from each label pair.
fn de_count(n_labels: usize) -> usize {
    (500.0 * (2.0f64 / 3.0).powf((n_labels as f64).log2())).round() as usize
}

fn round6(v: f64) -> f64 {
    (v * 1e6).round() / 1e6
}

/// Reference summarised over the genes shared with the test data.
struct Trained {
    labels: Vec<String>,
    /// reference cells x shared genes
    ref_exp: Array2<f64>,
    members: Vec<Vec<usize>>,
    /// `de_genes[i][j]`: genes higher in label `i` than in label `j`, most
    /// different first
    de_genes: Vec<Vec<Vec<usize>>>,
    /// union of the top genes of every label pair
    common: Vec<usize>,
}

impl Trained {
    fn new(labels: &[String], ref_exp: Array2<f64>) -> Result<Self> {
        let cats = Categories::from_labels(labels);
        ensure!(
            cats.len() >= 2,
            "the reference needs at least two labels, found {}",
            cats.len()
        );
        let n = cats.len();
        let mut members = vec![Vec::new(); n];
        for (cell, &code) in cats.codes.iter().enumerate() {
            members[code].push(cell);
        }
        let medians: Vec<Vec<f64>> = members
            .par_iter()
            .map(|cells| {
                ref_exp
                    .axis_iter(Axis(1))
                    .map(|gene| median(&cells.iter().map(|&c| gene[c]).collect::<Vec<_>>()))
                    .collect()
            })
            .collect();

        let de_n = de_count(n);
        let mut de_genes = vec![vec![Vec::new(); n]; n];
        let mut common = BTreeSet::new();
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let diff: Vec<f64> = medians[i]
                    .iter()
                    .zip(&medians[j])
                    .map(|(a, b)| round6(a - b))
                    .collect();
                let mut order: Vec<usize> = (0..diff.len()).collect();
                // stable, so equal differences keep gene order
                order.sort_by(|&a, &b| diff[b].total_cmp(&diff[a]));
                common.extend(order.iter().take(de_n).copied());
                de_genes[i][j] = order.into_iter().take_while(|&g| diff[g] > 0.0).collect();
            }
        }
        Ok(Trained {
            labels: cats.names,
            ref_exp,
            members,
            de_genes,
            common: common.into_iter().collect(),
        })
    }

    /// Reference cells of `label` restricted to `genes`, genes x cells.
    fn reference_block(&self, label: usize, genes: &[usize]) -> Array2<f64> {
        let cells = &self.members[label];
        Array2::from_shape_fn((genes.len(), cells.len()), |(g, c)| {
            self.ref_exp[[cells[c], genes[g]]]
        })
    }

    /// Percentile score of every test column of `ranked_test` (genes x
    /// observations, already ranked) against the cells of `label`.
    fn label_scores(
        &self,
        label: usize,
        genes: &[usize],
        ranked_test: &Array2<f64>,
        quantile: f64,
    ) -> Result<Vec<f64>> {
        let ranked_ref = rank_columns(self.reference_block(label, genes).view());
        let sim = pearson_columns(ranked_test.view(), ranked_ref.view())?;
        Ok(sim
            .axis_iter(Axis(0))
            .map(|row| percentile(&row.to_vec(), quantile))
            .collect())
    }

    /// Union of the top marker genes between every ordered pair of `labels`.
    fn label_genes(&self, labels: &[usize]) -> Vec<usize> {
        let de_n = de_count(labels.len());
        let mut genes = BTreeSet::new();
        for &i in labels {
            for &j in labels {
                if i != j {
                    genes.extend(self.de_genes[i][j].iter().take(de_n).copied());
                }
            }
        }
        genes.into_iter().collect()
    }

    /// One round of narrowing `labels` for a single test observation.
    fn fine_tune_once(
        &self,
        labels: &[usize],
        test: ArrayView1<'_, f64>,
        params: &SingleRParams,
    ) -> Result<Vec<usize>> {
        let genes = self.label_genes(labels);
        if genes.len() < MIN_FINE_TUNE_GENES {
            return Ok(vec![labels[0]]);
        }
        let values: Vec<f64> = genes.iter().map(|&g| test[g]).collect();
        if variance(&values, 0) <= 0.0 {
            return Ok(vec![labels[0]]);
        }
        let ranked_test = Array2::from_shape_vec((genes.len(), 1), rank_average(&values))?;

        let mut scored = Vec::with_capacity(labels.len());
        for &label in labels {
            let score = self.label_scores(label, &genes, &ranked_test, params.quantile)?;
            scored.push((label, score[0]));
        }
        let mid = median(&scored.iter().map(|(_, s)| *s).collect::<Vec<_>>());
        scored.retain(|(_, s)| *s > mid);
        let Some(best) = scored.iter().map(|(_, s)| *s).reduce(f64::max) else {
            return Ok(vec![labels[0]]);
        };
        scored.retain(|(_, s)| *s >= best - params.fine_tune_threshold);
        Ok(scored.into_iter().map(|(l, _)| l).collect())
    }

    fn fine_tune(
        &self,
        test: ArrayView1<'_, f64>,
        scores: ArrayView1<'_, f64>,
        first: usize,
        params: &SingleRParams,
    ) -> Result<usize> {
        let mut labels = fine_tune_candidates(scores, scores[first], params.fine_tune_threshold);
        let mut rounds = 0;
        while labels.len() > 1 && (params.fine_tune_times == 0 || rounds < params.fine_tune_times) {
            labels = self.fine_tune_once(&labels, test, params)?;
            rounds += 1;
        }
        Ok(labels.first().copied().unwrap_or(first))
    }
}

/// Labels scoring positively and within `threshold` of `best`.
fn fine_tune_candidates(scores: ArrayView1<'_, f64>, best: f64, threshold: f64) -> Vec<usize> {
    scores
        .iter()
        .positions(|&s| s > 0.0 && s >= best - threshold)
        .collect()
}

fn argmax(values: ArrayView1<'_, f64>) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

/// Annotate the cells of `data`, or its clusters in column
/// `test_cluster_col`, with the labels of column `ref_use_col` of
/// `reference`. Only genes present in both are used.
pub fn single_r(
    data: &ExpData,
    reference: &ExpData,
    ref_use_col: &str,
    test_cluster_col: Option<&str>,
    params: &SingleRParams,
) -> Result<SingleRResult> {
    let start = Instant::now();
    info!(
        "start single-r with quantile={} fine_tune_times={}",
        params.quantile, params.fine_tune_times
    );
    let (ref_idx, test_idx): (Vec<usize>, Vec<usize>) = reference
        .genes()
        .names()
        .iter()
        .enumerate()
        .filter_map(|(r, name)| data.gene_index(name).map(|t| (r, t)))
        .unzip();
    ensure!(
        !ref_idx.is_empty(),
        "the test data shares no genes with the reference"
    );
    debug!("{} genes shared with the reference", ref_idx.len());

    let trained = Trained::new(
        reference.cluster(ref_use_col)?,
        reference.matrix().dense_columns(&ref_idx),
    )?;
    debug!(
        "trained {} labels on {} marker genes in {:.4}s",
        trained.labels.len(),
        trained.common.len(),
        start.elapsed().as_secs_f64()
    );

    let (bins, test_exp) = match test_cluster_col {
        Some(col) => {
            let cats = Categories::from_labels(data.cluster(col)?);
            let sums = data.matrix().sum_rows_by(&cats.codes, cats.len());
            (cats.names, sums.select(Axis(1), &test_idx))
        }
        None => (
            data.cells().names().to_vec(),
            data.matrix().dense_columns(&test_idx),
        ),
    };

    let ranked_test = rank_columns(test_exp.select(Axis(1), &trained.common).t());
    let columns: Vec<Vec<f64>> = (0..trained.labels.len())
        .into_par_iter()
        .map(|label| trained.label_scores(label, &trained.common, &ranked_test, params.quantile))
        .collect::<Result<_>>()?;
    let scores = Array2::from_shape_fn((bins.len(), trained.labels.len()), |(t, l)| columns[l][t]);
    let first: Vec<usize> = scores.axis_iter(Axis(0)).map(argmax).collect();
    info!(
        "scored {} observations in {:.4}s",
        bins.len(),
        start.elapsed().as_secs_f64()
    );

    let tuned: Vec<usize> = (0..bins.len())
        .into_par_iter()
        .map(|t| trained.fine_tune(test_exp.row(t), scores.row(t), first[t], params))
        .collect::<Result<_>>()?;

    let name = |l: &usize| trained.labels[*l].clone();
    let result = SingleRResult {
        bins,
        groups: tuned.iter().map(name).collect(),
        first_labels: first.iter().map(name).collect(),
        labels: trained.labels.clone(),
        scores,
    };
    info!("single-r finished in {:.4}s", start.elapsed().as_secs_f64());
    Ok(result)
}

//! Quality control metrics, cell/gene/coordinate filters and matrix
//! normalisation.
#![allow(missing_docs)]

use anyhow::{ensure, Result};
use log::info;
use ndarray::{Array2, Axis};
use st_types::{ExpData, ExpMatrix};
use stats::median;
use std::collections::HashSet;

pub const TOTAL_COUNTS: &str = "total_counts";
pub const N_GENES_BY_COUNTS: &str = "n_genes_by_counts";
pub const PCT_COUNTS_MT: &str = "pct_counts_mt";
pub const N_CELLS: &str = "n_cells";
pub const N_COUNTS: &str = "n_counts";

fn is_mito(gene: &str) -> bool {
    gene.starts_with("MT-") || gene.starts_with("mt-")
}

struct CellQc {
    total_counts: Vec<f64>,
    n_genes_by_counts: Vec<usize>,
    pct_counts_mt: Vec<f64>,
}

impl CellQc {
    fn new(data: &ExpData) -> Self {
        let matrix = data.matrix();
        let mito: Vec<bool> = data.genes().names().iter().map(|g| is_mito(g)).collect();
        let mut mt_counts = vec![0.0; data.n_cells()];
        for (row, col, value) in matrix.iter_nonzero() {
            if mito[col] {
                mt_counts[row] += value;
            }
        }
        let total_counts = matrix.row_sums();
        let pct_counts_mt = mt_counts
            .iter()
            .zip(&total_counts)
            .map(|(mt, total)| if *total > 0.0 { mt / total * 100.0 } else { 0.0 })
            .collect();
        CellQc {
            n_genes_by_counts: matrix.row_nonzero(),
            total_counts,
            pct_counts_mt,
        }
    }
}

/// Store per-cell `total_counts`, `n_genes_by_counts`, `pct_counts_mt` and
/// per-gene `n_cells`, `n_counts` as numeric columns.
pub fn cal_qc(data: &mut ExpData) -> Result<()> {
    let qc = CellQc::new(data);
    let n_cells = data.matrix().col_nonzero();
    let n_counts = data.matrix().col_sums();

    let cells = data.cells_mut();
    cells.set_numeric(TOTAL_COUNTS, qc.total_counts)?;
    cells.set_numeric(
        N_GENES_BY_COUNTS,
        qc.n_genes_by_counts.into_iter().map(|n| n as f64).collect(),
    )?;
    cells.set_numeric(PCT_COUNTS_MT, qc.pct_counts_mt)?;

    let genes = data.genes_mut();
    genes.set_numeric(N_CELLS, n_cells.into_iter().map(|n| n as f64).collect())?;
    genes.set_numeric(N_COUNTS, n_counts)?;
    Ok(())
}

/// Bounds a cell must satisfy to be kept. Unset bounds are not checked.
#[derive(Debug, Clone, Default)]
pub struct CellFilter {
    /// minimum number of expressed genes
    pub min_gene: Option<usize>,
    /// maximum number of expressed genes
    pub max_gene: Option<usize>,
    /// minimum total counts
    pub min_n_genes_by_counts: Option<f64>,
    /// maximum total counts
    pub max_n_genes_by_counts: Option<f64>,
    /// maximum percentage of mitochondrial counts
    pub pct_counts_mt: Option<f64>,
    /// only cells named here are kept
    pub cell_list: Option<Vec<String>>,
}

pub fn filter_cells(data: &ExpData, filter: &CellFilter) -> Result<ExpData> {
    let qc = CellQc::new(data);
    let listed: Option<HashSet<&str>> = filter
        .cell_list
        .as_ref()
        .map(|list| list.iter().map(String::as_str).collect());
    let keep: Vec<usize> = (0..data.n_cells())
        .filter(|&i| {
            let n_genes = qc.n_genes_by_counts[i];
            let total = qc.total_counts[i];
            filter.min_gene.is_none_or(|min| n_genes >= min)
                && filter.max_gene.is_none_or(|max| n_genes <= max)
                && filter.min_n_genes_by_counts.is_none_or(|min| total >= min)
                && filter.max_n_genes_by_counts.is_none_or(|max| total <= max)
                && filter
                    .pct_counts_mt
                    .is_none_or(|max| qc.pct_counts_mt[i] <= max)
                && listed
                    .as_ref()
                    .is_none_or(|names| names.contains(data.cells().names()[i].as_str()))
        })
        .collect();
    ensure!(!keep.is_empty(), "no cells passed the filter");
    info!("kept {} of {} cells", keep.len(), data.n_cells());
    let genes: Vec<usize> = (0..data.n_genes()).collect();
    Ok(data.sub_by_index(&keep, &genes))
}

/// Bounds a gene must satisfy to be kept.
#[derive(Debug, Clone, Default)]
pub struct GeneFilter {
    /// minimum number of cells expressing the gene
    pub min_cell: Option<usize>,
    /// maximum number of cells expressing the gene
    pub max_cell: Option<usize>,
    /// only genes named here are kept
    pub gene_list: Option<Vec<String>>,
}

pub fn filter_genes(data: &ExpData, filter: &GeneFilter) -> Result<ExpData> {
    let n_cells = data.matrix().col_nonzero();
    let listed: Option<HashSet<&str>> = filter
        .gene_list
        .as_ref()
        .map(|list| list.iter().map(String::as_str).collect());
    let keep: Vec<usize> = (0..data.n_genes())
        .filter(|&g| {
            filter.min_cell.is_none_or(|min| n_cells[g] >= min)
                && filter.max_cell.is_none_or(|max| n_cells[g] <= max)
                && listed
                    .as_ref()
                    .is_none_or(|names| names.contains(data.genes().names()[g].as_str()))
        })
        .collect();
    ensure!(!keep.is_empty(), "no genes passed the filter");
    info!("kept {} of {} genes", keep.len(), data.n_genes());
    let cells: Vec<usize> = (0..data.n_cells()).collect();
    Ok(data.sub_by_index(&cells, &keep))
}

/// Inclusive bounds on cell positions.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinateFilter {
    pub min_x: Option<f64>,
    pub max_x: Option<f64>,
    pub min_y: Option<f64>,
    pub max_y: Option<f64>,
}

pub fn filter_coordinates(data: &ExpData, filter: &CoordinateFilter) -> Result<ExpData> {
    let keep: Vec<usize> = data
        .position()
        .axis_iter(Axis(0))
        .enumerate()
        .filter(|(_, pos)| {
            let (x, y) = (pos[0], pos[1]);
            filter.min_x.is_none_or(|min| x >= min)
                && filter.max_x.is_none_or(|max| x <= max)
                && filter.min_y.is_none_or(|min| y >= min)
                && filter.max_y.is_none_or(|max| y <= max)
        })
        .map(|(i, _)| i)
        .collect();
    ensure!(!keep.is_empty(), "no cells inside the coordinate bounds");
    info!("kept {} of {} cells by position", keep.len(), data.n_cells());
    let genes: Vec<usize> = (0..data.n_genes()).collect();
    Ok(data.sub_by_index(&keep, &genes))
}

pub fn log1p(matrix: &ExpMatrix) -> ExpMatrix {
    matrix.map_values(f64::ln_1p)
}

/// Per-cell total that `normalize_total` scales to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetSum {
    Fixed(f64),
    /// median total of the cells with any counts
    Median,
}

impl Default for TargetSum {
    fn default() -> Self {
        TargetSum::Fixed(1e4)
    }
}

/// Scale every cell to the same total count. Empty cells stay empty.
pub fn normalize_total(matrix: &ExpMatrix, target: TargetSum) -> ExpMatrix {
    let totals = matrix.row_sums();
    let target = match target {
        TargetSum::Fixed(t) => t,
        TargetSum::Median => {
            let positive: Vec<f64> = totals.iter().copied().filter(|t| *t > 0.0).collect();
            median(&positive)
        }
    };
    let factors: Vec<f64> = totals
        .iter()
        .map(|&t| if t > 0.0 { target / t } else { 0.0 })
        .collect();
    matrix.scale_rows(&factors)
}

/// Scale every gene to unit variance (population standard deviation),
/// optionally centring it first, then clip at `max_value`. Genes with zero
/// variance are only centred.
pub fn scale(matrix: &ExpMatrix, zero_center: bool, max_value: Option<f64>) -> Array2<f64> {
    let mut dense = matrix.to_dense();
    for mut column in dense.axis_iter_mut(Axis(1)) {
        let n = column.len() as f64;
        let mean = column.sum() / n;
        let var = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = if var > 0.0 { var.sqrt() } else { 1.0 };
        let shift = if zero_center { mean } else { 0.0 };
        column.mapv_inplace(|v| {
            let scaled = (v - shift) / std;
            match max_value {
                Some(max) if zero_center => scaled.clamp(-max, max),
                Some(max) => scaled.min(max),
                None => scaled,
            }
        });
    }
    dense
}

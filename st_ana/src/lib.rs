//! st_ana
//!
//! Preprocessing, reference annotation and time-series analysis of spatial
//! expression data, tied together by `StPipeline`.
#![deny(missing_docs)]

/// Analysis session with raw checkpoint and key record
pub mod pipeline;
/// QC metrics, filters and normalisation
pub mod preprocess;
/// SingleR reference annotation
pub mod single_r;
/// Time variable genes and gene pattern clustering
pub mod time_series;

#[cfg(test)]
mod testing;

pub use pipeline::StPipeline;
pub use preprocess::{CellFilter, CoordinateFilter, GeneFilter, TargetSum};
pub use single_r::{single_r, SingleRParams};
pub use time_series::{fuzzy_c_gene_pattern_cluster, tvg_marker, FuzzyCParams, PValCombination};

//! Readers and writers for expression data and analysis results.
#![deny(missing_docs)]

/// Cell and DNB tables of cell-bin data
pub mod cellbin;
/// Cluster assignments stored as CSV
pub mod cluster;
/// GEM expression files
pub mod gem;
/// CSV output of analysis results
pub mod tables;

pub use cluster::{attach_cluster, read_cluster_csv};
pub use gem::{read_gem, read_gem_records, subset_records, write_gem, GemRecord};

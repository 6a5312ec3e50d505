//! Data model shared by the readers, the analyses and the command line.
#![deny(missing_docs)]

/// Cell and gene annotation tables
pub mod annotation;
/// Square bins and cell bins
pub mod bin_type;
/// Categorical encoding of group labels
pub mod categories;
mod error;
/// A single slice of expression data
pub mod exp_data;
/// Sparse and dense expression storage
pub mod exp_matrix;
/// Several slices analysed together
pub mod ms_data;
/// Analysis outputs
pub mod result;

pub use annotation::{Annotation, Cells, Genes};
pub use bin_type::BinType;
pub use categories::Categories;
pub use error::DataError;
pub use exp_data::ExpData;
pub use exp_matrix::ExpMatrix;
pub use ms_data::MsData;
pub use result::{
    AnalysisResult, ClusterResult, CoOccurrenceResult, ResultStore, SingleRResult,
    SpatialLagResult,
};

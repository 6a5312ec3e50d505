//! Spatial statistics over cell positions.
#![deny(missing_docs)]

/// Co-occurrence of groups with distance
pub mod co_occurrence;
/// Nearest-neighbour spatial weights
pub mod neighbors;
/// Spatial lag regression of gene expression on groups
pub mod spatial_lag;

pub use co_occurrence::{co_occurrence, ms_co_occur_integrate, CoOccurrenceMethod, CoOccurrenceParams};
pub use neighbors::{knn_weights, SpatialWeights};
pub use spatial_lag::{spatial_lag, SpatialLagParams};

//! stats
//!
//! Numeric kernels shared by the analysis crates: ranks, correlations,
//! order statistics, hypothesis tests, distances and small dense solves.
#![deny(missing_docs)]

/// Pearson and Spearman correlation between matrix columns.
pub mod correlation;

/// Euclidean distances between points stored as matrix rows.
pub mod distance;

/// Small dense symmetric positive definite solves.
pub mod linalg;

/// Natural ("human") ordering of strings.
pub mod natural;

/// Average ranks.
pub mod rank;

/// Means, variances, medians and percentiles.
pub mod summary;

/// Student t-tests and tail probabilities.
pub mod ttest;

pub use correlation::{pearson_columns, spearman_columns};
pub use distance::{distances_from, euclidean, pairwise_distances};
pub use natural::{natural_cmp, natural_sort};
pub use rank::{rank_average, rank_columns};
pub use summary::{linspace, mean, median, percentile, sum_sq_dev, variance};
pub use ttest::{chi2_sf, normal_two_sided_p, ttest_ind, Alternative, TTestResult};

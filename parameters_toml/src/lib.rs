//! parameters_toml
#![deny(missing_docs)]

use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
struct Parameters {
    /// Largest distance considered by the stereopy co-occurrence method.
    co_occurrence_dist_thres: f64,
    /// Number of distance rings of the stereopy co-occurrence method.
    co_occurrence_steps: usize,
    /// Number of distance thresholds of the squidpy co-occurrence method.
    squidpy_num_thresholds: usize,
    /// Percentile of the per-label correlations used as the SingleR score.
    single_r_quantile: f64,
    /// Labels within this distance of the best SingleR score are fine tuned.
    single_r_fine_tune_threshold: f64,
    /// Neighbours per cell in the spatial lag weights.
    spatial_lag_n_neighbors: usize,
    /// Iteration cap of fuzzy C-means.
    fuzzy_c_max_iter: usize,
    /// Fuzzy C-means stops once the membership matrix moves less than this.
    fuzzy_c_epsilon: f64,
    /// Seed for every seeded random generator.
    random_seed: u64,
}

const DEFAULT_PARAMETERS: Parameters = Parameters {
    co_occurrence_dist_thres: 300.0,
    co_occurrence_steps: 10,
    squidpy_num_thresholds: 50,
    single_r_quantile: 80.0,
    single_r_fine_tune_threshold: 0.05,
    spatial_lag_n_neighbors: 8,
    fuzzy_c_max_iter: 10000,
    fuzzy_c_epsilon: 1e-7,
    random_seed: 0,
};

impl Default for Parameters {
    fn default() -> Self {
        DEFAULT_PARAMETERS
    }
}

static PARAMETERS: OnceLock<Result<Parameters>> = OnceLock::new();

fn load(path: &Path) -> Result<Parameters> {
    if !path.exists() {
        warn!(
            "could not find parameters.toml at {}, falling back to defaults",
            path.display()
        );
        return Ok(DEFAULT_PARAMETERS);
    }
    let s = std::fs::read_to_string(path).with_context(|| path.display().to_string())?;
    toml::from_str(&s).with_context(|| path.display().to_string())
}

/// Return a reference to the global parameters.
/// The parameters may need to be loaded; if loading fails, return Err.
fn parameters() -> &'static Result<Parameters> {
    PARAMETERS.get_or_init(|| {
        let path = std::env::current_exe()
            .context("Unable to locate the running executable")?
            .with_file_name("parameters.toml");
        load(&path)
    })
}

/// Get a parameter from parameters.toml
macro_rules! parameter_getter {
    ($a:ident, $t:ty) => {
        /// Get this parameter from parameters.toml
        pub fn $a() -> Result<$t> {
            let val = match parameters() {
                Err(e) => return Err(anyhow::anyhow!("{e:#}")),
                Ok(p) => p.$a,
            };
            if DEFAULT_PARAMETERS.$a != val {
                warn!("using non-default {} = {:?}", stringify!($a), val);
            }
            Ok(val)
        }
    };
}

parameter_getter!(co_occurrence_dist_thres, f64);
parameter_getter!(co_occurrence_steps, usize);
parameter_getter!(squidpy_num_thresholds, usize);
parameter_getter!(single_r_quantile, f64);
parameter_getter!(single_r_fine_tune_threshold, f64);
parameter_getter!(spatial_lag_n_neighbors, usize);
parameter_getter!(fuzzy_c_max_iter, usize);
parameter_getter!(fuzzy_c_epsilon, f64);
parameter_getter!(random_seed, u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("parameters.toml");
        std::fs::write(&path, "co_occurrence_steps = 4\nrandom_seed = 7\n")?;
        let params = load(&path)?;
        assert_eq!(params.co_occurrence_steps, 4);
        assert_eq!(params.random_seed, 7);
        assert_eq!(params.single_r_quantile, 80.0);
        Ok(())
    }

    #[test]
    fn test_missing_file_and_bad_keys() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("parameters.toml");
        assert_eq!(load(&path)?, DEFAULT_PARAMETERS);
        std::fs::write(&path, "no_such_parameter = 1\n")?;
        assert!(load(&path).is_err());
        Ok(())
    }
}

//! Spatial lag model per gene, fit by spatial two stage least squares
//! (GM lag) with the group dummies as exogenous regressors.
#![allow(missing_docs)]

use anyhow::{bail, ensure, Result};
use log::{debug, info, warn};
use ndarray::{concatenate, s, Array1, Array2, ArrayView1, Axis};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rayon::prelude::*;
use st_types::{Categories, ExpData, SpatialLagResult};
use stats::linalg::spd_inverse;
use stats::normal_two_sided_p;

use crate::neighbors::{knn_weights, SpatialWeights};

/// Reference category; cells relabelled to it get no dummy.
pub const OTHERS: &str = "others";
const LAG_VARIABLE: &str = "W_log_exp";

#[derive(Debug, Clone)]
pub struct SpatialLagParams {
    /// Genes to fit; all genes when `None`. Unknown genes are skipped.
    pub genes: Option<Vec<String>>,
    /// Relabel a random sample, as large as the smallest group, as the
    /// reference category.
    pub random_drop: bool,
    /// Relabel this group as the reference category.
    pub drop_dummy: Option<String>,
    pub n_neighbors: usize,
    pub seed: u64,
}

impl Default for SpatialLagParams {
    fn default() -> Self {
        SpatialLagParams {
            genes: None,
            random_drop: true,
            drop_dummy: None,
            n_neighbors: 8,
            seed: 0,
        }
    }
}

/// Group labels after moving the reference cells to `OTHERS`.
fn reference_labels(labels: &[String], params: &SpatialLagParams) -> Result<Vec<String>> {
    let mut labels = labels.to_vec();
    if params.random_drop {
        let cats = Categories::from_labels(&labels);
        let min_group = cats.counts().into_iter().min().unwrap_or(0);
        let mut rng = SmallRng::seed_from_u64(params.seed);
        for i in rand::seq::index::sample(&mut rng, labels.len(), min_group) {
            labels[i] = OTHERS.to_string();
        }
    }
    if let Some(drop) = &params.drop_dummy {
        ensure!(labels.contains(drop), "group {drop} to drop is not present");
        for label in labels.iter_mut().filter(|l| l.as_str() == drop.as_str()) {
            *label = OTHERS.to_string();
        }
    }
    ensure!(
        labels.iter().any(|l| l == OTHERS),
        "the spatial lag model needs a reference category: enable random_drop or set drop_dummy"
    );
    Ok(labels)
}

/// Gene independent parts of the model.
struct Design {
    /// `[1, X]`
    exog: Array2<f64>,
    /// `[1, X, W X]`
    instruments: Array2<f64>,
    /// `(H'H)^-1`, or the reason it does not exist
    hth_inv: Result<Array2<f64>>,
    weights: SpatialWeights,
}

impl Design {
    fn new(dummies: Array2<f64>, weights: SpatialWeights) -> Result<Self> {
        let ones = Array2::ones((dummies.nrows(), 1));
        let lagged = weights.lag_columns(dummies.view());
        let exog = concatenate(Axis(1), &[ones.view(), dummies.view()])?;
        let instruments = concatenate(Axis(1), &[exog.view(), lagged.view()])?;
        let hth_inv = spd_inverse(instruments.t().dot(&instruments).view());
        Ok(Design {
            exog,
            instruments,
            hth_inv,
            weights,
        })
    }

    /// Coefficients, z statistics and p values for `[1, X, Wy]`.
    fn fit(&self, y: ArrayView1<'_, f64>) -> Result<[Array1<f64>; 3]> {
        let hth_inv = match &self.hth_inv {
            Ok(m) => m,
            Err(e) => bail!("instrument cross product is singular: {e}"),
        };
        let n = y.len() as f64;
        let wy = self.weights.lag(y).insert_axis(Axis(1));
        let z = concatenate(Axis(1), &[self.exog.view(), wy.view()])?;
        let h = &self.instruments;

        let zth = z.t().dot(h);
        let zth_p = zth.dot(hth_inv);
        let varb = spd_inverse(zth_p.dot(&zth.t()).view())?;
        let betas = varb.dot(&zth_p.dot(&h.t().dot(&y)));

        let resid = &y - &z.dot(&betas);
        let sig2 = resid.dot(&resid) / n;
        let zstat: Array1<f64> = betas
            .iter()
            .zip(varb.diag())
            .map(|(b, v)| b / (sig2 * v).sqrt())
            .collect();
        let pval = zstat.mapv(normal_two_sided_p);
        Ok([betas, zstat, pval])
    }
}

fn dummies(labels: &[String], groups: &[String]) -> Array2<f64> {
    let mut x = Array2::zeros((labels.len(), groups.len()));
    for (i, label) in labels.iter().enumerate() {
        if let Some(g) = groups.iter().position(|grp| grp == label) {
            x[[i, g]] = 1.0;
        }
    }
    x
}

/// Fit the spatial lag model of every selected gene against the groups in
/// cell column `cluster_key`. Genes whose system is singular get `NaN`.
pub fn spatial_lag(
    data: &ExpData,
    cluster_key: &str,
    params: &SpatialLagParams,
) -> Result<SpatialLagResult> {
    let labels = reference_labels(data.cluster(cluster_key)?, params)?;
    let groups: Vec<String> = Categories::from_labels(&labels)
        .names
        .into_iter()
        .filter(|g| g != OTHERS)
        .collect();

    let gene_idx: Vec<usize> = match &params.genes {
        None => (0..data.n_genes()).collect(),
        Some(wanted) => (0..data.n_genes())
            .filter(|&g| wanted.contains(&data.genes().names()[g]))
            .collect(),
    };
    ensure!(!gene_idx.is_empty(), "none of the requested genes are present");

    let weights = knn_weights(data.position().view(), params.n_neighbors)?;
    let design = Design::new(dummies(&labels, &groups), weights)?;
    info!(
        "spatial lag of {} genes with {} group dummies and {} neighbours",
        gene_idx.len(),
        groups.len(),
        params.n_neighbors
    );

    let fits: Vec<Option<[Array1<f64>; 3]>> = gene_idx
        .par_iter()
        .map(|&g| {
            let y = data.matrix().column_dense(g);
            match design.fit(y.view()) {
                Ok(fit) => Some(fit),
                Err(e) => {
                    debug!("spatial lag of {} failed: {e:#}", data.genes().names()[g]);
                    None
                }
            }
        })
        .collect();

    let mut variables = vec!["const".to_string()];
    variables.extend(groups);
    variables.push(LAG_VARIABLE.to_string());
    let shape = (gene_idx.len(), variables.len());
    let mut tables = [
        Array2::from_elem(shape, f64::NAN),
        Array2::from_elem(shape, f64::NAN),
        Array2::from_elem(shape, f64::NAN),
    ];
    let mut failed = 0;
    for (row, fit) in fits.iter().enumerate() {
        match fit {
            Some(fit) => {
                for (table, values) in tables.iter_mut().zip(fit) {
                    table.slice_mut(s![row, ..]).assign(values);
                }
            }
            None => failed += 1,
        }
    }
    if failed > 0 {
        warn!("spatial lag model was singular for {failed} genes, reported as NaN");
    }
    let [coeff, zstat, pval] = tables;
    Ok(SpatialLagResult {
        genes: gene_idx
            .iter()
            .map(|&g| data.genes().names()[g].clone())
            .collect(),
        variables,
        coeff,
        zstat,
        pval,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use st_types::{AnalysisResult, BinType, Cells, ClusterResult, ExpMatrix, Genes};

    const LABELS: [&str; 12] = ["a", "a", "b", "c", "a", "b", "b", "c", "c", "a", "b", "a"];

    fn lag_data() -> ExpData {
        let n = LABELS.len();
        let cells = Cells::cells((0..n).map(|i| format!("c{i}")).collect()).unwrap();
        let genes = Genes::genes(vec!["signal".into(), "empty".into()]).unwrap();
        let mut matrix = Array2::zeros((n, 2));
        let mut position = Array2::zeros((n, 2));
        for (i, label) in LABELS.iter().enumerate() {
            matrix[[i, 0]] = match *label {
                "a" => 3.0,
                "b" => 6.0,
                _ => 1.0,
            };
            position[[i, 0]] = i as f64;
            position[[i, 1]] = (i % 3) as f64 * 0.5;
        }
        let mut data = ExpData::new(
            cells,
            genes,
            ExpMatrix::Dense(matrix),
            position,
            BinType::CellBins,
        )
        .unwrap();
        data.insert_result(
            "leiden",
            AnalysisResult::Cluster(ClusterResult {
                groups: LABELS.iter().map(|s| s.to_string()).collect(),
            }),
        )
        .unwrap();
        data
    }

    #[test]
    fn test_recovers_group_effects() -> Result<()> {
        let data = lag_data();
        let params = SpatialLagParams {
            random_drop: false,
            drop_dummy: Some("c".into()),
            n_neighbors: 2,
            ..Default::default()
        };
        let res = spatial_lag(&data, "leiden", &params)?;
        assert_eq!(res.variables, ["const", "a", "b", "W_log_exp"]);
        assert_eq!(res.genes, ["signal", "empty"]);
        // y = 1 + 2 [a] + 5 [b] exactly, with no lag effect
        let expected = [1.0, 2.0, 5.0, 0.0];
        for (got, want) in res.coeff.row(0).iter().zip(expected) {
            assert!((got - want).abs() < 1e-8, "{got} vs {want}");
        }
        assert!(res.coeff.row(1).iter().all(|v| v.is_nan()));
        Ok(())
    }

    #[test]
    fn test_reference_category() -> Result<()> {
        let data = lag_data();
        let none = SpatialLagParams {
            random_drop: false,
            n_neighbors: 2,
            ..Default::default()
        };
        assert!(spatial_lag(&data, "leiden", &none).is_err());

        let labels: Vec<String> = LABELS.iter().map(|s| s.to_string()).collect();
        let params = SpatialLagParams::default();
        let first = reference_labels(&labels, &params)?;
        assert_eq!(first, reference_labels(&labels, &params)?);
        // the smallest group, c, has three cells
        assert_eq!(first.iter().filter(|l| *l == OTHERS).count(), 3);

        let missing = SpatialLagParams {
            drop_dummy: Some("z".into()),
            ..Default::default()
        };
        assert!(reference_labels(&labels, &missing).is_err());
        Ok(())
    }

    #[test]
    fn test_design_layout() -> Result<()> {
        let labels: Vec<String> = ["a", "b", "others"].iter().map(|s| s.to_string()).collect();
        let positions = ndarray::array![[0.0, 0.0], [1.0, 0.0], [3.0, 0.0]];
        let weights = knn_weights(positions.view(), 1)?;
        let design = Design::new(dummies(&labels, &["a".to_string(), "b".to_string()]), weights)?;
        assert_eq!(
            design.exog,
            ndarray::array![[1.0, 1.0, 0.0], [1.0, 0.0, 1.0], [1.0, 0.0, 0.0]]
        );
        // W X: 0 -> 1, 1 -> 0, 2 -> 1
        assert_eq!(
            design.instruments.slice(s![.., 3..]),
            ndarray::array![[0.0, 1.0], [1.0, 0.0], [0.0, 1.0]]
        );
        Ok(())
    }
}

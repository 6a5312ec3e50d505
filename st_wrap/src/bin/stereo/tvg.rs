use crate::{or_parameter, prepare_out_dir, InputArgs};
use anyhow::{Context, Result};
use clap::Args;
use log::info;
use st_ana::time_series::{FUZZY_C_RESULT, FUZZY_C_WEIGHT, GREATER_PVALUE, LESS_PVALUE, LOG_FC};
use st_ana::{FuzzyCParams, PValCombination, StPipeline};
use st_io::tables::{write_annotation, write_matrix};

#[derive(Args, Debug, Clone)]
pub(crate) struct TvgArgs {
    #[clap(flatten)]
    pub(crate) input: InputArgs,

    /// Groups of the cluster column, in time order
    #[clap(long, value_delimiter = ',', required = true, value_name = "GROUP,...")]
    pub(crate) branch: Vec<String>,

    /// How the per step p-values are combined: mean, fisher or fdr
    #[clap(long, default_value = "fisher", value_name = "METHOD")]
    combination: PValCombination,

    /// Also cluster the genes by branch pattern into this many clusters
    #[clap(long, value_name = "N")]
    fuzzy_clusters: Option<usize>,

    /// Fuzzifier of fuzzy C-means
    #[clap(long, default_value_t = 2.0, value_name = "M")]
    fuzzifier: f64,

    #[clap(long, value_name = "N")]
    max_iter: Option<usize>,

    #[clap(long, value_name = "EPS")]
    epsilon: Option<f64>,

    #[clap(long, value_name = "SEED")]
    seed: Option<u64>,
}

pub(crate) fn run(args: &TvgArgs) -> Result<()> {
    let input = &args.input;
    input.require_cluster()?;
    prepare_out_dir(&input.out_dir)?;

    let mut pipe = StPipeline::new(input.load()?);
    pipe.tvg_marker(&input.cluster_key, &args.branch, args.combination)?;
    let mut columns = vec![LESS_PVALUE, GREATER_PVALUE, LOG_FC];

    if let Some(clusters) = args.fuzzy_clusters {
        let params = FuzzyCParams {
            m: args.fuzzifier,
            max_iter: or_parameter(args.max_iter, parameters_toml::fuzzy_c_max_iter)?,
            epsilon: or_parameter(args.epsilon, parameters_toml::fuzzy_c_epsilon)?,
            seed: or_parameter(args.seed, parameters_toml::random_seed)?,
        };
        pipe.fuzzy_c_gene_pattern_cluster::<String>(clusters, &params, None)?;
        let genes = pipe.data().genes();
        let weights = genes
            .matrix(FUZZY_C_WEIGHT)
            .context("fuzzy C-means stored no weights")?;
        let cluster_names: Vec<String> = (0..clusters).map(|c| c.to_string()).collect();
        write_matrix(
            &input.out_dir.join("fuzzy_c_weight.csv"),
            "gene",
            genes.names(),
            &cluster_names,
            weights.view(),
        )?;
        columns.push(FUZZY_C_RESULT);
    }

    let path = input.out_dir.join("tvg_genes.csv");
    write_annotation(&path, pipe.data().genes(), &columns)?;
    info!("wrote {} genes to {}", pipe.data().n_genes(), path.display());
    Ok(())
}

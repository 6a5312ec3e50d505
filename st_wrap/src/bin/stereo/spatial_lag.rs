use crate::{or_parameter, prepare_out_dir, InputArgs};
use anyhow::{bail, Result};
use clap::Args;
use spatial::SpatialLagParams;
use st_ana::StPipeline;
use st_io::tables::write_spatial_lag;
use st_types::AnalysisResult;

const RES_KEY: &str = "spatial_lag";

#[derive(Args, Debug, Clone)]
pub(crate) struct SpatialLagArgs {
    #[clap(flatten)]
    input: InputArgs,

    /// Genes to fit, all genes by default
    #[clap(long, value_delimiter = ',', value_name = "GENE,...")]
    genes: Option<Vec<String>>,

    /// Keep every cell in its own group instead of relabelling a random
    /// sample as the reference category
    #[clap(long)]
    no_random_drop: bool,

    /// Use this group as the reference category
    #[clap(long, value_name = "GROUP")]
    drop_dummy: Option<String>,

    #[clap(long, value_name = "K")]
    n_neighbors: Option<usize>,

    #[clap(long, value_name = "SEED")]
    seed: Option<u64>,
}

pub(crate) fn run(args: &SpatialLagArgs) -> Result<()> {
    let input = &args.input;
    input.require_cluster()?;
    prepare_out_dir(&input.out_dir)?;
    let params = SpatialLagParams {
        genes: args.genes.clone(),
        random_drop: !args.no_random_drop,
        drop_dummy: args.drop_dummy.clone(),
        n_neighbors: or_parameter(args.n_neighbors, parameters_toml::spatial_lag_n_neighbors)?,
        seed: or_parameter(args.seed, parameters_toml::random_seed)?,
    };

    let mut pipe = StPipeline::new(input.load()?);
    pipe.spatial_lag(&input.cluster_key, &params, RES_KEY)?;
    let Some(AnalysisResult::SpatialLag(result)) = pipe.data().result(RES_KEY) else {
        bail!("no spatial lag result under {RES_KEY}");
    };
    write_spatial_lag(&input.out_dir.join("spatial_lag.csv"), result)
}

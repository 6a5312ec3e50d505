use crate::{load_cluster, or_parameter, prepare_out_dir, InputArgs};
use anyhow::{bail, Result};
use clap::Args;
use st_ana::preprocess::{log1p, normalize_total};
use st_ana::{SingleRParams, StPipeline, TargetSum};
use st_io::read_gem;
use st_io::tables::write_single_r;
use st_types::{AnalysisResult, BinType, ExpData};
use st_wrap::utils::CliPath;

const RES_KEY: &str = "single_r";

#[derive(Args, Debug, Clone)]
pub(crate) struct SingleRArgs {
    #[clap(flatten)]
    input: InputArgs,

    /// GEM file of the labelled reference
    #[clap(long, value_name = "PATH")]
    ref_gem: CliPath,

    #[clap(long, default_value = "cell_bins", value_name = "BIN_TYPE")]
    ref_bin_type: BinType,

    /// Cluster CSV holding the reference labels
    #[clap(long, value_name = "PATH")]
    ref_cluster: CliPath,

    /// Column the reference labels are stored under, and the column the
    /// assigned labels are written to
    #[clap(long, default_value = "celltype", value_name = "KEY")]
    ref_use_col: String,

    /// Score the clusters of --cluster instead of single cells
    #[clap(long)]
    by_cluster: bool,

    /// Normalize to 1e4 counts per cell and log1p both datasets first
    #[clap(long)]
    normalize: bool,

    #[clap(long, value_name = "PCT")]
    quantile: Option<f64>,

    #[clap(long, value_name = "SCORE")]
    fine_tune_threshold: Option<f64>,

    /// Upper bound on fine tuning rounds, 0 for none
    #[clap(long, default_value_t = 0, value_name = "N")]
    fine_tune_times: usize,
}

fn normalized(mut data: ExpData) -> Result<ExpData> {
    let matrix = log1p(&normalize_total(data.matrix(), TargetSum::default()));
    data.set_matrix(matrix)?;
    Ok(data)
}

pub(crate) fn run(args: &SingleRArgs) -> Result<()> {
    let input = &args.input;
    let test_cluster_col = if args.by_cluster {
        input.require_cluster()?;
        Some(input.cluster_key.as_str())
    } else {
        None
    };
    prepare_out_dir(&input.out_dir)?;
    let params = SingleRParams {
        quantile: or_parameter(args.quantile, parameters_toml::single_r_quantile)?,
        fine_tune_threshold: or_parameter(
            args.fine_tune_threshold,
            parameters_toml::single_r_fine_tune_threshold,
        )?,
        fine_tune_times: args.fine_tune_times,
    };

    let mut reference = read_gem(args.ref_gem.existing_file()?, args.ref_bin_type)?;
    load_cluster(&mut reference, &args.ref_cluster, &args.ref_use_col)?;
    let mut data = input.load()?;
    if args.normalize {
        reference = normalized(reference)?;
        data = normalized(data)?;
    }

    let mut pipe = StPipeline::new(data);
    pipe.single_r(&reference, &args.ref_use_col, test_cluster_col, &params, RES_KEY)?;
    let Some(AnalysisResult::SingleR(result)) = pipe.data().result(RES_KEY) else {
        bail!("no SingleR result under {RES_KEY}");
    };
    write_single_r(&input.out_dir.join("single_r.csv"), result)
}

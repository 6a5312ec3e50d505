use crate::{load_cluster, or_parameter, prepare_out_dir};
use anyhow::{bail, ensure, Result};
use clap::Args;
use log::info;
use spatial::{ms_co_occur_integrate, CoOccurrenceMethod, CoOccurrenceParams};
use st_ana::StPipeline;
use st_io::read_gem;
use st_io::tables::write_co_occurrence;
use st_types::{AnalysisResult, BinType, MsData};
use st_wrap::utils::CliPath;

const RES_KEY: &str = "co_occurrence";

#[derive(Args, Debug, Clone)]
pub(crate) struct CoOccurrenceArgs {
    /// GEM file of a slice, repeat for several slices
    #[clap(long, value_name = "PATH", required = true)]
    pub(crate) gem: Vec<CliPath>,

    /// Cluster CSV of each slice, in the order of --gem
    #[clap(long, value_name = "PATH", required = true)]
    cluster: Vec<CliPath>,

    /// Names of the slices, `0`, `1`, ... by default
    #[clap(long, value_name = "NAME")]
    slice_name: Vec<String>,

    #[clap(long, default_value = "bin100", value_name = "BIN_TYPE")]
    pub(crate) bin_type: BinType,

    #[clap(long, default_value = "cluster", value_name = "KEY")]
    cluster_key: String,

    /// `stereopy` or `squidpy`
    #[clap(long, default_value = "stereopy", value_name = "METHOD")]
    method: CoOccurrenceMethod,

    #[clap(long, value_name = "DIST")]
    dist_thres: Option<f64>,

    #[clap(long, value_name = "N")]
    steps: Option<usize>,

    #[clap(long, value_name = "N")]
    num_thresholds: Option<usize>,

    /// Score these genes around each group instead of groups
    #[clap(long, value_delimiter = ',', value_name = "GENE,...")]
    genes: Option<Vec<String>>,

    /// Expression a gene needs to count as present
    #[clap(long, default_value_t = 0.0, value_name = "VALUE")]
    gene_thresh: f64,

    /// Slices to integrate, `a,b` or `a,b|c` to subtract a second group;
    /// all slices by default
    #[clap(long, value_name = "SCOPE")]
    pub(crate) scope: Option<String>,

    /// Output directory, created when missing
    #[clap(long, value_name = "PATH")]
    out_dir: CliPath,
}

impl CoOccurrenceArgs {
    fn params(&self) -> Result<CoOccurrenceParams> {
        Ok(CoOccurrenceParams {
            method: self.method,
            dist_thres: or_parameter(self.dist_thres, parameters_toml::co_occurrence_dist_thres)?,
            steps: or_parameter(self.steps, parameters_toml::co_occurrence_steps)?,
            genes: self.genes.clone(),
            gene_thresh: self.gene_thresh,
            num_thresholds: or_parameter(
                self.num_thresholds,
                parameters_toml::squidpy_num_thresholds,
            )?,
        })
    }

    fn slice_names(&self) -> Result<Vec<String>> {
        if self.slice_name.is_empty() {
            return Ok((0..self.gem.len()).map(|i| i.to_string()).collect());
        }
        ensure!(
            self.slice_name.len() == self.gem.len(),
            "{} slice names for {} GEM files",
            self.slice_name.len(),
            self.gem.len()
        );
        Ok(self.slice_name.clone())
    }
}

pub(crate) fn run(args: &CoOccurrenceArgs) -> Result<()> {
    ensure!(
        args.gem.len() == args.cluster.len(),
        "{} GEM files but {} cluster files",
        args.gem.len(),
        args.cluster.len()
    );
    prepare_out_dir(&args.out_dir)?;
    let params = args.params()?;
    let names = args.slice_names()?;

    let mut slices = Vec::with_capacity(args.gem.len());
    for (gem, cluster) in args.gem.iter().zip(&args.cluster) {
        let mut data = read_gem(gem.existing_file()?, args.bin_type)?;
        load_cluster(&mut data, cluster, &args.cluster_key)?;
        let mut pipe = StPipeline::new(data);
        pipe.co_occurrence(&args.cluster_key, &params, RES_KEY)?;
        slices.push(pipe.into_data());
    }

    let result = if let [data] = slices.as_slice() {
        let Some(AnalysisResult::CoOccurrence(result)) = data.result(RES_KEY) else {
            bail!("no co-occurrence result under {RES_KEY}");
        };
        result.clone()
    } else {
        let ms = MsData::new(slices, names)?;
        let scope = args.scope.clone().unwrap_or_else(|| ms.names().join(","));
        info!("integrating co-occurrence over {scope}");
        ms_co_occur_integrate(&ms, &scope, &args.cluster_key, RES_KEY)?
    };
    let paths = write_co_occurrence(&args.out_dir, RES_KEY, &result)?;
    info!("wrote {} co-occurrence tables to {}", paths.len(), args.out_dir);
    Ok(())
}

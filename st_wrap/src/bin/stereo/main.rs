//! stereo: analyses of spatial transcriptomics GEM files.
#![deny(missing_docs)]

mod cellbin;
mod co_occurrence;
mod qc;
mod single_r;
mod spatial_lag;
mod tvg;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use st_io::{attach_cluster, read_cluster_csv, read_gem};
use st_types::{BinType, ExpData};
use st_wrap::logging::init_logging;
use st_wrap::utils::CliPath;
use std::path::Path;

#[derive(Parser, Debug)]
#[clap(name = "stereo", version, about = "Spatial transcriptomics analyses of GEM files")]
struct Cli {
    /// Log filter, overridden by RUST_LOG
    #[clap(long, global = true, default_value = "info", value_name = "LEVEL")]
    log_level: String,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Quality control metrics and cell, gene and coordinate filters
    Qc(qc::QcArgs),
    /// Co-occurrence of groups with distance, of one slice or several
    CoOccurrence(co_occurrence::CoOccurrenceArgs),
    /// Annotate cells or clusters against a labelled reference
    SingleR(single_r::SingleRArgs),
    /// Time variable genes along a branch of groups
    Tvg(tvg::TvgArgs),
    /// Spatial lag regression of gene expression on groups
    SpatialLag(spatial_lag::SpatialLagArgs),
    /// Cell and DNB tables of a cell-bin GEM
    Cellbin(cellbin::CellbinArgs),
}

/// The expression data and, optionally, a grouping of its cells.
#[derive(Args, Debug, Clone)]
struct InputArgs {
    /// GEM file, optionally gzip compressed
    #[clap(long, value_name = "PATH")]
    gem: CliPath,

    /// `bin<size>` or `cell_bins`
    #[clap(long, default_value = "bin100", value_name = "BIN_TYPE")]
    bin_type: BinType,

    /// CSV with `bins,group` columns
    #[clap(long, value_name = "PATH")]
    cluster: Option<CliPath>,

    /// Result key the grouping is stored under
    #[clap(long, default_value = "cluster", value_name = "KEY")]
    cluster_key: String,

    /// Output directory, created when missing
    #[clap(long, value_name = "PATH")]
    out_dir: CliPath,
}

impl InputArgs {
    fn load(&self) -> Result<ExpData> {
        let mut data = read_gem(self.gem.existing_file()?, self.bin_type)?;
        if let Some(cluster) = &self.cluster {
            load_cluster(&mut data, cluster, &self.cluster_key)?;
        }
        Ok(data)
    }

    fn require_cluster(&self) -> Result<&CliPath> {
        self.cluster
            .as_ref()
            .context("this command needs a grouping of the cells, pass --cluster")
    }
}

fn load_cluster(data: &mut ExpData, path: &CliPath, key: &str) -> Result<()> {
    let rows = read_cluster_csv(path.existing_file()?)?;
    attach_cluster(data, key, &rows)
}

/// Create `dir` if needed.
fn prepare_out_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| dir.display().to_string())
}

/// The command line value when given, the parameters.toml value otherwise.
fn or_parameter<T>(value: Option<T>, parameter: fn() -> Result<T>) -> Result<T> {
    value.map_or_else(parameter, Ok)
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Qc(args) => qc::run(&args),
        Command::CoOccurrence(args) => co_occurrence::run(&args),
        Command::SingleR(args) => single_r::run(&args),
        Command::Tvg(args) => tvg::run(&args),
        Command::SpatialLag(args) => spatial_lag::run(&args),
        Command::Cellbin(args) => cellbin::run(&args),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;
    info!("stereo {}", env!("CARGO_PKG_VERSION"));
    run(cli)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        let cli = Cli::try_parse_from([
            "stereo",
            "tvg",
            "--gem",
            "/data/a.gem",
            "--cluster",
            "/data/a.csv",
            "--branch",
            "0,1,2",
            "--out-dir",
            "/out",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        let Command::Tvg(args) = cli.command else {
            panic!("expected tvg");
        };
        assert_eq!(args.branch, ["0", "1", "2"]);
        assert_eq!(args.input.bin_type, BinType::Bins(100));
        assert_eq!(args.input.cluster_key, "cluster");

        let cli = Cli::try_parse_from([
            "stereo",
            "co-occurrence",
            "--gem",
            "/data/a.gem",
            "--cluster",
            "/data/a.csv",
            "--gem",
            "/data/b.gem",
            "--cluster",
            "/data/b.csv",
            "--bin-type",
            "cell_bins",
            "--scope",
            "0|1",
            "--out-dir",
            "/out",
        ])
        .unwrap();
        let Command::CoOccurrence(args) = cli.command else {
            panic!("expected co-occurrence");
        };
        assert_eq!(args.gem.len(), 2);
        assert_eq!(args.bin_type, BinType::CellBins);
        assert_eq!(args.scope.as_deref(), Some("0|1"));
    }

    #[test]
    fn test_reject_bad_values() {
        assert!(Cli::try_parse_from([
            "stereo",
            "qc",
            "--gem",
            "/data/a.gem",
            "--bin-type",
            "bin0",
            "--out-dir",
            "/out",
        ])
        .is_err());
        assert!(Cli::try_parse_from(["stereo", "cellbin", "--out-dir", "/out"]).is_err());
    }

    #[test]
    fn test_cellbin_end_to_end() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let gem = dir.path().join("cells.gem");
        std::fs::write(
            &gem,
            "geneID\tx\ty\tMIDCount\tlabel\n\
             A\t1\t1\t2\t5\n\
             B\t2\t1\t1\t3\n\
             A\t3\t3\t4\t5\n",
        )?;
        let out = dir.path().join("tables");
        let cli = Cli::try_parse_from([
            "stereo",
            "cellbin",
            "--gem",
            gem.to_str().unwrap(),
            "--out-dir",
            out.to_str().unwrap(),
        ])?;
        run(cli)?;
        let cells = std::fs::read_to_string(out.join("cell.csv"))?;
        assert_eq!(cells, "cell_id,offset,count\n3,0,1\n5,1,2\n");
        assert_eq!(std::fs::read_to_string(out.join("genes.txt"))?, "A\nB\n");
        Ok(())
    }

    #[test]
    fn test_qc_end_to_end() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let gem = dir.path().join("bins.gem");
        std::fs::write(
            &gem,
            "geneID\tx\ty\tMIDCount\n\
             A\t0\t0\t2\n\
             MT-1\t1\t0\t2\n\
             A\t150\t0\t5\n",
        )?;
        let out = dir.path().join("qc");
        let cli = Cli::try_parse_from([
            "stereo",
            "qc",
            "--gem",
            gem.to_str().unwrap(),
            "--out-dir",
            out.to_str().unwrap(),
            "--max-pct-counts-mt",
            "10",
            "--filtered-gem",
        ])?;
        run(cli)?;
        let cells = std::fs::read_to_string(out.join("cells_qc.csv"))?;
        assert_eq!(cells.lines().count(), 2);
        let filtered = std::fs::read_to_string(out.join("filtered.gem"))?;
        assert_eq!(filtered.lines().count(), 2);
        Ok(())
    }
}

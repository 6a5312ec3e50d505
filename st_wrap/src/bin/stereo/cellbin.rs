use crate::prepare_out_dir;
use anyhow::Result;
use clap::Args;
use log::info;
use st_io::cellbin::cell_bin_tables;
use st_io::read_gem_records;
use st_wrap::utils::CliPath;

#[derive(Args, Debug, Clone)]
pub(crate) struct CellbinArgs {
    /// GEM file with a label or CellID column
    #[clap(long, value_name = "PATH")]
    gem: CliPath,

    /// Output directory, created when missing
    #[clap(long, value_name = "PATH")]
    out_dir: CliPath,
}

pub(crate) fn run(args: &CellbinArgs) -> Result<()> {
    prepare_out_dir(&args.out_dir)?;
    let records = read_gem_records(args.gem.existing_file()?)?;
    let tables = cell_bin_tables(&records)?;
    tables.write(&args.out_dir)?;
    info!(
        "{} cells, {} DNBs, {} genes written to {}",
        tables.cells.len(),
        tables.dnbs.len(),
        tables.genes.len(),
        args.out_dir
    );
    Ok(())
}

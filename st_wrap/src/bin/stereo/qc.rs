use crate::{load_cluster, prepare_out_dir, InputArgs};
use anyhow::Result;
use clap::Args;
use log::info;
use st_ana::preprocess::{N_CELLS, N_COUNTS, N_GENES_BY_COUNTS, PCT_COUNTS_MT, TOTAL_COUNTS};
use st_ana::{CellFilter, CoordinateFilter, GeneFilter, StPipeline};
use st_io::gem::gem_to_exp_data;
use st_io::tables::write_annotation;
use st_io::{read_gem_records, subset_records, write_gem};

#[derive(Args, Debug, Clone)]
pub(crate) struct QcArgs {
    #[clap(flatten)]
    pub(crate) input: InputArgs,

    /// Keep cells expressing at least this many genes
    #[clap(long, value_name = "N")]
    min_gene: Option<usize>,

    /// Keep cells expressing at most this many genes
    #[clap(long, value_name = "N")]
    max_gene: Option<usize>,

    /// Keep cells with at least this many counts
    #[clap(long, value_name = "N")]
    min_counts: Option<f64>,

    /// Keep cells with at most this many counts
    #[clap(long, value_name = "N")]
    max_counts: Option<f64>,

    /// Keep cells with at most this percentage of mitochondrial counts
    #[clap(long, value_name = "PCT")]
    max_pct_counts_mt: Option<f64>,

    /// Keep genes expressed in at least this many cells
    #[clap(long, value_name = "N")]
    min_cell: Option<usize>,

    /// Keep genes expressed in at most this many cells
    #[clap(long, value_name = "N")]
    max_cell: Option<usize>,

    #[clap(long, value_name = "X")]
    min_x: Option<f64>,
    #[clap(long, value_name = "X")]
    max_x: Option<f64>,
    #[clap(long, value_name = "Y")]
    min_y: Option<f64>,
    #[clap(long, value_name = "Y")]
    max_y: Option<f64>,

    /// Also write the DNB records of the kept cells and genes
    #[clap(long)]
    filtered_gem: bool,
}

pub(crate) fn run(args: &QcArgs) -> Result<()> {
    let input = &args.input;
    prepare_out_dir(&input.out_dir)?;
    let records = read_gem_records(input.gem.existing_file()?)?;
    let mut data = gem_to_exp_data(&records, input.bin_type)?;
    if let Some(cluster) = &input.cluster {
        load_cluster(&mut data, cluster, &input.cluster_key)?;
    }

    let mut pipe = StPipeline::new(data);
    pipe.filter_coordinates(
        &CoordinateFilter {
            min_x: args.min_x,
            max_x: args.max_x,
            min_y: args.min_y,
            max_y: args.max_y,
        },
        true,
    )?;
    pipe.filter_cells(
        &CellFilter {
            min_gene: args.min_gene,
            max_gene: args.max_gene,
            min_n_genes_by_counts: args.min_counts,
            max_n_genes_by_counts: args.max_counts,
            pct_counts_mt: args.max_pct_counts_mt,
            cell_list: None,
        },
        true,
    )?;
    pipe.filter_genes(
        &GeneFilter {
            min_cell: args.min_cell,
            max_cell: args.max_cell,
            gene_list: None,
        },
        true,
    )?;
    pipe.cal_qc()?;

    let data = pipe.data();
    write_annotation(
        &input.out_dir.join("cells_qc.csv"),
        data.cells(),
        &[TOTAL_COUNTS, N_GENES_BY_COUNTS, PCT_COUNTS_MT],
    )?;
    write_annotation(
        &input.out_dir.join("genes_qc.csv"),
        data.genes(),
        &[N_CELLS, N_COUNTS],
    )?;
    if args.filtered_gem {
        let kept = subset_records(&records, data)?;
        let path = input.out_dir.join("filtered.gem");
        write_gem(&path, &kept)?;
        info!("wrote {} of {} records to {}", kept.len(), records.len(), path.display());
    }
    Ok(())
}

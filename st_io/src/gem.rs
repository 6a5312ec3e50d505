//! GEM files: tab separated DNB level expression, optionally gzipped.
#![allow(missing_docs)]

use anyhow::{bail, ensure, Context, Result};
use csv::StringRecord;
use flate2::read::MultiGzDecoder;
use log::info;
use ndarray::Array2;
use st_types::{BinType, Cells, ExpData, ExpMatrix, Genes};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

const COUNT_COLUMNS: [&str; 3] = ["MIDCount", "MIDCounts", "UMICount"];
const LABEL_COLUMNS: [&str; 2] = ["label", "CellID"];

/// One DNB x gene line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GemRecord {
    pub gene_id: String,
    pub x: i64,
    pub y: i64,
    pub count: u32,
    pub label: Option<u32>,
    pub exon_count: Option<u32>,
    pub tag: Option<u32>,
}

struct GemColumns {
    gene: usize,
    x: usize,
    y: usize,
    count: usize,
    label: Option<usize>,
    exon: Option<usize>,
    tag: Option<usize>,
}

fn field<T>(row: &StringRecord, idx: usize, name: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = row
        .get(idx)
        .with_context(|| format!("missing column {name}"))?
        .trim();
    value
        .parse()
        .with_context(|| format!("invalid {name} value '{value}'"))
}

impl GemColumns {
    fn from_header(header: &StringRecord) -> Result<Self> {
        let find = |names: &[&str]| {
            header
                .iter()
                .position(|h| names.iter().any(|n| *n == h.trim()))
        };
        let required = |name: &str| {
            find(&[name]).with_context(|| format!("GEM header lacks the {name} column"))
        };
        Ok(GemColumns {
            gene: required("geneID")?,
            x: required("x")?,
            y: required("y")?,
            count: find(&COUNT_COLUMNS).with_context(|| {
                format!("GEM header lacks a count column, one of {COUNT_COLUMNS:?}")
            })?,
            label: find(&LABEL_COLUMNS),
            exon: find(&["ExonCount"]),
            tag: find(&["tag"]),
        })
    }

    fn parse(&self, row: &StringRecord) -> Result<GemRecord> {
        let optional = |idx: Option<usize>, name: &str| -> Result<Option<u32>> {
            idx.map(|i| field(row, i, name)).transpose()
        };
        Ok(GemRecord {
            gene_id: field(row, self.gene, "geneID")?,
            x: field(row, self.x, "x")?,
            y: field(row, self.y, "y")?,
            count: field(row, self.count, "count")?,
            label: optional(self.label, "label")?,
            exon_count: optional(self.exon, "ExonCount")?,
            tag: optional(self.tag, "tag")?,
        })
    }
}

/// Open a text file, decompressing it when the name ends in `.gz`.
pub fn open_text(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).with_context(|| path.display().to_string())?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(MultiGzDecoder::new(BufReader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Parse GEM text. Lines starting with `#` are metadata and skipped.
pub fn parse_gem(reader: impl Read) -> Result<Vec<GemRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .comment(Some(b'#'))
        .from_reader(reader);
    let columns = GemColumns::from_header(reader.headers()?)?;
    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row?;
        records.push(
            columns
                .parse(&row)
                .with_context(|| format!("GEM record {}", line + 1))?,
        );
    }
    Ok(records)
}

pub fn read_gem_records(path: &Path) -> Result<Vec<GemRecord>> {
    parse_gem(open_text(path)?).with_context(|| path.display().to_string())
}

/// Name of the square bin containing a DNB: `(bx << 32) | by`.
pub fn bin_cell_name(bx: u64, by: u64) -> u64 {
    (bx << 32) | by
}

/// Observation a record belongs to: its square bin, or its label for cell
/// bins. `None` for DNBs outside any cell (label 0).
pub fn cell_key(record: &GemRecord, bin_type: BinType) -> Result<Option<u64>> {
    Ok(match bin_type {
        BinType::Bins(size) => {
            ensure!(
                record.x >= 0 && record.y >= 0,
                "negative coordinate ({}, {}) cannot be binned",
                record.x,
                record.y
            );
            let (bx, by) = (record.x as u64 / size as u64, record.y as u64 / size as u64);
            ensure!(by < 1 << 32, "y coordinate {} is out of range", record.y);
            Some(bin_cell_name(bx, by))
        }
        BinType::CellBins => match record.label {
            Some(0) => None,
            Some(label) => Some(label as u64),
            None => bail!("reading cell bins requires a label or CellID column"),
        },
    })
}

/// Aggregate DNB records into an observation x gene matrix.
///
/// Square bins group DNBs by `floor(coord / size)`; cell bins group by
/// label and drop label 0. Genes and cells keep their first-appearance
/// order and repeated (cell, gene) counts are summed.
pub fn gem_to_exp_data(records: &[GemRecord], bin_type: BinType) -> Result<ExpData> {
    let mut gene_index: HashMap<&str, usize> = HashMap::new();
    let mut gene_names = Vec::new();
    let mut cell_index: HashMap<u64, usize> = HashMap::new();
    let mut cell_keys = Vec::new();
    let mut coord_sums: Vec<(f64, f64, usize)> = Vec::new();
    let mut triplets = Vec::with_capacity(records.len());

    for record in records {
        let Some(key) = cell_key(record, bin_type)? else {
            continue;
        };
        let cell = *cell_index.entry(key).or_insert_with(|| {
            cell_keys.push(key);
            coord_sums.push((0.0, 0.0, 0));
            cell_keys.len() - 1
        });
        let gene = *gene_index
            .entry(record.gene_id.as_str())
            .or_insert_with(|| {
                gene_names.push(record.gene_id.clone());
                gene_names.len() - 1
            });
        let sums = &mut coord_sums[cell];
        sums.0 += record.x as f64;
        sums.1 += record.y as f64;
        sums.2 += 1;
        triplets.push((cell, gene, record.count as f64));
    }

    let mut position = Array2::zeros((cell_keys.len(), 2));
    for (i, (&key, &(sx, sy, n))) in cell_keys.iter().zip(&coord_sums).enumerate() {
        let (px, py) = match bin_type {
            BinType::Bins(size) => (
                ((key >> 32) * size as u64) as f64,
                ((key & 0xffff_ffff) * size as u64) as f64,
            ),
            BinType::CellBins => (sx / n as f64, sy / n as f64),
        };
        position[[i, 0]] = px;
        position[[i, 1]] = py;
    }

    let matrix = ExpMatrix::from_triplets((cell_keys.len(), gene_names.len()), triplets);
    let cells = Cells::cells(cell_keys.iter().map(u64::to_string).collect())?;
    let genes = Genes::genes(gene_names)?;
    Ok(ExpData::new(cells, genes, matrix, position, bin_type)?)
}

/// Read a GEM file into expression data.
pub fn read_gem(path: &Path, bin_type: BinType) -> Result<ExpData> {
    let records = read_gem_records(path)?;
    let data = gem_to_exp_data(&records, bin_type).with_context(|| path.display().to_string())?;
    info!(
        "read {} as {bin_type}: {} cells x {} genes from {} records",
        path.display(),
        data.n_cells(),
        data.n_genes(),
        records.len()
    );
    Ok(data)
}

/// Records whose cell and gene are both still present in `data`, for
/// writing filtered data back out as GEM.
pub fn subset_records(records: &[GemRecord], data: &ExpData) -> Result<Vec<GemRecord>> {
    let mut kept = Vec::new();
    for record in records {
        let Some(key) = cell_key(record, data.bin_type())? else {
            continue;
        };
        if data.cell_index(&key.to_string()).is_some() && data.gene_index(&record.gene_id).is_some() {
            kept.push(record.clone());
        }
    }
    Ok(kept)
}

/// Write records with the `geneID x y UMICount label tag` columns. Missing
/// labels and tags are written as 0.
pub fn write_gem(path: &Path, records: &[GemRecord]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| path.display().to_string())?;
    writer.write_record(["geneID", "x", "y", "UMICount", "label", "tag"])?;
    for r in records {
        writer.write_record([
            r.gene_id.clone(),
            r.x.to_string(),
            r.y.to_string(),
            r.count.to_string(),
            r.label.unwrap_or(0).to_string(),
            r.tag.unwrap_or(0).to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

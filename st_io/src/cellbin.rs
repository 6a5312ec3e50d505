//! Cell and DNB tables of a cell-bin dataset. Each cell points at a
//! contiguous run of DNB rows, so DNBs are grouped by label.
#![allow(missing_docs)]

use crate::gem::GemRecord;
use anyhow::{Context, Result};
use itertools::Itertools;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellEntry {
    pub cell_id: u32,
    /// first row of this cell in the DNB table
    pub offset: u32,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DnbEntry {
    pub x: i64,
    pub y: i64,
    pub count: u32,
    /// index into the gene list returned alongside
    pub gene_id: u32,
}

pub struct CellBinTables {
    pub genes: Vec<String>,
    pub cells: Vec<CellEntry>,
    pub dnbs: Vec<DnbEntry>,
}

/// Build the tables from labelled records. Records are ordered by label,
/// keeping input order within a label.
pub fn cell_bin_tables(records: &[GemRecord]) -> Result<CellBinTables> {
    let mut gene_ids: HashMap<&str, u32> = HashMap::new();
    let mut genes = Vec::new();
    let mut labelled = Vec::with_capacity(records.len());
    for (line, r) in records.iter().enumerate() {
        let label = r
            .label
            .with_context(|| format!("record {} has no cell label", line + 1))?;
        let gene_id = *gene_ids.entry(r.gene_id.as_str()).or_insert_with(|| {
            genes.push(r.gene_id.clone());
            (genes.len() - 1) as u32
        });
        labelled.push((label, r, gene_id));
    }
    labelled.sort_by_key(|(label, _, _)| *label);

    let mut cells = Vec::new();
    let mut dnbs = Vec::with_capacity(labelled.len());
    for (cell_id, run) in &labelled.iter().chunk_by(|(label, _, _)| *label) {
        let offset = dnbs.len() as u32;
        for (_, r, gene_id) in run {
            dnbs.push(DnbEntry {
                x: r.x,
                y: r.y,
                count: r.count,
                gene_id: *gene_id,
            });
        }
        cells.push(CellEntry {
            cell_id,
            offset,
            count: dnbs.len() as u32 - offset,
        });
    }
    Ok(CellBinTables { genes, cells, dnbs })
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| path.display().to_string())?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

impl CellBinTables {
    /// Write `cell.csv`, `dnb.csv` and `genes.txt` into `dir`.
    pub fn write(&self, dir: &Path) -> Result<()> {
        write_rows(&dir.join("cell.csv"), &self.cells)?;
        write_rows(&dir.join("dnb.csv"), &self.dnbs)?;
        let genes_path = dir.join("genes.txt");
        std::fs::write(&genes_path, self.genes.iter().map(|g| format!("{g}\n")).join(""))
            .with_context(|| genes_path.display().to_string())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gem::parse_gem;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tables() -> Result<()> {
        let records = parse_gem(
            "geneID\tx\ty\tUMICount\tlabel\n\
             A\t0\t0\t1\t7\n\
             B\t5\t5\t2\t3\n\
             A\t1\t0\t3\t7\n\
             C\t6\t5\t1\t3\n"
                .as_bytes(),
        )?;
        let tables = cell_bin_tables(&records)?;
        assert_eq!(tables.genes, ["A", "B", "C"]);
        assert_eq!(
            tables.cells,
            vec![
                CellEntry {
                    cell_id: 3,
                    offset: 0,
                    count: 2
                },
                CellEntry {
                    cell_id: 7,
                    offset: 2,
                    count: 2
                },
            ]
        );
        assert_eq!(
            tables.dnbs.iter().map(|d| (d.x, d.gene_id)).collect::<Vec<_>>(),
            vec![(5, 1), (6, 2), (0, 0), (1, 0)]
        );

        let dir = tempfile::tempdir()?;
        tables.write(dir.path())?;
        let cell_csv = std::fs::read_to_string(dir.path().join("cell.csv"))?;
        assert_eq!(cell_csv, "cell_id,offset,count\n3,0,2\n7,2,2\n");
        Ok(())
    }

    #[test]
    fn test_missing_label() -> Result<()> {
        let records = parse_gem("geneID\tx\ty\tUMICount\nA\t0\t0\t1\n".as_bytes())?;
        assert!(cell_bin_tables(&records).is_err());
        Ok(())
    }
}

//! CSV writers for analysis results.
#![allow(missing_docs)]

use anyhow::{bail, Context, Result};
use csv::Writer;
use ndarray::ArrayView2;
use st_types::{Annotation, CoOccurrenceResult, SingleRResult, SpatialLagResult};
use std::fs::File;
use std::path::{Path, PathBuf};

fn create(path: &Path) -> Result<Writer<File>> {
    Writer::from_path(path).with_context(|| path.display().to_string())
}

/// Write a labelled matrix, one row per `row_names` entry.
pub fn write_matrix<S: AsRef<str>>(
    path: &Path,
    corner: &str,
    row_names: &[S],
    col_names: &[S],
    values: ArrayView2<'_, f64>,
) -> Result<()> {
    let mut writer = create(path)?;
    writer.write_record(std::iter::once(corner).chain(col_names.iter().map(|c| c.as_ref())))?;
    for (name, row) in row_names.iter().zip(values.rows()) {
        writer.write_record(
            std::iter::once(name.as_ref().to_string()).chain(row.iter().map(f64::to_string)),
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// One file per center group, `{prefix}_{group}.csv`, with a row per
/// distance threshold and a column per neighbor.
pub fn write_co_occurrence(
    dir: &Path,
    prefix: &str,
    result: &CoOccurrenceResult,
) -> Result<Vec<PathBuf>> {
    let thresholds: Vec<String> = result.thresholds.iter().map(f64::to_string).collect();
    let mut paths = Vec::with_capacity(result.groups.len());
    for (c, group) in result.groups.iter().enumerate() {
        let path = dir.join(format!("{prefix}_{group}.csv"));
        let table = result.values.index_axis(ndarray::Axis(0), c);
        write_matrix(
            &path,
            "threshold",
            &thresholds,
            &result.neighbors,
            table.t(),
        )?;
        paths.push(path);
    }
    Ok(paths)
}

/// `bins,group,first_labels` plus the per label scores.
pub fn write_single_r(path: &Path, result: &SingleRResult) -> Result<()> {
    let mut writer = create(path)?;
    writer.write_record(
        ["bins", "group", "first_labels"]
            .into_iter()
            .chain(result.labels.iter().map(String::as_str)),
    )?;
    for (i, bins) in result.bins.iter().enumerate() {
        writer.write_record(
            [
                bins.clone(),
                result.groups[i].clone(),
                result.first_labels[i].clone(),
            ]
            .into_iter()
            .chain(result.scores.row(i).iter().map(f64::to_string)),
        )?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_spatial_lag(path: &Path, result: &SpatialLagResult) -> Result<()> {
    let mut writer = create(path)?;
    writer.write_record(std::iter::once("gene".to_string()).chain(result.column_names()))?;
    for (g, gene) in result.genes.iter().enumerate() {
        let mut record = vec![gene.clone()];
        for v in 0..result.variables.len() {
            for table in [&result.coeff, &result.zstat, &result.pval] {
                record.push(table[[g, v]].to_string());
            }
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the named columns of a cell or gene annotation, one row per name.
pub fn write_annotation(path: &Path, annotation: &Annotation, keys: &[&str]) -> Result<()> {
    for key in keys {
        if annotation.numeric(key).is_none() && annotation.categorical(key).is_none() {
            bail!("column {key} is not present");
        }
    }
    let mut writer = create(path)?;
    writer.write_record(std::iter::once("name").chain(keys.iter().copied()))?;
    for (i, name) in annotation.names().iter().enumerate() {
        let mut record = vec![name.clone()];
        for key in keys {
            let value = match annotation.numeric(key) {
                Some(values) => values[i].to_string(),
                None => annotation
                    .categorical(key)
                    .map(|values| values[i].clone())
                    .unwrap_or_default(),
            };
            record.push(value);
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

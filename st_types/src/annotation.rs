//! Per-cell and per-gene annotation tables.
#![allow(missing_docs)]

use crate::DataError;
use ndarray::{Array2, Axis};
use std::collections::{BTreeMap, HashMap};

/// Unique names plus named columns aligned with them. Used both for cells
/// (obs) and genes (var).
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    kind: &'static str,
    names: Vec<String>,
    index: HashMap<String, usize>,
    categorical: BTreeMap<String, Vec<String>>,
    numeric: BTreeMap<String, Vec<f64>>,
    matrices: BTreeMap<String, Array2<f64>>,
}

/// Cell annotation (obs).
pub type Cells = Annotation;
/// Gene annotation (var).
pub type Genes = Annotation;

impl Annotation {
    pub fn cells(names: Vec<String>) -> Result<Self, DataError> {
        Self::new("cell", names)
    }

    pub fn genes(names: Vec<String>) -> Result<Self, DataError> {
        Self::new("gene", names)
    }

    fn new(kind: &'static str, names: Vec<String>) -> Result<Self, DataError> {
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(DataError::duplicate(kind, name.as_str()));
            }
        }
        Ok(Annotation {
            kind,
            names,
            index,
            categorical: BTreeMap::new(),
            numeric: BTreeMap::new(),
            matrices: BTreeMap::new(),
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Positions of `names`, failing on the first unknown one.
    pub fn indices_of<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>, DataError> {
        names
            .iter()
            .map(|n| {
                self.index_of(n.as_ref())
                    .ok_or_else(|| DataError::not_found(self.kind, n.as_ref()))
            })
            .collect()
    }

    fn check_len(&self, key: &str, len: usize) -> Result<(), DataError> {
        if len != self.len() {
            return Err(DataError::ShapeMismatch(format!(
                "column '{key}' has {len} values for {} {}s",
                self.len(),
                self.kind
            )));
        }
        Ok(())
    }

    pub fn set_categorical(&mut self, key: &str, values: Vec<String>) -> Result<(), DataError> {
        self.check_len(key, values.len())?;
        self.categorical.insert(key.to_string(), values);
        Ok(())
    }

    pub fn categorical(&self, key: &str) -> Option<&[String]> {
        self.categorical.get(key).map(Vec::as_slice)
    }

    pub fn categorical_keys(&self) -> impl Iterator<Item = &str> {
        self.categorical.keys().map(String::as_str)
    }

    pub fn set_numeric(&mut self, key: &str, values: Vec<f64>) -> Result<(), DataError> {
        self.check_len(key, values.len())?;
        self.numeric.insert(key.to_string(), values);
        Ok(())
    }

    pub fn numeric(&self, key: &str) -> Option<&[f64]> {
        self.numeric.get(key).map(Vec::as_slice)
    }

    pub fn numeric_keys(&self) -> impl Iterator<Item = &str> {
        self.numeric.keys().map(String::as_str)
    }

    /// Attach a matrix with one row per name.
    pub fn set_matrix(&mut self, key: &str, values: Array2<f64>) -> Result<(), DataError> {
        self.check_len(key, values.nrows())?;
        self.matrices.insert(key.to_string(), values);
        Ok(())
    }

    pub fn matrix(&self, key: &str) -> Option<&Array2<f64>> {
        self.matrices.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.categorical.contains_key(key)
            || self.numeric.contains_key(key)
            || self.matrices.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let a = self.categorical.remove(key).is_some();
        let b = self.numeric.remove(key).is_some();
        let c = self.matrices.remove(key).is_some();
        a || b || c
    }

    /// Keep the entries at `idx`, in that order, along with every column.
    pub fn select(&self, idx: &[usize]) -> Annotation {
        let names: Vec<String> = idx.iter().map(|&i| self.names[i].clone()).collect();
        let index = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        Annotation {
            kind: self.kind,
            names,
            index,
            categorical: self
                .categorical
                .iter()
                .map(|(k, v)| (k.clone(), idx.iter().map(|&i| v[i].clone()).collect()))
                .collect(),
            numeric: self
                .numeric
                .iter()
                .map(|(k, v)| (k.clone(), idx.iter().map(|&i| v[i]).collect()))
                .collect(),
            matrices: self
                .matrices
                .iter()
                .map(|(k, m)| (k.clone(), m.select(Axis(0), idx)))
                .collect(),
        }
    }
}

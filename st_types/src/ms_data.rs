//! Named collections of slices analysed together.
#![allow(missing_docs)]

use crate::{DataError, ExpData};
use std::collections::HashMap;

const SLICE: &str = "slice";

/// An ordered list of `ExpData` slices with unique names.
#[derive(Debug, Clone, Default)]
pub struct MsData {
    data: Vec<ExpData>,
    names: Vec<String>,
}

impl MsData {
    /// Slices beyond the provided names receive automatic names.
    pub fn new(data: Vec<ExpData>, names: Vec<String>) -> Result<Self, DataError> {
        if names.len() > data.len() {
            return Err(DataError::ShapeMismatch(format!(
                "{} names given for {} slices",
                names.len(),
                data.len()
            )));
        }
        let mut ms = MsData::default();
        let mut names = names.into_iter();
        for slice in data {
            let name = names.next();
            ms.add_data(slice, name.as_deref())?;
        }
        Ok(ms)
    }

    /// The smallest non-negative integer, as text, not yet taken.
    fn next_auto_name(&self) -> String {
        (0..)
            .map(|i: usize| i.to_string())
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_default()
    }

    /// Append a slice and return its name.
    pub fn add_data(&mut self, data: ExpData, name: Option<&str>) -> Result<&str, DataError> {
        let name = match name {
            Some(name) if self.contains(name) => return Err(DataError::duplicate(SLICE, name)),
            Some(name) => name.to_string(),
            None => self.next_auto_name(),
        };
        self.data.push(data);
        self.names.push(name);
        Ok(self.names.last().map(String::as_str).unwrap_or_default())
    }

    pub fn del_data(&mut self, name: &str) -> Result<ExpData, DataError> {
        let idx = self
            .index_of(name)
            .ok_or_else(|| DataError::not_found(SLICE, name))?;
        self.names.remove(idx);
        Ok(self.data.remove(idx))
    }

    /// Rename slices. Keys that are not slice names are ignored; the names
    /// after renaming must still be unique.
    pub fn rename(&mut self, mapping: &HashMap<String, String>) -> Result<(), DataError> {
        let renamed: Vec<String> = self
            .names
            .iter()
            .map(|n| mapping.get(n).unwrap_or(n).clone())
            .collect();
        for (i, name) in renamed.iter().enumerate() {
            if renamed[..i].contains(name) {
                return Err(DataError::duplicate(SLICE, name.as_str()));
            }
        }
        self.names = renamed;
        Ok(())
    }

    /// Names become `"0"`, `"1"`, ... in slice order.
    pub fn reset_name(&mut self) {
        self.names = (0..self.data.len()).map(|i| i.to_string()).collect();
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn num_slice(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&ExpData> {
        self.index_of(name).map(|i| &self.data[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ExpData> {
        self.index_of(name).map(move |i| &mut self.data[i])
    }

    pub fn get_index(&self, idx: usize) -> Option<&ExpData> {
        self.data.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExpData)> {
        self.names.iter().map(String::as_str).zip(self.data.iter())
    }

    /// A new collection holding copies of the named slices in the given
    /// order.
    pub fn subset<S: AsRef<str>>(&self, names: &[S]) -> Result<MsData, DataError> {
        let mut out = MsData::default();
        for name in names {
            let name = name.as_ref();
            let data = self
                .get(name)
                .ok_or_else(|| DataError::not_found(SLICE, name))?;
            out.add_data(data.clone(), Some(name))?;
        }
        Ok(out)
    }

    /// The cell column `key` of every slice, concatenated in slice order.
    pub fn merged_obs(&self, key: &str) -> Result<Vec<String>, DataError> {
        let mut merged = Vec::new();
        for (name, data) in self.iter() {
            let column = data
                .cells()
                .categorical(key)
                .ok_or_else(|| DataError::not_found("cell column", format!("{name}/{key}")))?;
            merged.extend_from_slice(column);
        }
        Ok(merged)
    }

    /// Run `f` on every slice in order, stopping at the first error.
    pub fn for_each_slice<E>(
        &mut self,
        mut f: impl FnMut(&str, &mut ExpData) -> Result<(), E>,
    ) -> Result<(), E> {
        for (name, data) in self.names.iter().zip(self.data.iter_mut()) {
            f(name, data)?;
        }
        Ok(())
    }
}

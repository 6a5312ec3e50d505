#![allow(missing_docs)]

use itertools::Itertools;
use stats::natural_cmp;
use std::collections::HashMap;

/// Labels encoded as integer codes into a naturally ordered set of unique
/// names, like a categorical column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Categories {
    pub names: Vec<String>,
    pub codes: Vec<usize>,
}

impl Categories {
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        let names: Vec<String> = labels
            .iter()
            .map(|l| l.as_ref())
            .unique()
            .sorted_by(|a, b| natural_cmp(a, b))
            .map(str::to_string)
            .collect();
        let lookup: HashMap<&str, usize> = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_str(), i))
            .collect();
        let codes = labels.iter().map(|l| lookup[l.as_ref()]).collect();
        Categories { names, codes }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Number of labels per category.
    pub fn counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.len()];
        for &code in &self.codes {
            counts[code] += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_categories() {
        let cats = Categories::from_labels(&["10", "2", "b", "2", "1"]);
        assert_eq!(cats.names, ["1", "2", "10", "b"]);
        assert_eq!(cats.codes, [2, 1, 3, 1, 0]);
        assert_eq!(cats.counts(), [1, 2, 1, 1]);
        assert_eq!(cats.index_of("b"), Some(3));
        assert!(Categories::from_labels::<&str>(&[]).is_empty());
    }
}

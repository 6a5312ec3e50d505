use thiserror::Error;

/// Violations of the expression data model invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataError {
    /// A name appears twice where names must be unique.
    #[error("duplicate {kind} name '{name}'")]
    DuplicateName {
        /// what the name identifies (cell, gene, slice)
        kind: &'static str,
        /// the offending name
        name: String,
    },
    /// A lookup by name failed.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// what the name identifies (cell, gene, slice, column)
        kind: &'static str,
        /// the missing name
        name: String,
    },
    /// Two parts of a dataset disagree on their dimensions.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
}

impl DataError {
    pub(crate) fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        DataError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn duplicate(kind: &'static str, name: impl Into<String>) -> Self {
        DataError::DuplicateName {
            kind,
            name: name.into(),
        }
    }
}

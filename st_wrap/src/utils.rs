#![allow(missing_docs)]

use anyhow::{ensure, Result};
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A path from the command line, made absolute against the working
/// directory when parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliPath(PathBuf);

impl FromStr for CliPath {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        ensure!(!s.trim().is_empty(), "empty path");
        let path = PathBuf::from(s);
        if path.is_absolute() {
            Ok(CliPath(path))
        } else {
            Ok(CliPath(std::env::current_dir()?.join(path)))
        }
    }
}

impl Deref for CliPath {
    type Target = Path;

    fn deref(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for CliPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for CliPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl CliPath {
    /// Fail unless the path names an existing file.
    pub fn existing_file(&self) -> Result<&Path> {
        ensure!(self.is_file(), "{self} does not exist or is not a file");
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_path() -> Result<()> {
        let abs: CliPath = "/tmp/sample.gem".parse()?;
        assert_eq!(abs.file_name().and_then(|f| f.to_str()), Some("sample.gem"));
        assert_eq!(abs.to_string(), "/tmp/sample.gem");

        let rel: CliPath = "out/cluster.csv".parse()?;
        assert!(rel.is_absolute());
        assert!(rel.ends_with("out/cluster.csv"));
        assert!(rel.existing_file().is_err());

        assert!("  ".parse::<CliPath>().is_err());
        Ok(())
    }

    #[test]
    fn test_existing_file() -> Result<()> {
        let file = tempfile::NamedTempFile::new()?;
        let path: CliPath = file.path().to_str().unwrap().parse()?;
        assert_eq!(path.existing_file()?, file.path());
        Ok(())
    }
}

//! How DNBs were aggregated into observations.
#![allow(missing_docs)]

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(try_from = "&str", into = "String")]
pub enum BinType {
    /// Square bins of `size` DNBs on a side.
    Bins(u32),
    /// Segmented cells, one observation per cell label.
    CellBins,
}

const BIN_PREFIX: &str = "bin";
const CELL_BINS: &str = "cell_bins";
pub const MAX_BIN_SIZE: u32 = 1000;

impl BinType {
    pub fn bins(size: u32) -> Result<Self> {
        if size == 0 || size > MAX_BIN_SIZE {
            bail!("bin size should be between 1 and {MAX_BIN_SIZE}. Got {size}");
        }
        Ok(BinType::Bins(size))
    }

    /// Side length of a square bin. Cell bins have no fixed size.
    pub fn bin_size(self) -> Option<u32> {
        match self {
            BinType::Bins(size) => Some(size),
            BinType::CellBins => None,
        }
    }

    pub fn is_cell_bins(self) -> bool {
        self == BinType::CellBins
    }
}

impl std::fmt::Display for BinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinType::Bins(size) => write!(f, "{BIN_PREFIX}{size}"),
            BinType::CellBins => write!(f, "{CELL_BINS}"),
        }
    }
}

impl From<BinType> for String {
    fn from(value: BinType) -> Self {
        value.to_string()
    }
}

impl TryFrom<&str> for BinType {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self> {
        value.parse()
    }
}

impl std::str::FromStr for BinType {
    type Err = anyhow::Error;

    fn from_str(bin_type: &str) -> Result<Self> {
        if bin_type == CELL_BINS {
            return Ok(BinType::CellBins);
        }
        let size = bin_type
            .strip_prefix(BIN_PREFIX)
            .with_context(|| format!("Unable to parse {bin_type} as a bin type."))?
            .parse::<u32>()
            .with_context(|| format!("Unable to parse {bin_type} as a bin type."))?;
        BinType::bins(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_type_display() {
        assert_eq!(format!("{}", BinType::bins(50).unwrap()), "bin50");
        assert_eq!(format!("{}", BinType::CellBins), "cell_bins");
    }

    #[test]
    fn test_bin_type_parse() {
        for size in 1..=MAX_BIN_SIZE {
            let bin_type = BinType::bins(size).unwrap();
            assert_eq!(bin_type.to_string().parse::<BinType>().unwrap(), bin_type);
        }
        assert_eq!("cell_bins".parse::<BinType>().unwrap(), BinType::CellBins);
        assert!("bin0".parse::<BinType>().is_err());
        assert!("bin1001".parse::<BinType>().is_err());
        assert!("square_002um".parse::<BinType>().is_err());
    }

    #[test]
    fn test_bin_type_serde() {
        assert_eq!(
            serde_json::to_string(&BinType::bins(100).unwrap()).unwrap(),
            serde_json::to_string("bin100").unwrap()
        );
        assert_eq!(
            BinType::CellBins,
            serde_json::from_str::<BinType>("\"cell_bins\"").unwrap()
        );
        assert_eq!(BinType::bins(20).unwrap().bin_size(), Some(20));
        assert_eq!(BinType::CellBins.bin_size(), None);
    }
}

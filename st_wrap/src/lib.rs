//! st_wrap
//!
//! Support code for the `stereo` command line.
#![deny(missing_docs)]

/// Log output of the command line
pub mod logging;
/// Argument helpers
pub mod utils;

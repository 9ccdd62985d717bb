//! Shared test utilities for the raster-stack workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Fixtures for the standard stack scenarios (asset tables and grids)
//! - In-memory readers with construction/read counters and fault injection
//! - Pixel pattern generators
//! - Zarr asset writers backed by temporary directories
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your integration tests:
//!
//! ```ignore
//! use test_utils::{fixtures, MemoryReaderFactory};
//! ```

pub mod fixtures;
pub mod generators;
pub mod readers;
pub mod zarr;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use readers::*;
pub use zarr::*;

/// Assert every element of an array-like equals `fill`, treating NaN as
/// equal to NaN.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_all_fill;
///
/// assert_all_fill!(block.view(), f64::NAN);
/// ```
#[macro_export]
macro_rules! assert_all_fill {
    ($array:expr, $fill:expr) => {{
        let fill: f64 = $fill as f64;
        for (i, v) in $array.iter().enumerate() {
            let v: f64 = *v as f64;
            let same = (v.is_nan() && fill.is_nan()) || v == fill;
            if !same {
                panic!(
                    "assertion failed: element {} is `{:?}`, expected fill `{:?}`",
                    i, v, fill
                );
            }
        }
    }};
}

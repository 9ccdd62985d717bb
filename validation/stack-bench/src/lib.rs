//! Benchmarks for lazy raster stacks.
//!
//! This crate provides tools to:
//! - Build stacks over large synthetic asset tables and time construction
//! - Compute all or a sample of chunks through the thread-pool scheduler
//! - Output results as console tables or JSON

pub mod bench;
pub mod config;
pub mod report;

pub use bench::{BenchRunner, ComputeReport, GraphReport, LatencyCollector, LatencySummary};
pub use config::BenchConfig;
pub use report::ResultsReport;

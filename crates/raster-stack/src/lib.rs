//! Lazy, chunked 4-D raster stacks over catalogs of assets.
//!
//! Given an `(items, assets)` table of asset URLs and footprints plus an
//! output grid, this crate builds an `(items, assets, rows, cols)` array
//! whose chunks are read on demand. Graph construction never enumerates the
//! `items × assets × row-chunks × col-chunks` product:
//!
//! - **Reader table**: one reader (or fill marker) per asset-table cell
//! - **Window index**: per-axis chunk offsets for the spatial axes
//! - **Fetch layer**: a blockwise product of the two, realized per task
//!
//! # Architecture
//!
//! ```text
//! AssetTable + RasterSpec + StackConfig
//!      │
//!      ▼
//! items_to_array::<T>()
//!      │
//!      ├─► Validate fill value against T (fails before any graph exists)
//!      │
//!      ├─► ReaderTableLayer  (I × A tasks, annotated fuse = false)
//!      │
//!      ├─► Slices            (Y + X offsets, no tasks)
//!      │
//!      └─► FetchLayer        ("tb" × "yx" → I × A × Y × X tasks, none stored)
//!               │
//!               ▼
//!          LazyStack<T>
//!               │
//!               ├─► compute_chunk([i, a, y, x])   pull one block
//!               │
//!               └─► Scheduler::compute()         fuse pass, then run
//!                        │
//!                        ├─► reader cell: asset_table_to_reader_and_window
//!                        │
//!                        └─► fetch_raster_window: fill / read / nodata
//! ```
//!
//! # Example
//!
//! ```ignore
//! use raster_stack::{items_to_array, StackConfig, SyncScheduler, Scheduler, ZarrReaderFactory};
//!
//! let stack = items_to_array::<f64>(table, spec, &StackConfig::default(), Arc::new(ZarrReaderFactory))?;
//! let block = stack.compute_chunk([0, 0, 1, 2])?;
//! let array = SyncScheduler.compute(&stack)?;
//! ```

pub mod block;
pub mod chunks;
pub mod config;
pub mod error;
pub mod fetch;
pub mod graph;
pub mod reader;
pub mod reader_table;
pub mod scheduler;
pub mod stack;
pub mod types;
pub mod window_index;

// Re-export commonly used types at crate root
pub use block::Block;
pub use chunks::normalize_chunks;
pub use config::{AxisChunks, ChunkSpec, StackConfig, DEFAULT_CHUNKSIZE};
pub use error::{NodataPolicy, ReadError, ReadErrorKind, Result, StackError};
pub use fetch::fetch_raster_window;
pub use graph::{
    fuse_blockwise, BlockwiseIndex, FetchLayer, FetchTask, FusionReport, HighLevelGraph, Layer,
    LayerAnnotations, ReaderSource, ReaderTableLayer,
};
pub use reader::{Reader, ReaderFactory, ReaderOptions, ZarrReader, ZarrReaderFactory};
pub use reader_table::{asset_table_to_reader_and_window, ReaderTable, ReaderTableEntry};
pub use scheduler::{ExecutionStats, Scheduler, SyncScheduler, ThreadPoolScheduler};
pub use stack::{items_to_array, Float64Stack, LazyStack};
pub use types::{AssetEntry, AssetTable, LayeredEnv, Resampling};
pub use window_index::Slices;

pub use raster_common::{Affine, BoundingBox, DType, Element, FillValue, RasterSpec, Window};

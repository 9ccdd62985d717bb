//! Building the lazy 4-D stack.

use std::hash::Hash;
use std::sync::Arc;

use raster_common::{DType, Element, RasterSpec, Window};
use tracing::debug;

use crate::block::Block;
use crate::chunks::normalize_chunks;
use crate::config::StackConfig;
use crate::error::{Result, StackError};
use crate::graph::token::{layer_name, tokenize};
use crate::graph::{FetchLayer, HighLevelGraph, Layer, LayerAnnotations, ReaderTableLayer};
use crate::reader::{ReaderFactory, ReaderOptions};
use crate::types::AssetTable;
use crate::window_index::Slices;

/// A lazily evaluated `(items, assets, rows, cols)` array.
///
/// Holds only its task graph. Chunks are realized through
/// [`compute_chunk`](Self::compute_chunk) or a [`Scheduler`](crate::Scheduler).
#[derive(Debug, Clone)]
pub struct LazyStack<T: Element> {
    name: String,
    shape: [usize; 4],
    chunks: [Vec<usize>; 4],
    fill_value: T,
    graph: HighLevelGraph<T>,
}

/// The default `float64` stack.
pub type Float64Stack = LazyStack<f64>;

/// Build the lazy stack for `table` on the grid `spec`.
///
/// The fill value is checked against `T` before anything else, so an
/// unrepresentable fill fails without a graph ever existing. Construction
/// touches each asset-table cell and each chunk boundary once and opens
/// nothing.
pub fn items_to_array<T: Element>(
    table: AssetTable,
    spec: RasterSpec,
    config: &StackConfig,
    factory: Arc<dyn ReaderFactory<T>>,
) -> Result<LazyStack<T>> {
    let fill_value = T::from_fill(config.fill_value).ok_or_else(|| {
        StackError::config(format!(
            "The fill_value {} is incompatible with the output dtype {}. \
             Either use a dtype that can hold {}, or pick a different fill_value.",
            config.fill_value,
            T::DTYPE,
            config.fill_value
        ))
    })?;
    config.validate()?;

    let options = Arc::new(ReaderOptions {
        spec: Arc::new(spec),
        resampling: config.resampling,
        fill_value,
        rescale: config.rescale,
        env: config.env.clone(),
        errors_as_nodata: config.errors_as_nodata.clone(),
    });

    let reader_token = tokenize(|h| {
        table.hash_contents(h);
        options.spec.hash_bits(h);
        options.resampling.hash(h);
        fill_value.as_f64().to_bits().hash(h);
        options.rescale.hash(h);
        options.env.hash(h);
        options.errors_as_nodata.hash(h);
        factory.name().hash(h);
        T::DTYPE.hash(h);
    });
    let reader_name = layer_name("reader-table", &reader_token);

    let table = Arc::new(table);
    let (n_items, n_assets) = table.shape();
    let readers = ReaderTableLayer::new(
        reader_name.clone(),
        Arc::clone(&table),
        Arc::clone(&options),
        factory,
        LayerAnnotations::no_fuse(),
    );

    let spatial = normalize_chunks(&config.chunksize, options.spec.shape)?;
    let slices = Arc::new(Slices::new(&spatial));

    let fetch_token = tokenize(|h| {
        reader_name.hash(h);
        slices.hash(h);
        config.errors_as_nodata.hash(h);
    });
    let name = layer_name("fetch-raster-window", &fetch_token);
    let fetch = FetchLayer::new(
        name.clone(),
        &readers,
        slices,
        config.errors_as_nodata.clone(),
    )?;

    debug!(
        reader_layer = %reader_name,
        reader_blocks = readers.task_count(),
        fetch_layer = %name,
        numblocks = ?fetch.numblocks(),
        fetch_tasks = fetch.task_count(),
        dtype = %T::DTYPE,
        "Built stack graph"
    );

    let mut graph = HighLevelGraph::new();
    graph.add_layer(Layer::ReaderTable(Arc::new(readers)), &[])?;
    graph.add_layer(Layer::Fetch(fetch), &[reader_name.as_str()])?;

    let (rows, cols) = options.spec.shape;
    let [row_chunks, col_chunks] = spatial;
    Ok(LazyStack {
        name,
        shape: [n_items, n_assets, rows, cols],
        chunks: [vec![1; n_items], vec![1; n_assets], row_chunks, col_chunks],
        fill_value,
        graph,
    })
}

impl<T: Element> LazyStack<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    /// Per-axis chunk sizes; item and asset chunks are always 1.
    pub fn chunks(&self) -> &[Vec<usize>; 4] {
        &self.chunks
    }

    pub fn numblocks(&self) -> [usize; 4] {
        [
            self.chunks[0].len(),
            self.chunks[1].len(),
            self.chunks[2].len(),
            self.chunks[3].len(),
        ]
    }

    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    pub fn fill_value(&self) -> T {
        self.fill_value
    }

    pub fn graph(&self) -> &HighLevelGraph<T> {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut HighLevelGraph<T> {
        &mut self.graph
    }

    /// Pixel window of spatial chunk `(y, x)`.
    pub fn chunk_window(&self, y: usize, x: usize) -> Result<Window> {
        self.graph.output()?.slices().window(y, x)
    }

    /// Element offset of chunk `index` within the full array.
    pub fn chunk_offset(&self, index: [usize; 4]) -> Result<[usize; 4]> {
        let (rows, cols) = self
            .graph
            .output()?
            .slices()
            .ranges(index[2], index[3])
            .ok_or_else(|| StackError::graph(format!("chunk {:?} out of range", index)))?;
        Ok([index[0], index[1], rows.start, cols.start])
    }

    /// Realize a single chunk: one reader table cell, one window, one fetch.
    pub fn compute_chunk(&self, index: [usize; 4]) -> Result<Block<T>> {
        let numblocks = self.numblocks();
        if index.iter().zip(numblocks.iter()).any(|(i, n)| i >= n) {
            return Err(StackError::graph(format!(
                "chunk {:?} outside numblocks {:?}",
                index, numblocks
            )));
        }
        let fetch = self.graph.output()?;
        let task = fetch.task(index)?;
        let entry = self
            .graph
            .reader_cell(fetch, task.cell)
            .map_err(|err| err.in_chunk(index))?;
        fetch.run(&task, &entry)
    }
}

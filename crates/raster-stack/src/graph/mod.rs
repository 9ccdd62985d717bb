//! High-level task graph: a handful of layers, each standing for many tasks.
//!
//! A stack's graph has two layers:
//!
//! ```text
//! reader-table-<token>          numblocks (I, A)       one reader per cell
//!        │
//!        ▼  blockwise "tb" × "yx"
//! fetch-raster-window-<token>   numblocks (I, A, Y, X)  one block per task
//!        ▲
//!        └── Slices (window index, no tasks of its own)
//! ```
//!
//! Layers store only their inputs and a [`BlockwiseIndex`]; tasks are derived
//! from a coordinate when a scheduler asks for them, so building the graph
//! costs `O(I·A + Y·X)`.

pub mod blockwise;
pub mod optimize;
pub mod token;

pub use blockwise::{BlockIter, BlockwiseIndex};
pub use optimize::{fuse_blockwise, FusionReport};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use raster_common::{Element, Window};
use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::error::{NodataPolicy, Result, StackError};
use crate::fetch::fetch_raster_window;
use crate::reader::{ReaderFactory, ReaderOptions};
use crate::reader_table::{asset_table_to_reader_and_window, ReaderTableEntry};
use crate::types::AssetTable;
use crate::window_index::Slices;

/// Per-layer hints for optimizers and schedulers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerAnnotations {
    /// Whether the layer may be inlined into its consumer.
    pub fuse: bool,
}

impl Default for LayerAnnotations {
    fn default() -> Self {
        Self { fuse: true }
    }
}

impl LayerAnnotations {
    /// Annotation that keeps a layer materialized as its own tasks.
    pub fn no_fuse() -> Self {
        Self { fuse: false }
    }
}

/// Turns the asset table into reader table cells, one task per cell.
pub struct ReaderTableLayer<T: Element> {
    name: String,
    table: Arc<AssetTable>,
    options: Arc<ReaderOptions<T>>,
    factory: Arc<dyn ReaderFactory<T>>,
    annotations: LayerAnnotations,
}

impl<T: Element> ReaderTableLayer<T> {
    pub fn new(
        name: impl Into<String>,
        table: Arc<AssetTable>,
        options: Arc<ReaderOptions<T>>,
        factory: Arc<dyn ReaderFactory<T>>,
        annotations: LayerAnnotations,
    ) -> Self {
        Self {
            name: name.into(),
            table,
            options,
            factory,
            annotations,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `[n_items, n_assets]`: the asset table is chunked one cell per block.
    pub fn numblocks(&self) -> [usize; 2] {
        let (items, assets) = self.table.shape();
        [items, assets]
    }

    pub fn task_count(&self) -> usize {
        self.numblocks().iter().product()
    }

    pub fn annotations(&self) -> LayerAnnotations {
        self.annotations
    }

    pub fn options(&self) -> &Arc<ReaderOptions<T>> {
        &self.options
    }

    pub fn factory(&self) -> &Arc<dyn ReaderFactory<T>> {
        &self.factory
    }

    /// Realize the reader table cell `[item, asset]`.
    pub fn compute_block(&self, [item, asset]: [usize; 2]) -> Result<ReaderTableEntry<T>> {
        asset_table_to_reader_and_window(
            &self.table,
            item..item + 1,
            asset..asset + 1,
            &self.options,
            self.factory.as_ref(),
        )?
        .into_single()
    }
}

impl<T: Element> fmt::Debug for ReaderTableLayer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderTableLayer")
            .field("name", &self.name)
            .field("numblocks", &self.numblocks())
            .field("factory", &self.factory.name())
            .field("annotations", &self.annotations)
            .finish()
    }
}

/// Where a fetch layer gets its reader table cells from.
#[derive(Debug, Clone)]
pub enum ReaderSource<T: Element> {
    /// Computed once per cell by another layer of the graph.
    Layer(String),
    /// Inlined: every fetch task rebuilds its cell.
    Fused(Arc<ReaderTableLayer<T>>),
}

/// One realized fetch task: which reader cell and which window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchTask {
    pub index: [usize; 4],
    pub cell: [usize; 2],
    pub window: Window,
}

/// Blockwise product of the reader table (`tb`) and the window index (`yx`).
#[derive(Debug, Clone)]
pub struct FetchLayer<T: Element> {
    name: String,
    source: ReaderSource<T>,
    slices: Arc<Slices>,
    index: BlockwiseIndex,
    nodata: NodataPolicy,
    annotations: LayerAnnotations,
}

impl<T: Element> FetchLayer<T> {
    pub fn new(
        name: impl Into<String>,
        reader_table: &ReaderTableLayer<T>,
        slices: Arc<Slices>,
        nodata: NodataPolicy,
    ) -> Result<Self> {
        let index = BlockwiseIndex::new(
            "tbyx",
            &[
                ("tb", &reader_table.numblocks()[..]),
                ("yx", &slices.numblocks()[..]),
            ],
        )?;
        Ok(Self {
            name: name.into(),
            source: ReaderSource::Layer(reader_table.name().to_string()),
            slices,
            index,
            nodata,
            annotations: LayerAnnotations::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn numblocks(&self) -> [usize; 4] {
        let n = self.index.numblocks();
        [n[0], n[1], n[2], n[3]]
    }

    pub fn task_count(&self) -> usize {
        self.index.task_count()
    }

    pub fn annotations(&self) -> LayerAnnotations {
        self.annotations
    }

    pub fn index(&self) -> &BlockwiseIndex {
        &self.index
    }

    pub fn slices(&self) -> &Arc<Slices> {
        &self.slices
    }

    pub fn source(&self) -> &ReaderSource<T> {
        &self.source
    }

    pub fn nodata(&self) -> &NodataPolicy {
        &self.nodata
    }

    pub fn is_fused(&self) -> bool {
        matches!(self.source, ReaderSource::Fused(_))
    }

    /// Derive the task at `index` without running it.
    pub fn task(&self, index: [usize; 4]) -> Result<FetchTask> {
        let cell = self.index.arg_coord(0, &index)?;
        let yx = self.index.arg_coord(1, &index)?;
        Ok(FetchTask {
            index,
            cell: [cell[0], cell[1]],
            window: self.slices.window(yx[0], yx[1])?,
        })
    }

    /// Task at row-major position `flat`.
    pub fn task_at(&self, flat: usize) -> Result<FetchTask> {
        let coord = self.index.coord_from_flat(flat).ok_or_else(|| {
            StackError::graph(format!(
                "task {} out of range for {} tasks",
                flat,
                self.task_count()
            ))
        })?;
        self.task([coord[0], coord[1], coord[2], coord[3]])
    }

    /// Run one task against an already realized reader cell.
    pub fn run(&self, task: &FetchTask, entry: &ReaderTableEntry<T>) -> Result<Block<T>> {
        fetch_raster_window(entry, &task.window, &self.nodata)
            .map_err(|err| err.in_chunk(task.index))
    }

    pub(crate) fn fuse_with(&mut self, producer: Arc<ReaderTableLayer<T>>) {
        self.source = ReaderSource::Fused(producer);
    }
}

/// A graph layer.
#[derive(Debug, Clone)]
pub enum Layer<T: Element> {
    ReaderTable(Arc<ReaderTableLayer<T>>),
    Fetch(FetchLayer<T>),
}

impl<T: Element> Layer<T> {
    pub fn name(&self) -> &str {
        match self {
            Self::ReaderTable(layer) => layer.name(),
            Self::Fetch(layer) => layer.name(),
        }
    }

    pub fn numblocks(&self) -> Vec<usize> {
        match self {
            Self::ReaderTable(layer) => layer.numblocks().to_vec(),
            Self::Fetch(layer) => layer.numblocks().to_vec(),
        }
    }

    pub fn task_count(&self) -> usize {
        match self {
            Self::ReaderTable(layer) => layer.task_count(),
            Self::Fetch(layer) => layer.task_count(),
        }
    }

    pub fn annotations(&self) -> LayerAnnotations {
        match self {
            Self::ReaderTable(layer) => layer.annotations(),
            Self::Fetch(layer) => layer.annotations(),
        }
    }

    fn set_annotations(&mut self, annotations: LayerAnnotations) {
        match self {
            Self::ReaderTable(layer) => {
                let l = layer.as_ref();
                *layer = Arc::new(ReaderTableLayer::new(
                    l.name.clone(),
                    Arc::clone(&l.table),
                    Arc::clone(&l.options),
                    Arc::clone(&l.factory),
                    annotations,
                ));
            }
            Self::Fetch(layer) => layer.annotations = annotations,
        }
    }
}

/// Ordered layers plus the dependencies between them.
#[derive(Debug, Clone)]
pub struct HighLevelGraph<T: Element> {
    layers: Vec<Layer<T>>,
    dependencies: BTreeMap<String, BTreeSet<String>>,
}

impl<T: Element> Default for HighLevelGraph<T> {
    fn default() -> Self {
        Self {
            layers: Vec::new(),
            dependencies: BTreeMap::new(),
        }
    }
}

impl<T: Element> HighLevelGraph<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer. Dependencies must already be in the graph.
    pub fn add_layer(&mut self, layer: Layer<T>, depends_on: &[&str]) -> Result<()> {
        let name = layer.name().to_string();
        if self.layer(&name).is_some() {
            return Err(StackError::graph(format!("duplicate layer '{}'", name)));
        }
        for dep in depends_on {
            if self.layer(dep).is_none() {
                return Err(StackError::graph(format!(
                    "layer '{}' depends on unknown layer '{}'",
                    name, dep
                )));
            }
        }
        self.dependencies.insert(
            name,
            depends_on.iter().map(|d| d.to_string()).collect(),
        );
        self.layers.push(layer);
        Ok(())
    }

    pub fn layers(&self) -> &[Layer<T>] {
        &self.layers
    }

    pub fn layer(&self, name: &str) -> Option<&Layer<T>> {
        self.layers.iter().find(|l| l.name() == name)
    }

    pub fn dependencies(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.dependencies.get(name)
    }

    /// Layers that depend on `name`.
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        self.dependencies
            .iter()
            .filter(|(_, deps)| deps.contains(name))
            .map(|(layer, _)| layer.as_str())
            .collect()
    }

    /// Replace a layer's annotations.
    pub fn annotate(&mut self, name: &str, annotations: LayerAnnotations) -> Result<()> {
        let layer = self
            .layers
            .iter_mut()
            .find(|l| l.name() == name)
            .ok_or_else(|| StackError::graph(format!("no layer '{}'", name)))?;
        layer.set_annotations(annotations);
        Ok(())
    }

    /// Total tasks across layers, computed without enumerating any.
    pub fn task_count(&self) -> usize {
        self.layers.iter().map(Layer::task_count).sum()
    }

    /// The last layer added, whose blocks form the array.
    pub fn output(&self) -> Result<&FetchLayer<T>> {
        match self.layers.last() {
            Some(Layer::Fetch(layer)) => Ok(layer),
            Some(other) => Err(StackError::graph(format!(
                "output layer '{}' is not a fetch layer",
                other.name()
            ))),
            None => Err(StackError::graph("empty graph")),
        }
    }

    pub fn reader_table(&self, name: &str) -> Result<&Arc<ReaderTableLayer<T>>> {
        match self.layer(name) {
            Some(Layer::ReaderTable(layer)) => Ok(layer),
            Some(_) => Err(StackError::graph(format!(
                "layer '{}' is not a reader table",
                name
            ))),
            None => Err(StackError::graph(format!("no layer '{}'", name))),
        }
    }

    /// Resolve the reader table cell a fetch task needs.
    ///
    /// Looks through fused sources; unfused ones are computed from the named
    /// layer here, so callers that want one construction per cell should
    /// memoize around this.
    pub fn reader_cell(&self, fetch: &FetchLayer<T>, cell: [usize; 2]) -> Result<ReaderTableEntry<T>> {
        match fetch.source() {
            ReaderSource::Fused(layer) => layer.compute_block(cell),
            ReaderSource::Layer(name) => self.reader_table(name)?.compute_block(cell),
        }
    }

    pub(crate) fn into_parts(self) -> (Vec<Layer<T>>, BTreeMap<String, BTreeSet<String>>) {
        (self.layers, self.dependencies)
    }

    pub(crate) fn from_parts(
        layers: Vec<Layer<T>>,
        dependencies: BTreeMap<String, BTreeSet<String>>,
    ) -> Self {
        Self {
            layers,
            dependencies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReadError;
    use crate::reader::Reader;
    use crate::types::{AssetEntry, Resampling};
    use ndarray::Array2;
    use raster_common::{Affine, BoundingBox, RasterSpec};

    #[derive(Debug)]
    struct ConstReader;

    impl Reader<f64> for ConstReader {
        fn url(&self) -> &str {
            "const"
        }
        fn read(&self, window: &Window) -> std::result::Result<Array2<f64>, ReadError> {
            Ok(Array2::from_elem(window.shape(), 1.0))
        }
        fn fill_value(&self) -> f64 {
            0.0
        }
    }

    #[derive(Debug)]
    struct ConstFactory;

    impl ReaderFactory<f64> for ConstFactory {
        fn create(
            &self,
            _url: &str,
            _options: &Arc<ReaderOptions<f64>>,
        ) -> std::result::Result<Arc<dyn crate::reader::Reader<f64>>, ReadError> {
            Ok(Arc::new(ConstReader))
        }
        fn name(&self) -> &str {
            "const"
        }
    }

    fn reader_layer(annotations: LayerAnnotations) -> ReaderTableLayer<f64> {
        let table = AssetTable::from_rows(vec![vec![
            AssetEntry::new("a", BoundingBox::new(0.0, 0.0, 4.0, 4.0)),
            AssetEntry::missing(),
        ]])
        .unwrap();
        let options = ReaderOptions {
            spec: Arc::new(RasterSpec::new(
                (4, 6),
                Affine::new(1.0, 0.0, 0.0, 0.0, -1.0, 4.0),
            )),
            resampling: Resampling::Nearest,
            fill_value: 0.0,
            rescale: false,
            env: None,
            errors_as_nodata: NodataPolicy::new(),
        };
        ReaderTableLayer::new(
            "reader-table-x",
            Arc::new(table),
            Arc::new(options),
            Arc::new(ConstFactory),
            annotations,
        )
    }

    fn graph() -> HighLevelGraph<f64> {
        let readers = reader_layer(LayerAnnotations::no_fuse());
        let slices = Arc::new(Slices::new(&[vec![2, 2], vec![3, 3]]));
        let fetch =
            FetchLayer::new("fetch-raster-window-x", &readers, slices, NodataPolicy::new()).unwrap();

        let mut graph = HighLevelGraph::new();
        graph
            .add_layer(Layer::ReaderTable(Arc::new(readers)), &[])
            .unwrap();
        graph
            .add_layer(Layer::Fetch(fetch), &["reader-table-x"])
            .unwrap();
        graph
    }

    #[test]
    fn test_layer_counts_are_additive_in_storage() {
        let graph = graph();
        let fetch = graph.output().unwrap();
        assert_eq!(fetch.numblocks(), [1, 2, 2, 2]);
        assert_eq!(fetch.task_count(), 8);
        assert_eq!(graph.task_count(), 2 + 8);
        assert_eq!(graph.dependents("reader-table-x"), vec!["fetch-raster-window-x"]);
    }

    #[test]
    fn test_task_derivation() {
        let graph = graph();
        let fetch = graph.output().unwrap();
        let task = fetch.task([0, 1, 1, 0]).unwrap();
        assert_eq!(task.cell, [0, 1]);
        assert_eq!(task.window, Window::from_slices(2..4, 0..3));
        assert_eq!(fetch.task_at(5).unwrap().index, [0, 1, 0, 1]);
        assert!(fetch.task([1, 0, 0, 0]).is_err());
        assert!(fetch.task_at(8).is_err());
    }

    #[test]
    fn test_run_task() {
        let graph = graph();
        let fetch = graph.output().unwrap();

        let task = fetch.task([0, 0, 0, 0]).unwrap();
        let entry = graph.reader_cell(fetch, task.cell).unwrap();
        let block = fetch.run(&task, &entry).unwrap();
        assert!(!block.is_fill());
        assert_eq!(block.shape(), [1, 1, 2, 3]);

        // Asset covers cols 0..4 only; cols 3..6 still overlap.
        let task = fetch.task([0, 0, 1, 1]).unwrap();
        let entry = graph.reader_cell(fetch, task.cell).unwrap();
        assert!(!fetch.run(&task, &entry).unwrap().is_fill());

        let task = fetch.task([0, 1, 1, 1]).unwrap();
        let entry = graph.reader_cell(fetch, task.cell).unwrap();
        assert!(fetch.run(&task, &entry).unwrap().is_fill());
    }

    #[test]
    fn test_add_layer_checks() {
        let mut graph = graph();
        let dup = Layer::ReaderTable(Arc::new(reader_layer(LayerAnnotations::default())));
        assert!(graph.add_layer(dup, &[]).is_err());

        let mut graph2: HighLevelGraph<f64> = HighLevelGraph::new();
        let readers = reader_layer(LayerAnnotations::default());
        let fetch = FetchLayer::new(
            "f",
            &readers,
            Arc::new(Slices::new(&[vec![4], vec![6]])),
            NodataPolicy::new(),
        )
        .unwrap();
        assert!(graph2.add_layer(Layer::Fetch(fetch), &["missing"]).is_err());
        assert!(graph2.output().is_err());
    }

    #[test]
    fn test_annotate() {
        let mut graph = graph();
        assert!(!graph.layer("reader-table-x").unwrap().annotations().fuse);
        graph
            .annotate("reader-table-x", LayerAnnotations::default())
            .unwrap();
        assert!(graph.layer("reader-table-x").unwrap().annotations().fuse);
        assert!(graph.annotate("nope", LayerAnnotations::default()).is_err());
    }
}

//! Reader table construction: one reader or fill marker per asset-table cell.
//!
//! This runs over the small `items × assets` grid only. Readers are created
//! here but never opened; the first read inside a fetch task does that.

use std::ops::Range;
use std::sync::Arc;

use raster_common::{Element, Window};
use tracing::debug;

use crate::error::{Result, StackError};
use crate::reader::{Reader, ReaderFactory, ReaderOptions};
use crate::types::{AssetEntry, AssetTable};

/// What a fetch task needs to produce one block for a cell.
#[derive(Debug, Clone)]
pub enum ReaderTableEntry<T: Element> {
    /// An openable asset and its footprint on the output grid.
    Asset {
        reader: Arc<dyn Reader<T>>,
        window: Window,
    },
    /// No asset in this cell; every block is this value.
    Fill(T),
}

impl<T: Element> ReaderTableEntry<T> {
    /// Build the entry for a single cell.
    ///
    /// Bounds are converted with no snapping. Conversion failures carry the
    /// cell coordinate.
    pub fn for_cell(
        cell: &AssetEntry,
        (item, asset): (usize, usize),
        options: &Arc<ReaderOptions<T>>,
        factory: &dyn ReaderFactory<T>,
    ) -> Result<Self> {
        let Some(url) = cell.url.as_deref() else {
            return Ok(Self::Fill(options.fill_value));
        };

        let window = Window::from_bounds(&cell.bounds, &options.spec.transform).map_err(
            |source| StackError::Bounds {
                item,
                asset,
                source,
            },
        )?;

        let reader = factory
            .create(url, options)
            .map_err(|source| StackError::ReaderInit {
                item,
                asset,
                source,
            })?;

        Ok(Self::Asset { reader, window })
    }

    pub fn is_fill(&self) -> bool {
        matches!(self, Self::Fill(_))
    }

    /// Footprint of the asset, `None` for fill entries.
    pub fn window(&self) -> Option<&Window> {
        match self {
            Self::Asset { window, .. } => Some(window),
            Self::Fill(_) => None,
        }
    }
}

/// Row-major grid of entries for one block of the asset table.
#[derive(Debug, Clone)]
pub struct ReaderTable<T: Element> {
    shape: (usize, usize),
    entries: Vec<ReaderTableEntry<T>>,
}

impl<T: Element> ReaderTable<T> {
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at `(item, asset)` relative to the block origin.
    pub fn get(&self, item: usize, asset: usize) -> Option<&ReaderTableEntry<T>> {
        if item >= self.shape.0 || asset >= self.shape.1 {
            return None;
        }
        self.entries.get(item * self.shape.1 + asset)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReaderTableEntry<T>> {
        self.entries.iter()
    }

    pub fn fill_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_fill()).count()
    }

    /// Take ownership of the single entry of a 1×1 block.
    pub fn into_single(self) -> Result<ReaderTableEntry<T>> {
        let shape = self.shape;
        let mut entries = self.entries;
        match (entries.pop(), entries.is_empty()) {
            (Some(entry), true) => Ok(entry),
            _ => Err(StackError::graph(format!(
                "expected a 1x1 reader table block, got {:?}",
                shape
            ))),
        }
    }
}

/// Build the reader table for the `items × assets` block of `table`.
///
/// Cells without a URL become fill entries; the rest get a reader from
/// `factory` and the exact pixel window of their bounds. A bad cell fails the
/// whole block.
pub fn asset_table_to_reader_and_window<T: Element>(
    table: &AssetTable,
    items: Range<usize>,
    assets: Range<usize>,
    options: &Arc<ReaderOptions<T>>,
    factory: &dyn ReaderFactory<T>,
) -> Result<ReaderTable<T>> {
    let (n_items, n_assets) = table.shape();
    if items.end > n_items || assets.end > n_assets || items.start > items.end || assets.start > assets.end {
        return Err(StackError::graph(format!(
            "reader table block {:?}x{:?} outside asset table of shape {:?}",
            items,
            assets,
            table.shape()
        )));
    }

    let shape = (items.len(), assets.len());
    let mut entries = Vec::with_capacity(shape.0 * shape.1);
    for item in items.clone() {
        for asset in assets.clone() {
            let cell = table
                .get(item, asset)
                .ok_or_else(|| StackError::graph(format!("no cell at ({}, {})", item, asset)))?;
            entries.push(ReaderTableEntry::for_cell(cell, (item, asset), options, factory)?);
        }
    }

    let table = ReaderTable { shape, entries };
    debug!(
        items = ?items,
        assets = ?assets,
        cells = table.len(),
        fill_cells = table.fill_count(),
        factory = factory.name(),
        "Built reader table block"
    );
    Ok(table)
}

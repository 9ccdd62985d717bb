//! Core data types: the asset table, resampling modes, layered reader
//! environments.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use raster_common::BoundingBox;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StackError};

/// One (item, asset) cell of the asset table.
///
/// A cell names at most one file. Items with several files for the same
/// asset must pick one before building the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetEntry {
    /// Location of the asset, `None` when the item has no such asset.
    pub url: Option<String>,
    /// Footprint in the raster spec's coordinate space.
    pub bounds: BoundingBox,
}

impl AssetEntry {
    pub fn new(url: impl Into<String>, bounds: BoundingBox) -> Self {
        Self {
            url: Some(url.into()),
            bounds,
        }
    }

    /// A cell with no asset. Its bounds are never consulted.
    pub fn missing() -> Self {
        Self {
            url: None,
            bounds: BoundingBox::new(0.0, 0.0, 0.0, 0.0),
        }
    }
}

/// Row-major grid of assets, shape `(n_items, n_assets)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetTable {
    shape: (usize, usize),
    cells: Vec<AssetEntry>,
}

impl AssetTable {
    /// Build from row-major cells.
    pub fn new(shape: (usize, usize), cells: Vec<AssetEntry>) -> Result<Self> {
        if shape.0 * shape.1 != cells.len() {
            return Err(StackError::config(format!(
                "asset table shape {:?} needs {} cells, got {}",
                shape,
                shape.0 * shape.1,
                cells.len()
            )));
        }
        Ok(Self { shape, cells })
    }

    /// Build from one row per item; every row must have the same length.
    pub fn from_rows(rows: Vec<Vec<AssetEntry>>) -> Result<Self> {
        let n_items = rows.len();
        let n_assets = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|r| r.len() != n_assets) {
            return Err(StackError::config(format!(
                "item {} has {} assets, expected {}",
                bad,
                rows[bad].len(),
                n_assets
            )));
        }
        Self::new((n_items, n_assets), rows.into_iter().flatten().collect())
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn n_items(&self) -> usize {
        self.shape.0
    }

    pub fn n_assets(&self) -> usize {
        self.shape.1
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, item: usize, asset: usize) -> Option<&AssetEntry> {
        if item >= self.shape.0 || asset >= self.shape.1 {
            return None;
        }
        self.cells.get(item * self.shape.1 + asset)
    }

    /// Cells with their `(item, asset)` coordinates, row-major.
    pub fn indexed(&self) -> impl Iterator<Item = ((usize, usize), &AssetEntry)> {
        let n_assets = self.shape.1.max(1);
        self.cells
            .iter()
            .enumerate()
            .map(move |(flat, entry)| ((flat / n_assets, flat % n_assets), entry))
    }

    /// Feed the table contents into a hasher (used for graph tokens).
    pub fn hash_contents<H: Hasher>(&self, state: &mut H) {
        self.shape.hash(state);
        for cell in &self.cells {
            cell.url.hash(state);
            cell.bounds.hash_bits(state);
        }
    }
}

/// Resampling method used by readers when warping assets onto the output
/// grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resampling {
    /// Nearest neighbor (preserves exact values).
    #[default]
    Nearest,
    Bilinear,
    Cubic,
    Average,
    Mode,
    Min,
    Max,
    Med,
    Q1,
    Q3,
}

impl Resampling {
    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.to_lowercase().as_str() {
            "nearest" => Self::Nearest,
            "bilinear" => Self::Bilinear,
            "cubic" | "bicubic" => Self::Cubic,
            "average" | "mean" => Self::Average,
            "mode" => Self::Mode,
            "min" => Self::Min,
            "max" => Self::Max,
            "med" | "median" => Self::Med,
            "q1" => Self::Q1,
            "q3" => Self::Q3,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Bilinear => "bilinear",
            Self::Cubic => "cubic",
            Self::Average => "average",
            Self::Mode => "mode",
            Self::Min => "min",
            Self::Max => "max",
            Self::Med => "med",
            Self::Q1 => "q1",
            Self::Q3 => "q3",
        }
    }
}

impl std::fmt::Display for Resampling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Native-library environment overrides for readers, in three layers.
///
/// `always` applies everywhere; `open` and `read` are layered on top of it
/// for the open and read phases respectively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayeredEnv {
    #[serde(default)]
    pub always: BTreeMap<String, String>,
    #[serde(default)]
    pub open: BTreeMap<String, String>,
    #[serde(default)]
    pub read: BTreeMap<String, String>,
}

impl LayeredEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn always(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.always.insert(key.into(), value.into());
        self
    }

    pub fn on_open(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.open.insert(key.into(), value.into());
        self
    }

    pub fn on_read(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.read.insert(key.into(), value.into());
        self
    }

    /// Effective settings while opening a dataset.
    pub fn open_env(&self) -> BTreeMap<String, String> {
        Self::layer(&self.always, &self.open)
    }

    /// Effective settings while reading pixels.
    pub fn read_env(&self) -> BTreeMap<String, String> {
        Self::layer(&self.always, &self.read)
    }

    fn layer(
        base: &BTreeMap<String, String>,
        over: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let mut merged = base.clone();
        merged.extend(over.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

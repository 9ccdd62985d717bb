//! Chunk-coordinate to pixel-window lookup for the row/col axes.
//!
//! Only the cumulative chunk offsets of each axis are stored, so the index
//! costs `O(n_row_chunks + n_col_chunks)` no matter how many `(y, x)` chunk
//! pairs it answers for. It never produces tasks of its own: blockwise layers
//! consult it while realizing their tasks.

use std::ops::Range;

use raster_common::Window;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StackError};

/// Pixel-space windows for every `(y, x)` chunk coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slices {
    /// Per axis, chunk start offsets followed by the axis length.
    starts: [Vec<usize>; 2],
}

impl Slices {
    /// Build from per-axis chunk sizes.
    pub fn new(chunks: &[Vec<usize>; 2]) -> Self {
        let accumulate = |sizes: &[usize]| {
            let mut starts = Vec::with_capacity(sizes.len() + 1);
            starts.push(0);
            let mut acc = 0;
            for size in sizes {
                acc += size;
                starts.push(acc);
            }
            starts
        };
        Self {
            starts: [accumulate(&chunks[0]), accumulate(&chunks[1])],
        }
    }

    /// Number of chunks along `(rows, cols)`.
    pub fn numblocks(&self) -> [usize; 2] {
        [
            self.starts[0].len().saturating_sub(1),
            self.starts[1].len().saturating_sub(1),
        ]
    }

    /// Pixel shape `(rows, cols)` covered by the index.
    pub fn shape(&self) -> (usize, usize) {
        (
            self.starts[0].last().copied().unwrap_or(0),
            self.starts[1].last().copied().unwrap_or(0),
        )
    }

    /// Per-axis chunk sizes, the inverse of [`Slices::new`].
    pub fn chunks(&self) -> [Vec<usize>; 2] {
        let sizes = |starts: &[usize]| starts.windows(2).map(|w| w[1] - w[0]).collect();
        [sizes(&self.starts[0]), sizes(&self.starts[1])]
    }

    /// Row and column ranges of chunk `(y, x)`.
    pub fn ranges(&self, y: usize, x: usize) -> Option<(Range<usize>, Range<usize>)> {
        let rows = &self.starts[0];
        let cols = &self.starts[1];
        if y + 1 >= rows.len() || x + 1 >= cols.len() {
            return None;
        }
        Some((rows[y]..rows[y + 1], cols[x]..cols[x + 1]))
    }

    /// Window of chunk `(y, x)`, or `None` when out of range.
    pub fn get(&self, y: usize, x: usize) -> Option<Window> {
        self.ranges(y, x)
            .map(|(rows, cols)| Window::from_slices(rows, cols))
    }

    /// Like [`get`](Self::get) but with a graph error for bad coordinates.
    pub fn window(&self, y: usize, x: usize) -> Result<Window> {
        self.get(y, x).ok_or_else(|| {
            StackError::graph(format!(
                "chunk ({}, {}) outside window index with {:?} blocks",
                y,
                x,
                self.numblocks()
            ))
        })
    }

    /// Serialize for shipping to another process.
    pub fn pack(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Rebuild from [`pack`](Self::pack) output.
    pub fn unpack(bytes: &[u8]) -> Result<Self> {
        let slices: Self = serde_json::from_slice(bytes)?;
        if slices.starts.iter().any(|s| s.is_empty() || s[0] != 0 || s.windows(2).any(|w| w[1] < w[0])) {
            return Err(StackError::config("malformed window index offsets"));
        }
        Ok(slices)
    }
}

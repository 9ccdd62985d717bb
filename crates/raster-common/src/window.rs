//! Pixel-space windows.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::error::GeoResult;
use crate::transform::Affine;

/// A rectangular region of a raster's pixel grid.
///
/// Stored as half-open row and column intervals. Windows derived from
/// geographic bounds are generally fractional and may extend past the grid
/// (negative offsets included); windows requested by output chunks are
/// always integral and in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub row_start: f64,
    pub row_stop: f64,
    pub col_start: f64,
    pub col_stop: f64,
}

impl Window {
    pub fn new(row_start: f64, row_stop: f64, col_start: f64, col_stop: f64) -> Self {
        Self {
            row_start,
            row_stop,
            col_start,
            col_stop,
        }
    }

    /// An integral window covering `rows` x `cols`.
    pub fn from_slices(rows: Range<usize>, cols: Range<usize>) -> Self {
        Self::new(
            rows.start as f64,
            rows.end as f64,
            cols.start as f64,
            cols.end as f64,
        )
    }

    /// The exact (unsnapped) window that `bounds` occupies under `transform`.
    ///
    /// All four corners are mapped through the inverse transform and the
    /// window spans their extremes. No precision slack is applied: a corner at
    /// row 4.9999999 stays at 4.9999999.
    pub fn from_bounds(bounds: &BoundingBox, transform: &Affine) -> GeoResult<Self> {
        bounds.validate()?;
        let inverse = transform.inverse()?;

        let corners = [
            (bounds.min_x, bounds.max_y),
            (bounds.max_x, bounds.max_y),
            (bounds.max_x, bounds.min_y),
            (bounds.min_x, bounds.min_y),
        ];

        let mut rows = (f64::INFINITY, f64::NEG_INFINITY);
        let mut cols = (f64::INFINITY, f64::NEG_INFINITY);
        for (x, y) in corners {
            let (col, row) = inverse.apply(x, y);
            rows = (rows.0.min(row), rows.1.max(row));
            cols = (cols.0.min(col), cols.1.max(col));
        }

        Ok(Self::new(rows.0, rows.1, cols.0, cols.1))
    }

    pub fn height(&self) -> f64 {
        (self.row_stop - self.row_start).max(0.0)
    }

    pub fn width(&self) -> f64 {
        (self.col_stop - self.col_start).max(0.0)
    }

    /// Integer `(rows, cols)` extent. Exact for integral windows.
    pub fn shape(&self) -> (usize, usize) {
        (self.height() as usize, self.width() as usize)
    }

    /// The overlapping region, or `None` when the overlap has zero area.
    pub fn intersection(&self, other: &Window) -> Option<Window> {
        let row_start = self.row_start.max(other.row_start);
        let row_stop = self.row_stop.min(other.row_stop);
        let col_start = self.col_start.max(other.col_start);
        let col_stop = self.col_stop.min(other.col_stop);

        if row_stop - row_start > 0.0 && col_stop - col_start > 0.0 {
            Some(Window::new(row_start, row_stop, col_start, col_stop))
        } else {
            None
        }
    }

    pub fn intersects(&self, other: &Window) -> bool {
        self.intersection(other).is_some()
    }

    /// Whether `other` lies entirely inside this window.
    pub fn contains(&self, other: &Window) -> bool {
        self.row_start <= other.row_start
            && self.row_stop >= other.row_stop
            && self.col_start <= other.col_start
            && self.col_stop >= other.col_stop
    }

    /// Row and column ranges, rounded outward to whole pixels.
    pub fn to_ranges(&self) -> (Range<i64>, Range<i64>) {
        (
            self.row_start.floor() as i64..self.row_stop.ceil() as i64,
            self.col_start.floor() as i64..self.col_stop.ceil() as i64,
        )
    }
}

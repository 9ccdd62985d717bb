//! Output raster grid specification.

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::error::{GeoError, GeoResult};
use crate::transform::Affine;
use crate::window::Window;

/// The output grid every asset is resampled onto.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterSpec {
    /// EPSG code of the coordinate space, when known.
    pub epsg: Option<u32>,
    /// Pixel shape `(rows, cols)`.
    pub shape: (usize, usize),
    /// Pixel-to-coordinate transform.
    pub transform: Affine,
}

impl RasterSpec {
    pub fn new(shape: (usize, usize), transform: Affine) -> Self {
        Self {
            epsg: None,
            shape,
            transform,
        }
    }

    pub fn with_epsg(mut self, epsg: u32) -> Self {
        self.epsg = Some(epsg);
        self
    }

    /// North-up grid covering `bounds` at `resolution` `(x, y)`.
    ///
    /// The shape is rounded up so the grid always covers the bounds; the
    /// top-left corner stays anchored at `(min_x, max_y)`.
    pub fn from_bounds(bounds: BoundingBox, resolution: (f64, f64)) -> GeoResult<Self> {
        bounds.validate()?;
        let (res_x, res_y) = resolution;
        if !(res_x > 0.0 && res_y > 0.0) {
            return Err(GeoError::InvalidShape(format!(
                "resolution must be positive, got {:?}",
                resolution
            )));
        }

        let cols = (bounds.width() / res_x).ceil() as usize;
        let rows = (bounds.height() / res_y).ceil() as usize;

        Ok(Self::new(
            (rows, cols),
            Affine::north_up(bounds.min_x, bounds.max_y, res_x, res_y),
        ))
    }

    pub fn rows(&self) -> usize {
        self.shape.0
    }

    pub fn cols(&self) -> usize {
        self.shape.1
    }

    /// The full pixel extent as a window.
    pub fn window(&self) -> Window {
        Window::from_slices(0..self.shape.0, 0..self.shape.1)
    }

    /// Coordinate-space extent of the whole grid.
    pub fn bounds(&self) -> BoundingBox {
        let corners = [
            self.transform.apply(0.0, 0.0),
            self.transform.apply(self.shape.1 as f64, 0.0),
            self.transform.apply(0.0, self.shape.0 as f64),
            self.transform.apply(self.shape.1 as f64, self.shape.0 as f64),
        ];
        let mut bbox = BoundingBox::new(
            f64::INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
        );
        for (x, y) in corners {
            bbox.min_x = bbox.min_x.min(x);
            bbox.min_y = bbox.min_y.min(y);
            bbox.max_x = bbox.max_x.max(x);
            bbox.max_y = bbox.max_y.max(y);
        }
        bbox
    }

    /// Window an asset occupies on this grid, unsnapped.
    pub fn window_for(&self, bounds: &BoundingBox) -> GeoResult<Window> {
        Window::from_bounds(bounds, &self.transform)
    }

    pub fn hash_bits<H: std::hash::Hasher>(&self, state: &mut H) {
        use std::hash::Hash;
        self.epsg.hash(state);
        self.shape.hash(state);
        self.transform.hash_bits(state);
    }
}

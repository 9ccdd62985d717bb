//! Common raster geometry and element typing shared across the raster-stack
//! workspace.
//!
//! - [`BoundingBox`]: axis-aligned extent in the raster's coordinate space
//! - [`Affine`]: pixel-to-coordinate transform (GDAL/rasterio coefficient order)
//! - [`RasterSpec`]: output grid shape plus transform
//! - [`Window`]: rectangular pixel-space region, possibly fractional
//! - [`DType`], [`FillValue`], [`Element`]: output typing and fill validation

pub mod bbox;
pub mod dtype;
pub mod error;
pub mod spec;
pub mod transform;
pub mod window;

pub use bbox::BoundingBox;
pub use dtype::{DType, Element, FillValue};
pub use error::{GeoError, GeoResult};
pub use spec::RasterSpec;
pub use transform::Affine;
pub use window::Window;

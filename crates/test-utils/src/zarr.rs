//! Zarr asset writers for reader tests.
//!
//! Assets are small 2-D Float32 arrays whose `bbox` attribute places them on
//! the output grid. [`TempZarrDir`] keeps them in a temporary directory that
//! is removed on drop.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::Array2;
use raster_common::BoundingBox;
use zarrs::array::{ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

/// Write `data` as a Zarr V3 array at `path` (array at the store root).
///
/// `extra` attributes are merged over the generated `bbox`.
pub fn write_zarr_asset(
    path: &Path,
    data: &Array2<f32>,
    bbox: &BoundingBox,
    chunk_size: usize,
    extra: serde_json::Map<String, serde_json::Value>,
) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(path)?;
    let store = Arc::new(FilesystemStore::new(path)?);
    let (height, width) = data.dim();
    let chunk = chunk_size.max(1) as u64;

    let array = ArrayBuilder::new(
        vec![height as u64, width as u64],
        DataType::Float32,
        vec![chunk, chunk].try_into()?,
        FillValue::from(f32::NAN),
    )
    .attributes({
        let mut attrs = serde_json::Map::new();
        attrs.insert(
            "bbox".to_string(),
            serde_json::json!([bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y]),
        );
        attrs.extend(extra);
        attrs
    })
    .build(store, "/")?;

    array.store_metadata()?;

    let subset = ArraySubset::new_with_start_shape(vec![0, 0], vec![height as u64, width as u64])?;
    let values: Vec<f32> = data.iter().copied().collect();
    array.store_array_subset_elements(&subset, &values)?;

    Ok(())
}

/// A temporary directory of Zarr assets.
pub struct TempZarrDir {
    dir: tempfile::TempDir,
}

impl TempZarrDir {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path an asset named `name` would be written to.
    pub fn asset_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(format!("{}.zarr", name))
    }

    /// Write an asset and return its `file://` URL.
    pub fn write(
        &self,
        name: &str,
        data: &Array2<f32>,
        bbox: &BoundingBox,
        extra: serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, Box<dyn std::error::Error>> {
        let path = self.asset_path(name);
        write_zarr_asset(&path, data, bbox, 4, extra)?;
        Ok(format!("file://{}", path.display()))
    }
}

//! Reference reader backed by 2-D Zarr V3 arrays on the local filesystem.
//!
//! The array's `bbox` attribute (`[min_x, min_y, max_x, max_y]` in the
//! stack's coordinate space) places it on the output grid; pixels are
//! sampled nearest-neighbor from the stored grid. Optional attributes:
//! `scale_factor`, `add_offset` (applied when rescaling) and `nodata`.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use ndarray::Array2;
use raster_common::{BoundingBox, Element, Window};
use zarrs::array::{Array, DataType};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use super::{Reader, ReaderFactory, ReaderOptions};
use crate::error::{ReadError, ReadErrorKind};
use crate::types::Resampling;

/// Environment key (open layer) naming the array inside the store.
pub const ARRAY_PATH_KEY: &str = "ZARR_ARRAY_PATH";

/// Creates [`ZarrReader`]s. Only nearest-neighbor resampling is supported.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZarrReaderFactory;

impl<T: Element> ReaderFactory<T> for ZarrReaderFactory {
    fn create(
        &self,
        url: &str,
        options: &Arc<ReaderOptions<T>>,
    ) -> Result<Arc<dyn Reader<T>>, ReadError> {
        if options.resampling != Resampling::Nearest {
            return Err(ReadError::new(
                ReadErrorKind::Other,
                url,
                format!("resampling '{}' is not supported", options.resampling),
            ));
        }
        Ok(Arc::new(ZarrReader::new(url, Arc::clone(options))))
    }

    fn name(&self) -> &str {
        "zarr"
    }
}

/// A lazily opened Zarr array serving window reads.
pub struct ZarrReader<T: Element> {
    url: String,
    options: Arc<ReaderOptions<T>>,
    dataset: OnceLock<Result<OpenedArray, ReadError>>,
}

struct OpenedArray {
    array: Array<FilesystemStore>,
    /// Stored pixel shape `(rows, cols)`.
    shape: (usize, usize),
    /// Footprint on the output grid.
    window: Window,
    scale: f64,
    offset: f64,
    nodata: Option<f64>,
}

impl<T: Element> ZarrReader<T> {
    pub fn new(url: impl Into<String>, options: Arc<ReaderOptions<T>>) -> Self {
        Self {
            url: url.into(),
            options,
            dataset: OnceLock::new(),
        }
    }

    /// Whether the underlying array has been opened yet.
    pub fn is_open(&self) -> bool {
        matches!(self.dataset.get(), Some(Ok(_)))
    }

    fn dataset(&self) -> Result<&OpenedArray, ReadError> {
        self.dataset
            .get_or_init(|| self.open())
            .as_ref()
            .map_err(Clone::clone)
    }

    fn open(&self) -> Result<OpenedArray, ReadError> {
        let path = self.url.strip_prefix("file://").unwrap_or(&self.url);
        if !Path::new(path).exists() {
            return Err(ReadError::not_found(&self.url, "no such store"));
        }

        let env = self.options.env.as_ref().map(|e| e.open_env()).unwrap_or_default();
        let array_path = env.get(ARRAY_PATH_KEY).map(String::as_str).unwrap_or("/");

        let open_err = |e: String| ReadError::new(ReadErrorKind::Open, &self.url, e);
        let store = FilesystemStore::new(path).map_err(|e| open_err(e.to_string()))?;
        let array =
            Array::open(Arc::new(store), array_path).map_err(|e| open_err(e.to_string()))?;

        let shape = match array.shape() {
            [rows, cols] => (*rows as usize, *cols as usize),
            other => {
                return Err(ReadError::decode(
                    &self.url,
                    format!("expected a 2-D array, got shape {:?}", other),
                ))
            }
        };

        let attrs = array.attributes();
        let bbox = attrs
            .get("bbox")
            .and_then(|v| v.as_array())
            .and_then(|arr| {
                if arr.len() == 4 {
                    Some(BoundingBox::new(
                        arr[0].as_f64()?,
                        arr[1].as_f64()?,
                        arr[2].as_f64()?,
                        arr[3].as_f64()?,
                    ))
                } else {
                    None
                }
            })
            .ok_or_else(|| open_err("missing or malformed 'bbox' attribute".to_string()))?;

        let window = self
            .options
            .spec
            .window_for(&bbox)
            .map_err(|e| ReadError::decode(&self.url, e.to_string()))?;

        let scale = attrs.get("scale_factor").and_then(|v| v.as_f64()).unwrap_or(1.0);
        let offset = attrs.get("add_offset").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let nodata = attrs.get("nodata").and_then(|v| v.as_f64());

        tracing::debug!(
            url = %self.url,
            array_path,
            shape = ?shape,
            window = ?window,
            "Opened zarr asset"
        );

        Ok(OpenedArray {
            array,
            shape,
            window,
            scale,
            offset,
            nodata,
        })
    }
}

impl OpenedArray {
    /// Retrieve a subset as f64 regardless of the stored data type.
    fn retrieve_f64(&self, subset: &ArraySubset) -> Result<Vec<f64>, String> {
        fn widen<V: Into<f64>>(values: Vec<V>) -> Vec<f64> {
            values.into_iter().map(Into::into).collect()
        }

        let array = &self.array;
        let values = match array.data_type() {
            DataType::Float32 => widen(
                array
                    .retrieve_array_subset_elements::<f32>(subset)
                    .map_err(|e| e.to_string())?,
            ),
            DataType::Float64 => array
                .retrieve_array_subset_elements::<f64>(subset)
                .map_err(|e| e.to_string())?,
            DataType::UInt8 => widen(
                array
                    .retrieve_array_subset_elements::<u8>(subset)
                    .map_err(|e| e.to_string())?,
            ),
            DataType::UInt16 => widen(
                array
                    .retrieve_array_subset_elements::<u16>(subset)
                    .map_err(|e| e.to_string())?,
            ),
            DataType::UInt32 => widen(
                array
                    .retrieve_array_subset_elements::<u32>(subset)
                    .map_err(|e| e.to_string())?,
            ),
            DataType::Int16 => widen(
                array
                    .retrieve_array_subset_elements::<i16>(subset)
                    .map_err(|e| e.to_string())?,
            ),
            DataType::Int32 => widen(
                array
                    .retrieve_array_subset_elements::<i32>(subset)
                    .map_err(|e| e.to_string())?,
            ),
            other => return Err(format!("unsupported data type {:?}", other)),
        };
        Ok(values)
    }
}

/// Output pixel range whose centers fall inside `[start, stop)`, clipped to
/// `[lo, hi)`.
fn covered_range(start: f64, stop: f64, lo: usize, hi: usize) -> (usize, usize) {
    let first = (start - 0.5).ceil().max(lo as f64);
    let last = (stop - 0.5).ceil().min(hi as f64);
    if last <= first {
        return (lo, lo);
    }
    (first as usize, last as usize)
}

/// Nearest source index for output pixel `p` along one axis.
fn source_index(p: usize, start: f64, extent: f64, len: usize) -> usize {
    let t = (p as f64 + 0.5 - start) / extent;
    ((t * len as f64).floor().max(0.0) as usize).min(len.saturating_sub(1))
}

impl<T: Element> Reader<T> for ZarrReader<T> {
    fn url(&self) -> &str {
        &self.url
    }

    fn fill_value(&self) -> T {
        self.options.fill_value
    }

    fn read(&self, window: &Window) -> Result<Array2<T>, ReadError> {
        let ds = self.dataset()?;
        let fill = self.options.fill_value;
        let (rows, cols) = window.shape();
        let mut out = Array2::from_elem((rows, cols), fill);

        let row0 = window.row_start as usize;
        let col0 = window.col_start as usize;
        let (r_lo, r_hi) = covered_range(ds.window.row_start, ds.window.row_stop, row0, row0 + rows);
        let (c_lo, c_hi) = covered_range(ds.window.col_start, ds.window.col_stop, col0, col0 + cols);
        if r_lo == r_hi || c_lo == c_hi || ds.shape.0 == 0 || ds.shape.1 == 0 {
            return Ok(out);
        }

        let (h, w) = ds.shape;
        let src_row = |r| source_index(r, ds.window.row_start, ds.window.height(), h);
        let src_col = |c| source_index(c, ds.window.col_start, ds.window.width(), w);

        let (sr0, sr1) = (src_row(r_lo), src_row(r_hi - 1) + 1);
        let (sc0, sc1) = (src_col(c_lo), src_col(c_hi - 1) + 1);
        let subset = ArraySubset::new_with_start_shape(
            vec![sr0 as u64, sc0 as u64],
            vec![(sr1 - sr0) as u64, (sc1 - sc0) as u64],
        )
        .map_err(|e| ReadError::decode(&self.url, e.to_string()))?;
        let values = ds
            .retrieve_f64(&subset)
            .map_err(|e| ReadError::decode(&self.url, e))?;
        let sub_w = sc1 - sc0;

        let rescale = self.options.rescale;
        for r in r_lo..r_hi {
            let sr = src_row(r) - sr0;
            for c in c_lo..c_hi {
                let raw = values[sr * sub_w + (src_col(c) - sc0)];
                if raw.is_nan() || ds.nodata == Some(raw) {
                    continue;
                }
                let v = if rescale {
                    raw * ds.scale + ds.offset
                } else {
                    raw
                };
                out[[r - row0, c - col0]] = T::from_f64_saturating(v, fill);
            }
        }

        Ok(out)
    }
}

impl<T: Element> fmt::Debug for ZarrReader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZarrReader")
            .field("url", &self.url)
            .field("open", &self.is_open())
            .finish()
    }
}

//! The reader capability: opening an asset URL and serving window reads.
//!
//! The core never opens datasets itself. It asks a [`ReaderFactory`] for one
//! [`Reader`] per asset while building the reader table, and calls
//! [`Reader::read`] from fetch tasks. Factories must not perform I/O:
//! opening is deferred to the first read, and any caching or thread-safety
//! around that open is the reader's business.

mod zarr;

pub use zarr::{ZarrReader, ZarrReaderFactory};

use std::fmt::Debug;
use std::sync::Arc;

use ndarray::Array2;
use raster_common::{DType, Element, RasterSpec, Window};

use crate::error::{NodataPolicy, ReadError};
use crate::types::{LayeredEnv, Resampling};

/// Read configuration shared by every reader of one stack.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderOptions<T: Element> {
    /// Output grid the asset is resampled onto.
    pub spec: Arc<RasterSpec>,
    pub resampling: Resampling,
    /// Already validated against `T`.
    pub fill_value: T,
    pub rescale: bool,
    pub env: Option<LayeredEnv>,
    pub errors_as_nodata: NodataPolicy,
}

/// An opened-on-demand asset.
///
/// `read` receives a window on the output grid and returns exactly
/// `window.shape()` pixels of `T`, with decode, resampling, rescaling and
/// nodata handling already applied. Implementations must be safe to call
/// from several threads at once.
pub trait Reader<T: Element>: Send + Sync + Debug {
    fn url(&self) -> &str;

    fn read(&self, window: &Window) -> Result<Array2<T>, ReadError>;

    /// Value for pixels the asset does not cover.
    fn fill_value(&self) -> T;

    fn dtype(&self) -> DType {
        T::DTYPE
    }
}

/// Instantiates readers for asset URLs without touching the underlying
/// resource.
pub trait ReaderFactory<T: Element>: Send + Sync + Debug {
    fn create(
        &self,
        url: &str,
        options: &Arc<ReaderOptions<T>>,
    ) -> Result<Arc<dyn Reader<T>>, ReadError>;

    /// Short name used in graph tokens and logs.
    fn name(&self) -> &str;
}

//! In-memory readers for exercising stacks without any files.
//!
//! Every reader produced by a [`MemoryReaderFactory`] shares one set of
//! [`ReaderCounters`], so tests can assert how many readers a graph built and
//! how many reads its tasks issued.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ndarray::Array2;
use raster_common::{BoundingBox, Element, Window};
use raster_stack::{ReadError, ReadErrorKind, Reader, ReaderFactory, ReaderOptions};

use crate::generators::pixel_value;

/// Construction and read counts shared by a factory and its readers.
#[derive(Debug, Default)]
pub struct ReaderCounters {
    created: AtomicUsize,
    reads: AtomicUsize,
}

impl ReaderCounters {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.created.store(0, Ordering::SeqCst);
        self.reads.store(0, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Default)]
struct MemoryAsset {
    /// Footprint; pixels outside it read as fill. `None` covers everything.
    bounds: Option<BoundingBox>,
    base: f64,
    failure: Option<ReadErrorKind>,
}

/// Creates [`MemoryReader`]s serving the standard pixel pattern.
///
/// Unregistered URLs cover the whole grid with base 0 unless the factory is
/// [`strict`](Self::strict), in which case their reads fail with `NotFound`.
#[derive(Debug, Clone, Default)]
pub struct MemoryReaderFactory {
    assets: HashMap<String, MemoryAsset>,
    counters: Arc<ReaderCounters>,
    strict: bool,
}

impl MemoryReaderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `url` with a footprint and pattern base value.
    pub fn with_asset(mut self, url: impl Into<String>, bounds: BoundingBox, base: f64) -> Self {
        let asset = self.assets.entry(url.into()).or_default();
        asset.bounds = Some(bounds);
        asset.base = base;
        self
    }

    /// Make every read of `url` fail with `kind`.
    pub fn failing(mut self, url: impl Into<String>, kind: ReadErrorKind) -> Self {
        self.assets.entry(url.into()).or_default().failure = Some(kind);
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn counters(&self) -> Arc<ReaderCounters> {
        Arc::clone(&self.counters)
    }
}

impl<T: Element> ReaderFactory<T> for MemoryReaderFactory {
    fn create(
        &self,
        url: &str,
        options: &Arc<ReaderOptions<T>>,
    ) -> Result<Arc<dyn Reader<T>>, ReadError> {
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        let asset = match self.assets.get(url) {
            Some(asset) => asset.clone(),
            None if self.strict => MemoryAsset {
                failure: Some(ReadErrorKind::NotFound),
                ..Default::default()
            },
            None => MemoryAsset::default(),
        };
        Ok(Arc::new(MemoryReader {
            url: url.to_string(),
            asset,
            options: Arc::clone(options),
            counters: Arc::clone(&self.counters),
        }))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Reader over a synthetic asset.
#[derive(Debug)]
pub struct MemoryReader<T: Element> {
    url: String,
    asset: MemoryAsset,
    options: Arc<ReaderOptions<T>>,
    counters: Arc<ReaderCounters>,
}

impl<T: Element> Reader<T> for MemoryReader<T> {
    fn url(&self) -> &str {
        &self.url
    }

    fn fill_value(&self) -> T {
        self.options.fill_value
    }

    fn read(&self, window: &Window) -> Result<Array2<T>, ReadError> {
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(kind) = self.asset.failure {
            return Err(ReadError::new(kind, &self.url, "injected failure"));
        }

        let footprint = match &self.asset.bounds {
            Some(bounds) => Some(
                self.options
                    .spec
                    .window_for(bounds)
                    .map_err(|e| ReadError::decode(&self.url, e.to_string()))?,
            ),
            None => None,
        };

        let fill = self.options.fill_value;
        let (r0, c0) = (window.row_start as usize, window.col_start as usize);
        Ok(Array2::from_shape_fn(window.shape(), |(r, c)| {
            let (row, col) = (r0 + r, c0 + c);
            let inside = footprint.map_or(true, |w| {
                let (y, x) = (row as f64 + 0.5, col as f64 + 0.5);
                y >= w.row_start && y < w.row_stop && x >= w.col_start && x < w.col_stop
            });
            if inside {
                T::from_f64_saturating(pixel_value(self.asset.base, row, col), fill)
            } else {
                fill
            }
        }))
    }
}

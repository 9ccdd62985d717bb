//! The per-task window fetch.

use raster_common::{Element, Window};
use tracing::{trace, warn};

use crate::block::Block;
use crate::error::{NodataPolicy, Result, StackError};
use crate::reader_table::ReaderTableEntry;

/// Produce the `(1, 1, rows, cols)` block for `window` from one reader table
/// entry.
///
/// Fill entries and assets whose footprint does not overlap `window` yield a
/// broadcast fill block without touching the reader. Otherwise the reader is
/// asked for exactly `window`; read failures whose kind is in `nodata` become
/// fill blocks, anything else is an error for the whole chunk.
pub fn fetch_raster_window<T: Element>(
    entry: &ReaderTableEntry<T>,
    window: &Window,
    nodata: &NodataPolicy,
) -> Result<Block<T>> {
    let (rows, cols) = window.shape();
    let shape = [1, 1, rows, cols];

    let (reader, asset_window) = match entry {
        ReaderTableEntry::Fill(value) => return Ok(Block::fill(*value, shape)),
        ReaderTableEntry::Asset { reader, window } => (reader, window),
    };

    if asset_window.intersection(window).is_none() {
        trace!(url = reader.url(), window = ?window, "No overlap, filling");
        return Ok(Block::fill(reader.fill_value(), shape));
    }

    trace!(url = reader.url(), window = ?window, "Reading window");
    let data = match reader.read(window) {
        Ok(data) => data,
        Err(err) if nodata.contains(err.kind) => {
            warn!(
                url = reader.url(),
                kind = %err.kind,
                error = %err.message,
                "Read failed, treating as nodata"
            );
            return Ok(Block::fill(reader.fill_value(), shape));
        }
        Err(source) => {
            return Err(StackError::Read {
                window: *window,
                source,
            })
        }
    };

    if data.dim() != (rows, cols) {
        return Err(StackError::Shape {
            url: reader.url().to_string(),
            expected: (rows, cols),
            got: data.dim(),
        });
    }

    Ok(Block::from_window(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ReadError, ReadErrorKind};
    use crate::reader::Reader;
    use ndarray::Array2;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Default)]
    struct CountingReader {
        reads: AtomicUsize,
        fail: Option<ReadErrorKind>,
        short: bool,
    }

    impl Reader<f32> for CountingReader {
        fn url(&self) -> &str {
            "mem://counting"
        }
        fn read(&self, window: &Window) -> std::result::Result<Array2<f32>, ReadError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if let Some(kind) = self.fail {
                return Err(ReadError::new(kind, self.url(), "injected"));
            }
            let (rows, cols) = window.shape();
            if self.short {
                return Ok(Array2::zeros((rows.saturating_sub(1), cols)));
            }
            Ok(Array2::from_shape_fn((rows, cols), |(r, c)| {
                (window.row_start as usize + r) as f32 * 100.0 + (window.col_start as usize + c) as f32
            }))
        }
        fn fill_value(&self) -> f32 {
            -9999.0
        }
    }

    fn asset(reader: Arc<CountingReader>, window: Window) -> ReaderTableEntry<f32> {
        ReaderTableEntry::Asset { reader, window }
    }

    #[test]
    fn test_fill_entry() {
        let block = fetch_raster_window(
            &ReaderTableEntry::Fill(3.5f32),
            &Window::from_slices(0..5, 5..10),
            &NodataPolicy::new(),
        )
        .unwrap();
        assert!(block.is_fill());
        assert_eq!(block.shape(), [1, 1, 5, 5]);
        assert!(block.view().iter().all(|&v| v == 3.5));
    }

    #[test]
    fn test_no_overlap_skips_reader() {
        let reader = Arc::new(CountingReader::default());
        let entry = asset(reader.clone(), Window::new(-20.0, -10.0, 20.0, 30.0));
        let block =
            fetch_raster_window(&entry, &Window::from_slices(0..5, 0..5), &NodataPolicy::new())
                .unwrap();
        assert!(block.is_fill());
        assert!(block.view().iter().all(|&v| v == -9999.0));
        assert_eq!(reader.reads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_touching_edge_is_not_overlap() {
        let reader = Arc::new(CountingReader::default());
        let entry = asset(reader.clone(), Window::new(0.0, 5.0, 0.0, 5.0));
        let block =
            fetch_raster_window(&entry, &Window::from_slices(5..10, 0..5), &NodataPolicy::new())
                .unwrap();
        assert!(block.is_fill());
        assert_eq!(reader.reads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_contained_window_reads_requested_shape() {
        let reader = Arc::new(CountingReader::default());
        let entry = asset(reader.clone(), Window::new(0.0, 10.0, 0.0, 10.0));
        let window = Window::from_slices(5..10, 0..3);
        let block = fetch_raster_window(&entry, &window, &NodataPolicy::new()).unwrap();

        assert_eq!(block.shape(), [1, 1, 5, 3]);
        let data = block.data().unwrap();
        assert_eq!(data[[0, 0, 0, 0]], 500.0);
        assert_eq!(data[[0, 0, 4, 2]], 902.0);
        assert_eq!(reader.reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_idempotent() {
        let reader = Arc::new(CountingReader::default());
        let entry = asset(reader, Window::new(0.0, 10.0, 0.0, 10.0));
        let window = Window::from_slices(2..7, 3..8);
        let a = fetch_raster_window(&entry, &window, &NodataPolicy::new()).unwrap();
        let b = fetch_raster_window(&entry, &window, &NodataPolicy::new()).unwrap();
        let bits = |block: &Block<f32>| block.view().iter().map(|v| v.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn test_nodata_policy() {
        let reader = Arc::new(CountingReader {
            fail: Some(ReadErrorKind::NotFound),
            ..Default::default()
        });
        let entry = asset(reader, Window::new(0.0, 10.0, 0.0, 10.0));
        let window = Window::from_slices(0..5, 0..5);

        let policy = NodataPolicy::from_kinds([ReadErrorKind::NotFound]);
        let block = fetch_raster_window(&entry, &window, &policy).unwrap();
        assert!(block.is_fill());

        let err = fetch_raster_window(&entry, &window, &NodataPolicy::new()).unwrap_err();
        match err {
            StackError::Read { source, window: w } => {
                assert_eq!(source.kind, ReadErrorKind::NotFound);
                assert_eq!(w, window);
            }
            other => panic!("unexpected {other:?}"),
        }

        let other_kind = NodataPolicy::from_kinds([ReadErrorKind::Decode]);
        assert!(fetch_raster_window(&entry, &window, &other_kind).is_err());
    }

    #[test]
    fn test_wrong_shape_is_error() {
        let reader = Arc::new(CountingReader {
            short: true,
            ..Default::default()
        });
        let entry = asset(reader, Window::new(0.0, 10.0, 0.0, 10.0));
        let err = fetch_raster_window(&entry, &Window::from_slices(0..5, 0..5), &NodataPolicy::new())
            .unwrap_err();
        assert!(matches!(
            err,
            StackError::Shape {
                expected: (5, 5),
                got: (4, 5),
                ..
            }
        ));
    }
}

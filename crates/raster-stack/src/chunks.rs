//! Chunk normalization for the row/col axes.

use crate::config::{AxisChunks, ChunkSpec};
use crate::error::{Result, StackError};

/// Resolve a chunk spec into explicit per-axis chunk sizes for `shape`.
///
/// Regular sizes produce full chunks followed by one smaller boundary chunk
/// when the axis length is not a multiple. A zero-length axis yields a single
/// empty chunk.
pub fn normalize_chunks(spec: &ChunkSpec, shape: (usize, usize)) -> Result<[Vec<usize>; 2]> {
    spec.validate()?;
    Ok([
        normalize_axis(&spec.rows, shape.0, "row")?,
        normalize_axis(&spec.cols, shape.1, "col")?,
    ])
}

fn normalize_axis(chunks: &AxisChunks, len: usize, axis: &str) -> Result<Vec<usize>> {
    match chunks {
        AxisChunks::Full => Ok(vec![len]),
        AxisChunks::Size(_) if len == 0 => Ok(vec![0]),
        AxisChunks::Size(size) => {
            let size = (*size).min(len);
            let mut out = vec![size; len / size];
            if len % size != 0 {
                out.push(len % size);
            }
            Ok(out)
        }
        AxisChunks::Explicit(sizes) => {
            let total: usize = sizes.iter().sum();
            if total != len {
                return Err(StackError::config(format!(
                    "{} chunks {:?} sum to {}, but the axis has length {}",
                    axis, sizes, total, len
                )));
            }
            if len > 0 && sizes.contains(&0) {
                return Err(StackError::config(format!(
                    "{} chunks {:?} contain an empty chunk",
                    axis, sizes
                )));
            }
            Ok(sizes.clone())
        }
    }
}

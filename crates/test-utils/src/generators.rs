//! Pixel pattern generators.
//!
//! Patterns are functions of the absolute output pixel, so a block read
//! through any window can be checked against the pattern directly.

use ndarray::Array2;

/// Value of the standard pattern at output pixel `(row, col)`:
/// `base + col * 1000 + row`.
pub fn pixel_value(base: f64, row: usize, col: usize) -> f64 {
    base + (col * 1000 + row) as f64
}

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(5, 10);
/// assert_eq!(grid.dim(), (5, 10));
/// assert_eq!(grid[[0, 0]], 0.0);
/// assert_eq!(grid[[0, 1]], 1000.0); // col=1, row=0
/// assert_eq!(grid[[1, 0]], 1.0);    // col=0, row=1
/// ```
pub fn create_test_grid(rows: usize, cols: usize) -> Array2<f32> {
    Array2::from_shape_fn((rows, cols), |(r, c)| pixel_value(0.0, r, c) as f32)
}

/// The standard pattern over the pixels `rows × cols` of the output grid.
pub fn pattern_window(
    base: f64,
    rows: std::ops::Range<usize>,
    cols: std::ops::Range<usize>,
) -> Array2<f64> {
    let (r0, c0) = (rows.start, cols.start);
    Array2::from_shape_fn((rows.len(), cols.len()), |(r, c)| {
        pixel_value(base, r0 + r, c0 + c)
    })
}

/// Alternating `a`/`b` cells of `cell × cell` pixels.
pub fn create_checkerboard(rows: usize, cols: usize, cell: usize, a: f32, b: f32) -> Array2<f32> {
    let cell = cell.max(1);
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        if (r / cell + c / cell) % 2 == 0 {
            a
        } else {
            b
        }
    })
}

/// Scatter `value` over roughly `fraction` of the pixels, deterministically.
pub fn with_holes(mut grid: Array2<f32>, value: f32, fraction: f64) -> Array2<f32> {
    let threshold = (fraction.clamp(0.0, 1.0) * 97.0).round() as usize;
    for ((r, c), v) in grid.indexed_iter_mut() {
        if (r * 13 + c * 7) % 97 < threshold {
            *v = value;
        }
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_window_matches_grid() {
        let grid = create_test_grid(10, 10);
        let window = pattern_window(0.0, 5..10, 2..4);
        assert_eq!(window.dim(), (5, 2));
        for ((r, c), v) in window.indexed_iter() {
            assert_eq!(*v as f32, grid[[r + 5, c + 2]]);
        }
    }

    #[test]
    fn test_checkerboard() {
        let board = create_checkerboard(4, 4, 2, 1.0, 0.0);
        assert_eq!(board[[0, 0]], 1.0);
        assert_eq!(board[[0, 2]], 0.0);
        assert_eq!(board[[2, 2]], 1.0);
    }

    #[test]
    fn test_with_holes() {
        let grid = with_holes(create_test_grid(20, 20), f32::NAN, 0.25);
        let holes = grid.iter().filter(|v| v.is_nan()).count();
        assert!(holes > 50 && holes < 150, "got {}", holes);
        assert_eq!(with_holes(create_test_grid(4, 4), -1.0, 0.0), create_test_grid(4, 4));
    }
}

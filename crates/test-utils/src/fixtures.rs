//! Common test fixtures for stack tests.
//!
//! The scenario grid is 10×10 pixels whose pixel `(r, c)` maps to coordinate
//! `(c, 10 - r)`, so bounds `(0, 0, 10, 10)` cover it exactly.

use raster_common::{Affine, BoundingBox, RasterSpec};
use raster_stack::{AssetEntry, AssetTable};

/// Common bounding boxes in scenario coordinates.
pub mod bbox {
    /// Exactly the scenario grid.
    pub const FULL: (f64, f64, f64, f64) = (0.0, 0.0, 10.0, 10.0);

    /// Entirely outside the scenario grid.
    pub const OUTSIDE: (f64, f64, f64, f64) = (20.0, 20.0, 30.0, 30.0);

    /// Left half of the scenario grid (cols 0..5).
    pub const LEFT_HALF: (f64, f64, f64, f64) = (0.0, 0.0, 5.0, 10.0);

    /// Top-left quadrant (rows 0..5, cols 0..5).
    pub const TOP_LEFT: (f64, f64, f64, f64) = (0.0, 5.0, 5.0, 10.0);

    /// Straddles the grid's right edge.
    pub const RIGHT_EDGE: (f64, f64, f64, f64) = (8.0, 0.0, 14.0, 10.0);

    /// Invalid bbox (min > max)
    pub const INVALID: (f64, f64, f64, f64) = (10.0, 10.0, 5.0, 5.0);
}

/// Transform mapping pixel `(r, c)` to `(c, rows - r)`.
pub fn flipped_transform(rows: usize) -> Affine {
    Affine::new(1.0, 0.0, 0.0, 0.0, -1.0, rows as f64)
}

/// A `rows × cols` grid with unit pixels and [`flipped_transform`].
pub fn unit_spec(rows: usize, cols: usize) -> RasterSpec {
    RasterSpec::new((rows, cols), flipped_transform(rows))
}

/// The 10×10 scenario grid.
pub fn scenario_spec() -> RasterSpec {
    unit_spec(10, 10)
}

/// A 1×1 asset table.
pub fn single_asset_table(url: Option<&str>, bounds: (f64, f64, f64, f64)) -> AssetTable {
    let entry = AssetEntry {
        url: url.map(str::to_string),
        bounds: BoundingBox::from_tuple(bounds),
    };
    AssetTable::new((1, 1), vec![entry]).expect("1x1 table")
}

/// `"a.tif"` covering the whole scenario grid.
pub fn scenario_table() -> AssetTable {
    single_asset_table(Some("a.tif"), bbox::FULL)
}

/// Same cell with no URL.
pub fn missing_asset_table() -> AssetTable {
    single_asset_table(None, bbox::FULL)
}

/// `"a.tif"` with bounds fully outside the scenario grid.
pub fn outside_asset_table() -> AssetTable {
    single_asset_table(Some("a.tif"), bbox::OUTSIDE)
}

/// URL used for cell `(item, asset)` in generated tables.
pub fn asset_url(item: usize, asset: usize) -> String {
    format!("mem://item-{}/asset-{}.tif", item, asset)
}

/// A deterministic `items × assets` table over a `rows × cols` unit grid.
///
/// Roughly `density` of the cells carry a URL. Each present asset covers a
/// horizontal band of the grid that shifts with the item index, so some
/// chunks overlap an asset and others do not.
pub fn sparse_table(
    items: usize,
    assets: usize,
    rows: usize,
    cols: usize,
    density: f64,
) -> AssetTable {
    let threshold = (density.clamp(0.0, 1.0) * 100.0).round() as usize;
    let band = (rows / 4).max(1);
    let mut cells = Vec::with_capacity(items * assets);

    for item in 0..items {
        for asset in 0..assets {
            if (item * 31 + asset * 17) % 100 >= threshold {
                cells.push(AssetEntry::missing());
                continue;
            }
            let top = (item * band) % rows.max(1);
            let bottom = (top + band).min(rows);
            // Pixel rows top..bottom span y from rows - bottom to rows - top
            let bounds = BoundingBox::new(
                0.0,
                (rows - bottom) as f64,
                cols as f64,
                (rows - top) as f64,
            );
            cells.push(AssetEntry::new(asset_url(item, asset), bounds));
        }
    }

    AssetTable::new((items, assets), cells).expect("generated table shape")
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_common::Window;

    #[test]
    fn test_scenario_window() {
        let spec = scenario_spec();
        let window = spec
            .window_for(&BoundingBox::from_tuple(bbox::FULL))
            .unwrap();
        assert_eq!(window, Window::new(0.0, 10.0, 0.0, 10.0));
    }

    #[test]
    fn test_sparse_table_density() {
        let full = sparse_table(10, 10, 40, 40, 1.0);
        assert!(full.indexed().all(|(_, cell)| cell.url.is_some()));

        let empty = sparse_table(10, 10, 40, 40, 0.0);
        assert!(empty.indexed().all(|(_, cell)| cell.url.is_none()));

        let half = sparse_table(10, 10, 40, 40, 0.5);
        let present = half.indexed().filter(|(_, c)| c.url.is_some()).count();
        assert!(present > 20 && present < 80, "got {}", present);
    }

    #[test]
    fn test_sparse_bands_inside_grid() {
        let spec = unit_spec(40, 40);
        for (_, cell) in sparse_table(8, 2, 40, 40, 1.0).indexed() {
            let window = spec.window_for(&cell.bounds).unwrap();
            assert!(spec.window().contains(&window));
            assert_eq!(window.height(), 10.0);
        }
    }
}

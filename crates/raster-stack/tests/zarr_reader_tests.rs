//! The Zarr reference reader driven through full stacks.

use std::sync::Arc;

use ndarray::{s, Array2};
use raster_stack::{
    items_to_array, AssetTable, BoundingBox, ChunkSpec, FillValue, LayeredEnv, NodataPolicy,
    ReadErrorKind, Scheduler, StackConfig, StackError, SyncScheduler, ThreadPoolScheduler,
    ZarrReaderFactory,
};
use test_utils::{
    assert_all_fill, bbox, create_test_grid, single_asset_table, unit_spec, TempZarrDir,
};

fn config() -> StackConfig {
    StackConfig::default().with_chunksize(ChunkSpec::uniform(5))
}

fn table(url: &str, bounds: (f64, f64, f64, f64)) -> AssetTable {
    single_asset_table(Some(url), bounds)
}

// ============================================================================
// Placement and sampling
// ============================================================================

#[test]
fn test_full_coverage_roundtrip() {
    let dir = TempZarrDir::new().unwrap();
    let data = create_test_grid(10, 10);
    let url = dir
        .write("full", &data, &BoundingBox::from_tuple(bbox::FULL), Default::default())
        .unwrap();

    let stack = items_to_array::<f64>(
        table(&url, bbox::FULL),
        unit_spec(10, 10),
        &config(),
        Arc::new(ZarrReaderFactory),
    )
    .unwrap();
    let (array, stats) = ThreadPoolScheduler::new(2).compute_with_stats(&stack).unwrap();
    assert_eq!(stats.data_blocks, 4);

    for ((r, c), v) in data.indexed_iter() {
        assert_eq!(array[[0, 0, r, c]], *v as f64, "pixel ({}, {})", r, c);
    }
}

#[test]
fn test_partial_asset_clips_and_fills() {
    let dir = TempZarrDir::new().unwrap();
    let data = create_test_grid(10, 5);
    let url = dir
        .write("left", &data, &BoundingBox::from_tuple(bbox::LEFT_HALF), Default::default())
        .unwrap();

    let stack = items_to_array::<f64>(
        table(&url, bbox::LEFT_HALF),
        unit_spec(10, 10),
        &StackConfig::default().with_chunksize(ChunkSpec::uniform(4)),
        Arc::new(ZarrReaderFactory),
    )
    .unwrap();

    // Chunk (0, 1) covers cols 4..8: col 4 from the asset, the rest fill
    let block = stack.compute_chunk([0, 0, 0, 1]).unwrap();
    let view = block.view();
    for r in 0..4 {
        assert_eq!(view[[0, 0, r, 0]], data[[r, 4]] as f64);
    }
    assert_all_fill!(view.slice(s![.., .., .., 1..]), f64::NAN);

    // Chunk (0, 2) covers cols 8..10: no overlap, never read
    assert!(stack.compute_chunk([0, 0, 0, 2]).unwrap().is_fill());
}

#[test]
fn test_nearest_upsampling() {
    let dir = TempZarrDir::new().unwrap();
    let data = create_test_grid(5, 5);
    let url = dir
        .write("coarse", &data, &BoundingBox::from_tuple(bbox::FULL), Default::default())
        .unwrap();

    let stack = items_to_array::<f32>(
        table(&url, bbox::FULL),
        unit_spec(10, 10),
        &config(),
        Arc::new(ZarrReaderFactory),
    )
    .unwrap();
    let array = SyncScheduler.compute(&stack).unwrap();
    for r in 0..10 {
        for c in 0..10 {
            assert_eq!(array[[0, 0, r, c]], data[[r / 2, c / 2]]);
        }
    }
}

// ============================================================================
// Rescale, nodata and dtype conversion
// ============================================================================

fn scaled_asset(dir: &TempZarrDir) -> (String, Array2<f32>) {
    let mut data = Array2::from_elem((10, 10), 3.0f32);
    data[[0, 0]] = -1.0;
    let mut attrs = serde_json::Map::new();
    attrs.insert("scale_factor".to_string(), serde_json::json!(2.0));
    attrs.insert("add_offset".to_string(), serde_json::json!(1.0));
    attrs.insert("nodata".to_string(), serde_json::json!(-1.0));
    let url = dir
        .write("scaled", &data, &BoundingBox::from_tuple(bbox::FULL), attrs)
        .unwrap();
    (url, data)
}

#[test]
fn test_rescale_and_nodata() {
    let dir = TempZarrDir::new().unwrap();
    let (url, _) = scaled_asset(&dir);

    let stack = items_to_array::<f64>(
        table(&url, bbox::FULL),
        unit_spec(10, 10),
        &config(),
        Arc::new(ZarrReaderFactory),
    )
    .unwrap();
    let array = SyncScheduler.compute(&stack).unwrap();
    assert!(array[[0, 0, 0, 0]].is_nan());
    assert_eq!(array[[0, 0, 0, 1]], 7.0);
    assert_eq!(array[[0, 0, 9, 9]], 7.0);

    let mut raw = config();
    raw.rescale = false;
    let stack = items_to_array::<f64>(
        table(&url, bbox::FULL),
        unit_spec(10, 10),
        &raw,
        Arc::new(ZarrReaderFactory),
    )
    .unwrap();
    let array = SyncScheduler.compute(&stack).unwrap();
    assert!(array[[0, 0, 0, 0]].is_nan());
    assert_eq!(array[[0, 0, 5, 5]], 3.0);
}

#[test]
fn test_integer_output() {
    let dir = TempZarrDir::new().unwrap();
    let (url, _) = scaled_asset(&dir);

    let stack = items_to_array::<u16>(
        table(&url, bbox::FULL),
        unit_spec(10, 10),
        &config().with_fill_value(FillValue::Int(0)),
        Arc::new(ZarrReaderFactory),
    )
    .unwrap();
    let array = SyncScheduler.compute(&stack).unwrap();
    assert_eq!(array[[0, 0, 0, 0]], 0);
    assert_eq!(array[[0, 0, 3, 3]], 7);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_missing_store() {
    let dir = TempZarrDir::new().unwrap();
    let url = format!("file://{}", dir.asset_path("never-written").display());

    let stack = items_to_array::<f64>(
        table(&url, bbox::FULL),
        unit_spec(10, 10),
        &config(),
        Arc::new(ZarrReaderFactory),
    )
    .unwrap();
    let err = SyncScheduler.compute(&stack).unwrap_err();
    match err {
        StackError::Chunk { source, .. } => {
            assert!(matches!(*source, StackError::Read { ref source, .. } if source.kind == ReadErrorKind::NotFound));
        }
        other => panic!("unexpected {other:?}"),
    }

    let tolerant = config().with_errors_as_nodata(NodataPolicy::from_kinds([ReadErrorKind::NotFound]));
    let stack = items_to_array::<f64>(
        table(&url, bbox::FULL),
        unit_spec(10, 10),
        &tolerant,
        Arc::new(ZarrReaderFactory),
    )
    .unwrap();
    let array = SyncScheduler.compute(&stack).unwrap();
    assert_all_fill!(array, f64::NAN);
}

#[test]
fn test_array_path_from_open_env() {
    let dir = TempZarrDir::new().unwrap();
    let url = dir
        .write(
            "full",
            &create_test_grid(10, 10),
            &BoundingBox::from_tuple(bbox::FULL),
            Default::default(),
        )
        .unwrap();

    let env = LayeredEnv::new().on_open("ZARR_ARRAY_PATH", "/not-here");
    let stack = items_to_array::<f64>(
        table(&url, bbox::FULL),
        unit_spec(10, 10),
        &config().with_env(env),
        Arc::new(ZarrReaderFactory),
    )
    .unwrap();
    let err = stack.compute_chunk([0, 0, 0, 0]).unwrap_err();
    match err {
        StackError::Chunk { source, .. } => {
            assert!(matches!(*source, StackError::Read { ref source, .. } if source.kind == ReadErrorKind::Open));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_unsupported_resampling_fails_reader_creation() {
    let mut config = config();
    config.resampling = raster_stack::Resampling::Bilinear;
    let stack = items_to_array::<f64>(
        table("file:///anything.zarr", bbox::FULL),
        unit_spec(10, 10),
        &config,
        Arc::new(ZarrReaderFactory),
    )
    .unwrap();
    let err = SyncScheduler.compute(&stack).unwrap_err();
    assert!(matches!(err, StackError::ReaderInit { item: 0, asset: 0, .. }));
}

//! Graph construction cost and the reader-table fusion barrier.

use std::sync::Arc;
use std::time::Instant;

use raster_stack::{
    fuse_blockwise, items_to_array, ChunkSpec, Layer, LayerAnnotations, LazyStack, Scheduler,
    StackConfig, SyncScheduler, ThreadPoolScheduler,
};
use test_utils::{sparse_table, unit_spec, MemoryReaderFactory, ReaderCounters};

fn build(
    items: usize,
    assets: usize,
    size: usize,
    chunksize: usize,
    density: f64,
) -> (LazyStack<f64>, Arc<ReaderCounters>) {
    let factory = MemoryReaderFactory::new();
    let counters = factory.counters();
    let config = StackConfig::default().with_chunksize(ChunkSpec::uniform(chunksize));
    let stack = items_to_array::<f64>(
        sparse_table(items, assets, size, size, density),
        unit_spec(size, size),
        &config,
        Arc::new(factory),
    )
    .unwrap();
    (stack, counters)
}

fn reader_layer_name(stack: &LazyStack<f64>) -> String {
    stack
        .graph()
        .layers()
        .iter()
        .find(|l| matches!(l, Layer::ReaderTable(_)))
        .map(|l| l.name().to_string())
        .unwrap()
}

// ============================================================================
// Construction cost
// ============================================================================

#[test]
fn test_huge_product_builds_without_enumerating() {
    // 50 * 20 cells and 2000 * 2000 chunks: 4e9 fetch tasks
    let start = Instant::now();
    let (stack, counters) = build(50, 20, 20_000, 10, 0.5);
    let elapsed = start.elapsed();

    assert_eq!(stack.numblocks(), [50, 20, 2000, 2000]);
    let fetch = stack.graph().output().unwrap();
    assert_eq!(fetch.task_count(), 50 * 20 * 2000 * 2000);
    assert_eq!(stack.graph().task_count(), 50 * 20 + 50 * 20 * 2000 * 2000);
    assert_eq!(counters.created(), 0);

    // The window index ships per-axis offsets only
    let packed = fetch.slices().pack().unwrap();
    assert!(packed.len() < 100_000, "packed index is {} bytes", packed.len());

    assert!(elapsed.as_secs() < 10, "construction took {:?}", elapsed);

    // Any single task is still reachable on demand
    let block = stack.compute_chunk([49, 19, 1999, 1999]).unwrap();
    assert_eq!(block.shape(), [1, 1, 10, 10]);
}

#[test]
fn test_layer_sizes_are_additive() {
    let (stack, _) = build(7, 3, 120, 10, 1.0);
    let layers = stack.graph().layers();
    assert_eq!(layers.len(), 2);
    assert_eq!(layers[0].numblocks(), vec![7, 3]);
    assert_eq!(layers[1].numblocks(), vec![7, 3, 12, 12]);

    let fetch = stack.graph().output().unwrap();
    assert_eq!(fetch.slices().numblocks(), [12, 12]);
    assert_eq!(
        stack.graph().dependents(&reader_layer_name(&stack)),
        vec![stack.name()]
    );
}

// ============================================================================
// Fusion barrier
// ============================================================================

#[test]
fn test_reader_table_is_not_fusable() {
    let (stack, _) = build(3, 2, 40, 10, 1.0);
    let reader_name = reader_layer_name(&stack);
    assert!(!stack.graph().layer(&reader_name).unwrap().annotations().fuse);

    let (optimized, report) = fuse_blockwise(stack.graph().clone());
    assert!(report.fused.is_empty());
    assert_eq!(report.blocked, vec![(reader_name, stack.name().to_string())]);
    assert_eq!(optimized.layers().len(), 2);
}

#[test]
fn test_unfused_builds_one_reader_per_cell() {
    let (stack, counters) = build(3, 2, 40, 10, 1.0);
    let (_, stats) = SyncScheduler.compute_with_stats(&stack).unwrap();
    assert!(!stats.fused);
    assert_eq!(stats.tasks, 3 * 2 * 4 * 4);
    assert_eq!(stats.reader_table_tasks, 6);
    assert_eq!(counters.created(), 6);

    counters.reset();
    let (_, stats) = ThreadPoolScheduler::new(4).compute_with_stats(&stack).unwrap();
    assert_eq!(stats.reader_table_tasks, 6);
    assert_eq!(counters.created(), 6);
}

#[test]
fn test_forced_fusion_multiplies_reader_construction() {
    let (mut stack, counters) = build(3, 2, 40, 10, 1.0);
    let reader_name = reader_layer_name(&stack);
    stack
        .graph_mut()
        .annotate(&reader_name, LayerAnnotations::default())
        .unwrap();

    let (fused_array, stats) = SyncScheduler.compute_with_stats(&stack).unwrap();
    assert!(stats.fused);
    assert_eq!(stats.reader_table_tasks, 3 * 2 * 4 * 4);
    assert_eq!(counters.created(), 3 * 2 * 4 * 4);

    // Same pixels either way
    stack
        .graph_mut()
        .annotate(&reader_name, LayerAnnotations::no_fuse())
        .unwrap();
    let plain = SyncScheduler.compute(&stack).unwrap();
    let bits = |a: &ndarray::Array4<f64>| a.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(&fused_array), bits(&plain));
}

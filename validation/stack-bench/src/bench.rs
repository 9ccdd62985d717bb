//! Benchmark runners for graph construction and chunk computation.
//!
//! Assets are served by an in-memory reader so the numbers measure the
//! graph and scheduling machinery rather than storage.

use std::sync::Arc;
use std::time::Instant;

use hdrhistogram::Histogram;
use raster_stack::{
    items_to_array, ExecutionStats, LazyStack, Layer, Scheduler, ThreadPoolScheduler,
};
use serde::Serialize;
use test_utils::{sparse_table, unit_spec, MemoryReaderFactory, ReaderCounters};
use tracing::{debug, info};

use crate::config::BenchConfig;

/// One graph layer as reported.
#[derive(Debug, Clone, Serialize)]
pub struct LayerSummary {
    pub name: String,
    pub numblocks: Vec<usize>,
    pub tasks: usize,
    pub fuse: bool,
}

/// Result of building a stack without computing it.
#[derive(Debug, Clone, Serialize)]
pub struct GraphReport {
    pub scenario: String,
    pub shape: [usize; 4],
    pub numblocks: [usize; 4],
    pub build_ms: f64,
    pub total_tasks: usize,
    pub layers: Vec<LayerSummary>,
    pub window_index_bytes: usize,
    /// Readers constructed while building; anything but 0 is a bug.
    pub readers_created: usize,
}

/// Result of computing some or all chunks of a stack.
#[derive(Debug, Clone, Serialize)]
pub struct ComputeReport {
    pub graph: GraphReport,
    pub threads: usize,
    pub chunks: usize,
    pub compute_ms: f64,
    pub chunks_per_second: f64,
    pub stats: ExecutionStats,
    pub readers_created: usize,
    pub reads: usize,
    /// Latency of computing one chunk on its own, reader construction included.
    pub chunk_latency: LatencySummary,
}

/// Percentiles in milliseconds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LatencySummary {
    pub samples: u64,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Records per-chunk latencies in microseconds.
pub struct LatencyCollector {
    histogram: Histogram<u64>,
}

impl LatencyCollector {
    pub fn new() -> anyhow::Result<Self> {
        let histogram = Histogram::new(3)
            .map_err(|e| anyhow::anyhow!("failed to create histogram: {:?}", e))?;
        Ok(Self { histogram })
    }

    pub fn record(&mut self, latency_us: u64) {
        self.histogram.record(latency_us.max(1)).ok();
    }

    pub fn summary(&self) -> LatencySummary {
        if self.histogram.is_empty() {
            return LatencySummary::default();
        }
        let ms = |us: u64| us as f64 / 1000.0;
        LatencySummary {
            samples: self.histogram.len(),
            p50: ms(self.histogram.value_at_percentile(50.0)),
            p90: ms(self.histogram.value_at_percentile(90.0)),
            p99: ms(self.histogram.value_at_percentile(99.0)),
            min: ms(self.histogram.min()),
            max: ms(self.histogram.max()),
            mean: self.histogram.mean() / 1000.0,
        }
    }
}

/// A built stack plus the counters of the factory behind it.
struct Built {
    stack: LazyStack<f64>,
    counters: Arc<ReaderCounters>,
    report: GraphReport,
}

/// Runs benchmark scenarios.
pub struct BenchRunner {
    config: BenchConfig,
}

impl BenchRunner {
    pub fn new(config: BenchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Factory serving every present cell of the scenario's table.
    fn factory(&self) -> MemoryReaderFactory {
        let c = &self.config;
        let table = sparse_table(c.items, c.assets, c.rows, c.cols, c.density);
        table
            .indexed()
            .fold(MemoryReaderFactory::new(), |factory, ((item, _), entry)| {
                match &entry.url {
                    Some(url) => factory.with_asset(url.clone(), entry.bounds, item as f64),
                    None => factory,
                }
            })
    }

    fn build(&self) -> anyhow::Result<Built> {
        let c = &self.config;
        let table = sparse_table(c.items, c.assets, c.rows, c.cols, c.density);
        let factory = self.factory();
        let counters = factory.counters();

        let start = Instant::now();
        let stack = items_to_array::<f64>(
            table,
            unit_spec(c.rows, c.cols),
            &c.stack_config(),
            Arc::new(factory),
        )?;
        let build_ms = start.elapsed().as_secs_f64() * 1000.0;

        let graph = stack.graph();
        let layers = graph
            .layers()
            .iter()
            .map(|layer| LayerSummary {
                name: layer.name().to_string(),
                numblocks: layer.numblocks(),
                tasks: layer.task_count(),
                fuse: layer.annotations().fuse,
            })
            .collect();
        let window_index_bytes = graph
            .layers()
            .iter()
            .find_map(|layer| match layer {
                Layer::Fetch(fetch) => Some(fetch.slices().pack()),
                Layer::ReaderTable(_) => None,
            })
            .transpose()?
            .map_or(0, |packed| packed.len());

        let report = GraphReport {
            scenario: c.name.clone(),
            shape: stack.shape(),
            numblocks: stack.numblocks(),
            build_ms,
            total_tasks: graph.task_count(),
            layers,
            window_index_bytes,
            readers_created: counters.created(),
        };
        debug!(
            scenario = %c.name,
            tasks = report.total_tasks,
            build_ms = report.build_ms,
            "Built stack"
        );

        Ok(Built {
            stack,
            counters,
            report,
        })
    }

    /// Build the stack and report on its graph.
    pub fn run_graph(&self) -> anyhow::Result<GraphReport> {
        let built = self.build()?;
        if built.report.readers_created != 0 {
            anyhow::bail!(
                "graph construction created {} readers",
                built.report.readers_created
            );
        }
        Ok(built.report)
    }

    /// Build the stack, then compute the selected chunks twice: once through
    /// the thread-pool scheduler for throughput, once chunk by chunk for
    /// latency.
    pub fn run_compute(&self) -> anyhow::Result<ComputeReport> {
        let built = self.build()?;
        let indices = self.chunk_indices(&built.stack)?;
        let scheduler = ThreadPoolScheduler::new(self.config.threads);

        info!(
            scenario = %self.config.name,
            chunks = indices.len(),
            threads = scheduler.threads(),
            "Computing chunks"
        );

        let start = Instant::now();
        let (blocks, stats) = scheduler.compute_blocks(&built.stack, &indices)?;
        let compute_ms = start.elapsed().as_secs_f64() * 1000.0;
        let readers_created = built.counters.created();
        let reads = built.counters.reads();
        drop(blocks);

        let mut latencies = LatencyCollector::new()?;
        for index in &indices {
            let start = Instant::now();
            built.stack.compute_chunk(*index)?;
            latencies.record(start.elapsed().as_micros() as u64);
        }

        let chunks_per_second = if compute_ms > 0.0 {
            indices.len() as f64 / (compute_ms / 1000.0)
        } else {
            0.0
        };

        Ok(ComputeReport {
            graph: built.report,
            threads: scheduler.threads(),
            chunks: indices.len(),
            compute_ms,
            chunks_per_second,
            stats,
            readers_created,
            reads,
            chunk_latency: latencies.summary(),
        })
    }

    /// All chunk indices, or `sample` of them spread evenly in row-major
    /// order.
    fn chunk_indices(&self, stack: &LazyStack<f64>) -> anyhow::Result<Vec<[usize; 4]>> {
        let output = stack.graph().output()?;
        let total = output.task_count();
        let wanted = self.config.sample.map_or(total, |n| n.min(total));
        if wanted == 0 {
            return Ok(Vec::new());
        }

        let step = total as f64 / wanted as f64;
        (0..wanted)
            .map(|i| {
                let flat = ((i as f64 * step) as usize).min(total - 1);
                Ok(output.task_at(flat)?.index)
            })
            .collect()
    }
}

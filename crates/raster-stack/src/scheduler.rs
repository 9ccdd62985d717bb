//! Executing stacks: turning a lazy graph into pixels.
//!
//! Schedulers run the fusion pass first, then realize reader table cells and
//! fetch tasks. Blocks are placed into the output by their declared chunk
//! offsets, so completion order never matters.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::{s, Array4};
use raster_common::Element;
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::block::Block;
use crate::error::{Result, StackError};
use crate::graph::{fuse_blockwise, FetchTask};
use crate::reader_table::ReaderTableEntry;
use crate::stack::LazyStack;

/// Counters from one execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionStats {
    /// Fetch tasks run.
    pub tasks: usize,
    /// Reader table cells realized, i.e. reader constructions.
    pub reader_table_tasks: usize,
    pub fill_blocks: usize,
    pub data_blocks: usize,
    /// Whether the reader table had been fused into the fetch layer.
    pub fused: bool,
}

impl ExecutionStats {
    fn new(fused: bool) -> Self {
        Self {
            fused,
            ..Default::default()
        }
    }

    fn record<T: Element>(&mut self, block: &Block<T>) {
        self.tasks += 1;
        if block.is_fill() {
            self.fill_blocks += 1;
        } else {
            self.data_blocks += 1;
        }
    }
}

/// Something that can evaluate a [`LazyStack`].
pub trait Scheduler {
    /// Compute the blocks at `indices`, returned in the same order.
    fn compute_blocks<T: Element>(
        &self,
        stack: &LazyStack<T>,
        indices: &[[usize; 4]],
    ) -> Result<(Vec<Block<T>>, ExecutionStats)>;

    /// Compute every chunk and assemble the full array.
    fn compute_with_stats<T: Element>(
        &self,
        stack: &LazyStack<T>,
    ) -> Result<(Array4<T>, ExecutionStats)> {
        let indices = all_indices(stack)?;
        let (blocks, stats) = self.compute_blocks(stack, &indices)?;
        let array = assemble(stack, &indices, &blocks)?;
        Ok((array, stats))
    }

    fn compute<T: Element>(&self, stack: &LazyStack<T>) -> Result<Array4<T>> {
        self.compute_with_stats(stack).map(|(array, _)| array)
    }
}

/// Every chunk coordinate of `stack`, row-major.
pub fn all_indices<T: Element>(stack: &LazyStack<T>) -> Result<Vec<[usize; 4]>> {
    Ok(stack
        .graph()
        .output()?
        .index()
        .iter()
        .map(|c| [c[0], c[1], c[2], c[3]])
        .collect())
}

/// Place `blocks` into a full array at their chunk offsets.
///
/// Chunks not listed keep the fill value.
pub fn assemble<T: Element>(
    stack: &LazyStack<T>,
    indices: &[[usize; 4]],
    blocks: &[Block<T>],
) -> Result<Array4<T>> {
    if indices.len() != blocks.len() {
        return Err(StackError::graph(format!(
            "{} chunk indices for {} blocks",
            indices.len(),
            blocks.len()
        )));
    }

    let mut out = Array4::from_elem(stack.shape(), stack.fill_value());
    let chunks = stack.chunks();
    for (&index, block) in indices.iter().zip(blocks) {
        let expected = [
            chunks[0][index[0]],
            chunks[1][index[1]],
            chunks[2][index[2]],
            chunks[3][index[3]],
        ];
        if block.shape() != expected {
            return Err(StackError::graph(format!(
                "block {:?} has shape {:?}, expected {:?}",
                index,
                block.shape(),
                expected
            )));
        }

        let [i, a, r, c] = stack.chunk_offset(index)?;
        let [bi, ba, br, bc] = expected;
        let mut target = out.slice_mut(s![i..i + bi, a..a + ba, r..r + br, c..c + bc]);
        match block {
            Block::Fill { value, .. } => target.fill(value[()]),
            Block::Data(data) => target.assign(data),
        }
    }
    Ok(out)
}

/// Runs tasks one after another on the calling thread.
///
/// Reader table cells are realized once and reused across their fetch tasks,
/// unless the graph fused them into the fetch layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncScheduler;

impl Scheduler for SyncScheduler {
    fn compute_blocks<T: Element>(
        &self,
        stack: &LazyStack<T>,
        indices: &[[usize; 4]],
    ) -> Result<(Vec<Block<T>>, ExecutionStats)> {
        let (graph, report) = fuse_blockwise(stack.graph().clone());
        let fetch = graph.output()?;
        let fused = fetch.is_fused();
        debug!(
            stack = stack.name(),
            tasks = indices.len(),
            fused,
            blocked = report.blocked.len(),
            "Sync scheduler starting"
        );

        let mut stats = ExecutionStats::new(fused);
        let mut cells: HashMap<[usize; 2], ReaderTableEntry<T>> = HashMap::new();
        let mut blocks = Vec::with_capacity(indices.len());

        for &index in indices {
            let task = fetch.task(index)?;
            let cached = if fused {
                None
            } else {
                cells.get(&task.cell).cloned()
            };
            let entry = match cached {
                Some(entry) => entry,
                None => {
                    let entry = graph
                        .reader_cell(fetch, task.cell)
                        .map_err(|err| err.in_chunk(index))?;
                    stats.reader_table_tasks += 1;
                    if !fused {
                        cells.insert(task.cell, entry.clone());
                    }
                    entry
                }
            };

            let block = fetch.run(&task, &entry)?;
            stats.record(&block);
            blocks.push(block);
        }

        debug!(stack = stack.name(), stats = ?stats, "Sync scheduler finished");
        Ok((blocks, stats))
    }
}

/// Runs tasks on a dedicated rayon pool.
///
/// Strategy:
/// 1. Derive every requested task (cheap, no I/O)
/// 2. Parallel pass: realize each distinct reader table cell once
/// 3. Parallel pass: run fetch tasks against the shared cells
///
/// With a fused graph step 2 is skipped and each task builds its own cell.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPoolScheduler {
    /// Worker count; 0 lets rayon decide.
    threads: usize,
}

impl ThreadPoolScheduler {
    pub fn new(threads: usize) -> Self {
        Self { threads }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    fn pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(|i| format!("stack-worker-{}", i))
            .build()
            .map_err(|e| StackError::config(format!("failed to build thread pool: {}", e)))
    }
}

impl Scheduler for ThreadPoolScheduler {
    fn compute_blocks<T: Element>(
        &self,
        stack: &LazyStack<T>,
        indices: &[[usize; 4]],
    ) -> Result<(Vec<Block<T>>, ExecutionStats)> {
        let pool = self.pool()?;
        let (graph, report) = fuse_blockwise(stack.graph().clone());
        let fetch = graph.output()?;
        let fused = fetch.is_fused();
        debug!(
            stack = stack.name(),
            tasks = indices.len(),
            threads = pool.current_num_threads(),
            fused,
            blocked = report.blocked.len(),
            "Thread pool scheduler starting"
        );

        let tasks = indices
            .iter()
            .map(|&index| fetch.task(index))
            .collect::<Result<Vec<FetchTask>>>()?;

        let blocks = pool.install(|| -> Result<(Vec<Block<T>>, usize)> {
            let cells: HashMap<[usize; 2], ReaderTableEntry<T>> = if fused {
                HashMap::new()
            } else {
                // Each cell is charged to the first requested chunk that uses it
                let mut distinct: BTreeMap<[usize; 2], [usize; 4]> = BTreeMap::new();
                for task in &tasks {
                    distinct.entry(task.cell).or_insert(task.index);
                }
                distinct
                    .into_par_iter()
                    .map(|(cell, index)| {
                        graph
                            .reader_cell(fetch, cell)
                            .map(|entry| (cell, entry))
                            .map_err(|err| err.in_chunk(index))
                    })
                    .collect::<Result<HashMap<_, _>>>()?
            };
            let built = AtomicUsize::new(cells.len());

            let blocks = tasks
                .par_iter()
                .map(|task| match cells.get(&task.cell) {
                    Some(entry) => fetch.run(task, entry),
                    None => {
                        let entry = graph
                            .reader_cell(fetch, task.cell)
                            .map_err(|err| err.in_chunk(task.index))?;
                        built.fetch_add(1, Ordering::Relaxed);
                        fetch.run(task, &entry)
                    }
                })
                .collect::<Result<Vec<_>>>()?;
            Ok((blocks, built.into_inner()))
        });
        let (blocks, reader_table_tasks) = blocks?;

        let mut stats = ExecutionStats::new(fused);
        stats.reader_table_tasks = reader_table_tasks;
        for block in &blocks {
            stats.record(block);
        }

        debug!(stack = stack.name(), stats = ?stats, "Thread pool scheduler finished");
        Ok((blocks, stats))
    }
}

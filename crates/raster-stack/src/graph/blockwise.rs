//! Blockwise index algebra.
//!
//! A blockwise layer is described by index letters: the output is addressed
//! by e.g. `"tbyx"` and each argument by a subset such as `"tb"` or `"yx"`.
//! The task at an output coordinate reads each argument at the projection of
//! that coordinate onto the argument's letters. Nothing here ever enumerates
//! the product of the argument domains; tasks are derived on demand.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StackError};

/// Output and argument index letters plus the resulting block counts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockwiseIndex {
    output: Vec<char>,
    /// Per argument, the output axis each of its letters maps to.
    projections: Vec<Vec<usize>>,
    numblocks: Vec<usize>,
}

impl BlockwiseIndex {
    /// Build from output letters and `(letters, numblocks)` per argument.
    ///
    /// Every output letter must be supplied by at least one argument, and
    /// arguments sharing a letter must agree on its block count.
    pub fn new(output: &str, args: &[(&str, &[usize])]) -> Result<Self> {
        let output: Vec<char> = output.chars().collect();
        for (i, c) in output.iter().enumerate() {
            if output[..i].contains(c) {
                return Err(StackError::graph(format!("repeated output index '{}'", c)));
            }
        }

        let mut numblocks: Vec<Option<usize>> = vec![None; output.len()];
        let mut projections = Vec::with_capacity(args.len());

        for (letters, blocks) in args {
            let letters: Vec<char> = letters.chars().collect();
            if letters.len() != blocks.len() {
                return Err(StackError::graph(format!(
                    "argument indices {:?} do not match numblocks {:?}",
                    letters, blocks
                )));
            }

            let mut projection = Vec::with_capacity(letters.len());
            for (letter, &n) in letters.iter().zip(blocks.iter()) {
                let axis = output.iter().position(|c| c == letter).ok_or_else(|| {
                    StackError::graph(format!("argument index '{}' not in output", letter))
                })?;
                match numblocks[axis] {
                    Some(existing) if existing != n => {
                        return Err(StackError::graph(format!(
                            "index '{}' has {} blocks in one argument and {} in another",
                            letter, existing, n
                        )))
                    }
                    _ => numblocks[axis] = Some(n),
                }
                projection.push(axis);
            }
            projections.push(projection);
        }

        let numblocks = numblocks
            .into_iter()
            .zip(output.iter())
            .map(|(n, c)| {
                n.ok_or_else(|| StackError::graph(format!("output index '{}' has no argument", c)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            output,
            projections,
            numblocks,
        })
    }

    pub fn output(&self) -> String {
        self.output.iter().collect()
    }

    pub fn ndim(&self) -> usize {
        self.output.len()
    }

    pub fn numblocks(&self) -> &[usize] {
        &self.numblocks
    }

    /// Number of tasks the layer stands for, computed arithmetically.
    pub fn task_count(&self) -> usize {
        self.numblocks.iter().product()
    }

    pub fn contains(&self, coord: &[usize]) -> bool {
        coord.len() == self.numblocks.len()
            && coord.iter().zip(&self.numblocks).all(|(c, n)| c < n)
    }

    /// Coordinate of argument `arg` used by the task at `coord`.
    pub fn arg_coord(&self, arg: usize, coord: &[usize]) -> Result<Vec<usize>> {
        if !self.contains(coord) {
            return Err(StackError::graph(format!(
                "block {:?} outside numblocks {:?}",
                coord, self.numblocks
            )));
        }
        let projection = self
            .projections
            .get(arg)
            .ok_or_else(|| StackError::graph(format!("no argument {}", arg)))?;
        Ok(projection.iter().map(|&axis| coord[axis]).collect())
    }

    /// Row-major coordinate of the `flat`-th task.
    pub fn coord_from_flat(&self, mut flat: usize) -> Option<Vec<usize>> {
        if flat >= self.task_count() {
            return None;
        }
        let mut coord = vec![0; self.numblocks.len()];
        for (axis, &n) in self.numblocks.iter().enumerate().rev() {
            coord[axis] = flat % n;
            flat /= n;
        }
        Some(coord)
    }

    /// Lazily walk every task coordinate in row-major order.
    pub fn iter(&self) -> BlockIter<'_> {
        BlockIter {
            numblocks: &self.numblocks,
            next: if self.task_count() == 0 {
                None
            } else {
                Some(vec![0; self.numblocks.len()])
            },
        }
    }
}

/// Odometer over block coordinates; holds one coordinate at a time.
#[derive(Debug, Clone)]
pub struct BlockIter<'a> {
    numblocks: &'a [usize],
    next: Option<Vec<usize>>,
}

impl Iterator for BlockIter<'_> {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        let mut succ = current.clone();
        for axis in (0..succ.len()).rev() {
            succ[axis] += 1;
            if succ[axis] < self.numblocks[axis] {
                self.next = Some(succ);
                return Some(current);
            }
            succ[axis] = 0;
        }
        Some(current)
    }
}

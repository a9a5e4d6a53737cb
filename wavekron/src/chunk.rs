//! Partitioning of the element coupling set into memory-budgeted chunks,
//! and the scratch buffers sized from the resulting chunk statistics.
//!
//! Every row element couples to every column element of the table. A chunk
//! maps a contiguous run of row elements to, per row, one inclusive range of
//! connected column elements; chunks partition columns, never a single
//! coupling. The planner walks the coupling set in row-major order and cuts
//! a chunk whenever adding more couplings would overflow either the input
//! buffer (distinct column elements) or the reduction buffer (total
//! couplings times terms).

use super::error::{Error, Result};
use super::real::Real;
use super::tensor::Vector;

/// Inclusive range of connected column elements.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ColRange {
    /// First connected column.
    pub start: usize,
    /// Last connected column.
    pub stop: usize,
}

impl ColRange {
    /// Number of columns covered.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.stop - self.start + 1
    }

    /// Ranges are never empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

/// One memory-budgeted slice of the coupling set.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ElementChunk {
    entries: Vec<(usize, ColRange)>,
}

impl ElementChunk {
    /// Row entries in ascending row order.
    #[must_use]
    pub fn entries(&self) -> &[(usize, ColRange)] {
        &self.entries
    }

    /// Total couplings in this chunk.
    #[must_use]
    pub fn num_couplings(&self) -> usize {
        self.entries.iter().map(|(_, range)| range.len()).sum()
    }

    /// Smallest connected column.
    #[must_use]
    pub fn min_start(&self) -> usize {
        self.entries.iter().map(|(_, range)| range.start).min().unwrap_or(0)
    }

    /// Largest connected column.
    #[must_use]
    pub fn max_stop(&self) -> usize {
        self.entries.iter().map(|(_, range)| range.stop).max().unwrap_or(0)
    }

    /// Column elements whose inputs this chunk touches.
    #[must_use]
    pub fn num_distinct_cols(&self) -> usize {
        if self.entries.is_empty() {
            0
        } else {
            self.max_stop() - self.min_start() + 1
        }
    }

    /// Largest per-row coupling count.
    #[must_use]
    pub fn max_row_couplings(&self) -> usize {
        self.entries.iter().map(|(_, range)| range.len()).max().unwrap_or(0)
    }

    fn push(&mut self, row: usize, start: usize, stop: usize) {
        if let Some((last_row, range)) = self.entries.last_mut() {
            if *last_row == row {
                // continuation of the row this chunk was split within
                debug_assert_eq!(range.stop + 1, start);
                range.stop = stop;
                return;
            }
        }
        self.entries.push((row, ColRange { start, stop }));
    }
}

/// Splits the full `num_rows x num_cols` coupling set into chunks whose
/// workspace footprint fits `limit_bytes`.
///
/// The budget is split evenly between the input buffer and the three
/// reduction-sized buffers (reduction space plus at most two intermediate
/// kron buffers), which bounds per chunk both `elem_size * distinct columns`
/// and `elem_size * num_terms * couplings`.
///
/// # Errors
///
/// Returns a configuration error if the budget cannot hold even one
/// coupling.
pub fn plan_chunks(
    num_rows: usize,
    num_cols: usize,
    elem_size: usize,
    num_terms: usize,
    elem_bytes: usize,
    limit_bytes: usize,
) -> Result<Vec<ElementChunk>> {
    assert!(num_rows > 0 && num_cols > 0 && elem_size > 0 && num_terms > 0);

    let limit_elems = limit_bytes / elem_bytes;
    let max_couplings = limit_elems / 4 / (elem_size * num_terms);
    let max_distinct = limit_elems / 4 / elem_size;
    if max_couplings == 0 || max_distinct == 0 {
        return Err(Error::Config(format!(
            "workspace limit of {limit_bytes} bytes cannot hold a single coupling of {elem_size} x {num_terms} elements"
        )));
    }

    let mut chunks = Vec::new();
    let mut current = ElementChunk::default();
    let mut couplings = 0_usize;
    let mut col_min = usize::MAX;
    let mut col_max = 0_usize;

    for row in 0..num_rows {
        let mut start = 0_usize;
        while start < num_cols {
            let capacity = max_couplings - couplings;
            // columns this chunk may still span without overflowing the
            // input buffer
            let span_take = if current.entries.is_empty() {
                max_distinct
            } else {
                let new_min = col_min.min(start);
                let allowed_max = new_min + max_distinct - 1;
                if col_max > allowed_max {
                    0
                } else {
                    (allowed_max + 1).saturating_sub(start)
                }
            };

            let take = capacity.min(span_take).min(num_cols - start);
            if take == 0 {
                chunks.push(std::mem::take(&mut current));
                couplings = 0;
                col_min = usize::MAX;
                col_max = 0;
                continue;
            }

            let stop = start + take - 1;
            current.push(row, start, stop);
            couplings += take;
            col_min = col_min.min(start);
            col_max = col_max.max(stop);
            start = stop + 1;
        }
    }
    if !current.entries.is_empty() {
        chunks.push(current);
    }

    debug_assert!(chunks.iter().all(|chunk| {
        chunk.num_couplings() <= max_couplings && chunk.num_distinct_cols() <= max_distinct
    }));

    Ok(chunks)
}

/// Preallocated scratch buffers shared by every chunk of a run.
pub struct Workspace<T: Real> {
    /// Copies of the column elements a chunk reads.
    pub batch_input: Vector<T>,
    /// Per-term, per-coupling partial outputs awaiting reduction.
    pub reduction_space: Vector<T>,
    /// Intermediate kron stages; `min(num_dims - 1, 2)` buffers of the same
    /// size as the reduction space.
    pub batch_intermediate: Vec<Vector<T>>,
    /// All-ones vector sliced per row by the reduction.
    pub unit_vector: Vector<T>,
}

impl<T: Real> Workspace<T> {
    /// Sizes the buffers from the statistics of a chunk plan.
    #[must_use]
    pub fn new(chunks: &[ElementChunk], elem_size: usize, num_terms: usize, num_dims: usize) -> Self {
        let max_distinct = chunks.iter().map(ElementChunk::num_distinct_cols).max().unwrap_or(0);
        let max_couplings = chunks.iter().map(ElementChunk::num_couplings).max().unwrap_or(0);
        let max_row_couplings = chunks.iter().map(ElementChunk::max_row_couplings).max().unwrap_or(0);

        let reduction_len = elem_size * num_terms * max_couplings;
        let mut unit_vector = Vector::zeros(num_terms * max_row_couplings);
        unit_vector.as_mut_slice().fill(T::one());

        Self {
            batch_input: Vector::zeros(elem_size * max_distinct),
            reduction_space: Vector::zeros(reduction_len),
            batch_intermediate: (0..(num_dims - 1).min(2)).map(|_| Vector::zeros(reduction_len)).collect(),
            unit_vector,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coverage(chunks: &[ElementChunk], num_rows: usize, num_cols: usize) {
        let mut seen = vec![0_u32; num_rows * num_cols];
        for chunk in chunks {
            for &(row, range) in chunk.entries() {
                for col in range.start..=range.stop {
                    seen[row * num_cols + col] += 1;
                }
            }
        }
        assert!(seen.iter().all(|&count| count == 1), "couplings must be covered exactly once");
    }

    #[test]
    fn single_chunk_when_budget_is_large() {
        let chunks = plan_chunks(4, 4, 8, 2, 8, 1 << 30).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].num_couplings(), 16);
        assert_eq!(chunks[0].num_distinct_cols(), 4);
        coverage(&chunks, 4, 4);
    }

    #[test]
    fn tight_budget_splits_rows_at_column_boundaries() {
        // elem_size 4, 2 terms, f64: one coupling costs 4 * 2 = 8 reduction
        // elements; a 4 KiB budget caps each chunk at 16 couplings
        let elem_bytes = 8;
        let chunks = plan_chunks(6, 6, 4, 2, elem_bytes, 4096).unwrap();

        assert!(chunks.len() > 1);
        coverage(&chunks, 6, 6);
        for chunk in &chunks {
            assert!(chunk.num_couplings() <= 16);
            assert!(chunk.num_distinct_cols() <= 32);
        }
    }

    #[test]
    fn one_coupling_budget_still_covers_everything() {
        // enough for exactly one coupling per chunk
        let elem_bytes = 8;
        let limit = 4 * 2 * 3 * elem_bytes;
        let chunks = plan_chunks(3, 3, 3, 2, elem_bytes, limit).unwrap();

        assert_eq!(chunks.len(), 9);
        coverage(&chunks, 3, 3);
        for chunk in &chunks {
            assert_eq!(chunk.num_couplings(), 1);
        }
    }

    #[test]
    fn impossible_budget_is_a_configuration_error() {
        assert!(plan_chunks(2, 2, 8, 2, 8, 64).is_err());
    }

    #[test]
    fn split_row_keeps_its_total_coupling_count() {
        let chunks = plan_chunks(2, 10, 2, 1, 8, 4 * 2 * 3 * 8).unwrap();
        coverage(&chunks, 2, 10);

        // each row covers all ten columns across chunks
        for row in 0..2 {
            let total: usize = chunks
                .iter()
                .flat_map(ElementChunk::entries)
                .filter(|(r, _)| *r == row)
                .map(|(_, range)| range.len())
                .sum();
            assert_eq!(total, 10);
        }
    }

    #[test]
    fn workspace_sizes_follow_chunk_statistics() {
        let chunks = plan_chunks(4, 4, 8, 2, 8, 1 << 30).unwrap();
        let ws = Workspace::<f64>::new(&chunks, 8, 2, 3);

        assert_eq!(ws.batch_input.len(), 8 * 4);
        assert_eq!(ws.reduction_space.len(), 8 * 2 * 16);
        assert_eq!(ws.batch_intermediate.len(), 2);
        assert_eq!(ws.batch_intermediate[0].len(), ws.reduction_space.len());
        assert_eq!(ws.unit_vector.len(), 2 * 4);
        assert!(ws.unit_vector.as_slice().iter().all(|&v| v == 1.0));
    }
}
